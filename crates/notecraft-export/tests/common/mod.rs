#![allow(dead_code)]

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use notecraft_export::*;
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// Serves a small PNG for every URL except those containing `fail_marker`
#[derive(Default)]
pub struct FakeFetcher {
    pub fail_marker: Option<String>,
    pub delay: Option<Duration>,
    pub requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.fail_marker {
            Some(marker) if url.contains(marker.as_str()) => {
                Err(ExportError::Raster(format!("404 for {url}")))
            }
            _ => Ok(png_bytes(40, 20)),
        }
    }
}

/// Replies with scripted statuses, then 201
#[derive(Default)]
pub struct FakeTransport {
    statuses: Mutex<VecDeque<u16>>,
    sent: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeTransport {
    pub fn replying(statuses: &[u16]) -> Self {
        Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// `(filename, bearer token)` of every attempt
    pub fn sent(&self) -> Vec<(String, Option<String>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl UploadTransport for FakeTransport {
    async fn send(&self, request: &UploadRequest, token: Option<&str>) -> Result<u16> {
        self.sent
            .lock()
            .unwrap()
            .push((request.filename.clone(), token.map(str::to_string)));
        Ok(self.statuses.lock().unwrap().pop_front().unwrap_or(201))
    }
}

/// Counts calls; on success stores `new_token` as the access token
pub struct FakeRefresher {
    pub succeed: bool,
    pub store: Arc<TokenStore>,
    pub new_token: String,
    calls: AtomicUsize,
}

impl FakeRefresher {
    pub fn new(succeed: bool, store: Arc<TokenStore>) -> Self {
        Self {
            succeed,
            store,
            new_token: "fresh-token".to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for FakeRefresher {
    async fn refresh(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.succeed {
            self.store.set_access(self.new_token.clone());
        }
        self.succeed
    }
}

pub fn token_store() -> Arc<TokenStore> {
    Arc::new(TokenStore::new(
        Some("stale-token".to_string()),
        Some("refresh-token".to_string()),
    ))
}

/// Records every progress event
#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<ExportProgress>>,
}

impl ProgressSink for RecordingProgress {
    fn report(&self, progress: ExportProgress) {
        self.events.lock().unwrap().push(progress);
    }
}
