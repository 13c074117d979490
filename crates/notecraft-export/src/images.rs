//! Image loading and the readiness wait that precedes rasterization

use crate::constants::IMAGE_LOAD_TIMEOUT;
use crate::dom::Element;
use crate::prepare::PreparedDocument;
use crate::types::{ExportError, Result};
use async_trait::async_trait;
use base64::Engine;
use image::RgbaImage;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Source of image bytes for a URL
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches images over HTTP(S)
#[derive(Debug, Clone, Default)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetcher whose requests give up after `limit`
    pub fn with_timeout(limit: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(limit).build()?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[derive(Debug, Clone)]
pub enum ImageState {
    Loaded(Arc<RgbaImage>),
    Failed,
}

/// Settled images of one export, keyed by `src`
#[derive(Debug, Clone, Default)]
pub struct ImageSet {
    entries: HashMap<String, ImageState>,
}

impl ImageSet {
    pub fn get(&self, src: &str) -> Option<&RgbaImage> {
        match self.entries.get(src) {
            Some(ImageState::Loaded(img)) => Some(img.as_ref()),
            _ => None,
        }
    }

    /// Loaded or failed
    pub fn is_settled(&self, src: &str) -> bool {
        self.entries.contains_key(src)
    }

    pub fn insert_loaded(&mut self, src: impl Into<String>, image: RgbaImage) {
        self.entries
            .insert(src.into(), ImageState::Loaded(Arc::new(image)));
    }

    pub fn insert_failed(&mut self, src: impl Into<String>) {
        self.entries.insert(src.into(), ImageState::Failed);
    }

    pub fn loaded_count(&self) -> usize {
        self.entries
            .values()
            .filter(|s| matches!(s, ImageState::Loaded(_)))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.entries
            .values()
            .filter(|s| matches!(s, ImageState::Failed))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Wait until every image in the prepared document has loaded or failed.
///
/// Images with only a `data-src` get it copied to `src` first. A load still
/// pending after `IMAGE_LOAD_TIMEOUT` counts as failed. Failures are recorded
/// and logged; this never returns an error.
pub async fn wait_for_images(
    doc: &mut PreparedDocument,
    fetcher: &Arc<dyn ImageFetcher>,
) -> ImageSet {
    wait_for_images_within(doc, fetcher, IMAGE_LOAD_TIMEOUT).await
}

/// `wait_for_images` with an explicit per-image limit
pub async fn wait_for_images_within(
    doc: &mut PreparedDocument,
    fetcher: &Arc<dyn ImageFetcher>,
    limit: Duration,
) -> ImageSet {
    promote_deferred_sources(&mut doc.root);

    let sources = image_sources(&doc.root);
    let mut images = ImageSet::default();
    if sources.is_empty() {
        return images;
    }
    log::debug!("Waiting for {} images to load", sources.len());

    let pending = settle_inline(&sources, &mut images);
    fetch_into(&mut images, pending, fetcher, limit).await;

    log::debug!(
        "Images settled: {} loaded, {} failed",
        images.loaded_count(),
        images.failed_count()
    );
    images
}

/// Decode encoded image bytes (PNG, JPEG, GIF, WebP)
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Payload of a `data:` URI
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let (header, payload) = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| ExportError::Raster(format!("malformed data URI ({} bytes)", uri.len())))?;

    if header.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ExportError::Raster(format!("invalid base64 image data: {e}")))
    } else {
        Ok(urlencoding::decode_binary(payload.as_bytes()).into_owned())
    }
}

fn promote_deferred_sources(root: &mut Element) {
    root.for_each_descendant_mut(&mut |el: &mut Element| {
        if !el.is("img") || el.attr("src").is_some_and(|s| !s.is_empty()) {
            return;
        }
        if let Some(deferred) = el.attr("data-src").map(str::to_string) {
            el.set_attr("src", deferred);
        }
        el.set_attr("loading", "eager");
    });
}

/// Unique non-empty `src` values in document order
fn image_sources(root: &Element) -> Vec<String> {
    let mut imgs = Vec::new();
    root.descendants_by_tag("img", &mut imgs);

    let mut seen = HashSet::new();
    imgs.into_iter()
        .filter_map(|img| img.attr("src"))
        .filter(|src| !src.is_empty())
        .filter(|src| seen.insert(src.to_string()))
        .map(str::to_string)
        .collect()
}

/// Settle `data:` sources immediately; return the ones that need fetching
fn settle_inline(sources: &[String], images: &mut ImageSet) -> Vec<String> {
    let mut pending = Vec::new();
    for src in sources {
        if images.is_settled(src) {
            continue;
        }
        if src.starts_with("data:") {
            match decode_data_uri(src).and_then(|bytes| decode_image(&bytes)) {
                Ok(img) => images.insert_loaded(src.clone(), img),
                Err(e) => {
                    log::warn!("Inline image failed to decode: {e}");
                    images.insert_failed(src.clone());
                }
            }
        } else {
            pending.push(src.clone());
        }
    }
    pending
}

async fn fetch_into(
    images: &mut ImageSet,
    urls: Vec<String>,
    fetcher: &Arc<dyn ImageFetcher>,
    limit: Duration,
) {
    let mut tasks = JoinSet::new();
    for url in urls.iter().cloned() {
        let fetcher = Arc::clone(fetcher);
        tasks.spawn(async move {
            let result = match tokio::time::timeout(limit, fetcher.fetch(&url)).await {
                Ok(Ok(bytes)) => decode_image(&bytes),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(ExportError::ImageTimeout(limit)),
            };
            (url, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((url, Ok(img))) => images.insert_loaded(url, img),
            Ok((url, Err(e))) => {
                log::warn!("Image failed to load ({url}): {e}");
                images.insert_failed(url);
            }
            Err(e) => log::error!("Image load task failed: {e}"),
        }
    }

    // Tasks that panicked never reported their URL
    for url in urls {
        if !images.is_settled(&url) {
            images.insert_failed(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_base64_decodes_payload() {
        let bytes = decode_data_uri("data:text/plain;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn http_fetcher_builds_with_timeout() {
        assert!(HttpImageFetcher::with_timeout(Duration::from_secs(15)).is_ok());
    }

    #[test]
    fn data_uri_without_comma_is_rejected() {
        assert!(decode_data_uri("data:image/png;base64").is_err());
    }

    #[test]
    fn image_sources_are_unique_and_non_empty() {
        let root = Element::new("div")
            .with_child(Element::new("img").with_attr("src", "a.png"))
            .with_child(Element::new("img").with_attr("src", ""))
            .with_child(Element::new("p").with_child(Element::new("img").with_attr("src", "a.png")))
            .with_child(Element::new("img").with_attr("src", "b.png"));
        assert_eq!(image_sources(&root), vec!["a.png", "b.png"]);
    }

    #[test]
    fn deferred_source_is_promoted() {
        let mut root = Element::new("div")
            .with_child(Element::new("img").with_attr("data-src", "lazy.png"))
            .with_child(
                Element::new("img")
                    .with_attr("src", "real.png")
                    .with_attr("data-src", "other.png"),
            );
        promote_deferred_sources(&mut root);
        assert_eq!(image_sources(&root), vec!["lazy.png", "real.png"]);
    }
}
