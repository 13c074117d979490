use async_trait::async_trait;
use notecraft_export::fonts::FontBook;
use notecraft_export::*;
use notecraft_runtime::{ExportCommand, ExportUpdate, ExportWorker, RequestId, worker_task};
use std::sync::Arc;
use tokio::sync::mpsc;

struct NoImages;

#[async_trait]
impl ImageFetcher for NoImages {
    async fn fetch(&self, url: &str) -> notecraft_export::Result<Vec<u8>> {
        Err(ExportError::Raster(format!("offline: {url}")))
    }
}

struct NeverRefresh;

#[async_trait]
impl TokenRefresher for NeverRefresh {
    async fn refresh(&self) -> bool {
        false
    }
}

fn worker(output_dir: &std::path::Path) -> ExportWorker {
    let config = ExportConfig {
        output_dir: output_dir.to_path_buf(),
        upload: false,
        ..Default::default()
    };
    let pipeline = ExportPipeline::new(
        config,
        Arc::new(NoImages),
        Arc::new(HtmlRasterizer::new(FontBook::empty())),
        None,
    );
    ExportWorker::new(
        Arc::new(pipeline),
        Arc::new(ExportSession::new()),
        Arc::new(NeverRefresh),
    )
}

fn export(id: u64, source: Element) -> ExportCommand {
    ExportCommand::Export {
        request_id: RequestId(id),
        source,
        settings: PageSettings::default(),
        document_name: format!("Note {id}"),
    }
}

fn note() -> Element {
    Element::new("div")
        .with_child(Element::new("h1").with_text("Title"))
        .with_child(Element::new("img").with_attr("src", "https://x.io/a.png"))
        .with_child(Element::new("p").with_text("Body text"))
}

/// Run the worker over `commands` and collect every update it sends
async fn run(worker: ExportWorker, commands: Vec<ExportCommand>) -> Vec<ExportUpdate> {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (update_tx, mut update_rx) = mpsc::unbounded_channel();
    for cmd in commands {
        command_tx.send(cmd).unwrap();
    }
    drop(command_tx);

    worker_task(worker, command_rx, update_tx).await;

    let mut updates = Vec::new();
    while let Some(update) = update_rx.recv().await {
        updates.push(update);
    }
    updates
}

#[tokio::test(start_paused = true)]
async fn test_export_completes_with_progress() {
    let dir = tempfile::tempdir().unwrap();
    let updates = run(worker(dir.path()), vec![export(1, note())]).await;

    let progress = updates
        .iter()
        .filter(|u| matches!(u, ExportUpdate::Progress { request_id: RequestId(1), .. }))
        .count();
    assert!(progress >= 6);

    match updates.last() {
        Some(ExportUpdate::Complete {
            request_id,
            outcome,
        }) => {
            assert_eq!(*request_id, RequestId(1));
            assert_eq!(outcome.upload, UploadStatus::Disabled);
            assert_eq!(outcome.page_count, 1);
            assert!(outcome.path.exists());
        }
        other => panic!("expected Complete, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_export_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let updates = run(
        worker(dir.path()),
        vec![export(1, note()), export(2, note())],
    )
    .await;

    assert!(updates.iter().any(|u| matches!(
        u,
        ExportUpdate::Complete {
            request_id: RequestId(1),
            ..
        }
    )));
    assert!(updates
        .iter()
        .any(|u| matches!(u, ExportUpdate::Skipped { request_id: RequestId(2) })));
    assert!(!updates
        .iter()
        .any(|u| matches!(u, ExportUpdate::Progress { request_id: RequestId(2), .. })));
}

#[tokio::test(start_paused = true)]
async fn test_failed_export_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let updates = run(worker(dir.path()), vec![export(7, Element::new("div"))]).await;

    match updates.last() {
        Some(ExportUpdate::Error {
            request_id,
            message,
        }) => {
            assert_eq!(*request_id, RequestId(7));
            assert!(message.contains("source content is empty"));
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_clear_rewrite_cache() {
    let dir = tempfile::tempdir().unwrap();
    let worker = worker(dir.path());
    let session = worker.session().clone();

    let updates = run(worker.clone(), vec![export(1, note())]).await;
    assert!(matches!(updates.last(), Some(ExportUpdate::Complete { .. })));
    assert_eq!(session.rewrite_cache().len(), 1);

    let updates = run(worker, vec![ExportCommand::ClearRewriteCache]).await;
    assert!(matches!(updates.as_slice(), [ExportUpdate::CacheCleared]));
    assert!(session.rewrite_cache().is_empty());
}
