use crate::{ExportCommand, ExportUpdate, RequestId};
use notecraft_export::{
    Element, ExportPipeline, ExportProgress, ExportSession, PageSettings, ProgressSink,
    TokenRefresher,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Everything an export task needs, shared across requests
#[derive(Clone)]
pub struct ExportWorker {
    pipeline: Arc<ExportPipeline>,
    session: Arc<ExportSession>,
    refresher: Arc<dyn TokenRefresher>,
}

impl ExportWorker {
    pub fn new(
        pipeline: Arc<ExportPipeline>,
        session: Arc<ExportSession>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            pipeline,
            session,
            refresher,
        }
    }

    pub fn session(&self) -> &Arc<ExportSession> {
        &self.session
    }
}

/// Forwards pipeline progress as updates
struct ChannelProgress {
    request_id: RequestId,
    update_tx: mpsc::UnboundedSender<ExportUpdate>,
}

impl ProgressSink for ChannelProgress {
    fn report(&self, progress: ExportProgress) {
        let _ = self.update_tx.send(ExportUpdate::Progress {
            request_id: self.request_id,
            progress,
        });
    }
}

/// Async worker task that processes export commands and sends updates.
///
/// Each export runs as its own task, so a request arriving while another is
/// in flight reaches the session gate and comes back as `Skipped`. Returns
/// once the command channel closes and every started export has finished.
pub async fn worker_task(
    worker: ExportWorker,
    mut command_rx: mpsc::UnboundedReceiver<ExportCommand>,
    update_tx: mpsc::UnboundedSender<ExportUpdate>,
) {
    let mut exports = JoinSet::new();

    while let Some(cmd) = command_rx.recv().await {
        match cmd {
            ExportCommand::Export {
                request_id,
                source,
                settings,
                document_name,
            } => {
                exports.spawn(handle_export(
                    worker.clone(),
                    request_id,
                    source,
                    settings,
                    document_name,
                    update_tx.clone(),
                ));
            }
            ExportCommand::ClearRewriteCache => {
                let cleared = worker.session.rewrite_cache().len();
                worker.session.rewrite_cache().clear();
                log::debug!("Cleared {cleared} rewrite cache entries");
                let _ = update_tx.send(ExportUpdate::CacheCleared);
            }
        }

        // Reap finished exports without waiting
        while let Some(joined) = exports.try_join_next() {
            if let Err(e) = joined {
                log::error!("Export task failed: {e}");
            }
        }
    }

    while let Some(joined) = exports.join_next().await {
        if let Err(e) = joined {
            log::error!("Export task failed: {e}");
        }
    }
}

async fn handle_export(
    worker: ExportWorker,
    request_id: RequestId,
    source: Element,
    settings: PageSettings,
    document_name: String,
    update_tx: mpsc::UnboundedSender<ExportUpdate>,
) {
    let progress = Arc::new(ChannelProgress {
        request_id,
        update_tx: update_tx.clone(),
    });

    let result = worker
        .pipeline
        .export_with_progress(
            &worker.session,
            &source,
            &settings,
            worker.refresher.as_ref(),
            &document_name,
            progress,
        )
        .await;

    let update = match result {
        Ok(Some(outcome)) => ExportUpdate::Complete {
            request_id,
            outcome,
        },
        Ok(None) => ExportUpdate::Skipped { request_id },
        Err(e) => ExportUpdate::Error {
            request_id,
            message: format!("Failed to export PDF: {}", e),
        },
    };
    let _ = update_tx.send(update);
}
