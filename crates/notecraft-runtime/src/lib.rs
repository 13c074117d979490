mod worker;

pub use worker::{ExportWorker, worker_task};

// Re-export types from library crates
pub use notecraft_export::{Element, ExportOutcome, ExportProgress, ExportStage, PageSettings};

/// Identifies one export request in the updates it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

/// Commands sent from UI to worker
#[derive(Debug)]
pub enum ExportCommand {
    Export {
        request_id: RequestId,
        source: Element,
        settings: PageSettings,
        document_name: String,
    },
    /// Forget which images have already been routed through the proxy
    ClearRewriteCache,
}

/// Updates sent from worker to UI
#[derive(Debug, Clone)]
pub enum ExportUpdate {
    Progress {
        request_id: RequestId,
        progress: ExportProgress,
    },
    Complete {
        request_id: RequestId,
        outcome: ExportOutcome,
    },
    /// Another export was still running; nothing was produced
    Skipped {
        request_id: RequestId,
    },
    Error {
        request_id: RequestId,
        message: String,
    },
    CacheCleared,
}
