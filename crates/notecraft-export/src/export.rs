//! The export pipeline: prepare, wait for images, rasterize, paginate,
//! deliver locally, upload

use crate::constants::{IMAGE_LOAD_TIMEOUT, REFERENCE_WIDTH_PX, SETTLE_DELAY, SUPERSAMPLE};
use crate::dom::Element;
use crate::filename::export_filename_today;
use crate::fonts::FontBook;
use crate::images::{HttpImageFetcher, ImageFetcher, wait_for_images};
use crate::layout::Viewport;
use crate::options::ExportConfig;
use crate::paginate::PageGeometry;
use crate::prepare::prepare_for_export;
use crate::raster::{HtmlRasterizer, Rasterizer};
use crate::render::render_pages;
use crate::session::{ExportSession, ImageRewriteCache};
use crate::types::*;
use crate::upload::{
    CredentialSource, HttpUploadTransport, TokenRefresher, UploadRequest, Uploader,
};
use std::fmt;
use std::sync::Arc;

/// Pipeline step being worked on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    WaitingForImages,
    Measuring,
    Rasterizing,
    WritingPages,
    Saving,
    Uploading,
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportStage::Preparing => "Preparing content",
            ExportStage::WaitingForImages => "Waiting for images",
            ExportStage::Measuring => "Measuring content",
            ExportStage::Rasterizing => "Rendering content",
            ExportStage::WritingPages => "Writing pages",
            ExportStage::Saving => "Saving PDF",
            ExportStage::Uploading => "Uploading PDF",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportProgress {
    Stage(ExportStage),
    /// Page `current` of `total` has been written
    Page { current: usize, total: usize },
}

/// Receives progress while an export runs. Called from blocking threads.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: ExportProgress);
}

/// Discards progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: ExportProgress) {}
}

/// Collaborators and configuration shared by every export
#[derive(Clone)]
pub struct ExportPipeline {
    config: ExportConfig,
    format: PageFormat,
    fetcher: Arc<dyn ImageFetcher>,
    rasterizer: Arc<dyn Rasterizer>,
    uploader: Option<Uploader>,
}

impl fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("config", &self.config)
            .field("format", &self.format)
            .field("upload", &self.uploader.is_some())
            .finish_non_exhaustive()
    }
}

impl ExportPipeline {
    pub fn new(
        config: ExportConfig,
        fetcher: Arc<dyn ImageFetcher>,
        rasterizer: Arc<dyn Rasterizer>,
        uploader: Option<Uploader>,
    ) -> Self {
        Self {
            config,
            format: PageFormat::A4,
            fetcher,
            rasterizer,
            uploader,
        }
    }

    /// Build a pipeline with HTTP collaborators and the configured fonts
    pub fn from_config(config: ExportConfig, credentials: Arc<dyn CredentialSource>) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::new();
        let fonts = FontBook::load(config.font_path.as_deref(), config.bold_font_path.as_deref())?;
        let uploader = config.upload.then(|| {
            let transport = HttpUploadTransport::new(client, &config.server_url);
            Uploader::new(Arc::new(transport), credentials)
        });

        Ok(Self::new(
            config,
            Arc::new(HttpImageFetcher::with_timeout(IMAGE_LOAD_TIMEOUT)?),
            Arc::new(HtmlRasterizer::new(fonts)),
            uploader,
        ))
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export `source` to a PDF in the output directory and upload it.
    ///
    /// Returns `Ok(None)` without doing anything when another export holds
    /// the session's gate. Upload failures are recorded in the outcome.
    pub async fn export_to_pdf(
        &self,
        session: &ExportSession,
        source: &Element,
        settings: &PageSettings,
        refresher: &dyn TokenRefresher,
        document_name: &str,
    ) -> Result<Option<ExportOutcome>> {
        self.export_with_progress(
            session,
            source,
            settings,
            refresher,
            document_name,
            Arc::new(NoProgress),
        )
        .await
    }

    /// `export_to_pdf` reporting stage and page progress to `progress`
    pub async fn export_with_progress(
        &self,
        session: &ExportSession,
        source: &Element,
        settings: &PageSettings,
        refresher: &dyn TokenRefresher,
        document_name: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<Option<ExportOutcome>> {
        let Some(_guard) = session.try_begin() else {
            log::warn!("PDF generation already in progress");
            return Ok(None);
        };

        if self.config.rewrite_cache_scope == CacheScope::PerExport {
            session.rewrite_cache().clear();
        }

        match self
            .run(session, source, settings, refresher, document_name, progress)
            .await
        {
            Ok(outcome) => {
                log::info!("PDF export completed successfully: {}", outcome.path.display());
                Ok(Some(outcome))
            }
            Err(e) => {
                log::error!("Error generating PDF: {e}");
                Err(e)
            }
        }
    }

    /// Page statistics for `source` without producing a document
    pub async fn measure_pages(&self, source: &Element, settings: &PageSettings) -> Result<PageGeometry> {
        settings.validate(self.format)?;
        let cache = ImageRewriteCache::new();
        let mut doc = prepare_for_export(source, settings, &cache, &self.config.server_url)?;
        let images = wait_for_images(&mut doc, &self.fetcher).await;
        let viewport = self.viewport(settings)?;
        tokio::time::sleep(SETTLE_DELAY).await;
        let layout = self.rasterizer.mount(&doc, &images, &viewport)?;
        PageGeometry::new(self.format, settings, layout.width, layout.height, SUPERSAMPLE)
    }

    async fn run(
        &self,
        session: &ExportSession,
        source: &Element,
        settings: &PageSettings,
        refresher: &dyn TokenRefresher,
        document_name: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<ExportOutcome> {
        settings.validate(self.format)?;
        let filename = export_filename_today(document_name);
        log::info!("Starting PDF export: {filename}");

        progress.report(ExportProgress::Stage(ExportStage::Preparing));
        let mut doc = prepare_for_export(
            source,
            settings,
            session.rewrite_cache(),
            &self.config.server_url,
        )?;

        progress.report(ExportProgress::Stage(ExportStage::WaitingForImages));
        let images = wait_for_images(&mut doc, &self.fetcher).await;

        progress.report(ExportProgress::Stage(ExportStage::Measuring));
        let viewport = self.viewport(settings)?;
        tokio::time::sleep(SETTLE_DELAY).await;
        let layout = self.rasterizer.mount(&doc, &images, &viewport)?;
        let geometry =
            PageGeometry::new(self.format, settings, layout.width, layout.height, SUPERSAMPLE)?;
        log::debug!(
            "Content {}x{}px, scale {:.4}mm/px, {:.1}mm tall: {} pages",
            layout.width,
            layout.height,
            geometry.scale,
            geometry.scaled_content_height_mm(),
            geometry.total_pages
        );

        progress.report(ExportProgress::Stage(ExportStage::Rasterizing));
        let surface = self.rasterizer.rasterize(&layout, &images, SUPERSAMPLE).await?;
        drop(doc);
        drop(images);

        progress.report(ExportProgress::Stage(ExportStage::WritingPages));
        let show_page_numbers = settings.show_page_numbers;
        let page_progress = Arc::clone(&progress);
        let pdf = tokio::task::spawn_blocking(move || {
            render_pages(&surface, &geometry, show_page_numbers, |current, total| {
                log::debug!("Added page {current} of {total}");
                page_progress.report(ExportProgress::Page { current, total });
            })
        })
        .await??;

        progress.report(ExportProgress::Stage(ExportStage::Saving));
        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        let path = self.config.output_dir.join(&filename);
        tokio::fs::write(&path, &pdf.bytes).await?;
        log::info!("Saved {} ({} pages)", path.display(), pdf.page_count);

        let upload = match &self.uploader {
            Some(uploader) => {
                progress.report(ExportProgress::Stage(ExportStage::Uploading));
                let request = UploadRequest {
                    filename: filename.clone(),
                    bytes: pdf.bytes,
                };
                match uploader.upload(&request, refresher).await {
                    Ok(()) => UploadStatus::Uploaded,
                    Err(e) => {
                        log::error!("Error uploading PDF: {e}");
                        UploadStatus::Failed(e.to_string())
                    }
                }
            }
            None => UploadStatus::Disabled,
        };

        Ok(ExportOutcome {
            filename,
            path,
            page_count: pdf.page_count,
            upload,
        })
    }

    /// Off-screen mount at the reference width, banded by the page height
    fn viewport(&self, settings: &PageSettings) -> Result<Viewport> {
        let width_px = REFERENCE_WIDTH_PX as f32;
        let geometry = PageGeometry::new(self.format, settings, width_px, 0.0, SUPERSAMPLE)?;
        Ok(Viewport {
            width_px,
            page_band_px: Some(geometry.band_css_px()),
        })
    }
}
