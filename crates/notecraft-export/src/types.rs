use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Cannot prepare content: {0}")]
    Preparation(String),
    #[error("Image load timed out after {0:?}")]
    ImageTimeout(std::time::Duration),
    #[error("Rasterization failed: {0}")]
    Raster(String),
    #[error("Session expired. Please login again.")]
    SessionExpired,
    #[error("Upload rejected with HTTP status {0}")]
    UploadStatus(u16),
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// User-facing layout settings for one export.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PageSettings {
    /// Line-height multiplier for body text
    pub line_spacing: f32,
    /// Force a page break before every `h1`/`h2` after the first
    pub page_breaks: bool,
    /// Body font size in points
    pub font_size: u32,
    /// Uniform page margin in millimeters
    pub margins: f32,
    /// Draw a "Page X of N" caption at the bottom of each page
    pub show_page_numbers: bool,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            line_spacing: 1.5,
            page_breaks: true,
            font_size: 12,
            margins: 15.0,
            show_page_numbers: true,
        }
    }
}

impl PageSettings {
    /// Validate the settings against a page format
    pub fn validate(&self, format: PageFormat) -> Result<()> {
        if !(self.line_spacing.is_finite() && self.line_spacing > 0.0) {
            return Err(ExportError::Config(format!(
                "Line spacing must be positive, got {}",
                self.line_spacing
            )));
        }

        if self.font_size == 0 {
            return Err(ExportError::Config(
                "Font size must be at least 1pt".to_string(),
            ));
        }

        if !(self.margins.is_finite() && self.margins >= 0.0) {
            return Err(ExportError::Config(format!(
                "Margins must be non-negative, got {}",
                self.margins
            )));
        }

        let printable = format.width_mm.min(format.height_mm) - 2.0 * self.margins;
        if printable <= 0.0 {
            return Err(ExportError::Config(format!(
                "Margins of {}mm leave no printable area on a {}x{}mm page",
                self.margins, format.width_mm, format.height_mm
            )));
        }

        Ok(())
    }
}

/// Output page format in millimeters (portrait)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFormat {
    pub width_mm: f32,
    pub height_mm: f32,
}

impl PageFormat {
    pub const A4: PageFormat = PageFormat {
        width_mm: 210.0,
        height_mm: 297.0,
    };
}

impl Default for PageFormat {
    fn default() -> Self {
        Self::A4
    }
}

/// Where the rewrite cache lives between exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CacheScope {
    /// Entries persist for the lifetime of the `ExportSession`
    #[default]
    Session,
    /// Entries are cleared at the start of every export
    PerExport,
}

/// Result of the server upload that follows local delivery
#[derive(Debug, Clone, PartialEq)]
pub enum UploadStatus {
    Uploaded,
    /// Upload was turned off in the configuration
    Disabled,
    Failed(String),
}

/// Summary of a finished export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutcome {
    pub filename: String,
    pub path: std::path::PathBuf,
    pub page_count: usize,
    pub upload: UploadStatus,
}
