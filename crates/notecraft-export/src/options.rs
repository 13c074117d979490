use crate::constants::DEFAULT_SERVER_URL;
use crate::types::*;
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Export configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExportConfig {
    // Backend
    /// Base URL of the NoteCraft server (image proxy, upload, token refresh)
    pub server_url: String,
    /// Upload the PDF after local delivery
    pub upload: bool,

    // Local delivery
    pub output_dir: PathBuf,

    // Fonts used for layout and painting; system lookup when unset
    pub font_path: Option<PathBuf>,
    pub bold_font_path: Option<PathBuf>,

    pub rewrite_cache_scope: CacheScope,

    pub page_settings: PageSettings,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            upload: true,
            output_dir: PathBuf::from("."),
            font_path: None,
            bold_font_path: None,
            rewrite_cache_scope: CacheScope::default(),
            page_settings: PageSettings::default(),
        }
    }
}

impl ExportConfig {
    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let config = serde_json::from_slice(&bytes)
            .map_err(|e| ExportError::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Save configuration to JSON file
    #[cfg(feature = "serde")]
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ExportError::Config(format!("Failed to serialize config: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let server = self.server_url.trim();
        if server.is_empty() {
            return Err(ExportError::Config("Server URL is empty".to_string()));
        }
        if !(server.starts_with("http://") || server.starts_with("https://")) {
            return Err(ExportError::Config(format!(
                "Server URL must use http or https: {}",
                self.server_url
            )));
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(ExportError::Config(
                "Output directory is empty".to_string(),
            ));
        }

        self.page_settings.validate(PageFormat::A4)
    }
}
