mod logger;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use notecraft_export::{
    ExportConfig, ExportPipeline, ExportSession, HttpTokenRefresher, PageSettings, TokenStore,
    UploadStatus, parse_fragment,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "notecraft", about = "NoteCraft PDF export", version)]
struct Cli {
    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export an HTML note to PDF and upload it
    Export {
        /// Input HTML file (rendered note content)
        #[arg(short, long)]
        input: PathBuf,

        /// Document name used for the output filename (defaults to the input file stem)
        #[arg(short, long)]
        name: Option<String>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        settings: SettingsArgs,

        /// Directory the PDF is written to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// NoteCraft server base URL
        #[arg(long)]
        server: Option<String>,

        /// Bearer token for the upload
        #[arg(long, env = "NOTECRAFT_ACCESS_TOKEN", hide_env_values = true)]
        access_token: Option<String>,

        /// Refresh token used when the access token has expired
        #[arg(long, env = "NOTECRAFT_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: Option<String>,

        /// Write the PDF locally without uploading it
        #[arg(long)]
        no_upload: bool,
    },

    /// Show page statistics without generating a PDF
    Pages {
        /// Input HTML file
        #[arg(short, long)]
        input: PathBuf,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Write a default configuration file
    Config {
        /// Output JSON file
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Overrides for the configured page settings
#[derive(Args)]
struct SettingsArgs {
    /// Line-height multiplier for body text
    #[arg(long)]
    line_spacing: Option<f32>,

    /// Body font size in points
    #[arg(long)]
    font_size: Option<u32>,

    /// Page margin in mm (uniform on all sides)
    #[arg(long)]
    margins: Option<f32>,

    /// Don't start a new page before each major heading
    #[arg(long)]
    no_page_breaks: bool,

    /// Don't print "Page X of N" captions
    #[arg(long)]
    no_page_numbers: bool,
}

impl SettingsArgs {
    fn apply(&self, settings: &mut PageSettings) {
        if let Some(line_spacing) = self.line_spacing {
            settings.line_spacing = line_spacing;
        }
        if let Some(font_size) = self.font_size {
            settings.font_size = font_size;
        }
        if let Some(margins) = self.margins {
            settings.margins = margins;
        }
        if self.no_page_breaks {
            settings.page_breaks = false;
        }
        if self.no_page_numbers {
            settings.show_page_numbers = false;
        }
    }
}

async fn load_config(path: Option<&Path>) -> Result<ExportConfig> {
    match path {
        Some(path) => ExportConfig::load(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(ExportConfig::default()),
    }
}

async fn load_note(input: &Path) -> Result<notecraft_export::Element> {
    let html = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    Ok(parse_fragment(&html)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::CliLogger::new(logger::CliLogger::level_for(cli.verbose)).init()?;

    match cli.command {
        Commands::Export {
            input,
            name,
            config,
            settings,
            output_dir,
            server,
            access_token,
            refresh_token,
            no_upload,
        } => {
            let mut config = load_config(config.as_deref()).await?;
            settings.apply(&mut config.page_settings);
            if let Some(output_dir) = output_dir {
                config.output_dir = output_dir;
            }
            if let Some(server) = server {
                config.server_url = server;
            }
            if no_upload {
                config.upload = false;
            }

            let source = load_note(&input).await?;
            let name = name.unwrap_or_else(|| {
                input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });

            let store = Arc::new(TokenStore::new(access_token, refresh_token));
            if config.upload && store.access().is_none() {
                log::warn!("No access token given; the upload will be rejected");
            }
            let refresher = HttpTokenRefresher::for_server(&config.server_url, store.clone());
            let pipeline = ExportPipeline::from_config(config.clone(), store)?;
            let session = ExportSession::new();

            let outcome = pipeline
                .export_to_pdf(&session, &source, &config.page_settings, &refresher, &name)
                .await?;
            match outcome {
                Some(outcome) => {
                    println!(
                        "Exported {} pages → {}",
                        outcome.page_count,
                        outcome.path.display()
                    );
                    match outcome.upload {
                        UploadStatus::Uploaded => println!("Uploaded {}", outcome.filename),
                        UploadStatus::Disabled => {}
                        UploadStatus::Failed(reason) => println!("Upload failed: {}", reason),
                    }
                }
                None => println!("An export is already in progress"),
            }
        }

        Commands::Pages {
            input,
            config,
            settings,
        } => {
            let mut config = load_config(config.as_deref()).await?;
            settings.apply(&mut config.page_settings);
            config.upload = false;

            let source = load_note(&input).await?;
            let pipeline = ExportPipeline::from_config(config.clone(), Arc::new(TokenStore::default()))?;
            let geometry = pipeline.measure_pages(&source, &config.page_settings).await?;

            println!("Page Statistics:");
            println!(
                "  Content size: {} x {:.0} px",
                notecraft_export::constants::REFERENCE_WIDTH_PX,
                geometry.content_height_px
            );
            println!("  Scale: {:.4} mm/px", geometry.scale);
            println!(
                "  Printable area: {:.1} x {:.1} mm",
                geometry.usable_width_mm, geometry.usable_height_mm
            );
            println!("  Content height: {:.1} mm", geometry.scaled_content_height_mm());
            println!("  Pages: {}", geometry.total_pages);
        }

        Commands::Config { output } => {
            ExportConfig::default().save(&output).await?;
            println!("Wrote default configuration → {}", output.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_flags_override_config() {
        let cli = Cli::parse_from([
            "notecraft",
            "pages",
            "--input",
            "note.html",
            "--font-size",
            "14",
            "--no-page-numbers",
        ]);
        let Commands::Pages { settings, .. } = cli.command else {
            panic!("expected pages command");
        };
        let mut page_settings = PageSettings::default();
        settings.apply(&mut page_settings);
        assert_eq!(page_settings.font_size, 14);
        assert!(!page_settings.show_page_numbers);
        assert!(page_settings.page_breaks);
        assert_eq!(page_settings.margins, 15.0);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
