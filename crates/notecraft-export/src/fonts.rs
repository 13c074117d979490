//! Font lookup and text measurement

use crate::constants::HELVETICA_CHAR_WIDTH_RATIO;
use crate::types::{ExportError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Regular-weight candidates, closest to Helvetica first
const REGULAR_CANDIDATES: &[&str] = &[
    "Helvetica.ttc",
    "Arial.ttf",
    "arial.ttf",
    "LiberationSans-Regular.ttf",
    "NimbusSans-Regular.otf",
    "DejaVuSans.ttf",
    "NotoSans-Regular.ttf",
];

const BOLD_CANDIDATES: &[&str] = &[
    "Arial Bold.ttf",
    "arialbd.ttf",
    "LiberationSans-Bold.ttf",
    "NimbusSans-Bold.otf",
    "DejaVuSans-Bold.ttf",
    "NotoSans-Bold.ttf",
];

/// How deep to descend into font directories
const MAX_SCAN_DEPTH: usize = 4;

/// Vertical metrics for one font size, in the caller's units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    pub ascent: f32,
    pub descent: f32,
}

/// Regular and bold font data used for layout and painting.
///
/// Without font data, measurement falls back to an average-advance estimate
/// and painting skips text.
#[derive(Debug, Clone, Default)]
pub struct FontBook {
    regular: Option<Arc<Vec<u8>>>,
    bold: Option<Arc<Vec<u8>>>,
}

impl FontBook {
    /// A font book without any faces
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_bytes(regular: Vec<u8>, bold: Option<Vec<u8>>) -> Result<Self> {
        validate_face(&regular)?;
        if let Some(bold) = &bold {
            validate_face(bold)?;
        }
        Ok(Self {
            regular: Some(Arc::new(regular)),
            bold: bold.map(Arc::new),
        })
    }

    /// Load the given font files, falling back to a system lookup for
    /// whichever is not given
    pub fn load(regular: Option<&Path>, bold: Option<&Path>) -> Result<Self> {
        let system = if regular.is_none() || bold.is_none() {
            Self::system()
        } else {
            Self::empty()
        };

        let regular = match regular {
            Some(path) => Some(read_face(path)?),
            None => system.regular,
        };
        let bold = match bold {
            Some(path) => Some(read_face(path)?),
            None => system.bold,
        };

        Ok(Self { regular, bold })
    }

    /// Look up a Helvetica-like face in the platform font directories
    pub fn system() -> Self {
        let dirs = system_font_dirs();
        let regular = find_font(&dirs, REGULAR_CANDIDATES);
        let bold = find_font(&dirs, BOLD_CANDIDATES);
        if regular.is_none() {
            log::warn!("No system font found; text will be measured but not drawn");
        }
        Self { regular, bold }
    }

    pub fn has_faces(&self) -> bool {
        self.regular.is_some()
    }

    /// Face data for the requested weight; bold falls back to regular
    pub fn face_data(&self, bold: bool) -> Option<&[u8]> {
        let data = if bold {
            self.bold.as_ref().or(self.regular.as_ref())
        } else {
            self.regular.as_ref()
        };
        data.map(|d| d.as_slice())
    }

    /// Advance width of `text` at `size`
    pub fn measure(&self, text: &str, size: f32, bold: bool) -> f32 {
        let fallback = || text.chars().count() as f32 * size * HELVETICA_CHAR_WIDTH_RATIO;
        let Some(data) = self.face_data(bold) else {
            return fallback();
        };
        let Ok(face) = ttf_parser::Face::parse(data, 0) else {
            return fallback();
        };

        let scale = size / face.units_per_em() as f32;
        text.chars()
            .map(|ch| {
                face.glyph_index(ch)
                    .and_then(|g| face.glyph_hor_advance(g))
                    .map(|adv| adv as f32 * scale)
                    .unwrap_or(size * HELVETICA_CHAR_WIDTH_RATIO)
            })
            .sum()
    }

    pub fn line_metrics(&self, size: f32, bold: bool) -> LineMetrics {
        let face = self
            .face_data(bold)
            .and_then(|data| ttf_parser::Face::parse(data, 0).ok());
        match face {
            Some(face) => {
                let scale = size / face.units_per_em() as f32;
                LineMetrics {
                    ascent: face.ascender() as f32 * scale,
                    descent: -(face.descender() as f32) * scale,
                }
            }
            None => LineMetrics {
                ascent: size * 0.8,
                descent: size * 0.2,
            },
        }
    }
}

fn validate_face(data: &[u8]) -> Result<()> {
    ttf_parser::Face::parse(data, 0)
        .map(|_| ())
        .map_err(|e| ExportError::Config(format!("Unusable font data: {e}")))
}

fn read_face(path: &Path) -> Result<Arc<Vec<u8>>> {
    let bytes = std::fs::read(path)?;
    validate_face(&bytes)
        .map_err(|e| ExportError::Config(format!("{}: {e}", path.display())))?;
    Ok(Arc::new(bytes))
}

fn find_font(dirs: &[PathBuf], candidates: &[&str]) -> Option<Arc<Vec<u8>>> {
    for name in candidates {
        for dir in dirs {
            let Some(path) = find_file(dir, name, MAX_SCAN_DEPTH) else {
                continue;
            };
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            if ttf_parser::Face::parse(&bytes, 0).is_ok() {
                log::debug!("Using font {}", path.display());
                return Some(Arc::new(bytes));
            }
        }
    }
    None
}

fn find_file(dir: &Path, name: &str, depth: usize) -> Option<PathBuf> {
    let candidate = dir.join(name);
    if candidate.is_file() {
        return Some(candidate);
    }
    if depth == 0 {
        return None;
    }
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .find_map(|sub| find_file(&sub, name, depth - 1))
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    if let Ok(extra) = std::env::var("NOTECRAFT_FONT_DIR") {
        dirs.extend(std::env::split_paths(&extra).filter(|p| !p.as_os_str().is_empty()));
    }

    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_book_uses_average_advance() {
        let fonts = FontBook::empty();
        assert_eq!(fonts.measure("abcd", 10.0, false), 20.0);
        let metrics = fonts.line_metrics(10.0, true);
        assert_eq!(metrics.ascent, 8.0);
        assert_eq!(metrics.descent, 2.0);
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        assert!(FontBook::from_bytes(vec![0, 1, 2, 3], None).is_err());
    }
}
