//! Shared constants for PDF export
//!
//! The timing and scaling values here feed the pagination math and must
//! stay fixed for output compatibility.

use std::time::Duration;

// =============================================================================
// Unit Conversion
// =============================================================================

/// Points per millimeter (1 inch = 72 points, 1 inch = 25.4mm)
pub const POINTS_PER_MM: f32 = 72.0 / 25.4; // ≈ 2.83465

/// CSS pixels per point (96 DPI reference)
pub const PX_PER_PT: f32 = 96.0 / 72.0;

/// Convert millimeters to points
#[inline]
pub fn mm_to_pt(mm: f32) -> f32 {
    mm * POINTS_PER_MM
}

/// Convert points to CSS pixels
#[inline]
pub fn pt_to_px(pt: f32) -> f32 {
    pt * PX_PER_PT
}

// =============================================================================
// Off-screen Mount
// =============================================================================

/// Width of the off-screen mount in CSS pixels (A4 width at 96 DPI)
pub const REFERENCE_WIDTH_PX: u32 = 794;

/// Delay between mounting the prepared content and measuring it
pub const SETTLE_DELAY: Duration = Duration::from_millis(1000);

// =============================================================================
// Rasterization
// =============================================================================

/// Raster pixels per CSS pixel
pub const SUPERSAMPLE: u32 = 2;

/// Upper bound on loading one image; slower loads count as failed
pub const IMAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(15);

/// Approximate character width ratio for Helvetica
pub const HELVETICA_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Line-height multiplier applied where the stylesheet sets none
pub const DEFAULT_LINE_HEIGHT: f32 = 1.2;

/// List indentation in CSS pixels
pub const LIST_INDENT_PX: f32 = 20.0;

// =============================================================================
// Page Numbers
// =============================================================================

/// Font size for the "Page X of N" caption (points)
pub const PAGE_NUMBER_FONT_SIZE: f32 = 9.0;

/// Caption baseline distance from the bottom page edge (mm)
pub const PAGE_NUMBER_OFFSET_MM: f32 = 5.0;

/// Caption gray level (0-255 on each channel)
pub const PAGE_NUMBER_GRAY: u8 = 100;

// =============================================================================
// Backend Endpoints
// =============================================================================

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

pub const PROXY_IMAGE_PATH: &str = "/proxy-image/";

pub const UPLOAD_PATH: &str = "/add_pdf/";

pub const TOKEN_REFRESH_PATH: &str = "/token/refresh/";

/// Fallback document name when none is given
pub const UNTITLED_DOCUMENT: &str = "Untitled-Document";
