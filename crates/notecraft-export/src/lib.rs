pub mod auth;
pub mod constants;
pub mod dom;
mod export;
mod filename;
pub mod fonts;
pub mod images;
pub mod layout;
mod options;
pub mod paginate;
pub mod prepare;
pub mod raster;
pub mod render;
mod session;
mod types;
pub mod upload;

pub use auth::{HttpTokenRefresher, TokenStore};
pub use dom::{Element, Node, parse_fragment};
pub use export::{ExportPipeline, ExportProgress, ExportStage, NoProgress, ProgressSink};
pub use filename::{export_filename, export_filename_today, sanitize_document_name};
pub use images::{ImageFetcher, ImageSet, wait_for_images, wait_for_images_within};
pub use options::*;
pub use paginate::{PageGeometry, SliceWindow};
pub use prepare::{PreparedDocument, prepare_for_export};
pub use raster::{HtmlRasterizer, RasterSurface, Rasterizer};
pub use session::*;
pub use types::*;
pub use upload::{CredentialSource, TokenRefresher, UploadRequest, UploadTransport, Uploader};
