//! Request protocol for the lazily-expanding overlay tree.
//!
//! Parses inbound request parameters into a validated configuration,
//! classifies how each tile's image reference resolves (direct upstream
//! link, placeholder, or dynamic compositing), expands one level of the
//! level-of-detail tree, and renders it as a KML document.

pub mod config;
pub mod document;
pub mod kml;
pub mod router;

pub use config::{RawParams, ResampleMode, TileRequest, TileRequestConfig};
pub use document::{expand, ChildLink, TreeNode};
pub use kml::render_document;
pub use router::{
    classify_image_source, substitute_address_tokens, Endpoints, ImageReference, LinkProber,
    NoProbe, RandomServerPart, SequentialServerPart, ServerPartPicker, DYNAMIC_ZOOM_THRESHOLD,
};
