//! Tile pyramid math for the two global addressing profiles.
//!
//! Implements the Tile Map Service (TMS) global profiles:
//! - `GlobalMercator` (EPSG:3857) for Google/Bing/OSM compatible tiles
//! - `GlobalGeodetic` (EPSG:4326, plate-carrée) for Earth-viewer overlays
//!
//! Pixel and tile coordinates are in TMS notation (origin bottom-left).

pub mod geodetic;
pub mod grid;
pub mod mercator;

pub use geodetic::GlobalGeodetic;
pub use grid::{TileGridTable, TileRange};
pub use mercator::GlobalMercator;

/// Tile edge length in pixels, fixed across both profiles.
pub const TILE_SIZE: u32 = 256;

/// Shared pixel→tile bucketing: the tile covering a pixel coordinate.
pub(crate) fn pixels_to_tile(px: f64, py: f64, tile_size: f64) -> (i64, i64) {
    let tx = (px / tile_size).ceil() as i64 - 1;
    let ty = (py / tile_size).ceil() as i64 - 1;
    (tx, ty)
}
