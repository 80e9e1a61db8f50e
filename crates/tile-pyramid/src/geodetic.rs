//! TMS Global Geodetic profile (EPSG:4326, plate-carrée).
//!
//! Latitude/longitude are used directly as planar coordinates, so only
//! scaling to the pixel pyramid and cutting to tiles is needed. The pyramid
//! has two tiles at its top level: the area [-180,-90,180,90] maps onto a
//! 512×256 pixel plane at zoom 0.

use tile_common::bbox::{GeoBox, LatLonBounds};
use tile_common::tile::MAX_ZOOM;

use crate::TILE_SIZE;

/// Plate-carrée tile pyramid.
#[derive(Debug, Clone, Copy)]
pub struct GlobalGeodetic {
    tile_size: f64,
}

impl Default for GlobalGeodetic {
    fn default() -> Self {
        Self::new(TILE_SIZE)
    }
}

impl GlobalGeodetic {
    pub fn new(tile_size: u32) -> Self {
        Self {
            tile_size: tile_size as f64,
        }
    }

    /// Resolution (degrees/pixel) at a zoom level.
    pub fn resolution(&self, zoom: u32) -> f64 {
        180.0 / self.tile_size / (1u64 << zoom) as f64
    }

    /// Convert lat/lon to pixel coordinates at a zoom level.
    pub fn lat_lon_to_pixels(&self, lat: f64, lon: f64, zoom: u32) -> (f64, f64) {
        let res = self.resolution(zoom);
        ((180.0 + lon) / res, (90.0 + lat) / res)
    }

    /// Convert pixel coordinates at a zoom level back to lat/lon.
    pub fn pixels_to_lat_lon(&self, px: f64, py: f64, zoom: u32) -> (f64, f64) {
        let res = self.resolution(zoom);
        (py * res - 90.0, px * res - 180.0)
    }

    /// The tile covering the given pixel coordinates.
    pub fn pixels_to_tile(&self, px: f64, py: f64) -> (i64, i64) {
        crate::pixels_to_tile(px, py, self.tile_size)
    }

    /// The tile covering the given lat/lon at a zoom level.
    pub fn lat_lon_to_tile(&self, lat: f64, lon: f64, zoom: u32) -> (i64, i64) {
        let (px, py) = self.lat_lon_to_pixels(lat, lon, zoom);
        self.pixels_to_tile(px, py)
    }

    /// Bounds of a tile in degrees.
    pub fn tile_bounds(&self, tx: u32, ty: u32, zoom: u32) -> GeoBox {
        let res = self.resolution(zoom);
        GeoBox::new(
            tx as f64 * self.tile_size * res - 180.0,
            ty as f64 * self.tile_size * res - 90.0,
            (tx as f64 + 1.0) * self.tile_size * res - 180.0,
            (ty as f64 + 1.0) * self.tile_size * res - 90.0,
        )
    }

    /// Bounds of a tile in SWNE order.
    pub fn tile_lat_lon_bounds(&self, tx: u32, ty: u32, zoom: u32) -> LatLonBounds {
        let b = self.tile_bounds(tx, ty, zoom);
        LatLonBounds::new(b.min_y, b.min_x, b.max_y, b.max_x)
    }

    /// The coarsest zoom whose native pixel size is still finer than
    /// `pixel_size`; same selection rule as the Mercator profile.
    pub fn zoom_for_pixel_size(&self, pixel_size: f64) -> u32 {
        for zoom in 0..=MAX_ZOOM {
            if pixel_size > self.resolution(zoom) {
                return zoom.saturating_sub(1);
            }
        }
        MAX_ZOOM
    }
}
