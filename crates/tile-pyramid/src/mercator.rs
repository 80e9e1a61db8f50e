//! TMS Global Mercator profile (EPSG:3857).
//!
//! Conversions between WGS84 lat/lon, spherical Mercator meters, pyramid
//! pixels, and TMS tile indices. The world extent is a square of
//! ±20037508.342789244 m (π · R for R = 6378137), covered by a single
//! 256×256 tile at zoom 0.

use std::f64::consts::PI;

use tile_common::bbox::{GeoBox, LatLonBounds};
use tile_common::tile::MAX_ZOOM;

use crate::TILE_SIZE;

/// WGS84 spherical radius in meters.
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Spherical Mercator tile pyramid.
#[derive(Debug, Clone, Copy)]
pub struct GlobalMercator {
    tile_size: f64,
    initial_resolution: f64,
    origin_shift: f64,
}

impl Default for GlobalMercator {
    fn default() -> Self {
        Self::new(TILE_SIZE)
    }
}

impl GlobalMercator {
    pub fn new(tile_size: u32) -> Self {
        let tile_size = tile_size as f64;
        Self {
            tile_size,
            // 156543.03392804062 for a 256 px tile
            initial_resolution: 2.0 * PI * EARTH_RADIUS / tile_size,
            // 20037508.342789244
            origin_shift: PI * EARTH_RADIUS,
        }
    }

    /// Convert WGS84 lat/lon to XY meters in spherical Mercator.
    pub fn lat_lon_to_meters(&self, lat: f64, lon: f64) -> (f64, f64) {
        let mx = lon * self.origin_shift / 180.0;
        let my = ((90.0 + lat) * PI / 360.0).tan().ln() / (PI / 180.0);
        (mx, my * self.origin_shift / 180.0)
    }

    /// Convert XY meters in spherical Mercator to WGS84 lat/lon.
    pub fn meters_to_lat_lon(&self, mx: f64, my: f64) -> (f64, f64) {
        let lon = (mx / self.origin_shift) * 180.0;
        let lat = (my / self.origin_shift) * 180.0;
        let lat = 180.0 / PI * (2.0 * (lat * PI / 180.0).exp().atan() - PI / 2.0);
        (lat, lon)
    }

    /// Resolution (meters/pixel) at a zoom level, measured at the equator.
    pub fn resolution(&self, zoom: u32) -> f64 {
        self.initial_resolution / (1u64 << zoom) as f64
    }

    /// Convert pyramid pixel coordinates at a zoom level to meters.
    pub fn pixels_to_meters(&self, px: f64, py: f64, zoom: u32) -> (f64, f64) {
        let res = self.resolution(zoom);
        (px * res - self.origin_shift, py * res - self.origin_shift)
    }

    /// Convert meters to pyramid pixel coordinates at a zoom level.
    pub fn meters_to_pixels(&self, mx: f64, my: f64, zoom: u32) -> (f64, f64) {
        let res = self.resolution(zoom);
        (
            (mx + self.origin_shift) / res,
            (my + self.origin_shift) / res,
        )
    }

    /// The tile covering the given pixel coordinates.
    pub fn pixels_to_tile(&self, px: f64, py: f64) -> (i64, i64) {
        crate::pixels_to_tile(px, py, self.tile_size)
    }

    /// The tile covering the given Mercator coordinates.
    pub fn meters_to_tile(&self, mx: f64, my: f64, zoom: u32) -> (i64, i64) {
        let (px, py) = self.meters_to_pixels(mx, my, zoom);
        self.pixels_to_tile(px, py)
    }

    /// Bounds of a tile in EPSG:3857 meters.
    pub fn tile_bounds(&self, tx: u32, ty: u32, zoom: u32) -> GeoBox {
        let (min_x, min_y) = self.pixels_to_meters(
            tx as f64 * self.tile_size,
            ty as f64 * self.tile_size,
            zoom,
        );
        let (max_x, max_y) = self.pixels_to_meters(
            (tx as f64 + 1.0) * self.tile_size,
            (ty as f64 + 1.0) * self.tile_size,
            zoom,
        );
        GeoBox::new(min_x, min_y, max_x, max_y)
    }

    /// Bounds of a tile in WGS84 lat/lon, SWNE order.
    pub fn tile_lat_lon_bounds(&self, tx: u32, ty: u32, zoom: u32) -> LatLonBounds {
        let bounds = self.tile_bounds(tx, ty, zoom);
        let (south, west) = self.meters_to_lat_lon(bounds.min_x, bounds.min_y);
        let (north, east) = self.meters_to_lat_lon(bounds.max_x, bounds.max_y);
        LatLonBounds::new(south, west, north, east)
    }

    /// The coarsest zoom whose native pixel size is still finer than
    /// `pixel_size`. Never scales up: zoom 0 is the floor, and a pixel size
    /// finer than every level yields the deepest zoom.
    pub fn zoom_for_pixel_size(&self, pixel_size: f64) -> u32 {
        for zoom in 0..=MAX_ZOOM {
            if pixel_size > self.resolution(zoom) {
                return zoom.saturating_sub(1);
            }
        }
        MAX_ZOOM
    }
}
