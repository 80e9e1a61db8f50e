//! Geographic bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::tile::Profile;

/// Latitude limit for Mercator requests. The forward projection diverges at
/// the poles, so request bounds stop just short of ±90°.
pub const MERCATOR_LAT_LIMIT: f64 = 89.9;

/// A geographic or projected bounding box.
///
/// For geodetic boxes coordinates are degrees; Mercator tile bounds use the
/// same shape with projected meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl GeoBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The whole-world request default: `-180_90_180_-89.9`.
    pub fn world() -> Self {
        GeoBox::new(-180.0, -MERCATOR_LAT_LIMIT, 180.0, 90.0)
    }

    /// Parse an `ulx_uly_lrx_lry` request string (upper-left / lower-right
    /// corners in degrees). Returns `None` on malformed input; callers fall
    /// back to the world box.
    pub fn from_ullr(s: &str) -> Option<GeoBox> {
        let parts: Vec<&str> = s.split('_').collect();
        if parts.len() != 4 {
            return None;
        }
        let ulx: f64 = parts[0].parse().ok()?;
        let uly: f64 = parts[1].parse().ok()?;
        let lrx: f64 = parts[2].parse().ok()?;
        let lry: f64 = parts[3].parse().ok()?;
        Some(GeoBox::new(ulx, lry, lrx, uly))
    }

    /// Serialize back to the `ulx_uly_lrx_lry` wire form.
    pub fn to_ullr(&self) -> String {
        format!("{}_{}_{}_{}", self.min_x, self.max_y, self.max_x, self.min_y)
    }

    /// Clamp to the world extents valid for a profile.
    pub fn clamped(&self, profile: Profile) -> GeoBox {
        let lat_limit = match profile {
            Profile::Mercator => MERCATOR_LAT_LIMIT,
            Profile::Geodetic => 90.0,
        };
        GeoBox {
            min_x: self.min_x.max(-180.0),
            min_y: self.min_y.max(-lat_limit),
            max_x: self.max_x.min(180.0),
            max_y: self.max_y.min(lat_limit),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn intersects(&self, other: &GeoBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    pub fn contains(&self, other: &GeoBox) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }
}

/// Tile bounds in latitude/longitude, in the SWNE order used for wire
/// output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLonBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl LatLonBounds {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    pub fn to_geobox(&self) -> GeoBox {
        GeoBox::new(self.west, self.south, self.east, self.north)
    }
}
