//! Per-zoom tile coverage of a geographic bounding box.

use tile_common::bbox::{GeoBox, LatLonBounds};
use tile_common::tile::{Profile, TileAddress, MAX_ZOOM};

use crate::{GlobalGeodetic, GlobalMercator};

/// Inclusive tile-index rectangle at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl TileRange {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Precomputed covering rectangles for every zoom level 0..=31.
///
/// Built once per request and immutable thereafter. Indices are clamped to
/// the profile's valid range, so tiles extending past the world limits are
/// cropped away.
#[derive(Debug, Clone)]
pub struct TileGridTable {
    profile: Profile,
    ranges: [TileRange; MAX_ZOOM as usize + 1],
}

impl TileGridTable {
    /// Compute the covering table for a bounding box in degrees.
    pub fn build(profile: Profile, bounds: &GeoBox) -> Self {
        let bounds = bounds.clamped(profile);
        let mut ranges = [TileRange {
            min_x: 0,
            min_y: 0,
            max_x: 0,
            max_y: 0,
        }; MAX_ZOOM as usize + 1];

        match profile {
            Profile::Mercator => {
                let mercator = GlobalMercator::default();
                let (min_mx, min_my) = mercator.lat_lon_to_meters(bounds.min_y, bounds.min_x);
                let (max_mx, max_my) = mercator.lat_lon_to_meters(bounds.max_y, bounds.max_x);
                for zoom in 0..=MAX_ZOOM {
                    let t_min = mercator.meters_to_tile(min_mx, min_my, zoom);
                    let t_max = mercator.meters_to_tile(max_mx, max_my, zoom);
                    ranges[zoom as usize] = clamp_range(profile, zoom, t_min, t_max);
                }
            }
            Profile::Geodetic => {
                let geodetic = GlobalGeodetic::default();
                for zoom in 0..=MAX_ZOOM {
                    let t_min = geodetic.lat_lon_to_tile(bounds.min_y, bounds.min_x, zoom);
                    let t_max = geodetic.lat_lon_to_tile(bounds.max_y, bounds.max_x, zoom);
                    ranges[zoom as usize] = clamp_range(profile, zoom, t_min, t_max);
                }
            }
        }

        Self { profile, ranges }
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn range_at(&self, zoom: u32) -> &TileRange {
        &self.ranges[zoom as usize]
    }

    /// All tiles at the configured minimum zoom that cover the request box,
    /// column-major.
    pub fn top_level_tiles(&self, min_zoom: u32) -> Vec<TileAddress> {
        let range = self.range_at(min_zoom);
        let mut tiles = Vec::new();
        for x in range.min_x..=range.max_x {
            for y in range.min_y..=range.max_y {
                tiles.push(TileAddress::new(min_zoom, x, y));
            }
        }
        tiles
    }

    /// The quadrant tiles of `address` at zoom + 1 that fall inside the
    /// covering rectangle. Empty once the maximum zoom is reached.
    pub fn children_of(&self, address: &TileAddress, max_zoom: u32) -> Vec<TileAddress> {
        if address.z >= max_zoom || address.z >= MAX_ZOOM {
            return Vec::new();
        }
        let range = self.range_at(address.z + 1);
        let mut children = Vec::new();
        // Quadrant indices in u64: 2x+1 can touch u32::MAX at the geodetic
        // pyramid's deepest level.
        let (cx, cy) = (2 * address.x as u64, 2 * address.y as u64);
        for y in cy..cy + 2 {
            for x in cx..cx + 2 {
                if range.contains(x as u32, y as u32) {
                    children.push(TileAddress::new(address.z + 1, x as u32, y as u32));
                }
            }
        }
        children
    }

    /// Geographic bounds of a tile under this table's profile, SWNE order.
    pub fn tile_lat_lon_bounds(&self, address: &TileAddress) -> LatLonBounds {
        match self.profile {
            Profile::Mercator => {
                GlobalMercator::default().tile_lat_lon_bounds(address.x, address.y, address.z)
            }
            Profile::Geodetic => {
                GlobalGeodetic::default().tile_lat_lon_bounds(address.x, address.y, address.z)
            }
        }
    }
}

fn clamp_range(profile: Profile, zoom: u32, t_min: (i64, i64), t_max: (i64, i64)) -> TileRange {
    let (max_x, max_y) = profile.max_index(zoom);
    TileRange {
        min_x: t_min.0.max(0) as u32,
        min_y: t_min.1.max(0) as u32,
        max_x: t_max.0.clamp(0, max_x as i64) as u32,
        max_y: t_max.1.clamp(0, max_y as i64) as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_coverage_mercator() {
        let table = TileGridTable::build(Profile::Mercator, &GeoBox::world());
        assert_eq!(
            *table.range_at(0),
            TileRange {
                min_x: 0,
                min_y: 0,
                max_x: 0,
                max_y: 0
            }
        );
        let range = table.range_at(3);
        assert_eq!((range.min_x, range.min_y), (0, 0));
        assert_eq!((range.max_x, range.max_y), (7, 7));
    }

    #[test]
    fn test_world_coverage_geodetic() {
        let table = TileGridTable::build(Profile::Geodetic, &GeoBox::world());
        let range = table.range_at(0);
        assert_eq!((range.min_x, range.max_x), (0, 1));
        assert_eq!((range.min_y, range.max_y), (0, 0));
        let range = table.range_at(2);
        assert_eq!((range.max_x, range.max_y), (7, 3));
    }

    #[test]
    fn test_indices_clamped_to_profile_range() {
        let table = TileGridTable::build(Profile::Geodetic, &GeoBox::world());
        for zoom in 0..=MAX_ZOOM {
            let range = table.range_at(zoom);
            let (max_x, max_y) = Profile::Geodetic.max_index(zoom);
            assert!((range.max_x as u64) <= max_x);
            assert!((range.max_y as u64) <= max_y);
        }
    }

    #[test]
    fn test_regional_box() {
        // Arizona-ish box should cover a single tile at low zooms and a
        // small rectangle deeper down.
        let bounds = GeoBox::new(-115.0, 31.0, -109.0, 37.0);
        let table = TileGridTable::build(Profile::Mercator, &bounds);
        let range = table.range_at(6);
        assert!(range.max_x >= range.min_x);
        assert!(range.max_x - range.min_x <= 2);
        // All of the covered tiles intersect the box.
        for x in range.min_x..=range.max_x {
            for y in range.min_y..=range.max_y {
                let tile_box = table
                    .tile_lat_lon_bounds(&TileAddress::new(6, x, y))
                    .to_geobox();
                assert!(tile_box.intersects(&bounds));
            }
        }
    }

    #[test]
    fn test_children_partition_parent() {
        let table = TileGridTable::build(Profile::Mercator, &GeoBox::world());
        let parent = TileAddress::new(3, 4, 5);
        let children = table.children_of(&parent, 31);
        assert_eq!(children.len(), 4);

        let parent_bounds = GlobalMercator::default().tile_bounds(parent.x, parent.y, parent.z);
        let mut area = 0.0;
        for child in &children {
            let child_bounds = GlobalMercator::default().tile_bounds(child.x, child.y, child.z);
            // Subset of the parent.
            assert!(child_bounds.min_x >= parent_bounds.min_x - 1e-6);
            assert!(child_bounds.max_x <= parent_bounds.max_x + 1e-6);
            assert!(child_bounds.min_y >= parent_bounds.min_y - 1e-6);
            assert!(child_bounds.max_y <= parent_bounds.max_y + 1e-6);
            area += child_bounds.width() * child_bounds.height();
        }
        // The four quadrants tile the parent exactly.
        let parent_area = parent_bounds.width() * parent_bounds.height();
        assert!((area - parent_area).abs() / parent_area < 1e-12);
    }

    #[test]
    fn test_children_stop_at_max_zoom() {
        let table = TileGridTable::build(Profile::Mercator, &GeoBox::world());
        assert!(table.children_of(&TileAddress::new(3, 0, 0), 3).is_empty());
        assert_eq!(table.children_of(&TileAddress::new(2, 0, 0), 3).len(), 4);
    }

    #[test]
    fn test_children_cropped_by_request_box() {
        // A box confined to the western hemisphere: the eastern children of
        // a tile straddling the cut line fall outside the covering table.
        let bounds = GeoBox::new(-180.0, -85.0, -90.0, 85.0);
        let table = TileGridTable::build(Profile::Mercator, &bounds);
        let children = table.children_of(&TileAddress::new(1, 0, 0), 31);
        let range = table.range_at(2);
        for child in &children {
            assert!(range.contains(child.x, child.y));
        }
        assert!(children.len() < 4);
    }
}
