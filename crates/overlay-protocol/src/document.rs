//! One-level expansion of the lazily-expanding LOD tree.
//!
//! Each response describes a single node: its visibility region, its image
//! reference, and links to the children the viewer may request next. Deeper
//! levels are fetched on demand by the viewer re-entering with an updated
//! address, never by server-side recursion.

use tile_common::bbox::LatLonBounds;
use tile_common::TileAddress;
use tile_pyramid::{TileGridTable, TILE_SIZE};

use crate::config::TileRequestConfig;

/// LOD thresholds: draw from half a tile of screen coverage upward.
const MIN_LOD_PIXELS: i32 = TILE_SIZE as i32 / 2;

/// Sentinel meaning "no cutoff" in a LOD pixel range.
const LOD_UNBOUNDED: i32 = -1;

/// A link to a child tile the viewer can expand on demand.
#[derive(Debug, Clone)]
pub struct ChildLink {
    pub address: TileAddress,
    pub bounds: LatLonBounds,
    /// Matches the parent's own threshold so the child region activates
    /// exactly when the parent tile is outgrown.
    pub min_lod_pixels: i32,
}

/// One expanded node of the LOD tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// None for the synthetic root, which has no tile of its own.
    pub address: Option<TileAddress>,
    /// Visibility region; None for the root (world-spanning).
    pub bounds: Option<LatLonBounds>,
    pub min_lod_pixels: i32,
    pub max_lod_pixels: i32,
    pub draw_order: u32,
    pub children: Vec<ChildLink>,
}

impl TreeNode {
    pub fn is_root(&self) -> bool {
        self.address.is_none()
    }
}

/// Expand one node of the tree.
///
/// The root (no address) carries no image and no region; its children are
/// the full set of tiles at the configured minimum zoom that intersect the
/// requested bounds. A tile node carries its own region and image, and up
/// to four child quadrants clipped to the covering rectangle at zoom + 1.
pub fn expand(
    address: Option<TileAddress>,
    config: &TileRequestConfig,
    grid: &TileGridTable,
) -> TreeNode {
    let child_addresses = match &address {
        None => grid.top_level_tiles(config.zoom.min),
        Some(addr) => grid.children_of(addr, config.zoom.max),
    };

    let (bounds, draw_order) = match &address {
        None => (None, 0),
        Some(addr) => {
            // Tiles in the first column get an odd draw order so layering at
            // the antimeridian is deterministic.
            let draw_order = if addr.x == 0 {
                2 * addr.z + 1
            } else {
                2 * addr.z
            };
            (Some(grid.tile_lat_lon_bounds(addr)), draw_order)
        }
    };

    // The root counts as minimum-zoom when the pyramid starts at zoom 0, so
    // its child links activate immediately.
    let at_min_zoom = address.map_or(config.zoom.min == 0, |addr| addr.z == config.zoom.min);
    let min_lod_pixels = if at_min_zoom {
        // Top-of-pyramid tiles always draw; there is nothing coarser to
        // fall back to.
        LOD_UNBOUNDED
    } else {
        MIN_LOD_PIXELS
    };

    let max_lod_pixels = if child_addresses.is_empty() {
        // Leaf: no further detail exists, never switch away.
        LOD_UNBOUNDED
    } else if config.single_level {
        TILE_SIZE as i32
    } else {
        LOD_UNBOUNDED
    };

    let children = child_addresses
        .into_iter()
        .map(|child| ChildLink {
            bounds: grid.tile_lat_lon_bounds(&child),
            address: child,
            min_lod_pixels,
        })
        .collect();

    TreeNode {
        address,
        bounds,
        min_lod_pixels,
        max_lod_pixels,
        draw_order,
        children,
    }
}
