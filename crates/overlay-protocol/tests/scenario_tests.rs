//! End-to-end document scenarios: parse → expand → classify → render.

use overlay_protocol::{
    classify_image_source, expand, render_document, Endpoints, ImageReference, NoProbe,
    RawParams, SequentialServerPart, TileRequest,
};
use tile_common::{Profile, TileAddress};
use tile_pyramid::TileGridTable;

fn endpoints() -> Endpoints {
    Endpoints::from_base("http://127.0.0.1:8080")
}

// ============================================================================
// Scenario: templated source, whole world, inferred Mercator profile
// ============================================================================

#[test]
fn test_root_document_single_top_tile() {
    let request = TileRequest::from_params(&RawParams {
        url: Some("https://tile.example/{$z}/{$x}/{$y}.png".into()),
        zoom: Some("0-2".into()),
        ..Default::default()
    });
    assert_eq!(request.config.profile, Profile::Mercator);
    assert!(request.address.is_none());

    let grid = TileGridTable::build(request.config.profile, &request.config.bounds);
    let node = expand(request.address, &request.config, &grid);

    // The whole world at zoom 0 is exactly one Mercator tile.
    assert_eq!(node.children.len(), 1);
    assert_eq!(node.children[0].address, TileAddress::new(0, 0, 0));

    let kml = render_document(&node, None, &request.config, &endpoints());
    assert_eq!(kml.matches("<NetworkLink>").count(), 1);
    assert!(kml.contains("zxy=0%2F0%2F0"));
}

// ============================================================================
// Scenario: recursive re-entry one level down
// ============================================================================

#[tokio::test]
async fn test_reentry_document_lists_quadrant_children() {
    let request = TileRequest::from_params(&RawParams {
        url: Some("https://tile.example/{$z}/{$x}/{$y}.png".into()),
        zoom: Some("1-3".into()),
        zxy: Some("1/0/0".into()),
        ..Default::default()
    });
    assert_eq!(request.address, Some(TileAddress::new(1, 0, 0)));

    let grid = TileGridTable::build(request.config.profile, &request.config.bounds);
    let node = expand(request.address, &request.config, &grid);

    // Up to 4 children at zoom 2, all inside the covering rectangle.
    assert!(!node.children.is_empty());
    assert!(node.children.len() <= 4);
    let range = grid.range_at(2);
    for child in &node.children {
        assert_eq!(child.address.z, 2);
        assert!(range.contains(child.address.x, child.address.y));
    }

    // Coarse Mercator zoom routes the overlay image through the compositor.
    let address = request.address.unwrap();
    let reference = classify_image_source(
        &address,
        &request.config,
        &endpoints(),
        &SequentialServerPart(0),
        &NoProbe,
    )
    .await;
    let ImageReference::Dynamic(href) = &reference else {
        panic!("expected dynamic reference at zoom 1, got {:?}", reference);
    };

    let kml = render_document(&node, Some(href.as_str()), &request.config, &endpoints());
    assert_eq!(kml.matches("<NetworkLink>").count(), node.children.len());
    assert!(kml.contains("/tiles?"));
}

// ============================================================================
// Scenario: single-level detail mode
// ============================================================================

#[test]
fn test_single_level_caps_every_interior_node() {
    let request = TileRequest::from_params(&RawParams {
        url: Some("https://tile.example/{$z}/{$x}/{$y}.png".into()),
        zoom: Some("1-3".into()),
        single_level: Some("1".into()),
        ..Default::default()
    });
    let grid = TileGridTable::build(request.config.profile, &request.config.bounds);

    // Walk every address of the shallow pyramid.
    for z in 1..=3u32 {
        let n = 1u32 << z;
        for x in 0..n {
            for y in 0..n {
                let node = expand(Some(TileAddress::new(z, x, y)), &request.config, &grid);
                if node.children.is_empty() {
                    assert_eq!(node.max_lod_pixels, -1);
                } else {
                    assert_eq!(node.max_lod_pixels, 256);
                }
            }
        }
    }
}

// ============================================================================
// Scenario: geodetic profile keeps the 2:1 index space
// ============================================================================

#[test]
fn test_geodetic_indices_stay_valid() {
    let request = TileRequest::from_params(&RawParams {
        zoom: Some("0-4".into()),
        ..Default::default()
    });
    assert_eq!(request.config.profile, Profile::Geodetic);
    let grid = TileGridTable::build(request.config.profile, &request.config.bounds);

    let mut frontier = expand(None, &request.config, &grid)
        .children
        .into_iter()
        .map(|c| c.address)
        .collect::<Vec<_>>();
    assert_eq!(frontier.len(), 2);

    while let Some(address) = frontier.pop() {
        let (max_x, max_y) = Profile::Geodetic.max_index(address.z);
        assert!((address.x as u64) <= max_x);
        assert!((address.y as u64) <= max_y);
        let node = expand(Some(address), &request.config, &grid);
        frontier.extend(node.children.into_iter().map(|c| c.address));
    }
}
