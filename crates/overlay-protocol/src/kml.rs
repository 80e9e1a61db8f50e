//! KML rendering of an expanded LOD tree node.
//!
//! Produces a KML 2.2 document with one visibility region, one ground
//! overlay, and a network link per child. Each link re-enters the document
//! endpoint with the child's address, loading only when the child's region
//! becomes active on screen.

use crate::config::TileRequestConfig;
use crate::document::TreeNode;
use crate::router::Endpoints;

/// Escape text for XML element content and attribute values.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render a tree node as a KML document.
///
/// `image_href` is the classified image reference for the node's ground
/// overlay; the synthetic root carries none.
pub fn render_document(
    node: &TreeNode,
    image_href: Option<&str>,
    config: &TileRequestConfig,
    endpoints: &Endpoints,
) -> String {
    let title = match &node.address {
        None => "Root".to_string(),
        Some(addr) => format!("{}/{}/{}.kml", addr.z, addr.x, addr.y),
    };

    let mut kml = String::with_capacity(2048);
    kml.push_str(&format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>{}</name>
    <description></description>
"#,
        title
    ));

    if let (Some(bounds), Some(href)) = (&node.bounds, image_href) {
        kml.push_str(&format!(
            r#"    <Region>
      <LatLonAltBox>
        <north>{:.14}</north>
        <south>{:.14}</south>
        <east>{:.14}</east>
        <west>{:.14}</west>
      </LatLonAltBox>
      <Lod>
        <minLodPixels>{}</minLodPixels>
        <maxLodPixels>{}</maxLodPixels>
      </Lod>
    </Region>
    <GroundOverlay>
      <drawOrder>{}</drawOrder>
      <Icon>
        <href>{}</href>
      </Icon>
      <LatLonBox>
        <north>{:.14}</north>
        <south>{:.14}</south>
        <east>{:.14}</east>
        <west>{:.14}</west>
      </LatLonBox>
    </GroundOverlay>
"#,
            bounds.north,
            bounds.south,
            bounds.east,
            bounds.west,
            node.min_lod_pixels,
            node.max_lod_pixels,
            node.draw_order,
            xml_escape(href),
            bounds.north,
            bounds.south,
            bounds.east,
            bounds.west,
        ));
    }

    for child in &node.children {
        let href = format!(
            "{}?{}",
            endpoints.document_url,
            config.query_string(Some(&child.address))
        );
        kml.push_str(&format!(
            r#"    <NetworkLink>
      <name>{}/{}/{}</name>
      <Region>
        <LatLonAltBox>
          <north>{:.14}</north>
          <south>{:.14}</south>
          <east>{:.14}</east>
          <west>{:.14}</west>
        </LatLonAltBox>
        <Lod>
          <minLodPixels>{}</minLodPixels>
          <maxLodPixels>-1</maxLodPixels>
        </Lod>
      </Region>
      <Link>
        <href>{}</href>
        <viewRefreshMode>onRegion</viewRefreshMode>
        <viewFormat/>
      </Link>
    </NetworkLink>
"#,
            child.address.z,
            child.address.x,
            child.address.y,
            child.bounds.north,
            child.bounds.south,
            child.bounds.east,
            child.bounds.west,
            child.min_lod_pixels,
            xml_escape(&href),
        ));
    }

    kml.push_str("  </Document>\n</kml>\n");
    kml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RawParams, TileRequest};
    use crate::document::expand;
    use tile_pyramid::TileGridTable;

    fn setup(zoom: &str, zxy: Option<&str>) -> (TreeNode, TileRequestConfig) {
        let request = TileRequest::from_params(&RawParams {
            url: Some("https://tile.example/{$z}/{$x}/{$y}.png".into()),
            zoom: Some(zoom.into()),
            zxy: zxy.map(String::from),
            ..Default::default()
        });
        let grid = TileGridTable::build(request.config.profile, &request.config.bounds);
        let node = expand(request.address, &request.config, &grid);
        (node, request.config)
    }

    #[test]
    fn test_root_document_has_no_overlay() {
        let (node, config) = setup("0-2", None);
        let kml = render_document(&node, None, &config, &Endpoints::from_base("http://h"));
        assert!(kml.contains("<name>Root</name>"));
        assert!(!kml.contains("<GroundOverlay>"));
        assert!(kml.contains("<NetworkLink>"));
        assert!(kml.contains("<viewRefreshMode>onRegion</viewRefreshMode>"));
    }

    #[test]
    fn test_tile_document_structure() {
        let (node, config) = setup("1-3", Some("1/0/0"));
        let kml = render_document(
            &node,
            Some("https://tile.example/1/0/1.png"),
            &config,
            &Endpoints::from_base("http://h"),
        );
        assert!(kml.contains("<name>1/0/0.kml</name>"));
        assert_eq!(kml.matches("<GroundOverlay>").count(), 1);
        assert_eq!(kml.matches("<Region>").count(), 1 + node.children.len());
        // Children re-enter the document endpoint one level deeper.
        assert!(kml.contains("zxy=2%2F"));
    }

    #[test]
    fn test_hrefs_are_xml_escaped() {
        let (node, config) = setup("1-3", Some("1/0/0"));
        let kml = render_document(
            &node,
            Some("https://tile.example/x?a=1&b=2"),
            &config,
            &Endpoints::from_base("http://h"),
        );
        assert!(kml.contains("a=1&amp;b=2"));
        assert!(!kml.contains("a=1&b=2</href>"));
        // Re-entry links carry several parameters joined by escaped
        // ampersands.
        assert!(kml.contains("&amp;zxy="));
    }

    #[test]
    fn test_coordinates_fixed_precision() {
        let (node, config) = setup("1-3", Some("1/0/0"));
        let kml = render_document(&node, Some("https://x"), &config, &Endpoints::from_base("h"));
        assert!(kml.contains("<north>0.00000000000000</north>"));
        assert!(kml.contains("<west>-180.00000000000000</west>"));
    }
}
