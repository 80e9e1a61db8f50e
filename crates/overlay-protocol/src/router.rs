//! Image source classification for tile references.
//!
//! Decides whether a tile's image reference points directly at an upstream
//! tile server, at the transparent placeholder, or back into the dynamic
//! compositor, and performs the URL template substitution for direct links.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::debug;

use tile_common::{Profile, TileAddress};
use tile_pyramid::{GlobalGeodetic, GlobalMercator};

use crate::config::TileRequestConfig;

/// Templated Mercator sources below this zoom are reprojected through the
/// compositor rather than linked directly.
pub const DYNAMIC_ZOOM_THRESHOLD: u32 = 6;

/// Pixel width used when expanding WMS bounding-box templates.
const WMS_WIDTH: u32 = 256;

/// Public URLs of the service's own endpoints, substituted into recursive
/// links. Passed in at startup; no process-global state.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// LOD document endpoint (trailing slash)
    pub document_url: String,
    /// Dynamic tile endpoint
    pub tile_url: String,
    /// Transparent placeholder image
    pub placeholder_url: String,
}

impl Endpoints {
    pub fn from_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            document_url: format!("{}/", base),
            tile_url: format!("{}/tiles", base),
            placeholder_url: format!("{}/placeholder.png", base),
        }
    }
}

/// How a tile's image reference resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    /// Direct link to an upstream tile
    Direct(String),
    /// Routed through the dynamic tile compositor
    Dynamic(String),
    /// Upstream unreachable; show the transparent placeholder
    Placeholder(String),
}

impl ImageReference {
    pub fn href(&self) -> &str {
        match self {
            ImageReference::Direct(url)
            | ImageReference::Dynamic(url)
            | ImageReference::Placeholder(url) => url,
        }
    }
}

/// Chooses which upstream mirror token substitutes `{$s}`.
///
/// Injectable so tests can pin the choice.
pub trait ServerPartPicker: Send + Sync {
    fn pick<'a>(&self, parts: &'a [String]) -> Option<&'a str>;
}

/// Uniform random mirror selection.
pub struct RandomServerPart;

impl ServerPartPicker for RandomServerPart {
    fn pick<'a>(&self, parts: &'a [String]) -> Option<&'a str> {
        parts.choose(&mut rand::thread_rng()).map(String::as_str)
    }
}

/// Deterministic picker: always the part at a fixed index (modulo pool
/// size).
pub struct SequentialServerPart(pub usize);

impl ServerPartPicker for SequentialServerPart {
    fn pick<'a>(&self, parts: &'a [String]) -> Option<&'a str> {
        if parts.is_empty() {
            None
        } else {
            Some(parts[self.0 % parts.len()].as_str())
        }
    }
}

/// Best-effort reachability check for resolved upstream links.
#[async_trait]
pub trait LinkProber: Send + Sync {
    async fn is_reachable(&self, url: &str) -> bool;
}

/// Prober that assumes every link is live (probing disabled).
pub struct NoProbe;

#[async_trait]
impl LinkProber for NoProbe {
    async fn is_reachable(&self, _url: &str) -> bool {
        true
    }
}

/// Substitute a tile address (and optionally a mirror token) into a URL
/// template. `{$y}` and `{$invY}` both receive the wire row: TMS when the
/// template declares inverted y, XYZ otherwise.
pub fn substitute_address_tokens(
    template: &str,
    address: &TileAddress,
    invert_y: bool,
    server_part: Option<&str>,
) -> String {
    let wire_y = address.wire_y(invert_y).to_string();
    template
        .replace("{$s}", server_part.unwrap_or(""))
        .replace("{$x}", &address.x.to_string())
        .replace("{$y}", &wire_y)
        .replace("{$invY}", &wire_y)
        .replace("{$z}", &address.z.to_string())
        .replace("{$q}", &address.quadkey())
}

/// Expand `WMS:*` tokens into a concrete bounding-box query for the tile,
/// in the request profile's spatial reference. Height follows from the
/// aspect ratio of the bounds at a fixed width.
fn expand_wms_tokens(url: &str, address: &TileAddress, profile: Profile) -> String {
    if !url.contains("WMS:BBOX") {
        return url.to_string();
    }

    let bounds = match profile {
        Profile::Mercator => {
            GlobalMercator::default().tile_bounds(address.x, address.y, address.z)
        }
        Profile::Geodetic => {
            GlobalGeodetic::default().tile_bounds(address.x, address.y, address.z)
        }
    };

    let width = WMS_WIDTH;
    let height = (width as f64 / bounds.width() * bounds.height()) as i64;

    url.replace("WMS:SRS", &format!("srs={}", profile.srs()))
        .replace(
            "WMS:BBOX",
            &format!(
                "BBOX={},{},{},{}",
                bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
            ),
        )
        .replace("WMS:WIDTH", &format!("WIDTH={}", width))
        .replace("WMS:HEIGHT", &format!("HEIGHT={}", height))
}

/// Resolve the image reference for a tile:
///
/// 1. Non-templated sources always composite dynamically.
/// 2. Templated Mercator sources at coarse zooms, and any source when
///    dynamic compositing is forced, composite dynamically.
/// 3. Otherwise the template is substituted directly; when probing is
///    enabled an unreachable link degrades to the placeholder.
pub async fn classify_image_source(
    address: &TileAddress,
    config: &TileRequestConfig,
    endpoints: &Endpoints,
    picker: &dyn ServerPartPicker,
    prober: &dyn LinkProber,
) -> ImageReference {
    let dynamic_url = format!(
        "{}?{}",
        endpoints.tile_url,
        config.query_string(Some(address))
    );

    if !config.is_templated() {
        return ImageReference::Dynamic(dynamic_url);
    }

    if config.force_dynamic
        || (config.profile == Profile::Mercator && address.z < DYNAMIC_ZOOM_THRESHOLD)
    {
        return ImageReference::Dynamic(dynamic_url);
    }

    let part = picker.pick(&config.server_parts);
    let url = substitute_address_tokens(&config.url, address, config.invert_y, part);
    let url = expand_wms_tokens(&url, address, config.profile);

    if config.check_status && !prober.is_reachable(&url).await {
        debug!(url = %url, "upstream unreachable, using placeholder");
        return ImageReference::Placeholder(endpoints.placeholder_url.clone());
    }

    ImageReference::Direct(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RawParams, TileRequest};

    struct DeadLink;

    #[async_trait]
    impl LinkProber for DeadLink {
        async fn is_reachable(&self, _url: &str) -> bool {
            false
        }
    }

    fn mercator_config(url: &str) -> TileRequestConfig {
        TileRequest::from_params(&RawParams {
            url: Some(url.to_string()),
            ..Default::default()
        })
        .config
    }

    fn endpoints() -> Endpoints {
        Endpoints::from_base("http://127.0.0.1:8080")
    }

    #[test]
    fn test_substitute_address_tokens() {
        let address = TileAddress::new(3, 2, 1);
        let url = substitute_address_tokens(
            "https://{$s}.example/{$z}/{$x}/{$y}.png",
            &address,
            false,
            Some("a"),
        );
        // TMS row 1 of 8 is XYZ row 6.
        assert_eq!(url, "https://a.example/3/2/6.png");

        let url = substitute_address_tokens(
            "https://t.example/{$z}/{$x}/{$invY}.png",
            &address,
            true,
            None,
        );
        assert_eq!(url, "https://t.example/3/2/1.png");
    }

    #[test]
    fn test_substitute_quadkey() {
        let address = TileAddress::new(3, 3, 2);
        let url = substitute_address_tokens("https://q.example/{$q}.jpg", &address, false, None);
        assert_eq!(url, "https://q.example/213.jpg");
    }

    #[test]
    fn test_coarse_mercator_routes_dynamic() {
        let config = mercator_config("https://tile.example/{$z}/{$x}/{$y}.png");
        let reference = tokio_test::block_on(classify_image_source(
            &TileAddress::new(3, 1, 1),
            &config,
            &endpoints(),
            &SequentialServerPart(0),
            &NoProbe,
        ));
        match reference {
            ImageReference::Dynamic(url) => {
                assert!(url.starts_with("http://127.0.0.1:8080/tiles?"));
                assert!(url.ends_with("zxy=3%2F1%2F1"));
            }
            other => panic!("expected dynamic reference, got {:?}", other),
        }
    }

    #[test]
    fn test_deep_mercator_links_directly() {
        let config = mercator_config("https://tile.example/{$z}/{$x}/{$y}.png");
        let reference = tokio_test::block_on(classify_image_source(
            &TileAddress::new(7, 10, 20),
            &config,
            &endpoints(),
            &SequentialServerPart(0),
            &NoProbe,
        ));
        assert_eq!(
            reference,
            ImageReference::Direct("https://tile.example/7/10/107.png".to_string())
        );
    }

    #[test]
    fn test_force_dynamic() {
        let mut config = mercator_config("https://tile.example/{$z}/{$x}/{$y}.png");
        config.force_dynamic = true;
        let reference = tokio_test::block_on(classify_image_source(
            &TileAddress::new(9, 0, 0),
            &config,
            &endpoints(),
            &SequentialServerPart(0),
            &NoProbe,
        ));
        assert!(matches!(reference, ImageReference::Dynamic(_)));
    }

    #[test]
    fn test_non_templated_always_dynamic() {
        let config = mercator_config("https://data.example/regional.tif");
        let reference = tokio_test::block_on(classify_image_source(
            &TileAddress::new(12, 100, 200),
            &config,
            &endpoints(),
            &SequentialServerPart(0),
            &NoProbe,
        ));
        assert!(matches!(reference, ImageReference::Dynamic(_)));
    }

    #[test]
    fn test_dead_link_degrades_to_placeholder() {
        let mut config = mercator_config("https://tile.example/{$z}/{$x}/{$y}.png");
        config.check_status = true;
        let reference = tokio_test::block_on(classify_image_source(
            &TileAddress::new(8, 1, 1),
            &config,
            &endpoints(),
            &SequentialServerPart(0),
            &DeadLink,
        ));
        assert_eq!(
            reference,
            ImageReference::Placeholder("http://127.0.0.1:8080/placeholder.png".to_string())
        );
    }

    #[test]
    fn test_probe_skipped_when_disabled() {
        // checkStatus off: the dead prober is never consulted.
        let config = mercator_config("https://tile.example/{$z}/{$x}/{$y}.png");
        let reference = tokio_test::block_on(classify_image_source(
            &TileAddress::new(8, 1, 1),
            &config,
            &endpoints(),
            &SequentialServerPart(0),
            &DeadLink,
        ));
        assert!(matches!(reference, ImageReference::Direct(_)));
    }

    #[test]
    fn test_wms_token_expansion_geodetic() {
        let config = TileRequest::from_params(&RawParams {
            url: Some("https://maps.example/wms?WMS:SRS&WMS:BBOX&WMS:WIDTH&WMS:HEIGHT".into()),
            profile: Some("geodetic".into()),
            ..Default::default()
        })
        .config;
        // url has no $z token but WMS:BBOX marks it templated
        assert!(config.is_templated());

        let reference = tokio_test::block_on(classify_image_source(
            &TileAddress::new(1, 0, 0),
            &config,
            &endpoints(),
            &SequentialServerPart(0),
            &NoProbe,
        ));
        let ImageReference::Direct(url) = reference else {
            panic!("expected direct reference");
        };
        assert!(url.contains("srs=EPSG:4326"));
        assert!(url.contains("BBOX=-180,-90,-90,0"));
        assert!(url.contains("WIDTH=256"));
        // 90° wide by 90° tall at width 256
        assert!(url.contains("HEIGHT=256"));
    }

    #[test]
    fn test_server_part_pool_pinning() {
        let parts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(SequentialServerPart(1).pick(&parts), Some("b"));
        assert_eq!(SequentialServerPart(4).pick(&parts), Some("b"));
        assert_eq!(SequentialServerPart(0).pick(&[]), None);
        // The random picker always stays inside the pool.
        for _ in 0..16 {
            let choice = RandomServerPart.pick(&parts).unwrap();
            assert!(parts.iter().any(|p| p == choice));
        }
    }
}
