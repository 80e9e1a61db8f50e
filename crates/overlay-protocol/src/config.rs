//! Request parameter parsing and the validated per-request configuration.
//!
//! Every parameter is optional; malformed or absent values fall back to
//! their documented defaults and are never surfaced as errors.

use std::path::PathBuf;

use serde::Deserialize;

use tile_common::{GeoBox, Profile, TileAddress, ZoomRange};

/// Raw KVP query parameters, as deserialized from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawParams {
    /// Source template; may embed `{$x}`/`{$y}`/`{$z}`/`{$invY}`/`{$s}`/`{$q}`
    /// or `WMS:BBOX`/`WMS:SRS`/`WMS:WIDTH`/`WMS:HEIGHT` tokens
    pub url: Option<String>,

    /// `min-max` zoom string
    pub zoom: Option<String>,

    /// `ulx_uly_lrx_lry` geographic bounds
    pub ullr: Option<String>,

    /// `z/x/y` recursive re-entry address
    pub zxy: Option<String>,

    /// `mercator` | `geodetic`
    pub profile: Option<String>,

    /// Tile cache directory
    pub cachedir: Option<String>,

    /// `near` | `bilinear` | `average` | `antialias`
    pub resample: Option<String>,

    /// `_`-separated upstream mirror tokens
    pub serverparts: Option<String>,

    #[serde(rename = "checkStatus")]
    pub check_status: Option<String>,

    #[serde(rename = "singleLevel")]
    pub single_level: Option<String>,

    #[serde(rename = "forceDynamicTile")]
    pub force_dynamic_tile: Option<String>,

    /// Background layer template
    pub bgurl: Option<String>,
}

/// Resampling algorithm for dynamic tile compositing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleMode {
    #[default]
    Nearest,
    Bilinear,
    Average,
    Antialias,
}

impl ResampleMode {
    /// Parse the request parameter, falling back to nearest.
    pub fn from_param(s: &str) -> Self {
        match s {
            "bilinear" => ResampleMode::Bilinear,
            "average" => ResampleMode::Average,
            "antialias" => ResampleMode::Antialias,
            _ => ResampleMode::Nearest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResampleMode::Nearest => "near",
            ResampleMode::Bilinear => "bilinear",
            ResampleMode::Average => "average",
            ResampleMode::Antialias => "antialias",
        }
    }
}

/// Validated request configuration, built once by the router and read-only
/// downstream.
#[derive(Debug, Clone)]
pub struct TileRequestConfig {
    pub url: String,
    pub zoom: ZoomRange,
    pub bounds: GeoBox,
    pub profile: Profile,
    pub resample: ResampleMode,
    pub server_parts: Vec<String>,
    pub check_status: bool,
    pub single_level: bool,
    pub force_dynamic: bool,
    pub invert_y: bool,
    pub cache_dir: Option<PathBuf>,
    pub background_url: Option<String>,
}

/// A parsed inbound request: the address it re-enters at (None for the
/// synthetic root) plus its configuration.
#[derive(Debug, Clone)]
pub struct TileRequest {
    pub address: Option<TileAddress>,
    pub config: TileRequestConfig,
}

impl TileRequestConfig {
    /// Whether the source is a templated web tile (vs. a plain URL that can
    /// only be resolved through the compositor).
    pub fn is_templated(&self) -> bool {
        self.url.contains("$z") || self.url.contains("WMS:BBOX")
    }

    /// Rebuild the canonical query string carrying this configuration,
    /// optionally re-entering at a tile address. Used for the recursive
    /// child links and for dynamic tile references.
    pub fn query_string(&self, address: Option<&TileAddress>) -> String {
        let mut query = format!("url={}", encode_component(&self.url));
        query.push_str(&format!("&zoom={}", self.zoom));
        query.push_str(&format!("&ullr={}", self.bounds.to_ullr()));
        query.push_str(&format!("&profile={}", self.profile.as_str()));
        if self.resample != ResampleMode::Nearest {
            query.push_str(&format!("&resample={}", self.resample.as_str()));
        }
        if !self.server_parts.is_empty() {
            query.push_str(&format!("&serverparts={}", self.server_parts.join("_")));
        }
        if let Some(dir) = &self.cache_dir {
            query.push_str(&format!(
                "&cachedir={}",
                encode_component(&dir.to_string_lossy())
            ));
        }
        if let Some(bg) = &self.background_url {
            query.push_str(&format!("&bgurl={}", encode_component(bg)));
        }
        if self.check_status {
            query.push_str("&checkStatus=1");
        }
        if self.single_level {
            query.push_str("&singleLevel=1");
        }
        if self.force_dynamic {
            query.push_str("&forceDynamicTile=1");
        }
        if let Some(addr) = address {
            query.push_str(&format!("&zxy={}%2F{}%2F{}", addr.z, addr.x, addr.y));
        }
        query
    }
}

impl TileRequest {
    /// Build a request from raw parameters, applying the documented default
    /// for every missing or malformed value.
    pub fn from_params(params: &RawParams) -> TileRequest {
        let url = params.url.clone().unwrap_or_default();
        let background_url = params.bgurl.clone().filter(|s| !s.is_empty());

        let profile = match params.profile.as_deref() {
            Some("mercator") => Profile::Mercator,
            Some("geodetic") => Profile::Geodetic,
            // Inferred: a zoom token in the source or background template
            // means a web-tile (Mercator) pyramid.
            _ => {
                let bg = background_url.as_deref().unwrap_or("");
                if url.contains("$z") || bg.contains("$z") {
                    Profile::Mercator
                } else {
                    Profile::Geodetic
                }
            }
        };

        let zoom = params
            .zoom
            .as_deref()
            .and_then(ZoomRange::parse)
            .unwrap_or_default();

        let bounds = params
            .ullr
            .as_deref()
            .and_then(GeoBox::from_ullr)
            .unwrap_or_else(GeoBox::world)
            .clamped(profile);

        let address = params.zxy.as_deref().and_then(TileAddress::parse);

        let resample = params
            .resample
            .as_deref()
            .map(ResampleMode::from_param)
            .unwrap_or_default();

        let server_parts: Vec<String> = params
            .serverparts
            .as_deref()
            .unwrap_or("")
            .split('_')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let cache_dir = params
            .cachedir
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let invert_y = url.contains("invY");

        TileRequest {
            address,
            config: TileRequestConfig {
                url,
                zoom,
                bounds,
                profile,
                resample,
                server_parts,
                check_status: params.check_status.is_some(),
                single_level: params.single_level.is_some(),
                force_dynamic: params.force_dynamic_tile.is_some(),
                invert_y,
                cache_dir,
                background_url,
            },
        }
    }
}

/// Percent-encode a query component (everything outside the unreserved set).
pub fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
