//! Dynamic tile compositing: cache lookup, source acquisition,
//! reprojection, fallback, and cache write.
//!
//! The compositor's one architectural assumption is that upstream source
//! tiles are always Mercator: fetched bytes get a synthetic EPSG:3857
//! georeference at the requested address and are warped onto the
//! plate-carrée grid over that tile's geographic extent, which is the grid
//! the viewer drapes the overlay on.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::DynamicImage;
use metrics::counter;
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use overlay_protocol::{
    substitute_address_tokens, ResampleMode, ServerPartPicker, TileRequestConfig,
};
use tile_common::{TileAddress, TileError, TileResult};
use tile_pyramid::{GlobalMercator, TILE_SIZE};

use crate::cache::{CacheKey, DiskTileCache};
use crate::fetch::TileFetcher;
use crate::warp::{GeodeticGrid, ImageOps, MercatorRaster, RasterWarper};

/// Edge length of the transparent fallback image.
const PLACEHOLDER_SIZE: u32 = 100;

static PLACEHOLDER_PNG: Lazy<Bytes> = Lazy::new(|| {
    let blank = image::RgbaImage::new(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE);
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(blank)
        .write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
        .expect("encoding a blank image cannot fail");
    Bytes::from(buf)
});

/// The fixed transparent placeholder returned for unreachable or
/// undecodable sources.
pub fn placeholder_png() -> Bytes {
    PLACEHOLDER_PNG.clone()
}

/// Resolves a tile address into PNG bytes.
pub struct TileCompositor {
    fetcher: Arc<dyn TileFetcher>,
    warper: Arc<dyn RasterWarper>,
    image_ops: Arc<dyn ImageOps>,
    picker: Arc<dyn ServerPartPicker>,
}

impl TileCompositor {
    pub fn new(
        fetcher: Arc<dyn TileFetcher>,
        warper: Arc<dyn RasterWarper>,
        image_ops: Arc<dyn ImageOps>,
        picker: Arc<dyn ServerPartPicker>,
    ) -> Self {
        Self {
            fetcher,
            warper,
            image_ops,
            picker,
        }
    }

    /// Resolve a tile request into image bytes.
    ///
    /// Upstream failures are not errors: they resolve to the transparent
    /// placeholder. The only fatal path is a source raster with an
    /// unsupported band count.
    pub async fn resolve(
        &self,
        address: &TileAddress,
        config: &TileRequestConfig,
    ) -> TileResult<Bytes> {
        let cache = config.cache_dir.as_ref().map(DiskTileCache::new);
        let key = CacheKey::from_address(address);

        if let Some(cache) = &cache {
            if let Some(bytes) = cache.get(&key) {
                counter!("tile_cache_hits_total").increment(1);
                debug!(tile = %address, "cache hit");
                return Ok(bytes);
            }
            counter!("tile_cache_misses_total").increment(1);
        }

        let part = self.picker.pick(&config.server_parts);
        let url = substitute_address_tokens(&config.url, address, config.invert_y, part);

        let fetched = match self.fetcher.fetch(&url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                counter!("tile_placeholders_total").increment(1);
                debug!(tile = %address, url = %url, error = %e, "fetch failed, serving placeholder");
                return Ok(placeholder_png());
            }
        };

        let decoded = match image::load_from_memory(&fetched) {
            Ok(image) => image,
            Err(e) => {
                counter!("tile_placeholders_total").increment(1);
                debug!(tile = %address, url = %url, error = %e, "decode failed, serving placeholder");
                return Ok(placeholder_png());
            }
        };

        let warped = self.reproject(decoded, address, config, cache.as_ref(), &key)?;

        let mut encoded = Vec::new();
        warped
            .write_to(&mut Cursor::new(&mut encoded), image::ImageOutputFormat::Png)
            .map_err(|e| TileError::EncodeFailed(e.to_string()))?;
        let bytes = Bytes::from(encoded);

        // Cache write is best-effort: the resolved bytes are served either
        // way.
        if let Some(cache) = &cache {
            if let Err(e) = cache.put(&key, &bytes) {
                warn!(tile = %address, error = %e, "cache write failed");
            }
        }

        Ok(bytes)
    }

    fn reproject(
        &self,
        decoded: DynamicImage,
        address: &TileAddress,
        config: &TileRequestConfig,
        cache: Option<&DiskTileCache>,
        key: &CacheKey,
    ) -> TileResult<DynamicImage> {
        let mercator = GlobalMercator::default();
        let source = MercatorRaster {
            image: decoded,
            bounds: mercator.tile_bounds(address.x, address.y, address.z),
        };
        let target = GeodeticGrid {
            bounds: mercator.tile_lat_lon_bounds(address.x, address.y, address.z),
            width: TILE_SIZE,
            height: TILE_SIZE,
        };

        match config.resample {
            ResampleMode::Nearest | ResampleMode::Bilinear | ResampleMode::Average => {
                self.warper.warp(&source, &target, config.resample)
            }
            ResampleMode::Antialias => {
                // Smooth path: warp oversampled, hand the downsize to the
                // image capability, and refine any previously cached tile by
                // compositing over it instead of replacing it.
                let source = MercatorRaster {
                    image: DynamicImage::ImageRgba8(source.image.to_rgba8()),
                    bounds: source.bounds,
                };
                let oversampled = GeodeticGrid {
                    bounds: target.bounds,
                    width: TILE_SIZE * 2,
                    height: TILE_SIZE * 2,
                };
                let warped = self
                    .warper
                    .warp(&source, &oversampled, ResampleMode::Antialias)?;
                let resized = self
                    .image_ops
                    .resize_smooth(&warped, TILE_SIZE, TILE_SIZE)
                    .to_rgba8();

                let previous = cache
                    .and_then(|c| c.get(key))
                    .and_then(|bytes| image::load_from_memory(&bytes).ok());

                Ok(match previous {
                    Some(prev) => DynamicImage::ImageRgba8(
                        self.image_ops.composite_over(&resized, &prev.to_rgba8()),
                    ),
                    None => DynamicImage::ImageRgba8(resized),
                })
            }
        }
    }
}
