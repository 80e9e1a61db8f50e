//! Raster reprojection and image resampling capabilities.
//!
//! Two small interfaces keep the backends swappable and mockable: a warper
//! that reprojects a Mercator-georeferenced raster onto a regular lat/lon
//! grid, and basic image operations (smooth resize, alpha compositing).
//! The default implementations are pure Rust over the `image` crate, with
//! per-output-pixel inverse mapping and per-band sampling.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use overlay_protocol::ResampleMode;
use tile_common::bbox::LatLonBounds;
use tile_common::{GeoBox, TileError, TileResult};
use tile_pyramid::GlobalMercator;

/// A decoded source raster georeferenced in spherical Mercator meters.
pub struct MercatorRaster {
    pub image: DynamicImage,
    /// Extent of the raster in EPSG:3857 meters
    pub bounds: GeoBox,
}

/// A regular latitude/longitude output grid.
pub struct GeodeticGrid {
    pub bounds: LatLonBounds,
    pub width: u32,
    pub height: u32,
}

/// Reproject a georeferenced raster onto a target grid.
pub trait RasterWarper: Send + Sync {
    fn warp(
        &self,
        source: &MercatorRaster,
        target: &GeodeticGrid,
        mode: ResampleMode,
    ) -> TileResult<DynamicImage>;
}

/// Resize and composite operations on decoded images.
pub trait ImageOps: Send + Sync {
    /// Smooth (antialiased) resize.
    fn resize_smooth(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage;

    /// Composite `top` over `bottom` using `top`'s alpha channel as mask.
    fn composite_over(&self, top: &RgbaImage, bottom: &RgbaImage) -> RgbaImage;
}

/// Default warper: inverse-maps every target pixel through the Mercator
/// projection and samples the source per band.
pub struct ImageWarper;

impl RasterWarper for ImageWarper {
    fn warp(
        &self,
        source: &MercatorRaster,
        target: &GeodeticGrid,
        mode: ResampleMode,
    ) -> TileResult<DynamicImage> {
        match mode {
            ResampleMode::Average => {
                // Overview-style: sample a doubled grid with nearest, then
                // box-average each 2x2 block per band.
                let oversampled = GeodeticGrid {
                    bounds: target.bounds,
                    width: target.width * 2,
                    height: target.height * 2,
                };
                let planes = warp_planes(source, &oversampled, Sampling::Nearest)?;
                let reduced: Vec<Vec<u8>> = planes
                    .iter()
                    .map(|plane| {
                        box_downsample(plane, oversampled.width, oversampled.height)
                    })
                    .collect();
                merge_planes(reduced, target.width, target.height)
            }
            ResampleMode::Bilinear | ResampleMode::Antialias => {
                let planes = warp_planes(source, target, Sampling::Bilinear)?;
                merge_planes(planes, target.width, target.height)
            }
            ResampleMode::Nearest => {
                let planes = warp_planes(source, target, Sampling::Nearest)?;
                merge_planes(planes, target.width, target.height)
            }
        }
    }
}

/// Default image operations via `image::imageops`.
pub struct DefaultImageOps;

impl ImageOps for DefaultImageOps {
    fn resize_smooth(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, FilterType::Lanczos3)
    }

    fn composite_over(&self, top: &RgbaImage, bottom: &RgbaImage) -> RgbaImage {
        let (width, height) = (top.width(), top.height());
        let mut out = RgbaImage::new(width, height);
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            let t = top.get_pixel(x, y).0;
            let b = if x < bottom.width() && y < bottom.height() {
                bottom.get_pixel(x, y).0
            } else {
                [0, 0, 0, 0]
            };
            let mask = t[3] as u32;
            for c in 0..4 {
                pixel.0[c] =
                    ((t[c] as u32 * mask + b[c] as u32 * (255 - mask) + 127) / 255) as u8;
            }
        }
        out
    }
}

#[derive(Clone, Copy)]
enum Sampling {
    Nearest,
    Bilinear,
}

/// Split a decoded image into byte planes. 1, 3, and 4 band images map to
/// grayscale, RGB, and RGBA; anything else is a fatal configuration error.
fn extract_planes(image: &DynamicImage) -> TileResult<(Vec<Vec<u8>>, u32, u32)> {
    let (width, height) = (image.width(), image.height());
    let pixels = (width * height) as usize;
    let bands = image.color().channel_count() as usize;

    let planes = match bands {
        1 => {
            let gray = image.to_luma8();
            vec![gray.into_raw()]
        }
        3 => {
            let rgb = image.to_rgb8().into_raw();
            deinterleave(&rgb, pixels, 3)
        }
        4 => {
            let rgba = image.to_rgba8().into_raw();
            deinterleave(&rgba, pixels, 4)
        }
        n => return Err(TileError::UnsupportedBandCount(n)),
    };

    Ok((planes, width, height))
}

fn deinterleave(data: &[u8], pixels: usize, bands: usize) -> Vec<Vec<u8>> {
    let mut planes: Vec<Vec<u8>> = (0..bands).map(|_| Vec::with_capacity(pixels)).collect();
    for chunk in data.chunks_exact(bands) {
        for (band, &value) in chunk.iter().enumerate() {
            planes[band].push(value);
        }
    }
    planes
}

fn merge_planes(planes: Vec<Vec<u8>>, width: u32, height: u32) -> TileResult<DynamicImage> {
    let pixels = (width * height) as usize;
    match planes.len() {
        1 => {
            let image = GrayImage::from_raw(width, height, planes.into_iter().next().unwrap())
                .ok_or_else(|| TileError::WarpFailed("band size mismatch".into()))?;
            Ok(DynamicImage::ImageLuma8(image))
        }
        3 => {
            let mut data = Vec::with_capacity(pixels * 3);
            for i in 0..pixels {
                for plane in &planes {
                    data.push(plane[i]);
                }
            }
            let image = RgbImage::from_raw(width, height, data)
                .ok_or_else(|| TileError::WarpFailed("band size mismatch".into()))?;
            Ok(DynamicImage::ImageRgb8(image))
        }
        4 => {
            let mut data = Vec::with_capacity(pixels * 4);
            for i in 0..pixels {
                for plane in &planes {
                    data.push(plane[i]);
                }
            }
            let image = RgbaImage::from_raw(width, height, data)
                .ok_or_else(|| TileError::WarpFailed("band size mismatch".into()))?;
            Ok(DynamicImage::ImageRgba8(image))
        }
        n => Err(TileError::UnsupportedBandCount(n)),
    }
}

/// Inverse-map each target pixel into source pixel space and sample every
/// band there.
fn warp_planes(
    source: &MercatorRaster,
    target: &GeodeticGrid,
    sampling: Sampling,
) -> TileResult<Vec<Vec<u8>>> {
    let (planes, src_w, src_h) = extract_planes(&source.image)?;

    if source.bounds.width() <= 0.0 || source.bounds.height() <= 0.0 {
        return Err(TileError::WarpFailed("empty source extent".into()));
    }

    let mercator = GlobalMercator::default();
    let bounds = &target.bounds;
    let lon_step = (bounds.east - bounds.west) / target.width as f64;
    let lat_step = (bounds.north - bounds.south) / target.height as f64;

    // Source pixel coordinates for every target pixel center, shared across
    // bands.
    let mut mapping = Vec::with_capacity((target.width * target.height) as usize);
    for row in 0..target.height {
        let lat = bounds.north - (row as f64 + 0.5) * lat_step;
        for col in 0..target.width {
            let lon = bounds.west + (col as f64 + 0.5) * lon_step;
            let (mx, my) = mercator.lat_lon_to_meters(lat, lon);
            let sx = (mx - source.bounds.min_x) / source.bounds.width() * src_w as f64 - 0.5;
            let sy = (source.bounds.max_y - my) / source.bounds.height() * src_h as f64 - 0.5;
            mapping.push((sx, sy));
        }
    }

    let warped = planes
        .iter()
        .map(|plane| {
            mapping
                .iter()
                .map(|&(sx, sy)| sample_band(plane, src_w, src_h, sx, sy, sampling))
                .collect()
        })
        .collect();

    Ok(warped)
}

fn sample_band(plane: &[u8], width: u32, height: u32, sx: f64, sy: f64, sampling: Sampling) -> u8 {
    let (width, height) = (width as i64, height as i64);
    match sampling {
        Sampling::Nearest => {
            let x = sx.round() as i64;
            let y = sy.round() as i64;
            if x < 0 || y < 0 || x >= width || y >= height {
                0
            } else {
                plane[(y * width + x) as usize]
            }
        }
        Sampling::Bilinear => {
            let x0 = sx.floor() as i64;
            let y0 = sy.floor() as i64;
            if x0 < -1 || y0 < -1 || x0 >= width || y0 >= height {
                return 0;
            }
            let dx = sx - x0 as f64;
            let dy = sy - y0 as f64;
            let at = |x: i64, y: i64| -> f64 {
                let x = x.clamp(0, width - 1);
                let y = y.clamp(0, height - 1);
                plane[(y * width + x) as usize] as f64
            };
            let top = at(x0, y0) * (1.0 - dx) + at(x0 + 1, y0) * dx;
            let bottom = at(x0, y0 + 1) * (1.0 - dx) + at(x0 + 1, y0 + 1) * dx;
            (top * (1.0 - dy) + bottom * dy).round().clamp(0.0, 255.0) as u8
        }
    }
}

/// Mean of each 2x2 block, halving both dimensions.
fn box_downsample(plane: &[u8], width: u32, height: u32) -> Vec<u8> {
    let out_w = width / 2;
    let out_h = height / 2;
    let mut out = Vec::with_capacity((out_w * out_h) as usize);
    for row in 0..out_h {
        for col in 0..out_w {
            let mut sum = 0u32;
            for dy in 0..2 {
                for dx in 0..2 {
                    let x = col * 2 + dx;
                    let y = row * 2 + dy;
                    sum += plane[(y * width + x) as usize] as u32;
                }
            }
            out.push(((sum + 2) / 4) as u8);
        }
    }
    out
}
