use std::collections::HashMap;
use std::path::Path;

use image::imageops::FilterType;
use kmeans_colors::get_kmeans_hamerly;
use log::{debug, info};
use palette::Lab;
use serde::Deserialize;

use crate::color::Color;
use crate::error::{Error, Result};

/// A color extracted from the image with its share of the sampled pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractedColor {
    pub color: Color,
    pub weight: f32,
}

/// Palette extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Popularity of quantized colors, ties broken by scan order
    #[default]
    Histogram,
    /// K-means clustering in CIELAB
    Kmeans,
}

/// Parameters controlling a single extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractParams {
    pub count: usize,
    pub quality: u32,
    pub method: Method,
}

const MAX_DIM: u32 = 256;
const MIN_ALPHA: u8 = 125;
const SIGBITS: u32 = 5;
const MAX_ITER: usize = 20;
const CONVERGE: f32 = 5.0;
const SEED: u64 = 42;
const DEDUP_THRESHOLD: f32 = 25.0; // ΔE² < 25 means ΔE < 5

/// Extract up to `params.count` dominant colors from the image at `path`,
/// most dominant first.
///
/// Returning fewer colors than requested is not an error; an image with no
/// opaque pixels yields an empty list.
pub fn extract_colors(path: &Path, params: &ExtractParams) -> Result<Vec<ExtractedColor>> {
    info!(
        "extracting colors from {} (count={}, quality={}, method={:?})",
        path.display(),
        params.count,
        params.quality,
        params.method
    );
    let pixels = load_and_sample(path, params.quality)?;
    debug!("sampled {} opaque pixels", pixels.len());

    let colors = match params.method {
        Method::Histogram => histogram_colors(&pixels, params.count),
        Method::Kmeans => kmeans_colors(&pixels, params.count),
    };
    debug!("extracted {} of {} requested colors", colors.len(), params.count);
    Ok(colors)
}

/// Load an image, shrink it to fit within 256x256 (preserving aspect ratio)
/// and return every `quality`-th opaque pixel in scan order.
pub fn load_and_sample(path: &Path, quality: u32) -> Result<Vec<Color>> {
    if !path.exists() {
        return Err(image_error(path, "file not found", None));
    }
    if !path.is_file() {
        return Err(image_error(path, "not a regular file", None));
    }
    let img = image::open(path).map_err(|e| {
        image_error(
            path,
            "unsupported or corrupt image. Supported formats: PNG, JPEG, WebP, BMP, TIFF, GIF",
            Some(e),
        )
    })?;

    let img = if img.width() > MAX_DIM || img.height() > MAX_DIM {
        img.resize(MAX_DIM, MAX_DIM, FilterType::Lanczos3)
    } else {
        img
    };
    let rgba = img.to_rgba8();

    let step = quality.max(1) as usize;
    let pixels = rgba
        .pixels()
        .step_by(step)
        .filter(|p| p[3] >= MIN_ALPHA)
        .map(|p| Color::new(p[0], p[1], p[2]))
        .collect();
    Ok(pixels)
}

fn image_error(path: &Path, reason: &str, source: Option<image::ImageError>) -> Error {
    Error::ImageRead {
        path: path.to_path_buf(),
        reason: reason.to_string(),
        source,
    }
}

#[derive(Debug)]
struct Bin {
    count: u32,
    first: usize,
    sum: [u64; 3],
}

impl Bin {
    fn mean(&self) -> Color {
        let n = u64::from(self.count);
        let avg = |s: u64| ((s + n / 2) / n) as u8;
        Color::new(avg(self.sum[0]), avg(self.sum[1]), avg(self.sum[2]))
    }
}

fn bin_key(c: Color) -> u16 {
    let shift = 8 - SIGBITS;
    let (r, g, b) = (
        u16::from(c.r >> shift),
        u16::from(c.g >> shift),
        u16::from(c.b >> shift),
    );
    (r << (2 * SIGBITS)) | (g << SIGBITS) | b
}

/// Rank quantized colors by popularity.
///
/// Bins are ordered by pixel count, then by first occurrence. A bin that is
/// perceptually indistinguishable from an already chosen color is folded into
/// it instead of being emitted.
pub fn histogram_colors(pixels: &[Color], count: usize) -> Vec<ExtractedColor> {
    if pixels.is_empty() || count == 0 {
        return Vec::new();
    }

    let mut bins: HashMap<u16, Bin> = HashMap::new();
    for (i, &p) in pixels.iter().enumerate() {
        let bin = bins.entry(bin_key(p)).or_insert(Bin {
            count: 0,
            first: i,
            sum: [0; 3],
        });
        bin.count += 1;
        bin.sum[0] += u64::from(p.r);
        bin.sum[1] += u64::from(p.g);
        bin.sum[2] += u64::from(p.b);
    }

    let mut ranked: Vec<Bin> = bins.into_values().collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then(a.first.cmp(&b.first)));

    let total = pixels.len() as f32;
    let mut chosen: Vec<ExtractedColor> = Vec::with_capacity(count);
    for bin in &ranked {
        let color = bin.mean();
        let weight = bin.count as f32 / total;
        let similar = chosen
            .iter()
            .position(|c| c.color.delta_e_sq(color) < DEDUP_THRESHOLD);
        match similar {
            Some(i) => chosen[i].weight += weight,
            None if chosen.len() < count => chosen.push(ExtractedColor { color, weight }),
            None => break,
        }
    }
    chosen
}

/// Run K-means on the sampled pixels in CIELAB space.
///
/// Returns deduplicated colors sorted by weight (descending).
/// Uses Hamerly's algorithm with K-means++ initialization and a fixed seed.
pub fn kmeans_colors(pixels: &[Color], count: usize) -> Vec<ExtractedColor> {
    let k = count.min(pixels.len());
    if k == 0 {
        return Vec::new();
    }
    let lab: Vec<Lab> = pixels.iter().map(|c| c.to_lab()).collect();
    let result = get_kmeans_hamerly(k, MAX_ITER, CONVERGE, false, &lab, SEED);

    let total = lab.len() as f32;

    // Count pixels per centroid to compute weights
    let mut counts = vec![0u32; result.centroids.len()];
    for &idx in &result.indices {
        counts[idx as usize] += 1;
    }

    let mut colors: Vec<ExtractedColor> = result
        .centroids
        .iter()
        .enumerate()
        .filter(|(i, _)| counts[*i] > 0)
        .map(|(i, lab)| ExtractedColor {
            color: Color::from_lab(*lab),
            weight: counts[i] as f32 / total,
        })
        .collect();

    deduplicate(&mut colors);
    colors.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    colors.truncate(count);
    colors
}

/// Merge colors that are too similar (ΔE < 5 in LAB space).
/// Keeps the first color and accumulates the weight.
fn deduplicate(colors: &mut Vec<ExtractedColor>) {
    let mut i = 0;
    while i < colors.len() {
        let mut j = i + 1;
        while j < colors.len() {
            if colors[i].color.delta_e_sq(colors[j].color) < DEDUP_THRESHOLD {
                colors[i].weight += colors[j].weight;
                colors.remove(j);
            } else {
                j += 1;
            }
        }
        i += 1;
    }
}
