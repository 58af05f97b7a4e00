//! Logo/image CV heuristic (spec §4.7): uniform pixel-grid sampling over
//! an in-memory raster, classifying an asset as a logo by color diversity,
//! transparency, and edge-color dominance. Grounded on the `image` crate
//! usage in `examples/other_examples` manifests that decode raster bytes
//! for pixel-level inspection.

use crate::model::AssetType;
use image::GenericImageView;
use std::collections::{HashMap, HashSet};

const SMALL_ASSET_AREA: u32 = 40_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
    pub is_logo: bool,
}

/// Samples `bytes` on a uniform grid and classifies whether the asset is
/// a logo. Never fails the caller: on a decode error the asset is simply
/// retained with its prior type (spec §4.7 "failures per asset are logged
/// and skipped").
pub fn classify(bytes: &[u8]) -> Option<ClassificationResult> {
    let image = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!(error = %e, "failed to decode image for logo classification");
            return None;
        }
    };

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let step_x = (width / 128).max(1);
    let step_y = (height / 128).max(1);

    let mut unique_colors: HashSet<u32> = HashSet::new();
    let mut transparent_count: u64 = 0;
    let mut sample_count: u64 = 0;
    let mut edge_colors: HashMap<u32, u64> = HashMap::new();

    let mut x = 0;
    while x < width {
        let mut y = 0;
        while y < height {
            let pixel = image.get_pixel(x, y);
            let [r, g, b, a] = pixel.0;
            let packed = u32::from_be_bytes([r, g, b, a]);
            unique_colors.insert(packed);
            sample_count += 1;

            if a < 80 {
                transparent_count += 1;
            }

            let is_edge_x = x < step_x || x + step_x >= width;
            let is_edge_y = y < step_y || y + step_y >= height;
            if is_edge_x || is_edge_y {
                *edge_colors.entry(packed).or_insert(0) += 1;
            }

            y += step_y;
        }
        x += step_x;
    }

    if sample_count == 0 {
        return None;
    }

    let color_diversity = unique_colors.len() as f64 / sample_count as f64;
    let transparency_ratio = transparent_count as f64 / sample_count as f64;
    let edge_total: u64 = edge_colors.values().sum();
    let dominant_edge_ratio = if edge_total > 0 {
        *edge_colors.values().max().unwrap_or(&0) as f64 / edge_total as f64
    } else {
        0.0
    };

    let mut is_logo = color_diversity < 0.18
        || (transparency_ratio > 0.25 && color_diversity < 0.35)
        || (dominant_edge_ratio > 0.4 && color_diversity < 0.4);

    if width * height < SMALL_ASSET_AREA {
        is_logo = true;
    }

    Some(ClassificationResult { is_logo })
}

/// Applies a classification result to the asset's incoming type (spec
/// §4.7: logo on true, else retain the incoming type, defaulting to
/// `Image` if unset).
pub fn refine_asset_type(current: AssetType, result: Option<ClassificationResult>) -> AssetType {
    match result {
        Some(r) if r.is_logo => AssetType::Logo,
        _ => current,
    }
}
