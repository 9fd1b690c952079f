//! Sharpness scoring using the variance of the Laplacian
//!
//! RAW files are scored from their embedded JPEG (extracted with exiftool's
//! `JpgFromRaw` or `PreviewImage` tags); everything else is decoded directly
//! with the `image` crate. Only the centre of the frame is considered, since
//! that is where the subject usually sits, and an optional grid picks the
//! sharpest block so a small in-focus subject is not averaged away by a
//! blurred background.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use image::{imageops, GrayImage, ImageReader};
use metadata_reader::is_raw;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Blocks smaller than this on either edge give unstable variances
const MIN_BLOCK_EDGE: u32 = 10;

/// Embedded previews to try, largest first
const EMBEDDED_PREVIEW_TAGS: &[&str] = &["JpgFromRaw", "PreviewImage"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SharpnessCategory {
    Sharp,
    Acceptable,
    Blurry,
}

impl SharpnessCategory {
    pub fn name(&self) -> &'static str {
        match self {
            SharpnessCategory::Sharp => "Sharp",
            SharpnessCategory::Acceptable => "Acceptable",
            SharpnessCategory::Blurry => "Blurry",
        }
    }
}

impl fmt::Display for SharpnessCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharpnessConfig {
    /// Scores below this are Blurry
    pub blur_threshold: f64,
    /// Scores at or above this are Sharp
    pub sharp_threshold: f64,
    /// Blocks per side; 1 scores the centre crop as a whole
    pub grid_size: u32,
}

impl Default for SharpnessConfig {
    fn default() -> Self {
        Self {
            blur_threshold: 100.0,
            sharp_threshold: 500.0,
            grid_size: 8,
        }
    }
}

/// Sharpness outcome for one file; `score` is `None` when the image could
/// not be loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharpnessResult {
    pub path: PathBuf,
    pub score: Option<f64>,
    pub category: Option<SharpnessCategory>,
}

fn extract_embedded_jpeg(path: &Path, exiftool: &Path, tag: &str) -> Result<Vec<u8>> {
    let output = Command::new(exiftool)
        .arg("-b")
        .arg(format!("-{}", tag))
        .arg(path)
        .output()
        .with_context(|| format!("Failed to run exiftool on {}", path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("exiftool failed for {}: {}", path.display(), stderr.trim());
    }

    if output.stdout.is_empty() {
        bail!("No embedded JPEG found in {} for tag {}", path.display(), tag);
    }

    Ok(output.stdout)
}

fn decode_embedded_preview(path: &Path, exiftool: &Path) -> Option<GrayImage> {
    for tag in EMBEDDED_PREVIEW_TAGS {
        let decoded = extract_embedded_jpeg(path, exiftool, tag).and_then(|data| {
            ImageReader::new(Cursor::new(data))
                .with_guessed_format()?
                .decode()
                .with_context(|| format!("Failed to decode {} for {}", tag, path.display()))
        });

        match decoded {
            Ok(image) => return Some(image.to_luma8()),
            Err(err) => tracing::debug!(path = %path.display(), tag, error = %err, "embedded preview unavailable"),
        }
    }
    None
}

/// Load `path` as an 8-bit grayscale image.
///
/// RAW files fall back to decoding the file itself when no embedded preview
/// can be extracted, which succeeds for the few RAW-like formats the `image`
/// crate understands (DNG thumbnails, TIFF-based files).
pub fn load_grayscale(path: &Path, exiftool: &Path) -> Result<GrayImage> {
    if is_raw(path) {
        if let Some(image) = decode_embedded_preview(path, exiftool) {
            return Ok(image);
        }
    }

    let image = image::open(path).with_context(|| format!("Failed to load image {}", path.display()))?;
    Ok(image.to_luma8())
}

/// Reflect-101 indexing: `-1 -> 1`, `n -> n - 2`
fn reflect(index: i64, len: i64) -> u32 {
    if len <= 1 {
        return 0;
    }
    let reflected = if index < 0 {
        -index
    } else if index >= len {
        2 * len - 2 - index
    } else {
        index
    };
    reflected.clamp(0, len - 1) as u32
}

/// Population variance of the 4-neighbour Laplacian of `image`
pub fn laplacian_variance(image: &GrayImage) -> f64 {
    let (width, height) = image.dimensions();
    let pixel_count = width as u64 * height as u64;
    if pixel_count == 0 {
        return 0.0;
    }

    let (w, h) = (width as i64, height as i64);
    let at = |x: i64, y: i64| image.get_pixel(reflect(x, w), reflect(y, h))[0] as f64;

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in 0..h {
        for x in 0..w {
            let response = at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y);
            sum += response;
            sum_sq += response * response;
        }
    }

    let n = pixel_count as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

fn centre_crop(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let (x0, x1) = (width / 4, width * 3 / 4);
    let (y0, y1) = (height / 4, height * 3 / 4);
    if x0 >= x1 || y0 >= y1 {
        return image.clone();
    }
    imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image()
}

/// Score the centre half of `image`.
///
/// With `grid_size > 1` the crop is split into `grid_size × grid_size`
/// blocks and the sharpest block wins.
pub fn score_image(image: &GrayImage, grid_size: u32) -> f64 {
    let cropped = centre_crop(image);
    if grid_size <= 1 {
        return laplacian_variance(&cropped);
    }

    let (width, height) = cropped.dimensions();
    let block_width = width / grid_size;
    let block_height = height / grid_size;
    if block_width < MIN_BLOCK_EDGE || block_height < MIN_BLOCK_EDGE {
        return laplacian_variance(&cropped);
    }

    let mut best = 0.0_f64;
    for row in 0..grid_size {
        for col in 0..grid_size {
            let block = imageops::crop_imm(&cropped, col * block_width, row * block_height, block_width, block_height)
                .to_image();
            best = best.max(laplacian_variance(&block));
        }
    }
    best
}

/// Sharpness score of the file at `path`; `exiftool` extracts RAW previews
pub fn calculate_sharpness(path: &Path, grid_size: u32, exiftool: &Path) -> Result<f64> {
    let image = load_grayscale(path, exiftool)?;
    Ok(score_image(&image, grid_size))
}

pub fn categorize(score: f64, blur_threshold: f64, sharp_threshold: f64) -> SharpnessCategory {
    if score < blur_threshold {
        SharpnessCategory::Blurry
    } else if score < sharp_threshold {
        SharpnessCategory::Acceptable
    } else {
        SharpnessCategory::Sharp
    }
}

/// Score every path in parallel.
///
/// `progress` is called once per finished file. Results are sorted by file
/// name, then path.
pub fn scan_sharpness<F>(paths: &[PathBuf], config: &SharpnessConfig, exiftool: &Path, progress: F) -> Vec<SharpnessResult>
where
    F: Fn(usize) + Sync,
{
    let mut results: Vec<SharpnessResult> = paths
        .par_iter()
        .map(|path| {
            let score = match calculate_sharpness(path, config.grid_size, exiftool) {
                Ok(score) => Some(score),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "could not score sharpness");
                    None
                }
            };
            progress(1);
            SharpnessResult {
                path: path.clone(),
                score,
                category: score.map(|s| categorize(s, config.blur_threshold, config.sharp_threshold)),
            }
        })
        .collect();

    results.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()).then_with(|| a.path.cmp(&b.path)));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn checker(x: u32, y: u32) -> Luma<u8> {
        Luma([if (x + y) % 2 == 0 { 255 } else { 0 }])
    }

    #[test]
    fn test_flat_image_has_zero_variance() {
        let image = GrayImage::from_pixel(64, 64, Luma([128]));
        assert_eq!(laplacian_variance(&image), 0.0);
        assert_eq!(score_image(&image, 1), 0.0);
        assert_eq!(score_image(&image, 4), 0.0);
    }

    #[test]
    fn test_checkerboard_scores_high() {
        let image = GrayImage::from_fn(40, 40, checker);
        // Every response is +/-1020 with reflect-101 borders
        let variance = laplacian_variance(&image);
        assert!((variance - 1020.0 * 1020.0).abs() < 1.0, "variance {}", variance);
    }

    #[test]
    fn test_tiny_images_do_not_panic() {
        assert_eq!(laplacian_variance(&GrayImage::new(0, 0)), 0.0);
        assert_eq!(score_image(&GrayImage::from_pixel(1, 1, Luma([7])), 8), 0.0);
        assert_eq!(score_image(&GrayImage::from_fn(3, 1, checker), 1), laplacian_variance(&GrayImage::from_fn(3, 1, checker)));
    }

    #[test]
    fn test_only_the_centre_is_scored() {
        // Detail confined to the outer border is ignored
        let edges = GrayImage::from_fn(100, 100, |x, y| {
            if x < 20 || y < 20 || x >= 80 || y >= 80 {
                checker(x, y)
            } else {
                Luma([0])
            }
        });
        assert_eq!(score_image(&edges, 1), 0.0);

        let centre = GrayImage::from_fn(100, 100, |x, y| {
            if (30..70).contains(&x) && (30..70).contains(&y) {
                checker(x, y)
            } else {
                Luma([0])
            }
        });
        assert!(score_image(&centre, 1) > score_image(&edges, 1));
    }

    #[test]
    fn test_grid_finds_small_sharp_subject() {
        // Centre crop is [50, 150); the first 25px block holds all the detail
        let image = GrayImage::from_fn(200, 200, |x, y| {
            if (50..75).contains(&x) && (50..75).contains(&y) {
                checker(x, y)
            } else {
                Luma([0])
            }
        });
        let global = score_image(&image, 1);
        let gridded = score_image(&image, 4);
        assert!(gridded > global * 2.0, "grid {} vs global {}", gridded, global);
    }

    #[test]
    fn test_small_blocks_fall_back_to_global() {
        let image = GrayImage::from_fn(100, 100, |x, y| Luma([((x * 7 + y * 13) % 251) as u8]));
        // 50px crop over an 8x8 grid gives 6px blocks
        assert_eq!(score_image(&image, 8), score_image(&image, 1));
    }

    #[test]
    fn test_categorize_thresholds() {
        assert_eq!(categorize(50.0, 100.0, 500.0), SharpnessCategory::Blurry);
        assert_eq!(categorize(100.0, 100.0, 500.0), SharpnessCategory::Acceptable);
        assert_eq!(categorize(499.9, 100.0, 500.0), SharpnessCategory::Acceptable);
        assert_eq!(categorize(500.0, 100.0, 500.0), SharpnessCategory::Sharp);
        assert_eq!(SharpnessCategory::Sharp.to_string(), "Sharp");
    }

    #[test]
    fn test_calculate_sharpness_from_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("checker.png");
        GrayImage::from_fn(40, 40, checker).save(&path)?;

        // PNG is not RAW, so exiftool is never invoked
        let score = calculate_sharpness(&path, 1, Path::new("/nonexistent/exiftool"))?;
        assert!((score - 1020.0 * 1020.0).abs() < 1.0, "score {}", score);

        assert!(calculate_sharpness(&dir.path().join("missing.png"), 1, Path::new("exiftool")).is_err());
        Ok(())
    }

    #[test]
    fn test_scan_scores_files_and_reports_failures() -> Result<()> {
        let dir = tempdir()?;
        let sharp = dir.path().join("b_sharp.png");
        let flat = dir.path().join("a_flat.png");
        let broken = dir.path().join("c_broken.jpg");
        GrayImage::from_fn(64, 64, checker).save(&sharp)?;
        GrayImage::from_pixel(64, 64, Luma([90])).save(&flat)?;
        std::fs::write(&broken, b"not an image")?;

        let processed = AtomicUsize::new(0);
        let config = SharpnessConfig::default();
        let results = scan_sharpness(&[sharp.clone(), broken.clone(), flat.clone()], &config, Path::new("exiftool"), |n| {
            processed.fetch_add(n, Ordering::SeqCst);
        });

        assert_eq!(processed.load(Ordering::SeqCst), 3);
        let paths: Vec<&PathBuf> = results.iter().map(|r| &r.path).collect();
        assert_eq!(paths, vec![&flat, &sharp, &broken]);

        assert_eq!(results[0].category, Some(SharpnessCategory::Blurry));
        assert_eq!(results[1].category, Some(SharpnessCategory::Sharp));
        assert_eq!(results[2].score, None);
        assert_eq!(results[2].category, None);
        Ok(())
    }
}
