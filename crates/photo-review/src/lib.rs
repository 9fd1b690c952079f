//! Culling helpers: sharpness scoring, sidecar discovery and duplicate
//! detection

pub mod duplicates;
pub mod related;
pub mod sharpness;

pub use duplicates::{file_hash, find_duplicates, DuplicateGroup};
pub use related::find_related_files;
pub use sharpness::{
    calculate_sharpness, categorize, laplacian_variance, load_grayscale,
    scan_sharpness, score_image, SharpnessCategory, SharpnessConfig, SharpnessResult,
};
