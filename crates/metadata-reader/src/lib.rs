//! Photo metadata discovery and extraction
//!
//! This crate finds image files in a folder tree and extracts the exposure
//! settings photographers care about (shutter speed, aperture, ISO, focal
//! length, lens). RAW and other complex formats go through a persistent
//! exiftool process first; everything else, and anything exiftool could not
//! fully resolve, falls back to a pure-Rust EXIF parser.

pub mod embedded;
pub mod exiftool;
pub mod metadata;
pub mod reader;
pub mod scan;

pub use exiftool::{resolve_exiftool, ExiftoolRunner};
pub use metadata::{MetadataSource, PhotoMetadata};
pub use reader::{MetadataReader, ReaderOptions};
pub use scan::{find_images, is_raw, prefers_exiftool, DUPLICATE_EXTENSIONS, EXIFTOOL_EXTENSIONS, SUPPORTED_EXTENSIONS};
