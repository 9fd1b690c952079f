//! Pure-Rust EXIF reading with rexif
//!
//! Used for JPEG/TIFF files and as the fallback whenever exiftool is missing
//! or could not resolve a file.

use std::fs;
use std::path::Path;
use anyhow::{anyhow, Context, Result};
use rexif::{ExifEntry, ExifTag, TagValue};

use crate::exiftool::parse_capture_time;
use crate::metadata::{MetadataSource, PhotoMetadata};

/// Convert a tag value to a float, handling rationals, integers and
/// NUL-padded ASCII numbers
fn tag_value_to_f64(value: &TagValue) -> Option<f64> {
    let number = match value {
        TagValue::URational(values) => {
            let first = values.first()?;
            if first.denominator == 0 {
                return None;
            }
            first.numerator as f64 / first.denominator as f64
        }
        TagValue::IRational(values) => {
            let first = values.first()?;
            if first.denominator == 0 {
                return None;
            }
            first.numerator as f64 / first.denominator as f64
        }
        TagValue::U8(values) => *values.first()? as f64,
        TagValue::U16(values) => *values.first()? as f64,
        TagValue::U32(values) => *values.first()? as f64,
        TagValue::I16(values) => *values.first()? as f64,
        TagValue::I32(values) => *values.first()? as f64,
        TagValue::F32(values) => *values.first()? as f64,
        TagValue::F64(values) => *values.first()?,
        TagValue::Ascii(text) => text.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse().ok()?,
        _ => return None,
    };

    Some(number).filter(|n| n.is_finite())
}

fn tag_value_to_string(value: &TagValue) -> Option<String> {
    match value {
        TagValue::Ascii(text) => {
            let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
            (!text.is_empty()).then(|| text.to_string())
        }
        _ => None,
    }
}

fn find_entry(entries: &[ExifEntry], tag: ExifTag) -> Option<&ExifEntry> {
    entries.iter().find(|entry| entry.tag == tag)
}

fn number_tag(entries: &[ExifEntry], tag: ExifTag) -> Option<f64> {
    find_entry(entries, tag).and_then(|entry| tag_value_to_f64(&entry.value))
}

fn string_tag(entries: &[ExifEntry], tag: ExifTag) -> Option<String> {
    find_entry(entries, tag).and_then(|entry| tag_value_to_string(&entry.value))
}

/// Build a record from parsed EXIF entries.
///
/// Returns `None` when none of the exposure values or the lens could be found.
fn metadata_from_entries(path: &Path, entries: &[ExifEntry]) -> Option<PhotoMetadata> {
    let mut record = PhotoMetadata::new(path, MetadataSource::Embedded);
    record.shutter_speed = number_tag(entries, ExifTag::ExposureTime);
    record.aperture = number_tag(entries, ExifTag::FNumber);
    record.focal_length = number_tag(entries, ExifTag::FocalLength);
    record.focal_length_35mm = number_tag(entries, ExifTag::FocalLengthIn35mmFilm);
    record.iso = number_tag(entries, ExifTag::ISOSpeedRatings);
    record.make = string_tag(entries, ExifTag::Make);
    record.model = string_tag(entries, ExifTag::Model);

    let lens = string_tag(entries, ExifTag::LensModel);
    let found_anything = record.shutter_speed.is_some()
        || record.aperture.is_some()
        || record.focal_length.is_some()
        || record.iso.is_some()
        || lens.is_some();
    if !found_anything {
        return None;
    }

    if let Some(lens) = lens {
        record.lens = lens;
    }
    let date_time = string_tag(entries, ExifTag::DateTimeOriginal);
    record.capture_time = parse_capture_time(date_time.as_deref(), None);

    Some(record)
}

/// Read metadata embedded in `path`.
///
/// `Ok(None)` means the file has EXIF data but none of it is useful; an
/// error means the file could not be read or carries no EXIF block at all.
pub fn read_embedded(path: &Path) -> Result<Option<PhotoMetadata>> {
    let contents = fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let exif = rexif::parse_buffer(&contents)
        .map_err(|err| anyhow!("No readable EXIF data in {}: {}", path.display(), err))?;

    let record = metadata_from_entries(path, &exif.entries);
    if record.is_none() {
        tracing::debug!(
            path = %path.display(),
            tags = exif.entries.len(),
            "EXIF present but no exposure settings or lens found"
        );
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rexif::URational;
    use tempfile::tempdir;

    #[test]
    fn test_rational_conversion() {
        let value = TagValue::URational(vec![URational { numerator: 28, denominator: 10 }]);
        assert_eq!(tag_value_to_f64(&value), Some(2.8));

        let zero = TagValue::URational(vec![URational { numerator: 1, denominator: 0 }]);
        assert_eq!(tag_value_to_f64(&zero), None);

        assert_eq!(tag_value_to_f64(&TagValue::URational(vec![])), None);
    }

    #[test]
    fn test_integer_and_ascii_conversion() {
        assert_eq!(tag_value_to_f64(&TagValue::U16(vec![100, 0])), Some(100.0));
        assert_eq!(tag_value_to_f64(&TagValue::Ascii("50\0\0".to_string())), Some(50.0));
        assert_eq!(tag_value_to_f64(&TagValue::Ascii("n/a".to_string())), None);
    }

    #[test]
    fn test_string_values_are_trimmed() {
        let value = TagValue::Ascii("  EF 24-70mm f/2.8L\0".to_string());
        assert_eq!(tag_value_to_string(&value).as_deref(), Some("EF 24-70mm f/2.8L"));
        assert_eq!(tag_value_to_string(&TagValue::Ascii("\0\0".to_string())), None);
    }

    #[test]
    fn test_file_without_exif_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("no_exif.jpg");
        fs::write(&path, b"definitely not a jpeg")?;
        assert!(read_embedded(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(read_embedded(Path::new("/nonexistent/DSC001.jpg")).is_err());
    }
}
