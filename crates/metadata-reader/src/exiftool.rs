//! EXIF data extraction using exiftool
//!
//! exiftool understands far more RAW and container formats than any Rust
//! crate, so it is the first choice for those files. One process is kept
//! alive in `-stay_open` mode and fed batches of paths, which avoids paying
//! the Perl start-up cost for every file.

use std::env;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::Deserialize;

use crate::metadata::{MetadataSource, PhotoMetadata, UNKNOWN_LENS};

const EXIFTOOL_TAGS: &[&str] = &[
    "-ShutterSpeed",
    "-ExposureTime",
    "-Aperture",
    "-FNumber",
    "-ISO",
    "-FocalLength",
    "-FocalLengthIn35mmFormat",
    "-LensID",
    "-LensModel",
    "-LensType",
    "-Make",
    "-Model",
    "-DateTimeOriginal",
    "-SubSecTimeOriginal",
];

/// Find the exiftool executable.
///
/// An explicitly configured path wins. Otherwise a copy bundled in a `bin`
/// directory next to the running binary is preferred over the one on `PATH`.
pub fn resolve_exiftool(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }

    let exe_name = if cfg!(windows) { "exiftool.exe" } else { "exiftool" };
    let bundled = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("bin").join(exe_name)));

    match bundled {
        Some(path) if path.is_file() => path,
        _ => PathBuf::from(exe_name),
    }
}

/// Deserialize a value that could be a string or number into Option<String>
fn deserialize_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    struct StringOrNumber;
    impl<'de> de::Visitor<'de> for StringOrNumber {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}

#[derive(Debug, Deserialize)]
struct ExiftoolOutput {
    #[serde(rename = "SourceFile")]
    source_file: String,
    #[serde(rename = "ShutterSpeed", deserialize_with = "deserialize_string_or_number", default)]
    shutter_speed: Option<String>,
    #[serde(rename = "ExposureTime", deserialize_with = "deserialize_string_or_number", default)]
    exposure_time: Option<String>,
    #[serde(rename = "Aperture", deserialize_with = "deserialize_string_or_number", default)]
    aperture: Option<String>,
    #[serde(rename = "FNumber", deserialize_with = "deserialize_string_or_number", default)]
    f_number: Option<String>,
    #[serde(rename = "ISO", deserialize_with = "deserialize_string_or_number", default)]
    iso: Option<String>,
    #[serde(rename = "FocalLength", deserialize_with = "deserialize_string_or_number", default)]
    focal_length: Option<String>,
    #[serde(rename = "FocalLengthIn35mmFormat", deserialize_with = "deserialize_string_or_number", default)]
    focal_length_35mm: Option<String>,
    #[serde(rename = "LensID", deserialize_with = "deserialize_string_or_number", default)]
    lens_id: Option<String>,
    #[serde(rename = "LensModel", deserialize_with = "deserialize_string_or_number", default)]
    lens_model: Option<String>,
    #[serde(rename = "LensType", deserialize_with = "deserialize_string_or_number", default)]
    lens_type: Option<String>,
    #[serde(rename = "Make", deserialize_with = "deserialize_string_or_number", default)]
    make: Option<String>,
    #[serde(rename = "Model", deserialize_with = "deserialize_string_or_number", default)]
    model: Option<String>,
    #[serde(rename = "DateTimeOriginal", deserialize_with = "deserialize_string_or_number", default)]
    date_time_original: Option<String>,
    #[serde(rename = "SubSecTimeOriginal", deserialize_with = "deserialize_string_or_number", default)]
    subsec_time_original: Option<String>,
}

impl ExiftoolOutput {
    fn into_metadata(self) -> PhotoMetadata {
        let mut record = PhotoMetadata::new(PathBuf::from(&self.source_file), MetadataSource::Exiftool);

        // Composite tags are normalised by exiftool, raw EXIF tags are the fallback
        record.shutter_speed = first_number(&[&self.shutter_speed, &self.exposure_time]);
        record.aperture = first_number(&[&self.aperture, &self.f_number]);
        record.iso = first_number(&[&self.iso]);
        record.focal_length = first_number(&[&self.focal_length]);
        record.focal_length_35mm = first_number(&[&self.focal_length_35mm]);
        record.lens = [self.lens_id, self.lens_model, self.lens_type]
            .into_iter()
            .flatten()
            .map(|lens| lens.trim().to_string())
            .find(|lens| !lens.is_empty())
            .unwrap_or_else(|| UNKNOWN_LENS.to_string());
        record.make = self.make;
        record.model = self.model;
        record.capture_time = parse_capture_time(
            self.date_time_original.as_deref(),
            self.subsec_time_original.as_deref(),
        );

        record
    }
}

fn first_number(candidates: &[&Option<String>]) -> Option<f64> {
    candidates
        .iter()
        .filter_map(|value| value.as_deref())
        .find_map(parse_exiftool_number)
}

/// Convert an exiftool value such as `"21.8 mm"`, `"1/320"` or `"400"` to a float
pub fn parse_exiftool_number(value: &str) -> Option<f64> {
    let token = value.split_whitespace().next()?;

    if let Some((numerator, denominator)) = token.split_once('/') {
        let numerator: f64 = numerator.parse().ok()?;
        let denominator: f64 = denominator.parse().ok()?;
        if denominator == 0.0 {
            return None;
        }
        return Some(numerator / denominator);
    }

    token.parse().ok().filter(|v: &f64| v.is_finite())
}

/// Parse capture time with subsecond precision
pub(crate) fn parse_capture_time(date_time_original: Option<&str>, subsec_time_original: Option<&str>) -> Option<DateTime<Utc>> {
    let date_str = date_time_original?.trim().trim_end_matches('\0');

    let naive_dt = NaiveDateTime::parse_from_str(date_str, "%Y:%m:%d %H:%M:%S").ok()?;

    let dt_with_subsec = match subsec_time_original.map(str::trim) {
        Some(subsec) if !subsec.is_empty() && subsec.len() <= 9 => match subsec.parse::<u32>() {
            Ok(subsec_num) => {
                // Subsec is a fraction of a second written as digits
                let subsec_nanos = subsec_num * 10u32.pow(9 - subsec.len() as u32);
                naive_dt.with_nanosecond(subsec_nanos).unwrap_or(naive_dt)
            }
            Err(_) => naive_dt,
        },
        _ => naive_dt,
    };

    Some(DateTime::from_naive_utc_and_offset(dt_with_subsec, Utc))
}

/// Parse the JSON array exiftool prints for one `-execute`
fn parse_exiftool_json(json_output: &str) -> Result<Vec<PhotoMetadata>> {
    // exiftool prints nothing at all when none of the files could be read
    if json_output.trim().is_empty() {
        return Ok(Vec::new());
    }

    let exiftool_data: Vec<ExiftoolOutput> = serde_json::from_str(json_output)
        .with_context(|| {
            let preview = if json_output.len() > 500 {
                let mut end = 500;
                while !json_output.is_char_boundary(end) {
                    end -= 1;
                }
                format!("{}...(truncated, {} bytes total)", &json_output[..end], json_output.len())
            } else {
                json_output.to_string()
            };
            format!("Failed to parse exiftool JSON output. First bytes: {}", preview)
        })?;

    Ok(exiftool_data.into_iter().map(ExiftoolOutput::into_metadata).collect())
}

pub struct ExiftoolRunner {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl ExiftoolRunner {
    /// Create a new ExiftoolRunner with a persistent exiftool process
    pub fn with_executable(executable: &Path) -> Result<Self> {
        let mut child = Command::new(executable)
            .args(["-stay_open", "True", "-@", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!(
                "Failed to spawn exiftool process ({}). Make sure exiftool is installed and in PATH.",
                executable.display()
            ))?;

        let stdin = BufWriter::new(
            child.stdin.take()
                .context("Failed to get stdin handle for exiftool process")?
        );

        let stdout = BufReader::new(
            child.stdout.take()
                .context("Failed to get stdout handle for exiftool process")?
        );

        tracing::debug!(executable = %executable.display(), "started exiftool");

        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }

    /// Extract metadata from multiple image files.
    ///
    /// Files exiftool cannot read are simply absent from the result. Records
    /// are returned even when some exposure values are missing; callers
    /// decide whether a partial record is good enough.
    pub fn extract(&mut self, paths: &[PathBuf]) -> Result<Vec<PhotoMetadata>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        writeln!(self.stdin, "-json")?;
        writeln!(self.stdin, "-charset")?;
        writeln!(self.stdin, "filename=utf8")?;
        for tag in EXIFTOOL_TAGS {
            writeln!(self.stdin, "{}", tag)?;
        }

        for path in paths {
            writeln!(self.stdin, "{}", path.display())?;
        }

        writeln!(self.stdin, "-execute")?;
        self.stdin.flush()?;

        // Read JSON output until {ready} sentinel
        let mut json_output = String::new();
        loop {
            let mut line = String::new();
            let bytes_read = self.stdout.read_line(&mut line)?;
            if bytes_read == 0 {
                bail!("Unexpected EOF from exiftool process");
            }

            let trimmed = line.trim();
            if trimmed.starts_with("{ready") && trimmed.ends_with('}') {
                break;
            }
            json_output.push_str(&line);
        }

        parse_exiftool_json(&json_output)
    }
}

impl Drop for ExiftoolRunner {
    fn drop(&mut self) {
        // Gracefully shut down exiftool
        let _ = writeln!(self.stdin, "-stay_open");
        let _ = writeln!(self.stdin, "False");
        let _ = self.stdin.flush();
        let _ = self.child.wait();
    }
}

/// Write an executable `/bin/sh` stand-in for exiftool that answers the
/// `-stay_open` protocol. `on_execute` runs for every `-execute` line; the
/// script records a clean `-stay_open False` shutdown in `stopped`.
#[cfg(all(test, unix))]
pub(crate) fn write_fake_exiftool(dir: &Path, on_execute: &str) -> std::io::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("fake-exiftool");
    let stopped = dir.join("stopped");
    let body = format!(
        "#!/bin/sh\nwhile read -r line; do\n  case \"$line\" in\n    -execute)\n      {}\n      ;;\n    False)\n      touch '{}'\n      exit 0\n      ;;\n  esac\ndone\n",
        on_execute,
        stopped.display()
    );
    std::fs::write(&script, body)?;
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;
    Ok(script)
}
