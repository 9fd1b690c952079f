use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use metadata_reader::{find_images, resolve_exiftool, MetadataReader, SUPPORTED_EXTENSIONS};
use metadata_stats::summarize;
use photo_review::{find_duplicates, find_related_files, scan_sharpness, SharpnessCategory};
use serde::Serialize;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

mod config;

use config::AnalyzerConfig;

#[derive(Debug, Parser)]
#[command(name = "image-metadata-analyzer")]
#[command(about = "Summarize shooting habits, find blurry shots and duplicates in photo folders")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Summarize exposure settings, lenses and focal lengths
    Analyze {
        /// Folder to scan recursively
        root: PathBuf,

        /// Also write the summary as JSON
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,

        /// Maximum number of focal-length groups in the distribution
        #[arg(long, value_name = "N")]
        max_buckets: Option<usize>,

        /// Read embedded EXIF only, even for RAW files
        #[arg(long)]
        no_exiftool: bool,
    },

    /// Score sharpness and flag blurry shots
    Sharpness {
        /// Folder to scan recursively
        root: PathBuf,

        /// Blocks per side; the sharpest block decides the score
        #[arg(long, value_name = "N")]
        grid: Option<u32>,

        /// Scores below this are blurry
        #[arg(long, value_name = "SCORE")]
        blur: Option<f64>,

        /// Scores at or above this are sharp
        #[arg(long, value_name = "SCORE")]
        sharp: Option<f64>,

        /// List only blurry images
        #[arg(long)]
        only_blurry: bool,
    },

    /// Find byte-identical images
    Duplicates {
        /// Folder to scan recursively
        root: PathBuf,

        /// Also write the groups as JSON
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,
    },
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let mut filter = EnvFilter::from_default_env();
    for target in ["image_metadata_analyzer", "metadata_reader", "metadata_stats", "photo_review"] {
        filter = filter.add_directive(format!("{}={}", target, level).parse()?);
    }
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    Ok(())
}

fn progress_bar(len: usize, message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    match ProgressStyle::with_template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})") {
        Ok(style) => bar.set_style(style.progress_chars("#>-")),
        Err(err) => tracing::debug!(error = %err, "invalid progress template"),
    }
    bar.set_message(message);
    bar
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize results to JSON")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write output to {}", path.display()))?;
    println!("Results saved to: {}", path.display());
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn run_analyze(
    mut config: AnalyzerConfig,
    root: &Path,
    json: Option<&Path>,
    max_buckets: Option<usize>,
    no_exiftool: bool,
) -> Result<()> {
    if let Some(max_buckets) = max_buckets {
        config.analysis.max_focal_buckets = max_buckets;
    }
    if no_exiftool {
        config.reader.use_exiftool = false;
    }
    config.validate().context("validating configuration")?;

    let paths = find_images(root, SUPPORTED_EXTENSIONS)?;
    if paths.is_empty() {
        println!("No supported image files found in {}", root.display());
        return Ok(());
    }
    info!(count = paths.len(), root = %root.display(), "scanning images");

    let bar = progress_bar(paths.len(), "Reading metadata");
    let mut reader = MetadataReader::new(config.reader.clone());
    let records = reader.read_all(&paths, |n| bar.inc(n as u64));
    bar.finish_and_clear();

    let skipped = paths.len() - records.len();
    if skipped > 0 {
        warn!(skipped, "files without usable metadata were skipped");
    }

    let summary = summarize(&records, &config.analysis);
    println!("{}", summary);

    if let Some(json) = json {
        write_json(&summary, json)?;
    }
    Ok(())
}

fn run_sharpness(
    mut config: AnalyzerConfig,
    root: &Path,
    grid: Option<u32>,
    blur: Option<f64>,
    sharp: Option<f64>,
    only_blurry: bool,
) -> Result<()> {
    if let Some(grid) = grid {
        config.sharpness.grid_size = grid;
    }
    if let Some(blur) = blur {
        config.sharpness.blur_threshold = blur;
    }
    if let Some(sharp) = sharp {
        config.sharpness.sharp_threshold = sharp;
    }
    config.validate().context("validating configuration")?;

    let paths = find_images(root, SUPPORTED_EXTENSIONS)?;
    if paths.is_empty() {
        println!("No supported image files found in {}", root.display());
        return Ok(());
    }

    let exiftool = resolve_exiftool(config.reader.exiftool_path.as_deref());
    let bar = progress_bar(paths.len(), "Scoring sharpness");
    let results = scan_sharpness(&paths, &config.sharpness, &exiftool, |n| bar.inc(n as u64));
    bar.finish_and_clear();

    let mut sharp_count = 0;
    let mut acceptable_count = 0;
    let mut blurry_count = 0;
    let mut unreadable_count = 0;

    for result in &results {
        match result.category {
            Some(SharpnessCategory::Sharp) => sharp_count += 1,
            Some(SharpnessCategory::Acceptable) => acceptable_count += 1,
            Some(SharpnessCategory::Blurry) => blurry_count += 1,
            None => unreadable_count += 1,
        }

        if only_blurry && result.category != Some(SharpnessCategory::Blurry) {
            continue;
        }

        let name = display_name(&result.path);
        match (result.score, result.category) {
            (Some(score), Some(category)) => {
                let related = find_related_files(&result.path).len();
                println!("{:<40} {:>10.1}  {:<10}  related: {}", name, score, category.name(), related);
            }
            _ => println!("{:<40} {:>10}  {:<10}", name, "n/a", "Unreadable"),
        }
    }

    println!();
    println!(
        "Sharp: {}  Acceptable: {}  Blurry: {}  Unreadable: {}",
        sharp_count, acceptable_count, blurry_count, unreadable_count
    );
    Ok(())
}

fn run_duplicates(root: &Path, json: Option<&Path>) -> Result<()> {
    if !root.is_dir() {
        bail!("Folder not found: {}", root.display());
    }

    let bar = progress_bar(0, "Hashing candidates");
    let groups = find_duplicates(root, |done, total| {
        bar.set_length(total as u64);
        bar.set_position(done as u64);
    })?;
    bar.finish_and_clear();

    if groups.is_empty() {
        println!("No duplicates found in {}", root.display());
        return Ok(());
    }

    for (i, group) in groups.iter().enumerate() {
        let short_hash = group.hash.get(..12).unwrap_or(group.hash.as_str());
        println!(
            "Group {} ({} files, {} bytes each, sha256 {})",
            i + 1,
            group.files.len(),
            group.size,
            short_hash
        );
        for file in &group.files {
            println!("  {}", file.display());
        }
    }

    let redundant: u64 = groups.iter().map(|g| g.redundant_bytes()).sum();
    println!();
    println!("{} duplicate groups, {} redundant bytes", groups.len(), redundant);

    if let Some(json) = json {
        write_json(&groups, json)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let config = AnalyzerConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze { root, json, max_buckets, no_exiftool } => {
            run_analyze(config, &root, json.as_deref(), max_buckets, no_exiftool)
        }
        Commands::Sharpness { root, grid, blur, sharp, only_blurry } => {
            run_sharpness(config, &root, grid, blur, sharp, only_blurry)
        }
        Commands::Duplicates { root, json } => run_duplicates(&root, json.as_deref()),
    }
}
