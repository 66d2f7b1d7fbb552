//! The `prism upload` command: run a batch through the ingestion pipeline.

use clap::{Args, ValueEnum};
use prism_core::config::StoreKind;
use prism_core::{
    BatchResult, Config, DerivativeFormat, OutputFormat as CoreOutputFormat, OutputWriter,
    TranscodeOptions, UploadPipeline, UploadedFile,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Arguments for the `upload` command.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Image files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Folder on the asset host (defaults to `upload.folder`)
    #[arg(long)]
    pub folder: Option<String>,

    /// Maximum output width
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_width: Option<u32>,

    /// Maximum output height
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_height: Option<u32>,

    /// Formats to produce, comma separated
    #[arg(long, value_delimiter = ',')]
    pub formats: Option<Vec<DerivativeFormat>>,

    /// Skip blur placeholder generation
    #[arg(long)]
    pub no_blur: bool,

    /// Asset host (defaults to `upload.store`)
    #[arg(long, value_enum)]
    pub store: Option<StoreArg>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

/// Supported output formats.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// The batch result as one JSON object
    Json,
    /// One JSON object per image, failure and summary
    Jsonl,
}

impl From<OutputFormat> for CoreOutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => CoreOutputFormat::Json,
            OutputFormat::Jsonl => CoreOutputFormat::JsonLines,
        }
    }
}

/// Asset host override.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StoreArg {
    Cloudinary,
    Local,
}

impl From<StoreArg> for StoreKind {
    fn from(store: StoreArg) -> Self {
        match store {
            StoreArg::Cloudinary => StoreKind::Cloudinary,
            StoreArg::Local => StoreKind::Local,
        }
    }
}

/// Execute the upload command.
pub async fn execute(args: UploadArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(store) = args.store {
        config.upload.store = store.into();
    }

    let options = transcode_options(&args, &config);
    let mut pipeline = UploadPipeline::from_config(&config)?;
    if let Some(folder) = &args.folder {
        pipeline = pipeline.with_folder(folder);
    }

    // The pipeline deletes what it consumes, so it only ever sees copies.
    let staging = tempfile::tempdir()?;
    let files = stage_inputs(&args.files, staging.path())?;
    tracing::info!(
        "Uploading {} file(s) to {}",
        files.len(),
        pipeline.store_name()
    );

    let spinner = create_spinner(files.len());
    let start = std::time::Instant::now();
    let result = pipeline.process_batch(files, &options).await;
    spinner.finish_and_clear();
    let result = result?;

    write_result(&result, &args)?;
    print_summary(&result, start.elapsed());
    Ok(())
}

/// Merge CLI overrides onto the configured transcode defaults.
fn transcode_options(args: &UploadArgs, config: &Config) -> TranscodeOptions {
    let mut options = TranscodeOptions::from_config(config);
    if let Some(max_width) = args.max_width {
        options.max_width = max_width;
    }
    if let Some(max_height) = args.max_height {
        options.max_height = max_height;
    }
    if let Some(formats) = &args.formats {
        options.formats = formats.clone();
    }
    if args.no_blur {
        options.blur = false;
    }
    options
}

/// Copy each input into `staging` and describe it as an inbound upload.
fn stage_inputs(inputs: &[PathBuf], staging: &Path) -> anyhow::Result<Vec<UploadedFile>> {
    inputs
        .iter()
        .enumerate()
        .map(|(i, input)| -> anyhow::Result<UploadedFile> {
            let input = PathBuf::from(shellexpand::tilde(&input.to_string_lossy()).into_owned());
            if !input.is_file() {
                anyhow::bail!("Not a file: {}", input.display());
            }
            let filename = input
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload")
                .to_string();

            let staged = staging.join(format!("{i}-{filename}"));
            std::fs::copy(&input, &staged)?;
            let mime_type = mime_type_for(&filename);
            Ok(UploadedFile::new(staged, filename, mime_type))
        })
        .collect()
}

/// MIME type from the file extension, as a browser would declare it.
fn mime_type_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "heic" | "heif" => "image/heic",
        _ => "application/octet-stream",
    }
}

fn write_result(result: &BatchResult, args: &UploadArgs) -> anyhow::Result<()> {
    if let Some(output_path) = &args.output {
        let file = File::create(output_path)?;
        let records = write_batch_to(BufWriter::new(file), result, args)?;
        tracing::info!("{} record(s) written to {:?}", records, output_path);
    } else {
        let records = write_batch_to(std::io::stdout().lock(), result, args)?;
        tracing::debug!("{} record(s) written to stdout", records);
    }
    Ok(())
}

/// Write `result` in the requested format; returns the number of JSON values.
fn write_batch_to<W: Write>(
    out: W,
    result: &BatchResult,
    args: &UploadArgs,
) -> std::io::Result<usize> {
    let mut writer = OutputWriter::new(out, args.format.into(), args.pretty);
    writer.write_batch(result)?;
    writer.flush()?;
    Ok(writer.records_written())
}

fn create_spinner(files: usize) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(format!("processing {files} file(s)..."));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print a short summary to stderr after the batch.
fn print_summary(result: &BatchResult, elapsed: Duration) {
    let summary = &result.summary;
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(
        stderr,
        "\n  Uploaded {} image(s) in {:.1}s: {} -> {} ({:.1}% smaller)",
        summary.total,
        elapsed.as_secs_f64(),
        human_bytes(summary.total_original_size),
        human_bytes(summary.total_optimized_size),
        summary.average_savings
    );
    for failure in &result.failures {
        let _ = writeln!(stderr, "  Failed: {} ({})", failure.filename, failure.reason);
    }
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
