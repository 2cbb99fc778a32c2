use anyhow::{Context, Result};
use clap::Parser;
use line_length_counter::core_modules::histogram::DEFAULT_BUCKET_EDGES;
use line_length_counter::core_modules::pixel_grid::pixel_grid::PixelGrid;
use line_length_counter::parallel_pipeline::ParallelPipeline;
use line_length_counter::core_modules::calibration::PIXEL_UNIT;
use line_length_counter::pipeline::{Calibration, LengthHistogram, LineReport, ScanAxis, SemMetadata};
use log::{LevelFilter, debug, info, warn};
use serde::Serialize;
use std::path::PathBuf;

mod config;
mod inputs;

/// Measure the lengths of void lines in binarized (black material / white void) images
#[derive(Parser, Debug)]
#[command(name = "line_tester")]
#[command(about = "Measure void line lengths in binarized micrographs", long_about = None)]
struct Args {
    /// Image files or directories of images
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// JSON config with `parameters` and `calibration` sections
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Macro-options string, e.g. "horizontal vertical ignore min=3"
    #[arg(long)]
    options: Option<String>,

    /// Skip the horizontal pass
    #[arg(long)]
    no_horizontal: bool,

    /// Skip the vertical pass
    #[arg(long)]
    no_vertical: bool,

    /// Count lines that touch the image border
    #[arg(long)]
    include_border: bool,

    /// Lines must be strictly longer than this many pixels
    #[arg(short, long)]
    min_length: Option<usize>,

    /// Physical units per pixel along x
    #[arg(long)]
    pixel_width: Option<f64>,

    /// Physical units per pixel along y
    #[arg(long)]
    pixel_height: Option<f64>,

    /// Unit label of the calibration
    #[arg(short, long)]
    unit: Option<String>,

    /// Do not read calibration or info-bar height from SEM image metadata
    #[arg(long)]
    ignore_metadata: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: FormatArg,

    /// Append a length-distribution histogram to every report, plus one over all images
    #[arg(long)]
    histogram: bool,

    /// Number of worker tasks (defaults to the number of CPUs)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum FormatArg {
    Table,
    Json,
}

#[derive(Serialize)]
struct ImageResult {
    path: PathBuf,
    width: usize,
    height: usize,
    /// Rows of instrument info bar cut off below the content.
    #[serde(skip_serializing_if = "Option::is_none")]
    info_bar_rows: Option<usize>,
    report: LineReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    histogram: Option<LengthHistogram>,
}

#[derive(Serialize)]
struct CombinedHistogram {
    images: usize,
    unit: String,
    histogram: LengthHistogram,
}

#[derive(Serialize)]
struct BatchOutput<'a> {
    images: &'a [ImageResult],
    #[serde(skip_serializing_if = "Option::is_none")]
    combined: Option<&'a CombinedHistogram>,
}

/// A decoded image, already cropped to its content, and its own calibration.
struct LoadedImage {
    grid: PixelGrid,
    info_bar_rows: Option<usize>,
    calibration: Option<Calibration>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Argument Parsing & Setup ---
    let args = Args::parse();
    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let overrides = config::Overrides {
        options: args.options.clone(),
        no_horizontal: args.no_horizontal,
        no_vertical: args.no_vertical,
        include_border: args.include_border,
        min_length: args.min_length,
        pixel_width: args.pixel_width,
        pixel_height: args.pixel_height,
        unit: args.unit.clone(),
        ignore_metadata: args.ignore_metadata,
    };
    let settings = config::resolve(args.config.as_deref(), &overrides)?;
    let config = settings.pipeline_config()?;
    debug!("scan parameters: {}", config.parameters);

    // --- 2. Image Loading ---
    let paths = inputs::collect_images(&args.inputs)?;
    let images = paths
        .iter()
        .map(|path| load_image(path, &settings).with_context(|| format!("failed to load {}", path.display())))
        .collect::<Result<Vec<_>>>()?;
    let dimensions: Vec<(usize, usize, Option<usize>)> = images
        .iter()
        .map(|image| (image.grid.width(), image.grid.height(), image.info_bar_rows))
        .collect();

    // --- 3. Measurement ---
    let pipeline = match args.workers {
        Some(workers) => ParallelPipeline::with_workers(config, workers)?,
        None => ParallelPipeline::new(config)?,
    };
    let batch = images
        .into_iter()
        .map(|image| (image.grid, image.calibration))
        .collect();
    let measured = pipeline.measure_all_calibrated(batch).await?;
    pipeline.shutdown().await;

    let results: Vec<ImageResult> = paths
        .into_iter()
        .zip(dimensions)
        .zip(measured)
        .map(|((path, (width, height, info_bar_rows)), measured)| {
            let histogram = args
                .histogram
                .then(|| LengthHistogram::with_default_edges(&measured.report.lines));
            ImageResult {
                path,
                width,
                height,
                info_bar_rows,
                report: measured.report,
                histogram,
            }
        })
        .collect();
    let combined = args.histogram.then(|| combine_histograms(&results));

    // --- 4. Output ---
    match args.format {
        FormatArg::Json => {
            let output = BatchOutput {
                images: &results,
                combined: combined.as_ref(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        FormatArg::Table => {
            for result in &results {
                print_table(result);
            }
            if let Some(combined) = &combined {
                println!("# combined over {} images", combined.images);
                println!("{}", combined.histogram.table(&combined.unit));
            }
        }
    }

    Ok(())
}

fn load_image(path: &std::path::Path, settings: &config::Settings) -> Result<LoadedImage> {
    let mut grid = PixelGrid::open(path)?;
    if !settings.uses_metadata() {
        return Ok(LoadedImage {
            grid,
            info_bar_rows: None,
            calibration: None,
        });
    }

    let metadata = SemMetadata::read(path)?;
    let info_bar_rows = metadata.info_bar_height(grid.height());
    if let Some(rows) = info_bar_rows {
        info!("{}: cutting {rows} px info bar", path.display());
        let new_height = grid.height() - rows;
        grid = grid.crop_to_height(new_height);
    }
    let calibration = match metadata.calibration() {
        Some(scale) => {
            info!("{}: {} {}/px from metadata", path.display(), scale.pixel_width, scale.unit);
            Some(settings.calibration(Some(&metadata))?)
        }
        None => None,
    };

    Ok(LoadedImage {
        grid,
        info_bar_rows,
        calibration,
    })
}

/// One distribution over every measured image.
fn combine_histograms(results: &[ImageResult]) -> CombinedHistogram {
    let reports = || results.iter().map(|result| &result.report);
    let unit = reports()
        .next()
        .map_or(PIXEL_UNIT, |report| report.unit.as_str())
        .to_string();
    if reports().any(|report| report.unit != unit) {
        warn!("images use different units; the combined histogram mixes them");
    }
    CombinedHistogram {
        images: results.len(),
        unit,
        histogram: LengthHistogram::from_reports(&DEFAULT_BUCKET_EDGES, reports()),
    }
}

fn print_table(result: &ImageResult) {
    let report = &result.report;
    println!("# {} ({}x{})", result.path.display(), result.width, result.height);
    if let Some(rows) = result.info_bar_rows {
        println!("# info bar of {rows} px excluded");
    }
    println!(
        "# {} lines ({} horizontal, {} vertical)",
        report.len(),
        report.count_on(ScanAxis::Horizontal),
        report.count_on(ScanAxis::Vertical)
    );
    if let Some(mean) = report.mean_length() {
        println!("# mean length: {:.4} {}", mean, report.unit);
    }
    println!("{}", report.table());
    if let Some(histogram) = &result.histogram {
        println!();
        println!("{}", histogram.table(&report.unit));
    }
    println!();
}
