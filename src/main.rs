use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use dialoguer::Select;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use photosort::config::RunConfig;
use photosort::core::scorer::SimilarityScorer;
use photosort::scanner::{self, Item};
use photosort::{
    CancellationToken, ClusterReport, ClusteringEngine, Detector, DescriptorSet, Settings,
};

#[derive(Parser, Debug)]
#[command(name = "photosort", version, about = "Group similar photos into clusters")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Cluster the photos in a directory by visual similarity
    Cluster {
        /// Directory to scan
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Also write the clusters as JSON
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,
        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Count good feature matches between two photos
    Compare {
        /// Photo whose features are looked up
        query: PathBuf,
        /// Photo the features are matched against
        reference: PathBuf,
        #[command(flatten)]
        settings: SettingsArgs,
    },
}

#[derive(Args, Debug)]
struct SettingsArgs {
    /// Feature detector (asked interactively when omitted)
    #[arg(short, long, value_enum)]
    detector: Option<Detector>,
    /// Good matches an image needs to exceed to join a cluster
    #[arg(long, value_name = "N")]
    match_threshold: Option<usize>,
    /// Lowe ratio test threshold, between 0 and 1
    #[arg(long, value_name = "RATIO")]
    ratio_threshold: Option<f32>,
    /// Maximum features kept per image
    #[arg(long, value_name = "N")]
    max_features: Option<usize>,
    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,
    /// Settings file (default: `<config dir>/photosort/config.json`)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct ReportFile<'a> {
    generated_at: String,
    detector: Detector,
    match_threshold: usize,
    ratio_threshold: f32,
    clusters: &'a ClusterReport<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Cluster {
            path,
            json,
            settings,
        } => {
            let config = resolve_config(&settings)?;
            let token = CancellationToken::new();
            let handler_token = token.clone();
            ctrlc::set_handler(move || handler_token.cancel())
                .context("Failed to install Ctrl-C handler")?;

            println!("▶ Using the {} detector", config.detector);
            let items = describe_directory(&path, &config, &token)?;
            if items.is_empty() {
                println!("No readable images found.");
                return Ok(());
            }

            let (descriptors, names): (Vec<DescriptorSet>, Vec<String>) = items
                .into_iter()
                .map(|item| (item.descriptors, item.path.to_string_lossy().into_owned()))
                .unzip();

            println!("▶ Clustering {} images…", descriptors.len());
            let bar = progress_bar(descriptors.len() as u64)?;
            let tick = bar.clone();
            let engine = ClusteringEngine::new(config.options)?
                .with_cancellation_token(token)
                .with_progress(Box::new(move |p| {
                    tick.set_position(p.processed as u64);
                    tick.set_message(format!("{} clusters", p.clusters));
                }));
            let table = benchmark("clustering", || engine.run(&descriptors))?;
            bar.finish_and_clear();

            let report = ClusterReport::build(&table, &names)?;
            print!("{}", report);
            println!(
                "\n✅ {} images in {} clusters ({} with more than one photo)",
                names.len(),
                report.len(),
                report.groups().count()
            );

            if let Some(out) = json {
                write_report(&out, &config, &report)?;
                println!("✅ Wrote clusters to {}", out.display());
            }
        }

        Commands::Compare {
            query,
            reference,
            settings,
        } => {
            let config = resolve_config(&settings)?;
            let extractor = config.detector.extractor(config.max_features);
            let a = extractor
                .extract_path(&query)
                .with_context(|| format!("Failed to describe {:?}", query))?;
            let b = extractor
                .extract_path(&reference)
                .with_context(|| format!("Failed to describe {:?}", reference))?;

            let score = SimilarityScorer::new().good_match_count(&a, &b, config.options.ratio_threshold);
            println!(
                "{} features vs {} features: {} good matches ({} needs more than {})",
                a.len(),
                b.len(),
                score,
                config.detector,
                config.options.match_threshold
            );
            if score > config.options.match_threshold {
                println!("✅ Would share a cluster");
            } else {
                println!("✖ Would not share a cluster");
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Defaults < config file < command line. Prompts for a detector when none
/// is configured and stdin is interactive.
fn resolve_config(args: &SettingsArgs) -> Result<RunConfig> {
    let file = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::load_default()?,
    };
    let settings = file.merge(Settings {
        detector: args.detector,
        match_threshold: args.match_threshold,
        ratio_threshold: args.ratio_threshold,
        max_features: args.max_features,
        recursive: args.recursive.then_some(true),
        ..Default::default()
    });

    let fallback = match settings.detector {
        Some(detector) => detector,
        None if std::io::stdin().is_terminal() => {
            let choice = Select::new()
                .with_prompt("Pick a detector")
                .items(&Detector::ALL)
                .default(0)
                .interact()?;
            Detector::ALL[choice]
        }
        None => Detector::Orb,
    };
    let config = settings.resolve(fallback);
    config.options.validate()?;
    Ok(config)
}

fn describe_directory(dir: &Path, config: &RunConfig, token: &CancellationToken) -> Result<Vec<Item>> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message("Scanning for images…");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let paths = scanner::scan_directory(dir, config.recursive, &config.extensions)
        .with_context(|| format!("Failed to scan {:?}", dir))?;
    spinner.finish_with_message(format!("Found {} images", paths.len()));

    println!("▶ Preprocessing and detecting keypoints…");
    let extractor = config.detector.extractor(config.max_features);
    let bar = progress_bar(paths.len() as u64)?;
    let items = benchmark("feature extraction", || {
        scanner::ingest(paths, extractor.as_ref(), token, |_| bar.inc(1))
    })?;
    bar.finish_and_clear();
    Ok(items)
}

fn write_report(out: &Path, config: &RunConfig, report: &ClusterReport<String>) -> Result<()> {
    let file = File::create(out).with_context(|| format!("Failed to create {:?}", out))?;
    let mut writer = BufWriter::new(file);
    let contents = ReportFile {
        generated_at: Utc::now().to_rfc3339(),
        detector: config.detector,
        match_threshold: config.options.match_threshold,
        ratio_threshold: config.options.ratio_threshold,
        clusters: report,
    };
    serde_json::to_writer_pretty(&mut writer, &contents)?;
    writeln!(writer)?;
    writer.flush().with_context(|| format!("Failed to write {:?}", out))?;
    Ok(())
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    Ok(bar)
}

/// Run `f()`, log how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    log::info!("{} took {:.2?}", label, start.elapsed());
    result
}
