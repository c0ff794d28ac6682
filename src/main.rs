use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

use find_file_dups::{Cli, Config, DuplicateDetector, HashCache, collect_files, format_human_elapsed, print_results};

fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let mut builder = ConfigBuilder::new();
    // Falls back to UTC when the local offset cannot be determined
    let config = match builder.set_time_offset_to_local() {
        Ok(builder) | Err(builder) => builder.build(),
    };
    // Keep stdout clean for the JSON report
    let mode = if json { TerminalMode::Stderr } else { TerminalMode::Mixed };
    if let Err(e) = TermLogger::init(level, config, mode, ColorChoice::Auto) {
        eprintln!("Failed to initialize logger: {e}");
    }
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} ETA: {eta}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json);

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    debug!("Command line arguments: {:?}", cli);

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_cli(&cli);
    debug!("Effective config: {:?}", config);

    let absolute_path = cli
        .path
        .canonicalize()
        .with_context(|| format!("Failed to resolve path: {}", cli.path.display()))?;
    if !absolute_path.is_dir() {
        error!("Path is not a directory: {}", absolute_path.display());
        anyhow::bail!("Path is not a directory: {}", absolute_path.display());
    }

    let files = collect_files(&absolute_path, config.min_size_bytes());

    let cache = config
        .use_cache
        .then(|| Arc::new(HashCache::load(config.cache_path())));
    if let Some(cache) = &cache {
        let cache = Arc::clone(cache);
        ctrlc::set_handler(move || {
            warn!("Interrupted, saving hash cache before exit");
            if let Err(e) = cache.save() {
                error!("Failed to save hash cache: {:#}", e);
            }
            std::process::exit(130);
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    let mut detector = DuplicateDetector::new(config.workers)
        .with_quick_samples(config.quick_samples)
        .with_buffer_size(config.buffer_size);
    if let Some(cache) = &cache {
        detector = detector.with_cache(Arc::clone(cache));
    }
    if !cli.json {
        detector = detector.with_progress(progress_bar());
    }

    let result = detector.find(files);

    if cli.json {
        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &result).context("Failed to write JSON report")?;
        writeln!(stdout)?;
    } else {
        print_results(&result, &absolute_path);
    }

    // Not fatal: the report has already been written
    if let Some(cache) = &cache {
        if let Err(e) = cache.save() {
            error!("Failed to save hash cache: {:#}", e);
        }
    }

    info!("Completed in {}", format_human_elapsed(start_time.elapsed()));
    Ok(())
}
