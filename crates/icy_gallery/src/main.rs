#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming};

use icy_gallery::{
    Cell, CellRenderer, Gallery, GridRecord, LoadStatus, ManualScheduler, MediaRecord, MemorySelectionStore, Options, PageLoader, PageQuery,
    RenderItemError, Selection, VERSION, VecSource, VirtualGrid, options::get_config_dir,
};

#[derive(Parser, Debug)]
#[command(version, about = "Headless scroll simulator for the icy_gallery grid", long_about = None)]
pub struct Args {
    /// JSON file with an array of records; generated records are used when omitted
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Number of generated records
    #[arg(long, default_value_t = 20_000)]
    count: usize,

    /// Container width in pixels
    #[arg(long, default_value_t = 1280.0)]
    width: f32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 800.0)]
    height: f32,

    /// Number of simulated frames
    #[arg(long, default_value_t = 600)]
    frames: usize,

    /// Simulated fetch latency in milliseconds
    #[arg(long, default_value_t = 5)]
    latency: u64,

    /// Seed for the scroll pattern
    #[arg(long)]
    seed: Option<u64>,

    /// Options file (defaults to the one in the configuration directory)
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Write the effective options back to the configuration directory
    #[arg(long, default_value_t = false)]
    save_options: bool,
}

/// Renderer that only counts, standing in for real card templates
#[derive(Default)]
struct CountingRenderer {
    rendered: u64,
    updated: u64,
    recycled: u64,
}

impl CellRenderer<MediaRecord> for CountingRenderer {
    type Node = String;

    fn create(&mut self, record: &MediaRecord, index: usize) -> Result<String, RenderItemError> {
        if record.name.is_empty() && record.id.is_none() {
            return Err(RenderItemError::new(index, "record has neither id nor name"));
        }
        Ok(format!("card:{}", record.key()))
    }

    fn rendered(&mut self, _record: &MediaRecord, _cell: &mut Cell<MediaRecord, String>) {
        self.rendered += 1;
    }

    fn updated(&mut self, record: &MediaRecord, cell: &mut Cell<MediaRecord, String>) {
        self.updated += 1;
        cell.node = Some(format!("card:{}", record.key()));
    }

    fn recycled(&mut self, _cell: &mut Cell<MediaRecord, String>) {
        self.recycled += 1;
    }
}

fn generate_records(count: usize) -> Vec<MediaRecord> {
    (0..count)
        .map(|i| {
            let mut record = MediaRecord::with_id(format!("{i}"), format!("image_{i:06}.png"));
            record.rating = Some((i % 6) as u8);
            record
        })
        .collect()
}

fn read_records(path: &Path) -> anyhow::Result<Vec<MediaRecord>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("can't read {}", path.display()))?;
    let records = serde_json::from_str(&text).with_context(|| format!("{} is not a JSON record array", path.display()))?;
    Ok(records)
}

fn start_logging() -> Option<LoggerHandle> {
    let Some(log_dir) = get_config_dir() else {
        eprintln!("Failed to create log file");
        return None;
    };
    if std::fs::create_dir_all(&log_dir).is_err() {
        eprintln!("Failed to create log directory");
        return None;
    }
    let result = Logger::try_with_env_or_str("info").and_then(|logger| {
        logger
            .log_to_file(FileSpec::default().directory(&log_dir).basename("icy_gallery").suffix("log").suppress_timestamp())
            .rotate(Criterion::Size(64 * 1024), Naming::Numbers, Cleanup::KeepLogFiles(3))
            .create_symlink(log_dir.join("icy_gallery.log"))
            .duplicate_to_stderr(flexi_logger::Duplicate::Warn)
            .start()
    });
    match result {
        Ok(handle) => Some(handle),
        Err(err) => {
            eprintln!("Failed to start logger: {err}");
            None
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _logger = start_logging();
    log::info!("Starting icy_gallery simulator {}", *VERSION);

    let options = match &args.options {
        Some(path) => Options::load_from(path).with_context(|| format!("can't load options from {}", path.display()))?,
        None => Options::load_options(),
    };
    if args.save_options {
        if let Err(err) = options.store_options() {
            log::error!("Error writing options file: {err}");
        }
    }

    let records = match &args.input {
        Some(path) => read_records(path)?,
        None => generate_records(args.count),
    };
    let record_count = records.len();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("page-loader")
        .enable_all()
        .build()
        .context("can't create tokio runtime")?;

    let source = Arc::new(VecSource::new(records).with_latency(Duration::from_millis(args.latency)));
    let loader = PageLoader::new(source, runtime.handle().clone(), options.loader_config(), PageQuery::default());
    let grid = VirtualGrid::new(
        options.grid_config(),
        CountingRenderer::default(),
        ManualScheduler::new(),
        Box::new(MemorySelectionStore::new()),
    );
    let mut gallery = Gallery::new(grid, loader);

    if let Some(seed) = args.seed {
        fastrand::seed(seed);
    }

    let start = Instant::now();
    let mut now = start;
    gallery.on_resize(args.width, args.width, args.height, now);
    gallery.reset(PageQuery::default());
    gallery.set_selection(Selection::new(["3", "7", "42"], Some("7".to_string())));

    let mut offset = 0.0f32;
    for frame in 0..args.frames {
        now += Duration::from_millis(16);
        runtime.block_on(gallery.settle());

        // mostly forward, sometimes back, like a user skimming
        let step = fastrand::f32() * args.height * 0.5;
        offset = if fastrand::u8(0..10) < 8 { offset + step } else { (offset - step).max(0.0) };
        let max_offset = (gallery.grid().content_height() - args.height).max(0.0);
        offset = offset.min(max_offset);
        gallery.on_scroll(offset);

        for token in gallery.grid_mut().scheduler_mut().take_due() {
            gallery.frame(token, now);
        }
        gallery.grid_mut().drain_messages();

        if frame % 100 == 0 {
            log::info!(
                "frame {frame}: offset {offset:.0}, items {}, window {:?}, status {:?}",
                gallery.loader().items().len(),
                gallery.grid().window(),
                gallery.status()
            );
        }
    }

    let stats = gallery.grid().stats();
    let renderer = gallery.grid().renderer();
    println!("records in source: {record_count}");
    println!("records loaded:    {}", gallery.loader().items().len());
    println!("fetches:           {}", gallery.loader().fetch_count());
    println!("status:            {:?}", gallery.status());
    println!("render passes:     {}", stats.passes);
    println!("cells created:     {}", stats.created);
    println!("cards rendered:    {}", renderer.rendered);
    println!("cells updated:     {} ({} hook calls)", stats.updated, renderer.updated);
    println!("cells recycled:    {} ({} hook calls)", stats.recycled, renderer.recycled);
    println!("cells discarded:   {}", stats.discarded);
    println!("render failures:   {}", stats.render_failures);
    println!("pool size:         {}", gallery.grid().pool_len());
    println!("elapsed:           {:?}", start.elapsed());

    if let LoadStatus::Error(message) = gallery.status() {
        log::warn!("simulation ended with a load error: {message}");
    }
    gallery.dispose();
    log::info!("Shutting down.");
    Ok(())
}
