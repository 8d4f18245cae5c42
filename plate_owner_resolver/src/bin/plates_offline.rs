use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::Parser;
use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use serde::Serialize;

use plate_owner_resolver::config::AppConfig;
use plate_owner_resolver::logging::{init_logging, LogFormat};
use plate_owner_resolver::metrics;
use plate_owner_resolver::plate_detection::dnn_ocr::TesseractOcr;
use plate_owner_resolver::plate_detection::image_reader::{
    annotated_path, collect_image_paths, read_image, write_image,
};
use plate_owner_resolver::plate_detection::object_detector::ObjectDetector;
use plate_owner_resolver::registry::SqliteRecordStore;
use plate_owner_resolver::{OwnerResolver, PlateEngine, PlateReport};

/// Recognizes plates in still images and looks up their owners.
#[derive(Parser, Debug)]
#[command(name = "plates_offline", version, about)]
struct Args {
    /// Image files or directories of images
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(long, env = "PLATES_CONFIG")]
    config: Option<PathBuf>,

    /// Where annotated images are written
    #[arg(long)]
    out_dir: Option<PathBuf>,

    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Write Prometheus metrics here when the batch is done
    #[arg(long)]
    metrics_out: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ImageReport {
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    result_image: Option<String>,
    details: Vec<PlateReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ImageReport {
    fn failed(path: &Path, error: impl ToString) -> Self {
        Self {
            image: path.display().to_string(),
            message: None,
            result_image: None,
            details: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

type Engine = PlateEngine<ObjectDetector, TesseractOcr>;

fn process_one(
    engine: &mut Engine,
    resolver: &OwnerResolver<SqliteRecordStore>,
    path: &Path,
    out_dir: Option<&Path>,
) -> anyhow::Result<ImageReport> {
    let frame = read_image(path)?;
    let result = engine.process_image(&frame, |plate| resolver.resolve(plate))?;

    let result_image = match out_dir {
        Some(dir) => {
            let target = annotated_path(dir, path);
            write_image(&target, &result.image)?;
            Some(target.display().to_string())
        }
        None => None,
    };

    Ok(ImageReport {
        image: path.display().to_string(),
        message: Some(result.message),
        result_image,
        details: result.detections,
        error: None,
    })
}

fn run_worker(
    worker: usize,
    config: &AppConfig,
    out_dir: Option<&Path>,
    paths: Receiver<PathBuf>,
    reports: Sender<ImageReport>,
) -> anyhow::Result<()> {
    let mut engine = PlateEngine::from_config(config)
        .with_context(|| format!("worker {worker} cannot load engines"))?;
    let store = SqliteRecordStore::open(&config.registry_db)
        .with_context(|| format!("cannot open registry {}", config.registry_db))?;
    let resolver = OwnerResolver::new(store, config.resolver.clone());
    tracing::info!(worker, "worker ready");

    for path in paths.iter() {
        let report = match process_one(&mut engine, &resolver, &path, out_dir) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(worker, image = %path.display(), error = %e, "image skipped");
                ImageReport::failed(&path, format!("{e:#}"))
            }
        };
        if reports.send(report).is_err() {
            break;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging(LogFormat::from_env());
    let args = Args::parse();

    let config = AppConfig::load(args.config.as_deref())?;
    let paths = collect_image_paths(&args.inputs)?;
    if let Some(dir) = args.out_dir.as_deref() {
        fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    }
    let workers = args.workers.max(1);
    tracing::info!(images = paths.len(), workers, "starting batch");

    let (path_tx, path_rx) = bounded::<PathBuf>(workers * 2);
    let (report_tx, report_rx) = unbounded::<ImageReport>();

    let worker_failures = crossbeam::scope(|s| {
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let paths = path_rx.clone();
            let reports = report_tx.clone();
            let config = &config;
            let out_dir = args.out_dir.as_deref();
            handles.push(s.spawn(move |_| run_worker(worker, config, out_dir, paths, reports)));
        }
        drop(path_rx);
        drop(report_tx);

        s.spawn(move |_| {
            for path in paths {
                if path_tx.send(path).is_err() {
                    break;
                }
            }
        });

        for report in report_rx.iter() {
            match serde_json::to_string(&report) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::error!(error = %e, "cannot serialize report"),
            }
        }

        handles
            .into_iter()
            .filter_map(|handle| match handle.join() {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(format!("{e:#}")),
                Err(_) => Some("worker panicked".to_string()),
            })
            .collect::<Vec<_>>()
    })
    .map_err(|_| anyhow!("batch threads panicked"))?;

    if let Some(path) = args.metrics_out.as_deref() {
        fs::write(path, metrics::encode_metrics()?)
            .with_context(|| format!("cannot write metrics to {}", path.display()))?;
    }

    for failure in &worker_failures {
        tracing::error!(error = %failure, "worker failed");
    }
    if worker_failures.len() == workers {
        return Err(anyhow!("no worker could start"));
    }
    Ok(())
}
