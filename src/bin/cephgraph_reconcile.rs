//! cephgraph-reconcile - compare PG metadata across the cluster and OSDs.
//!
//! Usage:
//!   cephgraph-reconcile --pgs 1.1a,1.1b --osds 2,3,4 [--output-dir DIR]
//!
//! Each listed OSD must have a maintenance pod. For every PG the raw
//! payloads are saved to the output directory and a table of the compared
//! fields is printed, followed by the source judged most up to date.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use cephgraph::command::require_command;
use cephgraph::reconcile::{self, locate_maintenance_pods, parse_group_ids, parse_osd_ids, MetadataCollector};
use cephgraph::{logging, Config, SystemRunner};

#[derive(Parser, Debug)]
#[command(name = "cephgraph-reconcile", version, about = "Report PG metadata divergence between replicas")]
struct Args {
    /// Comma-separated PG ids
    #[arg(long)]
    pgs: String,

    /// Comma-separated OSD ids
    #[arg(long)]
    osds: String,

    /// Namespace of the Rook cluster
    #[arg(long)]
    namespace: Option<String>,

    /// Where the per-source JSON payloads are saved
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Directory of the log file
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn build_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = Config::load_or_default(args.config.as_deref()).context("loading configuration")?;
    if let Some(namespace) = &args.namespace {
        config.cluster.namespace = namespace.clone();
    }
    if let Some(work_dir) = &args.work_dir {
        config.ingest.work_dir = work_dir.clone();
    }
    config.validate()?;
    Ok(config)
}

fn run(args: &Args, config: &Config) -> anyhow::Result<()> {
    let kubectl = config.cluster.kubectl.as_str();
    require_command(kubectl)?;

    let group_ids = parse_group_ids(&args.pgs);
    let osd_ids = parse_osd_ids(&args.osds);
    if group_ids.is_empty() || osd_ids.is_empty() {
        anyhow::bail!("--pgs and --osds need at least one id each");
    }

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let runner = SystemRunner;
    let namespace = config.cluster.namespace.as_str();
    let pods = locate_maintenance_pods(&runner, kubectl, namespace, &osd_ids)?;
    let collector = MetadataCollector::new(&runner, &config.cluster, namespace, &args.output_dir);

    let mut stdout = std::io::stdout().lock();
    let verdicts = reconcile::reconcile(&collector, &group_ids, &pods, &osd_ids, &mut stdout)?;
    tracing::info!("reported {} of {} PGs", verdicts.len(), group_ids.len());
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let log_file = logging::log_path(&config.ingest.work_dir, "reconcile", &logging::run_hash());
    if let Err(e) = logging::init(&log_file) {
        eprintln!("Error creating log file {}: {}", log_file.display(), e);
        return ExitCode::FAILURE;
    }

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            eprintln!("Log file: {}", log_file.display());
            ExitCode::FAILURE
        }
    }
}
