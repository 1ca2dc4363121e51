//! cephgraph-ingest - load a stopped OSD's object inventory into a graph.
//!
//! Usage:
//!   cephgraph-ingest <OSD_POD> <NAMESPACE> [GRAPH] [--batch-size N] [--dry-run]
//!
//! The OSD must be stopped (its pod running in maintenance mode) so that
//! `ceph-objectstore-tool` can open the data path. The raw listing is
//! kept in the run directory next to the log file.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use cephgraph::command::require_command;
use cephgraph::inventory::{fetch_inventory, validate_osd_pod};
use cephgraph::{
    logging, parse_inventory, BoltStore, Config, InventoryFormat, InventorySource, MemoryStore,
    SystemRunner,
};

#[derive(Parser, Debug)]
#[command(name = "cephgraph-ingest", version, about = "Load an OSD's object inventory into a graph store")]
struct Args {
    /// OSD pod name, e.g. rook-ceph-osd-3-6c9d8b7f5-xk2lp
    osd_pod: String,

    /// Kubernetes namespace of the pod
    namespace: String,

    /// Graph store address (host:port or bolt:// URI)
    graph: Option<String>,

    #[arg(long)]
    user: Option<String>,

    #[arg(long, env = "CEPHGRAPH_GRAPH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Objects per transaction
    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long, value_enum)]
    format: Option<InventoryFormat>,

    /// Parent directory for run artifacts and the log file
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Load into an in-process store instead of connecting
    #[arg(long)]
    dry_run: bool,
}

fn build_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = Config::load_or_default(args.config.as_deref()).context("loading configuration")?;

    config.cluster.namespace = args.namespace.clone();
    if let Some(graph) = &args.graph {
        config.graph.uri = graph.clone();
    }
    if let Some(user) = &args.user {
        config.graph.user = user.clone();
    }
    if let Some(password) = &args.password {
        config.graph.password = password.clone();
    }
    if let Some(batch_size) = args.batch_size {
        config.ingest.batch_size = batch_size;
    }
    if let Some(format) = args.format {
        config.ingest.format = format;
    }
    if let Some(work_dir) = &args.work_dir {
        config.ingest.work_dir = work_dir.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn run(args: &Args, config: &Config, hash: &str, log_file: &std::path::Path) -> anyhow::Result<()> {
    let kubectl = config.cluster.kubectl.as_str();
    require_command(kubectl)?;

    let source = InventorySource::for_pod(&args.osd_pod, &config.cluster.namespace, &config.cluster)?;
    tracing::info!(osd = source.osd_id, pod = %source.pod, namespace = %source.namespace, "starting ingest");

    let runner = SystemRunner;
    validate_osd_pod(&runner, kubectl, &source)?;

    let run_dir = logging::run_dir(&config.ingest.work_dir, hash);
    std::fs::create_dir_all(&run_dir).with_context(|| format!("creating {}", run_dir.display()))?;
    let artifact = run_dir.join(format!("osd-{}-pgs.json", source.osd_id));

    let raw = fetch_inventory(&runner, kubectl, &source, &artifact)?;
    tracing::info!("Splitting object list into PGs...");
    let groups = parse_inventory(&raw, config.ingest.format)?;
    tracing::info!(
        "Found {} PGs with {} objects",
        groups.len(),
        groups.iter().map(|g| g.object_ids.len()).sum::<usize>()
    );

    let node_id = i64::from(source.osd_id);
    let batch_size = config.ingest.batch_size;
    let mut stdout = std::io::stdout();
    if args.dry_run {
        tracing::info!("dry run: loading into an in-process store");
        let mut store = MemoryStore::new();
        cephgraph::loader::ingest(&mut store, node_id, &groups, batch_size, &mut stdout).await?;
    } else {
        let mut store = BoltStore::connect(&config.graph)
            .await
            .with_context(|| format!("connecting to {}", config.graph.uri))?;
        cephgraph::loader::ingest(&mut store, node_id, &groups, batch_size, &mut stdout).await?;
    }

    writeln!(stdout, "Processing complete for OSD pod {}. Logs in {}", source.pod, log_file.display())?;
    writeln!(stdout, "PGs recorded locally: {}", artifact.display())?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let hash = logging::run_hash();
    let log_file = logging::log_path(&config.ingest.work_dir, "ingest", &hash);
    if let Err(e) = logging::init(&log_file) {
        eprintln!("Error creating log file {}: {}", log_file.display(), e);
        return ExitCode::FAILURE;
    }

    match run(&args, &config, &hash, &log_file).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            eprintln!("Log file: {}", log_file.display());
            ExitCode::FAILURE
        }
    }
}
