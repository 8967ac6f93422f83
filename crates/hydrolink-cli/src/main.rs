//! `hydrolink` command line harness.
//!
//! Loads JSON feature tables, runs the linkage pipeline and writes the segment
//! rules or the final grid rows.  Data-quality findings never change the exit
//! status; only unreadable inputs and fatal schema errors do.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::Level;

use hydrolink_core::network::schema::{parse_arcs, parse_nodes, ArcFeature, NodeFeature};
use hydrolink_core::{GridInputs, LinkageConfig, LinkagePipeline, NetworkStage};

#[derive(Parser, Debug)]
#[command(name = "hydrolink", about = "Links a water-resources network to a groundwater grid")]
struct Cli {
    /// Log verbosity: -v for debug, -vv for trace.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify the network and emit the river segment rules.
    Segments {
        #[command(flatten)]
        network: NetworkArgs,

        /// Rules file to write; stdout when absent.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run both stages and write the linkage rows with diagnostics.
    Link {
        #[command(flatten)]
        network: NetworkArgs,

        /// JSON overlay results: polygon layers and split river pieces.
        #[arg(short, long)]
        layers: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct NetworkArgs {
    /// JSON array of node features.
    #[arg(long)]
    nodes: PathBuf,

    /// JSON array of arc features.
    #[arg(long)]
    arcs: PathBuf,

    /// Optional JSON config; defaults apply to every missing field.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_target(false).with_max_level(level).init();

    match cli.command {
        Command::Segments { network, output } => {
            let (_, stage) = plan(&network)?;
            let rules = stage.plan.segment_rules();
            match output {
                Some(path) => fs::write(&path, rules)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => print!("{rules}"),
            }
            tracing::info!(
                segments = stage.plan.segments().len(),
                warnings = stage.diagnostics.len(),
                "segment rules written"
            );
        }
        Command::Link { network, layers, output } => {
            let (pipeline, stage) = plan(&network)?;
            let inputs: GridInputs = read_json(&layers)?;
            let outcome = pipeline.link_grid(&stage, inputs);

            let fields = &pipeline.config().output_fields;
            let rows: Vec<_> = outcome.rows.iter().map(|r| r.to_json(fields)).collect();
            let doc = json!({
                "rows": rows,
                "connectivity": outcome.connectivity,
                "diagnostics": outcome.diagnostics.grouped(),
            });
            let text = serde_json::to_string_pretty(&doc)?;
            fs::write(&output, text).with_context(|| format!("writing {}", output.display()))?;

            if outcome.diagnostics.has_errors() {
                tracing::warn!("some layers were left out of the grid; see diagnostics");
            }
            tracing::info!(rows = rows.len(), output = %output.display(), "linkage written");
        }
    }
    Ok(())
}

fn plan(args: &NetworkArgs) -> Result<(LinkagePipeline, NetworkStage)> {
    let config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            LinkageConfig::from_json(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => LinkageConfig::default(),
    };

    let node_features: Vec<NodeFeature> = read_json(&args.nodes)?;
    let arc_features: Vec<ArcFeature> = read_json(&args.arcs)?;
    if node_features.is_empty() {
        bail!("{} holds no node features", args.nodes.display());
    }

    let nodes = parse_nodes(&node_features, &config.node_fields)
        .with_context(|| format!("node table {}", args.nodes.display()))?;
    let arcs = parse_arcs(&arc_features, &config.arc_fields)
        .with_context(|| format!("arc table {}", args.arcs.display()))?;

    let pipeline = LinkagePipeline::new(config);
    let stage = pipeline.plan_network(&nodes, &arcs);
    Ok((pipeline, stage))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
