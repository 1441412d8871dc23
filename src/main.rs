// Command-line runner for the proposal engine. Scoring needs a trained model, so the
// binary only exposes the model-free stages: region proposals and the hierarchy stats.

mod log_setup;

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use nest_vision::{
    Frame, GraphSegmenter, PipelineConfig, ProposalStrategy, Proposer, StrategyKind,
};

#[derive(Parser)]
#[command(name = "nest_vision", version, about = "Region proposals for object detection")]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// JSON pipeline configuration; defaults are used for missing fields.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every admissible proposal of an image, one JSON object per line.
    Propose {
        image: PathBuf,
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
    },
    /// Print leaf, merge and proposal counts of the selective-search hierarchy.
    Segment { image: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Selective,
    Sliding,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn build_proposer(config: &PipelineConfig, strategy: StrategyKind) -> Proposer {
    Proposer::new(
        strategy,
        Arc::new(GraphSegmenter::new()),
        config.segmentation,
        config.selective_search,
        config.size_window,
    )
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    log_setup::setup_logging(&cli.log_level)?;
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Propose { image, strategy } => {
            match strategy {
                Some(StrategyArg::Selective) => config.strategy = StrategyKind::SelectiveSearch,
                Some(StrategyArg::Sliding) if !matches!(config.strategy, StrategyKind::SlidingWindow { .. }) => {
                    config.strategy = StrategyKind::sliding_window();
                }
                _ => {}
            }
            config.validate()?;
            let frame = Frame::open(&image)?;
            let mut proposer = build_proposer(&config, config.strategy);
            proposer.initialize(&frame)?;

            let mut out = BufWriter::new(io::stdout().lock());
            let mut count = 0usize;
            for rect in proposer.by_ref() {
                writeln!(out, "{}", serde_json::to_string(&rect)?)?;
                count += 1;
            }
            out.flush()?;
            info!(image = %image.display(), proposals = count, "proposals written");
        }
        Command::Segment { image } => {
            let frame = Frame::open(&image)?;
            let mut proposer = build_proposer(&config, StrategyKind::SelectiveSearch);
            proposer.initialize(&frame)?;
            let stats = proposer.stats().unwrap_or_default();
            let proposals = proposer.by_ref().count();
            let summary = serde_json::json!({
                "image": image.display().to_string(),
                "width": frame.width(),
                "height": frame.height(),
                "leaves": stats.leaves,
                "merges": stats.merges,
                "regions": stats.regions,
                "proposals": proposals,
            });
            println!("{summary}");
        }
    }
    Ok(())
}
