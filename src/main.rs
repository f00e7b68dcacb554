use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use clap::{Args, Parser, Subcommand};
use log::info;

use waveform_prep::catalog::CatalogKind;
use waveform_prep::data::model::PartitionSummary;
use waveform_prep::export::{write_bundle, write_scale_params};
use waveform_prep::{FileRecordLoader, PrepConfig, SplitOrder, prepare};

#[derive(Parser)]
#[command(name = "waveform-prep")]
#[command(about = "Load, partition and rescale labelled detector waveforms", version)]
struct Cli {
    /// Increase verbosity (ignored when RUST_LOG is set)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the bundle and write train/val/test parquet files plus scale params
    Prepare {
        #[command(flatten)]
        prep: PrepArgs,
        /// Output directory
        #[arg(short, long)]
        out_dir: PathBuf,
        /// Return partitions unnormalised
        #[arg(long)]
        no_rescale: bool,
    },

    /// Load and partition without rescaling; print partition counts
    Summary {
        #[command(flatten)]
        prep: PrepArgs,
    },
}

#[derive(Args)]
struct PrepArgs {
    /// Directory holding one <category>.{parquet,json,csv} per category
    #[arg(short, long)]
    data_dir: PathBuf,
    /// Catalog to load: training or evaluation
    #[arg(long, default_value_t = CatalogKind::Training)]
    catalog: CatalogKind,
    /// JSON config file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    train_ratio: Option<f64>,
    #[arg(long)]
    test_ratio: Option<f64>,
    /// Shuffle each category with this seed before splitting
    #[arg(long)]
    seed: Option<u64>,
}

impl PrepArgs {
    fn config(&self, verbose: bool) -> Result<PrepConfig> {
        let mut config = match &self.config {
            Some(path) => PrepConfig::from_json_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => PrepConfig::default(),
        };
        if let Some(r) = self.train_ratio {
            config.train_ratio = r;
        }
        if let Some(r) = self.test_ratio {
            config.test_ratio = r;
        }
        if let Some(seed) = self.seed {
            config.split_order = SplitOrder::Shuffled { seed };
        }
        if verbose {
            config.verbose = true;
        }
        Ok(config)
    }
}

fn summary_table(summaries: &[PartitionSummary]) -> Result<String> {
    let columns: Vec<(&str, ArrayRef)> = vec![
        (
            "partition",
            Arc::new(StringArray::from(
                summaries.iter().map(|s| s.kind.to_string()).collect::<Vec<_>>(),
            )),
        ),
        (
            "events",
            Arc::new(UInt64Array::from_iter_values(summaries.iter().map(|s| s.len as u64))),
        ),
        (
            "signal",
            Arc::new(UInt64Array::from_iter_values(summaries.iter().map(|s| s.signal as u64))),
        ),
        (
            "background",
            Arc::new(UInt64Array::from_iter_values(
                summaries.iter().map(|s| s.background as u64),
            )),
        ),
        (
            "total_weight",
            Arc::new(Float64Array::from_iter_values(summaries.iter().map(|s| s.total_weight))),
        ),
    ];
    let batch = RecordBatch::try_from_iter(columns)?;
    Ok(pretty_format_batches(&[batch])?.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    let verbose = cli.verbose > 0;

    match cli.command {
        Commands::Prepare {
            prep,
            out_dir,
            no_rescale,
        } => {
            let mut config = prep.config(verbose)?;
            if no_rescale {
                config.rescale = false;
            }
            let loader = FileRecordLoader::new(&prep.data_dir);
            let data = prepare(&loader, prep.catalog, &config)
                .with_context(|| format!("preparing {} catalog", prep.catalog))?;

            let paths = write_bundle(&data.bundle, &out_dir)?;
            for path in &paths {
                info!("wrote {}", path.display());
            }
            if let Some(scale) = &data.scale {
                let path = out_dir.join("scale_params.json");
                write_scale_params(scale, &path)?;
                info!("wrote {}", path.display());
            }
            println!("{}", summary_table(&data.bundle.summary())?);
        }

        Commands::Summary { prep } => {
            let mut config = prep.config(verbose)?;
            config.rescale = false;
            let loader = FileRecordLoader::new(&prep.data_dir);
            let data = prepare(&loader, prep.catalog, &config)
                .with_context(|| format!("partitioning {} catalog", prep.catalog))?;
            println!("{}", summary_table(&data.bundle.summary())?);
        }
    }

    Ok(())
}
