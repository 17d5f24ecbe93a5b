use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use jetcore::data::image::ImageConfig;
use rustjet::data::dataset::{DatasetConfig, GraphDataset, ImageDataset};
use rustjet::data::store::SqliteColumnStore;

/// Convert a jet ntuple store into graph batches or a jet image stack.
#[derive(Parser, Debug)]
#[command(name = "rustjet")]
struct Args {
    /// Path to the SQLite jet ntuple store
    #[arg(long)]
    dataset: PathBuf,

    /// Output directory for persisted graph batches
    #[arg(long, default_value = "processed")]
    out: PathBuf,

    /// Number of events to process (-1 means all)
    #[arg(long = "n-events", default_value_t = -1)]
    n_events: i64,

    /// Number of events to merge into one persisted batch
    #[arg(long = "n-events-merge", default_value_t = 1000)]
    n_events_merge: usize,

    /// Disable the mass/pT selection window
    #[arg(long)]
    no_window_cut: bool,

    /// Build the rasterized image stack instead of graph batches
    #[arg(long)]
    images: bool,

    /// Image resolution in pixels per axis
    #[arg(long, default_value_t = 224)]
    resolution: usize,

    /// Half-width of the image eta/phi range
    #[arg(long, default_value_t = 0.8)]
    image_range: f32,

    /// Compress persisted batches with zstd
    #[arg(long)]
    compress: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let mut config = DatasetConfig {
        data_path: args.dataset.clone(),
        processed_dir: args.out,
        n_events: args.n_events,
        n_events_merge: args.n_events_merge,
        compress: args.compress,
        image: ImageConfig {
            resolution: args.resolution,
            range_min: -args.image_range,
            range_max: args.image_range,
            ..ImageConfig::default()
        },
        ..DatasetConfig::default()
    };
    config.window.enabled = !args.no_window_cut;

    let store = SqliteColumnStore::new(&args.dataset);

    if args.images {
        let (array, summary) = ImageDataset::new(config).make_images(&store)?;
        println!(
            "built image stack {:?} from {} events ({} kept, {} outside window, {} not one-hot)",
            array.shape(),
            summary.events_read,
            summary.events_kept,
            summary.skipped_window,
            summary.skipped_not_one_hot
        );
    } else {
        let summary = GraphDataset::new(config).process(&store)?;
        println!(
            "wrote {} graph batches from {} events ({} kept, {} outside window, {} not one-hot, {} without tracks)",
            summary.batches_written,
            summary.events_read,
            summary.events_kept,
            summary.skipped_window,
            summary.skipped_not_one_hot,
            summary.skipped_empty
        );
    }

    Ok(())
}
