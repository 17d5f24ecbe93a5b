use std::error::Error;
use std::path::PathBuf;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use jetcore::algorithm::filter::WindowFilter;
use jetcore::algorithm::label::DerivedLabel;
use jetcore::data::event::{
    default_raw_labels, default_spectators, default_track_features, Event,
};
use jetcore::data::graph::JetGraph;
use jetcore::data::image::{project_event, ImageConfig, JetImage};

use crate::data::io::GraphBatchWriter;
use crate::data::store::{ColumnRequest, ColumnStore};

/// Full configuration surface of the conversion pipeline. Passed explicitly
/// into the entry points; there is no process-global state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Dataset root (the ntuple store file).
    pub data_path: PathBuf,
    /// Output directory for persisted graph batches.
    pub processed_dir: PathBuf,
    /// Per-track feature branches, in node-vector order.
    pub features: Vec<String>,
    /// Spectator branches; index 0 is the mass, index 1 the pT used by the
    /// selection window.
    pub spectators: Vec<String>,
    /// Raw label branches.
    pub labels: Vec<String>,
    /// Number of events to read, -1 for all.
    pub n_events: i64,
    /// Batch size for persisted graph chunks.
    pub n_events_merge: usize,
    pub window: WindowFilter,
    pub image: ImageConfig,
    /// Compress persisted batches with zstd.
    pub compress: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::new(),
            processed_dir: PathBuf::from("processed"),
            features: default_track_features(),
            spectators: default_spectators(),
            labels: default_raw_labels(),
            n_events: -1,
            n_events_merge: 1000,
            window: WindowFilter::default(),
            image: ImageConfig::default(),
            compress: false,
        }
    }
}

impl DatasetConfig {
    fn request(&self) -> ColumnRequest {
        ColumnRequest {
            features: self.features.clone(),
            spectators: self.spectators.clone(),
            labels: self.labels.clone(),
            n_events: self.n_events,
        }
    }
}

/// Per-run accounting. Skipped events are silently excluded from the
/// output, never errors; the counts make the exclusions testable:
/// `events_read == events_kept + skipped_window + skipped_not_one_hot +
/// skipped_empty`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProcessSummary {
    pub events_read: usize,
    /// Records emitted on the output path.
    pub events_kept: usize,
    pub skipped_window: usize,
    pub skipped_not_one_hot: usize,
    /// Graph path only: jets without tracks.
    pub skipped_empty: usize,
    pub batches_written: usize,
}

/// The filtered, labeled event set both output paths consume.
pub struct SelectedEvents {
    /// Kept events with their source event index.
    pub events: Vec<(usize, Event)>,
    pub labels: Vec<DerivedLabel>,
    /// Spectator values per kept event, in configured order.
    pub spectators: Vec<Vec<f32>>,
    pub summary: ProcessSummary,
}

/// Read the requested columns, derive labels, and apply the selection
/// window plus the one-hot invariant. Configuration problems (missing
/// branches, misaligned columns) abort here, before any event is
/// processed.
pub fn select_events(
    store: &dyn ColumnStore,
    config: &DatasetConfig,
) -> Result<SelectedEvents, Box<dyn Error>> {
    if config.spectators.len() < 2 {
        return Err(format!(
            "selection window needs mass and pT spectators, got {:?}",
            config.spectators
        )
        .into());
    }

    let request = config.request();
    let bundle = store.read_columns(&request)?;
    let n_events = bundle.validate(&request)?;

    let mass_column = &bundle.spectators[&config.spectators[0]];
    let pt_column = &bundle.spectators[&config.spectators[1]];

    let mut selected = SelectedEvents {
        events: Vec::new(),
        labels: Vec::new(),
        spectators: Vec::new(),
        summary: ProcessSummary { events_read: n_events, ..ProcessSummary::default() },
    };

    for index in 0..n_events {
        let event = bundle.event(index);
        let label = DerivedLabel::from_event(&event);

        if config.window.enabled && !config.window.in_window(mass_column[index], pt_column[index]) {
            selected.summary.skipped_window += 1;
            continue;
        }
        if !label.is_one_hot() {
            selected.summary.skipped_not_one_hot += 1;
            continue;
        }

        let spectators: Vec<f32> = config
            .spectators
            .iter()
            .map(|name| bundle.spectators[name][index])
            .collect();
        selected.events.push((index, event));
        selected.labels.push(label);
        selected.spectators.push(spectators);
    }

    selected.summary.events_kept = selected.events.len();
    Ok(selected)
}

/// Graph path: one fully connected graph per kept jet, persisted in
/// fixed-size batches.
pub struct GraphDataset {
    pub config: DatasetConfig,
}

impl GraphDataset {
    pub fn new(config: DatasetConfig) -> Self {
        GraphDataset { config }
    }

    /// Run the conversion and persist all batches, including the final
    /// partial one.
    pub fn process(&self, store: &dyn ColumnStore) -> Result<ProcessSummary, Box<dyn Error>> {
        let selected = select_events(store, &self.config)?;
        let mut summary = selected.summary;

        let mut writer = GraphBatchWriter::new(
            &self.config.processed_dir,
            self.config.n_events_merge,
            self.config.compress,
        )?;

        for ((event_index, event), label) in selected.events.iter().zip(selected.labels.iter()) {
            let graph = JetGraph::from_event(
                event,
                &self.config.features,
                &self.config.spectators,
                label,
                *event_index,
            );
            match graph {
                Some(graph) => writer.append(graph)?,
                None => summary.skipped_empty += 1,
            }
        }

        let batch_ids = writer.finish()?;
        summary.events_kept -= summary.skipped_empty;
        summary.batches_written = batch_ids.len();
        Ok(summary)
    }
}

/// Dense image stack of shape (n_events, resolution, resolution, 1) with
/// the parallel label array.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageArray {
    pub n_events: usize,
    pub resolution: usize,
    /// Row-major (event, x, y, channel) buffer.
    pub data: Vec<f32>,
    pub labels: Vec<[i64; 2]>,
}

impl ImageArray {
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (self.n_events, self.resolution, self.resolution, 1)
    }

    /// Pixel buffer of one event.
    pub fn image(&self, index: usize) -> &[f32] {
        let stride = self.resolution * self.resolution;
        &self.data[index * stride..(index + 1) * stride]
    }
}

/// Image path: one rasterized jet image per kept event, returned as a
/// single array rather than chunked to disk.
pub struct ImageDataset {
    pub config: DatasetConfig,
}

impl ImageDataset {
    pub fn new(config: DatasetConfig) -> Self {
        ImageDataset { config }
    }

    pub fn make_images(
        &self,
        store: &dyn ColumnStore,
    ) -> Result<(ImageArray, ProcessSummary), Box<dyn Error>> {
        for name in self.config.image.required_features() {
            if !self.config.features.iter().any(|feature| feature == name) {
                return Err(format!(
                    "image projection needs feature column '{}', not in the requested branches",
                    name
                )
                .into());
            }
        }

        let selected = select_events(store, &self.config)?;

        // per-event projections are independent, order restored by collect
        let images: Result<Vec<JetImage>, String> = selected
            .events
            .par_iter()
            .map(|(index, event)| {
                project_event(event, &self.config.image)
                    .ok_or_else(|| format!("missing image feature column in event {}", index))
            })
            .collect();
        let images = images?;

        let resolution = self.config.image.resolution;
        let mut data = Vec::with_capacity(images.len() * resolution * resolution);
        for image in &images {
            data.extend_from_slice(&image.pixels);
        }
        let labels: Vec<[i64; 2]> =
            selected.labels.iter().map(|label| label.one_hot_pair()).collect();

        let array =
            ImageArray { n_events: images.len(), resolution, data, labels };
        Ok((array, selected.summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::{ColumnBundle, InMemoryColumnStore};
    use jetcore::sim::generator::{JetEventGenerator, LabelKind};
    use std::path::PathBuf;

    fn test_features() -> Vec<String> {
        vec!["track_ptrel".to_string(), "track_etarel".to_string(), "track_phirel".to_string()]
    }

    fn test_config(tag: &str) -> DatasetConfig {
        DatasetConfig {
            processed_dir: std::env::temp_dir()
                .join(format!("rustjet_dataset_{}_{}", tag, std::process::id())),
            features: test_features(),
            image: jetcore::data::image::ImageConfig {
                resolution: 16,
                ..jetcore::data::image::ImageConfig::default()
            },
            ..DatasetConfig::default()
        }
    }

    fn store_for(events: &[Event], config: &DatasetConfig) -> InMemoryColumnStore {
        InMemoryColumnStore::new(ColumnBundle::from_events(
            events,
            &config.features,
            &config.spectators,
            &config.labels,
        ))
    }

    fn cleanup(config: &DatasetConfig) {
        let _ = std::fs::remove_dir_all(&config.processed_dir);
    }

    #[test]
    fn test_graph_path_skips_trackless_jets() {
        // particle counts {2, 0, 1}: two graphs, with 2 and 0 edges
        let config = test_config("trackless");
        let mut generator = JetEventGenerator::new(11, test_features());
        let events = vec![
            generator.event(2, LabelKind::Background),
            generator.event(0, LabelKind::Signal),
            generator.event(1, LabelKind::Signal),
        ];
        let store = store_for(&events, &config);

        let summary = GraphDataset::new(config.clone()).process(&store).unwrap();
        assert_eq!(summary.events_read, 3);
        assert_eq!(summary.events_kept, 2);
        assert_eq!(summary.skipped_empty, 1);
        assert_eq!(summary.batches_written, 1);

        let graphs = crate::data::io::load_all_graphs(&config.processed_dir).unwrap();
        assert_eq!(graphs.len(), 2);
        assert_eq!(graphs[0].edge_count(), 2);
        assert_eq!(graphs[1].edge_count(), 0);
        assert_eq!(graphs[0].event_index, 0);
        assert_eq!(graphs[1].event_index, 2);
        cleanup(&config);
    }

    #[test]
    fn test_window_and_one_hot_accounting() {
        let config = test_config("accounting");
        let mut generator = JetEventGenerator::new(12, test_features());
        let events = vec![
            generator.event(3, LabelKind::Background),
            generator.event_with_spectators(3, LabelKind::Signal, 20.0, 500.0),
            generator.event(3, LabelKind::Unlabeled),
            generator.event(3, LabelKind::Ambiguous),
            generator.event(3, LabelKind::Signal),
        ];
        let store = store_for(&events, &config);

        let selected = select_events(&store, &config).unwrap();
        let summary = selected.summary;
        assert_eq!(summary.events_read, 5);
        assert_eq!(summary.events_kept, 2);
        assert_eq!(summary.skipped_window, 1);
        assert_eq!(summary.skipped_not_one_hot, 2);
        assert_eq!(
            summary.events_read,
            summary.events_kept
                + summary.skipped_window
                + summary.skipped_not_one_hot
                + summary.skipped_empty
        );
        assert_eq!(selected.labels[0].one_hot_pair(), [1, 0]);
        assert_eq!(selected.labels[1].one_hot_pair(), [0, 1]);
    }

    #[test]
    fn test_disabled_window_keeps_out_of_window_events() {
        let mut config = test_config("no_window");
        config.window = WindowFilter::passthrough();
        let mut generator = JetEventGenerator::new(13, test_features());
        let events = vec![
            generator.event_with_spectators(2, LabelKind::Background, 20.0, 100.0),
            generator.event_with_spectators(2, LabelKind::Unlabeled, 20.0, 100.0),
        ];
        let store = store_for(&events, &config);

        let selected = select_events(&store, &config).unwrap();
        // one-hot check still applies
        assert_eq!(selected.summary.events_kept, 1);
        assert_eq!(selected.summary.skipped_window, 0);
        assert_eq!(selected.summary.skipped_not_one_hot, 1);
    }

    #[test]
    fn test_event_cap_limits_read_count() {
        let mut config = test_config("cap");
        config.n_events = 4;
        let mut generator = JetEventGenerator::new(14, test_features());
        let events: Vec<Event> = (0..10).map(|_| generator.event(2, LabelKind::Signal)).collect();
        let store = store_for(&events, &config);

        let selected = select_events(&store, &config).unwrap();
        assert_eq!(selected.summary.events_read, 4);
    }

    #[test]
    fn test_missing_branch_aborts_before_processing() {
        let mut config = test_config("missing");
        let mut generator = JetEventGenerator::new(15, test_features());
        let events = vec![generator.event(2, LabelKind::Signal)];
        let store = store_for(&events, &config);

        config.features.push("track_unknown".to_string());
        let error = GraphDataset::new(config.clone()).process(&store).unwrap_err();
        assert!(error.to_string().contains("track_unknown"));
        // nothing was written
        assert!(!config.processed_dir.join("manifest.json").exists());
        cleanup(&config);
    }

    #[test]
    fn test_image_path_shapes_and_labels() {
        let config = test_config("images");
        let mut generator = JetEventGenerator::new(16, test_features());
        let events = vec![
            generator.event(4, LabelKind::Background),
            generator.event(0, LabelKind::Signal),
            generator.event(2, LabelKind::Unlabeled),
        ];
        let store = store_for(&events, &config);

        let (array, summary) = ImageDataset::new(config).make_images(&store).unwrap();
        // trackless jets still produce an (empty) image on this path
        assert_eq!(summary.events_kept, 2);
        assert_eq!(array.shape(), (2, 16, 16, 1));
        assert_eq!(array.data.len(), 2 * 16 * 16);
        assert_eq!(array.labels, vec![[1, 0], [0, 1]]);
        assert_eq!(array.image(1).iter().sum::<f32>(), 0.0);
    }

    #[test]
    fn test_image_path_requires_projection_branches() {
        let mut config = test_config("image_branches");
        config.features = vec!["track_pt".to_string()];
        let mut generator = JetEventGenerator::new(17, vec!["track_pt".to_string()]);
        let events = vec![generator.event(2, LabelKind::Signal)];
        let store = store_for(&events, &config);

        let error = ImageDataset::new(config).make_images(&store).unwrap_err();
        assert!(error.to_string().contains("track_ptrel"));
    }

    #[test]
    fn test_default_config_matches_ntuple_layout() {
        let config = DatasetConfig::default();
        assert_eq!(config.features.len(), 48);
        assert_eq!(config.spectators, vec!["fj_sdmass", "fj_pt"]);
        assert_eq!(config.n_events, -1);
        assert_eq!(config.n_events_merge, 1000);
        assert_eq!(config.processed_dir, PathBuf::from("processed"));
    }
}
