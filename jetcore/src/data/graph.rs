use serde::{Serialize, Deserialize};

use crate::algorithm::label::DerivedLabel;
use crate::data::event::Event;

/// Fully connected directed graph built from one jet.
///
/// Nodes are tracks, edges connect every ordered pair of distinct tracks,
/// so a jet with `n` tracks carries exactly `n * (n - 1)` edges. Globals
/// hold the spectator values as a single-row batch axis, the label is the
/// integer one-hot pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JetGraph {
    /// One feature vector per track, in track order; vector length equals
    /// the number of configured features.
    pub node_features: Vec<Vec<f32>>,
    /// Directed edges as (source, destination) track indices, row-major.
    pub edge_index: Vec<(u32, u32)>,
    /// Spectator values, unsqueezed to one row.
    pub global_attrs: Vec<Vec<f32>>,
    /// `[is_background, is_signal]`
    pub label: [i64; 2],
    /// Index of the source event in the input file, for batch identifiers
    /// and reproducible ordering.
    pub event_index: usize,
}

/// Edge set of the complete directed graph on `n` nodes, diagonal excluded.
pub fn complete_digraph_edges(n: usize) -> Vec<(u32, u32)> {
    let mut edges = Vec::with_capacity(n * n.saturating_sub(1));
    for source in 0..n {
        for destination in 0..n {
            if source != destination {
                edges.push((source as u32, destination as u32));
            }
        }
    }
    edges
}

impl JetGraph {
    /// Build the graph for one surviving event.
    ///
    /// Returns `None` for jets without tracks; those events are skipped,
    /// not errors. Feature and spectator columns are validated against the
    /// configured names before any event is materialized, so lookups here
    /// do not fail on well-formed input.
    pub fn from_event(
        event: &Event,
        feature_names: &[String],
        spectator_names: &[String],
        label: &DerivedLabel,
        event_index: usize,
    ) -> Option<JetGraph> {
        let n = event.particle_count();
        if n < 1 {
            return None;
        }

        let mut columns: Vec<&[f32]> = Vec::with_capacity(feature_names.len());
        for name in feature_names {
            columns.push(event.feature(name)?);
        }

        let mut node_features = Vec::with_capacity(n);
        for track in 0..n {
            let vector: Vec<f32> = columns.iter().map(|column| column[track]).collect();
            node_features.push(vector);
        }

        let mut globals = Vec::with_capacity(spectator_names.len());
        for name in spectator_names {
            globals.push(event.spectator(name)?);
        }

        Some(JetGraph {
            node_features,
            edge_index: complete_digraph_edges(n),
            global_attrs: vec![globals],
            label: label.one_hot_pair(),
            event_index,
        })
    }

    pub fn node_count(&self) -> usize {
        self.node_features.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_index.len()
    }

    pub fn has_self_loops(&self) -> bool {
        self.edge_index.iter().any(|(source, destination)| source == destination)
    }
}
