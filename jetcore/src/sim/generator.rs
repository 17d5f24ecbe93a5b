//! Synthetic jet events for tests and fixtures.

use std::collections::BTreeMap;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::algorithm::label::{LABEL_H_BB, QCD_CATEGORIES, SAMPLE_IS_QCD};
use crate::data::event::{default_raw_labels, Event};

/// Which raw-label pattern a generated event carries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LabelKind {
    /// QCD sample with one random subcategory set.
    Background,
    /// Hbb signal.
    Signal,
    /// No class set; dropped by the one-hot check.
    Unlabeled,
    /// Both classes set; malformed, dropped by the one-hot check.
    Ambiguous,
}

/// Seeded generator producing reproducible jet events with the default
/// branch layout.
pub struct JetEventGenerator {
    rng: StdRng,
    pub feature_names: Vec<String>,
    pub min_tracks: usize,
    pub max_tracks: usize,
}

impl JetEventGenerator {
    pub fn new(seed: u64, feature_names: Vec<String>) -> Self {
        JetEventGenerator { rng: StdRng::seed_from_u64(seed), feature_names, min_tracks: 1, max_tracks: 24 }
    }

    fn raw_labels(&mut self, kind: LabelKind) -> BTreeMap<String, f32> {
        let mut raw: BTreeMap<String, f32> =
            default_raw_labels().into_iter().map(|name| (name, 0.0)).collect();
        match kind {
            LabelKind::Background => {
                let category = QCD_CATEGORIES[self.rng.gen_range(0..QCD_CATEGORIES.len())];
                raw.insert(SAMPLE_IS_QCD.to_string(), 1.0);
                raw.insert(category.to_string(), 1.0);
            }
            LabelKind::Signal => {
                raw.insert(LABEL_H_BB.to_string(), 1.0);
            }
            LabelKind::Unlabeled => {}
            LabelKind::Ambiguous => {
                raw.insert(SAMPLE_IS_QCD.to_string(), 1.0);
                raw.insert(QCD_CATEGORIES[0].to_string(), 1.0);
                raw.insert(LABEL_H_BB.to_string(), 1.0);
            }
        }
        raw
    }

    /// One event with explicit track count and spectator values.
    pub fn event_with_spectators(
        &mut self,
        n_tracks: usize,
        kind: LabelKind,
        sdmass: f32,
        pt: f32,
    ) -> Event {
        let value_dist = Uniform::new(-1.0f32, 1.0f32);
        let mut features = BTreeMap::new();
        for name in &self.feature_names {
            let column: Vec<f32> =
                (0..n_tracks).map(|_| value_dist.sample(&mut self.rng)).collect();
            features.insert(name.clone(), column);
        }

        let mut spectators = BTreeMap::new();
        spectators.insert("fj_sdmass".to_string(), sdmass);
        spectators.insert("fj_pt".to_string(), pt);

        let raw_labels = self.raw_labels(kind);
        Event::new(features, spectators, raw_labels)
    }

    /// One event with spectators inside the default selection window.
    pub fn event(&mut self, n_tracks: usize, kind: LabelKind) -> Event {
        let sdmass = Uniform::new(50.0f32, 190.0f32).sample(&mut self.rng);
        let pt = Uniform::new(350.0f32, 1900.0f32).sample(&mut self.rng);
        self.event_with_spectators(n_tracks, kind, sdmass, pt)
    }

    /// A batch of in-window events alternating background and signal.
    pub fn events(&mut self, count: usize) -> Vec<Event> {
        (0..count)
            .map(|i| {
                let n_tracks = self.rng.gen_range(self.min_tracks..=self.max_tracks);
                let kind = if i % 2 == 0 { LabelKind::Background } else { LabelKind::Signal };
                self.event(n_tracks, kind)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::label::DerivedLabel;

    fn generator() -> JetEventGenerator {
        JetEventGenerator::new(42, vec!["track_pt".to_string(), "track_etarel".to_string()])
    }

    #[test]
    fn test_same_seed_same_events() {
        let first: Vec<Event> = generator().events(5);
        let second: Vec<Event> = generator().events(5);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.features, b.features);
            assert_eq!(a.spectators, b.spectators);
            assert_eq!(a.raw_labels, b.raw_labels);
        }
    }

    #[test]
    fn test_generated_labels_are_valid() {
        let mut generator = generator();
        for kind in [LabelKind::Background, LabelKind::Signal] {
            let label = DerivedLabel::from_event(&generator.event(3, kind));
            assert!(label.is_one_hot());
        }
        let unlabeled = DerivedLabel::from_event(&generator.event(3, LabelKind::Unlabeled));
        assert_eq!(unlabeled.sum(), 0.0);
        let ambiguous = DerivedLabel::from_event(&generator.event(3, LabelKind::Ambiguous));
        assert_eq!(ambiguous.sum(), 2.0);
    }

    #[test]
    fn test_columns_are_aligned() {
        let mut generator = generator();
        let event = generator.event(6, LabelKind::Signal);
        assert_eq!(event.particle_count(), 6);
        assert!(event.features.values().all(|column| column.len() == 6));
    }
}
