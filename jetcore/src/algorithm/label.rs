use serde::{Serialize, Deserialize};

use crate::data::event::Event;

pub const SAMPLE_IS_QCD: &str = "sample_isQCD";
pub const LABEL_H_BB: &str = "label_H_bb";

/// The mutually exclusive QCD subcategories folded into the background label.
pub const QCD_CATEGORIES: [&str; 5] = [
    "label_QCD_b",
    "label_QCD_bb",
    "label_QCD_c",
    "label_QCD_cc",
    "label_QCD_others",
];

/// Two-class label derived from the raw indicator branches.
///
/// `is_background = sample_isQCD * (QCD_b + QCD_bb + QCD_c + QCD_cc + QCD_others)`,
/// `is_signal = label_H_bb`. The product implements AND, the sum OR over the
/// mutually exclusive QCD subcategories. The result is not yet guaranteed
/// one-hot; events where both or neither component is set are dropped later
/// by the window filter, not here.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivedLabel {
    pub is_background: f32,
    pub is_signal: f32,
}

impl DerivedLabel {
    pub fn from_event(event: &Event) -> DerivedLabel {
        let qcd_any: f32 = QCD_CATEGORIES
            .iter()
            .map(|category| event.raw_label(category))
            .sum();

        DerivedLabel {
            is_background: event.raw_label(SAMPLE_IS_QCD) * qcd_any,
            is_signal: event.raw_label(LABEL_H_BB),
        }
    }

    pub fn sum(&self) -> f32 {
        self.is_background + self.is_signal
    }

    /// Exactly one component set. Inputs are {0,1}-valued, so the sum of a
    /// well-formed label is exactly representable and compared directly.
    pub fn is_one_hot(&self) -> bool {
        self.sum() == 1.0
    }

    /// Integer one-hot pair attached to persisted graphs.
    pub fn one_hot_pair(&self) -> [i64; 2] {
        [self.is_background as i64, self.is_signal as i64]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn event_with_labels(raw: &[(&str, f32)]) -> Event {
        let raw_labels: BTreeMap<String, f32> = raw
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect();
        Event::new(BTreeMap::new(), BTreeMap::new(), raw_labels)
    }

    #[test]
    fn test_qcd_event_is_background() {
        let event = event_with_labels(&[
            ("sample_isQCD", 1.0),
            ("label_QCD_b", 1.0),
            ("label_H_bb", 0.0),
        ]);
        let label = DerivedLabel::from_event(&event);
        assert_eq!(label.is_background, 1.0);
        assert_eq!(label.is_signal, 0.0);
        assert!(label.is_one_hot());
        assert_eq!(label.one_hot_pair(), [1, 0]);
    }

    #[test]
    fn test_hbb_event_is_signal() {
        let event = event_with_labels(&[("label_H_bb", 1.0)]);
        let label = DerivedLabel::from_event(&event);
        assert_eq!(label.one_hot_pair(), [0, 1]);
        assert!(label.is_one_hot());
    }

    #[test]
    fn test_qcd_sample_without_subcategory_is_unlabeled() {
        // sample_isQCD alone does not make an event background
        let event = event_with_labels(&[("sample_isQCD", 1.0)]);
        let label = DerivedLabel::from_event(&event);
        assert_eq!(label.sum(), 0.0);
        assert!(!label.is_one_hot());
    }

    #[test]
    fn test_both_classes_set_is_not_one_hot() {
        let event = event_with_labels(&[
            ("sample_isQCD", 1.0),
            ("label_QCD_c", 1.0),
            ("label_H_bb", 1.0),
        ]);
        let label = DerivedLabel::from_event(&event);
        assert_eq!(label.is_background, 1.0);
        assert_eq!(label.is_signal, 1.0);
        assert!(!label.is_one_hot());
    }
}
