use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

/// One jet with its per-track feature columns, jet-level spectators and
/// raw label indicators.
///
/// All feature columns of a single event have equal length, the particle
/// count of the jet. Column presence and alignment are validated once when
/// the columns are read, not per event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub features: BTreeMap<String, Vec<f32>>,
    pub spectators: BTreeMap<String, f32>,
    pub raw_labels: BTreeMap<String, f32>,
}

impl Event {
    pub fn new(
        features: BTreeMap<String, Vec<f32>>,
        spectators: BTreeMap<String, f32>,
        raw_labels: BTreeMap<String, f32>,
    ) -> Self {
        Event { features, spectators, raw_labels }
    }

    /// Number of tracks in the jet, taken from the first feature column.
    pub fn particle_count(&self) -> usize {
        self.features.values().next().map_or(0, |column| column.len())
    }

    pub fn feature(&self, name: &str) -> Option<&[f32]> {
        self.features.get(name).map(|column| column.as_slice())
    }

    pub fn spectator(&self, name: &str) -> Option<f32> {
        self.spectators.get(name).copied()
    }

    /// Raw label indicator value, 0.0 when the branch is absent.
    pub fn raw_label(&self, name: &str) -> f32 {
        self.raw_labels.get(name).copied().unwrap_or(0.0)
    }
}

/// The 48 track-level feature branches used for graph node vectors.
pub fn default_track_features() -> Vec<String> {
    [
        "track_pt",
        "track_ptrel",
        "trackBTag_Eta",
        "trackBTag_DeltaR",
        "trackBTag_EtaRel",
        "trackBTag_JetDistVal",
        "trackBTag_Momentum",
        "trackBTag_PPar",
        "trackBTag_PParRatio",
        "trackBTag_PtRatio",
        "trackBTag_PtRel",
        "trackBTag_Sip2dSig",
        "trackBTag_Sip2dVal",
        "trackBTag_Sip3dSig",
        "trackBTag_Sip3dVal",
        "track_VTX_ass",
        "track_charge",
        "track_deltaR",
        "track_detadeta",
        "track_dlambdadz",
        "track_dlambdadz",
        "track_dphidphi",
        "track_dphidxy",
        "track_dptdpt",
        "track_drminsv",
        "track_drsubjet1",
        "track_drsubjet2",
        "track_dxy",
        "track_dxydxy",
        "track_dxydz",
        "track_dxysig",
        "track_dz",
        "track_dzdz",
        "track_dzsig",
        "track_erel",
        "track_etarel",
        "track_fromPV",
        "track_isChargedHad",
        "track_isEl",
        "track_isMu",
        "track_lostInnerHits",
        "track_mass",
        "track_normchi2",
        "track_phirel",
        "track_pt",
        "track_ptrel",
        "track_puppiw",
        "track_quality",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

/// Spectator branches defining the mass/pT selection window.
pub fn default_spectators() -> Vec<String> {
    vec!["fj_sdmass".to_string(), "fj_pt".to_string()]
}

/// Raw label branches reduced to the QCD/Hbb two-class label.
pub fn default_raw_labels() -> Vec<String> {
    [
        "label_QCD_b",
        "label_QCD_bb",
        "label_QCD_c",
        "label_QCD_cc",
        "label_QCD_others",
        "sample_isQCD",
        "label_H_bb",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_with_tracks(n: usize) -> Event {
        let mut features = BTreeMap::new();
        features.insert("track_pt".to_string(), vec![1.0; n]);
        Event::new(features, BTreeMap::new(), BTreeMap::new())
    }

    #[test]
    fn test_particle_count() {
        assert_eq!(event_with_tracks(3).particle_count(), 3);
        assert_eq!(event_with_tracks(0).particle_count(), 0);

        let empty = Event::new(BTreeMap::new(), BTreeMap::new(), BTreeMap::new());
        assert_eq!(empty.particle_count(), 0);
    }

    #[test]
    fn test_missing_raw_label_reads_as_zero() {
        let event = event_with_tracks(1);
        assert_eq!(event.raw_label("label_H_bb"), 0.0);
        assert!(event.spectator("fj_pt").is_none());
    }

    #[test]
    fn test_default_branch_lists() {
        assert_eq!(default_track_features().len(), 48);
        assert_eq!(default_spectators(), vec!["fj_sdmass", "fj_pt"]);
        assert_eq!(default_raw_labels().len(), 7);
    }
}
