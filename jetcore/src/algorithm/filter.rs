//! Event selection.
//!
//! Applies the jet mass/pT fiducial window and enforces the one-hot label
//! invariant. Filtering is stateless and applied independently per event.

use serde::{Serialize, Deserialize};

use crate::algorithm::label::DerivedLabel;

/// Fiducial window configuration for jet selection.
///
/// All bounds are exclusive. Setting `enabled` to false turns the window
/// into a pass-through; the one-hot label check is applied regardless.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WindowFilter {
    pub enabled: bool,

    // Soft-drop mass bounds (GeV)
    pub min_sdmass: f32,
    pub max_sdmass: f32,

    // Transverse momentum bounds (GeV)
    pub min_pt: f32,
    pub max_pt: f32,
}

impl Default for WindowFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            min_sdmass: 40.0,
            max_sdmass: 200.0,
            min_pt: 300.0,
            max_pt: 2000.0,
        }
    }
}

impl WindowFilter {
    /// Window disabled; only the one-hot check remains.
    pub fn passthrough() -> Self {
        Self { enabled: false, ..Self::default() }
    }

    /// True when the spectator pair lies strictly inside the window.
    /// Ignores `enabled`; callers that honor the flag use [`keep`](Self::keep).
    pub fn in_window(&self, sdmass: f32, pt: f32) -> bool {
        sdmass > self.min_sdmass
            && sdmass < self.max_sdmass
            && pt > self.min_pt
            && pt < self.max_pt
    }

    /// Full selection predicate: window (when enabled) plus the one-hot
    /// label invariant.
    pub fn keep(&self, sdmass: f32, pt: f32, label: &DerivedLabel) -> bool {
        if self.enabled && !self.in_window(sdmass, pt) {
            return false;
        }
        label.is_one_hot()
    }
}
