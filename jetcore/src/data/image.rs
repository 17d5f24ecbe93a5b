use itertools::izip;
use serde::{Serialize, Deserialize};

use crate::data::event::Event;

/// Rasterization settings for the jet image path.
///
/// The weight feature is accumulated into a square 2-D histogram using the
/// x/y features as spatial coordinates. Defaults reproduce the usual
/// 224x224 grid over the relative eta/phi plane, weighted by relative pT.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageConfig {
    pub resolution: usize,
    pub range_min: f32,
    pub range_max: f32,
    pub weight_feature: String,
    pub x_feature: String,
    pub y_feature: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            resolution: 224,
            range_min: -0.8,
            range_max: 0.8,
            weight_feature: "track_ptrel".to_string(),
            x_feature: "track_etarel".to_string(),
            y_feature: "track_phirel".to_string(),
        }
    }
}

impl ImageConfig {
    /// The three per-track branches the projection reads.
    pub fn required_features(&self) -> [&str; 3] {
        [&self.weight_feature, &self.x_feature, &self.y_feature]
    }
}

/// Single-channel jet image of shape (resolution, resolution, 1).
///
/// Pixels are stored row-major with x as the leading axis. Each cell holds
/// the summed weight of the tracks whose coordinates fall into that bin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JetImage {
    pub resolution: usize,
    pub pixels: Vec<f32>,
}

impl JetImage {
    pub fn zeros(resolution: usize) -> Self {
        JetImage { resolution, pixels: vec![0.0; resolution * resolution] }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.resolution, self.resolution, 1)
    }

    pub fn get(&self, x_bin: usize, y_bin: usize) -> f32 {
        self.pixels[x_bin * self.resolution + y_bin]
    }

    pub fn sum(&self) -> f32 {
        self.pixels.iter().sum()
    }
}

/// Bin index over `[lo, hi]` split into `bins` half-open intervals, with
/// the top edge of the last bin inclusive. Out-of-range values yield `None`
/// and are dropped from the histogram; this is documented clipping, not an
/// error.
fn bin_index(value: f32, lo: f32, hi: f32, bins: usize) -> Option<usize> {
    if !(value >= lo && value <= hi) {
        return None;
    }
    if value == hi {
        return Some(bins - 1);
    }
    let index = ((value - lo) / (hi - lo) * bins as f32) as usize;
    Some(index.min(bins - 1))
}

/// Project one event's (weight, x, y) track triple into a jet image.
///
/// Returns `None` when one of the configured branches is missing; branch
/// presence is validated against the request before events are built, so
/// this does not fire on well-formed input.
pub fn project_event(event: &Event, config: &ImageConfig) -> Option<JetImage> {
    let weights = event.feature(&config.weight_feature)?;
    let xs = event.feature(&config.x_feature)?;
    let ys = event.feature(&config.y_feature)?;

    let mut image = JetImage::zeros(config.resolution);
    for (&weight, &x, &y) in izip!(weights, xs, ys) {
        let x_bin = match bin_index(x, config.range_min, config.range_max, config.resolution) {
            Some(bin) => bin,
            None => continue,
        };
        let y_bin = match bin_index(y, config.range_min, config.range_max, config.resolution) {
            Some(bin) => bin,
            None => continue,
        };
        image.pixels[x_bin * config.resolution + y_bin] += weight;
    }
    Some(image)
}
