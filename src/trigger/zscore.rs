//! Z-score comparison between the current window and the last-trigger window.

use crate::model::{BaselineStats, Feature, FeatureVector};

/// `(current - last) / stddev`, or exactly `0.0` when the baseline has no
/// spread.  A non-finite result (NaN inputs) is also reported as `0.0`.
pub fn z_score(current: f64, last: f64, stddev: f64) -> f64 {
    if stddev == 0.0 || !stddev.is_finite() {
        return 0.0;
    }
    let z = (current - last) / stddev;
    if z.is_finite() {
        z
    } else {
        0.0
    }
}

/// Outcome of comparing two windows.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub z: FeatureVector,
    /// Features with `|Z| >= threshold`, in [`Feature::ALL`] order.
    pub triggered: Vec<Feature>,
}

impl Evaluation {
    pub fn is_triggered(&self) -> bool {
        !self.triggered.is_empty()
    }
}

pub fn evaluate(
    current: FeatureVector,
    last: FeatureVector,
    baseline: BaselineStats,
    threshold: f64,
) -> Evaluation {
    let z_of = |f: Feature| z_score(current.get(f), last.get(f), baseline.stddev(f));
    let z = FeatureVector::new(
        z_of(Feature::Temperature),
        z_of(Feature::Humidity),
        z_of(Feature::Volume),
    );
    let triggered = Feature::ALL
        .into_iter()
        .filter(|f| z.get(*f).abs() >= threshold)
        .collect();
    Evaluation { z, triggered }
}
