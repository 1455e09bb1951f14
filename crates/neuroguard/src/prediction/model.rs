use serde::{Deserialize, Serialize};

use super::forest::RandomForest;
use super::schema::{FeatureSchema, FeatureVector};

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

/// Fitted regressor bound to the column layout it was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    schema: FeatureSchema,
    forest: RandomForest,
}

impl TrainedModel {
    pub fn new(schema: FeatureSchema, forest: RandomForest) -> Self {
        Self { schema, forest }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Continuous, unclamped model output.
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        self.forest.predict_row(features.as_slice())
    }
}

/// Clamps to [0, 100] and rounds half to even, matching Python's `round`.
/// NaN maps to 0.
pub fn bounded_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }

    raw.clamp(SCORE_MIN, SCORE_MAX).round_ties_even() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn halves_round_to_even() {
        assert_eq!(bounded_score(42.5), 42);
        assert_eq!(bounded_score(43.5), 44);
        assert_eq!(bounded_score(0.5), 0);
        assert_eq!(bounded_score(99.5), 100);
        assert_eq!(bounded_score(67.49), 67);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        assert_eq!(bounded_score(-12.0), 0);
        assert_eq!(bounded_score(180.3), 100);
        assert_eq!(bounded_score(f64::INFINITY), 100);
        assert_eq!(bounded_score(f64::NEG_INFINITY), 0);
        assert_eq!(bounded_score(f64::NAN), 0);
    }

    proptest! {
        #[test]
        fn any_float_maps_into_score_range(raw in any::<f64>()) {
            prop_assert!(bounded_score(raw) <= 100);
        }
    }
}
