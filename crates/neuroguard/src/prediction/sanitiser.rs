use serde_json::{Map, Value};
use tracing::debug;

use super::schema::{Feature, FeatureVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultReason {
    Missing,
    Invalid,
}

impl DefaultReason {
    pub fn label(self) -> &'static str {
        match self {
            DefaultReason::Missing => "missing",
            DefaultReason::Invalid => "invalid",
        }
    }
}

/// Complete feature vector plus the fields that had to fall back to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitisedInput {
    pub features: FeatureVector,
    pub defaulted: Vec<(Feature, DefaultReason)>,
}

impl SanitisedInput {
    pub fn defaulted_columns(&self) -> Vec<&'static str> {
        self.defaulted
            .iter()
            .map(|(feature, _)| feature.column())
            .collect()
    }
}

/// Builds a feature vector from arbitrary user input. Never fails: absent or
/// unconvertible values become 0.0, everything else is kept verbatim.
pub fn sanitise(raw: &Map<String, Value>) -> SanitisedInput {
    let mut features = FeatureVector::default();
    let mut defaulted = Vec::new();

    for feature in Feature::ALL {
        let converted = match raw.get(feature.column()) {
            None => Err(DefaultReason::Missing),
            Some(value) => coerce_number(value).ok_or(DefaultReason::Invalid),
        };

        match converted {
            Ok(value) => features.set(feature, value),
            Err(reason) => {
                debug!(
                    field = feature.column(),
                    reason = reason.label(),
                    "feature defaulted to zero"
                );
                metrics::counter!(
                    "neuroguard_sanitiser_defaulted_total",
                    "field" => feature.column(),
                    "reason" => reason.label()
                )
                .increment(1);
                defaulted.push((feature, reason));
            }
        }
    }

    SanitisedInput {
        features,
        defaulted,
    }
}

/// Numbers pass through, booleans map to 1/0 and strings are parsed after
/// trimming. Non-finite results are rejected.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }?;

    number.is_finite().then_some(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn complete_input_passes_through_unchanged() {
        let raw = object(json!({
            "sleep_duration_hours": 8,
            "screen_time_minutes": 30,
            "physical_activity_minutes": 60,
            "hour": 9,
            "weekday": 1,
            "sunlight_hours": 2,
            "safety": 90,
            "daily_goal_progression": 80
        }));

        let sanitised = sanitise(&raw);
        assert!(sanitised.defaulted.is_empty());
        assert_eq!(
            sanitised.features.as_slice(),
            &[2.0, 90.0, 8.0, 30.0, 60.0, 80.0, 9.0, 1.0]
        );
    }

    #[test]
    fn empty_input_yields_all_zero_vector() {
        let sanitised = sanitise(&Map::new());
        assert_eq!(sanitised.features, FeatureVector::default());
        assert_eq!(sanitised.defaulted.len(), 8);
        assert!(sanitised
            .defaulted
            .iter()
            .all(|(_, reason)| *reason == DefaultReason::Missing));
    }

    #[test]
    fn unconvertible_values_default_to_zero() {
        let raw = object(json!({
            "screen_time_minutes": "abc",
            "safety": null,
            "hour": [9],
            "weekday": {"day": 1},
            "sunlight_hours": "NaN",
            "sleep_duration_hours": " 7.5 ",
            "physical_activity_minutes": true,
            "daily_goal_progression": -999999
        }));

        let sanitised = sanitise(&raw);
        assert_eq!(sanitised.features.get(Feature::ScreenTimeMinutes), 0.0);
        assert_eq!(sanitised.features.get(Feature::Safety), 0.0);
        assert_eq!(sanitised.features.get(Feature::Hour), 0.0);
        assert_eq!(sanitised.features.get(Feature::Weekday), 0.0);
        assert_eq!(sanitised.features.get(Feature::SunlightHours), 0.0);
        assert_eq!(sanitised.features.get(Feature::SleepDurationHours), 7.5);
        assert_eq!(sanitised.features.get(Feature::PhysicalActivityMinutes), 1.0);
        assert_eq!(
            sanitised.features.get(Feature::DailyGoalProgression),
            -999999.0
        );
        assert_eq!(
            sanitised.defaulted_columns(),
            vec!["sunlight_hours", "safety", "screen_time_minutes", "hour", "weekday"]
        );
        assert!(sanitised
            .defaulted
            .iter()
            .all(|(_, reason)| *reason == DefaultReason::Invalid));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let raw = object(json!({ "mood": 12, "hour": "23" }));
        let sanitised = sanitise(&raw);
        assert_eq!(sanitised.features.get(Feature::Hour), 23.0);
        assert_eq!(sanitised.defaulted.len(), 7);
    }

    proptest! {
        #[test]
        fn missing_fields_are_zero_and_present_fields_preserved(
            values in proptest::collection::vec(-1.0e6f64..1.0e6, 8),
            keep in proptest::collection::vec(any::<bool>(), 8),
        ) {
            let mut raw = Map::new();
            for (index, feature) in Feature::ALL.iter().enumerate() {
                if keep[index] {
                    raw.insert(feature.column().to_string(), json!(values[index]));
                }
            }

            let sanitised = sanitise(&raw);
            for (index, feature) in Feature::ALL.iter().enumerate() {
                let expected = if keep[index] { values[index] } else { 0.0 };
                prop_assert_eq!(sanitised.features.get(*feature), expected);
            }
            prop_assert_eq!(
                sanitised.defaulted.len(),
                keep.iter().filter(|kept| !**kept).count()
            );
        }

        #[test]
        fn arbitrary_strings_never_panic(text in ".*") {
            let mut raw = Map::new();
            raw.insert("safety".to_string(), Value::String(text));
            let sanitised = sanitise(&raw);
            prop_assert!(sanitised.features.get(Feature::Safety).is_finite());
        }
    }
}
