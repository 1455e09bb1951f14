use serde_json::{Map, Value};

use crate::prediction::Feature;

/// Field names posted by the input page, paired with the feature they feed.
pub const FORM_FIELDS: [(&str, Feature); 8] = [
    ("sleep_duration", Feature::SleepDurationHours),
    ("screen", Feature::ScreenTimeMinutes),
    ("activity", Feature::PhysicalActivityMinutes),
    ("hours", Feature::Hour),
    ("weekday", Feature::Weekday),
    ("sunlight", Feature::SunlightHours),
    ("safety", Feature::Safety),
    ("goals", Feature::DailyGoalProgression),
];

/// Renames form fields to model column names. A column name in the form is
/// used when its short form is absent; anything else is dropped.
///
/// Values pass through untouched: fractional entries such as `"sunlight": 2.5`
/// are scored as given rather than truncated to integers.
pub fn canonical_form(form: &Map<String, Value>) -> Map<String, Value> {
    FORM_FIELDS
        .iter()
        .filter_map(|&(field, feature)| {
            form.get(field)
                .or_else(|| form.get(feature.column()))
                .map(|value| (feature.column().to_string(), value.clone()))
        })
        .collect()
}
