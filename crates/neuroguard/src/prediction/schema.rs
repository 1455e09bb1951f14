use serde::{Deserialize, Serialize};

pub const FEATURE_COUNT: usize = 8;
pub const LABEL_COLUMN: &str = "mental_state";

/// One daily lifestyle metric. Discriminants are the model's column positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    SunlightHours = 0,
    Safety = 1,
    SleepDurationHours = 2,
    ScreenTimeMinutes = 3,
    PhysicalActivityMinutes = 4,
    DailyGoalProgression = 5,
    Hour = 6,
    Weekday = 7,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::SunlightHours,
        Feature::Safety,
        Feature::SleepDurationHours,
        Feature::ScreenTimeMinutes,
        Feature::PhysicalActivityMinutes,
        Feature::DailyGoalProgression,
        Feature::Hour,
        Feature::Weekday,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Feature::SunlightHours => "sunlight_hours",
            Feature::Safety => "safety",
            Feature::SleepDurationHours => "sleep_duration_hours",
            Feature::ScreenTimeMinutes => "screen_time_minutes",
            Feature::PhysicalActivityMinutes => "physical_activity_minutes",
            Feature::DailyGoalProgression => "daily_goal_progression",
            Feature::Hour => "hour",
            Feature::Weekday => "weekday",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|feature| feature.column() == name)
    }
}

/// Feature values in model column order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        self.0[feature.index()] = value;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL
            .into_iter()
            .map(move |feature| (feature, self.get(feature)))
    }
}

/// Named, ordered column list a model was trained against.
///
/// Persisted next to every trained model and compared on load, so an artifact
/// produced for a different column layout is rejected instead of silently
/// scoring shuffled inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
    label: String,
}

impl FeatureSchema {
    pub fn standard() -> Self {
        Self {
            columns: Feature::ALL
                .iter()
                .map(|feature| feature.column().to_string())
                .collect(),
            label: LABEL_COLUMN.to_string(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn ensure_matches(&self, expected: &FeatureSchema) -> Result<(), SchemaMismatch> {
        if self == expected {
            return Ok(());
        }

        Err(SchemaMismatch {
            expected: expected.describe(),
            found: self.describe(),
        })
    }

    fn describe(&self) -> String {
        format!("{} -> {}", self.columns.join(","), self.label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("model schema [{found}] does not match expected [{expected}]")]
pub struct SchemaMismatch {
    pub expected: String,
    pub found: String,
}
