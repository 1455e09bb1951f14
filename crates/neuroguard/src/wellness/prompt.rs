use std::fmt::Write;

use crate::prediction::{Feature, FeatureVector};

/// Persona prompt asking the model for three personalised tips.
pub fn suggestion_prompt(score: u8, metrics: &FeatureVector, history: &[String]) -> String {
    let mut prompt = String::from(
        "You are NeuroGuard, an advanced mental wellness AI from the year 2080.\n\
         Offer exactly three personalised tips to help the user improve or stabilise their mental well-being.\n\
         Each tip must be practical and concise. Respond with a numbered list only. Use British spelling.\n\n",
    );

    let value = |feature: Feature| metrics.get(feature);
    let _ = writeln!(prompt, "Estimated mental state score: {score}/100");
    let _ = writeln!(prompt, "Weekday: {}", value(Feature::Weekday));
    let _ = writeln!(prompt, "Sleep: {} hours", value(Feature::SleepDurationHours));
    let _ = writeln!(
        prompt,
        "Screen time: {} minutes",
        value(Feature::ScreenTimeMinutes)
    );
    let _ = writeln!(
        prompt,
        "Physical activity: {} minutes",
        value(Feature::PhysicalActivityMinutes)
    );
    let _ = writeln!(prompt, "Safety perception: {}/100", value(Feature::Safety));
    let _ = writeln!(
        prompt,
        "Sunlight exposure: {} hours",
        value(Feature::SunlightHours)
    );
    let _ = writeln!(prompt, "Hour of day: {}", value(Feature::Hour));
    let _ = writeln!(
        prompt,
        "Daily goal progress: {}/100",
        value(Feature::DailyGoalProgression)
    );

    if !history.is_empty() {
        let _ = write!(
            prompt,
            "\nUser history (previous advice):\n- {}\n",
            history.join("\n- ")
        );
    }

    prompt
}

pub fn summary_prompt(suggestion: &str) -> String {
    format!(
        "Summarise the following mental wellness advice into one short paragraph to store as historical context. \
         Return only the summary, no title.\n\n{suggestion}"
    )
}
