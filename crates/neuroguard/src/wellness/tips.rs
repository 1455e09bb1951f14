use serde::Serialize;

/// Score bands used to pick offline advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Strained,
    Steady,
    Thriving,
}

impl ScoreBand {
    pub fn for_score(score: u8) -> Self {
        match score {
            0..=34 => ScoreBand::Strained,
            35..=69 => ScoreBand::Steady,
            _ => ScoreBand::Thriving,
        }
    }
}

/// Three numbered tips used when no text generation backend answers.
pub fn fallback_suggestions(score: u8) -> &'static str {
    match ScoreBand::for_score(score) {
        ScoreBand::Strained => concat!(
            "1) Take a 10–15 minute screen break and do slow breathing (4 seconds in, 6 out) for 3 minutes.\n",
            "2) Prioritise sleep tonight: aim for a consistent bedtime and reduce screens 30 minutes before bed.\n",
            "3) Add a short walk outside (even 10 minutes) to reset attention and stress levels."
        ),
        ScoreBand::Steady => concat!(
            "1) Do a quick body reset: stretch your neck/shoulders for 2 minutes and drink water.\n",
            "2) Reduce screen time for the next hour (notifications off) and finish one small task.\n",
            "3) Get daylight if possible and add 15–20 minutes of light activity."
        ),
        ScoreBand::Thriving => concat!(
            "1) Maintain what works: keep sleep stable and take short breaks between focused sessions.\n",
            "2) Protect focus: batch notifications and use a 25/5 timer (25 min work, 5 min break).\n",
            "3) Do something restorative today (walk, journaling, or a calm hobby) to prevent burnout."
        ),
    }
}
