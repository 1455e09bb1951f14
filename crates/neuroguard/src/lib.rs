//! NeuroGuard: estimates a 0-100 mental state score from daily lifestyle
//! metrics and pairs it with wellness advice.

pub mod config;
pub mod error;
pub mod prediction;
pub mod submissions;
pub mod telemetry;
pub mod wellness;
