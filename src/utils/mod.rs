//! Errors, logging and evaluation reports shared by training and inference

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{PlantDoctorError, Result};
pub use logging::init_logging;
pub use metrics::{ConfusionMatrix, Metrics};

/// Short human-readable duration: `42.0s`, `3m 05s` or `2h 10m`
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        return format!("{:.1}s", seconds);
    }

    let whole = seconds.round() as u64;
    let (hours, minutes, secs) = (whole / 3600, whole % 3600 / 60, whole % 60);
    if hours == 0 {
        format!("{}m {:02}s", minutes, secs)
    } else {
        format!("{}h {}m", hours, minutes)
    }
}
