//! Game logic that runs server-side: progress rollups, the typing game's
//! adaptive difficulty and content, and reading-accuracy scoring.

pub mod aggregate;
pub mod difficulty;
pub mod reading;
pub mod typing;

/// Round half toward positive infinity, as browser chart code does.
pub fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// [`round_half_up`] to one decimal place.
pub fn round_to_tenth(x: f64) -> f64 {
    round_half_up(x * 10.0) / 10.0
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
