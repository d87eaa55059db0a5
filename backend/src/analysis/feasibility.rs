//! Decides whether a claimed expression was exhibited across a batch of images.
//!
//! Two independent criteria, either of which is enough:
//! - hit rate: share of images whose label matches, strictly above `percentage`
//! - consecutive run: a streak of matches reaching `consecutive_threshold`

use shared::{FeasibilityVerdict, ResultsMapping};

/// Caller-supplied thresholds. Any integer is accepted, including zero and negatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeasibilityCriteria {
    pub percentage: i64,
    pub consecutive_threshold: i64,
}

pub fn analyze_feasibility(
    emotion_prediction: &str,
    results: ResultsMapping,
    criteria: FeasibilityCriteria,
) -> FeasibilityVerdict {
    let target = emotion_prediction.to_lowercase();
    let matches = |label: &str| label.to_lowercase() == target;

    let hits = results.labels().filter(|&label| matches(label)).count();
    let reliability = if results.is_empty() {
        0.0
    } else {
        round_to_hundredths(hits as f64 / results.len() as f64 * 100.0)
    };

    // Only the streak in progress when iteration stops is kept, not the longest one.
    let mut streak: usize = 0;
    for label in results.labels() {
        if matches(label) {
            streak += 1;
            if streak as i64 >= criteria.consecutive_threshold {
                break;
            }
        } else {
            streak = 0;
        }
    }

    let success = reliability > criteria.percentage as f64
        || streak as i64 >= criteria.consecutive_threshold;

    FeasibilityVerdict {
        success,
        reliability,
        consecutive_recognition: streak,
        emotion_prediction: emotion_prediction.to_string(),
        results,
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
