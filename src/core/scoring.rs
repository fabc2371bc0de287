use rand::Rng;

use crate::models::{Provider, ScoreProfile};

/// Assigns a similarity score to a candidate
///
/// There is no image similarity model yet: the default scorer draws from the
/// provider's configured range. A real model plugs in here without touching
/// the aggregator or the provider clients.
pub trait ScoreProvider: Send + Sync {
    fn score(&self, provider: Provider, profile: ScoreProfile) -> f64;
}

/// Uniform draw from `[base, base + jitter)`
#[derive(Debug, Clone, Copy, Default)]
pub struct JitterScore;

impl ScoreProvider for JitterScore {
    fn score(&self, _provider: Provider, profile: ScoreProfile) -> f64 {
        let jitter = if profile.jitter > 0.0 {
            rand::thread_rng().gen::<f64>() * profile.jitter
        } else {
            0.0
        };
        clamp_score(profile.base + jitter)
    }
}

/// Always returns the same score
#[derive(Debug, Clone, Copy)]
pub struct FixedScore(pub f64);

impl ScoreProvider for FixedScore {
    fn score(&self, _provider: Provider, _profile: ScoreProfile) -> f64 {
        clamp_score(self.0)
    }
}

/// Clamp a score to [0, 1]; NaN becomes 0
#[inline]
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
