// Core algorithm exports
pub mod aggregator;
pub mod clock;
pub mod rate_budget;
pub mod scoring;
pub mod simulated;

pub use aggregator::{merge_ranked, SearchAggregator, SearchError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use rate_budget::{RateBudget, RateLimitConfig, RateWindow};
pub use scoring::{FixedScore, JitterScore, ScoreProvider};
pub use simulated::SimulatedResultGenerator;
