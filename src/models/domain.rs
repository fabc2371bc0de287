use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Social network a candidate was found on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provider {
    VKontakte,
    Facebook,
    Instagram,
    LinkedIn,
    Telegram,
}

impl Provider {
    /// All registered providers, in registration order
    pub const ALL: [Provider; 5] = [
        Provider::VKontakte,
        Provider::Facebook,
        Provider::Instagram,
        Provider::LinkedIn,
        Provider::Telegram,
    ];

    /// Lowercase key used in config sections and the rate-limit report
    pub fn key(&self) -> &'static str {
        match self {
            Provider::VKontakte => "vkontakte",
            Provider::Facebook => "facebook",
            Provider::Instagram => "instagram",
            Provider::LinkedIn => "linkedin",
            Provider::Telegram => "telegram",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::VKontakte => "VKontakte",
            Provider::Facebook => "Facebook",
            Provider::Instagram => "Instagram",
            Provider::LinkedIn => "LinkedIn",
            Provider::Telegram => "Telegram",
        }
    }

    /// Two-letter code, also used to pick the avatar colour and initial
    pub fn short_code(&self) -> &'static str {
        match self {
            Provider::VKontakte => "VK",
            Provider::Facebook => "FB",
            Provider::Instagram => "IG",
            Provider::LinkedIn => "LI",
            Provider::Telegram => "TG",
        }
    }

    /// Prefix for candidate ids (`vk_123`, `tg_sim_...`)
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Provider::VKontakte => "vk",
            Provider::Facebook => "fb",
            Provider::Instagram => "ig",
            Provider::LinkedIn => "li",
            Provider::Telegram => "tg",
        }
    }

    /// Requests allowed per one-minute window
    pub fn default_rate_limit(&self) -> u32 {
        match self {
            Provider::VKontakte => 100,
            Provider::Facebook => 200,
            Provider::Instagram => 100,
            Provider::LinkedIn => 50,
            Provider::Telegram => 30,
        }
    }

    /// Number of simulated candidates produced when the live call fails
    pub fn default_fallback_count(&self) -> usize {
        match self {
            Provider::VKontakte => 3,
            Provider::Facebook | Provider::Instagram => 2,
            Provider::LinkedIn | Provider::Telegram => 1,
        }
    }

    pub fn default_score_profile(&self) -> ScoreProfile {
        match self {
            Provider::VKontakte => ScoreProfile::new(0.85, 0.10),
            Provider::Facebook => ScoreProfile::new(0.78, 0.15),
            Provider::Instagram => ScoreProfile::new(0.72, 0.18),
            Provider::LinkedIn => ScoreProfile::new(0.68, 0.20),
            Provider::Telegram => ScoreProfile::new(0.65, 0.25),
        }
    }

    /// Background colour of generated avatars
    pub fn avatar_color(&self) -> &'static str {
        match self {
            Provider::VKontakte => "#4CAF50",
            Provider::Facebook => "#2196F3",
            Provider::Instagram => "#E91E63",
            Provider::LinkedIn => "#FF9800",
            Provider::Telegram => "#9C27B0",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProvider(pub String);

impl fmt::Display for UnknownProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown provider '{}'", self.0)
    }
}

impl std::error::Error for UnknownProvider {}

impl FromStr for Provider {
    type Err = UnknownProvider;

    /// Accepts the config key, the display name or the short code, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Provider::ALL
            .iter()
            .copied()
            .find(|p| {
                wanted.eq_ignore_ascii_case(p.key())
                    || wanted.eq_ignore_ascii_case(p.short_code())
                    || wanted.eq_ignore_ascii_case(p.id_prefix())
            })
            .ok_or_else(|| UnknownProvider(wanted.to_string()))
    }
}

/// Candidate avatar: a remote image or an inline `data:` URI
///
/// Serialized as a bare string either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum AvatarRef {
    Remote(String),
    Inline(String),
}

impl AvatarRef {
    pub fn as_str(&self) -> &str {
        match self {
            AvatarRef::Remote(url) | AvatarRef::Inline(url) => url,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, AvatarRef::Inline(_))
    }
}

impl From<String> for AvatarRef {
    fn from(value: String) -> Self {
        if value.starts_with("data:") {
            AvatarRef::Inline(value)
        } else {
            AvatarRef::Remote(value)
        }
    }
}

impl From<AvatarRef> for String {
    fn from(value: AvatarRef) -> Self {
        match value {
            AvatarRef::Remote(url) | AvatarRef::Inline(url) => url,
        }
    }
}

/// Normalized search hit from one provider, live or simulated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub id: String,
    pub name: String,
    #[serde(rename = "socialNetwork")]
    pub provider: Provider,
    #[serde(rename = "profileUrl")]
    pub profile_url: String,
    #[serde(rename = "similarity")]
    pub score: f64,
    pub avatar: AvatarRef,
    /// Provider-specific extras (followers, company, lastSeen, ...), passed through as-is
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// Score range for a provider: `base + U[0, 1) * jitter`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreProfile {
    pub base: f64,
    pub jitter: f64,
}

impl ScoreProfile {
    pub fn new(base: f64, jitter: f64) -> Self {
        Self { base, jitter }
    }

    /// Lowest score this profile can produce (after clamping)
    pub fn min(&self) -> f64 {
        self.base.clamp(0.0, 1.0)
    }

    /// Upper bound of the range (after clamping)
    pub fn max(&self) -> f64 {
        (self.base + self.jitter).clamp(0.0, 1.0)
    }

    pub fn contains(&self, score: f64) -> bool {
        score >= self.min() && score <= self.max()
    }
}

/// Why a provider did not return live results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    Unavailable,
    Crashed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Unavailable => "unavailable",
            FailureKind::Crashed => "crashed",
        };
        f.write_str(s)
    }
}

/// How a provider's contribution to a search was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Live,
    Fallback,
    Failed,
}

/// Per-provider summary of one search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub provider: Provider,
    pub status: SourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureKind>,
    pub count: usize,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

/// What one provider contributed to a search
#[derive(Debug, Clone)]
pub struct ProviderOutcome {
    pub provider: Provider,
    pub candidates: Vec<MatchCandidate>,
    pub status: SourceStatus,
    pub reason: Option<FailureKind>,
    pub duration_ms: u64,
}

impl ProviderOutcome {
    pub fn live(provider: Provider, candidates: Vec<MatchCandidate>) -> Self {
        Self {
            provider,
            candidates,
            status: SourceStatus::Live,
            reason: None,
            duration_ms: 0,
        }
    }

    pub fn fallback(
        provider: Provider,
        candidates: Vec<MatchCandidate>,
        reason: FailureKind,
    ) -> Self {
        Self {
            provider,
            candidates,
            status: SourceStatus::Fallback,
            reason: Some(reason),
            duration_ms: 0,
        }
    }

    pub fn failed(provider: Provider, reason: FailureKind) -> Self {
        Self {
            provider,
            candidates: Vec::new(),
            status: SourceStatus::Failed,
            reason: Some(reason),
            duration_ms: 0,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn report(&self) -> SourceReport {
        SourceReport {
            provider: self.provider,
            status: self.status,
            reason: self.reason,
            count: self.candidates.len(),
            duration_ms: self.duration_ms,
        }
    }
}

/// Merged, ranked output of one search
#[derive(Debug, Clone)]
pub struct AggregatedResult {
    pub query: String,
    /// Sorted by score, descending
    pub candidates: Vec<MatchCandidate>,
    pub total_found: usize,
    pub sources: Vec<SourceReport>,
}

/// Read-only view of a provider's rate window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub current: u32,
    pub max: u32,
    #[serde(rename = "resetTime")]
    pub reset_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("vkontakte".parse::<Provider>().unwrap(), Provider::VKontakte);
        assert_eq!("VK".parse::<Provider>().unwrap(), Provider::VKontakte);
        assert_eq!("LinkedIn".parse::<Provider>().unwrap(), Provider::LinkedIn);
        assert_eq!(" tg ".parse::<Provider>().unwrap(), Provider::Telegram);
        assert!("myspace".parse::<Provider>().is_err());
    }

    #[test]
    fn test_avatar_ref_from_string() {
        assert!(AvatarRef::from("data:image/svg+xml;base64,AAAA".to_string()).is_inline());
        assert!(!AvatarRef::from("https://cdn.test/a.jpg".to_string()).is_inline());

        let remote = AvatarRef::from("https://cdn.test/a.jpg".to_string());
        assert_eq!(remote.as_str(), "https://cdn.test/a.jpg");
        assert_eq!(serde_json::to_value(&remote).unwrap(), "https://cdn.test/a.jpg");
    }

    #[test]
    fn test_candidate_serialization_flattens_metadata() {
        let mut metadata = Map::new();
        metadata.insert("followers".to_string(), Value::from(42));

        let candidate = MatchCandidate {
            id: "ig_1".to_string(),
            name: "Анна Петрова".to_string(),
            provider: Provider::Instagram,
            profile_url: "https://instagram.com/anna".to_string(),
            score: 0.8,
            avatar: AvatarRef::Remote("https://cdn.test/a.jpg".to_string()),
            metadata,
        };

        let json = serde_json::to_value(&candidate).unwrap();
        assert_eq!(json["socialNetwork"], "Instagram");
        assert_eq!(json["profileUrl"], "https://instagram.com/anna");
        assert_eq!(json["similarity"], 0.8);
        assert_eq!(json["avatar"], "https://cdn.test/a.jpg");
        assert_eq!(json["followers"], 42);
    }

    #[test]
    fn test_score_profile_bounds() {
        let profile = ScoreProfile::new(0.85, 0.10);
        assert!(profile.contains(0.85));
        assert!(profile.contains(0.95));
        assert!(!profile.contains(0.84));

        let overflowing = ScoreProfile::new(0.95, 0.2);
        assert_eq!(overflowing.max(), 1.0);
    }
}
