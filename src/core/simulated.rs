//! Placeholder candidates for providers that could not be queried.
//!
//! Results have the same shape and score range as live results for the same
//! provider, with names, handles and metadata drawn from fixed pools.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::scoring::ScoreProvider;
use crate::models::{AvatarRef, MatchCandidate, Provider, ScoreProfile};

const FIRST_NAMES: &[&str] = &[
    "Анна", "Михаил", "Елена", "Дмитрий", "Ольга", "Александр", "Мария", "Сергей", "Наталья",
    "Андрей",
];
const LAST_NAMES: &[&str] = &[
    "Петрова", "Сидоров", "Козлова", "Волков", "Смирнова", "Иванов", "Попова", "Соколов",
    "Лебедева", "Козлов",
];
const HANDLE_PREFIXES: &[&str] = &["user", "profile", "person", "human", "real"];
const HANDLE_SUFFIXES: &[&str] = &["2024", "2023", "2022", "user", "profile", "real"];
const LAST_SEEN: &[&str] = &[
    "2 часа назад",
    "вчера",
    "3 дня назад",
    "неделю назад",
    "2 недели назад",
];
const CITIES: &[&str] = &["Москва", "Санкт-Петербург", "Новосибирск", "Екатеринбург", "Казань"];
const COMPANIES: &[&str] = &[
    "ООО \"Технологии\"",
    "ИП \"Инновации\"",
    "АО \"Развитие\"",
    "ООО \"Будущее\"",
    "ИП \"Прогресс\"",
];
const POSITIONS: &[&str] = &["Менеджер", "Разработчик", "Дизайнер", "Аналитик", "Консультант"];

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, pool: &[&'a str]) -> &'a str {
    pool.choose(rng).copied().unwrap_or_default()
}

/// "Имя Фамилия" from the name pools
pub fn random_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES))
}

/// `<prefix>_<0..999>_<suffix>`
pub fn random_handle<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "{}_{}_{}",
        pick(rng, HANDLE_PREFIXES),
        rng.gen_range(0..999),
        pick(rng, HANDLE_SUFFIXES)
    )
}

pub fn random_last_seen<R: Rng + ?Sized>(rng: &mut R) -> String {
    pick(rng, LAST_SEEN).to_string()
}

pub fn random_city<R: Rng + ?Sized>(rng: &mut R) -> String {
    pick(rng, CITIES).to_string()
}

pub fn random_company<R: Rng + ?Sized>(rng: &mut R) -> String {
    pick(rng, COMPANIES).to_string()
}

pub fn random_position<R: Rng + ?Sized>(rng: &mut R) -> String {
    pick(rng, POSITIONS).to_string()
}

/// 60x60 square in `color` with a white centred `initial`
pub fn avatar_svg(initial: char, color: &str) -> String {
    format!(
        concat!(
            r#"<svg width="60" height="60" viewBox="0 0 60 60" fill="none" "#,
            r#"xmlns="http://www.w3.org/2000/svg">"#,
            r#"<rect width="60" height="60" fill="{color}"/>"#,
            r#"<text x="30" y="35" font-family="Arial" font-size="24" fill="white" "#,
            r#"text-anchor="middle">{initial}</text>"#,
            "</svg>"
        ),
        color = color,
        initial = initial,
    )
}

/// `avatar_svg` as a base64 `data:` URI
pub fn avatar_data_uri(initial: char, color: &str) -> String {
    format!(
        "data:image/svg+xml;base64,{}",
        BASE64.encode(avatar_svg(initial, color))
    )
}

/// Generated avatar for a provider, used when no picture is available
pub fn provider_avatar(provider: Provider) -> AvatarRef {
    let initial = provider.short_code().chars().next().unwrap_or('?');
    AvatarRef::Inline(avatar_data_uri(initial, provider.avatar_color()))
}

/// Produces synthetic candidates when a live provider call is unavailable
pub struct SimulatedResultGenerator {
    scorer: Arc<dyn ScoreProvider>,
    profiles: HashMap<Provider, ScoreProfile>,
    sequence: AtomicU64,
}

impl SimulatedResultGenerator {
    /// Generator using each provider's default score range
    pub fn new(scorer: Arc<dyn ScoreProvider>) -> Self {
        Self::with_profiles(
            scorer,
            Provider::ALL.iter().map(|p| (*p, p.default_score_profile())),
        )
    }

    /// Generator with explicit score ranges; missing providers use their defaults
    pub fn with_profiles(
        scorer: Arc<dyn ScoreProvider>,
        profiles: impl IntoIterator<Item = (Provider, ScoreProfile)>,
    ) -> Self {
        Self {
            scorer,
            profiles: profiles.into_iter().collect(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn score_profile(&self, provider: Provider) -> ScoreProfile {
        self.profiles
            .get(&provider)
            .copied()
            .unwrap_or_else(|| provider.default_score_profile())
    }

    /// Generate exactly `n` candidates for `provider`
    pub fn generate(&self, provider: Provider, query: &str, n: usize) -> Vec<MatchCandidate> {
        let profile = self.score_profile(provider);
        let millis = Utc::now().timestamp_millis();
        let mut rng = rand::thread_rng();

        (0..n)
            .map(|_| {
                let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
                let handle = random_handle(&mut rng);

                let profile_url = match provider {
                    Provider::VKontakte => {
                        format!("https://vk.com/id{}", rng.gen_range(0..9_999_999))
                    }
                    Provider::Facebook => format!("https://facebook.com/{}", handle),
                    Provider::Instagram => format!("https://instagram.com/{}", handle),
                    Provider::LinkedIn => format!("https://linkedin.com/in/{}", handle),
                    Provider::Telegram => format!("https://t.me/{}", handle),
                };

                let mut metadata = Map::new();
                metadata.insert("searchQuery".to_string(), Value::from(query));
                let extra: [(&str, Value); 2] = match provider {
                    Provider::VKontakte => [
                        ("lastSeen", Value::from(random_last_seen(&mut rng))),
                        ("mutualFriends", Value::from(rng.gen_range(0..50))),
                    ],
                    Provider::Facebook => [
                        ("mutualFriends", Value::from(rng.gen_range(0..100))),
                        ("location", Value::from(random_city(&mut rng))),
                    ],
                    Provider::Instagram => [
                        ("followers", Value::from(rng.gen_range(0..10_000))),
                        ("posts", Value::from(rng.gen_range(0..500))),
                    ],
                    Provider::LinkedIn => [
                        ("company", Value::from(random_company(&mut rng))),
                        ("position", Value::from(random_position(&mut rng))),
                    ],
                    Provider::Telegram => [
                        ("username", Value::from(format!("@{}", handle))),
                        ("online", Value::from(rng.gen::<f64>() > 0.7)),
                    ],
                };
                for (key, value) in extra {
                    metadata.insert(key.to_string(), value);
                }

                MatchCandidate {
                    id: format!("{}_sim_{}_{}", provider.id_prefix(), millis, seq),
                    name: random_name(&mut rng),
                    provider,
                    profile_url,
                    score: self.scorer.score(provider, profile),
                    avatar: provider_avatar(provider),
                    metadata,
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for SimulatedResultGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedResultGenerator")
            .field("profiles", &self.profiles)
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish()
    }
}
