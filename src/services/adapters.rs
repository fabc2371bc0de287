//! Per-network request and field-mapping tables.
//!
//! Each network is one [`ProviderSpec`] record: how to build its search
//! request, where the result items live in the response, and how an item maps
//! onto a [`MatchCandidate`]. The HTTP client itself is shared.

use rand::Rng;
use serde_json::{Map, Value};

use crate::core::scoring::ScoreProvider;
use crate::core::simulated::{
    provider_avatar, random_city, random_company, random_last_seen, random_position,
};
use crate::models::{AvatarRef, MatchCandidate, Provider, ScoreProfile};

/// Inputs for building one outbound search request
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub base_url: &'a str,
    pub api_key: &'a str,
    pub query: &'a str,
    pub page_size: u32,
}

/// A fully built GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
}

impl OutboundRequest {
    fn get(url: String) -> Self {
        Self {
            url,
            headers: Vec::new(),
        }
    }

    fn header(mut self, name: &'static str, value: String) -> Self {
        self.headers.push((name, value));
        self
    }
}

/// Inputs for mapping one provider item
pub struct MapContext<'a> {
    pub query: &'a str,
    pub scorer: &'a dyn ScoreProvider,
    pub profile: ScoreProfile,
}

/// Request/response description of one network's search API
pub struct ProviderSpec {
    pub provider: Provider,
    pub default_base_url: &'static str,
    pub build_request: fn(&RequestContext<'_>) -> OutboundRequest,
    /// JSON pointer to the array of result items
    pub items_pointer: &'static str,
    pub map_item: fn(&Value, &MapContext<'_>) -> Option<MatchCandidate>,
}

impl std::fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSpec")
            .field("provider", &self.provider)
            .field("default_base_url", &self.default_base_url)
            .field("items_pointer", &self.items_pointer)
            .finish()
    }
}

pub static VKONTAKTE: ProviderSpec = ProviderSpec {
    provider: Provider::VKontakte,
    default_base_url: "https://api.vk.com",
    build_request: vk_request,
    items_pointer: "/response/items",
    map_item: map_vk_item,
};

pub static FACEBOOK: ProviderSpec = ProviderSpec {
    provider: Provider::Facebook,
    default_base_url: "https://graph.facebook.com",
    build_request: facebook_request,
    items_pointer: "/data",
    map_item: map_facebook_item,
};

pub static INSTAGRAM: ProviderSpec = ProviderSpec {
    provider: Provider::Instagram,
    default_base_url: "https://graph.instagram.com",
    build_request: instagram_request,
    items_pointer: "/data",
    map_item: map_instagram_item,
};

pub static LINKEDIN: ProviderSpec = ProviderSpec {
    provider: Provider::LinkedIn,
    default_base_url: "https://api.linkedin.com",
    build_request: linkedin_request,
    items_pointer: "/elements",
    map_item: map_linkedin_item,
};

pub static TELEGRAM: ProviderSpec = ProviderSpec {
    provider: Provider::Telegram,
    default_base_url: "https://api.telegram.org",
    build_request: telegram_request,
    items_pointer: "/result",
    map_item: map_telegram_item,
};

/// Spec record for a provider
pub fn spec_for(provider: Provider) -> &'static ProviderSpec {
    match provider {
        Provider::VKontakte => &VKONTAKTE,
        Provider::Facebook => &FACEBOOK,
        Provider::Instagram => &INSTAGRAM,
        Provider::LinkedIn => &LINKEDIN,
        Provider::Telegram => &TELEGRAM,
    }
}

fn base<'a>(ctx: &RequestContext<'a>) -> &'a str {
    ctx.base_url.trim_end_matches('/')
}

fn vk_request(ctx: &RequestContext<'_>) -> OutboundRequest {
    OutboundRequest::get(format!(
        "{}/method/users.search?q={}&count={}&access_token={}&v=5.131",
        base(ctx),
        urlencoding::encode(ctx.query),
        ctx.page_size,
        urlencoding::encode(ctx.api_key)
    ))
}

fn facebook_request(ctx: &RequestContext<'_>) -> OutboundRequest {
    OutboundRequest::get(format!(
        "{}/v18.0/search?q={}&type=user&access_token={}&limit={}",
        base(ctx),
        urlencoding::encode(ctx.query),
        urlencoding::encode(ctx.api_key),
        ctx.page_size
    ))
}

fn instagram_request(ctx: &RequestContext<'_>) -> OutboundRequest {
    OutboundRequest::get(format!(
        "{}/v12.0/search?q={}&type=user&access_token={}&limit={}",
        base(ctx),
        urlencoding::encode(ctx.query),
        urlencoding::encode(ctx.api_key),
        ctx.page_size
    ))
}

fn linkedin_request(ctx: &RequestContext<'_>) -> OutboundRequest {
    OutboundRequest::get(format!(
        "{}/v2/people/search?q={}&count={}",
        base(ctx),
        urlencoding::encode(ctx.query),
        ctx.page_size
    ))
    .header("Authorization", format!("Bearer {}", ctx.api_key))
    .header("X-Restli-Protocol-Version", "2.0.0".to_string())
}

fn telegram_request(ctx: &RequestContext<'_>) -> OutboundRequest {
    OutboundRequest::get(format!(
        "{}/bot{}/searchChatMembers?query={}&limit={}",
        base(ctx),
        urlencoding::encode(ctx.api_key),
        urlencoding::encode(ctx.query),
        ctx.page_size
    ))
}

/// Ids arrive as numbers or strings depending on the network
fn id_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_at<'a>(item: &'a Value, pointer: &str) -> Option<&'a str> {
    item.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Join name parts, skipping blanks; `None` when nothing is left
fn join_name(parts: &[Option<&str>]) -> Option<String> {
    let name = parts
        .iter()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Remote picture when it is a usable URL, generated avatar otherwise
fn avatar_or_generated(picture: Option<&str>, provider: Provider) -> AvatarRef {
    match picture {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            AvatarRef::Remote(url.to_string())
        }
        _ => provider_avatar(provider),
    }
}

fn candidate(
    provider: Provider,
    native_id: String,
    name: String,
    profile_url: String,
    avatar: AvatarRef,
    metadata: Map<String, Value>,
    ctx: &MapContext<'_>,
) -> MatchCandidate {
    MatchCandidate {
        id: format!("{}_{}", provider.id_prefix(), native_id),
        name,
        provider,
        profile_url,
        score: ctx.scorer.score(provider, ctx.profile),
        avatar,
        metadata,
    }
}

fn base_metadata(ctx: &MapContext<'_>) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("searchQuery".to_string(), Value::from(ctx.query));
    metadata
}

fn map_vk_item(item: &Value, ctx: &MapContext<'_>) -> Option<MatchCandidate> {
    let id = id_of(item.get("id"))?;
    let name = join_name(&[str_at(item, "/first_name"), str_at(item, "/last_name")])?;
    let mut rng = rand::thread_rng();

    let mut metadata = base_metadata(ctx);
    metadata.insert("lastSeen".to_string(), Value::from(random_last_seen(&mut rng)));
    let mutual = item
        .get("common_count")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| rng.gen_range(0..50));
    metadata.insert("mutualFriends".to_string(), Value::from(mutual));

    Some(candidate(
        Provider::VKontakte,
        id.clone(),
        name,
        format!("https://vk.com/id{}", id),
        avatar_or_generated(str_at(item, "/photo_100"), Provider::VKontakte),
        metadata,
        ctx,
    ))
}

fn map_facebook_item(item: &Value, ctx: &MapContext<'_>) -> Option<MatchCandidate> {
    let id = id_of(item.get("id"))?;
    let name = join_name(&[str_at(item, "/name")])?;
    let mut rng = rand::thread_rng();

    let mut metadata = base_metadata(ctx);
    metadata.insert("mutualFriends".to_string(), Value::from(rng.gen_range(0..100)));
    let location = str_at(item, "/location/name")
        .map(str::to_string)
        .unwrap_or_else(|| random_city(&mut rng));
    metadata.insert("location".to_string(), Value::from(location));

    Some(candidate(
        Provider::Facebook,
        id.clone(),
        name,
        format!("https://facebook.com/{}", id),
        avatar_or_generated(str_at(item, "/picture/data/url"), Provider::Facebook),
        metadata,
        ctx,
    ))
}

fn map_instagram_item(item: &Value, ctx: &MapContext<'_>) -> Option<MatchCandidate> {
    let id = id_of(item.get("id"))?;
    let username = str_at(item, "/username");
    let name = join_name(&[str_at(item, "/full_name")]).or_else(|| join_name(&[username]))?;
    let mut rng = rand::thread_rng();

    let mut metadata = base_metadata(ctx);
    let followers = item
        .get("followers_count")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| rng.gen_range(0..10_000));
    let posts = item
        .get("media_count")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| rng.gen_range(0..500));
    metadata.insert("followers".to_string(), Value::from(followers));
    metadata.insert("posts".to_string(), Value::from(posts));

    let handle = username.map(str::to_string).unwrap_or_else(|| id.clone());

    Some(candidate(
        Provider::Instagram,
        id,
        name,
        format!("https://instagram.com/{}", handle),
        avatar_or_generated(str_at(item, "/profile_picture_url"), Provider::Instagram),
        metadata,
        ctx,
    ))
}

fn map_linkedin_item(item: &Value, ctx: &MapContext<'_>) -> Option<MatchCandidate> {
    let id = id_of(item.get("id"))?;
    let name = join_name(&[
        str_at(item, "/firstName/localized/en_US"),
        str_at(item, "/lastName/localized/en_US"),
    ])?;
    let mut rng = rand::thread_rng();

    let mut metadata = base_metadata(ctx);
    let company = str_at(item, "/positions/elements/0/companyName")
        .map(str::to_string)
        .unwrap_or_else(|| random_company(&mut rng));
    let position = str_at(item, "/positions/elements/0/title")
        .map(str::to_string)
        .unwrap_or_else(|| random_position(&mut rng));
    metadata.insert("company".to_string(), Value::from(company));
    metadata.insert("position".to_string(), Value::from(position));

    let public_id = str_at(item, "/publicIdentifier")
        .map(str::to_string)
        .unwrap_or_else(|| id.clone());

    Some(candidate(
        Provider::LinkedIn,
        id,
        name,
        format!("https://linkedin.com/in/{}", public_id),
        avatar_or_generated(str_at(item, "/profilePicture/displayImage"), Provider::LinkedIn),
        metadata,
        ctx,
    ))
}

fn map_telegram_item(item: &Value, ctx: &MapContext<'_>) -> Option<MatchCandidate> {
    let user = item.get("user")?;
    let id = id_of(user.get("id"))?;
    let name = join_name(&[str_at(user, "/first_name"), str_at(user, "/last_name")])?;
    let username = str_at(user, "/username");

    let mut metadata = base_metadata(ctx);
    if let Some(username) = username {
        metadata.insert("username".to_string(), Value::from(format!("@{}", username)));
    }
    let online = str_at(user, "/status") == Some("online");
    metadata.insert("online".to_string(), Value::from(online));

    let profile_url = match username {
        Some(username) => format!("https://t.me/{}", username),
        None => format!("tg://user?id={}", id),
    };

    Some(candidate(
        Provider::Telegram,
        id,
        name,
        profile_url,
        avatar_or_generated(str_at(user, "/photo/big_file_id"), Provider::Telegram),
        metadata,
        ctx,
    ))
}
