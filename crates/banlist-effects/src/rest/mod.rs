//! REST gateway
//!
//! Implements `GuildGateway` against the chat platform's HTTP API using the
//! bot token. Rate-limited responses (429) are retried after the advertised
//! `retry_after`, up to `max_rate_limit_retries` times; every other failure is
//! returned to the caller.
//!
//! Membership is cache-only: the REST API offers no member stream without
//! privileged intents, so the cache is filled by whoever observes member
//! events through [`RestGateway::record_member`].

pub mod errors;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, trace, warn};

use banlist_core::{
    BanFailure, BanRequest, BanlistError, BanlistResult, ChannelId, Guild, GuildGateway, GuildId,
    UserId,
};

pub use errors::{classify_ban_error, ApiErrorBody, RestError};

const AUDIT_LOG_REASON: &str = "X-Audit-Log-Reason";
const BAN_PAGE_SIZE: usize = 1000;
const GUILD_PAGE_SIZE: usize = 200;

/// REST gateway configuration.
#[derive(Clone)]
pub struct RestGatewayConfig {
    /// API root, e.g. `https://discord.com/api/v10`
    pub base_url: String,
    /// Bot token, sent as `Authorization: Bot <token>`
    pub token: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// How many 429 responses to wait out before giving up
    pub max_rate_limit_retries: u32,
}

impl RestGatewayConfig {
    /// Configuration with default endpoint and timeouts.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: "https://discord.com/api/v10".to_string(),
            token: token.into(),
            request_timeout: Duration::from_secs(30),
            max_rate_limit_retries: 3,
        }
    }
}

impl std::fmt::Debug for RestGatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestGatewayConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct GuildPayload {
    id: String,
    #[serde(default)]
    name: String,
    owner_id: String,
}

#[derive(Debug, Deserialize)]
struct PartialGuildPayload {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    global_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BanPayload {
    user: UserPayload,
}

#[derive(Debug, Deserialize)]
struct RateLimitPayload {
    retry_after: f64,
}

/// `GuildGateway` over the platform REST API.
pub struct RestGateway {
    config: RestGatewayConfig,
    client: Client,
    members: RwLock<HashMap<GuildId, HashSet<UserId>>>,
}

impl std::fmt::Debug for RestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestGateway")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RestGateway {
    /// Build the HTTP client.
    pub fn new(config: RestGatewayConfig) -> BanlistResult<Self> {
        if config.token.trim().is_empty() {
            return Err(BanlistError::config("bot token is empty"));
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BanlistError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            client,
            members: RwLock::new(HashMap::new()),
        })
    }

    /// Record that `user` is a member of `guild`.
    pub fn record_member(&self, guild: GuildId, user: UserId) {
        self.members.write().entry(guild).or_default().insert(user);
    }

    /// Drop a cached membership.
    pub fn forget_member(&self, guild: GuildId, user: UserId) {
        if let Some(users) = self.members.write().get_mut(&guild) {
            users.remove(&user);
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Send a request, waiting out rate limits.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        reason: Option<&str>,
    ) -> Result<Response, RestError> {
        let url = self.url(path);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(AUTHORIZATION, format!("Bot {}", self.config.token));
            if let Some(reason) = reason {
                request = request.header(AUDIT_LOG_REASON, audit_log_reason(reason)?);
            }
            if let Some(json_body) = body {
                request = request.json(json_body);
            }

            trace!(%method, url = %url, attempt, "Sending REST request");
            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS
                && attempt <= self.config.max_rate_limit_retries
            {
                let wait = response
                    .json::<RateLimitPayload>()
                    .await
                    .map(|payload| Duration::from_secs_f64(payload.retry_after.max(0.0)))
                    .unwrap_or(Duration::from_secs(1));
                warn!(url = %url, attempt, wait_ms = wait.as_millis() as u64, "Rate limited, waiting");
                tokio::time::sleep(wait).await;
                continue;
            }

            if status.is_success() {
                return Ok(response);
            }

            let body = response.json::<ApiErrorBody>().await.unwrap_or_default();
            return Err(RestError::Api {
                status: status.as_u16(),
                body,
            });
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RestError> {
        let response = self.send(Method::GET, path, None, None).await?;
        Ok(response.json::<T>().await?)
    }

    async fn fetch_user(&self, user: UserId) -> Result<UserPayload, RestError> {
        self.get_json(&format!("/users/{user}")).await
    }
}

/// The audit-log header carries the reason URL-encoded.
fn audit_log_reason(reason: &str) -> Result<HeaderValue, RestError> {
    HeaderValue::from_str(&urlencoding::encode(reason))
        .map_err(|e| RestError::Request(e.to_string()))
}

fn parse_snowflake<T: std::str::FromStr>(raw: &str) -> BanlistResult<T> {
    raw.parse()
        .map_err(|_| BanlistError::gateway(format!("invalid snowflake {raw:?}")))
}

fn gateway_error(err: RestError) -> BanlistError {
    BanlistError::gateway(err.to_string())
}

#[async_trait]
impl GuildGateway for RestGateway {
    async fn resolve_guild(&self, guild: GuildId) -> BanlistResult<Option<Guild>> {
        match self.get_json::<GuildPayload>(&format!("/guilds/{guild}")).await {
            Ok(payload) => Ok(Some(Guild::new(
                parse_snowflake(&payload.id)?,
                parse_snowflake(&payload.owner_id)?,
                payload.name,
            ))),
            Err(RestError::Api {
                status: 403 | 404, ..
            }) => Ok(None),
            Err(err) => Err(gateway_error(err)),
        }
    }

    async fn joined_guild_ids(&self) -> BanlistResult<Vec<GuildId>> {
        let mut ids: Vec<GuildId> = Vec::new();
        let mut after: Option<GuildId> = None;
        loop {
            let mut path = format!("/users/@me/guilds?limit={GUILD_PAGE_SIZE}");
            if let Some(cursor) = after {
                path.push_str(&format!("&after={cursor}"));
            }
            let page: Vec<PartialGuildPayload> = self.get_json(&path).await.map_err(gateway_error)?;
            let page_len = page.len();
            for partial in page {
                ids.push(parse_snowflake(&partial.id)?);
            }
            after = ids.iter().max().copied();
            if page_len < GUILD_PAGE_SIZE {
                break;
            }
        }
        debug!(count = ids.len(), "Listed joined guilds");
        Ok(ids)
    }

    async fn list_bans(&self, guild: GuildId) -> BanlistResult<Vec<UserId>> {
        let mut banned = Vec::new();
        let mut after: Option<UserId> = None;
        loop {
            let mut path = format!("/guilds/{guild}/bans?limit={BAN_PAGE_SIZE}");
            if let Some(cursor) = after {
                path.push_str(&format!("&after={cursor}"));
            }
            let page: Vec<BanPayload> = self.get_json(&path).await.map_err(gateway_error)?;
            let page_len = page.len();
            for entry in page {
                banned.push(parse_snowflake::<UserId>(&entry.user.id)?);
            }
            after = banned.iter().max().copied();
            if page_len < BAN_PAGE_SIZE {
                break;
            }
        }
        debug!(guild_id = %guild, count = banned.len(), "Fetched ban list");
        Ok(banned)
    }

    async fn ban(&self, request: &BanRequest) -> Result<(), BanFailure> {
        let body = json!({ "delete_message_seconds": request.delete_message_seconds });
        let path = format!("/guilds/{}/bans/{}", request.guild_id, request.user_id);
        self.send(Method::PUT, &path, Some(&body), Some(&request.reason))
            .await
            .map(|_| ())
            .map_err(|err| classify_ban_error(&err))
    }

    fn is_cached_member(&self, guild: GuildId, user: UserId) -> bool {
        self.members
            .read()
            .get(&guild)
            .is_some_and(|users| users.contains(&user))
    }

    async fn display_label(&self, user: UserId) -> String {
        match self.fetch_user(user).await {
            Ok(payload) => {
                let display = payload
                    .global_name
                    .filter(|name| !name.is_empty())
                    .or(payload.username)
                    .unwrap_or_else(|| user.to_string());
                format!("{display} ({})", payload.id)
            }
            Err(err) => {
                debug!(user_id = %user, error = %err, "Display name lookup failed");
                user.to_string()
            }
        }
    }

    async fn send_message(&self, channel: ChannelId, content: &str) {
        let body = json!({ "content": content });
        let path = format!("/channels/{channel}/messages");
        if let Err(err) = self.send(Method::POST, &path, Some(&body), None).await {
            warn!(channel_id = %channel, error = %err, "Failed to send notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_is_rejected() {
        let err = RestGateway::new(RestGatewayConfig::new("  ")).unwrap_err();
        assert!(matches!(err, BanlistError::Config { .. }));
    }

    #[test]
    fn debug_redacts_token() {
        let rendered = format!("{:?}", RestGatewayConfig::new("secret-token"));
        assert!(!rendered.contains("secret-token"));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let mut config = RestGatewayConfig::new("t");
        config.base_url = "http://localhost:8080/api/".to_string();
        let gateway = RestGateway::new(config).unwrap();
        assert_eq!(gateway.url("/guilds/1"), "http://localhost:8080/api/guilds/1");
    }

    #[test]
    fn membership_cache_round_trip() {
        let gateway = RestGateway::new(RestGatewayConfig::new("t")).unwrap();
        let (guild, user) = (GuildId::new(1), UserId::new(2));
        assert!(!gateway.is_cached_member(guild, user));
        gateway.record_member(guild, user);
        assert!(gateway.is_cached_member(guild, user));
        gateway.forget_member(guild, user);
        assert!(!gateway.is_cached_member(guild, user));
    }

    #[test]
    fn audit_reason_is_url_encoded() {
        let header = audit_log_reason("Listed in registry\nsee: #mods é").unwrap();
        assert_eq!(
            header.to_str().unwrap(),
            "Listed%20in%20registry%0Asee%3A%20%23mods%20%C3%A9"
        );
    }

    #[test]
    fn ban_payload_decodes_user_id() {
        let page: Vec<BanPayload> =
            serde_json::from_str(r#"[{"reason":null,"user":{"id":"42","username":"x"}}]"#)
                .unwrap();
        assert_eq!(parse_snowflake::<UserId>(&page[0].user.id).unwrap(), UserId::new(42));
    }
}
