//! PostgreSQL registry store
//!
//! Schema:
//! - `users(discord_id BIGINT PRIMARY KEY)`: the global registry
//! - `servers(server_id, owner_id, info_channel_id, enabler)`: one row per guild
//!
//! Snowflakes are stored as `BIGINT`; values above `i64::MAX` are rejected.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::collections::HashSet;
use tracing::{debug, info};

use banlist_core::{
    BanlistError, BanlistResult, ChannelId, EnforcementTarget, GuildConfig, GuildConfigUpdate,
    GuildId, RegistryStore, UserId,
};

const CREATE_USERS: &str = r"
    CREATE TABLE IF NOT EXISTS public.users (
        discord_id BIGINT PRIMARY KEY
    )";

const CREATE_SERVERS: &str = r"
    CREATE TABLE IF NOT EXISTS public.servers (
        server_id BIGINT PRIMARY KEY,
        owner_id BIGINT NOT NULL,
        info_channel_id BIGINT,
        enabler BOOLEAN NOT NULL DEFAULT FALSE
    )";

/// Row shape of `public.servers`.
#[derive(Debug, Clone, FromRow)]
struct ServerRow {
    server_id: i64,
    owner_id: i64,
    info_channel_id: Option<i64>,
    enabler: bool,
}

impl ServerRow {
    fn into_config(self) -> BanlistResult<GuildConfig> {
        Ok(GuildConfig {
            guild_id: GuildId::new(from_db(self.server_id)?),
            owner_id: UserId::new(from_db(self.owner_id)?),
            notification_channel_id: self
                .info_channel_id
                .map(from_db)
                .transpose()?
                .map(ChannelId::new),
            enforcement_enabled: self.enabler,
        })
    }
}

/// Registry store backed by a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PostgresRegistryStore {
    pool: PgPool,
}

impl PostgresRegistryStore {
    /// Connect to `database_url` with a small pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> BanlistResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(store_error)?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RegistryStore for PostgresRegistryStore {
    async fn ensure_schema(&self) -> BanlistResult<()> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        sqlx::query(CREATE_USERS)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        sqlx::query(CREATE_SERVERS)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        tx.commit().await.map_err(store_error)?;
        info!("Registry schema ensured");
        Ok(())
    }

    async fn flagged_identities(&self) -> BanlistResult<HashSet<UserId>> {
        let rows: Vec<i64> = sqlx::query_scalar("SELECT discord_id FROM public.users")
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        rows.into_iter()
            .map(|raw| from_db(raw).map(UserId::new))
            .collect()
    }

    async fn remove_flagged(&self, user: UserId) -> BanlistResult<()> {
        let result = sqlx::query("DELETE FROM public.users WHERE discord_id = $1")
            .bind(to_db(user.get())?)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        debug!(user_id = %user, rows = result.rows_affected(), "Removed flagged identity");
        Ok(())
    }

    async fn guild_config(&self, guild: GuildId) -> BanlistResult<Option<GuildConfig>> {
        let row: Option<ServerRow> = sqlx::query_as(
            r"
            SELECT server_id, owner_id, info_channel_id, enabler
            FROM public.servers
            WHERE server_id = $1
            ",
        )
        .bind(to_db(guild.get())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        row.map(ServerRow::into_config).transpose()
    }

    async fn upsert_guild_config(&self, update: GuildConfigUpdate) -> BanlistResult<GuildConfig> {
        let row: ServerRow = sqlx::query_as(
            r"
            INSERT INTO public.servers (server_id, owner_id, info_channel_id, enabler)
            VALUES ($1, $2, $3, COALESCE($4, FALSE))
            ON CONFLICT (server_id) DO UPDATE
            SET owner_id = EXCLUDED.owner_id,
                info_channel_id = COALESCE(EXCLUDED.info_channel_id, public.servers.info_channel_id),
                enabler = COALESCE($4, public.servers.enabler)
            RETURNING server_id, owner_id, info_channel_id, enabler
            ",
        )
        .bind(to_db(update.guild_id.get())?)
        .bind(to_db(update.owner_id.get())?)
        .bind(
            update
                .notification_channel_id
                .map(|channel| to_db(channel.get()))
                .transpose()?,
        )
        .bind(update.enforcement_enabled)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;
        row.into_config()
    }

    async fn enforcement_targets(&self) -> BanlistResult<Vec<EnforcementTarget>> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r"
            SELECT server_id, info_channel_id
            FROM public.servers
            WHERE enabler = TRUE AND info_channel_id IS NOT NULL
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter()
            .map(|(server_id, channel_id)| {
                Ok(EnforcementTarget {
                    guild_id: GuildId::new(from_db(server_id)?),
                    channel_id: ChannelId::new(from_db(channel_id)?),
                })
            })
            .collect()
    }
}

fn store_error(err: sqlx::Error) -> BanlistError {
    BanlistError::store(err.to_string())
}

fn to_db(raw: u64) -> BanlistResult<i64> {
    i64::try_from(raw).map_err(|_| BanlistError::store(format!("snowflake {raw} exceeds BIGINT")))
}

fn from_db(raw: i64) -> BanlistResult<u64> {
    u64::try_from(raw).map_err(|_| BanlistError::store(format!("negative snowflake {raw} in store")))
}
