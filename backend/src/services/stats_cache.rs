//! Redis cache for dashboard statistics.

use async_trait::async_trait;
use bb8_redis::redis::{self, AsyncCommands};
use tracing::instrument;

use crate::db::redis::RedisPool;
use crate::models::stats::TrendPeriod;

const STATS_KEY_PATTERN: &str = "stats:*";

pub fn dashboard_key(period: TrendPeriod) -> String {
    format!("stats:dashboard:{}", period.as_str())
}

#[async_trait]
pub trait StatsCache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<()>;

    /// Drops every `stats:*` entry.
    async fn invalidate_all(&self) -> anyhow::Result<()>;
}

pub struct RedisStatsCache {
    pool: RedisPool,
}

impl RedisStatsCache {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatsCache for RedisStatsCache {
    #[instrument(name = "redis_stats_get", level = "debug", skip(self))]
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.pool.get().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    #[instrument(name = "redis_stats_set", level = "debug", skip(self, value))]
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<()> {
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await?;
        Ok(())
    }

    #[instrument(name = "redis_stats_invalidate", level = "debug", skip(self))]
    async fn invalidate_all(&self) -> anyhow::Result<()> {
        let mut conn = self.pool.get().await?;
        let keys: Vec<String> = conn.keys(STATS_KEY_PATTERN).await?;
        if keys.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            pipe.del(key);
        }
        pipe.query_async::<_, ()>(&mut *conn).await?;
        Ok(())
    }
}

/// Used when Redis is not configured; every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatsCache;

#[async_trait]
impl StatsCache for NoopStatsCache {
    async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl_seconds: u64) -> anyhow::Result<()> {
        Ok(())
    }

    async fn invalidate_all(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
