//! Optional Redis pool backing the stats cache.

use anyhow::Context;
use bb8::Pool;
use bb8_redis::{redis, RedisConnectionManager};
use std::time::Duration;

use crate::config::Config;

pub type RedisPool = Pool<RedisConnectionManager>;

/// `Ok(None)` when `REDIS_URL` is unset. A server that is configured but
/// unreachable is an error so the caller can fall back to no caching.
pub async fn create_redis_pool(config: &Config) -> anyhow::Result<Option<RedisPool>> {
    let Some(url) = config.redis_url.as_deref().filter(|url| !url.trim().is_empty()) else {
        tracing::info!("REDIS_URL not set, stats caching disabled");
        return Ok(None);
    };

    let manager = RedisConnectionManager::new(url).context("invalid REDIS_URL")?;
    let pool = Pool::builder()
        .max_size(config.redis_pool_size.max(1))
        .connection_timeout(Duration::from_secs(config.redis_connect_timeout))
        .build(manager)
        .await
        .context("building redis pool")?;
    ping(&pool).await?;

    tracing::info!(
        pool_size = config.redis_pool_size,
        connect_timeout_secs = config.redis_connect_timeout,
        ttl_secs = config.stats_cache_ttl_seconds,
        "Redis stats cache connected"
    );
    Ok(Some(pool))
}

async fn ping(pool: &RedisPool) -> anyhow::Result<()> {
    let mut conn = pool.get().await.context("acquiring redis connection")?;
    let _: String = redis::cmd("PING")
        .query_async(&mut *conn)
        .await
        .context("redis PING failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[tokio::test]
    async fn unset_or_blank_url_disables_caching() {
        let mut config = test_config();
        config.redis_url = None;
        assert!(create_redis_pool(&config).await.expect("no pool").is_none());

        config.redis_url = Some("  ".into());
        assert!(create_redis_pool(&config).await.expect("no pool").is_none());
    }

    #[tokio::test]
    async fn malformed_url_is_rejected() {
        let mut config = test_config();
        config.redis_url = Some("not a redis url".into());
        assert!(create_redis_pool(&config).await.is_err());
    }
}
