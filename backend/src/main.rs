use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use incidex_backend::{
    config::Config,
    db::{connection::create_pool, redis::create_redis_pool},
    routes::build_app,
    services::{
        ai::{AiService, DisabledAiService, OpenAiService},
        audit_log::PooledAuditLogDispatcher,
        notification::PooledNotificationDispatcher,
        stats_cache::{NoopStatsCache, RedisStatsCache, StatsCache},
        storage::{ObjectStorage, S3Storage},
        user::UserService,
    },
    state::AppState,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

fn mask_url_password(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => raw.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "incidex_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        app_env = %config.app_env,
        port = config.port,
        database_url = %mask_url_password(&config.database_url),
        jwt_secret = %mask_secret(&config.jwt_secret),
        jwt_expiration_hours = config.jwt_expiration_hours,
        minio_endpoint = %config.minio_endpoint_url(),
        minio_bucket = %config.minio_bucket,
        minio_secret_key = %mask_secret(&config.minio_secret_key),
        openai_enabled = config.openai_enabled(),
        redis_enabled = config.redis_url.is_some(),
        "Loaded configuration from environment/.env"
    );

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let redis_pool = match create_redis_pool(&config).await {
        Ok(pool) => pool,
        Err(err) => {
            tracing::warn!(error = %err, "Redis unavailable, stats caching disabled");
            None
        }
    };
    let stats_cache: Arc<dyn StatsCache> = match &redis_pool {
        Some(redis) => Arc::new(RedisStatsCache::new(redis.clone())),
        None => Arc::new(NoopStatsCache),
    };

    let storage = S3Storage::from_config(&config).await;
    if let Err(err) = storage.ensure_bucket().await {
        tracing::warn!(error = %err, bucket = %config.minio_bucket, "Attachment bucket not ready");
    }

    let ai: Arc<dyn AiService> = match OpenAiService::from_config(&config) {
        Some(service) => Arc::new(service),
        None => {
            tracing::info!("OPENAI_API_KEY not set, AI summaries disabled");
            Arc::new(DisabledAiService)
        }
    };

    let audit = PooledAuditLogDispatcher::spawn(
        pool.clone(),
        config.audit_worker_count,
        config.audit_queue_capacity,
    );
    let notifier = PooledNotificationDispatcher::spawn(pool.clone(), &config);

    let state = AppState::new(pool, config.clone())
        .with_redis(redis_pool)
        .with_storage(Arc::new(storage))
        .with_ai(ai)
        .with_stats_cache(stats_cache)
        .with_audit(Arc::new(audit))
        .with_notifier(Arc::new(notifier));

    if let Some(admin) = UserService::from_state(&state)
        .bootstrap_admin(&config)
        .await?
    {
        tracing::info!(user_id = %admin.id, email = %admin.email, "Initial administrator created");
    }

    let app = build_app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
