use std::sync::Arc;

use crate::{
    config::Config,
    db::{connection::DbPool, redis::RedisPool},
    services::{
        ai::{AiService, DisabledAiService},
        audit_log::{AuditLogDispatcher, RecordingAuditLogDispatcher},
        notification::{NotificationDispatcher, RecordingNotifier},
        stats_cache::{NoopStatsCache, StatsCache},
        storage::{InMemoryStorage, ObjectStorage},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Config,
    pub redis_pool: Option<RedisPool>,
    pub storage: Arc<dyn ObjectStorage>,
    pub ai: Arc<dyn AiService>,
    pub stats_cache: Arc<dyn StatsCache>,
    pub audit: Arc<dyn AuditLogDispatcher>,
    pub notifier: Arc<dyn NotificationDispatcher>,
}

impl AppState {
    /// State with in-process adapters; integrations are swapped in with the `with_*` builders.
    pub fn new(pool: DbPool, config: Config) -> Self {
        Self {
            pool,
            config,
            redis_pool: None,
            storage: Arc::new(InMemoryStorage::new()),
            ai: Arc::new(DisabledAiService),
            stats_cache: Arc::new(NoopStatsCache),
            audit: Arc::new(RecordingAuditLogDispatcher::new()),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    pub fn with_redis(mut self, redis_pool: Option<RedisPool>) -> Self {
        self.redis_pool = redis_pool;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn ObjectStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_ai(mut self, ai: Arc<dyn AiService>) -> Self {
        self.ai = ai;
        self
    }

    pub fn with_stats_cache(mut self, stats_cache: Arc<dyn StatsCache>) -> Self {
        self.stats_cache = stats_cache;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditLogDispatcher>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        self.notifier = notifier;
        self
    }
}
