pub mod action_item;
pub mod activity;
pub mod ai;
pub mod attachment;
pub mod audit_log;
pub mod auth;
pub mod export;
pub mod incident;
pub mod notification;
pub mod notification_setting;
pub mod post_mortem;
pub mod report;
pub mod stats;
pub mod stats_cache;
pub mod storage;
pub mod tag;
pub mod template;
pub mod user;
pub mod worker_pool;

#[cfg(test)]
pub(crate) mod test_support;
