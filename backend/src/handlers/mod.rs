pub mod action_items;
pub mod admin;
pub mod attachments;
pub mod auth;
pub mod common;
pub mod export;
pub mod health;
pub mod incidents;
pub mod notifications;
pub mod post_mortems;
pub mod reports;
pub mod stats;
pub mod tags;
pub mod templates;
