//! Persistence adapters. Each repository is a unit struct behind a mockable trait.

pub mod action_item;
pub mod activity;
pub mod attachment;
pub mod audit_log;
pub mod common;
pub mod incident;
pub mod notification_setting;
pub mod post_mortem;
pub mod tag;
pub mod template;
pub mod transaction;
pub mod user;

pub use action_item::{ActionItemRepository, ActionItemRepositoryTrait};
pub use activity::{ActivityRepository, ActivityRepositoryTrait};
pub use attachment::{AttachmentRepository, AttachmentRepositoryTrait};
pub use audit_log::{AuditLogRepository, AuditLogRepositoryTrait};
pub use incident::{IncidentRepository, IncidentRepositoryTrait};
pub use notification_setting::{NotificationSettingRepository, NotificationSettingRepositoryTrait};
pub use post_mortem::{PostMortemRepository, PostMortemRepositoryTrait};
pub use tag::{TagRepository, TagRepositoryTrait};
pub use template::{TemplateRepository, TemplateRepositoryTrait};
pub use user::{UserRepository, UserRepositoryTrait};
