use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::TagId;
use crate::validation::rules::validate_hex_color;

pub const DEFAULT_TAG_COLOR: &str = "#808080";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
/// Label attached to incidents and templates.
pub struct Tag {
    pub id: TagId,
    pub name: String,
    /// `#RRGGBB` color used by the UI.
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    pub fn new(name: String, color: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TagId::new(),
            name,
            color: color
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string()),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct TagPayload {
    #[validate(length(min = 1, max = 50, message = "must be 1-50 characters"))]
    pub name: String,
    #[validate(custom(function = "validate_hex_color"))]
    pub color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tag_defaults_color() {
        assert_eq!(Tag::new("db".into(), None).color, DEFAULT_TAG_COLOR);
        assert_eq!(Tag::new("db".into(), Some(" ".into())).color, DEFAULT_TAG_COLOR);
        assert_eq!(Tag::new("db".into(), Some("#ff0000".into())).color, "#ff0000");
    }
}
