//! Common validation rules shared across request payloads.

use validator::ValidationError;

/// Validates a `#RRGGBB` color string.
pub fn validate_hex_color(color: &str) -> Result<(), ValidationError> {
    let Some(hex) = color.strip_prefix('#') else {
        return Err(ValidationError::new("color_invalid_format"));
    };
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::new("color_invalid_format"));
    }
    Ok(())
}

/// Slack incoming webhooks must be HTTPS URLs.
pub fn validate_webhook_url(raw: &str) -> Result<(), ValidationError> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|_| ValidationError::new("webhook_invalid_url"))?;
    if parsed.scheme() != "https" || parsed.host_str().is_none() {
        return Err(ValidationError::new("webhook_requires_https"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_color_accepts_six_digit_values() {
        assert!(validate_hex_color("#808080").is_ok());
        assert!(validate_hex_color("#A1b2C3").is_ok());
    }

    #[test]
    fn hex_color_rejects_malformed_values() {
        assert!(validate_hex_color("808080").is_err());
        assert!(validate_hex_color("#fff").is_err());
        assert!(validate_hex_color("#gggggg").is_err());
    }

    #[test]
    fn webhook_requires_https() {
        assert!(validate_webhook_url("https://hooks.slack.com/services/T/B/X").is_ok());
        assert!(validate_webhook_url("http://hooks.slack.com/services/T/B/X").is_err());
        assert!(validate_webhook_url("not a url").is_err());
    }
}
