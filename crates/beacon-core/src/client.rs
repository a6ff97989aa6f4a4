//! Client metadata extraction and user-agent classification.

use serde::{Deserialize, Serialize};

/// Client metadata attached to a session. Fields the client did not supply
/// are filled in from the request transport by the ingestion layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientMeta {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub browser: Option<String>,
    pub device_type: Option<String>,
}

impl ClientMeta {
    /// Fill `browser` and `device_type` from the user agent when the client
    /// did not send them explicitly.
    pub fn classify(&mut self) {
        let ua = self.user_agent.clone().unwrap_or_default();
        if self.device_type.is_none() {
            self.device_type = Some(detect_device_type(&ua).to_string());
        }
        if self.browser.is_none() {
            self.browser = Some(detect_browser(&ua).to_string());
        }
    }
}

/// Classify a user agent as "mobile", "tablet" or "desktop".
///
/// Mobile markers are checked before tablet markers, so a UA containing
/// both "iphone" and "tablet"-ish tokens classifies as mobile.
pub fn detect_device_type(user_agent: &str) -> &'static str {
    let ua = user_agent.to_lowercase();
    if ["mobile", "android", "iphone"].iter().any(|m| ua.contains(m)) {
        "mobile"
    } else if ["tablet", "ipad"].iter().any(|m| ua.contains(m)) {
        "tablet"
    } else {
        "desktop"
    }
}

/// Classify a user agent's browser via a first-match substring scan.
///
/// The scan order is fixed: user agents legitimately contain several browser
/// tokens (Chrome UAs contain "safari"), and ties resolve to the first rule.
pub fn detect_browser(user_agent: &str) -> &'static str {
    let ua = user_agent.to_lowercase();
    for (needle, name) in [
        ("chrome", "chrome"),
        ("firefox", "firefox"),
        ("safari", "safari"),
        ("edge", "edge"),
    ] {
        if ua.contains(needle) {
            return name;
        }
    }
    "other"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iphone_is_mobile() {
        assert_eq!(
            detect_device_type("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"),
            "mobile"
        );
    }

    #[test]
    fn ipad_is_tablet() {
        assert_eq!(
            detect_device_type("Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X)"),
            "tablet"
        );
    }

    #[test]
    fn unmarked_agent_is_desktop() {
        assert_eq!(
            detect_device_type("Mozilla/5.0 (Windows NT 10.0; Win64; x64)"),
            "desktop"
        );
    }

    #[test]
    fn android_is_mobile_even_with_tablet_token() {
        // Mobile markers win because they are scanned first.
        assert_eq!(detect_device_type("Mozilla/5.0 (Android Tablet)"), "mobile");
    }

    #[test]
    fn chrome_wins_over_embedded_safari_token() {
        let ua = "Mozilla/5.0 AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
        assert_eq!(detect_browser(ua), "chrome");
    }

    #[test]
    fn plain_safari_detected() {
        let ua = "Mozilla/5.0 (Macintosh) AppleWebKit/605.1.15 Version/17.0 Safari/605.1.15";
        assert_eq!(detect_browser(ua), "safari");
    }

    #[test]
    fn unknown_browser_is_other() {
        assert_eq!(detect_browser("curl/8.4.0"), "other");
    }

    #[test]
    fn classify_respects_explicit_values() {
        let mut meta = ClientMeta {
            user_agent: Some("Mozilla/5.0 (iPhone) Safari".to_string()),
            browser: Some("chrome".to_string()),
            ..Default::default()
        };
        meta.classify();
        assert_eq!(meta.browser.as_deref(), Some("chrome"));
        assert_eq!(meta.device_type.as_deref(), Some("mobile"));
    }
}
