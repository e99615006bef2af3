use secrecy::{ExposeSecret, SecretString};

/// Wraps a backend API key with secrecy protection (zeroized on drop, redacted in Debug).
#[derive(Clone)]
pub struct ApiKey(pub SecretString);

impl ApiKey {
    /// Returns `None` for an absent or blank key, which selects demo mode.
    pub fn from_env_value(value: Option<String>) -> Option<Self> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|v| Self(SecretString::from(v)))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// Environment variable names read by the settings loader.
pub mod env_vars {
    pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
    pub const DOCKET_CONFIG: &str = "DOCKET_CONFIG";
    pub const DOCKET_HOST: &str = "DOCKET_HOST";
    pub const DOCKET_PORT: &str = "DOCKET_PORT";
    pub const DOCKET_ENV: &str = "DOCKET_ENV";
    pub const DOCKET_LOG_LEVEL: &str = "DOCKET_LOG_LEVEL";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const DOCKET_DEMO_DELAY_MS: &str = "DOCKET_DEMO_DELAY_MS";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_debug_redacted() {
        let key = ApiKey(SecretString::from("sk-ant-12345"));
        let debug = format!("{:?}", key);
        assert!(!debug.contains("sk-ant"), "key leaked in debug: {debug}");
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn blank_key_is_absent() {
        assert!(ApiKey::from_env_value(None).is_none());
        assert!(ApiKey::from_env_value(Some("   ".into())).is_none());
        let key = ApiKey::from_env_value(Some(" sk-ant-1 ".into())).unwrap();
        assert_eq!(key.expose(), "sk-ant-1");
    }
}
