//! Server settings from environment variables.

/// Runtime settings shared by every generated route.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Path prefix for every resource route and link, e.g. `/api/v1`. Empty for none.
    pub prefix: String,
    /// Expected `X-Api-Client` / `X-Api-Secret`. Authentication is disabled unless both are set.
    pub credentials: Option<(String, String)>,
    pub default_limit: u64,
}

pub const DEFAULT_LIMIT: u64 = 25;

impl Default for Settings {
    fn default() -> Self {
        Settings {
            prefix: String::new(),
            credentials: None,
            default_limit: DEFAULT_LIMIT,
        }
    }
}

impl Settings {
    /// `SCHEMA_REST_PREFIX`, `SCHEMA_REST_CLIENT`, `SCHEMA_REST_SECRET`, `SCHEMA_REST_DEFAULT_LIMIT`.
    pub fn from_env() -> Self {
        let prefix = std::env::var("SCHEMA_REST_PREFIX").unwrap_or_default();
        let client = std::env::var("SCHEMA_REST_CLIENT").ok().filter(|s| !s.is_empty());
        let secret = std::env::var("SCHEMA_REST_SECRET").ok().filter(|s| !s.is_empty());
        let default_limit = std::env::var("SCHEMA_REST_DEFAULT_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_LIMIT);
        Settings {
            prefix: normalize_prefix(&prefix),
            credentials: client.zip(secret),
            default_limit,
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = normalize_prefix(prefix);
        self
    }

    pub fn with_credentials(mut self, client: &str, secret: &str) -> Self {
        self.credentials = Some((client.to_string(), secret.to_string()));
        self
    }
}

/// Leading slash, no trailing slash: "api/" -> "/api", "/" -> "".
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
