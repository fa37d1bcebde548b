use std::env;

/// Connection settings for one ClickHouse instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub username: String,
    pub password: String,
    /// Host (optionally host:port) without scheme.
    pub url: String,
    /// "http" or "https".
    pub protocol: String,
}

impl ConnectionSettings {
    pub fn endpoint(&self) -> String {
        format!("{}://{}", self.protocol, self.url)
    }
}

/// Source (read) and target (write) database settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub source: ConnectionSettings,
    pub target: ConnectionSettings,
}

const SOURCE_PREFIX: &str = "SOURCE_CLICKHOUSE";
const TARGET_PREFIX: &str = "TARGET_CLICKHOUSE";
const LEGACY_PREFIX: &str = "XATU_CLICKHOUSE";

impl DbConfig {
    pub fn from_env() -> Self {
        let get = |name: &str| env::var(name).ok();
        if uses_legacy_vars(&get) {
            eprintln!(
                "Warning: using legacy {LEGACY_PREFIX}_* environment variables. \
                 Please migrate to {SOURCE_PREFIX}_* and {TARGET_PREFIX}_*."
            );
        }
        Self::resolve(get)
    }

    /// Resolve settings through an explicit precedence list per variable:
    /// role-specific name, then legacy name, then default. Takes the lookup
    /// as a function so tests can inject an environment.
    pub fn resolve(get: impl Fn(&str) -> Option<String>) -> Self {
        DbConfig {
            source: resolve_role(SOURCE_PREFIX, &get),
            target: resolve_role(TARGET_PREFIX, &get),
        }
    }
}

fn uses_legacy_vars(get: &impl Fn(&str) -> Option<String>) -> bool {
    get(&format!("{SOURCE_PREFIX}_URL")).is_none() && get(&format!("{LEGACY_PREFIX}_URL")).is_some()
}

fn resolve_role(prefix: &str, get: &impl Fn(&str) -> Option<String>) -> ConnectionSettings {
    ConnectionSettings {
        username: resolve_var(prefix, "USERNAME", "default", get),
        password: resolve_var(prefix, "PASSWORD", "", get),
        url: resolve_var(prefix, "URL", "localhost:8123", get),
        protocol: resolve_var(prefix, "PROTOCOL", "http", get),
    }
}

fn resolve_var(
    prefix: &str,
    suffix: &str,
    default: &str,
    get: &impl Fn(&str) -> Option<String>,
) -> String {
    get(&format!("{prefix}_{suffix}"))
        .or_else(|| get(&format!("{LEGACY_PREFIX}_{suffix}")))
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn primary_vars_win_over_legacy() {
        let env = env_of(&[
            ("SOURCE_CLICKHOUSE_URL", "src.example.com:8443"),
            ("SOURCE_CLICKHOUSE_PROTOCOL", "https"),
            ("XATU_CLICKHOUSE_URL", "legacy.example.com"),
            ("TARGET_CLICKHOUSE_URL", "dst.example.com:8123"),
        ]);
        let config = DbConfig::resolve(|name| env.get(name).cloned());

        assert_eq!(config.source.url, "src.example.com:8443");
        assert_eq!(config.source.endpoint(), "https://src.example.com:8443");
        assert_eq!(config.target.url, "dst.example.com:8123");
    }

    #[test]
    fn legacy_vars_fill_both_roles_when_primary_unset() {
        let env = env_of(&[
            ("XATU_CLICKHOUSE_URL", "legacy.example.com"),
            ("XATU_CLICKHOUSE_USERNAME", "xatu"),
        ]);
        let config = DbConfig::resolve(|name| env.get(name).cloned());

        assert_eq!(config.source.url, "legacy.example.com");
        assert_eq!(config.target.url, "legacy.example.com");
        assert_eq!(config.source.username, "xatu");
        assert_eq!(config.target.username, "xatu");
        assert!(uses_legacy_vars(&|name: &str| env.get(name).cloned()));
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = DbConfig::resolve(|_| None);

        assert_eq!(config.source.username, "default");
        assert_eq!(config.source.password, "");
        assert_eq!(config.source.url, "localhost:8123");
        assert_eq!(config.source.protocol, "http");
        assert_eq!(config.source, config.target);
    }
}
