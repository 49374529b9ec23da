use url::Url;

/// API base used by the dedicated local configuration.
pub const LOCAL_API_BASE: &str = "http://localhost:5000";
/// Value of the mode query parameter or persisted setting that selects [`EnvironmentKind::Local`].
pub const LOCAL_MODE: &str = "local";

/// Raw runtime signals the environment is resolved from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentSignals {
    /// Origin the front end is served from; its host decides development vs production.
    pub origin: String,
    /// Explicit `mode` parameter.
    pub mode_param: Option<String>,
    /// Build-time mode variable.
    pub mode_env: Option<String>,
    pub persisted_local_mode: bool,
    /// Build-time API base override.
    pub api_url_override: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentKind {
    Local,
    Development,
    Production,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentConfig {
    pub kind: EnvironmentKind,
    pub api_base_url: String,
    pub use_mock_data: bool,
}

/// Picks the API base and mock flag. Pure; unresolvable input means production.
pub fn resolve_environment(signals: &EnvironmentSignals) -> EnvironmentConfig {
    let origin = signals.origin.trim().trim_end_matches('/').to_string();
    let api_override = signals
        .api_url_override
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(|url| url.trim_end_matches('/').to_string());

    let local_flag = signals.persisted_local_mode
        || is_local_mode(signals.mode_param.as_deref())
        || is_local_mode(signals.mode_env.as_deref());

    if local_flag {
        return EnvironmentConfig {
            kind: EnvironmentKind::Local,
            api_base_url: api_override.unwrap_or_else(|| LOCAL_API_BASE.to_string()),
            use_mock_data: false,
        };
    }

    if is_loopback_host(&origin) {
        return EnvironmentConfig {
            kind: EnvironmentKind::Development,
            api_base_url: origin,
            use_mock_data: true,
        };
    }

    EnvironmentConfig {
        kind: EnvironmentKind::Production,
        api_base_url: api_override.unwrap_or(origin),
        use_mock_data: false,
    }
}

fn is_local_mode(value: Option<&str>) -> bool {
    value.is_some_and(|mode| mode.trim().eq_ignore_ascii_case(LOCAL_MODE))
}

fn is_loopback_host(origin: &str) -> bool {
    Url::parse(origin)
        .ok()
        .and_then(|url| url.host_str().map(str::to_owned))
        .is_some_and(|host| host == "localhost" || host == "127.0.0.1")
}
