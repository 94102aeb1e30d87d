//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The signing secret and upstream API key are loaded from the JWT_SECRET
//! and SONAUTO_API_KEY env vars (or `*_file` paths), never stored in the
//! TOML directly. Startup fails when either secret cannot be resolved;
//! there is no fallback default.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// Listener and outbound transport settings
#[derive(Debug, Deserialize)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Challenge verification settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Signing secret, resolved from JWT_SECRET env var or jwt_secret_file
    #[serde(skip)]
    pub jwt_secret: Option<Secret>,
    /// Path to a file containing the signing secret (alternative to JWT_SECRET)
    pub jwt_secret_file: Option<PathBuf>,
    /// Websim site hosting the verification flow and challenge store
    pub websim_auth_url: String,
    /// Records fetched from the store per resolution attempt
    pub lookback_limit: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_secret_file: None,
            websim_auth_url: websim_auth::WEBSIM_AUTH_URL.to_string(),
            lookback_limit: websim_auth::DEFAULT_LOOKBACK_LIMIT,
        }
    }
}

/// Sonauto API settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// API key, resolved from SONAUTO_API_KEY env var or api_key_file
    #[serde(skip)]
    pub api_key: Option<Secret>,
    /// Path to a file containing the API key (alternative to SONAUTO_API_KEY)
    pub api_key_file: Option<PathBuf>,
    pub base_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_file: None,
            base_url: "https://api.sonauto.ai".to_string(),
        }
    }
}

fn default_timeout() -> u64 {
    60
}

fn default_max_connections() -> usize {
    1000
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Secret resolution order (each secret):
    /// 1. env var (JWT_SECRET / SONAUTO_API_KEY)
    /// 2. `*_file` path from config
    /// Missing both is a startup error, not a degraded mode.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        validate_http_url("upstream.base_url", &config.upstream.base_url)?;
        validate_http_url("auth.websim_auth_url", &config.auth.websim_auth_url)?;

        if config.gateway.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.gateway.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if config.auth.lookback_limit == 0 {
            return Err(common::Error::Config(
                "lookback_limit must be greater than 0".into(),
            ));
        }

        config.auth.jwt_secret = Some(resolve_secret(
            "JWT_SECRET",
            config.auth.jwt_secret_file.as_deref(),
        )?);
        config.upstream.api_key = Some(resolve_secret(
            "SONAUTO_API_KEY",
            config.upstream.api_key_file.as_deref(),
        )?);

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("sonauto-gateway.toml")
    }
}

fn validate_http_url(field: &str, value: &str) -> common::Result<()> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {value}"
        )));
    }
    Ok(())
}

fn resolve_secret(env_var: &str, file: Option<&Path>) -> common::Result<Secret> {
    if let Ok(value) = std::env::var(env_var) {
        if !value.is_empty() {
            return Ok(Secret::new(value));
        }
    }

    if let Some(file) = file {
        let value = std::fs::read_to_string(file).map_err(|e| {
            common::Error::Config(format!("failed to read {}: {e}", file.display()))
        })?;
        let value = value.trim();
        if !value.is_empty() {
            return Ok(Secret::new(value));
        }
        return Err(common::Error::Config(format!(
            "{} is empty",
            file.display()
        )));
    }

    Err(common::Error::Config(format!(
        "{env_var} is not set and no secret file is configured"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    unsafe fn set_test_secrets() {
        unsafe {
            set_env("JWT_SECRET", "test-jwt-secret");
            set_env("SONAUTO_API_KEY", "test-api-key");
        }
    }

    fn valid_toml() -> &'static str {
        r#"
[gateway]
listen_addr = "127.0.0.1:8080"
"#
    }

    fn write_config(dir_name: &str, contents: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(dir_name);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn load_valid_config_applies_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let (dir, path) = write_config("sonauto-gateway-test-valid", valid_toml());
        unsafe { set_test_secrets() };

        let config = Config::load(&path).unwrap();
        assert_eq!(config.gateway.listen_addr.port(), 8080);
        assert_eq!(config.gateway.timeout_secs, 60);
        assert_eq!(config.gateway.max_connections, 1000);
        assert_eq!(config.upstream.base_url, "https://api.sonauto.ai");
        assert_eq!(
            config.auth.websim_auth_url,
            "https://sonauto-api.on.websim.com"
        );
        assert_eq!(config.auth.lookback_limit, 20);
        assert_eq!(
            config.auth.jwt_secret.as_ref().unwrap().expose(),
            "test-jwt-secret"
        );
        assert_eq!(
            config.upstream.api_key.as_ref().unwrap().expose(),
            "test-api-key"
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn load_missing_file_fails() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_invalid_toml_fails() {
        let (dir, path) = write_config("sonauto-gateway-test-badtoml", "not valid {{{{ toml");
        let result = Config::load(&path);
        assert!(result.is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_jwt_secret_fails_startup() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let (dir, path) = write_config("sonauto-gateway-test-nojwt", valid_toml());
        unsafe {
            remove_env("JWT_SECRET");
            set_env("SONAUTO_API_KEY", "test-api-key");
        }

        let result = Config::load(&path);
        assert!(result.is_err(), "absent JWT_SECRET must fail startup");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("JWT_SECRET"), "got: {err}");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_api_key_fails_startup() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let (dir, path) = write_config("sonauto-gateway-test-nokey", valid_toml());
        unsafe {
            set_env("JWT_SECRET", "test-jwt-secret");
            remove_env("SONAUTO_API_KEY");
        }

        let result = Config::load(&path);
        assert!(result.is_err(), "absent SONAUTO_API_KEY must fail startup");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("SONAUTO_API_KEY"), "got: {err}");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn secret_from_file_resolves() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = std::env::temp_dir().join("sonauto-gateway-test-keyfile");
        std::fs::create_dir_all(&dir).unwrap();
        let jwt_path = dir.join("jwt_secret");
        std::fs::write(&jwt_path, "file-jwt-secret\n").unwrap();

        let toml_content = format!(
            r#"
[gateway]
listen_addr = "127.0.0.1:8080"

[auth]
jwt_secret_file = "{}"
"#,
            jwt_path.display()
        );
        let config_path = dir.join("config.toml");
        std::fs::write(&config_path, &toml_content).unwrap();

        unsafe {
            remove_env("JWT_SECRET");
            set_env("SONAUTO_API_KEY", "test-api-key");
        }
        let config = Config::load(&config_path).unwrap();
        assert_eq!(
            config.auth.jwt_secret.as_ref().unwrap().expose(),
            "file-jwt-secret"
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn env_overrides_secret_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = std::env::temp_dir().join("sonauto-gateway-test-override");
        std::fs::create_dir_all(&dir).unwrap();
        let jwt_path = dir.join("jwt_secret");
        std::fs::write(&jwt_path, "file-value").unwrap();

        let toml_content = format!(
            r#"
[gateway]
listen_addr = "127.0.0.1:8080"

[auth]
jwt_secret_file = "{}"
"#,
            jwt_path.display()
        );
        let config_path = dir.join("config.toml");
        std::fs::write(&config_path, &toml_content).unwrap();

        unsafe {
            set_env("JWT_SECRET", "env-value");
            set_env("SONAUTO_API_KEY", "test-api-key");
        }
        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.auth.jwt_secret.as_ref().unwrap().expose(), "env-value");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn whitespace_only_secret_file_fails() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = std::env::temp_dir().join("sonauto-gateway-test-emptyfile");
        std::fs::create_dir_all(&dir).unwrap();
        let jwt_path = dir.join("jwt_secret");
        std::fs::write(&jwt_path, "  \n  ").unwrap();

        let toml_content = format!(
            r#"
[gateway]
listen_addr = "127.0.0.1:8080"

[auth]
jwt_secret_file = "{}"
"#,
            jwt_path.display()
        );
        let config_path = dir.join("config.toml");
        std::fs::write(&config_path, &toml_content).unwrap();

        unsafe {
            remove_env("JWT_SECRET");
            set_env("SONAUTO_API_KEY", "test-api-key");
        }
        let result = Config::load(&config_path);
        assert!(
            result.is_err(),
            "whitespace-only secret file must fail startup, not degrade"
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn invalid_upstream_url_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let toml_content = r#"
[gateway]
listen_addr = "127.0.0.1:8080"

[upstream]
base_url = "api.sonauto.ai"
"#;
        let (dir, path) = write_config("sonauto-gateway-test-badurl", toml_content);
        unsafe { set_test_secrets() };

        let result = Config::load(&path);
        assert!(result.is_err(), "base_url without scheme must be rejected");
        let err = format!("{}", result.unwrap_err());
        assert!(
            err.contains("must start with http"),
            "error message should explain the issue, got: {err}"
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn zero_timeout_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let toml_content = r#"
[gateway]
listen_addr = "127.0.0.1:8080"
timeout_secs = 0
"#;
        let (dir, path) = write_config("sonauto-gateway-test-zerotimeout", toml_content);
        unsafe { set_test_secrets() };

        assert!(Config::load(&path).is_err(), "timeout_secs = 0 must be rejected");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn zero_max_connections_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let toml_content = r#"
[gateway]
listen_addr = "127.0.0.1:8080"
max_connections = 0
"#;
        let (dir, path) = write_config("sonauto-gateway-test-zeromaxconn", toml_content);
        unsafe { set_test_secrets() };

        assert!(Config::load(&path).is_err(), "max_connections = 0 must be rejected");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn zero_lookback_limit_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let toml_content = r#"
[gateway]
listen_addr = "127.0.0.1:8080"

[auth]
lookback_limit = 0
"#;
        let (dir, path) = write_config("sonauto-gateway-test-zerolookback", toml_content);
        unsafe { set_test_secrets() };

        assert!(Config::load(&path).is_err(), "lookback_limit = 0 must be rejected");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn custom_lookback_limit_applies() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let toml_content = r#"
[gateway]
listen_addr = "127.0.0.1:8080"

[auth]
lookback_limit = 50
"#;
        let (dir, path) = write_config("sonauto-gateway-test-lookback", toml_content);
        unsafe { set_test_secrets() };

        let config = Config::load(&path).unwrap();
        assert_eq!(config.auth.lookback_limit, 50);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("sonauto-gateway.toml"));
    }

    #[test]
    fn resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(
            path,
            PathBuf::from("/cli/wins.toml"),
            "CLI arg must take precedence over CONFIG_PATH env var"
        );
        unsafe { remove_env("CONFIG_PATH") };
    }
}
