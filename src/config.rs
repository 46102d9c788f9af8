use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use url::Url;

/// Raw (unprefixed) environment variables understood for compatibility with
/// the hosting platform. Every field can also be set as `STUDIO_<FIELD>`.
const RAW_ENV_KEYS: &[&str] = &[
    "port",
    "vercel",
    "vercel_env",
    "node_env",
    "kv_rest_api_url",
    "kv_rest_api_token",
    "blob_read_write_token",
    "session_secret",
];

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub loglevel: String,

    pub data_dir: PathBuf,
    pub uploads_dir: PathBuf,

    /// Set to "1" by the managed hosting platform.
    #[serde(deserialize_with = "lenient_string")]
    pub vercel: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub vercel_env: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub node_env: Option<String>,

    pub kv_rest_api_url: Option<Url>,
    #[serde(deserialize_with = "lenient_string")]
    pub kv_rest_api_token: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub blob_read_write_token: Option<String>,
    pub blob_api_url: Url,

    /// Overrides whether the local filesystem may be used for persistence.
    pub filesystem_fallback: Option<bool>,
    /// Overrides whether session cookies are marked `Secure; SameSite=None`.
    pub secure_cookie: Option<bool>,
    #[serde(deserialize_with = "lenient_string")]
    pub session_secret: Option<String>,

    pub max_upload_bytes: usize,
    pub login_attempts_per_minute: u32,
    pub password_cost: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            loglevel: "info".to_string(),
            data_dir: PathBuf::from("data"),
            uploads_dir: PathBuf::from("public").join("uploads"),
            vercel: None,
            vercel_env: None,
            node_env: None,
            kv_rest_api_url: None,
            kv_rest_api_token: None,
            blob_read_write_token: None,
            blob_api_url: Url::parse("https://blob.vercel-storage.com")
                .expect("static blob api url is valid"),
            filesystem_fallback: None,
            secure_cookie: None,
            session_secret: None,
            max_upload_bytes: 10 * 1024 * 1024,
            login_attempts_per_minute: 10,
            password_cost: crate::service::password::BCRYPT_COST,
        }
    }
}

impl Config {
    /// Defaults, then raw platform variables, then `STUDIO_` prefixed overrides.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::raw().only(RAW_ENV_KEYS))
            .merge(Env::prefixed("STUDIO_"))
            .extract()
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Running inside the managed cloud environment.
    pub fn cloud_managed(&self) -> bool {
        self.vercel.as_deref() == Some("1") || self.vercel_env.is_some()
    }

    pub fn filesystem_enabled(&self) -> bool {
        self.filesystem_fallback.unwrap_or(!self.cloud_managed())
    }

    pub fn secure_cookies(&self) -> bool {
        self.secure_cookie.unwrap_or_else(|| {
            self.cloud_managed() || self.node_env.as_deref() == Some("production")
        })
    }
}

/// Env values that look numeric (`VERCEL=1`) arrive as numbers; keep them as text.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
        Raw::Bool(b) => b.to_string(),
    }))
}

pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::load().unwrap_or_else(|e| panic!("FATAL: invalid configuration: {e}"))
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_local_filesystem() {
        let cfg = Config::default();
        assert!(!cfg.cloud_managed());
        assert!(cfg.filesystem_enabled());
        assert!(!cfg.secure_cookies());
        assert_eq!(cfg.listen_addr(), "0.0.0.0:3001");
    }

    #[test]
    fn platform_flag_switches_to_cloud() {
        let cfg = Config {
            vercel: Some("1".to_string()),
            ..Config::default()
        };
        assert!(cfg.cloud_managed());
        assert!(!cfg.filesystem_enabled());
        assert!(cfg.secure_cookies());

        let cfg = Config {
            vercel_env: Some("preview".to_string()),
            filesystem_fallback: Some(true),
            ..Config::default()
        };
        assert!(cfg.cloud_managed());
        assert!(cfg.filesystem_enabled());
    }

    #[test]
    fn numeric_env_values_are_kept_as_text() {
        let cfg: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Serialized::default("vercel", 1))
            .merge(Serialized::default("port", 8080))
            .extract()
            .expect("config extracts");
        assert_eq!(cfg.vercel.as_deref(), Some("1"));
        assert_eq!(cfg.port, 8080);
        assert!(cfg.cloud_managed());
    }

    #[test]
    fn production_node_env_enables_secure_cookies() {
        let cfg = Config {
            node_env: Some("production".to_string()),
            ..Config::default()
        };
        assert!(cfg.secure_cookies());
        assert!(!cfg.cloud_managed());
    }
}
