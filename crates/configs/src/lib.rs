use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_REDIS_PORT: u16 = 6379;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), worker_threads: None }
    }
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { DEFAULT_PORT }
fn default_redis_port() -> u16 { DEFAULT_REDIS_PORT }

/// Redis connection settings.
///
/// `url` wins over the individual parts when both are given. `host` is left
/// empty when nothing configures it so startup can probe for a container
/// named `redis` before falling back to loopback.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self { url: None, host: None, port: DEFAULT_REDIS_PORT, password: None, db: 0 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `config.toml` when present, otherwise start from defaults; then
    /// apply environment overrides and validate.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) if is_missing_file(&e) => AppConfig::default(),
            Err(e) => return Err(e),
        };
        cfg.apply_env()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Environment overrides in the order the deployment targets use them.
    /// A `VCAP_SERVICES` that is set but unusable is an error rather than a
    /// silent fall back to a local Redis.
    pub fn apply_env(&mut self) -> Result<()> {
        self.server.apply_env();
        self.redis.apply_env()?;
        if let Ok(backend) = std::env::var("STORAGE_BACKEND") {
            match backend.trim().to_ascii_lowercase().as_str() {
                "memory" => self.storage.backend = StorageBackend::Memory,
                "redis" => self.storage.backend = StorageBackend::Redis,
                _ => {}
            }
        }
        Ok(())
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.redis.validate()?;
        Ok(())
    }
}

fn is_missing_file(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>()
        .map(|io| io.kind() == std::io::ErrorKind::NotFound)
        .unwrap_or(false)
}

impl ServerConfig {
    fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.host = host;
        }
        // PaaS 平台通过 PORT 注入监听端口
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.port = port;
        }
        if self.worker_threads.is_none() {
            self.worker_threads = std::env::var("TOKIO_WORKER_THREADS")
                .ok()
                .and_then(|v| v.parse::<usize>().ok());
        }
    }

    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        if self.worker_threads == Some(0) {
            self.worker_threads = None;
        }
        Ok(())
    }
}

/// Redis credentials as published by a Cloud Foundry `rediscloud` binding.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VcapRedisCredentials {
    pub hostname: String,
    #[serde(deserialize_with = "port_from_str_or_int")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
}

fn port_from_str_or_int<'de, D>(d: D) -> std::result::Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Int(u16),
        Str(String),
    }
    match Port::deserialize(d)? {
        Port::Int(p) => Ok(p),
        Port::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Extract `rediscloud[0].credentials` from a `VCAP_SERVICES` document.
pub fn parse_vcap_services(raw: &str) -> Result<VcapRedisCredentials> {
    let services: serde_json::Value = serde_json::from_str(raw)?;
    let creds = services
        .get("rediscloud")
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("credentials"))
        .ok_or_else(|| anyhow!("VCAP_SERVICES has no rediscloud credentials"))?;
    Ok(serde_json::from_value(creds.clone())?)
}

impl RedisConfig {
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var("VCAP_SERVICES") {
            return self.apply_vcap_document(&raw);
        }
        if self.url.is_none() {
            self.url = std::env::var("REDIS_URL").ok().filter(|u| !u.trim().is_empty());
        }
        if self.host.is_none() {
            self.host = std::env::var("REDIS_HOST").ok().filter(|h| !h.trim().is_empty());
        }
        if let Some(port) = std::env::var("REDIS_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.port = port;
        }
        if self.password.is_none() {
            self.password = std::env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty());
        }
        Ok(())
    }

    /// Apply a raw `VCAP_SERVICES` document.
    pub fn apply_vcap_document(&mut self, raw: &str) -> Result<()> {
        let creds = parse_vcap_services(raw)
            .map_err(|e| anyhow!("VCAP_SERVICES is set but unusable: {e}"))?;
        self.apply_vcap(creds);
        Ok(())
    }

    /// Bound service credentials replace anything configured locally.
    pub fn apply_vcap(&mut self, creds: VcapRedisCredentials) {
        self.url = None;
        self.host = Some(creds.hostname);
        self.port = creds.port;
        self.password = creds.password.filter(|p| !p.is_empty());
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.url {
            let lower = url.to_lowercase();
            if !(lower.starts_with("redis://") || lower.starts_with("rediss://")) {
                return Err(anyhow!("redis.url must start with redis:// or rediss://"));
            }
        }
        if self.port == 0 {
            return Err(anyhow!("redis.port must be in 1..=65535"));
        }
        if self.db < 0 {
            return Err(anyhow!("redis.db must be >= 0"));
        }
        Ok(())
    }

    /// Connection URL, using `fallback_host` when no host is configured.
    pub fn connection_url(&self, fallback_host: &str) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let host = self.host.as_deref().unwrap_or(fallback_host);
        let auth = match &self.password {
            Some(p) => format!(":{}@", urlencoding::encode(p)),
            None => String::new(),
        };
        format!("redis://{}{}:{}/{}", auth, host, self.port, self.db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_toml() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080
            worker_threads = 2

            [redis]
            host = "cache.internal"
            port = 6380
            password = "s3cret"

            [storage]
            backend = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.worker_threads, Some(2));
        assert_eq!(cfg.redis.host.as_deref(), Some("cache.internal"));
        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert_eq!(cfg.redis.connection_url("127.0.0.1"), "redis://:s3cret@cache.internal:6380/0");
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, DEFAULT_PORT);
        assert_eq!(cfg.redis.port, DEFAULT_REDIS_PORT);
        assert_eq!(cfg.storage.backend, StorageBackend::Redis);
        assert_eq!(cfg.redis.connection_url("redis"), "redis://redis:6379/0");
    }

    #[test]
    fn explicit_url_wins() {
        let cfg = RedisConfig { url: Some("redis://example:7000/2".into()), host: Some("ignored".into()), ..Default::default() };
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.connection_url("127.0.0.1"), "redis://example:7000/2");
    }

    #[test]
    fn rejects_non_redis_url() {
        let cfg = RedisConfig { url: Some("http://example".into()), ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn password_is_percent_encoded() {
        let cfg = RedisConfig { host: Some("h".into()), password: Some("p@ss:w/rd".into()), ..Default::default() };
        assert_eq!(cfg.connection_url("x"), "redis://:p%40ss%3Aw%2Frd@h:6379/0");
    }

    #[test]
    fn vcap_credentials_accept_string_port() {
        let raw = r#"{"rediscloud":[{"credentials":{"hostname":"pub-redis.example.com","port":"15432","password":"pw"}}]}"#;
        let creds = parse_vcap_services(raw).unwrap();
        assert_eq!(creds.port, 15432);

        let mut cfg = RedisConfig { url: Some("redis://local:6379".into()), ..Default::default() };
        cfg.apply_vcap(creds);
        assert_eq!(cfg.connection_url("127.0.0.1"), "redis://:pw@pub-redis.example.com:15432/0");
    }

    #[test]
    fn vcap_without_rediscloud_is_error() {
        assert!(parse_vcap_services(r#"{"postgres":[]}"#).is_err());
    }

    #[test]
    fn unusable_vcap_document_is_an_error_not_a_fallback() {
        for raw in ["{not json", r#"{"postgres":[]}"#, r#"{"rediscloud":[{"credentials":{"port":1}}]}"#] {
            let mut cfg = RedisConfig::default();
            let err = cfg.apply_vcap_document(raw).unwrap_err();
            assert!(err.to_string().contains("VCAP_SERVICES"), "{err}");
            // nothing was applied
            assert_eq!(cfg.host, None);
        }

        let mut cfg = RedisConfig::default();
        cfg.apply_vcap_document(r#"{"rediscloud":[{"credentials":{"hostname":"h","port":7000}}]}"#)
            .unwrap();
        assert_eq!(cfg.connection_url("127.0.0.1"), "redis://h:7000/0");
    }
}
