use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
    #[serde(default = "default_upload_limit_bytes")]
    pub upload_limit_bytes: usize,
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            body_limit_bytes: default_body_limit_bytes(),
            upload_limit_bytes: default_upload_limit_bytes(),
            manifest_dir: default_manifest_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_base_url")]
    pub base_url: String,
    #[serde(default = "default_backend_timeout_seconds")]
    pub timeout_seconds: u64,
    // Last-resort token when the request carries none.
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_base_url(),
            timeout_seconds: default_backend_timeout_seconds(),
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub default_model: String,
    #[serde(default = "default_generation_ratio")]
    pub default_ratio: String,
    #[serde(default = "default_generation_upload_ratio")]
    pub upload_default_ratio: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_model: default_generation_model(),
            default_ratio: default_generation_ratio(),
            upload_default_ratio: default_generation_upload_ratio(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:3400".to_string()
}

fn default_body_limit_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_upload_limit_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_manifest_dir() -> String {
    ".".to_string()
}

fn default_backend_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_backend_timeout_seconds() -> u64 {
    300
}

fn default_generation_model() -> String {
    "jimeng-3.1".to_string()
}

fn default_generation_ratio() -> String {
    "16:9".to_string()
}

fn default_generation_upload_ratio() -> String {
    "1:1".to_string()
}

impl AppConfig {
    /// Reads `path` (optional) then `JIMENG__*` environment overrides. `PORT`
    /// replaces the port of `server.listen`.
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        let port_override = std::env::var("PORT")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|port| format!("0.0.0.0:{port}"));
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("JIMENG").separator("__"))
            .set_override_option("server.listen", port_override)?
            .build()?;
        cfg.try_deserialize()
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()?;
        cfg.try_deserialize()
    }
}

impl BackendConfig {
    pub fn effective_timeout_seconds(&self) -> u64 {
        self.timeout_seconds.max(5)
    }
}
