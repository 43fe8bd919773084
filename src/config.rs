use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: Option<String>,
    pub execution_api_url: String,
    pub execution_api_key: Option<String>,
    pub execution_api_host: Option<String>,
    pub execution_timeout_ms: u64,
    pub max_violations: u32,
    pub violation_grace_ms: u64,
    pub violation_coalesce_ms: u64,
    pub question_cache_ttl_secs: u64,
    pub store_batch_limit: usize,
    pub deadline_sweep_secs: u64,
    pub session_idle_secs: u64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let execution_api_url = get_env("EXECUTION_API_URL")?;
        Url::parse(&execution_api_url).map_err(|e| {
            Error::Config(format!("Invalid value for EXECUTION_API_URL: {}", e))
        })?;

        let store_batch_limit: usize = get_env_parse_or("STORE_BATCH_LIMIT", 30)?;
        if store_batch_limit == 0 {
            return Err(Error::Config(
                "STORE_BATCH_LIMIT must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: env::var("DATABASE_URL").ok(),
            execution_api_url,
            execution_api_key: env::var("EXECUTION_API_KEY").ok(),
            execution_api_host: env::var("EXECUTION_API_HOST").ok(),
            execution_timeout_ms: get_env_parse_or("EXECUTION_TIMEOUT_MS", 10_000)?,
            max_violations: get_env_parse_or("MAX_VIOLATIONS", 3)?,
            violation_grace_ms: get_env_parse_or("VIOLATION_GRACE_MS", 2_000)?,
            violation_coalesce_ms: get_env_parse_or("VIOLATION_COALESCE_MS", 0)?,
            question_cache_ttl_secs: get_env_parse_or("QUESTION_CACHE_TTL_SECS", 300)?,
            store_batch_limit,
            deadline_sweep_secs: get_env_parse_or("DEADLINE_SWEEP_SECS", 30)?,
            session_idle_secs: get_env_parse_or("SESSION_IDLE_SECS", 1_800)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
