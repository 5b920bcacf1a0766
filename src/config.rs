use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub limits: LimitsConfig,
    pub audio: AudioConfig,
    pub engine: EngineConfig,
    pub translation: TranslationConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub ws: WsConfig,
}

#[derive(Debug, Deserialize)]
pub struct WsConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct LimitsConfig {
    pub max_sessions: usize,
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub workers: usize,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub min_quality: f32,
}

#[derive(Debug, Deserialize)]
pub struct EngineConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct TranslationConfig {
    pub cache_capacity: usize,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
