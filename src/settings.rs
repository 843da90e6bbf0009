use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

const DEFAULT_PAGE_URL: &str = "https://core.telegram.org/bots/api";
const DEFAULT_DB_PATH: &str = "data/botapi.sqlite";
const DEFAULT_OUTPUT_DIR: &str = "out";
const DEFAULT_DEFINITION_LEVEL: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub page_url: String,
    pub db_path: String,
    pub output_dir: String,
    #[serde(default)]
    pub spider_api_key: Option<String>,
    pub definition_level: u8,
}

impl Settings {
    /// Defaults, then `botapi.toml` if present, then `BOTAPI_*` variables.
    pub fn load() -> Result<Self> {
        Self::from_builder(Config::builder().add_source(File::with_name("botapi").required(false)))
    }

    fn from_builder(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let mut settings: Settings = builder
            .set_default("page_url", DEFAULT_PAGE_URL)?
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("output_dir", DEFAULT_OUTPUT_DIR)?
            .set_default("definition_level", DEFAULT_DEFINITION_LEVEL as i64)?
            .add_source(Environment::with_prefix("BOTAPI"))
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;

        if settings.spider_api_key.is_none() {
            settings.spider_api_key = std::env::var("SPIDER_API_KEY")
                .ok()
                .filter(|k| !k.is_empty());
        }
        Ok(settings)
    }
}
