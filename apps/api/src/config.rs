use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use crate::layout::font_metrics::{default_page_config, PaperSize};
use crate::layout::page_fit::LayoutConfig;

/// Application configuration loaded from environment variables.
/// Every variable is optional; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub max_page_budget: u32,
    pub default_font_size: f32,
    pub min_font_size: f32,
    pub font_reduce_multiplier: f32,
    pub paper: PaperSize,
    pub page_margin_pt: f32,
    pub topic_gutter_pt: f32,
    /// Request body limit; image topics arrive base64-encoded inline.
    pub max_body_bytes: usize,
    pub generation_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let layout = LayoutConfig::default();
        Config {
            port: 8080,
            rust_log: "info".to_string(),
            max_page_budget: layout.max_page_budget,
            default_font_size: layout.default_font_size,
            min_font_size: layout.min_font_size,
            font_reduce_multiplier: layout.reduce_multiplier,
            paper: PaperSize::A4,
            page_margin_pt: layout.page.margin_pt,
            topic_gutter_pt: layout.page.gutter_pt,
            max_body_bytes: 20 * 1024 * 1024,
            generation_timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();
        let config = Config {
            port: env_or("PORT", defaults.port)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or(defaults.rust_log),
            max_page_budget: env_or("MAX_PAGE_BUDGET", defaults.max_page_budget)?,
            default_font_size: env_or("DEFAULT_FONT_SIZE", defaults.default_font_size)?,
            min_font_size: env_or("MIN_FONT_SIZE", defaults.min_font_size)?,
            font_reduce_multiplier: env_or("FONT_REDUCE_MULTIPLIER", defaults.font_reduce_multiplier)?,
            paper: env_or("PAGE_SIZE", defaults.paper)?,
            page_margin_pt: env_or("PAGE_MARGIN_PT", defaults.page_margin_pt)?,
            topic_gutter_pt: env_or("TOPIC_GUTTER_PT", defaults.topic_gutter_pt)?,
            max_body_bytes: env_or("MAX_BODY_BYTES", defaults.max_body_bytes)?,
            generation_timeout_secs: env_or("GENERATION_TIMEOUT_SECS", defaults.generation_timeout_secs)?,
        };

        config
            .layout_config()
            .validate()
            .context("Layout settings from the environment are inconsistent")?;
        Ok(config)
    }

    /// Server-wide layout defaults; requests may override the font knobs.
    pub fn layout_config(&self) -> LayoutConfig {
        let mut page = default_page_config(self.paper);
        page.margin_pt = self.page_margin_pt;
        page.gutter_pt = self.topic_gutter_pt;
        LayoutConfig {
            max_page_budget: self.max_page_budget,
            default_font_size: self.default_font_size,
            min_font_size: self.min_font_size,
            reduce_multiplier: self.font_reduce_multiplier,
            page,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| {
            anyhow!("Environment variable '{key}' has an invalid value '{raw}': {e}")
        }),
        Err(_) => Ok(default),
    }
}
