use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_HTTP_TIMEOUT_SEC: u64 = 30;
const APP_DIR: &str = "compliance-forms";

/// Process-wide settings, read from `FORMS_*` environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub user_id: Option<String>,
    pub cache_path: PathBuf,
    pub log_file: PathBuf,
    pub http_timeout: Duration,
    pub headless: bool,
    pub headless_ticks: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        let api_base_url = var("FORMS_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            bail!("FORMS_API_BASE_URL must be an http(s) URL, got '{api_base_url}'");
        }
        let http_timeout = match var("FORMS_HTTP_TIMEOUT_SEC") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("FORMS_HTTP_TIMEOUT_SEC is not a number: '{raw}'"))?;
                Duration::from_secs(secs.max(1))
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SEC),
        };
        let headless = var("FORMS_HEADLESS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
            .unwrap_or(false);
        let headless_ticks = var("FORMS_TICKS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(10);

        Ok(Self {
            api_base_url,
            api_token: var("FORMS_API_TOKEN"),
            user_id: var("FORMS_USER_ID"),
            cache_path: var("FORMS_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("catalog_cache.json")),
            log_file: var("FORMS_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("forms.log")),
            http_timeout,
            headless,
            headless_ticks,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "compliance-forms")]
#[command(about = "Fill in a declarative form against the records API")]
pub struct Args {
    /// Form schema (JSON or YAML)
    pub schema_path: PathBuf,
    /// Record to edit; omit to create a new one
    #[arg(value_parser = non_blank)]
    pub record_id: Option<String>,
}

fn non_blank(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err("record id must not be blank".into())
    } else {
        Ok(trimmed.to_string())
    }
}
