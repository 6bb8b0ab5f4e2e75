use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::browser::ChromeSettings;
use crate::capture::CaptureSettings;
use crate::channel::ScrapeSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Web Server
    pub web_host: String,
    pub web_port: u16,
    pub static_dir: PathBuf,

    // Storage
    pub upload_dir: PathBuf,

    // Browser
    pub chrome_path: Option<String>,
    pub headless: bool,

    // Scraping
    pub nav_timeout: Duration,
    pub nav_retries: u32,
    pub nav_retry_delay: Duration,
    pub scroll_delay: Duration,
    pub max_scrolls: u32,

    // Screenshots
    pub post_settle: Duration,
    pub screenshot_padding: u32,

    // Requests
    pub max_range_days: i64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let default_port = parse_env_u16("PORT", 3012)?;

        Ok(Self {
            // Web Server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", default_port)?,
            static_dir: PathBuf::from(env_or_default("STATIC_DIR", "./static")),

            // Storage
            upload_dir: PathBuf::from(env_or_default("UPLOAD_DIR", "./uploads")),

            // Browser
            chrome_path: optional_env("CHROME_PATH"),
            headless: parse_env_bool("HEADLESS", true)?,

            // Scraping
            nav_timeout: Duration::from_secs(parse_env_u64("NAV_TIMEOUT_SECS", 120)?),
            nav_retries: parse_env_u32("NAV_RETRIES", 3)?,
            nav_retry_delay: Duration::from_secs(parse_env_u64("NAV_RETRY_DELAY_SECS", 5)?),
            scroll_delay: Duration::from_millis(parse_env_u64("SCROLL_DELAY_MS", 4000)?),
            max_scrolls: parse_env_u32("MAX_SCROLLS", 200)?,

            // Screenshots
            post_settle: Duration::from_secs(parse_env_u64("POST_SETTLE_SECS", 5)?),
            screenshot_padding: parse_env_u32("SCREENSHOT_PADDING", 20)?,

            // Requests
            max_range_days: i64::from(parse_env_u32("MAX_RANGE_DAYS", 366)?),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nav_retries == 0 {
            return Err(ConfigError::InvalidValue {
                name: "NAV_RETRIES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_scrolls == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_SCROLLS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_range_days <= 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_RANGE_DAYS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.nav_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "NAV_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.web_host.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "WEB_HOST".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Configuration suitable for tests: everything under `root`, no delays.
    #[must_use]
    pub fn for_testing(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
            static_dir: root.join("static"),
            upload_dir: root.join("uploads"),
            chrome_path: None,
            headless: true,
            nav_timeout: Duration::from_secs(1),
            nav_retries: 1,
            nav_retry_delay: Duration::ZERO,
            scroll_delay: Duration::ZERO,
            max_scrolls: 5,
            post_settle: Duration::ZERO,
            screenshot_padding: 20,
            max_range_days: 366,
        }
    }

    #[must_use]
    pub fn chrome_settings(&self) -> ChromeSettings {
        ChromeSettings {
            chrome_path: self.chrome_path.clone(),
            headless: self.headless,
            request_timeout: self.nav_timeout,
            ..ChromeSettings::default()
        }
    }

    #[must_use]
    pub fn scrape_settings(&self) -> ScrapeSettings {
        ScrapeSettings {
            nav_timeout: self.nav_timeout,
            nav_retries: self.nav_retries,
            nav_retry_delay: self.nav_retry_delay,
            scroll_delay: self.scroll_delay,
            max_scrolls: self.max_scrolls,
            ..ScrapeSettings::default()
        }
    }

    #[must_use]
    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            settle_delay: self.post_settle,
            padding: f64::from(self.screenshot_padding),
            ..CaptureSettings::default()
        }
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}
