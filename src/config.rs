//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// The news feed this reader was built around.
pub const DEFAULT_FEED_URL: &str = "https://wiadomosci.gazeta.pl/pub/rss/wiadomosci_kraj.xml";

/// Terminal news reader with synced read and favorite marks.
#[derive(Parser, Debug, Clone)]
#[command(name = "feedmark")]
#[command(version)]
pub struct Config {
    /// RSS feed URL
    #[arg(default_value = DEFAULT_FEED_URL, env = "FEEDMARK_URL")]
    pub url: String,

    /// Seconds between automatic refetches
    #[arg(long, default_value_t = 60, env = "FEEDMARK_REFRESH_SECS")]
    pub refresh_secs: u64,

    /// HTTP timeout for a single fetch, in seconds
    #[arg(long, default_value_t = 15, env = "FEEDMARK_TIMEOUT_SECS")]
    pub timeout_secs: u64,

    /// How long membership watches outlive the last observer, in milliseconds
    #[arg(long, default_value_t = 5000, env = "FEEDMARK_GRACE_MS")]
    pub grace_ms: u64,

    /// Account email
    #[arg(long, env = "FEEDMARK_EMAIL")]
    pub email: Option<String>,

    /// Account password
    #[arg(long, env = "FEEDMARK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Create the account instead of signing in
    #[arg(long, requires = "email")]
    pub sign_up: bool,

    /// Where to write the log (the terminal belongs to the UI)
    #[arg(long, default_value = "feedmark.log", env = "FEEDMARK_LOG_FILE")]
    pub log_file: PathBuf,
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    /// Email and password, when both were given.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.email.as_deref()?, self.password.as_deref()?))
    }
}
