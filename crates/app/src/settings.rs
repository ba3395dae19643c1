//! Handles settings for the application. Configuration is read from
//! `settings.toml` (or the file given with `--config`) and then from
//! `LEDGER__*` environment variables.
//!
//! See `settings.toml` for the configuration.
use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use engine::{Locale, Money, ResultEngine};

const DEFAULT_CONFIG_PATH: &str = "settings";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
    /// Attachment bytes are kept in memory when unset.
    pub documents_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ledger {
    /// Largest accepted amount magnitude, as a decimal string.
    pub max_amount: String,
    pub locale: Locale,
}

impl Ledger {
    /// Parses `max_amount`. The configured bound may exceed
    /// [`Money::DEFAULT_LIMIT`].
    pub fn amount_limit(&self) -> ResultEngine<Money> {
        Money::parse_with_limit(&self.max_amount, Money::new(i64::MAX))
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            max_amount: "100000000000.00".to_string(),
            locale: Locale::PtBr,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub server: Server,
    #[serde(default)]
    pub ledger: Ledger,
}

#[derive(Debug, Parser)]
#[command(name = "ledger", about = "Personal ledger HTTP server")]
struct Args {
    /// Config file path (TOML), without or with extension.
    #[arg(long)]
    config: Option<String>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let args = Args::parse();
        Self::load(args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH))
    }

    fn load(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("LEDGER").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_settings_are_read_with_defaults() {
        let dir = std::env::temp_dir().join(format!("ledger-settings-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.toml");
        std::fs::write(
            &path,
            "[server]\nport = 3000\ndatabase = { sqlite = \"ledger.db\" }\n\n[ledger]\nlocale = \"en-US\"\n",
        )
        .unwrap();

        let settings = Settings::load(path.to_str().unwrap()).unwrap();
        assert_eq!(settings.app.level, "info");
        assert_eq!(settings.server.port, 3000);
        assert!(matches!(settings.server.database, Database::Sqlite(ref p) if p == "ledger.db"));
        assert_eq!(settings.ledger.locale, Locale::EnUs);
        assert_eq!(settings.ledger.max_amount, "100000000000.00");

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn amount_limit_above_the_default_is_accepted() {
        let ledger = Ledger {
            max_amount: "500000000000.00".to_string(),
            ..Ledger::default()
        };
        assert_eq!(ledger.amount_limit().unwrap(), Money::new(50_000_000_000_000));
        assert!(ledger.amount_limit().unwrap() > Money::DEFAULT_LIMIT);

        assert_eq!(
            Ledger::default().amount_limit().unwrap(),
            Money::DEFAULT_LIMIT
        );
        let garbage = Ledger {
            max_amount: "lots".to_string(),
            ..Ledger::default()
        };
        assert!(garbage.amount_limit().is_err());
    }
}
