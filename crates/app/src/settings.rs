use engine::Currency;
use serde::Deserialize;

use crate::{cli::GlobalArgs, error::Result};

const DEFAULT_CONFIG_PATH: &str = "finquest.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub user: String,
    pub currency: String,
    pub level: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./finquest.db?mode=rwc".to_string(),
            user: "default".to_string(),
            currency: Currency::default().code().to_string(),
            level: "info".to_string(),
            gemini_api_key: None,
            gemini_model: None,
        }
    }
}

impl Settings {
    /// Layers the optional config file, `FINQUEST_*` variables and the
    /// command line flags, in increasing priority.
    pub fn load(args: &GlobalArgs) -> Result<Self> {
        let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
        let mut builder = config::Config::builder();
        builder = builder.add_source(config::File::with_name(config_path).required(false));
        builder = builder.add_source(config::Environment::with_prefix("FINQUEST"));
        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.apply(args);
        Ok(settings)
    }

    fn apply(&mut self, args: &GlobalArgs) {
        if let Some(database_url) = &args.database_url {
            self.database_url = database_url.clone();
        }
        if let Some(user) = &args.user {
            self.user = user.clone();
        }
        if let Some(currency) = &args.currency {
            self.currency = currency.clone();
        }
        if let Some(level) = &args.level {
            self.level = level.clone();
        }
    }

    pub fn currency(&self) -> Result<Currency> {
        Ok(Currency::try_from(self.currency.as_str())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = GlobalArgs {
            config: None,
            database_url: Some("sqlite::memory:".to_string()),
            user: Some("ada".to_string()),
            currency: Some("kes".to_string()),
            level: None,
        };
        let mut settings = Settings::default();
        settings.apply(&args);
        assert_eq!(settings.database_url, "sqlite::memory:");
        assert_eq!(settings.user, "ada");
        assert_eq!(settings.level, "info");
        assert_eq!(settings.currency().unwrap(), Currency::Kes);
    }

    #[test]
    fn unknown_currency_is_rejected() {
        let settings = Settings {
            currency: "XYZ".to_string(),
            ..Settings::default()
        };
        assert!(settings.currency().is_err());
    }
}
