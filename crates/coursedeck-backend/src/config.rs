use std::env;
use std::path::PathBuf;

use anyhow::Context;

use crate::ingest::watermark::{DEFAULT_WATERMARK_LINK, DEFAULT_WATERMARK_TEXT};

#[derive(Debug, Clone)]
pub struct Config {
    /// Only commands that talk to Postgres need it, see [`Config::database_url`].
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub uploads_dir: PathBuf,
    pub uploads_url_prefix: String,
    pub font_path: PathBuf,
    pub watermark_text: String,
    pub watermark_link: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a number")?,
            uploads_dir: env::var("UPLOADS_DIR")
                .unwrap_or_else(|_| "uploads".to_string())
                .into(),
            uploads_url_prefix: env::var("UPLOADS_URL_PREFIX")
                .unwrap_or_else(|_| "/uploads".to_string()),
            font_path: env::var("FONT_PATH")
                .unwrap_or_else(|_| "fonts/Arial.ttf".to_string())
                .into(),
            watermark_text: env::var("WATERMARK_TEXT")
                .unwrap_or_else(|_| DEFAULT_WATERMARK_TEXT.to_string()),
            watermark_link: env::var("WATERMARK_LINK")
                .unwrap_or_else(|_| DEFAULT_WATERMARK_LINK.to_string()),
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(database_url: Option<&str>) -> Config {
        Config {
            database_url: database_url.map(String::from),
            database_max_connections: 10,
            uploads_dir: "uploads".into(),
            uploads_url_prefix: "/uploads".into(),
            font_path: "fonts/Arial.ttf".into(),
            watermark_text: DEFAULT_WATERMARK_TEXT.into(),
            watermark_link: DEFAULT_WATERMARK_LINK.into(),
        }
    }

    #[test]
    fn database_url_is_required_only_when_asked_for() {
        let offline = config(None);
        assert!(offline.database_url().is_err());

        let online = config(Some("postgres://localhost/coursedeck"));
        assert_eq!(online.database_url().unwrap(), "postgres://localhost/coursedeck");
    }
}
