use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub media_root: PathBuf,
    pub media_url: String,
    pub latest_movies: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://movies.db?mode=rwc".to_string());

        let db_max_connections: u32 =
            std::env::var("DB_MAX_CONNECTIONS").ok().and_then(|s| s.parse().ok()).unwrap_or(5);

        let media_root: PathBuf =
            std::env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string()).into();

        let mut media_url = std::env::var("MEDIA_URL").unwrap_or_else(|_| "/media/".to_string());
        if !media_url.ends_with('/') {
            media_url.push('/');
        }
        if media_url == "/" {
            anyhow::bail!("MEDIA_URL must not be the site root");
        }

        let latest_movies: u64 =
            std::env::var("LATEST_MOVIES").ok().and_then(|s| s.parse().ok()).unwrap_or(5);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            db_max_connections,
            media_root,
            media_url,
            latest_movies,
        })
    }

    /// Public URL of an uploaded file stored under the media root.
    pub fn media(&self, path: &str) -> String {
        format!("{}{}", self.media_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
impl Default for Config {
    fn default() -> Self {
        Self {
            addr: ([127, 0, 0, 1], 3000).into(),
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            media_root: "media".into(),
            media_url: "/media/".to_string(),
            latest_movies: 5,
        }
    }
}
