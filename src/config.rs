use anyhow::Context;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: String,
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub pool_size: u32,
}

impl Config {
    /// Reads `.env` if present, then the process environment.
    pub fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port: u16 = match lookup("PORT") {
            Some(port) => port
                .parse()
                .with_context(|| format!("PORT={port} is not a valid port"))?,
            None => 3001,
        };
        let pool_size: u32 = match lookup("DB_POOL_SIZE") {
            Some(size) => size
                .parse()
                .with_context(|| format!("DB_POOL_SIZE={size} is not a valid pool size"))?,
            None => 8,
        };
        anyhow::ensure!(pool_size > 0, "DB_POOL_SIZE must be at least 1");

        Ok(Self {
            database_path: lookup("SQLITE_DB").unwrap_or_else(|| "todo.db".to_string()),
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            cors_origin: lookup("CORS_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            pool_size,
        })
    }
}
