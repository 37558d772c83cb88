/// Configuration for the identity service, loaded from the environment.
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// RSA private key PEM; only this service signs tokens
    pub private_key_pem: String,
    /// RSA public key PEM, served to other services at /auth/public-key
    pub public_key_pem: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Config {
            app: AppConfig {
                host: std::env::var("IDENTITY_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("IDENTITY_SERVICE_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8001),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .map_err(|_| "DATABASE_URL is required".to_string())?,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(10),
            },
            jwt: JwtConfig {
                private_key_pem: std::env::var("JWT_PRIVATE_KEY_PEM")
                    .map_err(|_| "JWT_PRIVATE_KEY_PEM is required".to_string())?
                    .replace("\\n", "\n"),
                public_key_pem: std::env::var("JWT_PUBLIC_KEY_PEM")
                    .map_err(|_| "JWT_PUBLIC_KEY_PEM is required".to_string())?
                    .replace("\\n", "\n"),
            },
        })
    }
}
