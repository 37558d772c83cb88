/// Configuration for the API gateway, loaded from the environment.
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub breaker: BreakerConfig,
    pub timeouts: TimeoutConfig,
    /// Path-prefix routing table; matching is longest-prefix.
    pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub fail_max: u32,
    pub reset_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub connect: Duration,
    pub read: Duration,
}

#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Upstream name; keys the circuit breaker registry
    pub name: String,
    /// Path prefix this upstream serves
    pub prefix: String,
    /// Upstream base url
    pub upstream: String,
}

fn upstream(env_var: &str, default_port: u16) -> String {
    std::env::var(env_var).unwrap_or_else(|_| format!("http://localhost:{default_port}"))
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Config {
            app: AppConfig {
                host: std::env::var("GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("GATEWAY_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8000),
            },
            breaker: BreakerConfig {
                fail_max: std::env::var("CB_FAILURE_THRESHOLD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
                reset_timeout: Duration::from_secs(
                    std::env::var("CB_RESET_TIMEOUT_SECS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(30),
                ),
            },
            timeouts: TimeoutConfig {
                connect: Duration::from_millis(
                    std::env::var("CONNECT_TIMEOUT_MS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(2_000),
                ),
                read: Duration::from_millis(
                    std::env::var("READ_TIMEOUT_MS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(10_000),
                ),
            },
            routes: vec![
                RouteConfig {
                    name: "identity".to_string(),
                    prefix: "/api/v1/auth".to_string(),
                    upstream: upstream("IDENTITY_SERVICE_URL", 8001),
                },
                RouteConfig {
                    name: "characteristic".to_string(),
                    prefix: "/api/v1/characteristics".to_string(),
                    upstream: upstream("CHARACTERISTIC_SERVICE_URL", 8002),
                },
                RouteConfig {
                    name: "specification".to_string(),
                    prefix: "/api/v1/specifications".to_string(),
                    upstream: upstream("SPECIFICATION_SERVICE_URL", 8003),
                },
                RouteConfig {
                    name: "pricing".to_string(),
                    prefix: "/api/v1/prices".to_string(),
                    upstream: upstream("PRICING_SERVICE_URL", 8004),
                },
                RouteConfig {
                    name: "offering".to_string(),
                    prefix: "/api/v1/offerings".to_string(),
                    upstream: upstream("OFFERING_SERVICE_URL", 8005),
                },
                RouteConfig {
                    name: "store".to_string(),
                    prefix: "/api/v1/store".to_string(),
                    upstream: upstream("STORE_SERVICE_URL", 8006),
                },
            ],
        })
    }
}
