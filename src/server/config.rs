use std::env;

pub const DEFAULT_PORT: u16 = 8000;

/// Process configuration: listening port and the admin secret. Both come
/// from the environment; an unset secret disables the admin channel
/// entirely.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub admin_secret: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|port| port.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let admin_secret = env::var("ADMIN_SECRET").unwrap_or_default();
        ServerConfig { port, admin_secret }
    }

    pub fn with_admin_secret(secret: impl Into<String>) -> Self {
        ServerConfig {
            port: DEFAULT_PORT,
            admin_secret: secret.into(),
        }
    }

    /// Exact-match check; never matches while no secret is configured.
    pub fn admin_secret_matches(&self, supplied: &str) -> bool {
        !self.admin_secret.is_empty() && supplied == self.admin_secret
    }
}
