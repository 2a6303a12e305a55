use std::{env, sync::Arc};

use anyhow::{Context, Result};
use url::Url;

pub mod api;
pub mod connect;
pub mod encode;
pub mod error;
pub mod session;

pub use api::{ApiClient, Track, UserProfile};
pub use connect::{CancelHandle, Connector, PendingConnect, Popup};
pub use error::ConnectError;
pub use session::Session;

pub const API_BASE: &str = "https://api.soundcloud.com";

/// Everything the connector and API client need, passed explicitly at
/// construction time.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub client_id: String,
    /// Loopback port for the redirect listener; 0 picks an ephemeral one.
    pub redirect_port: u16,
    pub popup: Popup,
}

impl Config {
    pub fn new(client_id: &str) -> Config {
        Config {
            api_base: String::from(API_BASE),
            client_id: String::from(client_id),
            redirect_port: 0,
            popup: Popup::default(),
        }
    }

    /// Read the config from the environment (and a `.env` file if one is
    /// around): `SCC_CLIENT_ID`, plus optional `SCC_API_BASE` and
    /// `SCC_REDIRECT_PORT` overrides.
    pub fn from_env() -> Result<Config> {
        dotenvy::dotenv().ok();

        let client_id = env::var("SCC_CLIENT_ID")
            .context("SCC_CLIENT_ID is not set in the environment or .env")?;
        let mut config = Config::new(&client_id);

        if let Ok(base) = env::var("SCC_API_BASE") {
            Url::parse(&base).context("SCC_API_BASE is not a valid url")?;
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Ok(port) = env::var("SCC_REDIRECT_PORT") {
            config.redirect_port = port.parse().context("SCC_REDIRECT_PORT is not a port")?;
        }

        Ok(config)
    }
}

/// One-shot flow: open the connect page, wait for the token, and return a
/// session initialized with it.
pub async fn connect(config: Config) -> Result<Arc<Session>> {
    let session = Arc::new(Session::new());
    let connector = Connector::new(config, Arc::clone(&session));
    let pending = connector.connect()?;
    pending.token().await?;
    Ok(session)
}
