use std::sync::Arc;

use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;

use crate::{session::Session, Config};

#[derive(Debug, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    pub permalink_url: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Track {
    pub id: u64,
    pub title: String,
    pub permalink_url: String,
    /// Milliseconds.
    pub duration: u64,
    #[serde(default)]
    pub genre: Option<String>,
    pub user: TrackUser,
}

#[derive(Debug, Deserialize)]
pub struct TrackUser {
    pub id: u64,
    pub username: String,
}

pub struct ApiClient {
    http: reqwest::Client,
    config: Config,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(config: Config, session: Arc<Session>) -> ApiClient {
        ApiClient {
            http: reqwest::Client::new(),
            config,
            session,
        }
    }

    /// Look up the logged-in user. Any failure means the stored token no
    /// longer works, so the session is disconnected before the error is
    /// returned.
    pub async fn me(&self) -> Result<UserProfile> {
        match self.try_me().await {
            Ok(profile) => Ok(profile),
            Err(e) => {
                self.session.disconnect();
                Err(e)
            }
        }
    }

    async fn try_me(&self) -> Result<UserProfile> {
        let token = self.session.token().context("no session token")?;
        let query = serde_urlencoded::to_string([("oauth_token", token.as_str())])?;
        let text = self
            .http
            .get(format!("{}/me.json?{}", self.config.api_base, query))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetch public metadata for a track. Failures are logged and passed
    /// through; the session is untouched.
    pub async fn fetch_metadata(&self, track_id: u64) -> Result<Track> {
        match self.try_fetch_metadata(track_id).await {
            Ok(track) => Ok(track),
            Err(e) => {
                warn!("unable to retrieve track {track_id}: {e:#}");
                Err(e)
            }
        }
    }

    async fn try_fetch_metadata(&self, track_id: u64) -> Result<Track> {
        let query = serde_urlencoded::to_string([("client_id", self.config.client_id.as_str())])?;
        let text = self
            .http
            .get(format!(
                "{}/tracks/{}?{}",
                self.config.api_base, track_id, query
            ))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(serde_json::from_str(&text)?)
    }
}
