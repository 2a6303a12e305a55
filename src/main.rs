use std::sync::Arc;

use anyhow::Result;
use log::{info, LevelFilter};
use logosaurus::{Logger, L_LEVEL, L_TIME};
use scc::{ApiClient, Config, Connector, Session};

#[tokio::main]
async fn main() -> Result<()> {
    let logger = Logger::builder(std::io::stderr())
        .set_prefix("scc: ")
        .set_flags(L_LEVEL | L_TIME)
        .set_level(LevelFilter::Debug)
        .build();
    logosaurus::init(logger)?;

    let config = Config::from_env()?;
    let session = Arc::new(Session::new());

    let connector = Connector::new(config.clone(), Arc::clone(&session));
    let pending = connector.connect()?;
    info!("waiting for the browser login to finish");
    pending.token().await?;

    let client = ApiClient::new(config, session);
    let me = client.me().await?;
    info!("connected as {} ({})", me.username, me.permalink_url);

    if let Some(arg) = std::env::args().nth(1) {
        let track = client.fetch_metadata(arg.parse()?).await?;
        info!(
            "track {}: {} by {} [{} ms]",
            track.id, track.title, track.user.username, track.duration
        );
    }

    Ok(())
}
