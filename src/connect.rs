use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use rand::{distr::Alphanumeric, Rng};
use tiny_http::{Header, Response, Server};
use tokio::sync::oneshot;

use crate::{
    encode::{to_options, to_params, Field},
    error::ConnectError,
    session::Session,
    Config,
};

const CONNECT_SCOPE: &str = "non-expiring";
const CONNECT_RESPONSE_TYPE: &str = "token";
const CONNECT_DISPLAY: &str = "popup";
const STATE_LEN: usize = 16;

// Served once the token is in hand; the window closes itself.
const DONE_PAGE: &str = "<html><body><script>window.close();</script></body></html>";
// Served when the redirect carries the token in the URL fragment, which
// never reaches the listener. The script replays it as a query string.
const RELAY_PAGE: &str = concat!(
    "<html><body><script>",
    "var h = window.location.hash;",
    "if (h) { window.location.replace(\"/callback?\" + h.slice(1)); }",
    "</script></body></html>",
);
const DENIED_PAGE: &str = "<html><body><h4>Login failed.</h4></body></html>";

/// Geometry and chrome for the provider's connect window. Native window
/// opening cannot apply a feature string, so this is advisory: embedders
/// that host their own webview read it off the pending connect.
#[derive(Debug, Clone)]
pub struct Popup {
    pub width: i64,
    pub height: i64,
    pub location: i64,
    pub left: i64,
    pub top: i64,
    pub toolbar: String,
    pub scrollbars: String,
}

impl Default for Popup {
    fn default() -> Popup {
        Popup {
            width: 456,
            height: 510,
            location: 1,
            left: 200,
            top: 200,
            toolbar: String::from("no"),
            scrollbars: String::from("yes"),
        }
    }
}

impl Popup {
    /// Center the window on a screen of the given size; `left` pairs with
    /// the width and `top` with the height.
    pub fn centered_on(mut self, screen_width: i64, screen_height: i64) -> Popup {
        self.left = (screen_width - self.width).max(0) / 2;
        self.top = (screen_height - self.height).max(0) / 2;
        self
    }

    pub fn feature_string(&self) -> String {
        to_options(&[
            ("width", Field::Number(self.width)),
            ("height", Field::Number(self.height)),
            ("location", Field::Number(self.location)),
            ("left", Field::Number(self.left)),
            ("top", Field::Number(self.top)),
            ("toolbar", Field::text(self.toolbar.as_str())),
            ("scrollbars", Field::text(self.scrollbars.as_str())),
        ])
    }
}

/// Split a redirect URL on `#`, `?` and `&` and keep every segment that
/// splits into exactly two parts on `=`. Tolerates the token arriving in
/// either the query or the fragment.
pub fn parse_fragments(url: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for segment in url.split(['#', '?', '&']) {
        let parts: Vec<&str> = segment.split('=').collect();
        if let [key, value] = parts[..] {
            fields.insert(key.to_string(), value.to_string());
        }
    }
    fields
}

/// Drives the connect flow: binds the redirect listener, opens the
/// provider's connect page in the browser, and hands back a
/// [`PendingConnect`] that resolves with the delivered token.
pub struct Connector {
    config: Config,
    session: Arc<Session>,
}

impl Connector {
    pub fn new(config: Config, session: Arc<Session>) -> Connector {
        Connector { config, session }
    }

    /// Start a connect attempt and open the browser at the connect page.
    pub fn connect(&self) -> Result<PendingConnect> {
        let pending = self.begin()?;
        if webbrowser::open(pending.authorize_url()).is_err() {
            warn!(
                "failed to open a browser; navigate to {} manually",
                pending.authorize_url()
            );
        }
        Ok(pending)
    }

    /// Everything `connect` does short of launching a browser: bind the
    /// listener and build the authorization URL for this attempt.
    pub fn begin(&self) -> Result<PendingConnect> {
        let state: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_LEN)
            .map(char::from)
            .collect();

        // Bind before building the URL so an ephemeral port is resolved
        // into the redirect_uri the provider will actually hit.
        let server = Server::http(format!("127.0.0.1:{}", self.config.redirect_port))
            .map_err(|e| anyhow!("unable to bind redirect listener: {e}"))?;
        let port = server
            .server_addr()
            .to_ip()
            .context("redirect listener has no ip address")?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{port}/callback");

        let params = [
            ("scope", Field::text(CONNECT_SCOPE)),
            ("response_type", Field::text(CONNECT_RESPONSE_TYPE)),
            ("display", Field::text(CONNECT_DISPLAY)),
            ("client_id", Field::text(self.config.client_id.as_str())),
            ("redirect_uri", Field::text(redirect_uri.as_str())),
            ("state", Field::text(state.as_str())),
        ];
        let authorize_url = format!("{}/connect?{}", self.config.api_base, to_params(&params));
        let popup_features = self.config.popup.feature_string();
        debug!("connect url {authorize_url} with window options {popup_features}");

        let server = Arc::new(server);
        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();
        let listener = Listener {
            server: Arc::clone(&server),
            cancelled: Arc::clone(&cancelled),
            state: state.clone(),
            tx,
        };
        thread::Builder::new()
            .name(String::from("scc-redirect"))
            .spawn(move || listener.run())
            .context("unable to spawn redirect listener thread")?;

        let cancel = CancelHandle { server, cancelled };
        Ok(PendingConnect {
            authorize_url,
            redirect_uri,
            popup_features,
            state,
            rx,
            session: Arc::clone(&self.session),
            shutdown: ShutdownGuard {
                cancel: cancel.clone(),
            },
            cancel,
        })
    }
}

/// A connect attempt that is waiting for the provider to redirect back.
pub struct PendingConnect {
    authorize_url: String,
    redirect_uri: String,
    popup_features: String,
    state: String,
    rx: oneshot::Receiver<Result<String, ConnectError>>,
    session: Arc<Session>,
    cancel: CancelHandle,
    shutdown: ShutdownGuard,
}

impl PendingConnect {
    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Window-feature string for this attempt, for embedders that open the
    /// connect page in a webview of their own.
    pub fn popup_features(&self) -> &str {
        &self.popup_features
    }

    /// Correlation id sent with this attempt; the redirect must echo it.
    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Wait for the redirect to deliver the token. On success the shared
    /// session is initialized with it before it is returned.
    pub async fn token(self) -> Result<String, ConnectError> {
        let PendingConnect {
            rx,
            session,
            shutdown,
            ..
        } = self;
        let outcome = match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ConnectError::Cancelled),
        };
        drop(shutdown);
        let token = outcome?;
        session.init(token.as_str());
        Ok(token)
    }
}

/// Cancels a pending connect: the listener is unblocked and the pending
/// `token()` resolves with [`ConnectError::Cancelled`].
#[derive(Clone)]
pub struct CancelHandle {
    server: Arc<Server>,
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.server.unblock();
    }
}

// Dropping the pending connect must not strand the listener thread on a
// blocking recv, nor keep its port bound.
struct ShutdownGuard {
    cancel: CancelHandle,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Listener {
    server: Arc<Server>,
    cancelled: Arc<AtomicBool>,
    state: String,
    tx: oneshot::Sender<Result<String, ConnectError>>,
}

impl Listener {
    fn run(self) {
        let Listener {
            server,
            cancelled,
            state,
            tx,
        } = self;
        loop {
            // recv returns Err once the cancel handle unblocks the server
            let request = match server.recv() {
                Ok(request) => request,
                Err(_) => return,
            };
            if cancelled.load(Ordering::SeqCst) {
                return;
            }

            let fields = parse_fragments(request.url());
            match fields.get("access_token") {
                Some(token) => {
                    let outcome = if fields.get("state").map(String::as_str) == Some(state.as_str())
                    {
                        Ok(token.clone())
                    } else {
                        Err(ConnectError::StateMismatch)
                    };
                    let page = if outcome.is_ok() { DONE_PAGE } else { DENIED_PAGE };
                    let _ = request.respond(html_page(page));
                    let _ = tx.send(outcome);
                    return;
                }
                // No token in the query; it may be hiding in the fragment.
                None => {
                    let _ = request.respond(html_page(RELAY_PAGE));
                }
            }
        }
    }
}

fn html_page(body: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body).with_header(Header {
        field: "Content-Type".parse().unwrap(),
        value: "text/html".parse().unwrap(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_style_redirects() {
        let fields = parse_fragments("https://example.com/callback?access_token=ABC&state=1");
        assert_eq!(fields.get("access_token").map(String::as_str), Some("ABC"));
        assert_eq!(fields.get("state").map(String::as_str), Some("1"));
    }

    #[test]
    fn parses_fragment_style_redirects() {
        let fields = parse_fragments("/callback#access_token=T0K&expires_in=3600");
        assert_eq!(fields.get("access_token").map(String::as_str), Some("T0K"));
        assert_eq!(fields.get("expires_in").map(String::as_str), Some("3600"));
    }

    #[test]
    fn keeps_only_segments_with_exactly_one_equals() {
        let fields = parse_fragments("/callback?plain&a=b=c&ok=1");
        assert!(!fields.contains_key("plain"));
        assert!(!fields.contains_key("a"));
        assert_eq!(fields.get("ok").map(String::as_str), Some("1"));
    }

    #[test]
    fn path_segment_never_becomes_a_field() {
        let fields = parse_fragments("/callback");
        assert!(fields.is_empty());
    }

    #[test]
    fn popup_defaults_render_in_declaration_order() {
        assert_eq!(
            Popup::default().feature_string(),
            "width=456,height=510,location=1,left=200,top=200,toolbar=no,scrollbars=yes"
        );
    }

    #[test]
    fn popup_centers_against_the_matching_axis() {
        let popup = Popup::default().centered_on(1920, 1080);
        assert_eq!(popup.left, (1920 - 456) / 2);
        assert_eq!(popup.top, (1080 - 510) / 2);
    }

    #[test]
    fn popup_never_centers_off_screen() {
        let popup = Popup::default().centered_on(320, 240);
        assert_eq!(popup.left, 0);
        assert_eq!(popup.top, 0);
    }
}
