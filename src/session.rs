use std::sync::Mutex;

/// Holds the access token for the lifetime of the process. Shared between
/// the connector and the API client as an `Arc<Session>`; the token is
/// either absent (disconnected) or a non-empty string.
#[derive(Debug, Default)]
pub struct Session {
    access_token: Mutex<Option<String>>,
}

impl Session {
    pub fn new() -> Session {
        Session::default()
    }

    pub fn token(&self) -> Option<String> {
        self.access_token.lock().unwrap().clone()
    }

    /// Store `token` unconditionally. The token shape is opaque to us; the
    /// API decides whether it actually works.
    pub fn init(&self, token: impl Into<String>) {
        *self.access_token.lock().unwrap() = Some(token.into());
    }

    pub fn is_connected(&self) -> bool {
        self.access_token
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|t| !t.is_empty())
    }

    pub fn disconnect(&self) {
        *self.access_token.lock().unwrap() = None;
    }
}
