use std::{sync::Arc, thread};

use scc::{ApiClient, Config, Session};

// Single-request stub: answers once with the given status and body, and
// hands back the request path it saw.
fn spawn_stub(status: u16, body: &'static str) -> (String, thread::JoinHandle<String>) {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let base = format!("http://{}", server.server_addr().to_ip().unwrap());
    let handle = thread::spawn(move || {
        let request = server.recv().unwrap();
        let path = request.url().to_string();
        request
            .respond(tiny_http::Response::from_string(body).with_status_code(status))
            .unwrap();
        path
    });
    (base, handle)
}

fn stub_client(base: String) -> (ApiClient, Arc<Session>) {
    let mut config = Config::new("app-key");
    config.api_base = base;
    let session = Arc::new(Session::new());
    (
        ApiClient::new(config, Arc::clone(&session)),
        session,
    )
}

const ME_BODY: &str = r#"{
    "id": 3207,
    "username": "jwagener",
    "permalink_url": "https://soundcloud.com/jwagener",
    "full_name": "Johannes Wagener"
}"#;

const TRACK_BODY: &str = r#"{
    "id": 13158665,
    "title": "Munching at Tiannas house",
    "permalink_url": "https://soundcloud.com/user2835985/munching-at-tiannas-house",
    "duration": 18998,
    "genre": "Trance",
    "user": { "id": 3699101, "username": "user2835985" }
}"#;

#[tokio::test]
async fn me_sends_the_session_token_and_decodes_the_profile() {
    let (base, seen) = spawn_stub(200, ME_BODY);
    let (client, session) = stub_client(base);
    session.init("T1");

    let me = client.me().await.unwrap();
    assert_eq!(me.id, 3207);
    assert_eq!(me.username, "jwagener");
    assert_eq!(me.full_name.as_deref(), Some("Johannes Wagener"));

    let path = seen.join().unwrap();
    assert!(path.starts_with("/me.json?"));
    assert!(path.contains("oauth_token=T1"));
    assert!(session.is_connected());
}

#[tokio::test]
async fn me_failure_disconnects_the_session() {
    let (base, seen) = spawn_stub(401, "{}");
    let (client, session) = stub_client(base);
    session.init("EXPIRED");

    assert!(client.me().await.is_err());
    assert!(!session.is_connected());
    assert_eq!(session.token(), None);
    seen.join().unwrap();
}

#[tokio::test]
async fn me_without_a_token_fails_before_any_request() {
    let (client, session) = stub_client(String::from("http://127.0.0.1:1"));

    assert!(client.me().await.is_err());
    assert!(!session.is_connected());
}

#[tokio::test]
async fn fetch_metadata_uses_the_client_key_and_decodes_the_track() {
    let (base, seen) = spawn_stub(200, TRACK_BODY);
    let (client, _session) = stub_client(base);

    let track = client.fetch_metadata(13158665).await.unwrap();
    assert_eq!(track.id, 13158665);
    assert_eq!(track.title, "Munching at Tiannas house");
    assert_eq!(track.duration, 18998);
    assert_eq!(track.genre.as_deref(), Some("Trance"));
    assert_eq!(track.user.username, "user2835985");

    let path = seen.join().unwrap();
    assert!(path.starts_with("/tracks/13158665?"));
    assert!(path.contains("client_id=app-key"));
}

#[tokio::test]
async fn fetch_metadata_failure_leaves_the_session_alone() {
    let (base, seen) = spawn_stub(404, "{}");
    let (client, session) = stub_client(base);
    session.init("STILL-GOOD");

    assert!(client.fetch_metadata(42).await.is_err());
    assert!(session.is_connected());
    assert_eq!(session.token().as_deref(), Some("STILL-GOOD"));
    seen.join().unwrap();
}
