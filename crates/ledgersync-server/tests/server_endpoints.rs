use ledgersync_auth::AuthConfig;
use ledgersync_config::Config;
use ledgersync_server::build_app;
use serde_json::Value;
use tokio::task::JoinHandle;

fn dev_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        public_url: None,
        allowed_origins: Vec::new(),
        database_url: "memory".to_string(),
        test_database_url: None,
        auth: AuthConfig {
            auth0_domain: "dev.example.com".to_string(),
            auth0_audience: "ledgersync-dev".to_string(),
            dev_mode: true,
            ..Default::default()
        },
        session_ttl_seconds: 1800,
        rate_limit_window_seconds: 60,
        rate_limit_max: 600,
        rate_limit_burst: 120,
    }
}

async fn start_server() -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let app = build_app(dev_config()).await.expect("build app");

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

#[tokio::test]
async fn sync_info_requires_auth_and_returns_capability_document() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    // No X-Debug-Sub in dev mode: the auth stage still runs and rejects.
    let resp = client
        .get(format!("{base}/v1/sync/info"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    let resp = client
        .get(format!("{base}/v1/sync/info"))
        .header("X-Debug-Sub", "test-user")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let correlation_id = resp
        .headers()
        .get("x-correlation-id")
        .map(|v| v.to_str().unwrap().to_string());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["apiVersion"], "1.1");
    assert_eq!(body["entities"]["notes"]["maxLimit"], 1000);
    assert_eq!(body["rateLimit"]["windowSeconds"], 60);
    assert!(correlation_id.is_none() || !correlation_id.unwrap().is_empty());

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn begin_and_end_session_round_trip() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/v1/sync/sessions"))
        .header("X-Debug-Sub", "session-user")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    let session_id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["epoch"], 0);

    let resp = client
        .delete(format!("{base}/v1/sync/sessions/{session_id}"))
        .header("X-Debug-Sub", "session-user")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn entity_route_rejects_missing_session_header() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/v1/notes"))
        .header("X-Debug-Sub", "no-session-user")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::PRECONDITION_REQUIRED);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
