//! Push-mode ingestion over real HTTP.

use courier::{
    ControllerStatus, Dispatcher, DispatcherConfig, HandlerEntry, LifecycleError, WebhookConfig,
    kind,
    testing::{CountingHandler, sample},
};
use std::{net::SocketAddr, time::Duration};

fn webhook_config() -> WebhookConfig {
    WebhookConfig::default()
        .with_host("127.0.0.1")
        .with_port(0)
        .with_path("updates")
        .with_grace_period(Duration::from_secs(2))
}

async fn started(handler: &CountingHandler, config: WebhookConfig) -> (Dispatcher<()>, SocketAddr) {
    let dispatcher = Dispatcher::builder(())
        .config(DispatcherConfig::default().with_webhook(config))
        .register::<kind::Message>(HandlerEntry::new(handler.clone()))
        .build();
    dispatcher.start_webhook(true).await.unwrap();
    let addr = dispatcher.webhook_addr().unwrap();
    (dispatcher, addr)
}

#[tokio::test]
async fn test_valid_update_is_acknowledged_and_routed() {
    let handler = CountingHandler::new();
    let (dispatcher, addr) = started(&handler, webhook_config()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/updates"))
        .json(&sample::text_update(1, 9, "hello"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(dispatcher.close().await);
    assert_eq!(handler.finished(), 1);
}

#[tokio::test]
async fn test_undecodable_payload_is_rejected_and_listener_survives() {
    let handler = CountingHandler::new();
    let (dispatcher, addr) = started(&handler, webhook_config()).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/updates");

    let bad = client
        .post(&url)
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    let good = client
        .post(&url)
        .json(&sample::text_update(2, 9, "hello"))
        .send()
        .await
        .unwrap();

    assert_eq!(bad.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(good.status(), reqwest::StatusCode::OK);
    dispatcher.close().await;
    assert_eq!(handler.finished(), 1);
}

#[tokio::test]
async fn test_secret_token_is_enforced() {
    let handler = CountingHandler::new();
    let (dispatcher, addr) =
        started(&handler, webhook_config().with_secret_token("s3cr3t")).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/updates");

    let missing = client
        .post(&url)
        .json(&sample::text_update(1, 9, "hello"))
        .send()
        .await
        .unwrap();
    let wrong = client
        .post(&url)
        .header("X-Telegram-Bot-Api-Secret-Token", "guess")
        .json(&sample::text_update(2, 9, "hello"))
        .send()
        .await
        .unwrap();
    let right = client
        .post(&url)
        .header("X-Telegram-Bot-Api-Secret-Token", "s3cr3t")
        .json(&sample::text_update(3, 9, "hello"))
        .send()
        .await
        .unwrap();

    assert_eq!(missing.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert_eq!(right.status(), reqwest::StatusCode::OK);
    dispatcher.close().await;
    assert_eq!(handler.finished(), 1);
}

#[tokio::test]
async fn test_stop_releases_listener() {
    let (dispatcher, addr) = started(&CountingHandler::new(), webhook_config()).await;

    dispatcher.stop_webhook(true).await.unwrap();

    assert_eq!(dispatcher.webhook_status().await, ControllerStatus::Idle);
    assert!(dispatcher.webhook_addr().is_none());
    assert!(tokio::net::TcpListener::bind(addr).await.is_ok());
    assert_eq!(
        dispatcher.stop_webhook(true).await,
        Err(LifecycleError::AlreadyStopped)
    );
}

#[tokio::test]
async fn test_bind_failure_is_reported_to_waiting_caller() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    let dispatcher = Dispatcher::builder(()).build();

    let result = dispatcher
        .start_webhook_with(webhook_config().with_port(port), true)
        .await;

    assert_eq!(result, Err(LifecycleError::ExitedEarly));
    dispatcher.close().await;
}

#[tokio::test]
async fn test_aborted_listener_clears_its_address() {
    use tokio::io::AsyncWriteExt;

    let config = webhook_config().with_grace_period(Duration::from_millis(100));
    let (dispatcher, addr) = started(&CountingHandler::new(), config).await;

    // A request whose body never arrives keeps the connection busy past the grace period.
    let mut stalled = tokio::net::TcpStream::connect(addr).await.unwrap();
    stalled
        .write_all(b"POST /updates HTTP/1.1\r\nhost: localhost\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(2), dispatcher.stop_webhook(true))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(dispatcher.webhook_status().await, ControllerStatus::Idle);
    assert!(dispatcher.webhook_addr().is_none());
    drop(stalled);
}
