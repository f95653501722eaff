//! Servlet ordering, rollback and shutdown behaviour of a real server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use servlet_host::{Context, Error, Group, Server};

mod common;
use common::{event_log, events, test_config, RecordingServlet};

fn ctx() -> Context {
    Context::with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_servlets_start_in_order_and_stop_in_reverse() {
    let log = event_log();
    let mut server = Server::new(test_config());
    for name in ["A", "B", "C"] {
        server.add_servlet(RecordingServlet::new(name, &log)).unwrap();
    }

    server.start(&ctx()).await.unwrap();
    assert_eq!(events(&log), vec!["start:A", "start:B", "start:C"]);

    server.stop(&ctx()).await.unwrap();
    assert_eq!(
        events(&log),
        vec!["start:A", "start:B", "start:C", "stop:C", "stop:B", "stop:A"]
    );
}

#[tokio::test]
async fn test_failed_servlet_prevents_serving() {
    let log = event_log();
    let mut server = Server::new(test_config());
    server.add_servlet(RecordingServlet::new("A", &log)).unwrap();
    server
        .add_servlet(RecordingServlet::failing("B", &log, "boom"))
        .unwrap();
    server.add_servlet(RecordingServlet::new("C", &log)).unwrap();

    let err = server.start(&ctx()).await.unwrap_err();

    assert_eq!(err.to_string(), "boom");
    assert_eq!(events(&log), vec!["start:A", "start:B", "stop:A"]);
    assert!(server.local_addr().is_none());
    assert!(matches!(server.stop(&ctx()).await, Err(Error::NotStarted)));
}

#[tokio::test]
async fn test_invalid_address_starts_nothing() {
    let log = event_log();
    let mut config = test_config();
    config.listener.bind_address = "no-port-here".to_string();
    let mut server = Server::new(config);
    server.add_servlet(RecordingServlet::new("A", &log)).unwrap();

    let err = server.start(&ctx()).await.unwrap_err();

    assert!(matches!(err, Error::InvalidAddress { .. }));
    assert!(events(&log).is_empty());
}

#[tokio::test]
async fn test_bind_failure_rolls_back_servlets() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let log = event_log();
    let mut config = test_config();
    config.listener.bind_address = occupied.local_addr().unwrap().to_string();

    let mut server = Server::new(config);
    server.add_servlet(RecordingServlet::new("A", &log)).unwrap();
    server.add_servlet(RecordingServlet::new("B", &log)).unwrap();

    let err = server.start(&ctx()).await.unwrap_err();

    assert!(matches!(err, Error::Io(_)));
    assert_eq!(events(&log), vec!["start:A", "start:B", "stop:B", "stop:A"]);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let log = event_log();
    let mut server = Server::new(test_config());
    server.add_servlet(RecordingServlet::new("A", &log)).unwrap();

    server.start(&ctx()).await.unwrap();
    server.stop(&ctx()).await.unwrap();
    server.stop(&ctx()).await.unwrap();

    let stops = events(&log).iter().filter(|e| *e == "stop:A").count();
    assert_eq!(stops, 1);
}

#[tokio::test]
async fn test_registration_rejected_after_start() {
    let mut server = Server::new(test_config());
    server.start(&ctx()).await.unwrap();

    assert!(matches!(
        server.handle_fn("GET /late", |_w, _req| Box::pin(async {})),
        Err(Error::AlreadyStarted)
    ));
    assert!(matches!(
        server.add_servlet(RecordingServlet::new("late", &event_log())),
        Err(Error::AlreadyStarted)
    ));
    assert!(matches!(server.start(&ctx()).await, Err(Error::AlreadyStarted)));

    server.stop(&ctx()).await.unwrap();
}

#[tokio::test]
async fn test_connections_refused_after_stop() {
    let mut server = Server::new(test_config());
    server
        .handle_fn("GET /up", |w, _req| {
            Box::pin(async move {
                let _ = w.write_all(b"up").await;
            })
        })
        .unwrap();

    server.start(&ctx()).await.unwrap();
    let url = format!("{}/up", common::base_url(&server));
    assert_eq!(reqwest::get(&url).await.unwrap().text().await.unwrap(), "up");

    server.stop(&ctx()).await.unwrap();
    assert!(reqwest::get(&url).await.is_err());
}

/// Server whose `GET /slow` signals `entered`, sleeps for `delay`, then
/// writes "done".
fn slow_server(delay: Duration, entered: Arc<Notify>) -> Server {
    let mut server = Server::new(test_config());
    server
        .handle_fn("GET /slow", move |w, _req| {
            let entered = Arc::clone(&entered);
            Box::pin(async move {
                entered.notify_one();
                tokio::time::sleep(delay).await;
                let _ = w.write_all(b"done").await;
            })
        })
        .unwrap();
    server
}

#[tokio::test]
async fn test_stop_drains_in_flight_requests() {
    let entered = Arc::new(Notify::new());
    let server = slow_server(Duration::from_millis(500), Arc::clone(&entered));
    server.start(&ctx()).await.unwrap();

    let url = format!("{}/slow", common::base_url(&server));
    let request = tokio::spawn(async move {
        reqwest::get(&url).await.unwrap().text().await.unwrap()
    });
    entered.notified().await;

    let started = Instant::now();
    server.stop(&ctx()).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(request.await.unwrap(), "done");
}

#[tokio::test]
async fn test_stop_deadline_bounds_drain() {
    let entered = Arc::new(Notify::new());
    let server = slow_server(Duration::from_secs(3), Arc::clone(&entered));
    server.start(&ctx()).await.unwrap();

    let url = format!("{}/slow", common::base_url(&server));
    let _request = tokio::spawn(async move { reqwest::get(&url).await });
    entered.notified().await;

    let started = Instant::now();
    let result = server
        .stop(&Context::with_timeout(Duration::from_millis(200)))
        .await;

    assert!(matches!(result, Err(Error::DeadlineExceeded)));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_registration_rejected_after_stop() {
    let mut server = Server::new(test_config());
    server.start(&ctx()).await.unwrap();
    server.stop(&ctx()).await.unwrap();

    let mut late = Group::new("/late");
    late.router_mut()
        .handle_fn("GET /", |_w, _req| Box::pin(async {}))
        .unwrap();
    assert!(matches!(server.register(late), Err(Error::AlreadyStarted)));
    assert!(matches!(
        server.add_servlet(RecordingServlet::new("late", &event_log())),
        Err(Error::AlreadyStarted)
    ));

    let req = axum::http::Request::builder()
        .uri("/late/")
        .body(axum::body::Body::empty())
        .unwrap();
    assert_eq!(server.router().resolve(&req).pattern, "");
}
