//! Integration tests for the HTTP status responder.
//!
//! These verify the route answers with documents rendered on the loop side
//! of the query bridge, and that the desktop stack serves real sockets.

#![cfg(feature = "web")]

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use allsky_node::config::WifiConfig;
use allsky_node::error::ConnectFailure;
use allsky_node::services::{build_router, query_channel, DesktopNetwork, QueryServer, WebServerConfig};
use allsky_node::status::StatusBody;
use allsky_node::traits::NetworkStack;
use allsky_node::{DeviceContext, StatusReport, SystemMode};

fn body(text: &str) -> StatusBody {
    let mut b = StatusBody::new();
    b.push_str(text).unwrap();
    b
}

/// Answer queries on a background thread until one has been served.
fn answer_one(server: QueryServer, text: &'static str) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if server.serve_pending(&mut || body(text)) > 0 {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
    })
}

#[tokio::test]
async fn test_get_status() {
    let (client, server) = query_channel(4, Duration::from_secs(2));
    let app = build_router(client, "/status", &WebServerConfig::default());
    let loop_side = answer_one(server, r#"{"mode":"radioActive"}"#);

    let response = app
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["mode"], "radioActive");

    loop_side.join().unwrap();
}

#[tokio::test]
async fn test_unanswered_status_is_503() {
    let (client, _server) = query_channel(4, Duration::from_millis(50));
    let app = build_router(client, "/status", &WebServerConfig::default());

    let response = app
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (client, _server) = query_channel(4, Duration::from_millis(50));
    let app = build_router(client, "/status", &WebServerConfig::default());

    let response = app
        .oneshot(Request::builder().uri("/api/state").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_post_not_allowed() {
    let (client, _server) = query_channel(4, Duration::from_millis(50));
    let app = build_router(client, "/status", &WebServerConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// ============================================================================
// Desktop network stack
// ============================================================================

fn local_network() -> DesktopNetwork {
    DesktopNetwork::new(WebServerConfig::new(([127, 0, 0, 1], 0))).unwrap()
}

fn wifi() -> WifiConfig {
    WifiConfig::default().with_ssid("observatory")
}

#[test]
fn desktop_connect_follows_access_point() {
    let mut net = local_network();
    let ap = net.access_point();

    assert_eq!(net.connect(&wifi()), Ok(()));
    assert!(net.is_connected());

    ap.store(false, Ordering::Release);
    assert!(!net.is_connected());
    assert_eq!(net.connect(&wifi()), Err(ConnectFailure::TargetNotFound));

    ap.store(true, Ordering::Release);
    assert_eq!(
        net.connect(&WifiConfig::default()),
        Err(ConnectFailure::TargetNotFound)
    );
}

#[test]
fn desktop_serves_status_over_tcp() {
    let mut net = local_network();
    net.connect(&wifi()).unwrap();
    net.start_responder("/status").unwrap();
    let addr = net.local_addr();
    assert_ne!(addr.port(), 0);

    let request = thread::spawn(move || {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream
            .write_all(b"GET /status HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    });

    let ctx = DeviceContext::new(10, 0);
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut served = 0;
    while served == 0 && Instant::now() < deadline {
        served += net.poll(&mut || {
            StatusReport::from_context(&ctx, SystemMode::NetworkFallback, 61_000).render()
        });
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(served, 1);

    let response = request.join().unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    let json_start = response.find('{').unwrap();
    let json: serde_json::Value = serde_json::from_str(&response[json_start..]).unwrap();
    assert_eq!(json["mode"], "networkFallback");
    assert_eq!(json["uptimeSeconds"], 61);
}

#[test]
fn desktop_responder_restarts_on_same_port() {
    let mut net = local_network();
    net.connect(&wifi()).unwrap();
    net.start_responder("/status").unwrap();
    let first = net.local_addr();

    net.stop_responder();
    assert!(!net.is_serving());
    // Let the graceful shutdown release the socket.
    thread::sleep(Duration::from_millis(100));

    net.start_responder("/status").unwrap();
    assert_eq!(net.local_addr(), first);
    assert!(net.is_serving());
}

#[test]
fn desktop_rejects_relative_route() {
    let mut net = local_network();
    assert!(net.start_responder("status").is_err());
    assert!(!net.is_serving());
}
