//! End-to-end lifecycle tests over real sockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{Method, Request, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use usersvc_core::{respond, User, CONTENT_TYPE_JSON};
use usersvc_server::{
    LifecycleError, LifecycleResult, LifecycleState, PathParams, Router, ServerLifecycle,
    ServerLifecycleConfig,
};

fn users_router() -> Router {
    let mut router = Router::new();
    router.route(Method::GET, "/users", "listUsers", |_req: Request<Bytes>, _params: PathParams| async {
        let users = vec![
            User::new("1", "Ada", "ada@example.com"),
            User::new("2", "Grace", "grace@example.com"),
        ];
        respond(&users, StatusCode::OK)
    });
    router
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

async fn launch(
    config: ServerLifecycleConfig,
    router: Router,
) -> (Arc<ServerLifecycle>, JoinHandle<LifecycleResult>, SocketAddr) {
    let lifecycle = Arc::new(ServerLifecycle::new(config, router));
    let runner = {
        let lifecycle = Arc::clone(&lifecycle);
        tokio::spawn(async move { lifecycle.start().await })
    };
    let addr = lifecycle.listening().await.expect("listener should bind");
    let addr = SocketAddr::from(([127, 0, 0, 1], addr.port()));
    (lifecycle, runner, addr)
}

async fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut received = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return received,
            Ok(n) => received.extend_from_slice(&buf[..n]),
        }
    }
}

#[tokio::test]
async fn test_serves_requests_and_stops_cleanly() {
    let config = ServerLifecycleConfig::builder()
        .address(":0")
        .shutdown_grace(Duration::from_secs(2))
        .build();
    let (lifecycle, runner, addr) = launch(config, users_router()).await;

    let response = client()
        .get(format!("http://{addr}/users"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        CONTENT_TYPE_JSON
    );
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 2);

    lifecycle.stop();
    let result = tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok(), "unexpected result: {result:?}");
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_stop_twice_is_harmless() {
    let config = ServerLifecycleConfig::builder().address("127.0.0.1:0").build();
    let (lifecycle, runner, _addr) = launch(config, users_router()).await;

    lifecycle.stop();
    lifecycle.stop();
    let result = runner.await.unwrap();
    assert!(result.is_ok());

    lifecycle.stop();
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_unknown_route_returns_not_found() {
    let config = ServerLifecycleConfig::builder().address("127.0.0.1:0").build();
    let (lifecycle, runner, addr) = launch(config, users_router()).await;

    let response = client()
        .get(format!("http://{addr}/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({"status": 404, "message": "route not found"}));

    lifecycle.stop();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_grace_period_expiry_forces_close() {
    let entered = Arc::new(Notify::new());
    let mut router = Router::new();
    {
        let entered = Arc::clone(&entered);
        router.route(Method::GET, "/slow", "slow", move |_req: Request<Bytes>, _params: PathParams| {
            let entered = Arc::clone(&entered);
            async move {
                entered.notify_one();
                tokio::time::sleep(Duration::from_millis(500)).await;
                respond(&"done", StatusCode::OK)
            }
        });
    }

    let config = ServerLifecycleConfig::builder()
        .address("127.0.0.1:0")
        .shutdown_grace(Duration::from_millis(50))
        .build();
    let (lifecycle, runner, addr) = launch(config, router).await;

    let request = tokio::spawn(client().get(format!("http://{addr}/slow")).send());
    entered.notified().await;

    let started = Instant::now();
    lifecycle.stop();
    let result = runner.await.unwrap();
    let elapsed = started.elapsed();

    assert!(
        matches!(result, Err(LifecycleError::ShutdownTimedOut { open: 1, .. })),
        "unexpected result: {result:?}"
    );
    assert!(elapsed < Duration::from_millis(400), "took {elapsed:?}");
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);

    // The in-flight request was cut off rather than answered.
    assert!(request.await.unwrap().is_err());
}

#[tokio::test]
async fn test_in_flight_request_completes_within_grace() {
    let entered = Arc::new(Notify::new());
    let mut router = Router::new();
    {
        let entered = Arc::clone(&entered);
        router.route(Method::GET, "/slow", "slow", move |_req: Request<Bytes>, _params: PathParams| {
            let entered = Arc::clone(&entered);
            async move {
                entered.notify_one();
                tokio::time::sleep(Duration::from_millis(100)).await;
                respond(&"done", StatusCode::OK)
            }
        });
    }

    let config = ServerLifecycleConfig::builder()
        .address("127.0.0.1:0")
        .shutdown_grace(Duration::from_secs(2))
        .build();
    let (lifecycle, runner, addr) = launch(config, router).await;

    let request = tokio::spawn(client().get(format!("http://{addr}/slow")).send());
    entered.notified().await;
    lifecycle.stop();

    let response = request.await.unwrap().unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(runner.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_handler_timeout_returns_service_unavailable() {
    let mut router = Router::new();
    router.route(Method::GET, "/stuck", "stuck", |_req: Request<Bytes>, _params: PathParams| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        respond(&"late", StatusCode::OK)
    });

    let config = ServerLifecycleConfig::builder()
        .address("127.0.0.1:0")
        .handler_timeout(Duration::from_millis(50))
        .build();
    let (lifecycle, runner, addr) = launch(config, router).await;

    let response = client()
        .get(format!("http://{addr}/stuck"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({"status": 503, "message": "request timeout"}));

    lifecycle.stop();
    assert!(runner.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_panicking_handler_returns_internal_error() {
    let mut router = users_router();
    router.route(Method::GET, "/boom", "boom", |req: Request<Bytes>, _params: PathParams| async move {
        if req.uri().path() == "/boom" {
            panic!("handler blew up");
        }
        respond(&"unreachable", StatusCode::OK)
    });

    let config = ServerLifecycleConfig::builder().address("127.0.0.1:0").build();
    let (lifecycle, runner, addr) = launch(config, router).await;
    let client = client();

    let response = client
        .get(format!("http://{addr}/boom"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        CONTENT_TYPE_JSON
    );
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({"status": 500, "message": "Internal server error"})
    );

    // The server keeps serving after the panic.
    let response = client
        .get(format!("http://{addr}/users"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    lifecycle.stop();
    assert!(runner.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_port_in_use_fails_listener() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = occupied.local_addr().unwrap().to_string();

    let lifecycle = ServerLifecycle::new(
        ServerLifecycleConfig::builder().address(address).build(),
        users_router(),
    );
    let result = tokio::time::timeout(Duration::from_secs(5), lifecycle.start())
        .await
        .unwrap();

    assert!(matches!(result, Err(LifecycleError::ListenerFailed(_))));
    assert_eq!(lifecycle.state(), LifecycleState::Failed);
}

#[tokio::test]
async fn test_silent_client_hits_read_timeout() {
    let config = ServerLifecycleConfig::builder()
        .address("127.0.0.1:0")
        .read_timeout(Duration::from_millis(100))
        .build();
    let (lifecycle, runner, addr) = launch(config, users_router()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let closed = tokio::time::timeout(Duration::from_secs(2), read_until_closed(&mut stream)).await;
    assert!(closed.is_ok(), "server kept a silent connection open");

    lifecycle.stop();
    assert!(runner.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_idle_keep_alive_connection_is_closed() {
    let config = ServerLifecycleConfig::builder()
        .address("127.0.0.1:0")
        .idle_timeout(Duration::from_millis(100))
        .build();
    let (lifecycle, runner, addr) = launch(config, users_router()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /users HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n")
        .await
        .unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), read_until_closed(&mut stream))
        .await
        .expect("server kept an idle connection open");
    let text = String::from_utf8_lossy(&received);
    assert!(text.starts_with("HTTP/1.1 200 OK"), "unexpected response: {text}");

    lifecycle.stop();
    assert!(runner.await.unwrap().is_ok());
}
