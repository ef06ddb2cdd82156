// Copyright (c) 2024 Botho Foundation
//
//! Chain Reader Integration Tests
//!
//! Runs `JsonRpcChainReader` against a mock JSON-RPC node served by hyper.

use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use http_body_util::{BodyExt, Full};
use hyper::{
    body::{Bytes, Incoming},
    server::conn::http1,
    service::service_fn,
    Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use leaderboard::{
    chain::{balance_of_calldata, ChainError, ChainReader, JsonRpcChainReader},
    service::{LedgerError, LedgerService},
    store::MemoryScoreStore,
};

const CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
const HOLDER: &str = "0x52908400098527886e0f7030069857d2e4169ee7";

type Reply = Arc<dyn Fn(&Value) -> (StatusCode, String) + Send + Sync>;

/// Mock JSON-RPC node; records every request body it receives
struct MockNode {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl MockNode {
    async fn spawn(delay: Duration, reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let recorded = recorded.clone();
                let reply = reply.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let recorded = recorded.clone();
                        let reply = reply.clone();
                        async move {
                            let body = req.into_body().collect().await.unwrap().to_bytes();
                            let request: Value =
                                serde_json::from_slice(&body).unwrap_or(Value::Null);
                            recorded.lock().push(request.clone());

                            tokio::time::sleep(delay).await;

                            let (status, text) = reply(&request);
                            let mut response = Response::new(Full::new(Bytes::from(text)));
                            *response.status_mut() = status;
                            Ok::<_, Infallible>(response)
                        }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self { addr, requests }
    }

    /// Node answering every call with `result`
    async fn answering(result: Value) -> Self {
        Self::spawn(
            Duration::ZERO,
            Arc::new(move |request: &Value| {
                let body = json!({ "jsonrpc": "2.0", "id": request["id"], "result": result });
                (StatusCode::OK, body.to_string())
            }),
        )
        .await
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn reader(&self, timeout: Duration) -> JsonRpcChainReader {
        JsonRpcChainReader::new(&self.url(), timeout).unwrap()
    }

    fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[tokio::test]
async fn test_balance_of_round_trip() {
    let node = MockNode::answering(json!(
        "0x0000000000000000000000000000000000000000000000000000000000000003"
    ))
    .await;
    let reader = node.reader(Duration::from_secs(5));

    let balance = reader.token_balance(CONTRACT, HOLDER).await.unwrap();
    assert_eq!(balance, 3);

    let requests = node.requests.lock();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request["jsonrpc"], "2.0");
    assert_eq!(request["method"], "eth_call");
    assert_eq!(request["params"][0]["to"], CONTRACT);
    assert_eq!(request["params"][0]["data"], balance_of_calldata(HOLDER).unwrap());
    assert_eq!(request["params"][1], "latest");
}

#[tokio::test]
async fn test_rpc_error_object_is_rejected() {
    let node = MockNode::spawn(
        Duration::ZERO,
        Arc::new(|request: &Value| {
            let body = json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": { "code": -32000, "message": "execution reverted" }
            });
            (StatusCode::OK, body.to_string())
        }),
    )
    .await;

    let err = node
        .reader(Duration::from_secs(5))
        .token_balance(CONTRACT, HOLDER)
        .await
        .unwrap_err();

    match err {
        ChainError::Rejected(msg) => assert!(msg.contains("execution reverted"), "{}", msg),
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unusable_results_are_rejected() {
    for result in [json!("0x"), json!("0xzz"), json!(42), json!("0x1ffffffffffffffff")] {
        let node = MockNode::answering(result.clone()).await;
        let err = node
            .reader(Duration::from_secs(5))
            .token_balance(CONTRACT, HOLDER)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Rejected(_)), "result {}: {:?}", result, err);
    }
}

#[tokio::test]
async fn test_http_failures_are_unavailable() {
    let replies: [Reply; 2] = [
        Arc::new(|_: &Value| (StatusCode::SERVICE_UNAVAILABLE, "busy".to_string())),
        Arc::new(|_: &Value| (StatusCode::OK, "<html>not json</html>".to_string())),
    ];

    for reply in replies {
        let node = MockNode::spawn(Duration::ZERO, reply).await;
        let err = node
            .reader(Duration::from_secs(5))
            .token_balance(CONTRACT, HOLDER)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Unavailable(_)), "{:?}", err);
        assert!(err.is_retryable());
    }
}

#[tokio::test]
async fn test_connection_refused_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let reader = JsonRpcChainReader::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let err = reader.token_balance(CONTRACT, HOLDER).await.unwrap_err();
    assert!(matches!(err, ChainError::Unavailable(_)), "{:?}", err);
}

#[tokio::test]
async fn test_slow_node_times_out() {
    let node = MockNode::spawn(
        Duration::from_secs(5),
        Arc::new(|request: &Value| {
            let body = json!({ "jsonrpc": "2.0", "id": request["id"], "result": "0x1" });
            (StatusCode::OK, body.to_string())
        }),
    )
    .await;

    let err = node
        .reader(Duration::from_millis(200))
        .token_balance(CONTRACT, HOLDER)
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::Unavailable(_)), "{:?}", err);
}

#[tokio::test]
async fn test_bad_holder_never_reaches_node() {
    let node = MockNode::answering(json!("0x1")).await;
    let reader = node.reader(Duration::from_secs(5));

    for holder in ["", "mario", "0x1234", "0xzz908400098527886e0f7030069857d2e4169ee7"] {
        let err = reader.token_balance(CONTRACT, holder).await.unwrap_err();
        assert!(matches!(err, ChainError::Rejected(_)), "holder {:?}: {:?}", holder, err);
    }
    assert_eq!(node.request_count(), 0);
}

#[tokio::test]
async fn test_service_ownership_through_json_rpc() {
    let node = MockNode::answering(json!("0x02")).await;
    let service = LedgerService::new(
        Arc::new(MemoryScoreStore::new()),
        Arc::new(node.reader(Duration::from_secs(5))),
        CONTRACT,
        Duration::from_secs(5),
    );

    assert_eq!(service.check_ownership(HOLDER).await.unwrap(), 2);
    assert_eq!(node.request_count(), 1);

    let err = service.check_ownership("not-an-address").await.unwrap_err();
    assert!(matches!(err, LedgerError::ChainQueryRejected(_)), "{:?}", err);
    assert_eq!(node.request_count(), 1);
}
