use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use payments::{PaymentError, PaymentIntent, PaymentProcessor};
use site_api::{PricePoint, PriceRange};
use topic_api_server::AppState;
use topic_engine::{BoxFuture, DurableLog, Topic};

struct FakeProcessor;

impl PaymentProcessor for FakeProcessor {
    fn create_intent(&self, amount: i64) -> BoxFuture<'_, Result<PaymentIntent, PaymentError>> {
        Box::pin(async move {
            Ok(PaymentIntent {
                client_secret: format!("secret_{amount}"),
                amount,
            })
        })
    }
}

struct TestServer {
    _dir: tempfile::TempDir,
    addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
}

impl TestServer {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let videos = Topic::new(
            "videos",
            DurableLog::new(dir.path().join("videoSubmissions.json")),
            64,
        );
        let state = AppState {
            videos: Arc::new(videos),
            rsvps: Arc::new(DurableLog::new(dir.path().join("data.json"))),
            // Window long over: the price sits at the end anchor.
            price_range: PriceRange::linear(
                PricePoint { time: 0, price: 1500 },
                PricePoint { time: 1, price: 4000 },
            ),
            payment_client_key: "pk_test".into(),
            payments: Arc::new(FakeProcessor),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        tokio::spawn(topic_api_server::serve(listener, state.clone(), shutdown.clone()));

        Self {
            _dir: dir,
            addr,
            state,
            shutdown,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn submit(&self, text: &str) -> reqwest::StatusCode {
        reqwest::Client::new()
            .post(self.url("/submitVideo"))
            .form(&[("text", text)])
            .send()
            .await
            .unwrap()
            .status()
    }

    async fn wait_for_subscribers(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.state.videos.subscriber_count() != n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscriber count not reached");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.state.videos.close();
        self.shutdown.cancel();
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn next_record(ws: &mut WsStream) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for ws message")
            .expect("ws stream ended")
            .unwrap();
        if let Message::Text(_) = msg {
            return serde_json::from_str(msg.to_text().unwrap()).unwrap();
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn history_then_live_over_websocket() {
    let server = TestServer::start().await;

    assert_eq!(server.submit("first").await, reqwest::StatusCode::OK);

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/videoSubmissions", server.addr))
        .await
        .unwrap();
    assert_eq!(next_record(&mut ws).await["text"], "first");
    server.wait_for_subscribers(1).await;

    assert_eq!(server.submit("second").await, reqwest::StatusCode::OK);
    let live = next_record(&mut ws).await;
    assert_eq!(live["text"], "second");
    assert!(live["timestamp"].is_string());

    ws.close(None).await.unwrap();
    server.wait_for_subscribers(0).await;
}

#[tokio::test]
async fn oversized_submission_is_rejected_and_not_logged() {
    let server = TestServer::start().await;

    assert_eq!(server.submit(&"a".repeat(1024)).await, reqwest::StatusCode::OK);
    assert_eq!(
        server.submit(&"a".repeat(1025)).await,
        reqwest::StatusCode::PAYLOAD_TOO_LARGE
    );

    let records = server.state.videos.log().dump_all().await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn submit_requires_post() {
    let server = TestServer::start().await;

    let resp = reqwest::get(server.url("/submitVideo")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn register_persists_rsvp() {
    let server = TestServer::start().await;

    let resp = reqwest::Client::new()
        .post(server.url("/register"))
        .form(&[("email", "guest@example.com"), ("paymentIntent", "pi_42")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    let rsvps = server.state.rsvps.dump_all().await.unwrap();
    assert_eq!(rsvps.len(), 1);
    assert_eq!(rsvps[0]["email"], "guest@example.com");
    assert_eq!(rsvps[0]["paymentIntent"], "pi_42");
    assert!(rsvps[0]["ip"].as_str().unwrap().starts_with("127.0.0.1:"));
}

#[tokio::test]
async fn payment_endpoints_price_server_side() {
    let server = TestServer::start().await;

    let deets = reqwest::get(server.url("/pay/deets")).await.unwrap();
    assert_eq!(
        deets.headers()["cache-control"],
        "no-cache, no-store, must-revalidate"
    );
    let deets: serde_json::Value = deets.json().await.unwrap();
    assert_eq!(deets["stripeKey"], "pk_test");
    assert_eq!(deets["priceRange"]["start"]["price"], 1500);
    assert_eq!(deets["priceRange"]["end"]["price"], 4000);

    let created: serde_json::Value = reqwest::Client::new()
        .post(server.url("/pay/new"))
        .form(&[("amount", "1")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["price"], 4000);
    assert_eq!(created["client_secret"], "secret_4000");
}
