//! End-to-end tests against a running stub server.

use mocktail_stub_server::{HttpStubServer, ServerError, StubError, StubRegistry, StubServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

const BODY: &str = "{\n\"asdf\" : \"adsfasd\"\n}\n";

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

struct TestServer {
    server: HttpStubServer,
    addr: SocketAddr,
    client: reqwest::Client,
}

impl TestServer {
    async fn start(fixtures: &[&str]) -> Self {
        let registry = StubRegistry::new().with_default_delay(Duration::ZERO);
        let server = HttpStubServer::new(Arc::new(registry));
        for name in fixtures {
            server.enable_stub(&fixture(name)).await.unwrap();
        }
        let addr = server.start("127.0.0.1:0".parse().unwrap()).await.unwrap();
        Self {
            server,
            addr,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }

    async fn get(&self, path_and_query: &str) -> reqwest::Response {
        self.client.get(self.url(path_and_query)).send().await.unwrap()
    }

    async fn post(&self, path_and_query: &str) -> reqwest::Response {
        self.client.post(self.url(path_and_query)).send().await.unwrap()
    }
}

#[tokio::test]
async fn test_no_stubs_not_implemented() {
    let server = TestServer::start(&[]).await;

    let response = server.get("/test/path/expres").await;
    assert_eq!(response.status().as_u16(), 501);
    assert!(response.text().await.unwrap().is_empty());

    server.server.stop().await;
}

#[tokio::test]
async fn test_enable_stub_get() {
    let server = TestServer::start(&["test.tail"]).await;

    let response = server.get("/test/path/expres?unrelated=1").await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.text().await.unwrap(), BODY);

    assert_eq!(server.post("/test/path/expres").await.status().as_u16(), 501);
    assert_eq!(server.get("/test/path/expres1").await.status().as_u16(), 501);
}

#[tokio::test]
async fn test_enable_stub_query_string() {
    let server = TestServer::start(&["query_test.tail"]).await;

    let response = server
        .get("/test/path/expres?asdf=asdf&something=wedontcareabout")
        .await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), BODY);

    assert_eq!(server.get("/test/path/expres?asdf=qwer").await.status().as_u16(), 501);
    assert_eq!(server.get("/test/path/expres").await.status().as_u16(), 501);
}

#[tokio::test]
async fn test_enable_stub_regex() {
    let server = TestServer::start(&["regex_test.tail", "query_regex_test.tail"]).await;

    assert_eq!(
        server.get("/test/asdfasdfasfdafa/expres").await.status().as_u16(),
        200
    );
    assert_eq!(server.get("/test1/path/expres").await.status().as_u16(), 501);

    server.server.disable_stub(&fixture("regex_test.tail")).await.unwrap();

    assert_eq!(server.get("/test/adf/expres?asdf=asdf").await.status().as_u16(), 200);
    assert_eq!(server.get("/test/adf/expres?qwer=qwer").await.status().as_u16(), 501);
}

#[tokio::test]
async fn test_disable_stub_for_single_method() {
    let server = TestServer::start(&["test.tail", "post_test.tail"]).await;

    assert_eq!(server.get("/test/path/expres").await.status().as_u16(), 200);
    assert_eq!(server.post("/test/path/expres").await.status().as_u16(), 201);

    server.server.disable_stub(&fixture("test.tail")).await.unwrap();

    assert_eq!(server.get("/test/path/expres").await.status().as_u16(), 501);
    assert_eq!(server.post("/test/path/expres").await.status().as_u16(), 201);
}

#[tokio::test]
async fn test_state_transition_between_requests() {
    let server =
        TestServer::start(&["stubs_headers_test.tail", "stubs_set_headers_test.tail"]).await;

    assert_eq!(server.get("/test/path/expres").await.status().as_u16(), 501);

    let response = server.post("/test/state").await;
    assert_eq!(response.status().as_u16(), 200);
    assert!(response.headers().get("stub-set").is_none());

    let response = server.get("/test/path/expres").await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert!(response.headers().get("stub-only-if").is_none());
    assert!(response.headers().get("stub-set").is_none());
    assert_eq!(response.text().await.unwrap(), BODY);

    let state = server.server.registry().state().snapshot();
    assert_eq!(state["variable1"], "value1");
    assert_eq!(state["variable2"], "value2");
    assert_eq!(state["variable3"], "value3");
}

#[tokio::test]
async fn test_invalid_stub_file_rejected() {
    let server = TestServer::start(&["test.tail"]).await;

    let err = server
        .server
        .enable_stub(&fixture("invalid_regex.tail"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServerError::Stub(StubError::InvalidStubDefinition { .. })
    ));

    assert_eq!(server.get("/test/path/expres").await.status().as_u16(), 200);
}

#[tokio::test]
async fn test_delayed_body_does_not_block_other_requests() {
    let server = Arc::new(TestServer::start(&["delay_test.tail", "test.tail"]).await);

    let started = Instant::now();
    let slow = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            let response = server.get("/test/delayed").await;
            let headers_after = started.elapsed();
            let body = response.text().await.unwrap();
            (headers_after, started.elapsed(), body)
        })
    };

    // Give the slow request time to reach the server.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = server.get("/test/path/expres").await;
    assert_eq!(response.text().await.unwrap(), BODY);
    assert!(started.elapsed() < Duration::from_millis(900));

    let (headers_after, body_after, body) = slow.await.unwrap();
    assert!(headers_after < Duration::from_millis(900));
    assert!(body_after >= Duration::from_secs(1));
    assert_eq!(body, "slow\n");
}
