use std::sync::Arc;
use std::time::Duration;

use pollbridge_api::app::{self, AppConfig, PendingStatus};
use pollbridge_api::catalog::Catalog;
use pollbridge_core::PollConfig;
use reqwest::StatusCode;
use serde_json::Value;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(lookup_delay: Duration, pending_status: PendingStatus) -> Self {
        let poll = PollConfig::default()
            .with_wait_bounds(100, 5_000)
            .with_poll_interval(Duration::from_millis(10));
        let config = AppConfig::default().with_poll(poll).with_pending_status(pending_status);
        let catalog = Catalog::demo().with_delay(lookup_delay);
        let services = Arc::new(app::services::build_services(&config, catalog).unwrap());

        // Same router as prod, bound to an ephemeral port.
        let router = app::build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn product_url(&self, id: &str) -> String {
        format!("{}/api/catalog/products/{}", self.base_url, id)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn get(client: &reqwest::Client, url: &str, query: &[(&str, &str)]) -> reqwest::Response {
    client.get(url).query(query).send().await.unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn(Duration::ZERO, PendingStatus::Accepted).await;

    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn fast_lookup_answers_on_kickoff() {
    let srv = TestServer::spawn(Duration::from_millis(50), PendingStatus::Accepted).await;
    let client = reqwest::Client::new();

    let res = get(&client, &srv.product_url("keyboard"), &[("waitMs", "2000")]).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("x-job-id").is_none());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["id"], "keyboard");
    assert_eq!(body["price_cents"], 14_999);
}

#[tokio::test]
async fn slow_lookup_hands_out_job_then_delivers_once() {
    let srv = TestServer::spawn(Duration::from_millis(400), PendingStatus::Accepted).await;
    let client = reqwest::Client::new();

    let res = get(&client, &srv.product_url("mouse"), &[("waitMs", "0")]).await;
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "pending");
    let job_id = body["jobId"].as_str().unwrap().to_string();

    let res = get(&client, &srv.product_url("mouse"), &[("job", job_id.as_str()), ("waitMs", "0")]).await;
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    let res = get(&client, &srv.product_url("mouse"), &[("job", job_id.as_str()), ("waitMs", "3000")]).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["name"], "Wireless Mouse");

    // Delivered once; the job is gone afterwards.
    let res = get(&client, &srv.product_url("mouse"), &[("job", job_id.as_str()), ("waitMs", "0")]).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "application/problem+json"
    );
    let problem: Value = res.json().await.unwrap();
    assert_eq!(problem["status"], 404);
}

#[tokio::test]
async fn unknown_job_is_not_found_without_waiting() {
    let srv = TestServer::spawn(Duration::ZERO, PendingStatus::Accepted).await;
    let client = reqwest::Client::new();
    let started = std::time::Instant::now();

    let res = get(&client, &srv.product_url("dock"), &[("job", "nonexistent"), ("waitMs", "4000")]).await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(started.elapsed() < Duration::from_secs(2));
    let problem: Value = res.json().await.unwrap();
    assert!(problem["detail"].as_str().unwrap().contains("nonexistent"));
}

#[tokio::test]
async fn missing_product_is_not_found() {
    let srv = TestServer::spawn(Duration::ZERO, PendingStatus::Accepted).await;
    let client = reqwest::Client::new();

    let res = get(&client, &srv.product_url("toaster"), &[("waitMs", "1000")]).await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let problem: Value = res.json().await.unwrap();
    assert_eq!(problem["detail"], "Unknown product toaster");
}

#[tokio::test]
async fn malformed_wait_falls_back_to_default() {
    let srv = TestServer::spawn(Duration::from_millis(1_500), PendingStatus::Accepted).await;
    let client = reqwest::Client::new();

    for wait in ["soon", ""] {
        let started = std::time::Instant::now();
        let res = get(&client, &srv.product_url("monitor"), &[("waitMs", wait)]).await;

        // Default wait is 100ms, far below the lookup delay.
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        assert!(started.elapsed() < Duration::from_millis(1_000));
    }
}

#[tokio::test]
async fn negative_wait_is_clamped_to_zero() {
    // The lookup outlasts a zero wait but not the 100ms default.
    let srv = TestServer::spawn(Duration::from_millis(50), PendingStatus::Accepted).await;
    let client = reqwest::Client::new();

    let res = get(&client, &srv.product_url("monitor"), &[("waitMs", "-20")]).await;
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    let res = get(&client, &srv.product_url("monitor"), &[]).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_job_id_is_not_found_and_starts_nothing() {
    let srv = TestServer::spawn(Duration::from_millis(300), PendingStatus::Accepted).await;
    let client = reqwest::Client::new();

    let res = get(&client, &srv.product_url("dock"), &[("job", "catalog.product:x"), ("waitMs", "0")]).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let stats: Value = client
        .get(format!("{}/api/stats", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["store"]["entries"], 0);
    assert_eq!(stats["runner"]["spawned"], 0);
}

#[tokio::test]
async fn no_content_mode_carries_job_id_in_header() {
    let srv = TestServer::spawn(Duration::from_millis(300), PendingStatus::NoContent).await;
    let client = reqwest::Client::new();

    let res = get(&client, &srv.product_url("dock"), &[("waitMs", "0")]).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let job_id = res
        .headers()
        .get("x-job-id")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();

    let res = get(&client, &srv.product_url("dock"), &[("job", job_id.as_str()), ("waitMs", "3000")]).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn stats_report_store_counters() {
    let srv = TestServer::spawn(Duration::from_millis(300), PendingStatus::Accepted).await;
    let client = reqwest::Client::new();

    let res = get(&client, &srv.product_url("keyboard"), &[("waitMs", "0")]).await;
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    let stats: Value = client
        .get(format!("{}/api/stats", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["store"]["pending"], 1);
    assert_eq!(stats["runner"]["spawned"], 1);
}
