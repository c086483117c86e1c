//! Integration tests for `PagedFetcher` against a `wiremock` catalog.
//!
//! Every policy here uses a zero backoff base so 429 retries never sleep.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use traysync_catalog::{
    AbortReason, CatalogError, EndReason, FetchOutcome, FetchReport, FetchStep,
    PagedFetcher, RateWindow, RetryPolicy, TrayClient,
};

fn test_client(server: &MockServer) -> TrayClient {
    TrayClient::new(&server.uri(), "test-token", 5, "traysync-test/0.1", Vec::new())
        .expect("failed to build test TrayClient")
}

fn no_sleep_policy() -> RetryPolicy {
    RetryPolicy::new(5, 0, 0)
}

fn product(variant_id: i64, locations: usize) -> Value {
    let estoque: Vec<Value> = (0..locations)
        .map(|i| {
            json!({
                "centroDistribuicaoId": i + 1,
                "estoqueFisico": 5,
                "estoqueReservado": 0,
                "alertaEstoque": 1
            })
        })
        .collect();
    json!({
        "produtoVarianteId": variant_id,
        "produtoId": variant_id,
        "idPaiExterno": null,
        "sku": format!("SKU-{variant_id}"),
        "nome": "Produto",
        "estoque": estoque,
        "dataCriacao": "2024-01-01",
        "dataAtualizacao": "2024-01-01",
        "parentId": null
    })
}

fn page_mock(page: &str) -> wiremock::MockBuilder {
    Mock::given(method("GET"))
        .and(path("/produtos"))
        .and(query_param("pagina", page))
}

/// Pulls every page and returns the page numbers seen plus the final report.
async fn drain(fetcher: &mut PagedFetcher<'_>) -> Result<(Vec<u32>, FetchReport), CatalogError> {
    let mut pages = Vec::new();
    loop {
        match fetcher.next_page().await? {
            FetchStep::Page(page) => pages.push(page.number),
            FetchStep::Finished(report) => return Ok((pages, report)),
        }
    }
}

#[tokio::test]
async fn walks_pages_until_empty_array() {
    let server = MockServer::start().await;
    page_mock("1")
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([product(1, 1), product(2, 2)])),
        )
        .expect(1)
        .mount(&server)
        .await;
    page_mock("2")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([product(3, 1)])))
        .expect(1)
        .mount(&server)
        .await;
    page_mock("3")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut fetcher = PagedFetcher::new(&client, RateWindow::default(), no_sleep_policy());
    let (pages, report) = drain(&mut fetcher).await.expect("fetch should succeed");

    assert_eq!(pages, vec![1, 2]);
    assert_eq!(report.pages, 2);
    assert_eq!(report.rate_limit_retries, 0);
    assert_eq!(report.outcome, FetchOutcome::Done(EndReason::EmptyPage));
}

#[tokio::test]
async fn not_found_ends_pagination() {
    let server = MockServer::start().await;
    page_mock("1")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([product(1, 1)])))
        .mount(&server)
        .await;
    page_mock("2")
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut fetcher = PagedFetcher::new(&client, RateWindow::default(), no_sleep_policy());
    let (_, report) = drain(&mut fetcher).await.expect("fetch should succeed");

    assert_eq!(report.pages, 1);
    assert_eq!(report.outcome, FetchOutcome::Done(EndReason::NotFound));
}

#[tokio::test]
async fn rate_limited_page_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    page_mock("1")
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    page_mock("1")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([product(1, 1)])))
        .expect(1)
        .mount(&server)
        .await;
    page_mock("2")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut fetcher = PagedFetcher::new(&client, RateWindow::default(), no_sleep_policy());

    match fetcher.next_page().await {
        Ok(FetchStep::Page(page)) => {
            assert_eq!(page.number, 1);
            assert_eq!(page.retries, 3);
            assert_eq!(page.records.len(), 1);
        }
        other => panic!("expected page 1, got: {other:?}"),
    }

    let (_, report) = drain(&mut fetcher).await.expect("fetch should succeed");
    assert_eq!(report.pages, 1);
    assert_eq!(report.rate_limit_retries, 3);
    assert_eq!(report.outcome, FetchOutcome::Done(EndReason::EmptyPage));
}

#[tokio::test]
async fn retry_counter_resets_between_pages() {
    let server = MockServer::start().await;
    page_mock("1")
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    page_mock("1")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([product(1, 1)])))
        .mount(&server)
        .await;
    page_mock("2")
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    page_mock("2")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([product(2, 1)])))
        .mount(&server)
        .await;
    page_mock("3")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    // Three retries per page would not cover four consecutive 429s on a
    // single page, so this only passes if the counter resets after page 1.
    let client = test_client(&server);
    let mut fetcher = PagedFetcher::new(&client, RateWindow::default(), RetryPolicy::new(3, 0, 0));
    let (pages, report) = drain(&mut fetcher).await.expect("fetch should succeed");

    assert_eq!(pages, vec![1, 2]);
    assert_eq!(report.rate_limit_retries, 4);
    assert_eq!(report.outcome, FetchOutcome::Done(EndReason::EmptyPage));
}

#[tokio::test]
async fn rate_limit_exhaustion_aborts() {
    let server = MockServer::start().await;
    page_mock("1")
        .respond_with(ResponseTemplate::new(429))
        .expect(6)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut fetcher = PagedFetcher::new(&client, RateWindow::default(), no_sleep_policy());
    let (pages, report) = drain(&mut fetcher).await.expect("abort is not an error");

    assert!(pages.is_empty());
    assert_eq!(report.pages, 0);
    assert_eq!(report.rate_limit_retries, 5);
    assert_eq!(
        report.outcome,
        FetchOutcome::Aborted(AbortReason::RateLimitExhausted { retries: 5 })
    );
    assert!(!report.outcome.is_complete());
}

#[tokio::test]
async fn service_unavailable_aborts_without_retry() {
    let server = MockServer::start().await;
    page_mock("1")
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut fetcher = PagedFetcher::new(&client, RateWindow::default(), no_sleep_policy());
    let (_, report) = drain(&mut fetcher).await.expect("abort is not an error");

    assert_eq!(report.rate_limit_retries, 0);
    assert_eq!(
        report.outcome,
        FetchOutcome::Aborted(AbortReason::ServiceUnavailable)
    );
}

#[tokio::test]
async fn malformed_body_aborts() {
    let server = MockServer::start().await;
    page_mock("1")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"produtos": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut fetcher = PagedFetcher::new(&client, RateWindow::default(), no_sleep_policy());
    let (pages, report) = drain(&mut fetcher).await.expect("abort is not an error");

    assert!(pages.is_empty());
    assert_eq!(
        report.outcome,
        FetchOutcome::Aborted(AbortReason::MalformedResponse)
    );
}

#[tokio::test]
async fn unexpected_status_is_fatal_and_reported_once() {
    let server = MockServer::start().await;
    page_mock("1")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([product(1, 1)])))
        .mount(&server)
        .await;
    page_mock("2")
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut fetcher = PagedFetcher::new(&client, RateWindow::default(), no_sleep_policy());

    assert!(matches!(fetcher.next_page().await, Ok(FetchStep::Page(_))));
    let err = fetcher.next_page().await.expect_err("500 should be fatal");
    assert!(
        matches!(err, CatalogError::UnexpectedStatus { status: 500, .. }),
        "{err:?}"
    );
    match fetcher.next_page().await {
        Ok(FetchStep::Finished(report)) => {
            assert_eq!(report.pages, 1);
            assert_eq!(
                report.outcome,
                FetchOutcome::Aborted(AbortReason::TransportFailure)
            );
        }
        other => panic!("expected Finished after a fatal error, got: {other:?}"),
    }
}

#[tokio::test]
async fn finished_fetcher_makes_no_more_requests() {
    let server = MockServer::start().await;
    page_mock("1")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let mut fetcher = PagedFetcher::new(&client, RateWindow::default(), no_sleep_policy());
    let (_, first) = drain(&mut fetcher).await.expect("fetch should succeed");
    let (_, second) = drain(&mut fetcher).await.expect("fetch should succeed");

    assert_eq!(first, second);
    assert_eq!(first.pages, 0);
}

#[tokio::test]
async fn spent_budget_pauses_until_next_window() {
    let server = MockServer::start().await;
    page_mock("1")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([product(1, 1)])))
        .mount(&server)
        .await;
    page_mock("2")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let window = Duration::from_millis(200);
    let mut fetcher = PagedFetcher::new(&client, RateWindow::new(1, window), no_sleep_policy());

    let started = std::time::Instant::now();
    let (pages, report) = drain(&mut fetcher).await.expect("fetch should succeed");

    assert_eq!(pages, vec![1]);
    assert_eq!(report.outcome, FetchOutcome::Done(EndReason::EmptyPage));
    assert!(
        started.elapsed() >= Duration::from_millis(150),
        "second request should wait for a fresh window, took {:?}",
        started.elapsed()
    );
}
