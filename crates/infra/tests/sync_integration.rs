//! End-to-end sync tests: HTTP source (wiremock) through the orchestrator
//! into the SQLite canonical store, then reconciliation on top.

use std::sync::Arc;

use revline_core::store::ports::{BudgetStore, InvoiceStore, JobStore};
use revline_core::sync::collector::SourceCollectorConfig;
use revline_core::{ReconciliationService, SyncService, SyncServiceConfig};
use revline_domain::{EntityKind, JobFilter};
use revline_infra::database::{
    DbManager, SqliteBudgetStore, SqliteEstimateStore, SqliteFieldStore, SqliteInvoiceStore,
    SqliteJobStore,
};
use revline_infra::source::{HttpSourceClient, SourceClientConfig};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    jobs: Arc<SqliteJobStore>,
    budgets: Arc<SqliteBudgetStore>,
    estimates: Arc<SqliteEstimateStore>,
    invoices: Arc<SqliteInvoiceStore>,
    fields: Arc<SqliteFieldStore>,
    service: SyncService,
    _temp: TempDir,
}

fn harness(server: &MockServer, page_limit: usize) -> Harness {
    let temp = TempDir::new().unwrap();
    let manager = DbManager::new(temp.path().join("test.db"), 4).unwrap();
    manager.run_migrations().unwrap();
    let pool = manager.pool();

    let jobs = Arc::new(SqliteJobStore::new(pool.clone()));
    let budgets = Arc::new(SqliteBudgetStore::new(pool.clone()));
    let estimates = Arc::new(SqliteEstimateStore::new(pool.clone()));
    let invoices = Arc::new(SqliteInvoiceStore::new(pool.clone()));
    let fields = Arc::new(SqliteFieldStore::new(pool));

    let source = HttpSourceClient::new(SourceClientConfig {
        base_url: server.uri(),
        api_token: "test-token".to_string(),
        ..SourceClientConfig::default()
    })
    .unwrap();

    let service = SyncService::new(
        Arc::new(source),
        jobs.clone(),
        budgets.clone(),
        estimates.clone(),
        invoices.clone(),
        SyncServiceConfig {
            collector: SourceCollectorConfig { page_limit, max_records: 1000 },
            fetch_concurrency: 4,
        },
    );

    Harness { jobs, budgets, estimates, invoices, fields, service, _temp: temp }
}

async fn mount_collection(server: &MockServer, kind: &str, records: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/{kind}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": records })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_pass_lands_in_sqlite_and_reconciles() {
    let server = MockServer::start().await;

    mount_collection(
        &server,
        "budgets",
        json!([{
            "id": "b-1", "number": "1042", "revenue": 1000.0,
            "sales_rep_name": "Dana Cole", "date_updated": 1_735_800_000i64,
            "related": [{"type": "job", "id": "j-1"}]
        }]),
    )
    .await;
    mount_collection(
        &server,
        "estimates",
        json!([{
            "id": "e-1", "total": 950.0, "status_name": "Approved",
            "related": [{"type": "job", "id": "j-1"}]
        }]),
    )
    .await;
    mount_collection(
        &server,
        "invoices",
        json!([
            {
                "id": "i-1", "total": 600.0, "status_name": "Paid",
                "related": [{"type": "job", "id": "j-1"}]
            },
            {
                "id": "i-2", "total": 500.0, "status_name": "Open",
                "items": [
                    {"name": "Roofing labor", "amount": 450.0},
                    {"name": "Permit fee", "amount": 50.0}
                ],
                "related": [{"type": "job", "id": "j-1"}]
            }
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/jobs/j-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "j-1", "name": "Maple St Roof", "status_name": "Signed Contract",
            "total": 0.0, "sales_rep_name": "Dana Cole",
            "date_created": 1_735_700_000i64, "date_updated": 1_735_800_000i64
        })))
        .mount(&server)
        .await;

    let h = harness(&server, 100);
    let report = h.service.run().await.unwrap();

    assert_eq!(report.budgets, 1);
    assert_eq!(report.estimates, 1);
    assert_eq!(report.invoices, 2);
    assert_eq!(report.jobs_fetched, 1);
    assert_eq!(report.jobs_skipped, 0);
    assert!(report.degraded_kinds.is_empty());

    // Links resolved at ingestion, fee line items summed.
    let budget = h.budgets.get("b-1").await.unwrap().unwrap();
    assert_eq!(budget.job_external_id.as_deref(), Some("j-1"));
    let invoice = h.invoices.get("i-2").await.unwrap().unwrap();
    assert!((invoice.fees - 50.0).abs() < f64::EPSILON);

    // Job total backfilled from the best child value.
    let job = h.jobs.get_by_external_id("j-1").await.unwrap().unwrap();
    assert!((job.total - 1000.0).abs() < f64::EPSILON);
    assert_eq!(report.totals_backfilled, 1);

    // Reconciliation over the synced store: invoices 1100, fees 50, net
    // 1050, off by 50 from the budget.
    let reconciler = ReconciliationService::new(
        h.jobs.clone(),
        h.budgets.clone(),
        h.estimates.clone(),
        h.invoices.clone(),
        h.fields.clone(),
    );
    let flagged = reconciler.discrepancies().await.unwrap();
    assert_eq!(flagged.len(), 1);
    assert!((flagged[0].adjusted_invoice_revenue - 1050.0).abs() < f64::EPSILON);
    assert!((flagged[0].discrepancy + 50.0).abs() < f64::EPSILON);

    let financials = reconciler.job_financials("j-1").await.unwrap();
    assert!((financials.total_invoiced - 1100.0).abs() < f64::EPSILON);
    assert!((financials.total_project - 1050.0).abs() < f64::EPSILON);

    let report = reconciler.sales_by_rep(2025).await.unwrap();
    assert_eq!(report.sales_count, 1);
    assert_eq!(report.by_rep[0].name, "Dana Cole");
}

#[tokio::test]
async fn stalled_pagination_is_surfaced_not_hidden() {
    let server = MockServer::start().await;

    // The budgets endpoint ignores `skip` entirely: every request returns
    // the same full page.
    Mock::given(method("GET"))
        .and(path("/budgets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "b-1", "revenue": 10.0},
                {"id": "b-2", "revenue": 20.0}
            ]
        })))
        .mount(&server)
        .await;
    mount_collection(&server, "estimates", json!([])).await;
    mount_collection(&server, "invoices", json!([])).await;

    let h = harness(&server, 2);
    let report = h.service.run().await.unwrap();

    assert_eq!(report.budgets, 2);
    assert_eq!(report.degraded_kinds, vec![EntityKind::Budget]);
}

#[tokio::test]
async fn missing_job_detail_is_skipped_not_fatal() {
    let server = MockServer::start().await;

    mount_collection(
        &server,
        "budgets",
        json!([
            {"id": "b-1", "revenue": 10.0, "related": [{"type": "job", "id": "j-present"}]},
            {"id": "b-2", "revenue": 20.0, "related": [{"type": "job", "id": "j-missing"}]}
        ]),
    )
    .await;
    mount_collection(&server, "estimates", json!([])).await;
    mount_collection(&server, "invoices", json!([])).await;
    Mock::given(method("GET"))
        .and(path("/jobs/j-present"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "j-present", "total": 5.0})),
        )
        .mount(&server)
        .await;
    // j-missing: no mock, wiremock answers 404.

    let h = harness(&server, 100);
    let report = h.service.run().await.unwrap();

    assert_eq!(report.jobs_fetched, 1);
    assert_eq!(report.jobs_skipped, 1);
    assert!(h.jobs.get_by_external_id("j-present").await.unwrap().is_some());
    assert!(h.jobs.get_by_external_id("j-missing").await.unwrap().is_none());
}

#[tokio::test]
async fn unreachable_source_aborts_and_keeps_last_known_good_state() {
    let server = MockServer::start().await;

    // Seed a previous pass.
    mount_collection(&server, "budgets", json!([{"id": "b-1", "revenue": 10.0}])).await;
    mount_collection(&server, "estimates", json!([])).await;
    mount_collection(&server, "invoices", json!([])).await;

    let h = harness(&server, 100);
    h.service.run().await.unwrap();
    assert_eq!(h.budgets.all().await.unwrap().len(), 1);

    // The source goes down entirely.
    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = h.service.run().await;
    assert!(result.is_err());

    // Store still holds the previous pass.
    assert_eq!(h.budgets.all().await.unwrap().len(), 1);
    let _ = h.jobs.list(&JobFilter::default()).await.unwrap();
}

#[tokio::test]
async fn pagination_advances_by_returned_page_length() {
    let server = MockServer::start().await;

    // Two pages: after a full first page the next request must come in at
    // skip=3, and the short second page ends the loop.
    Mock::given(method("GET"))
        .and(path("/budgets"))
        .and(query_param("skip", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "b-1", "revenue": 1.0},
                {"id": "b-2", "revenue": 2.0},
                {"id": "b-3", "revenue": 3.0}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/budgets"))
        .and(query_param("skip", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "b-4", "revenue": 4.0}]
        })))
        .mount(&server)
        .await;
    mount_collection(&server, "estimates", json!([])).await;
    mount_collection(&server, "invoices", json!([])).await;

    let h = harness(&server, 3);
    let report = h.service.run().await.unwrap();

    assert_eq!(report.budgets, 4);
    assert!(report.degraded_kinds.is_empty());
}
