//! Integration tests for the Firestore REST client and repositories,
//! backed by a mock HTTP server through the emulator code path.

use std::collections::HashMap;
use std::time::Duration;

use jboard_firestore::{
    FirestoreClient, FirestoreConfig, FirestoreError, JobRepository, RetryConfig, UserRepository,
};
use jboard_models::{ApplicationId, JobId, JobPosting};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BASE: &str = "/v1/projects/demo/databases/(default)/documents";

async fn client_for(server: &MockServer) -> FirestoreClient {
    let config = FirestoreConfig {
        project_id: "demo".to_string(),
        database_id: "(default)".to_string(),
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(1),
        retry: RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        },
        emulator_host: Some(server.uri()),
    };
    FirestoreClient::new(config).await.unwrap()
}

fn job_doc_json(job_id: &str, title: &str) -> serde_json::Value {
    json!({
        "name": format!("projects/demo/databases/(default)/documents/jobs/{job_id}"),
        "fields": {
            "job_id": {"stringValue": job_id},
            "title": {"stringValue": title},
            "posted_by": {"stringValue": "body-1"},
            "location": {"stringValue": "Leeds"},
            "applications": {"arrayValue": {"values": [
                {"mapValue": {"fields": {
                    "id": {"stringValue": "app-1"},
                    "worker": {"stringValue": "worker-1"},
                    "applied_at": {"timestampValue": "2026-01-11T12:00:00Z"},
                    "status": {"stringValue": "pending"}
                }}}
            ]}},
            "created_at": {"timestampValue": "2026-01-10T09:00:00Z"},
            "updated_at": {"timestampValue": "2026-01-11T12:00:00Z"}
        },
        "createTime": "2026-01-10T09:00:00.000001Z",
        "updateTime": "2026-01-11T12:00:00.000001Z"
    })
}

#[tokio::test]
async fn get_returns_versioned_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/jobs/job-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_doc_json("job-1", "Plumber")))
        .mount(&server)
        .await;

    let repo = JobRepository::new(client_for(&server).await);
    let versioned = repo
        .get(&JobId::from_string("job-1"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(versioned.job.title, "Plumber");
    assert_eq!(versioned.job.posted_by, "body-1");
    assert_eq!(versioned.job.details.get("location").unwrap(), "Leeds");
    assert_eq!(versioned.job.applications.len(), 1);
    assert_eq!(
        versioned.update_time.as_deref(),
        Some("2026-01-11T12:00:00.000001Z")
    );
}

#[tokio::test]
async fn get_missing_job_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/jobs/ghost")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "status": "NOT_FOUND"}
        })))
        .mount(&server)
        .await;

    let repo = JobRepository::new(client_for(&server).await);
    assert!(repo
        .get(&JobId::from_string("ghost"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn create_conflict_maps_to_already_exists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{BASE}/jobs")))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {"code": 409, "status": "ALREADY_EXISTS"}
        })))
        .mount(&server)
        .await;

    let repo = JobRepository::new(client_for(&server).await);
    let job = JobPosting::new("Roofer", "body-1", HashMap::new());
    let err = repo.create(&job).await.unwrap_err();
    assert!(matches!(err, FirestoreError::AlreadyExists(_)));
}

#[tokio::test]
async fn create_sends_document_with_explicit_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{BASE}/jobs")))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_doc_json("ignored", "Roofer")))
        .mount(&server)
        .await;

    let repo = JobRepository::new(client_for(&server).await);
    let mut details = HashMap::new();
    details.insert("salary".to_string(), json!(41000));
    let job = JobPosting::new("Roofer", "body-2", details);
    repo.create(&job).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].url.query().unwrap(),
        format!("documentId={}", job.id)
    );
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["fields"]["title"]["stringValue"], "Roofer");
    assert_eq!(body["fields"]["posted_by"]["stringValue"], "body-2");
    assert_eq!(body["fields"]["salary"]["integerValue"], "41000");
}

#[tokio::test]
async fn stale_update_time_fails_the_precondition() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{BASE}/jobs/job-1")))
        .respond_with(ResponseTemplate::new(412).set_body_json(json!({
            "error": {"code": 412, "status": "FAILED_PRECONDITION", "message": "stale"}
        })))
        .mount(&server)
        .await;

    let repo = JobRepository::new(client_for(&server).await);
    let mut job = JobPosting::new("Roofer", "body-1", HashMap::new());
    job.id = JobId::from_string("job-1");
    job.apply("worker-1").unwrap();

    let err = repo
        .commit_status_change(&job, Some("2026-01-11T12:00:00.000001Z"))
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed());
}

#[tokio::test]
async fn status_commit_masks_only_application_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{BASE}/jobs/job-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_doc_json("job-1", "Roofer")))
        .mount(&server)
        .await;

    let repo = JobRepository::new(client_for(&server).await);
    let mut job = JobPosting::new("Roofer", "body-1", HashMap::new());
    job.id = JobId::from_string("job-1");
    job.apply("worker-1").unwrap();
    repo.commit_status_change(&job, Some("2026-01-11T12:00:00.000001Z"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap();
    assert!(query.contains("updateMask.fieldPaths=applications"));
    assert!(query.contains("updateMask.fieldPaths=updated_at"));
    assert!(query.contains("currentDocument.updateTime="));

    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let fields = body["fields"].as_object().unwrap();
    assert_eq!(fields.len(), 2);
    assert!(fields.contains_key("applications"));
    assert!(fields.contains_key("updated_at"));
}

#[tokio::test]
async fn new_applications_commit_job_and_index_in_one_transaction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{BASE}:commit")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "writeResults": [{"updateTime": "t1"}, {"updateTime": "t1"}],
            "commitTime": "t1"
        })))
        .mount(&server)
        .await;

    let repo = JobRepository::new(client_for(&server).await);
    let mut job = JobPosting::new("Roofer", "body-1", HashMap::new());
    job.id = JobId::from_string("job-1");
    let app_id = job.apply("worker-9").unwrap();
    repo.commit_new_application(&job, &app_id, Some("2026-01-11T12:00:00.000001Z"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let writes = body["writes"].as_array().unwrap();
    assert_eq!(writes.len(), 2);

    let job_write = &writes[0];
    assert!(job_write["update"]["name"]
        .as_str()
        .unwrap()
        .ends_with("jobs/job-1"));
    assert_eq!(
        job_write["currentDocument"]["updateTime"],
        "2026-01-11T12:00:00.000001Z"
    );
    assert!(job_write["updateMask"]["fieldPaths"]
        .as_array()
        .unwrap()
        .contains(&json!("applications")));

    let index_write = &writes[1];
    assert!(index_write["update"]["name"]
        .as_str()
        .unwrap()
        .ends_with(&format!("application_index/{app_id}")));
    assert_eq!(index_write["currentDocument"]["exists"], false);
    assert_eq!(
        index_write["update"]["fields"]["job_id"]["stringValue"],
        "job-1"
    );
    assert_eq!(
        index_write["update"]["fields"]["worker"]["stringValue"],
        "worker-9"
    );
}

#[tokio::test]
async fn stale_base_version_fails_the_commit_as_a_precondition_conflict() {
    let server = MockServer::start().await;
    // The message on a failed updateTime precondition never spells out
    // "precondition"; the envelope status does.
    Mock::given(method("POST"))
        .and(path(format!("{BASE}:commit")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "the stored version (1700000000000001) does not match the required base version (1690000000000001)",
                "status": "FAILED_PRECONDITION"
            }
        })))
        .mount(&server)
        .await;

    let repo = JobRepository::new(client_for(&server).await);
    let mut job = JobPosting::new("Roofer", "body-1", HashMap::new());
    let app_id = job.apply("worker-9").unwrap();
    let err = repo
        .commit_new_application(&job, &app_id, Some("2026-01-11T12:00:00.000001Z"))
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed());
}

#[tokio::test]
async fn aborted_commit_is_a_precondition_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{BASE}:commit")))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {
                "code": 409,
                "message": "Aborted due to cross-transaction contention. This occurs when multiple transactions attempt to access the same data, requiring Firestore to abort at least one in order to enforce serializability.",
                "status": "ABORTED"
            }
        })))
        .mount(&server)
        .await;

    let repo = JobRepository::new(client_for(&server).await);
    let mut job = JobPosting::new("Roofer", "body-1", HashMap::new());
    let app_id = job.apply("worker-9").unwrap();
    let err = repo
        .commit_new_application(&job, &app_id, None)
        .await
        .unwrap_err();
    assert!(err.is_precondition_failed());
}

#[tokio::test]
async fn list_pages_through_the_collection() {
    let server = MockServer::start().await;
    // Token-bearing request first so it wins for the second page.
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/jobs")))
        .and(query_param("pageToken", "tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [job_doc_json("job-2", "Second")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/jobs")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [job_doc_json("job-1", "First")],
            "nextPageToken": "tok-2"
        })))
        .mount(&server)
        .await;

    let repo = JobRepository::new(client_for(&server).await);
    let jobs = repo.list().await.unwrap();
    assert_eq!(jobs.len(), 2);
    let titles: Vec<&str> = jobs.iter().map(|j| j.title.as_str()).collect();
    assert!(titles.contains(&"First"));
    assert!(titles.contains(&"Second"));
}

#[tokio::test]
async fn poster_query_filters_on_posted_by() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{BASE}:runQuery")))
        .and(body_partial_json(json!({
            "structuredQuery": {
                "from": [{"collectionId": "jobs"}],
                "where": {"fieldFilter": {
                    "field": {"fieldPath": "posted_by"},
                    "op": "EQUAL",
                    "value": {"stringValue": "body-1"}
                }}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"document": job_doc_json("job-1", "Mine"), "readTime": "t"},
            {"readTime": "t"}
        ])))
        .mount(&server)
        .await;

    let repo = JobRepository::new(client_for(&server).await);
    let jobs = repo.list_by_poster("body-1").await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].title, "Mine");
}

#[tokio::test]
async fn application_index_lookup_resolves_job_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/application_index/app-7")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/demo/databases/(default)/documents/application_index/app-7",
            "fields": {
                "application_id": {"stringValue": "app-7"},
                "job_id": {"stringValue": "job-3"},
                "worker": {"stringValue": "worker-2"},
                "created_at": {"timestampValue": "2026-01-11T12:00:00Z"}
            }
        })))
        .mount(&server)
        .await;

    let repo = JobRepository::new(client_for(&server).await);
    let entry = repo
        .find_application(&ApplicationId::from_string("app-7"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.job_id.as_str(), "job-3");
    assert_eq!(entry.worker, "worker-2");

    assert!(repo
        .find_application(&ApplicationId::from_string("unknown"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn profile_batch_get_masks_and_maps_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{BASE}:batchGet")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"found": {
                "name": "projects/demo/databases/(default)/documents/users/u-1",
                "fields": {"name": {"stringValue": "Ada"}}
            }},
            {"missing": "projects/demo/databases/(default)/documents/users/u-2"}
        ])))
        .mount(&server)
        .await;

    let repo = UserRepository::new(client_for(&server).await);
    let ids = vec!["u-1".to_string(), "u-2".to_string(), "u-1".to_string()];
    let profiles = repo.resolve_names(&ids).await.unwrap();

    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles.get("u-1").unwrap().name.as_deref(), Some("Ada"));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    // Duplicate ids collapse to one name each.
    assert_eq!(body["documents"].as_array().unwrap().len(), 2);
    assert_eq!(body["mask"]["fieldPaths"], json!(["name"]));
}

#[tokio::test]
async fn expired_token_is_refreshed_and_request_replayed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/jobs/job-1")))
        .respond_with(
            ResponseTemplate::new(401).set_body_string(r#"{"error":{"status":"UNAUTHENTICATED"}}"#),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/jobs/job-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_doc_json("job-1", "Recovered")))
        .mount(&server)
        .await;

    let repo = JobRepository::new(client_for(&server).await);
    let versioned = repo
        .get(&JobId::from_string("job-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(versioned.job.title, "Recovered");
}

#[tokio::test]
async fn transient_server_errors_are_retried_through_with_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/jobs/job-1")))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/jobs/job-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_doc_json("job-1", "Back")))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let doc = client
        .with_retry("get_document", || client.get_document("jobs", "job-1"))
        .await
        .unwrap()
        .unwrap();
    assert!(doc.update_time.is_some());
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn server_errors_map_with_status_and_retryability() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/jobs/job-1")))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.get_document("jobs", "job-1").await.unwrap_err();
    assert_eq!(err.http_status(), Some(503));
    assert!(err.is_retryable());
}
