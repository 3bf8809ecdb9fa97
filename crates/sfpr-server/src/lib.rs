//! HTTP server for the SFP module registry.
//!
//! Exposes submission intake, the maintainer decisions, publishing, and
//! read access to the published index and blobs over a JSON API.
//! Maintainer routes carry no authentication.

pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use error::{ApiError, ServerError, ServerResult};
pub use handler::AppState;
pub use router::build_router;
pub use server::RegistryServer;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde_json::{json, Value};
    use sfpr_registry::{Registry, RegistryConfig};
    use tower::util::ServiceExt;

    fn app(auto_approve: bool) -> Router {
        let mut config = RegistryConfig::default();
        config.policy.auto_approve_new = auto_approve;
        let registry = Arc::new(Registry::in_memory(config).unwrap());
        build_router(AppState::new(registry))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn call_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = call(app, method, uri, body).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn submission(serial: &str, blob: &[u8]) -> Value {
        json!({
            "metadata": {
                "name": "Cisco DAC 1m",
                "vendor": "CISCO-OEM",
                "model": "SFP-H10GB-CU1M",
                "serial": serial,
            },
            "eeprom_data_base64": STANDARD.encode(blob),
            "submitted_by": "alice",
        })
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (status, body) = call_json(&app(false), "GET", "/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn info_endpoint() {
        let (status, body) = call_json(&app(false), "GET", "/v1/info", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["index_version"], 0);
    }

    #[tokio::test]
    async fn submit_status_codes() {
        let app = app(false);
        let blob = vec![0x03u8; 256];

        let (status, body) = call_json(&app, "POST", "/v1/submissions", Some(submission("A1", &blob))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["outcome"], "queued");

        let (status, body) = call_json(&app, "POST", "/v1/submissions", Some(submission("A1", &blob))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "duplicate");

        let other = vec![0x04u8; 256];
        let (status, body) = call_json(&app, "POST", "/v1/submissions", Some(submission("A1", &other))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["outcome"], "conflict");

        let short = vec![0x03u8; 127];
        let (status, body) = call_json(&app, "POST", "/v1/submissions", Some(submission("B2", &short))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["validation"]["errors"][0]["kind"], "size_out_of_range");
    }

    #[tokio::test]
    async fn bad_base64_is_a_bad_request() {
        let mut body = submission("A1", &[0u8; 256]);
        body["eeprom_data_base64"] = json!("***");
        let (status, _) = call_json(&app(false), "POST", "/v1/submissions", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn approve_publish_and_fetch() {
        let app = app(false);
        let blob = vec![0x03u8; 256];
        let (_, receipt) = call_json(&app, "POST", "/v1/submissions", Some(submission("A1", &blob))).await;
        let id = receipt["submission"].as_str().unwrap().to_string();

        let (status, body) = call_json(&app, "GET", &format!("/v1/submissions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["class"], "new");

        let (status, body) = call_json(&app, "POST", &format!("/v1/submissions/{id}/approve"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["state"], "approved");

        let (status, report) = call_json(&app, "POST", "/v1/publish", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["version"], 1);

        let (status, index) = call_json(&app, "GET", "/v1/index.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(index["version"], 1);
        let blob_url = index["modules"][0]["blob_url"].as_str().unwrap().to_string();
        let file = blob_url.rsplit('/').next().unwrap();

        let (status, bytes) = call(&app, "GET", &format!("/v1/blobs/{file}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, blob);

        let (status, _) = call_json(&app, "GET", "/v1/index.json?version=1", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call_json(&app, "GET", "/v1/index.json?version=9", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn conflict_adjudication_over_http() {
        let app = app(true);
        call_json(&app, "POST", "/v1/submissions", Some(submission("A1", &[0x03; 256]))).await;
        let (_, receipt) = call_json(&app, "POST", "/v1/submissions", Some(submission("A1", &[0x05; 256]))).await;
        let id = receipt["submission"].as_str().unwrap().to_string();

        let (status, conflicts) = call_json(&app, "GET", "/v1/conflicts", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(conflicts["total"], 1);

        let (status, _) = call_json(&app, "POST", &format!("/v1/submissions/{id}/approve"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call_json(
            &app,
            "POST",
            &format!("/v1/submissions/{id}/adjudicate"),
            Some(json!({ "ruling": "reject", "actor": "maint", "reason": "bad dump" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["state"], "rejected");
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let app = app(false);
        let (status, _) = call_json(&app, "GET", "/v1/submissions/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let id = sfpr_types::SubmissionId::new();
        let (status, _) = call_json(&app, "POST", &format!("/v1/submissions/{id}/reject"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let missing = sfpr_types::Digest::of(b"nothing").blob_file_name();
        let (status, _) = call_json(&app, "GET", &format!("/v1/blobs/{missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
