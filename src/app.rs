use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    api,
    config::AppConfig,
    middleware::assign_request_id,
    service::{plagiarism::PlagiarismChecker, staging::StagingArea},
    util::extract::{FileTextExtractor, TextExtractor},
};

#[derive(Clone)]
pub struct AppState {
    pub checker: Arc<PlagiarismChecker>,
}

pub fn build_router(config: &AppConfig) -> anyhow::Result<Router> {
    let staging = StagingArea::prepare(&config.storage.root)?;
    tracing::info!(root = %staging.root().display(), "staging root ready");

    let extractor: Arc<dyn TextExtractor> = Arc::new(FileTextExtractor);
    let checker = PlagiarismChecker::new(staging, extractor, &config.similarity);

    let state = AppState {
        checker: Arc::new(checker),
    };

    Ok(router(state, config.server.max_upload_bytes))
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    Router::new()
        .route("/healthz", get(api::health::health_check))
        .route(
            "/api/utilities/check-plagiarism",
            post(api::plagiarism::check_plagiarism)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .layer(middleware::from_fn(assign_request_id))
        .layer(layers)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SimilarityConfig,
        middleware::REQUEST_ID_HEADER,
        util::extract::DocumentFormat,
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use docx_rs::{Docx, Paragraph, Run};
    use std::{io::Cursor, path::Path};
    use tower::ServiceExt;

    const BOUNDARY: &str = "plagcheck-test-boundary";

    /// Stands in for PDF parsing: reads the staged bytes as text.
    struct Utf8PdfExtractor;

    impl TextExtractor for Utf8PdfExtractor {
        fn extract(&self, path: &Path, format: DocumentFormat) -> anyhow::Result<String> {
            match format {
                DocumentFormat::Pdf => Ok(std::fs::read_to_string(path)?),
                DocumentFormat::Docx => FileTextExtractor.extract(path, format),
            }
        }
    }

    fn test_router(root: &Path, window_sizes: Vec<usize>, max_upload_bytes: usize) -> Router {
        let checker = PlagiarismChecker::new(
            StagingArea::new(root),
            Arc::new(Utf8PdfExtractor),
            &SimilarityConfig {
                window_sizes,
                extraction_concurrency: 2,
            },
        );
        router(
            AppState {
                checker: Arc::new(checker),
            },
            max_upload_bytes,
        )
    }

    fn docx_bytes(text: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)))
            .build()
            .pack(&mut buf)
            .unwrap();
        buf.into_inner()
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (field, file_name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let disposition = match file_name {
                Some(file_name) => format!(
                    "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
                ),
                None => format!("Content-Disposition: form-data; name=\"{field}\"\r\n"),
            };
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/utilities/check-plagiarism")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn words(prefix: &str, count: usize) -> String {
        (0..count)
            .map(|i| format!("{prefix}{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[tokio::test]
    async fn identical_uploads_report_full_similarity() {
        let tmp = tempfile::tempdir().unwrap();
        let text = words("word", 20);
        let body = multipart_body(&[
            ("docs", Some("first.pdf"), text.as_bytes()),
            ("docs", Some("second.pdf"), text.as_bytes()),
        ]);

        let (status, json) = send(test_router(tmp.path(), vec![5], 1 << 20), upload_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            serde_json::json!([{ "file1": "first.pdf", "file2": "second.pdf", "similarity": 100.0 }])
        );
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn mixed_pdf_and_docx_are_compared() {
        let tmp = tempfile::tempdir().unwrap();
        let text = words("shared", 15);
        let docx = docx_bytes(&text);
        let other = words("other", 15);
        let body = multipart_body(&[
            ("docs", Some("a.pdf"), text.as_bytes()),
            ("docs", Some("b.docx"), docx.as_slice()),
            ("docs", Some("c.pdf"), other.as_bytes()),
        ]);

        let (status, json) =
            send(test_router(tmp.path(), vec![5, 7, 9], 1 << 20), upload_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["file1"], "a.pdf");
        assert_eq!(records[0]["file2"], "b.docx");
        assert_eq!(records[0]["similarity"], 100.0);
        assert_eq!(records[1]["file2"], "c.pdf");
        assert_eq!(records[1]["similarity"], 0.0);
        assert_eq!(records[2]["file1"], "b.docx");
    }

    #[tokio::test]
    async fn single_upload_is_bad_request() {
        let tmp = tempfile::tempdir().unwrap();
        let body = multipart_body(&[("docs", Some("only.pdf"), b"just one".as_slice())]);

        let (status, json) = send(test_router(tmp.path(), vec![5], 1 << 20), upload_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("at least 2 files"));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn other_fields_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let body = multipart_body(&[
            ("docs", Some("only.pdf"), b"just one".as_slice()),
            ("notes", None, b"not a document".as_slice()),
            ("attachments", Some("extra.pdf"), b"wrong field".as_slice()),
        ]);

        let (status, _) = send(test_router(tmp.path(), vec![5], 1 << 20), upload_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unsupported_upload_is_server_error_and_cleaned_up() {
        let tmp = tempfile::tempdir().unwrap();
        let text = words("w", 20);
        let body = multipart_body(&[
            ("docs", Some("notes.txt"), text.as_bytes()),
            ("docs", Some("essay.pdf"), text.as_bytes()),
        ]);

        let (status, json) = send(test_router(tmp.path(), vec![5], 1 << 20), upload_request(body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "unsupported file format: notes.txt");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unwritable_storage_is_server_error() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("uploads");
        std::fs::write(&root, b"").unwrap();
        let text = words("w", 20);
        let body = multipart_body(&[
            ("docs", Some("a.pdf"), text.as_bytes()),
            ("docs", Some("b.pdf"), text.as_bytes()),
        ]);

        let (status, json) = send(test_router(&root, vec![5], 1 << 20), upload_request(body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"]
            .as_str()
            .unwrap()
            .starts_with("failed to stage uploaded files"));
    }

    #[tokio::test]
    async fn part_without_file_name_is_bad_request() {
        let tmp = tempfile::tempdir().unwrap();
        let body = multipart_body(&[
            ("docs", None, b"anonymous".as_slice()),
            ("docs", Some("b.pdf"), b"named".as_slice()),
        ]);

        let (status, _) = send(test_router(tmp.path(), vec![5], 1 << 20), upload_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let big = vec![b'a'; 4096];
        let body = multipart_body(&[
            ("docs", Some("a.pdf"), big.as_slice()),
            ("docs", Some("b.pdf"), big.as_slice()),
        ]);

        let (status, _) = send(test_router(tmp.path(), vec![5], 1024), upload_request(body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn health_reports_storage_and_request_id() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_router(tmp.path(), vec![5], 1 << 20);

        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn health_fails_when_storage_root_is_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let app = test_router(&tmp.path().join("missing"), vec![5], 1 << 20);

        let (status, json) = send(
            app,
            Request::builder().uri("/healthz").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["storage_ready"], false);
    }
}
