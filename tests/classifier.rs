//! Classifier and full pipeline against a local stand-in for Gemini.

mod common;

use common::{create_test_pdf, documents_json, gemini_body, page_count, FakeGemini, Reply};
use docsplit::{
    process_document, process_upload, DocSplitError, DocumentClassifier, GeminiClassifier,
};
use std::time::Duration;

#[tokio::test]
async fn classifier_sends_document_and_parses_descriptors() {
    let fake = FakeGemini::start(vec![Reply::ok(gemini_body(&documents_json(&[
        ("W2", 1, 2),
        ("paystub", 3, 3),
    ])))])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let classifier = GeminiClassifier::from_config(&fake.config(dir.path())).unwrap();

    let docs = classifier
        .classify(b"%PDF-1.7 fake", "application/pdf")
        .await
        .unwrap();

    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].doc_type, "w2");
    assert_eq!((docs[1].page_start, docs[1].page_end), (3, 3));
    assert_eq!(docs[0].key_highlights[0].field, "tax_year");

    let requests = fake.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.path, "/v1beta/models/gemini-2.0-flash-exp:generateContent");
    assert_eq!(req.api_key.as_deref(), Some("test-key"));
    assert_eq!(
        req.body["contents"][0]["parts"][1]["inline_data"]["data"],
        "JVBERi0xLjcgZmFrZQ=="
    );
    assert_eq!(
        req.body["generationConfig"]["responseMimeType"],
        "application/json"
    );
    assert!(req.body["generationConfig"]["responseSchema"].is_object());
}

#[tokio::test]
async fn fenced_model_output_is_accepted() {
    let text = format!("```json\n{}\n```", documents_json(&[("w2", 1, 1)]));
    let fake = FakeGemini::start(vec![Reply::ok(gemini_body(&text))]).await;
    let dir = tempfile::tempdir().unwrap();
    let classifier = GeminiClassifier::from_config(&fake.config(dir.path())).unwrap();

    let docs = classifier.classify(b"%PDF", "application/pdf").await.unwrap();
    assert_eq!(docs.len(), 1);
}

#[tokio::test]
async fn upstream_500_is_reported_with_status() {
    let fake = FakeGemini::start(vec![Reply::status(500, r#"{"error":"internal"}"#)]).await;
    let dir = tempfile::tempdir().unwrap();
    let config = fake
        .config(dir.path())
        .into_builder()
        .max_retries(0)
        .build()
        .unwrap();
    let classifier = GeminiClassifier::from_config(&config).unwrap();

    let err = classifier
        .classify(b"%PDF", "application/pdf")
        .await
        .unwrap_err();

    assert!(
        matches!(err, DocSplitError::UpstreamStatus { status: 500, .. }),
        "got {err:?}"
    );
    assert!(err.to_string().contains("500"));
    assert_eq!(fake.request_count(), 1);
}

#[tokio::test]
async fn transient_status_is_retried_until_success() {
    let fake = FakeGemini::start(vec![
        Reply::status(503, "overloaded"),
        Reply::status(429, "slow down"),
        Reply::ok(gemini_body(&documents_json(&[("w2", 1, 1)]))),
    ])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let classifier = GeminiClassifier::from_config(&fake.config(dir.path())).unwrap();

    let docs = classifier.classify(b"%PDF", "application/pdf").await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(fake.request_count(), 3);
}

#[tokio::test]
async fn retries_are_bounded() {
    let fake = FakeGemini::start(vec![Reply::status(502, "bad gateway")]).await;
    let dir = tempfile::tempdir().unwrap();
    let classifier = GeminiClassifier::from_config(&fake.config(dir.path())).unwrap();

    let err = classifier
        .classify(b"%PDF", "application/pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, DocSplitError::UpstreamStatus { status: 502, .. }));
    // One attempt plus the default two retries.
    assert_eq!(fake.request_count(), 3);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let fake = FakeGemini::start(vec![Reply::status(403, "API key not valid")]).await;
    let dir = tempfile::tempdir().unwrap();
    let classifier = GeminiClassifier::from_config(&fake.config(dir.path())).unwrap();

    let err = classifier
        .classify(b"%PDF", "application/pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, DocSplitError::UpstreamStatus { status: 403, .. }));
    assert_eq!(fake.request_count(), 1);
}

#[tokio::test]
async fn malformed_output_is_not_retried() {
    let fake = FakeGemini::start(vec![Reply::ok(gemini_body("I could not read that file."))]).await;
    let dir = tempfile::tempdir().unwrap();
    let classifier = GeminiClassifier::from_config(&fake.config(dir.path())).unwrap();

    let err = classifier
        .classify(b"%PDF", "application/pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, DocSplitError::MalformedResponse { .. }), "got {err:?}");
    assert_eq!(fake.request_count(), 1);
}

#[tokio::test]
async fn response_without_candidates_is_malformed() {
    let fake = FakeGemini::start(vec![Reply::ok(
        r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#.to_string(),
    )])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let classifier = GeminiClassifier::from_config(&fake.config(dir.path())).unwrap();

    let err = classifier
        .classify(b"%PDF", "application/pdf")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("SAFETY"), "got {err}");
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let fake = FakeGemini::start(vec![Reply::ok(gemini_body(&documents_json(&[(
        "w2", 1, 1,
    )])))
    .delayed(Duration::from_secs(3))])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let config = fake
        .config(dir.path())
        .into_builder()
        .api_timeout_secs(1)
        .max_retries(0)
        .build()
        .unwrap();
    let classifier = GeminiClassifier::from_config(&config).unwrap();

    let err = classifier
        .classify(b"%PDF", "application/pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, DocSplitError::ApiTimeout { secs: 1 }), "got {err:?}");
}

#[tokio::test]
async fn unreachable_upstream_is_transient() {
    // Bind and drop a listener to get a port nothing listens on.
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let config = docsplit::ProcessConfig::builder()
        .api_key("k")
        .endpoint(format!("http://127.0.0.1:{port}/v1beta"))
        .max_retries(0)
        .build()
        .unwrap();
    let classifier = GeminiClassifier::from_config(&config).unwrap();

    let err = classifier
        .classify(b"%PDF", "application/pdf")
        .await
        .unwrap_err();
    assert!(err.is_transient(), "got {err:?}");
}

// ── Full pipeline ────────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_documents_means_nothing_is_split() {
    let fake = FakeGemini::start(vec![Reply::ok(gemini_body(r#"{"documents":[]}"#))]).await;
    let dir = tempfile::tempdir().unwrap();
    let config = fake.config(dir.path());
    let source = dir.path().join("bundle.pdf");
    std::fs::write(&source, create_test_pdf(4)).unwrap();

    let err = process_document(&source, &config).await.unwrap_err();

    assert!(matches!(err, DocSplitError::NoDocumentsFound));
    assert_eq!(err.to_string(), "No documents found in the uploaded file");
    assert!(!config.output_dir.exists());
}

#[tokio::test]
async fn upload_is_split_into_a_batch_directory() {
    let fake = FakeGemini::start(vec![Reply::ok(gemini_body(&documents_json(&[
        ("w2", 1, 2),
        ("paystub", 3, 3),
        ("other", 9, 12),
    ])))])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let config = fake.config(dir.path());

    let output = process_upload(&create_test_pdf(10), "Loan Package.pdf", &config)
        .await
        .unwrap();

    assert_eq!(output.message, "Document processed successfully");
    assert_eq!(output.filename, "Loan_Package.pdf");
    assert_eq!(output.total_pages, 10);
    assert_eq!(output.total_documents, 2);
    assert_eq!(output.rejected.len(), 1);
    assert_eq!(output.rejected[0].ordinal, 3);
    assert_eq!(output.stats.descriptors_received, 3);

    let batch = output.batch_id.clone().expect("batches are on by default");
    let batch_dir = config.output_dir.join(&batch);
    assert_eq!(page_count(&batch_dir.join("w2_1_pages_1-2.pdf")), 2);
    assert_eq!(page_count(&batch_dir.join("paystub_2_pages_3-3.pdf")), 1);
    assert_eq!(
        output.documents[0].download_url,
        format!("/download/{batch}/w2_1_pages_1-2.pdf")
    );

    // The upload itself is gone.
    assert_eq!(std::fs::read_dir(&config.upload_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn flat_output_writes_into_the_artifact_dir() {
    let fake = FakeGemini::start(vec![Reply::ok(gemini_body(&documents_json(&[(
        "w2", 1, 1,
    )])))])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let config = fake
        .config(dir.path())
        .into_builder()
        .isolate_batches(false)
        .build()
        .unwrap();

    let output = process_upload(&create_test_pdf(2), "a.pdf", &config)
        .await
        .unwrap();

    assert!(output.batch_id.is_none());
    assert_eq!(output.documents[0].download_url, "/download/w2_1_pages_1-1.pdf");
    assert!(config.output_dir.join("w2_1_pages_1-1.pdf").is_file());
}

#[tokio::test]
async fn upload_is_removed_when_classification_fails() {
    let fake = FakeGemini::start(vec![Reply::status(400, "bad request")]).await;
    let dir = tempfile::tempdir().unwrap();
    let config = fake.config(dir.path());

    let err = process_upload(&create_test_pdf(2), "a.pdf", &config)
        .await
        .unwrap_err();

    assert!(matches!(err, DocSplitError::UpstreamStatus { status: 400, .. }));
    assert_eq!(std::fs::read_dir(&config.upload_dir).unwrap().count(), 0);
}
