//! Shared fixtures: in-process PDFs and a scripted stand-in for Gemini.

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use docsplit::ProcessConfig;
use lopdf::{content::Content, content::Operation, Dictionary, Document, Object, Stream};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── PDFs ─────────────────────────────────────────────────────────────────────

/// Build an `n`-page PDF whose page `i` shows the text `Page i`.
pub fn create_test_pdf(num_pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let mut page_ids = Vec::new();

    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        format!("Page {}", i + 1).into_bytes(),
                        lopdf::StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Contents", Object::Reference(content_id)),
        ]);
        page_ids.push(doc.add_object(page));
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(num_pages as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Page count of a PDF on disk.
pub fn page_count(path: &Path) -> usize {
    Document::load(path)
        .unwrap_or_else(|e| panic!("{} is not a readable PDF: {e}", path.display()))
        .get_pages()
        .len()
}

/// Text drawn on each page, in page order.
pub fn page_labels(path: &Path) -> Vec<String> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|id| {
            let content = doc.get_page_content(*id).unwrap();
            let ops = Content::decode(&content).unwrap().operations;
            ops.iter()
                .find(|op| op.operator == "Tj")
                .and_then(|op| op.operands.first())
                .and_then(|o| o.as_str().ok())
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default()
        })
        .collect()
}

// ── Gemini responses ─────────────────────────────────────────────────────────

/// `{"documents":[...]}` for `(doc_type, page_start, page_end)` triples.
pub fn documents_json(docs: &[(&str, i64, i64)]) -> String {
    let documents: Vec<Value> = docs
        .iter()
        .map(|(doc_type, start, end)| {
            json!({
                "doc_type": doc_type,
                "title": format!("{doc_type} title"),
                "page_start": start,
                "page_end": end,
                "confidence": 0.9,
                "summary": format!("A {doc_type}."),
                "key_highlights": [{"field": "tax_year", "value": "2023"}],
            })
        })
        .collect();
    json!({ "documents": documents }).to_string()
}

/// A successful `generateContent` body whose only part is `text`.
pub fn gemini_body(text: &str) -> String {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP",
        }],
        "usageMetadata": {"promptTokenCount": 1000, "candidatesTokenCount": 200},
    })
    .to_string()
}

// ── Fake server ──────────────────────────────────────────────────────────────

/// One scripted reply.
#[derive(Clone, Debug)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub delay: Option<Duration>,
}

impl Reply {
    pub fn ok(body: String) -> Self {
        Self {
            status: 200,
            body,
            delay: None,
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A request the fake received.
#[derive(Clone, Debug)]
pub struct Recorded {
    pub path: String,
    pub api_key: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct FakeState {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
}

/// A local HTTP server that answers like `generateContent`.
///
/// Replies are served in order; the last one repeats once the script runs out.
pub struct FakeGemini {
    pub endpoint: String,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeGemini {
    pub async fn start(replies: Vec<Reply>) -> Self {
        let state = FakeState {
            replies: Arc::new(Mutex::new(replies.into())),
            recorded: Arc::new(Mutex::new(Vec::new())),
        };
        let recorded = Arc::clone(&state.recorded);
        let app = Router::new().fallback(fake_handler).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            endpoint: format!("http://{addr}/v1beta"),
            recorded,
            handle,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.recorded.lock().unwrap().len()
    }

    /// Config pointing at this server, with fast retries.
    pub fn config(&self, dir: &Path) -> ProcessConfig {
        ProcessConfig::builder()
            .api_key("test-key")
            .endpoint(&self.endpoint)
            .retry_backoff_ms(5)
            .upload_dir(dir.join("uploads"))
            .output_dir(dir.join("split_documents"))
            .build()
            .unwrap()
    }
}

impl Drop for FakeGemini {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn fake_handler(
    State(state): State<FakeState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.recorded.lock().unwrap().push(Recorded {
        path: uri.path().to_string(),
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let reply = {
        let mut replies = state.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        }
    };
    let Some(reply) = reply else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "no scripted reply").into_response();
    };

    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }
    let status = StatusCode::from_u16(reply.status).unwrap();
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        reply.body,
    )
        .into_response()
}
