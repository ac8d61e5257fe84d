use std::collections::HashSet;
use std::io::Read as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::Value;

/// How the stub answers, keyed by the user message (the candidate line).
#[derive(Debug, Clone, Default)]
pub struct OpenAiStubConfig {
    /// Lines judged to be chapter titles; every other line is judged not to be.
    pub chapter_titles: Vec<String>,
    /// Lines answered with a reply that is not the expected JSON object.
    pub malformed: Vec<String>,
    /// Lines answered with HTTP 500.
    pub failing: Vec<String>,
}

impl OpenAiStubConfig {
    pub fn confirming(titles: &[&str]) -> Self {
        Self {
            chapter_titles: titles.iter().map(|t| (*t).to_owned()).collect(),
            ..Self::default()
        }
    }
}

pub struct OpenAiStub {
    pub base_url: String,
    calls: Arc<AtomicUsize>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl OpenAiStub {
    pub fn spawn(config: OpenAiStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start openai stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/v1");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_server = Arc::clone(&calls);

        let titles = config.chapter_titles.into_iter().collect::<HashSet<_>>();
        let malformed = config.malformed.into_iter().collect::<HashSet<_>>();
        let failing = config.failing.into_iter().collect::<HashSet<_>>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                if request.method() != &tiny_http::Method::Post || path != "/v1/chat/completions" {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }

                let parsed: Value = match serde_json::from_str(&body) {
                    Ok(value) => value,
                    Err(_) => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("invalid json").with_status_code(400),
                        );
                        continue;
                    }
                };

                let Some(line) = parsed.pointer("/messages/1/content").and_then(|v| v.as_str())
                else {
                    let _ = request.respond(
                        tiny_http::Response::from_string("missing user message")
                            .with_status_code(400),
                    );
                    continue;
                };
                calls_in_server.fetch_add(1, Ordering::SeqCst);

                if failing.contains(line) {
                    let error = serde_json::json!({
                        "error": { "message": "stub overloaded", "type": "server_error" }
                    });
                    let _ = request.respond(
                        tiny_http::Response::from_string(error.to_string()).with_status_code(500),
                    );
                    continue;
                }

                let content = if malformed.contains(line) {
                    "I think this is probably a chapter title.".to_owned()
                } else {
                    serde_json::json!({ "is_chapter_title": titles.contains(line) }).to_string()
                };

                let response_body = serde_json::json!({
                    "id": "chatcmpl-stub",
                    "object": "chat.completion",
                    "model": parsed
                        .get("model")
                        .cloned()
                        .unwrap_or_else(|| Value::String("stub-model".to_owned())),
                    "choices": [
                        {
                            "index": 0,
                            "message": { "role": "assistant", "content": content },
                            "finish_reason": "stop"
                        }
                    ]
                });

                let mut response = tiny_http::Response::from_string(response_body.to_string())
                    .with_status_code(200);
                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                response = response.with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            calls,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Drop for OpenAiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
