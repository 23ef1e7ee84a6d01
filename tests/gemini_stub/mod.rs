use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct GeminiStubConfig {
    /// 1-based request numbers answered with `fail_status`.
    pub fail_calls: Vec<usize>,
    pub fail_status: u16,
    /// Wrap classification replies in a ```json fence.
    pub fence_output: bool,
    /// Reply for prompts that are not batch classifications.
    pub reply: String,
}

impl Default for GeminiStubConfig {
    fn default() -> Self {
        Self {
            fail_calls: Vec::new(),
            fail_status: 503,
            fence_output: false,
            reply: "**Stub** reply.\nDone".to_owned(),
        }
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub api_key: Option<String>,
    pub prompt: String,
}

pub struct GeminiStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl GeminiStub {
    pub fn spawn(config: GeminiStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start gemini stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}/v1beta");

        let requests = Arc::new(Mutex::new(Vec::<RecordedRequest>::new()));
        let recorded = Arc::clone(&requests);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

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
                let model = path
                    .strip_prefix("/v1beta/models/")
                    .and_then(|rest| rest.strip_suffix(":generateContent"))
                    .map(str::to_owned);
                let (true, Some(model)) = (request.method() == &tiny_http::Method::Post, model)
                else {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                };

                let api_key = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("x-goog-api-key"))
                    .map(|h| h.value.as_str().to_owned());

                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }
                let prompt = serde_json::from_str::<Value>(&body)
                    .ok()
                    .and_then(|v| {
                        v.pointer("/contents/0/parts/0/text")
                            .and_then(Value::as_str)
                            .map(str::to_owned)
                    });
                let Some(prompt) = prompt else {
                    let _ = request.respond(
                        tiny_http::Response::from_string("missing prompt").with_status_code(400),
                    );
                    continue;
                };

                let call = {
                    let mut requests = recorded.lock().expect("lock requests");
                    requests.push(RecordedRequest {
                        model,
                        api_key,
                        prompt: prompt.clone(),
                    });
                    requests.len()
                };

                if config.fail_calls.contains(&call) {
                    let error = serde_json::json!({
                        "error": { "code": config.fail_status, "message": "stub failure" }
                    });
                    let _ = request.respond(json_response(error, config.fail_status));
                    continue;
                }

                let text = match classification_titles(&prompt) {
                    Some(titles) => {
                        let json = classification_reply(&titles);
                        if config.fence_output {
                            format!("```json\n{json}\n```")
                        } else {
                            json
                        }
                    }
                    None => config.reply.clone(),
                };

                let response_body = serde_json::json!({
                    "candidates": [
                        { "content": { "role": "model", "parts": [{ "text": text }] } }
                    ]
                });
                let _ = request.respond(json_response(response_body, 200));
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("lock requests").clone()
    }

    /// Number of titles sent in each classification request, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.requests()
            .iter()
            .filter_map(|r| classification_titles(&r.prompt))
            .map(|titles| titles.len())
            .collect()
    }
}

impl Drop for GeminiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn json_response(body: Value, status: u16) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("build header");
    tiny_http::Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header)
}

fn classification_titles(prompt: &str) -> Option<Vec<String>> {
    let (_, titles) = prompt.split_once("Titles:\n")?;
    Some(
        titles
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_owned)
            .collect(),
    )
}

/// Tags each title with its first word and "All".
fn classification_reply(titles: &[String]) -> String {
    let mapping = titles
        .iter()
        .map(|title| {
            let first = title.split_whitespace().next().unwrap_or("Misc");
            (title.clone(), serde_json::json!([first, "All"]))
        })
        .collect::<serde_json::Map<_, _>>();
    Value::Object(mapping).to_string()
}
