use serde::{Deserialize, Serialize};

use super::EvaluationError;

/// Language-model seam. Constructed and passed in explicitly so tests can
/// substitute fakes without global mutation.
pub trait LlmClient: Send + Sync {
    /// Single generation call.
    fn invoke(&self, prompt: &str, system: &str) -> Result<String, EvaluationError>;

    /// One batch call covering every prompt; the response vector is
    /// positionally aligned with the input.
    fn invoke_batch(&self, prompts: &[String], system: &str) -> Result<Vec<String>, EvaluationError>;
}

/// HTTP client for the model gateway.
pub struct HttpLlmClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpLlmClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> EvaluationError {
        if e.is_connect() {
            EvaluationError::LlmConnection(self.base_url.clone())
        } else if e.is_timeout() {
            EvaluationError::LlmTimeout(self.timeout_secs)
        } else {
            EvaluationError::LlmConnection(e.to_string())
        }
    }

    fn post_generate(&self, body: &GenerateRequest<'_>) -> Result<reqwest::blocking::Response, EvaluationError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EvaluationError::LlmHttp {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Request body for /api/generate
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

/// Response body from /api/generate
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl LlmClient for HttpLlmClient {
    fn invoke(&self, prompt: &str, system: &str) -> Result<String, EvaluationError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
        };
        let response = self.post_generate(&body)?;
        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| EvaluationError::ResponseParsing(e.to_string()))?;
        Ok(parsed.response)
    }

    fn invoke_batch(&self, prompts: &[String], system: &str) -> Result<Vec<String>, EvaluationError> {
        // The gateway exposes no batching endpoint; one batch call here is
        // one HTTP request per prompt over a shared keep-alive connection,
        // surfaced to callers as a single positional result vector.
        prompts.iter().map(|p| self.invoke(p, system)).collect()
    }
}

/// Mock model for testing: responses are dequeued per prompt in order.
pub struct MockLlmClient {
    responses: std::sync::Mutex<Vec<String>>,
    /// Fail this many invocations with a transport error before succeeding.
    fail_first: std::sync::Mutex<u32>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses),
            fail_first: std::sync::Mutex::new(0),
        }
    }

    pub fn single(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    pub fn failing_first(mut self, failures: u32) -> Self {
        *self.fail_first.get_mut().unwrap() = failures;
        self
    }

    fn next_response(&self) -> Result<String, EvaluationError> {
        {
            let mut failures = self.fail_first.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(EvaluationError::LlmConnection("mock transport failure".into()));
            }
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(EvaluationError::ResponseParsing("mock response queue empty".into()));
        }
        Ok(responses.remove(0))
    }
}

impl LlmClient for MockLlmClient {
    fn invoke(&self, _prompt: &str, _system: &str) -> Result<String, EvaluationError> {
        self.next_response()
    }

    fn invoke_batch(&self, prompts: &[String], _system: &str) -> Result<Vec<String>, EvaluationError> {
        prompts.iter().map(|_| self.next_response()).collect()
    }
}
