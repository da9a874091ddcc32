//! SendGrid mail adapter.
//!
//! Grounded on `examples/original_source/internal/mailer/sendgrid.go` for
//! the payload shape (one personalization per recipient, a single shared
//! body) and the `X-Message-Id` response header as the trace id.

use serde_json::json;
use tracing::{error, warn};

use crate::{BatchStatus, MailProvider, MailRequest, MailResponse};

const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3/mail/send";

pub struct SendGridProvider {
    token: String,
    api_url: String,
    client: reqwest::Client,
}

impl SendGridProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: SENDGRID_API_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the API base URL, used in tests to point at a mock server.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[async_trait::async_trait]
impl MailProvider for SendGridProvider {
    fn name(&self) -> &'static str {
        "sendgrid"
    }

    async fn send_email(&self, request: MailRequest) -> MailResponse {
        let personalizations: Vec<serde_json::Value> = request
            .receivers
            .iter()
            .map(|r| json!({ "to": [{ "email": r.email }] }))
            .collect();

        let payload = json!({
            "personalizations": personalizations,
            "from": {
                "email": request.message.sender_address,
                "name": request.message.sender_name,
            },
            "subject": request.message.subject,
            "content": [{ "type": "text/plain", "value": request.message.body }],
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(resp) => resp,
            Err(e) => {
                error!(error = %e, "sendgrid request failed");
                return MailResponse {
                    status: BatchStatus::Failed,
                    trace_id: String::new(),
                    raw_response: json!({ "error": e.to_string() }),
                };
            }
        };

        let status_code = response.status();
        let trace_id = response
            .headers()
            .get("X-Message-Id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body_text = response.text().await.unwrap_or_default();

        if !status_code.is_success() {
            warn!(status = %status_code, "sendgrid returned non-success status");
            return MailResponse {
                status: BatchStatus::Failed,
                trace_id: String::new(),
                raw_response: json!({ "status_code": status_code.as_u16(), "body": body_text }),
            };
        }

        MailResponse {
            status: BatchStatus::Sent,
            trace_id,
            raw_response: json!({ "status_code": status_code.as_u16(), "body": body_text }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> MailRequest {
        MailRequest {
            receivers: vec![crate::MailReceiver { email: "a@example.com".to_string() }],
            message: crate::MailMessage {
                sender_name: "Notify".to_string(),
                sender_address: "notify@notify.com".to_string(),
                subject: "hi".to_string(),
                body: "hello".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn sent_status_on_2xx_with_trace_id_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(202).insert_header("X-Message-Id", "trace-123"))
            .mount(&server)
            .await;

        let provider = SendGridProvider::new("test-token").with_api_url(server.uri());
        let response = provider.send_email(request()).await;

        assert!(response.status.is_sent());
        assert_eq!(response.trace_id, "trace-123");
    }

    #[tokio::test]
    async fn non_2xx_response_is_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = SendGridProvider::new("bad-token").with_api_url(server.uri());
        let response = provider.send_email(request()).await;

        assert!(!response.status.is_sent());
        assert!(response.trace_id.is_empty());
    }

    #[tokio::test]
    async fn connection_failure_is_failed() {
        let provider = SendGridProvider::new("test-token").with_api_url("http://127.0.0.1:1".to_string());
        let response = provider.send_email(request()).await;
        assert!(!response.status.is_sent());
    }
}
