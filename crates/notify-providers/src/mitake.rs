//! Mitake bulk SMS adapter.
//!
//! Grounded on `examples/original_source/internal/smser/mitake.go` for the
//! exact status-code table, the `DEFAULT`-row batch-status convention, and
//! the `$$`-delimited payload format Mitake's `SmBulkSend` endpoint expects.

use std::collections::HashMap;

use serde_json::json;
use tracing::{error, warn};

use crate::{BatchStatus, RecipientResult, SmsBatchRequest, SmsBatchResponse, SmsProvider, DEFAULT_TRACE_ID};

const MITAKE_API_DOMAIN: &str = "https://smsapi.mitake.com.tw";
const SEND_BATCH_PATH: &str = "/api/mtk/SmBulkSend";

pub struct MitakeProvider {
    username: String,
    password: String,
    api_url: String,
    client: reqwest::Client,
}

impl MitakeProvider {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            api_url: format!("{MITAKE_API_DOMAIN}{SEND_BATCH_PATH}"),
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
impl SmsProvider for MitakeProvider {
    fn name(&self) -> &'static str {
        "mitake"
    }

    async fn send_batch_sms(&self, request: SmsBatchRequest) -> SmsBatchResponse {
        let mut payload = String::new();
        for receiver in &request.receivers {
            payload.push_str(&format_payload_line(&receiver.target_id, &receiver.receiver, &request.message));
        }

        let response = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .query(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
                ("Encoding_PostIn", "UTF-8"),
                ("objectID", request.message_id.as_str()),
            ])
            .body(payload)
            .send()
            .await;

        let response = match response {
            Ok(resp) => resp,
            Err(e) => {
                error!(error = %e, "mitake request failed");
                return failed_response(request.message_id);
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "mitake returned non-success status");
            return failed_response(request.message_id);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "failed to read mitake response body");
                return failed_response(request.message_id);
            }
        };

        let parsed = match parse_mitake_response(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(error = %e, "failed to parse mitake response body");
                return failed_response(request.message_id);
            }
        };

        build_response(request.message_id, parsed)
    }
}

fn format_payload_line(target_id: &str, receiver: &str, message: &str) -> String {
    format!("{target_id}$${receiver}$$$$$$$${message}\r\n")
}

fn failed_response(message_id: String) -> SmsBatchResponse {
    SmsBatchResponse {
        status: BatchStatus::Failed,
        message_id,
        results: Vec::new(),
    }
}

struct MitakeSection {
    msgid: String,
    statuscode: String,
    account_point: String,
}

/// Mitake's bulk-send response is an INI-like document, one section per
/// recipient: `[target_id]` followed by `msgid=`/`statuscode=`/
/// `AccountPoint=` key-value lines. No general INI crate is pulled in for
/// this single narrow wire format; this is a direct parse of it.
fn parse_mitake_response(content: &str) -> Result<HashMap<String, MitakeSection>, String> {
    let mut result = HashMap::new();
    let mut current_section: Option<String> = None;
    let mut msgid = String::new();
    let mut statuscode = String::new();
    let mut account_point = String::new();

    let flush = |result: &mut HashMap<String, MitakeSection>,
                 section: &Option<String>,
                 msgid: &mut String,
                 statuscode: &mut String,
                 account_point: &mut String| {
        if let Some(name) = section {
            result.insert(
                name.clone(),
                MitakeSection {
                    msgid: std::mem::take(msgid),
                    statuscode: std::mem::take(statuscode),
                    account_point: std::mem::take(account_point),
                },
            );
        }
    };

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(stripped) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            flush(&mut result, &current_section, &mut msgid, &mut statuscode, &mut account_point);
            current_section = Some(stripped.to_string());
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "msgid" => msgid = value.trim().to_string(),
            "statuscode" => statuscode = value.trim().to_string(),
            "accountpoint" => account_point = value.trim().to_string(),
            _ => {}
        }
    }
    flush(&mut result, &current_section, &mut msgid, &mut statuscode, &mut account_point);

    if result.is_empty() && !content.trim().is_empty() {
        return Err("no sections found in mitake response".to_string());
    }
    Ok(result)
}

fn build_response(message_id: String, sections: HashMap<String, MitakeSection>) -> SmsBatchResponse {
    let mut results: Vec<RecipientResult> = sections
        .into_iter()
        .map(|(target_id, section)| {
            let status = code_status(&section.statuscode);
            let data = json!({
                "provider_trace_id": section.msgid,
                "status_code": section.statuscode,
                "status_message": code_reason(&section.statuscode),
                "account_point": section.account_point,
            });
            RecipientResult {
                trace_id: target_id,
                status,
                data,
            }
        })
        .collect();
    results.sort_by(|a, b| a.trace_id.cmp(&b.trace_id));

    let status = results
        .iter()
        .find(|r| r.trace_id == DEFAULT_TRACE_ID)
        .map(|r| r.status)
        .unwrap_or(BatchStatus::Failed);

    SmsBatchResponse {
        status,
        message_id,
        results,
    }
}

fn code_status(code: &str) -> BatchStatus {
    match code {
        "0" | "1" | "2" | "3" | "4" => BatchStatus::Sent,
        _ => BatchStatus::Failed,
    }
}

fn code_reason(code: &str) -> &'static str {
    match code {
        "*" => "system error, please contact Mitake support",
        "a" | "b" => "sms sending temporarily suspended, please retry later",
        "c" => "missing account",
        "d" => "missing password",
        "e" => "invalid account or password",
        "f" => "account expired",
        "h" => "account disabled",
        "k" => "invalid source address",
        "m" => "password change required before sending",
        "n" => "password expired, change required before sending",
        "p" => "no permission to use the external http program",
        "r" => "system paused, please retry later",
        "s" => "billing failed, sms not sent",
        "t" => "sms expired",
        "u" => "sms content must not be blank",
        "v" => "invalid phone number",
        "0" => "queued for scheduled delivery",
        "1" | "2" | "3" => "delivered to carrier",
        "4" => "delivered to handset",
        "5" => "content error",
        "6" => "number error",
        "7" => "sms disabled",
        "8" => "delivery timed out",
        "9" => "reservation canceled",
        _ => "unknown status code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_and_classifies_default_row() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[DEFAULT]\r\nmsgid=M1\r\nstatuscode=4\r\nAccountPoint=10\r\n"))
            .mount(&server)
            .await;

        let provider = MitakeProvider::new("user", "pass").with_api_url(server.uri());
        let response = provider
            .send_batch_sms(SmsBatchRequest {
                message_id: "msg-1".to_string(),
                message: "hello".to_string(),
                receivers: vec![crate::SmsReceiver {
                    target_id: "DEFAULT".to_string(),
                    receiver: "0911222333".to_string(),
                }],
            })
            .await;

        assert!(response.status.is_sent());
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn non_success_status_is_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = MitakeProvider::new("user", "pass").with_api_url(server.uri());
        let response = provider
            .send_batch_sms(SmsBatchRequest {
                message_id: "msg-1".to_string(),
                message: "hello".to_string(),
                receivers: vec![crate::SmsReceiver {
                    target_id: "DEFAULT".to_string(),
                    receiver: "0911222333".to_string(),
                }],
            })
            .await;

        assert!(!response.status.is_sent());
    }

    #[test]
    fn parses_multi_section_response() {
        let body = "[DEFAULT]\r\nmsgid=M1\r\nstatuscode=4\r\nAccountPoint=99\r\n\r\n[t2]\r\nmsgid=M2\r\nstatuscode=v\r\nAccountPoint=99\r\n";
        let sections = parse_mitake_response(body).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections["DEFAULT"].statuscode, "4");
        assert_eq!(sections["t2"].statuscode, "v");
    }

    #[test]
    fn batch_status_follows_default_row() {
        let mut sections = HashMap::new();
        sections.insert(
            DEFAULT_TRACE_ID.to_string(),
            MitakeSection {
                msgid: "M1".into(),
                statuscode: "4".into(),
                account_point: "1".into(),
            },
        );
        sections.insert(
            "t2".to_string(),
            MitakeSection {
                msgid: "M2".into(),
                statuscode: "v".into(),
                account_point: "1".into(),
            },
        );
        let response = build_response("msg-1".to_string(), sections);
        assert!(response.status.is_sent());
        let t2 = response.results.iter().find(|r| r.trace_id == "t2").unwrap();
        assert_eq!(t2.status, BatchStatus::Failed);
    }

    #[test]
    fn missing_default_row_is_failed() {
        let mut sections = HashMap::new();
        sections.insert(
            "t2".to_string(),
            MitakeSection {
                msgid: "M2".into(),
                statuscode: "4".into(),
                account_point: "1".into(),
            },
        );
        let response = build_response("msg-1".to_string(), sections);
        assert!(!response.status.is_sent());
    }
}
