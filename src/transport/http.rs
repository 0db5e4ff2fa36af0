use crate::batch::{BatchExecutor, BatchRequest, RequestOutcome};
use crate::context::ContextConfig;
use crate::error::RemoteFailure;
use crate::error_code::RemoteErrorCode;
use crate::transport::TransportError;
use crate::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use tracing::{debug, info, warn};
use url::Url;

const ODATA_JSON: &str = "application/json;odata=nometadata";
const CORRELATION_HEADER: &str = "x-sp-model-correlation-id";

/// Executes a batch over HTTP, one request per queued entry, in insertion order.
///
/// A network error on one request fails that request only; its siblings are
/// still sent.
pub struct HttpBatchExecutor {
    client: reqwest::Client,
    site_url: Url,
    access_token: Option<String>,
}

impl HttpBatchExecutor {
    pub fn new(config: &ContextConfig) -> Result<Self> {
        let site_url = config.site_url()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ODATA_JSON));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(ODATA_JSON));

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(TransportError::Http)?;

        Ok(Self {
            client,
            site_url,
            access_token: config.access_token.clone(),
        })
    }

    pub fn site_url(&self) -> &Url {
        &self.site_url
    }

    async fn send_one(&self, request: &BatchRequest) -> std::result::Result<String, RemoteFailure> {
        let url = self.site_url.join(&request.path).map_err(|e| {
            RemoteFailure::new(
                RemoteErrorCode::InvalidRequest,
                format!("cannot resolve '{}': {}", request.path, e),
            )
        })?;

        let mut req = match request.method.to_uppercase().as_str() {
            "POST" => self.client.post(url).json(&request.body),
            "PUT" => self.client.put(url).json(&request.body),
            "PATCH" => self.client.patch(url).json(&request.body),
            "DELETE" => self.client.delete(url),
            "GET" => self.client.get(url),
            other => {
                return Err(RemoteFailure::new(
                    RemoteErrorCode::InvalidRequest,
                    format!("unsupported method '{}'", other),
                ))
            }
        };
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        req = req.header(CORRELATION_HEADER, request.correlation_id.to_string());

        let resp = req.send().await.map_err(network_failure)?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| {
            let mut failure = network_failure(e);
            failure.status = Some(status);
            failure.message = format!("reading response body: {}", failure.message);
            failure
        })?;
        debug!(
            correlation_id = %request.correlation_id,
            http_status = status,
            "request answered"
        );

        if !(200..300).contains(&status) {
            return Err(failure_from_body(status, &body));
        }
        identity_from_body(&body).ok_or_else(|| {
            warn!(
                correlation_id = %request.correlation_id,
                http_status = status,
                "success response carried no identity"
            );
            let mut failure =
                RemoteFailure::new(RemoteErrorCode::Unknown, "response carried no identity");
            failure.status = Some(status);
            failure
        })
    }
}

#[async_trait]
impl BatchExecutor for HttpBatchExecutor {
    async fn execute(&self, requests: &[BatchRequest]) -> Result<Vec<RequestOutcome>> {
        info!(site = %self.site_url, requests = requests.len(), "sending batch");
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            let result = self.send_one(request).await;
            outcomes.push(RequestOutcome {
                correlation_id: request.correlation_id,
                result,
            });
        }
        Ok(outcomes)
    }
}

fn network_failure(e: reqwest::Error) -> RemoteFailure {
    let code = if e.is_timeout() {
        RemoteErrorCode::Timeout
    } else {
        RemoteErrorCode::Unknown
    };
    RemoteFailure::new(code, e.to_string())
}

/// Server identity from a create response: `Id`, `d.Id` or `StringId`.
pub(crate) fn identity_from_body(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    let root = json.get("d").unwrap_or(&json);
    ["Id", "StringId"].iter().find_map(|k| match root.get(*k)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Failure from an error response; prefers the server's OData error over the bare status.
pub(crate) fn failure_from_body(status: u16, body: &str) -> RemoteFailure {
    let json: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let error = json
        .as_ref()
        .and_then(|j| j.get("odata.error").or_else(|| j.get("error")));

    let message = error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.get("value").or(Some(m)))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {}", status)
            } else {
                trimmed.to_string()
            }
        });

    let failure = RemoteFailure::from_status(status, message);
    match error
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_str())
        .and_then(RemoteErrorCode::from_server_code)
    {
        Some(code) => failure.with_code(code),
        None => failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_shapes() {
        assert_eq!(identity_from_body(r#"{"Id":"abc"}"#).as_deref(), Some("abc"));
        assert_eq!(identity_from_body(r#"{"d":{"Id":"def"}}"#).as_deref(), Some("def"));
        assert_eq!(identity_from_body(r#"{"Id":12}"#).as_deref(), Some("12"));
        assert_eq!(identity_from_body(r#"{"StringId":"0x01"}"#).as_deref(), Some("0x01"));
        assert_eq!(identity_from_body("not json"), None);
        assert_eq!(identity_from_body(""), None);
        assert_eq!(identity_from_body(r#"{"Id":""}"#), None);
    }

    #[test]
    fn odata_error_body() {
        let body = r#"{"odata.error":{"code":"-2147024809, System.ArgumentException","message":{"lang":"en-US","value":"Field 'Nope' does not exist."}}}"#;
        let f = failure_from_body(400, body);
        assert_eq!(f.status, Some(400));
        assert_eq!(f.code, RemoteErrorCode::InvalidRequest);
        assert_eq!(f.message, "Field 'Nope' does not exist.");
    }

    #[test]
    fn verbose_error_body_with_duplicate() {
        let body = r#"{"error":{"code":"-2130575214, Microsoft.SharePoint.SPDuplicateValuesFoundException","message":{"value":"A duplicate field link was found."}}}"#;
        let f = failure_from_body(500, body);
        assert_eq!(f.code, RemoteErrorCode::Conflict);
        assert_eq!(f.status, Some(500));
    }

    #[test]
    fn plain_body_falls_back_to_status() {
        let f = failure_from_body(503, "");
        assert_eq!(f.code, RemoteErrorCode::Overloaded);
        assert_eq!(f.message, "HTTP 503");
        assert_eq!(failure_from_body(404, "gone").message, "gone");
    }

    #[test]
    fn new_requires_site_url() {
        assert!(HttpBatchExecutor::new(&ContextConfig::new()).is_err());
        let exec = HttpBatchExecutor::new(
            &ContextConfig::new().with_base_url("http://localhost:8080/sites/a"),
        )
        .unwrap();
        assert_eq!(exec.site_url().as_str(), "http://localhost:8080/sites/a/");
    }

    #[tokio::test]
    async fn unsupported_method_fails_without_sending() {
        // Nothing listens on the discard port; an attempted send would fail
        // with a network error instead.
        let exec =
            HttpBatchExecutor::new(&ContextConfig::new().with_base_url("http://127.0.0.1:9")).unwrap();
        let request = BatchRequest::new("MERGE", "_api/web/fields", "SP.Field", serde_json::json!({}));

        let outcomes = exec.execute(std::slice::from_ref(&request)).await.unwrap();
        let failure = outcomes[0].result.clone().unwrap_err();
        assert_eq!(failure.code, RemoteErrorCode::InvalidRequest);
        assert_eq!(failure.message, "unsupported method 'MERGE'");
        assert_eq!(failure.status, None);
    }
}
