use crate::{DrandClientError, Transport, TransportError};
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// the user agent sent by [`HttpTransport`] when [`HttpOptions`] doesn't set one
pub const DEFAULT_USER_AGENT: &str = concat!("drand-feed/", env!("CARGO_PKG_VERSION"));

/// Per-request options, forwarded unchanged on every request a component issues.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpOptions {
    pub user_agent: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl HttpOptions {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// a response that made it back from the node, whatever its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        HttpResponse {
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    pub client: Client,
}

/// create an HTTP transport backed by `reqwest`, identifying itself with [`DEFAULT_USER_AGENT`]
pub fn new_http_transport() -> Result<HttpTransport, TransportError> {
    let client = Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .build()
        .map_err(|e| TransportError::Client(e.to_string()))?;
    Ok(HttpTransport { client })
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, options: &HttpOptions) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.get(url);
        if let Some(user_agent) = &options.user_agent {
            request = request.header(USER_AGENT, user_agent.as_str());
        }
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let res = request.send().await.map_err(|e| request_error(url, e))?;
        let status = res.status();
        let body = res.text().await.map_err(|e| request_error(url, e))?;
        Ok(HttpResponse { status, body })
    }
}

fn request_error(url: &str, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Unreachable {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// GET `url` and decode its JSON body, separating transport, status and body failures
pub(crate) async fn fetch_json<T, R>(
    transport: &T,
    url: &str,
    options: &HttpOptions,
) -> Result<R, DrandClientError>
where
    T: Transport + ?Sized,
    R: DeserializeOwned,
{
    debug!(url, "fetching");
    let res = transport.fetch(url, options).await?;
    if !res.status.is_success() {
        return Err(DrandClientError::HttpStatus {
            url: url.to_string(),
            status: res.status.as_u16(),
        });
    }
    serde_json::from_str(&res.body).map_err(|e| DrandClientError::malformed(url, e))
}
