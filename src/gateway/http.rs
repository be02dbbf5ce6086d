//! `reqwest`-backed [`Transport`].

use async_trait::async_trait;
use reqwest::Url;

use super::transport::{Method, Transport, TransportError, TransportRequest, TransportResponse};
use crate::core::{ClientConfig, ConfigError};

/// HTTP transport over a fixed base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Build a client with the configured timeout. The base URL is
    /// normalized to end in `/` so route segments append to it.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let mut raw = config.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw).map_err(|e| ConfigError::Invalid {
            field: "base_url",
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                field: "base_url",
                reason: "must be a hierarchical http(s) URL".into(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("cardwise/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Invalid {
                field: "base_url",
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, base_url })
    }

    /// Normalized base URL, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join route segments onto the base URL, percent-encoding each one.
    pub fn url_for(&self, request: &TransportRequest) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                TransportError::InvalidRequest("base URL cannot carry a path".into())
            })?;
            path.pop_if_empty();
            path.extend(request.segments.iter());
        }
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = self.url_for(&request)?;
        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
        };
        if let Some(credential) = &request.bearer {
            builder = builder.bearer_auth(credential.expose());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(classify)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(classify)?;
        Ok(TransportResponse { status, body })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() || err.is_request() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(&ClientConfig::default().with_base_url(base)).unwrap()
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let t = transport("https://bank.example/api/v1");
        assert_eq!(t.base_url().as_str(), "https://bank.example/api/v1/");
    }

    #[test]
    fn segments_are_encoded() {
        let t = transport("https://bank.example/api/");
        let req = TransportRequest::get(["cards", "a b/c"]);
        assert_eq!(
            t.url_for(&req).unwrap().as_str(),
            "https://bank.example/api/cards/a%20b%2Fc"
        );
    }

    #[test]
    fn query_pairs_appended() {
        let t = transport("https://bank.example/api/");
        let req = TransportRequest::get(["accounts", "acc-1", "statement"]).query("page", 2);
        assert_eq!(
            t.url_for(&req).unwrap().as_str(),
            "https://bank.example/api/accounts/acc-1/statement?page=2"
        );
    }

    #[test]
    fn rejects_non_base_url() {
        let config = ClientConfig::default().with_base_url("mailto:ops@bank.example");
        assert!(HttpTransport::new(&config).is_err());
    }
}
