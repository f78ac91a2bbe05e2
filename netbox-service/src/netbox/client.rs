use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;
use shared::protocol::TOKEN_SCHEME;
use shared::types::Page;
use crate::config::Connection;
use crate::error::ConvergeError;

/// Thin async client over the inventory REST API.
///
/// Every call is a single request; failures are reported as-is and never
/// retried.
#[derive(Clone)]
pub struct NetboxClient {
    http: reqwest::Client,
    base: Url,
}

impl NetboxClient {
    pub fn new(conn: &Connection) -> Result<Self, ConvergeError> {
        let mut base = Url::parse(&conn.url)
            .map_err(|e| ConvergeError::validation(format!("invalid netbox_url {:?}: {}", conn.url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut auth = HeaderValue::from_str(&format!("{} {}", TOKEN_SCHEME, conn.token))
            .map_err(|_| ConvergeError::validation("netbox_token contains invalid characters"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(conn.timeout)
            .danger_accept_invalid_certs(!conn.validate_certs)
            .build()
            .map_err(|e| ConvergeError::Transport {
                url: base.to_string(),
                source: e,
            })?;

        if !conn.validate_certs {
            tracing::warn!("TLS certificate validation disabled for {}", base);
        }

        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Fetch every result of a list endpoint matching `query`.
    pub async fn list(&self, endpoint: &str, query: &[(String, String)]) -> Result<Vec<Value>, ConvergeError> {
        let mut url = self.endpoint_url(endpoint)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let mut results = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next.take() {
            let page: Page<Value> = self.send_json(Method::GET, url, |req| req).await?;
            results.extend(page.results);
            next = match page.next {
                Some(link) => Some(Url::parse(&link).map_err(|e| {
                    ConvergeError::validation(format!("invalid pagination link {:?}: {}", link, e))
                })?),
                None => None,
            };
        }

        tracing::debug!("GET {} {:?} matched {} object(s)", endpoint, query, results.len());
        Ok(results)
    }

    pub async fn create(&self, endpoint: &str, body: &Value) -> Result<Value, ConvergeError> {
        let url = self.endpoint_url(endpoint)?;
        self.send_json(Method::POST, url, |req| req.json(body)).await
    }

    /// Partial update of the object `id` under `endpoint`.
    pub async fn update(&self, endpoint: &str, id: u64, body: &Value) -> Result<Value, ConvergeError> {
        let url = self.object_url(endpoint, id)?;
        self.send_json(Method::PATCH, url, |req| req.json(body)).await
    }

    pub async fn delete(&self, endpoint: &str, id: u64) -> Result<(), ConvergeError> {
        let url = self.object_url(endpoint, id)?;
        self.send(Method::DELETE, url, |req| req).await?;
        Ok(())
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, ConvergeError> {
        self.base
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| ConvergeError::validation(format!("invalid endpoint {:?}: {}", endpoint, e)))
    }

    fn object_url(&self, endpoint: &str, id: u64) -> Result<Url, ConvergeError> {
        let endpoint = endpoint.trim_end_matches('/');
        self.endpoint_url(&format!("{}/{}/", endpoint, id))
    }

    async fn send_json<T, F>(&self, method: Method, url: Url, build: F) -> Result<T, ConvergeError>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let context = format!("{} {}", method, url);
        let response = self.send(method, url, build).await?;
        let bytes = response.bytes().await.map_err(|e| ConvergeError::Transport {
            url: context.clone(),
            source: e,
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ConvergeError::Decode { context, source: e })
    }

    async fn send<F>(&self, method: Method, url: Url, build: F) -> Result<Response, ConvergeError>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let label = method.to_string();
        let url_str = url.to_string();
        let response = build(self.http.request(method, url))
            .send()
            .await
            .map_err(|e| ConvergeError::Transport {
                url: url_str.clone(),
                source: e,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!("{} {} returned {}", label, url_str, status);
        Err(ConvergeError::Api {
            method: label,
            url: url_str,
            status: status.as_u16(),
            body,
        })
    }
}
