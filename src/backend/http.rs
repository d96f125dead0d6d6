use super::{BodyStream, SearchBackend, SearchRequest};
use crate::error::SearchError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use tokio_stream::StreamExt;

/// POSTs the query to the search endpoint and streams the response body.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpBackend {
    pub fn new(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn headers() -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        h.insert(ACCEPT, HeaderValue::from_static("application/json"));
        h
    }
}

impl SearchBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    fn open(
        &self,
        query: &str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<BodyStream, SearchError>> + Send>> {
        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        let body = SearchRequest {
            search_question: query.to_string(),
        };

        Box::pin(async move {
            tracing::debug!(%endpoint, "sending search request");
            let resp = http
                .post(endpoint)
                .headers(Self::headers())
                .json(&body)
                .send()
                .await
                .map_err(SearchError::request)?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(SearchError::Status {
                    status: status.as_u16(),
                    body: text,
                });
            }

            let stream = resp.bytes_stream().map(|item| item.map_err(SearchError::body));
            Ok(Box::pin(stream) as BodyStream)
        })
    }
}
