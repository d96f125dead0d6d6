#[cfg(feature = "http")]
pub mod http;
pub mod stub;

use crate::error::SearchError;
use bytes::Bytes;
use futures_core::stream::BoxStream;
use serde::Serialize;

/// Raw response body, as read from the transport.
pub type BodyStream = BoxStream<'static, Result<Bytes, SearchError>>;

/// JSON body of a search request.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    #[serde(rename = "searchQuestion")]
    pub search_question: String,
}

/// Something that can answer a search with a streamed body.
pub trait SearchBackend {
    fn name(&self) -> &'static str;

    /// Issue the request and hand back the body once the response has started.
    fn open(
        &self,
        query: &str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<BodyStream, SearchError>> + Send>>;
}
