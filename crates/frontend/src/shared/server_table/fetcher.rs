//! Загрузка страницы списка с сервера.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use contracts::shared::list_query::{ListEnvelope, ListRequest, ListResponse};
use gloo_net::http::Request;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::shared::api_utils::api_url;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Decode(String),
}

pub type ListFuture<T> = Pin<Box<dyn Future<Output = Result<ListResponse<T>, FetchError>>>>;

/// Issues the list-with-count call. Implementations do not retry.
pub trait RemoteListFetcher<T> {
    fn fetch_list(&self, request: ListRequest) -> ListFuture<T>;
}

/// A request issued by the controller, tagged with its sequence number
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFetch {
    pub seq: u64,
    pub request: ListRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome<T> {
    pub seq: u64,
    pub result: Result<ListResponse<T>, FetchError>,
}

pub async fn dispatch<T>(fetcher: &dyn RemoteListFetcher<T>, pending: PendingFetch) -> FetchOutcome<T> {
    let PendingFetch { seq, request } = pending;
    log::debug!(
        "server_table: fetch #{} {} start={} len={}",
        seq,
        request.doctype,
        request.limit_start,
        request.limit_page_length
    );
    let result = fetcher.fetch_list(request).await;
    if let Err(e) = &result {
        log::warn!("server_table: fetch #{} failed: {}", seq, e);
    }
    FetchOutcome { seq, result }
}

/// POSTs the request as JSON to an API method path on the same origin.
pub struct HttpListFetcher<T> {
    method_path: String,
    _rows: PhantomData<fn() -> T>,
}

impl<T> HttpListFetcher<T> {
    pub fn new(method_path: impl Into<String>) -> Self {
        Self {
            method_path: method_path.into(),
            _rows: PhantomData,
        }
    }
}

impl<T: DeserializeOwned + 'static> RemoteListFetcher<T> for HttpListFetcher<T> {
    fn fetch_list(&self, request: ListRequest) -> ListFuture<T> {
        let url = api_url(&self.method_path);
        Box::pin(async move {
            let response = Request::post(&url)
                .header("Accept", "application/json")
                .json(&request)
                .map_err(|e| FetchError::Decode(e.to_string()))?
                .send()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;

            if !response.ok() {
                let message = response.text().await.unwrap_or_default();
                return Err(FetchError::Status {
                    status: response.status(),
                    message,
                });
            }

            let envelope: ListEnvelope<T> = response
                .json()
                .await
                .map_err(|e| FetchError::Decode(e.to_string()))?;
            Ok(envelope.into_response())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Scripted {
        requests: RefCell<Vec<ListRequest>>,
        fail: bool,
    }

    impl RemoteListFetcher<String> for Scripted {
        fn fetch_list(&self, request: ListRequest) -> ListFuture<String> {
            self.requests.borrow_mut().push(request);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(FetchError::Status {
                        status: 500,
                        message: "boom".to_string(),
                    })
                } else {
                    Ok(ListResponse {
                        data: vec!["PR-0001".to_string()],
                        total_count: 1,
                    })
                }
            })
        }
    }

    fn pending(seq: u64) -> PendingFetch {
        PendingFetch {
            seq,
            request: ListRequest {
                doctype: "Procurement Requests".to_string(),
                fields: "[\"name\"]".to_string(),
                filters: "[]".to_string(),
                limit_start: 0,
                limit_page_length: 10,
                order_by: "creation desc".to_string(),
                search_term: None,
                search_fields: None,
                global_search: false,
            },
        }
    }

    #[tokio::test]
    async fn test_dispatch_tags_outcome() {
        let fetcher = Scripted {
            requests: RefCell::new(Vec::new()),
            fail: false,
        };
        let outcome = dispatch(&fetcher, pending(7)).await;
        assert_eq!(outcome.seq, 7);
        assert_eq!(outcome.result.unwrap().total_count, 1);
        assert_eq!(fetcher.requests.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_passes_errors_through() {
        let fetcher = Scripted {
            requests: RefCell::new(Vec::new()),
            fail: true,
        };
        let outcome = dispatch(&fetcher, pending(2)).await;
        assert_eq!(
            outcome.result,
            Err(FetchError::Status {
                status: 500,
                message: "boom".to_string()
            })
        );
    }
}
