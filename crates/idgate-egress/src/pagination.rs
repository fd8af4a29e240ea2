//! Lazy traversal of `_links.next` pagination

use futures::Stream;
use futures::stream::{self, BoxStream};
use idgate_core::normalized::{extract_items, next_page_url};
use reqwest::Method;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::debug;

use crate::Result;
use crate::executor::{QueryParams, RequestExecutor};

/// Page limit used when the caller doesn't pick one
pub const DEFAULT_MAX_PAGES: usize = 100;

/// Stream of item lists, one per non-empty page.
///
/// Pages are fetched through the tenant's executor, so each one is rate
/// limited and retried like any other call. The first request carries
/// `params`; later pages follow the opaque `_links.next.href` unchanged.
/// Traversal ends when a page has no next link or `max_pages` pages have
/// been fetched. A non-2xx page ends the stream with an error.
pub struct PageStream {
    inner: BoxStream<'static, Result<Vec<Value>>>,
}

struct Cursor {
    executor: Arc<RequestExecutor>,
    next: Option<(String, QueryParams)>,
    fetched: usize,
    max_pages: usize,
}

impl PageStream {
    pub fn new(
        executor: Arc<RequestExecutor>,
        first_url: impl Into<String>,
        params: QueryParams,
        max_pages: usize,
    ) -> Self {
        let cursor = Cursor {
            executor,
            next: Some((first_url.into(), params)),
            fetched: 0,
            max_pages,
        };

        let inner = stream::try_unfold(cursor, |mut cursor| async move {
            loop {
                let Some((url, params)) = cursor.next.take() else {
                    return Ok(None);
                };
                if cursor.fetched >= cursor.max_pages {
                    debug!(max_pages = cursor.max_pages, "Page limit reached");
                    return Ok(None);
                }

                let response = cursor
                    .executor
                    .execute(Method::GET, &url, &params, None)
                    .await?;
                cursor.fetched += 1;

                if !response.is_success() {
                    return Err(response.into_error());
                }

                let body = response.json()?;
                cursor.next = next_page_url(&body).map(|next| (next, QueryParams::new()));

                let items = extract_items(&body);
                debug!(
                    page = cursor.fetched,
                    items = items.len(),
                    has_next = cursor.next.is_some(),
                    "Fetched page"
                );
                if !items.is_empty() {
                    return Ok(Some((items, cursor)));
                }
            }
        });

        Self {
            inner: Box::pin(inner),
        }
    }
}

impl Stream for PageStream {
    type Item = Result<Vec<Value>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
