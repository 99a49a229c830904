//! Token-based pagination as a `Stream`.
//!
//! Turns a page-fetching closure into a stream of items or of whole pages.
//! The token returned by one page is passed back unchanged to fetch the next
//! one; an empty token ends the stream.
//!
//! ```rust,ignore
//! use bytebase_sdk::pager::ItemPager;
//! use futures_util::StreamExt;
//!
//! let mut projects = ItemPager::new(PageRequest::first(100), |page| {
//!     let client = client.clone();
//!     let ctx = ctx.clone();
//!     async move { client.list_projects(&ctx, ProjectFilter::default(), page).await }
//! });
//! while let Some(project) = projects.next().await {
//!     println!("{}", project?.title);
//! }
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use pin_project_lite::pin_project;

use crate::filter::{Page, PageRequest};

pin_project! {
    /// Yields the items of every page, fetching pages on demand.
    pub struct ItemPager<T, E, F, Fut>
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
    {
        request: PageRequest,
        buffer: VecDeque<T>,
        done: bool,
        fetcher: F,
        #[pin]
        current_fetch: Option<Fut>,
    }
}

impl<T, E, F, Fut> ItemPager<T, E, F, Fut>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    /// `first` is usually [`PageRequest::first`]; a non-empty token resumes
    /// a listing.
    pub fn new(first: PageRequest, fetcher: F) -> Self {
        Self {
            request: first,
            buffer: VecDeque::new(),
            done: false,
            fetcher,
            current_fetch: None,
        }
    }
}

impl<T, E, F, Fut> Stream for ItemPager<T, E, F, Fut>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(item) = this.buffer.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }

            if *this.done {
                return Poll::Ready(None);
            }

            if let Some(fut) = this.current_fetch.as_mut().as_pin_mut() {
                match fut.poll(cx) {
                    Poll::Ready(Ok(page)) => {
                        this.current_fetch.set(None);
                        if page.is_last() {
                            *this.done = true;
                        } else {
                            *this.request = this.request.next(page.next_page_token);
                        }
                        this.buffer.extend(page.items);
                        continue;
                    }
                    Poll::Ready(Err(e)) => {
                        this.current_fetch.set(None);
                        *this.done = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Pending => return Poll::Pending,
                }
            }

            let fut = (this.fetcher)(this.request.clone());
            this.current_fetch.set(Some(fut));
        }
    }
}

pin_project! {
    /// Yields whole pages.
    pub struct PagesPager<T, E, F, Fut>
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
    {
        request: PageRequest,
        done: bool,
        fetcher: F,
        #[pin]
        current_fetch: Option<Fut>,
    }
}

impl<T, E, F, Fut> PagesPager<T, E, F, Fut>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    pub fn new(first: PageRequest, fetcher: F) -> Self {
        Self {
            request: first,
            done: false,
            fetcher,
            current_fetch: None,
        }
    }
}

impl<T, E, F, Fut> Stream for PagesPager<T, E, F, Fut>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    type Item = Result<Page<T>, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if *this.done {
                return Poll::Ready(None);
            }

            if let Some(fut) = this.current_fetch.as_mut().as_pin_mut() {
                match fut.poll(cx) {
                    Poll::Ready(Ok(page)) => {
                        this.current_fetch.set(None);
                        if page.is_last() {
                            *this.done = true;
                        } else {
                            *this.request = this.request.next(page.next_page_token.clone());
                        }
                        return Poll::Ready(Some(Ok(page)));
                    }
                    Poll::Ready(Err(e)) => {
                        this.current_fetch.set(None);
                        *this.done = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Pending => return Poll::Pending,
                }
            }

            // Loop around so the new future is polled right away and
            // registers the waker itself.
            let fut = (this.fetcher)(this.request.clone());
            this.current_fetch.set(Some(fut));
        }
    }
}
