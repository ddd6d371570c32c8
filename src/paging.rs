use std::collections::VecDeque;
use std::ops::ControlFlow;

use tracing::{debug, warn};

use crate::directory::{Directory, DirectoryEntry, RequestId, SearchQuery};
use crate::error::Result;


/// A paged search (RFC 2696) presented as one sequence of entries.
///
/// As soon as a page arrives that announces a further page, the request for that page is sent;
/// the entries of the current page are then handed out one by one, and only once they are used up
/// is the next page collected. If the consumer stops early, the request that is still in flight
/// has to be abandoned; `for_each` takes care of that, manual users of `next` call `abandon`.
pub struct PagedSearch<'d, D: Directory> {
    directory: &'d mut D,
    query: SearchQuery,
    page_size: i32,
    cookie: Vec<u8>,
    started: bool,
    in_flight: Option<RequestId>,
    buffered: VecDeque<DirectoryEntry>,
    requests_sent: usize,
}
impl<'d, D: Directory> PagedSearch<'d, D> {
    pub fn new(directory: &'d mut D, query: SearchQuery, page_size: i32) -> Self {
        Self {
            directory,
            query,
            page_size,
            cookie: Vec::new(),
            started: false,
            in_flight: None,
            buffered: VecDeque::new(),
            requests_sent: 0,
        }
    }

    /// The cookie most recently returned by the server; empty before the first page and after the
    /// last one.
    #[cfg(test)]
    pub fn cookie(&self) -> &[u8] {
        &self.cookie
    }

    pub fn requests_sent(&self) -> usize {
        self.requests_sent
    }

    async fn send_request(&mut self) -> Result<()> {
        let request = self.directory
            .request_page(&self.query, self.page_size, self.cookie.clone()).await?;
        self.in_flight = Some(request);
        self.requests_sent += 1;
        Ok(())
    }

    pub async fn next(&mut self) -> Result<Option<DirectoryEntry>> {
        loop {
            if let Some(entry) = self.buffered.pop_front() {
                return Ok(Some(entry));
            }

            if !self.started {
                self.started = true;
                self.send_request().await?;
            }

            // keep the request registered until its page has actually been read
            let Some(request) = self.in_flight else { return Ok(None) };
            let page = self.directory.collect_page(request).await;
            self.in_flight = None;
            let page = page?;

            match page.paging {
                None => {
                    warn!(filter = %self.query.filter, "server ignored RFC 2696 paged results control");
                    self.cookie.clear();
                },
                Some(cookie) => {
                    self.cookie = cookie;
                    if !self.cookie.is_empty() {
                        self.send_request().await?;
                    }
                },
            }
            debug!(
                filter = %self.query.filter,
                entries = page.entries.len(),
                more = self.in_flight.is_some(),
                requests = self.requests_sent(),
                "received search result page",
            );
            self.buffered.extend(page.entries);
        }
    }

    /// Stops the search, abandoning the outstanding page request if there is one.
    pub async fn abandon(&mut self) -> Result<()> {
        self.started = true;
        self.buffered.clear();
        if let Some(request) = self.in_flight.take() {
            debug!(filter = %self.query.filter, request, "abandoning outstanding page request");
            self.directory.abandon(request).await?;
        }
        Ok(())
    }

    /// Feeds every entry to `f` until the search is exhausted, `f` breaks or an error occurs. In
    /// all cases, an outstanding page request is abandoned before returning.
    pub async fn for_each<F>(mut self, mut f: F) -> Result<()>
        where F: FnMut(DirectoryEntry) -> Result<ControlFlow<()>>
    {
        let outcome = loop {
            match self.next().await {
                Ok(Some(entry)) => match f(entry) {
                    Ok(ControlFlow::Continue(())) => {},
                    Ok(ControlFlow::Break(())) => break Ok(()),
                    Err(e) => break Err(e),
                },
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        let abandoned = self.abandon().await;
        match (outcome, abandoned) {
            (Err(e), Err(abandon_error)) => {
                warn!(error = %abandon_error, "failed to abandon page request after error");
                Err(e)
            },
            (Err(e), Ok(())) => Err(e),
            (Ok(()), abandoned) => abandoned,
        }
    }
}
impl<'d, D: Directory> Drop for PagedSearch<'d, D> {
    fn drop(&mut self) {
        if let Some(request) = self.in_flight {
            warn!(
                filter = %self.query.filter,
                request,
                "paged search dropped with a page request in flight; it was not abandoned",
            );
        }
    }
}
