//! In-memory directory double for tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::directory::{Directory, DirectoryEntry, RequestId, SearchPage, SearchQuery};
use crate::error::{Error, Result};
use crate::ldif::parse_ldif;


pub fn entries_from_ldif(ldif: &str) -> Vec<DirectoryEntry> {
    parse_ldif(ldif)
}


#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PageRequest {
    pub filter: String,
    pub attribute_names: Vec<String>,
    pub page_size: i32,
    pub cookie: Vec<u8>,
}


/// Serves pages that were scripted per filter. A page is looked up by the filter and the cookie
/// of the request, so a scripted search can be run any number of times.
#[derive(Debug, Default)]
pub struct ScriptedDirectory {
    pages: HashMap<String, Vec<(Vec<u8>, SearchPage)>>,
    dn_results: HashMap<String, Vec<Option<String>>>,
    failing_filters: HashSet<String>,
    page_requests: Vec<PageRequest>,
    searches: Vec<String>,
    pending: HashMap<RequestId, SearchPage>,
    abandoned: Vec<RequestId>,
    last_id: RequestId,
}
impl ScriptedDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a page to the script of `filter`. It answers the request carrying the cookie of the
    /// previously added page.
    pub fn add_page(&mut self, filter: &str, entries: Vec<DirectoryEntry>, paging: Option<Vec<u8>>) {
        let script = self.pages.entry(filter.to_owned()).or_default();
        let request_cookie = script.last()
            .and_then(|(_, page)| page.paging.clone())
            .unwrap_or_default();
        script.push((request_cookie, SearchPage { entries, paging }));
    }

    /// Scripts a well-behaved paged search over `entries`.
    pub fn add_paged_results(&mut self, filter: &str, page_size: usize, entries: Vec<DirectoryEntry>) {
        if entries.is_empty() {
            self.add_page(filter, Vec::new(), Some(Vec::new()));
            return;
        }
        let chunks: Vec<Vec<DirectoryEntry>> = entries.chunks(page_size)
            .map(|c| c.to_vec())
            .collect();
        let chunk_count = chunks.len();
        for (i, chunk) in chunks.into_iter().enumerate() {
            let cookie = if i + 1 < chunk_count {
                format!("{}#{}", filter, i + 1).into_bytes()
            } else {
                Vec::new()
            };
            self.add_page(filter, chunk, Some(cookie));
        }
    }

    /// Scripts a server that ignores the paged results control and returns everything at once.
    pub fn add_unpaged_results(&mut self, filter: &str, entries: Vec<DirectoryEntry>) {
        self.add_page(filter, entries, None);
    }

    pub fn add_search_result(&mut self, filter: &str, dns: &[&str]) {
        self.dn_results.insert(
            filter.to_owned(),
            dns.iter().map(|dn| Some(dn.to_string())).collect(),
        );
    }

    pub fn fail_filter(&mut self, filter: &str) {
        self.failing_filters.insert(filter.to_owned());
    }

    pub fn page_requests(&self) -> &[PageRequest] {
        &self.page_requests
    }

    pub fn searches(&self) -> &[String] {
        &self.searches
    }

    pub fn abandoned(&self) -> &[RequestId] {
        &self.abandoned
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }
}
#[async_trait]
impl Directory for ScriptedDirectory {
    async fn search(&mut self, _base_dn: &str, filter: &str) -> Result<Vec<Option<String>>> {
        self.searches.push(filter.to_owned());
        Ok(self.dn_results.get(filter).cloned().unwrap_or_default())
    }

    async fn request_page(&mut self, query: &SearchQuery, page_size: i32, cookie: Vec<u8>) -> Result<RequestId> {
        if self.failing_filters.contains(&query.filter) {
            return Err(Error::SearchFailed {
                filter: query.filter.clone(),
                reason: "scripted failure".to_owned(),
            });
        }

        self.page_requests.push(PageRequest {
            filter: query.filter.clone(),
            attribute_names: query.attribute_names.clone(),
            page_size,
            cookie: cookie.clone(),
        });
        let page = self.pages.get(&query.filter)
            .and_then(|script| script.iter().find(|(c, _)| *c == cookie))
            .map(|(_, page)| page.clone())
            .unwrap_or(SearchPage { entries: Vec::new(), paging: Some(Vec::new()) });

        self.last_id += 1;
        self.pending.insert(self.last_id, page);
        Ok(self.last_id)
    }

    async fn collect_page(&mut self, request: RequestId) -> Result<SearchPage> {
        self.pending.remove(&request)
            .ok_or(Error::UnknownRequest(request))
    }

    async fn abandon(&mut self, request: RequestId) -> Result<()> {
        self.pending.remove(&request);
        self.abandoned.push(request);
        Ok(())
    }
}
