use std::collections::BTreeMap;

use async_trait::async_trait;
use unicase::UniCase;

use crate::error::Result;


/// Identifies a search request that has been sent to the directory but whose results have not
/// been collected yet.
pub type RequestId = i32;


#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DirectoryEntry {
    /// `None` for referrals and other messages that do not describe an entry.
    pub dn: Option<UniCase<String>>,
    pub attributes: BTreeMap<UniCase<String>, Vec<Vec<u8>>>,
}
impl DirectoryEntry {
    pub fn first_value(&self, name: &str) -> Option<&[u8]> {
        self.attributes
            .get(&UniCase::new(name.to_owned()))
            .and_then(|values| values.first())
            .map(|v| v.as_slice())
    }
}


#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SearchQuery {
    pub base_dn: String,
    pub filter: String,
    pub attribute_names: Vec<String>,
}


#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SearchPage {
    pub entries: Vec<DirectoryEntry>,

    /// The cookie of the paged results control in the response, or `None` if the server did not
    /// send that control at all. An empty cookie marks the last page.
    pub paging: Option<Vec<u8>>,
}


#[async_trait]
pub trait Directory {
    /// Returns the DNs of all entries below `base_dn` matching `filter`, without paging.
    async fn search(&mut self, base_dn: &str, filter: &str) -> Result<Vec<Option<String>>>;

    /// Sends one page request of a paged search. The results are obtained via `collect_page`.
    async fn request_page(&mut self, query: &SearchQuery, page_size: i32, cookie: Vec<u8>) -> Result<RequestId>;

    async fn collect_page(&mut self, request: RequestId) -> Result<SearchPage>;

    /// Tells the server to stop processing a request whose page will never be collected.
    async fn abandon(&mut self, request: RequestId) -> Result<()>;
}
