use std::collections::{BTreeMap, HashMap};
use std::fmt;

use async_trait::async_trait;
use ldap3::controls::{Control, ControlType, PagedResults, RawControl};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, ResultEntry, Scope, SearchEntry, SearchStream};
use tracing::debug;
use unicase::UniCase;

use crate::config::ConnectionOptions;
use crate::directory::{Directory, DirectoryEntry, RequestId, SearchPage, SearchQuery};
use crate::error::{Error, Result};


/// OID of the simple paged results control (RFC 2696).
const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";

/// Requests no attributes at all (RFC 4511 § 4.5.1.8).
const NO_ATTRIBUTES: &str = "1.1";


fn convert_entry(result_entry: ResultEntry) -> DirectoryEntry {
    if result_entry.is_ref() || result_entry.is_intermediate() {
        return DirectoryEntry {
            dn: None,
            attributes: BTreeMap::new(),
        };
    }

    let search_entry = SearchEntry::construct(result_entry);
    let mut attributes = BTreeMap::new();
    for (key, string_values) in search_entry.attrs {
        let all_values: &mut Vec<Vec<u8>> = attributes
            .entry(UniCase::new(key))
            .or_default();
        for string_value in string_values {
            all_values.push(string_value.into_bytes());
        }
    }
    for (key, bytes_values) in search_entry.bin_attrs {
        let all_values: &mut Vec<Vec<u8>> = attributes
            .entry(UniCase::new(key))
            .or_default();
        all_values.extend(bytes_values);
    }
    DirectoryEntry {
        dn: Some(UniCase::new(search_entry.dn)),
        attributes,
    }
}


fn paging_cookie(controls: &[Control]) -> Option<Vec<u8>> {
    for control in controls {
        match control {
            Control(Some(ControlType::PagedResults), raw) => {
                return Some(raw.parse::<PagedResults>().cookie);
            },
            Control(None, raw) if raw.ctype == PAGED_RESULTS_OID => {
                return Some(raw.parse::<PagedResults>().cookie);
            },
            _ => {},
        }
    }
    None
}


/// Opens a connection to the directory server and binds to it.
pub async fn connect(options: &ConnectionOptions, password: &str) -> Result<LdapConnection> {
    debug!(host = %options.host, username = %options.username, "connecting");

    let settings = LdapConnSettings::new()
        .set_no_tls_verify(!options.require_tls_cert);
    let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &options.host)
        .await.map_err(|e| Error::Connection(e.to_string()))?;
    ldap3::drive!(conn);

    ldap.simple_bind(&options.username, password)
        .await
        .and_then(|res| res.success())
        .map_err(|e| Error::Connection(e.to_string()))?;

    debug!(host = %options.host, "connected");
    Ok(LdapConnection::new(ldap))
}


fn search_failed(filter: &str, reason: impl fmt::Display) -> Error {
    Error::SearchFailed {
        filter: filter.to_owned(),
        reason: reason.to_string(),
    }
}


struct PendingSearch {
    filter: String,
    stream: SearchStream<'static, String, Vec<String>>,
}


pub struct LdapConnection {
    ldap: Ldap,
    pending: HashMap<RequestId, PendingSearch>,
}
impl LdapConnection {
    pub fn new(ldap: Ldap) -> Self {
        Self {
            ldap,
            pending: HashMap::new(),
        }
    }

    pub async fn unbind(mut self) -> Result<()> {
        for (msgid, mut pending) in self.pending.drain() {
            pending.stream.ldap_handle().abandon(msgid).await?;
        }
        self.ldap.unbind().await?;
        Ok(())
    }
}
#[async_trait]
impl Directory for LdapConnection {
    async fn search(&mut self, base_dn: &str, filter: &str) -> Result<Vec<Option<String>>> {
        let (result_entries, _) = self.ldap.search(
            base_dn,
            Scope::Subtree,
            filter,
            vec![NO_ATTRIBUTES],
        )
            .await?
            .success()
            .map_err(|e| search_failed(filter, e))?;
        Ok(result_entries
            .into_iter()
            .map(|re| convert_entry(re).dn.map(|dn| dn.into_inner()))
            .collect())
    }

    async fn request_page(&mut self, query: &SearchQuery, page_size: i32, cookie: Vec<u8>) -> Result<RequestId> {
        let control: RawControl = PagedResults { size: page_size, cookie }.into();
        let mut stream = self.ldap
            .with_controls(control)
            .streaming_search(
                &query.base_dn,
                Scope::Subtree,
                &query.filter,
                query.attribute_names.clone(),
            )
            .await?;
        let msgid = stream.ldap_handle().last_id();
        self.pending.insert(msgid, PendingSearch {
            filter: query.filter.clone(),
            stream,
        });
        Ok(msgid)
    }

    async fn collect_page(&mut self, request: RequestId) -> Result<SearchPage> {
        let Some(PendingSearch { filter, mut stream }) = self.pending.remove(&request) else {
            return Err(Error::UnknownRequest(request));
        };

        let mut entries = Vec::new();
        while let Some(result_entry) = stream.next().await.map_err(|e| search_failed(&filter, e))? {
            entries.push(convert_entry(result_entry));
        }
        let result = stream.finish().await;
        if result.rc != 0 {
            return Err(search_failed(&filter, format_args!("result code {}: {}", result.rc, result.text)));
        }

        let paging = paging_cookie(&result.ctrls);
        Ok(SearchPage { entries, paging })
    }

    async fn abandon(&mut self, request: RequestId) -> Result<()> {
        if let Some(mut pending) = self.pending.remove(&request) {
            pending.stream.ldap_handle().abandon(request).await?;
        }
        Ok(())
    }
}
