use std::ops::ControlFlow;

use ldap3::ldap_escape;
use tracing::{debug, warn};

use crate::builder::{Observed, RequestedAttributes, SessionUserCache, UserRecordBuilder};
use crate::config::ConnectionOptions;
use crate::directory::{Directory, SearchQuery};
use crate::error::{Error, Result};
use crate::ldap::{self, LdapConnection};
use crate::paging::PagedSearch;
use crate::user::NormalizedUser;


pub type LdapDirectoryConnector = DirectoryConnector<LdapConnection>;


fn parenthesize(filter: &str) -> String {
    if filter.starts_with('(') {
        filter.to_owned()
    } else {
        format!("({})", filter)
    }
}


/// Loads users and their group memberships from a directory.
///
/// Users are remembered by DN for the lifetime of the connector, so an entry that shows up in
/// several group searches (or again in the search for all users) yields one user carrying all of
/// its groups.
pub struct DirectoryConnector<D: Directory> {
    options: ConnectionOptions,
    directory: D,
    builder: UserRecordBuilder,
    users: SessionUserCache,
}
impl<D: Directory> DirectoryConnector<D> {
    pub const NAME: &'static str = "ldap";

    pub fn new(options: ConnectionOptions, directory: D) -> Result<Self> {
        let builder = UserRecordBuilder::new(&options)?;
        Ok(Self {
            options,
            directory,
            builder,
            users: SessionUserCache::new(),
        })
    }

    #[cfg(test)]
    pub fn users(&self) -> &[NormalizedUser] {
        self.users.users()
    }

    /// Finds the DN of the group called `group`. Returns `None` if there is no such group and fails
    /// if the name is ambiguous.
    pub async fn find_group_dn(&mut self, group: &str) -> Result<Option<String>> {
        let filter = self.options.group_filter_format.replace("{group}", &ldap_escape(group));
        let mut dns: Vec<String> = self.directory
            .search(&self.options.base_dn, &filter).await?
            .into_iter()
            .flatten()
            .collect();
        match dns.len() {
            0 => Ok(None),
            1 => Ok(dns.pop()),
            count => Err(Error::AmbiguousGroup {
                group: group.to_owned(),
                count,
            }),
        }
    }

    fn group_users_filter(&self, group_dn: &str) -> String {
        let member_subfilter = parenthesize(
            &self.options.group_member_filter_format.replace("{group_dn}", &ldap_escape(group_dn)),
        );
        let user_subfilter = parenthesize(&self.options.all_users_filter);
        format!("(&{}{})", member_subfilter, user_subfilter)
    }

    /// Runs a paged user search, calling `on_user` for every entry that is (or already was) a user.
    async fn iter_users<F>(&mut self, filter: String, requested: &RequestedAttributes, mut on_user: F) -> Result<()>
        where F: FnMut(&mut SessionUserCache, &Observed)
    {
        let query = SearchQuery {
            base_dn: self.options.base_dn.clone(),
            filter,
            attribute_names: requested.all.clone(),
        };
        let search = PagedSearch::new(&mut self.directory, query, self.options.search_page_size);
        let builder = &self.builder;
        let users = &mut self.users;
        search.for_each(|entry| {
            if let Some(observed) = builder.build(users, &entry, &requested.extended)? {
                on_user(users, &observed);
            }
            Ok(ControlFlow::Continue(()))
        }).await
    }

    pub async fn load_users_and_groups(
        &mut self,
        groups: &[String],
        extended_attributes: &[String],
        all_users: bool,
    ) -> Result<&[NormalizedUser]> {
        let requested = self.builder.requested_attributes(extended_attributes);

        for group in groups {
            let Some(group_dn) = self.find_group_dn(group).await? else {
                warn!(group = %group, "no group found");
                continue;
            };
            let filter = self.group_users_filter(&group_dn);

            let mut group_users = 0usize;
            self.iter_users(filter, &requested, |users, observed| {
                users.tag_group(observed.dn(), group);
                group_users += 1;
            }).await?;
            debug!(group = %group, count = group_users, "count of users in group");
        }

        if all_users {
            let mut grouped_users = 0usize;
            let mut ungrouped_users = 0usize;
            let filter = self.options.all_users_filter.clone();
            self.iter_users(filter, &requested, |users, observed| {
                let in_groups = users.get(observed.dn())
                    .map(|u| !u.groups.is_empty())
                    .unwrap_or(false);
                if in_groups {
                    grouped_users += 1;
                } else {
                    ungrouped_users += 1;
                }
            }).await?;
            debug!(count = grouped_users, "count of users in any groups");
            debug!(count = ungrouped_users, "count of users not in any groups");
        }

        debug!(count = self.users.len(), "total users loaded");
        Ok(self.users.users())
    }

    #[cfg(test)]
    pub fn into_directory(self) -> D {
        self.directory
    }
}
impl DirectoryConnector<LdapConnection> {
    /// Connects and binds to the configured server. Failing to do so is fatal.
    pub async fn connect(options: ConnectionOptions, password: &str) -> Result<Self> {
        let connection = ldap::connect(&options, password).await?;
        Self::new(options, connection)
    }

    pub async fn close(self) -> Result<()> {
        self.directory.unbind().await
    }
}
