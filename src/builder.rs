use std::collections::{BTreeMap, HashMap};

use tracing::warn;
use unicase::UniCase;

use crate::config::ConnectionOptions;
use crate::directory::DirectoryEntry;
use crate::encoding::TextEncoding;
use crate::error::Result;
use crate::formatter::{first_value, AttributeFormatter};
use crate::identity::IdentityType;
use crate::user::NormalizedUser;


const GIVEN_NAME: &str = "givenName";
const SURNAME: &str = "sn";
const COUNTRY: &str = "c";
const UID: &str = "uid";


/// Every user seen during the lifetime of a connector, keyed by DN.
///
/// Only `UserRecordBuilder` adds users; afterwards the only change is adding group memberships.
#[derive(Debug, Default)]
pub struct SessionUserCache {
    users: Vec<NormalizedUser>,
    index_by_dn: HashMap<UniCase<String>, usize>,
}
impl SessionUserCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, dn: &UniCase<String>) -> Option<&NormalizedUser> {
        self.index_by_dn.get(dn)
            .map(|&i| &self.users[i])
    }

    pub fn contains(&self, dn: &UniCase<String>) -> bool {
        self.index_by_dn.contains_key(dn)
    }

    fn insert(&mut self, dn: UniCase<String>, user: NormalizedUser) {
        if self.index_by_dn.contains_key(&dn) {
            return;
        }
        self.index_by_dn.insert(dn, self.users.len());
        self.users.push(user);
    }

    /// Adds `group` to the groups of the user with the given DN. Returns `false` if there is no
    /// such user or it already was a member.
    pub fn tag_group(&mut self, dn: &UniCase<String>, group: &str) -> bool {
        match self.index_by_dn.get(dn) {
            Some(&i) => self.users[i].add_group(group),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// The users in the order they were first seen.
    pub fn users(&self) -> &[NormalizedUser] {
        &self.users
    }
}


/// What became of an entry handed to the builder.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Observed {
    New(UniCase<String>),
    Repeat(UniCase<String>),
}
impl Observed {
    pub fn dn(&self) -> &UniCase<String> {
        match self {
            Self::New(dn) => dn,
            Self::Repeat(dn) => dn,
        }
    }
}


/// The attributes to request from the directory for a user search.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestedAttributes {
    pub all: Vec<String>,

    /// The caller's extra attributes that are not already requested for other reasons.
    pub extended: Vec<String>,
}


fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}


fn push_unique(names: &mut Vec<String>, name: &str) -> bool {
    if names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
        false
    } else {
        names.push(name.to_owned());
        true
    }
}


/// Turns directory entries into normalized users.
#[derive(Clone, Debug)]
pub struct UserRecordBuilder {
    email: AttributeFormatter,
    username: AttributeFormatter,
    domain: AttributeFormatter,
    identity_type: AttributeFormatter,
    default_identity_type: IdentityType,
    encoding: TextEncoding,
}
impl UserRecordBuilder {
    pub fn new(options: &ConnectionOptions) -> Result<Self> {
        let encoding = options.string_encoding;
        Ok(Self {
            email: AttributeFormatter::new(
                "user_email_format", options.user_email_format.as_deref(), encoding,
            )?,
            username: AttributeFormatter::new(
                "user_username_format", options.user_username_format.as_deref(), encoding,
            )?,
            domain: AttributeFormatter::new(
                "user_domain_format", options.user_domain_format.as_deref(), encoding,
            )?,
            identity_type: AttributeFormatter::new(
                "user_identity_type_format", options.user_identity_type_format.as_deref(), encoding,
            )?,
            default_identity_type: options.user_identity_type,
            encoding,
        })
    }

    pub fn requested_attributes(&self, extended_attributes: &[String]) -> RequestedAttributes {
        let mut all = Vec::new();
        for name in [GIVEN_NAME, SURNAME, COUNTRY, UID] {
            push_unique(&mut all, name);
        }
        for formatter in [&self.identity_type, &self.email, &self.username, &self.domain] {
            for name in formatter.attribute_names() {
                push_unique(&mut all, name);
            }
        }

        let mut extended = Vec::new();
        for name in extended_attributes {
            if push_unique(&mut all, name) {
                extended.push(name.clone());
            }
        }
        RequestedAttributes { all, extended }
    }

    /// Builds the user for `entry` and stores it in `cache`. An entry whose DN is already cached is
    /// reported as a repeat without looking at its attributes. Entries that cannot be turned into a
    /// user are skipped with a warning and yield `None`.
    pub fn build(
        &self,
        cache: &mut SessionUserCache,
        entry: &DirectoryEntry,
        extended_attributes: &[String],
    ) -> Result<Option<Observed>> {
        let Some(dn) = &entry.dn else { return Ok(None) };
        if cache.contains(dn) {
            return Ok(Some(Observed::Repeat(dn.clone())));
        }

        let (email, last_attribute_name) = self.email.generate_value(entry)?;
        let Some(email) = trimmed(email) else {
            if let Some(attribute) = last_attribute_name {
                warn!(dn = %dn, attribute = %attribute, "skipping user: empty email attribute");
            }
            return Ok(None);
        };

        let mut source_attributes = BTreeMap::new();
        source_attributes.insert("email".to_owned(), Some(email.clone()));

        let (identity_type_value, last_attribute_name) = self.identity_type.generate_value(entry)?;
        let identity_type_value = trimmed(identity_type_value);
        if identity_type_value.is_none() {
            if let Some(attribute) = &last_attribute_name {
                warn!(
                    dn = %dn,
                    attribute = %attribute,
                    default = %self.default_identity_type,
                    "no identity type attribute; using default",
                );
            }
        }
        let identity_type = match &identity_type_value {
            None => self.default_identity_type,
            Some(value) => match value.parse::<IdentityType>() {
                Ok(it) => it,
                Err(e) => {
                    warn!(dn = %dn, error = %e, "skipping user");
                    return Ok(None);
                },
            },
        };
        source_attributes.insert("identity_type".to_owned(), identity_type_value);

        let mut user = NormalizedUser::new(email, identity_type);

        let (username, last_attribute_name) = self.username.generate_value(entry)?;
        let username = trimmed(username);
        source_attributes.insert("username".to_owned(), username.clone());
        match username {
            Some(username) => user.username = username,
            None => {
                if let Some(attribute) = last_attribute_name {
                    warn!(
                        dn = %dn,
                        attribute = %attribute,
                        email = %user.email,
                        "no username attribute; defaulting to email",
                    );
                }
            },
        }

        let (domain, last_attribute_name) = self.domain.generate_value(entry)?;
        let domain = trimmed(domain);
        source_attributes.insert("domain".to_owned(), domain.clone());
        if domain.is_none() {
            if let Some(attribute) = last_attribute_name {
                warn!(dn = %dn, attribute = %attribute, "no domain attribute");
            }
        }
        user.domain = domain;

        user.firstname = first_value(entry, GIVEN_NAME, self.encoding)?;
        source_attributes.insert(GIVEN_NAME.to_owned(), user.firstname.clone());
        user.lastname = first_value(entry, SURNAME, self.encoding)?;
        source_attributes.insert(SURNAME.to_owned(), user.lastname.clone());
        user.country = first_value(entry, COUNTRY, self.encoding)?;
        source_attributes.insert(COUNTRY.to_owned(), user.country.clone());
        user.uid = first_value(entry, UID, self.encoding)?;
        source_attributes.insert(UID.to_owned(), user.uid.clone());

        for name in extended_attributes {
            let value = first_value(entry, name, self.encoding)?;
            source_attributes.insert(name.clone(), value);
        }
        user.source_attributes = source_attributes;

        cache.insert(dn.clone(), user);
        Ok(Some(Observed::New(dn.clone())))
    }
}
