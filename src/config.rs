use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::encoding::TextEncoding;
use crate::error::{Error, Result};
use crate::identity::IdentityType;


pub const PASSWORD_ENV_VAR: &str = "LDAPUSERSYNC_PASSWORD";

const DEFAULT_GROUP_FILTER_FORMAT: &str = concat!(
    "(&",
    "(|(objectCategory=group)(objectClass=groupOfNames)(objectClass=posixGroup))",
    "(cn={group})",
    ")",
);
const DEFAULT_ALL_USERS_FILTER: &str = concat!(
    "(&",
    "(objectClass=user)",
    "(objectCategory=person)",
    "(!(userAccountControl:1.2.840.113556.1.4.803:=2))",
    ")",
);
const DEFAULT_GROUP_MEMBER_FILTER_FORMAT: &str = "(memberOf={group_dn})";
const DEFAULT_USER_EMAIL_FORMAT: &str = "{mail}";
const DEFAULT_SEARCH_PAGE_SIZE: i64 = 200;


#[derive(Clone, Debug, Default, Deserialize)]
struct RawOptions {
    host: Option<String>,
    username: Option<String>,
    password: Option<String>,
    base_dn: Option<String>,
    group_filter_format: Option<String>,
    all_users_filter: Option<String>,
    group_member_filter_format: Option<String>,
    require_tls_cert: Option<bool>,
    string_encoding: Option<String>,
    user_identity_type_format: Option<String>,
    user_email_format: Option<String>,
    user_username_format: Option<String>,
    user_domain_format: Option<String>,
    user_identity_type: Option<String>,
    search_page_size: Option<i64>,

    #[serde(flatten)]
    unused: BTreeMap<String, toml::Value>,
}


fn require(name: &'static str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::MissingOption(name)),
    }
}


/// Settings for connecting to and querying the directory. Resolved once and never modified.
#[derive(Clone, Eq, PartialEq)]
pub struct ConnectionOptions {
    pub host: String,
    pub username: String,
    pub password: Option<String>,
    pub base_dn: String,
    pub group_filter_format: String,
    pub all_users_filter: String,
    pub group_member_filter_format: String,
    pub require_tls_cert: bool,
    pub string_encoding: TextEncoding,
    pub user_identity_type_format: Option<String>,
    pub user_email_format: Option<String>,
    pub user_username_format: Option<String>,
    pub user_domain_format: Option<String>,
    pub user_identity_type: IdentityType,
    pub search_page_size: i32,
    pub unused_keys: Vec<String>,
}
impl ConnectionOptions {
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let raw: RawOptions = toml::from_str(toml_str)?;

        let host = require("host", raw.host)?;
        let username = require("username", raw.username)?;
        let base_dn = require("base_dn", raw.base_dn)?;

        let string_encoding = match raw.string_encoding {
            Some(enc) => enc.parse::<TextEncoding>()?,
            None => TextEncoding::default(),
        };
        let user_identity_type = match raw.user_identity_type {
            Some(it) => it.parse::<IdentityType>()
                .map_err(|_| Error::InvalidOption {
                    name: "user_identity_type",
                    reason: format!("unrecognized identity type {:?}", it),
                })?,
            None => IdentityType::default(),
        };
        let page_size = raw.search_page_size.unwrap_or(DEFAULT_SEARCH_PAGE_SIZE);
        let search_page_size = match i32::try_from(page_size) {
            Ok(ps) if ps > 0 => ps,
            _ => return Err(Error::InvalidOption {
                name: "search_page_size",
                reason: format!("{} is not a positive page size", page_size),
            }),
        };

        Ok(Self {
            host,
            username,
            password: raw.password,
            base_dn,
            group_filter_format: raw.group_filter_format
                .unwrap_or_else(|| DEFAULT_GROUP_FILTER_FORMAT.to_owned()),
            all_users_filter: raw.all_users_filter
                .unwrap_or_else(|| DEFAULT_ALL_USERS_FILTER.to_owned()),
            group_member_filter_format: raw.group_member_filter_format
                .unwrap_or_else(|| DEFAULT_GROUP_MEMBER_FILTER_FORMAT.to_owned()),
            require_tls_cert: raw.require_tls_cert.unwrap_or(false),
            string_encoding,
            user_identity_type_format: raw.user_identity_type_format,
            user_email_format: raw.user_email_format
                .or_else(|| Some(DEFAULT_USER_EMAIL_FORMAT.to_owned())),
            user_username_format: raw.user_username_format,
            user_domain_format: raw.user_domain_format,
            user_identity_type,
            search_page_size,
            unused_keys: raw.unused.into_keys().collect(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let toml_str = std::fs::read_to_string(path)?;
        Self::from_toml_str(&toml_str)
    }

    pub fn report_unused_values(&self) {
        for key in &self.unused_keys {
            warn!(key = %key, "unused configuration value");
        }
    }

    /// Obtains the bind password from the configuration, the environment or the terminal, in
    /// that order.
    pub fn resolve_password(&self) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        if let Ok(password) = std::env::var(PASSWORD_ENV_VAR) {
            return Ok(password);
        }
        let password = rpassword::prompt_password(format!("LDAP password for {}: ", self.username))?;
        Ok(password)
    }
}
impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("base_dn", &self.base_dn)
            .field("group_filter_format", &self.group_filter_format)
            .field("all_users_filter", &self.all_users_filter)
            .field("group_member_filter_format", &self.group_member_filter_format)
            .field("require_tls_cert", &self.require_tls_cert)
            .field("string_encoding", &self.string_encoding)
            .field("user_identity_type_format", &self.user_identity_type_format)
            .field("user_email_format", &self.user_email_format)
            .field("user_username_format", &self.user_username_format)
            .field("user_domain_format", &self.user_domain_format)
            .field("user_identity_type", &self.user_identity_type)
            .field("search_page_size", &self.search_page_size)
            .finish()
    }
}
