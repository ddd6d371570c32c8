use std::io;

use thiserror::Error;

use crate::directory::RequestId;


pub type Result<T> = std::result::Result<T, Error>;


/// Errors that abort a directory load.
///
/// Anomalies in individual records or groups are logged and skipped instead; they never become an
/// `Error`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("missing required configuration value {0:?}")]
    MissingOption(&'static str),

    #[error("invalid value for configuration option {name:?}: {reason}")]
    InvalidOption { name: &'static str, reason: String },

    #[error("failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("LDAP connection failure: {0}")]
    Connection(String),

    #[error("LDAP error: {0}")]
    Ldap(#[from] ldap3::LdapError),

    #[error("LDAP search with filter {filter:?} failed: {reason}")]
    SearchFailed { filter: String, reason: String },

    #[error("no outstanding search request with ID {0}")]
    UnknownRequest(RequestId),

    #[error("multiple LDAP groups ({count}) found for: {group}")]
    AmbiguousGroup { group: String, count: usize },

    #[error("unrecognized identity type: {value:?}")]
    InvalidIdentityType { value: String },

    #[error("encoding error in value of attribute {attribute:?}: not valid {encoding}")]
    Decoding { attribute: String, encoding: &'static str },

    #[error("failed to write user record: {0}")]
    Output(#[from] serde_json::Error),
}
