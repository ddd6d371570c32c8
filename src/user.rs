use std::collections::BTreeMap;

use serde::Serialize;

use crate::identity::IdentityType;


/// A user as handed to the provisioning pipeline.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NormalizedUser {
    pub email: String,
    pub identity_type: IdentityType,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// The values the record was derived from, for diagnostics.
    pub source_attributes: BTreeMap<String, Option<String>>,

    pub groups: Vec<String>,
}
impl NormalizedUser {
    pub fn new(email: String, identity_type: IdentityType) -> Self {
        Self {
            username: email.clone(),
            email,
            identity_type,
            domain: None,
            firstname: None,
            lastname: None,
            country: None,
            uid: None,
            source_attributes: BTreeMap::new(),
            groups: Vec::new(),
        }
    }

    /// Adds the user to a group. Returns `false` if the user was already a member.
    pub fn add_group(&mut self, group: &str) -> bool {
        if self.groups.iter().any(|g| g == group) {
            false
        } else {
            self.groups.push(group.to_owned());
            true
        }
    }
}
