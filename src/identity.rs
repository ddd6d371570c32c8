use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::Error;


/// The kinds of identity a provisioned user can have.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum IdentityType {
    AdobeId,
    EnterpriseId,
    #[default]
    FederatedId,
}
impl IdentityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdobeId => "adobeID",
            Self::EnterpriseId => "enterpriseID",
            Self::FederatedId => "federatedID",
        }
    }
}
impl fmt::Display for IdentityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for IdentityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adobe" | "adobeid" => Ok(Self::AdobeId),
            "enterprise" | "enterpriseid" => Ok(Self::EnterpriseId),
            "federated" | "federatedid" => Ok(Self::FederatedId),
            _ => Err(Error::InvalidIdentityType { value: s.to_owned() }),
        }
    }
}
impl Serialize for IdentityType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
