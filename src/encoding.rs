use std::fmt;
use std::str::FromStr;

use crate::error::Error;


/// Text encoding used to decode attribute values delivered by the directory.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}
impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin-1",
        }
    }

    /// Decodes `bytes`, returning `None` if they are not valid in this encoding.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes)
                .ok()
                .map(|s| s.to_owned()),
            Self::Ascii => {
                if bytes.is_ascii() {
                    // ASCII is a subset of UTF-8
                    std::str::from_utf8(bytes)
                        .ok()
                        .map(|s| s.to_owned())
                } else {
                    None
                }
            },
            Self::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}
impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
impl FromStr for TextEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            _ => Err(Error::InvalidOption {
                name: "string_encoding",
                reason: format!("unsupported encoding {:?}", s),
            }),
        }
    }
}
