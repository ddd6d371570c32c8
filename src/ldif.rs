//! A small LDIF reader for directory fixtures.

use std::borrow::Cow;
use std::collections::BTreeMap;

use base64::Engine;
use tracing::warn;
use unicase::UniCase;

use crate::directory::DirectoryEntry;


fn normalize_newlines<'a>(ldif: &'a str) -> Cow<'a, str> {
    if ldif.contains("\r\n") {
        Cow::Owned(ldif.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(ldif)
    }
}

fn strip_comments<'a>(ldif: &'a str) -> Cow<'a, str> {
    if ldif.starts_with('#') || ldif.contains("\n#") {
        let uncommented: Vec<&str> = ldif.split('\n')
            .filter(|ln| !ln.starts_with('#'))
            .collect();
        Cow::Owned(uncommented.join("\n"))
    } else {
        Cow::Borrowed(ldif)
    }
}

fn join_continuations<'a>(ldif: &'a str) -> Cow<'a, str> {
    if ldif.contains("\n ") {
        Cow::Owned(ldif.replace("\n ", ""))
    } else {
        Cow::Borrowed(ldif)
    }
}


fn parse_value(rest: &str) -> Option<Vec<u8>> {
    if rest.is_empty() || rest == ":" {
        Some(Vec::with_capacity(0))
    } else if let Some(base64_str) = rest.strip_prefix(':') {
        base64::engine::general_purpose::STANDARD.decode(base64_str.trim_matches(' ')).ok()
    } else {
        Some(rest.trim_matches(' ').as_bytes().to_vec())
    }
}


/// Parses LDIF content records into entries. Attribute values keep their order of appearance;
/// records without a `dn` line become entries without a DN.
pub fn parse_ldif(ldif: &str) -> Vec<DirectoryEntry> {
    // comments go before continuations are joined, so that a comment cannot swallow a line
    let normalized = normalize_newlines(ldif);
    let stripped = strip_comments(&normalized);
    let joined = join_continuations(&stripped);

    let mut entries = Vec::new();
    for record in joined.split("\n\n") {
        let mut dn = None;
        let mut attributes: BTreeMap<UniCase<String>, Vec<Vec<u8>>> = BTreeMap::new();

        for line in record.split('\n') {
            if line.trim().is_empty() {
                continue;
            }
            let Some((key, rest)) = line.split_once(':') else {
                warn!(line = %line, "skipping LDIF line missing colon");
                continue;
            };
            let Some(value) = parse_value(rest) else {
                warn!(line = %line, "skipping LDIF line with invalid base64 value");
                continue;
            };

            if key.eq_ignore_ascii_case("dn") {
                dn = Some(UniCase::new(String::from_utf8_lossy(&value).into_owned()));
            } else {
                attributes
                    .entry(UniCase::new(key.to_owned()))
                    .or_insert_with(Vec::new)
                    .push(value);
            }
        }

        if dn.is_none() && attributes.is_empty() {
            continue;
        }
        entries.push(DirectoryEntry { dn, attributes });
    }
    entries
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records() {
        let ldif = "\
# exported fixture
dn: uid=jdoe,ou=people,dc=example,dc=com
mail: jdoe@example.com
cn: John
  Doe
cn:: SsO8cmdlbg==

dn: uid=empty,ou=people,dc=example,dc=com
description:
";
        let entries = parse_ldif(ldif);
        assert_eq!(entries.len(), 2);

        let jdoe = &entries[0];
        assert_eq!(jdoe.dn.as_ref().unwrap().as_str(), "uid=jdoe,ou=people,dc=example,dc=com");
        assert_eq!(jdoe.first_value("MAIL"), Some(&b"jdoe@example.com"[..]));
        assert_eq!(
            jdoe.attributes[&UniCase::new("cn".to_owned())],
            vec![b"John Doe".to_vec(), "J\u{00FC}rgen".as_bytes().to_vec()],
        );

        assert_eq!(entries[1].first_value("description"), Some(&b""[..]));
    }

    #[test]
    fn test_record_without_dn() {
        let entries = parse_ldif("ref: ldap://other.example.com/dc=example,dc=com\n");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].dn.is_none());
    }
}
