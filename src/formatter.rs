use crate::directory::DirectoryEntry;
use crate::encoding::TextEncoding;
use crate::error::{Error, Result};


#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
enum Segment {
    Literal(String),
    Placeholder(String),
}


fn parse_template(option_name: &'static str, template: &str) -> Result<Vec<Segment>> {
    let invalid = |reason: String| Error::InvalidOption { name: option_name, reason };

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            },
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            },
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') => return Err(invalid(format!("nested '{{' in template {:?}", template))),
                        Some(nc) => name.push(nc),
                        None => return Err(invalid(format!("unterminated '{{' in template {:?}", template))),
                    }
                }
                if name.is_empty() {
                    continue;
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(name));
            },
            '}' => return Err(invalid(format!("single '}}' in template {:?}", template))),
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}


/// Decodes the first value of the attribute `name`, if the entry has one.
pub fn first_value(entry: &DirectoryEntry, name: &str, encoding: TextEncoding) -> Result<Option<String>> {
    let Some(bytes) = entry.first_value(name) else { return Ok(None) };
    match encoding.decode(bytes) {
        Some(s) => Ok(Some(s)),
        None => Err(Error::Decoding {
            attribute: name.to_owned(),
            encoding: encoding.name(),
        }),
    }
}


/// Derives a value from a directory entry using a template such as `"{givenName}.{sn}@example.com"`.
///
/// The placeholders are extracted once; generating a value only looks up and concatenates.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AttributeFormatter {
    segments: Option<Vec<Segment>>,
    attribute_names: Vec<String>,
    encoding: TextEncoding,
}
impl AttributeFormatter {
    pub fn new(option_name: &'static str, template: Option<&str>, encoding: TextEncoding) -> Result<Self> {
        let Some(template) = template else {
            return Ok(Self {
                segments: None,
                attribute_names: Vec::with_capacity(0),
                encoding,
            });
        };

        let segments = parse_template(option_name, template)?;
        let mut attribute_names: Vec<String> = Vec::new();
        for segment in &segments {
            if let Segment::Placeholder(name) = segment {
                if !attribute_names.contains(name) {
                    attribute_names.push(name.clone());
                }
            }
        }
        Ok(Self {
            segments: Some(segments),
            attribute_names,
            encoding,
        })
    }

    /// The attributes referenced by the template, in order of first occurrence.
    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    /// Returns the generated value (if every placeholder could be resolved) together with the name
    /// of the last attribute that was examined. If an attribute is missing, that is the missing one.
    pub fn generate_value(&self, entry: &DirectoryEntry) -> Result<(Option<String>, Option<String>)> {
        let Some(segments) = &self.segments else { return Ok((None, None)) };

        let mut values = Vec::with_capacity(self.attribute_names.len());
        let mut last_attribute_name = None;
        for name in &self.attribute_names {
            last_attribute_name = Some(name.clone());
            match first_value(entry, name, self.encoding)? {
                Some(value) => values.push((name, value)),
                None => return Ok((None, last_attribute_name)),
            }
        }

        let mut result = String::new();
        for segment in segments {
            match segment {
                Segment::Literal(s) => result.push_str(s),
                Segment::Placeholder(name) => {
                    if let Some((_, value)) = values.iter().find(|(n, _)| *n == name) {
                        result.push_str(value);
                    }
                },
            }
        }
        Ok((Some(result), last_attribute_name))
    }
}
