//! Front-matter parsing

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Custom deserializer that handles both a single string and a list of strings
fn string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, SeqAccess, Visitor};
    use std::fmt;

    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value])
        }

        fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
        where
            S: SeqAccess<'de>,
        {
            let mut vec = Vec::new();
            while let Some(item) = seq.next_element::<Value>()? {
                match scalar_to_string(&item) {
                    Some(tag) => vec.push(tag),
                    None => {
                        return Err(de::Error::custom(format!(
                            "tags must be strings, found {:?}",
                            item
                        )))
                    }
                }
            }
            Ok(vec)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

/// Text of a YAML scalar; `title: 404` and `tags: [2024]` mean the string
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// An optional string field that also accepts numbers and booleans
fn optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_to_string(&value).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!("expected a string, found {:?}", value))
        }),
    }
}

/// `permalink` is either a path template or `false`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permalink {
    Path(String),
    Disabled,
}

impl<'de> Deserialize<'de> for Permalink {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Path(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(false) => Ok(Permalink::Disabled),
            Raw::Flag(true) => Err(serde::de::Error::custom(
                "permalink must be a path or false",
            )),
            Raw::Path(path) => Ok(Permalink::Path(path)),
        }
    }
}

impl Serialize for Permalink {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Permalink::Path(path) => serializer.serialize_str(path),
            Permalink::Disabled => serializer.serialize_bool(false),
        }
    }
}

/// Front-matter data from a content file, after the data cascade is applied
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    #[serde(deserialize_with = "optional_scalar", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(deserialize_with = "optional_scalar", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(deserialize_with = "string_or_vec")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "optional_scalar", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Where a reposted article was originally published
    #[serde(
        alias = "source",
        alias = "original",
        deserialize_with = "optional_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_url: Option<String>,
    pub draft: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<Permalink>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub exclude_from_collections: bool,

    /// Any other keys, passed through to templates unchanged
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Split a file into its YAML front-matter text and body.
///
/// Returns `None` for the YAML when the file has no front-matter block, or
/// when the leading `---` block does not look like YAML (a Markdown
/// horizontal rule followed by prose, for instance).
fn split(content: &str) -> (Option<&str>, &str) {
    let trimmed = content.trim_start();
    let Some(rest) = trimmed.strip_prefix("---") else {
        return (None, content);
    };

    // The opening fence must be alone on its line
    let first_line_end = rest.find('\n').unwrap_or(rest.len());
    if !rest[..first_line_end].trim().is_empty() {
        return (None, content);
    }
    let rest = rest[first_line_end..].trim_start_matches(['\n', '\r']);

    // An immediately closing fence is an empty block
    if let Some(after) = rest.strip_prefix("---") {
        return (Some(""), after.trim_start_matches(['\n', '\r']));
    }

    let Some(end_pos) = rest.find("\n---") else {
        return (None, content);
    };
    let yaml = &rest[..end_pos];
    let remaining = &rest[end_pos + 4..];
    let remaining = remaining.trim_start_matches(['\n', '\r']);

    if yaml.trim().is_empty() {
        return (Some(""), remaining);
    }
    if !looks_like_yaml(yaml) {
        return (None, content);
    }
    (Some(yaml), remaining)
}

/// Valid front-matter has at least one `key: value` line whose key is a
/// plain identifier and not a URL scheme.
fn looks_like_yaml(block: &str) -> bool {
    block.lines().any(|line| {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return false;
        }
        let Some(colon_pos) = trimmed.find(':') else {
            return false;
        };
        let key = &trimmed[..colon_pos];
        let is_valid_key = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            && !matches!(key, "http" | "https" | "ftp" | "mailto");
        let after_colon = &trimmed[colon_pos + 1..];
        is_valid_key && (after_colon.is_empty() || after_colon.starts_with(' '))
    })
}

/// Parse the front-matter block into a raw mapping, returning the body
pub fn parse_mapping(content: &str) -> Result<(Mapping, &str), serde_yaml::Error> {
    match split(content) {
        (Some(yaml), body) if !yaml.trim().is_empty() => {
            let value: Value = serde_yaml::from_str(yaml)?;
            match value {
                Value::Mapping(map) => Ok((map, body)),
                Value::Null => Ok((Mapping::new(), body)),
                _ => Err(serde::de::Error::custom(
                    "front-matter must be a mapping of keys to values",
                )),
            }
        }
        (_, body) => Ok((Mapping::new(), body)),
    }
}

impl FrontMatter {
    /// Parse front-matter from content string
    /// Returns (front_matter, remaining_content)
    pub fn parse(content: &str) -> Result<(Self, &str), serde_yaml::Error> {
        let (map, body) = parse_mapping(content)?;
        Ok((Self::from_mapping(map)?, body))
    }

    /// Build typed front-matter from a merged data mapping
    pub fn from_mapping(map: Mapping) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_value(Value::Mapping(map))
    }

    /// Parse the date field, unless it names a file timestamp
    pub fn parse_date(&self) -> Option<DateTime<Local>> {
        self.date.as_deref().and_then(parse_date_string)
    }

    /// The `date` keyword asking for a file timestamp, if any
    pub fn date_keyword(&self) -> Option<DateKeyword> {
        match self.date.as_deref().map(str::trim) {
            Some("Created") | Some("git Created") => Some(DateKeyword::Created),
            Some("Last Modified") | Some("git Last Modified") => Some(DateKeyword::LastModified),
            _ => None,
        }
    }

    pub fn is_disabled_permalink(&self) -> bool {
        matches!(self.permalink, Some(Permalink::Disabled))
    }
}

/// Date keywords that defer to file metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKeyword {
    Created,
    LastModified,
}

/// Parse a date string in various formats
pub(crate) fn parse_date_string(s: &str) -> Option<DateTime<Local>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local));
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Local.from_local_datetime(&dt).earliest();
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Local.from_local_datetime(&d.and_hms_opt(0, 0, 0)?).earliest();
        }
    }

    None
}
