//! Flattening structured values into ordered key/value pairs.
//!
//! Used for URL-encoded bodies and for structured query arguments. The input
//! is the serialized form of the argument (a JSON object whose member order is
//! the declaration order), so serde renames apply. Per-member rules refine the
//! key and the rendering of sequences.

use serde_json::Value;

use crate::{CollectionFormat, Error, Result, UrlParameterFormatter};

/// Rendering rule for one serialized member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    member: &'static str,
    alias: Option<&'static str>,
    prefix: Option<&'static str>,
    delimiter: &'static str,
    format: CollectionFormat,
}

impl FieldRule {
    /// A rule for the serialized member `member` that changes nothing yet.
    #[must_use]
    pub const fn new(member: &'static str) -> Self {
        Self {
            member,
            alias: None,
            prefix: None,
            delimiter: ".",
            format: CollectionFormat::Default,
        }
    }

    /// Emit the member under `alias`.
    #[must_use]
    pub const fn alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    /// Prefix the key with `prefix` followed by `delimiter`.
    #[must_use]
    pub const fn prefix(mut self, prefix: &'static str, delimiter: &'static str) -> Self {
        self.prefix = Some(prefix);
        self.delimiter = delimiter;
        self
    }

    /// Render sequence values with `format`.
    #[must_use]
    pub const fn format(mut self, format: CollectionFormat) -> Self {
        self.format = format;
        self
    }

    /// The serialized member this rule applies to.
    #[must_use]
    pub const fn member(&self) -> &'static str {
        self.member
    }

    fn key(&self, name: &str) -> String {
        let name = self.alias.unwrap_or(name);
        match self.prefix {
            Some(prefix) => format!("{prefix}{}{name}", self.delimiter),
            None => name.to_owned(),
        }
    }
}

/// Types carrying per-member form rules.
///
/// ```
/// use grapnel_core::{CollectionFormat, FieldRule, FormRules};
///
/// #[derive(serde::Serialize)]
/// struct Search {
///     #[serde(rename = "q")]
///     query: String,
///     tags: Vec<String>,
/// }
///
/// impl FormRules for Search {
///     fn field_rules() -> &'static [FieldRule] {
///         const RULES: &[FieldRule] = &[FieldRule::new("tags").format(CollectionFormat::Csv)];
///         RULES
///     }
/// }
/// ```
pub trait FormRules {
    /// Rules keyed by serialized member name.
    fn field_rules() -> &'static [FieldRule];
}

/// An ordered multimap of form keys to rendered values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValueMultimap {
    entries: Vec<(String, String)>,
}

impl FormValueMultimap {
    /// Flatten `value` with `rules`, rendering scalars with `formatter`.
    ///
    /// `null` yields an empty multimap and `null` members are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `value` is neither an object nor `null`.
    pub fn from_value(
        value: &Value,
        rules: &[FieldRule],
        formatter: &dyn UrlParameterFormatter,
    ) -> Result<Self> {
        let members = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(members) => members,
            other => {
                return Err(Error::invalid_argument(format!(
                    "only objects can be flattened into form values, got {}",
                    kind_of(other)
                )));
            }
        };

        let mut entries = Vec::with_capacity(members.len());
        for (name, member) in members {
            if member.is_null() {
                continue;
            }
            let rule = rules
                .iter()
                .find(|rule| rule.member == name)
                .copied()
                .unwrap_or_else(|| FieldRule::new(""));
            let key = rule.key(name);

            match (member, rule.format) {
                (Value::Array(items), CollectionFormat::Multi) => {
                    for item in items {
                        entries.push((key.clone(), formatter.format(item)));
                    }
                }
                (Value::Array(items), format) => {
                    let rendered = match format.separator() {
                        Some(separator) => items
                            .iter()
                            .map(|item| formatter.format(item))
                            .collect::<Vec<_>>()
                            .join(separator),
                        None => formatter.format(member),
                    };
                    entries.push((key, rendered));
                }
                (other, _) => entries.push((key, formatter.format(other))),
            }
        }

        Ok(Self { entries })
    }

    /// Keys in emission order, repeated for multi-valued members.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Entries in emission order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there is no entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take the entries.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.entries
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
