use super::split_top_level;
use crate::errors::{ODataError, Result};
use crate::kind::QueryOptionKind;

/// Server-issued continuation token: the ordering values of the last row
/// returned, as `property:value` pairs separated by commas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkipToken {
    values: Vec<(String, String)>,
}

impl SkipToken {
    #[must_use]
    pub fn values(&self) -> &[(String, String)] {
        &self.values
    }

    /// Value recorded for `property`.
    #[must_use]
    pub fn get(&self, property: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v.as_str())
    }
}

pub(super) fn parse(raw: &str) -> Result<SkipToken> {
    let option = QueryOptionKind::SkipToken;
    let mut values = Vec::new();
    for pair in split_top_level(raw, ',') {
        let (key, value) = pair.split_once(':').ok_or_else(|| {
            ODataError::parse(option, format!("expected 'property:value', found '{pair}'"))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ODataError::parse(option, format!("missing property name in '{pair}'")));
        }
        values.push((key.to_owned(), value.trim().to_owned()));
    }
    Ok(SkipToken { values })
}
