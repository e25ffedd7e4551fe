//! Form-shaped request bodies

use std::fmt;
use std::str::FromStr;

use crate::error::HttpError;

/// URL-encoded key/value pairs, in insertion order
///
/// Renders as `a=1&b=2`; used both as a query string and as a form body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UrlSearchParams {
    pairs: Vec<(String, String)>,
}

impl UrlSearchParams {
    /// Empty parameter list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair; existing pairs with the same name are kept
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((name.into(), value.into()));
    }

    /// First value for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Iterate over pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether there are no pairs
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Display for UrlSearchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = serde_urlencoded::to_string(&self.pairs).map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

impl FromStr for UrlSearchParams {
    type Err = HttpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(s.trim_start_matches('?'))
            .map_err(|e| HttpError::Serialization(e.to_string()))?;
        Ok(Self { pairs })
    }
}

impl<K, V> FromIterator<(K, V)> for UrlSearchParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Multipart form fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FormData {
    fields: Vec<(String, String)>,
}

impl FormData {
    /// Empty form
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text field
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Builder-style [`FormData::append`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    /// Iterate over fields
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn to_multipart(&self) -> reqwest::multipart::Form {
        self.fields
            .iter()
            .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                form.text(name.clone(), value.clone())
            })
    }
}

/// Fields render URL-encoded; this string form only feeds cache fingerprints.
impl fmt::Display for FormData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = serde_urlencoded::to_string(&self.fields).map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params_encoding() {
        let mut params = UrlSearchParams::new();
        params.append("q", "hello world");
        params.append("page", "2");
        assert_eq!(params.to_string(), "q=hello+world&page=2");
    }

    #[test]
    fn test_search_params_parse() {
        let params: UrlSearchParams = "?a=1&b=two&a=3".parse().expect("valid query");
        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.get("b"), Some("two"));
        assert_eq!(params.iter().count(), 3);
    }

    #[test]
    fn test_form_data_display() {
        let form = FormData::new().with("name", "x").with("tag", "a&b");
        assert_eq!(form.to_string(), "name=x&tag=a%26b");
    }
}
