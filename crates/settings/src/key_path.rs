use std::fmt;

/// Dotted path into a settings document, e.g. `tls.key_length`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath(pub Vec<String>);

impl KeyPath {
    pub fn from_slice(parts: &[&str]) -> Self {
        KeyPath(parts.iter().map(|s| s.to_string()).collect())
    }

    /// Splits on `.`; empty segments are dropped.
    pub fn parse(dotted: &str) -> Self {
        KeyPath(
            dotted
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parent tables and the final key. `None` for an empty path.
    pub fn split_last(&self) -> Option<(&String, &[String])> {
        self.0.split_last()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<&str> for KeyPath {
    fn from(dotted: &str) -> Self {
        KeyPath::parse(dotted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let key = KeyPath::parse("tls.key_length");
        assert_eq!(key.as_slice(), ["tls", "key_length"]);
        assert_eq!(key.to_string(), "tls.key_length");
    }

    #[test]
    fn parse_drops_empty_segments() {
        assert_eq!(KeyPath::parse("a..b."), KeyPath::from_slice(&["a", "b"]));
        assert!(KeyPath::parse("").is_empty());
    }
}
