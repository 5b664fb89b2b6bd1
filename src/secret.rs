use serde::{Deserialize, Deserializer};
use zeroize::Zeroize;

/// Community strings and USM keys.
/// `Debug`/`Display` never show the value and the buffer is zeroized on drop.
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the secret value. Never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Log-safe hint: first two characters followed by `**`
    pub fn hint(&self) -> String {
        let mut chars = self.0.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (None, _, _) => "[redacted]".to_string(),
            (Some(a), Some(b), Some(_)) => format!("{}{}**", a, b),
            _ => "**".to_string(),
        }
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString)
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_is_redacted() {
        let secret = SecretString::new("private-rw");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(secret.expose(), "private-rw");
    }

    #[test]
    fn test_hint() {
        assert_eq!(SecretString::new("public").hint(), "pu**");
        assert_eq!(SecretString::new("abc").hint(), "ab**");
        assert_eq!(SecretString::new("ab").hint(), "**");
        assert_eq!(SecretString::new("a").hint(), "**");
        assert_eq!(SecretString::new("").hint(), "[redacted]");
    }

    #[test]
    fn test_deserialize_from_json_string() {
        let secret: SecretString = serde_json::from_str("\"s3cret\"").unwrap();
        assert_eq!(secret.expose(), "s3cret");
        assert!(!secret.is_empty());
    }
}
