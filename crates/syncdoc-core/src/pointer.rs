//! JSON Pointer (RFC 6901) parsing.

use std::fmt;

use crate::errors::PointerError;

/// A parsed JSON Pointer.
///
/// The empty string addresses the whole document; every other pointer is a
/// `/`-separated list of reference tokens with `~1` standing for `/` and
/// `~0` for `~`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonPointer {
    raw: String,
    tokens: Vec<String>,
}

impl JsonPointer {
    /// Parse a pointer string.
    pub fn parse(raw: &str) -> Result<Self, PointerError> {
        if raw.is_empty() {
            return Ok(Self {
                raw: String::new(),
                tokens: Vec::new(),
            });
        }
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(PointerError::MissingLeadingSlash(raw.to_owned()));
        };
        let tokens = rest
            .split('/')
            .map(|token| unescape(token).ok_or_else(|| PointerError::InvalidEscape(raw.to_owned())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: raw.to_owned(),
            tokens,
        })
    }

    /// Whether this pointer addresses the whole document.
    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Decoded reference tokens.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Split into the parent's tokens and the final token (`None` for root).
    pub fn split_last(&self) -> Option<(&[String], &str)> {
        self.tokens
            .split_last()
            .map(|(last, parent)| (parent, last.as_str()))
    }

    /// Whether `self` is a proper descendant of `other`.
    pub fn is_descendant_of(&self, other: &Self) -> bool {
        self.tokens.len() > other.tokens.len() && self.tokens.starts_with(&other.tokens)
    }

    /// The pointer text as supplied.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse an array index token: canonical decimal, no sign, no leading zeros.
pub fn parse_index(token: &str) -> Option<usize> {
    let canonical = token == "0" || (!token.starts_with('0') && !token.is_empty());
    if !canonical || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn unescape(token: &str) -> Option<String> {
    if !token.contains('~') {
        return Some(token.to_owned());
    }
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_root() {
        let ptr = JsonPointer::parse("").unwrap();
        assert!(ptr.is_root());
        assert!(ptr.split_last().is_none());
    }

    #[test]
    fn single_slash_is_empty_key() {
        let ptr = JsonPointer::parse("/").unwrap();
        assert_eq!(ptr.tokens(), &[String::new()]);
    }

    #[test]
    fn splits_tokens() {
        let ptr = JsonPointer::parse("/users/0/name").unwrap();
        assert_eq!(ptr.tokens(), &["users", "0", "name"]);
        let (parent, last) = ptr.split_last().unwrap();
        assert_eq!(parent, &["users", "0"]);
        assert_eq!(last, "name");
    }

    #[test]
    fn unescapes_in_rfc_order() {
        let ptr = JsonPointer::parse("/a~1b/m~0n/~01").unwrap();
        assert_eq!(ptr.tokens(), &["a/b", "m~n", "~1"]);
    }

    #[test]
    fn rejects_missing_slash() {
        assert_eq!(
            JsonPointer::parse("users"),
            Err(PointerError::MissingLeadingSlash("users".into()))
        );
    }

    #[test]
    fn rejects_bad_escape() {
        assert!(matches!(
            JsonPointer::parse("/a~2"),
            Err(PointerError::InvalidEscape(_))
        ));
        assert!(matches!(
            JsonPointer::parse("/a~"),
            Err(PointerError::InvalidEscape(_))
        ));
    }

    #[test]
    fn descendant_check() {
        let parent = JsonPointer::parse("/a").unwrap();
        let child = JsonPointer::parse("/a/b").unwrap();
        let sibling = JsonPointer::parse("/ab").unwrap();
        assert!(child.is_descendant_of(&parent));
        assert!(!parent.is_descendant_of(&parent));
        assert!(!sibling.is_descendant_of(&parent));
    }

    #[test]
    fn index_parsing() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("12"), Some(12));
        assert_eq!(parse_index("01"), None);
        assert_eq!(parse_index("-"), None);
        assert_eq!(parse_index("+1"), None);
        assert_eq!(parse_index(""), None);
        assert_eq!(parse_index("1e3"), None);
    }

    #[test]
    fn display_preserves_raw() {
        let ptr = JsonPointer::parse("/a~1b").unwrap();
        assert_eq!(ptr.to_string(), "/a~1b");
        assert_eq!(ptr.as_str(), "/a~1b");
    }
}
