//! SQL identifier validation.
//!
//! Table and column names are interpolated into SQL text (quoted), so they are
//! restricted to a conservative subset:
//! - Must be non-empty and at most 63 bytes
//! - Must start with an ASCII letter or `_`
//! - Remaining characters must be ASCII alphanumerics or `_`

use crate::error::TypeError;

/// Name of the self-referential merge pointer column.
pub const MERGE_TARGET_COLUMN: &str = "merge_target_id";

/// Primary key column of every mergeable table.
pub const PRIMARY_KEY_COLUMN: &str = "id";

/// Prefix of the alias used when a table is joined to itself to resolve
/// merge targets (`merge_target_<table>`).
pub const MERGE_TARGET_JOIN_PREFIX: &str = "merge_target_";

const MAX_IDENTIFIER_LEN: usize = 63;

/// Validate a table or column name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use chainlink_types::validate_identifier;
///
/// assert!(validate_identifier("artists").is_ok());
/// assert!(validate_identifier("artist_id").is_ok());
/// assert!(validate_identifier("").is_err());
/// assert!(validate_identifier("drop table").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| TypeError::InvalidIdentifier {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let Some(first) = name.chars().next() else {
        return Err(invalid("identifier must not be empty"));
    };

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid("identifier is longer than 63 bytes"));
    }

    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(invalid("must start with an ASCII letter or '_'"));
    }

    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(TypeError::InvalidIdentifier {
            name: name.to_string(),
            reason: format!("contains forbidden character: {ch:?}"),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        for name in ["artists", "records", "artist_id", "_private", "T1"] {
            assert!(validate_identifier(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_quotes_and_spaces() {
        for name in ["", "1abc", "a b", "a\"b", "a;b", "a.b", "naïve"] {
            assert!(validate_identifier(name).is_err(), "{name:?} should be invalid");
        }
    }

    #[test]
    fn rejects_overlong_names() {
        let name = "a".repeat(64);
        let err = validate_identifier(&name).unwrap_err();
        assert!(matches!(err, TypeError::InvalidIdentifier { .. }));
        assert!(validate_identifier(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn join_alias_of_valid_table_stays_valid() {
        let alias = format!("{MERGE_TARGET_JOIN_PREFIX}{}", "a".repeat(50));
        assert!(validate_identifier(&alias).is_ok());
        assert!(validate_identifier(MERGE_TARGET_COLUMN).is_ok());
    }
}
