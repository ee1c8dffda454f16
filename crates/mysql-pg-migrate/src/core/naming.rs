//! Column identifier normalization.

use std::collections::HashMap;

use crate::error::{MigrateError, Result};

/// Normalize a raw column identifier into camel style.
///
/// Identifiers containing `_` are split on `_`; otherwise identifiers
/// containing a space are split on spaces; anything else is returned as is.
/// The first component is kept verbatim and every later component has its
/// first character upper-cased.
///
/// ```
/// use mysql_pg_migrate::core::naming::normalize;
///
/// assert_eq!(normalize("first_name"), "firstName");
/// assert_eq!(normalize("user id"), "userId");
/// assert_eq!(normalize("email"), "email");
/// ```
#[must_use]
pub fn normalize(identifier: &str) -> String {
    let separator = if identifier.contains('_') {
        '_'
    } else if identifier.contains(' ') {
        ' '
    } else {
        return identifier.to_string();
    };

    let mut parts = identifier.split(separator);
    let mut out = String::with_capacity(identifier.len());
    if let Some(first) = parts.next() {
        out.push_str(first);
    }
    for part in parts {
        let mut chars = part.chars();
        if let Some(c) = chars.next() {
            out.extend(c.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Order-preserving, one-to-one mapping from raw to normalized column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNameMapping {
    raw: Vec<String>,
    normalized: Vec<String>,
}

impl ColumnNameMapping {
    /// Build the mapping for a table header.
    ///
    /// # Errors
    ///
    /// Returns a Transfer error when two raw names normalize to the same
    /// identifier.
    pub fn from_header(table: &str, raw: &[String]) -> Result<Self> {
        let normalized: Vec<String> = raw.iter().map(|c| normalize(c)).collect();

        let mut seen: HashMap<&str, &str> = HashMap::with_capacity(raw.len());
        for (raw_name, norm) in raw.iter().zip(&normalized) {
            if let Some(prev) = seen.insert(norm.as_str(), raw_name.as_str()) {
                return Err(MigrateError::transfer(
                    table,
                    format!(
                        "columns '{}' and '{}' both normalize to '{}'",
                        prev, raw_name, norm
                    ),
                ));
            }
        }

        Ok(Self {
            raw: raw.to_vec(),
            normalized,
        })
    }

    /// Check that a later chunk was read under the same header.
    pub fn ensure_header(&self, table: &str, header: &[String]) -> Result<()> {
        if self.raw.as_slice() != header {
            return Err(MigrateError::transfer(
                table,
                format!(
                    "chunk header {:?} differs from first chunk header {:?}",
                    header, self.raw
                ),
            ));
        }
        Ok(())
    }

    /// Raw identifiers in source order.
    pub fn raw(&self) -> &[String] {
        &self.raw
    }

    /// Normalized identifiers in source order.
    pub fn normalized(&self) -> &[String] {
        &self.normalized
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_examples() {
        assert_eq!(normalize("first_name"), "firstName");
        assert_eq!(normalize("user id"), "userId");
        assert_eq!(normalize("email"), "email");
        assert_eq!(normalize("a_b_c"), "aBC");
        assert_eq!(normalize("a b c"), "aBC");
    }

    #[test]
    fn test_normalize_without_separator_is_identity() {
        for id in ["id", "firstName", "ID", "", "naïve", "x-y"] {
            assert_eq!(normalize(id), id);
        }
    }

    #[test]
    fn test_normalize_underscore_wins_over_space() {
        assert_eq!(normalize("first name_x"), "first nameX");
    }

    #[test]
    fn test_normalize_empty_components() {
        assert_eq!(normalize("a__b"), "aB");
        assert_eq!(normalize("_id"), "Id");
        assert_eq!(normalize("id_"), "id");
    }

    #[test]
    fn test_normalize_keeps_remainder_case() {
        assert_eq!(normalize("order_ID"), "orderID");
        assert_eq!(normalize("ORDER_total"), "ORDERTotal");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for id in ["first_name", "user id", "a_b_c", "a b c", "email", "x__y"] {
            let once = normalize(id);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_mapping_preserves_order() {
        let mapping =
            ColumnNameMapping::from_header("users", &names(&["id", "first_name", "last name"]))
                .unwrap();
        assert_eq!(mapping.normalized(), &names(&["id", "firstName", "lastName"])[..]);
        assert_eq!(mapping.raw(), &names(&["id", "first_name", "last name"])[..]);
        assert_eq!(mapping.len(), 3);
    }

    #[test]
    fn test_mapping_rejects_collisions() {
        let err = ColumnNameMapping::from_header("users", &names(&["first_name", "firstName"]))
            .unwrap_err();
        match err {
            MigrateError::Transfer { table, message } => {
                assert_eq!(table, "users");
                assert!(message.contains("firstName"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_mapping_detects_header_drift() {
        let mapping = ColumnNameMapping::from_header("t", &names(&["a", "b"])).unwrap();
        assert!(mapping.ensure_header("t", &names(&["a", "b"])).is_ok());
        assert!(mapping.ensure_header("t", &names(&["a", "c"])).is_err());
    }
}
