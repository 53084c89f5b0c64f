use std::fmt;

/// Separator between the first and last name inside a [`FullNameKey`].
pub const FULL_NAME_SEPARATOR: &str = "::";

/// A case-folded, whitespace-trimmed string used for key comparisons.
///
/// Equality and ordering are defined on the normalized form only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    /// Normalizes `raw` by lowercasing and trimming surrounding whitespace.
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sort and grouping key of a record: its normalized last name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LastnameKey(NormalizedKey);

impl LastnameKey {
    pub fn new(lastname: &str) -> Self {
        Self(NormalizedKey::new(lastname))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for LastnameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Match key of a record: `firstname::lastname`, both parts normalized.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FullNameKey(NormalizedKey);

impl FullNameKey {
    pub fn new(firstname: &str, lastname: &str) -> Self {
        let firstname = NormalizedKey::new(firstname);
        let lastname = NormalizedKey::new(lastname);

        Self(NormalizedKey(format!(
            "{firstname}{FULL_NAME_SEPARATOR}{lastname}"
        )))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for FullNameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Normalizes a descriptive field for equality comparison.
///
/// Lowercases, turns underscores into spaces and trims, so `"Family_Medicine"` and
/// `" family medicine"` normalize to the same value. Applying it twice is a no-op.
pub fn normalize_field(value: &str) -> String {
    value.to_lowercase().replace('_', " ").trim().to_string()
}

/// Returns `1` when both fields are equal after [`normalize_field`], `0` otherwise.
pub fn fields_match(left: &str, right: &str) -> u8 {
    u8::from(normalize_field(left) == normalize_field(right))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_ignore_case_and_surrounding_whitespace() {
        assert_eq!(LastnameKey::new("  Nistler "), LastnameKey::new("nistler"));
        assert_eq!(
            FullNameKey::new(" Kyle", "NISTLER "),
            FullNameKey::new("kyle", "nistler")
        );
        assert_eq!(FullNameKey::new("Kyle", "Nistler").as_str(), "kyle::nistler");
    }

    #[test]
    fn lastname_keys_order_lexicographically_on_normalized_form() {
        assert!(LastnameKey::new("Adams") < LastnameKey::new("baker"));
        assert!(LastnameKey::new("nistler") > LastnameKey::new("Newton"));
    }

    #[test]
    fn full_name_keys_differ_on_firstname() {
        assert_ne!(
            FullNameKey::new("Anthony", "Nistler"),
            FullNameKey::new("Kyle", "Nistler")
        );
    }

    #[test]
    fn field_normalization_is_idempotent() {
        for value in ["Family_Medicine", "  _Cardiology_ ", "ARAB", "a_b c", ""] {
            let once = normalize_field(value);
            assert_eq!(normalize_field(&once), once, "value {value:?}");
        }
    }

    #[test]
    fn fields_match_after_normalization() {
        assert_eq!(fields_match("Family_Medicine", "family medicine"), 1);
        assert_eq!(fields_match("arab", " ARAB "), 1);
        assert_eq!(fields_match("Cardiology", "Dermatology"), 0);
    }
}
