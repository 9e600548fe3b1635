#![forbid(unsafe_code)]

//! Jurisdiction records as delivered by a data source.

use std::fmt;

/// Identifier of a jurisdiction.
///
/// Ids are only unique among the children of one parent, never globally.
/// Use [`NodePath`](crate::NodePath) to address a node in the forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct JurisdictionId(pub i64);

impl JurisdictionId {
    /// Raw integer value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for JurisdictionId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for JurisdictionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A jurisdiction record: `{ id, name }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Jurisdiction {
    pub id: JurisdictionId,
    pub name: String,
}

impl Jurisdiction {
    /// Create a record from an id and a display name.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id: JurisdictionId(id),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_wraps_raw_id() {
        let j = Jurisdiction::new(7, "Kent");
        assert_eq!(j.id, JurisdictionId(7));
        assert_eq!(j.id.get(), 7);
        assert_eq!(j.name, "Kent");
    }

    #[test]
    fn id_displays_as_integer() {
        assert_eq!(JurisdictionId(-3).to_string(), "-3");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializes_flat_record() {
        let j: Jurisdiction = serde_json::from_str(r#"{"id":1,"name":"USA"}"#).unwrap();
        assert_eq!(j, Jurisdiction::new(1, "USA"));
    }
}
