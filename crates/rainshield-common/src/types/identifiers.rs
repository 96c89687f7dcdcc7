//! Identifiers and bounded lookup keys
//!
//! Regions and crop types are used as keys into the climate ledger and the
//! risk pool book. Both are bounded so a key can always be stored by the host
//! ledger under a fixed-size slot.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::{MAX_CROP_TYPE_LEN, MAX_ORACLE_NAME_LEN, MAX_REGION_LEN};

/// Authenticated participant as reported by the host ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn check_bounds(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    if value.len() > max {
        return Err(ValidationError::FieldTooLong {
            field,
            len: value.len(),
            max,
        });
    }
    Ok(())
}

macro_rules! bounded_string {
    ($(#[$meta:meta])* $name:ident, $field:literal, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                let value = value.into();
                check_bounds($field, &value, $max)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValidationError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

bounded_string!(
    /// Geographic region an observation or policy is indexed by
    Region,
    "region",
    MAX_REGION_LEN
);

bounded_string!(
    /// Crop type selecting the risk pool a policy draws on
    CropType,
    "crop_type",
    MAX_CROP_TYPE_LEN
);

bounded_string!(
    /// Display name carried by an oracle registration
    OracleName,
    "oracle_name",
    MAX_ORACLE_NAME_LEN
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_bounds() {
        assert!(Region::new("kenya-rift-valley").is_ok());
        assert_eq!(
            Region::new(""),
            Err(ValidationError::EmptyField { field: "region" })
        );

        let long = "r".repeat(MAX_REGION_LEN + 1);
        assert!(matches!(
            Region::new(long),
            Err(ValidationError::FieldTooLong { field: "region", len: 51, max: 50 })
        ));
        assert!(Region::new("r".repeat(MAX_REGION_LEN)).is_ok());
    }

    #[test]
    fn test_crop_type_bounds() {
        assert!(CropType::new("maize").is_ok());
        assert!(CropType::new("c".repeat(MAX_CROP_TYPE_LEN + 1)).is_err());
    }

    #[test]
    fn test_serde_rejects_out_of_bounds() {
        let ok: CropType = serde_json::from_str("\"wheat\"").unwrap();
        assert_eq!(ok.as_str(), "wheat");
        assert!(serde_json::from_str::<CropType>("\"\"").is_err());
    }

    #[test]
    fn test_identity_display() {
        let id = Identity::from("farmer-1");
        assert_eq!(id.to_string(), "farmer-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"farmer-1\"");
    }
}
