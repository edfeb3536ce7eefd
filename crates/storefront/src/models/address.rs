//! Shipping addresses.

use serde::{Deserialize, Serialize};

use la_red_core::{AddressId, UserId};

/// A row of `storefront.addresses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub is_default: bool,
}

/// Address fields submitted by the account form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddressInput {
    pub full_name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressInput {
    /// Check required fields, returning the name of the first blank one.
    ///
    /// # Errors
    ///
    /// Returns the offending field name.
    pub fn validate(&self) -> Result<(), &'static str> {
        let required = [
            ("full_name", &self.full_name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("region", &self.region),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(*field),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            full_name: "Ana López".to_string(),
            line1: "Av. Reforma 222".to_string(),
            line2: None,
            city: "CDMX".to_string(),
            region: "CDMX".to_string(),
            postal_code: "06600".to_string(),
            country: "MX".to_string(),
            phone: None,
            is_default: true,
        }
    }

    #[test]
    fn test_validate_accepts_complete_input() {
        assert_eq!(input().validate(), Ok(()));
    }

    #[test]
    fn test_validate_reports_blank_field() {
        let mut address = input();
        address.city = "  ".to_string();
        assert_eq!(address.validate(), Err("city"));
    }
}
