//! School models.

use serde::{Deserialize, Serialize};

/// Database identifier of a school.
pub type SchoolId = i64;

/// Postal address of a school.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub district: String,
    pub city: String,
    /// Two-letter state code
    pub state: String,
    pub postal_code: String,
}

/// A registered school, as read back from storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct School {
    pub id: SchoolId,
    pub name: String,
    pub address: Address,
    /// Administrative region label
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Number of students referencing this school (derived, not stored)
    pub total_students: u32,
}

impl School {
    /// Region label, or `fallback` when the school has none.
    pub fn region_label<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.region.as_deref().unwrap_or(fallback)
    }

    /// Latitude/longitude pair, only when both are known.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Registration payload for a new school.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSchool {
    pub name: String,
    pub address: Address,
    pub region: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl NewSchool {
    /// Create a registration with required fields and an empty address.
    pub fn new(name: String, region: String) -> Self {
        Self {
            name,
            address: Address::default(),
            region,
            latitude: None,
            longitude: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn school(region: Option<&str>, lat: Option<f64>, lon: Option<f64>) -> School {
        School {
            id: 1,
            name: "EC 01".into(),
            address: Address::default(),
            region: region.map(Into::into),
            latitude: lat,
            longitude: lon,
            total_students: 0,
        }
    }

    #[test]
    fn test_region_label_fallback() {
        assert_eq!(school(Some("Taguatinga"), None, None).region_label("Sem Região"), "Taguatinga");
        assert_eq!(school(None, None, None).region_label("Sem Região"), "Sem Região");
    }

    #[test]
    fn test_coordinates_require_both() {
        assert_eq!(school(None, Some(-15.8), None).coordinates(), None);
        assert_eq!(
            school(None, Some(-15.8), Some(-48.0)).coordinates(),
            Some((-15.8, -48.0))
        );
    }
}
