//! Animal records and their embedded vaccinations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of animal kinds; serialized as the bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AnimalType {
    Cat = 1,
    Chicken = 2,
    Dog = 3,
}

impl TryFrom<u8> for AnimalType {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(AnimalType::Cat),
            2 => Ok(AnimalType::Chicken),
            3 => Ok(AnimalType::Dog),
            other => Err(format!("unknown animal type {}", other)),
        }
    }
}

impl From<AnimalType> for u8 {
    fn from(t: AnimalType) -> u8 { t as u8 }
}

impl AnimalType {
    /// Map a plural route name (`cats`, `chickens`, `dogs`) to its type.
    pub fn from_category(category: &str) -> Option<Self> {
        match category.to_ascii_lowercase().as_str() {
            "cats" => Some(AnimalType::Cat),
            "chickens" => Some(AnimalType::Chicken),
            "dogs" => Some(AnimalType::Dog),
            _ => None,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            AnimalType::Cat => "cats",
            AnimalType::Chicken => "chickens",
            AnimalType::Dog => "dogs",
        }
    }
}

/// A vaccination has no identity of its own: two entries with the same name and
/// both dates are the same vaccination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vaccination {
    pub name: String,
    pub date_given: DateTime<Utc>,
    pub date_needed: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Animal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Relative path of the image attachment (`images/<file>`), empty when none.
    #[serde(default)]
    pub image_url: String,
    #[serde(rename = "type")]
    pub kind: AnimalType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<u32>,
    #[serde(default)]
    pub vaccinations: Vec<Vaccination>,
}

impl Animal {
    pub fn new<S: Into<String>>(name: S, kind: AnimalType) -> Self {
        Self { id: None, name: name.into(), description: String::new(), image_url: String::new(), kind, breed: None, vaccinations: Vec::new() }
    }

    pub fn has_image(&self) -> bool { !self.image_url.is_empty() }

    /// Identifier as text; empty for an animal that was never stored.
    pub fn id_string(&self) -> String {
        self.id.map(|id| id.to_string()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn animal_type_round_trips_as_integer() {
        assert_eq!(serde_json::to_value(AnimalType::Dog).unwrap(), json!(3));
        let t: AnimalType = serde_json::from_value(json!(2)).unwrap();
        assert_eq!(t, AnimalType::Chicken);
        assert!(serde_json::from_value::<AnimalType>(json!(7)).is_err());
    }

    #[test]
    fn categories_map_to_types() {
        assert_eq!(AnimalType::from_category("cats"), Some(AnimalType::Cat));
        assert_eq!(AnimalType::from_category("Chickens"), Some(AnimalType::Chicken));
        assert_eq!(AnimalType::from_category("dogs"), Some(AnimalType::Dog));
        assert_eq!(AnimalType::from_category("horses"), None);
        assert_eq!(AnimalType::Dog.category(), "dogs");
    }

    #[test]
    fn minimal_body_decodes_with_defaults() {
        let a: Animal = serde_json::from_value(json!({"name": "Rex", "type": 3})).unwrap();
        assert_eq!(a, Animal::new("Rex", AnimalType::Dog));
        let out = serde_json::to_value(&a).unwrap();
        assert!(out.get("id").is_none());
        assert_eq!(out["imageUrl"], json!(""));
        assert_eq!(out["type"], json!(3));
    }

    #[test]
    fn vaccination_uses_camel_case_dates() {
        let v: Vaccination = serde_json::from_value(json!({
            "name": "rabies",
            "dateGiven": "2024-01-01T00:00:00Z",
            "dateNeeded": "2025-01-01T00:00:00Z"
        })).unwrap();
        assert_eq!(v.name, "rabies");
        assert_eq!(serde_json::to_value(&v).unwrap()["dateNeeded"], json!("2025-01-01T00:00:00Z"));
    }
}
