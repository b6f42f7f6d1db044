use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::PosError;

// ── OSM side ──

/// A parsed OpenStreetMap node: coordinates plus its flat tag map.
#[derive(Debug, Clone, PartialEq)]
pub struct OsmNode {
    pub node_id: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub tags: BTreeMap<String, String>,
}

impl OsmNode {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.tag("name")
    }

    pub fn amenity(&self) -> Option<&str> {
        self.tag("amenity")
    }

    pub fn cuisine(&self) -> Option<&str> {
        self.tag("cuisine")
    }

    pub fn street(&self) -> Option<&str> {
        self.tag("addr:street")
    }

    pub fn house_number(&self) -> Option<&str> {
        self.tag("addr:housenumber")
    }

    pub fn postcode(&self) -> Option<&str> {
        self.tag("addr:postcode")
    }

    pub fn city(&self) -> Option<&str> {
        self.tag("addr:city")
    }

    pub fn website(&self) -> Option<&str> {
        self.tag("website")
    }

    pub fn phone(&self) -> Option<&str> {
        self.tag("phone")
    }

    pub fn opening_hours(&self) -> Option<&str> {
        self.tag("opening_hours")
    }
}

// ── POS side ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Cafe,
    Bakery,
    Cafeteria,
    VendingMachine,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Cafe => "CAFE",
            Category::Bakery => "BAKERY",
            Category::Cafeteria => "CAFETERIA",
            Category::VendingMachine => "VENDING_MACHINE",
        }
    }
}

/// Campus zones, in bounding-box priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Region {
    Altstadt,
    Bergheim,
    Inf,
}

impl Region {
    pub fn as_str(self) -> &'static str {
        match self {
            Region::Altstadt => "ALTSTADT",
            Region::Bergheim => "BERGHEIM",
            Region::Inf => "INF",
        }
    }
}

macro_rules! str_enum_impls {
    ($ty:ident { $($text:literal => $variant:ident),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_uppercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    _ => Err(format!("unknown {} '{}'", stringify!($ty).to_lowercase(), s)),
                }
            }
        }
    };
}

str_enum_impls!(Category {
    "CAFE" => Cafe,
    "BAKERY" => Bakery,
    "CAFETERIA" => Cafeteria,
    "VENDING_MACHINE" => VendingMachine,
});

str_enum_impls!(Region {
    "ALTSTADT" => Altstadt,
    "BERGHEIM" => Bergheim,
    "INF" => Inf,
});

/// A point of sale without identity. Only constructible through [`PosBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pos {
    name: String,
    description: String,
    category: Category,
    region: Region,
    street: String,
    house_number: String,
    postal_code: Option<u32>,
    city: String,
}

impl Pos {
    pub fn builder() -> PosBuilder {
        PosBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn street(&self) -> &str {
        &self.street
    }

    pub fn house_number(&self) -> &str {
        &self.house_number
    }

    pub fn postal_code(&self) -> Option<u32> {
        self.postal_code
    }

    pub fn city(&self) -> &str {
        &self.city
    }
}

#[derive(Debug, Default, Clone)]
pub struct PosBuilder {
    name: Option<String>,
    description: Option<String>,
    category: Option<Category>,
    region: Option<Region>,
    street: Option<String>,
    house_number: Option<String>,
    postal_code: Option<u32>,
    city: Option<String>,
}

impl PosBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn street(mut self, street: impl Into<String>) -> Self {
        self.street = Some(street.into());
        self
    }

    pub fn house_number(mut self, house_number: impl Into<String>) -> Self {
        self.house_number = Some(house_number.into());
        self
    }

    pub fn postal_code(mut self, postal_code: Option<u32>) -> Self {
        self.postal_code = postal_code;
        self
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    /// Fails with every empty required field, not just the first.
    pub fn build(self) -> Result<Pos, PosError> {
        let mut missing = Vec::new();
        let mut require = |field: &'static str, value: Option<String>| -> String {
            match value.filter(|v| !v.is_empty()) {
                Some(v) => v,
                None => {
                    missing.push(field);
                    String::new()
                }
            }
        };

        let name = require("name", self.name);
        let description = require("description", self.description);
        let street = require("street", self.street);
        let house_number = require("house_number", self.house_number);
        let city = require("city", self.city);
        if self.category.is_none() {
            missing.push("category");
        }
        if self.region.is_none() {
            missing.push("region");
        }

        match (self.category, self.region) {
            (Some(category), Some(region)) if missing.is_empty() => Ok(Pos {
                name,
                description,
                category,
                region,
                street,
                house_number,
                postal_code: self.postal_code,
                city,
            }),
            _ => Err(PosError::InvalidPos { missing }),
        }
    }
}

/// A stored POS with its identity and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedPos {
    pub id: i64,
    #[serde(flatten)]
    pub pos: Pos,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> PosBuilder {
        Pos::builder()
            .name("Rada Coffee")
            .description("Cafe")
            .category(Category::Cafe)
            .region(Region::Altstadt)
            .street("Untere Straße")
            .house_number("21")
            .postal_code(Some(69117))
            .city("Heidelberg")
    }

    #[test]
    fn builds_complete_pos() {
        let pos = complete().build().unwrap();
        assert_eq!(pos.name(), "Rada Coffee");
        assert_eq!(pos.postal_code(), Some(69117));
        assert_eq!(pos.region(), Region::Altstadt);
    }

    #[test]
    fn postal_code_is_optional() {
        let pos = complete().postal_code(None).build().unwrap();
        assert_eq!(pos.postal_code(), None);
    }

    #[test]
    fn rejects_empty_fields_all_at_once() {
        let err = complete().name("").city("").build().unwrap_err();
        match err {
            PosError::InvalidPos { missing } => assert_eq!(missing, vec!["name", "city"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_missing_enums() {
        let err = Pos::builder()
            .name("x")
            .description("y")
            .street("s")
            .house_number("1")
            .city("c")
            .build()
            .unwrap_err();
        match err {
            PosError::InvalidPos { missing } => assert_eq!(missing, vec!["category", "region"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn enum_text_round_trips_case_insensitively() {
        assert_eq!("vending_machine".parse::<Category>(), Ok(Category::VendingMachine));
        assert_eq!("Inf".parse::<Region>(), Ok(Region::Inf));
        assert_eq!(Category::Cafeteria.to_string(), "CAFETERIA");
        assert!("campus".parse::<Region>().is_err());
    }

    #[test]
    fn empty_tag_values_read_as_absent() {
        let mut tags = BTreeMap::new();
        tags.insert("name".to_string(), String::new());
        tags.insert("addr:city".to_string(), "Heidelberg".to_string());
        let node = OsmNode {
            node_id: 1,
            latitude: 0.0,
            longitude: 0.0,
            tags,
        };
        assert_eq!(node.name(), None);
        assert_eq!(node.city(), Some("Heidelberg"));
    }
}
