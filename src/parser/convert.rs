use tracing::{debug, warn};

use crate::error::PosError;
use crate::model::{Category, OsmNode, Pos, Region};

/// Tags a node needs before it can become a POS, in reporting order.
const REQUIRED_TAGS: [&str; 5] = [
    "name",
    "addr:street",
    "addr:housenumber",
    "addr:postcode",
    "addr:city",
];

pub const FALLBACK_DESCRIPTION: &str = "Imported from OpenStreetMap";

struct CampusBox {
    region: Region,
    lat: (f64, f64),
    lon: (f64, f64),
}

// Checked in order; the boxes touch at their edges and the first match wins.
const CAMPUS_BOXES: [CampusBox; 3] = [
    CampusBox {
        region: Region::Altstadt,
        lat: (49.408, 49.414),
        lon: (8.705, 8.715),
    },
    CampusBox {
        region: Region::Bergheim,
        lat: (49.412, 49.418),
        lon: (8.665, 8.680),
    },
    CampusBox {
        region: Region::Inf,
        lat: (49.415, 49.425),
        lon: (8.665, 8.675),
    },
];

pub fn convert(node: &OsmNode) -> Result<Pos, PosError> {
    debug!("Converting OSM node {} to POS", node.node_id);

    let missing = missing_fields(node);
    if !missing.is_empty() {
        warn!(
            "OSM node {} is missing required fields: {:?}",
            node.node_id, missing
        );
        return Err(PosError::MissingFields {
            node_id: node.node_id,
            fields: missing,
        });
    }

    Pos::builder()
        .name(node.name().unwrap_or_default())
        .description(describe(node.amenity(), node.cuisine()))
        .category(category_for(node.amenity()))
        .region(region_for(node.latitude, node.longitude))
        .street(node.street().unwrap_or_default())
        .house_number(node.house_number().unwrap_or_default())
        .postal_code(parse_postal_code(node.postcode()))
        .city(node.city().unwrap_or_default())
        .build()
}

pub fn missing_fields(node: &OsmNode) -> Vec<&'static str> {
    REQUIRED_TAGS
        .into_iter()
        .filter(|key| node.tag(key).is_none())
        .collect()
}

pub fn category_for(amenity: Option<&str>) -> Category {
    match amenity.unwrap_or_default().to_lowercase().as_str() {
        "cafe" => Category::Cafe,
        "bakery" => Category::Bakery,
        "restaurant" | "fast_food" => Category::Cafeteria,
        "vending_machine" => Category::VendingMachine,
        other => {
            debug!("Unknown amenity type '{}', defaulting to CAFE", other);
            Category::Cafe
        }
    }
}

pub fn region_for(latitude: f64, longitude: f64) -> Region {
    let hit = CAMPUS_BOXES.iter().find(|b| {
        (b.lat.0..=b.lat.1).contains(&latitude) && (b.lon.0..=b.lon.1).contains(&longitude)
    });
    match hit {
        Some(b) => b.region,
        None => {
            debug!(
                "Coordinates ({}, {}) match no campus, defaulting to ALTSTADT",
                latitude, longitude
            );
            Region::Altstadt
        }
    }
}

pub fn parse_postal_code(raw: Option<&str>) -> Option<u32> {
    let raw = raw?;
    // Range of a signed 32-bit integer, negatives dropped.
    match raw.trim().parse::<i32>().map(u32::try_from) {
        Ok(Ok(code)) => Some(code),
        _ => {
            warn!("Invalid postal code format: '{}', leaving it empty", raw);
            None
        }
    }
}

/// "fast_food" + "coffee_shop" -> "Fast food - coffee shop".
pub fn describe(amenity: Option<&str>, cuisine: Option<&str>) -> String {
    let mut desc = amenity.map(capitalize).unwrap_or_default();
    if let Some(cuisine) = cuisine {
        if !desc.is_empty() {
            desc.push_str(" - ");
        }
        desc.push_str(cuisine);
    }
    if desc.is_empty() {
        return FALLBACK_DESCRIPTION.to_string();
    }
    desc.replace('_', " ")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            // Keep the character when its upper case is not a single char (ß -> SS).
            let mut upper = first.to_uppercase();
            let head = match (upper.next(), upper.next()) {
                (Some(u), None) => u,
                _ => first,
            };
            std::iter::once(head).chain(chars).collect()
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::xml::parse_node;

    fn node(name: &str) -> OsmNode {
        let xml = std::fs::read_to_string(format!("tests/fixtures/{}.xml", name)).unwrap();
        parse_node(&xml, 1).unwrap()
    }

    #[test]
    fn rada_coffee_pos() {
        let pos = convert(&node("rada_coffee")).unwrap();
        assert_eq!(pos.name(), "Rada Coffee");
        assert_eq!(pos.category(), Category::Cafe);
        assert_eq!(pos.region(), Region::Altstadt);
        assert_eq!(pos.postal_code(), Some(69117));
        assert_eq!(pos.description(), "Cafe");
        assert_eq!(pos.street(), "Untere Straße");
        assert_eq!(pos.house_number(), "21");
        assert_eq!(pos.city(), "Heidelberg");
    }

    #[test]
    fn duplicate_tags_pos() {
        let pos = convert(&node("duplicate_tags")).unwrap();
        assert_eq!(pos.name(), "B");
        assert_eq!(pos.category(), Category::Cafeteria);
        // On the Bergheim/INF edge; Bergheim is checked first.
        assert_eq!(pos.region(), Region::Bergheim);
        assert_eq!(pos.postal_code(), Some(69115));
        assert_eq!(pos.description(), "Fast food");
    }

    #[test]
    fn bakery_with_bad_postcode_still_converts() {
        let pos = convert(&node("bakery")).unwrap();
        assert_eq!(pos.category(), Category::Bakery);
        assert_eq!(pos.postal_code(), None);
        assert_eq!(pos.description(), "Bakery - german bread");
        assert_eq!(pos.region(), Region::Altstadt);
    }

    #[test]
    fn missing_fields_reported_in_check_order() {
        let err = convert(&node("no_address")).unwrap_err();
        match err {
            PosError::MissingFields { node_id, fields } => {
                assert_eq!(node_id, 1);
                assert_eq!(
                    fields,
                    vec!["name", "addr:street", "addr:postcode", "addr:city"]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn every_missing_combination_is_listed_exactly() {
        let base = node("rada_coffee");
        for mask in 1u32..(1 << REQUIRED_TAGS.len()) {
            let mut n = base.clone();
            let mut expected = Vec::new();
            for (i, key) in REQUIRED_TAGS.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    n.tags.remove(*key);
                    expected.push(*key);
                }
            }
            match convert(&n) {
                Err(PosError::MissingFields { fields, .. }) => assert_eq!(fields, expected),
                other => panic!("mask {mask:05b}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn category_table() {
        assert_eq!(category_for(Some("cafe")), Category::Cafe);
        assert_eq!(category_for(Some("bakery")), Category::Bakery);
        assert_eq!(category_for(Some("restaurant")), Category::Cafeteria);
        assert_eq!(category_for(Some("FAST_FOOD")), Category::Cafeteria);
        assert_eq!(category_for(Some("Fast_Food")), Category::Cafeteria);
        assert_eq!(category_for(Some("vending_machine")), Category::VendingMachine);
    }

    #[test]
    fn unknown_or_absent_amenity_defaults_to_cafe() {
        assert_eq!(category_for(None), Category::Cafe);
        assert_eq!(category_for(Some("")), Category::Cafe);
        assert_eq!(category_for(Some("pub")), Category::Cafe);
        assert_eq!(category_for(Some("ice_cream")), Category::Cafe);
    }

    #[test]
    fn region_boxes() {
        assert_eq!(region_for(49.411, 8.710), Region::Altstadt);
        assert_eq!(region_for(49.416, 8.678), Region::Bergheim);
        assert_eq!(region_for(49.420, 8.670), Region::Inf);
    }

    #[test]
    fn region_bounds_are_inclusive() {
        assert_eq!(region_for(49.408, 8.705), Region::Altstadt);
        assert_eq!(region_for(49.425, 8.675), Region::Inf);
        assert_eq!(region_for(49.412, 8.665), Region::Bergheim);
    }

    #[test]
    fn region_priority_resolves_overlap() {
        // Shared edge of Bergheim and INF.
        assert_eq!(region_for(49.418, 8.670), Region::Bergheim);
        assert_eq!(region_for(49.4181, 8.670), Region::Inf);
    }

    #[test]
    fn unmatched_coordinates_default_to_altstadt() {
        assert_eq!(region_for(0.0, 0.0), Region::Altstadt);
        assert_eq!(region_for(49.41, 8.69), Region::Altstadt);
        assert_eq!(region_for(49.430, 8.670), Region::Altstadt);
    }

    #[test]
    fn postal_codes() {
        assert_eq!(parse_postal_code(Some("69117")), Some(69117));
        assert_eq!(parse_postal_code(Some(" 69117\t")), Some(69117));
        assert_eq!(parse_postal_code(Some("N/A")), None);
        assert_eq!(parse_postal_code(Some("D-69117")), None);
        assert_eq!(parse_postal_code(None), None);
    }

    #[test]
    fn postal_codes_outside_i32_range_are_dropped() {
        assert_eq!(parse_postal_code(Some("2147483647")), Some(2_147_483_647));
        assert_eq!(parse_postal_code(Some("2147483648")), None);
        assert_eq!(parse_postal_code(Some("3000000000")), None);
        assert_eq!(parse_postal_code(Some("-1")), None);
    }

    #[test]
    fn descriptions() {
        assert_eq!(describe(Some("cafe"), None), "Cafe");
        assert_eq!(describe(Some("vending_machine"), None), "Vending machine");
        assert_eq!(
            describe(Some("cafe"), Some("coffee_shop")),
            "Cafe - coffee shop"
        );
        assert_eq!(describe(None, Some("italian")), "italian");
        assert_eq!(describe(None, None), FALLBACK_DESCRIPTION);
        assert_eq!(describe(Some("éclair"), None), "Éclair");
        assert_eq!(describe(Some("ßbar"), None), "ßbar");
    }
}
