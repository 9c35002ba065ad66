use crate::error::Result;
use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Resolves a project location to coordinates.
///
/// Implementations own any network or cache access; `Ok(None)` means the address
/// is valid but unknown.
pub trait Geocoder {
    fn locate(&self, address: &str) -> Result<Option<Coordinates>>;
}

/// Locations printed in the budget books that do not name a place.
const NON_ADDRESSES: [&str; 3] = ["CITY-WIDE", "TBD", "WASHINGTON DC"];

pub fn is_geocodable(location: &str) -> bool {
    let location = location.trim();
    !location.is_empty()
        && !NON_ADDRESSES.contains(&location)
        && !location.starts_with("WARD")
}

/// Looks up a location, treating every failure as "no coordinates".
pub fn resolve_location(geocoder: &dyn Geocoder, location: Option<&str>) -> Option<Coordinates> {
    let location = location.filter(|l| is_geocodable(l))?;
    match geocoder.locate(location) {
        Ok(coordinates) => coordinates,
        Err(e) => {
            warn!("Geocoding '{}' failed: {}", location, e);
            None
        }
    }
}

/// Never resolves anything.
pub struct NoGeocoder;

impl Geocoder for NoGeocoder {
    fn locate(&self, _address: &str) -> Result<Option<Coordinates>> {
        Ok(None)
    }
}

/// Resolves addresses from a fixed table, e.g. a cache of earlier lookups.
/// Matching ignores case and surrounding whitespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticGeocoder {
    table: BTreeMap<String, Coordinates>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: &str, coordinates: Coordinates) {
        self.table.insert(Self::normalize(address), coordinates);
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, Coordinates> = serde_json::from_str(json)?;
        let mut geocoder = Self::new();
        for (address, coordinates) in raw {
            geocoder.insert(&address, coordinates);
        }
        Ok(geocoder)
    }

    fn normalize(address: &str) -> String {
        address.trim().to_uppercase()
    }
}

impl Geocoder for StaticGeocoder {
    fn locate(&self, address: &str) -> Result<Option<Coordinates>> {
        Ok(self.table.get(&Self::normalize(address)).copied())
    }
}
