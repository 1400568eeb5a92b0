//! Real Las Vegas drop-off points for realistic sequencing fixtures.
//!
//! Coordinates sourced from OpenStreetMap via Overpass API.

use courier_sequencer::GeoPoint;

/// A named stop with coordinates.
#[derive(Debug, Clone)]
pub struct Stop {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

impl Stop {
    pub const fn new(name: &'static str, lat: f64, lon: f64) -> Self {
        Self { name, lat, lon }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// Courier hub the runs leave from.
pub const HUB: Stop = Stop::new("MGM Grand", 36.1023654, -115.1688720);

pub const STRIP_DROPOFFS: &[Stop] = &[
    Stop::new("Hard Rock Cafe", 36.1041592, -115.1722166),
    Stop::new("Public House", 36.1219193, -115.1689317),
    Stop::new("Brooklyn Bowl", 36.1175388, -115.1695094),
    Stop::new("Gordon Ramsay BurGR", 36.1107195, -115.1720818),
    Stop::new("Spago by Wolfgang Puck", 36.1139368, -115.1741462),
    Stop::new("Otto Pizzeria", 36.1231219, -115.1684514),
    Stop::new("Rao's", 36.1163982, -115.1763053),
    Stop::new("Charlie Palmer Steak", 36.0910624, -115.1743364),
];

pub const HENDERSON_DROPOFFS: &[Stop] = &[
    Stop::new("I Love Sushi Henderson", 35.9916660, -115.1028343),
    Stop::new("Islander's Grill", 36.0335058, -114.9856162),
    Stop::new("Naga", 36.0137634, -114.9928676),
    Stop::new("Green Valley Ranch Area", 36.0308, -115.0825),
];
