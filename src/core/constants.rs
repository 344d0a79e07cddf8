//! Reference geography for the Washington DC overlays

use super::geo::LngLat;

/// Power substation used by the grid-membership check.
#[derive(Clone, Copy, Debug)]
pub struct Substation {
    pub name: &'static str,
    pub coordinates: LngLat,
}

pub const DC_SUBSTATIONS: &[Substation] = &[
    Substation { name: "Georgetown Substation", coordinates: [-77.0366, 38.9077] },
    Substation { name: "Capitol Hill Substation", coordinates: [-77.0214, 38.8921] },
    Substation { name: "Tenleytown Grid Hub", coordinates: [-77.0491, 38.9241] },
    Substation { name: "Union Station Power Center", coordinates: [-77.0131, 38.9129] },
    Substation { name: "Downtown DC Main", coordinates: [-77.0303, 38.8980] },
    Substation { name: "Pentagon City Exchange", coordinates: [-77.0492, 38.8846] },
];

/// Straight corridor between two points, used when no road data is loaded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corridor {
    pub start: LngLat,
    pub end: LngLat,
}

pub const DC_CORRIDORS: &[Corridor] = &[
    // Dupont Circle
    Corridor { start: [-77.0434, 38.9097], end: [-77.0434, 38.9086] },
    Corridor { start: [-77.0434, 38.9086], end: [-77.0425, 38.9090] },
    Corridor { start: [-77.0425, 38.9090], end: [-77.0434, 38.9097] },
    // Logan Circle
    Corridor { start: [-77.0319, 38.9097], end: [-77.0319, 38.9086] },
    Corridor { start: [-77.0319, 38.9086], end: [-77.0309, 38.9090] },
    Corridor { start: [-77.0309, 38.9090], end: [-77.0319, 38.9097] },
    // K Street
    Corridor { start: [-77.0501, 38.9026], end: [-77.0366, 38.9026] },
    Corridor { start: [-77.0366, 38.9026], end: [-77.0209, 38.9026] },
    Corridor { start: [-77.0209, 38.9026], end: [-77.0120, 38.9026] },
    // Pennsylvania Avenue
    Corridor { start: [-77.0501, 38.8977], end: [-77.0366, 38.8977] },
    Corridor { start: [-77.0366, 38.8977], end: [-77.0209, 38.8977] },
    // Long diagonals
    Corridor { start: [-77.0366, 38.9077], end: [-77.0214, 38.8921] },
    Corridor { start: [-77.0491, 38.9241], end: [-77.0131, 38.9129] },
];
