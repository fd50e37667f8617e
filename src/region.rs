//! Sea area labels for vessel positions.

use ::geo::{coord, Intersects, Rect};

use crate::geo::Coordinate;

/// A named sea area approximated by a longitude/latitude box
struct SeaArea {
    name: &'static str,
    bounds: Rect<f64>,
}

impl SeaArea {
    fn new(name: &'static str, min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            name,
            bounds: Rect::new(
                coord! { x: min_lon, y: min_lat },
                coord! { x: max_lon, y: max_lat },
            ),
        }
    }
}

/// Lookup of the sea area containing a position.
///
/// Areas are checked in order, so smaller enclosed seas must come before the
/// oceans around them. Positions outside every area get a coordinate label.
pub struct RegionLookup {
    areas: Vec<SeaArea>,
}

impl Default for RegionLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionLookup {
    pub fn new() -> Self {
        let areas = vec![
            SeaArea::new("Strait of Gibraltar", -6.2, 35.7, -5.2, 36.2),
            SeaArea::new("Suez Canal", 32.2, 29.9, 32.6, 31.3),
            SeaArea::new("Strait of Hormuz", 55.8, 25.8, 57.2, 27.0),
            SeaArea::new("Strait of Malacca", 95.0, 1.0, 104.0, 6.0),
            SeaArea::new("English Channel", -5.7, 48.5, 1.8, 51.1),
            SeaArea::new("Baltic Sea", 9.5, 53.5, 30.5, 66.0),
            SeaArea::new("North Sea", -4.0, 51.0, 9.5, 61.0),
            SeaArea::new("Black Sea", 27.3, 40.9, 41.8, 46.8),
            SeaArea::new("Mediterranean Sea", -5.2, 30.0, 36.5, 45.9),
            SeaArea::new("Red Sea", 32.3, 12.5, 43.5, 29.9),
            SeaArea::new("Gulf of Aden", 43.3, 10.5, 51.5, 15.0),
            SeaArea::new("Persian Gulf", 47.5, 24.0, 56.5, 30.5),
            SeaArea::new("Gulf of Oman", 56.5, 22.0, 61.5, 26.5),
            SeaArea::new("Arabian Sea", 51.0, 0.0, 77.5, 25.5),
            SeaArea::new("Bay of Bengal", 77.5, 5.0, 95.0, 23.0),
            SeaArea::new("South China Sea", 99.0, -3.0, 121.0, 23.0),
            SeaArea::new("East China Sea", 117.0, 23.0, 131.0, 33.0),
            SeaArea::new("Sea of Japan", 127.0, 33.0, 142.0, 52.0),
            SeaArea::new("Caribbean Sea", -89.0, 9.0, -60.0, 22.0),
            SeaArea::new("Gulf of Mexico", -98.0, 18.0, -80.5, 31.0),
            SeaArea::new("Indian Ocean", 20.0, -60.0, 147.0, 30.0),
            SeaArea::new("North Atlantic Ocean", -98.0, 0.0, 20.0, 70.0),
            SeaArea::new("South Atlantic Ocean", -70.0, -60.0, 20.0, 0.0),
            SeaArea::new("North Pacific Ocean", 100.0, 0.0, 180.0, 66.0),
            SeaArea::new("North Pacific Ocean", -180.0, 0.0, -78.0, 66.0),
            SeaArea::new("South Pacific Ocean", 147.0, -60.0, 180.0, 0.0),
            SeaArea::new("South Pacific Ocean", -180.0, -60.0, -70.0, 0.0),
            SeaArea::new("Arctic Ocean", -180.0, 66.0, 180.0, 90.0),
            SeaArea::new("Southern Ocean", -180.0, -90.0, 180.0, -60.0),
        ];
        Self { areas }
    }

    /// Label for the first area containing `position`, edges included
    pub fn region(&self, position: Coordinate) -> String {
        let pt = coord! { x: position.longitude(), y: position.latitude() };

        self.areas
            .iter()
            .find(|area| area.bounds.intersects(&pt))
            .map(|area| area.name.to_string())
            .unwrap_or_else(|| coordinate_label(position))
    }
}

/// Human-readable position such as `22.31°N 73.18°E`
pub fn coordinate_label(position: Coordinate) -> String {
    let lat = position.latitude();
    let lon = position.longitude();
    format!(
        "{:.2}°{} {:.2}°{}",
        lat.abs(),
        if lat < 0.0 { 'S' } else { 'N' },
        lon.abs(),
        if lon < 0.0 { 'W' } else { 'E' }
    )
}
