//! Great-circle distance between WGS84 coordinates.
//!
//! All distances leaving this module are in nautical miles, so speeds derived
//! from them are in knots. `distance_km` exists for callers that need to
//! convert at a boundary.

use serde::{Deserialize, Serialize};

use crate::errors::TrackerError;

/// Earth's mean radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometers to nautical miles.
pub const KM_TO_NAUTICAL_MILES: f64 = 0.539957;

/// A validated latitude/longitude pair in decimal degrees.
///
/// Construction goes through [`Coordinate::new`], which rejects NaN and
/// out-of-range values, so every `Coordinate` in the crate is a valid point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = TrackerError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.latitude, raw.longitude)
    }
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, TrackerError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        if !valid {
            return Err(TrackerError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    fn to_radians(self) -> (f64, f64) {
        (self.latitude.to_radians(), self.longitude.to_radians())
    }
}

/// Central angle between two points, in radians.
fn central_angle(from: Coordinate, to: Coordinate) -> f64 {
    let (lat1, lon1) = from.to_radians();
    let (lat2, lon2) = to.to_radians();

    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    // Rounding can push `a` marginally outside [0, 1] for antipodal points
    let a = a.clamp(0.0, 1.0);

    2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Great-circle distance in kilometers.
pub fn distance_km(from: Coordinate, to: Coordinate) -> f64 {
    EARTH_RADIUS_KM * central_angle(from, to)
}

/// Great-circle distance in nautical miles.
pub fn distance(from: Coordinate, to: Coordinate) -> f64 {
    distance_km(from, to) * KM_TO_NAUTICAL_MILES
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn surat_to_barcelona() {
        let surat = coord(22.3072, 73.1812);
        let barcelona = coord(41.3851, 2.1734);

        let km = distance_km(surat, barcelona);
        let nm = distance(surat, barcelona);

        assert!((km - 6840.8).abs() < 1.0, "km: {}", km);
        assert!((nm - 3693.7).abs() < 1.0, "nm: {}", nm);
        assert_eq!(nm, distance(surat, barcelona));
    }

    #[test]
    fn one_degree_of_longitude_on_equator() {
        let d = distance(coord(0.0, 0.0), coord(0.0, 1.0));
        assert!((d - 60.04).abs() < 0.01, "distance: {}", d);
    }

    #[test]
    fn symmetric_and_zero_on_identity() {
        let points = [
            coord(60.192059, 24.945831),
            coord(-33.8688, 151.2093),
            coord(89.9, -179.9),
            coord(0.0, 180.0),
            coord(-90.0, 0.0),
        ];
        for a in points {
            assert_eq!(distance(a, a), 0.0);
            for b in points {
                assert_eq!(distance(a, b), distance(b, a));
                if a != b {
                    assert!(distance(a, b) > 0.0);
                }
            }
        }
    }

    #[test]
    fn triangle_inequality() {
        let points = [
            coord(22.3072, 73.1812),
            coord(12.7855, 45.0187),
            coord(29.9668, 32.5498),
            coord(41.3851, 2.1734),
            coord(-33.8688, 151.2093),
        ];
        for a in points {
            for b in points {
                for c in points {
                    let direct = distance(a, c);
                    let via = distance(a, b) + distance(b, c);
                    assert!(direct <= via + 1e-6, "{:?} {:?} {:?}", a, b, c);
                }
            }
        }
    }

    #[test]
    fn antipodal_points_are_half_circumference() {
        let d = distance_km(coord(0.0, 0.0), coord(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn rejects_invalid_coordinates() {
        for (lat, lon) in [
            (f64::NAN, 0.0),
            (0.0, f64::NAN),
            (90.1, 0.0),
            (-90.1, 0.0),
            (0.0, 180.5),
            (0.0, -181.0),
            (f64::INFINITY, 0.0),
        ] {
            assert!(
                matches!(
                    Coordinate::new(lat, lon),
                    Err(TrackerError::InvalidCoordinate { .. })
                ),
                "accepted ({}, {})",
                lat,
                lon
            );
        }
    }

    #[test]
    fn deserialize_validates() {
        let ok: Coordinate = serde_json::from_str(r#"{"latitude":1.5,"longitude":2.5}"#).unwrap();
        assert_eq!(ok, coord(1.5, 2.5));

        let bad = serde_json::from_str::<Coordinate>(r#"{"latitude":91.0,"longitude":2.5}"#);
        assert!(bad.is_err());
    }
}
