//! Geographic coordinates and their cache identities.
//!
//! A [`Coordinate`] is a plain latitude/longitude pair. No range validation is
//! performed: out-of-range values are passed through to providers untouched.
//!
//! Cache identity is derived by rounding both components to four decimal
//! places (~11m at the equator), so nearby fixes from a moving vehicle share a
//! cache slot.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of decimal places used for keys and fallback labels.
pub const KEY_PRECISION: usize = 4;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate from latitude and longitude in degrees.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns true if both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Geocode cache key: `"{lat},{lon}"` rounded to four decimals.
    ///
    /// Small negative values keep their sign (`"-0.0000"`), so fixes just
    /// either side of the equator do not share a key.
    pub fn cache_key(&self) -> String {
        format!(
            "{},{}",
            fixed_key_component(self.latitude),
            fixed_key_component(self.longitude)
        )
    }

    /// Route cache key component: `"{lat}_{lon}"` rounded to four decimals.
    pub fn route_key(&self) -> String {
        format!(
            "{}_{}",
            fixed_key_component(self.latitude),
            fixed_key_component(self.longitude)
        )
    }

    /// Degraded address shown when no provider could resolve the coordinate.
    ///
    /// Both components rounded to four decimals with [`to_fixed`], joined
    /// by `", "`.
    pub fn fallback_label(&self) -> String {
        format!(
            "{}, {}",
            fixed_key_component(self.latitude),
            fixed_key_component(self.longitude)
        )
    }

    /// Waypoint form used by the routing API: `"{lat},{lon}"` unrounded.
    pub fn waypoint(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Fixed-point formatting with ECMAScript `toFixed` rounding.
///
/// `format!("{:.N}")` rounds exact binary ties to even; this rounds them away
/// from zero, so `to_fixed(1.03125, 4)` is `"1.0313"`. Any negative value keeps
/// its sign even when it rounds to zero, while `-0.0` prints unsigned.
pub fn to_fixed(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let magnitude = value.abs();
    // A tie is exactly an odd multiple of 2^-(digits + 1).
    let scaled = magnitude * 2f64.powi(digits as i32 + 1);
    let is_tie = scaled.fract() == 0.0 && scaled % 2.0 == 1.0;
    let magnitude = if is_tie {
        f64::from_bits(magnitude.to_bits() + 1)
    } else {
        magnitude
    };

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{:.*}", sign, digits, magnitude)
}

fn fixed_key_component(value: f64) -> String {
    to_fixed(value, KEY_PRECISION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_rounds_to_four_decimals() {
        let coord = Coordinate::new(-22.017_512_3, -47.890_849_9);
        assert_eq!(coord.cache_key(), "-22.0175,-47.8908");
    }

    #[test]
    fn test_nearby_coordinates_share_key() {
        let a = Coordinate::new(-22.017_51, -47.890_81);
        let b = Coordinate::new(-22.017_54, -47.890_84);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_distinct_coordinates_have_distinct_keys() {
        let a = Coordinate::new(-22.0175, -47.8908);
        let b = Coordinate::new(-22.0176, -47.8908);
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_small_negative_keeps_sign() {
        let coord = Coordinate::new(-0.000_01, 0.000_01);
        assert_eq!(coord.cache_key(), "-0.0000,0.0000");
        assert_eq!(coord.route_key(), "-0.0000_0.0000");
        assert_eq!(coord.fallback_label(), "-0.0000, 0.0000");
        assert_eq!(Coordinate::new(-0.0, 0.0).cache_key(), "0.0000,0.0000");
    }

    #[test]
    fn test_exact_ties_round_away_from_zero() {
        let coord = Coordinate::new(-22.031_25, 1.031_25);
        assert_eq!(coord.fallback_label(), "-22.0313, 1.0313");
        assert_eq!(coord.cache_key(), "-22.0313,1.0313");
        assert_eq!(coord.route_key(), "-22.0313_1.0313");

        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(-0.5, 0), "-1");
    }

    #[test]
    fn test_to_fixed_non_ties_match_std() {
        // 1.00005 is stored slightly above the decimal tie.
        assert_eq!(to_fixed(1.000_05, 4), "1.0001");
        assert_eq!(to_fixed(1.000_15, 4), format!("{:.4}", 1.000_15));
        assert_eq!(to_fixed(-47.890_849_9, 4), "-47.8908");
        assert_eq!(to_fixed(12.0, 4), "12.0000");
    }

    #[test]
    fn test_to_fixed_non_finite() {
        assert_eq!(to_fixed(f64::NAN, 4), "NaN");
        assert_eq!(to_fixed(f64::INFINITY, 4), "Infinity");
        assert_eq!(to_fixed(f64::NEG_INFINITY, 4), "-Infinity");
    }

    #[test]
    fn test_route_key_uses_underscore() {
        let coord = Coordinate::new(-22.0175, -47.8908);
        assert_eq!(coord.route_key(), "-22.0175_-47.8908");
    }

    #[test]
    fn test_fallback_label() {
        let coord = Coordinate::new(-22.0175, -47.8908);
        assert_eq!(coord.fallback_label(), "-22.0175, -47.8908");

        let coord = Coordinate::new(1.5, 2.0);
        assert_eq!(coord.fallback_label(), "1.5000, 2.0000");
    }

    #[test]
    fn test_waypoint_is_unrounded() {
        let coord = Coordinate::new(-22.017_512, -47.89);
        assert_eq!(coord.waypoint(), "-22.017512,-47.89");
    }

    #[test]
    fn test_from_tuple() {
        let coord: Coordinate = (10.0, 20.0).into();
        assert_eq!(coord, Coordinate::new(10.0, 20.0));
    }

    #[test]
    fn test_is_finite() {
        assert!(Coordinate::new(0.0, 0.0).is_finite());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_finite());
        assert!(!Coordinate::new(0.0, f64::INFINITY).is_finite());
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_key_has_two_four_decimal_components(
                lat in -90.0..90.0_f64,
                lon in -180.0..180.0_f64
            ) {
                let key = Coordinate::new(lat, lon).cache_key();
                let parts: Vec<&str> = key.split(',').collect();
                prop_assert_eq!(parts.len(), 2);
                for part in parts {
                    let decimals = part.split('.').nth(1).map(str::len);
                    prop_assert_eq!(decimals, Some(KEY_PRECISION));
                }
            }

            #[test]
            fn test_key_stable_under_sub_precision_jitter(
                lat in -89.0..89.0_f64,
                lon in -179.0..179.0_f64
            ) {
                // Snap to the centre of a key cell, then jitter well inside it.
                let lat_c = (lat * 1e4).round() / 1e4;
                let lon_c = (lon * 1e4).round() / 1e4;
                let a = Coordinate::new(lat_c + 0.000_01, lon_c - 0.000_01);
                let b = Coordinate::new(lat_c - 0.000_01, lon_c + 0.000_01);
                prop_assert_eq!(a.cache_key(), b.cache_key());
            }

            #[test]
            fn test_fallback_label_parses_back(
                lat in -90.0..90.0_f64,
                lon in -180.0..180.0_f64
            ) {
                let label = Coordinate::new(lat, lon).fallback_label();
                let (a, b) = label.split_once(", ").expect("separator");
                let parsed_lat: f64 = a.parse().expect("lat");
                let parsed_lon: f64 = b.parse().expect("lon");
                prop_assert!((parsed_lat - lat).abs() <= 0.000_051);
                prop_assert!((parsed_lon - lon).abs() <= 0.000_051);
            }
        }
    }
}
