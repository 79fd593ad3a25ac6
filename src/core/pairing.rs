//! Coordinate pairing codec
//!
//! Packs an `(x, y)` coordinate pair into one non-negative integer and back.
//! Both coordinates are shifted by a configured minimum and scaled by
//! `ORDER = 10^precision` before pairing, so the round trip is exact up to
//! the configured number of fractional digits.
//!
//! Two pairing functions are available:
//!
//! - Cantor: `(X+Y)(X+Y+1)/2 + Y`
//! - Elegant (Szudzik): `Y^2+X` when `X<Y`, else `X^2+X+Y`
//!
//! The elegant pairing is the default and is the one used for the fixed
//! byte width form (15 bytes little-endian by default).
//!
//! Preconditions: coordinates must not lie below `(min_x, min_y)` and the
//! scaled values must fit the configured width. Violations are reported as
//! [`Error::InvalidCoordinate`] and [`Error::PrecisionOverflow`]; nothing is
//! ever truncated silently.

use serde::{Deserialize, Serialize};

use crate::core::Coordinates;
use crate::error::{Error, Result};

pub const DEFAULT_PRECISION: u32 = 16;
pub const DEFAULT_BYTE_WIDTH: usize = 15;
const MAX_BYTE_WIDTH: usize = 16;
/// Largest Cantor value whose `8z + 1` still fits in 128 bits.
const CANTOR_MAX_PAIRED: u128 = (u128::MAX - 1) / 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pairing {
    Cantor,
    #[default]
    Elegant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub pairing: Pairing,
    pub min_x: f64,
    pub min_y: f64,
    /// Number of fractional decimal digits kept
    pub precision: u32,
    /// Width of the little-endian byte form, at most 16
    pub byte_width: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            pairing: Pairing::default(),
            min_x: 0.0,
            min_y: 0.0,
            precision: DEFAULT_PRECISION,
            byte_width: DEFAULT_BYTE_WIDTH,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinateCodec {
    config: CodecConfig,
    order: f64,
    /// Exclusive upper bound of the byte width, `None` for the full `u128`
    limit: Option<u128>,
}

impl CoordinateCodec {
    pub fn new(config: CodecConfig) -> Result<Self> {
        if config.byte_width == 0 || config.byte_width > MAX_BYTE_WIDTH {
            return Err(Error::Config(format!(
                "byte_width must be between 1 and {}, got {}",
                MAX_BYTE_WIDTH, config.byte_width
            )));
        }
        if !config.min_x.is_finite() || !config.min_y.is_finite() {
            return Err(Error::Config("min_x and min_y must be finite".to_string()));
        }
        let order = 10u128.checked_pow(config.precision).ok_or_else(|| {
            Error::Config(format!("precision {} does not fit in 128 bits", config.precision))
        })?;

        let limit = if config.byte_width == MAX_BYTE_WIDTH {
            None
        } else {
            Some(1u128 << (8 * config.byte_width))
        };

        Ok(Self { order: order as f64, limit, config })
    }

    pub fn byte_width(&self) -> usize {
        self.config.byte_width
    }

    pub fn encode(&self, coordinates: Coordinates) -> Result<u128> {
        let x = self.scale(coordinates.x, self.config.min_x, "x")?;
        let y = self.scale(coordinates.y, self.config.min_y, "y")?;

        let paired = match self.config.pairing {
            Pairing::Cantor => cantor_pair(x, y).filter(|z| *z <= CANTOR_MAX_PAIRED),
            Pairing::Elegant => elegant_pair(x, y),
        }
        .ok_or_else(|| {
            Error::PrecisionOverflow(format!("pairing of ({}, {}) does not fit in 128 bits", x, y))
        })?;

        self.check_width(paired)
    }

    pub fn decode(&self, paired: u128) -> Result<Coordinates> {
        let (x, y) = match self.config.pairing {
            Pairing::Cantor => cantor_unpair(paired).ok_or_else(|| {
                Error::PrecisionOverflow(format!("{} is too large to unpair", paired))
            })?,
            Pairing::Elegant => elegant_unpair(paired),
        };

        Ok(Coordinates::new(
            x as f64 / self.order + self.config.min_x,
            y as f64 / self.order + self.config.min_y,
        ))
    }

    /// Encode into exactly `byte_width` little-endian bytes.
    pub fn encode_bytes(&self, coordinates: Coordinates) -> Result<Vec<u8>> {
        let paired = self.encode(coordinates)?;
        Ok(paired.to_le_bytes()[..self.byte_width()].to_vec())
    }

    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<Coordinates> {
        if bytes.len() != self.byte_width() {
            return Err(Error::InvalidDocument(format!(
                "expected {} coordinate bytes, got {}",
                self.byte_width(),
                bytes.len()
            )));
        }
        let mut buffer = [0u8; MAX_BYTE_WIDTH];
        buffer[..bytes.len()].copy_from_slice(bytes);
        self.decode(u128::from_le_bytes(buffer))
    }

    fn scale(&self, value: f64, min: f64, axis: &str) -> Result<u128> {
        let scaled = ((value - min) * self.order).round();

        if !scaled.is_finite() || scaled < 0.0 {
            return Err(Error::InvalidCoordinate(format!(
                "{} = {} is below the minimum {} or not finite",
                axis, value, min
            )));
        }
        // u128::MAX rounds up to 2^128 as f64
        if scaled >= u128::MAX as f64 {
            return Err(Error::PrecisionOverflow(format!(
                "{} = {} scaled by 10^{} exceeds 128 bits",
                axis, value, self.config.precision
            )));
        }

        self.check_width(scaled as u128)
    }

    fn check_width(&self, value: u128) -> Result<u128> {
        match self.limit {
            Some(limit) if value >= limit => Err(Error::PrecisionOverflow(format!(
                "{} does not fit in {} bytes",
                value, self.config.byte_width
            ))),
            _ => Ok(value),
        }
    }
}

/// `n(n+1)/2` without overflowing on the intermediate product.
fn triangular(n: u128) -> Option<u128> {
    let next = n.checked_add(1)?;
    if n % 2 == 0 {
        (n / 2).checked_mul(next)
    } else {
        n.checked_mul(next / 2)
    }
}

pub fn cantor_pair(x: u128, y: u128) -> Option<u128> {
    triangular(x.checked_add(y)?)?.checked_add(y)
}

/// Returns `None` when `8z + 1` does not fit in 128 bits.
pub fn cantor_unpair(z: u128) -> Option<(u128, u128)> {
    let discriminant = z.checked_mul(8)?.checked_add(1)?;
    let w = (isqrt(discriminant) - 1) / 2;
    let t = triangular(w)?;
    let y = z - t;
    Some((w - y, y))
}

pub fn elegant_pair(x: u128, y: u128) -> Option<u128> {
    if x < y {
        y.checked_mul(y)?.checked_add(x)
    } else {
        x.checked_mul(x)?.checked_add(x)?.checked_add(y)
    }
}

pub fn elegant_unpair(z: u128) -> (u128, u128) {
    let s = isqrt(z);
    let rest = z - s * s;
    if rest < s {
        (rest, s)
    } else {
        (s, rest - s)
    }
}

/// Exact integer square root (floor).
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    // The float estimate is within a few units; correct it in integers.
    let mut root = (n as f64).sqrt() as u128;
    while root.checked_mul(root).map_or(true, |square| square > n) {
        root -= 1;
    }
    while (root + 1).checked_mul(root + 1).is_some_and(|square| square <= n) {
        root += 1;
    }
    root
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn codec(pairing: Pairing) -> CoordinateCodec {
        CoordinateCodec::new(CodecConfig { pairing, ..CodecConfig::default() }).unwrap()
    }

    #[test]
    fn test_known_pairs() {
        assert_eq!(cantor_pair(0, 0), Some(0));
        assert_eq!(cantor_pair(1, 2), Some(8));
        assert_eq!(cantor_unpair(8), Some((1, 2)));
        assert_eq!(elegant_pair(1, 2), Some(5));
        assert_eq!(elegant_pair(2, 1), Some(7));
        assert_eq!(elegant_unpair(5), (1, 2));
        assert_eq!(elegant_unpair(7), (2, 1));
    }

    #[test]
    fn test_integer_pairings_invert_on_a_grid() {
        for x in 0..40u128 {
            for y in 0..40u128 {
                let c = cantor_pair(x, y).unwrap();
                assert_eq!(cantor_unpair(c), Some((x, y)));
                let e = elegant_pair(x, y).unwrap();
                assert_eq!(elegant_unpair(e), (x, y));
            }
        }
    }

    #[test]
    fn test_isqrt_is_exact_for_large_values() {
        for root in [1u128, 3, 1 << 40, (1 << 63) + 12345, u64::MAX as u128] {
            let square = root * root;
            assert_eq!(isqrt(square), root);
            assert_eq!(isqrt(square - 1), root - 1);
        }
        assert_eq!(isqrt(u128::MAX), u64::MAX as u128);
    }

    #[test]
    fn test_minimum_encodes_to_zero() {
        let origin = Coordinates::new(0.0, 0.0);
        assert_eq!(codec(Pairing::Elegant).encode(origin).unwrap(), 0);
        assert_eq!(codec(Pairing::Cantor).encode(origin).unwrap(), 0);
    }

    #[test]
    fn test_offset_minimum_encodes_to_zero() {
        let codec = CoordinateCodec::new(CodecConfig {
            min_x: 4.0,
            min_y: 50.0,
            ..CodecConfig::default()
        })
        .unwrap();
        assert_eq!(codec.encode(Coordinates::new(4.0, 50.0)).unwrap(), 0);
    }

    #[test]
    fn test_round_trip_brussels_coordinates() {
        for pairing in [Pairing::Cantor, Pairing::Elegant] {
            let codec = codec(pairing);
            let original = Coordinates::new(4.35, 50.85);
            let bytes = codec.encode_bytes(original).unwrap();
            assert_eq!(bytes.len(), DEFAULT_BYTE_WIDTH);
            let decoded = codec.decode_bytes(&bytes).unwrap();
            assert!((decoded.x - original.x).abs() < 1e-9, "{:?}", pairing);
            assert!((decoded.y - original.y).abs() < 1e-9, "{:?}", pairing);
        }
    }

    #[test]
    fn test_negative_coordinate_is_rejected() {
        let result = codec(Pairing::Elegant).encode(Coordinates::new(-0.5, 1.0));
        assert!(matches!(result, Err(Error::InvalidCoordinate(_))));
        let result = codec(Pairing::Cantor).encode(Coordinates::new(1.0, f64::NAN));
        assert!(matches!(result, Err(Error::InvalidCoordinate(_))));
    }

    #[test]
    fn test_narrow_width_overflows() {
        let codec = CoordinateCodec::new(CodecConfig {
            precision: 8,
            byte_width: 4,
            ..CodecConfig::default()
        })
        .unwrap();
        let result = codec.encode(Coordinates::new(4.35, 50.85));
        assert!(matches!(result, Err(Error::PrecisionOverflow(_))));
    }

    #[test]
    fn test_invalid_config() {
        let zero_width = CodecConfig { byte_width: 0, ..CodecConfig::default() };
        assert!(matches!(CoordinateCodec::new(zero_width), Err(Error::Config(_))));
        let huge_precision = CodecConfig { precision: 40, ..CodecConfig::default() };
        assert!(matches!(CoordinateCodec::new(huge_precision), Err(Error::Config(_))));
    }

    #[test]
    fn test_decode_bytes_checks_length() {
        let codec = codec(Pairing::Elegant);
        assert!(matches!(codec.decode_bytes(&[0u8; 3]), Err(Error::InvalidDocument(_))));
    }

    #[test]
    fn test_cantor_rejects_pairs_it_cannot_unpair() {
        let codec = CoordinateCodec::new(CodecConfig {
            pairing: Pairing::Cantor,
            byte_width: 16,
            ..CodecConfig::default()
        })
        .unwrap();
        let result = codec.encode(Coordinates::new(500.0, 500.0));
        assert!(matches!(result, Err(Error::PrecisionOverflow(_))));

        let inside = Coordinates::new(100.0, 100.0);
        let decoded = codec.decode(codec.encode(inside).unwrap()).unwrap();
        assert!((decoded.x - inside.x).abs() < 1e-9);
        assert!((decoded.y - inside.y).abs() < 1e-9);

        let (x, y) = cantor_unpair(CANTOR_MAX_PAIRED).unwrap();
        assert_eq!(cantor_pair(x, y), Some(CANTOR_MAX_PAIRED));
        assert_eq!(cantor_unpair(CANTOR_MAX_PAIRED + 1), None);
    }

    #[test]
    fn test_seeded_round_trip_sweep() {
        let mut rng = StdRng::seed_from_u64(2024);
        // (precision, min_x, min_y, byte_width)
        let configs = [
            (16, 0.0, 0.0, 15),
            (16, 0.0, 0.0, 16),
            (12, 2.0, 49.0, 12),
            (8, 4.0, 50.0, 8),
            (6, -10.0, -90.0, 5),
        ];

        for pairing in [Pairing::Cantor, Pairing::Elegant] {
            for (precision, min_x, min_y, byte_width) in configs {
                let codec = CoordinateCodec::new(CodecConfig {
                    pairing,
                    min_x,
                    min_y,
                    precision,
                    byte_width,
                })
                .unwrap();
                // Per-axis span around which the paired value reaches the width limit.
                let edge = 2f64.powi(4 * byte_width as i32) / 10f64.powi(precision as i32);
                let step = 10f64.powi(-(precision as i32));

                let (mut encoded, mut overflowed) = (0, 0);
                for _ in 0..500 {
                    let original = Coordinates::new(
                        min_x + rng.random::<f64>() * 1.25 * edge,
                        min_y + rng.random::<f64>() * 1.25 * edge,
                    );
                    match codec.encode_bytes(original) {
                        Ok(bytes) => {
                            let decoded = codec.decode_bytes(&bytes).unwrap();
                            let slack = step + 1e-12 * (original.x.abs() + original.y.abs() + 1.0);
                            assert!(
                                (decoded.x - original.x).abs() <= slack
                                    && (decoded.y - original.y).abs() <= slack,
                                "{:?} width {}: {:?} decoded as {:?}",
                                pairing,
                                byte_width,
                                original,
                                decoded
                            );
                            encoded += 1;
                        }
                        Err(Error::PrecisionOverflow(_)) => overflowed += 1,
                        Err(err) => panic!("{:?} width {}: {}", pairing, byte_width, err),
                    }
                }
                assert!(encoded > 0 && overflowed > 0, "{:?} width {}", pairing, byte_width);
            }
        }
    }
}
