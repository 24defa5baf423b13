//! Linear RGB colors with `[0, 1]` channels.

use serde::{Deserialize, Serialize};

use crate::error::{IrError, Result};

/// An RGB color with each channel in `[0, 1]`.
///
/// Serialized as a three-element array `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Rgb {
    /// Red channel.
    pub r: f32,
    /// Green channel.
    pub g: f32,
    /// Blue channel.
    pub b: f32,
}

impl Rgb {
    /// Neutral light gray used for meshes without an assigned color.
    pub const NEUTRAL: Rgb = Rgb {
        r: 0.8,
        g: 0.8,
        b: 0.8,
    };

    /// Create a color, clamping each channel to `[0, 1]`.
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: clamp_channel(r),
            g: clamp_channel(g),
            b: clamp_channel(b),
        }
    }

    /// Create a color from 8-bit channels.
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    /// Convert to 8-bit channels (rounded).
    pub fn to_u8(self) -> [u8; 3] {
        [to_byte(self.r), to_byte(self.g), to_byte(self.b)]
    }

    /// Parse `#rrggbb`, `rrggbb`, `#rgb` or `rgb` (case-insensitive).
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches('#');
        if !digits.is_ascii() {
            return Err(IrError::InvalidHex(s.to_string()));
        }
        let parse = |hex: &str| u8::from_str_radix(hex, 16).map_err(|_| IrError::InvalidHex(s.to_string()));
        match digits.len() {
            6 => Ok(Self::from_u8(
                parse(&digits[0..2])?,
                parse(&digits[2..4])?,
                parse(&digits[4..6])?,
            )),
            3 => {
                let expand = |i: usize| parse(&digits[i..i + 1]).map(|v| v * 17);
                Ok(Self::from_u8(expand(0)?, expand(1)?, expand(2)?))
            }
            _ => Err(IrError::InvalidHex(s.to_string())),
        }
    }

    /// Lowercase `rrggbb` without a leading `#`.
    pub fn to_hex_digits(self) -> String {
        let [r, g, b] = self.to_u8();
        format!("{r:02x}{g:02x}{b:02x}")
    }

    /// Lowercase `#rrggbb`.
    pub fn to_hex(self) -> String {
        format!("#{}", self.to_hex_digits())
    }

    /// RGBA array with full opacity, as used by glTF base color factors.
    pub fn to_rgba(self) -> [f32; 4] {
        [self.r, self.g, self.b, 1.0]
    }

    /// Channels as an array.
    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[f32; 3]> for Rgb {
    fn from(c: [f32; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

impl From<Rgb> for [f32; 3] {
    fn from(c: Rgb) -> Self {
        c.to_array()
    }
}

fn clamp_channel(c: f32) -> f32 {
    if c.is_nan() {
        0.0
    } else {
        c.clamp(0.0, 1.0)
    }
}

fn to_byte(c: f32) -> u8 {
    (clamp_channel(c) * 255.0).round() as u8
}

/// Serde adapter storing an [`Rgb`] as a `#rrggbb` string.
pub mod hex {
    use super::Rgb;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as `#rrggbb`.
    pub fn serialize<S: Serializer>(color: &Rgb, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&color.to_hex())
    }

    /// Deserialize from any form accepted by [`Rgb::from_hex`].
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Rgb, D::Error> {
        let s = String::deserialize(deserializer)?;
        Rgb::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hex_parsing() {
        assert_eq!(Rgb::from_hex("#ff0000").unwrap(), Rgb::new(1.0, 0.0, 0.0));
        assert_eq!(Rgb::from_hex("00FF00").unwrap(), Rgb::new(0.0, 1.0, 0.0));
        assert_eq!(Rgb::from_hex("#00f").unwrap(), Rgb::new(0.0, 0.0, 1.0));
        assert!(Rgb::from_hex("#12345").is_err());
        assert!(Rgb::from_hex("zzzzzz").is_err());
        assert!(Rgb::from_hex("#ééé").is_err());
    }

    #[test]
    fn test_hex_output() {
        let c = Rgb::from_u8(200, 50, 50);
        assert_eq!(c.to_hex(), "#c83232");
        assert_eq!(c.to_hex_digits(), "c83232");
        assert_eq!(Rgb::from_hex(&c.to_hex()).unwrap().to_u8(), [200, 50, 50]);
    }

    #[test]
    fn test_channels_clamped() {
        let c = Rgb::new(1.5, -0.2, f32::NAN);
        assert_relative_eq!(c.r, 1.0);
        assert_relative_eq!(c.g, 0.0);
        assert_relative_eq!(c.b, 0.0);
    }

    #[test]
    fn test_serde_array_form() {
        let c = Rgb::new(0.25, 0.5, 1.0);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "[0.25,0.5,1.0]");
        let back: Rgb = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
