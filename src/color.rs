//! Background color parsing and conversion

use crate::error::{NoBgError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Solid RGB background used when flattening a cutout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackgroundColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl BackgroundColor {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }

    #[must_use]
    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    /// Channels in R, G, B order
    #[must_use]
    pub const fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Parse a hex color string
    ///
    /// Supports both `#RRGGBB` and `#RGB`, with or without the leading `#`.
    ///
    /// # Examples
    /// ```rust
    /// use nobg::BackgroundColor;
    ///
    /// assert_eq!(BackgroundColor::parse_hex("#ff0000").unwrap(), BackgroundColor::new(255, 0, 0));
    /// assert_eq!(BackgroundColor::parse_hex("0f0").unwrap(), BackgroundColor::new(0, 255, 0));
    /// ```
    pub fn parse_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(NoBgError::InvalidColor(hex.to_string()));
        }

        let component = |range: std::ops::Range<usize>| -> Result<u8> {
            digits
                .get(range)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| NoBgError::InvalidColor(hex.to_string()))
        };

        match digits.len() {
            6 => Ok(Self::new(component(0..2)?, component(2..4)?, component(4..6)?)),
            // #RGB expands each nibble: 0xF -> 0xFF
            3 => Ok(Self::new(
                component(0..1)? * 17,
                component(1..2)? * 17,
                component(2..3)? * 17,
            )),
            _ => Err(NoBgError::InvalidColor(hex.to_string())),
        }
    }

    /// Look up one of the supported color names
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "white" => Some(Self::white()),
            "black" => Some(Self::black()),
            "red" => Some(Self::new(255, 0, 0)),
            "green" => Some(Self::new(0, 128, 0)),
            "blue" => Some(Self::new(0, 0, 255)),
            "gray" | "grey" => Some(Self::new(128, 128, 128)),
            _ => None,
        }
    }

    /// Lowercase `#rrggbb` form
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for BackgroundColor {
    type Err = NoBgError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).map_or_else(|| Self::parse_hex(s), Ok)
    }
}

impl fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for BackgroundColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BackgroundColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse a user-supplied background option
///
/// `none`, `transparent` and the empty string select transparent output.
pub fn parse_background(value: &str) -> Result<Option<BackgroundColor>> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "none" | "transparent" => Ok(None),
        _ => value.parse().map(Some),
    }
}
