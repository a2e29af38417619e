//! Color lookup for block and slice names.
//!
//! The engine treats colors as opaque values obtained from a [`ColorSource`].
//! A [`ColorCache`] lives for exactly one pass so every distinct name is
//! looked up once per pass and never cached across passes.

use std::collections::HashMap;
use std::fmt;

use serde::{Serialize, Serializer};

/// An opaque RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// `ColorOf(name) -> Color`.
pub trait ColorSource: Send + Sync {
    fn color_of(&self, name: &str) -> Color;
}

impl<F> ColorSource for F
where
    F: Fn(&str) -> Color + Send + Sync,
{
    fn color_of(&self, name: &str) -> Color {
        self(name)
    }
}

/// Picks a palette entry from the first run of digits in the name.
///
/// `"P3-12"` maps to entry `(3 - 1) mod 6`; names without digits use the
/// first entry.
#[derive(Clone, Debug)]
pub struct NamePalette {
    palette: Vec<Color>,
}

impl NamePalette {
    pub const RED: Color = Color::rgb(0xFF, 0x00, 0x00);
    pub const ORANGE: Color = Color::rgb(0xFF, 0xA5, 0x00);
    pub const YELLOW: Color = Color::rgb(0xFF, 0xFF, 0x00);
    pub const LIME_GREEN: Color = Color::rgb(0x32, 0xCD, 0x32);
    pub const DEEP_SKY_BLUE: Color = Color::rgb(0x00, 0xBF, 0xFF);
    pub const MEDIUM_PURPLE: Color = Color::rgb(0x93, 0x70, 0xDB);

    /// Creates a palette source. Falls back to the default palette when
    /// `palette` is empty.
    pub fn new(palette: Vec<Color>) -> Self {
        if palette.is_empty() {
            return Self::default();
        }
        Self { palette }
    }

    fn index_for(&self, name: &str) -> usize {
        let digits: String = name
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        let ordinal = match digits.parse::<i64>() {
            Ok(n) => n - 1,
            Err(_) => 0,
        };
        ordinal.rem_euclid(self.palette.len() as i64) as usize
    }
}

impl Default for NamePalette {
    fn default() -> Self {
        Self {
            palette: vec![
                Self::RED,
                Self::ORANGE,
                Self::YELLOW,
                Self::LIME_GREEN,
                Self::DEEP_SKY_BLUE,
                Self::MEDIUM_PURPLE,
            ],
        }
    }
}

impl ColorSource for NamePalette {
    fn color_of(&self, name: &str) -> Color {
        self.palette[self.index_for(name)]
    }
}

/// Per-pass memo in front of a [`ColorSource`].
pub struct ColorCache<'s> {
    source: &'s dyn ColorSource,
    seen: HashMap<String, Color>,
}

impl<'s> ColorCache<'s> {
    pub fn new(source: &'s dyn ColorSource) -> Self {
        Self {
            source,
            seen: HashMap::new(),
        }
    }

    pub fn color_of(&mut self, name: &str) -> Color {
        if let Some(color) = self.seen.get(name) {
            return *color;
        }
        let color = self.source.color_of(name);
        self.seen.insert(name.to_string(), color);
        color
    }
}
