//! Background color, drawing mode and transform options

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Default overlay opacity (fraction of the color let through on top of the page)
pub const DEFAULT_OVERLAY_OPACITY: f32 = 0.3;

/// Soft yellow, easy on the eyes for black-on-white documents
pub const DEFAULT_BACKGROUND: Rgb = Rgb::new(0xFF, 0xFF, 0xCC);

/// 24-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` (the `#` is optional, hex digits are case-insensitive)
    pub fn from_hex(value: &str) -> Result<Self> {
        let unsupported = || Error::UnsupportedColor {
            value: value.to_string(),
        };

        let digits = value.trim();
        let digits = digits.strip_prefix('#').unwrap_or(digits);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(unsupported());
        }

        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| unsupported());
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Build a color from normalised channels in `0.0..=1.0`
    pub fn from_unit(r: f32, g: f32, b: f32) -> Result<Self> {
        let channel = |v: f32| {
            if v.is_finite() && (0.0..=1.0).contains(&v) {
                Ok((v * 255.0).round() as u8)
            } else {
                Err(Error::UnsupportedColor {
                    value: format!("({}, {}, {})", r, g, b),
                })
            }
        };
        Ok(Self::new(channel(r)?, channel(g)?, channel(b)?))
    }

    /// Normalised channels as used by the PDF `rg` operator
    pub fn to_unit(self) -> (f32, f32, f32) {
        (
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        )
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Default for Rgb {
    fn default() -> Self {
        DEFAULT_BACKGROUND
    }
}

impl FromStr for Rgb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Where the background color is drawn relative to the page content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackgroundMode {
    /// Opaque rectangle beneath all existing content. Best for digital PDFs.
    #[default]
    Standard,
    /// Translucent rectangle on top of all existing content. Best for scans,
    /// which have no separable background.
    Overlay,
}

impl BackgroundMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BackgroundMode::Standard => "standard",
            BackgroundMode::Overlay => "overlay",
        }
    }
}

impl FromStr for BackgroundMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(BackgroundMode::Standard),
            "overlay" => Ok(BackgroundMode::Overlay),
            _ => Err(Error::UnsupportedMode {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for BackgroundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for a background transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundOptions {
    pub color: Rgb,
    pub mode: BackgroundMode,
    /// Fill alpha for [`BackgroundMode::Overlay`]; ignored in standard mode
    pub overlay_opacity: f32,
}

impl BackgroundOptions {
    pub fn new(color: Rgb, mode: BackgroundMode) -> Self {
        Self {
            color,
            mode,
            overlay_opacity: DEFAULT_OVERLAY_OPACITY,
        }
    }

    pub fn with_overlay_opacity(mut self, opacity: f32) -> Self {
        self.overlay_opacity = opacity;
        self
    }

    /// Parse the textual form used by tool parameters
    pub fn parse(color: &str, mode: &str, overlay_opacity: Option<f32>) -> Result<Self> {
        let options = Self::new(color.parse()?, mode.parse()?)
            .with_overlay_opacity(overlay_opacity.unwrap_or(DEFAULT_OVERLAY_OPACITY));
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        let opacity = self.overlay_opacity;
        if !opacity.is_finite() || opacity <= 0.0 || opacity > 1.0 {
            return Err(Error::InvalidOpacity { value: opacity });
        }
        Ok(())
    }
}

impl Default for BackgroundOptions {
    fn default() -> Self {
        Self::new(DEFAULT_BACKGROUND, BackgroundMode::Standard)
    }
}
