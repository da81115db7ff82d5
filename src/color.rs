use anyhow::{bail, Result};
use palette::{FromColor, IntoColor, Lab, Oklch, Srgb};

/// Core color type used throughout the pipeline.
/// Wraps sRGB u8 components and provides the textual forms templates consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a hex color string like `#ff8800` or `#FF8800`.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 {
            bail!(
                "invalid hex color: expected 6 hex digits, got {}",
                hex.len()
            );
        }
        let r = u8::from_str_radix(&hex[0..2], 16)?;
        let g = u8::from_str_radix(&hex[2..4], 16)?;
        let b = u8::from_str_radix(&hex[4..6], 16)?;
        Ok(Self { r, g, b })
    }

    /// Serialize to lowercase hex `#rrggbb`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Serialize to CSS `rgba(r,g,b,a)`. Alpha is clamped to [0, 1] and
    /// printed in its shortest form (`0.5`, `1`).
    pub fn to_rgba(self, alpha: f32) -> String {
        format!("rgba({},{},{},{})", self.r, self.g, self.b, clamp_alpha(alpha))
    }

    /// Serialize to `#rrggbbaa`, the alpha byte being `floor(alpha * 255)`.
    pub fn to_hexa(self, alpha: f32) -> String {
        let a = (clamp_alpha(alpha) * 255.0) as u8;
        format!("{}{:02x}", self.to_hex(), a)
    }

    /// Comma separated channels, `r,g,b`.
    pub fn to_rgb_triplet(self) -> String {
        format!("{},{},{}", self.r, self.g, self.b)
    }

    /// Convert to `palette::Srgb<u8>`.
    pub fn to_srgb_u8(self) -> Srgb<u8> {
        Srgb::new(self.r, self.g, self.b)
    }

    /// Convert to CIELAB (for clustering and deduplication).
    pub fn to_lab(self) -> Lab {
        let srgb_f32: Srgb<f32> = self.to_srgb_u8().into_format();
        srgb_f32.into_color()
    }

    /// Create from CIELAB, clamping out-of-gamut values.
    pub fn from_lab(lab: Lab) -> Self {
        let srgb: Srgb<f32> = Srgb::from_color(lab);
        let r = (srgb.red.clamp(0.0, 1.0) * 255.0).round() as u8;
        let g = (srgb.green.clamp(0.0, 1.0) * 255.0).round() as u8;
        let b = (srgb.blue.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self { r, g, b }
    }

    /// Perceptual lightness (Oklch L) in [0, 1].
    pub fn lightness(self) -> f32 {
        let srgb_f32: Srgb<f32> = self.to_srgb_u8().into_format();
        let oklch: Oklch = srgb_f32.into_color();
        oklch.l
    }

    /// Squared CIELAB distance (ΔE76²) between two colors.
    pub fn delta_e_sq(self, other: Color) -> f32 {
        let a = self.to_lab();
        let b = other.to_lab();
        (a.l - b.l).powi(2) + (a.a - b.a).powi(2) + (a.b - b.b).powi(2)
    }

    /// WCAG 2.0 relative luminance.
    ///
    /// Linearizes each sRGB channel, then computes the weighted sum.
    pub fn relative_luminance(self) -> f32 {
        fn linearize(c: u8) -> f32 {
            let c = c as f32 / 255.0;
            if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        let r = linearize(self.r);
        let g = linearize(self.g);
        let b = linearize(self.b);
        0.2126 * r + 0.7152 * g + 0.0722 * b
    }
}

/// Clamp alpha to [0, 1]; NaN counts as fully opaque.
pub fn clamp_alpha(alpha: f32) -> f32 {
    if alpha.is_nan() {
        1.0
    } else {
        alpha.clamp(0.0, 1.0)
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}
