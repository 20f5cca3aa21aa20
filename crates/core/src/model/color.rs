//! PDF color space definitions and conversion to RGB.

use super::state::Color;

/// A colour space as far as painting needs it.
///
/// Calibrated spaces collapse to their device equivalents. Separation and
/// DeviceN are drawn as grey ink coverage; `Pattern` has no numeric colour
/// of its own.
#[derive(Debug, Clone, PartialEq)]
pub enum PDFColorSpace {
    DeviceGray,
    DeviceRGB,
    DeviceCMYK,
    /// CIE L*a*b* with the default D65 white point
    Lab,
    /// Palette lookup into `base`; `lookup` holds `(hival + 1) * base.n` bytes
    Indexed {
        base: Box<PDFColorSpace>,
        hival: u8,
        lookup: Vec<u8>,
    },
    /// Separation (1 component) or DeviceN (n components)
    Tint(usize),
    /// Tiling or shading pattern; `base` is set for uncoloured patterns
    Pattern(Option<Box<PDFColorSpace>>),
}

impl Default for PDFColorSpace {
    fn default() -> Self {
        Self::DeviceGray
    }
}

impl PDFColorSpace {
    /// Map a colour space name (including inline image abbreviations).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "DeviceGray" | "G" | "CalGray" => Some(Self::DeviceGray),
            "DeviceRGB" | "RGB" | "CalRGB" => Some(Self::DeviceRGB),
            "DeviceCMYK" | "CMYK" => Some(Self::DeviceCMYK),
            "Lab" => Some(Self::Lab),
            "Pattern" => Some(Self::Pattern(None)),
            _ => None,
        }
    }

    /// Device space for an ICC profile with `n` components.
    pub fn from_icc_components(n: i64) -> Option<Self> {
        match n {
            1 => Some(Self::DeviceGray),
            3 => Some(Self::DeviceRGB),
            4 => Some(Self::DeviceCMYK),
            _ => None,
        }
    }

    /// Number of colour components an operand list or a sample carries.
    pub fn ncomponents(&self) -> usize {
        match self {
            Self::DeviceGray | Self::Indexed { .. } => 1,
            Self::DeviceRGB | Self::Lab => 3,
            Self::DeviceCMYK => 4,
            Self::Tint(n) => (*n).max(1),
            Self::Pattern(base) => base.as_ref().map_or(0, |b| b.ncomponents()),
        }
    }

    /// Initial colour after `cs`/`CS` selects this space.
    pub fn initial_color(&self) -> Color {
        match self {
            Self::DeviceGray | Self::Indexed { .. } => self.color(&[0.0]),
            Self::DeviceRGB => Color::Rgb(0.0, 0.0, 0.0),
            Self::DeviceCMYK => Color::Cmyk(0.0, 0.0, 0.0, 1.0),
            Self::Lab => self.color(&[0.0, 0.0, 0.0]),
            // Initial tint of 1.0 is full ink.
            Self::Tint(n) => self.color(&vec![1.0; *n]),
            Self::Pattern(_) => Color::Pattern(None),
        }
    }

    /// Build a colour from operand values. Missing operands read as 0.
    pub fn color(&self, comps: &[f64]) -> Color {
        let at = |i: usize| comps.get(i).copied().unwrap_or(0.0).clamp(0.0, 1.0);
        match self {
            Self::DeviceGray => Color::Gray(at(0)),
            Self::DeviceRGB => Color::Rgb(at(0), at(1), at(2)),
            Self::DeviceCMYK => Color::Cmyk(at(0), at(1), at(2), at(3)),
            Self::Lab => {
                let l = comps.first().copied().unwrap_or(0.0);
                let a = comps.get(1).copied().unwrap_or(0.0);
                let b = comps.get(2).copied().unwrap_or(0.0);
                let (r, g, b) = lab_to_rgb(l, a, b);
                Color::Rgb(r, g, b)
            }
            Self::Indexed { base, hival, lookup } => {
                let index = comps.first().copied().unwrap_or(0.0).round();
                let index = index.clamp(0.0, f64::from(*hival)) as usize;
                let n = base.ncomponents();
                let entry: Vec<f64> = (0..n)
                    .map(|i| {
                        lookup
                            .get(index * n + i)
                            .map_or(0.0, |&v| f64::from(v) / 255.0)
                    })
                    .collect();
                base.color(&entry)
            }
            Self::Tint(n) => {
                // Ink coverage: the darkest component wins.
                let ink = (0..*n).map(at).fold(0.0, f64::max);
                Color::Gray(1.0 - ink)
            }
            Self::Pattern(None) => Color::Pattern(None),
            Self::Pattern(Some(base)) => Color::Pattern(Some(Box::new(base.color(comps)))),
        }
    }
}

/// L*a*b* (D65) to sRGB, components in 0..=1.
fn lab_to_rgb(l: f64, a: f64, b: f64) -> (f64, f64, f64) {
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    let finv = |t: f64| {
        if t > 6.0 / 29.0 {
            t * t * t
        } else {
            3.0 * (6.0f64 / 29.0).powi(2) * (t - 4.0 / 29.0)
        }
    };
    let (x, y, z) = (0.9505 * finv(fx), finv(fy), 1.089 * finv(fz));
    let gamma = |c: f64| {
        let c = if c <= 0.003_130_8 {
            12.92 * c
        } else {
            1.055 * c.powf(1.0 / 2.4) - 0.055
        };
        c.clamp(0.0, 1.0)
    };
    (
        gamma(3.2406 * x - 1.5372 * y - 0.4986 * z),
        gamma(-0.9689 * x + 1.8758 * y + 0.0415 * z),
        gamma(0.0557 * x - 0.2040 * y + 1.0570 * z),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_abbreviations() {
        assert_eq!(PDFColorSpace::from_name("RGB"), Some(PDFColorSpace::DeviceRGB));
        assert_eq!(PDFColorSpace::from_name("CalGray"), Some(PDFColorSpace::DeviceGray));
        assert_eq!(PDFColorSpace::from_name("Foo"), None);
        assert_eq!(PDFColorSpace::DeviceCMYK.ncomponents(), 4);
    }

    #[test]
    fn test_indexed_lookup() {
        let cs = PDFColorSpace::Indexed {
            base: Box::new(PDFColorSpace::DeviceRGB),
            hival: 1,
            lookup: vec![255, 0, 0, 0, 0, 255],
        };
        assert_eq!(cs.color(&[1.0]), Color::Rgb(0.0, 0.0, 1.0));
        // Out of range indices clamp to hival.
        assert_eq!(cs.color(&[7.0]), Color::Rgb(0.0, 0.0, 1.0));
        assert_eq!(cs.color(&[0.0]).to_rgb8(), [255, 0, 0]);
    }

    #[test]
    fn test_tint_is_ink_coverage() {
        assert_eq!(PDFColorSpace::Tint(1).color(&[1.0]), Color::Gray(0.0));
        assert_eq!(PDFColorSpace::Tint(1).color(&[0.0]), Color::Gray(1.0));
    }

    #[test]
    fn test_lab_white() {
        let [r, g, b] = PDFColorSpace::Lab.color(&[100.0, 0.0, 0.0]).to_rgb8();
        assert!(r >= 250 && g >= 250 && b >= 250);
    }
}
