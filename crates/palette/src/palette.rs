use crate::PaletteError;

/// Number of addressable color codes.
pub const PALETTE_SIZE: usize = 1 << 16;

/// Convert a packed hue(6)/saturation(3)/luminance(7) code to `0xRRGGBB`,
/// raising each channel to `brightness`.
pub fn hsl_to_rgb(code: u16, brightness: f64) -> u32 {
    let hue = (code >> 10) as f64 / 64.0 + 0.0078125;
    let sat = ((code >> 7) & 0x7) as f64 / 8.0 + 0.0625;
    let lum = (code & 0x7f) as f64 / 128.0;

    let third = 1.0 / 3.0;
    let two_thirds = 2.0 / 3.0;
    let ramp = if hue < third {
        [6.0 * (third - hue), 6.0 * hue, 0.0]
    } else if hue < two_thirds {
        [0.0, 6.0 * (two_thirds - hue), 6.0 * (hue - third)]
    } else {
        [6.0 * (hue - two_thirds), 0.0, 6.0 * (1.0 - hue)]
    };

    let mut rgb = 0u32;
    for (i, x) in ramp.into_iter().enumerate() {
        let chroma = 2.0 * sat * x.min(1.0) + (1.0 - sat);
        let c = if lum >= 0.5 {
            (1.0 - lum) * chroma + (2.0 * lum - 1.0)
        } else {
            lum * chroma
        };
        rgb |= channel(c.powf(brightness)) << (16 - i * 8);
    }
    rgb
}

/// Apply the brightness exponent to an already-resolved RGB value.
pub fn adjust_brightness(rgb: u32, brightness: f64) -> u32 {
    let mut out = 0;
    for shift in [16, 8, 0] {
        let c = ((rgb >> shift) & 0xff) as f64 / 255.0;
        out |= channel(c.powf(brightness)) << shift;
    }
    out
}

fn channel(c: f64) -> u32 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u32
}

pub(crate) fn validate_brightness(brightness: f64) -> Result<(), PaletteError> {
    if brightness.is_finite() && brightness > 0.0 {
        Ok(())
    } else {
        Err(PaletteError::InvalidBrightness(brightness))
    }
}

/// 65536-entry code to RGB table for the current brightness.
#[derive(Debug, Clone)]
pub struct Palette {
    brightness: f64,
    table: Vec<u32>,
}

impl Palette {
    pub fn new(brightness: f64) -> Result<Self, PaletteError> {
        let mut palette = Self {
            brightness,
            table: vec![0; PALETTE_SIZE],
        };
        palette.set_brightness(brightness)?;
        Ok(palette)
    }

    pub fn brightness(&self) -> f64 {
        self.brightness
    }

    /// Recompute every entry under a new brightness exponent.
    pub fn set_brightness(&mut self, brightness: f64) -> Result<(), PaletteError> {
        validate_brightness(brightness)?;
        let _span = tracing::debug_span!("palette_rebuild", brightness).entered();
        self.brightness = brightness;
        for (code, slot) in self.table.iter_mut().enumerate() {
            *slot = hsl_to_rgb(code as u16, brightness);
        }
        Ok(())
    }

    /// Look up a code; bits above 16 are ignored.
    #[inline]
    pub fn lookup(&self, code: i32) -> u32 {
        self.table[(code as u32 & 0xffff) as usize]
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels(rgb: u32) -> (u32, u32, u32) {
        ((rgb >> 16) & 0xff, (rgb >> 8) & 0xff, rgb & 0xff)
    }

    #[test]
    fn zero_luminance_is_black() {
        assert_eq!(hsl_to_rgb(0, 0.9), 0);
        assert_eq!(hsl_to_rgb(0xfc00 | (7 << 7), 0.9), 0);
    }

    #[test]
    fn saturated_low_hue_is_red() {
        let code = (7 << 7) | 64;
        let (r, g, b) = channels(hsl_to_rgb(code, 0.9));
        assert!(r > 200, "r={r}");
        assert!(g < 60 && b < 30, "g={g} b={b}");
    }

    #[test]
    fn max_luminance_is_near_white() {
        let (r, g, b) = channels(hsl_to_rgb(0x7f, 0.9));
        assert!(r >= 250 && g >= 250 && b >= 250);
    }

    #[test]
    fn lower_exponent_brightens() {
        let code = (20 << 10) | (3 << 7) | 40;
        let (r1, g1, b1) = channels(hsl_to_rgb(code, 0.9));
        let (r2, g2, b2) = channels(hsl_to_rgb(code, 0.6));
        assert!(r2 + g2 + b2 > r1 + g1 + b1);
    }

    #[test]
    fn palette_rebuilds_on_brightness_change() {
        let mut palette = Palette::new(0.9).unwrap();
        assert_eq!(palette.as_slice().len(), PALETTE_SIZE);
        let before = palette.lookup(0x1234);
        palette.set_brightness(0.6).unwrap();
        assert_eq!(palette.brightness(), 0.6);
        assert_eq!(palette.lookup(0x1234), hsl_to_rgb(0x1234, 0.6));
        assert_ne!(palette.lookup(0x1234), before);
    }

    #[test]
    fn palette_lookup_masks_high_bits() {
        let palette = Palette::new(0.9).unwrap();
        assert_eq!(palette.lookup(0x1_0042), palette.lookup(0x42));
    }

    #[test]
    fn invalid_brightness_rejected() {
        assert!(matches!(
            Palette::new(0.0),
            Err(PaletteError::InvalidBrightness(_))
        ));
        let mut palette = Palette::new(0.9).unwrap();
        assert!(palette.set_brightness(f64::NAN).is_err());
        assert_eq!(palette.brightness(), 0.9);
    }

    #[test]
    fn adjust_brightness_keeps_extremes() {
        assert_eq!(adjust_brightness(0, 0.7), 0);
        assert_eq!(adjust_brightness(0xffffff, 0.7), 0xffffff);
        assert!(adjust_brightness(0x404040, 0.7) > 0x404040);
    }
}
