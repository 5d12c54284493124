/// Compact floating point value the device uses for its sensor readings.
///
/// Bit layout of the little endian `u16`:
///
/// ```text
///  15 | 14 13 12 11 | 10 ..  0
/// sign|  exponent   | fraction
/// ```
///
/// The sign bit extends the exponent into a signed five bit value
/// (`exponent - 16` when set), so the decoded value is always
/// `2^exponent * fraction` with `exponent` in `[-16, 15]`. This is not
/// IEEE-754 half precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinearFloat(u16);

impl LinearFloat {
    const SIGN_SHIFT: u16 = 15;
    const EXPONENT_SHIFT: u16 = 11;
    const EXPONENT_MASK: u16 = 0b1111;
    const FRACTION_MASK: u16 = 0x07FF;

    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn sign(self) -> bool {
        (self.0 >> Self::SIGN_SHIFT) & 1 == 1
    }

    /// Exponent with the sign already applied.
    #[inline]
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        reason = "masked to four bits"
    )]
    pub const fn exponent(self) -> i8 {
        let exponent = ((self.0 >> Self::EXPONENT_SHIFT) & Self::EXPONENT_MASK) as i8;

        if self.sign() { exponent - 16 } else { exponent }
    }

    #[inline]
    #[must_use]
    pub const fn fraction(self) -> u16 {
        self.0 & Self::FRACTION_MASK
    }

    #[must_use]
    pub fn value(self) -> f64 {
        let exponent = self.exponent();
        let fraction = f64::from(self.fraction());
        // Exact for the whole exponent range, no float intrinsics needed.
        let scale = f64::from(1_u32 << exponent.unsigned_abs());

        if exponent < 0 {
            fraction / scale
        } else {
            fraction * scale
        }
    }
}

impl From<LinearFloat> for f64 {
    fn from(value: LinearFloat) -> Self {
        value.value()
    }
}

/// Decodes the two little endian bytes of a [`LinearFloat`].
#[must_use]
pub fn decode(low: u8, high: u8) -> f64 {
    LinearFloat::from_le_bytes([low, high]).value()
}

/// Maps a fan speed percentage onto the manual mode parameter byte.
///
/// The device only accepts `[9, 100]` for effective speeds, so `(0, 100)`
/// is squeezed into that band while both ends are pinned. A NaN
/// percentage is treated as `0`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "the operand is in (-1, 91) and truncation towards zero is intended"
)]
pub fn percent_to_param(percent: f64) -> u8 {
    if percent.is_nan() || percent <= 0.0 {
        0
    } else if percent >= 100.0 {
        100
    } else {
        9 + (((percent - 1.0) / 99.0) * 91.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::{LinearFloat, decode, percent_to_param};

    extern crate std;

    #[test]
    fn test_decode_matches_formula() {
        for raw in 0..=u16::MAX {
            let value = LinearFloat::new(raw);
            let [low, high] = raw.to_le_bytes();

            let exponent = i32::from((raw >> 11) & 0xF) - if raw >> 15 == 1 { 16 } else { 0 };
            let expected = 2f64.powi(exponent) * f64::from(raw & 0x7FF);

            assert_eq!(value.exponent(), i8::try_from(exponent).unwrap());
            assert!((-16..=15).contains(&value.exponent()));
            assert!(value.fraction() <= 2047);
            assert_eq!(decode(low, high).to_bits(), expected.to_bits());
        }
    }

    #[test]
    fn test_decode_samples() {
        // sign 0, exponent 5, fraction 100
        assert_eq!(decode(0x64, 0x28), 3200.0);
        // sign 1, exponent 0b1110 (-2), fraction 1000
        assert_eq!(decode(0xE8, 0xF3), 250.0);
        // sign 1, exponent 0 (-16), full fraction
        assert_eq!(decode(0xFF, 0x87), 2047.0 / 65536.0);
        assert_eq!(decode(0x00, 0x00), 0.0);
    }

    #[test]
    fn test_decode_zero_fraction() {
        for high in (0..=u8::MAX).filter(|h| h & 0b0111 == 0) {
            assert_eq!(decode(0x00, high), 0.0);
        }
    }

    #[test]
    fn test_percent_to_param_bounds() {
        assert_eq!(percent_to_param(-5.0), 0);
        assert_eq!(percent_to_param(0.0), 0);
        assert_eq!(percent_to_param(0.5), 9);
        assert_eq!(percent_to_param(1.0), 9);
        assert_eq!(percent_to_param(50.0), 54);
        assert_eq!(percent_to_param(99.9), 99);
        assert_eq!(percent_to_param(100.0), 100);
        assert_eq!(percent_to_param(250.0), 100);
        assert_eq!(percent_to_param(f64::NAN), 0);
    }

    #[test]
    fn test_percent_to_param_monotonic() {
        let mut previous = 0;

        for step in 0..=10_000 {
            let param = percent_to_param(f64::from(step) / 100.0);
            assert!(param >= previous, "{param} < {previous} at step {step}");
            assert!(param <= 100);
            previous = param;
        }
    }
}
