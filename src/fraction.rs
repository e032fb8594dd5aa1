use crate::v4l_sys::*;
use std::convert::TryFrom;
use std::fmt;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Fraction used for timing settings
pub struct Fraction {
    pub numerator: u32,
    pub denominator: u32,
}

impl Fraction {
    /// Returns a fraction representation
    ///
    /// # Arguments
    ///
    /// * `num` - Numerator
    /// * `denom` - Denominator
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::fraction::Fraction;
    /// let frac = Fraction::new(30, 1);
    /// ```
    pub fn new(num: u32, denom: u32) -> Self {
        Fraction {
            numerator: num,
            denominator: denom,
        }
    }

    /// Returns the closest fraction to `value` whose denominator does not exceed
    /// `max_denominator`
    ///
    /// The float is expanded into its exact binary fraction first, then the best rational
    /// approximation under the denominator ceiling is picked from its continued fraction
    /// convergents and semiconvergents. Returns `None` for non-finite or non-positive input and
    /// when the result does not fit into 32 bits.
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::fraction::Fraction;
    /// assert_eq!(Fraction::from_f64(29.97, 1000), Some(Fraction::new(2997, 100)));
    /// assert_eq!(Fraction::from_f64(0.5, 10), Some(Fraction::new(1, 2)));
    /// ```
    pub fn from_f64(value: f64, max_denominator: u32) -> Option<Self> {
        if !value.is_finite() || value <= 0.0 || max_denominator == 0 {
            return None;
        }

        let (mut n, mut d) = exact_ratio(value)?;
        let max = max_denominator as u128;

        let (p, q) = if d <= max {
            (n, d)
        } else {
            let (mut p0, mut q0, mut p1, mut q1) = (0u128, 1u128, 1u128, 0u128);
            loop {
                let a = n / d;
                let q2 = q0 + a * q1;
                if q2 > max {
                    break;
                }
                let p2 = p0 + a * p1;
                p0 = p1;
                q0 = q1;
                p1 = p2;
                q1 = q2;
                let r = n - a * d;
                n = d;
                d = r;
            }

            let k = (max - q0) / q1;
            let (sp, sq) = (p0 + k * p1, q0 + k * q1);
            let convergent = (p1 as f64 / q1 as f64 - value).abs();
            let semiconvergent = (sp as f64 / sq as f64 - value).abs();
            if convergent <= semiconvergent {
                (p1, q1)
            } else {
                (sp, sq)
            }
        };

        if p == 0 {
            return None;
        }
        Some(Fraction::new(u32::try_from(p).ok()?, u32::try_from(q).ok()?))
    }

    /// Returns the value as floating point number, `None` if the denominator is zero
    pub fn as_f64(&self) -> Option<f64> {
        if self.denominator == 0 {
            None
        } else {
            Some(self.numerator as f64 / self.denominator as f64)
        }
    }
}

/// Splits a positive, finite float into a reduced numerator/denominator pair.
fn exact_ratio(value: f64) -> Option<(u128, u128)> {
    let bits = value.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exponent) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };
    if mantissa == 0 {
        return None;
    }

    let zeros = mantissa.trailing_zeros();
    let mantissa = (mantissa >> zeros) as u128;
    let exponent = exponent + zeros as i32;

    if exponent >= 0 {
        // the odd mantissa has at most 53 significant bits
        if exponent > 74 {
            return None;
        }
        Some((mantissa << exponent, 1))
    } else if exponent > -127 {
        Some((mantissa, 1u128 << -exponent))
    } else {
        None
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl From<v4l2_fract> for Fraction {
    fn from(frac: v4l2_fract) -> Self {
        Self {
            numerator: frac.numerator,
            denominator: frac.denominator,
        }
    }
}

impl From<Fraction> for v4l2_fract {
    fn from(fraction: Fraction) -> Self {
        Self {
            numerator: fraction.numerator,
            denominator: fraction.denominator,
        }
    }
}
