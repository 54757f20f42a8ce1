//! `SQL_NUMERIC_STRUCT` storage.
//!
//! Layout follows the C struct:
//! - precision: number of significant decimal digits
//! - scale: digits right of the decimal point (may be negative)
//! - sign: 1 for positive, 0 for negative
//! - val: magnitude as a 128 bit little-endian unsigned integer

use std::fmt;
use std::str::FromStr;

use crate::constants::SQL_MAX_NUMERIC_LEN;
use crate::error::{Error, Result};

/// Exact numeric value in `SQL_NUMERIC_STRUCT` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SqlNumeric {
    pub precision: u8,
    pub scale: i8,
    pub sign: u8,
    pub val: [u8; SQL_MAX_NUMERIC_LEN],
}

impl Default for SqlNumeric {
    fn default() -> Self {
        Self {
            precision: 1,
            scale: 0,
            sign: 1,
            val: [0; SQL_MAX_NUMERIC_LEN],
        }
    }
}

impl SqlNumeric {
    /// Create from a signed mantissa and scale: `value * 10^-scale`.
    pub fn from_mantissa(mantissa: i128, precision: u8, scale: i8) -> Self {
        Self {
            precision,
            scale,
            sign: if mantissa < 0 { 0 } else { 1 },
            val: mantissa.unsigned_abs().to_le_bytes(),
        }
    }

    /// Signed mantissa; the value is `mantissa * 10^-scale`.
    pub fn mantissa(&self) -> i128 {
        let magnitude = u128::from_le_bytes(self.val) as i128;
        if self.sign == 0 {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Approximate value as `f64`.
    pub fn to_f64(&self) -> f64 {
        self.mantissa() as f64 / 10f64.powi(self.scale as i32)
    }

    /// Number of decimal digits in the mantissa, at least 1.
    pub fn digits(&self) -> u32 {
        u128::from_le_bytes(self.val)
            .checked_ilog10()
            .map_or(1, |log| log + 1)
    }

    /// Rescale to `scale` digits, truncating extra fraction digits.
    ///
    /// Returns `None` if the rescaled mantissa does not fit in 128 bits.
    pub fn rescale(&self, precision: u8, scale: i8) -> Option<Self> {
        let diff = scale as i32 - self.scale as i32;
        let mantissa = if diff >= 0 {
            10i128
                .checked_pow(diff as u32)
                .and_then(|factor| self.mantissa().checked_mul(factor))?
        } else {
            match 10i128.checked_pow(diff.unsigned_abs()) {
                Some(divisor) => self.mantissa() / divisor,
                None => 0,
            }
        };
        Some(Self::from_mantissa(mantissa, precision, scale))
    }
}

impl fmt::Display for SqlNumeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = u128::from_le_bytes(self.val).to_string();
        if self.sign == 0 && digits != "0" {
            write!(f, "-")?;
        }
        if self.scale <= 0 {
            write!(f, "{}", digits)?;
            for _ in 0..(-self.scale) {
                write!(f, "0")?;
            }
            return Ok(());
        }
        let scale = self.scale as usize;
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{}.{}", int_part, frac_part)
    }
}

impl FromStr for SqlNumeric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::illegal_argument(format!("'{}' is not a numeric literal", s));
        let s = s.trim();
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let all_digits = format!("{}{}", int_part, frac_part);
        let significant = all_digits.trim_start_matches('0');
        if significant.len() > 38 || frac_part.len() > i8::MAX as usize {
            return Err(invalid());
        }
        let magnitude: i128 = if significant.is_empty() {
            0
        } else {
            significant.parse().map_err(|_| invalid())?
        };
        let mantissa = if negative { -magnitude } else { magnitude };
        Ok(Self::from_mantissa(
            mantissa,
            significant.len().max(1) as u8,
            frac_part.len() as i8,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let n: SqlNumeric = "123.45".parse().unwrap();
        assert_eq!(n.mantissa(), 12345);
        assert_eq!(n.scale, 2);
        assert_eq!(n.precision, 5);
        assert_eq!(n.to_string(), "123.45");

        let n: SqlNumeric = "-0.05".parse().unwrap();
        assert_eq!(n.mantissa(), -5);
        assert_eq!(n.sign, 0);
        assert_eq!(n.to_string(), "-0.05");

        assert!("12a".parse::<SqlNumeric>().is_err());
        assert!("".parse::<SqlNumeric>().is_err());
    }

    #[test]
    fn test_negative_scale() {
        let n = SqlNumeric::from_mantissa(12, 4, -2);
        assert_eq!(n.to_string(), "1200");
        assert_eq!(n.to_f64(), 1200.0);
    }

    #[test]
    fn test_rescale() {
        let n: SqlNumeric = "1.5".parse().unwrap();
        assert_eq!(n.rescale(10, 3).unwrap().to_string(), "1.500");
        let n: SqlNumeric = "1.579".parse().unwrap();
        assert_eq!(n.rescale(10, 1).unwrap().to_string(), "1.5");
        assert_eq!(n.rescale(10, -100).unwrap().mantissa(), 0);
    }

    #[test]
    fn test_rescale_overflow() {
        let n = SqlNumeric::from_mantissa(1_000_000_000, 10, 0);
        assert!(n.rescale(38, 30).is_none());
        assert!(SqlNumeric::from_mantissa(1, 1, 0).rescale(38, 40).is_none());
        assert_eq!(n.rescale(38, 20).unwrap().digits(), 30);
    }

    #[test]
    fn test_digits() {
        assert_eq!(SqlNumeric::from_mantissa(0, 1, 0).digits(), 1);
        assert_eq!(SqlNumeric::from_mantissa(-99999, 5, 2).digits(), 5);
        assert_eq!(SqlNumeric::from_mantissa(100000, 6, 2).digits(), 6);
    }
}
