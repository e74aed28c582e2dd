//! Decimal values carried as text.
//!
//! Numbers entered in forms never pass through `f64`: the text the user typed
//! (or the text stored in the record) is validated, kept verbatim, and written
//! back as a JSON number with the same textual form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use ts_rs::TS;

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, TS)]
#[ts(export)]
pub struct Decimal(String);

impl Decimal {
    /// Validate `text` as a JSON number: `-?int(.digits)?([eE][+-]?digits)?`
    /// where `int` has no leading zeros.
    /// Surrounding whitespace is trimmed.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let trimmed = text.trim();
        if is_decimal(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(CoreError::InvalidDecimal(text.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read a decimal from a record node. Accepts JSON numbers and numeric
    /// strings.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Self::parse(&n.to_string()).ok(),
            Value::String(s) => Self::parse(s).ok(),
            _ => None,
        }
    }

    /// JSON number with exactly this textual form.
    pub fn to_value(&self) -> Value {
        match Number::from_str(&self.0) {
            Ok(n) => Value::Number(n),
            // Validated text is always a JSON number.
            Err(_) => Value::String(self.0.clone()),
        }
    }

    /// Numeric ordering without going through floating point. `None` when
    /// either side uses exponent notation.
    pub fn compare(&self, other: &Decimal) -> Option<std::cmp::Ordering> {
        compare_plain(&self.0, &other.0)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Decimal {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Decimal::parse(&text).map_err(serde::de::Error::custom)
    }
}

fn digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_decimal(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(pos) => (&s[..pos], Some(&s[pos + 1..])),
        None => (s, None),
    };
    let (int, frac) = match mantissa.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (mantissa, None),
    };
    // JSON has no leading zeros: "0.5" but not "007".
    let int_ok = digits(int) && (int == "0" || !int.starts_with('0'));
    let mantissa_ok = int_ok && frac.is_none_or(digits);
    let exponent_ok = match exponent {
        Some(exp) => digits(exp.strip_prefix(['+', '-']).unwrap_or(exp)),
        None => true,
    };
    mantissa_ok && exponent_ok
}

fn compare_plain(a: &str, b: &str) -> Option<std::cmp::Ordering> {
    use std::cmp::Ordering;

    if a.contains(['e', 'E']) || b.contains(['e', 'E']) {
        return None;
    }

    let split = |s: &str| -> (bool, String, String) {
        let (negative, s) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (int, frac) = s.split_once('.').unwrap_or((s, ""));
        let int = int.trim_start_matches('0').to_string();
        let frac = frac.trim_end_matches('0').to_string();
        let is_zero = int.is_empty() && frac.is_empty();
        (negative && !is_zero, int, frac)
    };

    let (a_neg, a_int, a_frac) = split(a);
    let (b_neg, b_int, b_frac) = split(b);

    let magnitude = a_int
        .len()
        .cmp(&b_int.len())
        .then_with(|| a_int.cmp(&b_int))
        .then_with(|| a_frac.cmp(&b_frac));

    Some(match (a_neg, b_neg) {
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        (false, false) => magnitude,
        (true, true) => magnitude.reverse(),
    })
}
