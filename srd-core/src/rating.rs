//! Challenge ratings: whole numbers, fractions, or free text.
//!
//! Feeds publish ratings as integers (`7`), fractions (`"1/4"`), decimals
//! (`0.125`), decorated text (`"1/8 (25 XP)"`) and sometimes as strings that
//! were JSON-encoded twice (`"\"1/2\""`). Parsing unwraps the quoting, tries
//! each numeric form, then keeps the input verbatim.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Keys inspected when a rating arrives as a JSON object.
const OBJECT_KEYS: [&str; 5] = ["text", "numeric", "cr", "challenge_rating", "value"];

/// Largest number of decimal places accepted before falling back to text.
const MAX_DECIMAL_PLACES: u32 = 9;

/// A creature's challenge rating.
///
/// # Examples
/// ```
/// use srd_core::ChallengeRating;
///
/// assert_eq!(ChallengeRating::parse("1/4").to_string(), "1/4");
/// assert_eq!(ChallengeRating::parse("0.5").to_string(), "1/2");
/// assert_eq!(ChallengeRating::parse("\"\\\"7\\\"\"").to_string(), "7");
/// assert_eq!(ChallengeRating::parse("varies").to_string(), "varies");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChallengeRating {
    /// An integral rating.
    Whole(i64),
    /// A reduced proper or improper fraction with `denominator > 1`.
    Fraction {
        /// Numerator after reduction.
        numerator: i64,
        /// Denominator after reduction; always greater than one.
        denominator: i64,
    },
    /// Text that carried no recognisable numeric form.
    Text(String),
}

impl Default for ChallengeRating {
    fn default() -> Self {
        Self::Whole(0)
    }
}

impl ChallengeRating {
    /// Build a rating from a fraction, reducing it to lowest terms.
    ///
    /// Returns `None` when `denominator` is zero.
    #[must_use]
    pub fn from_fraction(numerator: i64, denominator: i64) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let (mut num, mut den) = if denominator < 0 {
            (numerator.checked_neg()?, denominator.checked_neg()?)
        } else {
            (numerator, denominator)
        };
        let divisor = gcd(num.unsigned_abs(), den.unsigned_abs());
        if divisor > 1 {
            let divisor = i64::try_from(divisor).ok()?;
            num = num.checked_div(divisor)?;
            den = den.checked_div(divisor)?;
        }
        if den == 1 {
            Some(Self::Whole(num))
        } else {
            Some(Self::Fraction {
                numerator: num,
                denominator: den,
            })
        }
    }

    /// Parse textual input, falling back to [`ChallengeRating::Text`].
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let unwrapped = unwrap_quotes(input);
        if let Some(rating) = parse_numeric(unwrapped) {
            return rating;
        }
        if let Some(rating) = unwrapped.split_whitespace().next().and_then(parse_numeric) {
            return rating;
        }
        Self::Text(input.to_owned())
    }

    /// Parse textual input, returning `None` instead of a text fallback.
    #[must_use]
    pub fn parse_strict(input: &str) -> Option<Self> {
        match Self::parse(input) {
            Self::Text(_) => None,
            rating => Some(rating),
        }
    }

    /// Interpret an arbitrary JSON value as a rating.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::default(),
            Value::Bool(flag) => Self::Text(flag.to_string()),
            Value::Number(number) => number
                .as_i64()
                .map(Self::Whole)
                .or_else(|| parse_numeric(&number.to_string()))
                .unwrap_or_else(|| Self::Text(number.to_string())),
            Value::String(text) => Self::parse(text),
            Value::Object(map) => OBJECT_KEYS
                .iter()
                .find_map(|key| {
                    map.iter()
                        .find(|(candidate, inner)| {
                            candidate.eq_ignore_ascii_case(key) && !inner.is_null()
                        })
                        .map(|(_, inner)| Self::from_json(inner))
                })
                .unwrap_or_default(),
            Value::Array(_) => Self::Text(value.to_string()),
        }
    }

    /// Whether the rating holds a numeric form.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        !matches!(self, Self::Text(_))
    }
}

impl fmt::Display for ChallengeRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whole(value) => write!(f, "{value}"),
            Self::Fraction {
                numerator,
                denominator,
            } => write!(f, "{numerator}/{denominator}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl Serialize for ChallengeRating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChallengeRating {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}

/// Strip surrounding plain or backslash-escaped quotes until none remain.
fn unwrap_quotes(input: &str) -> &str {
    let mut current = input.trim();
    loop {
        let stripped = ["\\\"", "\"", "'"].iter().find_map(|quote| {
            current
                .strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
        });
        match stripped {
            Some(inner) => current = inner.trim(),
            None => return current,
        }
    }
}

fn parse_numeric(text: &str) -> Option<ChallengeRating> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Some((numerator, denominator)) = text.split_once('/') {
        let numerator = numerator.trim().parse::<i64>().ok()?;
        let denominator = denominator.trim().parse::<i64>().ok()?;
        return ChallengeRating::from_fraction(numerator, denominator);
    }
    if let Ok(whole) = text.parse::<i64>() {
        return Some(ChallengeRating::Whole(whole));
    }
    parse_decimal(text)
}

/// Convert `a.b` decimal notation into an exact fraction.
fn parse_decimal(text: &str) -> Option<ChallengeRating> {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (whole, fraction) = unsigned.split_once('.')?;
    let all_digits = |part: &str| part.chars().all(|ch| ch.is_ascii_digit());
    if fraction.is_empty() || !all_digits(whole) || !all_digits(fraction) {
        return None;
    }
    let places = u32::try_from(fraction.len()).ok()?;
    if places > MAX_DECIMAL_PLACES {
        return None;
    }
    let scale = 10_i64.checked_pow(places)?;
    let whole_value = if whole.is_empty() {
        0
    } else {
        whole.parse::<i64>().ok()?
    };
    let numerator = whole_value
        .checked_mul(scale)?
        .checked_add(fraction.parse::<i64>().ok()?)?;
    let numerator = if negative {
        numerator.checked_neg()?
    } else {
        numerator
    };
    ChallengeRating::from_fraction(numerator, scale)
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let remainder = a.checked_rem(b).unwrap_or(0);
        a = b;
        b = remainder;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("1/4", "1/4")]
    #[case("7", "7")]
    #[case("2/4", "1/2")]
    #[case("4/2", "2")]
    #[case("0.125", "1/8")]
    #[case("0.25", "1/4")]
    #[case("0.5", "1/2")]
    #[case("3.0", "3")]
    #[case(" 1/2 ", "1/2")]
    #[case("1/8 (25 XP)", "1/8")]
    #[case("\"1/4\"", "1/4")]
    #[case("\"\"1/4\"\"", "1/4")]
    #[case("\\\"1/2\\\"", "1/2")]
    #[case("'5'", "5")]
    fn parses_numeric_forms(#[case] input: &str, #[case] canonical: &str) {
        let rating = ChallengeRating::parse(input);
        assert!(rating.is_numeric(), "expected numeric rating for {input}");
        assert_eq!(rating.to_string(), canonical);
    }

    #[rstest]
    #[case("varies")]
    #[case("1/0")]
    #[case("")]
    fn keeps_unrecognised_text_verbatim(#[case] input: &str) {
        assert_eq!(
            ChallengeRating::parse(input),
            ChallengeRating::Text(input.to_owned())
        );
    }

    #[rstest]
    #[case(json!(7), "7")]
    #[case(json!(0.25), "1/4")]
    #[case(json!("1/2"), "1/2")]
    #[case(json!(null), "0")]
    #[case(json!({"text": "1/8"}), "1/8")]
    #[case(json!({"Numeric": 0.5, "text": null}), "1/2")]
    #[case(json!({"value": 3}), "3")]
    fn reads_json_shapes(#[case] value: Value, #[case] canonical: &str) {
        assert_eq!(ChallengeRating::from_json(&value).to_string(), canonical);
    }

    #[rstest]
    fn serialises_as_canonical_string() {
        let rating = ChallengeRating::parse("0.25");
        assert_eq!(serde_json::to_value(&rating).expect("serialise"), json!("1/4"));
        let back: ChallengeRating = serde_json::from_value(json!("1/4")).expect("deserialise");
        assert_eq!(back, rating);
    }

    #[rstest]
    fn negative_denominators_are_normalised() {
        assert_eq!(
            ChallengeRating::from_fraction(1, -4),
            Some(ChallengeRating::Fraction {
                numerator: -1,
                denominator: 4
            })
        );
        assert_eq!(ChallengeRating::from_fraction(1, 0), None);
    }
}
