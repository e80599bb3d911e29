//! Dice expressions such as `2d6+3`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A parsed `NdS±B` dice expression.
///
/// # Examples
/// ```
/// use srd_core::DiceExpression;
///
/// let dice: DiceExpression = "2d8 + 4".parse()?;
/// assert_eq!(dice.count, 2);
/// assert_eq!(dice.sides, 8);
/// assert_eq!(dice.bonus, 4);
/// assert_eq!(dice.to_string(), "2d8+4");
/// # Ok::<(), srd_core::DiceParseError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiceExpression {
    /// Number of dice rolled.
    pub count: u32,
    /// Faces on each die.
    pub sides: u32,
    /// Flat modifier added to the roll.
    pub bonus: i32,
}

/// Errors returned when parsing a [`DiceExpression`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceParseError {
    /// The text did not follow the `NdS±B` shape.
    #[error("'{0}' is not a dice expression")]
    Malformed(String),
    /// A die must have at least one face.
    #[error("dice expression '{0}' has zero-sided dice")]
    ZeroSides(String),
}

impl FromStr for DiceExpression {
    type Err = DiceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|ch| !ch.is_whitespace()).collect();
        let malformed = || DiceParseError::Malformed(s.to_owned());
        let lowered = compact.to_ascii_lowercase();
        let (count, rest) = lowered.split_once('d').ok_or_else(malformed)?;
        let (sides, bonus) = match rest.find(['+', '-']) {
            Some(index) => rest.split_at(index),
            None => (rest, ""),
        };
        let digits = |part: &str| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit());
        if !digits(count) || !digits(sides) {
            return Err(malformed());
        }
        let count = count.parse::<u32>().map_err(|_| malformed())?;
        let sides = sides.parse::<u32>().map_err(|_| malformed())?;
        if sides == 0 {
            return Err(DiceParseError::ZeroSides(s.to_owned()));
        }
        let bonus = if bonus.is_empty() {
            0
        } else {
            let magnitude = bonus.get(1..).unwrap_or_default();
            if !digits(magnitude) {
                return Err(malformed());
            }
            bonus.parse::<i32>().map_err(|_| malformed())?
        };
        Ok(Self {
            count,
            sides,
            bonus,
        })
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.bonus {
            0 => Ok(()),
            bonus if bonus > 0 => write!(f, "+{bonus}"),
            bonus => write!(f, "{bonus}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1d6", "1d6")]
    #[case("2D8", "2d8")]
    #[case("1d4 + 1", "1d4+1")]
    #[case("3d10-2", "3d10-2")]
    #[case("2d6+0", "2d6")]
    fn normalises_dice(#[case] input: &str, #[case] expected: &str) {
        let dice: DiceExpression = input.parse().expect("valid dice");
        assert_eq!(dice.to_string(), expected);
    }

    #[rstest]
    #[case("d6")]
    #[case("2d")]
    #[case("2x6")]
    #[case("2d6+")]
    #[case("2d6+1+1")]
    fn rejects_malformed_dice(#[case] input: &str) {
        assert!(matches!(
            input.parse::<DiceExpression>(),
            Err(DiceParseError::Malformed(_))
        ));
    }

    #[rstest]
    fn rejects_zero_sided_dice() {
        assert!(matches!(
            "1d0".parse::<DiceExpression>(),
            Err(DiceParseError::ZeroSides(_))
        ));
    }
}
