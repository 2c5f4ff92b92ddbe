//! Training durations expressed in epochs, batches, or samples
//!
//! Run state fixtures carry a maximum duration such as `"100ep"`. The string
//! form is a count followed by a unit suffix and parses via [`FromStr`].

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Unit in which a training duration is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// Full passes over the dataset (`ep`)
    Epochs,
    /// Optimizer steps (`ba`)
    Batches,
    /// Individual samples (`sp`)
    Samples,
}

impl TimeUnit {
    /// Suffix used in the string form, e.g. `"ep"` in `"100ep"`
    pub fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Epochs => "ep",
            TimeUnit::Batches => "ba",
            TimeUnit::Samples => "sp",
        }
    }
}

/// A bounded amount of training, e.g. `"100ep"` or `"10ba"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeBudget {
    /// How many units to run for
    pub value: u64,
    /// The unit being counted
    pub unit: TimeUnit,
}

impl TimeBudget {
    /// Budget of `value` epochs
    pub fn epochs(value: u64) -> Self {
        Self {
            value,
            unit: TimeUnit::Epochs,
        }
    }

    /// Budget of `value` optimizer steps
    pub fn batches(value: u64) -> Self {
        Self {
            value,
            unit: TimeUnit::Batches,
        }
    }

    /// Budget of `value` samples
    pub fn samples(value: u64) -> Self {
        Self {
            value,
            unit: TimeUnit::Samples,
        }
    }
}

impl fmt::Display for TimeBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

impl FromStr for TimeBudget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| Error::config(format!("duration `{}` is missing a unit suffix", s)))?;
        if split == 0 {
            return Err(Error::config(format!(
                "duration `{}` is missing a leading count",
                s
            )));
        }

        let (digits, suffix) = s.split_at(split);
        let value: u64 = digits
            .parse()
            .map_err(|_| Error::config(format!("duration `{}` has an invalid count", s)))?;
        let unit = match suffix {
            "ep" => TimeUnit::Epochs,
            "ba" => TimeUnit::Batches,
            "sp" => TimeUnit::Samples,
            other => {
                return Err(Error::config(format!(
                    "unknown duration unit `{}` (expected ep, ba, or sp)",
                    other
                )))
            }
        };

        Ok(Self { value, unit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("100ep", 100, TimeUnit::Epochs ; "epochs")]
    #[test_case("10ba", 10, TimeUnit::Batches ; "batches")]
    #[test_case("500sp", 500, TimeUnit::Samples ; "samples")]
    #[test_case("0ep", 0, TimeUnit::Epochs ; "zero count")]
    fn test_parse_valid(input: &str, value: u64, unit: TimeUnit) {
        let budget: TimeBudget = input.parse().unwrap();
        assert_eq!(budget.value, value);
        assert_eq!(budget.unit, unit);
    }

    #[test_case("" ; "empty")]
    #[test_case("100" ; "missing unit")]
    #[test_case("ep" ; "missing count")]
    #[test_case("10xx" ; "unknown unit")]
    #[test_case("10 ep" ; "embedded space")]
    fn test_parse_invalid(input: &str) {
        assert!(input.parse::<TimeBudget>().is_err());
    }

    #[test]
    fn test_display_matches_input() {
        assert_eq!(TimeBudget::epochs(100).to_string(), "100ep");
        assert_eq!(TimeBudget::batches(10).to_string(), "10ba");
        assert_eq!(TimeBudget::samples(500).to_string(), "500sp");
    }

    proptest! {
        #[test]
        fn test_display_parse_roundtrip(value in 0u64..1_000_000, unit_idx in 0usize..3) {
            let unit = [TimeUnit::Epochs, TimeUnit::Batches, TimeUnit::Samples][unit_idx];
            let budget = TimeBudget { value, unit };
            let reparsed: TimeBudget = budget.to_string().parse().unwrap();
            prop_assert_eq!(budget, reparsed);
        }
    }
}
