// Bounded ranges describing what the solver may still decide

use crate::errors::IntervalError;
use crate::time::validate_range;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Debug;
use std::ops::Add;

/// A `[lower, upper]` pair with `lower <= upper`.
///
/// A bounded interval expresses uncertainty the solver may resolve (the
/// earliest and latest possible start, for example), not a fixed value.
/// It serialises as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundedInterval<T> {
    lower: T,
    upper: T,
}

impl<T: PartialOrd + Copy + Debug> BoundedInterval<T> {
    pub fn new(lower: T, upper: T) -> Result<Self, IntervalError> {
        validate_range(&(lower, upper))?;
        Ok(Self { lower, upper })
    }

    /// A degenerate range holding a single value
    pub fn exact(value: T) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }

    pub fn lower(&self) -> T {
        self.lower
    }

    pub fn upper(&self) -> T {
        self.upper
    }

    pub fn as_pair(&self) -> (T, T) {
        (self.lower, self.upper)
    }

    /// Both bounds moved by the same offset
    pub fn shifted<D>(&self, by: D) -> Self
    where
        T: Add<D, Output = T>,
        D: Copy,
    {
        Self {
            lower: self.lower + by,
            upper: self.upper + by,
        }
    }
}

impl<T: Serialize> Serialize for BoundedInterval<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.lower, &self.upper).serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for BoundedInterval<T>
where
    T: Deserialize<'de> + PartialOrd + Copy + Debug,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (lower, upper) = <(T, T)>::deserialize(deserializer)?;
        BoundedInterval::new(lower, upper).map_err(serde::de::Error::custom)
    }
}
