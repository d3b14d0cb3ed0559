use std::{fmt::Display, ops::Deref};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl Percentage {
    pub fn new_opt(value: f64) -> Option<Percentage> {
        // NaN fails the comparison as well, which is exactly what we want.
        if value >= 0. {
            Some(Percentage(value))
        } else {
            None
        }
    }

    /// Rounds to the given number of fractional digits. Midpoints go to the even neighbour, so
    /// 0.125 becomes 0.12 rather than 0.13.
    pub fn rounded(self, digits: i32) -> Percentage {
        let scale = 10f64.powi(digits);
        Percentage((self.0 * scale).round_ties_even() / scale)
    }

    /// Some counters report slightly above 100% right after a burst on multi-core machines.
    pub fn clamped(self) -> Percentage {
        Percentage(self.0.clamp(0., 100.))
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
