//! This module defines the unit types used throughout the simulation and their conversions.
//!
//! The simulation advances in steps of one hour, so a power sustained for one step corresponds to
//! the same numeric amount of energy (MW to MWh).
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{AddAssign, Div, Mul, Neg, SubAssign};

/// Represents a dimensionless quantity, such as an efficiency or a capacity factor.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    PartialOrd,
    Default,
    derive_more::Add,
    derive_more::Sub,
    derive_more::Display,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Dimensionless(pub f64);

impl Dimensionless {
    /// Creates a new dimensionless value
    pub fn new(val: f64) -> Self {
        Self(val)
    }

    /// Returns the value as a f64
    pub fn value(self) -> f64 {
        self.0
    }

    /// Whether the value is neither infinite nor NaN
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl Mul for Dimensionless {
    type Output = Dimensionless;

    fn mul(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 * rhs.0)
    }
}

impl Div for Dimensionless {
    type Output = Dimensionless;

    fn div(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 / rhs.0)
    }
}

impl From<f64> for Dimensionless {
    fn from(val: f64) -> Self {
        Self(val)
    }
}

impl From<Dimensionless> for f64 {
    fn from(val: Dimensionless) -> Self {
        val.0
    }
}

macro_rules! unit_struct {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Default,
            derive_more::Add,
            derive_more::Sub,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl $name {
            /// The zero value for this quantity
            pub const ZERO: $name = $name(0.0);

            /// Creates a new instance of the unit type from a f64 value.
            pub fn new(val: f64) -> Self {
                Self(val)
            }

            /// Returns the value of the unit type as a f64.
            pub fn value(self) -> f64 {
                self.0
            }

            /// Whether the value is neither infinite nor NaN
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            /// The larger of two values
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }

            /// The smaller of two values
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl AddAssign for $name {
            fn add_assign(&mut self, rhs: $name) {
                self.0 += rhs.0;
            }
        }

        impl SubAssign for $name {
            fn sub_assign(&mut self, rhs: $name) {
                self.0 -= rhs.0;
            }
        }

        impl Neg for $name {
            type Output = $name;
            fn neg(self) -> $name {
                $name(-self.0)
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = $name>>(iter: I) -> $name {
                $name(iter.map(|x| x.0).sum())
            }
        }

        impl Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl Mul<$name> for Dimensionless {
            type Output = $name;
            fn mul(self, rhs: $name) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl Div<Dimensionless> for $name {
            type Output = $name;
            fn div(self, rhs: Dimensionless) -> $name {
                $name(self.0 / rhs.0)
            }
        }

        impl Div for $name {
            type Output = Dimensionless;
            fn div(self, rhs: $name) -> Dimensionless {
                Dimensionless(self.0 / rhs.0)
            }
        }
    };
}

unit_struct!(Power, "Electrical or fuel power in MW.");
unit_struct!(Energy, "Energy in MWh.");

impl Power {
    /// The energy delivered by sustaining this power for one simulation step (one hour)
    pub fn over_one_hour(self) -> Energy {
        Energy(self.0)
    }

    /// Round up to the next multiple of `granularity`.
    ///
    /// A non-positive granularity leaves the value unchanged.
    pub fn ceil_to(self, granularity: Power) -> Power {
        if granularity.0 <= 0.0 {
            return self;
        }

        Power((self.0 / granularity.0).ceil() * granularity.0)
    }
}

impl Energy {
    /// The constant power which delivers this energy over one simulation step (one hour)
    pub fn per_hour(self) -> Power {
        Power(self.0)
    }

    /// The constant power which delivers this energy evenly over the given number of hours
    pub fn spread_over(self, hours: usize) -> Power {
        Power(self.0 / hours as f64)
    }
}

/// Megawatts in a gigawatt (and MWh in a GWh)
pub const MEGA_PER_GIGA: f64 = 1_000.0;

/// Megawatts in a terawatt (and MWh in a TWh)
pub const MEGA_PER_TERA: f64 = 1_000_000.0;
