use derive_more::derive::{Add, AddAssign, Deref, DerefMut, Div, From, Into, Mul, Neg, Sub};
use serde::{Deserialize, Serialize};

/// Macro for defining a scalar quantity tagged with its unit.
///
/// The generated newtype wraps an `f64`, derefs to it and supports the usual arithmetic
/// between values of the same unit, as well as scaling by plain numbers.
///
/// # Example
/// ```ignore
/// define_unit!(Megawatts, "MW");
/// ```
macro_rules! define_unit {
    ($(#[$meta:meta])* $unit:ident, $suffix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Default, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize,
            From, Into, Deref, DerefMut, Add, AddAssign, Sub, Mul, Div, Neg,
        )]
        #[serde(transparent)]
        pub struct $unit(pub f64);

        impl UnitTrait for $unit {
            const SUFFIX: &'static str = $suffix;
        }

        impl std::fmt::Display for $unit {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{} {}", self.0, Self::SUFFIX)
            }
        }
    };
}

/// Trait for unit types, providing string suffix information.
pub trait UnitTrait {
    /// The unit suffix used for display, e.g. "kV", "MW", "pu".
    const SUFFIX: &'static str;

    /// Returns the string suffix of this unit.
    fn suffix() -> &'static str {
        Self::SUFFIX
    }
}

define_unit!(
    /// Active power in watts. Generation models work in this unit.
    Watts,
    "W"
);
define_unit!(
    /// Active power in megawatts. The network model works in this unit.
    Megawatts,
    "MW"
);
define_unit!(
    /// Reactive power in megavar.
    MVar,
    "MVAr"
);
define_unit!(KiloVolts, "kV");
define_unit!(PerUnit, "pu");

impl From<Watts> for Megawatts {
    fn from(w: Watts) -> Self {
        Megawatts(w.0 * 1e-6)
    }
}

impl From<Megawatts> for Watts {
    fn from(mw: Megawatts) -> Self {
        Watts(mw.0 * 1e6)
    }
}

impl Watts {
    pub fn to_mw(self) -> Megawatts {
        self.into()
    }
}

/// A simple structure representing min/max bounds on a value.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Limit<T> {
    /// Minimum value.
    pub min: T,
    /// Maximum value.
    pub max: T,
}

impl<T: PartialOrd> Limit<T> {
    pub fn contains(&self, value: &T) -> bool {
        *value >= self.min && *value <= self.max
    }
}
