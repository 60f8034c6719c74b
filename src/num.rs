//! Undefined-aware numeric type.
//!
//! Decayed means, volatilities and z-scores are legitimately undefined during
//! warm-up or when a denominator is zero. `Num` carries that state explicitly
//! so it propagates through arithmetic and never turns into a silent zero.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// A numeric value that is either defined (finite) or undefined.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Num(Option<f64>);

impl Num {
    pub const UNDEFINED: Num = Num(None);

    /// Wrap a float. NaN and infinities become undefined.
    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Num(Some(value))
        } else {
            Num(None)
        }
    }

    pub fn value(self) -> Option<f64> {
        self.0
    }

    pub fn is_defined(self) -> bool {
        self.0.is_some()
    }

    pub fn is_undefined(self) -> bool {
        self.0.is_none()
    }

    /// Value or the provided fallback. Only for rendering and tests.
    pub fn unwrap_or(self, fallback: f64) -> f64 {
        self.0.unwrap_or(fallback)
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self.0 {
            Some(v) => Num::new(f(v)),
            None => Num::UNDEFINED,
        }
    }

    /// Square root; negative inputs are undefined.
    pub fn sqrt(self) -> Self {
        match self.0 {
            Some(v) if v >= 0.0 => Num::new(v.sqrt()),
            _ => Num::UNDEFINED,
        }
    }

    /// Natural log; non-positive inputs are undefined.
    pub fn ln(self) -> Self {
        match self.0 {
            Some(v) if v > 0.0 => Num::new(v.ln()),
            _ => Num::UNDEFINED,
        }
    }

    pub fn clamp(self, lo: f64, hi: f64) -> Self {
        self.map(|v| v.clamp(lo, hi))
    }
}

impl From<f64> for Num {
    fn from(value: f64) -> Self {
        Num::new(value)
    }
}

impl From<Option<f64>> for Num {
    fn from(value: Option<f64>) -> Self {
        value.map(Num::new).unwrap_or(Num::UNDEFINED)
    }
}

impl Add for Num {
    type Output = Num;

    fn add(self, rhs: Num) -> Num {
        match (self.0, rhs.0) {
            (Some(a), Some(b)) => Num::new(a + b),
            _ => Num::UNDEFINED,
        }
    }
}

impl Sub for Num {
    type Output = Num;

    fn sub(self, rhs: Num) -> Num {
        match (self.0, rhs.0) {
            (Some(a), Some(b)) => Num::new(a - b),
            _ => Num::UNDEFINED,
        }
    }
}

impl Mul for Num {
    type Output = Num;

    fn mul(self, rhs: Num) -> Num {
        match (self.0, rhs.0) {
            (Some(a), Some(b)) => Num::new(a * b),
            _ => Num::UNDEFINED,
        }
    }
}

impl Div for Num {
    type Output = Num;

    /// Division by zero is undefined rather than infinite.
    fn div(self, rhs: Num) -> Num {
        match (self.0, rhs.0) {
            (Some(_), Some(b)) if b == 0.0 => Num::UNDEFINED,
            (Some(a), Some(b)) => Num::new(a / b),
            _ => Num::UNDEFINED,
        }
    }
}

impl Neg for Num {
    type Output = Num;

    fn neg(self) -> Num {
        self.map(|v| -v)
    }
}

impl Add<f64> for Num {
    type Output = Num;

    fn add(self, rhs: f64) -> Num {
        self + Num::new(rhs)
    }
}

impl Sub<f64> for Num {
    type Output = Num;

    fn sub(self, rhs: f64) -> Num {
        self - Num::new(rhs)
    }
}

impl Mul<f64> for Num {
    type Output = Num;

    fn mul(self, rhs: f64) -> Num {
        self * Num::new(rhs)
    }
}

impl Div<f64> for Num {
    type Output = Num;

    fn div(self, rhs: f64) -> Num {
        self / Num::new(rhs)
    }
}

/// Honors precision and width; right-aligned unless asked otherwise, like
/// the float it wraps.
impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match (self.0, f.precision()) {
            (Some(v), Some(p)) => format!("{:.*}", p, v),
            (Some(v), None) => v.to_string(),
            (None, _) => "n/a".to_string(),
        };
        match f.width() {
            Some(w) => match f.align() {
                Some(fmt::Alignment::Left) => write!(f, "{:<w$}", text, w = w),
                Some(fmt::Alignment::Center) => write!(f, "{:^w$}", text, w = w),
                _ => write!(f, "{:>w$}", text, w = w),
            },
            None => f.write_str(&text),
        }
    }
}
