//! Risk targeting.
//!
//! Converts z-scores into directional scores and volatility-scaled
//! position targets for the equity and fixed-income proxies.

pub mod position_sizer;

pub use position_sizer::{
    InstrumentSignal, PositionSizer, SignalSnapshot, SizingConfig, Target, TargetKind,
    TargetOutcome,
};
