use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Domain warning types emitted during calculation.
///
/// Warnings never change the computed figures; they flag inputs the engine
/// had to work around so the caller can resolve them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum Warning {
    /// A declared relief was not applied because its holding period is unmet.
    /// The result is computed without the relief.
    ReliefNotYetEligible {
        relief: String,
        required_years: u32,
        held_years: u32,
    },
    /// A declared relief could not be verified because the holding period is unknown.
    ReliefUnverified { relief: String },
    /// Prior-period usage of an allowance is unknown, so no unused amount
    /// was carried forward.
    CarryForwardUnknown { allowance: String },
    /// An age-gated allowance was skipped because the taxpayer's age band is unknown.
    AgeUnknown { allowance: String },
    /// A liability was deductible nowhere it was flagged, e.g. secured on an
    /// asset outside the estate.
    LiabilityNotDeducted {
        liability: String,
        #[schemars(with = "f64")]
        amount: Decimal,
    },
}
