use crate::jurisdiction::Jurisdiction;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Top-level calculation error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CalcError {
    #[error("no rule set for {jurisdiction} covering {date}")]
    NoRuleSet {
        jurisdiction: Jurisdiction,
        date: NaiveDate,
    },
    #[error("rule set {version} overlaps existing effective range of {existing}")]
    OverlappingRuleSets { version: String, existing: String },
    #[error("rule set {version} rejected: {reason}")]
    InvalidRuleSet { version: String, reason: String },
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error(transparent)]
    InconsistentFacts(#[from] FactError),
}

/// A supplied fact is malformed or missing on its own terms.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("negative amount for {field}: {value}")]
    NegativeAmount { field: String, value: Decimal },
    #[error("ownership share for asset {asset} must be within (0, 1], got {share}")]
    OwnershipShareOutOfRange { asset: String, share: Decimal },
    #[error("{field} must be within [0, 1], got {value}")]
    FractionOutOfRange { field: String, value: Decimal },
    #[error("{what} is required for this calculation but was not supplied")]
    MissingFact { what: String },
    #[error("disposal {id} is flagged as also taxed in {jurisdiction}, which is the residence jurisdiction")]
    DualTaxFlagIsResidence { id: String, jurisdiction: Jurisdiction },
    #[error("gift {id} is dated {date}, after the as-of date {as_of}")]
    GiftAfterAsOf {
        id: String,
        date: NaiveDate,
        as_of: NaiveDate,
    },
}

/// Facts are individually well-formed but contradict each other.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FactError {
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },
    #[error("liability {liability} is secured on unknown asset {asset}")]
    UnknownSecuredAsset { liability: String, asset: String },
    #[error("claimed {allowance} of {used} exceeds the period limit {limit}")]
    AllowanceOverused {
        allowance: String,
        used: Decimal,
        limit: Decimal,
    },
}
