//! Versioned rule data: band tables, allowances, reliefs and estate
//! thresholds for one jurisdiction over one effective date range.
//!
//! Rule sets are plain data. Calculations never hard-code a rate or
//! threshold; they read everything from the rule set the store resolved
//! for the calculation date.

mod ireland;
mod store;
mod uk;

pub use store::RuleStore;

use crate::bands::{self, Band};
use crate::digest;
use crate::error::CalcError;
use crate::jurisdiction::{AgeBand, Jurisdiction, Relationship, TaxKind};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Inclusive date range a rule set is effective for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Identity of a fixed allowance within a rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum AllowanceKey {
    Personal,
    Dividend,
    AnnualExempt,
    GiftAnnual,
    AgeExemption,
}

impl std::fmt::Display for AllowanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AllowanceKey::Personal => "personal allowance",
            AllowanceKey::Dividend => "dividend allowance",
            AllowanceKey::AnnualExempt => "annual exempt amount",
            AllowanceKey::GiftAnnual => "gift annual exemption",
            AllowanceKey::AgeExemption => "age exemption",
        };
        write!(f, "{name}")
    }
}

/// Withdraws an amount as a reference figure rises above a trigger.
///
/// The reduction is `(reference - trigger) * rate`, floored at zero and
/// capped at the amount being tapered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Taper {
    #[schemars(with = "f64")]
    pub trigger: Decimal,
    #[schemars(with = "f64")]
    pub rate: Decimal,
}

impl Taper {
    /// Amount withdrawn for the given reference figure.
    pub fn reduction(&self, reference: Decimal) -> Decimal {
        ((reference - self.trigger) * self.rate).max(Decimal::ZERO)
    }
}

/// A fixed amount deducted before banding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Allowance {
    pub key: AllowanceKey,
    pub applies_to: TaxKind,
    #[schemars(with = "f64")]
    pub amount: Decimal,
    /// Income-linked withdrawal, if the jurisdiction tapers this allowance.
    #[serde(default)]
    pub taper: Option<Taper>,
    /// Unused amount from the immediately preceding period may be claimed.
    #[serde(default)]
    pub carry_forward: bool,
    /// Granted only from this age band upwards.
    #[serde(default)]
    pub minimum_age: Option<AgeBand>,
}

/// Asset or transaction class a percentage relief applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ReliefCategory {
    Business,
    Agricultural,
}

impl std::fmt::Display for ReliefCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReliefCategory::Business => "business relief",
            ReliefCategory::Agricultural => "agricultural relief",
        };
        write!(f, "{name}")
    }
}

/// Percentage relief with a data-driven eligibility condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReliefRate {
    pub category: ReliefCategory,
    /// Fraction of the value relieved, e.g. 1 for full relief.
    #[schemars(with = "f64")]
    pub rate: Decimal,
    /// Minimum holding period in whole years, zero for none.
    pub minimum_holding_years: u32,
}

/// One step of the gift taper schedule: relief applied from
/// `min_years` elapsed years upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaperStep {
    pub min_years: u32,
    #[schemars(with = "f64")]
    pub relief: Decimal,
}

/// Secondary estate threshold gated on a qualifying recipient and
/// withdrawn for large estates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResidenceThreshold {
    #[schemars(with = "f64")]
    pub amount: Decimal,
    pub taper: Taper,
}

/// Reduced top estate rate when a charitable-legacy fraction is met.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CharitableRate {
    #[schemars(with = "f64")]
    pub minimum_fraction: Decimal,
    #[schemars(with = "f64")]
    pub reduced_rate: Decimal,
}

/// Estate duty thresholds and rate modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EstateRules {
    /// Base threshold charged at nil before the estate bands apply.
    #[schemars(with = "f64")]
    pub nil_rate_band: Decimal,
    /// Whether an unused fraction from a predeceased spouse's event may be added.
    pub threshold_transferable: bool,
    #[serde(default)]
    pub residence_threshold: Option<ResidenceThreshold>,
    #[serde(default)]
    pub charitable: Option<CharitableRate>,
}

/// Band tables per tax kind. Every rule set carries all five.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BandTables {
    pub income: Vec<Band>,
    pub dividend: Vec<Band>,
    pub capital_gains: Vec<Band>,
    pub social_contributions: Vec<Band>,
    pub estate_duty: Vec<Band>,
}

impl BandTables {
    pub fn for_kind(&self, kind: TaxKind) -> &[Band] {
        match kind {
            TaxKind::Income => &self.income,
            TaxKind::Dividend => &self.dividend,
            TaxKind::CapitalGains => &self.capital_gains,
            TaxKind::SocialContributions => &self.social_contributions,
            TaxKind::EstateDuty => &self.estate_duty,
        }
    }

    fn each(&self) -> [(TaxKind, &[Band]); 5] {
        [
            (TaxKind::Income, self.income.as_slice()),
            (TaxKind::Dividend, self.dividend.as_slice()),
            (TaxKind::CapitalGains, self.capital_gains.as_slice()),
            (
                TaxKind::SocialContributions,
                self.social_contributions.as_slice(),
            ),
            (TaxKind::EstateDuty, self.estate_duty.as_slice()),
        ]
    }
}

/// All rule data for one jurisdiction over one effective range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RuleSet {
    pub jurisdiction: Jurisdiction,
    /// Period label in the jurisdiction's own convention, e.g. "2024/25" or "2024".
    pub year_label: String,
    pub effective: DateRange,
    pub tables: BandTables,
    pub allowances: Vec<Allowance>,
    pub reliefs: Vec<ReliefRate>,
    /// Recipients whose transfers are exempt without limit.
    pub exempt_relationships: Vec<Relationship>,
    pub estate: EstateRules,
    /// Relief steps for transfers surviving part of the exemption window,
    /// ascending by elapsed years. Empty means no taper.
    pub gift_taper: Vec<TaperStep>,
}

impl RuleSet {
    /// Stable identifier of this rule set, e.g. "UK-2024/25".
    pub fn version(&self) -> String {
        format!("{}-{}", self.jurisdiction, self.year_label)
    }

    /// Hex-encoded SHA-256 of the canonical serialized form.
    pub fn digest(&self) -> String {
        digest::of(self)
    }

    pub fn allowance(&self, key: AllowanceKey) -> Option<&Allowance> {
        self.allowances.iter().find(|a| a.key == key)
    }

    pub fn allowances_for(&self, kind: TaxKind) -> Vec<&Allowance> {
        self.allowances
            .iter()
            .filter(|a| a.applies_to == kind)
            .collect()
    }

    pub fn relief(&self, category: ReliefCategory) -> Option<&ReliefRate> {
        self.reliefs.iter().find(|r| r.category == category)
    }

    pub fn is_exempt_relationship(&self, relationship: Relationship) -> bool {
        self.exempt_relationships.contains(&relationship)
    }

    /// Relief fraction for a transfer made `years` whole years before the
    /// reference date. Transfers at or beyond the exemption window never
    /// reach this lookup.
    pub fn gift_taper_relief(&self, years: u32) -> Decimal {
        self.gift_taper
            .iter()
            .rev()
            .find(|step| years >= step.min_years)
            .map(|step| step.relief)
            .unwrap_or(Decimal::ZERO)
    }

    /// Reject a malformed rule set, naming the offending entry.
    pub fn validate(&self) -> Result<(), CalcError> {
        let reject = |reason: String| CalcError::InvalidRuleSet {
            version: self.version(),
            reason,
        };

        if self.effective.start > self.effective.end {
            return Err(reject(format!(
                "effective range ends {} before it starts {}",
                self.effective.end, self.effective.start
            )));
        }
        for (kind, table) in self.tables.each() {
            bands::validate_table(table).map_err(|reason| reject(format!("{kind}: {reason}")))?;
        }
        for allowance in &self.allowances {
            if allowance.amount < Decimal::ZERO {
                return Err(reject(format!(
                    "{} has negative amount {}",
                    allowance.key, allowance.amount
                )));
            }
            if let Some(taper) = &allowance.taper {
                if taper.rate <= Decimal::ZERO || taper.trigger < Decimal::ZERO {
                    return Err(reject(format!("{} has a malformed taper", allowance.key)));
                }
            }
        }
        for relief in &self.reliefs {
            if relief.rate < Decimal::ZERO || relief.rate > Decimal::ONE {
                return Err(reject(format!(
                    "{} has rate {} outside [0, 1]",
                    relief.category, relief.rate
                )));
            }
        }
        if self.estate.nil_rate_band < Decimal::ZERO {
            return Err(reject("negative nil rate band".to_string()));
        }
        if let Some(residence) = &self.estate.residence_threshold {
            if residence.amount < Decimal::ZERO
                || residence.taper.rate <= Decimal::ZERO
                || residence.taper.trigger < Decimal::ZERO
            {
                return Err(reject("malformed residence threshold".to_string()));
            }
        }
        if let Some(charitable) = &self.estate.charitable {
            if charitable.minimum_fraction <= Decimal::ZERO
                || charitable.minimum_fraction > Decimal::ONE
                || charitable.reduced_rate < Decimal::ZERO
                || charitable.reduced_rate > Decimal::ONE
            {
                return Err(reject("malformed charitable rate".to_string()));
            }
        }
        for (i, step) in self.gift_taper.iter().enumerate() {
            if step.relief < Decimal::ZERO || step.relief > Decimal::ONE {
                return Err(reject(format!(
                    "gift taper step at {} years has relief {} outside [0, 1]",
                    step.min_years, step.relief
                )));
            }
            if let Some(next) = self.gift_taper.get(i + 1) {
                if next.min_years <= step.min_years {
                    return Err(reject("gift taper steps must ascend by years".to_string()));
                }
            }
        }
        Ok(())
    }
}
