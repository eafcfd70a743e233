//! The result object one assessment produces: every intermediate line
//! retained, the rule versions that produced it, and a digest so two runs
//! over the same request and rules can be compared byte for byte.

use crate::allowances::LineItem;
use crate::bands::BandAllocation;
use crate::crossborder::Reconciliation;
use crate::digest;
use crate::estate::EstateComputation;
use crate::gifts::{ClassifiedGift, GiftCumulation};
use crate::jurisdiction::{Jurisdiction, TaxKind};
use crate::warnings::Warning;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A rule set an assessment resolved, by version label and digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RuleVersion {
    pub jurisdiction: Jurisdiction,
    pub version: String,
    pub digest: String,
}

/// One income-type tax computed from gross to banded liability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaxComputation {
    pub kind: TaxKind,
    #[schemars(with = "f64")]
    pub gross: Decimal,
    /// Allowance and relief lines, in the order they were applied.
    pub allowance_lines: Vec<LineItem>,
    pub allocation: BandAllocation,
}

impl TaxComputation {
    pub fn tax(&self) -> Decimal {
        self.allocation.total_tax
    }
}

/// Tax attributed to one disposal by its share of the taxed total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DisposalTax {
    pub disposal_id: String,
    #[schemars(with = "f64")]
    pub tax: Decimal,
}

/// The other jurisdiction's charge on disposals flagged as also taxed
/// there. Computed under that jurisdiction's reliefs and bands; no
/// annual exemption is assumed for a non-resident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ForeignGains {
    pub jurisdiction: Jurisdiction,
    pub allowance_lines: Vec<LineItem>,
    pub allocation: BandAllocation,
    pub attributions: Vec<DisposalTax>,
}

impl ForeignGains {
    pub fn tax(&self) -> Decimal {
        self.allocation.total_tax
    }

    pub fn tax_on(&self, disposal_id: &str) -> Decimal {
        self.attributions
            .iter()
            .find(|a| a.disposal_id == disposal_id)
            .map(|a| a.tax)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Lifetime transfer analysis at the as-of date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GiftReview {
    pub classified: Vec<ClassifiedGift>,
    /// The cumulation as if death occurred on the as-of date.
    pub cumulation: GiftCumulation,
}

/// Final position in one jurisdiction after cross-border relief.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JurisdictionLiability {
    pub jurisdiction: Jurisdiction,
    #[schemars(with = "f64")]
    pub gross: Decimal,
    #[schemars(with = "f64")]
    pub credit: Decimal,
    /// Gross less credit, floored at zero.
    #[schemars(with = "f64")]
    pub net: Decimal,
}

/// Everything one calculation produced.
///
/// Reconstructible from the request and the listed rule versions alone;
/// the engine reads no other state. Serialize it, store it, or compare
/// digests across recomputations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Assessment {
    pub as_of: NaiveDate,
    pub residence: Jurisdiction,
    pub rule_versions: Vec<RuleVersion>,
    pub computations: Vec<TaxComputation>,
    /// Other-jurisdiction charge on disposals flagged as dual-taxed.
    pub foreign_gains: Option<ForeignGains>,
    pub gifts: Option<GiftReview>,
    pub estates: Vec<EstateComputation>,
    pub reconciliation: Option<Reconciliation>,
    pub liabilities: Vec<JurisdictionLiability>,
    /// Every warning raised anywhere in the assessment, deduplicated.
    pub warnings: Vec<Warning>,
}

impl Assessment {
    /// Hex-encoded SHA-256 of the canonical serialized form.
    pub fn digest(&self) -> String {
        digest::of(self)
    }

    pub fn computation(&self, kind: TaxKind) -> Option<&TaxComputation> {
        self.computations.iter().find(|c| c.kind == kind)
    }

    pub fn estate_in(&self, jurisdiction: Jurisdiction) -> Option<&EstateComputation> {
        self.estates.iter().find(|e| e.jurisdiction == jurisdiction)
    }

    pub fn liability_in(&self, jurisdiction: Jurisdiction) -> Decimal {
        self.liabilities
            .iter()
            .find(|l| l.jurisdiction == jurisdiction)
            .map(|l| l.net)
            .unwrap_or(Decimal::ZERO)
    }

    /// Net liability across all jurisdictions.
    pub fn total_liability(&self) -> Decimal {
        self.liabilities.iter().map(|l| l.net).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn empty_assessment() -> Assessment {
        Assessment {
            as_of: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            residence: Jurisdiction::Uk,
            rule_versions: Vec::new(),
            computations: Vec::new(),
            foreign_gains: None,
            gifts: None,
            estates: Vec::new(),
            reconciliation: None,
            liabilities: vec![
                JurisdictionLiability {
                    jurisdiction: Jurisdiction::Uk,
                    gross: dec!(1000),
                    credit: dec!(0),
                    net: dec!(1000),
                },
                JurisdictionLiability {
                    jurisdiction: Jurisdiction::Ireland,
                    gross: dec!(500),
                    credit: dec!(200),
                    net: dec!(300),
                },
            ],
            warnings: Vec::new(),
        }
    }

    #[test]
    fn liability_lookups() {
        let assessment = empty_assessment();
        assert_eq!(assessment.liability_in(Jurisdiction::Uk), dec!(1000));
        assert_eq!(assessment.liability_in(Jurisdiction::Ireland), dec!(300));
        assert_eq!(assessment.total_liability(), dec!(1300));
    }

    #[test]
    fn digest_is_stable_and_sensitive() {
        let a = empty_assessment();
        let b = empty_assessment();
        assert_eq!(a.digest(), b.digest());

        let mut c = empty_assessment();
        c.liabilities[0].net = dec!(999);
        assert_ne!(a.digest(), c.digest());
    }

    #[test]
    fn assessment_round_trips_through_json() {
        let assessment = empty_assessment();
        let json = serde_json::to_string(&assessment).unwrap();
        let back: Assessment = serde_json::from_str(&json).unwrap();
        assert_eq!(assessment, back);
        assert_eq!(assessment.digest(), back.digest());
    }
}
