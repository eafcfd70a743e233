//! Input contract: the facts one calculation runs on.
//!
//! Facts are declarative and dated; the engine never consults a clock or
//! any state outside this request and the rule store. Optional fields mean
//! the fact is unknown, which the engine treats differently from zero.

use crate::allowances::{AllowanceState, ReliefClaim};
use crate::error::{CalcError, FactError, InputError};
use crate::jurisdiction::{AgeBand, Domicile, Jurisdiction, Relationship, Situs};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Everything the engine may consider for one assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CalculationRequest {
    /// Calculation date. Rule sets are resolved as of this date, and any
    /// estate figures treat it as the (hypothetical) death date.
    pub as_of: NaiveDate,
    pub taxpayer: TaxpayerProfile,
    #[serde(default)]
    pub income: Option<IncomeFacts>,
    #[serde(default)]
    pub dividends: Option<DividendFacts>,
    #[serde(default)]
    pub gains: Option<GainFacts>,
    /// Lifetime transfers, complete for at least the exemption window plus
    /// one tax year so exemption usage can be replayed.
    #[serde(default)]
    pub gifts: Vec<GiftRecord>,
    #[serde(default)]
    pub estate: Option<EstateFacts>,
    /// Allowance usage occurring outside the facts listed here.
    #[serde(default)]
    pub allowance_states: Vec<AllowanceState>,
}

/// Who is being assessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaxpayerProfile {
    pub residence: Jurisdiction,
    /// Unknown domicile blocks estate duty figures rather than defaulting.
    #[serde(default)]
    pub domicile: Option<Domicile>,
    #[serde(default)]
    pub age_band: Option<AgeBand>,
}

/// Income for the period containing the as-of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IncomeFacts {
    #[schemars(with = "f64")]
    pub employment: Decimal,
    #[schemars(with = "f64")]
    pub other: Decimal,
}

impl IncomeFacts {
    pub fn total(&self) -> Decimal {
        self.employment + self.other
    }
}

/// Dividend receipts for the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DividendFacts {
    #[schemars(with = "f64")]
    pub gross: Decimal,
}

/// Realized chargeable gains for the period. Loss netting happens before
/// facts reach the engine; gains here are non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GainFacts {
    pub disposals: Vec<DisposalFact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DisposalFact {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[schemars(with = "f64")]
    pub gain: Decimal,
    #[serde(default)]
    pub relief: Option<ReliefClaim>,
    /// Jurisdiction other than the residence that also taxes this
    /// disposal, e.g. by the asset's situs. Flagged items feed the
    /// cross-border reconciler.
    #[serde(default)]
    pub also_taxed_in: Option<Jurisdiction>,
}

/// A lifetime transfer of value by the taxpayer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GiftRecord {
    pub id: String,
    pub date: NaiveDate,
    #[schemars(with = "f64")]
    pub value: Decimal,
    pub recipient: Relationship,
    /// Transfer into a discretionary-type structure; chargeable when made
    /// rather than on later death.
    #[serde(default)]
    pub into_trust: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// Classification of an estate asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum AssetKind {
    MainResidence,
    Property,
    Financial,
    Business,
    Farmland,
    #[default]
    Other,
}

/// One asset of the death estate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssetFact {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub kind: AssetKind,
    /// Full value of the asset; the taxable share is `value * ownership_share`.
    #[schemars(with = "f64")]
    pub value: Decimal,
    pub situs: Situs,
    #[schemars(with = "f64")]
    pub ownership_share: Decimal,
    /// Who inherits the asset, if directed.
    #[serde(default)]
    pub passes_to: Option<Relationship>,
    #[serde(default)]
    pub relief: Option<ReliefClaim>,
}

/// One liability of the death estate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LiabilityFact {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[schemars(with = "f64")]
    pub amount: Decimal,
    /// Jurisdictions whose estate computation may deduct this liability.
    pub deductible_in: Vec<Jurisdiction>,
    /// Asset the liability is secured on; a secured liability is deductible
    /// only where that asset is included.
    #[serde(default)]
    pub secured_on: Option<String>,
}

/// The death estate as of the calculation date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EstateFacts {
    pub assets: Vec<AssetFact>,
    #[serde(default)]
    pub liabilities: Vec<LiabilityFact>,
    /// Fraction of a predeceased spouse's unused base threshold claimed,
    /// within [0, 1]. Unknown means no transferred threshold.
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub transferred_threshold_fraction: Option<Decimal>,
}

impl CalculationRequest {
    /// Reject malformed or internally inconsistent facts before any
    /// computation starts.
    pub fn validate(&self) -> Result<(), CalcError> {
        if let Some(income) = &self.income {
            non_negative("employment income", income.employment)?;
            non_negative("other income", income.other)?;
        }
        if let Some(dividends) = &self.dividends {
            non_negative("gross dividends", dividends.gross)?;
        }
        if let Some(gains) = &self.gains {
            let mut seen = HashSet::new();
            for disposal in &gains.disposals {
                if !seen.insert(disposal.id.as_str()) {
                    return Err(duplicate("disposal", &disposal.id));
                }
                non_negative(&format!("gain of disposal {}", disposal.id), disposal.gain)?;
                if disposal.also_taxed_in == Some(self.taxpayer.residence) {
                    return Err(InputError::DualTaxFlagIsResidence {
                        id: disposal.id.clone(),
                        jurisdiction: self.taxpayer.residence,
                    }
                    .into());
                }
            }
        }

        let mut seen = HashSet::new();
        for gift in &self.gifts {
            if !seen.insert(gift.id.as_str()) {
                return Err(duplicate("gift", &gift.id));
            }
            non_negative(&format!("value of gift {}", gift.id), gift.value)?;
            if gift.date > self.as_of {
                return Err(InputError::GiftAfterAsOf {
                    id: gift.id.clone(),
                    date: gift.date,
                    as_of: self.as_of,
                }
                .into());
            }
        }

        if let Some(estate) = &self.estate {
            let mut asset_ids = HashSet::new();
            for asset in &estate.assets {
                if !asset_ids.insert(asset.id.as_str()) {
                    return Err(duplicate("asset", &asset.id));
                }
                non_negative(&format!("value of asset {}", asset.id), asset.value)?;
                if asset.ownership_share <= Decimal::ZERO || asset.ownership_share > Decimal::ONE {
                    return Err(InputError::OwnershipShareOutOfRange {
                        asset: asset.id.clone(),
                        share: asset.ownership_share,
                    }
                    .into());
                }
            }
            let mut liability_ids = HashSet::new();
            for liability in &estate.liabilities {
                if !liability_ids.insert(liability.id.as_str()) {
                    return Err(duplicate("liability", &liability.id));
                }
                non_negative(
                    &format!("amount of liability {}", liability.id),
                    liability.amount,
                )?;
                if let Some(secured_on) = &liability.secured_on {
                    if !asset_ids.contains(secured_on.as_str()) {
                        return Err(FactError::UnknownSecuredAsset {
                            liability: liability.id.clone(),
                            asset: secured_on.clone(),
                        }
                        .into());
                    }
                }
            }
            if let Some(fraction) = estate.transferred_threshold_fraction {
                if fraction < Decimal::ZERO || fraction > Decimal::ONE {
                    return Err(InputError::FractionOutOfRange {
                        field: "transferred threshold fraction".to_string(),
                        value: fraction,
                    }
                    .into());
                }
            }
        }

        let mut seen = HashSet::new();
        for state in &self.allowance_states {
            if !seen.insert(state.key) {
                return Err(duplicate("allowance state", &state.key.to_string()));
            }
            if let Some(used) = state.used_this_period {
                non_negative(&format!("reported usage of {}", state.key), used)?;
            }
            if let Some(unused) = state.unused_prior_period {
                non_negative(&format!("prior unused {}", state.key), unused)?;
            }
        }

        Ok(())
    }
}

fn non_negative(field: &str, value: Decimal) -> Result<(), CalcError> {
    if value < Decimal::ZERO {
        return Err(InputError::NegativeAmount {
            field: field.to_string(),
            value,
        }
        .into());
    }
    Ok(())
}

fn duplicate(kind: &'static str, id: &str) -> CalcError {
    FactError::DuplicateId {
        kind,
        id: id.to_string(),
    }
    .into()
}
