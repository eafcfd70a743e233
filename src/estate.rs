//! Estate aggregation: per-jurisdiction inclusion by situs and domicile,
//! liability netting, asset-class reliefs, the threshold stack and the
//! banded duty charge.
//!
//! Chargeable lifetime transfers inside the exemption window consume the
//! base threshold before the death estate sees it, so the gift cumulation
//! total feeds in here. Tax is attributed back to each asset by its share
//! of the net taxable estate, which is what the cross-border reconciler
//! compares between jurisdictions.

use crate::allowances::{percentage_relief, LineItem};
use crate::bands::{self, Band, BandAllocation};
use crate::error::CalcError;
use crate::jurisdiction::{Domicile, Jurisdiction, Relationship};
use crate::request::{AssetFact, AssetKind, EstateFacts};
use crate::rules::RuleSet;
use crate::warnings::Warning;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One included asset's path from gross value to taxable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssetLine {
    pub asset_id: String,
    /// Full value times the ownership share.
    #[schemars(with = "f64")]
    pub gross: Decimal,
    /// Recipient whose unlimited exemption removes the asset from charge.
    pub exempt_to: Option<Relationship>,
    /// Percentage relief applied, as a labelled amount.
    pub relief: Option<LineItem>,
    #[schemars(with = "f64")]
    pub taxable: Decimal,
}

/// A liability deducted against this jurisdiction's estate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DeductionLine {
    pub liability_id: String,
    #[schemars(with = "f64")]
    pub amount: Decimal,
}

/// Duty attributed to one asset by its share of the taxable estate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssetAttribution {
    pub asset_id: String,
    #[schemars(with = "f64")]
    pub tax: Decimal,
}

/// One jurisdiction's estate computation, end to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EstateComputation {
    pub jurisdiction: Jurisdiction,
    pub rule_version: String,
    /// Assets included under the situs-and-domicile rule.
    pub assets: Vec<AssetLine>,
    /// Sum of included gross values.
    #[schemars(with = "f64")]
    pub gross_value: Decimal,
    pub deductions: Vec<DeductionLine>,
    /// Taxable value after exemptions, reliefs and deductible liabilities.
    #[schemars(with = "f64")]
    pub net_value: Decimal,
    /// Included value passing to charity, exempt but counted for the
    /// reduced-rate test.
    #[schemars(with = "f64")]
    pub charitable_legacies: Decimal,
    /// Threshold lines in the order they were granted.
    pub thresholds: Vec<LineItem>,
    #[schemars(with = "f64")]
    pub threshold_total: Decimal,
    #[schemars(with = "f64")]
    pub chargeable: Decimal,
    pub charitable_rate_applied: bool,
    pub allocation: BandAllocation,
    pub attributions: Vec<AssetAttribution>,
    pub warnings: Vec<Warning>,
}

impl EstateComputation {
    pub fn tax(&self) -> Decimal {
        self.allocation.total_tax
    }

    /// Tax attributed to one asset, zero if the asset bore none.
    pub fn tax_on(&self, asset_id: &str) -> Decimal {
        self.attributions
            .iter()
            .find(|a| a.asset_id == asset_id)
            .map(|a| a.tax)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Whether an asset enters this jurisdiction's estate: worldwide for the
/// jurisdiction of (deemed) domicile, otherwise matching situs only.
fn included(asset: &AssetFact, jurisdiction: Jurisdiction, domicile: Domicile) -> bool {
    domicile.jurisdiction == jurisdiction || asset.situs.is_in(jurisdiction)
}

/// Compute one jurisdiction's estate under the given rule set.
///
/// `gifts_within_window` is the net value of lifetime transfers inside the
/// exemption window at the as-of date; it consumes the base threshold
/// ahead of the estate.
pub fn compute_estate(
    facts: &EstateFacts,
    rules: &RuleSet,
    jurisdiction: Jurisdiction,
    domicile: Domicile,
    gifts_within_window: Decimal,
) -> Result<EstateComputation, CalcError> {
    let mut assets = Vec::new();
    let mut warnings: Vec<Warning> = Vec::new();
    let mut gross_value = Decimal::ZERO;
    let mut taxable_assets = Decimal::ZERO;
    let mut charitable_legacies = Decimal::ZERO;

    for asset in &facts.assets {
        if !included(asset, jurisdiction, domicile) {
            log::debug!("asset {} outside the {jurisdiction} estate", asset.id);
            continue;
        }
        let gross = asset.value * asset.ownership_share;
        gross_value += gross;

        let exempt_to = asset
            .passes_to
            .filter(|recipient| rules.is_exempt_relationship(*recipient));
        if let Some(recipient) = exempt_to {
            if recipient == Relationship::Charity {
                charitable_legacies += gross;
            }
            assets.push(AssetLine {
                asset_id: asset.id.clone(),
                gross,
                exempt_to,
                relief: None,
                taxable: Decimal::ZERO,
            });
            continue;
        }

        let mut taxable = gross;
        let mut relief_line = None;
        if let Some(claim) = &asset.relief {
            let relief = percentage_relief(rules, gross, claim);
            taxable -= relief.relieved;
            relief_line = relief.line;
            if let Some(warning) = relief.warning {
                if !warnings.contains(&warning) {
                    warnings.push(warning);
                }
            }
        }
        taxable_assets += taxable;
        assets.push(AssetLine {
            asset_id: asset.id.clone(),
            gross,
            exempt_to: None,
            relief: relief_line,
            taxable,
        });
    }

    // A secured liability is deductible only where the securing asset is
    // included; an unsecured one wherever its flag says.
    let mut deductions = Vec::new();
    let mut deducted = Decimal::ZERO;
    for liability in &facts.liabilities {
        if !liability.deductible_in.contains(&jurisdiction) {
            continue;
        }
        if let Some(secured_on) = &liability.secured_on {
            let securing_included = assets.iter().any(|a| &a.asset_id == secured_on);
            if !securing_included {
                log::debug!(
                    "liability {} secured on {} which is outside the {jurisdiction} estate",
                    liability.id,
                    secured_on
                );
                continue;
            }
        }
        deductions.push(DeductionLine {
            liability_id: liability.id.clone(),
            amount: liability.amount,
        });
        deducted += liability.amount;
    }

    let net_value = (taxable_assets - deducted).max(Decimal::ZERO);

    // Threshold stack: base, transferred fraction of a prior event's base,
    // consumption by lifetime transfers, then the tapered residence
    // threshold where the qualifying-recipient condition holds.
    let mut thresholds = Vec::new();
    let base = rules.estate.nil_rate_band;
    let mut base_available = base;
    thresholds.push(LineItem::new("nil rate band", base));
    if rules.estate.threshold_transferable {
        if let Some(fraction) = facts.transferred_threshold_fraction {
            let transferred = base * fraction;
            if transferred > Decimal::ZERO {
                base_available += transferred;
                thresholds.push(LineItem::new("transferred nil rate band", transferred));
            }
        }
    }
    let consumed = gifts_within_window.min(base_available).max(Decimal::ZERO);
    if consumed > Decimal::ZERO {
        thresholds.push(LineItem::new("consumed by lifetime transfers", -consumed));
        base_available -= consumed;
    }

    let mut threshold_total = base_available;
    if let Some(residence) = &rules.estate.residence_threshold {
        if qualifying_residence_passes(facts, jurisdiction, domicile) {
            let available =
                (residence.amount - residence.taper.reduction(net_value)).max(Decimal::ZERO);
            if available > Decimal::ZERO {
                thresholds.push(LineItem::new("residence threshold", available));
                threshold_total += available;
            }
        }
    }

    let chargeable = (net_value - threshold_total).max(Decimal::ZERO);

    // Reduced top rate when charity takes at least the rule's fraction of
    // the baseline: the taxable estate over the base threshold, measured
    // before the charitable legacies come out.
    let mut charitable_rate_applied = false;
    let mut estate_bands: Vec<Band> = rules.tables.estate_duty.clone();
    if let Some(charitable) = &rules.estate.charitable {
        let baseline = (net_value + charitable_legacies - base_available).max(Decimal::ZERO);
        if baseline > Decimal::ZERO && charitable_legacies / baseline >= charitable.minimum_fraction
        {
            if let Some(top) = estate_bands.last_mut() {
                top.rate = charitable.reduced_rate;
                charitable_rate_applied = true;
            }
        }
    }

    let allocation = bands::allocate(chargeable, &estate_bands);

    let attributions = if allocation.total_tax > Decimal::ZERO && taxable_assets > Decimal::ZERO {
        assets
            .iter()
            .filter(|a| a.taxable > Decimal::ZERO)
            .map(|a| AssetAttribution {
                asset_id: a.asset_id.clone(),
                tax: allocation.total_tax * a.taxable / taxable_assets,
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(EstateComputation {
        jurisdiction,
        rule_version: rules.version(),
        assets,
        gross_value,
        deductions,
        net_value,
        charitable_legacies,
        thresholds,
        threshold_total,
        chargeable,
        charitable_rate_applied,
        allocation,
        attributions,
        warnings,
    })
}

/// The residence threshold needs a main residence in the estate passing
/// to a direct descendant.
fn qualifying_residence_passes(
    facts: &EstateFacts,
    jurisdiction: Jurisdiction,
    domicile: Domicile,
) -> bool {
    facts.assets.iter().any(|asset| {
        asset.kind == AssetKind::MainResidence
            && included(asset, jurisdiction, domicile)
            && asset
                .passes_to
                .is_some_and(|recipient| recipient.is_descendant())
    })
}
