//! Ordered application of exemptions and reliefs to a gross amount.
//!
//! The order is fixed: unlimited relationship exemptions, then tapered
//! allowances, then fixed annual exemptions (with one period of carry
//! forward where the rules permit it), then percentage reliefs. Every
//! deduction leaves a labelled line so a reviewer can reproduce the
//! taxable amount by hand.

use crate::error::{CalcError, FactError, InputError};
use crate::jurisdiction::{AgeBand, Relationship, TaxKind};
use crate::rules::{Allowance, AllowanceKey, ReliefCategory, RuleSet};
use crate::warnings::Warning;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A labelled amount in a computation's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LineItem {
    pub label: String,
    #[schemars(with = "f64")]
    pub amount: Decimal,
}

impl LineItem {
    pub fn new(label: impl Into<String>, amount: Decimal) -> Self {
        LineItem {
            label: label.into(),
            amount,
        }
    }
}

/// Declared claim that a value qualifies for a percentage relief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReliefClaim {
    pub category: ReliefCategory,
    /// Whole years the asset has been held, if known.
    #[serde(default)]
    pub held_years: Option<u32>,
}

/// Allowance usage reported by the caller for consumption outside the
/// supplied facts. `None` means unknown, which is not the same as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AllowanceState {
    pub key: AllowanceKey,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub used_this_period: Option<Decimal>,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub unused_prior_period: Option<Decimal>,
}

/// How much of an allowance a calculation consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AllowanceConsumption {
    pub key: AllowanceKey,
    /// Amount drawn from the current period.
    #[schemars(with = "f64")]
    pub current: Decimal,
    /// Amount drawn from the prior period's unused balance.
    #[schemars(with = "f64")]
    pub carried: Decimal,
}

/// Facts the pipeline needs beyond the amount itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowanceContext<'a> {
    /// Reference figure for tapered allowances, normally total income.
    pub taper_reference: Option<Decimal>,
    pub age_band: Option<AgeBand>,
    /// Recipient of the transfer, for unlimited relationship exemptions.
    pub relationship: Option<Relationship>,
    pub states: &'a [AllowanceState],
    pub relief: Option<&'a ReliefClaim>,
}

/// Result of the pipeline: what is left to tax and how it got there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceOutcome {
    pub taxable: Decimal,
    pub consumed: Vec<AllowanceConsumption>,
    pub lines: Vec<LineItem>,
    pub warnings: Vec<Warning>,
}

/// Reduce `gross` by every exemption and relief the rules grant for
/// `kind`, in the fixed order described at module level.
pub fn apply_allowances(
    gross: Decimal,
    rules: &RuleSet,
    kind: TaxKind,
    ctx: AllowanceContext<'_>,
) -> Result<AllowanceOutcome, CalcError> {
    let mut outcome = AllowanceOutcome {
        taxable: gross.max(Decimal::ZERO),
        consumed: Vec::new(),
        lines: Vec::new(),
        warnings: Vec::new(),
    };

    // Unlimited relationship exemptions short-circuit everything else.
    if let Some(relationship) = ctx.relationship {
        if rules.is_exempt_relationship(relationship) {
            log::debug!("{relationship} exemption covers the full amount {gross}");
            outcome
                .lines
                .push(LineItem::new(format!("{relationship} exemption"), outcome.taxable));
            outcome.taxable = Decimal::ZERO;
            return Ok(outcome);
        }
    }

    let allowances = rules.allowances_for(kind);
    for allowance in allowances.iter().filter(|a| a.taper.is_some()) {
        apply_tapered(allowance, &ctx, &mut outcome)?;
    }
    for allowance in allowances.iter().filter(|a| a.taper.is_none()) {
        apply_fixed(allowance, &ctx, &mut outcome)?;
    }

    if let Some(claim) = ctx.relief {
        let relief = percentage_relief(rules, outcome.taxable, claim);
        outcome.taxable -= relief.relieved;
        outcome.lines.extend(relief.line);
        outcome.warnings.extend(relief.warning);
    }

    Ok(outcome)
}

fn apply_tapered(
    allowance: &Allowance,
    ctx: &AllowanceContext<'_>,
    outcome: &mut AllowanceOutcome,
) -> Result<(), CalcError> {
    if !age_permits(allowance, ctx, outcome) {
        return Ok(());
    }
    let Some(taper) = &allowance.taper else {
        return Ok(());
    };
    // A tapered allowance cannot be granted at its full value on a guess;
    // the reference figure must be supplied.
    let reference = ctx.taper_reference.ok_or(InputError::MissingFact {
        what: format!("reference income for the {} taper", allowance.key),
    })?;

    let reduction = taper.reduction(reference).min(allowance.amount);
    let available = allowance.amount - reduction;
    let applied = outcome.taxable.min(available);
    log::debug!(
        "{}: {} available after taper reduction {}, applying {}",
        allowance.key,
        available,
        reduction,
        applied
    );
    if applied > Decimal::ZERO {
        let label = if reduction > Decimal::ZERO {
            format!("{} (tapered)", allowance.key)
        } else {
            allowance.key.to_string()
        };
        outcome.lines.push(LineItem::new(label, applied));
        outcome.consumed.push(AllowanceConsumption {
            key: allowance.key,
            current: applied,
            carried: Decimal::ZERO,
        });
        outcome.taxable -= applied;
    }
    Ok(())
}

fn apply_fixed(
    allowance: &Allowance,
    ctx: &AllowanceContext<'_>,
    outcome: &mut AllowanceOutcome,
) -> Result<(), CalcError> {
    if !age_permits(allowance, ctx, outcome) {
        return Ok(());
    }
    let state = ctx.states.iter().find(|s| s.key == allowance.key);

    let used = state.and_then(|s| s.used_this_period).unwrap_or(Decimal::ZERO);
    if used > allowance.amount {
        return Err(FactError::AllowanceOverused {
            allowance: allowance.key.to_string(),
            used,
            limit: allowance.amount,
        }
        .into());
    }

    let current = outcome.taxable.min(allowance.amount - used);
    if current > Decimal::ZERO {
        outcome
            .lines
            .push(LineItem::new(allowance.key.to_string(), current));
        outcome.taxable -= current;
    }

    let mut carried = Decimal::ZERO;
    if allowance.carry_forward && outcome.taxable > Decimal::ZERO {
        match state.and_then(|s| s.unused_prior_period) {
            Some(unused) => {
                if unused > allowance.amount {
                    return Err(FactError::AllowanceOverused {
                        allowance: format!("{} (prior period unused)", allowance.key),
                        used: unused,
                        limit: allowance.amount,
                    }
                    .into());
                }
                carried = outcome.taxable.min(unused);
                if carried > Decimal::ZERO {
                    outcome.lines.push(LineItem::new(
                        format!("{} (carried forward)", allowance.key),
                        carried,
                    ));
                    outcome.taxable -= carried;
                }
            }
            None => {
                // Unknown prior usage: nothing carries forward.
                outcome.warnings.push(Warning::CarryForwardUnknown {
                    allowance: allowance.key.to_string(),
                });
            }
        }
    }

    if current > Decimal::ZERO || carried > Decimal::ZERO {
        outcome.consumed.push(AllowanceConsumption {
            key: allowance.key,
            current,
            carried,
        });
    }
    Ok(())
}

/// Whether an age-gated allowance may be granted. Emits a warning when the
/// age band is unknown, since the allowance might have applied.
fn age_permits(
    allowance: &Allowance,
    ctx: &AllowanceContext<'_>,
    outcome: &mut AllowanceOutcome,
) -> bool {
    let Some(minimum) = allowance.minimum_age else {
        return true;
    };
    match ctx.age_band {
        Some(age) => age >= minimum,
        None => {
            outcome.warnings.push(Warning::AgeUnknown {
                allowance: allowance.key.to_string(),
            });
            false
        }
    }
}

/// Outcome of a single percentage-relief claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReliefOutcome {
    /// Amount removed from the value.
    pub relieved: Decimal,
    pub line: Option<LineItem>,
    pub warning: Option<Warning>,
}

/// Apply one declared percentage relief to a value, checking eligibility.
///
/// An unmet holding period never fails the calculation: the value is taxed
/// in full and the claim is flagged so the caller can revisit it.
pub fn percentage_relief(rules: &RuleSet, value: Decimal, claim: &ReliefClaim) -> ReliefOutcome {
    let none = |warning| ReliefOutcome {
        relieved: Decimal::ZERO,
        line: None,
        warning,
    };
    let Some(relief) = rules.relief(claim.category) else {
        log::debug!(
            "no {} in rule set {}, claim ignored",
            claim.category,
            rules.version()
        );
        return none(None);
    };
    match claim.held_years {
        None => none(Some(Warning::ReliefUnverified {
            relief: claim.category.to_string(),
        })),
        Some(held) if held < relief.minimum_holding_years => {
            none(Some(Warning::ReliefNotYetEligible {
                relief: claim.category.to_string(),
                required_years: relief.minimum_holding_years,
                held_years: held,
            }))
        }
        Some(_) => {
            let relieved = value * relief.rate;
            ReliefOutcome {
                relieved,
                line: Some(LineItem::new(claim.category.to_string(), relieved)),
                warning: None,
            }
        }
    }
}
