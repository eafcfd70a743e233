//! Lifetime transfer tracking: classification at the date of the gift,
//! the seven-year cumulation at a reference date, and taper relief.
//!
//! The cumulation replays gifts in chronological order. Each gift's
//! annual exemption comes from the rule set effective at that gift's
//! date, and each gift is threshold-tested against the nil rate band as
//! it stood on that date. Tax on the chargeable excess uses the rates at
//! the reference date, reduced by taper relief; taper reduces the tax
//! due, never the transferred value entering cumulation.

use crate::allowances::{
    apply_allowances, AllowanceConsumption, AllowanceContext, AllowanceState, LineItem,
};
use crate::bands;
use crate::error::{CalcError, FactError};
use crate::jurisdiction::{Jurisdiction, Relationship, TaxKind, TaxYear};
use crate::request::GiftRecord;
use crate::rules::{AllowanceKey, RuleSet, RuleStore};
use crate::warnings::Warning;
use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a transfer is treated at the moment it is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum GiftClass {
    /// Exempt without limit, e.g. to a spouse or charity.
    Exempt,
    /// Out of charge if the giver survives the exemption window.
    PotentiallyExempt,
    /// Chargeable when made, e.g. into a discretionary structure.
    Chargeable,
}

/// A gift with its classification as at the gift date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClassifiedGift {
    pub id: String,
    pub date: NaiveDate,
    #[schemars(with = "f64")]
    pub value: Decimal,
    pub recipient: Relationship,
    pub class: GiftClass,
    /// When a potentially exempt transfer falls out of charge.
    pub becomes_exempt_on: Option<NaiveDate>,
}

/// One gift's slot in the cumulation at the reference date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GiftTaxLine {
    pub gift_id: String,
    pub date: NaiveDate,
    #[schemars(with = "f64")]
    pub value: Decimal,
    /// Exemption lines applied to this gift.
    pub exemptions: Vec<LineItem>,
    /// Value entering cumulation after exemptions.
    #[schemars(with = "f64")]
    pub net_value: Decimal,
    /// Net transfers cumulated before this gift.
    #[schemars(with = "f64")]
    pub cumulative_before: Decimal,
    /// Nil rate band as it stood on the gift date.
    #[schemars(with = "f64")]
    pub threshold_at_gift: Decimal,
    /// Excess of cumulative transfers over the threshold, capped at net value.
    #[schemars(with = "f64")]
    pub chargeable: Decimal,
    #[schemars(with = "f64")]
    pub tax_before_taper: Decimal,
    pub elapsed_years: u32,
    /// Taper relief fraction, recorded even when no tax is due.
    #[schemars(with = "f64")]
    pub taper_relief: Decimal,
    #[schemars(with = "f64")]
    pub tax: Decimal,
}

/// The cumulation of all non-exempt gifts inside the exemption window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GiftCumulation {
    pub jurisdiction: Jurisdiction,
    pub reference_date: NaiveDate,
    pub entries: Vec<GiftTaxLine>,
    /// Sum of net values inside the window; consumes the estate threshold.
    #[schemars(with = "f64")]
    pub total_within_window: Decimal,
    #[schemars(with = "f64")]
    pub total_tax: Decimal,
    pub warnings: Vec<Warning>,
}

/// Classify one gift under the rules effective at its date.
pub fn classify(gift: &GiftRecord, rules: &RuleSet) -> ClassifiedGift {
    let class = if rules.is_exempt_relationship(gift.recipient) {
        GiftClass::Exempt
    } else if gift.into_trust {
        GiftClass::Chargeable
    } else {
        GiftClass::PotentiallyExempt
    };
    ClassifiedGift {
        id: gift.id.clone(),
        date: gift.date,
        value: gift.value,
        recipient: gift.recipient,
        class,
        becomes_exempt_on: match class {
            GiftClass::PotentiallyExempt => Some(exemption_horizon(gift.date)),
            _ => None,
        },
    }
}

/// Classify every gift, in chronological order, each under the rules
/// effective at its own date.
pub fn classify_all(
    gifts: &[GiftRecord],
    store: &RuleStore,
    jurisdiction: Jurisdiction,
) -> Result<Vec<ClassifiedGift>, CalcError> {
    let mut classified = Vec::with_capacity(gifts.len());
    for gift in ordered(gifts) {
        let rules = store.lookup(jurisdiction, gift.date)?;
        classified.push(classify(gift, rules));
    }
    Ok(classified)
}

/// Replay all gifts chronologically and cumulate those inside the
/// exemption window ending at `reference_date`.
///
/// Gifts before the window still run through the replay so their
/// exemption usage is reflected in later years' carry forward.
pub fn seven_year_cumulation(
    gifts: &[GiftRecord],
    store: &RuleStore,
    jurisdiction: Jurisdiction,
    reference_date: NaiveDate,
    states: &[AllowanceState],
) -> Result<GiftCumulation, CalcError> {
    let rules_at_reference = store.lookup(jurisdiction, reference_date)?;
    let death_bands = &rules_at_reference.tables.estate_duty;

    let mut ledger = ExemptionLedger::seeded(store, jurisdiction, reference_date, states)?;
    let mut cumulation = GiftCumulation {
        jurisdiction,
        reference_date,
        entries: Vec::new(),
        total_within_window: Decimal::ZERO,
        total_tax: Decimal::ZERO,
        warnings: Vec::new(),
    };

    for gift in ordered(gifts) {
        let rules_at_gift = store.lookup(jurisdiction, gift.date)?;
        if rules_at_gift.is_exempt_relationship(gift.recipient) {
            // Exempt transfers never enter cumulation and use no exemption.
            continue;
        }

        let gift_year = TaxYear::from_date(jurisdiction, gift.date);
        let state = ledger.state_for(store, gift_year)?;
        let ctx = AllowanceContext {
            relationship: Some(gift.recipient),
            states: std::slice::from_ref(&state),
            ..Default::default()
        };
        let outcome = apply_allowances(gift.value, rules_at_gift, TaxKind::EstateDuty, ctx)?;
        ledger.record(gift_year, &outcome.consumed);
        for warning in outcome.warnings {
            if !cumulation.warnings.contains(&warning) {
                cumulation.warnings.push(warning);
            }
        }

        let in_window =
            gift.date <= reference_date && exemption_horizon(gift.date) > reference_date;
        if !in_window {
            log::debug!("gift {} outside the window, replayed for exemptions only", gift.id);
            continue;
        }

        let net_value = outcome.taxable;
        let threshold = rules_at_gift.estate.nil_rate_band;
        let headroom = (threshold - cumulation.total_within_window).max(Decimal::ZERO);
        let chargeable = (net_value - headroom).max(Decimal::ZERO);
        let tax_before_taper = bands::allocate(chargeable, death_bands).total_tax;
        let elapsed_years = elapsed_years(gift.date, reference_date);
        let taper_relief = rules_at_reference.gift_taper_relief(elapsed_years);
        let tax = tax_before_taper * (Decimal::ONE - taper_relief);
        log::debug!(
            "gift {}: net {} over headroom {} -> chargeable {}, taper {} after {} years",
            gift.id,
            net_value,
            headroom,
            chargeable,
            taper_relief,
            elapsed_years
        );

        cumulation.entries.push(GiftTaxLine {
            gift_id: gift.id.clone(),
            date: gift.date,
            value: gift.value,
            exemptions: outcome.lines,
            net_value,
            cumulative_before: cumulation.total_within_window,
            threshold_at_gift: threshold,
            chargeable,
            tax_before_taper,
            elapsed_years,
            taper_relief,
            tax,
        });
        cumulation.total_within_window += net_value;
        cumulation.total_tax += tax;
    }

    Ok(cumulation)
}

/// Tax due on lifetime transfers if the giver died on the given date.
pub fn liability_if_death_on(
    gifts: &[GiftRecord],
    store: &RuleStore,
    jurisdiction: Jurisdiction,
    date: NaiveDate,
    states: &[AllowanceState],
) -> Result<Decimal, CalcError> {
    Ok(seven_year_cumulation(gifts, store, jurisdiction, date, states)?.total_tax)
}

/// Date the exemption window ends for a gift made on `date`.
fn exemption_horizon(date: NaiveDate) -> NaiveDate {
    date.checked_add_months(Months::new(84)).unwrap_or(NaiveDate::MAX)
}

/// Whole years elapsed, on a 365.25-day year.
fn elapsed_years(from: NaiveDate, to: NaiveDate) -> u32 {
    let days = (to - from).num_days();
    if days <= 0 {
        0
    } else {
        ((days * 100) / 36525) as u32
    }
}

fn ordered(gifts: &[GiftRecord]) -> Vec<&GiftRecord> {
    let mut ordered: Vec<&GiftRecord> = gifts.iter().collect();
    ordered.sort_by(|a, b| (a.date, &a.id).cmp(&(b.date, &b.id)));
    ordered
}

/// Per-tax-year exemption usage, replayed chronologically.
///
/// Usage is known for every year from the earliest replayed or seeded
/// year onwards; anything earlier is unknown, so nothing carries out of
/// it. The request contract asks for a gift history covering the window
/// plus one year, which keeps the known range contiguous.
struct ExemptionLedger {
    jurisdiction: Jurisdiction,
    used: HashMap<i32, Decimal>,
    known_from: Option<i32>,
}

impl ExemptionLedger {
    fn seeded(
        store: &RuleStore,
        jurisdiction: Jurisdiction,
        reference_date: NaiveDate,
        states: &[AllowanceState],
    ) -> Result<Self, CalcError> {
        let mut ledger = ExemptionLedger {
            jurisdiction,
            used: HashMap::new(),
            known_from: None,
        };
        let current = TaxYear::from_date(jurisdiction, reference_date);
        if let Some(state) = states.iter().find(|s| s.key == AllowanceKey::GiftAnnual) {
            if let Some(used) = state.used_this_period {
                ledger.add(current.ending, used);
            }
            if let Some(unused) = state.unused_prior_period {
                let prior = current.previous();
                let amount = annual_exemption(store, jurisdiction, prior)?;
                if unused > amount {
                    return Err(FactError::AllowanceOverused {
                        allowance: format!("{} (prior period unused)", AllowanceKey::GiftAnnual),
                        used: unused,
                        limit: amount,
                    }
                    .into());
                }
                ledger.add(prior.ending, amount - unused);
            }
        }
        Ok(ledger)
    }

    fn add(&mut self, year: i32, used: Decimal) {
        *self.used.entry(year).or_insert(Decimal::ZERO) += used;
        self.known_from = Some(self.known_from.map_or(year, |known| known.min(year)));
    }

    /// Build the pipeline state for a gift in `year`: current usage from
    /// the replay, prior unused only where the prior year is known.
    fn state_for(&mut self, store: &RuleStore, year: TaxYear) -> Result<AllowanceState, CalcError> {
        // The gift itself makes its year known from here on.
        self.known_from = Some(self.known_from.map_or(year.ending, |k| k.min(year.ending)));

        let used_this_period = self.used.get(&year.ending).copied().unwrap_or(Decimal::ZERO);
        let prior = year.previous();
        let prior_known = self.known_from.is_some_and(|known| prior.ending >= known);
        let unused_prior_period = if prior_known {
            let amount = annual_exemption(store, self.jurisdiction, prior)?;
            let used = self.used.get(&prior.ending).copied().unwrap_or(Decimal::ZERO);
            Some((amount - used).max(Decimal::ZERO))
        } else {
            None
        };
        Ok(AllowanceState {
            key: AllowanceKey::GiftAnnual,
            used_this_period: Some(used_this_period),
            unused_prior_period,
        })
    }

    fn record(&mut self, year: TaxYear, consumed: &[AllowanceConsumption]) {
        for consumption in consumed.iter().filter(|c| c.key == AllowanceKey::GiftAnnual) {
            if consumption.current > Decimal::ZERO {
                self.add(year.ending, consumption.current);
            }
            if consumption.carried > Decimal::ZERO {
                self.add(year.previous().ending, consumption.carried);
            }
        }
    }
}

fn annual_exemption(
    store: &RuleStore,
    jurisdiction: Jurisdiction,
    year: TaxYear,
) -> Result<Decimal, CalcError> {
    let rules = store.lookup(jurisdiction, year.end_date())?;
    Ok(rules
        .allowance(AllowanceKey::GiftAnnual)
        .map(|a| a.amount)
        .unwrap_or(Decimal::ZERO))
}
