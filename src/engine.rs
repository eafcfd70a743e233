//! The orchestrator: one call from a validated request to a full
//! `Assessment`.
//!
//! Sequencing follows the data: income-type taxes run per kind over the
//! residence jurisdiction's rules, lifetime transfers are classified and
//! cumulated, the estate is aggregated per jurisdiction with the gift
//! cumulation consuming the threshold, and dual-taxed items, whether
//! estate assets or flagged disposals, are reconciled with the residence
//! jurisdiction granting the credit.

use crate::allowances::{apply_allowances, percentage_relief, AllowanceContext, LineItem};
use crate::assessment::{
    Assessment, DisposalTax, ForeignGains, GiftReview, JurisdictionLiability, RuleVersion,
    TaxComputation,
};
use crate::bands;
use crate::crossborder::{reconcile, DualTaxedItem};
use crate::error::{CalcError, InputError};
use crate::estate::{compute_estate, EstateComputation};
use crate::gifts::{classify_all, seven_year_cumulation};
use crate::jurisdiction::{Jurisdiction, TaxKind};
use crate::request::CalculationRequest;
use crate::rules::{RuleSet, RuleStore};
use crate::warnings::Warning;
use rust_decimal::Decimal;

/// Run one assessment against the given rule store.
///
/// Pure apart from rule lookups: the same request against the same store
/// always produces a digest-identical assessment.
pub fn assess(store: &RuleStore, request: &CalculationRequest) -> Result<Assessment, CalcError> {
    request.validate()?;

    let residence = request.taxpayer.residence;
    let rules = store.lookup(residence, request.as_of)?;
    log::debug!(
        "assessing as of {} under {} for a {residence} resident",
        request.as_of,
        rules.version()
    );

    let mut versions = VersionLedger::default();
    versions.record(rules);
    let mut warnings: Vec<Warning> = Vec::new();
    let mut computations = Vec::new();

    if let Some(income) = &request.income {
        let ctx = AllowanceContext {
            taper_reference: Some(income.total()),
            age_band: request.taxpayer.age_band,
            states: &request.allowance_states,
            ..Default::default()
        };
        computations.push(banded_computation(
            TaxKind::Income,
            income.total(),
            rules,
            ctx,
            &mut warnings,
        )?);
        // Social contributions share the income base; their nil band below
        // the threshold stands in for an allowance.
        computations.push(TaxComputation {
            kind: TaxKind::SocialContributions,
            gross: income.total(),
            allowance_lines: Vec::new(),
            allocation: bands::allocate(
                income.total(),
                rules.tables.for_kind(TaxKind::SocialContributions),
            ),
        });
    }

    if let Some(dividends) = &request.dividends {
        let ctx = AllowanceContext {
            age_band: request.taxpayer.age_band,
            states: &request.allowance_states,
            ..Default::default()
        };
        computations.push(banded_computation(
            TaxKind::Dividend,
            dividends.gross,
            rules,
            ctx,
            &mut warnings,
        )?);
    }

    let mut foreign_gains: Option<ForeignGains> = None;
    let mut dual_items: Vec<DualTaxedItem> = Vec::new();
    if let Some(gains) = &request.gains {
        // Per-disposal reliefs come off each gain before the annual
        // exemption sees the total.
        let mut relieved_total = Decimal::ZERO;
        let mut relieved = Vec::with_capacity(gains.disposals.len());
        let mut relief_lines = Vec::new();
        for disposal in &gains.disposals {
            let mut net = disposal.gain;
            if let Some(claim) = &disposal.relief {
                let relief = percentage_relief(rules, disposal.gain, claim);
                net -= relief.relieved;
                if let Some(line) = relief.line {
                    relief_lines.push(LineItem::new(
                        format!("{} ({})", line.label, disposal.id),
                        line.amount,
                    ));
                }
                gather(&mut warnings, relief.warning);
            }
            relieved_total += net;
            relieved.push(net);
        }
        let ctx = AllowanceContext {
            age_band: request.taxpayer.age_band,
            states: &request.allowance_states,
            ..Default::default()
        };
        let mut computation = banded_computation(
            TaxKind::CapitalGains,
            relieved_total,
            rules,
            ctx,
            &mut warnings,
        )?;
        computation.gross = gains.disposals.iter().map(|d| d.gain).sum();
        relief_lines.append(&mut computation.allowance_lines);
        computation.allowance_lines = relief_lines;
        let residence_cgt = computation.tax();
        computations.push(computation);

        // Disposals flagged as taxed elsewhere are charged again under the
        // other jurisdiction's rules and join the dual-taxed items with the
        // residence tax attributed to them.
        for other in Jurisdiction::ALL {
            if other == residence {
                continue;
            }
            let flagged: Vec<usize> = gains
                .disposals
                .iter()
                .enumerate()
                .filter(|(_, d)| d.also_taxed_in == Some(other))
                .map(|(i, _)| i)
                .collect();
            if flagged.is_empty() {
                continue;
            }
            let other_rules = store.lookup(other, request.as_of)?;
            versions.record(other_rules);
            let mut lines = Vec::new();
            let mut nets = Vec::with_capacity(flagged.len());
            let mut total = Decimal::ZERO;
            for &i in &flagged {
                let disposal = &gains.disposals[i];
                let mut net = disposal.gain;
                if let Some(claim) = &disposal.relief {
                    let relief = percentage_relief(other_rules, disposal.gain, claim);
                    net -= relief.relieved;
                    if let Some(line) = relief.line {
                        lines.push(LineItem::new(
                            format!("{} ({})", line.label, disposal.id),
                            line.amount,
                        ));
                    }
                    gather(&mut warnings, relief.warning);
                }
                total += net;
                nets.push((i, net));
            }
            // The other jurisdiction's reliefs and bands apply, but a
            // non-resident gets no annual exemption there.
            let allocation =
                bands::allocate(total, other_rules.tables.for_kind(TaxKind::CapitalGains));
            let other_total = allocation.total_tax;
            let mut attributions = Vec::new();
            for (i, net) in nets {
                if other_total.is_zero() || net <= Decimal::ZERO {
                    continue;
                }
                let disposal = &gains.disposals[i];
                let tax = other_total * net / total;
                attributions.push(DisposalTax {
                    disposal_id: disposal.id.clone(),
                    tax,
                });
                let residence_tax = if relieved_total > Decimal::ZERO {
                    residence_cgt * relieved[i] / relieved_total
                } else {
                    Decimal::ZERO
                };
                if residence_tax > Decimal::ZERO {
                    dual_items.push(DualTaxedItem {
                        item_id: disposal.id.clone(),
                        residence_tax,
                        other_tax: tax,
                    });
                }
            }
            foreign_gains = Some(ForeignGains {
                jurisdiction: other,
                allowance_lines: lines,
                allocation,
                attributions,
            });
        }
    }

    let gifts = if request.gifts.is_empty() {
        None
    } else {
        let classified = classify_all(&request.gifts, store, residence)?;
        let cumulation = seven_year_cumulation(
            &request.gifts,
            store,
            residence,
            request.as_of,
            &request.allowance_states,
        )?;
        for gift in &request.gifts {
            versions.record(store.lookup(residence, gift.date)?);
        }
        for warning in &cumulation.warnings {
            gather(&mut warnings, Some(warning.clone()));
        }
        Some(GiftReview {
            classified,
            cumulation,
        })
    };
    let gifts_within_window = gifts
        .as_ref()
        .map(|g| g.cumulation.total_within_window)
        .unwrap_or(Decimal::ZERO);

    let mut estates: Vec<EstateComputation> = Vec::new();
    if let Some(facts) = &request.estate {
        let domicile = request.taxpayer.domicile.ok_or(InputError::MissingFact {
            what: "domicile".to_string(),
        })?;
        for jurisdiction in Jurisdiction::ALL {
            let jurisdiction_rules = store.lookup(jurisdiction, request.as_of)?;
            versions.record(jurisdiction_rules);
            // Lifetime transfers were cumulated under the residence rules
            // and consume only that jurisdiction's threshold.
            let consuming = if jurisdiction == residence {
                gifts_within_window
            } else {
                Decimal::ZERO
            };
            let computation =
                compute_estate(facts, jurisdiction_rules, jurisdiction, domicile, consuming)?;
            for warning in &computation.warnings {
                gather(&mut warnings, Some(warning.clone()));
            }
            estates.push(computation);
        }
    }

    // Assets bearing estate duty in both jurisdictions join the flagged
    // disposals as dual-taxed items; the residence jurisdiction grants
    // the credit.
    if let (Some(here), Some(there)) = (
        estates.iter().find(|e| e.jurisdiction == residence),
        estates.iter().find(|e| e.jurisdiction != residence),
    ) {
        for attribution in &here.attributions {
            let other_tax = there.tax_on(&attribution.asset_id);
            if other_tax > Decimal::ZERO {
                dual_items.push(DualTaxedItem {
                    item_id: attribution.asset_id.clone(),
                    residence_tax: attribution.tax,
                    other_tax,
                });
            }
        }
    }
    let reconciliation = if request.estate.is_some() || foreign_gains.is_some() {
        Some(reconcile(residence, dual_items))
    } else {
        None
    };

    // A liability deductible somewhere but deducted nowhere is worth a flag.
    if let Some(facts) = &request.estate {
        for liability in &facts.liabilities {
            if liability.deductible_in.is_empty() {
                continue;
            }
            let deducted_somewhere = estates.iter().any(|e| {
                e.deductions
                    .iter()
                    .any(|d| d.liability_id == liability.id)
            });
            if !deducted_somewhere {
                gather(
                    &mut warnings,
                    Some(Warning::LiabilityNotDeducted {
                        liability: liability.id.clone(),
                        amount: liability.amount,
                    }),
                );
            }
        }
    }

    let mut liabilities = Vec::new();
    for jurisdiction in Jurisdiction::ALL {
        let estate_tax = estates
            .iter()
            .find(|e| e.jurisdiction == jurisdiction)
            .map(|e| e.tax())
            .unwrap_or(Decimal::ZERO);
        let mut gross = estate_tax;
        let mut credit = Decimal::ZERO;
        if jurisdiction == residence {
            gross += computations.iter().map(|c| c.tax()).sum::<Decimal>();
            gross += gifts
                .as_ref()
                .map(|g| g.cumulation.total_tax)
                .unwrap_or(Decimal::ZERO);
            credit = reconciliation
                .as_ref()
                .map(|r| r.total_credit)
                .unwrap_or(Decimal::ZERO);
        } else if let Some(fg) = &foreign_gains {
            if fg.jurisdiction == jurisdiction {
                gross += fg.tax();
            }
        }
        if gross.is_zero() && jurisdiction != residence {
            continue;
        }
        liabilities.push(JurisdictionLiability {
            jurisdiction,
            gross,
            credit,
            net: (gross - credit).max(Decimal::ZERO),
        });
    }

    Ok(Assessment {
        as_of: request.as_of,
        residence,
        rule_versions: versions.into_inner(),
        computations,
        foreign_gains,
        gifts,
        estates,
        reconciliation,
        liabilities,
        warnings,
    })
}

/// Allowance pipeline followed by band allocation for one tax kind.
fn banded_computation(
    kind: TaxKind,
    gross: Decimal,
    rules: &RuleSet,
    ctx: AllowanceContext<'_>,
    warnings: &mut Vec<Warning>,
) -> Result<TaxComputation, CalcError> {
    let outcome = apply_allowances(gross, rules, kind, ctx)?;
    for warning in outcome.warnings {
        gather(warnings, Some(warning));
    }
    Ok(TaxComputation {
        kind,
        gross,
        allowance_lines: outcome.lines,
        allocation: bands::allocate(outcome.taxable, rules.tables.for_kind(kind)),
    })
}

fn gather(warnings: &mut Vec<Warning>, warning: Option<Warning>) {
    if let Some(warning) = warning {
        if !warnings.contains(&warning) {
            warnings.push(warning);
        }
    }
}

/// Rule versions used by an assessment, deduplicated in first-use order.
#[derive(Default)]
struct VersionLedger {
    versions: Vec<RuleVersion>,
}

impl VersionLedger {
    fn record(&mut self, rules: &RuleSet) {
        let version = rules.version();
        if self.versions.iter().all(|v| v.version != version) {
            self.versions.push(RuleVersion {
                jurisdiction: rules.jurisdiction,
                version,
                digest: rules.digest(),
            });
        }
    }

    fn into_inner(self) -> Vec<RuleVersion> {
        self.versions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jurisdiction::{Domicile, Situs};
    use crate::request::{
        AssetFact, AssetKind, DisposalFact, EstateFacts, GainFacts, GiftRecord, IncomeFacts,
        TaxpayerProfile,
    };
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn uk_request() -> CalculationRequest {
        CalculationRequest {
            as_of: date(2024, 6, 15),
            taxpayer: TaxpayerProfile {
                residence: Jurisdiction::Uk,
                domicile: Some(Domicile::actual(Jurisdiction::Uk)),
                age_band: None,
            },
            income: None,
            dividends: None,
            gains: None,
            gifts: Vec::new(),
            estate: None,
            allowance_states: Vec::new(),
        }
    }

    fn asset(id: &str, value: Decimal, situs: Situs) -> AssetFact {
        AssetFact {
            id: id.to_string(),
            description: None,
            kind: AssetKind::Other,
            value,
            situs,
            ownership_share: Decimal::ONE,
            passes_to: None,
            relief: None,
        }
    }

    #[test]
    fn income_only_assessment() {
        let mut request = uk_request();
        request.income = Some(IncomeFacts {
            employment: dec!(60000),
            other: dec!(0),
        });
        let assessment = assess(&RuleStore::builtin(), &request).unwrap();

        let income = assessment.computation(TaxKind::Income).unwrap();
        assert_eq!(income.allocation.taxable, dec!(47430));
        assert_eq!(income.tax(), dec!(11432));
        // Social contributions ride along on the same income.
        let social = assessment
            .computation(TaxKind::SocialContributions)
            .unwrap();
        assert!(social.tax() > Decimal::ZERO);
        assert_eq!(
            assessment.liability_in(Jurisdiction::Uk),
            income.tax() + social.tax()
        );
        assert_eq!(assessment.rule_versions.len(), 1);
        assert_eq!(assessment.rule_versions[0].version, "UK-2024/25");
    }

    #[test]
    fn missing_rule_set_fails_the_request() {
        let mut request = uk_request();
        request.as_of = date(1995, 1, 1);
        let err = assess(&RuleStore::builtin(), &request).unwrap_err();
        assert!(matches!(err, CalcError::NoRuleSet { .. }));
    }

    #[test]
    fn estate_without_domicile_is_rejected() {
        let mut request = uk_request();
        request.taxpayer.domicile = None;
        request.estate = Some(EstateFacts {
            assets: vec![asset("house", dec!(500000), Situs::Uk)],
            liabilities: Vec::new(),
            transferred_threshold_fraction: None,
        });
        let err = assess(&RuleStore::builtin(), &request).unwrap_err();
        assert!(matches!(
            err,
            CalcError::InvalidInput(InputError::MissingFact { .. })
        ));
    }

    #[test]
    fn gift_cumulation_consumes_the_estate_threshold() {
        let mut request = uk_request();
        request.gifts = vec![GiftRecord {
            id: "g1".to_string(),
            date: date(2022, 6, 1),
            value: dec!(103000),
            recipient: crate::jurisdiction::Relationship::Child,
            into_trust: false,
            description: None,
        }];
        request.estate = Some(EstateFacts {
            assets: vec![asset("house", dec!(400000), Situs::Uk)],
            liabilities: Vec::new(),
            transferred_threshold_fraction: None,
        });
        let assessment = assess(&RuleStore::builtin(), &request).unwrap();

        let review = assessment.gifts.as_ref().unwrap();
        assert_eq!(review.cumulation.total_within_window, dec!(100000));
        let estate = assessment.estate_in(Jurisdiction::Uk).unwrap();
        // 325,000 less 100,000 of gifts leaves 225,000 of threshold.
        assert_eq!(estate.threshold_total, dec!(225000));
        assert_eq!(estate.chargeable, dec!(175000));
        // Historic rule sets used by the replay are listed for audit.
        assert!(assessment
            .rule_versions
            .iter()
            .any(|v| v.version == "UK-2022/23"));
    }

    #[test]
    fn dual_taxed_asset_gets_a_residence_credit() {
        let mut request = uk_request();
        // UK domiciled, so the Irish-situs farm is in the UK estate too.
        request.estate = Some(EstateFacts {
            assets: vec![
                asset("uk-house", dec!(500000), Situs::Uk),
                asset("irish-farm", dec!(400000), Situs::Ireland),
            ],
            liabilities: Vec::new(),
            transferred_threshold_fraction: None,
        });
        let assessment = assess(&RuleStore::builtin(), &request).unwrap();

        let uk = assessment.estate_in(Jurisdiction::Uk).unwrap();
        let ireland = assessment.estate_in(Jurisdiction::Ireland).unwrap();
        assert_eq!(uk.gross_value, dec!(900000));
        // Non-Irish-domiciled: only the Irish-situs farm is charged there.
        assert_eq!(ireland.gross_value, dec!(400000));
        assert_eq!(ireland.tax(), dec!(65000) * dec!(0.33));

        let reconciliation = assessment.reconciliation.as_ref().unwrap();
        assert_eq!(reconciliation.credits.len(), 1);
        assert_eq!(reconciliation.credits[0].item_id, "irish-farm");
        // UK tax on the farm exceeds the Irish charge, so the full Irish
        // tax is credited.
        assert_eq!(reconciliation.total_credit, ireland.tax());

        let uk_liability = &assessment.liabilities[0];
        assert_eq!(uk_liability.jurisdiction, Jurisdiction::Uk);
        assert_eq!(uk_liability.gross, uk.tax());
        assert_eq!(uk_liability.net, uk.tax() - ireland.tax());
        // The situs jurisdiction's liability is untouched.
        assert_eq!(assessment.liability_in(Jurisdiction::Ireland), ireland.tax());
    }

    #[test]
    fn dual_taxed_disposal_gets_a_residence_credit() {
        let mut request = uk_request();
        request.gains = Some(GainFacts {
            disposals: vec![DisposalFact {
                id: "irish-shares".to_string(),
                description: None,
                gain: dec!(50000),
                relief: None,
                also_taxed_in: Some(Jurisdiction::Ireland),
            }],
        });
        let assessment = assess(&RuleStore::builtin(), &request).unwrap();

        // Residence side: 50,000 less the 3,000 annual exemption,
        // 37,700 at 18% and the rest at 20%.
        let cgt = assessment.computation(TaxKind::CapitalGains).unwrap();
        assert_eq!(cgt.tax(), dec!(8646));

        // Irish side: flat 33% on the full gain, no annual exemption
        // for a non-resident.
        let foreign = assessment.foreign_gains.as_ref().unwrap();
        assert_eq!(foreign.jurisdiction, Jurisdiction::Ireland);
        assert_eq!(foreign.tax(), dec!(16500));
        assert_eq!(foreign.tax_on("irish-shares"), dec!(16500));
        assert!(assessment
            .rule_versions
            .iter()
            .any(|v| v.jurisdiction == Jurisdiction::Ireland));

        // The credit is capped at the residence tax on the disposal.
        let reconciliation = assessment.reconciliation.as_ref().unwrap();
        assert_eq!(reconciliation.credits.len(), 1);
        assert_eq!(reconciliation.credits[0].item_id, "irish-shares");
        assert_eq!(reconciliation.total_credit, dec!(8646));

        assert_eq!(assessment.liability_in(Jurisdiction::Uk), dec!(0));
        assert_eq!(assessment.liability_in(Jurisdiction::Ireland), dec!(16500));
    }

    #[test]
    fn disposal_flagged_in_the_residence_jurisdiction_is_rejected() {
        let mut request = uk_request();
        request.gains = Some(GainFacts {
            disposals: vec![DisposalFact {
                id: "d1".to_string(),
                description: None,
                gain: dec!(10000),
                relief: None,
                also_taxed_in: Some(Jurisdiction::Uk),
            }],
        });
        let err = assess(&RuleStore::builtin(), &request).unwrap_err();
        assert!(matches!(
            err,
            CalcError::InvalidInput(InputError::DualTaxFlagIsResidence { .. })
        ));
    }

    #[test]
    fn undeductible_liability_is_flagged() {
        let mut request = uk_request();
        request.estate = Some(EstateFacts {
            assets: vec![asset("uk-house", dec!(500000), Situs::Uk)],
            liabilities: vec![crate::request::LiabilityFact {
                id: "irish-loan".to_string(),
                description: None,
                amount: dec!(50000),
                deductible_in: vec![Jurisdiction::Ireland],
                secured_on: None,
            }],
            transferred_threshold_fraction: None,
        });
        let assessment = assess(&RuleStore::builtin(), &request).unwrap();
        // Not Irish domiciled and nothing Irish-situs: the Irish estate is
        // empty, so the loan came off nothing.
        assert!(assessment.warnings.contains(&Warning::LiabilityNotDeducted {
            liability: "irish-loan".to_string(),
            amount: dec!(50000),
        }));
    }

    #[test]
    fn invalid_input_fails_before_any_computation() {
        let mut request = uk_request();
        request.income = Some(IncomeFacts {
            employment: dec!(-5),
            other: dec!(0),
        });
        assert!(matches!(
            assess(&RuleStore::builtin(), &request),
            Err(CalcError::InvalidInput(_))
        ));
    }

    #[test]
    fn empty_request_assesses_to_zero() {
        let assessment = assess(&RuleStore::builtin(), &uk_request()).unwrap();
        assert!(assessment.computations.is_empty());
        assert!(assessment.gifts.is_none());
        assert!(assessment.estates.is_empty());
        assert_eq!(assessment.total_liability(), dec!(0));
    }
}
