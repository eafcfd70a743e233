//! Built-in Irish rule sets, identified by calendar year.
//!
//! Figures from https://www.revenue.ie; personal tax credits are a netting
//! concern outside this engine, so income is banded from the first euro.

use super::{
    Allowance, AllowanceKey, BandTables, DateRange, EstateRules, ReliefCategory, ReliefRate,
    RuleSet,
};
use crate::bands::Band;
use crate::jurisdiction::{AgeBand, Jurisdiction, Relationship, TaxKind, TaxYear};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// First calendar year with a built-in rule set.
pub(super) const FIRST_YEAR: i32 = 2019;
/// Last calendar year with a built-in rule set.
pub(super) const LAST_YEAR: i32 = 2026;

pub(crate) fn rule_set(year: i32) -> RuleSet {
    let tax_year = TaxYear {
        jurisdiction: Jurisdiction::Ireland,
        ending: year,
    };
    RuleSet {
        jurisdiction: Jurisdiction::Ireland,
        year_label: tax_year.display(),
        effective: DateRange::new(tax_year.start_date(), tax_year.end_date()),
        tables: BandTables {
            income: income_bands(year),
            // Dividends are taxed as income, with no separate allowance
            dividend: income_bands(year),
            capital_gains: vec![Band::new("standard", dec!(0), None, dec!(0.33))],
            social_contributions: social_bands(year),
            estate_duty: vec![Band::new("standard", dec!(0), None, dec!(0.33))],
        },
        allowances: vec![
            Allowance {
                key: AllowanceKey::AgeExemption,
                applies_to: TaxKind::Income,
                amount: dec!(18000),
                taper: None,
                carry_forward: false,
                minimum_age: Some(AgeBand::From65To74),
            },
            Allowance {
                key: AllowanceKey::AnnualExempt,
                applies_to: TaxKind::CapitalGains,
                amount: dec!(1270),
                taper: None,
                carry_forward: false,
                minimum_age: None,
            },
            Allowance {
                key: AllowanceKey::GiftAnnual,
                applies_to: TaxKind::EstateDuty,
                // Small gift exemption; unused amounts do not carry forward
                amount: dec!(3000),
                taper: None,
                carry_forward: false,
                minimum_age: None,
            },
        ],
        reliefs: vec![
            ReliefRate {
                category: ReliefCategory::Business,
                rate: dec!(0.9),
                minimum_holding_years: 5,
            },
            ReliefRate {
                category: ReliefCategory::Agricultural,
                rate: dec!(0.9),
                minimum_holding_years: 6,
            },
        ],
        exempt_relationships: vec![Relationship::Spouse, Relationship::Charity],
        estate: EstateRules {
            nil_rate_band: group_threshold(year),
            threshold_transferable: false,
            residence_threshold: None,
            charitable: None,
        },
        // No relief schedule: transfers inside the window get no taper
        gift_taper: Vec::new(),
    }
}

fn standard_rate_limit(year: i32) -> Decimal {
    match year {
        2024.. => dec!(42000),
        2023 => dec!(40000),
        2022 => dec!(36800),
        _ => dec!(35300),
    }
}

fn income_bands(year: i32) -> Vec<Band> {
    vec![
        Band::new("standard", dec!(0), Some(standard_rate_limit(year)), dec!(0.20)),
        Band::new("higher", standard_rate_limit(year), None, dec!(0.40)),
    ]
}

fn social_bands(year: i32) -> Vec<Band> {
    let (second_limit, third_rate) = match year {
        // Budget 2024 widened the 2% band and cut the third rate
        2024.. => (dec!(25760), dec!(0.04)),
        _ => (dec!(22920), dec!(0.045)),
    };
    vec![
        Band::new("first", dec!(0), Some(dec!(12012)), dec!(0.005)),
        Band::new("second", dec!(12012), Some(second_limit), dec!(0.02)),
        Band::new("third", second_limit, Some(dec!(70044)), third_rate),
        Band::new("fourth", dec!(70044), None, dec!(0.08)),
    ]
}

fn group_threshold(year: i32) -> Decimal {
    match year {
        // Raised in Budget 2025
        2025.. => dec!(400000),
        _ => dec!(335000),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_range_is_the_calendar_year() {
        let rules = rule_set(2024);
        assert_eq!(
            rules.effective.start,
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert_eq!(
            rules.effective.end,
            chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
        );
        assert_eq!(rules.year_label, "2024");
    }

    #[test]
    fn standard_rate_limit_by_year() {
        assert_eq!(standard_rate_limit(2022), dec!(36800));
        assert_eq!(standard_rate_limit(2023), dec!(40000));
        assert_eq!(standard_rate_limit(2024), dec!(42000));
        assert_eq!(standard_rate_limit(2025), dec!(42000));
    }

    #[test]
    fn group_threshold_rises_in_2025() {
        assert_eq!(group_threshold(2024), dec!(335000));
        assert_eq!(group_threshold(2025), dec!(400000));
    }

    #[test]
    fn no_personal_allowance_and_no_taper_schedule() {
        let rules = rule_set(2024);
        assert!(rules.allowance(AllowanceKey::Personal).is_none());
        assert!(rules.gift_taper.is_empty());
        assert!(!rules.estate.threshold_transferable);
    }

    #[test]
    fn age_exemption_is_age_gated() {
        let rules = rule_set(2024);
        let age = rules.allowance(AllowanceKey::AgeExemption).unwrap();
        assert_eq!(age.minimum_age, Some(AgeBand::From65To74));
        assert_eq!(age.amount, dec!(18000));
    }

    #[test]
    fn social_bands_are_contiguous() {
        crate::bands::validate_table(&social_bands(2024)).unwrap();
        crate::bands::validate_table(&social_bands(2023)).unwrap();
    }
}
