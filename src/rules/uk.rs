//! Built-in UK rule sets, identified by the end year of the tax year
//! (2025 = 2024/25).
//!
//! Figures from https://www.gov.uk/income-tax-rates and
//! https://www.gov.uk/inheritance-tax; older years are approximate where
//! noted.

use super::{
    Allowance, AllowanceKey, BandTables, CharitableRate, DateRange, EstateRules, ReliefCategory,
    ReliefRate, ResidenceThreshold, RuleSet, Taper, TaperStep,
};
use crate::bands::Band;
use crate::jurisdiction::{Jurisdiction, Relationship, TaxKind, TaxYear};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// First tax year (by end year) with a built-in rule set.
pub(super) const FIRST_YEAR: i32 = 2020;
/// Last tax year (by end year) with a built-in rule set.
pub(super) const LAST_YEAR: i32 = 2027;

pub(crate) fn rule_set(ending: i32) -> RuleSet {
    let year = TaxYear {
        jurisdiction: Jurisdiction::Uk,
        ending,
    };
    RuleSet {
        jurisdiction: Jurisdiction::Uk,
        year_label: year.display(),
        effective: DateRange::new(year.start_date(), year.end_date()),
        tables: BandTables {
            income: income_bands(ending),
            dividend: dividend_bands(ending),
            capital_gains: capital_gains_bands(ending),
            social_contributions: social_bands(ending),
            estate_duty: vec![Band::new("standard", dec!(0), None, dec!(0.40))],
        },
        allowances: vec![
            Allowance {
                key: AllowanceKey::Personal,
                applies_to: TaxKind::Income,
                amount: personal_allowance(ending),
                // Withdrawn by £1 for every £2 of income over £100,000
                taper: Some(Taper {
                    trigger: dec!(100000),
                    rate: dec!(0.5),
                }),
                carry_forward: false,
                minimum_age: None,
            },
            Allowance {
                key: AllowanceKey::Dividend,
                applies_to: TaxKind::Dividend,
                amount: dividend_allowance(ending),
                taper: None,
                carry_forward: false,
                minimum_age: None,
            },
            Allowance {
                key: AllowanceKey::AnnualExempt,
                applies_to: TaxKind::CapitalGains,
                amount: cgt_exempt_amount(ending),
                taper: None,
                carry_forward: false,
                minimum_age: None,
            },
            Allowance {
                key: AllowanceKey::GiftAnnual,
                applies_to: TaxKind::EstateDuty,
                amount: dec!(3000),
                taper: None,
                // One preceding year's unused exemption may be claimed
                carry_forward: true,
                minimum_age: None,
            },
        ],
        reliefs: vec![
            ReliefRate {
                category: ReliefCategory::Business,
                rate: dec!(1),
                minimum_holding_years: 2,
            },
            ReliefRate {
                category: ReliefCategory::Agricultural,
                rate: dec!(0.5),
                minimum_holding_years: 7,
            },
        ],
        exempt_relationships: vec![Relationship::Spouse, Relationship::Charity],
        estate: EstateRules {
            // Frozen at £325,000 since 2009
            nil_rate_band: dec!(325000),
            threshold_transferable: true,
            residence_threshold: Some(ResidenceThreshold {
                amount: residence_threshold(ending),
                // Withdrawn by £1 for every £2 the net estate exceeds £2m
                taper: Taper {
                    trigger: dec!(2000000),
                    rate: dec!(0.5),
                },
            }),
            charitable: Some(CharitableRate {
                minimum_fraction: dec!(0.10),
                reduced_rate: dec!(0.36),
            }),
        },
        gift_taper: vec![
            TaperStep {
                min_years: 3,
                relief: dec!(0.2),
            },
            TaperStep {
                min_years: 4,
                relief: dec!(0.4),
            },
            TaperStep {
                min_years: 5,
                relief: dec!(0.6),
            },
            TaperStep {
                min_years: 6,
                relief: dec!(0.8),
            },
            TaperStep {
                min_years: 7,
                relief: dec!(1),
            },
        ],
    }
}

fn personal_allowance(ending: i32) -> Decimal {
    match ending {
        // Frozen at £12,570 since 2021/22
        2022.. => dec!(12570),
        _ => dec!(12500),
    }
}

fn basic_rate_limit(ending: i32) -> Decimal {
    match ending {
        2022.. => dec!(37700),
        _ => dec!(37500),
    }
}

fn higher_rate_limit(ending: i32) -> Decimal {
    match ending {
        // Additional rate threshold lowered from April 2023
        2024.. => dec!(125140),
        _ => dec!(150000),
    }
}

fn income_bands(ending: i32) -> Vec<Band> {
    vec![
        Band::new("basic", dec!(0), Some(basic_rate_limit(ending)), dec!(0.20)),
        Band::new(
            "higher",
            basic_rate_limit(ending),
            Some(higher_rate_limit(ending)),
            dec!(0.40),
        ),
        Band::new("additional", higher_rate_limit(ending), None, dec!(0.45)),
    ]
}

fn dividend_allowance(ending: i32) -> Decimal {
    match ending {
        // 2024/25 onwards: £500
        2025.. => dec!(500),
        // 2023/24: £1,000
        2024 => dec!(1000),
        // Earlier: £2,000
        _ => dec!(2000),
    }
}

fn dividend_bands(ending: i32) -> Vec<Band> {
    let (basic, higher, additional) = match ending {
        // Raised by 1.25 points from April 2022
        2023.. => (dec!(0.0875), dec!(0.3375), dec!(0.3935)),
        _ => (dec!(0.075), dec!(0.325), dec!(0.381)),
    };
    vec![
        Band::new("basic", dec!(0), Some(basic_rate_limit(ending)), basic),
        Band::new(
            "higher",
            basic_rate_limit(ending),
            Some(higher_rate_limit(ending)),
            higher,
        ),
        Band::new("additional", higher_rate_limit(ending), None, additional),
    ]
}

fn cgt_exempt_amount(ending: i32) -> Decimal {
    match ending {
        // 2024/25 onwards: £3,000
        2025.. => dec!(3000),
        // 2023/24: £6,000
        2024 => dec!(6000),
        // Earlier years: £12,300 (approximate before 2020/21)
        _ => dec!(12300),
    }
}

fn capital_gains_bands(ending: i32) -> Vec<Band> {
    let higher = match ending {
        // From April 2025: 24%
        2026.. => dec!(0.24),
        _ => dec!(0.20),
    };
    vec![
        Band::new("basic", dec!(0), Some(basic_rate_limit(ending)), dec!(0.18)),
        Band::new("higher", basic_rate_limit(ending), None, higher),
    ]
}

fn social_bands(ending: i32) -> Vec<Band> {
    let (threshold, upper_limit) = match ending {
        2023.. => (dec!(12570), dec!(50270)),
        _ => (dec!(9500), dec!(50000)),
    };
    let main_rate = match ending {
        // 8% from 6 April 2024
        2025.. => dec!(0.08),
        // 2023/24 blended across in-year changes (approximate)
        2024 => dec!(0.10),
        _ => dec!(0.12),
    };
    vec![
        Band::new("below primary threshold", dec!(0), Some(threshold), dec!(0)),
        Band::new("main", threshold, Some(upper_limit), main_rate),
        Band::new("upper", upper_limit, None, dec!(0.02)),
    ]
}

fn residence_threshold(ending: i32) -> Decimal {
    match ending {
        // £175,000 since 2020/21
        2021.. => dec!(175000),
        _ => dec!(150000),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_range_matches_tax_year_boundaries() {
        let rules = rule_set(2025);
        assert_eq!(
            rules.effective.start,
            chrono::NaiveDate::from_ymd_opt(2024, 4, 6).unwrap()
        );
        assert_eq!(
            rules.effective.end,
            chrono::NaiveDate::from_ymd_opt(2025, 4, 5).unwrap()
        );
        assert_eq!(rules.year_label, "2024/25");
    }

    #[test]
    fn cgt_exempt_amounts_by_year() {
        assert_eq!(cgt_exempt_amount(2025), dec!(3000));
        assert_eq!(cgt_exempt_amount(2026), dec!(3000));
        assert_eq!(cgt_exempt_amount(2024), dec!(6000));
        assert_eq!(cgt_exempt_amount(2023), dec!(12300));
    }

    #[test]
    fn dividend_allowances_by_year() {
        assert_eq!(dividend_allowance(2025), dec!(500));
        assert_eq!(dividend_allowance(2024), dec!(1000));
        assert_eq!(dividend_allowance(2023), dec!(2000));
    }

    #[test]
    fn additional_rate_threshold_drops_in_2023_24() {
        assert_eq!(higher_rate_limit(2023), dec!(150000));
        assert_eq!(higher_rate_limit(2024), dec!(125140));
    }

    #[test]
    fn cgt_higher_rate_rises_from_2025_26() {
        let band = |ending: i32| capital_gains_bands(ending).last().unwrap().rate;
        assert_eq!(band(2025), dec!(0.20));
        assert_eq!(band(2026), dec!(0.24));
    }

    #[test]
    fn estate_rules_carry_both_thresholds() {
        let rules = rule_set(2025);
        assert_eq!(rules.estate.nil_rate_band, dec!(325000));
        let residence = rules.estate.residence_threshold.unwrap();
        assert_eq!(residence.amount, dec!(175000));
        assert_eq!(residence.taper.trigger, dec!(2000000));
        assert!(rules.estate.threshold_transferable);
    }

    #[test]
    fn estate_band_is_flat_forty_percent() {
        let rules = rule_set(2025);
        assert_eq!(rules.tables.estate_duty.len(), 1);
        assert_eq!(rules.tables.estate_duty[0].rate, dec!(0.40));
        assert_eq!(rules.tables.estate_duty[0].upper, None);
    }
}
