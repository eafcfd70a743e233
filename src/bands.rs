use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One rate band of a progressive table.
///
/// A band covers `[lower, upper)`; the top band of a table leaves `upper`
/// unset and covers everything above its lower bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Band {
    pub name: String,
    #[schemars(with = "f64")]
    pub lower: Decimal,
    #[schemars(with = "Option<f64>")]
    pub upper: Option<Decimal>,
    #[schemars(with = "f64")]
    pub rate: Decimal,
}

impl Band {
    pub fn new(name: &str, lower: Decimal, upper: Option<Decimal>, rate: Decimal) -> Self {
        Band {
            name: name.to_string(),
            lower,
            upper,
            rate,
        }
    }

    /// Width of the band, unbounded for the top band.
    fn width(&self) -> Option<Decimal> {
        self.upper.map(|upper| upper - self.lower)
    }
}

/// Portion of an amount that fell into one band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BandSlice {
    pub band: String,
    #[schemars(with = "f64")]
    pub amount: Decimal,
    #[schemars(with = "f64")]
    pub rate: Decimal,
    #[schemars(with = "f64")]
    pub tax: Decimal,
}

/// Result of allocating an amount across a band table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BandAllocation {
    /// The amount that was allocated.
    #[schemars(with = "f64")]
    pub taxable: Decimal,
    /// Per-band slices, only for bands that received a non-zero amount.
    pub slices: Vec<BandSlice>,
    #[schemars(with = "f64")]
    pub total_tax: Decimal,
    /// Rate that would apply to the next currency unit above the amount.
    #[schemars(with = "f64")]
    pub marginal_rate: Decimal,
    /// Total tax divided by the amount, zero for a zero amount.
    #[schemars(with = "f64")]
    pub effective_rate: Decimal,
}

/// Walk the table in ascending order, filling each band with
/// `min(remaining, band width)` until the amount is exhausted.
///
/// Tables must be validated (contiguous, ascending, unbounded top band)
/// before they reach this function; rule set construction enforces that.
/// A zero or negative amount yields a zero-tax allocation with no slices.
pub fn allocate(amount: Decimal, bands: &[Band]) -> BandAllocation {
    let marginal_rate = marginal_rate(amount, bands);

    if amount <= Decimal::ZERO {
        return BandAllocation {
            taxable: Decimal::ZERO,
            slices: Vec::new(),
            total_tax: Decimal::ZERO,
            marginal_rate,
            effective_rate: Decimal::ZERO,
        };
    }

    let mut remaining = amount;
    let mut slices = Vec::new();
    let mut total_tax = Decimal::ZERO;

    for band in bands {
        if remaining <= Decimal::ZERO {
            break;
        }
        let slice = match band.width() {
            Some(width) => remaining.min(width),
            None => remaining,
        };
        if slice <= Decimal::ZERO {
            continue;
        }
        let tax = slice * band.rate;
        log::debug!(
            "band {}: slice {} at rate {} -> {}",
            band.name,
            slice,
            band.rate,
            tax
        );
        slices.push(BandSlice {
            band: band.name.clone(),
            amount: slice,
            rate: band.rate,
            tax,
        });
        total_tax += tax;
        remaining -= slice;
    }

    debug_assert!(remaining.is_zero(), "band table did not cover the amount");

    BandAllocation {
        taxable: amount,
        slices,
        total_tax,
        marginal_rate,
        effective_rate: if amount.is_zero() {
            Decimal::ZERO
        } else {
            total_tax / amount
        },
    }
}

/// Rate of the band containing the next currency unit above `amount`.
fn marginal_rate(amount: Decimal, bands: &[Band]) -> Decimal {
    let position = amount.max(Decimal::ZERO);
    bands
        .iter()
        .find(|band| band.upper.map_or(true, |upper| position < upper))
        .map(|band| band.rate)
        .unwrap_or(Decimal::ZERO)
}

/// Reject a malformed band table, returning the reason.
///
/// A valid table is non-empty, starts at zero, is contiguous and ascending,
/// has rates within [0, 1] and leaves only its final band unbounded.
pub fn validate_table(bands: &[Band]) -> Result<(), String> {
    let Some(first) = bands.first() else {
        return Err("band table is empty".to_string());
    };
    if !first.lower.is_zero() {
        return Err(format!(
            "first band {} starts at {}, expected 0",
            first.name, first.lower
        ));
    }
    for (i, band) in bands.iter().enumerate() {
        if band.rate < Decimal::ZERO || band.rate > Decimal::ONE {
            return Err(format!("band {} has rate {} outside [0, 1]", band.name, band.rate));
        }
        match band.upper {
            Some(upper) => {
                if upper <= band.lower {
                    return Err(format!(
                        "band {} has upper bound {} not above lower bound {}",
                        band.name, upper, band.lower
                    ));
                }
                match bands.get(i + 1) {
                    Some(next) if next.lower != upper => {
                        return Err(format!(
                            "band {} ends at {} but band {} starts at {}",
                            band.name, upper, next.name, next.lower
                        ));
                    }
                    Some(_) => {}
                    None => {
                        return Err(format!(
                            "final band {} must be unbounded",
                            band.name
                        ));
                    }
                }
            }
            None => {
                if i + 1 != bands.len() {
                    return Err(format!(
                        "band {} is unbounded but is not the final band",
                        band.name
                    ));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn uk_income_bands() -> Vec<Band> {
        vec![
            Band::new("basic", dec!(0), Some(dec!(37700)), dec!(0.20)),
            Band::new("higher", dec!(37700), Some(dec!(125140)), dec!(0.40)),
            Band::new("additional", dec!(125140), None, dec!(0.45)),
        ]
    }

    #[test]
    fn amount_within_first_band() {
        let alloc = allocate(dec!(10000), &uk_income_bands());
        assert_eq!(alloc.slices.len(), 1);
        assert_eq!(alloc.total_tax, dec!(2000));
        // Below the first bound the effective rate equals the band rate.
        assert_eq!(alloc.effective_rate, dec!(0.20));
        assert_eq!(alloc.marginal_rate, dec!(0.20));
    }

    #[test]
    fn amount_spanning_two_bands() {
        let alloc = allocate(dec!(47430), &uk_income_bands());
        assert_eq!(alloc.slices.len(), 2);
        assert_eq!(alloc.slices[0].amount, dec!(37700));
        assert_eq!(alloc.slices[0].tax, dec!(7540));
        assert_eq!(alloc.slices[1].amount, dec!(9730));
        assert_eq!(alloc.slices[1].tax, dec!(3892));
        assert_eq!(alloc.total_tax, dec!(11432));
        assert_eq!(alloc.marginal_rate, dec!(0.40));
    }

    #[test]
    fn slices_sum_to_the_amount() {
        let alloc = allocate(dec!(200000), &uk_income_bands());
        let allocated: Decimal = alloc.slices.iter().map(|s| s.amount).sum();
        assert_eq!(allocated, dec!(200000));
        assert_eq!(alloc.slices.len(), 3);
    }

    #[test]
    fn amount_exactly_on_boundary() {
        // 37,700 fills the basic band exactly; the next unit is taxed higher.
        let alloc = allocate(dec!(37700), &uk_income_bands());
        assert_eq!(alloc.slices.len(), 1);
        assert_eq!(alloc.total_tax, dec!(7540));
        assert_eq!(alloc.marginal_rate, dec!(0.40));
    }

    #[test]
    fn zero_amount_yields_zero_allocation() {
        let alloc = allocate(dec!(0), &uk_income_bands());
        assert!(alloc.slices.is_empty());
        assert_eq!(alloc.total_tax, dec!(0));
        assert_eq!(alloc.effective_rate, dec!(0));
        assert_eq!(alloc.marginal_rate, dec!(0.20));
    }

    #[test]
    fn negative_amount_yields_zero_allocation() {
        let alloc = allocate(dec!(-50), &uk_income_bands());
        assert!(alloc.slices.is_empty());
        assert_eq!(alloc.total_tax, dec!(0));
    }

    #[test]
    fn unbounded_top_band_takes_the_rest() {
        let alloc = allocate(dec!(1000000), &uk_income_bands());
        let top = alloc.slices.last().unwrap();
        assert_eq!(top.band, "additional");
        assert_eq!(top.amount, dec!(1000000) - dec!(125140));
        assert_eq!(alloc.marginal_rate, dec!(0.45));
    }

    #[test]
    fn zero_rate_band_contributes_no_tax() {
        // Social-contribution style table with a nil band up front.
        let bands = vec![
            Band::new("below threshold", dec!(0), Some(dec!(12570)), dec!(0)),
            Band::new("main", dec!(12570), Some(dec!(50270)), dec!(0.08)),
            Band::new("upper", dec!(50270), None, dec!(0.02)),
        ];
        let alloc = allocate(dec!(30000), &bands);
        assert_eq!(alloc.slices.len(), 2);
        assert_eq!(alloc.slices[0].tax, dec!(0));
        assert_eq!(alloc.total_tax, dec!(17430) * dec!(0.08));
    }

    #[test]
    fn single_flat_band() {
        let bands = vec![Band::new("standard", dec!(0), None, dec!(0.33))];
        let alloc = allocate(dec!(1000), &bands);
        assert_eq!(alloc.total_tax, dec!(330));
        assert_eq!(alloc.effective_rate, dec!(0.33));
        assert_eq!(alloc.marginal_rate, dec!(0.33));
    }

    #[test]
    fn validate_rejects_empty_table() {
        assert!(validate_table(&[]).is_err());
    }

    #[test]
    fn validate_rejects_gap_between_bands() {
        let bands = vec![
            Band::new("a", dec!(0), Some(dec!(100)), dec!(0.1)),
            Band::new("b", dec!(150), None, dec!(0.2)),
        ];
        let err = validate_table(&bands).unwrap_err();
        assert!(err.contains("ends at 100"));
    }

    #[test]
    fn validate_rejects_bounded_final_band() {
        let bands = vec![Band::new("a", dec!(0), Some(dec!(100)), dec!(0.1))];
        assert!(validate_table(&bands).is_err());
    }

    #[test]
    fn validate_rejects_nonzero_start() {
        let bands = vec![Band::new("a", dec!(10), None, dec!(0.1))];
        assert!(validate_table(&bands).is_err());
    }

    #[test]
    fn validate_rejects_rate_above_one() {
        let bands = vec![Band::new("a", dec!(0), None, dec!(1.5))];
        assert!(validate_table(&bands).is_err());
    }

    #[test]
    fn validate_accepts_well_formed_table() {
        assert!(validate_table(&uk_income_bands()).is_ok());
    }
}
