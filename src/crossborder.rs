//! Credit-method relief for items taxed in both jurisdictions.
//!
//! The residence jurisdiction grants the credit: for each dual-taxed item
//! it credits the lesser of the two jurisdictions' tax on that item
//! against its own liability. The situs jurisdiction's liability is never
//! reduced, and no item is credited twice.

use crate::jurisdiction::Jurisdiction;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One item taxed by both jurisdictions, with each side's tax on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DualTaxedItem {
    pub item_id: String,
    /// Tax attributed to the item by the residence jurisdiction.
    #[schemars(with = "f64")]
    pub residence_tax: Decimal,
    /// Tax attributed to the item by the other jurisdiction.
    #[schemars(with = "f64")]
    pub other_tax: Decimal,
}

/// Credit granted against one dual-taxed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReliefCredit {
    pub item_id: String,
    /// Jurisdiction whose liability the credit reduces.
    pub granted_by: Jurisdiction,
    #[schemars(with = "f64")]
    pub credit: Decimal,
}

/// Outcome of reconciling the two jurisdictions' liabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Reconciliation {
    pub residence: Jurisdiction,
    /// The dual-taxed items as handed to the reconciler, retained so an
    /// audit can recompute every credit from the assessment alone.
    pub items: Vec<DualTaxedItem>,
    pub credits: Vec<ReliefCredit>,
    #[schemars(with = "f64")]
    pub total_credit: Decimal,
}

/// Grant the residence jurisdiction a per-item credit of the lesser of
/// the two taxes. Items where either side's tax is zero need no relief.
pub fn reconcile(residence: Jurisdiction, items: Vec<DualTaxedItem>) -> Reconciliation {
    let mut credits = Vec::new();
    let mut total_credit = Decimal::ZERO;
    for item in &items {
        let credit = item.residence_tax.min(item.other_tax).max(Decimal::ZERO);
        if credit.is_zero() {
            continue;
        }
        log::debug!(
            "item {}: {residence} credits {credit} of {} against {}",
            item.item_id,
            item.other_tax,
            item.residence_tax
        );
        credits.push(ReliefCredit {
            item_id: item.item_id.clone(),
            granted_by: residence,
            credit,
        });
        total_credit += credit;
    }
    Reconciliation {
        residence,
        items,
        credits,
        total_credit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(id: &str, residence_tax: Decimal, other_tax: Decimal) -> DualTaxedItem {
        DualTaxedItem {
            item_id: id.to_string(),
            residence_tax,
            other_tax,
        }
    }

    #[test]
    fn credit_is_the_lesser_of_the_two_taxes() {
        let outcome = reconcile(
            Jurisdiction::Ireland,
            vec![item("a", dec!(1500), dec!(1000)), item("b", dec!(1500), dec!(1000))],
        );
        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.credits.len(), 2);
        assert_eq!(outcome.credits[0].credit, dec!(1000));
        assert_eq!(outcome.total_credit, dec!(2000));
        assert!(outcome
            .credits
            .iter()
            .all(|c| c.granted_by == Jurisdiction::Ireland));
    }

    #[test]
    fn credit_never_exceeds_the_residence_tax_on_the_item() {
        let outcome = reconcile(Jurisdiction::Uk, vec![item("a", dec!(400), dec!(900))]);
        assert_eq!(outcome.total_credit, dec!(400));
    }

    #[test]
    fn zero_tax_on_either_side_grants_nothing() {
        let outcome = reconcile(
            Jurisdiction::Uk,
            vec![item("a", dec!(0), dec!(900)), item("b", dec!(500), dec!(0))],
        );
        assert!(outcome.credits.is_empty());
        assert_eq!(outcome.total_credit, dec!(0));
        // The items themselves stay on record even when nothing is granted.
        assert_eq!(outcome.items.len(), 2);
    }

    #[test]
    fn credit_is_never_negative() {
        let outcome = reconcile(Jurisdiction::Uk, vec![item("a", dec!(-50), dec!(100))]);
        assert!(outcome.credits.is_empty());
    }

    #[test]
    fn each_item_is_credited_once() {
        let items = vec![item("a", dec!(300), dec!(200)), item("a", dec!(300), dec!(200))];
        // Duplicate ids are rejected upstream by request validation; the
        // reconciler itself credits each entry it is handed exactly once.
        let outcome = reconcile(Jurisdiction::Uk, items);
        assert_eq!(outcome.credits.len(), 2);
        let per_item: Decimal = outcome.credits.iter().map(|c| c.credit).sum();
        assert_eq!(per_item, outcome.total_credit);
    }
}
