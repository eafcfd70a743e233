use super::{ireland, uk, RuleSet};
use crate::error::CalcError;
use crate::jurisdiction::Jurisdiction;
use chrono::NaiveDate;

/// Append-only registry of rule sets keyed by jurisdiction and effective range.
///
/// Published rule sets are never mutated, so a lookup for a historic date
/// returns byte-identical data no matter when it runs. Callers that refresh
/// rules build a new store and swap it in; a calculation holds a reference
/// to one store for its whole run and cannot observe the swap.
#[derive(Debug, Clone)]
pub struct RuleStore {
    rule_sets: Vec<RuleSet>,
}

impl RuleStore {
    /// A store with no rule sets.
    pub fn empty() -> Self {
        RuleStore {
            rule_sets: Vec::new(),
        }
    }

    /// A store preloaded with the built-in UK and Irish rule sets.
    pub fn builtin() -> Self {
        let mut store = RuleStore::empty();
        for ending in uk::FIRST_YEAR..=uk::LAST_YEAR {
            // Built-in sets are well-formed and non-overlapping by construction.
            let _ = store.publish(uk::rule_set(ending));
        }
        for year in ireland::FIRST_YEAR..=ireland::LAST_YEAR {
            let _ = store.publish(ireland::rule_set(year));
        }
        store
    }

    /// Validate and append a rule set.
    ///
    /// Rejects malformed data and any effective range overlapping an
    /// already-published set for the same jurisdiction.
    pub fn publish(&mut self, rules: RuleSet) -> Result<(), CalcError> {
        rules.validate()?;
        if let Some(existing) = self
            .rule_sets
            .iter()
            .find(|r| r.jurisdiction == rules.jurisdiction && r.effective.overlaps(&rules.effective))
        {
            return Err(CalcError::OverlappingRuleSets {
                version: rules.version(),
                existing: existing.version(),
            });
        }
        log::debug!("published rule set {}", rules.version());
        self.rule_sets.push(rules);
        Ok(())
    }

    /// The rule set effective for the given jurisdiction and date.
    pub fn lookup(
        &self,
        jurisdiction: Jurisdiction,
        date: NaiveDate,
    ) -> Result<&RuleSet, CalcError> {
        self.rule_sets
            .iter()
            .find(|r| r.jurisdiction == jurisdiction && r.effective.contains(date))
            .ok_or(CalcError::NoRuleSet { jurisdiction, date })
    }

    /// All published rule sets, in publication order.
    pub fn iter(&self) -> impl Iterator<Item = &RuleSet> {
        self.rule_sets.iter()
    }
}
