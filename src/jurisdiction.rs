use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Taxing jurisdiction known to the engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum Jurisdiction {
    Uk,
    Ireland,
}

impl Jurisdiction {
    pub const ALL: [Jurisdiction; 2] = [Jurisdiction::Uk, Jurisdiction::Ireland];
}

impl std::fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Jurisdiction::Uk => write!(f, "UK"),
            Jurisdiction::Ireland => write!(f, "Ireland"),
        }
    }
}

/// Kind of tax a band table or computation applies to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum TaxKind {
    Income,
    Dividend,
    CapitalGains,
    SocialContributions,
    EstateDuty,
}

impl std::fmt::Display for TaxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaxKind::Income => "income tax",
            TaxKind::Dividend => "dividend tax",
            TaxKind::CapitalGains => "capital gains tax",
            TaxKind::SocialContributions => "social contributions",
            TaxKind::EstateDuty => "estate duty",
        };
        write!(f, "{name}")
    }
}

/// Where an asset is located for inclusion purposes.
///
/// `Elsewhere` covers any third country: such assets enter an estate only
/// under worldwide (domicile-based) inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Situs {
    Uk,
    Ireland,
    Elsewhere,
}

impl Situs {
    /// Whether the asset is sited in the given jurisdiction.
    pub fn is_in(&self, jurisdiction: Jurisdiction) -> bool {
        matches!(
            (self, jurisdiction),
            (Situs::Uk, Jurisdiction::Uk) | (Situs::Ireland, Jurisdiction::Ireland)
        )
    }
}

/// Relationship of a transfer's recipient to the taxpayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Relationship {
    Spouse,
    Charity,
    Child,
    Grandchild,
    Other,
}

impl Relationship {
    /// Direct descendants qualify for the residence threshold.
    pub fn is_descendant(&self) -> bool {
        matches!(self, Relationship::Child | Relationship::Grandchild)
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Relationship::Spouse => "spouse",
            Relationship::Charity => "charity",
            Relationship::Child => "child",
            Relationship::Grandchild => "grandchild",
            Relationship::Other => "other",
        };
        write!(f, "{name}")
    }
}

/// Domicile status of the taxpayer.
///
/// Worldwide estate inclusion applies in the jurisdiction of domicile,
/// whether actual or deemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Domicile {
    pub jurisdiction: Jurisdiction,
    /// Deemed domicile, e.g. long residence without actual domicile.
    pub deemed: bool,
}

impl Domicile {
    pub fn actual(jurisdiction: Jurisdiction) -> Self {
        Domicile {
            jurisdiction,
            deemed: false,
        }
    }

    pub fn deemed(jurisdiction: Jurisdiction) -> Self {
        Domicile {
            jurisdiction,
            deemed: true,
        }
    }
}

/// Age band of the taxpayer, used by age-gated allowances.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum AgeBand {
    Under65,
    From65To74,
    From75,
}

/// Tax year of a jurisdiction.
///
/// The UK year runs 6 April to 5 April and is identified by its end year
/// (2025 = 2024/25). The Irish year is the calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaxYear {
    pub jurisdiction: Jurisdiction,
    pub ending: i32,
}

impl TaxYear {
    /// The tax year containing the given date.
    pub fn from_date(jurisdiction: Jurisdiction, date: NaiveDate) -> Self {
        let ending = match jurisdiction {
            Jurisdiction::Uk => {
                let year = date.year();
                // Year starts 6 April: on or after 6 April the year ends next April,
                // before 6 April it ends this April.
                if date >= NaiveDate::from_ymd_opt(year, 4, 6).unwrap() {
                    year + 1
                } else {
                    year
                }
            }
            Jurisdiction::Ireland => date.year(),
        };
        TaxYear {
            jurisdiction,
            ending,
        }
    }

    pub fn start_date(&self) -> NaiveDate {
        match self.jurisdiction {
            Jurisdiction::Uk => NaiveDate::from_ymd_opt(self.ending - 1, 4, 6).unwrap(),
            Jurisdiction::Ireland => NaiveDate::from_ymd_opt(self.ending, 1, 1).unwrap(),
        }
    }

    pub fn end_date(&self) -> NaiveDate {
        match self.jurisdiction {
            Jurisdiction::Uk => NaiveDate::from_ymd_opt(self.ending, 4, 5).unwrap(),
            Jurisdiction::Ireland => NaiveDate::from_ymd_opt(self.ending, 12, 31).unwrap(),
        }
    }

    /// The immediately preceding tax year.
    pub fn previous(&self) -> TaxYear {
        TaxYear {
            jurisdiction: self.jurisdiction,
            ending: self.ending - 1,
        }
    }

    /// Display as "2024/25" (UK) or "2024" (Ireland).
    pub fn display(&self) -> String {
        match self.jurisdiction {
            Jurisdiction::Uk => format!("{}/{:02}", self.ending - 1, self.ending % 100),
            Jurisdiction::Ireland => format!("{}", self.ending),
        }
    }
}

impl std::fmt::Display for TaxYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
