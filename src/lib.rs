//! Dual-jurisdiction (UK / Ireland) tax and estate liability calculation
//! engine.
//!
//! `levy` is a pure computation library: given an immutable
//! [`CalculationRequest`] and a versioned [`RuleStore`], [`assess`]
//! produces an [`Assessment`] carrying the final liability per
//! jurisdiction, every intermediate band, allowance and relief line, the
//! rule versions used and any eligibility warnings. The engine reads no
//! clock and no external state, so recomputing the same request against
//! the same rules is digest-identical — the property audit depends on.
//!
//! The major pieces, leaf first:
//!
//! - [`rules`]: versioned, immutable rule sets per jurisdiction and tax
//!   year, resolved by date through [`RuleStore`];
//! - [`bands`]: the progressive band allocator shared by every tax kind;
//! - [`allowances`]: the ordered exemption and relief pipeline;
//! - [`gifts`]: lifetime transfer classification, the seven-year
//!   cumulation and taper relief;
//! - [`estate`]: per-jurisdiction estate aggregation and the threshold
//!   stack;
//! - [`crossborder`]: credit-method relief for dual-taxed items;
//! - [`engine`]: the orchestrator tying them together.
//!
//! ```
//! use levy::{assess, CalculationRequest, Domicile, IncomeFacts, Jurisdiction,
//!     RuleStore, TaxpayerProfile};
//! use rust_decimal_macros::dec;
//!
//! let store = RuleStore::builtin();
//! let request = CalculationRequest {
//!     as_of: chrono::NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
//!     taxpayer: TaxpayerProfile {
//!         residence: Jurisdiction::Uk,
//!         domicile: Some(Domicile::actual(Jurisdiction::Uk)),
//!         age_band: None,
//!     },
//!     income: Some(IncomeFacts { employment: dec!(60000), other: dec!(0) }),
//!     dividends: None,
//!     gains: None,
//!     gifts: Vec::new(),
//!     estate: None,
//!     allowance_states: Vec::new(),
//! };
//! let assessment = assess(&store, &request).unwrap();
//! assert_eq!(assessment.computations[0].tax(), dec!(11432));
//! ```

pub mod allowances;
pub mod assessment;
pub mod bands;
pub mod crossborder;
mod digest;
pub mod engine;
pub mod error;
pub mod estate;
pub mod gifts;
pub mod jurisdiction;
pub mod request;
pub mod rules;
pub mod warnings;

pub use allowances::{AllowanceContext, AllowanceState, LineItem, ReliefClaim};
pub use assessment::{
    Assessment, DisposalTax, ForeignGains, GiftReview, JurisdictionLiability, RuleVersion,
    TaxComputation,
};
pub use bands::{allocate, Band, BandAllocation, BandSlice};
pub use crossborder::{reconcile, DualTaxedItem, Reconciliation, ReliefCredit};
pub use engine::assess;
pub use error::{CalcError, FactError, InputError};
pub use estate::{compute_estate, EstateComputation};
pub use gifts::{classify, classify_all, seven_year_cumulation, ClassifiedGift, GiftCumulation};
pub use jurisdiction::{
    AgeBand, Domicile, Jurisdiction, Relationship, Situs, TaxKind, TaxYear,
};
pub use request::{
    AssetFact, AssetKind, CalculationRequest, DisposalFact, DividendFacts, EstateFacts, GainFacts,
    GiftRecord, IncomeFacts, LiabilityFact, TaxpayerProfile,
};
pub use rules::{RuleSet, RuleStore};
pub use warnings::Warning;
