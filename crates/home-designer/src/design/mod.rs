//! Home design selection engine.
//!
//! A buyer browses a versioned catalog tree (group, sub-group, decision point, choice) and
//! picks choices. Every change flows through [`DesignEngine::dispatch`] as a [`Command`],
//! producing a fresh [`SessionState`]. The projectors, the price aggregator, and the favorites
//! synchronizer all read those snapshots; none of them mutate shared state.

pub mod command;
pub mod contract;
pub mod domain;
pub mod engine;
pub mod favorite;
pub mod persistence;
pub mod pricing;
pub mod projection;
pub mod router;
pub mod rules;
pub mod selection;
pub mod service;
pub mod sync;

#[cfg(test)]
mod tests;

pub use command::{Command, UserIntent};
pub use contract::{ContractState, SalesAgreement, SalesChoice};
pub use domain::{
    BuildMode, Choice, ChoiceId, DecisionPoint, DivChoiceCatalogId, DivPointCatalogId, Group,
    ModeFlags, PickType, PointId, PointStatus, SubGroup, Tree, TreeVersionId,
};
pub use engine::{DesignEngine, SessionState};
pub use favorite::{Favorite, FavoriteId};
pub use persistence::{
    DesignRepository, FailureEvent, PersistenceError, RequestClass, SupersessionGate, TreeBundle,
};
pub use pricing::{compute_breakdown, PriceBreakdown, PricingScenario};
pub use projection::{
    contracted_view, filtered_view, ChoiceDisplay, ProjectedTree, ProjectionCache,
    ProjectionInput,
};
pub use router::design_router;
pub use rules::{CatalogRuleEvaluator, PlanOption, RuleEvaluator, RuleSet};
pub use selection::{apply_selections, ChoiceChange};
pub use service::{
    DesignServiceError, DesignSessionService, OpenSession, SessionDefaults, SessionId,
    SessionSummary,
};
