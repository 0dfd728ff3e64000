use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::contract::ContractState;
use super::domain::Tree;
use super::favorite::{Favorite, FavoriteId};
use super::rules::{PlanOption, RuleSet};

/// Everything a tree load returns in one round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeBundle {
    pub tree: Tree,
    #[serde(default)]
    pub rules: RuleSet,
    #[serde(default)]
    pub options: Vec<PlanOption>,
    /// List price of the plan, used until a lot or agreement says otherwise.
    pub plan_price: f64,
    pub plan_id: u64,
}

/// Storage and transport abstraction for trees, favorites, and contracts.
pub trait DesignRepository: Send + Sync {
    fn load_bundle(&self, plan_id: u64) -> Result<TreeBundle, PersistenceError>;
    fn load_favorite(&self, id: FavoriteId) -> Result<Option<Favorite>, PersistenceError>;
    fn load_contract(&self, job_id: u64) -> Result<ContractState, PersistenceError>;
    fn save_favorite(&self, favorite: &Favorite) -> Result<(), PersistenceError>;
}

/// Failure reported by a repository call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    #[error("{origin} failed: {message}")]
    Failed { origin: String, message: String },
    #[error("{origin} timed out")]
    Timeout { origin: String },
    #[error("{origin} not found")]
    NotFound { origin: String },
}

impl PersistenceError {
    pub fn failed(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            origin: origin.into(),
            message: message.into(),
        }
    }

    pub fn timeout(origin: impl Into<String>) -> Self {
        Self::Timeout {
            origin: origin.into(),
        }
    }

    pub fn not_found(origin: impl Into<String>) -> Self {
        Self::NotFound {
            origin: origin.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn origin(&self) -> &str {
        match self {
            Self::Failed { origin, .. } | Self::Timeout { origin } | Self::NotFound { origin } => {
                origin
            }
        }
    }
}

/// Named failure surfaced to the presentation layer; timeouts offer a retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureEvent {
    pub origin: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&PersistenceError> for FailureEvent {
    fn from(error: &PersistenceError) -> Self {
        Self {
            origin: error.origin().to_string(),
            message: error.to_string(),
            retryable: error.is_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    SaveFavorite,
    LoadTree,
}

impl RequestClass {
    const fn slot(self) -> usize {
        match self {
            Self::SaveFavorite => 0,
            Self::LoadTree => 1,
        }
    }
}

/// Handle for one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    class: RequestClass,
    sequence: u64,
}

/// Latest-wins gate: a response is applied only if no newer request of its class started.
#[derive(Debug, Default)]
pub struct SupersessionGate {
    latest: [AtomicU64; 2],
}

impl SupersessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, class: RequestClass) -> Ticket {
        let sequence = self.latest[class.slot()].fetch_add(1, Ordering::SeqCst) + 1;
        Ticket { class, sequence }
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest[ticket.class.slot()].load(Ordering::SeqCst) == ticket.sequence
    }

    /// Hand back `result` only for the newest ticket of its class; stale results are dropped.
    pub fn accept<T>(&self, ticket: Ticket, result: T) -> Option<T> {
        self.is_current(ticket).then_some(result)
    }
}
