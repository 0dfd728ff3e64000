use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::command::Command;
use super::contract::ContractState;
use super::domain::{BuildMode, ModeFlags, TreeVersionId};
use super::engine::{DesignEngine, SessionState};
use super::favorite::{Favorite, FavoriteId};
use super::persistence::{
    DesignRepository, FailureEvent, PersistenceError, RequestClass, SupersessionGate,
};
use super::pricing::{compute_breakdown, PriceBreakdown, PricingScenario};
use super::projection::{ProjectedTree, ProjectionCache, ViewKind};
use super::rules::RuleEvaluator;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> SessionId {
    let id = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SessionId(format!("ses-{id:06}"))
}

/// Request to start designing a plan, optionally for an existing job and favorites set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSession {
    pub plan_id: u64,
    #[serde(default)]
    pub job_id: Option<u64>,
    #[serde(default)]
    pub favorite_id: Option<FavoriteId>,
    #[serde(default)]
    pub build_mode: Option<BuildMode>,
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

/// Service-wide defaults, usually taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionDefaults {
    pub build_mode: BuildMode,
    pub include_contracted_options: bool,
    pub persistence_timeout: Duration,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            build_mode: BuildMode::Buyer,
            include_contracted_options: false,
            persistence_timeout: Duration::from_millis(5_000),
        }
    }
}

/// Snapshot metadata returned after opening or changing a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub tree_version: TreeVersionId,
    pub tree_revision: u64,
    pub flags: ModeFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite: Option<Favorite>,
    pub contracted_choices: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<FailureEvent>,
}

struct Session {
    state: SessionState,
    plan_id: u64,
    plan_price: f64,
    cache: ProjectionCache,
    gate: Arc<SupersessionGate>,
    last_failure: Option<FailureEvent>,
}

impl Session {
    fn summary(&self, id: &SessionId) -> SessionSummary {
        SessionSummary {
            session_id: id.clone(),
            tree_version: self.state.tree.version_id,
            tree_revision: self.state.tree.revision,
            flags: self.state.flags,
            keyword: self.state.keyword.clone(),
            favorite: self.state.favorite.as_deref().cloned(),
            contracted_choices: self.state.contract.contracted_choices().len(),
            last_failure: self.last_failure.clone(),
        }
    }
}

/// Hosts design sessions on top of the engine, the repository, and the projection cache.
pub struct DesignSessionService<R, E> {
    repository: Arc<R>,
    engine: Arc<DesignEngine<E>>,
    defaults: SessionDefaults,
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl<R, E> DesignSessionService<R, E>
where
    R: DesignRepository + 'static,
    E: RuleEvaluator + 'static,
{
    pub fn new(repository: Arc<R>, engine: Arc<DesignEngine<E>>, defaults: SessionDefaults) -> Self {
        Self {
            repository,
            engine,
            defaults,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_session<T>(
        &self,
        id: &SessionId,
        action: impl FnOnce(&mut Session) -> T,
    ) -> Result<T, DesignServiceError> {
        let mut sessions = self.sessions();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| DesignServiceError::SessionNotFound(id.clone()))?;
        Ok(action(session))
    }

    /// Load tree, contract, and favorites, then build the first snapshot.
    pub fn open(&self, request: OpenSession) -> Result<SessionSummary, DesignServiceError> {
        let mut bundle = self
            .repository
            .load_bundle(request.plan_id)
            .inspect_err(|error| warn!(%error, plan_id = request.plan_id, "tree load failed"))?;
        let contract = match request.job_id {
            Some(job_id) => self.repository.load_contract(job_id)?,
            None => ContractState::default(),
        };
        let favorite = match request.favorite_id {
            Some(favorite_id) => self.repository.load_favorite(favorite_id)?,
            None => None,
        };

        if let Some(today) = request.today {
            bundle.tree.apply_cut_off(today);
        }

        let flags = ModeFlags {
            build_mode: request.build_mode.unwrap_or(self.defaults.build_mode),
            is_design_complete: false,
            include_contracted_options: self.defaults.include_contracted_options,
        };
        let state = SessionState::empty(flags);
        let state = self.engine.dispatch(
            &state,
            Command::LoadTree {
                tree: bundle.tree,
                rules: bundle.rules,
                options: bundle.options,
            },
        );
        let state = self.engine.dispatch(&state, Command::LoadContract(contract));
        let state = self.engine.dispatch(&state, Command::LoadFavorite(favorite));

        let id = next_session_id();
        let session = Session {
            state,
            plan_id: bundle.plan_id,
            plan_price: bundle.plan_price,
            cache: ProjectionCache::new(),
            gate: Arc::new(SupersessionGate::new()),
            last_failure: None,
        };
        let summary = session.summary(&id);
        info!(
            session_id = %id,
            tree_version = %summary.tree_version,
            build_mode = ?flags.build_mode,
            "opened design session"
        );
        self.sessions().insert(id, session);
        Ok(summary)
    }

    /// Apply a command and persist the favorites set when it changed.
    pub fn dispatch(
        &self,
        id: &SessionId,
        command: Command,
    ) -> Result<SessionSummary, DesignServiceError> {
        let pending_save = self.with_session(id, |session| {
            let before = session
                .state
                .favorite
                .as_deref()
                .map(|favorite| favorite.revision);
            session.state = self.engine.dispatch(&session.state, command);

            let favorite = session.state.favorite.as_deref()?;
            (Some(favorite.revision) != before).then(|| {
                (
                    favorite.clone(),
                    Arc::clone(&session.gate),
                    session.gate.begin(RequestClass::SaveFavorite),
                )
            })
        })?;

        if let Some((favorite, gate, ticket)) = pending_save {
            let result = self.save_favorite(&favorite);
            if let Some(result) = gate.accept(ticket, result) {
                self.record_save(id, result)?;
            }
        }

        self.summary(id)
    }

    /// A save that lands after the budget still persisted, so it is logged and not reported.
    fn save_favorite(&self, favorite: &Favorite) -> Result<(), PersistenceError> {
        let started = Instant::now();
        self.repository.save_favorite(favorite)?;
        let elapsed = started.elapsed();
        if elapsed > self.defaults.persistence_timeout {
            warn!(
                favorite_id = favorite.id.0,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.defaults.persistence_timeout.as_millis() as u64,
                "favorites save exceeded its time budget"
            );
        }
        Ok(())
    }

    fn record_save(
        &self,
        id: &SessionId,
        result: Result<(), PersistenceError>,
    ) -> Result<(), DesignServiceError> {
        self.with_session(id, |session| match result {
            Ok(()) => session.last_failure = None,
            Err(error) => {
                warn!(session_id = %id, %error, "favorites save failed");
                session.last_failure = Some(FailureEvent::from(&error));
            }
        })
    }

    /// Fetch a fresh tree for the session's plan and swap it in wholesale.
    pub fn reload_tree(&self, id: &SessionId) -> Result<SessionSummary, DesignServiceError> {
        let (plan_id, ticket, gate) = self.with_session(id, |session| {
            (
                session.plan_id,
                session.gate.begin(RequestClass::LoadTree),
                Arc::clone(&session.gate),
            )
        })?;

        let result = self.repository.load_bundle(plan_id);
        let Some(result) = gate.accept(ticket, result) else {
            return self.summary(id);
        };

        match result {
            Ok(bundle) => self.with_session(id, |session| {
                session.plan_price = bundle.plan_price;
                session.state = self.engine.dispatch(
                    &session.state,
                    Command::LoadTree {
                        tree: bundle.tree,
                        rules: bundle.rules,
                        options: bundle.options,
                    },
                );
                session.last_failure = None;
            })?,
            Err(error) => {
                warn!(session_id = %id, %error, "tree reload failed");
                self.with_session(id, |session| {
                    session.last_failure = Some(FailureEvent::from(&error));
                })?;
            }
        }

        self.summary(id)
    }

    pub fn summary(&self, id: &SessionId) -> Result<SessionSummary, DesignServiceError> {
        self.with_session(id, |session| session.summary(id))
    }

    pub fn state(&self, id: &SessionId) -> Result<SessionState, DesignServiceError> {
        self.with_session(id, |session| session.state.clone())
    }

    pub fn filtered_view(&self, id: &SessionId) -> Result<Arc<ProjectedTree>, DesignServiceError> {
        self.view(id, ViewKind::Filtered)
    }

    pub fn contracted_view(
        &self,
        id: &SessionId,
    ) -> Result<Arc<ProjectedTree>, DesignServiceError> {
        self.view(id, ViewKind::Contracted)
    }

    fn view(&self, id: &SessionId, kind: ViewKind) -> Result<Arc<ProjectedTree>, DesignServiceError> {
        self.with_session(id, |session| {
            let Session { state, cache, .. } = session;
            cache.view(kind, &state.projection_input())
        })
    }

    pub fn price_breakdown(&self, id: &SessionId) -> Result<PriceBreakdown, DesignServiceError> {
        self.with_session(id, |session| {
            let state = &session.state;
            let contract = &state.contract;
            compute_breakdown(
                &PricingScenario {
                    tree: &state.tree,
                    flags: state.flags,
                    plan_id: session.plan_id,
                    lot: None,
                },
                contract.sales_agreement(),
                contract.change_order(),
                contract.job(),
                state.favorite.as_deref(),
                session.plan_price,
            )
        })
    }

    pub fn last_failure(&self, id: &SessionId) -> Result<Option<FailureEvent>, DesignServiceError> {
        self.with_session(id, |session| session.last_failure.clone())
    }
}

/// Error raised by the design session service.
#[derive(Debug, thiserror::Error)]
pub enum DesignServiceError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("design session {0} not found")]
    SessionNotFound(SessionId),
}
