//! Command dispatch over immutable session snapshots.
//!
//! Every command produces a fresh [`SessionState`]; unchanged aggregates are shared through
//! `Arc` so a flag toggle never copies the tree. After each user-level dispatch the
//! favorites synchronizer runs until it has nothing left to correct.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use super::command::Command;
use super::contract::ContractState;
use super::domain::{
    BuildMode, Choice, ChoiceId, DecisionPoint, DivChoiceCatalogId, DivPointCatalogId, ModeFlags,
    PointId, Tree, TreeVersionId,
};
use super::favorite::Favorite;
use super::projection::ProjectionInput;
use super::rules::{HiddenNodes, PlanOption, RuleEvaluator, RuleSet};
use super::selection::{self, status, ChoiceChange, SelectionOutcome, StatusInputs};
use super::sync;

/// Corrective passes allowed after a dispatch before the synchronizer gives up.
const MAX_SYNC_PASSES: usize = 4;

/// One consistent snapshot of everything the projectors and price aggregator read.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub tree: Arc<Tree>,
    pub rules: Arc<RuleSet>,
    pub options: Arc<Vec<PlanOption>>,
    pub hidden: Arc<HiddenNodes>,
    pub favorite: Option<Arc<Favorite>>,
    pub contract: Arc<ContractState>,
    pub flags: ModeFlags,
    pub keyword: Option<String>,
}

impl SessionState {
    pub fn empty(flags: ModeFlags) -> Self {
        Self {
            tree: Arc::new(Tree::new(TreeVersionId(0), Vec::new())),
            rules: Arc::new(RuleSet::default()),
            options: Arc::new(Vec::new()),
            hidden: Arc::new(HiddenNodes::default()),
            favorite: None,
            contract: Arc::new(ContractState::default()),
            flags,
            keyword: None,
        }
    }

    pub fn declined(&self) -> BTreeSet<DivPointCatalogId> {
        self.favorite
            .as_deref()
            .map(|favorite| {
                favorite
                    .declined_points
                    .iter()
                    .map(|declined| declined.div_point_catalog_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn status_inputs(&self) -> StatusInputs {
        StatusInputs::new(self.flags.is_design_complete, self.declined())
    }

    pub fn projection_input(&self) -> ProjectionInput<'_> {
        ProjectionInput {
            tree: &self.tree,
            favorite: self.favorite.as_deref(),
            contract: &self.contract,
            flags: self.flags,
            hidden: &self.hidden,
            keyword: self.keyword.as_deref(),
        }
    }

    fn with_outcome(&self, outcome: SelectionOutcome) -> Self {
        Self {
            tree: Arc::new(outcome.tree),
            rules: Arc::new(outcome.rules),
            options: Arc::new(outcome.options),
            hidden: Arc::new(outcome.hidden),
            ..self.clone()
        }
    }
}

/// Reducer that owns the rule evaluator and applies commands to snapshots.
#[derive(Debug, Clone, Default)]
pub struct DesignEngine<E> {
    evaluator: E,
}

impl<E> DesignEngine<E>
where
    E: RuleEvaluator,
{
    pub fn new(evaluator: E) -> Self {
        Self { evaluator }
    }

    /// Apply `command`, then let the synchronizer settle the favorites aggregate.
    pub fn dispatch(&self, state: &SessionState, command: Command) -> SessionState {
        debug!(command = command.name(), "dispatching design command");
        let mut next = self.handle(state, command);

        for _ in 0..MAX_SYNC_PASSES {
            let corrections = sync::synchronize(&next);
            if corrections.is_empty() {
                return next;
            }
            for correction in corrections {
                debug!(command = correction.name(), "applying synchronizer correction");
                next = self.handle(&next, correction);
            }
        }

        debug!("synchronizer did not settle within its pass budget");
        next
    }

    fn handle(&self, state: &SessionState, command: Command) -> SessionState {
        match command {
            Command::LoadTree {
                tree,
                rules,
                options,
            } => self.load_tree(state, tree, rules, options),
            Command::LoadFavorite(favorite) => self.load_favorite(state, favorite),
            Command::LoadContract(contract) => self.load_contract(state, contract),
            Command::SelectChoices(changes) => self.select_choices(state, changes),
            Command::DeclinePoint(point) => self.decline_point(state, point),
            Command::MarkPointViewed(point) => self.mark_point_viewed(state, point),
            Command::ToggleIncludeContracted => {
                let include = !state.flags.include_contracted_options;
                Self::set_include_contracted(state, include)
            }
            Command::SetIncludeContracted(include) => Self::set_include_contracted(state, include),
            Command::SetTreeFilter(keyword) => Self::set_tree_filter(state, keyword),
            Command::SetDesignComplete(complete) => self.set_design_complete(state, complete),
            Command::SetBuildMode(mode) => Self::set_build_mode(state, mode),
            Command::RemoveDeclinedPoints(points) => self.remove_declined_points(state, &points),
            Command::RemoveFavoriteChoices(choices) => {
                Self::remove_favorite_choices(state, &choices)
            }
        }
    }

    fn refresh(&self, state: &SessionState) -> SessionState {
        let outcome = selection::refresh(
            &self.evaluator,
            &state.tree,
            &state.rules,
            &state.options,
            &state.status_inputs(),
        );
        state.with_outcome(outcome)
    }

    fn load_tree(
        &self,
        state: &SessionState,
        mut tree: Tree,
        rules: RuleSet,
        options: Vec<PlanOption>,
    ) -> SessionState {
        status::reset(&mut tree);
        tree.revision = tree.revision.max(state.tree.revision + 1);
        info!(
            tree_version = %tree.version_id,
            points = tree.points().count(),
            "loaded decision tree"
        );

        let loaded = SessionState {
            tree: Arc::new(tree),
            rules: Arc::new(rules),
            options: Arc::new(options),
            ..state.clone()
        };

        // Re-seat committed and favorited selections onto the new tree version.
        let mut changes = contracted_changes(&loaded);
        changes.extend(favorite_changes(&loaded));
        self.apply_changes(&loaded, &changes)
    }

    fn load_favorite(&self, state: &SessionState, favorite: Option<Favorite>) -> SessionState {
        let favorite = favorite.map(|mut favorite| {
            if let Some(current) = state.favorite.as_deref() {
                if current.id == favorite.id {
                    favorite.revision = favorite.revision.max(current.revision + 1);
                }
            }
            Arc::new(favorite)
        });

        let loaded = SessionState {
            favorite,
            ..state.clone()
        };
        let mut changes = stale_selection_changes(&loaded);
        changes.extend(favorite_changes(&loaded));
        self.apply_changes(&loaded, &changes)
    }

    fn load_contract(&self, state: &SessionState, mut contract: ContractState) -> SessionState {
        contract.revision = contract.revision.max(state.contract.revision + 1);
        info!(
            contracted = contract.contracted_choices().len(),
            "loaded contract state"
        );

        let loaded = SessionState {
            contract: Arc::new(contract),
            ..state.clone()
        };
        let released = released_changes(&state.contract, &loaded);
        let mut changes = contracted_changes(&loaded);
        if released.is_empty() {
            return self.apply_changes(&loaded, &changes);
        }

        debug!(count = released.len(), "deselecting choices dropped from the contract");
        changes.extend(released);
        let applied = self.apply_changes(&loaded, &changes);
        sync::mirror_selections(&applied)
    }

    /// Apply raw changes without dependent expansion or favorite mirroring.
    fn apply_changes(&self, state: &SessionState, changes: &[ChoiceChange]) -> SessionState {
        let outcome = selection::apply_selections(
            &self.evaluator,
            &state.tree,
            &state.rules,
            &state.options,
            changes,
            &state.status_inputs(),
        );
        state.with_outcome(outcome)
    }

    fn select_choices(&self, state: &SessionState, changes: Vec<ChoiceChange>) -> SessionState {
        let changes: Vec<ChoiceChange> = changes
            .into_iter()
            .filter(|change| is_changeable(state, change))
            .collect();
        if changes.is_empty() {
            return state.clone();
        }

        let changes = self.with_dependents(state, changes);

        // A point the buyer now picks from is no longer declined.
        let mut favorite = state.favorite.as_deref().cloned();
        if let Some(favorite) = favorite.as_mut() {
            let mut changed = false;
            for change in changes.iter().filter(|change| change.quantity > 0) {
                if let Some(point) = point_of_change(&state.tree, change) {
                    changed |= favorite.remove_decline(point.div_point_catalog_id);
                }
            }
            if changed {
                favorite.bump();
            }
        }

        let staged = SessionState {
            favorite: favorite.map(Arc::new),
            ..state.clone()
        };
        let applied = self.apply_changes(&staged, &changes);
        sync::mirror_selections(&applied)
    }

    /// Append force-deselections for every dependent of a toggled choice.
    fn with_dependents(
        &self,
        state: &SessionState,
        mut changes: Vec<ChoiceChange>,
    ) -> Vec<ChoiceChange> {
        let requested: BTreeSet<ChoiceId> =
            changes.iter().map(|change| change.choice_id).collect();
        let mut dependents = Vec::new();

        for change in &changes {
            let Some(choice) = locate_choice(&state.tree, change) else {
                continue;
            };
            if choice.is_selected() == (change.quantity > 0) {
                continue;
            }

            for dependent in self.evaluator.dependent_choices(
                &state.tree,
                &state.rules,
                &state.options,
                choice,
            ) {
                let contracted = state
                    .tree
                    .choice(dependent)
                    .is_some_and(|choice| state.contract.is_contracted(choice));
                if !contracted && !requested.contains(&dependent) && !dependents.contains(&dependent)
                {
                    dependents.push(dependent);
                }
            }
        }

        if !dependents.is_empty() {
            debug!(count = dependents.len(), "force-deselecting dependent choices");
        }
        changes.extend(dependents.into_iter().map(ChoiceChange::deselect));
        changes
    }

    fn decline_point(&self, state: &SessionState, point: DivPointCatalogId) -> SessionState {
        let Some(favorite) = state.favorite.as_deref() else {
            debug!(point = %point, "decline ignored without a favorites set");
            return state.clone();
        };

        if favorite.is_declined(point) {
            let mut favorite = favorite.clone();
            favorite.remove_decline(point);
            favorite.bump();
            let undeclined = SessionState {
                favorite: Some(Arc::new(favorite)),
                ..state.clone()
            };
            return self.refresh(&undeclined);
        }

        let Some(tree_point) = state.tree.point_by_catalog_id(point) else {
            debug!(point = %point, "decline ignored for point outside tree version");
            return state.clone();
        };
        let has_contracted = tree_point
            .choices
            .iter()
            .any(|choice| state.contract.is_contracted(choice));
        if !tree_point.pick_type.allows_none() || has_contracted {
            debug!(point = %point, "point cannot be declined");
            return state.clone();
        }

        let deselections: Vec<ChoiceChange> = tree_point
            .choices
            .iter()
            .filter(|choice| choice.is_selected())
            .map(|choice| ChoiceChange::deselect(choice.id))
            .collect();
        let changes = self.with_dependents(state, deselections);

        let mut favorite = favorite.clone();
        favorite.record_decline(point);
        favorite.bump();
        info!(point = %point, cleared = changes.len(), "declined decision point");

        let staged = SessionState {
            favorite: Some(Arc::new(favorite)),
            ..state.clone()
        };
        let applied = self.apply_changes(&staged, &changes);
        sync::mirror_selections(&applied)
    }

    fn mark_point_viewed(&self, state: &SessionState, point: PointId) -> SessionState {
        let mut tree = (*state.tree).clone();
        let Some(target) = tree.point_mut(point) else {
            return state.clone();
        };
        if target.viewed {
            return state.clone();
        }
        target.viewed = true;

        let viewed = SessionState {
            tree: Arc::new(tree),
            ..state.clone()
        };
        self.refresh(&viewed)
    }

    fn set_include_contracted(state: &SessionState, include: bool) -> SessionState {
        SessionState {
            flags: ModeFlags {
                include_contracted_options: include,
                ..state.flags
            },
            ..state.clone()
        }
    }

    fn set_tree_filter(state: &SessionState, keyword: Option<String>) -> SessionState {
        let keyword = keyword
            .map(|keyword| keyword.trim().to_string())
            .filter(|keyword| !keyword.is_empty());
        SessionState {
            keyword,
            ..state.clone()
        }
    }

    fn set_design_complete(&self, state: &SessionState, complete: bool) -> SessionState {
        let flagged = SessionState {
            flags: ModeFlags {
                is_design_complete: complete,
                ..state.flags
            },
            ..state.clone()
        };
        self.refresh(&flagged)
    }

    fn set_build_mode(state: &SessionState, build_mode: BuildMode) -> SessionState {
        SessionState {
            flags: ModeFlags {
                build_mode,
                ..state.flags
            },
            ..state.clone()
        }
    }

    fn remove_declined_points(
        &self,
        state: &SessionState,
        points: &[DivPointCatalogId],
    ) -> SessionState {
        let Some(mut favorite) = state.favorite.as_deref().cloned() else {
            return state.clone();
        };
        let mut changed = false;
        for point in points {
            changed |= favorite.remove_decline(*point);
        }
        if !changed {
            return state.clone();
        }
        favorite.bump();

        let updated = SessionState {
            favorite: Some(Arc::new(favorite)),
            ..state.clone()
        };
        self.refresh(&updated)
    }

    fn remove_favorite_choices(
        state: &SessionState,
        choices: &[DivChoiceCatalogId],
    ) -> SessionState {
        let Some(mut favorite) = state.favorite.as_deref().cloned() else {
            return state.clone();
        };
        if !favorite.remove_choices(choices) {
            return state.clone();
        }
        favorite.bump();

        SessionState {
            favorite: Some(Arc::new(favorite)),
            ..state.clone()
        }
    }
}

fn locate_choice<'a>(tree: &'a Tree, change: &ChoiceChange) -> Option<&'a Choice> {
    tree.choice(change.choice_id).or_else(|| {
        change
            .catalog_choice_id
            .and_then(|catalog| tree.choice_by_catalog_id(catalog))
    })
}

fn point_of_change<'a>(tree: &'a Tree, change: &ChoiceChange) -> Option<&'a DecisionPoint> {
    let choice = locate_choice(tree, change)?;
    tree.point_of_choice(choice.id)
}

/// Contracted choices, and single-select siblings of one, are never changed by a selection.
fn is_changeable(state: &SessionState, change: &ChoiceChange) -> bool {
    let Some(choice) = locate_choice(&state.tree, change) else {
        return true;
    };
    if state.contract.is_contracted(choice) {
        debug!(choice_id = %choice.id, "ignoring change to contracted choice");
        return false;
    }

    let locked_sibling = point_of_change(&state.tree, change).is_some_and(|point| {
        point.pick_type.is_single_select()
            && point
                .choices
                .iter()
                .any(|sibling| state.contract.is_contracted(sibling))
    });
    if locked_sibling && change.quantity > 0 {
        debug!(choice_id = %choice.id, "ignoring selection beside contracted choice");
        return false;
    }
    true
}

/// Changes that put every contracted choice at its committed quantity.
fn contracted_changes(state: &SessionState) -> Vec<ChoiceChange> {
    state
        .tree
        .choices()
        .filter_map(|choice| {
            let committed = state
                .contract
                .contracted_choices()
                .get(&choice.div_choice_catalog_id)?;
            (choice.quantity != committed.quantity)
                .then(|| ChoiceChange::new(choice.id, committed.quantity))
        })
        .collect()
}

/// Deselect choices the previous contract committed and the loaded one no longer does.
fn released_changes(previous: &ContractState, state: &SessionState) -> Vec<ChoiceChange> {
    state
        .tree
        .choices()
        .filter(|choice| {
            choice.is_selected()
                && previous.is_contracted(choice)
                && !state.contract.is_contracted(choice)
        })
        .map(|choice| ChoiceChange::deselect(choice.id))
        .collect()
}

/// Deselect uncommitted choices that the incoming favorites set does not carry.
fn stale_selection_changes(state: &SessionState) -> Vec<ChoiceChange> {
    let favorite = state.favorite.as_deref();
    state
        .tree
        .choices()
        .filter(|choice| choice.is_selected() && !state.contract.is_contracted(choice))
        .filter(|choice| {
            !favorite.is_some_and(|favorite| favorite.contains_choice(choice.div_choice_catalog_id))
        })
        .map(|choice| ChoiceChange::deselect(choice.id))
        .collect()
}

/// Changes that re-apply the favorites working set onto the tree.
fn favorite_changes(state: &SessionState) -> Vec<ChoiceChange> {
    let Some(favorite) = state.favorite.as_deref() else {
        return Vec::new();
    };

    favorite
        .choices
        .iter()
        .filter(|favorite_choice| {
            !state
                .contract
                .is_contracted_id(favorite_choice.div_choice_catalog_id)
        })
        .filter_map(|favorite_choice| {
            let choice = state
                .tree
                .choice_by_catalog_id(favorite_choice.div_choice_catalog_id)?;
            Some(
                ChoiceChange::new(choice.id, favorite_choice.quantity)
                    .with_attributes(favorite_choice.attributes.clone()),
            )
        })
        .collect()
}
