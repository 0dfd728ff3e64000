//! Keeps the favorites aggregate consistent with the tree and the contract.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::command::Command;
use super::domain::{DivChoiceCatalogId, DivPointCatalogId};
use super::engine::SessionState;
use super::favorite::FavoriteChoice;
use super::selection::ChoiceChange;

/// Corrective commands for drift between favorites, tree, and contract.
///
/// Returns an empty list once the snapshot is consistent, so running it twice is a no-op.
pub fn synchronize(state: &SessionState) -> Vec<Command> {
    let Some(favorite) = state.favorite.as_deref() else {
        return Vec::new();
    };
    let mut commands = Vec::new();

    let stale_choices: Vec<DivChoiceCatalogId> = favorite
        .choices
        .iter()
        .map(|favorite_choice| favorite_choice.div_choice_catalog_id)
        .filter(|catalog_id| {
            state.contract.is_contracted_id(*catalog_id)
                || state.tree.choice_by_catalog_id(*catalog_id).is_none()
        })
        .collect();
    if !stale_choices.is_empty() {
        commands.push(Command::RemoveFavoriteChoices(stale_choices));
    }

    let disabled: Vec<ChoiceChange> = state
        .tree
        .choices()
        .filter(|choice| {
            !choice.enabled
                && choice.is_selected()
                && !state.contract.is_contracted(choice)
                && favorite.contains_choice(choice.div_choice_catalog_id)
        })
        .map(|choice| ChoiceChange::deselect(choice.id))
        .collect();
    if !disabled.is_empty() {
        commands.push(Command::SelectChoices(disabled));
    }

    let unreachable: Vec<DivPointCatalogId> = favorite
        .declined_points
        .iter()
        .map(|declined| declined.div_point_catalog_id)
        .filter(|catalog_id| match state.tree.point_by_catalog_id(*catalog_id) {
            Some(point) => {
                !point.enabled
                    || point.is_hidden_from_buyer_view
                    || state.hidden.hides_point(point.id)
            }
            None => true,
        })
        .collect();
    if !unreachable.is_empty() {
        commands.push(Command::RemoveDeclinedPoints(unreachable));
    }

    commands
}

/// Rebuild the favorite's choice list from the tree's uncommitted selections.
pub fn mirror_selections(state: &SessionState) -> SessionState {
    let Some(favorite) = state.favorite.as_deref() else {
        return state.clone();
    };

    let tree_catalog_ids: BTreeSet<DivChoiceCatalogId> = state
        .tree
        .choices()
        .map(|choice| choice.div_choice_catalog_id)
        .collect();

    // Entries that do not resolve in this tree version are left for the synchronizer.
    let mut choices: Vec<FavoriteChoice> = favorite
        .choices
        .iter()
        .filter(|favorite_choice| !tree_catalog_ids.contains(&favorite_choice.div_choice_catalog_id))
        .cloned()
        .collect();
    choices.extend(
        state
            .tree
            .choices()
            .filter(|choice| choice.is_selected() && !state.contract.is_contracted(choice))
            .map(|choice| FavoriteChoice {
                div_choice_catalog_id: choice.div_choice_catalog_id,
                quantity: choice.quantity,
                attributes: choice.selected_attributes.clone(),
            }),
    );

    if choices == favorite.choices {
        return state.clone();
    }

    let mut favorite = favorite.clone();
    favorite.choices = choices;
    favorite.bump();
    SessionState {
        favorite: Some(Arc::new(favorite)),
        ..state.clone()
    }
}
