use std::collections::BTreeSet;

use super::super::domain::{DecisionPoint, DivPointCatalogId, PointStatus, Tree};
use super::super::rules::HiddenNodes;

/// Inputs beyond the tree itself that decide point status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusInputs {
    pub is_design_complete: bool,
    pub declined: BTreeSet<DivPointCatalogId>,
}

impl StatusInputs {
    pub fn new(is_design_complete: bool, declined: BTreeSet<DivPointCatalogId>) -> Self {
        Self {
            is_design_complete,
            declined,
        }
    }
}

/// Points the buyer need not act on while the condition holds.
fn is_forced_complete(point: &DecisionPoint, hidden: &HiddenNodes, inputs: &StatusInputs) -> bool {
    inputs.is_design_complete
        || point.is_hidden_from_buyer_view
        || hidden.hides_point(point.id)
        || point.is_structural_item
        || point.is_past_cut_off
        || inputs.declined.contains(&point.div_point_catalog_id)
}

pub(crate) fn point_status(
    point: &DecisionPoint,
    hidden: &HiddenNodes,
    inputs: &StatusInputs,
) -> PointStatus {
    // Completion through a selection is terminal until the tree is reloaded.
    if point.completed || point.completed_by_selection || is_forced_complete(point, hidden, inputs)
    {
        return PointStatus::Completed;
    }

    let natural = if point.viewed {
        PointStatus::Viewed
    } else {
        PointStatus::Unviewed
    };

    if point.pick_type.allows_none() {
        PointStatus::Required
    } else {
        natural
    }
}

/// Recompute status bottom-up: points, then sub-groups, then groups.
pub fn recompute(tree: &mut Tree, hidden: &HiddenNodes, inputs: &StatusInputs) {
    for group in tree.groups.iter_mut() {
        for sub_group in group.sub_groups.iter_mut() {
            for point in sub_group.points.iter_mut() {
                point.completed_by_selection |= point.completed;
                point.status = point_status(point, hidden, inputs);
            }

            sub_group.status = if inputs.is_design_complete {
                PointStatus::Completed
            } else {
                PointStatus::aggregate(sub_group.points.iter().map(|point| point.status))
            };
        }

        group.status = PointStatus::aggregate(
            group
                .sub_groups
                .iter()
                .map(|sub_group| sub_group.status),
        );
    }
}

/// Reset every status so a freshly loaded tree starts from its natural state.
pub(crate) fn reset(tree: &mut Tree) {
    for group in tree.groups.iter_mut() {
        group.status = PointStatus::Unviewed;
        for sub_group in group.sub_groups.iter_mut() {
            sub_group.status = PointStatus::Unviewed;
            for point in sub_group.points.iter_mut() {
                point.status = PointStatus::Unviewed;
                point.completed_by_selection = false;
            }
        }
    }
}
