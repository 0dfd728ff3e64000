//! Tree projectors: buyer-facing filtered and contracted views.
//!
//! Both views are pure functions of a [`ProjectionInput`]. They clone the source tree, drop
//! every choice the view excludes, recompute point prices over what remains, and prune empty
//! points, sub-groups, and groups bottom-up. Hidden choices never survive either view, whatever
//! the build mode.

mod cache;
pub mod export;
mod keyword;

pub use cache::{ProjectionCache, ProjectionKey, ViewKind};
pub use keyword::KeywordFilter;

use std::collections::BTreeMap;

use serde::Serialize;

use super::contract::ContractState;
use super::domain::{
    Choice, ChoiceId, DecisionPoint, DivPointCatalogId, Group, GroupId, ModeFlags, PointId,
    SubGroup, SubGroupId, Tree,
};
use super::favorite::Favorite;
use super::rules::HiddenNodes;

/// Everything a projector reads. Borrowed from one session snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionInput<'a> {
    pub tree: &'a Tree,
    pub favorite: Option<&'a Favorite>,
    pub contract: &'a ContractState,
    pub flags: ModeFlags,
    pub hidden: &'a HiddenNodes,
    pub keyword: Option<&'a str>,
}

/// How the presentation layer may interact with a retained choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceDisplay {
    /// Committed by the agreement; shown selected and never deselectable.
    Contracted,
    /// Visible for reference only.
    ViewOnly,
    Selectable,
}

/// A pruned copy of the tree plus the display mode of every retained choice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedTree {
    pub tree: Tree,
    pub display: BTreeMap<ChoiceId, ChoiceDisplay>,
}

impl ProjectedTree {
    pub fn groups(&self) -> &[Group] {
        &self.tree.groups
    }

    pub fn is_empty(&self) -> bool {
        self.tree.groups.is_empty()
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.tree.groups.iter().find(|group| group.id == id)
    }

    pub fn sub_group(&self, id: SubGroupId) -> Option<&SubGroup> {
        self.tree.sub_groups().find(|sub_group| sub_group.id == id)
    }

    pub fn point(&self, id: PointId) -> Option<&DecisionPoint> {
        self.tree.point(id)
    }

    pub fn point_by_catalog_id(&self, id: DivPointCatalogId) -> Option<&DecisionPoint> {
        self.tree.point_by_catalog_id(id)
    }

    pub fn choice(&self, id: ChoiceId) -> Option<&Choice> {
        self.tree.choice(id)
    }

    pub fn display_of(&self, id: ChoiceId) -> Option<ChoiceDisplay> {
        self.display.get(&id).copied()
    }

    pub fn choice_count(&self) -> usize {
        self.display.len()
    }
}

/// Facts about a point shared by every choice decision inside it.
#[derive(Debug, Clone, Copy)]
struct PointFacts {
    hidden: bool,
    structural: bool,
    past_cut_off: bool,
    single_select: bool,
    has_contracted: bool,
}

impl PointFacts {
    fn of(point: &DecisionPoint, input: &ProjectionInput<'_>) -> Self {
        Self {
            hidden: point.is_hidden_from_buyer_view || input.hidden.hides_point(point.id),
            structural: point.is_structural_item,
            past_cut_off: point.is_past_cut_off,
            single_select: point.pick_type.is_single_select(),
            has_contracted: point
                .choices
                .iter()
                .any(|choice| input.contract.is_contracted(choice)),
        }
    }
}

fn is_hidden(choice: &Choice, facts: PointFacts, input: &ProjectionInput<'_>) -> bool {
    facts.hidden || choice.is_hidden_from_buyer_view || input.hidden.hides_choice(choice.id)
}

/// Display mode for a choice retained by the filtered view.
fn filtered_display(contracted: bool, facts: PointFacts) -> ChoiceDisplay {
    if contracted {
        ChoiceDisplay::Contracted
    } else if facts.past_cut_off || (facts.has_contracted && facts.single_select) {
        ChoiceDisplay::ViewOnly
    } else {
        ChoiceDisplay::Selectable
    }
}

fn filtered_choice(
    choice: &Choice,
    facts: PointFacts,
    input: &ProjectionInput<'_>,
) -> Option<ChoiceDisplay> {
    if is_hidden(choice, facts, input) {
        return None;
    }

    let contracted = input.contract.is_contracted(choice);
    let flags = input.flags;
    if flags.is_design_complete {
        return contracted.then_some(ChoiceDisplay::Contracted);
    }

    let included = if facts.structural {
        flags.include_contracted_options && choice.is_selected()
    } else if contracted {
        flags.include_contracted_options
    } else if facts.has_contracted && facts.single_select {
        flags.include_contracted_options
    } else {
        !facts.past_cut_off
    };

    (included || flags.build_mode.shows_everything_filtered())
        .then(|| filtered_display(contracted, facts))
}

fn contracted_choice(
    choice: &Choice,
    facts: PointFacts,
    input: &ProjectionInput<'_>,
) -> Option<ChoiceDisplay> {
    if is_hidden(choice, facts, input) {
        return None;
    }

    let contracted = input.contract.is_contracted(choice);
    let display = if contracted {
        ChoiceDisplay::Contracted
    } else {
        ChoiceDisplay::ViewOnly
    };

    let included = if input.flags.is_design_complete {
        contracted
    } else if input.flags.build_mode.shows_everything_contracted() {
        true
    } else if facts.structural {
        choice.is_selected()
    } else {
        contracted
    };

    included.then_some(display)
}

fn project<F>(input: &ProjectionInput<'_>, decide: F) -> ProjectedTree
where
    F: Fn(&Choice, PointFacts, &ProjectionInput<'_>) -> Option<ChoiceDisplay>,
{
    let keywords = KeywordFilter::parse(input.keyword);
    let mut tree = input.tree.clone();
    let mut display = BTreeMap::new();

    for group in tree.groups.iter_mut() {
        for sub_group in group.sub_groups.iter_mut() {
            let sub_group_matches = keywords.matches(&sub_group.label);

            for point in sub_group.points.iter_mut() {
                let facts = PointFacts::of(point, input);
                let point_matches = sub_group_matches || keywords.matches(&point.label);

                point.choices.retain(|choice| {
                    if !point_matches && !keywords.matches(&choice.label) {
                        return false;
                    }
                    match decide(choice, facts, input) {
                        Some(mode) => {
                            display.insert(choice.id, mode);
                            true
                        }
                        None => false,
                    }
                });

                point.price = point
                    .choices
                    .iter()
                    .filter(|choice| !choice.price_hidden_from_buyer_view)
                    .map(Choice::line_total)
                    .sum();
            }

            sub_group.points.retain(|point| !point.choices.is_empty());
        }
        group.sub_groups.retain(|sub_group| !sub_group.points.is_empty());
    }
    tree.groups.retain(|group| !group.sub_groups.is_empty());

    ProjectedTree { tree, display }
}

/// Buyer-facing view of what can still be chosen, plus optionally what is committed.
pub fn filtered_view(input: &ProjectionInput<'_>) -> ProjectedTree {
    project(input, filtered_choice)
}

/// Buyer-facing view of what the agreement already commits.
pub fn contracted_view(input: &ProjectionInput<'_>) -> ProjectedTree {
    project(input, contracted_choice)
}
