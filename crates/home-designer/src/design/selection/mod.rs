//! Selection reducer: applies a batch of choice changes to a cloned tree.

pub mod status;

pub use status::StatusInputs;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{ChoiceId, DivChoiceCatalogId, SelectedAttribute, Tree};
use super::rules::{hidden_by_structural_items, HiddenNodes, PlanOption, RuleEvaluator, RuleSet};

/// One requested quantity/attribute change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceChange {
    pub choice_id: ChoiceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_choice_id: Option<DivChoiceCatalogId>,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<SelectedAttribute>>,
}

impl ChoiceChange {
    pub fn new(choice_id: ChoiceId, quantity: u32) -> Self {
        Self {
            choice_id,
            catalog_choice_id: None,
            quantity,
            attributes: None,
        }
    }

    pub fn deselect(choice_id: ChoiceId) -> Self {
        Self::new(choice_id, 0)
    }

    pub fn with_catalog_id(mut self, catalog_id: DivChoiceCatalogId) -> Self {
        self.catalog_choice_id = Some(catalog_id);
        self
    }

    pub fn with_attributes(mut self, attributes: Vec<SelectedAttribute>) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

/// Fresh snapshot produced by [`apply_selections`]; the inputs are left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionOutcome {
    pub tree: Tree,
    pub rules: RuleSet,
    pub options: Vec<PlanOption>,
    pub hidden: HiddenNodes,
    /// Changes whose choice could not be found in this tree version.
    pub unmatched: Vec<ChoiceId>,
}

/// Apply `changes` in order, then re-run rules and status for the whole tree.
pub fn apply_selections(
    evaluator: &dyn RuleEvaluator,
    tree: &Tree,
    rules: &RuleSet,
    options: &[PlanOption],
    changes: &[ChoiceChange],
    inputs: &StatusInputs,
) -> SelectionOutcome {
    let mut tree = tree.clone();
    let rules = rules.clone();
    let mut options = options.to_vec();
    let mut unmatched = Vec::new();
    let mut selected = Vec::new();

    for change in changes {
        let Some(choice) = tree.locate_choice_mut(change.choice_id, change.catalog_choice_id)
        else {
            debug!(choice_id = %change.choice_id, "choice not in tree version, skipping change");
            unmatched.push(change.choice_id);
            continue;
        };

        choice.quantity = match choice.max_quantity {
            Some(max) => change.quantity.min(max),
            None => change.quantity,
        };

        if let Some(attributes) = &change.attributes {
            choice.selected_attributes = attributes.clone();
        }

        if choice.quantity == 0 {
            choice.locked_in_options = Vec::new();
            choice.locked_in_choice = None;
        } else {
            selected.push(choice.id);
        }
    }

    for choice_id in selected {
        evaluator.select_choice(&mut tree, &rules, &options, choice_id);
    }

    for point in tree.points_mut() {
        point.completed = point.has_selection();
    }

    evaluator.apply_rules(&mut tree, &rules, &mut options);
    let hidden = hidden_by_structural_items(&tree, &rules);
    status::recompute(&mut tree, &hidden, inputs);
    refresh_point_prices(&mut tree);
    tree.revision += 1;

    debug!(
        tree_version = %tree.version_id,
        revision = tree.revision,
        changes = changes.len(),
        unmatched = unmatched.len(),
        "applied selection batch"
    );

    SelectionOutcome {
        tree,
        rules,
        options,
        hidden,
        unmatched,
    }
}

/// Re-run rules and status on a tree without changing any quantity.
pub fn refresh(
    evaluator: &dyn RuleEvaluator,
    tree: &Tree,
    rules: &RuleSet,
    options: &[PlanOption],
    inputs: &StatusInputs,
) -> SelectionOutcome {
    apply_selections(evaluator, tree, rules, options, &[], inputs)
}

/// Raw point price: sum of selected choice line totals.
fn refresh_point_prices(tree: &mut Tree) {
    for point in tree.points_mut() {
        point.price = point.choices.iter().map(|choice| choice.line_total()).sum();
    }
}
