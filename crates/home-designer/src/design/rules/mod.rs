//! Contract with the constraint-rule evaluator.
//!
//! The engine never interprets rule definitions itself (apart from the structural-item hide
//! pass); it hands them to a [`RuleEvaluator`] and reads back `enabled` flags and dependent
//! choices. [`CatalogRuleEvaluator`] is the in-tree implementation used by the service host.

mod catalog;
mod structural;

pub use catalog::CatalogRuleEvaluator;
pub use structural::{hidden_by_structural_items, HiddenNodes};

use serde::{Deserialize, Serialize};

use super::domain::{Choice, ChoiceId, PointId, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleType {
    MustHave,
    MustNotHave,
}

/// A conjunction of referenced choices (selected) and points (completed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub rule_type: RuleType,
    #[serde(default)]
    pub choices: Vec<ChoiceId>,
    #[serde(default)]
    pub points: Vec<PointId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceRules {
    pub choice_id: ChoiceId,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointRules {
    pub point_id: PointId,
    pub rules: Vec<Rule>,
}

/// Maps a plan option onto the choices that pull it into the home.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionRule {
    pub integration_key: String,
    pub choices: Vec<ChoiceId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    #[serde(default)]
    pub choice_rules: Vec<ChoiceRules>,
    #[serde(default)]
    pub point_rules: Vec<PointRules>,
    #[serde(default)]
    pub option_rules: Vec<OptionRule>,
}

impl RuleSet {
    pub fn choice_rules_for(&self, id: ChoiceId) -> Option<&[Rule]> {
        self.choice_rules
            .iter()
            .find(|entry| entry.choice_id == id)
            .map(|entry| entry.rules.as_slice())
    }

    pub fn point_rules_for(&self, id: PointId) -> Option<&[Rule]> {
        self.point_rules
            .iter()
            .find(|entry| entry.point_id == id)
            .map(|entry| entry.rules.as_slice())
    }
}

/// Plan option catalog entry; `is_selected` is derived by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOption {
    pub integration_key: String,
    pub name: String,
    pub list_price: f64,
    #[serde(default)]
    pub is_selected: bool,
}

/// External capability that enables/disables choices and reports dependents.
pub trait RuleEvaluator: Send + Sync {
    /// Re-derive `enabled` and option flags in place. Must be idempotent.
    fn apply_rules(&self, tree: &mut Tree, rules: &RuleSet, options: &mut [PlanOption]);

    /// Choices that must be force-deselected when `choice` is toggled from its current state.
    fn dependent_choices(
        &self,
        tree: &Tree,
        rules: &RuleSet,
        options: &[PlanOption],
        choice: &Choice,
    ) -> Vec<ChoiceId>;

    /// Called once per positively selected choice. The default clears single-select siblings.
    fn select_choice(
        &self,
        tree: &mut Tree,
        _rules: &RuleSet,
        _options: &[PlanOption],
        choice_id: ChoiceId,
    ) {
        let Some(point) = tree
            .points_mut()
            .find(|point| point.choices.iter().any(|choice| choice.id == choice_id))
        else {
            return;
        };

        if point.pick_type.is_single_select() {
            point
                .choices
                .iter_mut()
                .filter(|choice| choice.id != choice_id)
                .for_each(Choice::deselect);
        }
    }
}
