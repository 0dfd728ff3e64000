use std::collections::{BTreeSet, HashMap};

use super::super::domain::{Choice, ChoiceId, PointId, Tree};
use super::{PlanOption, Rule, RuleEvaluator, RuleSet, RuleType};

/// Evaluates catalog must-have / must-not-have rules.
///
/// Rules listed for the same target are OR'd for `MustHave` and any satisfied `MustNotHave`
/// blocks; within a rule every referenced choice must be selected and every referenced point
/// completed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogRuleEvaluator;

/// Selection snapshot the rules are checked against.
struct Selection {
    choices: BTreeSet<ChoiceId>,
    points: BTreeSet<PointId>,
}

impl Selection {
    fn from_tree(tree: &Tree) -> Self {
        Self {
            choices: tree
                .choices()
                .filter(|choice| choice.is_selected())
                .map(|choice| choice.id)
                .collect(),
            points: tree
                .points()
                .filter(|point| point.completed)
                .map(|point| point.id)
                .collect(),
        }
    }

    fn satisfies(&self, rule: &Rule) -> bool {
        rule.choices.iter().all(|id| self.choices.contains(id))
            && rule.points.iter().all(|id| self.points.contains(id))
    }

    fn allows(&self, rules: &[Rule]) -> bool {
        let mut must_have = rules
            .iter()
            .filter(|rule| rule.rule_type == RuleType::MustHave)
            .peekable();
        let has_required = must_have.peek().is_none() || must_have.any(|rule| self.satisfies(rule));

        let blocked = rules
            .iter()
            .filter(|rule| rule.rule_type == RuleType::MustNotHave)
            .any(|rule| self.satisfies(rule));

        has_required && !blocked
    }
}

impl RuleEvaluator for CatalogRuleEvaluator {
    fn apply_rules(&self, tree: &mut Tree, rules: &RuleSet, options: &mut [PlanOption]) {
        let selection = Selection::from_tree(tree);

        for point in tree.points_mut() {
            let point_enabled = rules
                .point_rules_for(point.id)
                .map_or(true, |point_rules| selection.allows(point_rules));
            point.enabled = point_enabled;

            for choice in point.choices.iter_mut() {
                choice.enabled = point_enabled
                    && rules
                        .choice_rules_for(choice.id)
                        .map_or(true, |choice_rules| selection.allows(choice_rules));
            }
        }

        for option in options.iter_mut() {
            option.is_selected = rules
                .option_rules
                .iter()
                .filter(|rule| rule.integration_key == option.integration_key)
                .any(|rule| rule.choices.iter().any(|id| selection.choices.contains(id)));
        }
    }

    fn dependent_choices(
        &self,
        tree: &Tree,
        rules: &RuleSet,
        _options: &[PlanOption],
        choice: &Choice,
    ) -> Vec<ChoiceId> {
        let owners: HashMap<ChoiceId, PointId> = tree
            .points()
            .flat_map(|point| point.choices.iter().map(move |c| (c.id, point.id)))
            .collect();

        let mut selection = Selection::from_tree(tree);
        if choice.is_selected() {
            selection.choices.remove(&choice.id);
        } else {
            selection.choices.insert(choice.id);
        }
        selection.points = selection
            .choices
            .iter()
            .filter_map(|id| owners.get(id).copied())
            .collect();

        let mut dependents = Vec::new();
        loop {
            let invalid: Vec<ChoiceId> = selection
                .choices
                .iter()
                .copied()
                .filter(|id| *id != choice.id)
                .filter(|id| {
                    rules
                        .choice_rules_for(*id)
                        .map_or(false, |choice_rules| !selection.allows(choice_rules))
                })
                .collect();

            if invalid.is_empty() {
                break;
            }

            for id in invalid {
                selection.choices.remove(&id);
                dependents.push(id);
            }
            selection.points = selection
                .choices
                .iter()
                .filter_map(|id| owners.get(id).copied())
                .collect();
        }

        dependents
    }
}
