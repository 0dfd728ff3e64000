use std::collections::BTreeSet;

use serde::Serialize;

use super::super::domain::{ChoiceId, PointId, Tree};
use super::{Rule, RuleSet, RuleType};

/// Nodes hidden by id as a side effect of structural-item selections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HiddenNodes {
    pub choices: BTreeSet<ChoiceId>,
    pub points: BTreeSet<PointId>,
}

impl HiddenNodes {
    pub fn hides_choice(&self, id: ChoiceId) -> bool {
        self.choices.contains(&id)
    }

    pub fn hides_point(&self, id: PointId) -> bool {
        self.points.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty() && self.points.is_empty()
    }
}

struct StructuralIndex {
    choices: BTreeSet<ChoiceId>,
    points: BTreeSet<PointId>,
    selected_choices: BTreeSet<ChoiceId>,
    completed_points: BTreeSet<PointId>,
}

impl StructuralIndex {
    fn build(tree: &Tree) -> Self {
        let mut index = Self {
            choices: BTreeSet::new(),
            points: BTreeSet::new(),
            selected_choices: BTreeSet::new(),
            completed_points: BTreeSet::new(),
        };

        for point in tree.points().filter(|point| point.is_structural_item) {
            index.points.insert(point.id);
            if point.has_selection() {
                index.completed_points.insert(point.id);
            }
            for choice in &point.choices {
                index.choices.insert(choice.id);
                if choice.is_selected() {
                    index.selected_choices.insert(choice.id);
                }
            }
        }

        index
    }

    /// Only rules that reference nothing but structural items take part in the hide pass.
    fn is_structural(&self, rule: &Rule) -> bool {
        (!rule.choices.is_empty() || !rule.points.is_empty())
            && rule.choices.iter().all(|id| self.choices.contains(id))
            && rule.points.iter().all(|id| self.points.contains(id))
    }

    fn satisfies(&self, rule: &Rule) -> bool {
        rule.choices
            .iter()
            .all(|id| self.selected_choices.contains(id))
            && rule
                .points
                .iter()
                .all(|id| self.completed_points.contains(id))
    }

    fn hides(&self, rules: &[Rule]) -> bool {
        let structural: Vec<&Rule> = rules.iter().filter(|rule| self.is_structural(rule)).collect();

        let must_have: Vec<&&Rule> = structural
            .iter()
            .filter(|rule| rule.rule_type == RuleType::MustHave)
            .collect();
        let missing_requirement =
            !must_have.is_empty() && !must_have.iter().any(|rule| self.satisfies(rule));

        let excluded = structural
            .iter()
            .filter(|rule| rule.rule_type == RuleType::MustNotHave)
            .any(|rule| self.satisfies(rule));

        missing_requirement || excluded
    }
}

/// Hide non-structural points and choices whose structural prerequisites are not met.
pub fn hidden_by_structural_items(tree: &Tree, rules: &RuleSet) -> HiddenNodes {
    let index = StructuralIndex::build(tree);
    let mut hidden = HiddenNodes::default();
    if index.points.is_empty() {
        return hidden;
    }

    for point in tree.points().filter(|point| !point.is_structural_item) {
        if rules
            .point_rules_for(point.id)
            .is_some_and(|point_rules| index.hides(point_rules))
        {
            hidden.points.insert(point.id);
        }

        for choice in &point.choices {
            if rules
                .choice_rules_for(choice.id)
                .is_some_and(|choice_rules| index.hides(choice_rules))
            {
                hidden.choices.insert(choice.id);
            }
        }
    }

    hidden
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::rules::{ChoiceRules, PointRules};
    use crate::design::tests::common::{
        choice_mut, sample_tree, CHOICE_COVERED_PATIO, CHOICE_GRANITE, CHOICE_THREE_CAR,
        CHOICE_TWO_CAR, POINT_PATIO,
    };

    fn garage_rules() -> RuleSet {
        RuleSet {
            choice_rules: vec![ChoiceRules {
                choice_id: CHOICE_COVERED_PATIO,
                rules: vec![Rule {
                    rule_type: RuleType::MustHave,
                    choices: vec![CHOICE_THREE_CAR],
                    points: Vec::new(),
                }],
            }],
            point_rules: vec![PointRules {
                point_id: POINT_PATIO,
                rules: vec![Rule {
                    rule_type: RuleType::MustNotHave,
                    choices: vec![CHOICE_TWO_CAR],
                    points: Vec::new(),
                }],
            }],
            option_rules: Vec::new(),
        }
    }

    #[test]
    fn unmet_structural_prerequisite_hides_choice() {
        let tree = sample_tree();
        let hidden = hidden_by_structural_items(&tree, &garage_rules());
        assert!(hidden.hides_choice(CHOICE_COVERED_PATIO));
        assert!(!hidden.hides_point(POINT_PATIO));
    }

    #[test]
    fn selected_structural_exclusion_hides_point() {
        let mut tree = sample_tree();
        choice_mut(&mut tree, CHOICE_TWO_CAR).quantity = 1;

        let hidden = hidden_by_structural_items(&tree, &garage_rules());
        assert!(hidden.hides_point(POINT_PATIO));
        assert!(hidden.hides_choice(CHOICE_COVERED_PATIO));
    }

    #[test]
    fn non_structural_rules_are_ignored() {
        let tree = sample_tree();
        let rules = RuleSet {
            choice_rules: vec![ChoiceRules {
                choice_id: CHOICE_COVERED_PATIO,
                rules: vec![Rule {
                    rule_type: RuleType::MustHave,
                    choices: vec![CHOICE_GRANITE],
                    points: Vec::new(),
                }],
            }],
            ..RuleSet::default()
        };

        assert!(hidden_by_structural_items(&tree, &rules).is_empty());
    }
}
