use serde::{Deserialize, Serialize};

use super::contract::ContractState;
use super::domain::{
    BuildMode, ChoiceId, DivChoiceCatalogId, DivPointCatalogId, PointId, SelectedAttribute,
    Tree,
};
use super::favorite::Favorite;
use super::rules::{PlanOption, RuleSet};
use super::selection::ChoiceChange;

/// Every state transition the engine understands. Each variant has exactly one handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadTree {
        tree: Tree,
        rules: RuleSet,
        options: Vec<PlanOption>,
    },
    LoadFavorite(Option<Favorite>),
    LoadContract(ContractState),
    SelectChoices(Vec<ChoiceChange>),
    DeclinePoint(DivPointCatalogId),
    MarkPointViewed(PointId),
    ToggleIncludeContracted,
    SetIncludeContracted(bool),
    SetTreeFilter(Option<String>),
    SetDesignComplete(bool),
    SetBuildMode(BuildMode),
    RemoveDeclinedPoints(Vec<DivPointCatalogId>),
    RemoveFavoriteChoices(Vec<DivChoiceCatalogId>),
}

impl Command {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::LoadTree { .. } => "load_tree",
            Self::LoadFavorite(_) => "load_favorite",
            Self::LoadContract(_) => "load_contract",
            Self::SelectChoices(_) => "select_choices",
            Self::DeclinePoint(_) => "decline_point",
            Self::MarkPointViewed(_) => "mark_point_viewed",
            Self::ToggleIncludeContracted => "toggle_include_contracted",
            Self::SetIncludeContracted(_) => "set_include_contracted",
            Self::SetTreeFilter(_) => "set_tree_filter",
            Self::SetDesignComplete(_) => "set_design_complete",
            Self::SetBuildMode(_) => "set_build_mode",
            Self::RemoveDeclinedPoints(_) => "remove_declined_points",
            Self::RemoveFavoriteChoices(_) => "remove_favorite_choices",
        }
    }
}

/// Discrete intents sent back by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserIntent {
    SelectChoice {
        #[serde(rename = "choiceId")]
        choice_id: ChoiceId,
        #[serde(default, rename = "catalogChoiceId")]
        catalog_choice_id: Option<DivChoiceCatalogId>,
        quantity: u32,
        #[serde(default)]
        attributes: Option<Vec<SelectedAttribute>>,
    },
    DeclinePoint {
        #[serde(rename = "divPointCatalogId")]
        div_point_catalog_id: DivPointCatalogId,
    },
    MarkPointViewed {
        #[serde(rename = "pointId")]
        point_id: PointId,
    },
    ToggleIncludeContracted,
    SetTreeFilter {
        #[serde(default)]
        keyword: Option<String>,
    },
}

impl From<UserIntent> for Command {
    fn from(intent: UserIntent) -> Self {
        match intent {
            UserIntent::SelectChoice {
                choice_id,
                catalog_choice_id,
                quantity,
                attributes,
            } => Command::SelectChoices(vec![ChoiceChange {
                choice_id,
                catalog_choice_id,
                quantity,
                attributes,
            }]),
            UserIntent::DeclinePoint {
                div_point_catalog_id,
            } => Command::DeclinePoint(div_point_catalog_id),
            UserIntent::MarkPointViewed { point_id } => Command::MarkPointViewed(point_id),
            UserIntent::ToggleIncludeContracted => Command::ToggleIncludeContracted,
            UserIntent::SetTreeFilter { keyword } => Command::SetTreeFilter(keyword),
        }
    }
}
