use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Identity of a loaded tree version; a reload swaps in a new one.
    TreeVersionId
);
numeric_id!(GroupId);
numeric_id!(SubGroupId);
numeric_id!(PointId);
numeric_id!(ChoiceId);
numeric_id!(
    /// Catalog-stable point identity that survives tree-version changes.
    DivPointCatalogId
);
numeric_id!(
    /// Catalog-stable choice identity that survives tree-version changes.
    DivChoiceCatalogId
);

/// Cardinality rule for a decision point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickType {
    Pick1,
    Pick0or1,
    Pick1ormore,
    Pick0ormore,
}

impl PickType {
    pub const fn is_single_select(self) -> bool {
        matches!(self, Self::Pick1 | Self::Pick0or1)
    }

    /// Whether the buyer may finish the point without picking anything.
    pub const fn allows_none(self) -> bool {
        matches!(self, Self::Pick0or1 | Self::Pick0ormore)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pick1 => "Pick 1",
            Self::Pick0or1 => "Pick 0 or 1",
            Self::Pick1ormore => "Pick 1 or more",
            Self::Pick0ormore => "Pick 0 or more",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointStatus {
    Unviewed,
    Viewed,
    Required,
    Completed,
}

impl PointStatus {
    /// Higher values need more of the buyer's attention.
    pub const fn attention(self) -> u8 {
        match self {
            Self::Completed => 0,
            Self::Viewed => 1,
            Self::Unviewed => 2,
            Self::Required => 3,
        }
    }

    /// Completed iff every member is Completed, otherwise the most attention-needing status.
    pub fn aggregate<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = PointStatus>,
    {
        statuses
            .into_iter()
            .filter(|status| *status != Self::Completed)
            .max_by_key(|status| status.attention())
            .unwrap_or(Self::Completed)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Unviewed => "Unviewed",
            Self::Viewed => "Viewed",
            Self::Required => "Required",
            Self::Completed => "Completed",
        }
    }
}

/// Operating context that relaxes or tightens visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    Preview,
    Presale,
    Buyer,
    BuyerPreview,
}

impl BuildMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "preview" => Some(Self::Preview),
            "presale" => Some(Self::Presale),
            "buyer" => Some(Self::Buyer),
            "buyer_preview" | "buyerpreview" => Some(Self::BuyerPreview),
            _ => None,
        }
    }

    /// Preview and Presale are "look but don't commit" experiences.
    pub const fn shows_everything_filtered(self) -> bool {
        matches!(self, Self::Preview | Self::Presale)
    }

    pub const fn shows_everything_contracted(self) -> bool {
        matches!(self, Self::Preview)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeFlags {
    pub build_mode: BuildMode,
    pub is_design_complete: bool,
    pub include_contracted_options: bool,
}

impl ModeFlags {
    pub const fn new(build_mode: BuildMode) -> Self {
        Self {
            build_mode,
            is_design_complete: false,
            include_contracted_options: false,
        }
    }
}

/// Buyer-chosen attribute or location on a selected choice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedAttribute {
    pub attribute_id: u64,
    pub attribute_group_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_group_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

/// Read-only catalog reference from a choice to a plan option.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionRef {
    pub integration_key: String,
}

/// Option pricing captured when a choice was committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedInOption {
    pub integration_key: String,
    pub list_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedInChoice {
    pub choice_price: f64,
    pub locked_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub id: ChoiceId,
    pub div_choice_catalog_id: DivChoiceCatalogId,
    pub label: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_quantity: Option<u32>,
    pub price: f64,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub is_hidden_from_buyer_view: bool,
    #[serde(default)]
    pub price_hidden_from_buyer_view: bool,
    #[serde(default)]
    pub selected_attributes: Vec<SelectedAttribute>,
    #[serde(default)]
    pub locked_in_options: Vec<LockedInOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_in_choice: Option<LockedInChoice>,
    #[serde(default)]
    pub options: Vec<OptionRef>,
}

impl Choice {
    pub fn is_selected(&self) -> bool {
        self.quantity > 0
    }

    /// Price contribution of the current quantity.
    pub fn line_total(&self) -> f64 {
        f64::from(self.quantity) * self.price
    }

    /// Zero the quantity and drop everything that only exists for a selected choice.
    pub fn deselect(&mut self) {
        self.quantity = 0;
        self.selected_attributes = Vec::new();
        self.locked_in_options = Vec::new();
        self.locked_in_choice = None;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPoint {
    pub id: PointId,
    pub div_point_catalog_id: DivPointCatalogId,
    pub label: String,
    pub pick_type: PickType,
    #[serde(default = "unviewed")]
    pub status: PointStatus,
    #[serde(default)]
    pub completed: bool,
    /// Set once a selection has completed the point; cleared only by a tree reload.
    #[serde(default)]
    pub completed_by_selection: bool,
    #[serde(default)]
    pub viewed: bool,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub is_structural_item: bool,
    #[serde(default)]
    pub is_past_cut_off: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cut_off_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_hidden_from_buyer_view: bool,
    #[serde(default)]
    pub price: f64,
    pub choices: Vec<Choice>,
}

impl DecisionPoint {
    pub fn has_selection(&self) -> bool {
        self.choices.iter().any(Choice::is_selected)
    }

    pub fn choice(&self, id: ChoiceId) -> Option<&Choice> {
        self.choices.iter().find(|choice| choice.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubGroup {
    pub id: SubGroupId,
    pub label: String,
    #[serde(default = "unviewed")]
    pub status: PointStatus,
    pub points: Vec<DecisionPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub label: String,
    #[serde(default = "unviewed")]
    pub status: PointStatus,
    pub sub_groups: Vec<SubGroup>,
}

/// Versioned catalog of groups. Mutations happen on clones only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tree {
    pub version_id: TreeVersionId,
    #[serde(default)]
    pub revision: u64,
    pub groups: Vec<Group>,
}

impl Tree {
    pub fn new(version_id: TreeVersionId, groups: Vec<Group>) -> Self {
        Self {
            version_id,
            revision: 0,
            groups,
        }
    }

    pub fn sub_groups(&self) -> impl Iterator<Item = &SubGroup> {
        self.groups.iter().flat_map(|group| group.sub_groups.iter())
    }

    pub fn points(&self) -> impl Iterator<Item = &DecisionPoint> {
        self.sub_groups().flat_map(|sub_group| sub_group.points.iter())
    }

    pub fn points_mut(&mut self) -> impl Iterator<Item = &mut DecisionPoint> {
        self.groups
            .iter_mut()
            .flat_map(|group| group.sub_groups.iter_mut())
            .flat_map(|sub_group| sub_group.points.iter_mut())
    }

    pub fn choices(&self) -> impl Iterator<Item = &Choice> {
        self.points().flat_map(|point| point.choices.iter())
    }

    pub fn choices_mut(&mut self) -> impl Iterator<Item = &mut Choice> {
        self.points_mut().flat_map(|point| point.choices.iter_mut())
    }

    pub fn point(&self, id: PointId) -> Option<&DecisionPoint> {
        self.points().find(|point| point.id == id)
    }

    pub fn point_mut(&mut self, id: PointId) -> Option<&mut DecisionPoint> {
        self.points_mut().find(|point| point.id == id)
    }

    pub fn point_by_catalog_id(&self, id: DivPointCatalogId) -> Option<&DecisionPoint> {
        self.points().find(|point| point.div_point_catalog_id == id)
    }

    pub fn choice(&self, id: ChoiceId) -> Option<&Choice> {
        self.choices().find(|choice| choice.id == id)
    }

    pub fn choice_by_catalog_id(&self, id: DivChoiceCatalogId) -> Option<&Choice> {
        self.choices()
            .find(|choice| choice.div_choice_catalog_id == id)
    }

    /// Locate by tree id first, then by catalog id (catalog ids survive version swaps).
    pub fn locate_choice_mut(
        &mut self,
        id: ChoiceId,
        catalog_id: Option<DivChoiceCatalogId>,
    ) -> Option<&mut Choice> {
        let by_id = self.choices().any(|choice| choice.id == id);
        self.choices_mut().find(|choice| {
            if by_id {
                choice.id == id
            } else {
                Some(choice.div_choice_catalog_id) == catalog_id
            }
        })
    }

    /// The point that owns the given choice.
    pub fn point_of_choice(&self, id: ChoiceId) -> Option<&DecisionPoint> {
        self.points()
            .find(|point| point.choices.iter().any(|choice| choice.id == id))
    }

    /// Flag every point whose cut-off date has passed as of `today`.
    pub fn apply_cut_off(&mut self, today: NaiveDate) {
        for point in self.points_mut() {
            if let Some(cut_off) = point.cut_off_date {
                point.is_past_cut_off = point.is_past_cut_off || cut_off < today;
            }
        }
    }
}

const fn enabled_by_default() -> bool {
    true
}

const fn unviewed() -> PointStatus {
    PointStatus::Unviewed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(id: u64, quantity: u32) -> Choice {
        Choice {
            id: ChoiceId(id),
            div_choice_catalog_id: DivChoiceCatalogId(id + 1000),
            label: format!("Choice {id}"),
            quantity,
            max_quantity: None,
            price: 100.0,
            enabled: true,
            is_hidden_from_buyer_view: false,
            price_hidden_from_buyer_view: false,
            selected_attributes: Vec::new(),
            locked_in_options: Vec::new(),
            locked_in_choice: None,
            options: Vec::new(),
        }
    }

    fn tree() -> Tree {
        let point = DecisionPoint {
            id: PointId(1),
            div_point_catalog_id: DivPointCatalogId(501),
            label: "Faucet".to_string(),
            pick_type: PickType::Pick1,
            status: PointStatus::Unviewed,
            completed: false,
            completed_by_selection: false,
            viewed: false,
            enabled: true,
            is_structural_item: false,
            is_past_cut_off: false,
            cut_off_date: NaiveDate::from_ymd_opt(2025, 3, 1),
            is_hidden_from_buyer_view: false,
            price: 0.0,
            choices: vec![choice(10, 0), choice(11, 2)],
        };
        Tree::new(
            TreeVersionId(7),
            vec![Group {
                id: GroupId(1),
                label: "Kitchen".to_string(),
                status: PointStatus::Unviewed,
                sub_groups: vec![SubGroup {
                    id: SubGroupId(1),
                    label: "Fixtures".to_string(),
                    status: PointStatus::Unviewed,
                    points: vec![point],
                }],
            }],
        )
    }

    #[test]
    fn aggregate_prefers_most_attention_needing_status() {
        let statuses = [
            PointStatus::Completed,
            PointStatus::Viewed,
            PointStatus::Required,
            PointStatus::Unviewed,
        ];
        assert_eq!(PointStatus::aggregate(statuses), PointStatus::Required);
        assert_eq!(
            PointStatus::aggregate([PointStatus::Completed, PointStatus::Completed]),
            PointStatus::Completed
        );
        assert_eq!(
            PointStatus::aggregate(std::iter::empty()),
            PointStatus::Completed
        );
    }

    #[test]
    fn locate_choice_falls_back_to_catalog_id() {
        let mut tree = tree();
        let found = tree
            .locate_choice_mut(ChoiceId(999), Some(DivChoiceCatalogId(1011)))
            .expect("catalog id resolves");
        assert_eq!(found.id, ChoiceId(11));

        assert!(tree.locate_choice_mut(ChoiceId(999), None).is_none());
    }

    #[test]
    fn apply_cut_off_only_flags_points_past_their_date() {
        let mut tree = tree();
        tree.apply_cut_off(NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid"));
        assert!(!tree.points().any(|point| point.is_past_cut_off));

        tree.apply_cut_off(NaiveDate::from_ymd_opt(2025, 3, 2).expect("valid"));
        assert!(tree.points().all(|point| point.is_past_cut_off));
    }

    #[test]
    fn point_of_choice_and_line_total() {
        let tree = tree();
        let point = tree.point_of_choice(ChoiceId(11)).expect("owner point");
        assert_eq!(point.id, PointId(1));
        assert!(point.has_selection());
        assert_eq!(point.choice(ChoiceId(11)).map(Choice::line_total), Some(200.0));
    }

    #[test]
    fn build_mode_parses_config_values() {
        assert_eq!(BuildMode::parse("Presale"), Some(BuildMode::Presale));
        assert_eq!(
            BuildMode::parse(" buyer_preview "),
            Some(BuildMode::BuyerPreview)
        );
        assert_eq!(BuildMode::parse("sales"), None);
    }
}
