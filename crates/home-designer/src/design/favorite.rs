use serde::{Deserialize, Serialize};

use super::domain::{DivChoiceCatalogId, DivPointCatalogId, SelectedAttribute};

/// Identifier wrapper for a buyer's favorites working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FavoriteId(pub u64);

/// A selected choice captured in the buyer's favorites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteChoice {
    pub div_choice_catalog_id: DivChoiceCatalogId,
    pub quantity: u32,
    #[serde(default)]
    pub attributes: Vec<SelectedAttribute>,
}

/// Explicit "no selection" for an optional point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclinedPoint {
    pub div_point_catalog_id: DivPointCatalogId,
}

/// Non-binding working set of selections and declines prior to contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub id: FavoriteId,
    pub name: String,
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub choices: Vec<FavoriteChoice>,
    #[serde(default)]
    pub declined_points: Vec<DeclinedPoint>,
}

impl Favorite {
    pub fn new(id: FavoriteId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            revision: 0,
            choices: Vec::new(),
            declined_points: Vec::new(),
        }
    }

    pub fn is_declined(&self, point: DivPointCatalogId) -> bool {
        self.declined_points
            .iter()
            .any(|declined| declined.div_point_catalog_id == point)
    }

    pub fn contains_choice(&self, choice: DivChoiceCatalogId) -> bool {
        self.choices
            .iter()
            .any(|favorite| favorite.div_choice_catalog_id == choice)
    }

    /// Returns `false` when the point was already declined.
    pub(crate) fn record_decline(&mut self, point: DivPointCatalogId) -> bool {
        if self.is_declined(point) {
            return false;
        }
        self.declined_points.push(DeclinedPoint {
            div_point_catalog_id: point,
        });
        true
    }

    /// Returns `true` when a decline record was removed.
    pub(crate) fn remove_decline(&mut self, point: DivPointCatalogId) -> bool {
        let before = self.declined_points.len();
        self.declined_points
            .retain(|declined| declined.div_point_catalog_id != point);
        before != self.declined_points.len()
    }

    pub(crate) fn remove_choices(&mut self, choices: &[DivChoiceCatalogId]) -> bool {
        let before = self.choices.len();
        self.choices
            .retain(|favorite| !choices.contains(&favorite.div_choice_catalog_id));
        before != self.choices.len()
    }

    pub(crate) fn bump(&mut self) {
        self.revision += 1;
    }
}
