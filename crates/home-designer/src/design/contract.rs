use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{Choice, DivChoiceCatalogId};

/// Whether a change-order line adds to or removes from the agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeAction {
    Add,
    Delete,
}

impl ChangeAction {
    pub const fn sign(self) -> f64 {
        match self {
            Self::Add => 1.0,
            Self::Delete => -1.0,
        }
    }
}

/// A choice committed under a signed agreement or change order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesChoice {
    pub div_choice_catalog_id: DivChoiceCatalogId,
    pub quantity: u32,
    pub price: f64,
}

impl SalesChoice {
    pub fn line_total(&self) -> f64 {
        f64::from(self.quantity) * self.price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SalesProgramType {
    DiscountFlatAmount,
    BuyersClosingCost,
}

/// Incentive amount, stored as the positive credit extended to the buyer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesProgramLine {
    pub name: String,
    pub program_type: SalesProgramType,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceAdjustmentType {
    Discount,
    ClosingCost,
}

/// Adjustment amount, stored as the positive credit extended to the buyer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAdjustment {
    pub adjustment_type: PriceAdjustmentType,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonStandardOption {
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

impl NonStandardOption {
    pub fn line_total(&self) -> f64 {
        f64::from(self.quantity) * self.unit_price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesAgreement {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<f64>,
    #[serde(default)]
    pub choices: Vec<SalesChoice>,
    #[serde(default)]
    pub programs: Vec<SalesProgramLine>,
    #[serde(default)]
    pub price_adjustments: Vec<PriceAdjustment>,
    #[serde(default)]
    pub non_standard_options: Vec<NonStandardOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrderStatus {
    Pending,
    Approved,
    Withdrawn,
}

/// Generic change-order line: the payload plus whether it adds or removes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeOrderLine<T> {
    pub action: ChangeAction,
    #[serde(flatten)]
    pub item: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeOrderGroup {
    pub id: u64,
    pub status: ChangeOrderStatus,
    pub amount: f64,
    pub created_on: NaiveDate,
    #[serde(default)]
    pub choices: Vec<ChangeOrderLine<SalesChoice>>,
    #[serde(default)]
    pub programs: Vec<ChangeOrderLine<SalesProgramLine>>,
    #[serde(default)]
    pub price_adjustments: Vec<ChangeOrderLine<PriceAdjustment>>,
    #[serde(default)]
    pub non_standard_options: Vec<ChangeOrderLine<NonStandardOption>>,
}

impl ChangeOrderGroup {
    pub fn is_approved(&self) -> bool {
        self.status == ChangeOrderStatus::Approved
    }

    /// Withdrawn change orders contribute nothing.
    pub fn is_active(&self) -> bool {
        self.status != ChangeOrderStatus::Withdrawn
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhasePlanPrice {
    pub plan_id: u64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesPhase {
    pub name: String,
    #[serde(default)]
    pub plan_prices: Vec<PhasePlanPrice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lot {
    pub id: u64,
    pub premium: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_phase: Option<SalesPhase>,
}

impl Lot {
    /// Phase pricing overrides the plan's list price when the phase defines one.
    pub fn phase_price_for(&self, plan_id: u64) -> Option<f64> {
        self.sales_phase.as_ref().and_then(|phase| {
            phase
                .plan_prices
                .iter()
                .find(|entry| entry.plan_id == plan_id)
                .map(|entry| entry.price)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: u64,
    pub plan_id: u64,
    pub lot: Lot,
}

/// Committed selections keyed by catalog id. Approved change orders add or remove lines.
pub fn committed_choices(
    agreement: Option<&SalesAgreement>,
    change_order: Option<&ChangeOrderGroup>,
) -> BTreeMap<DivChoiceCatalogId, SalesChoice> {
    let mut committed: BTreeMap<DivChoiceCatalogId, SalesChoice> = agreement
        .map(|agreement| {
            agreement
                .choices
                .iter()
                .map(|choice| (choice.div_choice_catalog_id, choice.clone()))
                .collect()
        })
        .unwrap_or_default();

    if let Some(change_order) = change_order.filter(|co| co.is_approved()) {
        for line in &change_order.choices {
            match line.action {
                ChangeAction::Add => {
                    committed.insert(line.item.div_choice_catalog_id, line.item.clone());
                }
                ChangeAction::Delete => {
                    committed.remove(&line.item.div_choice_catalog_id);
                }
            }
        }
    }

    committed
}

/// Wire shape of [`ContractState`]; the committed-choice index is rebuilt on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub sales_agreement: Option<SalesAgreement>,
    #[serde(default)]
    pub change_order: Option<ChangeOrderGroup>,
    #[serde(default)]
    pub job: Option<Job>,
}

/// Authoritative agreement state, loaded independently of the tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ContractRecord", into = "ContractRecord")]
pub struct ContractState {
    pub revision: u64,
    sales_agreement: Option<SalesAgreement>,
    change_order: Option<ChangeOrderGroup>,
    job: Option<Job>,
    committed: BTreeMap<DivChoiceCatalogId, SalesChoice>,
}

impl From<ContractRecord> for ContractState {
    fn from(record: ContractRecord) -> Self {
        Self {
            revision: record.revision,
            ..Self::new(record.sales_agreement, record.change_order, record.job)
        }
    }
}

impl From<ContractState> for ContractRecord {
    fn from(state: ContractState) -> Self {
        Self {
            revision: state.revision,
            sales_agreement: state.sales_agreement,
            change_order: state.change_order,
            job: state.job,
        }
    }
}

impl ContractState {
    pub fn new(
        sales_agreement: Option<SalesAgreement>,
        change_order: Option<ChangeOrderGroup>,
        job: Option<Job>,
    ) -> Self {
        let committed = committed_choices(sales_agreement.as_ref(), change_order.as_ref());
        Self {
            revision: 0,
            sales_agreement,
            change_order,
            job,
            committed,
        }
    }

    pub fn sales_agreement(&self) -> Option<&SalesAgreement> {
        self.sales_agreement.as_ref()
    }

    pub fn change_order(&self) -> Option<&ChangeOrderGroup> {
        self.change_order.as_ref()
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn contracted_choices(&self) -> &BTreeMap<DivChoiceCatalogId, SalesChoice> {
        &self.committed
    }

    pub fn is_contracted_id(&self, id: DivChoiceCatalogId) -> bool {
        self.committed.contains_key(&id)
    }

    pub fn is_contracted(&self, choice: &Choice) -> bool {
        self.is_contracted_id(choice.div_choice_catalog_id)
    }

    pub fn has_sales_agreement(&self) -> bool {
        self.sales_agreement.is_some()
    }
}
