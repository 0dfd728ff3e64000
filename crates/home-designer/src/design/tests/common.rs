use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::design::command::Command;
use crate::design::contract::{ContractState, SalesAgreement, SalesChoice};
use crate::design::domain::{
    BuildMode, Choice, ChoiceId, DecisionPoint, DivChoiceCatalogId, DivPointCatalogId, Group,
    GroupId, ModeFlags, PickType, PointId, PointStatus, SubGroup, SubGroupId, Tree,
    TreeVersionId,
};
use crate::design::engine::{DesignEngine, SessionState};
use crate::design::favorite::{Favorite, FavoriteId};
use crate::design::persistence::{DesignRepository, PersistenceError, TreeBundle};
use crate::design::rules::{CatalogRuleEvaluator, ChoiceRules, Rule, RuleSet, RuleType};
use crate::design::service::{DesignSessionService, SessionDefaults};

pub(crate) const POINT_COUNTERTOPS: PointId = PointId(100);
pub(crate) const POINT_APPLIANCES: PointId = PointId(101);
pub(crate) const POINT_GAS: PointId = PointId(102);
pub(crate) const POINT_GARAGE: PointId = PointId(200);
pub(crate) const POINT_PATIO: PointId = PointId(300);

pub(crate) const CHOICE_LAMINATE: ChoiceId = ChoiceId(1000);
pub(crate) const CHOICE_GRANITE: ChoiceId = ChoiceId(1001);
pub(crate) const CHOICE_QUARTZ: ChoiceId = ChoiceId(1002);
pub(crate) const CHOICE_GAS_RANGE: ChoiceId = ChoiceId(1010);
pub(crate) const CHOICE_WINE_FRIDGE: ChoiceId = ChoiceId(1011);
pub(crate) const CHOICE_DISHWASHER: ChoiceId = ChoiceId(1012);
pub(crate) const CHOICE_GAS_LINE: ChoiceId = ChoiceId(1020);
pub(crate) const CHOICE_PROPANE: ChoiceId = ChoiceId(1021);
pub(crate) const CHOICE_TWO_CAR: ChoiceId = ChoiceId(2000);
pub(crate) const CHOICE_THREE_CAR: ChoiceId = ChoiceId(2001);
pub(crate) const CHOICE_COVERED_PATIO: ChoiceId = ChoiceId(3000);
pub(crate) const CHOICE_EXTENDED_PATIO: ChoiceId = ChoiceId(3001);
pub(crate) const CHOICE_FIRE_PIT: ChoiceId = ChoiceId(3002);

/// Catalog ids mirror tree ids offset by 4000 so tests can derive one from the other.
pub(crate) fn catalog(id: ChoiceId) -> DivChoiceCatalogId {
    DivChoiceCatalogId(id.0 + 4000)
}

pub(crate) fn point_catalog(id: PointId) -> DivPointCatalogId {
    DivPointCatalogId(id.0 + 1000)
}

pub(crate) fn choice(id: ChoiceId, label: &str, price: f64) -> Choice {
    Choice {
        id,
        div_choice_catalog_id: catalog(id),
        label: label.to_string(),
        quantity: 0,
        max_quantity: None,
        price,
        enabled: true,
        is_hidden_from_buyer_view: false,
        price_hidden_from_buyer_view: false,
        selected_attributes: Vec::new(),
        locked_in_options: Vec::new(),
        locked_in_choice: None,
        options: Vec::new(),
    }
}

pub(crate) fn point(id: PointId, label: &str, pick_type: PickType, choices: Vec<Choice>) -> DecisionPoint {
    DecisionPoint {
        id,
        div_point_catalog_id: point_catalog(id),
        label: label.to_string(),
        pick_type,
        status: PointStatus::Unviewed,
        completed: false,
        completed_by_selection: false,
        viewed: false,
        enabled: true,
        is_structural_item: false,
        is_past_cut_off: false,
        cut_off_date: None,
        is_hidden_from_buyer_view: false,
        price: 0.0,
        choices,
    }
}

fn sub_group(id: u64, label: &str, points: Vec<DecisionPoint>) -> SubGroup {
    SubGroup {
        id: SubGroupId(id),
        label: label.to_string(),
        status: PointStatus::Unviewed,
        points,
    }
}

fn group(id: u64, label: &str, sub_groups: Vec<SubGroup>) -> Group {
    Group {
        id: GroupId(id),
        label: label.to_string(),
        status: PointStatus::Unviewed,
        sub_groups,
    }
}

/// Kitchen, structural garage, and exterior patio with one hidden fire pit.
pub(crate) fn sample_tree() -> Tree {
    let countertops = point(
        POINT_COUNTERTOPS,
        "Countertops",
        PickType::Pick1,
        vec![
            choice(CHOICE_LAMINATE, "Laminate", 0.0),
            choice(CHOICE_GRANITE, "Granite", 2_500.0),
            choice(CHOICE_QUARTZ, "Quartz", 4_000.0),
        ],
    );
    let appliances = point(
        POINT_APPLIANCES,
        "Appliance Upgrades",
        PickType::Pick0ormore,
        vec![
            choice(CHOICE_GAS_RANGE, "Gas Range", 1_200.0),
            choice(CHOICE_WINE_FRIDGE, "Wine Fridge", 800.0),
            choice(CHOICE_DISHWASHER, "Quiet Dishwasher", 650.0),
        ],
    );
    let gas = point(
        POINT_GAS,
        "Gas Service",
        PickType::Pick0or1,
        vec![
            choice(CHOICE_GAS_LINE, "Natural Gas Line", 900.0),
            choice(CHOICE_PROPANE, "Propane Tank", 1_500.0),
        ],
    );

    let mut garage = point(
        POINT_GARAGE,
        "Garage",
        PickType::Pick1,
        vec![
            choice(CHOICE_TWO_CAR, "Two Car Garage", 0.0),
            choice(CHOICE_THREE_CAR, "Three Car Garage", 18_000.0),
        ],
    );
    garage.is_structural_item = true;

    let mut fire_pit = choice(CHOICE_FIRE_PIT, "Fire Pit", 2_000.0);
    fire_pit.is_hidden_from_buyer_view = true;
    let patio = point(
        POINT_PATIO,
        "Patio",
        PickType::Pick0or1,
        vec![
            choice(CHOICE_COVERED_PATIO, "Covered Patio", 5_200.0),
            choice(CHOICE_EXTENDED_PATIO, "Extended Patio", 3_100.0),
            fire_pit,
        ],
    );

    Tree::new(
        TreeVersionId(41),
        vec![
            group(
                1,
                "Kitchen",
                vec![
                    sub_group(10, "Countertops & Appliances", vec![countertops, appliances]),
                    sub_group(11, "Utilities", vec![gas]),
                ],
            ),
            group(2, "Structural", vec![sub_group(20, "Garage", vec![garage])]),
            group(3, "Exterior", vec![sub_group(30, "Outdoor Living", vec![patio])]),
        ],
    )
}

pub(crate) fn choice_mut(tree: &mut Tree, id: ChoiceId) -> &mut Choice {
    tree.choices_mut()
        .find(|choice| choice.id == id)
        .expect("choice present in sample tree")
}

pub(crate) fn point_mut(tree: &mut Tree, id: PointId) -> &mut DecisionPoint {
    tree.point_mut(id).expect("point present in sample tree")
}

pub(crate) fn buyer_flags() -> ModeFlags {
    ModeFlags::new(BuildMode::Buyer)
}

pub(crate) fn favorite() -> Favorite {
    Favorite::new(FavoriteId(7), "Dream Home")
}

pub(crate) fn contract_with(choices: &[(ChoiceId, f64)]) -> ContractState {
    ContractState::new(
        Some(SalesAgreement {
            id: 88,
            sale_price: Some(425_000.0),
            choices: choices
                .iter()
                .map(|(id, price)| SalesChoice {
                    div_choice_catalog_id: catalog(*id),
                    quantity: 1,
                    price: *price,
                })
                .collect(),
            programs: Vec::new(),
            price_adjustments: Vec::new(),
            non_standard_options: Vec::new(),
        }),
        None,
        None,
    )
}

/// Gas range requires the gas line.
pub(crate) fn gas_rules() -> RuleSet {
    RuleSet {
        choice_rules: vec![ChoiceRules {
            choice_id: CHOICE_GAS_RANGE,
            rules: vec![Rule {
                rule_type: RuleType::MustHave,
                choices: vec![CHOICE_GAS_LINE],
                points: Vec::new(),
            }],
        }],
        ..RuleSet::default()
    }
}

pub(crate) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(crate) const PLAN_ID: u64 = 3;
pub(crate) const JOB_ID: u64 = 501;

pub(crate) fn engine() -> DesignEngine<CatalogRuleEvaluator> {
    DesignEngine::new(CatalogRuleEvaluator)
}

/// Sample tree loaded with the given rules and an empty favorites set.
pub(crate) fn loaded_state(
    engine: &DesignEngine<CatalogRuleEvaluator>,
    rules: RuleSet,
) -> SessionState {
    let state = SessionState::empty(buyer_flags());
    let state = engine.dispatch(
        &state,
        Command::LoadTree {
            tree: sample_tree(),
            rules,
            options: Vec::new(),
        },
    );
    engine.dispatch(&state, Command::LoadFavorite(Some(favorite())))
}

pub(crate) fn bundle() -> TreeBundle {
    TreeBundle {
        tree: sample_tree(),
        rules: gas_rules(),
        options: Vec::new(),
        plan_price: 410_000.0,
        plan_id: PLAN_ID,
    }
}

#[derive(Default)]
pub(crate) struct MemoryRepository {
    favorites: Mutex<HashMap<FavoriteId, Favorite>>,
    contracts: Mutex<HashMap<u64, ContractState>>,
    saved: Mutex<Vec<Favorite>>,
    save_error: Mutex<Option<PersistenceError>>,
}

impl MemoryRepository {
    pub(crate) fn with_favorite(favorite: Favorite) -> Self {
        let repository = Self::default();
        repository
            .favorites
            .lock()
            .expect("favorites lock")
            .insert(favorite.id, favorite);
        repository
    }

    pub(crate) fn insert_contract(&self, job_id: u64, contract: ContractState) {
        self.contracts
            .lock()
            .expect("contracts lock")
            .insert(job_id, contract);
    }

    pub(crate) fn fail_saves_with(&self, error: Option<PersistenceError>) {
        *self.save_error.lock().expect("save error lock") = error;
    }

    pub(crate) fn saved(&self) -> Vec<Favorite> {
        self.saved.lock().expect("saved lock").clone()
    }
}

impl DesignRepository for MemoryRepository {
    fn load_bundle(&self, plan_id: u64) -> Result<TreeBundle, PersistenceError> {
        if plan_id == PLAN_ID {
            Ok(bundle())
        } else {
            Err(PersistenceError::not_found(format!("plan {plan_id}")))
        }
    }

    fn load_favorite(&self, id: FavoriteId) -> Result<Option<Favorite>, PersistenceError> {
        Ok(self.favorites.lock().expect("favorites lock").get(&id).cloned())
    }

    fn load_contract(&self, job_id: u64) -> Result<ContractState, PersistenceError> {
        self.contracts
            .lock()
            .expect("contracts lock")
            .get(&job_id)
            .cloned()
            .ok_or_else(|| PersistenceError::not_found(format!("job {job_id}")))
    }

    fn save_favorite(&self, favorite: &Favorite) -> Result<(), PersistenceError> {
        if let Some(error) = self.save_error.lock().expect("save error lock").clone() {
            return Err(error);
        }
        self.saved.lock().expect("saved lock").push(favorite.clone());
        Ok(())
    }
}

pub(crate) fn build_service(
    repository: MemoryRepository,
) -> (
    Arc<DesignSessionService<MemoryRepository, CatalogRuleEvaluator>>,
    Arc<MemoryRepository>,
) {
    let repository = Arc::new(repository);
    let service = DesignSessionService::new(
        Arc::clone(&repository),
        Arc::new(engine()),
        SessionDefaults::default(),
    );
    (Arc::new(service), repository)
}
