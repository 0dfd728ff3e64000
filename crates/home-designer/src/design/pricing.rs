//! Price aggregator. A pure function of its inputs; callers memoize if they need to.

use serde::Serialize;

use super::contract::{
    committed_choices, ChangeOrderGroup, ChangeOrderLine, Job, Lot, PriceAdjustment,
    PriceAdjustmentType, SalesAgreement, SalesProgramLine, SalesProgramType,
};
use super::domain::{ModeFlags, Tree};
use super::favorite::Favorite;

/// What is being priced: the current tree plus plan context for buyers without a job yet.
#[derive(Debug, Clone, Copy)]
pub struct PricingScenario<'a> {
    pub tree: &'a Tree,
    pub flags: ModeFlags,
    pub plan_id: u64,
    pub lot: Option<&'a Lot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub base_house: f64,
    pub homesite: f64,
    pub favorites_price: f64,
    pub selections: f64,
    pub sales_program: f64,
    pub closing_incentive: f64,
    pub price_adjustments: f64,
    pub closing_cost_adjustment: f64,
    pub non_standard_selections: f64,
    pub change_order_amount: f64,
    pub total_price: f64,
}

/// Credit lines reduce the price; change-order deletes give the credit back.
fn program_delta(
    agreement: Option<&SalesAgreement>,
    change_order: Option<&ChangeOrderGroup>,
    program_type: SalesProgramType,
) -> f64 {
    let base: f64 = agreement
        .map(|agreement| {
            agreement
                .programs
                .iter()
                .filter(|line| line.program_type == program_type)
                .map(|line| line.amount)
                .sum()
        })
        .unwrap_or(0.0);
    let delta: f64 = change_order
        .map(|change_order| {
            signed_sum(&change_order.programs, |line: &SalesProgramLine| {
                (line.program_type == program_type).then_some(line.amount)
            })
        })
        .unwrap_or(0.0);
    -(base + delta)
}

fn adjustment_delta(
    agreement: Option<&SalesAgreement>,
    change_order: Option<&ChangeOrderGroup>,
    adjustment_type: PriceAdjustmentType,
) -> f64 {
    let base: f64 = agreement
        .map(|agreement| {
            agreement
                .price_adjustments
                .iter()
                .filter(|adjustment| adjustment.adjustment_type == adjustment_type)
                .map(|adjustment| adjustment.amount)
                .sum()
        })
        .unwrap_or(0.0);
    let delta: f64 = change_order
        .map(|change_order| {
            signed_sum(&change_order.price_adjustments, |adjustment: &PriceAdjustment| {
                (adjustment.adjustment_type == adjustment_type).then_some(adjustment.amount)
            })
        })
        .unwrap_or(0.0);
    -(base + delta)
}

fn signed_sum<T>(lines: &[ChangeOrderLine<T>], amount: impl Fn(&T) -> Option<f64>) -> f64 {
    lines
        .iter()
        .filter_map(|line| amount(&line.item).map(|value| line.action.sign() * value))
        .sum()
}

/// Combine plan, lot, contract, change order, and favorites into one breakdown.
pub fn compute_breakdown(
    scenario: &PricingScenario<'_>,
    agreement: Option<&SalesAgreement>,
    change_order: Option<&ChangeOrderGroup>,
    job: Option<&Job>,
    favorite: Option<&Favorite>,
    plan_price: f64,
) -> PriceBreakdown {
    let plan_id = job.map_or(scenario.plan_id, |job| job.plan_id);
    let lot = job.map(|job| &job.lot).or(scenario.lot);
    let base_house = lot
        .and_then(|lot| lot.phase_price_for(plan_id))
        .unwrap_or(plan_price);
    let homesite = lot.map_or(0.0, |lot| lot.premium);

    let committed = committed_choices(agreement, change_order);
    let selections: f64 = committed.values().map(|choice| choice.line_total()).sum();

    let favorites_price: f64 = scenario
        .tree
        .choices()
        .filter(|choice| {
            choice.is_selected()
                && !committed.contains_key(&choice.div_choice_catalog_id)
                && !choice.is_hidden_from_buyer_view
                && !choice.price_hidden_from_buyer_view
                && favorite.map_or(true, |favorite| {
                    favorite.contains_choice(choice.div_choice_catalog_id)
                })
        })
        .map(|choice| choice.line_total())
        .sum();

    let active_change_order = change_order.filter(|change_order| change_order.is_active());
    let sales_program = program_delta(
        agreement,
        active_change_order,
        SalesProgramType::DiscountFlatAmount,
    );
    let closing_incentive = program_delta(
        agreement,
        active_change_order,
        SalesProgramType::BuyersClosingCost,
    );
    let price_adjustments =
        adjustment_delta(agreement, active_change_order, PriceAdjustmentType::Discount);
    let closing_cost_adjustment =
        adjustment_delta(agreement, active_change_order, PriceAdjustmentType::ClosingCost);

    let non_standard_selections = agreement
        .map(|agreement| {
            agreement
                .non_standard_options
                .iter()
                .map(|option| option.line_total())
                .sum::<f64>()
        })
        .unwrap_or(0.0)
        + active_change_order
            .map(|change_order| {
                signed_sum(&change_order.non_standard_options, |option| {
                    Some(option.line_total())
                })
            })
            .unwrap_or(0.0);

    let change_order_amount = change_order
        .filter(|change_order| change_order.is_approved())
        .map_or(0.0, |change_order| change_order.amount);

    let open_favorites = if scenario.flags.is_design_complete {
        0.0
    } else {
        favorites_price
    };

    let total_price = match agreement.and_then(|agreement| agreement.sale_price) {
        Some(sale_price) => sale_price + change_order_amount + open_favorites,
        None => {
            base_house
                + homesite
                + selections
                + non_standard_selections
                + sales_program
                + closing_incentive
                + price_adjustments
                + closing_cost_adjustment
                + open_favorites
        }
    };

    PriceBreakdown {
        base_house,
        homesite,
        favorites_price,
        selections,
        sales_program,
        closing_incentive,
        price_adjustments,
        closing_cost_adjustment,
        non_standard_selections,
        change_order_amount,
        total_price,
    }
}
