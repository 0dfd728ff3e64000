use crate::infra::InMemoryDesignRepository;
use chrono::{Local, NaiveDate};
use clap::Args;
use home_designer::design::projection::export::write_summary_csv;
use home_designer::design::{
    BuildMode, CatalogRuleEvaluator, ChoiceChange, ChoiceDisplay, ChoiceId, Command,
    DesignEngine, DesignSessionService, DivPointCatalogId, FavoriteId, OpenSession,
    PriceBreakdown, ProjectedTree, SessionDefaults, SessionId,
};
use home_designer::error::AppError;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_PLAN: u64 = 3;
const DEMO_JOB: u64 = 501;
const DEMO_FAVORITE: FavoriteId = FavoriteId(7);
const GAS_LINE: ChoiceId = ChoiceId(1110);
const GAS_RANGE: ChoiceId = ChoiceId(1101);
const LANDSCAPING: DivPointCatalogId = DivPointCatalogId(1301);

type DemoService = DesignSessionService<InMemoryDesignRepository, CatalogRuleEvaluator>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reporting date used for cut-offs (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Build mode for the walkthrough session (preview, presale, buyer, buyer_preview).
    #[arg(long, value_parser = parse_build_mode)]
    pub(crate) build_mode: Option<BuildMode>,
    /// Optional keyword applied to the filtered view at the end of the walkthrough.
    #[arg(long)]
    pub(crate) keyword: Option<String>,
    /// Write the final "what you're buying" summary to this CSV file.
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
}

fn parse_build_mode(raw: &str) -> Result<BuildMode, String> {
    BuildMode::parse(raw)
        .ok_or_else(|| format!("'{raw}' is not one of preview, presale, buyer, buyer_preview"))
}

/// Final snapshot of the walkthrough, kept for assertions and printing.
pub(crate) struct DemoOutcome {
    pub(crate) session_id: SessionId,
    pub(crate) view: Arc<ProjectedTree>,
    pub(crate) price: PriceBreakdown,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let repository = Arc::new(InMemoryDesignRepository::seeded()?);
    let service = DesignSessionService::new(
        repository,
        Arc::new(DesignEngine::new(CatalogRuleEvaluator)),
        SessionDefaults::default(),
    );

    println!("Home design walkthrough");
    let outcome = walkthrough(&service, &args)?;

    println!("\nFiltered view for {}", outcome.session_id);
    render_view(&outcome.view);
    render_price(&outcome.price);

    if let Some(path) = args.csv {
        write_summary_csv(&outcome.view, File::create(&path)?)?;
        println!("\nSummary written to {}", path.display());
    }

    Ok(())
}

pub(crate) fn walkthrough(service: &DemoService, args: &DemoArgs) -> Result<DemoOutcome, AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let summary = service.open(OpenSession {
        plan_id: DEMO_PLAN,
        job_id: Some(DEMO_JOB),
        favorite_id: Some(DEMO_FAVORITE),
        build_mode: args.build_mode,
        today: Some(today),
    })?;
    let session_id = summary.session_id;
    println!(
        "- Opened {} on tree version {} ({} contracted choices)",
        session_id, summary.tree_version, summary.contracted_choices
    );

    service.dispatch(
        &session_id,
        Command::SelectChoices(vec![
            ChoiceChange::new(GAS_LINE, 1),
            ChoiceChange::new(GAS_RANGE, 1),
        ]),
    )?;
    println!("- Selected the natural gas line and the gas range it unlocks");

    let summary = service.dispatch(&session_id, Command::DeclinePoint(LANDSCAPING))?;
    let declined = summary
        .favorite
        .as_ref()
        .map_or(0, |favorite| favorite.declined_points.len());
    println!("- Declined landscaping ({declined} declined points in favorites)");

    let summary = service.dispatch(
        &session_id,
        Command::SelectChoices(vec![ChoiceChange::deselect(GAS_LINE)]),
    )?;
    let favorite_choices = summary
        .favorite
        .as_ref()
        .map_or(0, |favorite| favorite.choices.len());
    println!("- Removed the gas line; dependent range cleared ({favorite_choices} favorite choices)");

    if let Some(failure) = summary.last_failure {
        println!(
            "  Favorites save failed: {} (retryable: {})",
            failure.message, failure.retryable
        );
    }

    if args.keyword.is_some() {
        service.dispatch(&session_id, Command::SetTreeFilter(args.keyword.clone()))?;
    }

    let view = service.filtered_view(&session_id)?;
    let price = service.price_breakdown(&session_id)?;
    Ok(DemoOutcome {
        session_id,
        view,
        price,
    })
}

fn render_view(view: &ProjectedTree) {
    if view.is_empty() {
        println!("  (nothing to show)");
        return;
    }
    for group in view.groups() {
        println!("  {} [{}]", group.label, group.status.label());
        for sub_group in &group.sub_groups {
            for point in &sub_group.points {
                println!(
                    "    - {} ({}) [{}]",
                    point.label,
                    point.pick_type.label(),
                    point.status.label()
                );
                for choice in &point.choices {
                    let marker = match view.display_of(choice.id) {
                        Some(ChoiceDisplay::Contracted) => "contracted",
                        Some(ChoiceDisplay::ViewOnly) => "view only",
                        _ if choice.is_selected() => "selected",
                        _ => "",
                    };
                    let price = if choice.price_hidden_from_buyer_view {
                        "price on request".to_string()
                    } else {
                        format!("${:.0}", choice.price)
                    };
                    println!("        {} {} {}", choice.label, price, marker);
                }
            }
        }
    }
}

fn render_price(price: &PriceBreakdown) {
    println!("\nPrice breakdown");
    println!("- Base house: ${:.0}", price.base_house);
    println!("- Homesite premium: ${:.0}", price.homesite);
    println!("- Contracted selections: ${:.0}", price.selections);
    println!("- Open favorites: ${:.0}", price.favorites_price);
    println!(
        "- Incentives and adjustments: ${:.0}",
        price.sales_program
            + price.closing_incentive
            + price.price_adjustments
            + price.closing_cost_adjustment
    );
    println!("- Change order amount: ${:.0}", price.change_order_amount);
    println!("- Total: ${:.0}", price.total_price);
}
