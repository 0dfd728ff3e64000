use std::io::Write;

use serde::Serialize;

use super::{ChoiceDisplay, ProjectedTree};

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    group: &'a str,
    sub_group: &'a str,
    point: &'a str,
    point_status: &'static str,
    choice: &'a str,
    quantity: u32,
    unit_price: Option<f64>,
    line_total: Option<f64>,
    display: ChoiceDisplay,
}

/// Write one row per projected choice; hidden prices are left blank.
pub fn write_summary_csv<W: Write>(projected: &ProjectedTree, writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::WriterBuilder::new().has_headers(true).from_writer(writer);

    for group in projected.groups() {
        for sub_group in &group.sub_groups {
            for point in &sub_group.points {
                for choice in &point.choices {
                    let price_visible = !choice.price_hidden_from_buyer_view;
                    csv_writer.serialize(SummaryRow {
                        group: &group.label,
                        sub_group: &sub_group.label,
                        point: &point.label,
                        point_status: point.status.label(),
                        choice: &choice.label,
                        quantity: choice.quantity,
                        unit_price: price_visible.then_some(choice.price),
                        line_total: price_visible.then(|| choice.line_total()),
                        display: projected
                            .display_of(choice.id)
                            .unwrap_or(ChoiceDisplay::ViewOnly),
                    })?;
                }
            }
        }
    }

    csv_writer.flush()?;
    Ok(())
}
