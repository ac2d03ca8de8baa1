use std::io::Write;

use anyhow::{Context, Result, bail};
use hypersight_analysis::{
    CategoryFocus, LabelTally, category_distribution, focus_category, top_categories, top_issue,
    top_issue_for_category,
};
use hypersight_core::Ticket;
use hypersight_store::{RowStore, fetch_category_rows, fetch_issue_rows_for_category};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::session::load_ticket_rows;

/// The top-N category donut plus its focus panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryChart {
    pub segments: Vec<LabelTally>,
    pub total: usize,
    pub focus: Option<CategoryFocus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSlice {
    pub name: String,
    pub count: usize,
    pub percent: f64,
}

/// Chart over rows already in memory, focusing the largest segment.
pub fn category_chart_from_rows(rows: &[Ticket], limit: usize) -> CategoryChart {
    let segments = top_categories(rows, limit);
    let focus = segments.first().map(|segment| {
        focus_category(
            &segments,
            segment,
            top_issue_for_category(rows, &segment.name),
        )
    });

    CategoryChart {
        total: segments.iter().map(|segment| segment.count).sum(),
        segments,
        focus,
    }
}

/// Chart for a picked segment: the segments come from the category query and
/// the top issue from a fresh issue query scoped to `category`.
pub async fn category_chart_for_selection(
    store: &dyn RowStore,
    limit: usize,
    category: &str,
) -> Result<CategoryChart> {
    let category_rows = fetch_category_rows(store)
        .await
        .context("failed to load ticket categories")?;
    let segments = top_categories(&category_rows, limit);

    let Some(segment) = segments.iter().find(|segment| segment.name == category) else {
        bail!("category '{category}' is not among the top {limit} categories");
    };

    let issue_rows = fetch_issue_rows_for_category(store, category)
        .await
        .with_context(|| format!("failed to load issues for category '{category}'"))?;
    let focus = focus_category(&segments, segment, top_issue(&issue_rows));

    Ok(CategoryChart {
        total: segments.iter().map(|segment| segment.count).sum(),
        focus: Some(focus),
        segments,
    })
}

pub async fn run_categories(
    store: &dyn RowStore,
    row_limit: usize,
    limit: usize,
    select: Option<&str>,
    output: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let chart = match select {
        Some(category) => category_chart_for_selection(store, limit, category).await?,
        None => {
            let rows = load_ticket_rows(store, row_limit).await?;
            category_chart_from_rows(&rows, limit)
        }
    };

    match output {
        OutputFormat::Text => write_category_chart(&chart, out),
        OutputFormat::Json => write_json(&chart, out),
    }
    .context("failed to write category chart")
}

pub fn write_category_chart(chart: &CategoryChart, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Top Issue Categories Distribution")?;
    writeln!(out, "Total issues analyzed: {}", chart.total)?;
    for segment in &chart.segments {
        writeln!(out, "  {}: {} tickets", segment.name, segment.count)?;
    }

    if let Some(focus) = &chart.focus
        && let Some(top_issue) = &focus.top_issue
    {
        writeln!(out)?;
        writeln!(out, "{}", focus.category)?;
        writeln!(
            out,
            "Count: {} tickets ({}%)",
            focus.count,
            one_decimal(focus.share_percent)
        )?;
        writeln!(out, "Top Issue: {top_issue}")?;
    }
    Ok(())
}

pub fn distribution_slices(rows: &[Ticket]) -> Vec<DistributionSlice> {
    category_distribution(rows)
        .into_iter()
        .map(|(tally, percent)| DistributionSlice {
            name: tally.name,
            count: tally.count,
            percent,
        })
        .collect()
}

pub async fn run_distribution(
    store: &dyn RowStore,
    output: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let rows = fetch_category_rows(store)
        .await
        .context("failed to load ticket categories")?;
    let slices = distribution_slices(&rows);

    match output {
        OutputFormat::Text => write_distribution(&slices, out),
        OutputFormat::Json => write_json(&slices, out),
    }
    .context("failed to write category distribution")
}

pub fn write_distribution(slices: &[DistributionSlice], out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Category Distribution")?;
    for slice in slices {
        writeln!(
            out,
            "  {}: {} tickets ({}%)",
            slice.name,
            slice.count,
            whole_percent(slice.percent)
        )?;
    }
    Ok(())
}

fn write_json<T: Serialize>(value: &T, out: &mut dyn Write) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

/// Percent with one decimal, halves rounded away from zero.
fn one_decimal(percent: f64) -> String {
    format!("{:.1}", (percent * 10.0).round() / 10.0)
}

fn whole_percent(percent: f64) -> String {
    format!("{:.0}", percent.round())
}

#[cfg(test)]
mod tests {
    use hypersight_store::MemoryRowStore;

    use super::*;
    use crate::session::block_on;

    fn row(category: Option<&str>, issue: Option<&str>) -> Ticket {
        Ticket {
            category: category.map(str::to_owned),
            issue: issue.map(str::to_owned),
            ..Ticket::default()
        }
    }

    fn rows() -> Vec<Ticket> {
        vec![
            row(Some("Elnät"), Some("Outage")),
            row(Some("Batterier"), Some("Range loss")),
            row(Some("Batterier"), Some("Cold start")),
            row(Some("Andra"), Some("Billing")),
            row(Some("Batterier"), Some("Cold start")),
            row(Some("Elnät"), Some("Outage")),
            row(None, Some("Unknown")),
        ]
    }

    #[test]
    fn in_memory_chart_focuses_largest_segment() {
        let chart = category_chart_from_rows(&rows(), 5);

        let names: Vec<&str> = chart.segments.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Batterier", "Elnät", "Andra"]);
        assert_eq!(chart.total, 6);

        let focus = chart.focus.expect("focus");
        assert_eq!(focus.category, "Batterier");
        assert_eq!(focus.top_issue.as_deref(), Some("Cold start"));

        let mut out = Vec::new();
        write_category_chart(&category_chart_from_rows(&rows(), 5), &mut out).expect("write");
        let rendered = String::from_utf8(out).expect("utf8");
        assert!(rendered.contains("Total issues analyzed: 6\n"));
        assert!(rendered.contains("Count: 3 tickets (50.0%)\nTop Issue: Cold start\n"));
    }

    #[test]
    fn selection_goes_back_to_the_store() {
        let store = MemoryRowStore::new(rows());

        let chart = block_on(category_chart_for_selection(&store, 2, "Elnät"))
            .expect("runtime")
            .expect("chart");

        assert_eq!(chart.segments.len(), 2);
        assert_eq!(chart.total, 5);
        let focus = chart.focus.expect("focus");
        assert_eq!(focus.count, 2);
        assert_eq!(focus.share_percent, 40.0);
        assert_eq!(focus.top_issue.as_deref(), Some("Outage"));
    }

    #[test]
    fn selection_outside_top_segments_is_an_error() {
        let store = MemoryRowStore::new(rows());

        let result = block_on(category_chart_for_selection(&store, 2, "Andra")).expect("runtime");

        let err = result.expect_err("Andra is third");
        assert_eq!(
            err.to_string(),
            "category 'Andra' is not among the top 2 categories"
        );
    }

    #[test]
    fn distribution_prints_whole_percent_in_discovery_order() {
        let slices = distribution_slices(&rows());
        let mut out = Vec::new();
        write_distribution(&slices, &mut out).expect("write");

        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "Category Distribution\n  Elnät: 2 tickets (33%)\n  Batterier: 3 tickets (50%)\n  Andra: 1 tickets (17%)\n"
        );
    }

    #[test]
    fn percent_rounding_rounds_halves_up() {
        assert_eq!(whole_percent(12.5), "13");
        assert_eq!(one_decimal(42.857), "42.9");
        assert_eq!(one_decimal(0.25), "0.3");
    }
}
