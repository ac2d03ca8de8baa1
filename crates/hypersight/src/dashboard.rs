use std::io::Write;

use anyhow::{Context, Result};
use hypersight_analysis::{DashboardState, DashboardView, FilterOptions, LabelCount};
use hypersight_core::{Ticket, display_label};
use serde_json::json;

use crate::cli::{OptionsArgs, OutputFormat, TableArgs};

/// Build the table state the flags describe: filters, sort, then each
/// `--expand` toggle in order, then `--expand-all`.
pub fn table_state(rows: &[Ticket], args: &TableArgs) -> DashboardState {
    let mut state = DashboardState::new(args.filter.selection(), args.filter.sort());
    for issue in &args.expand {
        state.toggle_expanded(issue);
    }
    if args.expand_all {
        let view = state.view(rows);
        let keys: Vec<&str> = view.groups.iter().map(|group| group.issue).collect();
        state.expanded.expand_all(keys);
    }
    state
}

pub fn run_table(rows: &[Ticket], args: &TableArgs, out: &mut dyn Write) -> Result<()> {
    let state = table_state(rows, args);
    let view = state.view(rows);
    match args.output {
        OutputFormat::Text => write_table(&view, &state, out),
        OutputFormat::Json => write_table_json(&view, &state, out),
    }
    .context("failed to write ticket table")
}

pub fn write_table(
    view: &DashboardView<'_>,
    state: &DashboardState,
    out: &mut dyn Write,
) -> std::io::Result<()> {
    if let Some(heading) = &view.heading {
        writeln!(out, "{heading}")?;
        writeln!(out)?;
    }

    if view.groups.is_empty() {
        writeln!(out, "No tickets match the selected filters.")?;
        return Ok(());
    }

    for (index, group) in view.groups.iter().enumerate() {
        let noun = if group.count == 1 { "ticket" } else { "tickets" };
        let marker = if state.expanded.is_expanded(group.issue) {
            "-"
        } else {
            "+"
        };
        writeln!(
            out,
            "{marker} Issue {}: {}  [{} {noun}]",
            index + 1,
            single_line(group.issue),
            group.count
        )?;
        writeln!(out, "  Department: {}", single_line(display_label(group.department)))?;
        writeln!(out, "  Summary: {}", single_line(display_label(group.summary)))?;

        if state.expanded.is_expanded(group.issue) {
            for (ticket_index, ticket) in group.tickets.iter().enumerate() {
                writeln!(out, "    Ticket {}", ticket_index + 1)?;
                if let Some(link) = &ticket.link {
                    writeln!(out, "      View Issue: {link}")?;
                }
                writeln!(
                    out,
                    "      Ticket Issue: {}",
                    single_line(display_label(ticket.issue.as_deref()))
                )?;
                writeln!(
                    out,
                    "      Ticket Summary: {}",
                    single_line(display_label(ticket.summary.as_deref()))
                )?;
            }
        }
    }

    Ok(())
}

pub fn write_table_json(
    view: &DashboardView<'_>,
    state: &DashboardState,
    out: &mut dyn Write,
) -> std::io::Result<()> {
    let groups: Vec<_> = view
        .groups
        .iter()
        .map(|group| {
            let expanded = state.expanded.is_expanded(group.issue);
            json!({
                "issue": group.issue,
                "count": group.count,
                "summary": group.summary,
                "department": group.department,
                "expanded": expanded,
                "tickets": if expanded { json!(group.tickets) } else { json!([]) },
            })
        })
        .collect();

    let body = json!({
        "heading": view.heading,
        "total_tickets": view.total_tickets,
        "filtered_tickets": view.filtered.len(),
        "sort": state.sort.as_str(),
        "groups": groups,
    });
    serde_json::to_writer_pretty(&mut *out, &body)?;
    writeln!(out)
}

pub fn run_options(rows: &[Ticket], args: &OptionsArgs, out: &mut dyn Write) -> Result<()> {
    let state = DashboardState::new(args.filter.selection(), args.filter.sort());
    let view = state.view(rows);
    match args.output {
        OutputFormat::Text => write_options(&view.options, out),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &view.options)
                .map_err(std::io::Error::from)
                .and_then(|()| writeln!(out))
        }
    }
    .context("failed to write filter options")
}

pub fn write_options(options: &FilterOptions, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Report periods:")?;
    for period in &options.periods {
        writeln!(out, "  {}", display_label(period.as_deref()))?;
    }

    writeln!(out, "Categories:")?;
    write_label_counts(&options.categories, out)?;

    writeln!(out, "Themes:")?;
    if options.subcategories.is_empty() {
        writeln!(out, "  (select a category to list themes)")?;
    }
    write_label_counts(&options.subcategories, out)?;

    writeln!(out, "Departments:")?;
    for department in &options.departments {
        writeln!(out, "  {}", department.label())?;
    }
    Ok(())
}

fn write_label_counts(entries: &[LabelCount], out: &mut dyn Write) -> std::io::Result<()> {
    for entry in entries {
        writeln!(
            out,
            "  {} ({} tickets)",
            display_label(entry.name.as_deref()),
            entry.count
        )?;
    }
    Ok(())
}

fn single_line(value: &str) -> String {
    value.replace(['\n', '\r'], " ")
}
