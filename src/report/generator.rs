//! Markdown and JSON report generation.
//!
//! This module renders the aggregation results held in a [`Report`]
//! as a Markdown document or as pretty-printed JSON.

use crate::config::ReportConfig;
use crate::models::{
    CompositeTable, CrossTable, GroupRow, InsightBundle, KeyInsight, NamedTable, Report,
    ReportMetadata,
};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &ReportConfig) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# EMR Insight Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report, options));

    if options.include_insights {
        output.push_str(&generate_insights_section(&report.key_insights));
    }

    output.push_str(&generate_tables_section(&report.tables, options.max_rows));
    output.push_str(&generate_composites_section(&report.composites));

    if options.include_cross_tables {
        if let Some(ref bundle) = report.bundle {
            output.push_str(&generate_bundle_section(bundle));
        }
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input:** `{}`\n", metadata.input));
    section.push_str(&format!("- **Record Kind:** {}\n", metadata.record_kind));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Records Loaded:** {}\n", metadata.records_loaded));
    section.push_str(&format!(
        "- **Duration:** {:.2}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// GitHub-style heading anchor.
fn anchor(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | '0'..='9' | '-' | '_' => Some(c),
            ' ' => Some('-'),
            _ => None,
        })
        .collect()
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &Report, options: &ReportConfig) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");

    if options.include_insights && !report.key_insights.is_empty() {
        toc.push_str("- [Key Insights](#key-insights)\n");
    }

    if !report.tables.is_empty() {
        toc.push_str("- [Frequency Tables](#frequency-tables)\n");
        for table in &report.tables {
            toc.push_str(&format!("  - [{}](#{})\n", table.label, anchor(&table.label)));
        }
    }

    if !report.composites.is_empty() {
        toc.push_str("- [Composite Tables](#composite-tables)\n");
    }

    if options.include_cross_tables && report.bundle.is_some() {
        toc.push_str("- [Cross Tabulations](#cross-tabulations)\n");
    }

    toc.push('\n');

    toc
}

/// Generate the key insights section.
fn generate_insights_section(insights: &[KeyInsight]) -> String {
    if insights.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Key Insights\n\n");

    for insight in insights {
        section.push_str(&format!("### {}\n\n", insight.title));
        section.push_str(&format!("*Derived from `{}`*\n\n", insight.source));

        match insight.ranked {
            Some(ref ranked) => {
                section.push_str(&format!("> 💡 {}\n\n", ranked.narrative));
                section.push_str("| Factor | Value |\n");
                section.push_str("|:---|:---:|\n");
                for entry in &insight.series {
                    section.push_str(&format!("| {} | {} |\n", cell(&entry.name), entry.value));
                }
                section.push_str(&format!(
                    "| **Total** | **{}** |\n\n",
                    ranked.total_value
                ));
            }
            None => section.push_str("No data yet.\n\n"),
        }
    }

    section
}

/// Generate the flat frequency tables section.
fn generate_tables_section(tables: &[NamedTable], max_rows: usize) -> String {
    if tables.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Frequency Tables\n\n");

    for named in tables {
        section.push_str(&format!("### {}\n\n", named.label));

        if named.table.is_empty() {
            section.push_str("No data yet.\n\n");
            continue;
        }

        let total = named.table.total();
        section.push_str(&format!("| {} | Count | Share |\n", cell(&named.field)));
        section.push_str("|:---|:---:|:---:|\n");

        let mut rows: Vec<_> = named.table.iter().collect();
        rows.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
        let shown = if max_rows == 0 { rows.len() } else { max_rows.min(rows.len()) };

        for (value, count) in &rows[..shown] {
            let share = *count as f64 / total as f64 * 100.0;
            section.push_str(&format!("| {} | {} | {:.1}% |\n", cell(value), count, share));
        }
        if shown < rows.len() {
            section.push_str(&format!("| *{} more* | | |\n", rows.len() - shown));
        }
        section.push_str(&format!("| **Total** | **{}** | |\n\n", total));
    }

    section
}

/// Escape a value for use inside a Markdown table cell.
fn cell(value: &str) -> String {
    value.replace('|', "\\|")
}

/// Collect the union of column names across rows, in first-seen order.
fn columns_of(rows: &[GroupRow]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for entry in &row.counts {
            if !columns.contains(&entry.name.as_str()) {
                columns.push(&entry.name);
            }
        }
    }
    columns
}

/// Render rows as a Markdown grid with a trailing total column.
fn render_grid(corner: &str, rows: &[GroupRow]) -> String {
    let columns = columns_of(rows);
    let mut grid = String::new();

    grid.push_str(&format!("| {} |", cell(corner)));
    for column in &columns {
        grid.push_str(&format!(" {} |", cell(column)));
    }
    grid.push_str(" **Total** |\n");

    grid.push_str("|:---|");
    for _ in &columns {
        grid.push_str(":---:|");
    }
    grid.push_str(":---:|\n");

    for row in rows {
        grid.push_str(&format!("| {} |", cell(&row.group)));
        for column in &columns {
            let count = row.count(column).map(|c| c.to_string()).unwrap_or_default();
            grid.push_str(&format!(" {} |", count));
        }
        let total: usize = row.counts.iter().map(|e| e.value).sum();
        grid.push_str(&format!(" **{}** |\n", total));
    }
    grid.push('\n');

    grid
}

/// Generate the composite-key tables section.
fn generate_composites_section(composites: &[CompositeTable]) -> String {
    if composites.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Composite Tables\n\n");

    for composite in composites {
        section.push_str(&format!("### {}\n\n", composite.label));
        if composite.rows.is_empty() {
            section.push_str("No data yet.\n\n");
            continue;
        }
        section.push_str(&render_grid(&composite.fields[0], &composite.rows));
    }

    section
}

/// Generate one grid per cross table of the bundle.
fn generate_bundle_section(bundle: &InsightBundle) -> String {
    let mut section = String::new();
    section.push_str("## Cross Tabulations\n\n");

    for (name, cross) in bundle.iter() {
        section.push_str(&generate_cross_table(name, cross));
    }

    section
}

fn generate_cross_table(name: &str, cross: &CrossTable) -> String {
    let mut block = String::new();

    block.push_str(&format!("### {}\n\n", name));
    if cross.is_empty() {
        block.push_str("No data yet.\n\n");
        return block;
    }

    block.push_str(&format!(
        "*{} groups, {} responses counted*\n\n",
        cross.len(),
        cross.total()
    ));
    block.push_str(&render_grid("Group", &cross.to_rows()));

    block
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by EMR Insight v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{
        build_insight_bundle, key_insights, split_composite, tabulate_composite, tabulate_field,
        PairSpec, DEFAULT_DELIMITER,
    };
    use crate::models::Record;
    use chrono::Utc;

    fn create_metadata() -> ReportMetadata {
        ReportMetadata {
            input: "fixtures/customer_insight.json".to_string(),
            record_kind: "generic".to_string(),
            generated_at: Utc::now(),
            records_loaded: 3,
            duration_seconds: 0.01,
        }
    }

    fn create_test_report() -> Report {
        let records = vec![
            Record::new()
                .with("County", "BARINGO")
                .with("Level", "LEVEL 2")
                .with("currentSolutions", "Hybrid")
                .with("existingGaps", vec!["Slow retrieval"])
                .with("desiredEfficiencies", vec!["Faster Retrieval"])
                .with("willingnessToPayNow", "Monthly")
                .with("dataSecurityConcerns", vec!["Data Breach", "Data Loss"]),
            Record::new()
                .with("County", "BARINGO")
                .with("Level", "LEVEL 3A")
                .with("currentSolutions", "Paper Only")
                .with("existingGaps", vec!["Lost files"])
                .with("desiredEfficiencies", vec!["Scalable System"])
                .with("willingnessToPayNow", "Annual")
                .with("dataSecurityConcerns", vec!["Data Breach"]),
            Record::new()
                .with("County", "BOMET")
                .with("Level", "LEVEL 2")
                .with("currentSolutions", "Hybrid")
                .with("existingGaps", Vec::<&str>::new())
                .with("desiredEfficiencies", vec!["Faster Retrieval"])
                .with("willingnessToPayNow", "Monthly")
                .with("dataSecurityConcerns", vec!["Unauthorized Access"]),
        ];

        let pairs = PairSpec::survey_defaults();
        let bundle = build_insight_bundle(&records, &pairs).unwrap();
        let insights = key_insights(&bundle, &pairs).unwrap();
        let composite = tabulate_composite(&records, "County", "Level", DEFAULT_DELIMITER).unwrap();

        let mut report = Report::new(create_metadata());
        report.tables.push(NamedTable {
            label: "Facilities by County".to_string(),
            field: "County".to_string(),
            table: tabulate_field(&records, "County").unwrap(),
        });
        report.composites.push(CompositeTable {
            label: "Facilities by County and Level".to_string(),
            fields: ["County".to_string(), "Level".to_string()],
            delimiter: DEFAULT_DELIMITER.to_string(),
            rows: split_composite(&composite, DEFAULT_DELIMITER).unwrap(),
            table: composite,
        });
        report.bundle = Some(bundle);
        report.key_insights = insights;
        report
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report, &ReportConfig::default());

        assert!(markdown.contains("# EMR Insight Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Key Insights"));
        assert!(markdown.contains("## Frequency Tables"));
        assert!(markdown.contains("## Composite Tables"));
        assert!(markdown.contains("## Cross Tabulations"));
        assert!(markdown.contains("### solutions-by-security"));
        assert!(markdown.contains("| BARINGO | 2 | 66.7% |"));
        assert!(markdown.contains("is the primary security concern"));
    }

    #[test]
    fn test_markdown_respects_options() {
        let report = create_test_report();
        let options = ReportConfig {
            include_cross_tables: false,
            include_insights: false,
            max_rows: 1,
        };
        let markdown = generate_markdown_report(&report, &options);

        assert!(!markdown.contains("## Key Insights"));
        assert!(!markdown.contains("## Cross Tabulations"));
        assert!(markdown.contains("*1 more*"));
    }

    #[test]
    fn test_render_grid() {
        let report = create_test_report();
        let grid = render_grid("County", &report.composites[0].rows);

        assert!(grid.starts_with("| County | LEVEL 2 | LEVEL 3A | **Total** |"));
        assert!(grid.contains("| BARINGO | 1 | 1 | **2** |"));
        assert!(grid.contains("| BOMET | 1 |  | **1** |"));
    }

    #[test]
    fn test_render_grid_escapes_pipes() {
        let rows = vec![GroupRow {
            group: "Paper | Excel".to_string(),
            counts: vec![crate::models::SeriesEntry::new("Lost|misfiled", 2)],
        }];
        let grid = render_grid("Group", &rows);

        assert!(grid.starts_with("| Group | Lost\\|misfiled | **Total** |"));
        assert!(grid.contains("| Paper \\| Excel | 2 | **2** |"));
    }

    #[test]
    fn test_empty_insight_renders_placeholder() {
        let records: Vec<Record> = Vec::new();
        let pairs = PairSpec::survey_defaults();
        let bundle = build_insight_bundle(&records, &pairs).unwrap();

        let mut report = Report::new(create_metadata());
        report.key_insights = key_insights(&bundle, &pairs).unwrap();
        report.bundle = Some(bundle);

        let markdown = generate_markdown_report(&report, &ReportConfig::default());
        assert!(markdown.contains("No data yet."));
    }

    #[test]
    fn test_anchor() {
        assert_eq!(anchor("Facilities by County"), "facilities-by-county");
        assert_eq!(anchor("County / Status"), "county--status");
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metadata"]["records_loaded"], 3);
        assert_eq!(value["tables"][0]["table"]["BARINGO"], 2);
        assert_eq!(value["composites"][0]["table"]["BARINGO - LEVEL 2"], 1);
        assert_eq!(value["composites"][0]["rows"][0]["group"], "BARINGO");
        assert_eq!(
            value["bundle"]["solutions-by-security"]["Hybrid"]["Data Breach"],
            1
        );
        assert_eq!(value["key_insights"][0]["category"], "security");
    }
}
