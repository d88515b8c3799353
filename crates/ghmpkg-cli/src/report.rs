use ghmpkg_operations::report::{CountSummary, ReportSummary};
use nu_ansi_term::Color::{Cyan, Green, Red, Yellow};
use tabled::{
    builder::Builder,
    settings::{themes::BorderCorrection, Panel, Style},
};
use tracing::info;

use crate::{error::CliResult, utils::Colored};

fn count_row(label: &str, counts: &CountSummary) -> [String; 5] {
    [
        label.to_string(),
        Colored(Green, counts.success).to_string(),
        Colored(Yellow, counts.skipped).to_string(),
        Colored(Red, counts.failed).to_string(),
        counts.total().to_string(),
    ]
}

/// Renders the outcome counts and the per-type success breakdown.
pub fn render_table(summary: &ReportSummary) -> String {
    let mut builder = Builder::new();
    builder.push_record(["", "Success", "Skipped", "Failed", "Total"].map(String::from));
    builder.push_record(count_row("Packages", &summary.packages));
    builder.push_record(count_row("Versions", &summary.versions));
    builder.push_record(count_row("Files", &summary.files));

    let mut table = builder
        .build()
        .with(Panel::header(format!("{} Report", summary.title)))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .to_string();

    if !summary.by_type.is_empty() {
        let mut builder = Builder::new();
        builder.push_record(["Type", "Packages", "Versions", "Files"].map(String::from));
        for (package_type, success) in &summary.by_type {
            builder.push_record([
                Colored(Cyan, package_type).to_string(),
                success.packages.to_string(),
                success.versions.to_string(),
                success.files.to_string(),
            ]);
        }
        let by_type = builder
            .build()
            .with(Panel::header("Successful by type"))
            .with(Style::rounded())
            .with(BorderCorrection {})
            .to_string();
        table.push('\n');
        table.push_str(&by_type);
    }

    table
}

pub fn print_report(summary: &ReportSummary, json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        info!("\n{}", render_table(summary));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use ghmpkg_core::PackageType;
    use ghmpkg_operations::report::TypeSuccess;
    use serial_test::serial;

    use super::*;
    use crate::utils::set_color;

    #[test]
    #[serial]
    fn test_render_table_lists_counts_and_types() {
        set_color(false);
        let summary = ReportSummary {
            title: "Sync".into(),
            packages: CountSummary {
                success: 2,
                skipped: 1,
                failed: 0,
            },
            versions: CountSummary {
                success: 5,
                skipped: 0,
                failed: 1,
            },
            files: CountSummary::default(),
            by_type: BTreeMap::from([(
                PackageType::Maven,
                TypeSuccess {
                    packages: 2,
                    versions: 5,
                    files: 9,
                },
            )]),
        };

        let table = render_table(&summary);
        set_color(true);
        assert!(table.contains("Sync Report"));
        assert!(table.contains("Packages"));
        assert!(table.contains("maven"));
        assert!(table.contains("Successful by type"));
    }

    #[test]
    #[serial]
    fn test_render_table_without_successes() {
        set_color(false);
        let table = render_table(&ReportSummary {
            title: "Pull".into(),
            ..Default::default()
        });
        set_color(true);
        assert!(table.contains("Pull Report"));
        assert!(!table.contains("Successful by type"));
    }
}
