use std::path::Path;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use dramatis_core::{SceneHealth, SceneSnapshot, inspect_scenes};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum Snapshots {
    Many(Vec<SceneSnapshot>),
    One(Box<SceneSnapshot>),
}

pub fn run(file: &Path, json: bool) -> Result<(), String> {
    let snapshots = match super::read_json(file)? {
        Snapshots::Many(list) => list,
        Snapshots::One(snapshot) => vec![*snapshot],
    };
    let reports = inspect_scenes(&snapshots);

    if json {
        let out = serde_json::to_string_pretty(&reports).map_err(|e| e.to_string())?;
        println!("{out}");
        return Ok(());
    }

    if reports.is_empty() {
        println!("  No scenes found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Scene", "Legacy names", "Present", "Status"]);
    for report in &reports {
        let status = match &report.health {
            SceneHealth::Bootstrapped => report.health.to_string().green(),
            SceneHealth::MissingRoster | SceneHealth::LegacyDrift(_) => {
                report.health.to_string().yellow()
            }
            SceneHealth::Invalid(_) => report.health.to_string().red(),
        };
        table.add_row(vec![
            report.scene_id.to_string(),
            report.legacy_names.to_string(),
            report.present.to_string(),
            status.to_string(),
        ]);
    }
    println!("{table}");
    println!();

    let attention = reports.iter().filter(|r| r.needs_attention()).count();
    println!(
        "  {} scene{}, {attention} need{} attention",
        reports.len(),
        if reports.len() == 1 { "" } else { "s" },
        if attention == 1 { "s" } else { "" },
    );
    Ok(())
}
