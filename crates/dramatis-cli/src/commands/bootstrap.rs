use std::path::Path;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use dramatis_core::{PersistedScene, SceneSnapshot};

pub fn run(file: &Path, json: bool) -> Result<(), String> {
    let snapshot: SceneSnapshot = super::read_json(file)?;
    let roster = super::bootstrap_snapshot(&snapshot)?;

    if json {
        let out = serde_json::to_string_pretty(&PersistedScene::of(&roster))
            .map_err(|e| e.to_string())?;
        println!("{out}");
        return Ok(());
    }

    println!("  {} {}", "Scene".bold(), roster.scene_id);
    if roster.is_empty() {
        println!("  No participants.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Participant", "Character", "Role", "Capabilities", "Present"]);
    for p in roster.participants() {
        let caps: Vec<String> = p.capabilities.iter().map(ToString::to_string).collect();
        table.add_row(vec![
            p.display_label.clone(),
            p.character_id
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
            p.role.to_string(),
            caps.join(", "),
            if p.present { "yes" } else { "no" }.to_string(),
        ]);
    }
    println!("{table}");

    let legacy = roster.legacy_presence();
    println!();
    println!("  Players: {}", super::join_or_dash(&legacy.players));
    println!("  NPCs:    {}", super::join_or_dash(&legacy.npcs));
    Ok(())
}
