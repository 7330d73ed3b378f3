use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table as Grid};
use dramatis_combat::{CombatSession, CombatStats};
use dramatis_core::{CharacterId, CharacterRef, MemoryRosterStore, RosterManager, SceneSnapshot};
use dramatis_narration::{TemplateGenerator, ToolOutcome};
use dramatis_session::{SessionConfig, SessionError, Table, TurnRequest};
use serde::Deserialize;

/// A scene to play: who is there, and what happens.
#[derive(Deserialize)]
struct Script {
    scene: SceneSnapshot,
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
enum Step {
    Join(CharacterRef),
    Leave {
        character_id: CharacterId,
    },
    StartCombat {
        #[serde(default)]
        stats: BTreeMap<String, CombatStats>,
    },
    Fact {
        outcome: ToolOutcome,
    },
    Turn(TurnRequest),
    Advance,
    EndRound,
    EndCombat,
}

#[derive(Clone, Copy)]
enum Format {
    Markdown,
    Text,
}

pub fn run(file: &Path, config: Option<&Path>, format: &str) -> Result<(), String> {
    let format = match format {
        "markdown" | "md" => Format::Markdown,
        "text" | "txt" => Format::Text,
        other => {
            return Err(format!(
                "unknown journal format '{other}' (expected markdown or text)"
            ));
        }
    };
    let script: Script = super::read_json(file)?;
    let config = match config {
        Some(path) => {
            SessionConfig::from_json(&super::read_file(path)?).map_err(|e| e.to_string())?
        }
        None => SessionConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("cannot start runtime: {e}"))?;
    runtime.block_on(play(script, config, format))
}

async fn play(script: Script, config: SessionConfig, format: Format) -> Result<(), String> {
    let manager = RosterManager::new(Arc::new(MemoryRosterStore::new()));
    let table = Table::new(manager, Arc::new(TemplateGenerator), config);
    let scene_id = script.scene.scene_id.clone();

    let roster = table
        .open_scene(&script.scene, None)
        .await
        .map_err(|e| e.to_string())?;
    println!(
        "  {} {} with {} present",
        "Opened".bold(),
        scene_id,
        roster.present().count()
    );

    let mut last_combat = None;
    for step in script.steps {
        match step {
            Step::Join(character) => {
                let record = table
                    .add_participant(&scene_id, character)
                    .await
                    .map_err(|e| e.to_string())?;
                println!("  {} joins as {}", record.display_label.bold(), record.role);
            }
            Step::Leave { character_id } => {
                table
                    .remove_participant(&scene_id, &character_id)
                    .await
                    .map_err(|e| e.to_string())?;
                println!("  {} leaves", character_id.as_str().bold());
            }
            Step::StartCombat { stats } => {
                let order = table
                    .start_combat(&scene_id, &stats)
                    .await
                    .map_err(|e| e.to_string())?;
                let names: Vec<String> = order
                    .iter()
                    .map(|c| format!("{} ({})", c.combatant_id, c.initiative))
                    .collect();
                println!("  {} {}", "Combat:".bold(), names.join(" > "));
            }
            Step::Fact { outcome } => {
                let key = table
                    .record_fact(&scene_id, outcome)
                    .await
                    .map_err(|e| e.to_string())?;
                println!("  recorded {key}");
            }
            Step::Turn(request) => match table.take_turn(&scene_id, request).await {
                Ok(outcome) => {
                    println!(
                        "  {} {}",
                        format!("[{}]", outcome.turn_type).dimmed(),
                        outcome.narration.payload.narrative.text
                    );
                    for record in &outcome.joined {
                        println!("  {} joins as {}", record.display_label.bold(), record.role);
                    }
                }
                Err(e @ (SessionError::Combat(_) | SessionError::NarratorAction)) => {
                    println!("  {} {e}", "rejected:".yellow());
                }
                Err(e) => return Err(e.to_string()),
            },
            Step::Advance => {
                let next = table.advance(&scene_id).await.map_err(|e| e.to_string())?;
                println!("  next up: {next}");
            }
            Step::EndRound => {
                let penalties = table
                    .end_round(&scene_id)
                    .await
                    .map_err(|e| e.to_string())?;
                for p in &penalties {
                    println!(
                        "  {} {} pays {} damage for overdraft {}",
                        "penalty:".red(),
                        p.combatant_id,
                        p.roll.total(),
                        p.deficit
                    );
                }
            }
            Step::EndCombat => {
                last_combat = Some(table.end_combat(&scene_id).await.map_err(|e| e.to_string())?);
                println!("  {}", "Combat over".bold());
            }
        }
    }

    let running = table.combat(&scene_id).await.map_err(|e| e.to_string())?;
    if let Some(combat) = running.as_ref().or(last_combat.as_ref()) {
        println!();
        print_combatants(combat);
    }

    let journal = table.journal(&scene_id).await.map_err(|e| e.to_string())?;
    println!();
    match format {
        Format::Markdown => print!("{}", journal.export_markdown()),
        Format::Text => print!("{}", journal.export_text()),
    }
    Ok(())
}

fn print_combatants(combat: &CombatSession) {
    let mut grid = Grid::new();
    grid.set_content_arrangement(ContentArrangement::Dynamic);
    grid.set_header(vec!["Combatant", "HP", "Resource", "Status"]);
    for c in combat.in_initiative_order() {
        let status = if c.is_defeated() {
            "down".red()
        } else if c.current_resource < 0 {
            "overdrawn".yellow()
        } else {
            "ready".green()
        };
        grid.add_row(vec![
            c.combatant_id.clone(),
            format!("{}/{}", c.hit_points, c.max_hit_points),
            format!("{}/{}", c.current_resource, c.max_resource),
            status.to_string(),
        ]);
    }
    println!("{grid}");
    println!();
    println!("  Round {}", combat.current_round());
}
