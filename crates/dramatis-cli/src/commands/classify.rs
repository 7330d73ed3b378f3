use std::path::Path;

use dramatis_core::{SceneSnapshot, TurnType, classify};

pub fn run(file: &Path, actor: &str, turn_type: Option<&str>) -> Result<(), String> {
    let explicit = turn_type
        .map(|s| {
            TurnType::parse(s).ok_or_else(|| {
                format!("unknown turn type '{s}' (expected narrator, player or non_player)")
            })
        })
        .transpose()?;

    let snapshot: SceneSnapshot = super::read_json(file)?;
    let roster = super::bootstrap_snapshot(&snapshot)?;
    let classified = classify(actor, &roster, explicit);

    match roster.find_actor(actor) {
        Some(record) => println!("{actor}: {classified} (on roster as {})", record.role),
        None => println!("{actor}: {classified}"),
    }
    Ok(())
}
