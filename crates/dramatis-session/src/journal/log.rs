//! Journal storage and export.

use dramatis_core::{RosterEventKind, SceneId};
use serde::{Deserialize, Serialize};

use super::entry::JournalEntry;

/// A chronological log of one scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    scene_id: SceneId,
    entries: Vec<JournalEntry>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Style {
    Markdown,
    Text,
}

impl Journal {
    /// Create an empty journal for a scene.
    pub fn new(scene_id: SceneId) -> Self {
        Self {
            scene_id,
            entries: Vec::new(),
        }
    }

    /// Scene this journal belongs to.
    pub fn scene_id(&self) -> &SceneId {
        &self.scene_id
    }

    /// Append an entry to the journal.
    pub fn append(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    /// Get all entries.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the journal is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Export the journal as markdown.
    pub fn export_markdown(&self) -> String {
        let mut out = format!("# Scene Journal: {}\n\n", self.scene_id);
        for entry in &self.entries {
            out.push_str(&render(entry, Style::Markdown));
            out.push_str("\n\n");
        }
        out
    }

    /// Export the journal as plain text.
    pub fn export_text(&self) -> String {
        let title = format!("Scene Journal: {}", self.scene_id);
        let mut out = format!("{title}\n{}\n\n", "=".repeat(title.len()));
        for entry in &self.entries {
            out.push_str(&render(entry, Style::Text));
            out.push_str("\n\n");
        }
        out
    }
}

fn render(entry: &JournalEntry, style: Style) -> String {
    let strong = |s: &str| match style {
        Style::Markdown => format!("**{s}**"),
        Style::Text => s.to_string(),
    };
    match entry {
        JournalEntry::RosterChange {
            kind, label, role, ..
        } => {
            let verb = match kind {
                RosterEventKind::Joined => "joins",
                RosterEventKind::Rejoined => "returns",
                RosterEventKind::Left => "leaves",
                RosterEventKind::Updated => "is now",
            };
            format!("{} {verb} ({role})", strong(label))
        }
        JournalEntry::Turn {
            actor,
            turn_type,
            text,
            ..
        } => match style {
            Style::Markdown => format!("**{actor}** *({turn_type})*: {text}"),
            Style::Text => format!("{actor} ({turn_type}): {text}"),
        },
        JournalEntry::CombatStart { order, .. } => {
            format!("{}: {}", strong("Combat"), order.join(" > "))
        }
        JournalEntry::CombatAction {
            round,
            description,
            overdrawn,
            ..
        } => {
            let debt = if *overdrawn { " [overdrawn]" } else { "" };
            format!("{} {round}: {description}{debt}", strong("Round"))
        }
        JournalEntry::RoundEnd {
            round, penalties, ..
        } => {
            let mut line = format!("{} {round} ends", strong("Round"));
            for penalty in penalties {
                line.push_str(match style {
                    Style::Markdown => "\n- ",
                    Style::Text => "\n  ",
                });
                line.push_str(penalty);
            }
            line
        }
        JournalEntry::Fallback { actor, reason, .. } => match style {
            Style::Markdown => format!("> *Narration for {actor} fell back*: {reason}"),
            Style::Text => format!("Narration for {actor} fell back: {reason}"),
        },
        JournalEntry::CapabilityWaived {
            actor, capability, ..
        } => format!("{}: {actor} acted without {capability}", strong("Warning")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dramatis_core::{Role, TurnType};
    use dramatis_narration::PayloadSource;

    fn journal() -> Journal {
        let mut j = Journal::new(SceneId::new("docks"));
        j.append(JournalEntry::RosterChange {
            kind: RosterEventKind::Joined,
            label: "Shadow".into(),
            role: Role::NpcCombatant,
            timestamp: Utc::now(),
        });
        j.append(JournalEntry::Turn {
            actor: "Aria".into(),
            turn_type: TurnType::Player,
            text: "Aria lunges.".into(),
            source: PayloadSource::Generated,
            timestamp: Utc::now(),
        });
        j.append(JournalEntry::RoundEnd {
            round: 1,
            penalties: vec!["Aria takes 4".into()],
            timestamp: Utc::now(),
        });
        j
    }

    #[test]
    fn export_markdown() {
        let md = journal().export_markdown();
        assert!(md.starts_with("# Scene Journal: docks"));
        assert!(md.contains("**Shadow** joins (npc_combatant)"));
        assert!(md.contains("**Aria** *(player)*: Aria lunges."));
        assert!(md.contains("**Round** 1 ends\n- Aria takes 4"));
    }

    #[test]
    fn export_text() {
        let text = journal().export_text();
        assert!(text.starts_with("Scene Journal: docks\n===================="));
        assert!(text.contains("Shadow joins (npc_combatant)"));
        assert!(text.contains("Aria (player): Aria lunges."));
    }

    #[test]
    fn journal_serde_roundtrip() {
        let j = journal();
        let json = serde_json::to_string(&j).unwrap();
        let back: Journal = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back.entries(), j.entries());
    }
}
