//! The normalization pipeline: EXTRACT, VALIDATE, MERGE, or FALLBACK.

use std::collections::{BTreeMap, HashMap, HashSet};

use dramatis_core::ActorMention;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::context::{Fact, RunContext, ToolOutcome};
use crate::error::{NarrationError, NarrationResult};
use crate::payload::{
    Diagnostic, DiceRecord, Effect, EnvironmentBlock, InitiativeEntry, NarrationPayload,
    NarrativeBlock, NormalizedTurn, PayloadSource, Stage,
};

/// Normalize raw generator output against the run context.
///
/// Never fails: any error in extraction, validation or merging yields the
/// fallback scaffold, with the error kept as a diagnostic.
pub fn normalize(raw: &Value, context: &RunContext) -> NormalizedTurn {
    let mut diagnostics = Vec::new();
    let result = extract(raw)
        .map_err(|e| (Stage::Extract, e))
        .and_then(|object| validate(&object, &mut diagnostics).map_err(|e| (Stage::Validate, e)))
        .and_then(|payload| {
            merge(payload, context, &mut diagnostics).map_err(|e| (Stage::Merge, e))
        });

    match result {
        Ok(payload) => {
            debug!(diagnostics = diagnostics.len(), "narration normalized");
            NormalizedTurn {
                payload,
                source: PayloadSource::Generated,
                diagnostics,
            }
        }
        Err((stage, error)) => {
            diagnostics.push(Diagnostic {
                stage,
                message: error.to_string(),
            });
            scaffold(context, diagnostics)
        }
    }
}

/// Fallback result for a turn whose narration never arrived.
pub fn normalize_failure(error: &NarrationError, context: &RunContext) -> NormalizedTurn {
    let diagnostics = vec![Diagnostic {
        stage: Stage::Extract,
        message: error.to_string(),
    }];
    scaffold(context, diagnostics)
}

fn scaffold(context: &RunContext, mut diagnostics: Vec<Diagnostic>) -> NormalizedTurn {
    warn!(
        reason = diagnostics.last().map(|d| d.message.as_str()).unwrap_or_default(),
        "narration replaced by fallback"
    );
    diagnostics.push(Diagnostic {
        stage: Stage::Fallback,
        message: format!("scaffold built from {} run context fact(s)", context.len()),
    });
    NormalizedTurn {
        payload: fallback(context),
        source: PayloadSource::Fallback,
        diagnostics,
    }
}

/// A minimal valid payload built from the run context alone. When a key
/// holds conflicting values the earliest one is used.
pub fn fallback(context: &RunContext) -> NarrationPayload {
    let mut payload = NarrationPayload::default();
    for fact in context.resolved() {
        match &fact.outcome {
            ToolOutcome::Initiative { .. } => payload.initiative.extend(initiative_of(fact)),
            ToolOutcome::DiceRoll { .. } => payload.dice.extend(dice_of(fact)),
            ToolOutcome::ResourceSpend { .. } => {}
        }
    }
    sort_initiative(&mut payload.initiative);
    payload
}

// --- Extract ---

/// Turn generator output into a JSON object. Accepts an object, or a string
/// holding one (optionally inside a markdown code fence).
pub fn extract(raw: &Value) -> NarrationResult<Map<String, Value>> {
    match raw {
        Value::Object(object) => Ok(object.clone()),
        Value::String(text) => match serde_json::from_str::<Value>(strip_fences(text)) {
            Ok(Value::Object(object)) => Ok(object),
            Ok(other) => Err(NarrationError::Malformed(format!(
                "expected an object, got {}",
                kind(&other)
            ))),
            Err(e) => Err(NarrationError::Malformed(e.to_string())),
        },
        other => Err(NarrationError::Malformed(format!(
            "expected an object or a string, got {}",
            kind(other)
        ))),
    }
}

/// Find the JSON in free text: the first fenced block, else the outermost
/// braces, else the text itself.
fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(start) = text.find("```") {
        let body = &text[start + 3..];
        let body = body.find("```").map_or(body, |end| &body[..end]);
        // Drop a language tag such as "json" on the opening line.
        return match body.find('\n') {
            Some(newline) if !body[..newline].trim_start().starts_with('{') => {
                body[newline + 1..].trim()
            }
            _ => body.trim(),
        };
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// --- Validate ---

#[derive(Deserialize)]
#[serde(untagged)]
enum NarrativeInput {
    Text(String),
    Block(NarrativeBlock),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InitiativeInput {
    List(Vec<InitiativeEntry>),
    Table(BTreeMap<String, i32>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MentionInput {
    Name(String),
    Full(ActorMention),
}

/// Check each section on its own; a broken section falls back to its
/// default. Fails only when no section is usable.
fn validate(
    object: &Map<String, Value>,
    diagnostics: &mut Vec<Diagnostic>,
) -> NarrationResult<NarrationPayload> {
    let mut payload = NarrationPayload::default();
    let mut usable = 0;

    if let Some(input) = section::<NarrativeInput>(object, "narrative", diagnostics) {
        payload.narrative = match input {
            NarrativeInput::Text(text) => NarrativeBlock { text },
            NarrativeInput::Block(block) => block,
        };
        usable += 1;
    }
    if let Some(environment) = section::<EnvironmentBlock>(object, "environment", diagnostics) {
        payload.environment = environment;
        usable += 1;
    }
    if let Some(effects) = section::<Vec<Effect>>(object, "effects", diagnostics) {
        payload.effects = effects;
        usable += 1;
    }
    if let Some(input) = section::<InitiativeInput>(object, "initiative", diagnostics) {
        payload.initiative = match input {
            InitiativeInput::List(entries) => entries,
            InitiativeInput::Table(table) => table
                .into_iter()
                .map(|(name, value)| InitiativeEntry { name, value })
                .collect(),
        };
        usable += 1;
    }
    if let Some(dice) = section::<Vec<DiceRecord>>(object, "dice", diagnostics) {
        payload.dice = dice;
        usable += 1;
    }
    if let Some(inputs) = section::<Vec<MentionInput>>(object, "mentions", diagnostics) {
        payload.mentions = inputs
            .into_iter()
            .map(|m| match m {
                MentionInput::Name(name) => ActorMention::named(name),
                MentionInput::Full(mention) => mention,
            })
            .filter(|m| !m.name.trim().is_empty())
            .collect();
        usable += 1;
    }

    if usable == 0 {
        return Err(NarrationError::NothingUsable);
    }
    Ok(payload)
}

/// Parse one section. Missing or null sections are silently defaulted;
/// invalid ones are defaulted with a diagnostic.
fn section<T: DeserializeOwned>(
    object: &Map<String, Value>,
    name: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<T> {
    let value = object.get(name).filter(|v| !v.is_null())?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            diagnostics.push(Diagnostic {
                stage: Stage::Validate,
                message: format!("{name} rejected ({e}); using default"),
            });
            None
        }
    }
}

// --- Merge ---

/// Reconcile a validated payload with the run context. Context facts
/// replace narration entries with the same identity; the initiative order is
/// sorted once at the end.
fn merge(
    mut payload: NarrationPayload,
    context: &RunContext,
    diagnostics: &mut Vec<Diagnostic>,
) -> NarrationResult<NarrationPayload> {
    let facts = context.consistent()?;

    payload.initiative = merge_initiative(
        std::mem::take(&mut payload.initiative),
        &facts,
        diagnostics,
    );
    payload.dice = merge_dice(std::mem::take(&mut payload.dice), &facts, diagnostics);

    let mut seen = HashSet::new();
    payload
        .mentions
        .retain(|m| seen.insert(m.name.trim().to_lowercase()));

    Ok(payload)
}

fn merge_initiative(
    narrated: Vec<InitiativeEntry>,
    facts: &[&Fact],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<InitiativeEntry> {
    let mut by_key: HashMap<String, InitiativeEntry> = HashMap::new();
    for entry in narrated {
        let key = entry.identity();
        if by_key.contains_key(&key) {
            diagnostics.push(merge_note(format!(
                "duplicate initiative for {} dropped",
                entry.name
            )));
        } else {
            by_key.insert(key, entry);
        }
    }
    for fact in facts {
        let Some(entry) = initiative_of(fact) else {
            continue;
        };
        if let Some(old) = by_key.insert(fact.key.clone(), entry.clone()) {
            if old.value != entry.value {
                diagnostics.push(merge_note(format!(
                    "initiative for {}: narration said {}, run context has {}",
                    entry.name, old.value, entry.value
                )));
            }
        }
    }
    let mut merged: Vec<InitiativeEntry> = by_key.into_values().collect();
    sort_initiative(&mut merged);
    merged
}

fn merge_dice(
    narrated: Vec<DiceRecord>,
    facts: &[&Fact],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<DiceRecord> {
    let trusted: HashMap<&str, DiceRecord> = facts
        .iter()
        .filter_map(|f| dice_of(f).map(|d| (f.key.as_str(), d)))
        .collect();

    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for record in narrated {
        let key = record.identity();
        if !seen.insert(key.clone()) {
            diagnostics.push(merge_note(format!("duplicate roll '{}' dropped", record.label)));
            continue;
        }
        match trusted.get(key.as_str()) {
            Some(fact) => {
                if fact.total != record.total {
                    diagnostics.push(merge_note(format!(
                        "roll '{}': narration said {}, run context has {}",
                        record.label, record.total, fact.total
                    )));
                }
                merged.push(fact.clone());
            }
            None => merged.push(record),
        }
    }
    for fact in facts {
        if let Some(record) = dice_of(fact) {
            if seen.insert(fact.key.clone()) {
                merged.push(record);
            }
        }
    }
    merged
}

fn merge_note(message: String) -> Diagnostic {
    Diagnostic {
        stage: Stage::Merge,
        message,
    }
}

fn initiative_of(fact: &Fact) -> Option<InitiativeEntry> {
    match &fact.outcome {
        ToolOutcome::Initiative { name, value } => Some(InitiativeEntry {
            name: name.clone(),
            value: *value,
        }),
        _ => None,
    }
}

fn dice_of(fact: &Fact) -> Option<DiceRecord> {
    match &fact.outcome {
        ToolOutcome::DiceRoll {
            label,
            expression,
            total,
        } => Some(DiceRecord {
            label: label.clone(),
            expression: Some(expression.clone()),
            total: *total,
        }),
        _ => None,
    }
}

/// Canonical order: initiative descending, ties by name.
fn sort_initiative(entries: &mut [InitiativeEntry]) {
    entries.sort_by(|a, b| {
        b.value
            .cmp(&a.value)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });
}
