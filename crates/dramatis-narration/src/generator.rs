//! The narration generator port.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dramatis_core::{SceneId, TurnType};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::context::Fact;
use crate::error::{NarrationError, NarrationResult};

/// What the generator is asked to narrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationRequest {
    /// Scene key.
    pub scene_id: SceneId,
    /// Acting participant.
    pub actor: String,
    /// How the turn was classified.
    pub turn_type: TurnType,
    /// What the actor declared.
    pub intent: String,
    /// Outcome of the resolved action, if there was one.
    pub outcome: Option<String>,
    /// Names present in the scene.
    pub present: Vec<String>,
    /// Run context facts so far.
    pub facts: Vec<Fact>,
}

/// Produces a structured narration proposal for a turn.
///
/// The output is untrusted: it goes through the normalization pipeline and
/// may be any JSON value, including a string holding JSON.
#[async_trait]
pub trait NarrationGenerator: Send + Sync {
    /// Propose narration for one turn.
    async fn generate(&self, request: &NarrationRequest) -> NarrationResult<Value>;
}

/// Call the generator with a per-attempt timeout, retrying failures and
/// timeouts up to `attempts` times. Output is returned as soon as one call
/// answers; a malformed answer is not retried.
pub async fn generate_with_retry(
    generator: &dyn NarrationGenerator,
    request: &NarrationRequest,
    timeout: Duration,
    attempts: u32,
) -> NarrationResult<Value> {
    let attempts = attempts.max(1);
    let mut last = NarrationError::Generator("not attempted".to_string());
    for attempt in 1..=attempts {
        match tokio::time::timeout(timeout, generator.generate(request)).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                warn!(attempt, error = %e, "narration attempt failed");
                last = e;
            }
            Err(_) => {
                warn!(attempt, ?timeout, "narration attempt timed out");
                last = NarrationError::Timeout(timeout);
            }
        }
    }
    Err(NarrationError::Exhausted {
        attempts,
        last: Box::new(last),
    })
}

/// Offline generator that narrates from the request alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateGenerator;

#[async_trait]
impl NarrationGenerator for TemplateGenerator {
    async fn generate(&self, request: &NarrationRequest) -> NarrationResult<Value> {
        let text = match (&request.turn_type, &request.outcome) {
            (TurnType::Narrator, _) => request.intent.clone(),
            (_, Some(outcome)) => {
                format!("{} acts: {}. {}", request.actor, request.intent, outcome)
            }
            (_, None) => format!("{} acts: {}.", request.actor, request.intent),
        };
        let mentions: Vec<Value> = if request.turn_type == TurnType::Narrator {
            Vec::new()
        } else {
            vec![json!({"name": request.actor, "in_combat": request.outcome.is_some()})]
        };
        Ok(json!({
            "narrative": {"text": text},
            "mentions": mentions,
        }))
    }
}

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Answer with this value.
    Reply(Value),
    /// Fail with this message.
    Fail(String),
    /// Wait, then answer.
    Stall(Duration, Value),
}

/// Generator that plays back a fixed script, for tests and demos.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicU32,
}

impl ScriptedGenerator {
    /// Create a generator from replies, used in order.
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicU32::new(0),
        }
    }

    /// Shorthand for a script of plain replies.
    pub fn replies(values: impl IntoIterator<Item = Value>) -> Self {
        Self::new(values.into_iter().map(Scripted::Reply))
    }

    /// How many times `generate` has been called.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Option<Scripted> {
        self.script.lock().ok()?.pop_front()
    }
}

#[async_trait]
impl NarrationGenerator for ScriptedGenerator {
    async fn generate(&self, _request: &NarrationRequest) -> NarrationResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next() {
            Some(Scripted::Reply(value)) => Ok(value),
            Some(Scripted::Fail(message)) => Err(NarrationError::Generator(message)),
            Some(Scripted::Stall(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            None => Err(NarrationError::Generator("script exhausted".to_string())),
        }
    }
}
