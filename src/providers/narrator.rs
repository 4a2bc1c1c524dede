//! Templated narration, also the fallback when a narrator is slow or fails

use async_trait::async_trait;
use serde_json::Value;

use super::Narrator;
use crate::error::ProviderError;
use crate::output::EventKind;

fn field<'a>(summary: &'a Value, key: &str) -> Option<&'a str> {
    summary.get(key).and_then(Value::as_str)
}

fn describe_effect(effect: &Value) -> Option<String> {
    let target = field(effect, "target")?;
    let amount = effect.get("amount").and_then(Value::as_i64).unwrap_or(0);
    let line = match field(effect, "outcome")? {
        "damaged" if effect.get("defeated").and_then(Value::as_bool) == Some(true) => {
            format!("{} takes {} damage and falls", target, amount)
        }
        "damaged" => format!("{} takes {} damage", target, amount),
        "healed" => format!("{} recovers {}", target, amount),
        "no_effect" => format!("{} is unaffected", target),
        "missed" => format!("{} evades", target),
        "status_applied" | "status_refreshed" | "status_replaced" => {
            format!("{} is afflicted by {}", target, field(effect, "name").unwrap_or("something"))
        }
        "cleansed" => format!("{} is cleansed", target),
        _ => return None,
    };
    Some(line)
}

/// One sentence describing a mechanical summary
pub fn template_line(kind: EventKind, summary: &Value) -> String {
    let actor = field(summary, "actor").unwrap_or("Someone");
    let action = field(summary, "action").unwrap_or("act");
    match kind {
        EventKind::ActionResult => {
            if field(summary, "wasted").is_some() {
                return format!("{} tries to {}, but nothing happens.", actor, action);
            }
            if let Some(fled) = summary.get("fled").and_then(Value::as_bool) {
                return if fled {
                    format!("{} breaks away and escapes.", actor)
                } else {
                    format!("{} tries to flee but is cut off.", actor)
                };
            }
            let effects: Vec<String> = summary
                .get("effects")
                .and_then(Value::as_array)
                .map(|effects| effects.iter().filter_map(describe_effect).collect())
                .unwrap_or_default();
            if effects.is_empty() {
                format!("{} chooses to {}.", actor, action)
            } else {
                format!("{} moves to {}: {}.", actor, action, effects.join(", "))
            }
        }
        EventKind::StatusTick => format!("{} suffers from lingering effects.", actor),
        EventKind::CombatEnd => format!(
            "The fight is over: {}.",
            field(summary, "outcome").unwrap_or("ended").to_lowercase()
        ),
        _ => format!("{} acts.", actor),
    }
}

/// Narrator that only uses templates; instant and infallible
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrator;

#[async_trait]
impl Narrator for TemplateNarrator {
    async fn narrate(&self, kind: EventKind, summary: &Value) -> Result<String, ProviderError> {
        Ok(template_line(kind, summary))
    }
}
