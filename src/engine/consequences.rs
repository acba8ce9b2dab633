//! Consequence synthesis
//!
//! Every merged event fans out into one `NationwideImpact` per participating
//! nation; every ramification hint on the event refines into one typed
//! `Effect` per impact; every effect gets at most one concrete `Ramification`
//! from a narrow LLM call. A failed or skipped unit never blocks its
//! siblings: the effect still exists, it just carries no scheduled mutation.

use crate::core::config::EngineConfig;
use crate::core::error::{Result, WorldlineError};
use crate::core::types::{
    EffectId, EventId, ImpactId, NationId, Operation, RamificationId, RamificationStatus,
};
use crate::llm::parser::{extract_json, parse_single};
use crate::llm::retry::RetryPolicy;
use crate::llm::Completion;
use crate::state::path::TargetPath;
use crate::state::{Effect, GlobalEvent, GlobalState, NationwideImpact, Ramification};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Counts for the step summary
#[derive(Debug, Default, Clone, Copy)]
pub struct SynthesisReport {
    pub impacts: usize,
    pub effects: usize,
    pub ramifications: usize,
    pub effects_without_ramifications: usize,
}

/// The JSON contract one mutation-generation call must satisfy
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedMutation {
    target_path: String,
    operation: Operation,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    description: String,
    #[serde(default)]
    value_identifier: Option<Value>,
}

pub struct ConsequenceSynthesizer<'a, C: Completion> {
    client: Option<&'a C>,
    retry: RetryPolicy,
}

impl<'a, C: Completion> ConsequenceSynthesizer<'a, C> {
    pub fn new(client: Option<&'a C>, config: &EngineConfig) -> Self {
        Self {
            client,
            retry: RetryPolicy::from_config(config),
        }
    }

    /// Fan the merged events out into impacts, effects and ramifications.
    pub async fn apply_ramifications(
        &self,
        state: &mut GlobalState,
        merged: &[EventId],
    ) -> SynthesisReport {
        let mut report = SynthesisReport::default();
        let today = state.current_date;
        // The log itself is never edited; work from copies.
        let events: Vec<GlobalEvent> = state
            .global_events
            .iter()
            .filter(|e| merged.contains(&e.event_id))
            .cloned()
            .collect();

        for event in &events {
            for nation_id in &event.participating_nations {
                let nation_summary = match state.nation(nation_id) {
                    Some(nation) => serde_json::to_string_pretty(nation)
                        .unwrap_or_else(|_| format!("{{\"nationId\": \"{}\"}}", nation_id)),
                    None => {
                        warn!(
                            event = %event.event_id,
                            nation = %nation_id,
                            "Participating nation missing from document, skipping impact"
                        );
                        continue;
                    }
                };

                let impact = NationwideImpact {
                    impact_id: ImpactId::new(),
                    nation_id: nation_id.clone(),
                    origin_global_event_id: event.event_id,
                    triggered_on: today,
                    description: format!("{} reaches {}", event.name, nation_id),
                    effect_ids: Vec::new(),
                    is_active: true,
                    end_date: None,
                };
                let impact_id = impact.impact_id;
                match state.nation_mut(nation_id) {
                    Some(nation) => nation.nationwide_impacts.push(impact),
                    None => continue,
                }
                report.impacts += 1;

                let mut effect_ids = Vec::new();
                for hint in &event.ramifications {
                    let mut effect = Effect {
                        effect_id: EffectId::new(),
                        origin_impact_id: impact_id,
                        nation_id: nation_id.clone(),
                        effect_type: hint.effect_type(),
                        description: hint.description.clone(),
                        severity: hint.severity_tier(),
                        start_date: today,
                        is_active: true,
                        ramification_ids: Vec::new(),
                    };

                    match self.generate_ramification(state, &nation_summary, &effect).await {
                        Some(ramification) => {
                            effect.ramification_ids.push(ramification.ramification_id);
                            state.ramifications.push(ramification);
                            report.ramifications += 1;
                        }
                        None => report.effects_without_ramifications += 1,
                    }

                    effect_ids.push(effect.effect_id);
                    state.effects.push(effect);
                    report.effects += 1;
                }

                // Back-fill the impact with its children.
                if let Some(nation) = state.nation_mut(nation_id) {
                    if let Some(impact) = nation
                        .nationwide_impacts
                        .iter_mut()
                        .find(|i| i.impact_id == impact_id)
                    {
                        impact.effect_ids = effect_ids;
                    }
                }
            }
        }

        debug!(
            impacts = report.impacts,
            effects = report.effects,
            ramifications = report.ramifications,
            skipped = report.effects_without_ramifications,
            "Consequence synthesis finished"
        );
        report
    }

    /// One narrow LLM call for one effect. Returns None when no client is
    /// configured or the retry budget is spent; the step carries on either
    /// way.
    async fn generate_ramification(
        &self,
        state: &GlobalState,
        nation_summary: &str,
        effect: &Effect,
    ) -> Option<Ramification> {
        let client = match self.client {
            Some(client) => client,
            None => {
                debug!(
                    effect = %effect.effect_id.0,
                    "No LLM client configured, effect gets no ramification"
                );
                return None;
            }
        };

        let user_prompt = format!(
            "NATION STATE:\n{}\n\nEFFECT TO TRANSLATE:\nType: {}\nSeverity: {}\nDescription: {}\n\nProduce the JSON mutation:",
            nation_summary, effect.effect_type, effect.severity, effect.description
        );

        let generated = self
            .retry
            .run("generate_ramification", || async {
                let response = client.complete(MUTATION_SYSTEM_PROMPT, &user_prompt).await?;
                let payload = extract_json(&response)?;
                let mutation: GeneratedMutation = parse_single(payload)?;
                if mutation.operation == Operation::Unsupported {
                    return Err(WorldlineError::LlmError(
                        "Generated mutation uses an unsupported operation".into(),
                    ));
                }
                TargetPath::parse(&mutation.target_path).map_err(|e| {
                    WorldlineError::LlmError(format!(
                        "Generated targetPath '{}' is malformed: {}",
                        mutation.target_path, e
                    ))
                })?;
                Ok(mutation)
            })
            .await;

        match generated {
            Ok(mutation) => Some(Ramification {
                ramification_id: RamificationId::new(),
                origin_effect_id: effect.effect_id,
                nation_id: effect.nation_id.clone(),
                description: mutation.description,
                target_path: mutation.target_path,
                operation: mutation.operation,
                value: mutation.value,
                value_identifier: mutation.value_identifier,
                execution_time: state.current_date,
                status: RamificationStatus::Pending,
                failure_reason: None,
            }),
            Err(e) => {
                warn!(
                    effect = %effect.effect_id.0,
                    nation = %effect.nation_id,
                    error = %e,
                    "Could not generate a ramification, effect stands alone"
                );
                None
            }
        }
    }
}

/// System prompt for mutation generation. The worked examples carry the
/// severity-to-magnitude convention: mild tiers nudge single digits, severe
/// tiers move tens, transformative tiers restructure, and rate-style fields
/// move by fractions regardless of tier.
const MUTATION_SYSTEM_PROMPT: &str = r#"You are translating one effect on one nation into exactly one concrete mutation of a world-state JSON document.

OUTPUT FORMAT (JSON only, no explanation):
{
  "targetPath": "dot.separated.path.into.the.document",
  "operation": "set|add|subtract|multiply|divide|remove_item|update_item",
  "value": <JSON value>,
  "description": "one sentence describing the change",
  "valueIdentifier": {"field": "value"} (only for remove_item/update_item on lists)
}

PATH RULES:
- Segments are field names or list indices, joined by dots: nations.usa.economicIndicators.gdp
- Paths must point into the provided nation record or the shared collections (conflicts, globalEconomy, ...)
- Never target the ramifications list

MAGNITUDE BY SEVERITY:
- Minimal / Low: small single-digit adjustments (1 to 4)
- Moderate: noticeable adjustments (5 to 10)
- High / Severe: major adjustments (15 to 25)
- Critical / Transformative: structural changes (30 or more, or set/remove_item/update_item)
- Rate fields (gdpGrowthRate, inflationRate, any percentage): fractional deltas (0.01 to 0.2 per tier step)

Examples:
Effect: Economic Disruption, Severity: Moderate, "Sanctions bite into exports"
-> {"targetPath": "nations.usa.economicIndicators.gdp", "operation": "subtract", "value": 8, "description": "Export sanctions shave GDP"}

Effect: Economic Disruption, Severity: Low, "Minor trade friction"
-> {"targetPath": "nations.usa.economicIndicators.gdpGrowthRate", "operation": "subtract", "value": 0.03, "description": "Trade friction drags on growth"}

Effect: Military Posture Change, Severity: High, "Conflict worsens significantly"
-> {"targetPath": "nations.usa.military.readiness", "operation": "set", "value": "Full Mobilization", "description": "Armed forces move to full mobilization"}

Effect: Political Realignment, Severity: Transformative, "Revolutionary government consolidates"
-> {"targetPath": "conflicts.activeWars", "operation": "update_item", "value": {"status": "Resolved"}, "valueIdentifier": {"conflictName": "Civil War"}, "description": "The civil war ends with the new government in control"}
"#;
