//! User-prompted event generation
//!
//! Turning "what if the USSR embargoes grain exports" into a typed global
//! event takes two LLM calls: one to extract which known entities the request
//! involves, one to write the event itself against a bounded context bundle.
//! Extracted nations are filtered against the document; the engine owns the
//! event id and date regardless of what the model wrote.

use crate::core::config::EngineConfig;
use crate::core::error::{Result, WorldlineError};
use crate::core::types::{EventId, NationId};
use crate::llm::context::EventContext;
use crate::llm::parser::{extract_json, parse_single, parse_single_object};
use crate::llm::retry::RetryPolicy;
use crate::llm::Completion;
use crate::state::{GlobalEvent, GlobalState};
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedEntities {
    #[serde(default)]
    nations: Vec<String>,
    #[serde(default)]
    organizations: Vec<String>,
    #[serde(default)]
    regions: Vec<String>,
    #[serde(default)]
    suggested_event_type: Option<String>,
}

pub struct EventGenerator<'a, C: Completion> {
    client: &'a C,
    config: &'a EngineConfig,
    retry: RetryPolicy,
}

impl<'a, C: Completion> EventGenerator<'a, C> {
    pub fn new(client: &'a C, config: &'a EngineConfig) -> Self {
        Self {
            client,
            config,
            retry: RetryPolicy::from_config(config),
        }
    }

    /// Produce one fully-formed pending event from a free-text request.
    pub async fn generate_event_from_prompt(
        &self,
        state: &GlobalState,
        request: &str,
    ) -> Result<GlobalEvent> {
        let entities = self.extract_entities(state, request).await?;
        let known: Vec<NationId> = entities
            .nations
            .iter()
            .filter_map(|reference| state.resolve_nation_id(reference))
            .collect();
        debug!(
            requested = entities.nations.len(),
            known = known.len(),
            "Entity extraction finished"
        );

        let context = EventContext::from_state(state, &known, &entities.organizations, self.config);
        let event = self
            .generate_event(state, request, &entities, &context, &known)
            .await?;
        info!(event = %event.event_id, name = %event.name, "Generated event from user request");
        Ok(event)
    }

    async fn extract_entities(
        &self,
        state: &GlobalState,
        request: &str,
    ) -> Result<ExtractedEntities> {
        let known_nations: Vec<String> = state
            .nations
            .iter()
            .map(|(id, nation)| format!("{} ({})", id, nation.name))
            .collect();
        let user_prompt = format!(
            "KNOWN NATIONS:\n{}\n\nUSER REQUEST:\n{}\n\nExtract the entities as JSON:",
            known_nations.join("\n"),
            request
        );

        self.retry
            .run("extract_entities", || async {
                let response = self
                    .client
                    .complete(EXTRACT_SYSTEM_PROMPT, &user_prompt)
                    .await?;
                let payload = extract_json(&response)?;
                parse_single::<ExtractedEntities>(payload)
            })
            .await
    }

    async fn generate_event(
        &self,
        state: &GlobalState,
        request: &str,
        entities: &ExtractedEntities,
        context: &EventContext,
        known: &[NationId],
    ) -> Result<GlobalEvent> {
        let mut guidance = String::new();
        if let Some(suggested) = &entities.suggested_event_type {
            guidance.push_str(&format!("Suggested event type: {}\n", suggested));
        }
        if !entities.regions.is_empty() {
            guidance.push_str(&format!("Regions involved: {}\n", entities.regions.join(", ")));
        }
        if !known.is_empty() {
            guidance.push_str(&format!(
                "Use these nation ids in participatingNations: {}\n",
                known
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        let user_prompt = format!(
            "WORLD CONTEXT:\n{}\n{}\nCURRENT DATE: {}\n\nUSER REQUEST:\n{}\n\nGenerate the event as JSON:",
            context.summary(),
            guidance,
            state.current_date,
            request
        );

        let mut event = self
            .retry
            .run("generate_event", || async {
                let response = self
                    .client
                    .complete(EVENT_SYSTEM_PROMPT, &user_prompt)
                    .await?;
                let payload = extract_json(&response)?;
                let mut object = parse_single_object(payload)?;
                if !object.contains_key("eventType") && !object.contains_key("type") {
                    return Err(WorldlineError::LlmError(
                        "Generated event is missing eventType".into(),
                    ));
                }
                // The engine assigns identity; drop whatever the model wrote.
                object.remove("eventId");
                let event: GlobalEvent =
                    serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
                        WorldlineError::LlmError(format!("Generated event is malformed: {}", e))
                    })?;
                Ok(event)
            })
            .await?;

        event.event_id = EventId::new();
        event.date = state.current_date;
        // Keep participants inside the known world.
        event
            .participating_nations
            .retain(|p| state.nation(p).is_some());
        if event.participating_nations.is_empty() {
            event.participating_nations = known.to_vec();
        }
        Ok(event)
    }
}

const EXTRACT_SYSTEM_PROMPT: &str = r#"You are extracting entities from a request to inject an event into an alternate-history world simulation.

OUTPUT FORMAT (JSON only, no explanation):
{
  "nations": ["nation ids from the KNOWN NATIONS list only"],
  "organizations": ["named organizations, if any"],
  "regions": ["geographic regions mentioned, if any"],
  "suggestedEventType": "Conflict|Economic Event|Political Event|Scientific Discovery|Natural Disaster|Humanitarian Crisis|Political Violence|Generic Event"
}

RULES:
- Resolve aliases to the canonical id: "America", "the US" and "Washington" are all the nation listed as usa.
- Never invent nations that are not in the KNOWN NATIONS list; leave them out instead.
- Leave lists empty rather than guessing.

Examples:
"What if the Soviet Union cuts off gas to Europe" -> {"nations": ["ussr"], "organizations": [], "regions": ["Europe"], "suggestedEventType": "Economic Event"}
"Have OPEC announce an embargo against the US" -> {"nations": ["usa"], "organizations": ["OPEC"], "regions": [], "suggestedEventType": "Economic Event"}
"#;

const EVENT_SYSTEM_PROMPT: &str = r#"You are writing one global event for an alternate-history world simulation, honoring the user's request and staying consistent with the world context.

OUTPUT FORMAT (a single JSON object; an array containing exactly one object is also accepted):
{
  "name": "short event name",
  "eventType": "Conflict|Economic Event|Political Event|Scientific Discovery|Natural Disaster|Humanitarian Crisis|Political Violence|Generic Event",
  "description": "two or three sentences of narrative",
  "eventData": { "any structured details": "appropriate to the type" },
  "participatingNations": ["nation ids given in the guidance"],
  "ramifications": [
    {
      "category": "Military|Economic|Political|Social|Environmental|Technological|Diplomatic|Humanitarian",
      "severity": "Minimal|Low|Moderate|High|Severe|Critical|Transformative",
      "description": "one sentence",
      "timeframe": "Short-Term (2 weeks to 3 months)",
      "affectedParties": ["names"]
    }
  ]
}

RULES:
- One to three ramifications, each with a distinct category.
- participatingNations must only use the ids provided in the guidance.
- Do not include eventId or date; the engine assigns them.
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::EventType;
    use crate::state::Nation;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::{Map, Value};
    use std::sync::Mutex;

    struct ScriptedClient {
        responses: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
            }
        }
    }

    #[async_trait]
    impl Completion for ScriptedClient {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| WorldlineError::LlmError("script exhausted".into()))
        }
    }

    fn test_state() -> GlobalState {
        let mut state = GlobalState::empty(NaiveDate::from_ymd_opt(1975, 3, 1).unwrap());
        for (id, name) in [("usa", "United States"), ("ussr", "Soviet Union")] {
            state.nations.insert(
                id.to_string(),
                Nation {
                    nation_id: NationId::from(id),
                    name: name.to_string(),
                    internal_affairs: Value::Null,
                    external_affairs: Value::Null,
                    nationwide_impacts: Vec::new(),
                    extra: Map::new(),
                },
            );
        }
        state
    }

    fn quick_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.llm_retry_delay_secs = 0;
        config
    }

    #[tokio::test]
    async fn test_two_call_generation_flow() {
        let state = test_state();
        let client = ScriptedClient::new(vec![
            r#"{"nations": ["ussr", "usa"], "organizations": [], "regions": [], "suggestedEventType": "Economic Event"}"#,
            r#"{"name": "Grain Embargo", "eventType": "Economic Event", "description": "Moscow halts grain purchases.", "participatingNations": ["ussr", "usa"], "ramifications": [{"category": "Economic", "severity": "Moderate", "description": "Grain prices swing", "timeframe": "Short-Term (2 weeks to 3 months)", "affectedParties": ["United States"]}]}"#,
        ]);
        let config = quick_config();
        let generator = EventGenerator::new(&client, &config);
        let event = generator
            .generate_event_from_prompt(&state, "What if the USSR embargoes US grain")
            .await
            .unwrap();

        assert_eq!(event.name, "Grain Embargo");
        assert_eq!(event.event_type, EventType::EconomicEvent);
        assert_eq!(event.date, state.current_date);
        assert_eq!(
            event.participating_nations,
            vec![NationId::from("ussr"), NationId::from("usa")]
        );
        assert_eq!(event.ramifications.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_nations_are_filtered() {
        let state = test_state();
        let client = ScriptedClient::new(vec![
            r#"{"nations": ["atlantis", "usa"], "organizations": [], "regions": []}"#,
            r#"{"name": "Coastal Treaty", "eventType": "Political Event", "participatingNations": ["atlantis", "usa"]}"#,
        ]);
        let config = quick_config();
        let generator = EventGenerator::new(&client, &config);
        let event = generator
            .generate_event_from_prompt(&state, "Treaty with Atlantis")
            .await
            .unwrap();
        assert_eq!(event.participating_nations, vec![NationId::from("usa")]);
    }

    #[tokio::test]
    async fn test_array_of_one_response_is_accepted() {
        let state = test_state();
        let client = ScriptedClient::new(vec![
            r#"{"nations": ["usa"], "organizations": [], "regions": []}"#,
            r#"```json
[{"name": "Moon Base", "eventType": "Scientific Discovery", "participatingNations": ["usa"]}]
```"#,
        ]);
        let config = quick_config();
        let generator = EventGenerator::new(&client, &config);
        let event = generator
            .generate_event_from_prompt(&state, "US builds a moon base")
            .await
            .unwrap();
        assert_eq!(event.event_type, EventType::ScientificDiscovery);
    }

    #[tokio::test]
    async fn test_missing_event_type_is_retried_then_fails() {
        let state = test_state();
        let mut responses = vec![r#"{"nations": ["usa"], "organizations": [], "regions": []}"#];
        for _ in 0..3 {
            responses.push(r#"{"name": "Typeless Happening"}"#);
        }
        let client = ScriptedClient::new(responses);
        let config = quick_config();
        let generator = EventGenerator::new(&client, &config);
        let result = generator
            .generate_event_from_prompt(&state, "Something vague")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_model_supplied_event_id_is_replaced() {
        let state = test_state();
        let client = ScriptedClient::new(vec![
            r#"{"nations": ["usa"], "organizations": [], "regions": []}"#,
            r#"{"eventId": "not-a-uuid", "name": "Odd Event", "eventType": "Generic Event", "participatingNations": ["usa"]}"#,
        ]);
        let config = quick_config();
        let generator = EventGenerator::new(&client, &config);
        let event = generator
            .generate_event_from_prompt(&state, "Something odd")
            .await
            .unwrap();
        assert_eq!(event.name, "Odd Event");
    }
}
