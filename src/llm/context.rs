//! Bounded context bundles for event generation
//!
//! A generation prompt never carries the whole state document. The bundle is
//! assembled from the slices that matter for the user's request: the records
//! of the nations involved, the freshest economic snapshot, a capped list of
//! active conflicts and recent related events, and any strategic interests or
//! organizations that overlap the involved nations.

use crate::core::config::EngineConfig;
use crate::core::types::NationId;
use crate::state::GlobalState;
use serde_json::Value;

/// Context assembled for one event-generation request
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    pub nation_records: Vec<String>,
    pub economy_summary: Option<String>,
    pub active_conflicts: Vec<String>,
    pub recent_events: Vec<String>,
    pub strategic_interests: Vec<String>,
    pub organizations: Vec<String>,
    pub diplomatic_stance: Option<String>,
}

/// Per-record character cap. Nation records can run long; the interesting
/// fields all sit near the top of the generated documents.
const MAX_RECORD_CHARS: usize = 2000;

fn truncate(text: String, max: usize) -> String {
    if text.len() <= max {
        return text;
    }
    let mut cut = max;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

/// True when the serialized blob mentions any of the given nations, by id or
/// display name.
fn mentions_any(blob: &Value, state: &GlobalState, nations: &[NationId]) -> bool {
    let text = compact(blob).to_lowercase();
    nations.iter().any(|id| {
        if text.contains(&id.as_str().to_lowercase()) {
            return true;
        }
        state
            .nation(id)
            .map(|n| !n.name.is_empty() && text.contains(&n.name.to_lowercase()))
            .unwrap_or(false)
    })
}

impl EventContext {
    pub fn from_state(
        state: &GlobalState,
        nations: &[NationId],
        organizations: &[String],
        config: &EngineConfig,
    ) -> Self {
        let nation_records = nations
            .iter()
            .filter_map(|id| state.nation(id))
            .filter_map(|n| serde_json::to_string_pretty(n).ok())
            .map(|text| truncate(text, MAX_RECORD_CHARS))
            .collect();

        let economy_summary = state.global_economy.last().map(compact);

        let active_conflicts = state
            .conflicts
            .active_wars
            .iter()
            .rev()
            .take(config.max_context_conflicts)
            .map(|war| {
                let name = war
                    .get("conflictName")
                    .and_then(Value::as_str)
                    .unwrap_or("Unnamed Conflict");
                let status = war.get("status").and_then(Value::as_str).unwrap_or("?");
                format!("{} ({})", name, status)
            })
            .collect();

        let recent_events = state
            .global_events
            .iter()
            .rev()
            .filter(|ev| ev.participating_nations.iter().any(|p| nations.contains(p)))
            .take(config.max_context_events)
            .map(|ev| format!("{}: {} ({})", ev.date, ev.name, ev.event_type))
            .collect();

        let strategic_interests = state
            .strategic_interests
            .iter()
            .filter(|blob| mentions_any(blob, state, nations))
            .take(config.max_context_interests)
            .map(compact)
            .collect();

        let org_lower: Vec<String> = organizations.iter().map(|o| o.to_lowercase()).collect();
        let org_records = state
            .organizations
            .iter()
            .filter(|blob| {
                let named = blob
                    .get("name")
                    .and_then(Value::as_str)
                    .map(|n| org_lower.contains(&n.to_lowercase()))
                    .unwrap_or(false);
                named || mentions_any(blob, state, nations)
            })
            .take(config.max_context_organizations)
            .map(compact)
            .collect();

        // A bilateral request also gets how the two parties currently see
        // each other, when the records carry a diplomacy section.
        let diplomatic_stance = if let [a, b] = nations {
            stance_between(state, a, b)
        } else {
            None
        };

        Self {
            nation_records,
            economy_summary,
            active_conflicts,
            recent_events,
            strategic_interests,
            organizations: org_records,
            diplomatic_stance,
        }
    }

    /// Empty context for tests
    pub fn empty() -> Self {
        Self::default()
    }

    /// Render the bundle as prompt text.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        if !self.nation_records.is_empty() {
            out.push_str("NATIONS INVOLVED:\n");
            for record in &self.nation_records {
                out.push_str(record);
                out.push('\n');
            }
        }
        if let Some(economy) = &self.economy_summary {
            out.push_str("\nLATEST GLOBAL ECONOMY SNAPSHOT:\n");
            out.push_str(economy);
            out.push('\n');
        }
        if !self.active_conflicts.is_empty() {
            out.push_str("\nACTIVE CONFLICTS:\n");
            for conflict in &self.active_conflicts {
                out.push_str("- ");
                out.push_str(conflict);
                out.push('\n');
            }
        }
        if !self.recent_events.is_empty() {
            out.push_str("\nRECENT RELATED EVENTS:\n");
            for event in &self.recent_events {
                out.push_str("- ");
                out.push_str(event);
                out.push('\n');
            }
        }
        if !self.strategic_interests.is_empty() {
            out.push_str("\nRELEVANT STRATEGIC INTERESTS:\n");
            for interest in &self.strategic_interests {
                out.push_str("- ");
                out.push_str(interest);
                out.push('\n');
            }
        }
        if !self.organizations.is_empty() {
            out.push_str("\nRELEVANT ORGANIZATIONS:\n");
            for org in &self.organizations {
                out.push_str("- ");
                out.push_str(org);
                out.push('\n');
            }
        }
        if let Some(stance) = &self.diplomatic_stance {
            out.push_str("\nDIPLOMATIC STANCE:\n");
            out.push_str(stance);
            out.push('\n');
        }
        if out.is_empty() {
            out.push_str("(no additional context)\n");
        }
        out
    }
}

fn stance_between(state: &GlobalState, a: &NationId, b: &NationId) -> Option<String> {
    let mut lines = Vec::new();
    for (from, toward) in [(a, b), (b, a)] {
        if let Some(line) = stance_line(state, from, toward) {
            lines.push(line);
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn stance_line(state: &GlobalState, from: &NationId, toward: &NationId) -> Option<String> {
    let nation = state.nation(from)?;
    let diplomacy = nation
        .external_affairs
        .get("diplomacy")
        .or_else(|| nation.extra.get("diplomacy"))?;
    let toward_text = toward.as_str().to_lowercase();
    let entries = diplomacy.as_array()?;
    entries
        .iter()
        .find(|entry| compact(entry).to_lowercase().contains(&toward_text))
        .map(|entry| format!("{} toward {}: {}", from, toward, compact(entry)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Nation;
    use chrono::NaiveDate;
    use serde_json::{json, Map};

    fn state_with_nations() -> GlobalState {
        let mut state = GlobalState::empty(NaiveDate::from_ymd_opt(1975, 1, 1).unwrap());
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

    #[test]
    fn test_context_includes_involved_nation_records() {
        let state = state_with_nations();
        let context = EventContext::from_state(
            &state,
            &[NationId::from("usa")],
            &[],
            &EngineConfig::default(),
        );
        assert_eq!(context.nation_records.len(), 1);
        assert!(context.nation_records[0].contains("United States"));
    }

    #[test]
    fn test_context_caps_conflicts() {
        let mut state = state_with_nations();
        for i in 0..6 {
            state.conflicts.active_wars.push(json!({
                "conflictName": format!("War {}", i),
                "status": "Ongoing"
            }));
        }
        let mut config = EngineConfig::default();
        config.max_context_conflicts = 2;
        let context = EventContext::from_state(&state, &[NationId::from("usa")], &[], &config);
        assert_eq!(context.active_conflicts.len(), 2);
    }

    #[test]
    fn test_interest_filtering_by_entity_overlap() {
        let mut state = state_with_nations();
        state.strategic_interests.push(json!({
            "interestName": "Persian Gulf Oil",
            "involvedNations": ["usa"]
        }));
        state.strategic_interests.push(json!({
            "interestName": "Antarctic Claims",
            "involvedNations": ["argentina"]
        }));
        let context = EventContext::from_state(
            &state,
            &[NationId::from("usa")],
            &[],
            &EngineConfig::default(),
        );
        assert_eq!(context.strategic_interests.len(), 1);
        assert!(context.strategic_interests[0].contains("Persian Gulf Oil"));
    }

    #[test]
    fn test_diplomatic_stance_for_bilateral_request() {
        let mut state = state_with_nations();
        if let Some(nation) = state.nations.get_mut("usa") {
            nation.external_affairs = json!({
                "diplomacy": [
                    { "counterpart": "ussr", "relation": "Detente" }
                ]
            });
        }
        let context = EventContext::from_state(
            &state,
            &[NationId::from("usa"), NationId::from("ussr")],
            &[],
            &EngineConfig::default(),
        );
        let stance = context.diplomatic_stance.unwrap();
        assert!(stance.contains("Detente"));
    }

    #[test]
    fn test_empty_summary_has_placeholder() {
        let summary = EventContext::empty().summary();
        assert!(summary.contains("no additional context"));
    }
}
