//! Merge pending events into the world
//!
//! Every merged event lands in the append-only `globalEvents` log, and its
//! type decides which domain collection additionally gains a derived record.
//! Conflict, humanitarian and disaster events get skeleton records the
//! condition evaluator can pick up on later steps; the other types carry
//! their own serialized form into the matching collection.

use crate::core::types::{EventId, EventType};
use crate::state::{GlobalEvent, GlobalState};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// What a merge pass did, for the step summary.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub merged_ids: Vec<EventId>,
    pub summary_lines: Vec<String>,
}

pub fn merge_pending_events(state: &mut GlobalState, pending: Vec<GlobalEvent>) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    for event in pending {
        outcome
            .summary_lines
            .push(format!("{}: {} - {}", event.date, event.name, event.event_type));
        merge_domain_record(state, &event);
        outcome.merged_ids.push(event.event_id);
        state.global_events.push(event);
    }
    debug!(merged = outcome.merged_ids.len(), "Merged pending events");
    outcome
}

fn merge_domain_record(state: &mut GlobalState, event: &GlobalEvent) {
    match event.event_type {
        EventType::Conflict => {
            state.conflicts.active_wars.push(war_skeleton(event));
        }
        EventType::EconomicEvent => match serde_json::to_value(event) {
            Ok(record) => state.global_economy.push(record),
            Err(e) => warn!(event = %event.event_id, error = %e, "Could not serialize event for globalEconomy"),
        },
        EventType::HumanitarianCrisis => {
            state.humanitarian_crises.push(crisis_skeleton(event));
        }
        EventType::NaturalDisaster => {
            state.natural_disasters.push(disaster_skeleton(event));
        }
        EventType::PoliticalEvent => match serde_json::to_value(event) {
            Ok(record) => state.political_events.push(record),
            Err(e) => warn!(event = %event.event_id, error = %e, "Could not serialize event for politicalEvents"),
        },
        EventType::PoliticalViolence => match serde_json::to_value(event) {
            Ok(record) => state.political_violence.push(record),
            Err(e) => warn!(event = %event.event_id, error = %e, "Could not serialize event for politicalViolence"),
        },
        EventType::ScientificDiscovery => match serde_json::to_value(event) {
            Ok(record) => state.scientific_discoveries.push(record),
            Err(e) => warn!(event = %event.event_id, error = %e, "Could not serialize event for scientificDiscoveries"),
        },
        // Generic events only live in the log.
        EventType::GenericEvent => {}
    }
}

/// A new war starts with zeroed casualties so the escalation predicate only
/// fires once fighting has actually been simulated into the record.
fn war_skeleton(event: &GlobalEvent) -> Value {
    let belligerents = event
        .event_data
        .get("belligerents")
        .cloned()
        .unwrap_or_else(|| {
            let mut sides = event.participating_nations.iter();
            json!({
                "sideA": sides.next().map(|n| vec![n.to_string()]).unwrap_or_default(),
                "sideB": sides.map(|n| n.to_string()).collect::<Vec<_>>(),
            })
        });
    json!({
        "conflictName": event.name,
        "startDate": event.date.to_string(),
        "status": "Ongoing",
        "belligerents": belligerents,
        "casualties": { "military": 0, "civilian": 0 },
        "originEventId": event.event_id,
    })
}

fn crisis_skeleton(event: &GlobalEvent) -> Value {
    json!({
        "crisisName": event.name,
        "startDate": event.date.to_string(),
        "severityLevel": event.event_data.get("severityLevel").cloned().unwrap_or_else(|| json!("National")),
        "refugeeCount": event.event_data.get("refugeeCount").cloned().unwrap_or_else(|| json!(0)),
        "affectedRegions": event.participating_nations.iter().map(|n| n.to_string()).collect::<Vec<_>>(),
        "originEventId": event.event_id,
    })
}

fn disaster_skeleton(event: &GlobalEvent) -> Value {
    json!({
        "disasterName": event.name,
        "date": event.date.to_string(),
        "magnitude": event.event_data.get("magnitude").cloned().unwrap_or_else(|| json!(0.0)),
        "location": event.event_data.get("location").cloned().unwrap_or(Value::Null),
        "originEventId": event.event_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::NationId;
    use chrono::NaiveDate;

    fn event(event_type: EventType, name: &str) -> GlobalEvent {
        GlobalEvent {
            event_id: Default::default(),
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(1975, 2, 1).unwrap(),
            event_type,
            description: String::new(),
            event_data: Value::Null,
            participating_nations: vec![NationId::from("usa"), NationId::from("ussr")],
            ramifications: Vec::new(),
            extra: Default::default(),
        }
    }

    fn empty_state() -> GlobalState {
        GlobalState::empty(NaiveDate::from_ymd_opt(1975, 2, 1).unwrap())
    }

    #[test]
    fn test_every_merged_event_reaches_the_log() {
        let mut state = empty_state();
        let outcome = merge_pending_events(
            &mut state,
            vec![
                event(EventType::Conflict, "Border War"),
                event(EventType::GenericEvent, "Odd Happening"),
            ],
        );
        assert_eq!(state.global_events.len(), 2);
        assert_eq!(outcome.merged_ids.len(), 2);
    }

    #[test]
    fn test_conflict_merge_creates_war_skeleton() {
        let mut state = empty_state();
        merge_pending_events(&mut state, vec![event(EventType::Conflict, "Border War")]);
        assert_eq!(state.conflicts.active_wars.len(), 1);
        let war = &state.conflicts.active_wars[0];
        assert_eq!(war["conflictName"], json!("Border War"));
        assert_eq!(war["status"], json!("Ongoing"));
        assert_eq!(war["casualties"]["military"], json!(0));
        assert_eq!(war["belligerents"]["sideA"], json!(["usa"]));
    }

    #[test]
    fn test_economic_merge_augments_global_economy() {
        let mut state = empty_state();
        merge_pending_events(&mut state, vec![event(EventType::EconomicEvent, "Oil Shock")]);
        assert_eq!(state.global_economy.len(), 1);
        assert_eq!(state.global_economy[0]["name"], json!("Oil Shock"));
        assert_eq!(state.global_events.len(), 1);
    }

    #[test]
    fn test_generic_event_only_logs() {
        let mut state = empty_state();
        merge_pending_events(&mut state, vec![event(EventType::GenericEvent, "Oddity")]);
        assert_eq!(state.global_events.len(), 1);
        assert!(state.conflicts.active_wars.is_empty());
        assert!(state.global_economy.is_empty());
        assert!(state.political_events.is_empty());
    }

    #[test]
    fn test_summary_line_format() {
        let mut state = empty_state();
        let outcome =
            merge_pending_events(&mut state, vec![event(EventType::Conflict, "Border War")]);
        assert_eq!(
            outcome.summary_lines,
            vec!["1975-02-01: Border War - Conflict".to_string()]
        );
    }
}
