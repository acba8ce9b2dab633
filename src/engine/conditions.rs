//! World condition evaluation
//!
//! Every step scans all seven escalation domains against their thresholds and
//! produces fully-populated pending events for the ones that fire. Reads are
//! defensive throughout: a record missing the fields a predicate needs is
//! skipped, never an error, so one malformed seeded record cannot stall the
//! world.

use crate::core::config::EngineConfig;
use crate::core::types::{EventType, NationId};
use crate::state::{GlobalEvent, GlobalState, RamificationHint};
use serde_json::{json, Value};
use tracing::debug;

pub struct ConditionEvaluator<'a> {
    config: &'a EngineConfig,
}

fn str_field<'v>(record: &'v Value, key: &str) -> Option<&'v str> {
    record.get(key).and_then(Value::as_str)
}

fn num_at(record: &Value, pointer: &str) -> Option<f64> {
    record.pointer(pointer).and_then(Value::as_f64)
}

fn hint(
    category: &str,
    severity: &str,
    description: String,
    affected_parties: Vec<String>,
) -> RamificationHint {
    RamificationHint {
        category: category.to_string(),
        severity: severity.to_string(),
        description,
        timeframe: "Short-Term (2 weeks to 3 months)".to_string(),
        affected_parties,
    }
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Scan the whole document. Returns the pending events this step raised.
    pub fn evaluate(&self, state: &GlobalState) -> Vec<GlobalEvent> {
        let mut pending = Vec::new();
        self.check_conflicts(state, &mut pending);
        self.check_economy(state, &mut pending);
        self.check_humanitarian_crises(state, &mut pending);
        self.check_natural_disasters(state, &mut pending);
        self.check_political_events(state, &mut pending);
        self.check_political_violence(state, &mut pending);
        self.check_scientific_discoveries(state, &mut pending);
        debug!(raised = pending.len(), "Condition evaluation finished");
        pending
    }

    fn check_conflicts(&self, state: &GlobalState, pending: &mut Vec<GlobalEvent>) {
        for war in &state.conflicts.active_wars {
            if str_field(war, "status") != Some("Ongoing") {
                continue;
            }
            let casualties = match num_at(war, "/casualties/military") {
                Some(c) => c,
                None => continue,
            };
            if casualties <= self.config.conflict_casualty_threshold {
                continue;
            }
            let name = str_field(war, "conflictName").unwrap_or("Unnamed Conflict");
            let belligerents = belligerent_names(war);
            let participants = resolve_all(state, &belligerents);
            pending.push(GlobalEvent {
                event_id: Default::default(),
                name: format!("Escalation in {}", name),
                date: state.current_date,
                event_type: EventType::Conflict,
                description: format!(
                    "{} has crossed {} military casualties and continues to intensify.",
                    name, self.config.conflict_casualty_threshold as i64
                ),
                event_data: json!({
                    "conflictName": name,
                    "casualties": war.get("casualties").cloned().unwrap_or(Value::Null),
                    "belligerents": belligerents,
                }),
                participating_nations: participants,
                ramifications: vec![hint(
                    "Military",
                    "High (Broad-scale impact, multiple sectors affected, long recovery needed)",
                    format!("{} worsens significantly, straining all belligerents.", name),
                    belligerents,
                )],
                extra: Default::default(),
            });
        }
    }

    fn check_economy(&self, state: &GlobalState, pending: &mut Vec<GlobalEvent>) {
        for (key, nation) in &state.nations {
            let rate = match nation.gdp_growth_rate() {
                Some(rate) => rate,
                None => continue,
            };
            if rate >= self.config.gdp_collapse_threshold {
                continue;
            }
            let display = if nation.name.is_empty() { key } else { &nation.name };
            pending.push(GlobalEvent {
                event_id: Default::default(),
                name: format!("Economic Crisis in {}", display),
                date: state.current_date,
                event_type: EventType::EconomicEvent,
                description: format!(
                    "{}'s economy is contracting at {:.1}% annually, deep in crisis territory.",
                    display, rate
                ),
                event_data: json!({ "gdpGrowthRate": rate }),
                participating_nations: vec![NationId::from(key.clone())],
                ramifications: vec![hint(
                    "Economic",
                    "High (Broad-scale impact, multiple sectors affected, long recovery needed)",
                    format!("Sustained contraction erodes {}'s industrial base and public finances.", display),
                    vec![display.to_string()],
                )],
                extra: Default::default(),
            });
        }
    }

    fn check_humanitarian_crises(&self, state: &GlobalState, pending: &mut Vec<GlobalEvent>) {
        for crisis in &state.humanitarian_crises {
            let severity = str_field(crisis, "severityLevel").unwrap_or("");
            if severity != "International" && severity != "Global" {
                continue;
            }
            let refugees = match num_at(crisis, "/refugeeCount") {
                Some(r) => r,
                None => continue,
            };
            if refugees <= self.config.refugee_threshold {
                continue;
            }
            let name = str_field(crisis, "crisisName").unwrap_or("Unnamed Crisis");
            let regions = string_list(crisis, "affectedRegions");
            pending.push(GlobalEvent {
                event_id: Default::default(),
                name: format!("Deepening of {}", name),
                date: state.current_date,
                event_type: EventType::HumanitarianCrisis,
                description: format!(
                    "{} has displaced over {} people and now overwhelms cross-border relief capacity.",
                    name, refugees as i64
                ),
                event_data: json!({
                    "crisisName": name,
                    "refugeeCount": refugees,
                    "severityLevel": severity,
                }),
                participating_nations: resolve_all(state, &regions),
                ramifications: vec![hint(
                    "Humanitarian",
                    "Severe (Major systemic disruption, international response required)",
                    format!("Relief systems around {} buckle as displacement accelerates.", name),
                    regions,
                )],
                extra: Default::default(),
            });
        }
    }

    fn check_natural_disasters(&self, state: &GlobalState, pending: &mut Vec<GlobalEvent>) {
        for disaster in &state.natural_disasters {
            let magnitude = match num_at(disaster, "/magnitude") {
                Some(m) => m,
                None => continue,
            };
            if magnitude <= self.config.disaster_magnitude_threshold {
                continue;
            }
            let name = str_field(disaster, "disasterName").unwrap_or("Unnamed Disaster");
            let country = disaster
                .pointer("/location/country")
                .and_then(Value::as_str)
                .map(|c| vec![c.to_string()])
                .unwrap_or_default();
            pending.push(GlobalEvent {
                event_id: Default::default(),
                name: format!("Aftermath of {}", name),
                date: state.current_date,
                event_type: EventType::NaturalDisaster,
                description: format!(
                    "{} (magnitude {:.1}) has caused catastrophic damage beyond local response capacity.",
                    name, magnitude
                ),
                event_data: json!({
                    "disasterName": name,
                    "magnitude": magnitude,
                    "location": disaster.get("location").cloned().unwrap_or(Value::Null),
                }),
                participating_nations: resolve_all(state, &country),
                ramifications: vec![hint(
                    "Environmental",
                    "Severe (Major systemic disruption, international response required)",
                    format!("Reconstruction after {} will consume national resources for years.", name),
                    country,
                )],
                extra: Default::default(),
            });
        }
    }

    fn check_political_events(&self, state: &GlobalState, pending: &mut Vec<GlobalEvent>) {
        for record in &state.political_events {
            if str_field(record, "type") != Some("Revolution") {
                continue;
            }
            let long_term = string_list(record, "longTermEffects");
            if long_term.iter().any(|e| e.contains("Ongoing")) {
                continue;
            }
            let name = str_field(record, "eventName").unwrap_or("Unnamed Revolution");
            let country = str_field(record, "country")
                .map(|c| vec![c.to_string()])
                .unwrap_or_default();
            pending.push(GlobalEvent {
                event_id: Default::default(),
                name: format!("Consolidation After {}", name),
                date: state.current_date,
                event_type: EventType::PoliticalEvent,
                description: format!(
                    "The new order emerging from {} begins reshaping institutions and alignments.",
                    name
                ),
                event_data: json!({ "eventName": name, "type": "Revolution" }),
                participating_nations: resolve_all(state, &country),
                ramifications: vec![hint(
                    "Political",
                    "High (Broad-scale impact, multiple sectors affected, long recovery needed)",
                    format!("{} forces a realignment of domestic and foreign policy.", name),
                    country,
                )],
                extra: Default::default(),
            });
        }
    }

    fn check_political_violence(&self, state: &GlobalState, pending: &mut Vec<GlobalEvent>) {
        for incident in &state.political_violence {
            let fatalities = match num_at(incident, "/casualties/fatalities") {
                Some(f) => f,
                None => continue,
            };
            if fatalities <= self.config.violence_fatality_threshold {
                continue;
            }
            let name = str_field(incident, "eventName").unwrap_or("Unnamed Incident");
            let country = str_field(incident, "country")
                .map(|c| vec![c.to_string()])
                .unwrap_or_default();
            pending.push(GlobalEvent {
                event_id: Default::default(),
                name: format!("Fallout From {}", name),
                date: state.current_date,
                event_type: EventType::PoliticalViolence,
                description: format!(
                    "{} killed more than {} people and is destabilizing the government's hold.",
                    name, self.config.violence_fatality_threshold as i64
                ),
                event_data: json!({ "eventName": name, "fatalities": fatalities }),
                participating_nations: resolve_all(state, &country),
                ramifications: vec![hint(
                    "Political",
                    "High (Broad-scale impact, multiple sectors affected, long recovery needed)",
                    format!("Security crackdowns after {} harden the political climate.", name),
                    country,
                )],
                extra: Default::default(),
            });
        }
    }

    fn check_scientific_discoveries(&self, state: &GlobalState, pending: &mut Vec<GlobalEvent>) {
        for discovery in &state.scientific_discoveries {
            if str_field(discovery, "impactLevel") != Some("Revolutionary") {
                continue;
            }
            let name = str_field(discovery, "discoveryName").unwrap_or("Unnamed Discovery");
            let country = str_field(discovery, "country")
                .map(|c| vec![c.to_string()])
                .unwrap_or_default();
            pending.push(GlobalEvent {
                event_id: Default::default(),
                name: format!("Breakthrough: {}", name),
                date: state.current_date,
                event_type: EventType::ScientificDiscovery,
                description: format!(
                    "{} upends existing capabilities and draws immediate strategic attention.",
                    name
                ),
                event_data: json!({ "discoveryName": name, "impactLevel": "Revolutionary" }),
                participating_nations: resolve_all(state, &country),
                ramifications: vec![hint(
                    "Technological",
                    "Transformative (Fundamental change to the existing order)",
                    format!("{} triggers a race to industrialize the new capability.", name),
                    country,
                )],
                extra: Default::default(),
            });
        }
    }
}

/// Belligerent display names from a war record's `belligerents` sides.
fn belligerent_names(war: &Value) -> Vec<String> {
    let mut names = Vec::new();
    for side in ["sideA", "sideB"] {
        if let Some(list) = war.pointer(&format!("/belligerents/{}", side)) {
            match list {
                Value::Array(items) => {
                    names.extend(items.iter().filter_map(Value::as_str).map(String::from));
                }
                Value::String(one) => names.push(one.clone()),
                _ => {}
            }
        }
    }
    names
}

fn string_list(record: &Value, key: &str) -> Vec<String> {
    record
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Resolve freeform references to known nations, dropping unknowns.
fn resolve_all(state: &GlobalState, references: &[String]) -> Vec<NationId> {
    let mut out = Vec::new();
    for reference in references {
        if let Some(id) = state.resolve_nation_id(reference) {
            if !out.contains(&id) {
                out.push(id);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Nation;
    use chrono::NaiveDate;
    use serde_json::Map;

    fn base_state() -> GlobalState {
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

    fn evaluate(state: &GlobalState) -> Vec<GlobalEvent> {
        let config = EngineConfig::default();
        ConditionEvaluator::new(&config).evaluate(state)
    }

    #[test]
    fn test_ongoing_war_above_threshold_escalates() {
        let mut state = base_state();
        state.conflicts.active_wars.push(json!({
            "conflictName": "Border War",
            "status": "Ongoing",
            "casualties": { "military": 15000 },
            "belligerents": { "sideA": ["United States"], "sideB": ["Soviet Union"] }
        }));
        let pending = evaluate(&state);
        assert_eq!(pending.len(), 1);
        let event = &pending[0];
        assert_eq!(event.event_type, EventType::Conflict);
        assert_eq!(event.name, "Escalation in Border War");
        assert_eq!(event.date, state.current_date);
        assert_eq!(event.participating_nations.len(), 2);
        assert_eq!(event.ramifications.len(), 1);
        assert_eq!(event.ramifications[0].category, "Military");
    }

    #[test]
    fn test_resolved_war_does_not_escalate() {
        let mut state = base_state();
        state.conflicts.active_wars.push(json!({
            "conflictName": "Old War",
            "status": "Resolved",
            "casualties": { "military": 500000 }
        }));
        assert!(evaluate(&state).is_empty());
    }

    #[test]
    fn test_malformed_war_record_is_skipped() {
        let mut state = base_state();
        state.conflicts.active_wars.push(json!({
            "conflictName": "Broken Record",
            "status": "Ongoing",
            "casualties": "unknown"
        }));
        assert!(evaluate(&state).is_empty());
    }

    #[test]
    fn test_gdp_collapse_triggers_economic_event() {
        let mut state = base_state();
        if let Some(nation) = state.nations.get_mut("usa") {
            nation
                .extra
                .insert("economicIndicators".into(), json!({ "gdpGrowthRate": -4.2 }));
        }
        let pending = evaluate(&state);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, EventType::EconomicEvent);
        assert_eq!(
            pending[0].participating_nations,
            vec![NationId::from("usa")]
        );
    }

    #[test]
    fn test_mild_contraction_does_not_trigger() {
        let mut state = base_state();
        if let Some(nation) = state.nations.get_mut("usa") {
            nation
                .extra
                .insert("economicIndicators".into(), json!({ "gdpGrowthRate": -1.0 }));
        }
        assert!(evaluate(&state).is_empty());
    }

    #[test]
    fn test_refugee_crisis_needs_scope_and_count() {
        let mut state = base_state();
        state.humanitarian_crises.push(json!({
            "crisisName": "Regional Displacement",
            "severityLevel": "National",
            "refugeeCount": 500000
        }));
        state.humanitarian_crises.push(json!({
            "crisisName": "Continental Exodus",
            "severityLevel": "International",
            "refugeeCount": 250000
        }));
        let pending = evaluate(&state);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, EventType::HumanitarianCrisis);
        assert!(pending[0].name.contains("Continental Exodus"));
    }

    #[test]
    fn test_total_scan_raises_multiple_events() {
        let mut state = base_state();
        state.conflicts.active_wars.push(json!({
            "conflictName": "Border War",
            "status": "Ongoing",
            "casualties": { "military": 20000 }
        }));
        state.natural_disasters.push(json!({
            "disasterName": "Great Quake",
            "magnitude": 8.1,
            "location": { "country": "United States" }
        }));
        state.scientific_discoveries.push(json!({
            "discoveryName": "Fusion Ignition",
            "impactLevel": "Revolutionary",
            "country": "Soviet Union"
        }));
        let pending = evaluate(&state);
        assert_eq!(pending.len(), 3);
        let types: Vec<EventType> = pending.iter().map(|e| e.event_type).collect();
        assert!(types.contains(&EventType::Conflict));
        assert!(types.contains(&EventType::NaturalDisaster));
        assert!(types.contains(&EventType::ScientificDiscovery));
    }

    #[test]
    fn test_ongoing_revolution_is_left_alone() {
        let mut state = base_state();
        state.political_events.push(json!({
            "eventName": "Spring Uprising",
            "type": "Revolution",
            "country": "United States",
            "longTermEffects": ["Ongoing instability"]
        }));
        assert!(evaluate(&state).is_empty());

        state.political_events[0]["longTermEffects"] = json!(["New constitution"]);
        let pending = evaluate(&state);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, EventType::PoliticalEvent);
    }

    #[test]
    fn test_violence_fatality_threshold() {
        let mut state = base_state();
        state.political_violence.push(json!({
            "eventName": "Embassy Bombing",
            "country": "United States",
            "casualties": { "fatalities": 80 }
        }));
        let pending = evaluate(&state);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, EventType::PoliticalViolence);
    }
}
