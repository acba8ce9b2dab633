//! The alternate-history world state document
//!
//! One JSON document holds the entire simulated world. The five record types
//! the pipeline creates and consumes (`GlobalEvent`, `RamificationHint`,
//! `NationwideImpact`, `Effect`, `Ramification`) are fully typed; the domain
//! collections that only the condition evaluator reads stay as raw
//! `serde_json::Value` blobs so one malformed seeded record degrades to
//! "condition not met" instead of a fatal load error.

pub mod path;

use crate::core::error::{Result, WorldlineError};
use crate::core::types::{
    EffectId, EffectType, EventId, EventType, ImpactId, NationId, Operation, RamificationId,
    RamificationStatus, Severity,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A nation record. Only the fields the pipeline touches are typed; the
/// initializer-generated bulk (government, military, demographics, ...) rides
/// along in `extra` and stays addressable through target paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nation {
    #[serde(default)]
    pub nation_id: NationId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub internal_affairs: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub external_affairs: Value,
    #[serde(default)]
    pub nationwide_impacts: Vec<NationwideImpact>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Nation {
    /// gdpGrowthRate lives under economicIndicators, either at the top level
    /// or nested in internalAffairs depending on the generator vintage.
    pub fn gdp_growth_rate(&self) -> Option<f64> {
        if let Some(rate) = self
            .extra
            .get("economicIndicators")
            .and_then(|e| e.get("gdpGrowthRate"))
            .and_then(Value::as_f64)
        {
            return Some(rate);
        }
        self.internal_affairs
            .get("economicIndicators")
            .and_then(|e| e.get("gdpGrowthRate"))
            .and_then(Value::as_f64)
    }
}

/// Narrative sketch of a consequence, attached to a global event by whichever
/// generator produced it. Hints are refined into typed Effects during
/// consequence synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RamificationHint {
    #[serde(alias = "ramificationType", default)]
    pub category: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default)]
    pub affected_parties: Vec<String>,
}

fn default_timeframe() -> String {
    "Short-Term (2 weeks to 3 months)".to_string()
}

impl RamificationHint {
    pub fn severity_tier(&self) -> Severity {
        Severity::parse_tier(&self.severity)
    }

    pub fn effect_type(&self) -> EffectType {
        EffectType::from_category(&self.category)
    }
}

/// One entry of the append-only global event log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalEvent {
    #[serde(default)]
    pub event_id: EventId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "epoch_date")]
    pub date: NaiveDate,
    #[serde(rename = "eventType", alias = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub event_data: Value,
    #[serde(default)]
    pub participating_nations: Vec<NationId>,
    #[serde(default)]
    pub ramifications: Vec<RamificationHint>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Record that one global event touched one nation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NationwideImpact {
    pub impact_id: ImpactId,
    pub nation_id: NationId,
    pub origin_global_event_id: EventId,
    pub triggered_on: NaiveDate,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub effect_ids: Vec<EffectId>,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// A typed, domain-classified consequence of an impact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Effect {
    pub effect_id: EffectId,
    pub origin_impact_id: ImpactId,
    pub nation_id: NationId,
    pub effect_type: EffectType,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    pub start_date: NaiveDate,
    pub is_active: bool,
    #[serde(default)]
    pub ramification_ids: Vec<RamificationId>,
}

/// A concrete scheduled mutation of the state document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ramification {
    pub ramification_id: RamificationId,
    pub origin_effect_id: EffectId,
    pub nation_id: NationId,
    #[serde(default)]
    pub description: String,
    pub target_path: String,
    pub operation: Operation,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_identifier: Option<Value>,
    pub execution_time: NaiveDate,
    pub status: RamificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl Ramification {
    pub fn is_due(&self, now: NaiveDate) -> bool {
        self.status == RamificationStatus::Pending && self.execution_time <= now
    }

    pub fn mark_executed(&mut self) {
        self.status = RamificationStatus::Executed;
        self.failure_reason = None;
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = RamificationStatus::Failed;
        self.failure_reason = Some(reason.into());
    }
}

/// Conflict sub-collections. The evaluator only escalates activeWars; the
/// rest are seeded flavor that mutations may still target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflicts {
    #[serde(default)]
    pub active_wars: Vec<Value>,
    #[serde(default)]
    pub border_skirmishes: Vec<Value>,
    #[serde(default)]
    pub internal_unrest: Vec<Value>,
    #[serde(default)]
    pub proxy_wars: Vec<Value>,
}

/// The whole world. Required collections carry no serde default, so a
/// document missing one of them fails to load rather than silently healing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalState {
    #[serde(rename = "current_date")]
    pub current_date: NaiveDate,
    #[serde(deserialize_with = "deserialize_nations")]
    pub nations: BTreeMap<String, Nation>,
    pub conflicts: Conflicts,
    pub global_economy: Vec<Value>,
    pub global_events: Vec<GlobalEvent>,
    pub effects: Vec<Effect>,
    pub ramifications: Vec<Ramification>,
    pub humanitarian_crises: Vec<Value>,
    pub natural_disasters: Vec<Value>,
    pub political_events: Vec<Value>,
    pub political_violence: Vec<Value>,
    pub scientific_discoveries: Vec<Value>,
    #[serde(default)]
    pub strategic_interests: Vec<Value>,
    #[serde(default)]
    pub organizations: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Legacy documents store nations as a list; current ones as an id-keyed map.
/// Both normalize to the map form, keyed by nationId with name as fallback.
fn deserialize_nations<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, Nation>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(BTreeMap::new()),
        Value::Object(_) => {
            let mut map: BTreeMap<String, Nation> =
                serde_json::from_value(value).map_err(D::Error::custom)?;
            for (key, nation) in map.iter_mut() {
                if nation.nation_id.as_str().is_empty() {
                    nation.nation_id = NationId::from(key.clone());
                }
            }
            Ok(map)
        }
        Value::Array(items) => {
            let mut map = BTreeMap::new();
            for item in items {
                let mut nation: Nation = serde_json::from_value(item).map_err(D::Error::custom)?;
                if nation.nation_id.as_str().is_empty() {
                    nation.nation_id = NationId::from(nation.name.clone());
                }
                let key = nation.nation_id.to_string();
                if key.is_empty() {
                    return Err(D::Error::custom(
                        "nation record has neither nationId nor name",
                    ));
                }
                map.insert(key, nation);
            }
            Ok(map)
        }
        other => Err(D::Error::custom(format!(
            "nations must be a map or a list, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl GlobalState {
    /// The minimal valid document: all required collections present, empty.
    pub fn empty(current_date: NaiveDate) -> Self {
        Self {
            current_date,
            nations: BTreeMap::new(),
            conflicts: Conflicts::default(),
            global_economy: Vec::new(),
            global_events: Vec::new(),
            effects: Vec::new(),
            ramifications: Vec::new(),
            humanitarian_crises: Vec::new(),
            natural_disasters: Vec::new(),
            political_events: Vec::new(),
            political_violence: Vec::new(),
            scientific_discoveries: Vec::new(),
            strategic_interests: Vec::new(),
            organizations: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn nation(&self, id: &NationId) -> Option<&Nation> {
        self.nations.get(id.as_str())
    }

    pub fn nation_mut(&mut self, id: &NationId) -> Option<&mut Nation> {
        self.nations.get_mut(id.as_str())
    }

    /// Resolve a freeform nation reference (id or display name, any case) to
    /// the document key, or None when the nation is not in this world.
    pub fn resolve_nation_id(&self, reference: &str) -> Option<NationId> {
        let needle = reference.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        for (key, nation) in &self.nations {
            if key.to_lowercase() == needle || nation.name.to_lowercase() == needle {
                return Some(NationId::from(key.clone()));
            }
        }
        None
    }

    pub fn event(&self, id: EventId) -> Option<&GlobalEvent> {
        self.global_events.iter().find(|e| e.event_id == id)
    }

    pub fn effect_mut(&mut self, id: EffectId) -> Option<&mut Effect> {
        self.effects.iter_mut().find(|e| e.effect_id == id)
    }

    pub fn pending_ramifications(&self) -> impl Iterator<Item = &Ramification> {
        self.ramifications
            .iter()
            .filter(|r| r.status == RamificationStatus::Pending)
    }
}

/// `<data-dir>/generated_timeline_<year>/global_state.json`
pub fn state_file_path(data_dir: &Path, year: i32) -> PathBuf {
    data_dir
        .join(format!("generated_timeline_{}", year))
        .join("global_state.json")
}

/// Load the state document, or fall back to the minimal empty document when
/// no file exists yet. A present-but-invalid file is a hard error.
pub fn load_or_default(file: &Path, fallback_date: NaiveDate) -> Result<GlobalState> {
    if !file.exists() {
        warn!(path = %file.display(), "No saved state found, starting from an empty world");
        return Ok(GlobalState::empty(fallback_date));
    }
    let content = std::fs::read_to_string(file)?;
    let state: GlobalState = serde_json::from_str(&content)?;
    info!(
        path = %file.display(),
        date = %state.current_date,
        nations = state.nations.len(),
        "Loaded world state"
    );
    Ok(state)
}

/// Persist the state document, creating the scenario directory if needed.
pub fn save(state: &GlobalState, file: &Path) -> Result<()> {
    if let Some(parent) = file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(state)?;
    std::fs::write(file, content)?;
    info!(path = %file.display(), date = %state.current_date, "Saved world state");
    Ok(())
}

/// Validation helper for the executor: a document round-trips through the
/// typed state or it is structurally broken.
pub fn validate_document(doc: &Value) -> Result<()> {
    serde_json::from_value::<GlobalState>(doc.clone())
        .map(|_| ())
        .map_err(WorldlineError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_empty_state_roundtrip() {
        let state = GlobalState::empty(date(1975, 1, 1));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["current_date"], json!("1975-01-01"));
        assert!(value["globalEvents"].as_array().unwrap().is_empty());
        let back: GlobalState = serde_json::from_value(value).unwrap();
        assert_eq!(back.current_date, state.current_date);
    }

    #[test]
    fn test_missing_required_collection_fails_load() {
        let mut value = serde_json::to_value(GlobalState::empty(date(1975, 1, 1))).unwrap();
        value.as_object_mut().unwrap().remove("politicalEvents");
        assert!(serde_json::from_value::<GlobalState>(value).is_err());
    }

    #[test]
    fn test_legacy_nations_list_normalizes() {
        let mut value = serde_json::to_value(GlobalState::empty(date(1975, 1, 1))).unwrap();
        value["nations"] = json!([
            { "nationId": "usa", "name": "United States" },
            { "name": "Francia" }
        ]);
        let state: GlobalState = serde_json::from_value(value).unwrap();
        assert!(state.nations.contains_key("usa"));
        assert!(state.nations.contains_key("Francia"));
        assert_eq!(state.nations["Francia"].nation_id.as_str(), "Francia");
    }

    #[test]
    fn test_nation_map_backfills_missing_ids() {
        let mut value = serde_json::to_value(GlobalState::empty(date(1975, 1, 1))).unwrap();
        value["nations"] = json!({ "ussr": { "name": "Soviet Union" } });
        let state: GlobalState = serde_json::from_value(value).unwrap();
        assert_eq!(state.nations["ussr"].nation_id.as_str(), "ussr");
    }

    #[test]
    fn test_resolve_nation_by_name_or_id() {
        let mut state = GlobalState::empty(date(1975, 1, 1));
        state.nations.insert(
            "usa".to_string(),
            Nation {
                nation_id: NationId::from("usa"),
                name: "United States".to_string(),
                internal_affairs: Value::Null,
                external_affairs: Value::Null,
                nationwide_impacts: Vec::new(),
                extra: Map::new(),
            },
        );
        assert_eq!(state.resolve_nation_id("USA"), Some(NationId::from("usa")));
        assert_eq!(
            state.resolve_nation_id("united states"),
            Some(NationId::from("usa"))
        );
        assert_eq!(state.resolve_nation_id("Atlantis"), None);
    }

    #[test]
    fn test_event_type_alias_on_load() {
        let value = json!({
            "name": "Border War",
            "type": "war",
            "date": "1975-03-01"
        });
        let event: GlobalEvent = serde_json::from_value(value).unwrap();
        assert_eq!(event.event_type, EventType::Conflict);
    }

    #[test]
    fn test_event_missing_type_fails() {
        let value = json!({ "name": "Mystery", "date": "1975-03-01" });
        assert!(serde_json::from_value::<GlobalEvent>(value).is_err());
    }

    #[test]
    fn test_unknown_nation_fields_survive_roundtrip() {
        let value = json!({
            "nationId": "usa",
            "name": "United States",
            "government": { "type": "Federal Republic" }
        });
        let nation: Nation = serde_json::from_value(value).unwrap();
        let back = serde_json::to_value(&nation).unwrap();
        assert_eq!(back["government"]["type"], json!("Federal Republic"));
    }

    #[test]
    fn test_ramification_due() {
        let ram = Ramification {
            ramification_id: RamificationId::new(),
            origin_effect_id: EffectId::new(),
            nation_id: NationId::from("usa"),
            description: String::new(),
            target_path: "nations.usa.x".to_string(),
            operation: Operation::Set,
            value: json!(1),
            value_identifier: None,
            execution_time: date(1975, 2, 1),
            status: RamificationStatus::Pending,
            failure_reason: None,
        };
        assert!(!ram.is_due(date(1975, 1, 31)));
        assert!(ram.is_due(date(1975, 2, 1)));

        let mut executed = ram.clone();
        executed.mark_executed();
        assert!(!executed.is_due(date(1975, 3, 1)));
    }

    #[test]
    fn test_state_file_path_layout() {
        let path = state_file_path(Path::new("simulation_data"), 1975);
        assert_eq!(
            path,
            Path::new("simulation_data/generated_timeline_1975/global_state.json")
        );
    }

    #[test]
    fn test_severity_hint_helpers() {
        let hint = RamificationHint {
            category: "Military".to_string(),
            severity: "High (Broad-scale impact)".to_string(),
            description: "Escalation".to_string(),
            timeframe: default_timeframe(),
            affected_parties: vec![],
        };
        assert_eq!(hint.severity_tier(), Severity::High);
        assert_eq!(hint.effect_type(), EffectType::MilitaryPostureChange);
    }
}
