//! Core type definitions used throughout the codebase

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Unique identifier for global events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for nationwide impacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImpactId(pub Uuid);

impl ImpactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImpactId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectId(pub Uuid);

impl EffectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for ramifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RamificationId(pub Uuid);

impl RamificationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RamificationId {
    fn default() -> Self {
        Self::new()
    }
}

/// Nation identifier as it appears in the state document ("usa", "ussr", ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NationId(pub String);

impl NationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for NationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Category of a global event
///
/// The wire form is the canonical display name ("Economic Event"). Parsing is
/// deliberately loose: generated content uses freeform labels like "war" or
/// "market crash", and every label must land on a known category so type
/// dispatch stays total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Conflict,
    EconomicEvent,
    PoliticalEvent,
    ScientificDiscovery,
    NaturalDisaster,
    HumanitarianCrisis,
    PoliticalViolence,
    GenericEvent,
}

impl EventType {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            EventType::Conflict => "Conflict",
            EventType::EconomicEvent => "Economic Event",
            EventType::PoliticalEvent => "Political Event",
            EventType::ScientificDiscovery => "Scientific Discovery",
            EventType::NaturalDisaster => "Natural Disaster",
            EventType::HumanitarianCrisis => "Humanitarian Crisis",
            EventType::PoliticalViolence => "Political Violence",
            EventType::GenericEvent => "Generic Event",
        }
    }

    /// Map a freeform label onto a category. Unknown labels become
    /// `GenericEvent` rather than an error.
    pub fn parse_loose(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "conflict" | "war" | "military conflict" => EventType::Conflict,
            "economic event" | "economic" | "market crash" | "recession" | "financial boom" => {
                EventType::EconomicEvent
            }
            "political event" | "political" | "revolution" => EventType::PoliticalEvent,
            "scientific discovery" | "scientific" | "technological breakthrough" => {
                EventType::ScientificDiscovery
            }
            "natural disaster" | "disaster" => EventType::NaturalDisaster,
            "humanitarian crisis" | "humanitarian" => EventType::HumanitarianCrisis,
            "political violence" | "assassination" | "terrorist attack" => {
                EventType::PoliticalViolence
            }
            _ => EventType::GenericEvent,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.canonical_name())
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.canonical_name())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(EventType::parse_loose(&label))
    }
}

/// Mutation operator for ramifications
///
/// Unknown operator strings deserialize to `Unsupported`, which the executor
/// always rejects. That keeps an unrecognized operator a per-mutation failure
/// instead of a document load failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Set,
    Add,
    Subtract,
    Multiply,
    Divide,
    RemoveItem,
    UpdateItem,
    #[serde(other)]
    Unsupported,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Set => "set",
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
            Operation::RemoveItem => "remove_item",
            Operation::UpdateItem => "update_item",
            Operation::Unsupported => "unsupported",
        }
    }
}

/// Lifecycle of a ramification. `Executed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RamificationStatus {
    Pending,
    Executed,
    Failed,
}

/// Severity tier of an effect
///
/// Generated content writes tiers with a parenthetical gloss
/// ("Moderate (Significant disruption ...)"); parsing keys off the leading
/// tier word and falls back to `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Minimal,
    Low,
    Moderate,
    High,
    Severe,
    Critical,
    Transformative,
}

impl Severity {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Severity::Minimal => "Minimal",
            Severity::Low => "Low",
            Severity::Moderate => "Moderate",
            Severity::High => "High",
            Severity::Severe => "Severe",
            Severity::Critical => "Critical",
            Severity::Transformative => "Transformative",
        }
    }

    pub fn parse_tier(label: &str) -> Self {
        let head = label
            .trim()
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or("")
            .to_lowercase();
        match head.as_str() {
            "minimal" => Severity::Minimal,
            "low" => Severity::Low,
            "moderate" => Severity::Moderate,
            "high" => Severity::High,
            "severe" => Severity::Severe,
            "critical" => Severity::Critical,
            "transformative" | "unprecedented" => Severity::Transformative,
            _ => Severity::Low,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.canonical_name())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.canonical_name())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Severity::parse_tier(&label))
    }
}

/// Domain of an effect, derived from a ramification hint's category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectType {
    EconomicDisruption,
    MilitaryPostureChange,
    PoliticalRealignment,
    SocialUnrest,
    EnvironmentalDegradation,
    TechnologicalShift,
    DiplomaticShift,
    HumanitarianStrain,
    Other,
}

impl EffectType {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            EffectType::EconomicDisruption => "Economic Disruption",
            EffectType::MilitaryPostureChange => "Military Posture Change",
            EffectType::PoliticalRealignment => "Political Realignment",
            EffectType::SocialUnrest => "Social Unrest",
            EffectType::EnvironmentalDegradation => "Environmental Degradation",
            EffectType::TechnologicalShift => "Technological Shift",
            EffectType::DiplomaticShift => "Diplomatic Shift",
            EffectType::HumanitarianStrain => "Humanitarian Strain",
            EffectType::Other => "Other",
        }
    }

    /// Map a hint category ("Military", "Socio-Economic", ...) onto a domain.
    pub fn from_category(category: &str) -> Self {
        let lower = category.to_lowercase();
        if lower.contains("milit") {
            EffectType::MilitaryPostureChange
        } else if lower.contains("econom") {
            EffectType::EconomicDisruption
        } else if lower.contains("diplom") {
            EffectType::DiplomaticShift
        } else if lower.contains("polit") {
            EffectType::PoliticalRealignment
        } else if lower.contains("social") {
            EffectType::SocialUnrest
        } else if lower.contains("environment") {
            EffectType::EnvironmentalDegradation
        } else if lower.contains("tech") || lower.contains("scien") {
            EffectType::TechnologicalShift
        } else if lower.contains("humanitarian") || lower.contains("health") {
            EffectType::HumanitarianStrain
        } else {
            EffectType::Other
        }
    }
}

impl std::fmt::Display for EffectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.canonical_name())
    }
}

impl Serialize for EffectType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.canonical_name())
    }
}

impl<'de> Deserialize<'de> for EffectType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(EffectType::from_category(&label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_loose_parsing() {
        assert_eq!(EventType::parse_loose("war"), EventType::Conflict);
        assert_eq!(EventType::parse_loose("Conflict"), EventType::Conflict);
        assert_eq!(EventType::parse_loose("Market Crash"), EventType::EconomicEvent);
        assert_eq!(EventType::parse_loose("assassination"), EventType::PoliticalViolence);
        assert_eq!(EventType::parse_loose("weird label"), EventType::GenericEvent);
    }

    #[test]
    fn test_event_type_roundtrip() {
        let json = serde_json::to_string(&EventType::EconomicEvent).unwrap();
        assert_eq!(json, "\"Economic Event\"");
        let back: EventType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EventType::EconomicEvent);
    }

    #[test]
    fn test_operation_unknown_becomes_unsupported() {
        let op: Operation = serde_json::from_str("\"append\"").unwrap();
        assert_eq!(op, Operation::Unsupported);
        let op: Operation = serde_json::from_str("\"remove_item\"").unwrap();
        assert_eq!(op, Operation::RemoveItem);
    }

    #[test]
    fn test_severity_tier_prefix() {
        assert_eq!(
            Severity::parse_tier("Moderate (Significant disruption, focused sectors)"),
            Severity::Moderate
        );
        assert_eq!(Severity::parse_tier("Unprecedented"), Severity::Transformative);
        assert_eq!(Severity::parse_tier("???"), Severity::Low);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Moderate);
        assert!(Severity::Minimal < Severity::Low);
    }

    #[test]
    fn test_effect_type_from_category() {
        assert_eq!(EffectType::from_category("Military"), EffectType::MilitaryPostureChange);
        assert_eq!(EffectType::from_category("Socio-Economic"), EffectType::EconomicDisruption);
        assert_eq!(EffectType::from_category("unknown"), EffectType::Other);
    }
}
