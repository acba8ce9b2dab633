//! Simulation step sequencing
//!
//! The `TimeEngine` owns the state document, the queue of pending events, and
//! the step order: evaluate conditions, apply the user override, merge,
//! synthesize consequences, execute due ramifications, advance the clock.
//! Persistence happens only after a step completes, so a crash mid-step
//! leaves the last saved document intact.

use crate::core::config::EngineConfig;
use crate::core::error::Result;
use crate::core::types::EventType;
use crate::engine::conditions::ConditionEvaluator;
use crate::engine::consequences::ConsequenceSynthesizer;
use crate::engine::executor::execute_pending_ramifications;
use crate::engine::merge::merge_pending_events;
use crate::llm::Completion;
use crate::state::{self, GlobalEvent, GlobalState};
use chrono::{Duration, NaiveDate};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// What one step did, for display after the step returns.
#[derive(Debug, Default)]
pub struct StepSummary {
    pub date_before: String,
    pub date_after: String,
    pub merged_events: Vec<String>,
    pub impacts: usize,
    pub effects: usize,
    pub ramifications_created: usize,
    pub effects_without_ramifications: usize,
    pub executed: usize,
    pub failed: usize,
}

impl std::fmt::Display for StepSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Step complete: {} -> {}", self.date_before, self.date_after)?;
        if self.merged_events.is_empty() {
            writeln!(f, "  No new events.")?;
        } else {
            writeln!(f, "  Events:")?;
            for line in &self.merged_events {
                writeln!(f, "    {}", line)?;
            }
        }
        writeln!(
            f,
            "  Consequences: {} impacts, {} effects, {} ramifications scheduled",
            self.impacts, self.effects, self.ramifications_created
        )?;
        if self.effects_without_ramifications > 0 {
            writeln!(
                f,
                "  ({} effects produced no ramification)",
                self.effects_without_ramifications
            )?;
        }
        write!(
            f,
            "  Ramifications run: {} executed, {} failed",
            self.executed, self.failed
        )
    }
}

pub struct TimeEngine {
    state: GlobalState,
    pending: Vec<GlobalEvent>,
    config: EngineConfig,
    state_path: Option<PathBuf>,
}

impl TimeEngine {
    /// Load the engine from a scenario's state file, falling back to the
    /// empty document when none exists yet.
    pub fn load(state_path: PathBuf, fallback_date: NaiveDate, config: EngineConfig) -> Result<Self> {
        let state = state::load_or_default(&state_path, fallback_date)?;
        Ok(Self {
            state,
            pending: Vec::new(),
            config,
            state_path: Some(state_path),
        })
    }

    /// In-memory engine, for tests and embedding.
    pub fn from_state(state: GlobalState, config: EngineConfig) -> Self {
        Self {
            state,
            pending: Vec::new(),
            config,
            state_path: None,
        }
    }

    pub fn state(&self) -> &GlobalState {
        &self.state
    }

    pub fn current_date(&self) -> NaiveDate {
        self.state.current_date
    }

    /// Queue a user-generated event for the next step's merge.
    pub fn queue_event(&mut self, event: GlobalEvent) {
        info!(event = %event.event_id, name = %event.name, "Queued pending event");
        self.pending.push(event);
    }

    /// Run one full simulation step. `user_input` is the step-time override
    /// ("prevent war" and friends); pass an empty string for none.
    pub async fn run_step<C: Completion>(
        &mut self,
        client: Option<&C>,
        user_input: &str,
    ) -> Result<StepSummary> {
        let mut summary = StepSummary {
            date_before: self.state.current_date.to_string(),
            ..Default::default()
        };
        debug!(date = %self.state.current_date, "Step started");

        let evaluator = ConditionEvaluator::new(&self.config);
        let raised = evaluator.evaluate(&self.state);
        self.pending.extend(raised);

        if !user_input.trim().is_empty() {
            self.apply_user_override(user_input);
        }

        let outcome = merge_pending_events(&mut self.state, std::mem::take(&mut self.pending));
        summary.merged_events = outcome.summary_lines;

        let synthesizer = ConsequenceSynthesizer::new(client, &self.config);
        let synthesis = synthesizer
            .apply_ramifications(&mut self.state, &outcome.merged_ids)
            .await;
        summary.impacts = synthesis.impacts;
        summary.effects = synthesis.effects;
        summary.ramifications_created = synthesis.ramifications;
        summary.effects_without_ramifications = synthesis.effects_without_ramifications;

        // Due ramifications run before the clock moves, so a mutation
        // scheduled for this step lands in this step.
        let current_date = self.state.current_date;
        let execution = execute_pending_ramifications(&mut self.state, current_date)?;
        summary.executed = execution.executed;
        summary.failed = execution.failed;

        self.advance_time();
        summary.date_after = self.state.current_date.to_string();
        debug!(date = %self.state.current_date, "Step finished");
        Ok(summary)
    }

    /// "prevent <event type>" drops matching events from the pending set
    /// before they merge. Anything else is ignored with a warning.
    fn apply_user_override(&mut self, input: &str) {
        let lowered = input.trim().to_lowercase();
        let Some(label) = lowered.strip_prefix("prevent ") else {
            warn!(input, "Unrecognized override, ignoring");
            return;
        };
        let target = EventType::parse_loose(label);
        if target == EventType::GenericEvent && label.trim() != "generic event" {
            warn!(input, "Override names no known event type, ignoring");
            return;
        }
        let before = self.pending.len();
        self.pending.retain(|event| event.event_type != target);
        info!(
            prevented = before - self.pending.len(),
            event_type = %target,
            "User override applied"
        );
    }

    fn advance_time(&mut self) {
        self.state.current_date = self.state.current_date + Duration::days(self.config.days_per_step);
    }

    /// Jump the clock without running steps. Returns how many pending
    /// ramifications were scheduled inside the skipped window; they stay
    /// pending and fire at the next step.
    pub fn jump_to_date(&mut self, target: NaiveDate) -> usize {
        let current = self.state.current_date;
        let skipped = self
            .state
            .pending_ramifications()
            .filter(|r| r.execution_time > current && r.execution_time <= target)
            .count();
        if skipped > 0 {
            warn!(
                skipped,
                from = %current,
                to = %target,
                "Jump skips over scheduled ramifications; they will run at the next step"
            );
        }
        self.state.current_date = target;
        skipped
    }

    /// Persist the document. A no-op (with a warning) for in-memory engines.
    pub fn save(&self) -> Result<()> {
        match &self.state_path {
            Some(path) => state::save(&self.state, path),
            None => {
                warn!("Engine has no state path, skipping save");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::WorldlineError;
    use crate::core::types::NationId;
    use crate::llm::Completion;
    use crate::state::Nation;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};

    struct NoLlm;

    #[async_trait]
    impl Completion for NoLlm {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Err(WorldlineError::LlmError("not wired in tests".into()))
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn engine_with_war() -> TimeEngine {
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
        state.conflicts.active_wars.push(json!({
            "conflictName": "Border War",
            "status": "Ongoing",
            "casualties": { "military": 20000 },
            "belligerents": { "sideA": ["United States"], "sideB": [] }
        }));
        let mut config = EngineConfig::default();
        config.llm_retry_delay_secs = 0;
        TimeEngine::from_state(state, config)
    }

    #[tokio::test]
    async fn test_step_advances_time_and_clears_pending() {
        let mut engine = engine_with_war();
        let summary = engine.run_step(None::<&NoLlm>, "").await.unwrap();
        assert_eq!(engine.current_date(), date(1975, 1, 31));
        assert_eq!(summary.date_before, "1975-01-01");
        assert_eq!(summary.date_after, "1975-01-31");
        assert!(engine.pending.is_empty());
        assert_eq!(engine.state().global_events.len(), 1);
    }

    #[tokio::test]
    async fn test_prevent_override_filters_pending() {
        let mut engine = engine_with_war();
        let summary = engine.run_step(None::<&NoLlm>, "prevent war").await.unwrap();
        assert!(summary.merged_events.is_empty());
        assert!(engine.state().global_events.is_empty());
        // The clock still advances on an empty step.
        assert_eq!(engine.current_date(), date(1975, 1, 31));
    }

    #[tokio::test]
    async fn test_unknown_override_is_ignored() {
        let mut engine = engine_with_war();
        let summary = engine
            .run_step(None::<&NoLlm>, "prevent nonsense")
            .await
            .unwrap();
        assert_eq!(summary.merged_events.len(), 1);
    }

    #[tokio::test]
    async fn test_degraded_step_creates_effects_without_ramifications() {
        let mut engine = engine_with_war();
        let summary = engine.run_step(None::<&NoLlm>, "").await.unwrap();
        assert_eq!(summary.impacts, 1);
        assert_eq!(summary.effects, 1);
        assert_eq!(summary.ramifications_created, 0);
        assert_eq!(summary.effects_without_ramifications, 1);
    }

    #[tokio::test]
    async fn test_queued_event_merges_next_step() {
        let mut engine = TimeEngine::from_state(
            GlobalState::empty(date(1975, 1, 1)),
            EngineConfig::default(),
        );
        let event: GlobalEvent = serde_json::from_value(json!({
            "name": "Queued Happening",
            "eventType": "Generic Event",
            "date": "1975-01-01"
        }))
        .unwrap();
        engine.queue_event(event);
        let summary = engine.run_step(None::<&NoLlm>, "").await.unwrap();
        assert_eq!(summary.merged_events.len(), 1);
        assert_eq!(engine.state().global_events.len(), 1);
    }

    #[test]
    fn test_jump_counts_skipped_ramifications() {
        let mut engine = engine_with_war();
        let ram = json!({
            "ramificationId": uuid::Uuid::new_v4(),
            "originEffectId": uuid::Uuid::new_v4(),
            "nationId": "usa",
            "targetPath": "nations.usa.x",
            "operation": "set",
            "value": 1,
            "executionTime": "1975-02-15",
            "status": "pending"
        });
        engine.state.ramifications.push(serde_json::from_value(ram).unwrap());
        let skipped = engine.jump_to_date(date(1975, 6, 1));
        assert_eq!(skipped, 1);
        assert_eq!(engine.current_date(), date(1975, 6, 1));
    }

    #[test]
    fn test_summary_display_mentions_events() {
        let summary = StepSummary {
            date_before: "1975-01-01".into(),
            date_after: "1975-01-31".into(),
            merged_events: vec!["1975-01-01: Border War - Conflict".into()],
            impacts: 1,
            effects: 2,
            ramifications_created: 2,
            effects_without_ramifications: 0,
            executed: 1,
            failed: 1,
        };
        let text = summary.to_string();
        assert!(text.contains("Border War"));
        assert!(text.contains("1 executed, 1 failed"));
    }
}
