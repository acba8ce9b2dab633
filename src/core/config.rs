//! Engine configuration with documented constants
//!
//! All magic numbers are collected here with explanations of their purpose
//! and how they interact with each other.

/// Configuration for the simulation engine
///
/// Threshold values mirror the scale of the seeded world data: casualty and
/// refugee counts are absolute headcounts, gdpGrowthRate is a percentage.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // === TIME ===
    /// Days the simulated clock advances per step
    ///
    /// One step is roughly a month of world time. Ramification
    /// executionTimes are quantized to step boundaries by construction,
    /// so anything scheduled inside a step fires at its end.
    pub days_per_step: i64,

    // === CONDITION THRESHOLDS ===
    /// Military casualty count above which an Ongoing war escalates
    pub conflict_casualty_threshold: f64,

    /// gdpGrowthRate (percent) below which a nation is in economic crisis
    pub gdp_collapse_threshold: f64,

    /// Refugee count above which an International/Global crisis escalates
    pub refugee_threshold: f64,

    /// Richter-style magnitude above which a natural disaster escalates
    pub disaster_magnitude_threshold: f64,

    /// Fatality count above which political violence destabilizes
    pub violence_fatality_threshold: f64,

    // === LLM ===
    /// Attempts per LLM unit of work before giving up on that unit
    ///
    /// Exhausting the budget skips the unit, never the step.
    pub llm_max_attempts: u32,

    /// Fallback backoff between attempts when the provider suggests none
    pub llm_retry_delay_secs: u64,

    /// Wall-clock cap on a single LLM call
    pub llm_call_timeout_secs: u64,

    // === EVENT GENERATION CONTEXT ===
    /// Active conflicts included in a generation context bundle
    pub max_context_conflicts: usize,

    /// Recent relevant events included in a generation context bundle
    pub max_context_events: usize,

    /// Strategic interests included in a generation context bundle
    pub max_context_interests: usize,

    /// Organizations included in a generation context bundle
    pub max_context_organizations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            days_per_step: 30,

            conflict_casualty_threshold: 10_000.0,
            gdp_collapse_threshold: -3.0,
            refugee_threshold: 100_000.0,
            disaster_magnitude_threshold: 7.5,
            violence_fatality_threshold: 50.0,

            llm_max_attempts: 3,
            llm_retry_delay_secs: 5,
            llm_call_timeout_secs: 60,

            max_context_conflicts: 3,
            max_context_events: 3,
            max_context_interests: 3,
            max_context_organizations: 3,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.days_per_step <= 0 {
            return Err(format!(
                "days_per_step ({}) must be positive",
                self.days_per_step
            ));
        }

        if self.llm_max_attempts == 0 {
            return Err("llm_max_attempts must be at least 1".into());
        }

        if self.conflict_casualty_threshold <= 0.0
            || self.refugee_threshold <= 0.0
            || self.disaster_magnitude_threshold <= 0.0
            || self.violence_fatality_threshold <= 0.0
        {
            return Err("Escalation thresholds must be positive".into());
        }

        if self.max_context_conflicts == 0 || self.max_context_events == 0 {
            return Err("Context bundle caps must be at least 1".into());
        }

        Ok(())
    }
}
