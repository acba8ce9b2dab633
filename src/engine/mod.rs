//! The simulation engine
//!
//! A step runs the pipeline in fixed order: evaluate conditions over the
//! whole document, apply the user's override to the pending set, merge
//! pending events into the log and their domain collections, synthesize
//! consequences (impacts, effects, ramifications), execute due ramifications,
//! then advance the clock.

pub mod conditions;
pub mod consequences;
pub mod executor;
pub mod merge;
pub mod prompt_event;
pub mod step;

pub use conditions::ConditionEvaluator;
pub use consequences::ConsequenceSynthesizer;
pub use executor::execute_pending_ramifications;
pub use prompt_event::EventGenerator;
pub use step::TimeEngine;
