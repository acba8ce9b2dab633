//! Worldline - Alternate-History World Simulation Engine

pub mod core;
pub mod engine;
pub mod llm;
pub mod state;
