//! Worldline - Entry Point
//!
//! Sets up the async runtime, loads (or creates) the scenario's world state,
//! and runs the interactive simulation loop: advance steps, inject
//! user-prompted events, jump the clock, or run unattended.

use worldline::core::config::EngineConfig;
use worldline::core::error::{Result, WorldlineError};
use worldline::engine::{EventGenerator, TimeEngine};
use worldline::llm::client::LlmClient;
use worldline::state;

use chrono::NaiveDate;
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(name = "worldline", about = "Alternate-history world simulation engine")]
struct Args {
    /// Scenario year; selects the timeline directory and the starting date
    #[arg(long, default_value_t = 1975)]
    year: i32,

    /// Directory holding per-scenario timeline data
    #[arg(long, default_value = "simulation_data")]
    data_dir: PathBuf,

    /// Run this many steps unattended, save after each, then exit
    #[arg(long)]
    auto: Option<u32>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "worldline=info".into()),
        )
        .init();

    let args = Args::parse();
    tracing::info!(year = args.year, "Worldline starting...");

    let config = EngineConfig::default();
    config.validate().map_err(WorldlineError::ConfigError)?;

    let rt = Runtime::new()?;

    let fallback_date = NaiveDate::from_ymd_opt(args.year, 1, 1)
        .ok_or_else(|| WorldlineError::ConfigError(format!("Invalid year {}", args.year)))?;
    let state_path = state::state_file_path(&args.data_dir, args.year);
    let mut engine = TimeEngine::load(state_path, fallback_date, config.clone())?;

    // Optional: the simulation runs without a client, it just cannot
    // generate events or ramifications.
    let llm_client = LlmClient::from_env().ok();
    if llm_client.is_none() {
        tracing::warn!("LLM_API_KEY not set - running without event or ramification generation");
    }

    if let Some(steps) = args.auto {
        run_auto_steps(&rt, &mut engine, llm_client.as_ref(), steps)?;
        return Ok(());
    }

    println!("\n=== WORLDLINE ===");
    println!("Alternate-history simulation, timeline {}", args.year);
    println!();
    println!("Commands:");
    println!("  next (or Enter)          - Advance the simulation one step");
    println!("  prevent <event type>     - Advance one step, blocking that event type");
    println!("  generate event: <text>   - Inject a user-prompted event (needs LLM)");
    println!("  jump <YYYY-MM-DD>        - Move the clock without simulating");
    println!("  auto <n>                 - Run n steps unattended");
    println!("  quit / exit              - Leave");
    println!();

    loop {
        println!("Current date: {}", engine.current_date());
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        if input == "quit" || input == "exit" {
            break;
        }

        if let Some(request) = input.strip_prefix("generate event:") {
            let request = request.trim();
            if request.is_empty() {
                println!("Usage: generate event: <what should happen>");
                continue;
            }
            match &llm_client {
                Some(client) => {
                    let generator = EventGenerator::new(client, &config);
                    match rt.block_on(generator.generate_event_from_prompt(engine.state(), request))
                    {
                        Ok(event) => {
                            println!(
                                "Queued: {} ({}) - merges on the next step",
                                event.name, event.event_type
                            );
                            engine.queue_event(event);
                        }
                        Err(e) => println!("Could not generate event: {}", e),
                    }
                }
                None => println!("Event generation needs an LLM client (set LLM_API_KEY)."),
            }
            continue;
        }

        if let Some(rest) = input.strip_prefix("jump ") {
            match NaiveDate::parse_from_str(rest.trim(), "%Y-%m-%d") {
                Ok(target) if target > engine.current_date() => {
                    let skipped = engine.jump_to_date(target);
                    if skipped > 0 {
                        println!(
                            "Warning: {} scheduled ramification(s) fall inside the skipped window.",
                            skipped
                        );
                    }
                    println!("Clock moved to {}.", target);
                    engine.save()?;
                }
                Ok(_) => println!("Jump target must be after the current date."),
                Err(_) => println!("Usage: jump <YYYY-MM-DD>"),
            }
            continue;
        }

        if let Some(rest) = input.strip_prefix("auto ") {
            match rest.trim().parse::<u32>() {
                Ok(steps) => run_auto_steps(&rt, &mut engine, llm_client.as_ref(), steps)?,
                Err(_) => println!("Usage: auto <number of steps>"),
            }
            continue;
        }

        // "next", empty input, or a step-time override like "prevent war".
        let override_input = if input == "next" { "" } else { input };
        let summary = rt.block_on(engine.run_step(llm_client.as_ref(), override_input))?;
        println!("{}", summary);
        engine.save()?;
    }

    println!("\nGoodbye! World saved at {}.", engine.current_date());
    Ok(())
}

fn run_auto_steps(
    rt: &Runtime,
    engine: &mut TimeEngine,
    client: Option<&LlmClient>,
    steps: u32,
) -> Result<()> {
    println!("Running {} unattended step(s)...", steps);
    for step in 1..=steps {
        let summary = rt.block_on(engine.run_step(client, ""))?;
        println!("[{}/{}] {}", step, steps, summary);
        engine.save()?;
    }
    Ok(())
}
