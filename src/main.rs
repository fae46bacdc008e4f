//! Headless runner: the external tick source the engine expects. Builds
//! an engine from the CLI flags, ticks it at a fixed interval and dumps
//! JSON snapshots of the read-only surface.

mod cli;
mod logger;

use std::thread;
use std::time::Duration;

use clap::Parser;
use kairos_core::SimulationEngine;

fn main() {
    let args = cli::Cli::parse();
    logger::init(args.verbose);

    let mut engine = SimulationEngine::new(args.to_config());
    engine.start();

    let interval = Duration::from_millis(args.interval_ms.max(cli::MIN_INTERVAL_MS));
    for _ in 0..args.ticks {
        engine.tick();
        if args.snapshot_every != 0 && engine.clock() % args.snapshot_every == 0 {
            print_snapshot(&engine);
        }
        thread::sleep(interval);
    }

    engine.pause();
    print_snapshot(&engine);
}

fn print_snapshot(engine: &SimulationEngine) {
    let snapshot = serde_json::json!({
        "tick": engine.clock(),
        "running": engine.is_running(),
        "processes": engine.active_processes(),
        "cpus": engine.cpus(),
        "storage": engine.storage_overview(),
        "paging": engine.paging_stats(),
        "algorithms": engine.algorithm_stats(),
        "context_switches": engine.context_switches(),
        "modules": engine.module_status(),
        "interrupt_log": engine.interrupt_log(),
        "layer_flow": engine.layer_flow_events(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).expect("snapshot serializes")
    );
}
