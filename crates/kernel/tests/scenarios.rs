//! End-to-end scheduling and memory scenarios driven through the public
//! engine API. Auto-spawn and stochastic interrupts are switched off so
//! every timing is exact.

use kairos_core::process::ProcessState;
use kairos_core::{FitStrategy, SchedulerKind, SimulationConfig, SimulationEngine};

fn scenario_config(scheduler: SchedulerKind) -> SimulationConfig {
    SimulationConfig {
        scheduler,
        num_cpus: 1,
        threads_per_cpu: 1,
        num_memory_units: 1,
        memory_unit_capacity_mb: 256,
        fit_strategy: FitStrategy::FirstFit,
        auto_create_processes: false,
        io_probability: 0.0,
        syscall_probability: 0.0,
        page_fault_probability: 0.0,
        // keep finished PCBs visible for the assertions below
        cleanup_delay: 1000,
        ..SimulationConfig::default()
    }
}

fn finish_tick(engine: &SimulationEngine, pid: u32) -> Option<u64> {
    engine
        .all_processes()
        .into_iter()
        .find(|p| p.pid == pid)
        .and_then(|p| p.finish_tick)
}

fn waiting_ticks(engine: &SimulationEngine, pid: u32) -> u64 {
    engine
        .all_processes()
        .into_iter()
        .find(|p| p.pid == pid)
        .map(|p| p.waiting_ticks)
        .unwrap_or_default()
}

#[test]
fn fcfs_runs_to_completion_in_arrival_order() {
    let mut engine = SimulationEngine::new(scenario_config(SchedulerKind::Fcfs));
    let p1 = engine.manual_create_process(8, 10, Some(5));
    engine.tick();
    let p2 = engine.manual_create_process(8, 5, Some(5));

    for _ in 0..20 {
        engine.tick();
    }

    // P1: NEW until tick 2, dispatched at 2, executes ticks 3..=12
    assert_eq!(finish_tick(&engine, p1), Some(12));
    // P2: READY at tick 3, dispatched when P1 finishes, executes 13..=17
    assert_eq!(finish_tick(&engine, p2), Some(17));
    assert_eq!(waiting_ticks(&engine, p1), 0);
    assert_eq!(waiting_ticks(&engine, p2), 9);
    // one switch: P1 -> P2
    assert_eq!(engine.context_switches(), 1);
}

#[test]
fn srtf_preempts_for_the_shorter_job() {
    let mut engine = SimulationEngine::new(scenario_config(SchedulerKind::Srtf));
    let p1 = engine.manual_create_process(4, 20, Some(5));
    for _ in 0..5 {
        engine.tick();
    }
    let p2 = engine.manual_create_process(4, 5, Some(5));

    // P2 becomes READY at tick 7 with 5 ticks against P1's 15 remaining
    for _ in 0..2 {
        engine.tick();
    }
    assert_eq!(engine.clock(), 7);
    let running = engine
        .all_processes()
        .into_iter()
        .find(|p| p.state == ProcessState::Running)
        .unwrap();
    assert_eq!(running.pid, p2);

    for _ in 0..20 {
        engine.tick();
    }
    assert_eq!(finish_tick(&engine, p2), Some(12));
    assert_eq!(finish_tick(&engine, p1), Some(27));
}

#[test]
fn round_robin_quantum_produces_five_context_switches() {
    let mut engine = SimulationEngine::new(SimulationConfig {
        quantum: 4,
        ..scenario_config(SchedulerKind::RoundRobin)
    });
    let p1 = engine.manual_create_process(8, 10, Some(5));
    let p2 = engine.manual_create_process(8, 10, Some(5));

    for _ in 0..22 {
        engine.tick();
    }

    assert_eq!(finish_tick(&engine, p1), Some(20));
    assert_eq!(finish_tick(&engine, p2), Some(22));
    // P1 P2 P1 P2 P1 P2: five transitions between distinct processes
    assert_eq!(engine.context_switches(), 5);

    let preemptions = engine
        .interrupt_log()
        .iter()
        .filter(|line| line.contains("quantum expired"))
        .count();
    assert_eq!(preemptions, 4);
}

#[test]
fn quantum_bound_holds_under_round_robin() {
    let mut engine = SimulationEngine::new(SimulationConfig {
        quantum: 3,
        ..scenario_config(SchedulerKind::RoundRobin)
    });
    engine.manual_create_process(8, 30, Some(5));
    engine.manual_create_process(8, 30, Some(5));

    let mut consecutive = 0u32;
    let mut last_running = None;
    for _ in 0..80 {
        engine.tick();
        let running = engine
            .all_processes()
            .into_iter()
            .find(|p| p.state == ProcessState::Running)
            .map(|p| p.pid);
        if running.is_some() && running == last_running {
            consecutive += 1;
        } else {
            consecutive = running.map(|_| 1).unwrap_or(0);
        }
        last_running = running;
        assert!(consecutive <= 3, "a process outran its quantum");
    }
}

#[test]
fn priority_scheduler_never_starves_the_boundary_invariant() {
    let mut engine = SimulationEngine::new(scenario_config(SchedulerKind::Priority));
    engine.manual_create_process(8, 40, Some(7));
    engine.manual_create_process(8, 40, Some(3));
    engine.manual_create_process(8, 40, Some(5));

    for _ in 0..60 {
        engine.tick();
        let snapshot = engine.all_processes();
        let running_priority = snapshot
            .iter()
            .find(|p| p.state == ProcessState::Running)
            .map(|p| p.priority);
        let best_ready = snapshot
            .iter()
            .filter(|p| p.state == ProcessState::Ready)
            .map(|p| p.priority)
            .min();
        if let (Some(running), Some(ready)) = (running_priority, best_ready) {
            assert!(
                running <= ready,
                "a priority-{running} process runs while priority-{ready} waits"
            );
        }
    }
}

#[test]
fn priority_aging_lifts_a_starved_process() {
    let mut engine = SimulationEngine::new(scenario_config(SchedulerKind::Priority));
    // the hog owns the CPU, the victim waits at the worst priority
    engine.manual_create_process(8, 200, Some(0));
    let victim = engine.manual_create_process(8, 50, Some(9));

    for _ in 0..30 {
        engine.tick();
    }

    // waiting passed 20 ticks before the tick-30 aging boundary
    let info = engine
        .all_processes()
        .into_iter()
        .find(|p| p.pid == victim)
        .unwrap();
    assert!(info.waiting_ticks > 20);
    assert_eq!(info.priority, 8);
}

#[test]
fn paged_fifo_scenario_from_the_allocation_counters() {
    use kairos_core::memory::{PagedMemoryManager, ReplacementPolicy};

    // 4 frames of 4 MiB; a 20 MiB process spans 5 pages
    let mut paged = PagedMemoryManager::new(16, 4, ReplacementPolicy::Fifo);
    let outcome = paged.allocate(1, 20, 1);

    assert!(outcome.success);
    assert_eq!(outcome.pages_allocated, 5);
    assert_eq!(outcome.page_faults, 1);
    assert!((paged.page_fault_rate() - 1.0 / 5.0).abs() < 1e-9);

    // the FIFO head held logical page 0; it now hosts page 4
    let frames = paged.snapshot_frames();
    assert_eq!(frames[0].page_number, Some(4));
    let table = paged.page_table(1).unwrap();
    assert!(!table[0].valid);
}

#[test]
fn memory_units_stay_covered_through_a_noisy_run() {
    let mut engine = SimulationEngine::new(SimulationConfig {
        seed: 19,
        num_cpus: 2,
        num_memory_units: 2,
        memory_unit_capacity_mb: 128,
        ..SimulationConfig::default()
    });

    for _ in 0..150 {
        engine.tick();
        for summary in engine.memory_unit_summaries() {
            let blocks = &summary.blocks;
            assert_eq!(blocks.first().unwrap().start, 0);
            assert_eq!(blocks.last().unwrap().end, summary.capacity_mb);
            for pair in blocks.windows(2) {
                assert_eq!(pair[0].end, pair[1].start, "gap or overlap in unit {}", summary.id);
                assert!(
                    !(pair[0].owner.is_none() && pair[1].owner.is_none()),
                    "unmerged free neighbours in unit {}",
                    summary.id
                );
            }
        }
    }
}

#[test]
fn interrupt_decisions_replay_identically() {
    let config = SimulationConfig {
        seed: 23,
        ..SimulationConfig::default()
    };
    let mut left = SimulationEngine::new(config.clone());
    let mut right = SimulationEngine::new(config);

    for _ in 0..100 {
        left.tick();
        right.tick();
    }

    let interruptions = |log: Vec<String>| -> Vec<String> {
        log.into_iter()
            .filter(|line| line.contains("interrupted"))
            .collect()
    };
    let left_lines = interruptions(left.interrupt_log());
    assert_eq!(left_lines, interruptions(right.interrupt_log()));
    assert!(!left_lines.is_empty(), "a 100-tick default run should interrupt something");
}

#[test]
fn waiting_processes_come_back_and_finish() {
    // lean on the deterministic stochastic draws: with default
    // probabilities some process will block on I/O and must return
    let mut engine = SimulationEngine::new(SimulationConfig {
        seed: 2,
        ..SimulationConfig::default()
    });

    let mut saw_waiting = false;
    for _ in 0..200 {
        engine.tick();
        if engine
            .all_processes()
            .iter()
            .any(|p| p.state == ProcessState::Waiting)
        {
            saw_waiting = true;
        }
    }
    assert!(saw_waiting, "no process ever blocked in 200 default ticks");
    assert!(
        engine.metrics().completed_processes > 0,
        "nothing ran to completion in 200 ticks"
    );
    assert!(engine
        .interrupt_log()
        .iter()
        .any(|line| line.contains("returning to READY")));
}

#[test]
fn logs_stay_within_their_documented_caps() {
    let mut engine = SimulationEngine::new(SimulationConfig {
        seed: 13,
        ..SimulationConfig::default()
    });
    for _ in 0..400 {
        engine.tick();
    }
    assert!(engine.interrupt_log().len() <= 200);
    assert!(engine.layer_flow_events().len() <= 50);
    // a busy default run certainly fills the interrupt ring
    assert_eq!(engine.interrupt_log().len(), 200);
}
