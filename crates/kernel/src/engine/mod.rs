//! The simulation engine: one logical clock, and per tick one linear,
//! externally-atomic pass over every subsystem.
//!
//! The engine owns all state. CPUs and schedulers work with pids; memory
//! managers with (pid, size) pairs; interrupt handlers hand back effects.
//! Snapshots are only taken between ticks, so observers never see a
//! half-applied transition.

mod stochastic;
#[cfg(test)]
mod tests;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::arch::Architecture;
use crate::config::SimulationConfig;
use crate::cpu::{Cpu, CpuInfo};
use crate::interrupts::{
    HandlerChain, HandlerEffect, Interrupt, InterruptController, InterruptKind,
};
use crate::logs::{EventLog, INTERRUPT_LOG_CAP, LAYER_FLOW_LOG_CAP};
use crate::memory::{
    FitStrategy, MemoryUnit, MemoryUnitSummary, ReplacementPolicy, StorageOverview,
    UnitPagingStats, DEFAULT_PAGE_SIZE_MB,
};
use crate::metrics::{AlgorithmStats, SimulationMetrics};
use crate::modules::{KernelModule, ModuleRegistry};
use crate::process::{Pid, Process, ProcessInfo, ProcessState, ProcessTable, Tick};
use crate::scheduler::{Scheduler, SchedulerKind};

/// Chance per tick that the engine spawns a process on its own.
const SPAWN_PROBABILITY: f64 = 0.30;
/// Chance per tick of a global timer interrupt.
const TIMER_PROBABILITY: f64 = 0.02;
/// Chance per running CPU of a simulated page access.
const PAGE_ACCESS_PROBABILITY: f64 = 0.10;
/// Chance per loaded device module of a reported operation.
const MODULE_ACTIVITY_PROBABILITY: f64 = 0.03;

const SPAWN_SIZE_RANGE: core::ops::RangeInclusive<u64> = 4..=64;
const SPAWN_MIN_DURATION: u64 = 20;

pub struct SimulationEngine {
    config: SimulationConfig,
    clock: Tick,
    next_pid: Pid,
    processes: ProcessTable,
    cpus: Vec<Cpu>,
    /// one scheduler per CPU, same index
    schedulers: Vec<Scheduler>,
    units: Vec<MemoryUnit>,
    controller: InterruptController,
    handlers: HandlerChain,
    architecture: Architecture,
    modules: ModuleRegistry,
    metrics: SimulationMetrics,
    interrupt_log: EventLog<INTERRUPT_LOG_CAP>,
    layer_flow_log: EventLog<LAYER_FLOW_LOG_CAP>,
    rng: StdRng,
    is_running: bool,
}

impl SimulationEngine {
    pub fn new(config: SimulationConfig) -> Self {
        let config = config.sanitized();
        let cpus = (0..config.num_cpus)
            .map(|id| Cpu::new(id, config.threads_per_cpu))
            .collect();
        let schedulers = (0..config.num_cpus)
            .map(|_| Scheduler::new(config.scheduler, config.aging_interval))
            .collect();
        let units = (0..config.num_memory_units)
            .map(|id| {
                MemoryUnit::new(
                    id,
                    config.memory_unit_capacity_mb,
                    config.fit_strategy,
                    config.replacement_policy,
                )
            })
            .collect();
        let architecture = Architecture::from_name(&config.architecture);
        let rng = StdRng::seed_from_u64(config.seed);

        log::info!(
            target: "engine",
            "engine up: {} CPUs x{} threads, {} memory unit(s) of {} MiB, {} scheduling, {} architecture",
            config.num_cpus,
            config.threads_per_cpu,
            config.num_memory_units,
            config.memory_unit_capacity_mb,
            config.scheduler.name(),
            architecture.name()
        );

        Self {
            config,
            clock: 0,
            next_pid: 1,
            processes: ProcessTable::new(),
            cpus,
            schedulers,
            units,
            controller: InterruptController::new(),
            handlers: HandlerChain::with_default_handlers(),
            architecture,
            modules: ModuleRegistry::with_default_modules(),
            metrics: SimulationMetrics::new(),
            interrupt_log: EventLog::new(),
            layer_flow_log: EventLog::new(),
            rng,
            is_running: false,
        }
    }

    // ------------------------------------------------------------------
    // tick protocol
    // ------------------------------------------------------------------

    /// Advances the simulation by one tick. Not reentrant; the external
    /// tick source is expected to call this from a single place.
    pub fn tick(&mut self) {
        self.clock += 1;

        self.update_dynamic_modules();

        if self.config.auto_create_processes && self.rng.gen_range(0.0..1.0) < SPAWN_PROBABILITY {
            self.spawn_random_process();
        }

        let now = self.clock;
        for unit in &mut self.units {
            unit.tick(now);
        }

        if self.rng.gen_range(0.0..1.0) < TIMER_PROBABILITY {
            self.controller
                .raise(Interrupt::new(InterruptKind::Timer, "timer", None));
        }

        self.update_processes();
        self.simulate_page_accesses();
    }

    fn update_processes(&mut self) {
        self.cleanup_terminated();
        self.promote_new();
        self.update_waiting();
        for scheduler in &mut self.schedulers {
            scheduler.on_tick(&mut self.processes, self.clock);
        }
        self.run_cpus();
        self.drain_interrupts();
        self.dispatch_idle_cpus();
        self.account_waiting();
    }

    /// Drops terminated processes that have lingered past the cleanup
    /// delay.
    fn cleanup_terminated(&mut self) {
        let delay = self.config.cleanup_delay;
        for pid in self.processes.pids_sorted() {
            let Some(process) = self.processes.get(pid) else {
                continue;
            };
            if !process.state.is_terminated() {
                continue;
            }
            let finished = process.finish_tick.unwrap_or(process.arrival_tick);
            if self.clock.saturating_sub(finished) < delay {
                continue;
            }
            let name = process.name.clone();
            self.processes.remove(pid);
            for scheduler in &mut self.schedulers {
                scheduler.forget(pid);
            }
            self.log_interrupt(format!("process {name} (PID {pid}) removed from the terminated queue"));
        }
    }

    /// NEW -> READY once the configured delay has passed, onto the least
    /// loaded scheduler.
    fn promote_new(&mut self) {
        let delay = self.config.new_delay;
        for pid in self.processes.pids_sorted() {
            let Some(process) = self.processes.get(pid) else {
                continue;
            };
            if process.state != ProcessState::New || process.arrival_tick + delay > self.clock {
                continue;
            }
            let name = process.name.clone();
            let target = self.least_loaded_scheduler();
            self.schedulers[target].add_process(pid, &mut self.processes);
            self.log_interrupt(format!("process {name} (PID {pid}) moved from NEW to READY"));
            log::debug!(target: "scheduler", "process {pid} queued on scheduler {target}");
        }
    }

    /// Counts down I/O waits; finished waiters go back to READY.
    fn update_waiting(&mut self) {
        for pid in self.processes.pids_sorted() {
            let Some(process) = self.processes.get_mut(pid) else {
                continue;
            };
            if process.state != ProcessState::Waiting {
                continue;
            }
            process.io_remaining_ticks = process.io_remaining_ticks.saturating_sub(1);
            if process.io_remaining_ticks > 0 {
                continue;
            }
            let reason = process.interrupt_reason.take().unwrap_or_else(|| "WAIT".into());
            let name = process.name.clone();
            let target = self.least_loaded_scheduler();
            self.schedulers[target].add_process(pid, &mut self.processes);
            self.log_interrupt(format!("process {name} {reason} completed, returning to READY"));
        }
    }

    fn run_cpus(&mut self) {
        let quantum = self.config.quantum;
        for i in 0..self.cpus.len() {
            let Some(pid) = self.cpus[i].process else {
                continue;
            };
            if self.processes.get(pid).is_none_or(|p| p.state.is_terminated()) {
                self.cpus[i].release(&mut self.processes);
                continue;
            }

            // a stochastic interrupt steals the whole tick: the handler
            // chain decides the transition when the controller drains
            if let Some(interrupt) = self.evaluate_stochastic(pid) {
                let kind = interrupt.kind;
                self.controller.raise(interrupt);
                let name = self.processes.get(pid).map(|p| p.name.clone()).unwrap_or_default();
                self.log_interrupt(format!("process {name} interrupted ({})", kind.name()));
                continue;
            }

            let finished = self.cpus[i].tick(&mut self.processes, self.clock);
            self.metrics.cpu_busy_ticks += 1;
            if finished {
                self.release_process(pid);
                self.cpus[i].release(&mut self.processes);
                continue;
            }

            match self.schedulers[i].kind() {
                kind if kind.is_quantum_driven() => {
                    let expired = {
                        let process = self.processes.get_mut(pid).expect("running process exists");
                        process.quantum_used += 1;
                        process.quantum_used >= quantum
                    };
                    if expired {
                        let name = self.processes.get(pid).map(|p| p.name.clone()).unwrap_or_default();
                        self.cpus[i].release(&mut self.processes);
                        self.schedulers[i].add_process(pid, &mut self.processes);
                        if let Some(process) = self.processes.get_mut(pid) {
                            process.quantum_used = 0;
                        }
                        self.log_interrupt(format!("process {name} preempted (quantum expired)"));
                    }
                }
                SchedulerKind::Srtf => {
                    let next = self.schedulers[i].next_process(Some(pid), &mut self.processes, self.clock);
                    if let Some(next) = next
                        && next != pid
                    {
                        self.cpus[i].release(&mut self.processes);
                        if let Some(process) = self.processes.get_mut(pid) {
                            process.quantum_used = 0;
                        }
                        self.cpus[i].assign(next, &mut self.processes);
                        if let Some(process) = self.processes.get_mut(next) {
                            if process.start_tick.is_none() {
                                process.start_tick = Some(self.clock);
                            }
                        }
                        self.log_interrupt(format!(
                            "process PID {pid} preempted by shorter job PID {next}"
                        ));
                    }
                }
                kind if kind.preempts_on_priority() => {
                    let current_priority =
                        self.processes.get(pid).map(|p| p.priority).unwrap_or(u8::MAX);
                    let better_waiting = self.schedulers[i]
                        .best_ready_priority(&self.processes)
                        .is_some_and(|best| best < current_priority);
                    if better_waiting {
                        let name = self.processes.get(pid).map(|p| p.name.clone()).unwrap_or_default();
                        self.cpus[i].release(&mut self.processes);
                        self.schedulers[i].add_process(pid, &mut self.processes);
                        if let Some(process) = self.processes.get_mut(pid) {
                            process.quantum_used = 0;
                        }
                        self.log_interrupt(format!("process {name} preempted (higher priority process ready)"));
                    }
                }
                _ => {}
            }
        }
    }

    /// Empties the controller through the architecture adapter and the
    /// handler chain. Everything raised earlier in this tick is serviced
    /// before the tick ends.
    fn drain_interrupts(&mut self) {
        let defaults = self.config.interrupt_defaults();
        while let Some(mut interrupt) = self.controller.fetch_next() {
            if let Some(note) = self.architecture.adjust(&mut interrupt, &defaults) {
                self.log_interrupt(note.log);
                if let Some((source, target, action)) = note.flow {
                    self.log_flow(&source, &target, &action);
                }
            }

            match self.handlers.handle(&interrupt, &defaults) {
                HandlerEffect::Wait { pid, reason, duration } => {
                    self.set_waiting(pid, reason, duration);
                }
                HandlerEffect::Preempt { pid, reason, requeue } => {
                    self.preempt(pid, reason, requeue);
                }
                HandlerEffect::Global { message } => self.log_interrupt(message),
                HandlerEffect::Dropped => {
                    log::warn!(target: "interrupts", "dropped unhandled {} interrupt", interrupt.kind.name());
                }
            }
        }
    }

    fn dispatch_idle_cpus(&mut self) {
        for i in 0..self.cpus.len() {
            if !self.cpus[i].is_idle() {
                continue;
            }
            let Some(pid) = self.schedulers[i].next_process(None, &mut self.processes, self.clock)
            else {
                continue;
            };
            self.cpus[i].assign(pid, &mut self.processes);
            let process = self.processes.get_mut(pid).expect("dispatched process exists");
            if process.start_tick.is_none() {
                process.start_tick = Some(self.clock);
            }
            let name = process.name.clone();
            self.log_interrupt(format!("process {name} assigned to CPU {i}"));
        }
    }

    fn account_waiting(&mut self) {
        for pid in self.processes.pids_sorted() {
            if let Some(process) = self.processes.get_mut(pid)
                && process.state == ProcessState::Ready
            {
                process.waiting_ticks += 1;
            }
        }
    }

    /// Sparse page traffic so the paging statistics move: each running
    /// CPU touches a random valid page of its process.
    fn simulate_page_accesses(&mut self) {
        for i in 0..self.cpus.len() {
            let Some(pid) = self.cpus[i].process else {
                continue;
            };
            if self.rng.gen_range(0.0..1.0) >= PAGE_ACCESS_PROBABILITY {
                continue;
            }
            let Some(process) = self.processes.get(pid) else {
                continue;
            };
            let Some(unit) = process.memory_unit_id else {
                continue;
            };
            let pages = process.pages(DEFAULT_PAGE_SIZE_MB).max(1);
            let page = self.rng.gen_range(0..pages);
            self.units[unit].paged.access_page(pid, page, self.clock);
        }
    }

    /// First stochastic source that fires wins: syscall, then I/O, then
    /// page fault. The draw only depends on (pid, tick, salt), never on
    /// the engine RNG.
    fn evaluate_stochastic(&self, pid: Pid) -> Option<Interrupt> {
        let process = self.processes.get(pid)?;
        let draws = [
            (
                stochastic::SALT_SYSCALL,
                process.syscall_probability,
                InterruptKind::Syscall,
                self.config.syscall_duration,
            ),
            (
                stochastic::SALT_IO,
                process.io_probability,
                InterruptKind::Io,
                self.config.io_duration,
            ),
            (
                stochastic::SALT_PAGE_FAULT,
                process.page_fault_probability,
                InterruptKind::PageFault,
                self.config.page_fault_duration,
            ),
        ];

        for (salt, probability, kind, base) in draws {
            if stochastic::chance(pid, self.clock, salt) < probability {
                let duration =
                    stochastic::duration_between(pid, salt, base, base + stochastic::DURATION_SPREAD);
                return Some(Interrupt::new(kind, "stochastic", Some(pid)).with_duration(duration));
            }
        }
        None
    }

    fn update_dynamic_modules(&mut self) {
        if !self.architecture.is_modular() {
            return;
        }
        for name in self.modules.device_modules() {
            if self.rng.gen_range(0.0..1.0) < MODULE_ACTIVITY_PROBABILITY {
                self.log_interrupt(format!("module {name}: operation completed"));
                self.log_flow(&name, "Kernel Base", "reports operation completed");
            }
        }
    }

    // ------------------------------------------------------------------
    // process lifecycle
    // ------------------------------------------------------------------

    fn spawn_random_process(&mut self) {
        let size = self.rng.gen_range(SPAWN_SIZE_RANGE);
        let duration = self
            .rng
            .gen_range(SPAWN_MIN_DURATION..=self.config.max_process_duration);
        self.create_process(size, duration, None, true);
    }

    fn create_process(&mut self, size_mb: u64, duration: u64, priority: Option<u8>, auto: bool) -> Pid {
        let pid = self.next_pid;
        self.next_pid += 1;
        let name = format!("P{pid}");
        let priority = match priority {
            Some(value) => value.min(9),
            None => self.auto_priority(size_mb, duration),
        };

        let mut process = Process::new(pid, name.clone(), size_mb, duration, priority, self.clock);
        process.io_probability = self.config.io_probability;
        process.syscall_probability = self.config.syscall_probability;
        process.page_fault_probability = self.config.page_fault_probability;
        self.metrics.total_processes += 1;

        // fullest-last: try the unit with the most contiguous room first
        let mut order: Vec<usize> = (0..self.units.len()).collect();
        order.sort_by_key(|&i| (core::cmp::Reverse(self.units[i].contiguous.free_mb()), i));

        let mut placed = None;
        for i in order {
            let outcome = self.units[i].allocate(pid, size_mb, self.clock);
            self.metrics.record_allocation(&outcome);
            if outcome.success {
                placed = Some(i);
                break;
            }
        }

        match placed {
            Some(unit) => {
                process.memory_unit_id = Some(unit);
                self.processes.insert(process);
                let how = if auto { "created automatically" } else { "created" };
                let arch = self.architecture.name().to_uppercase();
                self.log_interrupt(format!(
                    "[{arch}] process {name} {how} on memory unit {unit} (priority {priority})"
                ));
                self.log_flow("Kernel Base", "Core Process Manager", &format!("register process {name}"));
                log::debug!(
                    target: "process",
                    "process {pid} ({name}) CREATED, {size_mb} MiB, {duration} ticks, priority {priority}"
                );
            }
            None => {
                // rejected at birth; the PCB lingers as TERMINATED until
                // cleanup so observers can see the failure
                process.terminate(self.clock);
                self.processes.insert(process);
                self.log_interrupt(format!("process {name} creation failed (memory full)"));
                log::warn!(target: "process", "allocation rejected for process {pid} ({size_mb} MiB)");
            }
        }
        pid
    }

    /// Priority from size and duration: small, short processes end up
    /// near 0, big long-running ones near 9, with one level of RNG
    /// jitter.
    fn auto_priority(&mut self, size_mb: u64, duration: u64) -> u8 {
        let size_score = 1.0 - (size_mb as f64 / 64.0).min(1.0);
        let duration_score = 1.0 - (duration as f64 / 100.0).min(1.0);
        let score = size_score * 0.4 + duration_score * 0.6;
        let base = ((1.0 - score) * 9.0).round() as i32;
        let jitter = self.rng.gen_range(-1..=1);
        (base + jitter).clamp(0, 9) as u8
    }

    /// Completion bookkeeping: frees memory, records metrics, logs. The
    /// caller releases the CPU.
    fn release_process(&mut self, pid: Pid) {
        let Some(process) = self.processes.get(pid) else {
            return;
        };
        let name = process.name.clone();
        if let Some(unit) = process.memory_unit_id {
            self.units[unit].release(pid);
            self.log_flow("Core Memory Manager", "Kernel Base", &format!("release memory of {name}"));
        }
        let now = self.clock;
        self.metrics
            .record_completion(self.processes.get(pid).expect("checked above"), now);
        self.log_interrupt(format!("process {name} terminated"));
        log::debug!(target: "process", "process {pid} ({name}) TERMINATED at tick {now}");
    }

    /// Parks a process in the Waiting state for `duration` ticks,
    /// releasing its CPU if it holds one.
    fn set_waiting(&mut self, pid: Pid, reason: String, duration: u64) {
        let Some(process) = self.processes.get(pid) else {
            return;
        };
        if process.state.is_terminated() {
            return;
        }
        if let Some(cpu) = process.cpu_id {
            self.cpus[cpu].release(&mut self.processes);
        }
        for scheduler in &mut self.schedulers {
            scheduler.forget(pid);
        }
        let process = self.processes.get_mut(pid).expect("checked above");
        process.state = ProcessState::Waiting;
        process.io_remaining_ticks = duration.max(1);
        process.io_total_ticks = duration.max(1);
        process.interrupt_reason = Some(reason);
        process.quantum_used = 0;
    }

    /// Kicks a running process off its CPU; with `requeue` it goes back
    /// onto the scheduler of the CPU it just left.
    fn preempt(&mut self, pid: Pid, reason: String, requeue: bool) {
        let Some(process) = self.processes.get(pid) else {
            return;
        };
        if process.state.is_terminated() {
            return;
        }
        let Some(cpu) = process.cpu_id else {
            return;
        };
        let name = process.name.clone();
        self.cpus[cpu].release(&mut self.processes);
        if let Some(process) = self.processes.get_mut(pid) {
            process.state = ProcessState::Ready;
            process.quantum_used = 0;
        }
        if requeue {
            self.schedulers[cpu].add_process(pid, &mut self.processes);
        }
        self.log_interrupt(format!("process {name} preempted ({reason})"));
    }

    /// Scheduler with the shortest ready queue; ties go to the lowest
    /// index.
    fn least_loaded_scheduler(&self) -> usize {
        self.schedulers
            .iter()
            .enumerate()
            .min_by_key(|(_, scheduler)| scheduler.queue_len())
            .map(|(i, _)| i)
            .expect("at least one CPU")
    }

    fn log_interrupt(&mut self, message: impl AsRef<str>) {
        self.interrupt_log.push(self.clock, message);
    }

    fn log_flow(&mut self, source: &str, target: &str, action: &str) {
        if !self.architecture.is_modular() {
            return;
        }
        self.layer_flow_log
            .push(self.clock, format!("{source} -> {target}: {action}"));
    }

    // ------------------------------------------------------------------
    // mutation surface
    // ------------------------------------------------------------------

    /// `create <size_mb> <duration_ticks> [priority]`.
    pub fn manual_create_process(&mut self, size_mb: u64, duration: u64, priority: Option<u8>) -> Pid {
        self.create_process(size_mb.max(1), duration.max(1), priority, false)
    }

    /// Swaps the discipline feeding CPU `index`. Rejected while the
    /// simulation is running; queued processes migrate to the new
    /// scheduler.
    pub fn set_cpu_scheduler(&mut self, index: usize, kind: SchedulerKind) -> bool {
        if self.is_running {
            self.log_interrupt("scheduler change rejected while running");
            return false;
        }
        if index >= self.schedulers.len() {
            return false;
        }
        let queued = self.schedulers[index].drain_pids();
        let mut replacement = Scheduler::new(kind, self.config.aging_interval);
        for pid in queued {
            replacement.add_process(pid, &mut self.processes);
        }
        self.schedulers[index] = replacement;
        self.log_interrupt(format!("CPU {index} scheduler set to {}", kind.name()));
        true
    }

    /// Changes the hardware-thread capacity of CPU `index`. Rejected
    /// while running.
    pub fn set_cpu_threads(&mut self, index: usize, threads: u32) -> bool {
        if self.is_running {
            self.log_interrupt("thread capacity change rejected while running");
            return false;
        }
        let capacity = {
            let Some(cpu) = self.cpus.get_mut(index) else {
                return false;
            };
            cpu.thread_capacity = threads.clamp(1, 8);
            if cpu.process.is_some() {
                cpu.threads_in_use = cpu.thread_capacity;
            }
            cpu.thread_capacity
        };
        self.log_interrupt(format!("CPU {index} thread capacity set to {capacity}"));
        true
    }

    /// Rebuilds the contiguous half of a memory unit with a new fit
    /// strategy, dropping its block map.
    pub fn set_memory_unit_fit_strategy(&mut self, index: usize, strategy: FitStrategy) -> bool {
        if index >= self.units.len() {
            return false;
        }
        self.units[index].rebuild_contiguous(strategy);
        self.log_interrupt(format!(
            "memory unit {index} allocation strategy set to {}",
            strategy.name()
        ));
        true
    }

    /// Rebuilds the paged half of a memory unit with a new replacement
    /// policy, dropping its frame table.
    pub fn set_memory_unit_replacement_policy(&mut self, index: usize, policy: ReplacementPolicy) -> bool {
        if index >= self.units.len() {
            return false;
        }
        self.units[index].rebuild_paged(policy);
        self.log_interrupt(format!(
            "memory unit {index} replacement policy set to {}",
            policy.name()
        ));
        true
    }

    pub fn load_module(&mut self, id: &str, name: &str, removable: bool) -> bool {
        let event = self.modules.load(id, name, removable, self.clock);
        self.log_interrupt(&event.log);
        if event.accepted
            && let Some((source, target, action)) = event.flow
        {
            self.log_flow(&source, &target, &action);
        }
        event.accepted
    }

    pub fn unload_module(&mut self, id: &str) -> bool {
        let event = self.modules.unload(id);
        self.log_interrupt(&event.log);
        if event.accepted
            && let Some((source, target, action)) = event.flow
        {
            self.log_flow(&source, &target, &action);
        }
        event.accepted
    }

    /// Manual compaction of one unit's contiguous half; always permitted.
    pub fn compact_unit(&mut self, index: usize) -> bool {
        if index >= self.units.len() {
            return false;
        }
        self.units[index].contiguous.compact();
        self.log_interrupt(format!("memory unit {index} compacted manually"));
        true
    }

    pub fn start(&mut self) {
        self.is_running = true;
    }

    pub fn pause(&mut self) {
        self.is_running = false;
    }

    /// Back to a blank machine: processes, metrics, interrupts and logs
    /// are gone; CPU count, thread capacities, unit capacities and
    /// algorithms survive; the RNG is re-seeded. PIDs keep climbing.
    pub fn reset(&mut self) {
        self.clock = 0;
        self.processes.clear();
        self.metrics = SimulationMetrics::new();
        self.controller = InterruptController::new();

        let thread_caps: Vec<u32> = self.cpus.iter().map(|cpu| cpu.thread_capacity).collect();
        self.cpus = thread_caps
            .iter()
            .enumerate()
            .map(|(id, &threads)| Cpu::new(id, threads))
            .collect();

        let kinds: Vec<SchedulerKind> = self.schedulers.iter().map(Scheduler::kind).collect();
        self.schedulers = kinds
            .into_iter()
            .map(|kind| Scheduler::new(kind, self.config.aging_interval))
            .collect();

        let unit_settings: Vec<(u64, FitStrategy, ReplacementPolicy)> = self
            .units
            .iter()
            .map(|unit| (unit.capacity_mb(), unit.contiguous.strategy(), unit.paged.policy()))
            .collect();
        self.units = unit_settings
            .into_iter()
            .enumerate()
            .map(|(id, (capacity, strategy, policy))| MemoryUnit::new(id, capacity, strategy, policy))
            .collect();

        self.modules = ModuleRegistry::with_default_modules();
        self.interrupt_log.clear();
        self.layer_flow_log.clear();
        self.rng = StdRng::seed_from_u64(self.config.seed);
        self.is_running = false;
        self.log_interrupt("simulation reset");
        log::info!(target: "engine", "simulation reset");
    }

    // ------------------------------------------------------------------
    // snapshot surface
    // ------------------------------------------------------------------

    #[inline]
    pub const fn clock(&self) -> Tick {
        self.clock
    }

    #[inline]
    pub const fn is_running(&self) -> bool {
        self.is_running
    }

    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Everything not yet terminated, ascending by pid.
    pub fn active_processes(&self) -> Vec<ProcessInfo> {
        let mut infos: Vec<ProcessInfo> = self
            .processes
            .iter()
            .filter(|p| !p.state.is_terminated())
            .map(ProcessInfo::from)
            .collect();
        infos.sort_unstable_by_key(|info| info.pid);
        infos
    }

    /// Every PCB still in the table, terminated ones included.
    pub fn all_processes(&self) -> Vec<ProcessInfo> {
        self.processes.snapshot()
    }

    pub fn cpus(&self) -> Vec<CpuInfo> {
        self.cpus.iter().map(CpuInfo::from).collect()
    }

    pub fn memory_unit_summaries(&self) -> Vec<MemoryUnitSummary> {
        self.units.iter().map(MemoryUnit::summary).collect()
    }

    pub fn storage_overview(&self) -> StorageOverview {
        StorageOverview::gather(&self.units)
    }

    pub fn paging_stats(&self) -> Vec<UnitPagingStats> {
        self.units
            .iter()
            .map(|unit| UnitPagingStats {
                unit: unit.id,
                stats: unit.paged.stats(),
            })
            .collect()
    }

    pub fn algorithm_stats(&self) -> Vec<AlgorithmStats> {
        self.metrics.algorithm_stats()
    }

    pub fn interrupt_log(&self) -> Vec<String> {
        self.interrupt_log.snapshot()
    }

    pub fn layer_flow_events(&self) -> Vec<String> {
        self.layer_flow_log.snapshot()
    }

    pub fn module_status(&self) -> Vec<(String, KernelModule)> {
        self.modules.status()
    }

    /// Context switches performed across every CPU's dispatcher.
    pub fn context_switches(&self) -> usize {
        self.schedulers
            .iter()
            .map(|scheduler| scheduler.dispatcher.context_switches())
            .sum()
    }

    pub fn metrics(&self) -> &SimulationMetrics {
        &self.metrics
    }
}
