//! Interrupt controller and the handler chain behind it.
//!
//! The controller is a priority queue (lower value drains first, FIFO
//! among equals). Handlers never touch engine state directly: each one
//! turns an interrupt into a [`HandlerEffect`] that the engine applies
//! after the chain has spoken.

use core::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::Serialize;

use crate::process::Pid;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptKind {
    Io,
    Hardware,
    Software,
    Syscall,
    Timer,
    PageFault,
}

impl InterruptKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Io => "IO",
            Self::Hardware => "HARDWARE",
            Self::Software => "SOFTWARE",
            Self::Syscall => "SYSCALL",
            Self::Timer => "TIMER",
            Self::PageFault => "PAGE_FAULT",
        }
    }

    /// Queue priority of this kind; lower drains earlier.
    pub const fn queue_priority(&self) -> u8 {
        match self {
            Self::Timer | Self::Hardware => 0,
            Self::PageFault => 1,
            Self::Io => 2,
            Self::Syscall | Self::Software => 3,
        }
    }
}

/// A pending or in-flight interrupt. The typed fields replace the loose
/// payload mapping of older revisions: `duration` overrides the default
/// service time, `requeue` controls what preemption does with the target.
#[derive(Debug, Clone)]
pub struct Interrupt {
    pub kind: InterruptKind,
    pub source: &'static str,
    pub pid: Option<Pid>,
    pub priority: u8,
    pub reason: Option<String>,
    pub duration: Option<u64>,
    pub requeue: bool,
}

impl Interrupt {
    pub fn new(kind: InterruptKind, source: &'static str, pid: Option<Pid>) -> Self {
        Self {
            kind,
            source,
            pid,
            priority: kind.queue_priority(),
            reason: None,
            duration: None,
            requeue: true,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub const fn with_duration(mut self, duration: u64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Reason string for logging, falling back to the kind name.
    pub fn reason_or_kind(&self) -> String {
        self.reason.clone().unwrap_or_else(|| self.kind.name().into())
    }
}

struct Pending {
    sequence: u64,
    interrupt: Interrupt,
}

impl Pending {
    const fn key(&self) -> (u8, u64) {
        (self.interrupt.priority, self.sequence)
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    // reversed so the std max-heap pops the smallest (priority, sequence)
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

#[derive(Default)]
pub struct InterruptController {
    pending: BinaryHeap<Pending>,
    sequence: u64,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&mut self, interrupt: Interrupt) {
        let sequence = self.sequence;
        self.sequence += 1;
        self.pending.push(Pending { sequence, interrupt });
    }

    pub fn fetch_next(&mut self) -> Option<Interrupt> {
        self.pending.pop().map(|pending| pending.interrupt)
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Default service times the handlers fall back to when an interrupt does
/// not carry its own duration.
#[derive(Debug, Clone, Copy)]
pub struct InterruptDefaults {
    pub io_duration: u64,
    pub syscall_duration: u64,
    pub page_fault_duration: u64,
}

impl Default for InterruptDefaults {
    fn default() -> Self {
        Self {
            io_duration: 3,
            syscall_duration: 2,
            page_fault_duration: 5,
        }
    }
}

/// What the chain decided; the engine is the one that acts on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerEffect {
    /// Park the process in the Waiting state for `duration` ticks.
    Wait {
        pid: Pid,
        reason: String,
        duration: u64,
    },
    /// Kick the process off its CPU.
    Preempt {
        pid: Pid,
        reason: String,
        requeue: bool,
    },
    /// No target process: worth a log line, nothing else.
    Global { message: String },
    /// No handler claimed the interrupt. Unreachable with the default
    /// chain; the interrupt is dropped.
    Dropped,
}

pub trait InterruptHandler {
    fn can_handle(&self, kind: InterruptKind) -> bool;
    fn effect(&self, interrupt: &Interrupt, defaults: &InterruptDefaults) -> HandlerEffect;
}

/// Handles IO.
pub struct IoInterruptHandler;

impl InterruptHandler for IoInterruptHandler {
    fn can_handle(&self, kind: InterruptKind) -> bool {
        matches!(kind, InterruptKind::Io)
    }

    fn effect(&self, interrupt: &Interrupt, defaults: &InterruptDefaults) -> HandlerEffect {
        let Some(pid) = interrupt.pid else {
            return HandlerEffect::Global {
                message: format!("{} interrupt with no target", interrupt.kind.name()),
            };
        };
        HandlerEffect::Wait {
            pid,
            reason: interrupt.reason_or_kind(),
            duration: interrupt.duration.unwrap_or(defaults.io_duration),
        }
    }
}

/// Handles SYSCALL and SOFTWARE.
pub struct SyscallInterruptHandler;

impl InterruptHandler for SyscallInterruptHandler {
    fn can_handle(&self, kind: InterruptKind) -> bool {
        matches!(kind, InterruptKind::Syscall | InterruptKind::Software)
    }

    fn effect(&self, interrupt: &Interrupt, defaults: &InterruptDefaults) -> HandlerEffect {
        let Some(pid) = interrupt.pid else {
            return HandlerEffect::Global {
                message: format!("{} interrupt with no target", interrupt.kind.name()),
            };
        };
        HandlerEffect::Wait {
            pid,
            reason: interrupt.reason_or_kind(),
            duration: interrupt.duration.unwrap_or(defaults.syscall_duration),
        }
    }
}

/// Handles HARDWARE, TIMER and PAGE_FAULT.
pub struct HardwareInterruptHandler;

impl InterruptHandler for HardwareInterruptHandler {
    fn can_handle(&self, kind: InterruptKind) -> bool {
        matches!(
            kind,
            InterruptKind::Hardware | InterruptKind::Timer | InterruptKind::PageFault
        )
    }

    fn effect(&self, interrupt: &Interrupt, defaults: &InterruptDefaults) -> HandlerEffect {
        let Some(pid) = interrupt.pid else {
            return HandlerEffect::Global {
                message: format!("global {} interrupt", interrupt.kind.name()),
            };
        };

        if interrupt.kind == InterruptKind::PageFault {
            return HandlerEffect::Wait {
                pid,
                reason: interrupt.reason_or_kind(),
                duration: interrupt.duration.unwrap_or(defaults.page_fault_duration),
            };
        }

        HandlerEffect::Preempt {
            pid,
            reason: interrupt.reason_or_kind(),
            requeue: interrupt.requeue,
        }
    }
}

/// Chain of responsibility, walked front to back.
pub struct HandlerChain {
    handlers: Vec<Box<dyn InterruptHandler>>,
}

impl HandlerChain {
    /// IO -> Syscall -> Hardware, same order as the dispatch table this
    /// replaced.
    pub fn with_default_handlers() -> Self {
        Self {
            handlers: vec![
                Box::new(IoInterruptHandler),
                Box::new(SyscallInterruptHandler),
                Box::new(HardwareInterruptHandler),
            ],
        }
    }

    pub fn handle(&self, interrupt: &Interrupt, defaults: &InterruptDefaults) -> HandlerEffect {
        for handler in &self.handlers {
            if handler.can_handle(interrupt.kind) {
                return handler.effect(interrupt, defaults);
            }
        }
        HandlerEffect::Dropped
    }
}
