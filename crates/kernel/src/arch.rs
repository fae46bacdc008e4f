//! Architecture adapters: thin wrappers that stretch interrupt service
//! times to model how the kernel is organized. They run right before the
//! base handler chain fires.

use serde::Serialize;

use crate::interrupts::{Interrupt, InterruptDefaults, InterruptKind};

pub const DEFAULT_KERNEL_LATENCY: u64 = 2;
pub const DEFAULT_HARDWARE_DELAY: u64 = 1;

/// A log line plus an optional layer-flow record produced by an
/// adjustment.
#[derive(Debug, Clone)]
pub struct ArchNote {
    pub log: String,
    pub flow: Option<(String, String, String)>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    /// Everything in the kernel, no added latency.
    Monolithic,
    /// User-space servers answer for the kernel; every serviced request
    /// pays the round trip.
    Microkernel { kernel_latency: u64 },
    /// Hybrid kernel with loadable modules; hardware paths pay a small
    /// dispatch delay.
    Modular { hardware_delay: u64 },
}

impl Architecture {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Monolithic => "Monolithic",
            Self::Microkernel { .. } => "Microkernel",
            Self::Modular { .. } => "Modular",
        }
    }

    /// Maps a configuration name to an adapter. Only Modular is actively
    /// exposed; unknown names fall back to it.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Monolithic" => Self::Monolithic,
            "Microkernel" => Self::Microkernel {
                kernel_latency: DEFAULT_KERNEL_LATENCY,
            },
            _ => Self::Modular {
                hardware_delay: DEFAULT_HARDWARE_DELAY,
            },
        }
    }

    #[inline]
    pub const fn is_modular(&self) -> bool {
        matches!(self, Self::Modular { .. })
    }

    /// Adjusts `interrupt` in place before the handler chain sees it and
    /// reports what happened for the logs.
    pub fn adjust(&self, interrupt: &mut Interrupt, defaults: &InterruptDefaults) -> Option<ArchNote> {
        match *self {
            Self::Monolithic => None,
            Self::Microkernel { kernel_latency } => {
                if interrupt.pid.is_none() {
                    return None;
                }
                let base = match interrupt.kind {
                    InterruptKind::Io => interrupt.duration.unwrap_or(defaults.io_duration),
                    InterruptKind::Syscall | InterruptKind::Software => {
                        interrupt.duration.unwrap_or(defaults.syscall_duration)
                    }
                    InterruptKind::PageFault => {
                        interrupt.duration.unwrap_or(defaults.page_fault_duration)
                    }
                    _ => return None,
                };
                interrupt.duration = Some(base + kernel_latency);
                Some(ArchNote {
                    log: format!(
                        "[Microkernel] servicing {} through a user-space server, +{kernel_latency} ticks",
                        interrupt.kind.name()
                    ),
                    flow: None,
                })
            }
            Self::Modular { hardware_delay } => {
                if interrupt.pid.is_none() {
                    return None;
                }
                if !matches!(
                    interrupt.kind,
                    InterruptKind::Hardware | InterruptKind::Timer | InterruptKind::PageFault
                ) {
                    return None;
                }
                if interrupt.kind == InterruptKind::PageFault {
                    let base = interrupt.duration.unwrap_or(defaults.page_fault_duration);
                    interrupt.duration = Some(base + hardware_delay);
                }
                Some(ArchNote {
                    log: format!(
                        "[Modular] {} interrupt routed through the driver module, +{hardware_delay} ticks",
                        interrupt.kind.name()
                    ),
                    flow: Some((
                        "Kernel Base".into(),
                        "Interrupt Handler Module".into(),
                        format!("dispatch {}", interrupt.kind.name()),
                    )),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monolithic_leaves_durations_alone() {
        let mut interrupt = Interrupt::new(InterruptKind::Io, "test", Some(1));
        let note = Architecture::Monolithic.adjust(&mut interrupt, &InterruptDefaults::default());
        assert!(note.is_none());
        assert!(interrupt.duration.is_none());
    }

    #[test]
    fn microkernel_charges_the_round_trip() {
        let arch = Architecture::from_name("Microkernel");
        let defaults = InterruptDefaults::default();

        let mut io = Interrupt::new(InterruptKind::Io, "test", Some(1));
        arch.adjust(&mut io, &defaults);
        assert_eq!(io.duration, Some(defaults.io_duration + DEFAULT_KERNEL_LATENCY));

        let mut syscall = Interrupt::new(InterruptKind::Syscall, "test", Some(1));
        arch.adjust(&mut syscall, &defaults);
        assert_eq!(
            syscall.duration,
            Some(defaults.syscall_duration + DEFAULT_KERNEL_LATENCY)
        );

        let mut fault = Interrupt::new(InterruptKind::PageFault, "test", Some(1));
        arch.adjust(&mut fault, &defaults);
        assert_eq!(
            fault.duration,
            Some(defaults.page_fault_duration + DEFAULT_KERNEL_LATENCY)
        );

        // hardware preemptions are not stretched
        let mut hardware = Interrupt::new(InterruptKind::Hardware, "test", Some(1));
        arch.adjust(&mut hardware, &defaults);
        assert!(hardware.duration.is_none());
    }

    #[test]
    fn modular_only_delays_hardware_paths() {
        let arch = Architecture::from_name("Modular");
        let defaults = InterruptDefaults::default();

        let mut fault = Interrupt::new(InterruptKind::PageFault, "test", Some(1));
        let note = arch.adjust(&mut fault, &defaults).unwrap();
        assert_eq!(
            fault.duration,
            Some(defaults.page_fault_duration + DEFAULT_HARDWARE_DELAY)
        );
        assert!(note.flow.is_some());

        let mut io = Interrupt::new(InterruptKind::Io, "test", Some(1));
        assert!(arch.adjust(&mut io, &defaults).is_none());
        assert!(io.duration.is_none());
    }

    #[test]
    fn unknown_names_fall_back_to_modular() {
        assert!(Architecture::from_name("Exokernel").is_modular());
        assert!(Architecture::from_name("Modular").is_modular());
    }

    #[test]
    fn untargeted_interrupts_are_never_adjusted() {
        let arch = Architecture::from_name("Microkernel");
        let mut timer = Interrupt::new(InterruptKind::Timer, "timer", None);
        assert!(arch.adjust(&mut timer, &InterruptDefaults::default()).is_none());
    }
}
