//! Loadable-module registry for the Modular architecture.

use hashbrown::HashMap;
use serde::Serialize;

use crate::process::Tick;

#[derive(Serialize, Debug, Clone)]
pub struct KernelModule {
    pub name: String,
    pub removable: bool,
    pub load_tick: Tick,
}

/// Outcome of a load/unload attempt plus the log/flow entries the engine
/// should record. The registry itself never writes logs.
#[derive(Debug, Clone)]
pub struct ModuleEvent {
    pub accepted: bool,
    pub log: String,
    pub flow: Option<(String, String, String)>,
}

#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, KernelModule>,
}

impl ModuleRegistry {
    /// Registry seeded with the core (non-removable) modules and the
    /// default optional ones.
    pub fn with_default_modules() -> Self {
        let mut registry = Self::default();
        registry.seed("core_process_manager", "Core Process Manager", false);
        registry.seed("core_memory_manager", "Core Memory Manager", false);
        registry.seed("scheduler_module", "Scheduling Module", true);
        registry.seed("interrupt_handler", "Interrupt Handler Module", true);
        registry.seed("device_driver", "Device Driver Module", true);
        registry
    }

    fn seed(&mut self, id: &str, name: &str, removable: bool) {
        self.modules.insert(
            id.into(),
            KernelModule {
                name: name.into(),
                removable,
                load_tick: 0,
            },
        );
    }

    pub fn load(&mut self, id: &str, name: &str, removable: bool, now: Tick) -> ModuleEvent {
        if self.modules.contains_key(id) {
            return ModuleEvent {
                accepted: false,
                log: format!("module '{name}' is already loaded"),
                flow: None,
            };
        }

        self.modules.insert(
            id.into(),
            KernelModule {
                name: name.into(),
                removable,
                load_tick: now,
            },
        );
        ModuleEvent {
            accepted: true,
            log: format!("module '{name}' loaded dynamically"),
            flow: Some((
                "Kernel Base".into(),
                name.into(),
                "integrate dynamic module".into(),
            )),
        }
    }

    pub fn unload(&mut self, id: &str) -> ModuleEvent {
        let Some(module) = self.modules.get(id) else {
            return ModuleEvent {
                accepted: false,
                log: format!("module '{id}' not found"),
                flow: None,
            };
        };

        if !module.removable {
            return ModuleEvent {
                accepted: false,
                log: format!("module '{}' cannot be removed (core module)", module.name),
                flow: None,
            };
        }

        let module = self.modules.remove(id).unwrap();
        ModuleEvent {
            accepted: true,
            log: format!("module '{}' unloaded dynamically", module.name),
            flow: Some((
                module.name,
                "Kernel Base".into(),
                "disconnect dynamic module".into(),
            )),
        }
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Loaded device-driver style modules that report sparse activity.
    pub fn device_modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .modules
            .iter()
            .filter(|(id, _)| id.contains("device"))
            .map(|(_, module)| module.name.clone())
            .collect();
        names.sort_unstable();
        names
    }

    /// Status snapshot keyed by module id, sorted for stable output.
    pub fn status(&self) -> Vec<(String, KernelModule)> {
        let mut status: Vec<(String, KernelModule)> = self
            .modules
            .iter()
            .map(|(id, module)| (id.clone(), module.clone()))
            .collect();
        status.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_modules_cannot_be_unloaded() {
        let mut registry = ModuleRegistry::with_default_modules();
        let event = registry.unload("core_memory_manager");
        assert!(!event.accepted);
        assert!(registry.contains("core_memory_manager"));
    }

    #[test]
    fn removable_modules_come_and_go() {
        let mut registry = ModuleRegistry::with_default_modules();
        assert!(registry.unload("device_driver").accepted);
        assert!(!registry.contains("device_driver"));
        assert!(!registry.unload("device_driver").accepted);

        let event = registry.load("usb_stack", "USB Stack", true, 42);
        assert!(event.accepted);
        assert!(registry.contains("usb_stack"));
    }

    #[test]
    fn duplicate_loads_are_rejected() {
        let mut registry = ModuleRegistry::with_default_modules();
        let event = registry.load("scheduler_module", "Scheduling Module", true, 1);
        assert!(!event.accepted);
    }
}
