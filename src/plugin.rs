//! Plugin trait and event dispatch.
//!
//! Each plugin declares up front which event kinds it hooks and which chat
//! command words it owns. The `Dispatcher` turns those declarations into
//! lookup tables once, at startup, and routes every event through them.

use anyhow::Result;
use std::collections::HashMap;
use tracing::{debug, error};

use crate::host::GameHost;
use crate::types::{ChatCommand, EventKind, GameEvent, TimbaError};

/// A server plugin reacting to game-lifecycle events and chat commands.
pub trait Plugin {
    /// Plugin name for logging and identification.
    fn name(&self) -> &'static str;

    /// Event kinds this plugin wants to receive.
    fn hooks(&self) -> &'static [EventKind];

    /// Command words (without `!`) this plugin owns.
    fn commands(&self) -> &'static [&'static str];

    fn handle_event(&mut self, event: &GameEvent, host: &dyn GameHost) -> Result<()>;

    fn handle_command(&mut self, command: &ChatCommand, host: &dyn GameHost) -> Result<()>;
}

/// Routes events to plugins through tables built at construction.
pub struct Dispatcher {
    plugins: Vec<Box<dyn Plugin>>,
    hooks: HashMap<EventKind, Vec<usize>>,
    commands: HashMap<String, usize>,
}

impl Dispatcher {
    /// Build the dispatch tables. Two plugins claiming the same command
    /// word is a configuration error.
    pub fn new(plugins: Vec<Box<dyn Plugin>>) -> Result<Self, TimbaError> {
        let mut hooks: HashMap<EventKind, Vec<usize>> = HashMap::new();
        let mut commands: HashMap<String, usize> = HashMap::new();

        for (index, plugin) in plugins.iter().enumerate() {
            for kind in plugin.hooks() {
                hooks.entry(*kind).or_default().push(index);
            }
            for word in plugin.commands() {
                let word = word.to_lowercase();
                if let Some(&owner) = commands.get(&word) {
                    return Err(TimbaError::Config(format!(
                        "command '{word}' registered by both {} and {}",
                        plugins[owner].name(),
                        plugin.name()
                    )));
                }
                commands.insert(word, index);
            }
            debug!(
                plugin = plugin.name(),
                hooks = ?plugin.hooks(),
                commands = ?plugin.commands(),
                "Plugin registered"
            );
        }

        Ok(Self {
            plugins,
            hooks,
            commands,
        })
    }

    /// Names of the registered plugins, in registration order.
    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Names of the plugins hooked to an event kind, in call order.
    pub fn hooked(&self, kind: EventKind) -> Vec<&'static str> {
        self.hooks
            .get(&kind)
            .map(|indexes| indexes.iter().map(|&i| self.plugins[i].name()).collect())
            .unwrap_or_default()
    }

    /// Deliver one event. Handler errors are logged and do not stop the
    /// remaining plugins; returns how many handlers failed.
    pub fn dispatch(&mut self, event: &GameEvent, host: &dyn GameHost) -> usize {
        if let GameEvent::Command(command) = event {
            return self.dispatch_command(command, host);
        }

        let Some(indexes) = self.hooks.get(&event.kind()) else {
            debug!(kind = ?event.kind(), "No plugin hooked");
            return 0;
        };

        let mut failures = 0;
        for &index in indexes {
            let plugin = &mut self.plugins[index];
            if let Err(e) = plugin.handle_event(event, host) {
                error!(plugin = plugin.name(), kind = ?event.kind(), error = %e, "Event handler failed");
                failures += 1;
            }
        }
        failures
    }

    fn dispatch_command(&mut self, command: &ChatCommand, host: &dyn GameHost) -> usize {
        let Some(word) = command.word() else {
            return 0;
        };
        let Some(&index) = self.commands.get(&word) else {
            debug!(word = %word, "Unknown command");
            return 0;
        };

        let plugin = &mut self.plugins[index];
        match plugin.handle_command(command, host) {
            Ok(()) => 0,
            Err(e) => {
                error!(plugin = plugin.name(), word = %word, error = %e, "Command handler failed");
                1
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
