//! Name-keyed command registry.

use crate::command::Command;
use std::collections::BTreeMap;
use tracing::warn;

/// Constructor for a fresh, parameterless command.
pub type CommandFactory = fn() -> Box<dyn Command>;

/// Maps command names to factories.
#[derive(Default, Clone)]
pub struct CommandRegistry {
    factories: BTreeMap<String, CommandFactory>,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CommandRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under the name of the command it builds.
    ///
    /// Registering an existing name replaces the previous factory.
    pub fn register(&mut self, factory: CommandFactory) -> &mut Self {
        let name = factory().name().to_string();
        if self.factories.insert(name.clone(), factory).is_some() {
            warn!(command = %name, "Replacing previously registered command");
        }
        self
    }

    /// Build a fresh command by exact name.
    #[must_use]
    pub fn create(&self, name: &str) -> Option<Box<dyn Command>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Is the name registered?
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// `(name, recognized parameters)` for every command, sorted by name.
    #[must_use]
    pub fn describe(&self) -> Vec<(&str, &'static [&'static str])> {
        self.factories
            .iter()
            .map(|(name, factory)| (name.as_str(), factory().recognized_parameters()))
            .collect()
    }

    /// Registered name equal to `name` ignoring ASCII case.
    #[must_use]
    pub fn suggest(&self, name: &str) -> Option<&str> {
        self.names().find(|candidate| candidate.eq_ignore_ascii_case(name))
    }
}
