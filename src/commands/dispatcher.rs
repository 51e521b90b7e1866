use super::{
    ChatState,
    handler::{ClearCommand, ExitCommand, HelpCommand, StatusCommand},
    registry::CommandRegistry,
};
use crate::core::error::AskError;
use std::sync::Arc;

#[derive(Clone)]
pub struct CommandDispatcher {
    registry: Arc<CommandRegistry>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }

    /// Splits `input` into a command name and its arguments.
    ///
    /// `/name args...` is always a command. Without the slash only a line
    /// consisting of exactly a known command name is one, so ordinary
    /// sentences starting with "help" still go to the model.
    pub fn parse<'a>(&self, input: &'a str) -> Option<(&'a str, Vec<&'a str>)> {
        let input = input.trim();
        if let Some(rest) = input.strip_prefix('/') {
            let mut parts = rest.split_whitespace();
            let name = parts.next()?;
            return Some((name, parts.collect()));
        }
        self.registry.contains(input).then(|| (input, Vec::new()))
    }

    pub fn execute(
        &self,
        command: &str,
        args: &[&str],
        state: &mut ChatState,
    ) -> Result<Option<String>, AskError> {
        self.registry.execute(command, args, state)
    }

    pub fn get_command_names(&self) -> Vec<String> {
        self.registry.get_command_names()
    }
}

pub fn create_command_registry() -> CommandDispatcher {
    let mut registry = CommandRegistry::new();

    registry.register(&["exit", "quit"], ExitCommand);
    registry.register(&["status"], StatusCommand);
    registry.register(&["help"], HelpCommand);
    registry.register(&["clear"], ClearCommand);

    CommandDispatcher::new(Arc::new(registry))
}
