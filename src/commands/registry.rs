use crate::commands::handler::CommandHandler;
use crate::core::error::AskError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Conversation commands keyed by name. Aliases share one handler.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: BTreeMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: CommandHandler + 'static>(&mut self, names: &[&str], command: C) {
        let handler: Arc<dyn CommandHandler> = Arc::new(command);
        for name in names {
            self.handlers.insert(name.to_string(), Arc::clone(&handler));
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn execute(
        &self,
        name: &str,
        args: &[&str],
        state: &mut super::ChatState,
    ) -> Result<Option<String>, AskError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| AskError::Input(format!("Unknown command: {}", name)))?;
        handler.execute(state, args)
    }

    /// Names in lexical order, aliases included.
    pub fn get_command_names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ChatState;
    use crate::commands::handler::ExitCommand;
    use crate::config::Settings;
    use crate::conversation::ConversationBuffer;

    #[test]
    fn aliases_share_a_handler() {
        let mut registry = CommandRegistry::new();
        registry.register(&["quit", "exit", "bye"], ExitCommand);

        assert_eq!(registry.get_command_names(), vec!["bye", "exit", "quit"]);
        assert!(registry.contains("bye"));
        assert!(!registry.contains("leave"));

        let mut state = ChatState::new(ConversationBuffer::new(), Settings::default());
        assert!(registry.execute("bye", &[], &mut state).unwrap().is_none());
        assert!(!state.should_continue);
    }

    #[test]
    fn unknown_name_is_an_input_error() {
        let registry = CommandRegistry::new();
        let mut state = ChatState::new(ConversationBuffer::new(), Settings::default());
        let err = registry.execute("nope", &[], &mut state).unwrap_err();
        assert!(matches!(err, AskError::Input(msg) if msg == "Unknown command: nope"));
    }
}
