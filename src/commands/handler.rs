use super::ChatState;
use crate::core::error::AskError;

use console::style;

pub trait CommandHandler: Send + Sync {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, AskError>;
    fn help(&self) -> &'static str;
}

pub struct ExitCommand;
pub struct StatusCommand;
pub struct HelpCommand;
pub struct ClearCommand;

impl CommandHandler for ExitCommand {
    fn execute(&self, state: &mut ChatState, _args: &[&str]) -> Result<Option<String>, AskError> {
        state.should_continue = false;
        Ok(None)
    }

    fn help(&self) -> &'static str {
        "exit    - Exit conversation mode"
    }
}

impl CommandHandler for StatusCommand {
    fn execute(&self, state: &mut ChatState, _args: &[&str]) -> Result<Option<String>, AskError> {
        let settings = &state.settings;
        let lines = [
            style("Conversation Status:").bold().to_string(),
            format!(
                "  Messages: {} / {}",
                state.buffer.len(),
                state.buffer.capacity()
            ),
            format!(
                "  Approximate tokens: {} / {}",
                state.buffer.estimate_tokens(),
                settings.token_limit
            ),
            format!("  Model: {}", settings.model),
            format!("  Temperature: {}", settings.temperature),
            format!(
                "  Streaming: {}",
                if settings.streaming_enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            ),
        ];
        Ok(Some(lines.join("\n")))
    }

    fn help(&self) -> &'static str {
        "status  - Show conversation information"
    }
}

impl CommandHandler for HelpCommand {
    fn execute(
        &self,
        _state: &mut ChatState,
        _args: &[&str],
    ) -> Result<Option<String>, AskError> {
        let title = style("Conversation Mode Commands:").bold().underlined();
        let help_text = [
            title.to_string(),
            format!("  {}", ExitCommand.help()),
            format!("  {}", StatusCommand.help()),
            format!("  {}", HelpCommand.help()),
            format!("  {}", ClearCommand.help()),
            "  Any other text will be sent to the assistant.".to_string(),
        ]
        .join("\n");

        Ok(Some(help_text))
    }

    fn help(&self) -> &'static str {
        "help    - Show this help message"
    }
}

impl CommandHandler for ClearCommand {
    fn execute(&self, state: &mut ChatState, _args: &[&str]) -> Result<Option<String>, AskError> {
        state.buffer.reset();
        Ok(Some("Conversation cleared.".to_string()))
    }

    fn help(&self) -> &'static str {
        "clear   - Forget everything but the system prompt"
    }
}
