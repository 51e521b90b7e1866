pub mod dispatcher;
pub mod handler;
pub mod registry;

use crate::config::Settings;
use crate::conversation::ConversationBuffer;
pub use dispatcher::{CommandDispatcher, create_command_registry};

/// What conversation commands may inspect and change.
pub struct ChatState {
    pub buffer: ConversationBuffer,
    pub settings: Settings,
    pub should_continue: bool,
}

impl ChatState {
    pub fn new(buffer: ConversationBuffer, settings: Settings) -> Self {
        Self {
            buffer,
            settings,
            should_continue: true,
        }
    }
}
