use crate::attachments;
use crate::catalog::{ModelCatalog, Validation};
use crate::commands::{ChatState, CommandDispatcher, create_command_registry};
use crate::config::Settings;
use crate::conversation::{ConversationBuffer, Role};
use crate::core::error::AskError;
use crate::dispatcher::{Reply, RequestDispatcher, build_request};
use crate::display;
use crate::input;
use crate::providers::LLMProvider;
use is_terminal::IsTerminal;
use std::io::{self, Read, Write};
use tracing::{debug, info, warn};

const SYSTEM_PROMPT_FOR_CONVERSATION: &str = "You are a helpful assistant running in a command \
line interface. The user can chat with you and the conversation can be continued.";
const SYSTEM_PROMPT_FOR_SINGLE: &str = "You are a helpful assistant running in a command line \
interface and you can only respond once to the user. Do not ask any questions in your response.";

/// Reads stdin to the end when it is not a terminal.
pub fn read_piped_stdin() -> Result<Option<String>, AskError> {
    if io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| AskError::Input(format!("Failed to read from stdin: {}", e)))?;
    Ok(Some(buffer))
}

/// Piped text goes first, wrapped in `<pipe>` tags.
pub fn compose_query(query: Option<String>, piped: Option<String>) -> Option<String> {
    let piped = piped.filter(|text| !text.trim().is_empty());
    match (query, piped) {
        (Some(query), Some(piped)) => Some(format!("<pipe>{}</pipe>\n\n{}", piped, query)),
        (None, Some(piped)) => Some(format!("<pipe>{}</pipe>", piped)),
        (Some(query), None) => Some(query),
        (None, None) => None,
    }
}

pub struct Application {
    settings: Settings,
    dispatcher: RequestDispatcher,
    catalog: ModelCatalog,
    commands: CommandDispatcher,
}

impl Application {
    pub fn new(settings: Settings, provider: Box<dyn LLMProvider>, catalog: ModelCatalog) -> Self {
        // The indicator draws on stderr; keep redirected output clean.
        let dispatcher =
            RequestDispatcher::new(provider).with_progress(io::stderr().is_terminal());
        Self::with_dispatcher(settings, dispatcher, catalog)
    }

    pub fn with_dispatcher(
        settings: Settings,
        dispatcher: RequestDispatcher,
        catalog: ModelCatalog,
    ) -> Self {
        Self {
            settings,
            dispatcher,
            catalog,
            commands: create_command_registry(),
        }
    }

    pub async fn run(&mut self, query: Option<String>) -> Result<(), AskError> {
        self.validate_model().await?;

        if self.settings.conversation_mode {
            self.run_conversation(query).await?;
        } else {
            let query = query.ok_or_else(|| AskError::Input("No query provided".to_string()))?;
            self.run_single(&query, &mut io::stdout()).await?;
        }

        info!("Exiting normally");
        Ok(())
    }

    /// Fails only when a catalog was available and does not know the model.
    pub async fn validate_model(&mut self) -> Result<(), AskError> {
        let model = self.settings.model.clone();
        debug!("Model catalog cache: {}", self.catalog.path().display());

        let validation = self.catalog.validate(&model, self.dispatcher.provider()).await;
        if validation.is_valid() {
            return Ok(());
        }
        if let Validation::Invalid(suggestion) = &validation {
            display::display_invalid_model(&model, suggestion);
        }
        Err(AskError::InvalidModel(model))
    }

    pub async fn run_single<W: Write>(&self, query: &str, out: &mut W) -> Result<Reply, AskError> {
        info!("Single response mode");
        let mut state = ChatState::new(
            ConversationBuffer::with_system_prompt(SYSTEM_PROMPT_FOR_SINGLE),
            self.settings.clone(),
        );
        self.turn(&mut state, query, out).await
    }

    async fn run_conversation(&self, first: Option<String>) -> Result<(), AskError> {
        info!("Starting conversation mode");
        let mut state = ChatState::new(
            ConversationBuffer::with_system_prompt(SYSTEM_PROMPT_FOR_CONVERSATION),
            self.settings.clone(),
        );
        let mut stdout = io::stdout();

        if let Some(first) = &first {
            self.report(self.turn(&mut state, first, &mut stdout).await);
        }
        display::display_conversation_banner(first.is_none());

        let mut editor = input::create_editor(self.commands.clone())?;
        loop {
            let Some(line) = input::read_input(&mut editor)? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some((command, args)) = self.commands.parse(line) {
                match self.commands.execute(command, &args, &mut state) {
                    Ok(Some(output)) => display::display_command_output(&output),
                    Ok(None) => {}
                    Err(e) => display::display_error(&e),
                }
                if !state.should_continue {
                    info!("User requested exit");
                    break;
                }
                continue;
            }

            self.report(self.turn(&mut state, line, &mut stdout).await);
        }

        if let Err(e) = input::save_history(&mut editor) {
            warn!("{}", e);
        }
        Ok(())
    }

    /// One user message and its reply. A successful reply is kept in the
    /// conversation as the assistant's message.
    pub async fn turn<W: Write>(
        &self,
        state: &mut ChatState,
        input: &str,
        out: &mut W,
    ) -> Result<Reply, AskError> {
        let content = attachments::expand_file_references(input);
        state.buffer.append(Role::User, content)?;
        state.buffer.trim_to_limit(state.settings.token_limit);

        let request = build_request(
            &state.buffer,
            &state.settings.model,
            state.settings.temperature,
            state.settings.streaming_enabled,
        );
        let reply = self.dispatcher.send(&request, out).await?;
        debug!(
            "Reply received ({} bytes, {})",
            reply.text.len(),
            if reply.streamed { "streamed" } else { "single completion" }
        );

        if !reply.text.is_empty() {
            if let Err(e) = state.buffer.append(Role::Assistant, reply.text.as_str()) {
                warn!("Reply not kept in conversation: {}", e);
            }
        }
        Ok(reply)
    }

    fn report(&self, result: Result<Reply, AskError>) {
        if let Err(e) = result {
            display::display_error(&e);
        }
    }
}
