use crate::commands::CommandDispatcher;
use crate::config::Config;
use crate::core::error::AskError;

use console::style;
use rustyline::completion::{Completer, FilenameCompleter, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::{Highlighter, MatchingBracketHighlighter};
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::FileHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config as EditorConfig, Context, EditMode, Editor, Helper};
use std::borrow::Cow;
use tracing::{debug, warn};

pub type ChatEditor = Editor<ChatHelper, FileHistory>;

/// Completes `/command` names, and file names after `@`.
pub struct ChatCompleter {
    filename_completer: FilenameCompleter,
    commands: CommandDispatcher,
}

impl ChatCompleter {
    fn command_candidates(&self, prefix: &str) -> Vec<Pair> {
        self.commands
            .get_command_names()
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .map(|name| Pair {
                display: name.clone(),
                replacement: name,
            })
            .collect()
    }
}

impl Completer for ChatCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        if let Some(rest) = line[..pos].strip_prefix('/') {
            if !rest.contains(char::is_whitespace) {
                return Ok((1, self.command_candidates(rest)));
            }
        }

        let word_start = line[..pos]
            .rfind(char::is_whitespace)
            .map_or(0, |i| i + 1);
        if line[word_start..pos].starts_with('@') {
            let path = &line[word_start + 1..pos];
            let (start, candidates) = self.filename_completer.complete_path(path, path.len())?;
            return Ok((word_start + 1 + start, candidates));
        }

        Ok((pos, Vec::new()))
    }
}

pub struct ChatHelper {
    completer: ChatCompleter,
    highlighter: MatchingBracketHighlighter,
    hinter: HistoryHinter,
}

impl ChatHelper {
    pub fn new(commands: CommandDispatcher) -> Self {
        Self {
            completer: ChatCompleter {
                filename_completer: FilenameCompleter::new(),
                commands,
            },
            highlighter: MatchingBracketHighlighter::new(),
            hinter: HistoryHinter {},
        }
    }
}

impl Helper for ChatHelper {}

impl Validator for ChatHelper {}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        self.completer.complete(line, pos, ctx)
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

impl Highlighter for ChatHelper {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        self.highlighter.highlight(line, pos)
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(style(hint).dim().to_string())
    }
}

pub fn create_editor(commands: CommandDispatcher) -> Result<ChatEditor, AskError> {
    let config = EditorConfig::builder()
        .history_ignore_space(true)
        .auto_add_history(false)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .build();

    let mut editor = Editor::with_config(config)
        .map_err(|e| AskError::Input(format!("Failed to create line editor: {}", e)))?;
    editor.set_helper(Some(ChatHelper::new(commands)));

    let history_path = Config::history_path();
    if let Err(e) = editor.load_history(&history_path) {
        debug!("No input history loaded from {}: {}", history_path.display(), e);
    }

    Ok(editor)
}

/// Reads one line. `None` means the user is done (Ctrl-C or Ctrl-D).
pub fn read_input(editor: &mut ChatEditor) -> Result<Option<String>, AskError> {
    let prompt = style("> ").bold().cyan().to_string();
    match editor.readline(&prompt) {
        Ok(line) => {
            if !line.trim().is_empty() {
                if let Err(e) = editor.add_history_entry(line.as_str()) {
                    warn!("Failed to add history entry: {}", e);
                }
            }
            Ok(Some(line))
        }
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(err) => Err(AskError::Input(format!("Input error: {}", err))),
    }
}

pub fn save_history(editor: &mut ChatEditor) -> Result<(), AskError> {
    let history_path = Config::history_path();

    if let Some(parent) = history_path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AskError::Input(format!("Failed to create history directory: {}", e))
            })?;
        }
    }

    editor
        .save_history(&history_path)
        .map_err(|e| AskError::Input(format!("Failed to save history: {}", e)))
}
