//! Choosing a destination category.
//!
//! The selector never touches stdin directly. It talks to a [`Prompt`], so the
//! same retry logic drives the terminal, piped input and tests.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use tracing::{debug, warn};

use crate::error::ImportError;
use crate::kicad::SymbolInfo;
use crate::registry::{Category, CategoryRegistry};

/// A line-oriented question/answer channel.
pub trait Prompt {
    /// Shows `question` and reads one answer line.
    ///
    /// Returns `Ok(None)` once input is closed.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    fn ask(&mut self, question: &str) -> io::Result<Option<String>>;

    /// Shows a message without waiting for an answer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn say(&mut self, message: &str) -> io::Result<()>;
}

/// Prompt over a reader and writer, normally stdin and stdout.
#[derive(Debug)]
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    /// Creates a prompt over arbitrary streams.
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl TerminalPrompt<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on the process's stdin and stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompt for TerminalPrompt<R, W> {
    fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.output, "{question}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn say(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, "{message}")
    }
}

/// Prompt that replays canned answers and records everything shown.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    transcript: Vec<String>,
}

impl ScriptedPrompt {
    /// Creates a prompt that answers with `answers` in order, then reports
    /// closed input.
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
        }
    }

    /// Every question and message shown so far.
    #[must_use]
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// Answers not consumed yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompt for ScriptedPrompt {
    fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        self.transcript.push(question.to_string());
        Ok(self.answers.pop_front())
    }

    fn say(&mut self, message: &str) -> io::Result<()> {
        self.transcript.push(message.to_string());
        Ok(())
    }
}

/// Result of a single-category choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<'a> {
    /// The user picked a category.
    Category(&'a Category),
    /// The user chose to skip, or input was closed.
    Cancelled,
}

/// Interactive category menu with a bounded retry budget.
#[derive(Debug, Clone, Copy)]
pub struct CategorySelector {
    max_attempts: u32,
}

impl Default for CategorySelector {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl CategorySelector {
    /// Creates a selector allowing `max_attempts` answers (at least one).
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Shows the menu and reads a category choice.
    ///
    /// Accepts a 1-based index, a category key, or `0` to skip. Invalid
    /// answers are reported and asked again until the budget runs out.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::InvalidSelection`] after `max_attempts` invalid
    /// answers, or [`ImportError::Prompt`] if the prompt fails.
    pub fn select<'r>(
        &self,
        registry: &'r CategoryRegistry,
        prompt: &mut dyn Prompt,
        component: Option<&SymbolInfo>,
    ) -> Result<Selection<'r>, ImportError> {
        if let Some(info) = component {
            prompt.say(&describe_component(info)).map_err(ImportError::Prompt)?;
        }
        prompt.say(&render_menu(registry)).map_err(ImportError::Prompt)?;

        let question = format!("Select category (0-{}): ", registry.len());
        self.retry(prompt, &question, &registry.keys(), |answer| {
            if answer == "0" {
                return Some(Selection::Cancelled);
            }
            registry.resolve(answer).map(Selection::Category)
        })
        .map(|choice| choice.unwrap_or(Selection::Cancelled))
    }

    /// Reads several categories as a comma-separated list.
    ///
    /// `0` selects every category. Returns an empty list if input is closed.
    ///
    /// # Errors
    ///
    /// Same as [`CategorySelector::select`].
    pub fn select_many<'r>(
        &self,
        registry: &'r CategoryRegistry,
        prompt: &mut dyn Prompt,
    ) -> Result<Vec<&'r Category>, ImportError> {
        prompt.say(&render_menu_with(registry, " 0. All")).map_err(ImportError::Prompt)?;

        let question = "Select categories (comma-separated, 0 for all): ";
        self.retry(prompt, question, &registry.keys(), |answer| parse_many(registry, answer))
            .map(Option::unwrap_or_default)
    }

    /// Asks until `parse` accepts an answer. `Ok(None)` means input closed.
    fn retry<T>(
        &self,
        prompt: &mut dyn Prompt,
        question: &str,
        valid: &str,
        mut parse: impl FnMut(&str) -> Option<T>,
    ) -> Result<Option<T>, ImportError> {
        let mut last = String::new();
        for attempt in 1..=self.max_attempts {
            let Some(answer) = prompt.ask(question).map_err(ImportError::Prompt)? else {
                debug!("Input closed at category prompt");
                return Ok(None);
            };
            let answer = answer.trim().to_string();
            if let Some(value) = parse(&answer) {
                return Ok(Some(value));
            }

            warn!(input = %answer, attempt, max = self.max_attempts, "Invalid category selection");
            let remaining = self.max_attempts - attempt;
            if remaining > 0 {
                prompt
                    .say(&format!("Invalid selection '{answer}'. {remaining} attempt(s) left."))
                    .map_err(ImportError::Prompt)?;
            }
            last = answer;
        }

        Err(ImportError::InvalidSelection {
            input: last,
            attempts: self.max_attempts,
            valid: valid.to_string(),
        })
    }
}

/// Resolves a category given on the command line without prompting.
///
/// # Errors
///
/// Returns [`ImportError::InvalidSelection`] if `input` names no category.
pub fn resolve_preselected<'r>(
    registry: &'r CategoryRegistry,
    input: &str,
) -> Result<&'r Category, ImportError> {
    registry
        .resolve(input)
        .ok_or_else(|| ImportError::InvalidSelection {
            input: input.to_string(),
            attempts: 1,
            valid: registry.keys(),
        })
}

/// The numbered category menu followed by ` 0. Skip`.
#[must_use]
pub fn render_menu(registry: &CategoryRegistry) -> String {
    render_menu_with(registry, " 0. Skip")
}

fn render_menu_with(registry: &CategoryRegistry, zero: &str) -> String {
    let mut menu = String::from("Categories:\n");
    for category in registry.iter() {
        menu.push_str(&format!(
            "{:2}. {}: {}\n",
            category.index, category.name, category.description
        ));
    }
    menu.push_str(zero);
    menu
}

fn describe_component(info: &SymbolInfo) -> String {
    let mut text = format!("Component: {}", info.name);
    if let Some(footprint) = &info.footprint {
        text.push_str(&format!("\n  Footprint: {footprint}"));
    }
    if let Some(datasheet) = &info.datasheet {
        text.push_str(&format!("\n  Datasheet: {datasheet}"));
    }
    text
}

fn parse_many<'r>(registry: &'r CategoryRegistry, answer: &str) -> Option<Vec<&'r Category>> {
    if answer == "0" {
        return Some(registry.iter().collect());
    }

    let mut chosen: Vec<&Category> = Vec::new();
    for part in answer.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let category = registry.resolve(part)?;
        if !chosen.iter().any(|c| c.key == category.key) {
            chosen.push(category);
        }
    }
    (!chosen.is_empty()).then_some(chosen)
}
