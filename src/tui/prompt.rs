//! Registered actions and the line editor behind the action prompt.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::error::ActionError;

use super::input::ActionKind;

/// Builds the yes/no question for the entered text, or rejects the input.
pub type ConfirmFn = Box<dyn Fn(&str) -> Result<String, ActionError>>;

/// Performs the action. `Ok(None)` and `Ok(Some(true))` leave the dashboard,
/// `Ok(Some(false))` keeps it on screen.
pub type RunFn = Box<dyn FnMut(&str) -> Result<Option<bool>, ActionError>>;

/// A mutating operation reachable from a letter key.
pub struct Action {
    pub kind: ActionKind,
    pub prompt: String,
    pub confirm: Option<ConfirmFn>,
    /// Shown when the operator answers "no" to the confirmation.
    pub decline_message: Option<String>,
    /// Largest valid item number, for range hints in error messages.
    pub valid_max: Option<usize>,
    /// Shown when the action succeeds and the dashboard stays up.
    pub success_message: Option<String>,
    pub run: RunFn,
}

impl Action {
    pub fn new(
        kind: ActionKind,
        prompt: impl Into<String>,
        run: impl FnMut(&str) -> Result<Option<bool>, ActionError> + 'static,
    ) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
            confirm: None,
            decline_message: None,
            valid_max: None,
            success_message: None,
            run: Box::new(run),
        }
    }

    pub fn with_confirm(
        mut self,
        confirm: impl Fn(&str) -> Result<String, ActionError> + 'static,
        decline_message: Option<&str>,
    ) -> Self {
        self.confirm = Some(Box::new(confirm));
        self.decline_message = decline_message.map(str::to_string);
        self
    }

    pub fn with_valid_max(mut self, max: usize) -> Self {
        self.valid_max = Some(max);
        self
    }

    pub fn with_success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("kind", &self.kind)
            .field("prompt", &self.prompt)
            .field("confirm", &self.confirm.is_some())
            .field("valid_max", &self.valid_max)
            .finish_non_exhaustive()
    }
}

/// Actions available to a dashboard, at most one per kind.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: Vec<Action>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `action`, replacing any earlier one of the same kind.
    pub fn register(&mut self, action: Action) {
        self.actions.retain(|a| a.kind != action.kind);
        self.actions.push(action);
    }

    pub fn contains(&self, kind: ActionKind) -> bool {
        self.actions.iter().any(|a| a.kind == kind)
    }

    /// Removes the action so it can run while the screen is borrowed.
    pub fn take(&mut self, kind: ActionKind) -> Option<Action> {
        let index = self.actions.iter().position(|a| a.kind == kind)?;
        Some(self.actions.swap_remove(index))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// How a prompt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    /// Escape, Ctrl-C or empty input; nothing ran.
    Aborted,
    /// The action ran or failed and the dashboard stays up.
    Stay,
    /// The action finished and the dashboard should close.
    ExitSubview,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Pending,
    Submit(String),
    Cancel,
}

/// Single-line text input.
#[derive(Debug, Default, Clone)]
pub struct LineEditor {
    text: String,
}

impl LineEditor {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn feed(&mut self, key: &KeyEvent) -> Edit {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C')) {
                return Edit::Cancel;
            }
            return Edit::Pending;
        }
        match key.code {
            KeyCode::Enter if self.text.is_empty() => Edit::Cancel,
            KeyCode::Enter => Edit::Submit(std::mem::take(&mut self.text)),
            KeyCode::Esc => Edit::Cancel,
            KeyCode::Backspace | KeyCode::Delete => {
                self.text.pop();
                Edit::Pending
            }
            KeyCode::Char(c) => {
                self.text.push(c);
                Edit::Pending
            }
            _ => Edit::Pending,
        }
    }
}

/// Answer to a yes/no question; `None` while undecided.
pub fn confirm_answer(key: &KeyEvent) -> Option<Option<bool>> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C')).then_some(None);
    }
    match key.code {
        KeyCode::Enter => Some(Some(true)),
        KeyCode::Esc => Some(Some(false)),
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'y' => Some(Some(true)),
            'n' => Some(Some(false)),
            _ => None,
        },
        _ => None,
    }
}

/// Parses an item number typed at a prompt and checks it against `1..=max`.
pub fn parse_item_number(input: &str, max: usize) -> Result<usize, ActionError> {
    let value: i64 = input.trim().parse().map_err(|_| ActionError::InvalidNumber {
        input: input.to_string(),
    })?;
    if value < 1 || value as u64 > max as u64 {
        return Err(ActionError::OutOfRange { value, max });
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(editor: &mut LineEditor, s: &str) {
        for c in s.chars() {
            assert_eq!(editor.feed(&key(KeyCode::Char(c))), Edit::Pending);
        }
    }

    #[test]
    fn test_backspace_edits_input() {
        let mut editor = LineEditor::default();
        type_str(&mut editor, "i-12x");
        editor.feed(&key(KeyCode::Backspace));
        assert_eq!(editor.text(), "i-12");
        assert_eq!(editor.feed(&key(KeyCode::Enter)), Edit::Submit("i-12".to_string()));
        assert_eq!(editor.text(), "");
    }

    #[test]
    fn test_backspace_on_empty_is_noop() {
        let mut editor = LineEditor::default();
        assert_eq!(editor.feed(&key(KeyCode::Backspace)), Edit::Pending);
        assert_eq!(editor.text(), "");
    }

    #[test]
    fn test_escape_and_empty_input_cancel() {
        let mut editor = LineEditor::default();
        type_str(&mut editor, "3");
        assert_eq!(editor.feed(&key(KeyCode::Esc)), Edit::Cancel);

        let mut editor = LineEditor::default();
        assert_eq!(editor.feed(&key(KeyCode::Enter)), Edit::Cancel);

        let mut editor = LineEditor::default();
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(editor.feed(&ctrl_c), Edit::Cancel);
    }

    #[test]
    fn test_confirm_answers() {
        assert_eq!(confirm_answer(&key(KeyCode::Char('Y'))), Some(Some(true)));
        assert_eq!(confirm_answer(&key(KeyCode::Enter)), Some(Some(true)));
        assert_eq!(confirm_answer(&key(KeyCode::Char('n'))), Some(Some(false)));
        assert_eq!(confirm_answer(&key(KeyCode::Char('x'))), None);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(confirm_answer(&ctrl_c), Some(None));
    }

    #[test]
    fn test_parse_item_number() {
        assert_eq!(parse_item_number(" 7 ", 23), Ok(7));
        assert_eq!(
            parse_item_number("abc", 23),
            Err(ActionError::InvalidNumber { input: "abc".to_string() })
        );
        assert_eq!(
            parse_item_number("0", 23),
            Err(ActionError::OutOfRange { value: 0, max: 23 })
        );
        assert_eq!(
            parse_item_number("24", 23),
            Err(ActionError::OutOfRange { value: 24, max: 23 })
        );
    }

    #[test]
    fn test_registry_take_and_replace() {
        let mut registry = ActionRegistry::new();
        registry.register(Action::new(ActionKind::Reboot, "first", |_| Ok(None)));
        registry.register(Action::new(ActionKind::Reboot, "second", |_| Ok(None)));
        assert_eq!(registry.len(), 1);
        let action = registry.take(ActionKind::Reboot).unwrap();
        assert_eq!(action.prompt, "second");
        assert!(!registry.contains(ActionKind::Reboot));
        assert!(registry.take(ActionKind::Delete).is_none());
    }
}
