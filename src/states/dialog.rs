//! The modal text box. One dialog holds a queue of lines; confirm advances
//! through them and the state pops itself once the queue drains. Chain
//! actions append lines to an already-open dialog instead of opening a
//! second one.

use std::any::Any;
use std::collections::VecDeque;

use crate::components::InputEvent;
use crate::states::{GameState, StateContext, StateSink};

pub struct DialogState {
    lines: VecDeque<String>,
    current: Option<String>,
    /// Monster avatar shown beside the text, if any.
    pub avatar: Option<String>,
}

impl DialogState {
    pub fn new(lines: Vec<String>, avatar: Option<String>) -> Self {
        let mut lines: VecDeque<String> = lines.into();
        let current = lines.pop_front();
        Self {
            lines,
            current,
            avatar,
        }
    }

    /// Append one more line; used by dialog chains.
    pub fn append(&mut self, line: String) {
        if self.current.is_none() {
            self.current = Some(line);
        } else {
            self.lines.push_back(line);
        }
    }

    pub fn current_line(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl GameState for DialogState {
    fn name(&self) -> &'static str {
        "DialogState"
    }

    fn process_event(
        &mut self,
        input: InputEvent,
        ctx: &mut StateContext,
        sink: &mut StateSink,
    ) -> Option<InputEvent> {
        if input == InputEvent::Confirm {
            match self.lines.pop_front() {
                Some(next) => self.current = Some(next),
                None => {
                    ctx.bus.emit("dialog_closed", serde_json::Value::Null, None);
                    sink.pop();
                }
            }
        }
        // Modal: nothing falls through while a dialog is open.
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::states::test_support::test_ctx_parts;
    use crate::states::StateStack;

    fn offer(stack: &mut StateStack, input: InputEvent) -> Option<InputEvent> {
        let (mut session, db, mut rng, clock, mut bus) = test_ctx_parts();
        let mut ctx = StateContext {
            session: &mut session,
            db: &db,
            rng: &mut rng,
            clock: &clock,
            bus: &mut bus,
        };
        stack.process_event(input, &mut ctx)
    }

    #[test]
    fn confirm_advances_and_then_closes() {
        let mut stack = StateStack::default();
        stack.push(Box::new(crate::states::WorldState));
        stack.push(Box::new(DialogState::new(
            vec!["First line".to_string(), "Second line".to_string()],
            None,
        )));

        assert_eq!(stack.current_name(), Some("DialogState"));
        assert!(offer(&mut stack, InputEvent::Confirm).is_none());
        assert_eq!(stack.current_name(), Some("DialogState"));
        assert!(offer(&mut stack, InputEvent::Confirm).is_none());
        // Queue drained: the dialog popped itself.
        assert_eq!(stack.current_name(), Some("WorldState"));
    }

    #[test]
    fn movement_is_swallowed_while_open() {
        let mut stack = StateStack::default();
        stack.push(Box::new(DialogState::new(vec!["Hi".to_string()], None)));
        let result = offer(
            &mut stack,
            InputEvent::Move(crate::components::Direction::Left),
        );
        assert!(result.is_none());
        assert_eq!(stack.current_name(), Some("DialogState"));
    }

    #[test]
    fn append_feeds_an_open_dialog() {
        let mut dialog = DialogState::new(vec!["One".to_string()], None);
        dialog.append("Two".to_string());
        assert_eq!(dialog.current_line(), Some("One"));
        assert_eq!(dialog.remaining(), 1);
    }
}
