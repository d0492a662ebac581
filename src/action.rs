//! The external `Context`/`Action` collaborators (§6): a per-event context
//! object and the actions that run against it, plus the action-runner that
//! accumulates the last error across a sequence.

use serde_json::Value;

use crate::tree::LifecycleError;

/// Per-event state threaded through a sequence of actions.
pub trait Context: Send + Sync {
    fn schema(&self) -> &str;

    fn break_on_error(&self) -> bool;
    fn set_break_on_error(&mut self, value: bool);

    fn last_error(&self) -> Option<&str>;
    fn set_last_error(&mut self, message: Option<String>);

    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value);

    fn log(&self, msg_type: &str, message: &str);
}

/// A single step in an action sequence.
pub trait Action: Send + Sync {
    /// The tree path this action is bound to, used for log attribution on
    /// failure.
    fn path(&self) -> String;

    fn call(&self, context: &mut dyn Context) -> Result<(), String>;
}

/// Runs `actions` in order against `context`, accumulating the last error.
/// If `context.break_on_error()` is set at the point an action fails, the
/// run stops immediately and that error is returned. Otherwise every
/// action runs; the accumulated last error is returned only if some action
/// actually failed — a no-op run, or one where every action succeeded,
/// returns `Ok(())`.
pub fn run_actions(actions: &[Box<dyn Action>], context: &mut dyn Context) -> Result<(), LifecycleError> {
    for action in actions {
        if let Err(message) = action.call(context) {
            context.set_last_error(Some(message.clone()));
            if context.break_on_error() {
                context.log("error", &format!("{}: {}", action.path(), message));
                return Err(LifecycleError::ActionFailed {
                    path: action.path(),
                    message,
                });
            }
        }
    }

    match context.last_error() {
        Some(message) if !message.is_empty() => Err(LifecycleError::ActionFailed {
            path: String::new(),
            message: message.to_string(),
        }),
        _ => Ok(()),
    }
}
