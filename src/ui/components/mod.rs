mod command_input;

pub use command_input::{CommandEvent, CommandInput};

/// Outcome of offering a key to a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed, nothing for the parent to do
  Handled,
  /// Consumed, parent should act on the event
  Event(T),
  /// Not consumed, parent should try its own bindings
  NotHandled,
}
