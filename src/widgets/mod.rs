//! Concrete widget behaviors bundled with the runtime.

pub mod counter;
pub mod note;

pub use counter::CounterWidget;
pub use note::NoteWidget;
