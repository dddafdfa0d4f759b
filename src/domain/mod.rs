// Domain types and value objects
pub mod event;
pub mod symbol;

// Re-export commonly used types
pub use event::{Direction, Event};
pub use symbol::Symbol;
