pub mod appointment;
pub mod intent;
pub mod session;

pub use appointment::{Appointment, SlotStatus};
pub use intent::Intent;
pub use session::{DialogueState, Session, SlotKey, SlotValues, ToolName};
