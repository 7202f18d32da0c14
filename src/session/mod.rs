mod machine;
mod targets;

pub use machine::{Command, SessionEvent, SessionMachine, SessionStatus};
