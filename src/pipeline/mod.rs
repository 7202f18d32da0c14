mod classify;
mod subject;
mod trend;
mod whitelist;

pub use classify::{classify, classify_event};
pub use subject::{resolve_subject, UNKNOWN_SUBJECT};
pub use whitelist::Whitelist;
