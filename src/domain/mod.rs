pub mod capture;
pub mod types;

pub use capture::{
    Accepted, CaptureEvent, CapturePayload, ClassificationResult, MatchReason, StoredExchange,
};
pub use types::{PageCommand, Phase, QueueSnapshot, ScrapeCursor, StoreSnapshot};
