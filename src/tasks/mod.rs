pub mod driver;
pub mod forwarder;
pub mod queue;
