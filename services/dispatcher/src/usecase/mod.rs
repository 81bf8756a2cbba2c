pub mod backoff;
pub mod callback;
pub mod dispatch;
pub mod emit;
pub mod events;
