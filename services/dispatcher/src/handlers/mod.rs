pub mod callback;
pub mod dispatch;
pub mod events;
pub mod health;
