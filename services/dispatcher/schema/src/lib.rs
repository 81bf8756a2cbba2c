//! sea-orm entities for the dispatcher's tables.

pub mod agent_runs;
pub mod events;
