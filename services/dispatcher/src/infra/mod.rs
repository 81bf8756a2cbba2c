pub mod clock;
pub mod db;
pub mod sink;
pub mod sql;
