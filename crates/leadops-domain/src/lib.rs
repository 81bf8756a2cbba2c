//! Domain types shared across leadops services.
//!
//! This crate contains only pure types with no framework dependencies.
//! Import in `usecase/` and `domain/` layers; `infra/` converts to and from them.

pub mod event;
pub mod id;
pub mod pagination;
