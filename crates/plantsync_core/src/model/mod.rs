//! Driving-course domain model.
//!
//! # Responsibility
//! - Define authoritative object snapshots and their visual counterparts.
//! - Keep the two shapes separate: adapters are the only bridge.
//!
//! # Invariants
//! - Every object is addressed by a stable `ObjectRef` (kind + name).
//! - Visual components refer to each other by id or name, never by
//!   ownership.

pub mod component;
pub mod course;
pub mod layout;
pub mod object;
pub mod property;
pub mod reference;
