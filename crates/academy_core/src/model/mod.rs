//! Domain model for the fee ledger and attendance register.
//!
//! # Invariants
//! - Every persisted object is identified by a stable UUID.
//! - Amounts are integer minor units (`Money`), never floats.
//! - Deletion is represented by soft-delete tombstones, not hard delete.

pub mod attendance;
pub mod fee;
pub mod money;
pub mod roster;

use uuid::Uuid;

/// Identifier of a parent, student, coach or staff member.
pub type PersonId = Uuid;
