//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into ledger/register operations.
//! - Keep callers decoupled from storage details.
//! - Emit domain events after writes commit.

pub mod attendance_service;
pub mod fee_service;
pub mod roster_service;
