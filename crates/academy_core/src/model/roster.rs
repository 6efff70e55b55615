//! People referenced by the ledger and the register.

use crate::model::PersonId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parent {
    pub id: PersonId,
    pub name: String,
    pub email: Option<String>,
}

impl Parent {
    pub fn new(name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email,
        }
    }
}

/// A student is billed monthly while `is_active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: PersonId,
    pub name: String,
    pub parent_id: PersonId,
    pub is_active: bool,
}

impl Student {
    pub fn new(name: impl Into<String>, parent_id: PersonId) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            parent_id,
            is_active: true,
        }
    }
}

/// Coaches and staff share one shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: PersonId,
    pub name: String,
}

impl Member {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}
