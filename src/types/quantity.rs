// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};

/// Physical amount of a lot, e.g. `{ "value": 140, "unit": "kg" }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: String,
}

impl Quantity {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self { value, unit: unit.into() }
    }

    pub fn check(&self) -> ValidationResult<()> {
        if !self.value.is_finite() || self.value <= 0.0 {
            return Err(ValidationError::InvalidQuantity(format!(
                "value must be a positive number, got {}",
                self.value
            )));
        }
        if self.unit.trim().is_empty() {
            return Err(ValidationError::InvalidQuantity("unit is empty".to_string()));
        }
        Ok(())
    }
}
