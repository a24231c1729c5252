//! Address types.

use serde::{Deserialize, Serialize};

use threadly_core::AddressId;
use threadly_core::pricing::GeoPoint;

/// A saved delivery address.
#[derive(Debug, Clone)]
pub struct Address {
    pub id: AddressId,
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub landmark: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub location: Option<GeoPoint>,
    pub is_default: bool,
}

impl Address {
    /// Single-line form used for geocoding and summaries.
    #[must_use]
    pub fn one_line(&self) -> String {
        self.snapshot().one_line()
    }

    /// Copy stored on an order so later edits do not change it.
    #[must_use]
    pub fn snapshot(&self) -> AddressSnapshot {
        AddressSnapshot {
            full_name: self.full_name.clone(),
            phone: self.phone.clone(),
            line1: self.line1.clone(),
            line2: self.line2.clone(),
            landmark: self.landmark.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            pincode: self.pincode.clone(),
        }
    }
}

/// Address as stored on an order (JSONB).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub landmark: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

impl AddressSnapshot {
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.line1.as_str()];
        if let Some(line2) = self.line2.as_deref().filter(|s| !s.is_empty()) {
            parts.push(line2);
        }
        parts.push(&self.city);
        parts.push(&self.state);
        parts.push(&self.pincode);
        parts.join(", ")
    }
}
