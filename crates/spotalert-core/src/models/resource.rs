//! Monitored resource identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one priced spot resource: instance type, zone and product class
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    /// EC2 instance type (e.g. `r3.8xlarge`)
    pub instance_type: String,
    /// Availability zone (e.g. `us-west-2b`)
    pub availability_zone: String,
    /// Product description (e.g. `Linux/UNIX`)
    pub product_description: String,
}

impl ResourceId {
    /// Create a new resource identifier
    pub fn new(
        instance_type: impl Into<String>,
        availability_zone: impl Into<String>,
        product_description: impl Into<String>,
    ) -> Self {
        Self {
            instance_type: instance_type.into(),
            availability_zone: availability_zone.into(),
            product_description: product_description.into(),
        }
    }

    /// Region that owns the availability zone (`us-west-2b` -> `us-west-2`)
    ///
    /// Returns `None` when the zone does not look like `<region><letter>`.
    pub fn region(&self) -> Option<&str> {
        let zone = self.availability_zone.trim();
        let region = zone.trim_end_matches(|c: char| c.is_ascii_lowercase());
        let ends_with_digit = region.chars().last().is_some_and(|c| c.is_ascii_digit());

        if region.len() < zone.len() && ends_with_digit {
            Some(region)
        } else {
            None
        }
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new("r3.8xlarge", "us-west-2b", "Linux/UNIX")
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.instance_type, self.availability_zone, self.product_description
        )
    }
}
