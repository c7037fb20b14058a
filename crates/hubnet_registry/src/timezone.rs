//! Location to timezone mapping used before OS-level configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};
use crate::models::Environment;

/// Timezone identifiers for one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimezoneEntry {
    /// Windows timezone id, as accepted by `tzutil /s`.
    pub windows: String,
    /// IANA timezone name, as accepted by `timedatectl set-timezone`.
    pub iana: String,
}

impl TimezoneEntry {
    pub fn new(windows: impl Into<String>, iana: impl Into<String>) -> Self {
        Self {
            windows: windows.into(),
            iana: iana.into(),
        }
    }
}

/// Mapping from location (region code) to timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimezoneMap {
    entries: BTreeMap<String, TimezoneEntry>,
}

impl Default for TimezoneMap {
    fn default() -> Self {
        let mut map = Self::empty();
        for (location, windows, iana) in [
            ("eastus", "Eastern Standard Time", "America/New_York"),
            ("eastus2", "Eastern Standard Time", "America/New_York"),
            ("centralus", "Central Standard Time", "America/Chicago"),
            ("southcentralus", "Central Standard Time", "America/Chicago"),
            ("westus", "Pacific Standard Time", "America/Los_Angeles"),
            ("westus2", "Pacific Standard Time", "America/Los_Angeles"),
            ("canadacentral", "Eastern Standard Time", "America/Toronto"),
            ("northeurope", "GMT Standard Time", "Europe/Dublin"),
            ("westeurope", "W. Europe Standard Time", "Europe/Amsterdam"),
            ("uksouth", "GMT Standard Time", "Europe/London"),
            ("southeastasia", "Singapore Standard Time", "Asia/Singapore"),
            ("australiaeast", "AUS Eastern Standard Time", "Australia/Sydney"),
        ] {
            map.insert(location, TimezoneEntry::new(windows, iana));
        }
        map
    }
}

impl TimezoneMap {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, location: impl Into<String>, entry: TimezoneEntry) {
        self.entries.insert(location.into().to_lowercase(), entry);
    }

    pub fn with_entry(mut self, location: impl Into<String>, entry: TimezoneEntry) -> Self {
        self.insert(location, entry);
        self
    }

    /// Overlay another map on top of this one.
    pub fn merge(mut self, overrides: TimezoneMap) -> Self {
        self.entries.extend(overrides.entries);
        self
    }

    pub fn get(&self, location: &str) -> Option<&TimezoneEntry> {
        self.entries.get(&location.to_lowercase())
    }

    /// Resolve the timezone for an environment's location.
    ///
    /// Fails fast when the location is unknown; configuration is never
    /// silently skipped.
    pub fn resolve(&self, environment: &Environment) -> RegistryResult<&TimezoneEntry> {
        self.get(&environment.location)
            .ok_or_else(|| RegistryError::MissingTimezone {
                environment: environment.name.to_string(),
                location: environment.location.clone(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
