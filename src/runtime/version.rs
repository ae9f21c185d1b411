// src/runtime/version.rs

use std::fmt;
use std::str::FromStr;

/// A `major.minor.patch` runtime version.
///
/// Parsing is lenient about what real daemons report: missing components
/// default to zero and anything after the first non-numeric character of a
/// component is ignored, so `"17.03.1-ce"` reads as `17.3.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuntimeVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl RuntimeVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for RuntimeVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('v');
        if s.is_empty() {
            return Err("empty version string".to_string());
        }

        let mut parts = [0u64; 3];
        for (idx, component) in s.split('.').take(3).enumerate() {
            let digits: String = component
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if digits.is_empty() {
                if idx == 0 {
                    return Err(format!("invalid version '{s}'"));
                }
                break;
            }
            parts[idx] = digits
                .parse()
                .map_err(|e| format!("invalid version component '{component}': {e}"))?;
            if digits.len() != component.len() {
                break;
            }
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
