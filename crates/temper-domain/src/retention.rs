//! Retention module - the classes a watched root can belong to

use std::fmt;

/// Retention class of a watched root
///
/// Every class owns one subdirectory of the managed root. Anything placed
/// under that subdirectory is deleted once it outlives the class's maximum age.
/// The ordering follows the natural lifetime of the classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RetentionClass {
    /// Kept for about a day
    Daily,

    /// Kept for about a week
    Weekly,

    /// Kept for about a month
    Monthly,
}

impl RetentionClass {
    /// Every retention class, shortest-lived first
    pub const ALL: [RetentionClass; 3] = [
        RetentionClass::Daily,
        RetentionClass::Weekly,
        RetentionClass::Monthly,
    ];

    /// Get the class name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionClass::Daily => "daily",
            RetentionClass::Weekly => "weekly",
            RetentionClass::Monthly => "monthly",
        }
    }

    /// Name of the subdirectory this class owns under the managed root
    pub fn dir_name(&self) -> &'static str {
        self.as_str()
    }

    /// Parse a class from a string, ignoring case
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "daily" => Some(RetentionClass::Daily),
            "weekly" => Some(RetentionClass::Weekly),
            "monthly" => Some(RetentionClass::Monthly),
            _ => None,
        }
    }
}

impl fmt::Display for RetentionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RetentionClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid retention class: {}", s))
    }
}
