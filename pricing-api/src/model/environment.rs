use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one deployment of the remote pricing system.
///
/// Each configured destination targets a distinct environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
    Test,
    Staging,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Environment::Test => "Test",
            Environment::Staging => "Staging",
            Environment::Production => "Production",
        };
        write!(f, "{}", s)
    }
}
