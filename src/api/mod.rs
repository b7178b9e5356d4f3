pub mod format;

/// Versioned prefix of every resource route
pub const API_PREFIX: &str = "/API/v1.0.0";

pub const STRUCTURE_PATH: &str = "/API/v1.0.0/organizational-structure";
