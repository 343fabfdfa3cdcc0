use std::fmt::Display;

/// Result of a best-effort call: either the real value, or a fallback value
/// together with the reason the real one could not be obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Degraded { value: T, reason: String },
}

impl<T> Outcome<T> {
    /// Keep `Ok` values, replace errors with `fallback()`.
    pub fn from_result<E: Display>(result: Result<T, E>, fallback: impl FnOnce() -> T) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(e) => Outcome::Degraded {
                value: fallback(),
                reason: e.to_string(),
            },
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Success(value) | Outcome::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Degraded { reason, .. } => Some(reason),
        }
    }
}
