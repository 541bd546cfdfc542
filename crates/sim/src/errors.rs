use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GeneticsError>;

/// Errors raised by the genetics engine.
///
/// The three variants separate user mistakes (caught eagerly when a schedule
/// or layout is configured), DSB tract layouts that could not be placed in
/// the allowed number of attempts, and invariant violations that point at a
/// bug in this crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeneticsError {
    /// Invalid user input: rate out of domain, bad interval endpoints,
    /// explicit run count violating thread constraints, mixed sex maps.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Gene conversion tracts could not be laid out without collisions.
    #[error(
        "recombination layout error: no non-overlapping gene conversion tract layout found after \
         {attempts} attempts (mean tract length {mean_tract_length}); {message}"
    )]
    RecombinationLayout {
        attempts: usize,
        mean_tract_length: f64,
        message: String,
    },

    /// An internal invariant was broken.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GeneticsError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for errors caused by user configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<serde_json::Error> for GeneticsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Configuration(format!("JSON error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GeneticsError::config("rate 1.5 out of range");
        assert!(format!("{err}").contains("configuration error"));

        let err = GeneticsError::RecombinationLayout {
            attempts: 100,
            mean_tract_length: 500.0,
            message: "lower the rate".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("100 attempts"));
        assert!(msg.contains("lower the rate"));
    }

    #[test]
    fn test_json_error_is_configuration() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: GeneticsError = json_err.into();
        assert!(err.is_configuration());
    }
}
