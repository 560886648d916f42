use crate::model::Ms;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A window bound is absent or cannot be parsed. Holds the bound name.
    MissingBound(&'static str),
    InvalidWindow { start: Ms, end: Ms },
    TimestampOutOfRange(Ms),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::MissingBound(bound) => write!(f, "window {bound} is missing or unparseable"),
            EngineError::InvalidWindow { start, end } => {
                write!(f, "invalid window [{start}, {end}): start must be before end")
            }
            EngineError::TimestampOutOfRange(ms) => write!(f, "timestamp out of range: {ms}"),
        }
    }
}

impl std::error::Error for EngineError {}
