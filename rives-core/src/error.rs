use core::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbiError {
    InvalidHex { field: &'static str, value: String },
    FixedBytesTooLong { field: &'static str, len: usize },
    InvalidAddress { value: String },
}

impl fmt::Display for AbiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHex { field, value } => write!(f, "invalid hex for {field}: {value:?}"),
            Self::FixedBytesTooLong { field, len } => {
                write!(f, "{field} is {len} bytes, expected at most 32")
            }
            Self::InvalidAddress { value } => write!(f, "invalid address: {value:?}"),
        }
    }
}

impl std::error::Error for AbiError {}

#[derive(Clone, Debug, PartialEq)]
pub enum ScoreError {
    /// The scoring expression does not parse.
    Expression { position: usize, message: String },
    /// The outcard carried the JSON marker but the document is malformed.
    Outcard { message: String },
    /// The expression parsed but could not be evaluated against the outcard.
    Evaluation { message: String },
    NotAnInteger { value: f64 },
}

impl fmt::Display for ScoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expression { position, message } => {
                write!(f, "invalid score function at {position}: {message}")
            }
            Self::Outcard { message } => write!(f, "invalid JSON outcard: {message}"),
            Self::Evaluation { message } => write!(f, "score evaluation failed: {message}"),
            Self::NotAnInteger { value } => {
                write!(f, "score {value} cannot be converted to an integer")
            }
        }
    }
}

impl std::error::Error for ScoreError {}

#[derive(Clone, Debug, PartialEq)]
pub enum PayloadError {
    Score(ScoreError),
    Abi(AbiError),
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Score(err) => write!(f, "{err}"),
            Self::Abi(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for PayloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Score(err) => Some(err),
            Self::Abi(err) => Some(err),
        }
    }
}

impl From<ScoreError> for PayloadError {
    fn from(err: ScoreError) -> Self {
        Self::Score(err)
    }
}

impl From<AbiError> for PayloadError {
    fn from(err: AbiError) -> Self {
        Self::Abi(err)
    }
}
