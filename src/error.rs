use thiserror::Error;

/// Binary-facing error: a message plus the process exit code.
///
/// Exit codes:
/// - 2: bad input or configuration
/// - 3: insufficient data
/// - 4: internal / numeric failure
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Structural problems with a panel table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PanelError {
    #[error("duplicate panel key: entity '{entity}' at {time}")]
    DuplicateKey { entity: String, time: chrono::NaiveDate },
    #[error("column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("missing identity column: {0}")]
    MissingIdentity(&'static str),
}

/// Model fitting and validation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("required column '{column}' is not present in the table")]
    MissingInput { column: String },
    #[error("insufficient data for {context}: need {needed} observations, have {available}")]
    InsufficientData {
        context: String,
        needed: usize,
        available: usize,
    },
    #[error("singular design matrix: {context}")]
    SingularFit { context: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<PanelError> for AppError {
    fn from(err: PanelError) -> Self {
        AppError::new(2, err.to_string())
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let code = match err {
            FitError::MissingInput { .. } | FitError::InvalidConfig(_) => 2,
            FitError::InsufficientData { .. } => 3,
            FitError::SingularFit { .. } => 4,
        };
        AppError::new(code, err.to_string())
    }
}
