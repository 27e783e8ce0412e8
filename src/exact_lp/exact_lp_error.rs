use std::fmt;

/// Error kinds raised by the exact LP.
///
/// Operations return `anyhow::Result`; the kind can be recovered with
/// `error.downcast_ref::<ExactLpError>()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExactLpError {
    /// The coefficient set of a locked row was about to change, or an entity was used in a way
    /// its current state does not allow.
    InvalidModification { context: String },

    /// A coefficient that was expected in a column or row does not exist.
    CoefficientNotFound { column: String, row: String },

    /// The LP backend reported an error.
    BackendFailure { message: String },

    /// Storage could not be grown.
    AllocationFailure { context: String },
}

impl fmt::Display for ExactLpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidModification { context } => {
                write!(f, "invalid modification: {}", context)
            }
            Self::CoefficientNotFound { column, row } => {
                write!(
                    f,
                    "coefficient for row <{}> doesn't exist in column <{}>",
                    row, column
                )
            }
            Self::BackendFailure { message } => write!(f, "LP backend failure: {}", message),
            Self::AllocationFailure { context } => {
                write!(f, "could not allocate memory for {}", context)
            }
        }
    }
}

impl std::error::Error for ExactLpError {}

impl ExactLpError {
    pub fn invalid_modification(context: impl Into<String>) -> anyhow::Error {
        Self::InvalidModification {
            context: context.into(),
        }
        .into()
    }

    /// The kind of an error, if it was raised by the exact LP.
    pub fn kind_of(error: &anyhow::Error) -> Option<&ExactLpError> {
        error.downcast_ref::<ExactLpError>()
    }
}

/// Grows a vector so that `additional` more elements fit, reporting exhaustion as an error
/// instead of aborting.
pub(crate) fn ensure_size<T>(
    vec: &mut Vec<T>,
    additional: usize,
    context: &str,
) -> anyhow::Result<()> {
    vec.try_reserve(additional).map_err(|_| {
        anyhow::Error::from(ExactLpError::AllocationFailure {
            context: context.to_string(),
        })
    })
}
