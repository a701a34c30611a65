/// Errors produced by ledger queries and submissions.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("transport error calling {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("ledger gateway {endpoint} returned {status}: {body}")]
    Gateway {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("query failed: {0}")]
    Query(String),

    #[error("malformed ledger response: {0}")]
    Decode(String),

    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Whether retrying the same call may succeed.
    ///
    /// Transient errors must never be read as "no records": a query that
    /// failed says nothing about what the ledger holds.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Query(_) | Self::Unavailable(_) => true,
            Self::Gateway { status, .. } => *status >= 500 || *status == 429,
            Self::Decode(_) | Self::Rejected(_) | Self::Io(_) => false,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LedgerError::Unavailable("down".into()).is_transient());
        assert!(LedgerError::Gateway {
            endpoint: "x".into(),
            status: 502,
            body: String::new()
        }
        .is_transient());
        assert!(LedgerError::Gateway {
            endpoint: "x".into(),
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(!LedgerError::Gateway {
            endpoint: "x".into(),
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!LedgerError::Rejected("bad signature".into()).is_transient());
    }
}
