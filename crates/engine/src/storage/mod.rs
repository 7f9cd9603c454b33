pub mod migrator;

/// Storage-layer failure shared by the pattern store and the alert ledger.
#[derive(Debug)]
pub enum StoreError {
    Sql(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sql(e) => write!(f, "sql: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Sql(e.to_string())
    }
}

/// Connection-shaped SQL failures are worth one more attempt; constraint and
/// syntax failures are not.
pub fn is_transient(err: &StoreError) -> bool {
    match err {
        StoreError::Sql(msg) => {
            msg.contains("connection")
                || msg.contains("timeout")
                || msg.contains("too many clients")
                || msg.contains("deadlock")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_detection() {
        assert!(is_transient(&StoreError::Sql("connection reset".into())));
        assert!(is_transient(&StoreError::Sql("timeout expired".into())));
        assert!(!is_transient(&StoreError::Sql("syntax error".into())));
    }

    #[test]
    fn error_display() {
        let e = StoreError::Sql("pg down".into());
        assert!(e.to_string().contains("sql"));
    }
}
