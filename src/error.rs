use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the calorimeter scoring core.
///
/// Every variant is fatal for the run that produced it: nothing in this crate
/// retries or swallows an error, it is surfaced to whoever drives the run.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad geometry, cell grid or source parameters. Raised before any run starts.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A deposit mapped outside the declared (layer, cell) space.
    ///
    /// Signals an inconsistency between the geometry and the transport engine
    /// that reported the step; the run must abort.
    #[error("deposit out of bounds: layer={layer}, cell_x={cell_x}, cell_y={cell_y}")]
    OutOfBoundsDeposit {
        layer: i64,
        cell_x: i64,
        cell_y: i64,
    },

    /// A deposit sample with a negative or non-finite energy.
    #[error("invalid deposit: {0}")]
    InvalidDeposit(String),

    /// The output location could not be created or opened.
    #[error("record store unavailable at {}: {source}", .path.display())]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Event begin/end signals arrived out of order.
    #[error("event lifecycle violation: {0}")]
    EventLifecycle(&'static str),

    /// A stored record line that parses but breaks the record layout.
    #[error("malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// Record or config (de)serialization failure.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Propagated I/O errors on an already open store.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_errors_convert_with_question_mark() {
        fn parse(s: &str) -> Result<serde_json::Value> {
            Ok(serde_json::from_str(s)?)
        }
        assert!(matches!(parse("{\"NLayer\":"), Err(Error::Serialization(_))));
    }

    #[test]
    fn malformed_record_names_the_line() {
        let e = Error::MalformedRecord {
            line: 7,
            reason: "Pos has 2 entries but Edep has 1".to_string(),
        };
        let msg = e.to_string();
        assert!(msg.contains("line 7"));
        assert!(msg.contains("Edep has 1"));
    }

    #[test]
    fn out_of_bounds_reports_all_indices() {
        let e = Error::OutOfBoundsDeposit {
            layer: 26,
            cell_x: 0,
            cell_y: -1,
        };
        let msg = e.to_string();
        assert!(msg.contains("layer=26"));
        assert!(msg.contains("cell_y=-1"));
    }

    #[test]
    fn store_unavailable_names_the_path() {
        let e = Error::StoreUnavailable {
            path: PathBuf::from("/nonexistent/out.jsonl"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(e.to_string().contains("/nonexistent/out.jsonl"));
    }
}
