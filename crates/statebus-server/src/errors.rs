//! Server error types.

use thiserror::Error;

/// A connection's outbound queue is gone.
///
/// Raised when enqueuing to a client whose writer task has already exited.
/// The connection is torn down; other connections are unaffected.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The writer side of the connection has shut down.
    #[error("connection {conn_id} is closed")]
    ConnectionClosed {
        /// Id of the closed connection.
        conn_id: String,
    },
}

/// Startup failures. The only errors fatal to the process.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// `host:port` we tried to bind.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Other socket I/O at startup.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_closed_names_connection() {
        let err = TransportError::ConnectionClosed {
            conn_id: "conn_42".into(),
        };
        assert_eq!(err.to_string(), "connection conn_42 is closed");
    }

    #[test]
    fn bind_error_names_address() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:50080".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        let text = err.to_string();
        assert!(text.contains("127.0.0.1:50080"));
        assert!(text.contains("in use"));
    }
}
