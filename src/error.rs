use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadAlongError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parse error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
    #[error("no active page")]
    NoActivePage,
    #[error("page {index} out of range (reader has {len} pages)")]
    PageOutOfRange { index: usize, len: usize },
}

impl ReadAlongError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = ReadAlongError::io(
            "read transcript",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(err.to_string(), "I/O error while read transcript: missing");
    }

    #[test]
    fn page_out_of_range_message() {
        let err = ReadAlongError::PageOutOfRange { index: 4, len: 2 };
        assert_eq!(err.to_string(), "page 4 out of range (reader has 2 pages)");
    }
}
