#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A decoder rejected its input and the caller asked for fail-fast
    /// semantics. `message` is the formatter output, prefixed with a newline.
    #[error("Decoding error: {message}")]
    Decoding { message: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn is_decoding(&self) -> bool {
        matches!(self, Self::Decoding { .. })
    }
}
