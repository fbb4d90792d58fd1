/// A query to be sent to the chat provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChatRequest {
    /// The literal text the user submitted.
    pub query: String,
}

impl ChatRequest {
    /// Creates a request for the given query.
    #[inline]
    pub fn new<S: Into<String>>(query: S) -> Self {
        Self {
            query: query.into(),
        }
    }
}
