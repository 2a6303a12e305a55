/// Ways a pending connect can fail without a token ever being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    /// The attempt was cancelled (explicitly, or by dropping the pending
    /// connect) before the provider redirected back.
    Cancelled,
    /// The redirect carried a token whose `state` does not match the one
    /// sent with this attempt.
    StateMismatch,
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectError::Cancelled => write!(f, "connect attempt cancelled"),
            ConnectError::StateMismatch => {
                write!(f, "redirect state does not match this connect attempt")
            }
        }
    }
}

impl std::error::Error for ConnectError {}
