/// Classification for retry policy.
///
/// The live request path never retries. This classification is consumed by
/// scheduled jobs that decide whether a failed unit is worth another attempt.
///
/// | Class | Retry on a later attempt? |
/// |-------|---------------------------|
/// | `Never` | No |
/// | `WithBackoff` | Yes, after an exponential delay |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - bad request, bad payload, or missing credentials.
    /// Retrying won't change the answer.
    Never,

    /// Transient failure (429, timeout, 5xx, transport error).
    /// A later attempt with backoff may succeed.
    WithBackoff,
}

impl RetryClass {
    /// Returns true if a scheduled job should try again.
    pub fn is_retryable(self) -> bool {
        matches!(self, RetryClass::WithBackoff)
    }
}
