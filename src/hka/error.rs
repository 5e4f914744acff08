use serde_json::{Value, json};

/// Failure talking to the HKA vendor, or preparing to.
///
/// `status` is HTTP-like: the vendor's own HTTP status when there is one,
/// 422 for a vendor-level rejection inside a 2xx reply, 502 for transport
/// and parse failures, 500 for local configuration problems.
#[derive(Debug, Clone)]
pub struct HkaError {
    pub message: String,
    pub status: u16,
    pub body: Option<Value>,
    transient: bool,
}

impl HkaError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status,
            body: None,
            transient: false,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Local credential or configuration problem; never retried.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    /// The request never produced a usable HTTP response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            transient: true,
            ..Self::new(502, message)
        }
    }

    /// A non-2xx reply from the vendor.
    pub fn vendor(status: u16, message: impl Into<String>, body: Value) -> Self {
        Self {
            transient: status >= 500,
            ..Self::new(status, message).with_body(body)
        }
    }

    /// A 2xx reply whose payload says the operation was not accepted.
    pub fn rejected(message: impl Into<String>, body: Value) -> Self {
        Self::new(422, message).with_body(body)
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Vendor said no (bad document, bad credentials) as opposed to the call
    /// never completing.
    pub fn is_rejection(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "message": self.message,
            "status": self.status,
            "body": self.body,
        })
    }
}

impl std::fmt::Display for HkaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HKA error ({}): {}", self.status, self.message)
    }
}

impl std::error::Error for HkaError {}

impl From<reqwest::Error> for HkaError {
    fn from(err: reqwest::Error) -> Self {
        HkaError::transport(format!("HKA request failed: {err}"))
    }
}
