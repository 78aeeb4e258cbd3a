use crate::value::Value;

/// A failure carried on the wire in place of a value.
///
/// Faults are how one side tells the other "this call failed" in-band:
/// the receiving decoder sees `Tag::Fault` before anything else and can
/// route the payload to the error path instead of the value path.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    kind: String,
    message: String,
    code: i64,
    detail: Value,
}

impl Fault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into(), code: 0, detail: Value::Null }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<Value>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Builds the fault for a domain error.
    pub fn from_throwable<T: Throwable>(error: &T) -> Self {
        error.to_fault()
    }

    /// Names the error type, e.g. `"TestError"`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn detail(&self) -> &Value {
        &self.detail
    }

    /// True if this fault was raised from a `T`.
    pub fn is<T: Throwable>(&self) -> bool {
        self.kind == T::KIND
    }

    /// Rebuilds the domain error, if this fault came from a `T`.
    pub fn downcast<T: Throwable>(&self) -> Option<T> {
        if self.is::<T>() { T::from_fault(self) } else { None }
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if self.code != 0 {
            write!(f, " (code {})", self.code)?;
        }
        Ok(())
    }
}

impl std::error::Error for Fault {}

/// A domain error that can travel as a `Fault`.
///
/// ```
/// use buspack::{Fault, Throwable};
///
/// #[derive(Debug, PartialEq)]
/// struct Overdrawn { shortfall: i64 }
///
/// impl Throwable for Overdrawn {
///     const KIND: &'static str = "Overdrawn";
///
///     fn to_fault(&self) -> Fault {
///         Fault::new(Self::KIND, "account overdrawn").with_code(self.shortfall)
///     }
///
///     fn from_fault(fault: &Fault) -> Option<Self> {
///         Some(Overdrawn { shortfall: fault.code() })
///     }
/// }
///
/// let fault = Overdrawn { shortfall: 7 }.to_fault();
/// assert_eq!(fault.downcast::<Overdrawn>(), Some(Overdrawn { shortfall: 7 }));
/// ```
pub trait Throwable: Sized {
    /// Stable name written as the fault kind.
    const KIND: &'static str;

    fn to_fault(&self) -> Fault;

    /// Called only for faults whose kind is `KIND`.
    fn from_fault(fault: &Fault) -> Option<Self>;
}
