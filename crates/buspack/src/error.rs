use crate::tag::Scope;
use crate::tag::Tag;

/// Buspack serialization and deserialization errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Byte does not correspond to a valid `Tag`.
    InvalidTag(u8),
    /// A valid tag, but not the one the reader asked for.
    TypeMismatch { expected: Tag, found: Tag },
    /// String data is not valid UTF-8.
    InvalidUtf8,
    /// Code point is not a valid `char`.
    InvalidChar(u32),
    /// Buffer exhausted while reading.
    UnexpectedEnd,
    /// Bytes remain after the value that was asked for.
    TrailingBytes(usize),
    /// Blob or container length exceeds `u32::MAX`.
    BlobTooLarge(usize),
    /// Closing a scope that does not match the active scope stack.
    ScopeMismatch { expected: Scope, actual: Scope },
    /// Attempted to close a scope when only the Root remains.
    ScopeUnderflow,
    /// Attempted to finalize the buffer with open scopes.
    ScopeStillOpen,
    /// A strict scope received the wrong number of items.
    ItemCount { scope: Scope, expected: usize, found: usize },
    /// Attempted to write something other than an entry into a map or record.
    InvalidEntry(Scope),
    /// Record on the wire names a different type than the reader expects.
    RecordName { expected: String, found: String },
    /// Record lacks a field with no absent default.
    MissingField(String),
    /// The payload was empty and the target type has no absent value.
    Absent,
    /// No factory registered for an abstract container type.
    NoInstantiator(&'static str),
    /// Containers nest deeper than the decoder allows.
    TooDeep(usize),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidTag(b) => write!(f, "invalid tag byte: {:#04x}", b),
            Error::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {:?}, found {:?}", expected, found)
            }
            Error::InvalidChar(c) => write!(f, "invalid char code point: {:#x}", c),
            Error::TrailingBytes(n) => write!(f, "{} trailing bytes after value", n),
            Error::ScopeMismatch { expected, actual } => {
                write!(f, "scope mismatch: expected {:?}, found {:?}", expected, actual)
            }
            Error::ItemCount { scope, expected, found } => {
                write!(f, "scope {:?} holds {} items; expected {}", scope, found, expected)
            }
            Error::RecordName { expected, found } => {
                write!(f, "expected record {}, found {}", expected, found)
            }
            Error::MissingField(name) => write!(f, "missing field `{}`", name),
            Error::Absent => write!(f, "empty payload for a type with no absent value"),
            Error::NoInstantiator(ty) => write!(f, "no instantiator registered for {}", ty),
            Error::TooDeep(limit) => write!(f, "containers nested deeper than {} levels", limit),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl std::error::Error for Error {}

/// Specialized `Result` for buspack operations.
pub type Result<T> = std::result::Result<T, Error>;
