//! # Buspack
//!
//! A small, self-describing codec for rpc payloads.
//!
//! ## Format
//!
//! - **Scalars**: `[Tag: 1b][Data: N]`
//! - **Blobs**: `[Tag: 1b][Len: 4b][Data: Len]`
//! - **Containers**: `[Tag: 1b][Len: 4b][Body: Len]`
//!
//! All integers are Little-Endian. Every item carries its tag, so a reader
//! can tell what comes next without a schema; that is what lets a reply
//! carry either a value or a `Fault` and lets the reader pick the path.
//!
//! Records are written with their type name and named fields. Readers look
//! fields up by name and ignore the ones they do not know.
//!
//! ```
//! use buspack::{Codec, Fault};
//!
//! let mut codec = Codec::new();
//! let bytes = codec.encode(&Some("hello".to_string())).unwrap();
//! assert_eq!(codec.decode::<Option<String>>(&bytes).unwrap().as_deref(), Some("hello"));
//!
//! let bytes = codec.encode(&Fault::new("Boom", "it broke")).unwrap();
//! let outcome = codec.decode_outcome::<String>(&bytes).unwrap();
//! assert_eq!(outcome.unwrap_err().kind(), "Boom");
//! ```

#[macro_use]
mod macros;

mod codec;
mod container;
mod decoder;
mod encoder;
mod error;
mod fault;
mod pack;
mod tag;
mod value;


pub use codec::Codec;
pub use codec::CodecConfig;
pub use codec::CodecConfigBuilder;
pub use container::Instantiators;
pub use container::Mapping;
pub use container::Sequence;
pub use decoder::Decoder;
pub use decoder::MAX_DEPTH;
pub use decoder::EntryIter;
pub use decoder::RecordFields;
pub use decoder::SeqIter;
pub use encoder::Encoder;
pub use error::Error;
pub use error::Result;
pub use fault::Fault;
pub use fault::Throwable;
pub use pack::Pack;
pub use pack::Unpack;
pub use tag::Scope;
pub use tag::Tag;
pub use value::Value;
