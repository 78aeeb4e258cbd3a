/// Identifies the type of the encoded value.
///
/// Every item starts with one tag byte, which is what lets a decoder skip
/// values it does not understand.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Padding (skipped).
    Pad = 0x00,

    // Fixed-width scalars
    True = 0x01,
    False = 0x02,
    U8 = 0x03,
    U16 = 0x04,
    U32 = 0x05,
    U64 = 0x06,
    I8 = 0x07,
    I16 = 0x08,
    I32 = 0x09,
    I64 = 0x0A,
    F32 = 0x0B,
    F64 = 0x0C,
    Char = 0x0D,

    // Markers
    Unit = 0x0E,
    Null = 0x0F,

    // Blobs (Tag + u32 Len + Bytes)
    Str = 0x10,
    Bytes = 0x11,

    // Containers (Tag + u32 Len + Body)
    Seq = 0x20,
    Map = 0x21,
    Some = 0x30,
    Entry = 0x33,
    Record = 0x34,
    Fault = 0x40,
}

impl Tag {
    /// Returns the tag for a given byte, or `None` if invalid.
    pub fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            0x00 => Tag::Pad,
            0x01 => Tag::True,
            0x02 => Tag::False,
            0x03 => Tag::U8,
            0x04 => Tag::U16,
            0x05 => Tag::U32,
            0x06 => Tag::U64,
            0x07 => Tag::I8,
            0x08 => Tag::I16,
            0x09 => Tag::I32,
            0x0A => Tag::I64,
            0x0B => Tag::F32,
            0x0C => Tag::F64,
            0x0D => Tag::Char,
            0x0E => Tag::Unit,
            0x0F => Tag::Null,
            0x10 => Tag::Str,
            0x11 => Tag::Bytes,
            0x20 => Tag::Seq,
            0x21 => Tag::Map,
            0x30 => Tag::Some,
            0x33 => Tag::Entry,
            0x34 => Tag::Record,
            0x40 => Tag::Fault,
            _ => return None,
        })
    }

    /// Width of the payload that follows the tag, for fixed-width items.
    ///
    /// Returns `None` for blobs and containers, which carry a u32 length.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            Tag::Pad | Tag::True | Tag::False | Tag::Unit | Tag::Null => Some(0),
            Tag::U8 | Tag::I8 => Some(1),
            Tag::U16 | Tag::I16 => Some(2),
            Tag::U32 | Tag::I32 | Tag::F32 | Tag::Char => Some(4),
            Tag::U64 | Tag::I64 | Tag::F64 => Some(8),
            Tag::Str | Tag::Bytes | Tag::Seq | Tag::Map | Tag::Some
            | Tag::Entry | Tag::Record | Tag::Fault => None,
        }
    }
}

/// Open container kinds tracked on the `Encoder` stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The virtual root; allows any number of items.
    Root,
    /// Ordered sequence; allows any number of items.
    Seq,
    /// Key-value container; only `Tag::Entry` items.
    Map,
    /// Present optional; exactly one item.
    Some,
    /// Named payload inside a map or record; exactly one item after the key.
    Entry,
    /// Named record; only `Tag::Entry` items after the type name.
    Record,
    /// Failure payload; exactly four items (kind, message, code, detail).
    Fault,
}
