use crate::error::Error;
use crate::error::Result;
use crate::fault::Fault;
use crate::pack::Pack;
use crate::tag::Scope;
use crate::tag::Tag;

/// An active container scope on the `Encoder` stack.
struct Frame {
    start: usize,
    scope: Scope,
    count: usize,
}

/// A state-machine driven encoder.
///
/// The encoder keeps a stack of open scopes to enforce structure and
/// back-patches container lengths when a scope closes.
///
/// # Structural Invariants
///
/// 1.  **Map and Record scopes**: only entries (`entry_begin`) may be written.
/// 2.  **Some and Entry scopes**: exactly one item.
/// 3.  **Fault scopes**: exactly four items.
/// 4.  **Root scope**: the encoder must be back at the root to hand out bytes.
pub struct Encoder {
    buf: Vec<u8>,
    /// Bottom is always `Scope::Root`.
    stack: Vec<Frame>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// Creates a new encoder.
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(256),
            stack: vec![Frame { start: 0, scope: Scope::Root, count: 0 }],
        }
    }

    /// Drops all written bytes and open scopes, keeping the allocation.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.stack.truncate(1);
        self.stack[0].count = 0;
    }

    /// Number of complete items written at the root.
    pub fn root_items(&self) -> usize {
        self.stack[0].count
    }

    /// Consumes the encoder and returns the final byte vector.
    ///
    /// # Errors
    /// Returns `Error::ScopeStillOpen` if a container is still open.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        if self.stack.len() > 1 {
            return Err(Error::ScopeStillOpen);
        }
        Ok(self.buf)
    }

    /// Returns a view of the current buffer.
    ///
    /// # Errors
    /// Returns `Error::ScopeStillOpen` if a container is still open.
    pub fn as_bytes(&self) -> Result<&[u8]> {
        if self.stack.len() > 1 {
            return Err(Error::ScopeStillOpen);
        }
        Ok(&self.buf)
    }

    fn current_frame(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn check_write(&mut self, tag: Tag) -> Result<()> {
        let frame = self.current_frame();
        match frame.scope {
            Scope::Root | Scope::Seq => Ok(()),
            Scope::Map | Scope::Record if tag != Tag::Entry => Err(Error::InvalidEntry(frame.scope)),
            Scope::Map | Scope::Record => Ok(()),
            Scope::Some | Scope::Entry if frame.count >= 1 => {
                Err(Error::ItemCount { scope: frame.scope, expected: 1, found: frame.count + 1 })
            }
            Scope::Fault if frame.count >= 4 => {
                Err(Error::ItemCount { scope: frame.scope, expected: 4, found: frame.count + 1 })
            }
            Scope::Some | Scope::Entry | Scope::Fault => Ok(()),
        }
    }

    fn on_item_written(&mut self) {
        self.current_frame().count += 1;
    }

    fn write_tag(&mut self, tag: Tag) -> Result<()> {
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        Ok(())
    }

    fn write_len(&mut self, len: usize) -> Result<()> {
        let len = u32::try_from(len).map_err(|_| Error::BlobTooLarge(len))?;
        self.buf.extend_from_slice(&len.to_le_bytes());
        Ok(())
    }

    fn begin_scope(&mut self, tag: Tag, scope: Scope) -> Result<()> {
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&[0, 0, 0, 0]); // Length placeholder
        self.stack.push(Frame { start: self.buf.len(), scope, count: 0 });
        Ok(())
    }

    fn end_scope(&mut self, expected: Scope) -> Result<()> {
        if self.stack.len() <= 1 {
            return Err(Error::ScopeUnderflow);
        }

        let frame = self.current_frame();
        if frame.scope != expected {
            return Err(Error::ScopeMismatch { expected, actual: frame.scope });
        }
        let required = match frame.scope {
            Scope::Some | Scope::Entry => Some(1),
            Scope::Fault => Some(4),
            _ => None,
        };
        if let Some(required) = required {
            if frame.count != required {
                return Err(Error::ItemCount { scope: frame.scope, expected: required, found: frame.count });
            }
        }

        let Some(frame) = self.stack.pop() else {
            return Err(Error::ScopeUnderflow);
        };
        let body_len = self.buf.len() - frame.start;
        let body_len = u32::try_from(body_len).map_err(|_| Error::BlobTooLarge(body_len))?;
        self.buf[frame.start - 4..frame.start].copy_from_slice(&body_len.to_le_bytes());

        self.on_item_written();
        Ok(())
    }

    /// Encodes a boolean value.
    pub fn bool(&mut self, v: bool) -> Result<()> {
        self.write_tag(if v { Tag::True } else { Tag::False })?;
        self.on_item_written();
        Ok(())
    }

    /// Encodes an unsigned 8-bit integer.
    pub fn u8(&mut self, v: u8) -> Result<()> { self.write_tag(Tag::U8)?; self.buf.push(v); self.on_item_written(); Ok(()) }
    /// Encodes a signed 8-bit integer.
    pub fn i8(&mut self, v: i8) -> Result<()> { self.write_tag(Tag::I8)?; self.buf.push(v as u8); self.on_item_written(); Ok(()) }

    for_each_number!(encode_number);

    /// Encodes a char as u32 (LE).
    pub fn char(&mut self, v: char) -> Result<()> {
        self.write_tag(Tag::Char)?;
        self.buf.extend_from_slice(&(v as u32).to_le_bytes());
        self.on_item_written();
        Ok(())
    }

    /// Encodes Unit `()`.
    pub fn unit(&mut self) -> Result<()> { self.write_tag(Tag::Unit)?; self.on_item_written(); Ok(()) }
    /// Encodes the absence of a value.
    pub fn null(&mut self) -> Result<()> { self.write_tag(Tag::Null)?; self.on_item_written(); Ok(()) }

    /// Encodes a UTF-8 string blob.
    pub fn str(&mut self, v: &str) -> Result<()> {
        self.write_tag(Tag::Str)?;
        self.write_len(v.len())?;
        self.buf.extend_from_slice(v.as_bytes());
        self.on_item_written();
        Ok(())
    }

    /// Encodes a raw byte blob.
    pub fn bytes(&mut self, v: &[u8]) -> Result<()> {
        self.write_tag(Tag::Bytes)?;
        self.write_len(v.len())?;
        self.buf.extend_from_slice(v);
        self.on_item_written();
        Ok(())
    }

    /// Begins a sequence. Allows any number of items.
    pub fn seq_begin(&mut self) -> Result<()> { self.begin_scope(Tag::Seq, Scope::Seq) }
    /// Ends a sequence.
    pub fn seq_end(&mut self) -> Result<()> { self.end_scope(Scope::Seq) }

    /// Begins a map.
    ///
    /// # Invariants
    /// - **Strict:** only `entry_begin()` is allowed as a direct child.
    pub fn map_begin(&mut self) -> Result<()> { self.begin_scope(Tag::Map, Scope::Map) }
    /// Ends a map.
    pub fn map_end(&mut self) -> Result<()> { self.end_scope(Scope::Map) }

    /// Begins a present optional.
    ///
    /// # Invariants
    /// - **Strict:** requires exactly one item.
    pub fn some_begin(&mut self) -> Result<()> { self.begin_scope(Tag::Some, Scope::Some) }
    /// Ends a present optional.
    pub fn some_end(&mut self) -> Result<()> { self.end_scope(Scope::Some) }

    /// Begins a keyed entry of a map or record.
    ///
    /// Encodes the key immediately; exactly one value must follow.
    pub fn entry_begin(&mut self, key: &str) -> Result<()> {
        self.begin_scope(Tag::Entry, Scope::Entry)?;
        self.str(key)?;
        // The key is metadata, not payload.
        self.current_frame().count = 0;
        Ok(())
    }
    /// Ends a keyed entry.
    pub fn entry_end(&mut self) -> Result<()> { self.end_scope(Scope::Entry) }

    /// Writes a complete keyed entry.
    pub fn entry<T: Pack + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        self.entry_begin(key)?;
        value.pack(self)?;
        self.entry_end()
    }

    /// Begins a record named after its type. Fields are written as entries.
    pub fn record_begin(&mut self, name: &str) -> Result<()> {
        self.begin_scope(Tag::Record, Scope::Record)?;
        self.write_tag_unchecked(Tag::Str);
        self.write_len(name.len())?;
        self.buf.extend_from_slice(name.as_bytes());
        Ok(())
    }
    /// Ends a record.
    pub fn record_end(&mut self) -> Result<()> { self.end_scope(Scope::Record) }

    /// Writes a record, running `fields` between its begin and end.
    ///
    /// ```
    /// # use buspack::Encoder;
    /// let mut enc = Encoder::new();
    /// enc.record("Point", |enc| {
    ///     enc.entry("x", &1i32)?;
    ///     enc.entry("y", &2i32)
    /// }).unwrap();
    /// ```
    pub fn record(&mut self, name: &str, fields: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        self.record_begin(name)?;
        fields(self)?;
        self.record_end()
    }

    /// Begins a fault: kind, message, code and detail, in that order.
    pub fn fault_begin(&mut self) -> Result<()> { self.begin_scope(Tag::Fault, Scope::Fault) }
    /// Ends a fault.
    pub fn fault_end(&mut self) -> Result<()> { self.end_scope(Scope::Fault) }

    /// Writes a complete fault.
    pub fn fault(&mut self, fault: &Fault) -> Result<()> {
        self.fault_begin()?;
        self.str(fault.kind())?;
        self.str(fault.message())?;
        self.i64(fault.code())?;
        fault.detail().pack(self)?;
        self.fault_end()
    }

    fn write_tag_unchecked(&mut self, tag: Tag) {
        self.buf.push(tag as u8);
    }
}
