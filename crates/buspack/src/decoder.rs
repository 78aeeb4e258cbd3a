use crate::container::Instantiators;
use crate::error::Error;
use crate::error::Result;
use crate::fault::Fault;
use crate::pack::Unpack;
use crate::tag::Tag;
use crate::value::Value;

/// Deepest container nesting a decoder will enter.
pub const MAX_DEPTH: usize = 128;

/// A zero-copy, bounds-checked cursor over a byte slice.
///
/// Reading advances the cursor. Container reads return new decoders
/// restricted to the container's body, sharing the parent's instantiators
/// and one level deeper than the parent. Entering a container past
/// `MAX_DEPTH` fails with `Error::TooDeep`.
///
/// # Errors
/// All read operations return `Error::UnexpectedEnd` if the buffer is exhausted.
#[derive(Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    instantiators: &'a Instantiators,
    depth: usize,
}

impl std::fmt::Debug for Decoder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder").field("remaining", &self.buf.len()).field("depth", &self.depth).finish()
    }
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over the slice using the standard instantiators.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, instantiators: Instantiators::standard_ref(), depth: 0 }
    }

    /// Creates a decoder that builds abstract containers from `instantiators`.
    pub fn with_instantiators(buf: &'a [u8], instantiators: &'a Instantiators) -> Self {
        Self { buf, instantiators, depth: 0 }
    }

    pub fn instantiators(&self) -> &'a Instantiators {
        self.instantiators
    }

    /// Builds a fresh instance of an abstract container type.
    pub fn instantiate<T: ?Sized + 'static>(&self) -> Result<Box<T>> {
        self.instantiators.instantiate::<T>()
    }

    /// How many containers enclose this view.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the remaining bytes in the view.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Fails with `Error::TrailingBytes` unless the view is exhausted.
    pub fn finish(&self) -> Result<()> {
        match self.buf.len() {
            0 => Ok(()),
            n => Err(Error::TrailingBytes(n)),
        }
    }

    /// Peeks the next tag without advancing.
    pub fn peek_tag(&self) -> Result<Tag> {
        let Some(&b) = self.buf.first() else {
            return Err(Error::UnexpectedEnd);
        };
        Tag::from_u8(b).ok_or(Error::InvalidTag(b))
    }

    /// True if the next item is a fault.
    pub fn is_fault(&self) -> bool {
        matches!(self.peek_tag(), Ok(Tag::Fault))
    }

    /// True if the next item is an explicit null.
    pub fn is_null(&self) -> bool {
        matches!(self.peek_tag(), Ok(Tag::Null))
    }

    fn child(&self, buf: &'a [u8]) -> Decoder<'a> {
        Decoder { buf, instantiators: self.instantiators, depth: self.depth }
    }

    fn nested(&self, buf: &'a [u8]) -> Result<Decoder<'a>> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::TooDeep(MAX_DEPTH));
        }
        Ok(Decoder { buf, instantiators: self.instantiators, depth: self.depth + 1 })
    }

    fn consume(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.buf.len() {
            return Err(Error::UnexpectedEnd);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_len(&mut self) -> Result<usize> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?) as usize)
    }

    fn expect_tag(&mut self, expected: Tag) -> Result<()> {
        let found = self.peek_tag()?;
        if found != expected {
            return Err(Error::TypeMismatch { expected, found });
        }
        self.consume(1)
    }

    fn enter(&mut self, expected: Tag) -> Result<Decoder<'a>> {
        self.expect_tag(expected)?;
        let len = self.read_len()?;
        let body = self.read_bytes(len)?;
        self.nested(body)
    }

    /// Skips the next item and its nested children.
    pub fn skip(&mut self) -> Result<()> {
        let tag = self.peek_tag()?;
        self.consume(1)?;
        match tag.fixed_width() {
            Some(width) => self.consume(width),
            None => {
                let len = self.read_len()?;
                self.consume(len)
            }
        }
    }

    /// Splits off the next complete item as its own decoder.
    pub fn item(&mut self) -> Result<Decoder<'a>> {
        let mut probe = self.clone();
        probe.skip()?;
        let len = self.buf.len() - probe.buf.len();
        let bytes = self.read_bytes(len)?;
        Ok(self.child(bytes))
    }

    /// Decodes a bool.
    pub fn bool(&mut self) -> Result<bool> {
        match self.peek_tag()? {
            Tag::True => { self.consume(1)?; Ok(true) }
            Tag::False => { self.consume(1)?; Ok(false) }
            found => Err(Error::TypeMismatch { expected: Tag::True, found }),
        }
    }

    /// Decodes a `u8`.
    pub fn u8(&mut self) -> Result<u8> { self.expect_tag(Tag::U8)?; Ok(self.read_array::<1>()?[0]) }
    /// Decodes an `i8`.
    pub fn i8(&mut self) -> Result<i8> { self.expect_tag(Tag::I8)?; Ok(self.read_array::<1>()?[0] as i8) }

    for_each_number!(decode_number);

    /// Decodes a char (u32 LE).
    pub fn char(&mut self) -> Result<char> {
        self.expect_tag(Tag::Char)?;
        let raw = u32::from_le_bytes(self.read_array::<4>()?);
        char::from_u32(raw).ok_or(Error::InvalidChar(raw))
    }

    /// Decodes Unit `()`.
    pub fn unit(&mut self) -> Result<()> { self.expect_tag(Tag::Unit) }
    /// Decodes an explicit null.
    pub fn null(&mut self) -> Result<()> { self.expect_tag(Tag::Null) }

    /// Decodes a string slice (UTF-8).
    pub fn str(&mut self) -> Result<&'a str> {
        self.expect_tag(Tag::Str)?;
        let len = self.read_len()?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    /// Decodes a byte slice.
    pub fn bytes(&mut self) -> Result<&'a [u8]> {
        self.expect_tag(Tag::Bytes)?;
        let len = self.read_len()?;
        self.read_bytes(len)
    }

    /// Decodes a sequence into an iterator over its items.
    pub fn seq(&mut self) -> Result<SeqIter<'a>> {
        Ok(SeqIter { dec: self.enter(Tag::Seq)? })
    }

    /// Decodes a map into an iterator over its entries.
    pub fn map(&mut self) -> Result<EntryIter<'a>> {
        Ok(EntryIter { dec: self.enter(Tag::Map)? })
    }

    /// Decodes an optional.
    ///
    /// Returns `Some(Decoder)` for the payload if present, or `None` on null.
    pub fn option(&mut self) -> Result<Option<Decoder<'a>>> {
        match self.peek_tag()? {
            Tag::Null => { self.consume(1)?; Ok(None) }
            Tag::Some => Ok(Some(self.enter(Tag::Some)?)),
            found => Err(Error::TypeMismatch { expected: Tag::Some, found }),
        }
    }

    /// Decodes a keyed entry. Returns `(Key, PayloadDecoder)`.
    pub fn entry(&mut self) -> Result<(&'a str, Decoder<'a>)> {
        let mut inner = self.enter(Tag::Entry)?;
        let key = inner.str()?;
        Ok((key, inner))
    }

    /// Decodes a record of any type. Returns `(TypeName, Fields)`.
    pub fn record_any(&mut self) -> Result<(&'a str, RecordFields<'a>)> {
        let mut inner = self.enter(Tag::Record)?;
        let name = inner.str()?;
        let mut fields = Vec::new();
        for entry in (EntryIter { dec: inner }) {
            fields.push(entry?);
        }
        Ok((name, RecordFields { fields }))
    }

    /// Decodes a record, checking it carries the expected type name.
    pub fn record(&mut self, name: &str) -> Result<RecordFields<'a>> {
        let (found, fields) = self.record_any()?;
        if found != name {
            return Err(Error::RecordName { expected: name.to_owned(), found: found.to_owned() });
        }
        Ok(fields)
    }

    /// Decodes a fault.
    pub fn fault(&mut self) -> Result<Fault> {
        let mut inner = self.enter(Tag::Fault)?;
        let kind = inner.str()?;
        let message = inner.str()?;
        let code = inner.i64()?;
        let detail = Value::unpack(&mut inner)?;
        inner.finish()?;
        Ok(Fault::new(kind, message).with_code(code).with_detail(detail))
    }
}

/// Iterator over the items of a sequence.
#[derive(Debug)]
pub struct SeqIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> Iterator for SeqIter<'a> {
    type Item = Result<Decoder<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.dec.is_empty() {
            return None;
        }
        let item = self.dec.item();
        if item.is_err() {
            self.dec.buf = &[];
        }
        Some(item)
    }
}

/// Iterator over the entries of a map or record.
#[derive(Debug)]
pub struct EntryIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> Iterator for EntryIter<'a> {
    type Item = Result<(&'a str, Decoder<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.dec.is_empty() {
            return None;
        }
        let entry = self.dec.entry();
        if entry.is_err() {
            self.dec.buf = &[];
        }
        Some(entry)
    }
}

/// The buffered fields of a decoded record, looked up by name.
///
/// Fields the reader never asks for are ignored, so writers may add
/// fields without breaking older readers.
#[derive(Debug)]
pub struct RecordFields<'a> {
    fields: Vec<(&'a str, Decoder<'a>)>,
}

impl<'a> RecordFields<'a> {
    /// Decodes the named field.
    ///
    /// A missing field decodes as the type's absent value, or fails with
    /// `Error::MissingField` when the type has none.
    pub fn take<T: Unpack>(&mut self, name: &str) -> Result<T> {
        match self.fields.iter().position(|(key, _)| *key == name) {
            Some(index) => {
                let (_, mut dec) = self.fields.remove(index);
                T::unpack(&mut dec)
            }
            None => T::absent().map_err(|_| Error::MissingField(name.to_owned())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(key, _)| *key == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Remaining fields in wire order.
    pub fn into_fields(self) -> Vec<(&'a str, Decoder<'a>)> {
        self.fields
    }
}
