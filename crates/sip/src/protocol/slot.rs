//! Per-header storage and lazy promotion.
//!
//! Each known header owns one [`HeaderSlot`], absent until the first value is
//! added. A slot starts out [`HeaderSlot::Raw`] when filled from the wire and
//! turns [`HeaderSlot::Parsed`] on first typed access. Once parsed, the typed
//! container is the only source of truth: raw reads and encoding render it
//! back through `Display`, the original bytes are never consulted again.

use std::any::Any;
use std::fmt::Debug;
use std::io::{self, Write};
use std::ops::{Deref, DerefMut};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::grammar::{split_comma_list, HeaderValue};
use crate::protocol::raw::{BufferArena, RawField, RawRange};
use crate::protocol::{HeaderParseError, HeaderType};
use crate::utils::FastWrite;

/// Type-erased view of a parsed slot, so the store can hold any value type.
pub trait ParsedValues: Any + Debug + Send {
    fn clone_box(&self) -> Box<dyn ParsedValues>;

    /// Number of values in the slot.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes one `name: value\r\n` line per value.
    fn encode(&self, name: &str, dst: &mut BytesMut) -> io::Result<()>;

    /// Each value in its canonical text form.
    fn raw_values(&self) -> Vec<Bytes>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl Clone for Box<dyn ParsedValues> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// The typed values of one header, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserContainer<T> {
    values: Vec<T>,
}

impl<T> Default for ParserContainer<T> {
    fn default() -> Self {
        Self { values: Vec::new() }
    }
}

impl<T> ParserContainer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<T> {
        self.values
    }
}

impl<T> From<Vec<T>> for ParserContainer<T> {
    fn from(values: Vec<T>) -> Self {
        Self { values }
    }
}

impl<T> Deref for ParserContainer<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl<T> DerefMut for ParserContainer<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.values
    }
}

impl<T: HeaderValue> ParserContainer<T> {
    /// Parses every raw field, splitting at top-level commas when `comma_list` is set.
    fn parse(arena: &BufferArena, fields: &[RawField], header: &str, comma_list: bool) -> Result<Self, HeaderParseError> {
        let mut values = Vec::with_capacity(fields.len());
        for field in fields {
            let bytes = arena.slice(field.value);
            let raw = std::str::from_utf8(bytes)
                .map_err(|e| HeaderParseError::new(header, String::from_utf8_lossy(bytes), format!("not utf-8: {e}")))?;

            if comma_list {
                for item in split_comma_list(raw) {
                    values.push(T::parse_value(item).map_err(|e| HeaderParseError::new(header, item, e))?);
                }
            } else {
                values.push(T::parse_value(raw).map_err(|e| HeaderParseError::new(header, raw, e))?);
            }
        }
        Ok(Self { values })
    }
}

impl<T: HeaderValue> ParsedValues for ParserContainer<T> {
    fn clone_box(&self) -> Box<dyn ParsedValues> {
        Box::new(self.clone())
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn encode(&self, name: &str, dst: &mut BytesMut) -> io::Result<()> {
        for value in &self.values {
            write!(FastWrite(dst), "{name}: {value}\r\n")?;
        }
        Ok(())
    }

    fn raw_values(&self) -> Vec<Bytes> {
        self.values.iter().map(|value| Bytes::from(value.to_string())).collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Storage state of one header.
#[derive(Debug, Clone)]
pub enum HeaderSlot {
    Raw(Vec<RawField>),
    Parsed(Box<dyn ParsedValues>),
}

impl HeaderSlot {
    /// Number of values: raw lines before promotion, typed values after.
    pub fn len(&self) -> usize {
        match self {
            HeaderSlot::Raw(fields) => fields.len(),
            HeaderSlot::Parsed(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, HeaderSlot::Parsed(_))
    }

    /// Promotes a raw slot in place and returns the typed container.
    ///
    /// A failed parse leaves the slot raw, so a later access retries and fails
    /// the same way.
    pub(crate) fn promote<T: HeaderValue>(
        &mut self,
        arena: &BufferArena,
        header: &str,
        comma_list: bool,
    ) -> Result<&mut ParserContainer<T>, HeaderParseError> {
        if let HeaderSlot::Raw(fields) = self {
            let container = ParserContainer::<T>::parse(arena, fields, header, comma_list)?;
            trace!(header, values = container.len(), "promoted header slot");
            *self = HeaderSlot::Parsed(Box::new(container));
        }

        match self {
            HeaderSlot::Parsed(values) => values
                .as_any_mut()
                .downcast_mut::<ParserContainer<T>>()
                .ok_or_else(|| HeaderParseError::new(header, "", "slot holds a different value type")),
            HeaderSlot::Raw(_) => Err(HeaderParseError::new(header, "", "slot was not promoted")),
        }
    }

    /// The values of the slot as raw bytes, rendered from the typed form when parsed.
    pub(crate) fn raw_values(&self, arena: &BufferArena) -> Vec<Bytes> {
        match self {
            HeaderSlot::Raw(fields) => fields.iter().map(|field| arena.get(field.value)).collect(),
            HeaderSlot::Parsed(values) => values.raw_values(),
        }
    }

    /// Turns a parsed slot back into raw fields stored in `arena`.
    pub(crate) fn demote(&mut self, arena: &mut BufferArena) {
        if let HeaderSlot::Parsed(values) = self {
            let fields = values.raw_values().into_iter().map(|value| RawField::new(None, arena.push(value))).collect();
            *self = HeaderSlot::Raw(fields);
        }
    }

    /// Arena ranges a raw slot still points into; none once parsed.
    pub(crate) fn raw_ranges(&self) -> impl Iterator<Item = RawRange> + '_ {
        let fields: &[RawField] = match self {
            HeaderSlot::Raw(fields) => fields,
            HeaderSlot::Parsed(_) => &[],
        };
        fields.iter().flat_map(|field| field.name.into_iter().chain(Some(field.value)))
    }

    /// Writes the slot; raw lines keep the name as received.
    pub(crate) fn encode(&self, arena: &BufferArena, name: &str, dst: &mut BytesMut) -> io::Result<()> {
        match self {
            HeaderSlot::Raw(fields) => {
                for field in fields {
                    match field.name {
                        Some(raw_name) => dst.put_slice(arena.slice(raw_name)),
                        None => dst.put_slice(name.as_bytes()),
                    }
                    dst.put_slice(b": ");
                    dst.put_slice(arena.slice(field.value));
                    dst.put_slice(b"\r\n");
                }
                Ok(())
            }
            HeaderSlot::Parsed(values) => values.encode(name, dst),
        }
    }
}

/// An extension header, keyed by name.
#[derive(Debug, Clone)]
pub struct UnknownHeader {
    name: String,
    slot: HeaderSlot,
}

impl UnknownHeader {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slot(&self) -> &HeaderSlot {
        &self.slot
    }
}

/// The slot table: one optional slot per [`HeaderType`], then extension
/// headers in insertion order.
#[derive(Debug, Clone)]
pub struct HeaderStore {
    known: Vec<Option<HeaderSlot>>,
    unknown: Vec<UnknownHeader>,
}

impl Default for HeaderStore {
    fn default() -> Self {
        Self { known: vec![None; HeaderType::COUNT], unknown: Vec::new() }
    }
}

impl HeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, header_type: HeaderType) -> Option<&HeaderSlot> {
        self.known[header_type.index()].as_ref()
    }

    pub fn get_mut(&mut self, header_type: HeaderType) -> Option<&mut HeaderSlot> {
        self.known[header_type.index()].as_mut()
    }

    /// The slot for `header_type`, created empty and parsed when absent.
    pub(crate) fn get_or_insert_parsed<T: HeaderValue>(&mut self, header_type: HeaderType) -> &mut HeaderSlot {
        self.known[header_type.index()].get_or_insert_with(|| HeaderSlot::Parsed(Box::new(ParserContainer::<T>::new())))
    }

    pub fn set(&mut self, header_type: HeaderType, slot: HeaderSlot) {
        self.known[header_type.index()] = Some(slot);
    }

    pub fn remove(&mut self, header_type: HeaderType) -> Option<HeaderSlot> {
        self.known[header_type.index()].take()
    }

    /// Appends a raw field, demoting a parsed slot first so order is kept.
    pub(crate) fn push_raw(&mut self, header_type: HeaderType, field: RawField, arena: &mut BufferArena) {
        match &mut self.known[header_type.index()] {
            Some(slot) => {
                slot.demote(arena);
                if let HeaderSlot::Raw(fields) = slot {
                    fields.push(field);
                }
            }
            empty @ None => *empty = Some(HeaderSlot::Raw(vec![field])),
        }
    }

    /// Every arena range referenced by a raw slot, known or extension.
    pub(crate) fn raw_ranges(&self) -> impl Iterator<Item = RawRange> + '_ {
        self.known.iter().flatten().chain(self.unknown.iter().map(|header| &header.slot)).flat_map(HeaderSlot::raw_ranges)
    }

    /// Populated known slots in declaration order.
    pub fn known(&self) -> impl Iterator<Item = (HeaderType, &HeaderSlot)> {
        HeaderType::ALL.iter().zip(&self.known).filter_map(|(header_type, slot)| slot.as_ref().map(|slot| (*header_type, slot)))
    }

    pub fn known_types(&self) -> Vec<HeaderType> {
        self.known().map(|(header_type, _)| header_type).collect()
    }

    pub fn unknown(&self) -> &[UnknownHeader] {
        &self.unknown
    }

    fn unknown_position(&self, name: &str) -> Option<usize> {
        self.unknown.iter().position(|header| header.name.eq_ignore_ascii_case(name))
    }

    pub fn get_unknown(&self, name: &str) -> Option<&HeaderSlot> {
        self.unknown_position(name).map(|index| &self.unknown[index].slot)
    }

    /// The slot of extension header `name`, created empty and parsed when absent.
    pub(crate) fn unknown_or_insert<T: HeaderValue>(&mut self, name: &str) -> &mut HeaderSlot {
        let index = match self.unknown_position(name) {
            Some(index) => index,
            None => {
                let slot = HeaderSlot::Parsed(Box::new(ParserContainer::<T>::new()));
                self.unknown.push(UnknownHeader { name: name.to_string(), slot });
                self.unknown.len() - 1
            }
        };
        &mut self.unknown[index].slot
    }

    /// Appends a raw extension value; same-named headers share one entry.
    pub(crate) fn push_unknown_raw(&mut self, name: &str, field: RawField, arena: &mut BufferArena) {
        match self.unknown_position(name) {
            Some(index) => {
                let slot = &mut self.unknown[index].slot;
                slot.demote(arena);
                if let HeaderSlot::Raw(fields) = slot {
                    fields.push(field);
                }
            }
            None => self.unknown.push(UnknownHeader { name: name.to_string(), slot: HeaderSlot::Raw(vec![field]) }),
        }
    }

    pub fn remove_unknown(&mut self, name: &str) -> bool {
        let before = self.unknown.len();
        self.unknown.retain(|header| !header.name.eq_ignore_ascii_case(name));
        before != self.unknown.len()
    }
}
