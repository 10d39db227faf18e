//! Tagged tree-structured values and the forge that (de)serializes them to
//! bytes for the message plane (§3 "Atom", §4.2).
//!
//! An [`Atom`] is the in-memory value; [`Forge`] writes one into a
//! caller-supplied `&mut [u8]` buffer (the payload reserved from a
//! [`Varchunk`](crate::varchunk::Varchunk) record) and [`read_atom`] parses
//! one back out. Every write is all-or-nothing: a forge that runs out of
//! room leaves the buffer's write cursor exactly where it started, so a
//! failed container write never commits a partial child.

use crate::urid::Urid;

/// A tagged, length-prefixed tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(String),
    Uri(String),
    Urid(Urid),
    Path(String),
    Chunk(Vec<u8>),
    Tuple(Vec<Atom>),
    Vector { child_type: Urid, items: Vec<Atom> },
    /// Key→atom map with optional `id` and `otype`, per §3.
    Object {
        id: Option<Urid>,
        otype: Option<Urid>,
        properties: Vec<(Urid, Atom)>,
    },
    /// Time-stamped event stream. `events` must stay in non-decreasing
    /// `time` order — see invariant 2 in §8.
    Sequence { unit: Urid, events: Vec<(i64, Atom)> },
}

/// Errors the forge or the reader can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AtomError {
    /// The destination buffer had no room for the atom being written.
    #[error("atom forge overflow: buffer too small")]
    Overflow,
    /// A Sequence write appended an event with `time` less than the
    /// previous event's `time`.
    #[error("atom sequence event out of order")]
    SequenceOutOfOrder,
    /// The source buffer ended before a complete atom could be parsed, or
    /// a type tag was not recognised.
    #[error("malformed atom")]
    Malformed,
}

const TAG_INT32: u8 = 0;
const TAG_INT64: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_DOUBLE: u8 = 3;
const TAG_BOOL: u8 = 4;
const TAG_STRING: u8 = 5;
const TAG_URI: u8 = 6;
const TAG_URID: u8 = 7;
const TAG_PATH: u8 = 8;
const TAG_CHUNK: u8 = 9;
const TAG_TUPLE: u8 = 10;
const TAG_VECTOR: u8 = 11;
const TAG_OBJECT: u8 = 12;
const TAG_SEQUENCE: u8 = 13;

fn pad8(n: usize) -> usize {
    (n + 7) & !7
}

/// Writes [`Atom`] values into a fixed output buffer, padding every record
/// to 8-byte alignment as §3 requires.
pub struct Forge<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Forge<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), AtomError> {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            return Err(AtomError::Overflow);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    fn write_header(&mut self, size: u32, type_tag: u8) -> Result<(), AtomError> {
        self.write_raw(&size.to_ne_bytes())?;
        self.write_raw(&[type_tag, 0, 0, 0])
    }

    fn pad_to_8(&mut self) -> Result<(), AtomError> {
        let padded = pad8(self.pos);
        if padded > self.buf.len() {
            return Err(AtomError::Overflow);
        }
        for b in &mut self.buf[self.pos..padded] {
            *b = 0;
        }
        self.pos = padded;
        Ok(())
    }

    /// Writes `atom`, restoring the cursor to its pre-call position if the
    /// buffer runs out of room partway through a container.
    pub fn write_atom(&mut self, atom: &Atom) -> Result<(), AtomError> {
        let start = self.pos;
        match self.write_atom_inner(atom) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.pos = start;
                Err(e)
            }
        }
    }

    fn write_atom_inner(&mut self, atom: &Atom) -> Result<(), AtomError> {
        match atom {
            Atom::Int32(v) => {
                self.write_header(4, TAG_INT32)?;
                self.write_raw(&v.to_ne_bytes())?;
            }
            Atom::Int64(v) => {
                self.write_header(8, TAG_INT64)?;
                self.write_raw(&v.to_ne_bytes())?;
            }
            Atom::Float(v) => {
                self.write_header(4, TAG_FLOAT)?;
                self.write_raw(&v.to_ne_bytes())?;
            }
            Atom::Double(v) => {
                self.write_header(8, TAG_DOUBLE)?;
                self.write_raw(&v.to_ne_bytes())?;
            }
            Atom::Bool(v) => {
                self.write_header(1, TAG_BOOL)?;
                self.write_raw(&[u8::from(*v)])?;
            }
            Atom::String(s) => self.write_text(s, TAG_STRING)?,
            Atom::Uri(s) => self.write_text(s, TAG_URI)?,
            Atom::Path(s) => self.write_text(s, TAG_PATH)?,
            Atom::Urid(u) => {
                self.write_header(4, TAG_URID)?;
                self.write_raw(&u.get().to_ne_bytes())?;
            }
            Atom::Chunk(bytes) => {
                self.write_header(bytes.len() as u32, TAG_CHUNK)?;
                self.write_raw(bytes)?;
            }
            Atom::Tuple(items) => {
                let size_pos = self.pos;
                self.write_header(0, TAG_TUPLE)?;
                let body_start = self.pos;
                self.write_raw(&(items.len() as u32).to_ne_bytes())?;
                for item in items {
                    self.write_atom_inner(item)?;
                }
                let size = (self.pos - body_start) as u32;
                self.patch_size(size_pos, size);
            }
            Atom::Vector { child_type, items } => {
                let size_pos = self.pos;
                self.write_header(0, TAG_VECTOR)?;
                let body_start = self.pos;
                self.write_raw(&child_type.get().to_ne_bytes())?;
                self.write_raw(&(items.len() as u32).to_ne_bytes())?;
                for item in items {
                    self.write_atom_inner(item)?;
                }
                let size = (self.pos - body_start) as u32;
                self.patch_size(size_pos, size);
            }
            Atom::Object {
                id,
                otype,
                properties,
            } => {
                let size_pos = self.pos;
                self.write_header(0, TAG_OBJECT)?;
                let body_start = self.pos;
                self.write_raw(&id.unwrap_or(Urid::NONE).get().to_ne_bytes())?;
                self.write_raw(&otype.unwrap_or(Urid::NONE).get().to_ne_bytes())?;
                self.write_raw(&(properties.len() as u32).to_ne_bytes())?;
                for (key, value) in properties {
                    self.write_raw(&key.get().to_ne_bytes())?;
                    self.write_atom_inner(value)?;
                }
                let size = (self.pos - body_start) as u32;
                self.patch_size(size_pos, size);
            }
            Atom::Sequence { unit, events } => {
                let size_pos = self.pos;
                self.write_header(0, TAG_SEQUENCE)?;
                let body_start = self.pos;
                self.write_raw(&unit.get().to_ne_bytes())?;
                self.write_raw(&(events.len() as u32).to_ne_bytes())?;
                let mut last_time = i64::MIN;
                for (time, body) in events {
                    if *time < last_time {
                        return Err(AtomError::SequenceOutOfOrder);
                    }
                    last_time = *time;
                    self.write_raw(&time.to_ne_bytes())?;
                    self.write_atom_inner(body)?;
                }
                let size = (self.pos - body_start) as u32;
                self.patch_size(size_pos, size);
            }
        }
        self.pad_to_8()
    }

    fn write_text(&mut self, s: &str, tag: u8) -> Result<(), AtomError> {
        self.write_header(s.len() as u32, tag)?;
        self.write_raw(s.as_bytes())
    }

    fn patch_size(&mut self, header_pos: usize, size: u32) {
        self.buf[header_pos..header_pos + 4].copy_from_slice(&size.to_ne_bytes());
    }
}

/// Parses one atom starting at the front of `buf`, returning the atom and
/// the number of bytes consumed (including 8-byte padding).
pub fn read_atom(buf: &[u8]) -> Result<(Atom, usize), AtomError> {
    if buf.len() < 8 {
        return Err(AtomError::Malformed);
    }
    let size = u32::from_ne_bytes(buf[0..4].try_into().unwrap()) as usize;
    let tag = buf[4];
    let body_start = 8;
    let body_end = body_start + size;
    if body_end > buf.len() {
        return Err(AtomError::Malformed);
    }
    let body = &buf[body_start..body_end];

    let atom = match tag {
        TAG_INT32 => Atom::Int32(i32::from_ne_bytes(
            body.get(0..4).ok_or(AtomError::Malformed)?.try_into().unwrap(),
        )),
        TAG_INT64 => Atom::Int64(i64::from_ne_bytes(
            body.get(0..8).ok_or(AtomError::Malformed)?.try_into().unwrap(),
        )),
        TAG_FLOAT => Atom::Float(f32::from_ne_bytes(
            body.get(0..4).ok_or(AtomError::Malformed)?.try_into().unwrap(),
        )),
        TAG_DOUBLE => Atom::Double(f64::from_ne_bytes(
            body.get(0..8).ok_or(AtomError::Malformed)?.try_into().unwrap(),
        )),
        TAG_BOOL => Atom::Bool(*body.first().ok_or(AtomError::Malformed)? != 0),
        TAG_STRING => Atom::String(String::from_utf8_lossy(body).into_owned()),
        TAG_URI => Atom::Uri(String::from_utf8_lossy(body).into_owned()),
        TAG_PATH => Atom::Path(String::from_utf8_lossy(body).into_owned()),
        TAG_URID => Atom::Urid(Urid(u32::from_ne_bytes(
            body.get(0..4).ok_or(AtomError::Malformed)?.try_into().unwrap(),
        ))),
        TAG_CHUNK => Atom::Chunk(body.to_vec()),
        TAG_TUPLE => {
            let count = read_u32(body, 0)? as usize;
            let mut items = Vec::with_capacity(count);
            let mut cursor = 4;
            for _ in 0..count {
                let (item, used) = read_atom(&body[cursor..])?;
                items.push(item);
                cursor += used;
            }
            Atom::Tuple(items)
        }
        TAG_VECTOR => {
            let child_type = Urid(read_u32(body, 0)?);
            let count = read_u32(body, 4)? as usize;
            let mut items = Vec::with_capacity(count);
            let mut cursor = 8;
            for _ in 0..count {
                let (item, used) = read_atom(&body[cursor..])?;
                items.push(item);
                cursor += used;
            }
            Atom::Vector { child_type, items }
        }
        TAG_OBJECT => {
            let id = Urid(read_u32(body, 0)?);
            let otype = Urid(read_u32(body, 4)?);
            let count = read_u32(body, 8)? as usize;
            let mut properties = Vec::with_capacity(count);
            let mut cursor = 12;
            for _ in 0..count {
                let key = Urid(read_u32(body, cursor)?);
                cursor += 4;
                let (value, used) = read_atom(&body[cursor..])?;
                cursor += used;
                properties.push((key, value));
            }
            Atom::Object {
                id: (id != Urid::NONE).then_some(id),
                otype: (otype != Urid::NONE).then_some(otype),
                properties,
            }
        }
        TAG_SEQUENCE => {
            let unit = Urid(read_u32(body, 0)?);
            let count = read_u32(body, 4)? as usize;
            let mut events = Vec::with_capacity(count);
            let mut cursor = 8;
            for _ in 0..count {
                let time = i64::from_ne_bytes(
                    body.get(cursor..cursor + 8)
                        .ok_or(AtomError::Malformed)?
                        .try_into()
                        .unwrap(),
                );
                cursor += 8;
                let (value, used) = read_atom(&body[cursor..])?;
                cursor += used;
                events.push((time, value));
            }
            Atom::Sequence { unit, events }
        }
        _ => return Err(AtomError::Malformed),
    };

    Ok((atom, pad8(body_end)))
}

fn read_u32(buf: &[u8], at: usize) -> Result<u32, AtomError> {
    Ok(u32::from_ne_bytes(
        buf.get(at..at + 4).ok_or(AtomError::Malformed)?.try_into().unwrap(),
    ))
}
