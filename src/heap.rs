//! Heap object model.
//!
//! Every allocation is an owned byte buffer (or an array header pointing at
//! one) living in a single arena for the rest of the run. References are an
//! opaque handle plus a byte offset, so all address arithmetic and every
//! width-specific load and store goes through here, with the null check first
//! and the bounds check second.

use crate::fault::Fault;
use crate::value::{ObjectId, Pointer};

/// Bytes occupied by an integer in memory.
pub const INT_SIZE: usize = 4;
/// Bytes occupied by a reference in memory (object id, then offset).
pub const REF_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayHeader {
    pub count: u32,
    pub elt_size: u32,
    pub elems: ObjectId,
}

#[derive(Debug)]
enum Object {
    Block(Vec<u8>),
    Array(ArrayHeader),
}

#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Object>,
}

/// The null check every dereference starts with.
pub fn deref(target: Option<Pointer>) -> Result<Pointer, Fault> {
    target.ok_or_else(|| Fault::memory("null dereference"))
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    /// Number of live objects. Nothing is ever freed.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn insert(&mut self, object: Object) -> Result<ObjectId, Fault> {
        let id = ObjectId::from_index(self.objects.len())
            .ok_or_else(|| Fault::memory("heap exhausted"))?;
        self.objects.push(object);
        Ok(id)
    }

    // ── Allocation ───────────────────────────────────────────────────

    /// `new`: a zero-filled block of `size` bytes.
    pub fn alloc_block(&mut self, size: usize) -> Result<Pointer, Fault> {
        self.alloc_bytes(vec![0; size])
    }

    pub fn alloc_bytes(&mut self, bytes: Vec<u8>) -> Result<Pointer, Fault> {
        let id = self.insert(Object::Block(bytes))?;
        Ok(Pointer::new(id, 0))
    }

    /// A fresh NUL-terminated copy of `s`.
    pub fn alloc_string(&mut self, s: &[u8]) -> Result<Pointer, Fault> {
        let mut bytes = Vec::with_capacity(s.len() + 1);
        bytes.extend_from_slice(s);
        bytes.push(0);
        self.alloc_bytes(bytes)
    }

    /// `newarray`: header plus zero-filled storage of `count * elt_size` bytes.
    pub fn alloc_array(&mut self, count: i32, elt_size: u32) -> Result<Pointer, Fault> {
        let count = u32::try_from(count)
            .map_err(|_| Fault::memory(format!("negative array length {count}")))?;
        let bytes = count
            .checked_mul(elt_size)
            .ok_or_else(|| Fault::memory("array size overflow"))?;
        let storage = self.alloc_block(bytes as usize)?;
        let header = ArrayHeader { count, elt_size, elems: storage.object };
        let id = self.insert(Object::Array(header))?;
        Ok(Pointer::new(id, 0))
    }

    // ── Arrays ───────────────────────────────────────────────────────

    pub fn array_header(&self, target: Option<Pointer>) -> Result<ArrayHeader, Fault> {
        let p = deref(target)?;
        match self.objects.get(p.object.index()) {
            Some(Object::Array(header)) if p.offset == 0 => Ok(*header),
            _ => Err(Fault::memory(format!("{p} is not an array"))),
        }
    }

    pub fn array_length(&self, target: Option<Pointer>) -> Result<i32, Fault> {
        let header = self.array_header(target)?;
        i32::try_from(header.count).map_err(|_| Fault::memory("array length out of range"))
    }

    /// `aadds`: address of element `index`, checked against the exact count.
    pub fn element_address(&self, target: Option<Pointer>, index: i32) -> Result<Pointer, Fault> {
        let header = self.array_header(target)?;
        let i = u32::try_from(index)
            .ok()
            .filter(|&i| i < header.count)
            .ok_or_else(|| {
                Fault::memory(format!("index {index} out of bounds for length {}", header.count))
            })?;
        // count * elt_size fit in u32 at allocation, so this cannot overflow
        Ok(Pointer::new(header.elems, i * header.elt_size))
    }

    // ── Addressing ───────────────────────────────────────────────────

    /// `aaddf`: base plus a field offset. The base must be non-null.
    pub fn field_address(&self, target: Option<Pointer>, offset: u8) -> Result<Pointer, Fault> {
        deref(target)?.offset_by(u32::from(offset))
    }

    fn bytes(&self, target: Option<Pointer>, width: usize) -> Result<&[u8], Fault> {
        let p = deref(target)?;
        let start = p.offset as usize;
        match self.objects.get(p.object.index()) {
            Some(Object::Block(bytes)) => start
                .checked_add(width)
                .and_then(|end| bytes.get(start..end))
                .ok_or_else(|| out_of_bounds(p, width, bytes.len())),
            Some(Object::Array(_)) => Err(Fault::memory(format!("{p} is an array header, not data"))),
            None => Err(Fault::memory(format!("dangling reference {p}"))),
        }
    }

    fn bytes_mut(&mut self, target: Option<Pointer>, width: usize) -> Result<&mut [u8], Fault> {
        let p = deref(target)?;
        let start = p.offset as usize;
        match self.objects.get_mut(p.object.index()) {
            Some(Object::Block(bytes)) => {
                let len = bytes.len();
                start
                    .checked_add(width)
                    .and_then(|end| bytes.get_mut(start..end))
                    .ok_or_else(|| out_of_bounds(p, width, len))
            }
            Some(Object::Array(_)) => Err(Fault::memory(format!("{p} is an array header, not data"))),
            None => Err(Fault::memory(format!("dangling reference {p}"))),
        }
    }

    // ── Loads and stores ─────────────────────────────────────────────

    pub fn load_int(&self, target: Option<Pointer>) -> Result<i32, Fault> {
        let b = self.bytes(target, INT_SIZE)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn store_int(&mut self, target: Option<Pointer>, value: i32) -> Result<(), Fault> {
        self.bytes_mut(target, INT_SIZE)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Bytes are signed chars: the loaded value is sign-extended.
    pub fn load_byte(&self, target: Option<Pointer>) -> Result<i32, Fault> {
        let b = self.bytes(target, 1)?;
        Ok(i32::from(b[0] as i8))
    }

    /// Only the low 7 bits are kept, matching the ASCII character model.
    pub fn store_byte(&mut self, target: Option<Pointer>, value: i32) -> Result<(), Fault> {
        self.bytes_mut(target, 1)?[0] = (value & 0x7f) as u8;
        Ok(())
    }

    pub fn load_ref(&self, target: Option<Pointer>) -> Result<Option<Pointer>, Fault> {
        let b = self.bytes(target, REF_SIZE)?;
        let object = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        let offset = u32::from_le_bytes([b[4], b[5], b[6], b[7]]);
        Ok(ObjectId::from_raw(object).map(|id| Pointer::new(id, offset)))
    }

    pub fn store_ref(&mut self, target: Option<Pointer>, value: Option<Pointer>) -> Result<(), Fault> {
        let (object, offset) = value.map_or((0, 0), |p| (p.object.raw(), p.offset));
        let slot = self.bytes_mut(target, REF_SIZE)?;
        slot[..4].copy_from_slice(&object.to_le_bytes());
        slot[4..].copy_from_slice(&offset.to_le_bytes());
        Ok(())
    }

    /// Bytes from `target` up to (not including) the first NUL or the end of
    /// the object. A null string reads as empty.
    pub fn read_c_string(&self, target: Option<Pointer>) -> Result<Vec<u8>, Fault> {
        let Some(p) = target else {
            return Ok(Vec::new());
        };
        let start = p.offset as usize;
        match self.objects.get(p.object.index()) {
            Some(Object::Block(bytes)) => {
                let tail = bytes.get(start..).ok_or_else(|| out_of_bounds(p, 1, bytes.len()))?;
                let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
                Ok(tail[..end].to_vec())
            }
            Some(Object::Array(_)) => Err(Fault::memory(format!("{p} is an array header, not a string"))),
            None => Err(Fault::memory(format!("dangling reference {p}"))),
        }
    }
}

fn out_of_bounds(p: Pointer, width: usize, len: usize) -> Fault {
    Fault::memory(format!("{width}-byte access at {p} outside object of {len} bytes"))
}
