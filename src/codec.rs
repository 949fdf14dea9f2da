//! Length-delimited, self-describing message codec.
//!
//! Layout: header `{timestamp_ns, correlation_id, tag}`, one format byte, a
//! key symbol, then the value in the format's shape. Scalars are fixed-width
//! little-endian; symbols carry a u16 length prefix, strings and element
//! payloads a u32. Tensors add `{major order, dims, optional origin}` before
//! their payload.

use crate::error::AgentError;
use crate::symbols::{Sym, SymbolTable};
use crate::value::{Format, MajorOrder, Tensor, Value};

const _: () = assert!(cfg!(target_endian = "little"), "wire codec assumes LE");

pub const MAX_TAG_LEN: usize = u8::MAX as usize;
pub const MAX_SYMBOL_LEN: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, Default)]
pub struct Header {
    pub timestamp_ns: i64,
    pub correlation_id: i64,
}

/// A decoded inbound message. The tag borrows the receive buffer; the value
/// is owned (inbound writes are control-plane, not hot-path).
#[derive(Debug)]
pub struct Message<'a> {
    pub timestamp_ns: i64,
    pub correlation_id: i64,
    pub tag: &'a str,
    pub key: Sym,
    pub value: Value,
}

fn err(msg: &str) -> AgentError {
    AgentError::Communication(msg.to_string())
}

fn scalar_len(value: &Value, symbols: &SymbolTable) -> usize {
    match value {
        Value::Nothing => 0,
        Value::Int(_) | Value::Float(_) => 8,
        Value::Bool(_) => 1,
        Value::Symbol(s) => 2 + symbols.name(*s).len(),
        Value::Str(s) => 4 + s.len(),
        _ => 0,
    }
}

fn tensor_meta_len<T>(t: &Tensor<T>) -> usize {
    // order + ndims + dims + has_origin + optional origin + payload_len
    let nd = t.dims.len();
    2 + nd * 4 + 1 + if t.origin.is_some() { nd * 4 } else { 0 } + 4
}

/// Full encoded length of a message, element payload included.
pub fn encoded_len(tag: &str, key: Sym, value: &Value, symbols: &SymbolTable) -> usize {
    prefix_len(tag, key, value, symbols) + value.payload_bytes().len()
}

/// Encoded length up to (and including) the value metadata, excluding the
/// trailing element payload. Equals `encoded_len` for scalar formats.
pub fn prefix_len(tag: &str, key: Sym, value: &Value, symbols: &SymbolTable) -> usize {
    let head = 8 + 8 + 1 + tag.len() + 1 + 2 + symbols.name(key).len();
    let meta = match value {
        Value::Tuple(items) => {
            1 + items
                .iter()
                .map(|v| 1 + scalar_len(v, symbols))
                .sum::<usize>()
        }
        Value::ArrayInt(_) | Value::ArrayFloat(_) => 4,
        Value::TensorInt(t) => tensor_meta_len(t),
        Value::TensorFloat(t) => tensor_meta_len(t),
        scalar => scalar_len(scalar, symbols),
    };
    head + meta
}

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), AgentError> {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            return Err(err("encode buffer too small"));
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    fn put_u8(&mut self, v: u8) -> Result<(), AgentError> {
        self.put(&[v])
    }

    fn put_u16(&mut self, v: u16) -> Result<(), AgentError> {
        self.put(&v.to_le_bytes())
    }

    fn put_u32(&mut self, v: u32) -> Result<(), AgentError> {
        self.put(&v.to_le_bytes())
    }

    fn put_i32(&mut self, v: i32) -> Result<(), AgentError> {
        self.put(&v.to_le_bytes())
    }

    fn put_i64(&mut self, v: i64) -> Result<(), AgentError> {
        self.put(&v.to_le_bytes())
    }

    fn put_f64(&mut self, v: f64) -> Result<(), AgentError> {
        self.put(&v.to_le_bytes())
    }
}

fn put_scalar(w: &mut Writer<'_>, value: &Value, symbols: &SymbolTable) -> Result<(), AgentError> {
    match value {
        Value::Nothing => Ok(()),
        Value::Int(v) => w.put_i64(*v),
        Value::Float(v) => w.put_f64(*v),
        Value::Bool(v) => w.put_u8(*v as u8),
        Value::Symbol(s) => {
            let name = symbols.name(*s);
            w.put_u16(name.len() as u16)?;
            w.put(name.as_bytes())
        }
        Value::Str(s) => {
            w.put_u32(s.len() as u32)?;
            w.put(s.as_bytes())
        }
        other => Err(err(&format!(
            "{:?} is not a scalar tuple element",
            other.format()
        ))),
    }
}

fn put_tensor_meta<T>(w: &mut Writer<'_>, t: &Tensor<T>) -> Result<(), AgentError> {
    if t.dims.len() > u8::MAX as usize {
        return Err(err("tensor rank exceeds 255"));
    }
    w.put_u8(t.order as u8)?;
    w.put_u8(t.dims.len() as u8)?;
    for d in &t.dims {
        w.put_i32(*d)?;
    }
    match &t.origin {
        Some(origin) => {
            if origin.len() != t.dims.len() {
                return Err(err("tensor origin rank mismatch"));
            }
            w.put_u8(1)?;
            for o in origin {
                w.put_i32(*o)?;
            }
        }
        None => w.put_u8(0)?,
    }
    w.put_u32((t.data.len() * std::mem::size_of::<T>()) as u32)
}

/// Encode everything except the trailing element payload into `dst`.
/// Returns the bytes written. For scalar formats this is the whole message.
pub fn encode_prefix_into(
    dst: &mut [u8],
    header: &Header,
    tag: &str,
    key: Sym,
    value: &Value,
    symbols: &SymbolTable,
) -> Result<usize, AgentError> {
    if tag.len() > MAX_TAG_LEN {
        return Err(err("message tag exceeds 255 bytes"));
    }
    let key_name = symbols.name(key);
    if key_name.len() > MAX_SYMBOL_LEN {
        return Err(err("message key exceeds 65535 bytes"));
    }

    let mut w = Writer::new(dst);
    w.put_i64(header.timestamp_ns)?;
    w.put_i64(header.correlation_id)?;
    w.put_u8(tag.len() as u8)?;
    w.put(tag.as_bytes())?;
    w.put_u8(value.format() as u8)?;
    w.put_u16(key_name.len() as u16)?;
    w.put(key_name.as_bytes())?;

    match value {
        Value::Tuple(items) => {
            if items.len() > u8::MAX as usize {
                return Err(err("tuple arity exceeds 255"));
            }
            w.put_u8(items.len() as u8)?;
            for item in items {
                w.put_u8(item.format() as u8)?;
                put_scalar(&mut w, item, symbols)?;
            }
        }
        Value::ArrayInt(v) => w.put_u32(v.len() as u32)?,
        Value::ArrayFloat(v) => w.put_u32(v.len() as u32)?,
        Value::TensorInt(t) => put_tensor_meta(&mut w, t)?,
        Value::TensorFloat(t) => put_tensor_meta(&mut w, t)?,
        scalar => put_scalar(&mut w, scalar, symbols)?,
    }
    Ok(w.pos)
}

/// Encode a complete message, element payload included.
pub fn encode_into(
    dst: &mut [u8],
    header: &Header,
    tag: &str,
    key: Sym,
    value: &Value,
    symbols: &SymbolTable,
) -> Result<usize, AgentError> {
    let prefix = encode_prefix_into(dst, header, tag, key, value, symbols)?;
    let payload = value.payload_bytes();
    let end = prefix + payload.len();
    if end > dst.len() {
        return Err(err("encode buffer too small"));
    }
    dst[prefix..end].copy_from_slice(payload);
    Ok(end)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], AgentError> {
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(err("message truncated"));
        }
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, AgentError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, AgentError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32, AgentError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn i32(&mut self) -> Result<i32, AgentError> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64, AgentError> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn f64(&mut self) -> Result<f64, AgentError> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn str(&mut self, n: usize) -> Result<&'a str, AgentError> {
        std::str::from_utf8(self.take(n)?).map_err(|_| err("invalid utf-8"))
    }
}

fn take_scalar(
    r: &mut Reader<'_>,
    format: Format,
    symbols: &mut SymbolTable,
) -> Result<Value, AgentError> {
    Ok(match format {
        Format::Nothing => Value::Nothing,
        Format::Int => Value::Int(r.i64()?),
        Format::Float => Value::Float(r.f64()?),
        Format::Bool => Value::Bool(r.u8()? != 0),
        Format::Symbol => {
            let n = r.u16()? as usize;
            Value::Symbol(symbols.intern(r.str(n)?))
        }
        Format::String => {
            let n = r.u32()? as usize;
            Value::Str(r.str(n)?.to_string())
        }
        other => return Err(err(&format!("{other:?} is not a scalar format"))),
    })
}

fn take_tensor_i64(r: &mut Reader<'_>) -> Result<Tensor<i64>, AgentError> {
    let (order, dims, origin, payload) = take_tensor_raw(r, 8)?;
    let data = payload
        .chunks_exact(8)
        .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
        .collect();
    Ok(Tensor {
        order,
        dims,
        origin,
        data,
    })
}

fn take_tensor_f64(r: &mut Reader<'_>) -> Result<Tensor<f64>, AgentError> {
    let (order, dims, origin, payload) = take_tensor_raw(r, 8)?;
    let data = payload
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
        .collect();
    Ok(Tensor {
        order,
        dims,
        origin,
        data,
    })
}

fn take_tensor_raw<'a>(
    r: &mut Reader<'a>,
    elem_size: usize,
) -> Result<(MajorOrder, Vec<i32>, Option<Vec<i32>>, &'a [u8]), AgentError> {
    let order = MajorOrder::from_byte(r.u8()?).ok_or_else(|| err("bad major order"))?;
    let nd = r.u8()? as usize;
    let mut dims = Vec::with_capacity(nd);
    for _ in 0..nd {
        dims.push(r.i32()?);
    }
    let origin = if r.u8()? != 0 {
        let mut o = Vec::with_capacity(nd);
        for _ in 0..nd {
            o.push(r.i32()?);
        }
        Some(o)
    } else {
        None
    };
    let payload_len = r.u32()? as usize;
    if payload_len % elem_size != 0 {
        return Err(err("tensor payload not a whole number of elements"));
    }
    Ok((order, dims, origin, r.take(payload_len)?))
}

/// Decode one complete (reassembled) message. The key symbol is interned if
/// it has not been seen before.
pub fn decode<'a>(buf: &'a [u8], symbols: &mut SymbolTable) -> Result<Message<'a>, AgentError> {
    let mut r = Reader::new(buf);
    let timestamp_ns = r.i64()?;
    let correlation_id = r.i64()?;
    let tag_len = r.u8()? as usize;
    let tag = r.str(tag_len)?;
    let format = Format::from_byte(r.u8()?).ok_or_else(|| err("unknown format byte"))?;
    let key_len = r.u16()? as usize;
    let key = symbols.intern(r.str(key_len)?);

    let value = match format {
        Format::Tuple => {
            let arity = r.u8()? as usize;
            let mut items = Vec::with_capacity(arity);
            for _ in 0..arity {
                let elem_format =
                    Format::from_byte(r.u8()?).ok_or_else(|| err("unknown format byte"))?;
                items.push(take_scalar(&mut r, elem_format, symbols)?);
            }
            Value::Tuple(items)
        }
        Format::ArrayInt => {
            let count = r.u32()? as usize;
            let data = r
                .take(count * 8)?
                .chunks_exact(8)
                .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
                .collect();
            Value::ArrayInt(data)
        }
        Format::ArrayFloat => {
            let count = r.u32()? as usize;
            let data = r
                .take(count * 8)?
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
                .collect();
            Value::ArrayFloat(data)
        }
        Format::TensorInt => Value::TensorInt(take_tensor_i64(&mut r)?),
        Format::TensorFloat => Value::TensorFloat(take_tensor_f64(&mut r)?),
        scalar => take_scalar(&mut r, scalar, symbols)?,
    };

    if r.pos != buf.len() {
        return Err(err("trailing bytes after message"));
    }

    Ok(Message {
        timestamp_ns,
        correlation_id,
        tag,
        key,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: Value) {
        let mut symbols = SymbolTable::new();
        let key = symbols.intern("Gain");
        let header = Header {
            timestamp_ns: 123_456_789,
            correlation_id: 42,
        };
        let mut buf = vec![0u8; encoded_len("block-a", key, &value, &symbols)];
        let n = encode_into(&mut buf, &header, "block-a", key, &value, &symbols).unwrap();
        assert_eq!(n, buf.len());

        let msg = decode(&buf, &mut symbols).unwrap();
        assert_eq!(msg.timestamp_ns, 123_456_789);
        assert_eq!(msg.correlation_id, 42);
        assert_eq!(msg.tag, "block-a");
        assert_eq!(msg.key, key);
        assert_eq!(msg.value, value);
    }

    #[test]
    fn round_trips_every_format() {
        round_trip(Value::Nothing);
        round_trip(Value::Int(-7));
        round_trip(Value::Float(2.5));
        round_trip(Value::Bool(true));
        round_trip(Value::Str("hello".to_string()));
        round_trip(Value::Tuple(vec![
            Value::Int(1),
            Value::Float(0.5),
            Value::Str("x".to_string()),
        ]));
        round_trip(Value::ArrayInt(vec![1, -2, 3]));
        round_trip(Value::ArrayFloat(vec![0.25, -0.5]));
        round_trip(Value::TensorInt(Tensor::row_major(
            vec![2, 2],
            vec![1, 2, 3, 4],
        )));
        round_trip(Value::TensorFloat(Tensor {
            order: MajorOrder::Column,
            dims: vec![3],
            origin: Some(vec![1]),
            data: vec![1.0, 2.0, 3.0],
        }));

        // built-in symbols land on the same tag in any fresh table
        round_trip(Value::Symbol(crate::symbols::sym::STATE));
    }

    #[test]
    fn decode_rejects_truncation() {
        let mut symbols = SymbolTable::new();
        let key = symbols.intern("Gain");
        let value = Value::Int(9);
        let mut buf = vec![0u8; encoded_len("t", key, &value, &symbols)];
        encode_into(&mut buf, &Header::default(), "t", key, &value, &symbols).unwrap();
        assert!(decode(&buf[..buf.len() - 1], &mut symbols).is_err());
    }

    #[test]
    fn nested_tuples_are_rejected() {
        let symbols = SymbolTable::new();
        let value = Value::Tuple(vec![Value::Tuple(vec![])]);
        let mut buf = vec![0u8; 128];
        let res = encode_into(
            &mut buf,
            &Header::default(),
            "t",
            crate::symbols::sym::STATE,
            &value,
            &symbols,
        );
        assert!(res.is_err());
    }
}
