use crate::symbols::Sym;

/// Wire format discriminant. One byte on the wire.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum Format {
    Nothing = 0,
    Int = 1,
    Float = 2,
    Bool = 3,
    Symbol = 4,
    String = 5,
    Tuple = 6,
    ArrayInt = 7,
    ArrayFloat = 8,
    TensorInt = 9,
    TensorFloat = 10,
}

impl Format {
    pub fn from_byte(b: u8) -> Option<Format> {
        Some(match b {
            0 => Format::Nothing,
            1 => Format::Int,
            2 => Format::Float,
            3 => Format::Bool,
            4 => Format::Symbol,
            5 => Format::String,
            6 => Format::Tuple,
            7 => Format::ArrayInt,
            8 => Format::ArrayFloat,
            9 => Format::TensorInt,
            10 => Format::TensorFloat,
            _ => return None,
        })
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum MajorOrder {
    Row = 0,
    Column = 1,
}

impl MajorOrder {
    pub fn from_byte(b: u8) -> Option<MajorOrder> {
        match b {
            0 => Some(MajorOrder::Row),
            1 => Some(MajorOrder::Column),
            _ => None,
        }
    }
}

/// N-dimensional payload with explicit layout. `origin` is an optional
/// offset of this block inside a larger logical tensor.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor<T> {
    pub order: MajorOrder,
    pub dims: Vec<i32>,
    pub origin: Option<Vec<i32>>,
    pub data: Vec<T>,
}

impl<T> Tensor<T> {
    pub fn row_major(dims: Vec<i32>, data: Vec<T>) -> Self {
        Self {
            order: MajorOrder::Row,
            dims,
            origin: None,
            data,
        }
    }
}

/// A property or message value. The set is closed; publish-time dispatch is
/// a match over this enum.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Nothing,
    Int(i64),
    Float(f64),
    Bool(bool),
    Symbol(Sym),
    Str(String),
    /// Scalar elements only; nesting is rejected by the codec.
    Tuple(Vec<Value>),
    ArrayInt(Vec<i64>),
    ArrayFloat(Vec<f64>),
    TensorInt(Tensor<i64>),
    TensorFloat(Tensor<f64>),
}

impl Value {
    pub fn format(&self) -> Format {
        match self {
            Value::Nothing => Format::Nothing,
            Value::Int(_) => Format::Int,
            Value::Float(_) => Format::Float,
            Value::Bool(_) => Format::Bool,
            Value::Symbol(_) => Format::Symbol,
            Value::Str(_) => Format::String,
            Value::Tuple(_) => Format::Tuple,
            Value::ArrayInt(_) => Format::ArrayInt,
            Value::ArrayFloat(_) => Format::ArrayFloat,
            Value::TensorInt(_) => Format::TensorInt,
            Value::TensorFloat(_) => Format::TensorFloat,
        }
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, Value::Nothing)
    }

    /// Raw element bytes for the vectored-offer publish path. Empty for
    /// scalar values.
    pub fn payload_bytes(&self) -> &[u8] {
        match self {
            Value::ArrayInt(v) => i64_bytes(v),
            Value::ArrayFloat(v) => f64_bytes(v),
            Value::TensorInt(t) => i64_bytes(&t.data),
            Value::TensorFloat(t) => f64_bytes(&t.data),
            _ => &[],
        }
    }
}

// Wire numbers are little-endian; these views are only taken on LE hosts
// (compile-time assert in the codec).
pub(crate) fn i64_bytes(v: &[i64]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(v.as_ptr() as *const u8, std::mem::size_of_val(v)) }
}

pub(crate) fn f64_bytes(v: &[f64]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(v.as_ptr() as *const u8, std::mem::size_of_val(v)) }
}
