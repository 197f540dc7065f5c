//! Runtime cell values.
//!
//! `Value` carries a total order (NULL first, numerics compared across
//! widths, otherwise by type) so that it can key secondary indexes, sort
//! rows and name group keys without extra wrappers.

use crate::row::RowId;
use crate::types::DataType;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

/// A value that can be stored in a cell or produced by an expression.
#[derive(Clone, Debug)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// UTF-8 string
    String(String),
    /// DateTime stored as Unix timestamp in milliseconds
    DateTime(i64),
    /// Binary data
    Bytes(Vec<u8>),
    /// Reference to a stored object by identity
    Reference(RowId),
}

impl Value {
    /// Returns the data type of this value, or None if it's Null.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Int32(_) => Some(DataType::Int32),
            Value::Int64(_) => Some(DataType::Int64),
            Value::Float64(_) => Some(DataType::Float64),
            Value::String(_) => Some(DataType::String),
            Value::DateTime(_) => Some(DataType::DateTime),
            Value::Bytes(_) => Some(DataType::Bytes),
            Value::Reference(_) => Some(DataType::Reference),
        }
    }

    /// Returns true if this value is Null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Returns the referenced identity if this is a Reference.
    pub fn as_reference(&self) -> Option<RowId> {
        match self {
            Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// Widens any numeric value to f64.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            // numerics share a rank; they compare by magnitude
            Value::Int32(_) | Value::Int64(_) | Value::Float64(_) => 2,
            Value::String(_) => 3,
            Value::DateTime(_) => 4,
            Value::Bytes(_) => 5,
            Value::Reference(_) => 6,
        }
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    // NaN sorts after every other number
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Int32(a), Value::Int32(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::Int32(a), Value::Int64(b)) => (*a as i64).cmp(b),
            (Value::Int64(a), Value::Int32(b)) => a.cmp(&(*b as i64)),
            (Value::Float64(a), Value::Float64(b)) => cmp_f64(*a, *b),
            (Value::Float64(a), _) if other.type_order() == 2 => {
                cmp_f64(*a, other.as_numeric().unwrap_or_default())
            }
            (_, Value::Float64(b)) if self.type_order() == 2 => {
                cmp_f64(self.as_numeric().unwrap_or_default(), *b)
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Reference(a), Value::Reference(b)) => a.cmp(b),
            _ => self.type_order().cmp(&other.type_order()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // equal values must hash alike, so numerics hash by magnitude
        self.type_order().hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Int32(_) | Value::Int64(_) | Value::Float64(_) => {
                let n = self.as_numeric().unwrap_or_default();
                let bits = if n.is_nan() {
                    f64::NAN.to_bits()
                } else if n == 0.0 {
                    0u64
                } else {
                    n.to_bits()
                };
                bits.hash(state);
            }
            Value::String(s) => s.hash(state),
            Value::DateTime(d) => d.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Reference(id) => id.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int32(i) => write!(f, "{}", i),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "'{}'", s),
            Value::DateTime(d) => write!(f, "datetime({})", d),
            Value::Bytes(b) => write!(f, "bytes[{}]", b.len()),
            Value::Reference(id) => write!(f, "ref#{}", id),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Boolean,
    i32 => Int32,
    i64 => Int64,
    f64 => Float64,
    String => String,
    Vec<u8> => Bytes,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_value_type_check() {
        assert_eq!(Value::Int64(42).data_type(), Some(DataType::Int64));
        assert_eq!(Value::Reference(3).data_type(), Some(DataType::Reference));
        assert_eq!(Value::Null.data_type(), None);
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Int32(42).as_i32(), Some(42));
        assert_eq!(Value::Int64(100).as_i64(), Some(100));
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::Reference(9).as_reference(), Some(9));
        assert_eq!(Value::Int32(2).as_numeric(), Some(2.0));
    }

    #[test]
    fn test_value_ordering() {
        assert!(Value::Null < Value::Int32(0));
        assert!(Value::Int32(1) < Value::Int64(2));
        assert!(Value::Int64(2) < Value::Float64(2.5));
        assert!(Value::Float64(2.5) < Value::Int32(3));
        assert!(Value::Int64(i64::MAX) < Value::String(String::new()));
        assert!(Value::String("a".into()) < Value::String("b".into()));
        assert!(Value::Reference(1) < Value::Reference(2));
    }

    #[test]
    fn test_value_equality_across_numeric_widths() {
        assert_eq!(Value::Int32(42), Value::Int64(42));
        assert_eq!(Value::Int64(2), Value::Float64(2.0));
        assert_ne!(Value::Int64(1), Value::String("1".into()));
        assert_ne!(Value::Reference(1), Value::Int64(1));
    }

    #[test]
    fn test_value_nan_is_largest_number() {
        assert!(Value::Float64(f64::NAN) > Value::Float64(f64::INFINITY));
        assert_eq!(Value::Float64(f64::NAN), Value::Float64(f64::NAN));
    }

    #[test]
    fn test_value_from_impls() {
        let v: Value = 42i32.into();
        assert_eq!(v.as_i32(), Some(42));

        let v: Value = Some(100i64).into();
        assert_eq!(v.as_i64(), Some(100));

        let v: Value = None::<i32>.into();
        assert!(v.is_null());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(format!("{}", Value::String("x".into())), "'x'");
        assert_eq!(format!("{}", Value::Reference(4)), "ref#4");
        assert_eq!(format!("{}", Value::Null), "NULL");
    }
}
