// MIT License
//
// Copyright (c) 2019 Alasdair Armstrong
//
// Permission is hereby granted, free of charge, to any person
// obtaining a copy of this software and associated documentation
// files (the "Software"), to deal in the Software without
// restriction, including without limitation the rights to use, copy,
// modify, merge, publish, distribute, sublicense, and/or sell copies
// of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS
// BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN
// ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use std::fmt;

/// First-class tag for the primitive scalar type of a recorded value. The
/// encoder uses it to pick SMT sort widths.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
}

impl ScalarType {
    /// Width of the bitvector sort for this type, or `None` for `Bool`.
    pub fn bit_width(self) -> Option<u32> {
        match self {
            ScalarType::Bool => None,
            ScalarType::I8 | ScalarType::U8 => Some(8),
            ScalarType::I16 | ScalarType::U16 => Some(16),
            ScalarType::I32 | ScalarType::U32 => Some(32),
            ScalarType::I64 | ScalarType::U64 => Some(64),
        }
    }

    pub fn is_signed(self) -> bool {
        match self {
            ScalarType::I8 | ScalarType::I16 | ScalarType::I32 | ScalarType::I64 => true,
            _ => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::I8 => "char",
            ScalarType::U8 => "uchar",
            ScalarType::I16 => "short",
            ScalarType::U16 => "ushort",
            ScalarType::I32 => "int",
            ScalarType::U32 => "uint",
            ScalarType::I64 => "long",
            ScalarType::U64 => "ulong",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A concrete scalar literal.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ScalarVal {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
}

impl ScalarVal {
    pub fn ty(self) -> ScalarType {
        match self {
            ScalarVal::Bool(_) => ScalarType::Bool,
            ScalarVal::I8(_) => ScalarType::I8,
            ScalarVal::U8(_) => ScalarType::U8,
            ScalarVal::I16(_) => ScalarType::I16,
            ScalarVal::U16(_) => ScalarType::U16,
            ScalarVal::I32(_) => ScalarType::I32,
            ScalarVal::U32(_) => ScalarType::U32,
            ScalarVal::I64(_) => ScalarType::I64,
            ScalarVal::U64(_) => ScalarType::U64,
        }
    }

    pub fn zero(ty: ScalarType) -> ScalarVal {
        match ty {
            ScalarType::Bool => ScalarVal::Bool(false),
            ScalarType::I8 => ScalarVal::I8(0),
            ScalarType::U8 => ScalarVal::U8(0),
            ScalarType::I16 => ScalarVal::I16(0),
            ScalarType::U16 => ScalarVal::U16(0),
            ScalarType::I32 => ScalarVal::I32(0),
            ScalarType::U32 => ScalarVal::U32(0),
            ScalarType::I64 => ScalarVal::I64(0),
            ScalarType::U64 => ScalarVal::U64(0),
        }
    }

    /// Two's complement bit pattern, truncated to the type's width.
    pub fn as_bits(self) -> u64 {
        match self {
            ScalarVal::Bool(b) => b as u64,
            ScalarVal::I8(v) => v as u8 as u64,
            ScalarVal::U8(v) => v as u64,
            ScalarVal::I16(v) => v as u16 as u64,
            ScalarVal::U16(v) => v as u64,
            ScalarVal::I32(v) => v as u32 as u64,
            ScalarVal::U32(v) => v as u64,
            ScalarVal::I64(v) => v as u64,
            ScalarVal::U64(v) => v,
        }
    }
}

impl fmt::Display for ScalarVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarVal::Bool(v) => write!(f, "{}", v),
            ScalarVal::I8(v) => write!(f, "{}", v),
            ScalarVal::U8(v) => write!(f, "{}", v),
            ScalarVal::I16(v) => write!(f, "{}", v),
            ScalarVal::U16(v) => write!(f, "{}", v),
            ScalarVal::I32(v) => write!(f, "{}", v),
            ScalarVal::U32(v) => write!(f, "{}", v),
            ScalarVal::I64(v) => write!(f, "{}", v),
            ScalarVal::U64(v) => write!(f, "{}", v),
        }
    }
}

/// Rust primitives that can flow through the recording engine.
pub trait Scalar: Copy + 'static {
    const TYPE: ScalarType;

    fn to_val(self) -> ScalarVal;
}

/// Scalars admitting bitvector arithmetic, i.e. everything except `bool`.
pub trait NumScalar: Scalar {}

macro_rules! impl_scalar {
    ($($t:ty => $tag:ident),* $(,)?) => {
        $(
            impl Scalar for $t {
                const TYPE: ScalarType = ScalarType::$tag;

                fn to_val(self) -> ScalarVal {
                    ScalarVal::$tag(self)
                }
            }
        )*
    };
}

impl_scalar! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
}

impl NumScalar for i8 {}
impl NumScalar for u8 {}
impl NumScalar for i16 {}
impl NumScalar for u16 {}
impl NumScalar for i32 {}
impl NumScalar for u32 {}
impl NumScalar for i64 {}
impl NumScalar for u64 {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_bits() {
        assert_eq!(ScalarVal::I8(-1).as_bits(), 0xff);
        assert_eq!(ScalarVal::I16(-2).as_bits(), 0xfffe);
        assert_eq!(ScalarVal::I32(-1).as_bits(), 0xffff_ffff);
        assert_eq!(ScalarVal::U64(42).as_bits(), 42);
        assert_eq!(ScalarVal::Bool(true).as_bits(), 1);
    }

    #[test]
    fn test_zero() {
        assert_eq!(ScalarVal::zero(ScalarType::I32), ScalarVal::I32(0));
        assert_eq!(ScalarVal::zero(ScalarType::Bool), ScalarVal::Bool(false));
        assert_eq!(ScalarVal::zero(ScalarType::U8).as_bits(), 0);
    }

    #[test]
    fn test_widths() {
        assert_eq!(ScalarType::Bool.bit_width(), None);
        assert_eq!(ScalarType::I8.bit_width(), Some(8));
        assert_eq!(ScalarType::U64.bit_width(), Some(64));
        assert!(ScalarType::I16.is_signed());
        assert!(!ScalarType::U16.is_signed());
    }
}
