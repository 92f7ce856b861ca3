//! Concrete values: scalar constants and fixed-length vectors of them.

use crate::{CompilationError, arbbitint::ArbBitInt, stamp::Stamp};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::fmt;

#[derive(Clone, Debug)]
pub enum Constant {
    Int(ArbBitInt),
    Float(f32),
    Double(f64),
    Ptr(usize),
    Logic(bool),
    Simd(SimdConstant),
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        // Floats are compared by bit pattern so that `0.0 != -0.0` and `NaN == NaN`.
        match (self, other) {
            (Self::Int(x), Self::Int(y)) => x == y,
            (Self::Float(x), Self::Float(y)) => x.to_bits() == y.to_bits(),
            (Self::Double(x), Self::Double(y)) => x.to_bits() == y.to_bits(),
            (Self::Ptr(x), Self::Ptr(y)) => x == y,
            (Self::Logic(x), Self::Logic(y)) => x == y,
            (Self::Simd(x), Self::Simd(y)) => x == y,
            _ => false,
        }
    }
}

impl Eq for Constant {}

impl Constant {
    pub fn as_int(&self) -> Option<&ArbBitInt> {
        match self {
            Self::Int(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_simd(&self) -> Option<&SimdConstant> {
        match self {
            Self::Simd(x) => Some(x),
            _ => None,
        }
    }

    fn same_variant(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(x), Self::Int(y)) => x.bitw() == y.bitw(),
            (Self::Float(_), Self::Float(_))
            | (Self::Double(_), Self::Double(_))
            | (Self::Ptr(_), Self::Ptr(_))
            | (Self::Logic(_), Self::Logic(_)) => true,
            _ => false,
        }
    }

    /// The zero of the same scalar shape as `self`.
    pub fn zero_like(&self) -> Self {
        match self {
            Self::Int(x) => Self::Int(ArbBitInt::zero(x.bitw())),
            Self::Float(_) => Self::Float(0.0),
            Self::Double(_) => Self::Double(0.0),
            Self::Ptr(_) => Self::Ptr(0),
            Self::Logic(_) => Self::Logic(false),
            Self::Simd(_) => panic!("zero_like of a vector constant"),
        }
    }

    /// Is this lane "set" when used as a selector? A logic lane is set when true; an integer
    /// lane when its sign bit is set.
    pub fn lane_is_set(&self) -> bool {
        match self {
            Self::Logic(x) => *x,
            Self::Int(x) => x.is_negative(),
            _ => panic!("{self} cannot be used as a mask lane"),
        }
    }

    /// Append the byte representation of `self` to `buf`.
    pub fn write(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Int(x) => {
                let nbytes = x.bitw().div_ceil(8) as usize;
                let mut b = [0; 8];
                LittleEndian::write_uint(&mut b, x.to_zero_ext_u64(), nbytes);
                buf.extend_from_slice(&b[..nbytes]);
            }
            Self::Float(x) => {
                let mut b = [0; 4];
                LittleEndian::write_f32(&mut b, *x);
                buf.extend_from_slice(&b);
            }
            Self::Double(x) => {
                let mut b = [0; 8];
                LittleEndian::write_f64(&mut b, *x);
                buf.extend_from_slice(&b);
            }
            Self::Ptr(x) => write_u64(buf, *x as u64),
            Self::Logic(x) => buf.push(u8::from(*x)),
            Self::Simd(x) => x.write(buf),
        }
    }

    /// Read a constant of shape `stamp` from the front of `buf`, advancing it.
    ///
    /// # Panics
    ///
    /// If `stamp` is an opmask stamp: masks are not memory values.
    pub fn read(stamp: &Stamp, buf: &mut &[u8]) -> Result<Self, CompilationError> {
        let short = |e: std::io::Error| {
            CompilationError::LimitExceeded(format!("reading a constant of type {stamp}: {e}"))
        };
        match stamp {
            Stamp::Int(x) => {
                let nbytes = x.bitw().div_ceil(8) as usize;
                let v = buf.read_uint::<LittleEndian>(nbytes).map_err(short)?;
                Ok(Self::Int(ArbBitInt::from_u64(x.bitw(), v)))
            }
            Stamp::Float(x) if x.bitw() == 32 => {
                Ok(Self::Float(buf.read_f32::<LittleEndian>().map_err(short)?))
            }
            Stamp::Float(_) => Ok(Self::Double(buf.read_f64::<LittleEndian>().map_err(short)?)),
            Stamp::Ptr(_) => Ok(Self::Ptr(
                buf.read_u64::<LittleEndian>().map_err(short)? as usize,
            )),
            Stamp::Logic(_) => Ok(Self::Logic(buf.read_u8().map_err(short)? != 0)),
            Stamp::Simd(x) => x.read_constant(buf).map(Self::Simd),
        }
    }
}

fn write_u64(buf: &mut Vec<u8>, x: u64) {
    let mut b = [0; 8];
    LittleEndian::write_u64(&mut b, x);
    buf.extend_from_slice(&b);
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(x) => write!(f, "{x}i{}", x.bitw()),
            Self::Float(x) => write!(f, "{x}f32"),
            Self::Double(x) => write!(f, "{x}f64"),
            Self::Ptr(x) => write!(f, "{x:#x}"),
            Self::Logic(x) => write!(f, "{x}"),
            Self::Simd(x) => write!(f, "{x}"),
        }
    }
}

/// A fixed-length vector of scalar constants, all of the same shape.
#[derive(Clone, Debug)]
pub struct SimdConstant {
    vals: Vec<Constant>,
    /// Are all lanes equal?
    all_same: bool,
    /// Is this an opmask (i.e. are the lanes logic values)?
    is_mask: bool,
}

impl PartialEq for SimdConstant {
    fn eq(&self, other: &Self) -> bool {
        self.vals == other.vals
    }
}

impl Eq for SimdConstant {}

impl SimdConstant {
    /// # Panics
    ///
    /// If `vals` is empty, contains a vector, or mixes lane shapes.
    pub fn new(vals: Vec<Constant>) -> Self {
        assert!(!vals.is_empty(), "empty vector constant");
        let first = &vals[0];
        assert!(
            !matches!(first, Constant::Simd(_)),
            "nested vector constant"
        );
        assert!(
            vals.iter().all(|x| x.same_variant(first)),
            "mixed lane shapes in vector constant"
        );
        let all_same = vals.iter().all(|x| x == first);
        let is_mask = matches!(first, Constant::Logic(_));
        Self {
            vals,
            all_same,
            is_mask,
        }
    }

    pub fn broadcast(c: &Constant, len: usize) -> Self {
        Self::new(vec![c.clone(); len])
    }

    /// An opmask with lane `i` taken from bit `len - 1 - i` of `bits`.
    pub fn from_bit_mask(bits: u64, len: usize) -> Self {
        assert!(len > 0 && len <= 64, "bit mask of {len} lanes");
        Self::new(
            (0..len)
                .map(|i| Constant::Logic(bits >> (len - 1 - i) & 1 == 1))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.vals.len()
    }

    pub fn get(&self, i: usize) -> &Constant {
        &self.vals[i]
    }

    pub fn vals(&self) -> &[Constant] {
        &self.vals
    }

    pub fn is_all_same(&self) -> bool {
        self.all_same
    }

    pub fn is_mask(&self) -> bool {
        self.is_mask
    }

    /// Is every lane true (for a mask) or all ones (for an integer vector)?
    pub fn is_all_ones(&self) -> bool {
        self.vals.iter().all(|x| match x {
            Constant::Logic(b) => *b,
            Constant::Int(i) => i.is_all_bits_set(),
            _ => false,
        })
    }

    /// Is every lane false (for a mask) or zero (for an integer vector)?
    pub fn is_all_zeros(&self) -> bool {
        self.vals.iter().all(|x| match x {
            Constant::Logic(b) => !*b,
            Constant::Int(i) => i.is_zero(),
            _ => false,
        })
    }

    /// Pack one bit per lane into a `u64`. Lane 0 is the most significant of the `len` packed
    /// bits.
    pub fn to_bit_mask(&self) -> u64 {
        assert!(self.len() <= 64, "bit mask of {} lanes", self.len());
        self.vals
            .iter()
            .fold(0, |acc, x| acc << 1 | u64::from(x.lane_is_set()))
    }

    fn check_halvable(&self) {
        assert!(
            self.len() >= 2 && self.len().is_power_of_two(),
            "cannot halve a vector of {} lanes",
            self.len()
        );
    }

    pub fn lower_half(&self) -> Self {
        self.check_halvable();
        self.cut(0, self.len() / 2)
    }

    pub fn upper_half(&self) -> Self {
        self.check_halvable();
        self.cut(self.len() / 2, self.len() / 2)
    }

    pub fn concat(&self, other: &Self) -> Self {
        Self::new(self.vals.iter().chain(other.vals.iter()).cloned().collect())
    }

    pub fn cut(&self, offset: usize, len: usize) -> Self {
        assert!(
            len > 0 && offset + len <= self.len(),
            "cut [{offset}, {}) out of range of {} lanes",
            offset + len,
            self.len()
        );
        Self::new(self.vals[offset..offset + len].to_vec())
    }

    /// Output lane `i` is input lane `mapping[i]`, or zero if `mapping[i]` is negative.
    pub fn permute(&self, mapping: &[i32]) -> Self {
        Self::new(
            mapping
                .iter()
                .map(|&i| match usize::try_from(i) {
                    Ok(i) => self.vals[i].clone(),
                    Err(_) => self.vals[0].zero_like(),
                })
                .collect(),
        )
    }

    /// Lane `i` of the result is `lhs`'s when `selector[i]` is false, otherwise `rhs`'s.
    pub fn blend(lhs: &Self, rhs: &Self, selector: &[bool]) -> Self {
        assert!(
            lhs.len() == rhs.len() && lhs.len() == selector.len(),
            "blend of mismatched lengths"
        );
        Self::new(
            selector
                .iter()
                .enumerate()
                .map(|(i, &s)| if s { rhs.get(i) } else { lhs.get(i) }.clone())
                .collect(),
        )
    }

    /// Replace lanes starting at `offset` with `val` (a scalar or a vector).
    pub fn insert(&self, offset: usize, val: &Constant) -> Self {
        let new = match val {
            Constant::Simd(x) => x.vals.clone(),
            x => vec![x.clone()],
        };
        assert!(
            offset + new.len() <= self.len(),
            "insert out of range of {} lanes",
            self.len()
        );
        let mut vals = self.vals.clone();
        vals.splice(offset..offset + new.len(), new);
        Self::new(vals)
    }

    fn write(&self, buf: &mut Vec<u8>) {
        if self.is_mask {
            write_u64(buf, self.to_bit_mask());
        } else {
            for x in &self.vals {
                x.write(buf);
            }
        }
    }

    /// Read an opmask of `len` lanes serialized by [Constant::write].
    pub fn read_bit_mask(len: usize, buf: &mut &[u8]) -> Result<Self, CompilationError> {
        let bits = buf.read_u64::<LittleEndian>().map_err(|e| {
            CompilationError::LimitExceeded(format!("reading a {len} lane bit mask: {e}"))
        })?;
        Ok(Self::from_bit_mask(bits, len))
    }
}

impl fmt::Display for SimdConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all_same && self.len() > 1 {
            return write!(f, "<{} x {}>", self.len(), self.vals[0]);
        }
        write!(
            f,
            "<{}>",
            self.vals
                .iter()
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::stamp::{IntStamp, LogicValue, SimdStamp};

    pub(crate) fn ints(bitw: u32, vals: &[i64]) -> SimdConstant {
        SimdConstant::new(
            vals.iter()
                .map(|x| Constant::Int(ArbBitInt::from_i64(bitw, *x)))
                .collect(),
        )
    }

    pub(crate) fn mask(vals: &[bool]) -> SimdConstant {
        SimdConstant::new(vals.iter().map(|x| Constant::Logic(*x)).collect())
    }

    #[test]
    fn bit_mask() {
        assert_eq!(mask(&[true, false, true, false]).to_bit_mask(), 10);
        assert_eq!(ints(32, &[-1, 0, 0, -1]).to_bit_mask(), 0b1001);
        assert_eq!(
            SimdConstant::from_bit_mask(10, 4),
            mask(&[true, false, true, false])
        );
    }

    #[test]
    fn cached_properties() {
        let c = ints(8, &[3, 3, 3]);
        assert!(c.is_all_same());
        assert!(!c.is_mask());
        assert!(!ints(8, &[3, 4]).is_all_same());
        assert!(mask(&[true, true]).is_all_ones());
        assert!(ints(16, &[-1, -1]).is_all_ones());
        assert!(ints(16, &[0, 0]).is_all_zeros());
        assert!(!mask(&[true, false]).is_all_zeros());
    }

    #[test]
    fn halves_and_slices() {
        let c = ints(32, &[1, 2, 3, 4]);
        assert_eq!(c.lower_half(), ints(32, &[1, 2]));
        assert_eq!(c.upper_half(), ints(32, &[3, 4]));
        assert_eq!(c.lower_half().concat(&c.upper_half()), c);
        assert_eq!(c.permute(&[3, -1, 0]), ints(32, &[4, 0, 1]));
        assert_eq!(c.insert(1, &Constant::Simd(ints(32, &[9, 9]))), ints(32, &[1, 9, 9, 4]));
        assert_eq!(
            SimdConstant::blend(&c, &ints(32, &[5, 6, 7, 8]), &[false, true, false, true]),
            ints(32, &[1, 6, 3, 8])
        );
    }

    #[test]
    #[should_panic(expected = "cannot halve")]
    fn halve_odd() {
        ints(32, &[1, 2, 3]).lower_half();
    }

    #[test]
    fn float_equality() {
        assert_ne!(Constant::Double(0.0), Constant::Double(-0.0));
        assert_eq!(Constant::Float(f32::NAN), Constant::Float(f32::NAN));
    }

    #[test]
    fn serialization() {
        let c = Constant::Simd(ints(16, &[1, -2, 3]));
        let mut buf = Vec::new();
        c.write(&mut buf);
        assert_eq!(buf, [1, 0, 0xfe, 0xff, 3, 0]);
        let stamp = Stamp::Simd(SimdStamp::broadcast(
            &Stamp::Int(IntStamp::unrestricted(16)),
            3,
        ));
        let mut rd = &buf[..];
        assert_eq!(Constant::read(&stamp, &mut rd).unwrap(), c);
        assert!(rd.is_empty());

        let mut rd = &buf[..4];
        assert!(matches!(
            Constant::read(&stamp, &mut rd),
            Err(CompilationError::LimitExceeded(_))
        ));

        let m = mask(&[true, false, true, false]);
        let mut buf = Vec::new();
        Constant::Simd(m.clone()).write(&mut buf);
        assert_eq!(buf.len(), 8);
        assert_eq!(SimdConstant::read_bit_mask(4, &mut &buf[..]).unwrap(), m);
    }

    #[test]
    fn scalar_widths() {
        let cases = [
            (Constant::Int(ArbBitInt::from_u64(1, 1)), vec![1]),
            (Constant::Int(ArbBitInt::from_i64(24, -2)), vec![0xfe, 0xff, 0xff]),
            (Constant::Float(1.0), 1.0f32.to_le_bytes().to_vec()),
            (Constant::Double(-2.5), (-2.5f64).to_le_bytes().to_vec()),
            (Constant::Ptr(0x1234), vec![0x34, 0x12, 0, 0, 0, 0, 0, 0]),
        ];
        for (c, bytes) in cases {
            let mut buf = Vec::new();
            c.write(&mut buf);
            assert_eq!(buf, bytes, "{c}");
            let stamp = Stamp::from_constant(&c);
            assert_eq!(Constant::read(&stamp, &mut &buf[..]).unwrap(), c);
        }
    }

    #[test]
    #[should_panic(expected = "opmask")]
    fn read_opmask() {
        let stamp = Stamp::Simd(SimdStamp::broadcast(
            &Stamp::Logic(LogicValue::Unrestricted),
            4,
        ));
        Constant::read(&stamp, &mut &[0u8; 8][..]).ok();
    }
}
