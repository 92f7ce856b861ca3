//! The integer operator table.

use super::{
    BinaryOp, FloatConvertOp, IntConvertOp, OpTable, OpTableId, ShiftOp, UnaryOp, as_int,
    const_or,
};
use crate::{
    arbbitint::{ArbBitInt, mask, max_signed, min_signed},
    constant::Constant,
    stamp::{FloatStamp, IntStamp, LogicValue, PtrStamp, Stamp},
};

pub(super) struct IntOps;

fn as_stamp(s: &Stamp) -> &IntStamp {
    match s {
        Stamp::Int(x) => x,
        _ => panic!("{s} is not an integer stamp"),
    }
}

/// The stamp `[lo, hi]` if it is representable in `bitw` bits, otherwise unrestricted.
fn checked_range(bitw: u32, lo: i128, hi: i128) -> IntStamp {
    if lo >= i128::from(min_signed(bitw)) && hi <= i128::from(max_signed(bitw)) {
        IntStamp::range(bitw, lo as i64, hi as i64)
    } else {
        IntStamp::unrestricted(bitw)
    }
}

/// The bits whose value is known.
fn known(x: &IntStamp) -> u64 {
    !(x.may_set() ^ x.must_set())
}

fn swap_bits(bitw: u32, v: u64) -> u64 {
    ArbBitInt::from_u64(bitw, v).swap_bytes().to_zero_ext_u64()
}

impl IntOps {
    fn unary_stamp_inner(&self, op: UnaryOp, x: &IntStamp) -> IntStamp {
        let bitw = x.bitw();
        match op {
            UnaryOp::Not => IntStamp::new(
                bitw,
                !x.hi(),
                !x.lo(),
                !x.must_set(),
                !x.may_set(),
            ),
            UnaryOp::Neg if x.lo() > min_signed(bitw) => IntStamp::range(bitw, -x.hi(), -x.lo()),
            UnaryOp::Abs if x.lo() > min_signed(bitw) => {
                if x.lo() >= 0 {
                    x.clone()
                } else if x.hi() <= 0 {
                    IntStamp::range(bitw, -x.hi(), -x.lo())
                } else {
                    IntStamp::range(bitw, 0, x.hi().max(-x.lo()))
                }
            }
            UnaryOp::Neg | UnaryOp::Abs => IntStamp::unrestricted(bitw),
            UnaryOp::ReverseBytes => {
                assert_eq!(bitw % 8, 0, "cannot reverse the bytes of an i{bitw}");
                IntStamp::from_bits(
                    bitw,
                    swap_bits(bitw, x.may_set()),
                    swap_bits(bitw, x.must_set()),
                )
            }
            UnaryOp::Sqrt => super::unsupported(self.id(), op),
        }
    }

    fn binary_stamp_inner(&self, op: BinaryOp, x: &IntStamp, y: &IntStamp) -> IntStamp {
        let bitw = x.bitw();
        let (xlo, xhi, ylo, yhi) = (
            i128::from(x.lo()),
            i128::from(x.hi()),
            i128::from(y.lo()),
            i128::from(y.hi()),
        );
        match op {
            BinaryOp::Add => checked_range(bitw, xlo + ylo, xhi + yhi),
            BinaryOp::Sub => checked_range(bitw, xlo - yhi, xhi - ylo),
            BinaryOp::Mul => {
                let corners = [xlo * ylo, xlo * yhi, xhi * ylo, xhi * yhi];
                let lo = corners.iter().copied().min().unwrap_or(0);
                let hi = corners.iter().copied().max().unwrap_or(0);
                checked_range(bitw, lo, hi)
            }
            BinaryOp::And => {
                IntStamp::from_bits(bitw, x.may_set() & y.may_set(), x.must_set() & y.must_set())
            }
            BinaryOp::Or => {
                IntStamp::from_bits(bitw, x.may_set() | y.may_set(), x.must_set() | y.must_set())
            }
            BinaryOp::Xor => {
                let known = known(x) & known(y);
                let val = x.must_set() ^ y.must_set();
                IntStamp::from_bits(bitw, !known | val, known & val)
            }
            BinaryOp::Min => IntStamp::range(bitw, x.lo().min(y.lo()), x.hi().min(y.hi())),
            BinaryOp::Max => IntStamp::range(bitw, x.lo().max(y.lo()), x.hi().max(y.hi())),
            BinaryOp::Div | BinaryOp::Rem | BinaryOp::UMin | BinaryOp::UMax => {
                IntStamp::unrestricted(bitw)
            }
        }
    }
}

impl OpTable for IntOps {
    fn id(&self) -> OpTableId {
        OpTableId::Int
    }

    fn unary_const(&self, op: UnaryOp, x: &Constant) -> Option<Constant> {
        let x = as_int(x);
        let r = match op {
            UnaryOp::Neg => x.wrapping_neg(),
            UnaryOp::Not => x.bitneg(),
            UnaryOp::Abs if x.is_negative() => x.wrapping_neg(),
            UnaryOp::Abs => x.clone(),
            UnaryOp::ReverseBytes => x.swap_bytes(),
            UnaryOp::Sqrt => super::unsupported(self.id(), op),
        };
        Some(Constant::Int(r))
    }

    fn unary_stamp(&self, op: UnaryOp, x: &Stamp) -> Stamp {
        let xs = as_stamp(x);
        if xs.is_empty() {
            return x.clone();
        }
        const_or(
            x.as_constant().and_then(|c| self.unary_const(op, &c)),
            || Stamp::Int(self.unary_stamp_inner(op, xs)),
        )
    }

    fn binary_const(&self, op: BinaryOp, x: &Constant, y: &Constant) -> Option<Constant> {
        let (x, y) = (as_int(x), as_int(y));
        let r = match op {
            BinaryOp::Add => x.wrapping_add(y),
            BinaryOp::Sub => x.wrapping_sub(y),
            BinaryOp::Mul => x.wrapping_mul(y),
            BinaryOp::Div => x.checked_sdiv(y)?,
            BinaryOp::Rem => x.checked_srem(y)?,
            BinaryOp::And => x.bitand(y),
            BinaryOp::Or => x.bitor(y),
            BinaryOp::Xor => x.bitxor(y),
            BinaryOp::Min => x.smin(y),
            BinaryOp::Max => x.smax(y),
            BinaryOp::UMin => x.umin(y),
            BinaryOp::UMax => x.umax(y),
        };
        Some(Constant::Int(r))
    }

    fn binary_stamp(&self, op: BinaryOp, x: &Stamp, y: &Stamp) -> Stamp {
        let (xs, ys) = (as_stamp(x), as_stamp(y));
        assert_eq!(xs.bitw(), ys.bitw(), "incompatible stamps: {x} {op} {y}");
        if xs.is_empty() || ys.is_empty() {
            return Stamp::Int(IntStamp::empty(xs.bitw()));
        }
        let c = match (x.as_constant(), y.as_constant()) {
            (Some(cx), Some(cy)) => self.binary_const(op, &cx, &cy),
            _ => None,
        };
        const_or(c, || Stamp::Int(self.binary_stamp_inner(op, xs, ys)))
    }

    fn binary_neutral(&self, op: BinaryOp, s: &Stamp) -> Option<Constant> {
        let bitw = s.bitw();
        let n = match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Or | BinaryOp::Xor | BinaryOp::UMax => {
                ArbBitInt::zero(bitw)
            }
            BinaryOp::Mul | BinaryOp::Div => ArbBitInt::from_u64(bitw, 1),
            BinaryOp::And | BinaryOp::UMin => ArbBitInt::all_bits_set(bitw),
            BinaryOp::Min => ArbBitInt::from_i64(bitw, max_signed(bitw)),
            BinaryOp::Max => ArbBitInt::from_i64(bitw, min_signed(bitw)),
            BinaryOp::Rem => return None,
        };
        Some(Constant::Int(n))
    }

    fn binary_zero(&self, op: BinaryOp, s: &Stamp) -> Option<Constant> {
        match op {
            BinaryOp::Sub | BinaryOp::Xor => Some(Constant::Int(ArbBitInt::zero(s.bitw()))),
            _ => None,
        }
    }

    fn is_associative(&self, op: BinaryOp) -> bool {
        matches!(
            op,
            BinaryOp::Add
                | BinaryOp::Mul
                | BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Xor
                | BinaryOp::Min
                | BinaryOp::Max
                | BinaryOp::UMin
                | BinaryOp::UMax
        )
    }

    fn is_commutative(&self, op: BinaryOp) -> bool {
        self.is_associative(op)
    }

    fn shift_const(&self, op: ShiftOp, x: &Constant, amount: &Constant) -> Option<Constant> {
        let x = as_int(x);
        let amount = (as_int(amount).to_zero_ext_u64() % u64::from(x.bitw())) as u32;
        let r = match op {
            ShiftOp::Shl => x.shl(amount),
            ShiftOp::Shr => x.ashr(amount),
            ShiftOp::UShr => x.lshr(amount),
        };
        Some(Constant::Int(r))
    }

    fn shift_stamp(&self, op: ShiftOp, x: &Stamp, amount: &Stamp) -> Stamp {
        let xs = as_stamp(x);
        let bitw = xs.bitw();
        if xs.is_empty() || amount.is_empty() {
            return Stamp::Int(IntStamp::empty(bitw));
        }
        let Some(amount) = amount.as_constant() else {
            return Stamp::Int(IntStamp::unrestricted(bitw));
        };
        if let Some(c) = x.as_constant().and_then(|c| self.shift_const(op, &c, &amount)) {
            return Stamp::from_constant(&c);
        }
        let s = (as_int(&amount).to_zero_ext_u64() % u64::from(bitw)) as u32;
        let m = mask(bitw);
        Stamp::Int(match op {
            ShiftOp::Shl => IntStamp::from_bits(bitw, (xs.may_set() << s) & m, (xs.must_set() << s) & m),
            ShiftOp::UShr => IntStamp::from_bits(bitw, xs.may_set() >> s, xs.must_set() >> s),
            // Arithmetic shifts are monotone.
            ShiftOp::Shr => IntStamp::range(bitw, xs.lo() >> s, xs.hi() >> s),
        })
    }

    fn int_convert_const(&self, op: IntConvertOp, x: &Constant, to_bitw: u32) -> Option<Constant> {
        let x = as_int(x);
        let r = match op {
            IntConvertOp::ZeroExtend => x.zero_extend(to_bitw),
            IntConvertOp::SignExtend => x.sign_extend(to_bitw),
            IntConvertOp::Narrow => x.truncate(to_bitw),
        };
        Some(Constant::Int(r))
    }

    fn int_convert_stamp(&self, op: IntConvertOp, x: &Stamp, to_bitw: u32) -> Stamp {
        let xs = as_stamp(x);
        let bitw = xs.bitw();
        match op {
            IntConvertOp::ZeroExtend | IntConvertOp::SignExtend => {
                assert!(to_bitw >= bitw, "cannot {op} an i{bitw} to i{to_bitw}")
            }
            IntConvertOp::Narrow => assert!(to_bitw <= bitw, "cannot narrow an i{bitw} to i{to_bitw}"),
        }
        if xs.is_empty() {
            return Stamp::Int(IntStamp::empty(to_bitw));
        }
        if let Some(c) = x.as_constant().and_then(|c| self.int_convert_const(op, &c, to_bitw)) {
            return Stamp::from_constant(&c);
        }
        let sign = 1u64 << (bitw - 1);
        let ext = mask(to_bitw) & !mask(bitw);
        Stamp::Int(match op {
            IntConvertOp::SignExtend => {
                let may = if xs.may_set() & sign != 0 { xs.may_set() | ext } else { xs.may_set() };
                let must = if xs.must_set() & sign != 0 { xs.must_set() | ext } else { xs.must_set() };
                IntStamp::new(to_bitw, xs.lo(), xs.hi(), may, must)
            }
            IntConvertOp::ZeroExtend if xs.lo() >= 0 => {
                IntStamp::new(to_bitw, xs.lo(), xs.hi(), xs.may_set(), xs.must_set())
            }
            IntConvertOp::ZeroExtend if to_bitw > bitw => {
                IntStamp::from_bits(to_bitw, xs.may_set(), xs.must_set())
            }
            IntConvertOp::ZeroExtend => xs.clone(),
            IntConvertOp::Narrow
                if xs.lo() >= min_signed(to_bitw) && xs.hi() <= max_signed(to_bitw) =>
            {
                IntStamp::new(to_bitw, xs.lo(), xs.hi(), xs.may_set(), xs.must_set())
            }
            IntConvertOp::Narrow => IntStamp::from_bits(to_bitw, xs.may_set(), xs.must_set()),
        })
    }

    fn float_convert_const(&self, op: FloatConvertOp, x: &Constant, to_bitw: u32) -> Option<Constant> {
        match op {
            FloatConvertOp::SIToFP => {
                let v = as_int(x).to_sign_ext_i64();
                Some(match to_bitw {
                    32 => Constant::Float(v as f32),
                    64 => Constant::Double(v as f64),
                    _ => panic!("cannot convert to a {to_bitw} bit float"),
                })
            }
            _ => super::unsupported(self.id(), op),
        }
    }

    fn float_convert_stamp(&self, op: FloatConvertOp, x: &Stamp, to_bitw: u32) -> Stamp {
        let xs = as_stamp(x);
        if op != FloatConvertOp::SIToFP {
            super::unsupported(self.id(), op);
        }
        if xs.is_empty() {
            return Stamp::Float(FloatStamp::empty(to_bitw));
        }
        if let Some(c) = x.as_constant().and_then(|c| self.float_convert_const(op, &c, to_bitw)) {
            return Stamp::from_constant(&c);
        }
        // Integer to float conversion rounds monotonically.
        let (lo, hi) = match to_bitw {
            32 => (f64::from(xs.lo() as f32), f64::from(xs.hi() as f32)),
            _ => (xs.lo() as f64, xs.hi() as f64),
        };
        Stamp::Float(FloatStamp::new(to_bitw, lo, hi, false))
    }

    fn reinterpret_const(&self, to: &Stamp, x: &Constant) -> Option<Constant> {
        let x = as_int(x);
        match to {
            Stamp::Logic(_) => Some(Constant::Logic(x.is_negative())),
            _ => {
                assert_eq!(to.bitw(), x.bitw(), "cannot reinterpret an i{} as {to}", x.bitw());
                Some(match to {
                    Stamp::Int(_) => Constant::Int(x.clone()),
                    Stamp::Float(_) if x.bitw() == 32 => {
                        Constant::Float(f32::from_bits(x.to_zero_ext_u64() as u32))
                    }
                    Stamp::Float(_) => Constant::Double(f64::from_bits(x.to_zero_ext_u64())),
                    Stamp::Ptr(_) => Constant::Ptr(x.to_zero_ext_u64() as usize),
                    _ => panic!("cannot reinterpret an i{} as {to}", x.bitw()),
                })
            }
        }
    }

    fn reinterpret_stamp(&self, to: &Stamp, x: &Stamp) -> Stamp {
        let xs = as_stamp(x);
        if !matches!(to, Stamp::Logic(_)) {
            assert_eq!(to.bitw(), xs.bitw(), "cannot reinterpret {x} as {to}");
        }
        if xs.is_empty() {
            return to.empty();
        }
        if let Some(c) = x.as_constant().and_then(|c| self.reinterpret_const(to, &c)) {
            return Stamp::from_constant(&c);
        }
        match to {
            Stamp::Logic(_) if xs.lo() >= 0 => Stamp::Logic(LogicValue::False),
            Stamp::Logic(_) if xs.hi() < 0 => Stamp::Logic(LogicValue::True),
            Stamp::Int(_) => x.clone(),
            Stamp::Ptr(_) if xs.lo() > 0 || xs.hi() < 0 => Stamp::Ptr(PtrStamp::non_null()),
            _ => to.unrestricted(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ops::op_table;
    use proptest::prelude::*;

    fn c(bitw: u32, v: i64) -> Constant {
        Constant::Int(ArbBitInt::from_i64(bitw, v))
    }

    fn s(bitw: u32, lo: i64, hi: i64) -> Stamp {
        Stamp::Int(IntStamp::range(bitw, lo, hi))
    }

    #[test]
    fn div_by_zero() {
        assert_eq!(IntOps.binary_const(BinaryOp::Div, &c(32, 7), &c(32, 0)), None);
        assert_eq!(IntOps.binary_const(BinaryOp::Rem, &c(32, 7), &c(32, 0)), None);
        assert_eq!(
            IntOps.binary_stamp(BinaryOp::Div, &Stamp::from_constant(&c(32, 7)), &Stamp::from_constant(&c(32, 0))),
            Stamp::Int(IntStamp::unrestricted(32))
        );
    }

    #[test]
    fn range_arith() {
        assert_eq!(IntOps.binary_stamp(BinaryOp::Add, &s(8, 0, 10), &s(8, 5, 6)), s(8, 5, 16));
        assert_eq!(IntOps.binary_stamp(BinaryOp::Sub, &s(8, 0, 10), &s(8, 5, 6)), s(8, -6, 5));
        assert_eq!(
            IntOps.binary_stamp(BinaryOp::Add, &s(8, 100, 120), &s(8, 10, 10)),
            Stamp::Int(IntStamp::unrestricted(8))
        );
        assert_eq!(IntOps.binary_stamp(BinaryOp::Mul, &s(8, -2, 3), &s(8, 4, 5)), s(8, -10, 15));
        assert_eq!(IntOps.binary_stamp(BinaryOp::Max, &s(8, -2, 3), &s(8, 0, 1)), s(8, 0, 3));
    }

    #[test]
    fn neutral_elements() {
        let i8s = Stamp::Int(IntStamp::unrestricted(8));
        for (op, n) in [
            (BinaryOp::Add, 0),
            (BinaryOp::Mul, 1),
            (BinaryOp::And, -1),
            (BinaryOp::Min, 127),
            (BinaryOp::Max, -128),
        ] {
            assert_eq!(IntOps.binary_neutral(op, &i8s), Some(c(8, n)));
            assert!(IntOps.is_neutral(op, &c(8, n)));
        }
        assert_eq!(IntOps.binary_neutral(BinaryOp::Rem, &i8s), None);
    }

    #[test]
    fn conversions() {
        assert_eq!(
            IntOps.int_convert_const(IntConvertOp::SignExtend, &c(8, -1), 32),
            Some(c(32, -1))
        );
        assert_eq!(
            IntOps.int_convert_const(IntConvertOp::ZeroExtend, &c(8, -1), 32),
            Some(c(32, 255))
        );
        assert_eq!(
            IntOps.int_convert_stamp(IntConvertOp::SignExtend, &s(8, -3, 4), 32),
            s(32, -3, 4)
        );
        assert_eq!(
            IntOps.float_convert_const(FloatConvertOp::SIToFP, &c(32, -3), 64),
            Some(Constant::Double(-3.0))
        );
        assert_eq!(
            IntOps.reinterpret_const(&Stamp::Float(FloatStamp::unrestricted(32)), &c(32, 0x3f800000)),
            Some(Constant::Float(1.0))
        );
        assert_eq!(
            IntOps.reinterpret_stamp(&Stamp::Logic(LogicValue::Unrestricted), &s(32, -1, -1)),
            Stamp::Logic(LogicValue::True)
        );
    }

    #[test]
    #[should_panic(expected = "no case for sqrt")]
    fn unsupported_op() {
        op_table(&Stamp::Int(IntStamp::unrestricted(32))).unary_const(UnaryOp::Sqrt, &c(32, 4));
    }

    proptest! {
        #[test]
        fn binary_stamps_are_sound(
            xlo in any::<i8>(), xw in 0u8..16, ylo in any::<i8>(), yw in 0u8..16,
            xo in 0u8..16, yo in 0u8..16,
        ) {
            let xhi = xlo.saturating_add(xw as i8);
            let yhi = ylo.saturating_add(yw as i8);
            let x = xlo.saturating_add(xo.min(xw) as i8).min(xhi);
            let y = ylo.saturating_add(yo.min(yw) as i8).min(yhi);
            let (sx, sy) = (s(8, xlo as i64, xhi as i64), s(8, ylo as i64, yhi as i64));
            for op in [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::And, BinaryOp::Or,
                       BinaryOp::Xor, BinaryOp::Min, BinaryOp::Max] {
                let Some(Constant::Int(r)) = IntOps.binary_const(op, &c(8, x as i64), &c(8, y as i64))
                else { unreachable!() };
                let Stamp::Int(rs) = IntOps.binary_stamp(op, &sx, &sy) else { unreachable!() };
                prop_assert!(rs.contains(r.to_sign_ext_i64()), "{op}: {x}, {y} not in {rs}");
            }
            for op in [UnaryOp::Neg, UnaryOp::Not, UnaryOp::Abs] {
                let Some(Constant::Int(r)) = IntOps.unary_const(op, &c(8, x as i64)) else { unreachable!() };
                let Stamp::Int(rs) = IntOps.unary_stamp(op, &sx) else { unreachable!() };
                prop_assert!(rs.contains(r.to_sign_ext_i64()), "{op}: {x} not in {rs}");
            }
        }
    }
}
