//! The floating point operator table. 32-bit values are computed in `f64` and rounded, which
//! gives correctly rounded results for every operator here except `fma`.

use super::{
    BinaryOp, FloatConvertOp, OpTable, OpTableId, TernaryOp, UnaryOp, const_or,
};
use crate::{
    arbbitint::{ArbBitInt, max_signed, min_signed},
    constant::Constant,
    stamp::{FloatStamp, IntStamp, Stamp},
};

pub(super) struct FloatOps;

fn as_stamp(s: &Stamp) -> &FloatStamp {
    match s {
        Stamp::Float(x) => x,
        _ => panic!("{s} is not a float stamp"),
    }
}

/// Split `c` into its width and its value widened to `f64`.
fn as_f64(c: &Constant) -> (u32, f64) {
    match c {
        Constant::Float(x) => (32, f64::from(*x)),
        Constant::Double(x) => (64, *x),
        _ => panic!("{c} is not a float"),
    }
}

fn to_const(bitw: u32, v: f64) -> Constant {
    if bitw == 32 {
        Constant::Float(v as f32)
    } else {
        Constant::Double(v)
    }
}

fn round(bitw: u32, v: f64) -> f64 {
    if bitw == 32 { f64::from(v as f32) } else { v }
}

/// Java's `Math.min`: NaN if either operand is NaN, and `-0.0 < 0.0`.
fn java_min(x: f64, y: f64) -> f64 {
    if x.is_nan() || y.is_nan() {
        f64::NAN
    } else if x == 0.0 && y == 0.0 {
        if x.is_sign_negative() { x } else { y }
    } else {
        x.min(y)
    }
}

/// Java's `Math.max`: NaN if either operand is NaN, and `0.0 > -0.0`.
fn java_max(x: f64, y: f64) -> f64 {
    if x.is_nan() || y.is_nan() {
        f64::NAN
    } else if x == 0.0 && y == 0.0 {
        if x.is_sign_negative() { y } else { x }
    } else {
        x.max(y)
    }
}

/// A non-constant range whose ends touch zero may contain either zero.
fn widen_zeros(bitw: u32, lo: f64, hi: f64, nan: bool) -> FloatStamp {
    let lo = if lo == 0.0 { -0.0 } else { lo };
    let hi = if hi == 0.0 { 0.0 } else { hi };
    FloatStamp::new(bitw, lo, hi, nan)
}

/// The stamp of an `op` whose extremes over two ranges lie at the ranges' corners. Any infinite
/// bound gives up: corners then say nothing about NaNs (e.g. `inf - inf`).
fn corners(bitw: u32, x: &FloatStamp, y: &FloatStamp, op: impl Fn(f64, f64) -> f64) -> FloatStamp {
    let bounds = [x.lo(), x.hi(), y.lo(), y.hi()];
    if x.lo() > x.hi() || y.lo() > y.hi() || bounds.iter().any(|b| b.is_infinite()) {
        return FloatStamp::unrestricted(bitw);
    }
    let cs = [
        round(bitw, op(x.lo(), y.lo())),
        round(bitw, op(x.lo(), y.hi())),
        round(bitw, op(x.hi(), y.lo())),
        round(bitw, op(x.hi(), y.hi())),
    ];
    if cs.iter().any(|c| !c.is_finite()) {
        return FloatStamp::unrestricted(bitw);
    }
    let lo = cs.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = cs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    widen_zeros(bitw, lo, hi, x.may_be_nan() || y.may_be_nan())
}

impl OpTable for FloatOps {
    fn id(&self) -> OpTableId {
        OpTableId::Float
    }

    fn unary_const(&self, op: UnaryOp, x: &Constant) -> Option<Constant> {
        let (bitw, x) = as_f64(x);
        let r = match op {
            UnaryOp::Neg => -x,
            UnaryOp::Abs => x.abs(),
            UnaryOp::Sqrt => x.sqrt(),
            UnaryOp::Not | UnaryOp::ReverseBytes => super::unsupported(self.id(), op),
        };
        Some(to_const(bitw, round(bitw, r)))
    }

    fn unary_stamp(&self, op: UnaryOp, x: &Stamp) -> Stamp {
        let xs = as_stamp(x);
        let bitw = xs.bitw();
        if xs.is_empty() {
            return x.clone();
        }
        const_or(x.as_constant().and_then(|c| self.unary_const(op, &c)), || {
            let nan = xs.may_be_nan();
            Stamp::Float(match op {
                UnaryOp::Neg => FloatStamp::new(bitw, -xs.hi(), -xs.lo(), nan),
                UnaryOp::Abs if xs.lo() >= 0.0 => widen_zeros(bitw, xs.lo(), xs.hi(), nan),
                UnaryOp::Abs if xs.hi() <= 0.0 => widen_zeros(bitw, -xs.hi(), -xs.lo(), nan),
                UnaryOp::Abs => widen_zeros(bitw, 0.0, xs.hi().max(-xs.lo()), nan),
                UnaryOp::Sqrt if xs.lo() >= 0.0 => {
                    widen_zeros(bitw, round(bitw, xs.lo().sqrt()), round(bitw, xs.hi().sqrt()), nan)
                }
                UnaryOp::Sqrt => FloatStamp::unrestricted(bitw),
                UnaryOp::Not | UnaryOp::ReverseBytes => super::unsupported(self.id(), op),
            })
        })
    }

    fn binary_const(&self, op: BinaryOp, x: &Constant, y: &Constant) -> Option<Constant> {
        let (bitw, x) = as_f64(x);
        let (ybitw, y) = as_f64(y);
        assert_eq!(bitw, ybitw, "float width mismatch");
        let r = match op {
            BinaryOp::Add => x + y,
            BinaryOp::Sub => x - y,
            BinaryOp::Mul => x * y,
            BinaryOp::Div => x / y,
            BinaryOp::Rem => x % y,
            BinaryOp::Min => java_min(x, y),
            BinaryOp::Max => java_max(x, y),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::UMin | BinaryOp::UMax => {
                super::unsupported(self.id(), op)
            }
        };
        Some(to_const(bitw, round(bitw, r)))
    }

    fn binary_stamp(&self, op: BinaryOp, x: &Stamp, y: &Stamp) -> Stamp {
        let (xs, ys) = (as_stamp(x), as_stamp(y));
        let bitw = xs.bitw();
        assert_eq!(bitw, ys.bitw(), "incompatible stamps: {x} {op} {y}");
        if xs.is_empty() || ys.is_empty() {
            return Stamp::Float(FloatStamp::empty(bitw));
        }
        let c = match (x.as_constant(), y.as_constant()) {
            (Some(cx), Some(cy)) => self.binary_const(op, &cx, &cy),
            _ => None,
        };
        const_or(c, || {
            let nan = xs.may_be_nan() || ys.may_be_nan();
            Stamp::Float(match op {
                BinaryOp::Add => corners(bitw, xs, ys, |a, b| a + b),
                BinaryOp::Sub => corners(bitw, xs, ys, |a, b| a - b),
                BinaryOp::Mul => corners(bitw, xs, ys, |a, b| a * b),
                BinaryOp::Min if xs.lo() <= xs.hi() && ys.lo() <= ys.hi() => {
                    widen_zeros(bitw, xs.lo().min(ys.lo()), xs.hi().min(ys.hi()), nan)
                }
                BinaryOp::Max if xs.lo() <= xs.hi() && ys.lo() <= ys.hi() => {
                    widen_zeros(bitw, xs.lo().max(ys.lo()), xs.hi().max(ys.hi()), nan)
                }
                BinaryOp::Min | BinaryOp::Max | BinaryOp::Div | BinaryOp::Rem => {
                    FloatStamp::unrestricted(bitw)
                }
                BinaryOp::And | BinaryOp::Or | BinaryOp::Xor | BinaryOp::UMin | BinaryOp::UMax => {
                    super::unsupported(self.id(), op)
                }
            })
        })
    }

    fn binary_neutral(&self, op: BinaryOp, s: &Stamp) -> Option<Constant> {
        let bitw = s.bitw();
        match op {
            // `-0.0 + 0.0 == 0.0`, so only `-0.0` is neutral for addition.
            BinaryOp::Add => Some(to_const(bitw, -0.0)),
            BinaryOp::Sub => Some(to_const(bitw, 0.0)),
            BinaryOp::Mul | BinaryOp::Div => Some(to_const(bitw, 1.0)),
            _ => None,
        }
    }

    fn is_commutative(&self, op: BinaryOp) -> bool {
        matches!(
            op,
            BinaryOp::Add | BinaryOp::Mul | BinaryOp::Min | BinaryOp::Max
        )
    }

    fn ternary_const(
        &self,
        op: TernaryOp,
        a: &Constant,
        b: &Constant,
        c: &Constant,
    ) -> Option<Constant> {
        match op {
            TernaryOp::Fma => Some(match (a, b, c) {
                (Constant::Float(a), Constant::Float(b), Constant::Float(c)) => {
                    Constant::Float(a.mul_add(*b, *c))
                }
                (Constant::Double(a), Constant::Double(b), Constant::Double(c)) => {
                    Constant::Double(a.mul_add(*b, *c))
                }
                _ => panic!("cannot fold fma({a}, {b}, {c})"),
            }),
        }
    }

    fn ternary_stamp(&self, op: TernaryOp, a: &Stamp, b: &Stamp, c: &Stamp) -> Stamp {
        let bitw = as_stamp(a).bitw();
        if a.is_empty() || b.is_empty() || c.is_empty() {
            return Stamp::Float(FloatStamp::empty(bitw));
        }
        let folded = match (a.as_constant(), b.as_constant(), c.as_constant()) {
            (Some(a), Some(b), Some(c)) => self.ternary_const(op, &a, &b, &c),
            _ => None,
        };
        const_or(folded, || Stamp::Float(FloatStamp::unrestricted(bitw)))
    }

    fn float_convert_const(&self, op: FloatConvertOp, x: &Constant, to_bitw: u32) -> Option<Constant> {
        let (bitw, v) = as_f64(x);
        match op {
            FloatConvertOp::FPToSI => {
                // Saturating, with NaN converting to 0.
                let r = v.clamp(min_signed(to_bitw) as f64, max_signed(to_bitw) as f64) as i64;
                let r = if v.is_nan() { 0 } else { r };
                Some(Constant::Int(ArbBitInt::from_i64(to_bitw, r)))
            }
            FloatConvertOp::FPExt => {
                assert!(bitw == 32 && to_bitw == 64, "cannot fpext f{bitw} to f{to_bitw}");
                Some(Constant::Double(v))
            }
            FloatConvertOp::FPTrunc => {
                assert!(bitw == 64 && to_bitw == 32, "cannot fptrunc f{bitw} to f{to_bitw}");
                Some(Constant::Float(v as f32))
            }
            FloatConvertOp::SIToFP => super::unsupported(self.id(), op),
        }
    }

    fn float_convert_stamp(&self, op: FloatConvertOp, x: &Stamp, to_bitw: u32) -> Stamp {
        let xs = as_stamp(x);
        if let Some(c) = x
            .as_constant()
            .and_then(|c| self.float_convert_const(op, &c, to_bitw))
        {
            return Stamp::from_constant(&c);
        }
        match op {
            FloatConvertOp::FPToSI => {
                if xs.is_empty() {
                    return Stamp::Int(IntStamp::empty(to_bitw));
                }
                if xs.lo() > xs.hi() {
                    // Only NaN.
                    return Stamp::Int(IntStamp::range(to_bitw, 0, 0));
                }
                let sat = |v: f64| v.clamp(min_signed(to_bitw) as f64, max_signed(to_bitw) as f64) as i64;
                let (mut lo, mut hi) = (sat(xs.lo()), sat(xs.hi()));
                if xs.may_be_nan() {
                    lo = lo.min(0);
                    hi = hi.max(0);
                }
                Stamp::Int(IntStamp::range(to_bitw, lo, hi))
            }
            FloatConvertOp::FPExt => {
                assert_eq!(xs.bitw(), 32, "cannot fpext {x}");
                Stamp::Float(FloatStamp::new(64, xs.lo(), xs.hi(), xs.may_be_nan()))
            }
            FloatConvertOp::FPTrunc => {
                assert_eq!(xs.bitw(), 64, "cannot fptrunc {x}");
                Stamp::Float(FloatStamp::new(
                    32,
                    round(32, xs.lo()),
                    round(32, xs.hi()),
                    xs.may_be_nan(),
                ))
            }
            FloatConvertOp::SIToFP => super::unsupported(self.id(), op),
        }
    }

    fn reinterpret_const(&self, to: &Stamp, x: &Constant) -> Option<Constant> {
        let (bitw, _) = as_f64(x);
        assert_eq!(to.bitw(), bitw, "cannot reinterpret {x} as {to}");
        Some(match (to, x) {
            (Stamp::Float(_), _) => x.clone(),
            (Stamp::Int(_), Constant::Float(v)) => {
                Constant::Int(ArbBitInt::from_u64(32, u64::from(v.to_bits())))
            }
            (Stamp::Int(_), Constant::Double(v)) => {
                Constant::Int(ArbBitInt::from_u64(64, v.to_bits()))
            }
            _ => panic!("cannot reinterpret {x} as {to}"),
        })
    }

    fn reinterpret_stamp(&self, to: &Stamp, x: &Stamp) -> Stamp {
        let xs = as_stamp(x);
        assert_eq!(to.bitw(), xs.bitw(), "cannot reinterpret {x} as {to}");
        if xs.is_empty() {
            return to.empty();
        }
        if let Some(c) = x.as_constant().and_then(|c| self.reinterpret_const(to, &c)) {
            return Stamp::from_constant(&c);
        }
        match to {
            Stamp::Float(_) => x.clone(),
            _ => to.unrestricted(),
        }
    }
}
