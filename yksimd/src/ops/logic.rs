use super::{BinaryOp, OpTable, OpTableId, UnaryOp};
use crate::{
    arbbitint::ArbBitInt,
    constant::Constant,
    stamp::{IntStamp, LogicValue, Stamp},
};

/// The operator table for single mask bits.
pub(super) struct LogicOps;

fn as_bool(c: &Constant) -> bool {
    match c {
        Constant::Logic(x) => *x,
        _ => panic!("{c} is not a logic value"),
    }
}

fn as_logic(s: &Stamp) -> LogicValue {
    match s {
        Stamp::Logic(x) => *x,
        _ => panic!("{s} is not a logic stamp"),
    }
}

impl OpTable for LogicOps {
    fn id(&self) -> OpTableId {
        OpTableId::Logic
    }

    fn unary_const(&self, op: UnaryOp, x: &Constant) -> Option<Constant> {
        match op {
            UnaryOp::Not => Some(Constant::Logic(!as_bool(x))),
            _ => super::unsupported(self.id(), op),
        }
    }

    fn unary_stamp(&self, op: UnaryOp, x: &Stamp) -> Stamp {
        match op {
            UnaryOp::Not => Stamp::Logic(as_logic(x).not()),
            _ => super::unsupported(self.id(), op),
        }
    }

    fn binary_const(&self, op: BinaryOp, x: &Constant, y: &Constant) -> Option<Constant> {
        let (x, y) = (as_bool(x), as_bool(y));
        Some(Constant::Logic(match op {
            BinaryOp::And => x && y,
            BinaryOp::Or => x || y,
            BinaryOp::Xor => x ^ y,
            _ => super::unsupported(self.id(), op),
        }))
    }

    fn binary_stamp(&self, op: BinaryOp, x: &Stamp, y: &Stamp) -> Stamp {
        let (x, y) = (as_logic(x), as_logic(y));
        Stamp::Logic(match op {
            BinaryOp::And => x.and(y),
            BinaryOp::Or => x.or(y),
            BinaryOp::Xor => x.xor(y),
            _ => super::unsupported(self.id(), op),
        })
    }

    fn binary_neutral(&self, op: BinaryOp, _s: &Stamp) -> Option<Constant> {
        match op {
            BinaryOp::And => Some(Constant::Logic(true)),
            BinaryOp::Or | BinaryOp::Xor => Some(Constant::Logic(false)),
            _ => None,
        }
    }

    fn binary_zero(&self, op: BinaryOp, _s: &Stamp) -> Option<Constant> {
        match op {
            BinaryOp::Xor => Some(Constant::Logic(false)),
            _ => None,
        }
    }

    fn is_associative(&self, op: BinaryOp) -> bool {
        matches!(op, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }

    fn is_commutative(&self, op: BinaryOp) -> bool {
        self.is_associative(op)
    }

    /// A set bit becomes an all-ones integer.
    fn reinterpret_const(&self, to: &Stamp, x: &Constant) -> Option<Constant> {
        let b = as_bool(x);
        Some(match to {
            Stamp::Logic(_) => x.clone(),
            Stamp::Int(i) if b => Constant::Int(ArbBitInt::all_bits_set(i.bitw())),
            Stamp::Int(i) => Constant::Int(ArbBitInt::zero(i.bitw())),
            _ => panic!("cannot reinterpret {x} as {to}"),
        })
    }

    fn reinterpret_stamp(&self, to: &Stamp, x: &Stamp) -> Stamp {
        let l = as_logic(x);
        match to {
            Stamp::Logic(_) => x.clone(),
            Stamp::Int(i) => match l {
                LogicValue::Empty => to.empty(),
                LogicValue::False => Stamp::Int(IntStamp::range(i.bitw(), 0, 0)),
                LogicValue::True => Stamp::Int(IntStamp::range(i.bitw(), -1, -1)),
                LogicValue::Unrestricted => Stamp::Int(IntStamp::range(i.bitw(), -1, 0)),
            },
            _ => panic!("cannot reinterpret {x} as {to}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn table() {
        let l = Stamp::Logic(LogicValue::Unrestricted);
        assert_eq!(LogicOps.binary_neutral(BinaryOp::And, &l), Some(Constant::Logic(true)));
        assert_eq!(LogicOps.binary_neutral(BinaryOp::Xor, &l), Some(Constant::Logic(false)));
        assert_eq!(LogicOps.binary_zero(BinaryOp::Xor, &l), Some(Constant::Logic(false)));
        assert_eq!(LogicOps.binary_zero(BinaryOp::And, &l), None);
        assert_eq!(
            LogicOps.binary_stamp(BinaryOp::Or, &Stamp::Logic(LogicValue::True), &l),
            Stamp::Logic(LogicValue::True)
        );
        let i8s = Stamp::Int(IntStamp::unrestricted(8));
        assert_eq!(
            LogicOps.reinterpret_const(&i8s, &Constant::Logic(true)),
            Some(Constant::Int(ArbBitInt::from_i64(8, -1)))
        );
        assert_eq!(
            LogicOps.reinterpret_stamp(&i8s, &l),
            Stamp::Int(IntStamp::range(8, -1, 0))
        );
    }
}
