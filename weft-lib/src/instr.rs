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

//! Read instructions: the expression DAG whose leaves are recorded read
//! events rather than anonymous symbols. Every node carries an optional
//! guard, the path condition under which it was evaluated. Operands of one
//! operator were evaluated under a single path, so combining nodes with
//! different guards is a fatal programming error; the one exception is an
//! unguarded literal, which has no event identity and simply adopts its
//! sibling's guard.

use std::collections::{HashSet, VecDeque};
use std::marker::PhantomData;
use std::ops::{Add, BitAnd, BitOr, Mul, Neg, Not, Sub};
use std::sync::Arc;

use lazy_static::lazy_static;

use crate::event::{Event, EventId};
use crate::expr::{Expr, NaryOp, SharedExpr, UnaryOp};
use crate::ty::{NumScalar, Scalar, ScalarType, ScalarVal};

pub type SharedInstr = Arc<Instr>;

#[derive(Debug)]
pub enum Instr {
    /// A pure expression leaf: a concrete literal or a named symbol.
    Literal { expr: SharedExpr, guard: Option<SharedInstr> },
    /// A reference to a recorded read event.
    Basic { event: Arc<Event> },
    Unary { op: UnaryOp, ty: ScalarType, operand: SharedInstr },
    Binary { op: NaryOp, ty: ScalarType, lhs: SharedInstr, rhs: SharedInstr },
}

lazy_static! {
    static ref TRUE_INSTR: SharedInstr = Arc::new(Instr::Literal {
        expr: Expr::value(ScalarVal::Bool(true)),
        guard: None,
    });
}

/// The shared `true` literal an empty path condition reports as its top.
pub fn true_instr() -> SharedInstr {
    TRUE_INSTR.clone()
}

fn guard_compatible(a: Option<&SharedInstr>, b: Option<&SharedInstr>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => Arc::ptr_eq(x, y),
        _ => false,
    }
}

fn is_unguarded_literal(node: &Instr) -> bool {
    match node {
        Instr::Literal { guard: None, .. } => true,
        _ => false,
    }
}

fn with_guard(node: &Instr, guard: Option<SharedInstr>) -> SharedInstr {
    match node {
        Instr::Literal { expr, .. } => Arc::new(Instr::Literal { expr: expr.clone(), guard }),
        _ => unreachable!("only literals adopt guards"),
    }
}

impl Instr {
    pub fn literal_val(value: ScalarVal, guard: Option<SharedInstr>) -> SharedInstr {
        Arc::new(Instr::Literal { expr: Expr::value(value), guard })
    }

    pub fn literal_expr(expr: SharedExpr, guard: Option<SharedInstr>) -> SharedInstr {
        Arc::new(Instr::Literal { expr, guard })
    }

    pub fn basic(event: Arc<Event>) -> SharedInstr {
        assert!(
            event.is_read(),
            "basic read instruction requires a read event, got event {}",
            event.event_id()
        );
        Arc::new(Instr::Basic { event })
    }

    pub fn unary(op: UnaryOp, operand: SharedInstr) -> SharedInstr {
        let ty = match op {
            UnaryOp::Lnot => ScalarType::Bool,
            _ => operand.ty(),
        };
        Arc::new(Instr::Unary { op, ty, operand })
    }

    pub fn binary(op: NaryOp, lhs: SharedInstr, rhs: SharedInstr) -> SharedInstr {
        let (lhs, rhs) = if guard_compatible(lhs.guard(), rhs.guard()) {
            (lhs, rhs)
        } else if is_unguarded_literal(&lhs) {
            let guard = rhs.guard().cloned();
            (with_guard(&lhs, guard), rhs)
        } else if is_unguarded_literal(&rhs) {
            let guard = lhs.guard().cloned();
            let rhs = with_guard(&rhs, guard);
            (lhs, rhs)
        } else {
            panic!(
                "operands of a {:?} read instruction were evaluated under different guards",
                op
            );
        };
        let ty = op.result_ty(lhs.ty());
        Arc::new(Instr::Binary { op, ty, lhs, rhs })
    }

    /// Conjunction used by the path condition when nesting guard frames.
    /// Frames deliberately cross guard boundaries, so no operand check.
    pub(crate) fn conjoin(lhs: SharedInstr, rhs: SharedInstr) -> SharedInstr {
        Arc::new(Instr::Binary { op: NaryOp::Land, ty: ScalarType::Bool, lhs, rhs })
    }

    pub(crate) fn negate(operand: SharedInstr) -> SharedInstr {
        Arc::new(Instr::Unary { op: UnaryOp::Lnot, ty: ScalarType::Bool, operand })
    }

    pub fn ty(&self) -> ScalarType {
        match self {
            Instr::Literal { expr, .. } => expr.ty(),
            Instr::Basic { event } => event.ty(),
            Instr::Unary { ty, .. } | Instr::Binary { ty, .. } => *ty,
        }
    }

    /// The guard all parts of this DAG were evaluated under.
    pub fn guard(&self) -> Option<&SharedInstr> {
        match self {
            Instr::Literal { guard, .. } => guard.as_ref(),
            Instr::Basic { event } => event.guard(),
            Instr::Unary { operand, .. } => operand.guard(),
            Instr::Binary { lhs, .. } => lhs.guard(),
        }
    }

    /// Harvest the read events this DAG references. Leaves are pushed onto
    /// the front in postorder, so `out` reads right-to-left relative to the
    /// source expression; reversing it recovers source order. Each distinct
    /// event identity is emitted at most once.
    pub fn filter(&self, out: &mut VecDeque<Arc<Event>>) {
        let mut seen: HashSet<EventId> = out.iter().map(|e| e.event_id()).collect();
        self.filter_into(out, &mut seen);
    }

    fn filter_into(&self, out: &mut VecDeque<Arc<Event>>, seen: &mut HashSet<EventId>) {
        match self {
            Instr::Literal { .. } => (),
            Instr::Basic { event } => {
                if seen.insert(event.event_id()) {
                    out.push_front(event.clone());
                }
            }
            Instr::Unary { operand, .. } => operand.filter_into(out, seen),
            Instr::Binary { lhs, rhs, .. } => {
                lhs.filter_into(out, seen);
                rhs.filter_into(out, seen);
            }
        }
    }
}

/// Typed handle over a shared instruction node.
#[derive(Clone, Debug)]
pub struct ReadInstr<T: Scalar> {
    node: SharedInstr,
    _marker: PhantomData<T>,
}

impl<T: Scalar> ReadInstr<T> {
    pub fn literal(value: T) -> Self {
        ReadInstr::from_node(Instr::literal_val(value.to_val(), None))
    }

    pub fn literal_guarded(value: T, guard: Option<SharedInstr>) -> Self {
        ReadInstr::from_node(Instr::literal_val(value.to_val(), guard))
    }

    pub fn symbolic(name: impl Into<String>) -> Self {
        ReadInstr::from_node(Instr::literal_expr(Expr::any(T::TYPE, name), None))
    }

    pub fn basic(event: Arc<Event>) -> Self {
        debug_assert_eq!(event.ty(), T::TYPE);
        ReadInstr::from_node(Instr::basic(event))
    }

    pub fn from_node(node: SharedInstr) -> Self {
        ReadInstr { node, _marker: PhantomData }
    }

    pub fn node(&self) -> &SharedInstr {
        &self.node
    }

    pub fn into_node(self) -> SharedInstr {
        self.node
    }

    pub fn guard(&self) -> Option<SharedInstr> {
        self.node.guard().cloned()
    }

    fn compare(self, op: NaryOp, rhs: ReadInstr<T>) -> ReadInstr<bool> {
        ReadInstr::from_node(Instr::binary(op, self.node, rhs.node))
    }

    pub fn lt(self, rhs: impl Into<ReadInstr<T>>) -> ReadInstr<bool> {
        self.compare(NaryOp::Lss, rhs.into())
    }

    pub fn le(self, rhs: impl Into<ReadInstr<T>>) -> ReadInstr<bool> {
        self.compare(NaryOp::Leq, rhs.into())
    }

    pub fn gt(self, rhs: impl Into<ReadInstr<T>>) -> ReadInstr<bool> {
        self.compare(NaryOp::Gtr, rhs.into())
    }

    pub fn ge(self, rhs: impl Into<ReadInstr<T>>) -> ReadInstr<bool> {
        self.compare(NaryOp::Geq, rhs.into())
    }

    pub fn eq(self, rhs: impl Into<ReadInstr<T>>) -> ReadInstr<bool> {
        self.compare(NaryOp::Eql, rhs.into())
    }

    pub fn ne(self, rhs: impl Into<ReadInstr<T>>) -> ReadInstr<bool> {
        self.compare(NaryOp::Neq, rhs.into())
    }
}

impl<T: Scalar> From<T> for ReadInstr<T> {
    fn from(value: T) -> Self {
        ReadInstr::literal(value)
    }
}

macro_rules! impl_instr_binop {
    ($trait:ident, $method:ident, $op:ident) => {
        impl<T: NumScalar> $trait<ReadInstr<T>> for ReadInstr<T> {
            type Output = ReadInstr<T>;

            fn $method(self, rhs: ReadInstr<T>) -> ReadInstr<T> {
                ReadInstr::from_node(Instr::binary(NaryOp::$op, self.node, rhs.node))
            }
        }

        impl<T: NumScalar> $trait<T> for ReadInstr<T> {
            type Output = ReadInstr<T>;

            fn $method(self, rhs: T) -> ReadInstr<T> {
                self.$method(ReadInstr::literal(rhs))
            }
        }
    };
}

impl_instr_binop!(Add, add, Add);
impl_instr_binop!(Sub, sub, Sub);
impl_instr_binop!(Mul, mul, Mul);

impl<T: NumScalar> Neg for ReadInstr<T> {
    type Output = ReadInstr<T>;

    fn neg(self) -> ReadInstr<T> {
        ReadInstr::from_node(Instr::unary(UnaryOp::Neg, self.node))
    }
}

impl Not for ReadInstr<bool> {
    type Output = ReadInstr<bool>;

    fn not(self) -> ReadInstr<bool> {
        ReadInstr::from_node(Instr::unary(UnaryOp::Lnot, self.node))
    }
}

impl BitAnd for ReadInstr<bool> {
    type Output = ReadInstr<bool>;

    fn bitand(self, rhs: ReadInstr<bool>) -> ReadInstr<bool> {
        ReadInstr::from_node(Instr::binary(NaryOp::Land, self.node, rhs.node))
    }
}

impl BitOr for ReadInstr<bool> {
    type Output = ReadInstr<bool>;

    fn bitor(self, rhs: ReadInstr<bool>) -> ReadInstr<bool> {
        ReadInstr::from_node(Instr::binary(NaryOp::Lor, self.node, rhs.node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::reset_id;
    use crate::zone::Zone;

    fn read_event(ty: ScalarType) -> Arc<Event> {
        Event::read(3, Zone::unique_atom(), ty, None)
    }

    fn guarded_read_event(ty: ScalarType, guard: &SharedInstr) -> Arc<Event> {
        Event::read(3, Zone::unique_atom(), ty, Some(guard.clone()))
    }

    #[test]
    fn test_literal_instr() {
        let instr = ReadInstr::<u64>::literal(0);
        match &**instr.node() {
            Instr::Literal { expr, guard } => {
                assert_eq!(expr.to_string(), "0");
                assert!(guard.is_none());
            }
            other => panic!("unexpected node: {:?}", other),
        }
    }

    #[test]
    fn test_basic_instr_ids() {
        reset_id(4);
        let instr = ReadInstr::<i32>::basic(read_event(ScalarType::I32));
        match &**instr.node() {
            Instr::Basic { event } => {
                assert_eq!(event.event_id(), 2 * 4);
                assert_eq!(event.zone().len(), 1);
            }
            other => panic!("unexpected node: {:?}", other),
        }
        reset_id(0);
    }

    #[test]
    fn test_guard_propagates_upward() {
        reset_id(7);
        let cond = Instr::basic(read_event(ScalarType::Bool));
        let a = Instr::basic(guarded_read_event(ScalarType::I32, &cond));
        let b = Instr::basic(guarded_read_event(ScalarType::I32, &cond));
        let sum = Instr::binary(NaryOp::Add, a, b);
        assert!(Arc::ptr_eq(sum.guard().unwrap(), &cond));
        let neg = Instr::unary(UnaryOp::Neg, sum);
        assert!(Arc::ptr_eq(neg.guard().unwrap(), &cond));
        reset_id(0);
    }

    #[test]
    fn test_unguarded_literal_adopts_sibling_guard() {
        let cond = Instr::basic(read_event(ScalarType::Bool));
        let read = ReadInstr::<i32>::basic(guarded_read_event(ScalarType::I32, &cond));
        let sum = read + 1;
        assert!(Arc::ptr_eq(sum.node().guard().unwrap(), &cond));
    }

    #[test]
    #[should_panic(expected = "different guards")]
    fn test_binary_with_mismatched_guards_panics() {
        let cond_a = Instr::basic(read_event(ScalarType::Bool));
        let cond_b = Instr::basic(read_event(ScalarType::Bool));
        let a = Instr::basic(guarded_read_event(ScalarType::I32, &cond_a));
        let b = Instr::basic(guarded_read_event(ScalarType::I32, &cond_b));
        Instr::binary(NaryOp::Add, a, b);
    }

    #[test]
    #[should_panic(expected = "requires a read event")]
    fn test_basic_from_write_event_panics() {
        let write = Event::write(
            0,
            Zone::unique_atom(),
            ScalarType::I32,
            Instr::literal_val(ScalarVal::I32(1), None),
            None,
        );
        Instr::basic(write);
    }

    #[test]
    fn test_filter_emits_right_to_left() {
        reset_id(7);
        let a = Instr::basic(read_event(ScalarType::I32));
        let b = Instr::basic(read_event(ScalarType::I32));
        let sum = Instr::binary(NaryOp::Add, a, b);

        let mut out = VecDeque::new();
        sum.filter(&mut out);
        // the rhs event surfaces first; reversing recovers source order
        let ids: Vec<_> = out.iter().map(|e| e.event_id()).collect();
        assert_eq!(ids, vec![2 * 8, 2 * 7]);
        reset_id(0);
    }

    #[test]
    fn test_filter_suppresses_duplicates_and_is_idempotent() {
        reset_id(0);
        let event = read_event(ScalarType::I32);
        let a = Instr::basic(event.clone());
        let b = Instr::basic(event);
        let sum = Instr::binary(NaryOp::Add, a, b);

        let mut first = VecDeque::new();
        sum.filter(&mut first);
        assert_eq!(first.len(), 1);

        let mut second = VecDeque::new();
        sum.filter(&mut second);
        let first_ids: Vec<_> = first.iter().map(|e| e.event_id()).collect();
        let second_ids: Vec<_> = second.iter().map(|e| e.event_id()).collect();
        assert_eq!(first_ids, second_ids);
        reset_id(0);
    }

    #[test]
    fn test_nested_filter_order() {
        reset_id(1);
        let a = Instr::basic(read_event(ScalarType::I32));
        let b = Instr::basic(read_event(ScalarType::I32));
        let c = Instr::basic(read_event(ScalarType::I32));
        let inner = Instr::binary(NaryOp::Add, a, b);
        let outer = Instr::binary(NaryOp::Add, inner, c);

        let mut out = VecDeque::new();
        outer.filter(&mut out);
        let ids: Vec<_> = out.iter().map(|e| e.event_id()).collect();
        assert_eq!(ids, vec![6, 4, 2]);
        reset_id(0);
    }
}
