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

//! The pure expression DAG. Nodes are immutable and reference counted, so
//! subtrees are freely shared between parents and cycles cannot be formed
//! by construction. Traversal is through [`Visitor`], whose associated
//! `Output` type replaces the registered-return-type dance a virtual
//! visitor would need: `()` for printing and side-effecting walks, a term
//! type for lowering.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, BitAnd, BitOr, Mul, Neg, Not, Sub};
use std::sync::Arc;

use crate::ty::{NumScalar, Scalar, ScalarType, ScalarVal};

pub type SharedExpr = Arc<Expr>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Bitwise complement, `~`.
    Not,
    /// Logical negation, `!`.
    Lnot,
    /// Arithmetic negation, `-`.
    Neg,
}

impl UnaryOp {
    pub fn token(self) -> &'static str {
        match self {
            UnaryOp::Not => "~",
            UnaryOp::Lnot => "!",
            UnaryOp::Neg => "-",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NaryOp {
    Add,
    Sub,
    Mul,
    Land,
    Lor,
    Eql,
    Neq,
    Lss,
    Gtr,
    Leq,
    Geq,
}

/// Algebraic properties of an n-ary operator. Identity and absorbing
/// elements are bit patterns in the operand type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OpAttr {
    pub commutative: bool,
    pub identity: Option<u64>,
    pub absorbing: Option<u64>,
}

const fn attr(commutative: bool, identity: Option<u64>, absorbing: Option<u64>) -> OpAttr {
    OpAttr { commutative, identity, absorbing }
}

impl NaryOp {
    pub fn token(self) -> &'static str {
        match self {
            NaryOp::Add => "+",
            NaryOp::Sub => "-",
            NaryOp::Mul => "*",
            NaryOp::Land => "&&",
            NaryOp::Lor => "||",
            NaryOp::Eql => "==",
            NaryOp::Neq => "!=",
            NaryOp::Lss => "<",
            NaryOp::Gtr => ">",
            NaryOp::Leq => "<=",
            NaryOp::Geq => ">=",
        }
    }

    pub fn attr(self) -> OpAttr {
        match self {
            NaryOp::Add => attr(true, Some(0), None),
            NaryOp::Sub => attr(false, None, None),
            NaryOp::Mul => attr(true, Some(1), Some(0)),
            NaryOp::Land => attr(true, Some(1), Some(0)),
            NaryOp::Lor => attr(true, Some(0), Some(1)),
            NaryOp::Eql => attr(true, None, None),
            NaryOp::Neq => attr(true, None, None),
            NaryOp::Lss | NaryOp::Gtr | NaryOp::Leq | NaryOp::Geq => attr(false, None, None),
        }
    }

    /// Whether the operator yields a boolean regardless of operand type.
    pub fn is_predicate(self) -> bool {
        match self {
            NaryOp::Land | NaryOp::Lor | NaryOp::Eql | NaryOp::Neq | NaryOp::Lss | NaryOp::Gtr
            | NaryOp::Leq | NaryOp::Geq => true,
            _ => false,
        }
    }

    pub fn result_ty(self, operand: ScalarType) -> ScalarType {
        if self.is_predicate() {
            ScalarType::Bool
        } else {
            operand
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Any,
    Value,
    Cast,
    Unary,
    Ternary,
    Nary,
}

#[derive(Debug)]
pub enum Expr {
    /// A fresh symbolic value. Distinct nodes are distinct symbols even
    /// under the same name; the encoder interns constants by name.
    Any { ty: ScalarType, name: String },
    Value(ScalarVal),
    Cast { ty: ScalarType, expr: SharedExpr },
    Unary { op: UnaryOp, expr: SharedExpr },
    Ternary { cond: SharedExpr, then_expr: SharedExpr, else_expr: SharedExpr },
    Nary { op: NaryOp, attr: OpAttr, exprs: Vec<SharedExpr> },
}

impl Expr {
    pub fn any(ty: ScalarType, name: impl Into<String>) -> SharedExpr {
        Arc::new(Expr::Any { ty, name: name.into() })
    }

    pub fn value(value: ScalarVal) -> SharedExpr {
        Arc::new(Expr::Value(value))
    }

    pub fn cast(ty: ScalarType, expr: SharedExpr) -> SharedExpr {
        Arc::new(Expr::Cast { ty, expr })
    }

    pub fn unary(op: UnaryOp, expr: SharedExpr) -> SharedExpr {
        Arc::new(Expr::Unary { op, expr })
    }

    pub fn ternary(cond: SharedExpr, then_expr: SharedExpr, else_expr: SharedExpr) -> SharedExpr {
        Arc::new(Expr::Ternary { cond, then_expr, else_expr })
    }

    pub fn nary(op: NaryOp, exprs: Vec<SharedExpr>) -> SharedExpr {
        assert!(exprs.len() >= 2, "n-ary expression needs at least two operands");
        Arc::new(Expr::Nary { op, attr: op.attr(), exprs })
    }

    pub fn kind(&self) -> ExprKind {
        match self {
            Expr::Any { .. } => ExprKind::Any,
            Expr::Value(_) => ExprKind::Value,
            Expr::Cast { .. } => ExprKind::Cast,
            Expr::Unary { .. } => ExprKind::Unary,
            Expr::Ternary { .. } => ExprKind::Ternary,
            Expr::Nary { .. } => ExprKind::Nary,
        }
    }

    pub fn ty(&self) -> ScalarType {
        match self {
            Expr::Any { ty, .. } => *ty,
            Expr::Value(value) => value.ty(),
            Expr::Cast { ty, .. } => *ty,
            Expr::Unary { op: UnaryOp::Lnot, .. } => ScalarType::Bool,
            Expr::Unary { expr, .. } => expr.ty(),
            Expr::Ternary { then_expr, .. } => then_expr.ty(),
            Expr::Nary { op, exprs, .. } => op.result_ty(exprs[0].ty()),
        }
    }

    pub fn is_symbolic(&self) -> bool {
        match self {
            Expr::Any { .. } => true,
            Expr::Value(_) => false,
            Expr::Cast { expr, .. } | Expr::Unary { expr, .. } => expr.is_symbolic(),
            Expr::Ternary { cond, then_expr, else_expr } => {
                cond.is_symbolic() || then_expr.is_symbolic() || else_expr.is_symbolic()
            }
            Expr::Nary { exprs, .. } => exprs.iter().any(|e| e.is_symbolic()),
        }
    }

    /// Double dispatch: hand this node to the matching `visit_*` overload.
    pub fn walk<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            Expr::Any { ty, name } => visitor.visit_any(*ty, name),
            Expr::Value(value) => visitor.visit_value(*value),
            Expr::Cast { ty, expr } => visitor.visit_cast(*ty, expr),
            Expr::Unary { op, expr } => visitor.visit_unary(*op, expr),
            Expr::Ternary { cond, then_expr, else_expr } => {
                visitor.visit_ternary(cond, then_expr, else_expr)
            }
            Expr::Nary { op, attr, exprs } => visitor.visit_nary(*op, *attr, exprs),
        }
    }

    pub fn write<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        write!(out, "{}", self)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Any { name, .. } => write!(f, "[{}]", name),
            Expr::Value(value) => write!(f, "{}", value),
            Expr::Cast { ty, expr } => write!(f, "(({}){})", ty, expr),
            Expr::Unary { op, expr } => write!(f, "({}{})", op.token(), expr),
            Expr::Ternary { cond, then_expr, else_expr } => {
                write!(f, "({}?{}:{})", cond, then_expr, else_expr)
            }
            Expr::Nary { op, exprs, .. } => {
                write!(f, "({}", exprs[0])?;
                for expr in &exprs[1..] {
                    write!(f, "{}{}", op.token(), expr)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Traversal interface over the expression DAG. Visitors choose their
/// return type through `Output`; shared subtrees are revisited unless the
/// visitor memoizes.
pub trait Visitor {
    type Output;

    fn visit_any(&mut self, ty: ScalarType, name: &str) -> Self::Output;
    fn visit_value(&mut self, value: ScalarVal) -> Self::Output;
    fn visit_cast(&mut self, ty: ScalarType, expr: &SharedExpr) -> Self::Output;
    fn visit_unary(&mut self, op: UnaryOp, expr: &SharedExpr) -> Self::Output;
    fn visit_ternary(
        &mut self,
        cond: &SharedExpr,
        then_expr: &SharedExpr,
        else_expr: &SharedExpr,
    ) -> Self::Output;
    fn visit_nary(&mut self, op: NaryOp, attr: OpAttr, exprs: &[SharedExpr]) -> Self::Output;
}

/// A concrete or symbolic value of type `T`, wrapping a shared expression.
#[derive(Clone, Debug)]
pub struct Value<T: Scalar> {
    expr: SharedExpr,
    _marker: PhantomData<T>,
}

impl<T: Scalar> Value<T> {
    pub fn literal(value: T) -> Self {
        Value::from_expr(Expr::value(value.to_val()))
    }

    pub fn symbolic(name: impl Into<String>) -> Self {
        Value::from_expr(Expr::any(T::TYPE, name))
    }

    pub fn from_expr(expr: SharedExpr) -> Self {
        Value { expr, _marker: PhantomData }
    }

    pub fn expr(&self) -> &SharedExpr {
        &self.expr
    }

    pub fn is_symbolic(&self) -> bool {
        self.expr.is_symbolic()
    }

    pub fn cast<U: Scalar>(&self) -> Value<U> {
        Value::from_expr(Expr::cast(U::TYPE, self.expr.clone()))
    }

    fn compare(self, op: NaryOp, rhs: Value<T>) -> Value<bool> {
        Value::from_expr(Expr::nary(op, vec![self.expr, rhs.expr]))
    }

    pub fn lt(self, rhs: impl Into<Value<T>>) -> Value<bool> {
        self.compare(NaryOp::Lss, rhs.into())
    }

    pub fn le(self, rhs: impl Into<Value<T>>) -> Value<bool> {
        self.compare(NaryOp::Leq, rhs.into())
    }

    pub fn gt(self, rhs: impl Into<Value<T>>) -> Value<bool> {
        self.compare(NaryOp::Gtr, rhs.into())
    }

    pub fn ge(self, rhs: impl Into<Value<T>>) -> Value<bool> {
        self.compare(NaryOp::Geq, rhs.into())
    }

    pub fn eq(self, rhs: impl Into<Value<T>>) -> Value<bool> {
        self.compare(NaryOp::Eql, rhs.into())
    }

    pub fn ne(self, rhs: impl Into<Value<T>>) -> Value<bool> {
        self.compare(NaryOp::Neq, rhs.into())
    }
}

impl<T: Scalar> From<T> for Value<T> {
    fn from(value: T) -> Self {
        Value::literal(value)
    }
}

impl<T: Scalar> fmt::Display for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

macro_rules! impl_value_binop {
    ($trait:ident, $method:ident, $op:ident) => {
        impl<T: NumScalar> $trait<Value<T>> for Value<T> {
            type Output = Value<T>;

            fn $method(self, rhs: Value<T>) -> Value<T> {
                Value::from_expr(Expr::nary(NaryOp::$op, vec![self.expr, rhs.expr]))
            }
        }

        impl<T: NumScalar> $trait<T> for Value<T> {
            type Output = Value<T>;

            fn $method(self, rhs: T) -> Value<T> {
                self.$method(Value::literal(rhs))
            }
        }
    };
}

impl_value_binop!(Add, add, Add);
impl_value_binop!(Sub, sub, Sub);
impl_value_binop!(Mul, mul, Mul);

impl<T: NumScalar> Neg for Value<T> {
    type Output = Value<T>;

    fn neg(self) -> Value<T> {
        Value::from_expr(Expr::unary(UnaryOp::Neg, self.expr))
    }
}

impl Not for Value<bool> {
    type Output = Value<bool>;

    fn not(self) -> Value<bool> {
        Value::from_expr(Expr::unary(UnaryOp::Lnot, self.expr))
    }
}

impl BitAnd for Value<bool> {
    type Output = Value<bool>;

    fn bitand(self, rhs: Value<bool>) -> Value<bool> {
        Value::from_expr(Expr::nary(NaryOp::Land, vec![self.expr, rhs.expr]))
    }
}

impl BitOr for Value<bool> {
    type Output = Value<bool>;

    fn bitor(self, rhs: Value<bool>) -> Value<bool> {
        Value::from_expr(Expr::nary(NaryOp::Lor, vec![self.expr, rhs.expr]))
    }
}

/// A fresh symbolic value of type `T` under the given name.
pub fn any<T: Scalar>(name: impl Into<String>) -> Value<T> {
    Value::symbolic(name)
}

pub fn any_bool(name: impl Into<String>) -> Value<bool> {
    any(name)
}

pub fn any_char(name: impl Into<String>) -> Value<i8> {
    any(name)
}

pub fn any_short(name: impl Into<String>) -> Value<i16> {
    any(name)
}

pub fn any_int(name: impl Into<String>) -> Value<i32> {
    any(name)
}

pub fn any_long(name: impl Into<String>) -> Value<i64> {
    any(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_add_literal() {
        let a = any_int("A");
        let a = a + 2;
        assert_eq!(a.to_string(), "([A]+2)");
    }

    #[test]
    fn test_symbolic_propagates() {
        let a = any_int("A");
        assert!(a.is_symbolic());
        let sum = a + 2;
        assert!(sum.is_symbolic());
        let two: Value<i32> = 2.into();
        assert!(!two.is_symbolic());
    }

    #[test]
    fn test_distinct_nodes_under_one_name() {
        let a = any_int("CommonVar");
        let b = any_int("CommonVar");
        assert!(!Arc::ptr_eq(a.expr(), b.expr()));
    }

    #[test]
    fn test_attrs() {
        assert!(NaryOp::Add.attr().commutative);
        assert_eq!(NaryOp::Add.attr().identity, Some(0));
        assert_eq!(NaryOp::Mul.attr().absorbing, Some(0));
        assert!(!NaryOp::Lss.attr().commutative);
        assert_eq!(NaryOp::Lss.result_ty(ScalarType::I32), ScalarType::Bool);
    }

    struct Postorder {
        out: String,
    }

    impl Visitor for Postorder {
        type Output = ();

        fn visit_any(&mut self, _ty: ScalarType, name: &str) {
            self.out.push_str(&format!("[{}]", name));
        }

        fn visit_value(&mut self, value: ScalarVal) {
            self.out.push_str(&value.to_string());
        }

        fn visit_cast(&mut self, ty: ScalarType, expr: &SharedExpr) {
            expr.walk(self);
            self.out.push_str(ty.name());
        }

        fn visit_unary(&mut self, op: UnaryOp, expr: &SharedExpr) {
            expr.walk(self);
            self.out.push_str(op.token());
        }

        fn visit_ternary(
            &mut self,
            cond: &SharedExpr,
            then_expr: &SharedExpr,
            else_expr: &SharedExpr,
        ) {
            cond.walk(self);
            then_expr.walk(self);
            else_expr.walk(self);
        }

        fn visit_nary(&mut self, op: NaryOp, _attr: OpAttr, exprs: &[SharedExpr]) {
            for expr in exprs {
                expr.walk(self);
            }
            self.out.push_str(op.token());
        }
    }

    #[test]
    fn test_postorder_visit() {
        let a = Expr::any(ScalarType::I32, "A");
        let five = Expr::value(ScalarVal::I16(5));
        let lss = Expr::nary(NaryOp::Lss, vec![a, five]);
        let neg = Expr::unary(UnaryOp::Lnot, lss);
        let c = Expr::any(ScalarType::I32, "C");
        let cast = Expr::cast(ScalarType::I8, c);
        let sum = Expr::nary(
            NaryOp::Add,
            vec![
                Expr::any(ScalarType::I32, "D"),
                Expr::any(ScalarType::I32, "E"),
                Expr::any(ScalarType::I32, "F"),
            ],
        );
        let ternary = Expr::ternary(neg, cast, sum);

        let mut visitor = Postorder { out: String::new() };
        ternary.walk(&mut visitor);
        assert_eq!(visitor.out, "[A]5<![C]char[D][E][F]+");
    }

    #[test]
    fn test_shared_subtree_types() {
        let a = Expr::any(ScalarType::I64, "A");
        let twice = Expr::nary(NaryOp::Add, vec![a.clone(), a]);
        assert_eq!(twice.ty(), ScalarType::I64);
        assert_eq!(Expr::cast(ScalarType::Bool, twice).ty(), ScalarType::Bool);
    }
}
