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

//! The SMT layer. `smtlib` is a structural term model over booleans and
//! bitvectors that renders as SMT-LIB2; [`Solver`] is the whole interface a
//! backend has to provide. The in-tree [`Script`] backend only collects and
//! serializes definitions, reporting `unknown` from every check, so wiring
//! in a deciding solver means implementing [`Solver`] over its API.

use std::fmt;

pub mod smtlib {
    use std::fmt;

    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub enum Ty {
        Bool,
        BitVec(u32),
    }

    impl fmt::Display for Ty {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Ty::Bool => write!(f, "Bool"),
                Ty::BitVec(width) => write!(f, "(_ BitVec {})", width),
            }
        }
    }

    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Sym(pub u32);

    impl fmt::Display for Sym {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "v{}", self.0)
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    pub enum Exp {
        Var(Sym),
        Bool(bool),
        Bits64(u64, u32),
        Not(Box<Exp>),
        Bvnot(Box<Exp>),
        Bvneg(Box<Exp>),
        And(Box<Exp>, Box<Exp>),
        Or(Box<Exp>, Box<Exp>),
        Implies(Box<Exp>, Box<Exp>),
        Eq(Box<Exp>, Box<Exp>),
        Neq(Box<Exp>, Box<Exp>),
        Bvadd(Box<Exp>, Box<Exp>),
        Bvsub(Box<Exp>, Box<Exp>),
        Bvmul(Box<Exp>, Box<Exp>),
        Bvult(Box<Exp>, Box<Exp>),
        Bvule(Box<Exp>, Box<Exp>),
        Bvugt(Box<Exp>, Box<Exp>),
        Bvuge(Box<Exp>, Box<Exp>),
        Bvslt(Box<Exp>, Box<Exp>),
        Bvsle(Box<Exp>, Box<Exp>),
        Bvsgt(Box<Exp>, Box<Exp>),
        Bvsge(Box<Exp>, Box<Exp>),
        ZeroExtend(u32, Box<Exp>),
        SignExtend(u32, Box<Exp>),
        Extract(u32, u32, Box<Exp>),
        Ite(Box<Exp>, Box<Exp>, Box<Exp>),
    }

    pub fn not(exp: Exp) -> Exp {
        Exp::Not(Box::new(exp))
    }

    pub fn and(lhs: Exp, rhs: Exp) -> Exp {
        Exp::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Exp, rhs: Exp) -> Exp {
        Exp::Or(Box::new(lhs), Box::new(rhs))
    }

    pub fn implies(lhs: Exp, rhs: Exp) -> Exp {
        Exp::Implies(Box::new(lhs), Box::new(rhs))
    }

    pub fn eq(lhs: Exp, rhs: Exp) -> Exp {
        Exp::Eq(Box::new(lhs), Box::new(rhs))
    }

    pub fn bvult(lhs: Exp, rhs: Exp) -> Exp {
        Exp::Bvult(Box::new(lhs), Box::new(rhs))
    }

    /// Conjunction of `exps`, `true` when empty.
    pub fn and_all(mut exps: Vec<Exp>) -> Exp {
        match exps.len() {
            0 => Exp::Bool(true),
            1 => exps.remove(0),
            _ => {
                let mut exps = exps.into_iter();
                let first = exps.next().unwrap();
                exps.fold(first, and)
            }
        }
    }

    /// Disjunction of `exps`, `false` when empty.
    pub fn or_all(mut exps: Vec<Exp>) -> Exp {
        match exps.len() {
            0 => Exp::Bool(false),
            1 => exps.remove(0),
            _ => {
                let mut exps = exps.into_iter();
                let first = exps.next().unwrap();
                exps.fold(first, or)
            }
        }
    }

    impl fmt::Display for Exp {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            use Exp::*;
            match self {
                Var(sym) => write!(f, "{}", sym),
                Bool(b) => write!(f, "{}", b),
                Bits64(bits, width) => write!(f, "(_ bv{} {})", bits, width),
                Not(exp) => write!(f, "(not {})", exp),
                Bvnot(exp) => write!(f, "(bvnot {})", exp),
                Bvneg(exp) => write!(f, "(bvneg {})", exp),
                And(lhs, rhs) => write!(f, "(and {} {})", lhs, rhs),
                Or(lhs, rhs) => write!(f, "(or {} {})", lhs, rhs),
                Implies(lhs, rhs) => write!(f, "(=> {} {})", lhs, rhs),
                Eq(lhs, rhs) => write!(f, "(= {} {})", lhs, rhs),
                Neq(lhs, rhs) => write!(f, "(distinct {} {})", lhs, rhs),
                Bvadd(lhs, rhs) => write!(f, "(bvadd {} {})", lhs, rhs),
                Bvsub(lhs, rhs) => write!(f, "(bvsub {} {})", lhs, rhs),
                Bvmul(lhs, rhs) => write!(f, "(bvmul {} {})", lhs, rhs),
                Bvult(lhs, rhs) => write!(f, "(bvult {} {})", lhs, rhs),
                Bvule(lhs, rhs) => write!(f, "(bvule {} {})", lhs, rhs),
                Bvugt(lhs, rhs) => write!(f, "(bvugt {} {})", lhs, rhs),
                Bvuge(lhs, rhs) => write!(f, "(bvuge {} {})", lhs, rhs),
                Bvslt(lhs, rhs) => write!(f, "(bvslt {} {})", lhs, rhs),
                Bvsle(lhs, rhs) => write!(f, "(bvsle {} {})", lhs, rhs),
                Bvsgt(lhs, rhs) => write!(f, "(bvsgt {} {})", lhs, rhs),
                Bvsge(lhs, rhs) => write!(f, "(bvsge {} {})", lhs, rhs),
                ZeroExtend(len, exp) => write!(f, "((_ zero_extend {}) {})", len, exp),
                SignExtend(len, exp) => write!(f, "((_ sign_extend {}) {})", len, exp),
                Extract(hi, lo, exp) => write!(f, "((_ extract {} {}) {})", hi, lo, exp),
                Ite(cond, then_exp, else_exp) => {
                    write!(f, "(ite {} {} {})", cond, then_exp, else_exp)
                }
            }
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    pub enum Def {
        DeclareConst(Sym, Ty),
        DefineConst(Sym, Ty, Exp),
        Assert(Exp),
    }

    impl fmt::Display for Def {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Def::DeclareConst(sym, ty) => write!(f, "(declare-const {} {})", sym, ty),
                Def::DefineConst(sym, ty, exp) => {
                    write!(f, "(define-const {} {} {})", sym, ty, exp)
                }
                Def::Assert(exp) => write!(f, "(assert {})", exp),
            }
        }
    }
}

use smtlib::{Def, Exp};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SmtResult {
    Sat,
    Unsat,
    Unknown,
}

impl fmt::Display for SmtResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtResult::Sat => write!(f, "sat"),
            SmtResult::Unsat => write!(f, "unsat"),
            SmtResult::Unknown => write!(f, "unknown"),
        }
    }
}

/// Everything the encoder needs from a backend.
pub trait Solver {
    fn add(&mut self, def: Def);

    fn check(&mut self) -> SmtResult;

    /// One-shot check of the added definitions conjoined with `assumption`;
    /// the assumption must not persist.
    fn check_assuming(&mut self, assumption: &Exp) -> SmtResult;
}

/// A backend that only records. Serializes the collected definitions as an
/// SMT-LIB2 script for an external solver.
#[derive(Default)]
pub struct Script {
    defs: Vec<Def>,
}

impl Script {
    pub fn new() -> Self {
        Script { defs: Vec::new() }
    }

    pub fn defs(&self) -> &[Def] {
        &self.defs
    }

    pub fn into_defs(self) -> Vec<Def> {
        self.defs
    }

    /// Drop definitions nothing refers to before serializing.
    pub fn simplified(self) -> Script {
        Script { defs: crate::simplify::remove_unused(self.defs) }
    }

    pub fn write_script<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out, "(set-logic QF_BV)")?;
        for def in &self.defs {
            writeln!(out, "{}", def)?;
        }
        writeln!(out, "(check-sat)")
    }

    pub fn to_smtlib(&self) -> String {
        let mut out = String::new();
        self.write_script(&mut out).expect("formatting an SMT script cannot fail");
        out
    }
}

impl Solver for Script {
    fn add(&mut self, def: Def) {
        self.defs.push(def);
    }

    fn check(&mut self) -> SmtResult {
        SmtResult::Unknown
    }

    fn check_assuming(&mut self, _assumption: &Exp) -> SmtResult {
        SmtResult::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::smtlib::*;
    use super::*;

    #[test]
    fn test_display_defs() {
        let decl = Def::DeclareConst(Sym(10), Ty::BitVec(32));
        assert_eq!(decl.to_string(), "(declare-const v10 (_ BitVec 32))");

        let def = Def::DefineConst(Sym(11), Ty::BitVec(8), Exp::Bits64(0xff, 8));
        assert_eq!(def.to_string(), "(define-const v11 (_ BitVec 8) (_ bv255 8))");

        let assert = Def::Assert(implies(Exp::Var(Sym(1)), Exp::Bool(false)));
        assert_eq!(assert.to_string(), "(assert (=> v1 false))");
    }

    #[test]
    fn test_display_exps() {
        let exp = bvult(Exp::Var(Sym(2)), Exp::Bits64(5, 16));
        assert_eq!(exp.to_string(), "(bvult v2 (_ bv5 16))");

        let ite = Exp::Ite(
            Box::new(Exp::Var(Sym(0))),
            Box::new(Exp::Bits64(1, 8)),
            Box::new(Exp::Bits64(0, 8)),
        );
        assert_eq!(ite.to_string(), "(ite v0 (_ bv1 8) (_ bv0 8))");

        let extend = Exp::SignExtend(24, Box::new(Exp::Var(Sym(3))));
        assert_eq!(extend.to_string(), "((_ sign_extend 24) v3)");
    }

    #[test]
    fn test_and_or_all() {
        assert_eq!(and_all(vec![]), Exp::Bool(true));
        assert_eq!(or_all(vec![]), Exp::Bool(false));
        assert_eq!(and_all(vec![Exp::Var(Sym(1))]), Exp::Var(Sym(1)));
        assert_eq!(
            or_all(vec![Exp::Var(Sym(1)), Exp::Var(Sym(2))]),
            or(Exp::Var(Sym(1)), Exp::Var(Sym(2)))
        );
    }

    #[test]
    fn test_script_serialization() {
        let mut script = Script::new();
        script.add(Def::DeclareConst(Sym(0), Ty::Bool));
        script.add(Def::Assert(Exp::Var(Sym(0))));
        assert_eq!(script.check(), SmtResult::Unknown);

        let text = script.to_smtlib();
        assert!(text.starts_with("(set-logic QF_BV)\n"));
        assert!(text.contains("(declare-const v0 Bool)\n"));
        assert!(text.contains("(assert v0)\n"));
        assert!(text.ends_with("(check-sat)\n"));
    }
}
