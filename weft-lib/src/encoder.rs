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

//! Lowering of a recording to an SMT instance. Every event gets a value
//! constant named after its id (parity gives the direction) plus a clock
//! constant; program order and spawn/join edges constrain clocks; each read
//! chooses a write to load from among the may-aliasing writes of the same
//! sort, with no aliasing write allowed between the two. The final query is
//! the disjunction of the recorded assertion guards, so `sat` means a
//! violation is reachable and `unsat` means none is.
//!
//! Thread logs are encoded incrementally as threads end; only the load-from
//! choice and the query wait for [`Encoder::finalize`], because they need
//! the global write population.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, info};

use crate::error::Error;
use crate::event::{Direction, Event, EventId};
use crate::expr::{NaryOp, OpAttr, SharedExpr, UnaryOp, Visitor};
use crate::instr::{Instr, SharedInstr};
use crate::smt::smtlib::{self, Def, Exp, Sym, Ty};
use crate::smt::{SmtResult, Solver};
use crate::ty::{ScalarType, ScalarVal};

/// Happens-before axiomatization seam. `C0` is sequential consistency;
/// alternatives weaken which same-thread adjacent pairs stay ordered.
pub trait MemoryModel {
    fn preserved_program_order(&self, before: &Event, after: &Event) -> bool;
}

/// The baseline sequentially consistent model.
pub struct C0;

impl MemoryModel for C0 {
    fn preserved_program_order(&self, _before: &Event, _after: &Event) -> bool {
        true
    }
}

/// Clock constants order events; 32 bits is far beyond any recording.
const CLOCK_WIDTH: u32 = 32;

/// Value constants reuse the event id as their symbol, so clock and
/// interned symbols draw from a disjoint high range.
const FRESH_BASE: u32 = 1 << 24;

pub struct Encoder<S: Solver, M: MemoryModel = C0> {
    solver: S,
    model: M,
    fresh: u32,
    value_syms: HashMap<EventId, Sym>,
    clock_syms: HashMap<EventId, Sym>,
    any_syms: HashMap<String, Sym>,
    defines: Vec<Def>,
    asserts: Vec<Def>,
    encoded: HashSet<EventId>,
    reads: Vec<Arc<Event>>,
    writes: Vec<Arc<Event>>,
    errors: Vec<Arc<Event>>,
    finalized: bool,
}

impl<S: Solver> Encoder<S, C0> {
    pub fn new(solver: S) -> Self {
        Encoder::with_model(solver, C0)
    }
}

impl<S: Solver, M: MemoryModel> Encoder<S, M> {
    pub fn with_model(solver: S, model: M) -> Self {
        Encoder {
            solver,
            model,
            fresh: 0,
            value_syms: HashMap::new(),
            clock_syms: HashMap::new(),
            any_syms: HashMap::new(),
            defines: Vec::new(),
            asserts: Vec::new(),
            encoded: HashSet::new(),
            reads: Vec::new(),
            writes: Vec::new(),
            errors: Vec::new(),
            finalized: false,
        }
    }

    pub fn solver(&mut self) -> &mut S {
        &mut self.solver
    }

    pub fn into_solver(self) -> S {
        self.solver
    }

    fn fresh(&mut self) -> Sym {
        let sym = Sym(FRESH_BASE + self.fresh);
        self.fresh += 1;
        sym
    }

    fn sort(ty: ScalarType) -> Ty {
        match ty.bit_width() {
            None => Ty::Bool,
            Some(width) => Ty::BitVec(width),
        }
    }

    /// The value constant of an event, declared on first use.
    fn value_sym(&mut self, event: &Event) -> Sym {
        if let Some(sym) = self.value_syms.get(&event.event_id()) {
            return *sym;
        }
        debug_assert!(event.event_id() < FRESH_BASE as u64);
        let sym = Sym(event.event_id() as u32);
        self.solver.add(Def::DeclareConst(sym, Self::sort(event.ty())));
        self.value_syms.insert(event.event_id(), sym);
        sym
    }

    /// Like `value_sym` but defined rather than declared; used for writes
    /// whose value holds unconditionally.
    fn define_value_sym(&mut self, event: &Event, exp: Exp) -> Sym {
        debug_assert!(!self.value_syms.contains_key(&event.event_id()));
        let sym = Sym(event.event_id() as u32);
        self.defines.push(Def::DefineConst(sym, Self::sort(event.ty()), exp));
        self.value_syms.insert(event.event_id(), sym);
        sym
    }

    fn clock_sym(&mut self, event: &Event) -> Sym {
        if let Some(sym) = self.clock_syms.get(&event.event_id()) {
            return *sym;
        }
        let sym = self.fresh();
        self.solver.add(Def::DeclareConst(sym, Ty::BitVec(CLOCK_WIDTH)));
        self.clock_syms.insert(event.event_id(), sym);
        sym
    }

    fn any_sym(&mut self, name: &str, ty: ScalarType) -> Sym {
        if let Some(sym) = self.any_syms.get(name) {
            return *sym;
        }
        let sym = self.fresh();
        self.solver.add(Def::DeclareConst(sym, Self::sort(ty)));
        self.any_syms.insert(name.to_string(), sym);
        sym
    }

    /// Encode one thread's log: constants, write-value constraints, and
    /// program order between adjacent events the memory model preserves.
    /// Encoding the same event twice is a no-op.
    pub fn encode_events(&mut self, log: &[Arc<Event>]) -> Result<(), Error> {
        for event in log {
            // a read may already have a value constant from an on-demand
            // reference (a feasibility check, a cross-thread guard); it
            // still needs its clock and load-from bookkeeping here
            if !self.encoded.insert(event.event_id()) {
                continue;
            }
            match event.direction() {
                Direction::Read => {
                    self.value_sym(event);
                    self.clock_sym(event);
                    self.reads.push(event.clone());
                }
                Direction::Write => {
                    let instr = event.instr().expect("write events always carry an instruction");
                    let exp = self.encode_instr(instr)?;
                    match event.guard().cloned() {
                        None => {
                            self.define_value_sym(event, exp);
                        }
                        Some(guard) => {
                            let guard_exp = self.encode_instr(&guard)?;
                            let sym = self.value_sym(event);
                            self.asserts.push(Def::Assert(smtlib::implies(
                                guard_exp,
                                smtlib::eq(Exp::Var(sym), exp),
                            )));
                        }
                    }
                    self.clock_sym(event);
                    self.writes.push(event.clone());
                }
                Direction::Sync => {
                    self.clock_sym(event);
                }
            }
        }

        for pair in log.windows(2) {
            if self.model.preserved_program_order(&pair[0], &pair[1]) {
                self.order(&pair[0], &pair[1]);
            }
        }

        debug!("encoded {} events", log.len());
        Ok(())
    }

    /// An explicit happens-before edge, used for thread spawn and join.
    pub fn order(&mut self, before: &Event, after: &Event) {
        let before_clock = self.clock_sym(before);
        let after_clock = self.clock_sym(after);
        self.asserts.push(Def::Assert(smtlib::bvult(
            Exp::Var(before_clock),
            Exp::Var(after_clock),
        )));
    }

    pub fn register_error(&mut self, event: Arc<Event>) {
        self.errors.push(event);
    }

    fn encode_guard(&mut self, guard: Option<&SharedInstr>) -> Result<Exp, Error> {
        match guard {
            None => Ok(Exp::Bool(true)),
            Some(guard) => self.encode_instr(guard),
        }
    }

    fn encode_instr(&mut self, node: &SharedInstr) -> Result<Exp, Error> {
        match &**node {
            Instr::Literal { expr, .. } => self.encode_expr(expr),
            Instr::Basic { event } => Ok(Exp::Var(self.value_sym(event))),
            Instr::Unary { op, operand, .. } => {
                let exp = self.encode_instr(operand)?;
                un_exp(*op, operand.ty(), exp)
            }
            Instr::Binary { op, lhs, rhs, .. } => {
                let operand_ty = lhs.ty();
                let lhs_exp = self.encode_instr(lhs)?;
                let rhs_exp = self.encode_instr(rhs)?;
                bin_exp(*op, operand_ty, lhs_exp, rhs_exp)
            }
        }
    }

    fn encode_expr(&mut self, expr: &SharedExpr) -> Result<Exp, Error> {
        expr.walk(&mut ExprLower { encoder: self })
    }

    /// Whether a boolean instruction can hold together with its own guard.
    /// `Unknown` counts as feasible; only a definite `unsat` rules it out.
    pub fn feasible(&mut self, cond: &SharedInstr) -> Result<SmtResult, Error> {
        let guard_exp = self.encode_guard(cond.guard())?;
        let cond_exp = self.encode_instr(cond)?;
        Ok(self.solver.check_assuming(&smtlib::and(guard_exp, cond_exp)))
    }

    /// Emit the load-from choice for every read, the error query, and the
    /// buffered definitions. Idempotent.
    pub fn finalize(&mut self) -> Result<(), Error> {
        if self.finalized {
            return Ok(());
        }

        let reads = self.reads.clone();
        let writes = self.writes.clone();
        for read in &reads {
            let candidates: Vec<Arc<Event>> = writes
                .iter()
                .filter(|w| {
                    w.zone().may_alias(read.zone()) && Self::sort(w.ty()) == Self::sort(read.ty())
                })
                .cloned()
                .collect();

            let read_value = Exp::Var(self.value_sym(read));
            let read_clock = Exp::Var(self.clock_sym(read));
            let mut choice = Vec::new();
            for write in &candidates {
                let write_value = Exp::Var(self.value_sym(write));
                let write_clock = Exp::Var(self.clock_sym(write));
                let mut clauses = vec![
                    smtlib::eq(read_value.clone(), write_value),
                    self.encode_guard(write.guard())?,
                    smtlib::bvult(write_clock.clone(), read_clock.clone()),
                ];
                for other in &candidates {
                    if other.event_id() == write.event_id() {
                        continue;
                    }
                    let other_guard = self.encode_guard(other.guard())?;
                    let other_clock = Exp::Var(self.clock_sym(other));
                    // no aliasing write between the chosen write and the
                    // read, unless its guard is off
                    clauses.push(smtlib::implies(
                        other_guard,
                        smtlib::or(
                            smtlib::bvult(other_clock.clone(), write_clock.clone()),
                            smtlib::bvult(read_clock.clone(), other_clock),
                        ),
                    ));
                }
                choice.push(smtlib::and_all(clauses));
            }

            let load_from = smtlib::or_all(choice);
            let read_guard = self.encode_guard(read.guard())?;
            let constraint = match read_guard {
                Exp::Bool(true) => load_from,
                guard => smtlib::implies(guard, load_from),
            };
            self.asserts.push(Def::Assert(constraint));
        }

        let mut query = Vec::new();
        for error in self.errors.clone() {
            query.push(self.encode_guard(error.guard())?);
        }
        self.asserts.push(Def::Assert(smtlib::or_all(query)));

        for def in self.defines.drain(..) {
            self.solver.add(def);
        }
        for assert in self.asserts.drain(..) {
            self.solver.add(assert);
        }

        info!(
            "encoded {} reads, {} writes, {} error conditions",
            reads.len(),
            writes.len(),
            self.errors.len()
        );
        self.finalized = true;
        Ok(())
    }

    /// Finalize if needed and ask the backend for a verdict.
    pub fn check(&mut self) -> Result<SmtResult, Error> {
        self.finalize()?;
        Ok(self.solver.check())
    }
}

/// The expression-to-term visitor family: same traversal as the printing
/// walk, with the SMT term as its output type.
struct ExprLower<'a, S: Solver, M: MemoryModel> {
    encoder: &'a mut Encoder<S, M>,
}

impl<'a, S: Solver, M: MemoryModel> Visitor for ExprLower<'a, S, M> {
    type Output = Result<Exp, Error>;

    fn visit_any(&mut self, ty: ScalarType, name: &str) -> Self::Output {
        Ok(Exp::Var(self.encoder.any_sym(name, ty)))
    }

    fn visit_value(&mut self, value: ScalarVal) -> Self::Output {
        Ok(literal_exp(value))
    }

    fn visit_cast(&mut self, ty: ScalarType, expr: &SharedExpr) -> Self::Output {
        let from = expr.ty();
        let exp = expr.walk(self)?;
        Ok(cast_exp(from, ty, exp))
    }

    fn visit_unary(&mut self, op: UnaryOp, expr: &SharedExpr) -> Self::Output {
        let operand_ty = expr.ty();
        let exp = expr.walk(self)?;
        un_exp(op, operand_ty, exp)
    }

    fn visit_ternary(
        &mut self,
        cond: &SharedExpr,
        then_expr: &SharedExpr,
        else_expr: &SharedExpr,
    ) -> Self::Output {
        let cond = cond.walk(self)?;
        let then_exp = then_expr.walk(self)?;
        let else_exp = else_expr.walk(self)?;
        Ok(Exp::Ite(Box::new(cond), Box::new(then_exp), Box::new(else_exp)))
    }

    fn visit_nary(&mut self, op: NaryOp, _attr: OpAttr, exprs: &[SharedExpr]) -> Self::Output {
        if op.is_predicate() && op != NaryOp::Land && op != NaryOp::Lor && exprs.len() != 2 {
            return Err(Error::Encode(format!(
                "{:?} takes exactly two operands, got {}",
                op,
                exprs.len()
            )));
        }
        let operand_ty = exprs[0].ty();
        let mut acc = exprs[0].walk(self)?;
        for expr in &exprs[1..] {
            let rhs = expr.walk(self)?;
            acc = bin_exp(op, operand_ty, acc, rhs)?;
        }
        Ok(acc)
    }
}

fn literal_exp(value: ScalarVal) -> Exp {
    match value {
        ScalarVal::Bool(b) => Exp::Bool(b),
        _ => {
            let width = value.ty().bit_width().expect("non-bool scalars have a width");
            Exp::Bits64(value.as_bits(), width)
        }
    }
}

fn cast_exp(from: ScalarType, to: ScalarType, exp: Exp) -> Exp {
    match (from.bit_width(), to.bit_width()) {
        (None, None) => exp,
        (None, Some(width)) => Exp::Ite(
            Box::new(exp),
            Box::new(Exp::Bits64(1, width)),
            Box::new(Exp::Bits64(0, width)),
        ),
        (Some(width), None) => Exp::Neq(Box::new(exp), Box::new(Exp::Bits64(0, width))),
        (Some(fw), Some(tw)) if fw == tw => exp,
        (Some(fw), Some(tw)) if fw < tw => {
            if from.is_signed() {
                Exp::SignExtend(tw - fw, Box::new(exp))
            } else {
                Exp::ZeroExtend(tw - fw, Box::new(exp))
            }
        }
        (Some(_), Some(tw)) => Exp::Extract(tw - 1, 0, Box::new(exp)),
    }
}

fn un_exp(op: UnaryOp, operand_ty: ScalarType, exp: Exp) -> Result<Exp, Error> {
    let is_bool = operand_ty == ScalarType::Bool;
    match op {
        UnaryOp::Lnot if is_bool => Ok(smtlib::not(exp)),
        UnaryOp::Lnot => Err(Error::Encode("logical negation of a bitvector".to_string())),
        UnaryOp::Not if is_bool => Ok(smtlib::not(exp)),
        UnaryOp::Not => Ok(Exp::Bvnot(Box::new(exp))),
        UnaryOp::Neg if is_bool => Err(Error::Encode("arithmetic negation of a bool".to_string())),
        UnaryOp::Neg => Ok(Exp::Bvneg(Box::new(exp))),
    }
}

fn bin_exp(op: NaryOp, operand_ty: ScalarType, lhs: Exp, rhs: Exp) -> Result<Exp, Error> {
    let is_bool = operand_ty == ScalarType::Bool;
    let signed = operand_ty.is_signed();
    let lhs = Box::new(lhs);
    let rhs = Box::new(rhs);
    match op {
        NaryOp::Add | NaryOp::Sub | NaryOp::Mul if is_bool => {
            Err(Error::Encode(format!("{:?} over booleans", op)))
        }
        NaryOp::Add => Ok(Exp::Bvadd(lhs, rhs)),
        NaryOp::Sub => Ok(Exp::Bvsub(lhs, rhs)),
        NaryOp::Mul => Ok(Exp::Bvmul(lhs, rhs)),
        NaryOp::Land | NaryOp::Lor if !is_bool => {
            Err(Error::Encode(format!("{:?} over bitvectors", op)))
        }
        NaryOp::Land => Ok(Exp::And(lhs, rhs)),
        NaryOp::Lor => Ok(Exp::Or(lhs, rhs)),
        NaryOp::Eql => Ok(Exp::Eq(lhs, rhs)),
        NaryOp::Neq => Ok(Exp::Neq(lhs, rhs)),
        NaryOp::Lss | NaryOp::Gtr | NaryOp::Leq | NaryOp::Geq if is_bool => {
            Err(Error::Encode("ordering booleans".to_string()))
        }
        NaryOp::Lss if signed => Ok(Exp::Bvslt(lhs, rhs)),
        NaryOp::Lss => Ok(Exp::Bvult(lhs, rhs)),
        NaryOp::Leq if signed => Ok(Exp::Bvsle(lhs, rhs)),
        NaryOp::Leq => Ok(Exp::Bvule(lhs, rhs)),
        NaryOp::Gtr if signed => Ok(Exp::Bvsgt(lhs, rhs)),
        NaryOp::Gtr => Ok(Exp::Bvugt(lhs, rhs)),
        NaryOp::Geq if signed => Ok(Exp::Bvsge(lhs, rhs)),
        NaryOp::Geq => Ok(Exp::Bvuge(lhs, rhs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::reset_id;
    use crate::expr::Expr;
    use crate::instr::ReadInstr;
    use crate::smt::Script;
    use crate::zone::Zone;

    #[test]
    fn test_any_symbols_are_interned_by_name() {
        let mut encoder = Encoder::new(Script::new());
        let a1 = encoder
            .encode_expr(&Expr::any(ScalarType::I32, "A"))
            .unwrap();
        let a2 = encoder
            .encode_expr(&Expr::any(ScalarType::I32, "A"))
            .unwrap();
        let b = encoder.encode_expr(&Expr::any(ScalarType::I32, "B")).unwrap();
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(encoder.solver().defs().len(), 2);
    }

    #[test]
    fn test_literals_and_casts() {
        assert_eq!(literal_exp(ScalarVal::I8(-1)), Exp::Bits64(0xff, 8));
        assert_eq!(literal_exp(ScalarVal::Bool(true)), Exp::Bool(true));

        let widen = cast_exp(ScalarType::I8, ScalarType::I32, Exp::Var(Sym(0)));
        assert_eq!(widen, Exp::SignExtend(24, Box::new(Exp::Var(Sym(0)))));
        let narrow = cast_exp(ScalarType::U32, ScalarType::U8, Exp::Var(Sym(0)));
        assert_eq!(narrow, Exp::Extract(7, 0, Box::new(Exp::Var(Sym(0)))));
    }

    #[test]
    fn test_signedness_picks_the_comparison() {
        let lhs = Exp::Var(Sym(0));
        let rhs = Exp::Var(Sym(1));
        assert_eq!(
            bin_exp(NaryOp::Lss, ScalarType::I32, lhs.clone(), rhs.clone()).unwrap(),
            Exp::Bvslt(Box::new(lhs.clone()), Box::new(rhs.clone()))
        );
        assert_eq!(
            bin_exp(NaryOp::Lss, ScalarType::U32, lhs.clone(), rhs.clone()).unwrap(),
            Exp::Bvult(Box::new(lhs), Box::new(rhs))
        );
    }

    #[test]
    fn test_value_constant_names_follow_event_parity() {
        reset_id(0);
        let mut encoder = Encoder::new(Script::new());
        let zone = Zone::unique_atom();
        let read = Event::read(0, zone.clone(), ScalarType::I32, None);
        let write = Event::write(
            0,
            zone,
            ScalarType::I32,
            ReadInstr::<i32>::literal(7).into_node(),
            None,
        );
        encoder.encode_events(&[read.clone(), write.clone()]).unwrap();
        encoder.finalize().unwrap();

        let text = encoder.into_solver().to_smtlib();
        // the read takes the even id, the write the odd one
        assert!(text.contains("(declare-const v0 (_ BitVec 32))"));
        assert!(text.contains("(define-const v3 (_ BitVec 32) (_ bv7 32))"));
        reset_id(0);
    }

    #[test]
    fn test_guarded_write_becomes_implication() {
        reset_id(0);
        let mut encoder = Encoder::new(Script::new());
        let guard_read = Event::read(0, Zone::unique_atom(), ScalarType::Bool, None);
        let guard = Instr::basic(guard_read.clone());
        let write = Event::write(
            0,
            Zone::unique_atom(),
            ScalarType::I32,
            ReadInstr::<i32>::literal(1).into_node(),
            Some(guard),
        );
        encoder.encode_events(&[guard_read, write]).unwrap();
        encoder.finalize().unwrap();

        let text = encoder.into_solver().to_smtlib();
        assert!(text.contains("(assert (=> v0 (= v3 (_ bv1 32))))"));
        reset_id(0);
    }

    #[test]
    fn test_no_error_query_is_false() {
        let mut encoder = Encoder::new(Script::new());
        encoder.finalize().unwrap();
        let defs = encoder.solver().defs().to_vec();
        assert_eq!(defs, vec![Def::Assert(Exp::Bool(false))]);
    }
}
