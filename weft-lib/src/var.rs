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

//! Concrete or symbolic shared variables. Using one in an expression
//! records a fresh read event at its address; assigning one hands the
//! right-hand side's instruction graph to the current recorder and keeps
//! the returned write event as the variable's defining write. The defining
//! write sits in a cell so both arms of a recorded branch can assign the
//! same variable; recording is single-threaded, so the cell is never
//! contended. A variable's lifetime must span every thread body that
//! touches it, and construction is itself a recorded write, so variables
//! can only be created between `begin_main_thread` and `end_main_thread`.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::event::Event;
use crate::expr::Expr;
use crate::instr::{Instr, ReadInstr, SharedInstr};
use crate::threads::Threads;
use crate::ty::{Scalar, ScalarVal};
use crate::zone::Zone;

pub struct Var<T: Scalar> {
    zone: Zone,
    event: RefCell<Arc<Event>>,
    _marker: PhantomData<T>,
}

impl<T: Scalar> Var<T> {
    /// Zero-initialized at a fresh address.
    pub fn new() -> Self {
        Var::init(Zone::unique_atom(), Instr::literal_val(ScalarVal::zero(T::TYPE), None))
    }

    pub fn with_value(value: T) -> Self {
        Var::init(Zone::unique_atom(), Instr::literal_val(value.to_val(), None))
    }

    /// Initialized with a fresh symbolic value under `name`.
    pub fn symbolic(name: impl Into<String>) -> Self {
        Var::init(Zone::unique_atom(), Instr::literal_expr(Expr::any(T::TYPE, name), None))
    }

    /// Zero-initialized at an explicit address, for aliased storage.
    pub fn aliased(zone: Zone) -> Self {
        Var::init(zone, Instr::literal_val(ScalarVal::zero(T::TYPE), None))
    }

    fn init(zone: Zone, instr: SharedInstr) -> Self {
        let event = Threads::record_write(&zone, T::TYPE, instr);
        Var { zone, event: RefCell::new(event), _marker: PhantomData }
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    /// The most recent write event recorded for this variable.
    pub fn write_event(&self) -> Arc<Event> {
        self.event.borrow().clone()
    }

    /// Record a fresh read of this variable under the current path
    /// condition.
    pub fn read(&self) -> ReadInstr<T> {
        ReadInstr::basic(Threads::record_read(&self.zone, T::TYPE))
    }

    pub fn assign(&self, value: impl Into<ReadInstr<T>>) {
        let instr = value.into().into_node();
        let event = Threads::record_write(&self.zone, T::TYPE, instr);
        self.event.replace(event);
    }
}

impl<T: Scalar> Default for Var<T> {
    fn default() -> Self {
        Var::new()
    }
}

impl<'a, T: Scalar> From<&'a Var<T>> for ReadInstr<T> {
    fn from(var: &'a Var<T>) -> Self {
        var.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::ScalarType;

    fn begin_recording() {
        Threads::reset();
        Threads::begin_main_thread();
    }

    fn init_literal(var_event: &Arc<Event>) -> String {
        match var_event.instr().map(|i| &**i) {
            Some(Instr::Literal { expr, guard }) => {
                assert!(guard.is_none());
                expr.to_string()
            }
            other => panic!("unexpected init instruction: {:?}", other),
        }
    }

    #[test]
    fn test_new_is_zero_initialized() {
        begin_recording();
        let x = Var::<i32>::new();
        let write = x.write_event();
        assert!(write.is_write());
        assert_eq!(write.thread_id(), 0);
        assert_eq!(write.ty(), ScalarType::I32);
        assert_eq!(init_literal(&write), "0");

        let d = Var::<u8>::default();
        assert_eq!(init_literal(&d.write_event()), "0");
    }

    #[test]
    fn test_with_value_records_the_literal() {
        begin_recording();
        let x = Var::<i64>::with_value(42);
        let write = x.write_event();
        assert_eq!(write.ty(), ScalarType::I64);
        assert_eq!(init_literal(&write), "42");
        assert_eq!(x.zone().len(), 1);
    }

    #[test]
    fn test_symbolic_init() {
        begin_recording();
        let x = Var::<i32>::symbolic("X");
        match x.write_event().instr().map(|i| &**i) {
            Some(Instr::Literal { expr, guard }) => {
                assert!(guard.is_none());
                assert!(expr.is_symbolic());
                assert_eq!(expr.to_string(), "[X]");
            }
            other => panic!("unexpected init instruction: {:?}", other),
        }
    }

    #[test]
    fn test_aliased_shares_the_given_zone() {
        begin_recording();
        let zone = Zone::unique_atom();
        let x = Var::<i32>::aliased(zone.clone());
        assert_eq!(x.zone(), &zone);
        assert!(x.write_event().zone().may_alias(&zone));
        assert_eq!(init_literal(&x.write_event()), "0");
    }

    #[test]
    fn test_assign_replaces_the_defining_write() {
        begin_recording();
        let x = Var::<i32>::with_value(1);
        let first = x.write_event();

        x.assign(x.read() + 1);
        let second = x.write_event();

        assert_ne!(first.event_id(), second.event_id());
        assert!(second.event_id() > first.event_id());
        assert!(second.is_write());
        assert!(second.zone().may_alias(x.zone()));

        x.assign(7);
        let third = x.write_event();
        assert!(third.event_id() > second.event_id());
        assert_eq!(init_literal(&third), "7");
    }
}
