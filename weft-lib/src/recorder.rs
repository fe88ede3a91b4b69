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

//! Per-thread recording of events under an evolving path condition.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use log::trace;

use crate::event::{Event, EventId, ThreadId};
use crate::instr::{true_instr, Instr, ReadInstr, SharedInstr};
use crate::ty::ScalarType;
use crate::zone::Zone;

/// A stack of guard predicates. Each pushed frame stores the conjunction
/// of the new predicate with the previous top, so `top()` is always the
/// whole path condition in one node.
#[derive(Default)]
pub struct PathCondition {
    frames: Vec<SharedInstr>,
}

impl PathCondition {
    pub fn new() -> Self {
        PathCondition { frames: Vec::new() }
    }

    pub fn push(&mut self, condition: ReadInstr<bool>) {
        let node = match self.frames.last() {
            Some(top) => Instr::conjoin(top.clone(), condition.into_node()),
            None => condition.into_node(),
        };
        self.frames.push(node);
    }

    pub fn pop(&mut self) {
        self.frames.pop().expect("path condition popped below its matching push");
    }

    /// The conjunction of every pushed predicate, or the literal `true`.
    pub fn top(&self) -> ReadInstr<bool> {
        match self.frames.last() {
            Some(top) => ReadInstr::from_node(top.clone()),
            None => ReadInstr::from_node(true_instr()),
        }
    }

    /// The guard recorded on events: `None` outside any guarded region,
    /// so unguarded events stay recognizable without a `true` wrapper.
    pub fn guard(&self) -> Option<SharedInstr> {
        self.frames.last().cloned()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Records events and path constraints on a per-thread basis. The log is
/// append only; appending never reorders earlier entries.
pub struct Recorder {
    thread_id: ThreadId,
    path_condition: PathCondition,
    log: Vec<Arc<Event>>,
    logged: HashSet<EventId>,
}

impl Recorder {
    pub fn new(thread_id: ThreadId) -> Self {
        Recorder {
            thread_id,
            path_condition: PathCondition::new(),
            log: Vec::new(),
            logged: HashSet::new(),
        }
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn path_condition(&self) -> &PathCondition {
        &self.path_condition
    }

    pub fn enter_guard(&mut self, condition: ReadInstr<bool>) {
        self.path_condition.push(condition);
    }

    pub fn leave_guard(&mut self) {
        self.path_condition.pop();
    }

    /// Record a fresh read of `zone` under the current guard.
    pub fn append_read(&mut self, zone: &Zone, ty: ScalarType) -> Arc<Event> {
        let event = Event::read(self.thread_id, zone.clone(), ty, self.path_condition.guard());
        trace!("thread {} {}", self.thread_id, event);
        self.logged.insert(event.event_id());
        self.log.push(event.clone());
        event
    }

    /// Record a write of `instr` to `zone`. The instruction's leaf reads
    /// are harvested first and any not yet logged are appended as one run
    /// directly before the write, preserving their order in the source
    /// expression.
    pub fn append_write(&mut self, zone: &Zone, ty: ScalarType, instr: SharedInstr) -> Arc<Event> {
        let mut reads = VecDeque::new();
        instr.filter(&mut reads);
        // the harvest arrives right-to-left; the log wants source order
        for read in reads.into_iter().rev() {
            if self.logged.insert(read.event_id()) {
                self.log.push(read);
            }
        }
        let event = Event::write(self.thread_id, zone.clone(), ty, instr, self.path_condition.guard());
        trace!("thread {} {}", self.thread_id, event);
        self.logged.insert(event.event_id());
        self.log.push(event.clone());
        event
    }

    /// Record a sync marker (thread begin/end) under the current guard.
    pub fn append_sync(&mut self) -> Arc<Event> {
        let event = Event::sync(self.thread_id, self.path_condition.guard());
        self.logged.insert(event.event_id());
        self.log.push(event.clone());
        event
    }

    /// Record an assertion: a sync event guarded by the current path
    /// condition conjoined with `predicate`.
    pub fn append_assertion(&mut self, predicate: ReadInstr<bool>) -> Arc<Event> {
        let guard = match self.path_condition.guard() {
            Some(top) => Instr::conjoin(top, predicate.into_node()),
            None => predicate.into_node(),
        };
        let event = Event::sync(self.thread_id, Some(guard));
        self.logged.insert(event.event_id());
        self.log.push(event.clone());
        event
    }

    pub fn log(&self) -> &[Arc<Event>] {
        &self.log
    }

    pub fn into_log(self) -> Vec<Arc<Event>> {
        self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::reset_id;
    use crate::expr::NaryOp;

    fn bool_read(recorder: &mut Recorder) -> ReadInstr<bool> {
        let zone = Zone::unique_atom();
        ReadInstr::basic(recorder.append_read(&zone, ScalarType::Bool))
    }

    #[test]
    fn test_empty_path_condition_is_true() {
        let path = PathCondition::new();
        match &**path.top().node() {
            Instr::Literal { expr, guard } => {
                assert_eq!(expr.to_string(), "true");
                assert!(guard.is_none());
            }
            other => panic!("unexpected top: {:?}", other),
        }
        assert!(path.guard().is_none());
    }

    #[test]
    fn test_push_conjoins_with_previous_top() {
        let mut recorder = Recorder::new(0);
        let p = bool_read(&mut recorder);
        let q = bool_read(&mut recorder);

        let mut path = PathCondition::new();
        path.push(p.clone());
        assert!(Arc::ptr_eq(path.top().node(), p.node()));

        path.push(q.clone());
        match &**path.top().node() {
            Instr::Binary { op: NaryOp::Land, lhs, rhs, .. } => {
                assert!(Arc::ptr_eq(lhs, p.node()));
                assert!(Arc::ptr_eq(rhs, q.node()));
            }
            other => panic!("unexpected top: {:?}", other),
        }

        path.pop();
        assert!(Arc::ptr_eq(path.top().node(), p.node()));
        path.pop();
        assert!(path.guard().is_none());
    }

    #[test]
    #[should_panic(expected = "below its matching push")]
    fn test_unbalanced_pop_panics() {
        PathCondition::new().pop();
    }

    #[test]
    fn test_append_read_under_guard() {
        let mut recorder = Recorder::new(2);
        let cond = bool_read(&mut recorder);
        recorder.enter_guard(cond.clone());
        let zone = Zone::unique_atom();
        let read = recorder.append_read(&zone, ScalarType::I32);
        assert!(Arc::ptr_eq(read.guard().unwrap(), cond.node()));
        recorder.leave_guard();
        let read = recorder.append_read(&zone, ScalarType::I32);
        assert!(read.guard().is_none());
    }

    #[test]
    fn test_write_operand_reads_precede_the_write() {
        reset_id(0);
        let mut recorder = Recorder::new(1);
        let zone_a = Zone::unique_atom();
        let zone_b = Zone::unique_atom();
        let zone_x = Zone::unique_atom();

        let a = ReadInstr::<i32>::basic(recorder.append_read(&zone_a, ScalarType::I32));
        let b = ReadInstr::<i32>::basic(recorder.append_read(&zone_b, ScalarType::I32));
        let write = recorder.append_write(&zone_x, ScalarType::I32, (a + b).into_node());

        let positions: Vec<_> = recorder.log().iter().map(|e| e.event_id()).collect();
        let write_at = positions.iter().position(|&id| id == write.event_id()).unwrap();
        for event in recorder.log()[..write_at].iter() {
            assert!(event.is_read());
        }
        // already-logged operand reads are not duplicated by the harvest
        assert_eq!(recorder.log().len(), 3);
        reset_id(0);
    }

    #[test]
    fn test_harvested_reads_inserted_before_write() {
        reset_id(0);
        let mut recorder = Recorder::new(1);
        let zone = Zone::unique_atom();

        // reads constructed outside the recorder enter the log through the
        // write that depends on them
        let a = Instr::basic(Event::read(1, Zone::unique_atom(), ScalarType::I32, None));
        let b = Instr::basic(Event::read(1, Zone::unique_atom(), ScalarType::I32, None));
        let sum = Instr::binary(NaryOp::Add, a, b);
        let write = recorder.append_write(&zone, ScalarType::I32, sum);

        let ids: Vec<_> = recorder.log().iter().map(|e| e.event_id()).collect();
        assert_eq!(ids, vec![0, 2, write.event_id()]);
        assert_eq!(write.event_id(), 2 * 2 + 1);
        reset_id(0);
    }

    #[test]
    fn test_assertion_guard_is_conjunction() {
        let mut recorder = Recorder::new(0);
        let p = bool_read(&mut recorder);
        let q = bool_read(&mut recorder);
        recorder.enter_guard(p.clone());
        let assertion = recorder.append_assertion(q.clone());
        match assertion.guard().map(|g| &**g) {
            Some(Instr::Binary { op: NaryOp::Land, lhs, rhs, .. }) => {
                assert!(Arc::ptr_eq(lhs, p.node()));
                assert!(Arc::ptr_eq(rhs, q.node()));
            }
            other => panic!("unexpected guard: {:?}", other),
        }
        recorder.leave_guard();
    }
}
