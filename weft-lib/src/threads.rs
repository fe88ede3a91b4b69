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

//! The recording driver. `begin_thread`/`end_thread` pairs delimit lexical
//! thread bodies; they never spawn OS threads, interleavings are explored
//! by the encoder. Exactly one recorder is current at any moment, kept in
//! a cell local to the recording thread, and the begin/end brackets nest
//! strictly; breaking the bracket discipline is a bug and panics.

use std::cell::RefCell;
use std::sync::Arc;

use log::{debug, info};

use crate::block::{BlockKind, BlockTree};
use crate::encoder::{Encoder, MemoryModel};
use crate::error::Error;
use crate::event::{self, Event, ThreadId};
use crate::instr::{ReadInstr, SharedInstr};
use crate::recorder::Recorder;
use crate::smt::{SmtResult, Solver};
use crate::ty::{Scalar, ScalarType};
use crate::var::Var;
use crate::zone::Zone;

struct Recording {
    block_tree: BlockTree,
    recorders: Vec<Recorder>,
    finished: Vec<(ThreadId, Vec<Arc<Event>>)>,
    spawned: Vec<(ThreadId, Arc<Event>)>,
    next_thread_id: ThreadId,
}

thread_local! {
    static RECORDING: RefCell<Option<Recording>> = RefCell::new(None);
}

/// Facade over the recording state of the current thread of execution.
pub struct Threads;

impl Threads {
    /// Discard all recording state and restart event ids from zero.
    pub fn reset() {
        event::reset_id(0);
        RECORDING.with(|slot| *slot.borrow_mut() = None);
    }

    /// Install a recorder for thread id 0 and open the root block.
    pub fn begin_main_thread() {
        RECORDING.with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.is_some() {
                panic!("begin_main_thread while a recording is already active");
            }
            *slot = Some(Recording {
                block_tree: BlockTree::make_root(),
                recorders: vec![Recorder::new(0)],
                finished: Vec::new(),
                spawned: Vec::new(),
                next_thread_id: 1,
            });
        });
        debug!("main thread recording started");
    }

    fn with<R>(f: impl FnOnce(&mut Recording) -> R) -> R {
        RECORDING.with(|slot| {
            let mut slot = slot.borrow_mut();
            let recording = slot
                .as_mut()
                .expect("no active recording (begin_main_thread not called)");
            f(recording)
        })
    }

    pub fn is_recording() -> bool {
        RECORDING.with(|slot| slot.borrow().is_some())
    }

    /// Allocate the next thread id and make a fresh recorder current. A
    /// thread-begin sync event marks the spawn point in the parent log.
    pub fn begin_thread() -> ThreadId {
        let thread_id = Self::with(|recording| {
            let thread_id = recording.next_thread_id;
            recording.next_thread_id += 1;
            let begin = recording
                .recorders
                .last_mut()
                .expect("a recording always has a current recorder")
                .append_sync();
            recording.block_tree.append(begin.clone());
            recording.spawned.push((thread_id, begin));
            recording.block_tree.open_thread(thread_id);
            recording.recorders.push(Recorder::new(thread_id));
            thread_id
        });
        info!("thread {} recording started", thread_id);
        thread_id
    }

    /// Close the current thread: archive its log, return to the parent
    /// recorder, and encode the thread's events and spawn/join edges.
    pub fn end_thread<S: Solver, M: MemoryModel>(
        encoder: &mut Encoder<S, M>,
    ) -> Result<(), Error> {
        let (thread_id, log, begin, join) = Self::with(|recording| {
            if recording.recorders.len() < 2 {
                panic!("end_thread without a matching begin_thread");
            }
            let recorder = recording.recorders.pop().unwrap();
            if recorder.path_condition().depth() != 0 {
                panic!(
                    "thread {} ended with unbalanced guard scopes",
                    recorder.thread_id()
                );
            }
            let thread_id = recorder.thread_id();
            if recording.block_tree.block(recording.block_tree.current()).kind()
                != BlockKind::Thread(thread_id)
            {
                panic!("thread {} ended with unclosed branch blocks", thread_id);
            }
            recording.block_tree.close();
            let join = recording
                .recorders
                .last_mut()
                .unwrap()
                .append_sync();
            recording.block_tree.append(join.clone());
            let begin = recording
                .spawned
                .iter()
                .find(|(id, _)| *id == thread_id)
                .map(|(_, event)| event.clone())
                .expect("every thread has a recorded spawn point");
            let log = recorder.into_log();
            recording.finished.push((thread_id, log.clone()));
            (thread_id, log, begin, join)
        });

        encoder.encode_events(&log)?;
        if let Some(first) = log.first() {
            encoder.order(&begin, first);
        }
        if let Some(last) = log.last() {
            encoder.order(last, &join);
        }
        info!("thread {} recording ended ({} events)", thread_id, log.len());
        Ok(())
    }

    /// Record an assertion: a violation is reachable iff the final SMT
    /// instance is satisfiable with some assertion guard true.
    pub fn error<S: Solver, M: MemoryModel>(
        predicate: ReadInstr<bool>,
        encoder: &mut Encoder<S, M>,
    ) {
        let event = Self::with(|recording| {
            let event = recording
                .recorders
                .last_mut()
                .expect("a recording always has a current recorder")
                .append_assertion(predicate);
            recording.block_tree.append(event.clone());
            event
        });
        encoder.register_error(event);
    }

    /// Close the main thread and encode everything still pending.
    pub fn end_main_thread<S: Solver, M: MemoryModel>(
        encoder: &mut Encoder<S, M>,
    ) -> Result<(), Error> {
        let log = Self::with(|recording| {
            if recording.recorders.is_empty() {
                panic!("end_main_thread on an already ended recording");
            }
            if recording.recorders.len() > 1 {
                panic!("end_main_thread while child threads are still recording");
            }
            if recording.block_tree.open_depth() != 1 {
                panic!("main thread ended with unclosed branch blocks");
            }
            let recorder = recording.recorders.pop().unwrap();
            if recorder.path_condition().depth() != 0 {
                panic!("main thread ended with unbalanced guard scopes");
            }
            let log = recorder.into_log();
            recording.finished.push((0, log.clone()));
            log
        });

        encoder.encode_events(&log)?;
        encoder.finalize()?;
        info!("main thread recording ended ({} events)", log.len());
        Ok(())
    }

    /// Record `then_body` under `condition`.
    pub fn branch(condition: ReadInstr<bool>, then_body: impl FnOnce()) {
        Self::enter_then(&condition);
        then_body();
        Self::leave_branch();
    }

    /// Record `then_body` under `condition` and `else_body` under its
    /// negation.
    pub fn branch_else(
        condition: ReadInstr<bool>,
        then_body: impl FnOnce(),
        else_body: impl FnOnce(),
    ) {
        Self::enter_then(&condition);
        then_body();
        Self::leave_branch();
        Self::enter_else(&condition);
        else_body();
        Self::leave_branch();
    }

    fn enter_then(condition: &ReadInstr<bool>) {
        Self::with(|recording| {
            recording.block_tree.branch_then(condition.node().clone());
            recording
                .recorders
                .last_mut()
                .expect("a recording always has a current recorder")
                .enter_guard(condition.clone());
        });
    }

    fn enter_else(condition: &ReadInstr<bool>) {
        Self::with(|recording| {
            recording.block_tree.branch_else();
            recording
                .recorders
                .last_mut()
                .expect("a recording always has a current recorder")
                .enter_guard(!condition.clone());
        });
    }

    fn leave_branch() {
        Self::with(|recording| {
            recording
                .recorders
                .last_mut()
                .expect("a recording always has a current recorder")
                .leave_guard();
            recording.block_tree.close();
        });
    }

    pub(crate) fn record_read(zone: &Zone, ty: ScalarType) -> Arc<Event> {
        Self::with(|recording| {
            let event = recording
                .recorders
                .last_mut()
                .expect("shared variables require an active recording")
                .append_read(zone, ty);
            recording.block_tree.append(event.clone());
            event
        })
    }

    pub(crate) fn record_write(zone: &Zone, ty: ScalarType, instr: SharedInstr) -> Arc<Event> {
        Self::with(|recording| {
            let recorder = recording
                .recorders
                .last_mut()
                .expect("shared variables require an active recording");
            let already_logged = recorder.log().len();
            let event = recorder.append_write(zone, ty, instr);
            let appended: Vec<_> = recorder.log()[already_logged..].to_vec();
            recording.block_tree.append_all(appended);
            event
        })
    }

    /// The archived log of a finished thread; the main thread's log is
    /// archived under id 0 by `end_main_thread`.
    pub fn archived_log(thread_id: ThreadId) -> Option<Vec<Arc<Event>>> {
        Self::with(|recording| {
            recording
                .finished
                .iter()
                .find(|(id, _)| *id == thread_id)
                .map(|(_, log)| log.clone())
        })
    }

    /// Inspect the block tree of the active recording.
    pub fn with_block_tree<R>(f: impl FnOnce(&BlockTree) -> R) -> R {
        Self::with(|recording| f(&recording.block_tree))
    }
}

/// Bounded loop unwinding. `unwind` answers `true` at most `bound` times,
/// and only while its condition is feasible under the current path
/// condition; every affirmative answer pushes the condition as a guard
/// frame, and the final negative answer pops everything the loop pushed.
pub struct Loop {
    bound: usize,
    taken: usize,
    pushed: usize,
    tracked: Vec<(Zone, ScalarType)>,
}

impl Loop {
    pub fn new(bound: usize) -> Self {
        Loop { bound, taken: 0, pushed: 0, tracked: Vec::new() }
    }

    /// Register a variable whose value the unwinding bound may cut off;
    /// exhaustion reports tracked addresses through the logger.
    pub fn track<T: Scalar>(&mut self, var: &Var<T>) {
        self.tracked.push((var.zone().clone(), T::TYPE));
    }

    pub fn unwind<S: Solver, M: MemoryModel>(
        &mut self,
        condition: ReadInstr<bool>,
        encoder: &mut Encoder<S, M>,
    ) -> Result<bool, Error> {
        if self.taken == self.bound {
            if !self.tracked.is_empty() {
                debug!(
                    "unwinding bound {} reached with {} tracked variables still live",
                    self.bound,
                    self.tracked.len()
                );
            }
            self.leave_all();
            return Ok(false);
        }
        if encoder.feasible(condition.node())? == SmtResult::Unsat {
            debug!("loop condition infeasible after {} unwindings", self.taken);
            self.leave_all();
            return Ok(false);
        }
        Threads::enter_then(&condition);
        self.taken += 1;
        self.pushed += 1;
        Ok(true)
    }

    fn leave_all(&mut self) {
        for _ in 0..self.pushed {
            Threads::leave_branch();
        }
        self.pushed = 0;
    }
}
