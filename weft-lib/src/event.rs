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

//! Recorded accesses to shared storage. Events are immutable once
//! constructed and compared by identity, never structurally. Ids come from
//! a counter local to the recording thread; each construction consumes one
//! slot `k`, reads take id `2k` and writes `2k+1`, so the encoder can read
//! direction off the parity of a constant's name.

use std::cell::Cell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::instr::SharedInstr;
use crate::ty::ScalarType;
use crate::zone::Zone;

pub type EventId = u64;
pub type ThreadId = u32;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Read,
    Write,
    Sync,
}

thread_local! {
    static NEXT_SLOT: Cell<u64> = Cell::new(0);
}

/// Restart the id counter, so the next event gets slot `base`. Used by
/// tests and between recordings.
pub fn reset_id(base: u64) {
    NEXT_SLOT.with(|slot| slot.set(base));
}

fn next_slot() -> u64 {
    NEXT_SLOT.with(|slot| {
        let k = slot.get();
        slot.set(k + 1);
        k
    })
}

#[derive(Debug)]
pub struct Event {
    event_id: EventId,
    thread_id: ThreadId,
    zone: Zone,
    ty: ScalarType,
    direction: Direction,
    guard: Option<SharedInstr>,
    instr: Option<SharedInstr>,
}

impl Event {
    pub fn read(
        thread_id: ThreadId,
        zone: Zone,
        ty: ScalarType,
        guard: Option<SharedInstr>,
    ) -> Arc<Event> {
        Arc::new(Event {
            event_id: 2 * next_slot(),
            thread_id,
            zone,
            ty,
            direction: Direction::Read,
            guard,
            instr: None,
        })
    }

    pub fn write(
        thread_id: ThreadId,
        zone: Zone,
        ty: ScalarType,
        instr: SharedInstr,
        guard: Option<SharedInstr>,
    ) -> Arc<Event> {
        Arc::new(Event {
            event_id: 2 * next_slot() + 1,
            thread_id,
            zone,
            ty,
            direction: Direction::Write,
            guard,
            instr: Some(instr),
        })
    }

    /// Thread begin/end and assertion markers. They occupy no storage, so
    /// their zone is empty and they never materialize a value constant.
    pub fn sync(thread_id: ThreadId, guard: Option<SharedInstr>) -> Arc<Event> {
        Arc::new(Event {
            event_id: 2 * next_slot(),
            thread_id,
            zone: Zone::empty(),
            ty: ScalarType::Bool,
            direction: Direction::Sync,
            guard,
            instr: None,
        })
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn ty(&self) -> ScalarType {
        self.ty
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_read(&self) -> bool {
        self.direction == Direction::Read
    }

    pub fn is_write(&self) -> bool {
        self.direction == Direction::Write
    }

    pub fn is_sync(&self) -> bool {
        self.direction == Direction::Sync
    }

    pub fn guard(&self) -> Option<&SharedInstr> {
        self.guard.as_ref()
    }

    /// The instruction a write stores; `None` for reads and syncs.
    pub fn instr(&self) -> Option<&SharedInstr> {
        self.instr.as_ref()
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.event_id == other.event_id
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.event_id.hash(state);
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.direction {
            Direction::Read => "read",
            Direction::Write => "write",
            Direction::Sync => "sync",
        };
        write!(f, "{}:{}@{}", kind, self.event_id, self.thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Instr;
    use crate::ty::ScalarVal;

    #[test]
    fn test_event_id_base() {
        reset_id(42);
        let event = Event::read(0, Zone::unique_atom(), ScalarType::I32, None);
        assert_eq!(event.event_id(), 2 * 42);
        reset_id(0);
    }

    #[test]
    fn test_id_parity() {
        reset_id(5);
        let read = Event::read(3, Zone::unique_atom(), ScalarType::I32, None);
        let write = Event::write(
            3,
            Zone::unique_atom(),
            ScalarType::I64,
            Instr::literal_val(ScalarVal::I64(42), None),
            None,
        );
        assert_eq!(read.event_id(), 2 * 5);
        assert_eq!(write.event_id(), 2 * 6 + 1);
        assert!(read.is_read() && !read.is_write());
        assert!(write.is_write() && !write.is_read());
        reset_id(0);
    }

    #[test]
    fn test_equality_is_by_id_only() {
        let zone = Zone::unique_atom();
        let a = Event::read(0, zone.clone(), ScalarType::I32, None);
        let b = Event::read(0, zone, ScalarType::I32, None);
        assert_eq!(a, a);
        assert_ne!(a, b);
        assert_ne!(b, a);
    }

    #[test]
    fn test_conditional_event_carries_guard() {
        reset_id(0);
        let cond_read = Event::read(3, Zone::unique_atom(), ScalarType::Bool, None);
        let cond = Instr::basic(cond_read);
        let event = Event::read(3, Zone::unique_atom(), ScalarType::I32, Some(cond.clone()));
        assert_eq!(event.event_id(), 2 * 1);
        assert_eq!(event.zone().len(), 1);
        assert!(event.guard().is_some());
        assert!(std::sync::Arc::ptr_eq(event.guard().unwrap(), &cond));
        reset_id(0);
    }

    #[test]
    fn test_write_event_keeps_instr() {
        reset_id(5);
        let instr = Instr::literal_val(ScalarVal::I64(42), None);
        let write = Event::write(3, Zone::unique_atom(), ScalarType::I64, instr, None);
        assert_eq!(write.event_id(), 2 * 5 + 1);
        assert!(write.guard().is_none());
        match write.instr().map(|i| &**i) {
            Some(Instr::Literal { expr, .. }) => assert_eq!(expr.to_string(), "42"),
            other => panic!("unexpected write instruction: {:?}", other),
        }
        reset_id(0);
    }
}
