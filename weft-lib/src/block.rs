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

//! Lexical control-flow scopes. Blocks live in an id arena; each block
//! holds its events and child block references in append order, so an
//! in-order flattening of a thread's block reproduces that thread's log.

use std::sync::Arc;

use crate::event::{Event, ThreadId};
use crate::instr::{Instr, SharedInstr};

pub type BlockId = usize;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Root,
    Then,
    Else,
    Thread(ThreadId),
}

#[derive(Debug)]
pub enum BlockItem {
    Event(Arc<Event>),
    Child(BlockId),
}

#[derive(Debug)]
pub struct Block {
    kind: BlockKind,
    guard: Option<SharedInstr>,
    items: Vec<BlockItem>,
    parent: Option<BlockId>,
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// The branch condition for then-blocks, its negation for else-blocks.
    pub fn guard(&self) -> Option<&SharedInstr> {
        self.guard.as_ref()
    }

    pub fn parent(&self) -> Option<BlockId> {
        self.parent
    }

    pub fn items(&self) -> &[BlockItem] {
        &self.items
    }

    /// This block's own events in append order, children excluded.
    pub fn body(&self) -> impl Iterator<Item = &Arc<Event>> + '_ {
        self.items.iter().filter_map(|item| match item {
            BlockItem::Event(event) => Some(event),
            BlockItem::Child(_) => None,
        })
    }
}

pub struct BlockTree {
    blocks: Vec<Block>,
    open: Vec<BlockId>,
}

impl BlockTree {
    pub fn make_root() -> Self {
        let root = Block { kind: BlockKind::Root, guard: None, items: Vec::new(), parent: None };
        BlockTree { blocks: vec![root], open: vec![0] }
    }

    pub fn root(&self) -> BlockId {
        0
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    /// The innermost open block, where appends land.
    pub fn current(&self) -> BlockId {
        *self.open.last().expect("the root block is always open")
    }

    pub fn open_depth(&self) -> usize {
        self.open.len()
    }

    pub fn append(&mut self, event: Arc<Event>) {
        let current = self.current();
        self.blocks[current].items.push(BlockItem::Event(event));
    }

    pub fn append_all(&mut self, events: impl IntoIterator<Item = Arc<Event>>) {
        let current = self.current();
        self.blocks[current]
            .items
            .extend(events.into_iter().map(BlockItem::Event));
    }

    pub fn branch_then(&mut self, condition: SharedInstr) -> BlockId {
        self.open_child(BlockKind::Then, Some(condition))
    }

    /// Open the else-branch matching the then-branch most recently closed
    /// in the current block; its guard is that branch's negated condition.
    pub fn branch_else(&mut self) -> BlockId {
        let current = self.current();
        let then_guard = self.blocks[current]
            .items
            .iter()
            .rev()
            .find_map(|item| match item {
                BlockItem::Child(id) if self.blocks[*id].kind == BlockKind::Then => {
                    self.blocks[*id].guard.clone()
                }
                _ => None,
            })
            .expect("branch_else without a preceding then branch");
        self.open_child(BlockKind::Else, Some(Instr::negate(then_guard)))
    }

    pub fn open_thread(&mut self, thread_id: ThreadId) -> BlockId {
        self.open_child(BlockKind::Thread(thread_id), None)
    }

    pub fn close(&mut self) {
        if self.open.len() == 1 {
            panic!("cannot close the root block");
        }
        self.open.pop();
    }

    fn open_child(&mut self, kind: BlockKind, guard: Option<SharedInstr>) -> BlockId {
        let parent = self.current();
        let id = self.blocks.len();
        self.blocks.push(Block { kind, guard, items: Vec::new(), parent: Some(parent) });
        self.blocks[parent].items.push(BlockItem::Child(id));
        self.open.push(id);
        id
    }

    /// In-order event sequence of `id` and everything below it.
    pub fn flatten(&self, id: BlockId, out: &mut Vec<Arc<Event>>) {
        for item in &self.blocks[id].items {
            match item {
                BlockItem::Event(event) => out.push(event.clone()),
                BlockItem::Child(child) => self.flatten(*child, out),
            }
        }
    }
}
