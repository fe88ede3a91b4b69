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

//! Symbolic recording and encoding of concurrent programs. A program under
//! test is written against [`Var`] and driven through [`Threads`]; running
//! it records an acyclic graph of events and instructions annotated with
//! per-thread path conditions instead of executing anything, and the
//! recording is then lowered to an SMT instance whose satisfiability
//! decides whether an assertion violation is reachable.
//!
//! ```
//! use weft_lib::{Encoder, Script, Threads, Var};
//!
//! let mut encoder = Encoder::new(Script::new());
//! Threads::reset();
//! Threads::begin_main_thread();
//!
//! let x = Var::<i32>::with_value(1);
//!
//! Threads::begin_thread();
//! x.assign(x.read() + 1);
//! Threads::end_thread(&mut encoder).unwrap();
//!
//! Threads::error(x.read().gt(1), &mut encoder);
//! Threads::end_main_thread(&mut encoder).unwrap();
//!
//! let verdict = encoder.check().unwrap();
//! println!("{}", verdict);
//! ```

pub mod block;
pub mod encoder;
pub mod error;
pub mod event;
pub mod expr;
pub mod instr;
pub mod recorder;
pub mod simplify;
pub mod smt;
pub mod threads;
pub mod ty;
pub mod var;
pub mod zone;

pub use encoder::{Encoder, MemoryModel, C0};
pub use error::Error;
pub use expr::{any, any_bool, any_char, any_int, any_long, any_short, ExprKind, Value, Visitor};
pub use instr::ReadInstr;
pub use smt::{Script, SmtResult, Solver};
pub use threads::{Loop, Threads};
pub use ty::{Scalar, ScalarType, ScalarVal};
pub use var::Var;
pub use zone::Zone;
