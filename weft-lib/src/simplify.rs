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

use std::collections::HashMap;

use crate::smt::smtlib::{Def, Exp, Sym};

/// `uses_in_exp` counts the occurrences of each symbol in an expression.
fn uses_in_exp(uses: &mut HashMap<Sym, u32>, exp: &Exp) {
    use Exp::*;
    match exp {
        Var(sym) => {
            *uses.entry(*sym).or_insert(0) += 1;
        }
        Bool(_) | Bits64(_, _) => (),
        Not(exp) | Bvnot(exp) | Bvneg(exp) | ZeroExtend(_, exp) | SignExtend(_, exp)
        | Extract(_, _, exp) => uses_in_exp(uses, exp),
        And(lhs, rhs)
        | Or(lhs, rhs)
        | Implies(lhs, rhs)
        | Eq(lhs, rhs)
        | Neq(lhs, rhs)
        | Bvadd(lhs, rhs)
        | Bvsub(lhs, rhs)
        | Bvmul(lhs, rhs)
        | Bvult(lhs, rhs)
        | Bvule(lhs, rhs)
        | Bvugt(lhs, rhs)
        | Bvuge(lhs, rhs)
        | Bvslt(lhs, rhs)
        | Bvsle(lhs, rhs)
        | Bvsgt(lhs, rhs)
        | Bvsge(lhs, rhs) => {
            uses_in_exp(uses, lhs);
            uses_in_exp(uses, rhs)
        }
        Ite(cond, then_exp, else_exp) => {
            uses_in_exp(uses, cond);
            uses_in_exp(uses, then_exp);
            uses_in_exp(uses, else_exp)
        }
    }
}

fn remove_unused_pass(mut defs: Vec<Def>) -> (Vec<Def>, u32) {
    let mut uses: HashMap<Sym, u32> = HashMap::new();
    for def in defs.iter().rev() {
        match def {
            Def::DeclareConst(_, _) => (),
            Def::DefineConst(_, _, exp) => uses_in_exp(&mut uses, exp),
            Def::Assert(exp) => uses_in_exp(&mut uses, exp),
        }
    }

    let mut removed = 0;

    defs.retain(|def| match def {
        Def::DeclareConst(sym, _) | Def::DefineConst(sym, _, _) => {
            if uses.contains_key(sym) {
                true
            } else {
                removed += 1;
                false
            }
        }
        Def::Assert(_) => true,
    });

    (defs, removed)
}

/// Drop declarations and definitions no assertion transitively uses. A
/// removed definition can orphan the symbols it referred to, so passes
/// repeat until nothing is removed.
pub fn remove_unused(defs: Vec<Def>) -> Vec<Def> {
    let (defs, removed) = remove_unused_pass(defs);
    if removed > 0 {
        remove_unused(defs)
    } else {
        defs
    }
}
