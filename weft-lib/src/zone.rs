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

//! Opaque identities for storage locations. A zone is a set of atoms; two
//! zones may alias exactly when their atom sets intersect, so disjoint sets
//! are a proof of non-aliasing and unions express conservative aliasing.

use std::cell::Cell;
use std::collections::BTreeSet;

thread_local! {
    static NEXT_ATOM: Cell<u64> = Cell::new(1);
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Zone {
    atoms: BTreeSet<u64>,
}

impl Zone {
    /// A fresh zone holding a single atom never handed out before.
    pub fn unique_atom() -> Zone {
        let atom = NEXT_ATOM.with(|next| {
            let atom = next.get();
            next.set(atom + 1);
            atom
        });
        let mut atoms = BTreeSet::new();
        atoms.insert(atom);
        Zone { atoms }
    }

    /// A zone aliasing nothing, not even itself. Sync events use it.
    pub fn empty() -> Zone {
        Zone { atoms: BTreeSet::new() }
    }

    pub fn union(a: &Zone, b: &Zone) -> Zone {
        Zone { atoms: a.atoms.union(&b.atoms).cloned().collect() }
    }

    pub fn may_alias(&self, other: &Zone) -> bool {
        self.atoms.intersection(&other.atoms).next().is_some()
    }

    pub fn atoms(&self) -> impl Iterator<Item = u64> + '_ {
        self.atoms.iter().cloned()
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_atoms_are_disjoint() {
        let a = Zone::unique_atom();
        let b = Zone::unique_atom();
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert!(!a.may_alias(&b));
        assert!(!b.may_alias(&a));
    }

    #[test]
    fn test_alias_is_reflexive_and_symmetric() {
        let a = Zone::unique_atom();
        let b = Zone::unique_atom();
        let ab = Zone::union(&a, &b);
        assert!(a.may_alias(&a));
        assert!(ab.may_alias(&a));
        assert!(a.may_alias(&ab));
        assert!(ab.may_alias(&b));
    }

    #[test]
    fn test_union_is_monotone() {
        let a = Zone::unique_atom();
        let b = Zone::unique_atom();
        let c = Zone::unique_atom();
        let ab = Zone::union(&a, &b);
        let abc = Zone::union(&ab, &c);
        assert_eq!(ab.len(), 2);
        assert_eq!(abc.len(), 3);
        assert!(ab.atoms().all(|atom| abc.atoms().any(|x| x == atom)));
    }

    #[test]
    fn test_empty_zone_aliases_nothing() {
        let e = Zone::empty();
        assert!(!e.may_alias(&e));
        assert!(!e.may_alias(&Zone::unique_atom()));
    }
}
