//! The TBDD manager and its core algorithms.
//!
//! All operations go through the [`Tbdd`] manager, which owns the unique
//! table and the operation cache. Handles are lightweight tagged [`Ref`]
//! edges; structural sharing makes equality of handles equivalent to
//! equality of the represented functions *per domain*.
//!
//! # Domains
//!
//! Every set or relation lives on an explicit *domain*: an ordered cube of
//! variable indices built with [`Tbdd::from_array`] and traversed with
//! [`Tbdd::getvar`] / [`Tbdd::gethigh`]. Binary operations take the domain as
//! an argument and recurse level by level along it; `makenode` restores the
//! two reduction rules (don't-care skip and zero-suppression by tag) so each
//! function has exactly one representation over a given domain.

use hashbrown::{HashMap, HashSet};
use num_bigint::BigUint;
use num_traits::Zero;

use crate::cache::{OpCache, OP_AND, OP_DIFF, OP_ENABLED, OP_EXTEND, OP_OR, OP_RELNEXT};
use crate::node::Node;
use crate::reference::{Ref, NO_VARIABLE};
#[cfg(test)]
use crate::reference::NO_TAG;
use crate::storage::Storage;

/// Sizing knobs for the manager.
#[derive(Debug, Clone, Copy)]
pub struct TbddConfig {
    /// log2 of the maximum node table size.
    pub table_bits: usize,
    /// log2 of the operation cache size.
    pub cache_bits: usize,
}

impl Default for TbddConfig {
    fn default() -> Self {
        Self {
            table_bits: 22,
            cache_bits: 20,
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy)]
pub struct TbddStats {
    pub table_filled: usize,
    pub table_capacity: usize,
    pub table_growths: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_faults: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoolOp {
    Or,
    And,
    Diff,
}

impl BoolOp {
    fn opcode(self) -> u64 {
        match self {
            BoolOp::Or => OP_OR,
            BoolOp::And => OP_AND,
            BoolOp::Diff => OP_DIFF,
        }
    }
}

pub struct Tbdd {
    storage: Storage,
    cache: OpCache,
}

impl Default for Tbdd {
    fn default() -> Self {
        Self::new(TbddConfig::default())
    }
}

impl Tbdd {
    pub fn new(config: TbddConfig) -> Self {
        Self {
            storage: Storage::new(config.table_bits),
            cache: OpCache::new(config.cache_bits),
        }
    }

    // ─── Structure accessors ───────────────────────────────────────────────

    pub fn node(&self, e: Ref) -> Node {
        debug_assert!(!e.is_leaf(), "Terminals have no node record");
        self.storage.node(e.index())
    }

    /// Variable of the top node, or [`NO_VARIABLE`] for a leaf.
    pub fn getvar(&self, e: Ref) -> u32 {
        if e.is_leaf() {
            NO_VARIABLE
        } else {
            self.node(e).variable
        }
    }

    /// Low child of the top node.
    pub fn getlow(&self, e: Ref) -> Ref {
        self.node(e).low
    }

    /// High child of the top node. Also advances variable cubes.
    pub fn gethigh(&self, e: Ref) -> Ref {
        self.node(e).high
    }

    /// The same function with its don't-care prefix re-anchored at `tag`.
    pub fn settag(&self, e: Ref, tag: u32) -> Ref {
        debug_assert!(
            e.is_leaf() || tag <= self.getvar(e),
            "Tag {} beyond node variable {}",
            tag,
            self.getvar(e)
        );
        e.with_tag(tag)
    }

    /// Node table occupancy: `(filled, capacity)`.
    pub fn table_usage(&self) -> (usize, usize) {
        (self.storage.filled(), self.storage.capacity())
    }

    pub fn stats(&self) -> TbddStats {
        TbddStats {
            table_filled: self.storage.filled(),
            table_capacity: self.storage.capacity(),
            table_growths: self.storage.growths(),
            cache_hits: self.cache.hits(),
            cache_misses: self.cache.misses(),
            cache_faults: self.cache.faults(),
        }
    }

    /// Drops every memoized operation result. Results of later operations are
    /// unaffected; only their cost is.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    // ─── Node construction ─────────────────────────────────────────────────

    /// Creates the edge for "branch on `var` between `low` and `high`",
    /// applying both reduction rules.
    ///
    /// `nextvar` is the domain variable immediately after `var`, or
    /// [`NO_TAG`] when `var` is the last one. It decides whether a
    /// `high == false` branch can be folded into the low child's tag: that is
    /// only sound when the low child's zero block starts exactly at `nextvar`,
    /// i.e. there is no don't-care gap in between.
    pub fn makenode(&self, var: u32, low: Ref, high: Ref, nextvar: u32) -> Ref {
        debug_assert!(var < NO_VARIABLE, "Variable index out of range");
        debug_assert!(var < nextvar, "Domain order violated at variable {}", var);
        debug_assert!(var < low.tag() && var < high.tag());

        if low == high {
            return low;
        }
        if high.is_false() {
            if low.is_false() {
                return Ref::FALSE;
            }
            if low.tag() == nextvar {
                // Zero-suppression: extend the low child's zero block up to var.
                return Ref::new(low.index(), var);
            }
        }
        let index = self.storage.put(Node::new(var, low, high));
        Ref::new(index, var)
    }

    /// Re-inserts a deserialized node. No domain is available during
    /// deserialization, so only the domain-independent reductions apply; the
    /// writer emitted canonical nodes, which this reproduces exactly.
    pub(crate) fn rebuild(&self, variable: u32, low: Ref, high: Ref) -> Ref {
        if low == high {
            return low;
        }
        let index = self.storage.put(Node::new(variable, low, high));
        Ref::new(index, variable)
    }

    /// Builds the ordered variable cube for `vars` (strictly increasing).
    pub fn from_array(&self, vars: &[u32]) -> Ref {
        debug_assert!(vars.windows(2).all(|w| w[0] < w[1]), "Variables must be sorted");

        let mut acc = Ref::TRUE;
        for &v in vars.iter().rev() {
            let index = self.storage.put(Node::new(v, Ref::FALSE, acc));
            acc = Ref::new(index, v);
        }
        acc
    }

    // ─── Cofactors ─────────────────────────────────────────────────────────

    /// Cofactors `e` at domain variable `v`; `nextvar` is the domain variable
    /// after `v`. The caller must walk the domain in order, never skipping a
    /// variable the function depends on.
    pub fn cofactor(&self, e: Ref, v: u32, nextvar: u32) -> (Ref, Ref) {
        if e.is_false() {
            return (e, e);
        }
        let tag = e.tag();
        assert!(v <= tag, "Domain walked past an essential variable");
        if v < tag {
            // Don't-care level.
            return (e, e);
        }
        if e.is_leaf() {
            // Zero block of a TRUE leaf: runs to the end of the domain.
            return (e.with_tag(nextvar), Ref::FALSE);
        }
        let node = self.node(e);
        if v < node.variable {
            // Inside the zero block: consume one level.
            (e.with_tag(nextvar), Ref::FALSE)
        } else {
            (node.low, node.high)
        }
    }

    // ─── Boolean set operations ────────────────────────────────────────────

    /// `a ∪ b` over `dom`.
    pub fn or(&self, a: Ref, b: Ref, dom: Ref) -> Ref {
        self.apply(a, b, dom, BoolOp::Or)
    }

    /// `a ∩ b` over `dom`.
    pub fn and(&self, a: Ref, b: Ref, dom: Ref) -> Ref {
        self.apply(a, b, dom, BoolOp::And)
    }

    /// `a ∖ b` over `dom`.
    pub fn diff(&self, a: Ref, b: Ref, dom: Ref) -> Ref {
        self.apply(a, b, dom, BoolOp::Diff)
    }

    fn apply_terminal(op: BoolOp, a: Ref, b: Ref) -> Option<Ref> {
        match op {
            BoolOp::Or => {
                if a.is_false() {
                    Some(b)
                } else if b.is_false() || a == b {
                    Some(a)
                } else if a == Ref::TRUE || b == Ref::TRUE {
                    Some(Ref::TRUE)
                } else {
                    None
                }
            }
            BoolOp::And => {
                if a.is_false() || b.is_false() {
                    Some(Ref::FALSE)
                } else if a == Ref::TRUE {
                    Some(b)
                } else if b == Ref::TRUE || a == b {
                    Some(a)
                } else {
                    None
                }
            }
            BoolOp::Diff => {
                if a.is_false() || b == Ref::TRUE || a == b {
                    Some(Ref::FALSE)
                } else if b.is_false() {
                    Some(a)
                } else {
                    None
                }
            }
        }
    }

    fn apply(&self, a: Ref, b: Ref, dom: Ref, op: BoolOp) -> Ref {
        if let Some(result) = Self::apply_terminal(op, a, b) {
            return result;
        }
        assert!(!dom.is_leaf(), "Operands outlive their domain");

        let key = (op.opcode(), a.raw(), b.raw(), dom.raw());
        if let Some(raw) = self.cache.get(&key) {
            return Ref::from_raw(raw);
        }

        let v = self.getvar(dom);
        let subdom = self.gethigh(dom);
        let nextvar = self.getvar(subdom);

        let (a0, a1) = self.cofactor(a, v, nextvar);
        let (b0, b1) = self.cofactor(b, v, nextvar);
        let r0 = self.apply(a0, b0, subdom, op);
        let r1 = self.apply(a1, b1, subdom, op);
        let result = self.makenode(v, r0, r1, nextvar);

        self.cache.insert(key, result.raw());
        result
    }

    // ─── Relational image ──────────────────────────────────────────────────

    /// Relational image: the states reachable in one step of `rel` from
    /// `set`, over the state domain `dom`.
    ///
    /// `vars` is the interleaved current/next variable cube of the relation;
    /// domain variables absent from it pass through unchanged (the relation
    /// leaves that part of the state vector alone).
    pub fn relnext(&self, set: Ref, rel: Ref, vars: Ref, dom: Ref) -> Ref {
        if set.is_false() || rel.is_false() {
            return Ref::FALSE;
        }
        if vars == Ref::TRUE {
            // All relation variables consumed; the remaining constraint is a
            // constant and the rest of the state passes through.
            debug_assert!(rel == Ref::TRUE, "Relation outlives its variables");
            return set;
        }
        assert!(!dom.is_leaf(), "Relation variables outside the state domain");

        let key = (OP_RELNEXT | vars.raw(), set.raw(), rel.raw(), dom.raw());
        if let Some(raw) = self.cache.get(&key) {
            return Ref::from_raw(raw);
        }

        let v = self.getvar(dom);
        let subdom = self.gethigh(dom);
        let nextvar = self.getvar(subdom);

        let rel_var = self.getvar(vars);
        debug_assert!(rel_var >= v, "Relation variables must be a subset of the domain");

        let result = if rel_var > v {
            // Variable untouched by this relation: identity.
            let (s0, s1) = self.cofactor(set, v, nextvar);
            let r0 = self.relnext(s0, rel, vars, subdom);
            let r1 = self.relnext(s1, rel, vars, subdom);
            self.makenode(v, r0, r1, nextvar)
        } else {
            // Read/write pair (v, v+1).
            let primed = self.gethigh(vars);
            debug_assert_eq!(self.getvar(primed), v + 1, "Unprimed variable without its primed twin");
            let subvars = self.gethigh(primed);
            let rel_nextvar = self.getvar(subvars);

            let (s0, s1) = self.cofactor(set, v, nextvar);
            let (r0, r1) = self.cofactor(rel, v, v + 1);
            let (r00, r01) = self.cofactor(r0, v + 1, rel_nextvar);
            let (r10, r11) = self.cofactor(r1, v + 1, rel_nextvar);

            // Successors with the next-state bit clear / set.
            let low = {
                let from0 = self.relnext(s0, r00, subvars, subdom);
                let from1 = self.relnext(s1, r10, subvars, subdom);
                self.or(from0, from1, subdom)
            };
            let high = {
                let from0 = self.relnext(s0, r01, subvars, subdom);
                let from1 = self.relnext(s1, r11, subvars, subdom);
                self.or(from0, from1, subdom)
            };
            self.makenode(v, low, high, nextvar)
        };

        self.cache.insert(key, result.raw());
        result
    }

    // ─── Domain extension ──────────────────────────────────────────────────

    /// Reinterprets `e` (defined on the cube `vars`) over the superdomain
    /// `totaldom`; variables new to `totaldom` become don't-care.
    pub fn extend_domain(&self, e: Ref, vars: Ref, totaldom: Ref) -> Ref {
        if e.is_false() {
            return Ref::FALSE;
        }
        if totaldom == Ref::TRUE {
            debug_assert!(e.is_leaf());
            return e;
        }

        let key = (OP_EXTEND | vars.raw(), e.raw(), totaldom.raw(), 0);
        if let Some(raw) = self.cache.get(&key) {
            return Ref::from_raw(raw);
        }

        let v = self.getvar(totaldom);
        let subdom = self.gethigh(totaldom);
        let nextvar = self.getvar(subdom);

        let own_var = self.getvar(vars);
        debug_assert!(own_var >= v, "Operand variables must embed into the new domain");

        let result = if own_var > v {
            // New variable: don't-care, no node.
            self.extend_domain(e, vars, subdom)
        } else {
            let subvars = self.gethigh(vars);
            let own_nextvar = self.getvar(subvars);
            let (e0, e1) = self.cofactor(e, v, own_nextvar);
            let r0 = self.extend_domain(e0, subvars, subdom);
            let r1 = self.extend_domain(e1, subvars, subdom);
            self.makenode(v, r0, r1, nextvar)
        };

        self.cache.insert(key, result.raw());
        result
    }

    // ─── Enabledness ───────────────────────────────────────────────────────

    /// The guard of a relation: states from which `rel` can fire, i.e. the
    /// primed variables existentially quantified away. The result lives on
    /// `statedom`, the cube of the relation's unprimed variables.
    pub fn enabled(&self, rel: Ref, vars: Ref, statedom: Ref) -> Ref {
        if rel.is_false() {
            return Ref::FALSE;
        }
        if vars == Ref::TRUE {
            debug_assert!(rel == Ref::TRUE);
            return Ref::TRUE;
        }

        let key = (OP_ENABLED | vars.raw(), rel.raw(), statedom.raw(), 0);
        if let Some(raw) = self.cache.get(&key) {
            return Ref::from_raw(raw);
        }

        let v = self.getvar(vars);
        debug_assert_eq!(self.getvar(statedom), v);
        let substates = self.gethigh(statedom);
        let nextvar = self.getvar(substates);

        let primed = self.gethigh(vars);
        let subvars = self.gethigh(primed);
        let rel_nextvar = self.getvar(subvars);

        let (r0, r1) = self.cofactor(rel, v, v + 1);
        let (r00, r01) = self.cofactor(r0, v + 1, rel_nextvar);
        let (r10, r11) = self.cofactor(r1, v + 1, rel_nextvar);

        let low = {
            let a = self.enabled(r00, subvars, substates);
            let b = self.enabled(r01, subvars, substates);
            self.or(a, b, substates)
        };
        let high = {
            let a = self.enabled(r10, subvars, substates);
            let b = self.enabled(r11, subvars, substates);
            self.or(a, b, substates)
        };
        let result = self.makenode(v, low, high, nextvar);

        self.cache.insert(key, result.raw());
        result
    }

    // ─── Counting and enumeration ──────────────────────────────────────────

    /// Exact number of assignments over `dom` satisfying `set`.
    pub fn satcount(&self, set: Ref, dom: Ref) -> BigUint {
        let mut memo = HashMap::new();
        self.satcount_rec(set, dom, &mut memo)
    }

    fn satcount_rec(&self, set: Ref, dom: Ref, memo: &mut HashMap<(u64, u64), BigUint>) -> BigUint {
        if set.is_false() {
            return BigUint::zero();
        }
        if dom == Ref::TRUE {
            debug_assert_eq!(set, Ref::TRUE);
            return BigUint::from(1u32);
        }
        let key = (set.raw(), dom.raw());
        if let Some(count) = memo.get(&key) {
            return count.clone();
        }

        let v = self.getvar(dom);
        let subdom = self.gethigh(dom);
        let nextvar = self.getvar(subdom);
        let (s0, s1) = self.cofactor(set, v, nextvar);
        let count = self.satcount_rec(s0, subdom, memo) + self.satcount_rec(s1, subdom, memo);

        memo.insert(key, count.clone());
        count
    }

    /// Number of distinct internal nodes reachable from `e`.
    pub fn nodecount(&self, e: Ref) -> usize {
        let mut seen = HashSet::new();
        let mut stack = vec![e];
        while let Some(e) = stack.pop() {
            if e.is_leaf() || !seen.insert(e.index()) {
                continue;
            }
            let node = self.node(e);
            stack.push(node.low);
            stack.push(node.high);
        }
        seen.len()
    }

    /// The lexicographically least satisfying assignment over `dom`, as one
    /// bit per domain variable. `None` for the empty set.
    pub fn first_sat(&self, set: Ref, dom: Ref) -> Option<Vec<u8>> {
        if set.is_false() {
            return None;
        }
        let mut bits = Vec::new();
        let mut set = set;
        let mut dom = dom;
        while dom != Ref::TRUE {
            let v = self.getvar(dom);
            dom = self.gethigh(dom);
            let nextvar = self.getvar(dom);
            let (s0, s1) = self.cofactor(set, v, nextvar);
            if !s0.is_false() {
                bits.push(0);
                set = s0;
            } else {
                bits.push(1);
                set = s1;
            }
        }
        Some(bits)
    }

    // ─── Strategy-level memoization hooks ──────────────────────────────────

    /// Looks up a result stored under a caller-owned opcode.
    pub fn cache_get3(&self, opcode: u64, a: u64, b: u64, c: u64) -> Option<Ref> {
        self.cache.get(&(opcode, a, b, c)).map(Ref::from_raw)
    }

    /// Stores a result under a caller-owned opcode.
    pub fn cache_put3(&self, opcode: u64, a: u64, b: u64, c: u64, result: Ref) {
        self.cache.insert((opcode, a, b, c), result.raw());
    }
}

impl Ref {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self::new(raw as u32, (raw >> 32) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evens(n: u32) -> Vec<u32> {
        (0..n).map(|i| 2 * i).collect()
    }

    /// Cube of concrete bits over `vars`, built bottom-up.
    fn cube(tbdd: &Tbdd, vars: &[u32], bits: &[u8]) -> Ref {
        assert_eq!(vars.len(), bits.len());
        let mut acc = Ref::TRUE;
        let mut nextvar = NO_TAG;
        for (&v, &b) in vars.iter().zip(bits.iter()).rev() {
            acc = if b == 0 {
                tbdd.makenode(v, acc, Ref::FALSE, nextvar)
            } else {
                tbdd.makenode(v, Ref::FALSE, acc, nextvar)
            };
            nextvar = v;
        }
        acc
    }

    #[test]
    fn test_makenode_dontcare_rule() {
        let tbdd = Tbdd::default();
        let x = cube(&tbdd, &[2], &[1]);
        // Branching to the same child on both sides is no branch at all.
        assert_eq!(tbdd.makenode(0, x, x, 2), x);
    }

    #[test]
    fn test_makenode_zero_rule() {
        let tbdd = Tbdd::default();
        // x0=0 with an adjacent zero block folds into the tag.
        let tail = Ref::TRUE.with_tag(2);
        let folded = tbdd.makenode(0, tail, Ref::FALSE, 2);
        assert_eq!(folded, Ref::TRUE.with_tag(0));
        // With a don't-care gap in between, a real node is required.
        let gapped = tbdd.makenode(0, Ref::TRUE, Ref::FALSE, 2);
        assert!(!gapped.is_leaf());
        assert_eq!(gapped.tag(), 0);
    }

    #[test]
    fn test_from_array_chain() {
        let tbdd = Tbdd::default();
        let dom = tbdd.from_array(&[0, 2, 4]);
        assert_eq!(tbdd.getvar(dom), 0);
        let dom = tbdd.gethigh(dom);
        assert_eq!(tbdd.getvar(dom), 2);
        let dom = tbdd.gethigh(dom);
        assert_eq!(tbdd.getvar(dom), 4);
        assert_eq!(tbdd.gethigh(dom), Ref::TRUE);
    }

    #[test]
    fn test_or_and_diff() {
        let tbdd = Tbdd::default();
        let vars = evens(3);
        let dom = tbdd.from_array(&vars);

        let a = cube(&tbdd, &vars, &[0, 0, 0]);
        let b = cube(&tbdd, &vars, &[1, 0, 1]);
        let ab = tbdd.or(a, b, dom);

        assert_eq!(tbdd.satcount(ab, dom), BigUint::from(2u32));
        assert_eq!(tbdd.and(ab, a, dom), a);
        assert_eq!(tbdd.and(ab, b, dom), b);
        assert_eq!(tbdd.diff(ab, a, dom), b);
        assert_eq!(tbdd.diff(ab, b, dom), a);
        assert_eq!(tbdd.diff(a, ab, dom), Ref::FALSE);
        // Union is canonical regardless of operand order.
        assert_eq!(tbdd.or(b, a, dom), ab);
    }

    #[test]
    fn test_or_is_canonical_across_shapes() {
        let tbdd = Tbdd::default();
        let vars = evens(4);
        let dom = tbdd.from_array(&vars);

        // Build {0000, 0001, 0010, 0011} two different ways.
        let mut by_cubes = Ref::FALSE;
        for bits in [[0, 0, 0, 0], [0, 0, 0, 1], [0, 0, 1, 0], [0, 0, 1, 1]] {
            by_cubes = tbdd.or(by_cubes, cube(&tbdd, &vars, &bits), dom);
        }
        // Directly: x0=0, x2=0, rest free.
        let direct = {
            let free = Ref::TRUE;
            let n4 = tbdd.makenode(4, free, free, 6); // collapses
            let n2 = tbdd.makenode(2, n4, Ref::FALSE, 4);
            tbdd.makenode(0, n2, Ref::FALSE, 2)
        };
        assert_eq!(by_cubes, direct);
        assert_eq!(tbdd.satcount(by_cubes, dom), BigUint::from(4u32));
    }

    #[test]
    fn test_satcount_full_and_empty() {
        let tbdd = Tbdd::default();
        let dom = tbdd.from_array(&evens(5));
        assert_eq!(tbdd.satcount(Ref::TRUE, dom), BigUint::from(32u32));
        assert_eq!(tbdd.satcount(Ref::FALSE, dom), BigUint::zero());
        // Zero-tagged TRUE: all five variables forced to zero.
        assert_eq!(tbdd.satcount(Ref::TRUE.with_tag(0), dom), BigUint::from(1u32));
        // Zero block starting mid-domain.
        assert_eq!(tbdd.satcount(Ref::TRUE.with_tag(4), dom), BigUint::from(4u32));
    }

    #[test]
    fn test_first_sat() {
        let tbdd = Tbdd::default();
        let vars = evens(3);
        let dom = tbdd.from_array(&vars);
        let a = cube(&tbdd, &vars, &[1, 0, 1]);
        let b = cube(&tbdd, &vars, &[1, 1, 0]);
        let ab = tbdd.or(a, b, dom);
        assert_eq!(tbdd.first_sat(ab, dom), Some(vec![1, 0, 1]));
        assert_eq!(tbdd.first_sat(Ref::FALSE, dom), None);
        assert_eq!(tbdd.first_sat(Ref::TRUE, dom), Some(vec![0, 0, 0]));
    }

    #[test]
    fn test_relnext_toggle() {
        let tbdd = Tbdd::default();
        // One bit, variables 0 (current) and 1 (next): relation x' = ¬x.
        let dom = tbdd.from_array(&[0]);
        let vars = tbdd.from_array(&[0, 1]);
        let rel = {
            let rise = cube(&tbdd, &[0, 1], &[0, 1]);
            let fall = cube(&tbdd, &[0, 1], &[1, 0]);
            tbdd.or(rise, fall, vars)
        };

        let zero = cube(&tbdd, &[0], &[0]);
        let one = cube(&tbdd, &[0], &[1]);
        assert_eq!(tbdd.relnext(zero, rel, vars, dom), one);
        assert_eq!(tbdd.relnext(one, rel, vars, dom), zero);
    }

    #[test]
    fn test_relnext_frame_rule() {
        let tbdd = Tbdd::default();
        // Two bits (variables 0,2 current; 1,3 next). The relation only
        // touches bit 0; bit 1 must pass through unchanged.
        let dom = tbdd.from_array(&[0, 2]);
        let vars = tbdd.from_array(&[0, 1]);
        let rel = cube(&tbdd, &[0, 1], &[0, 1]); // 0 -> 1

        let s00 = cube(&tbdd, &[0, 2], &[0, 0]);
        let s01 = cube(&tbdd, &[0, 2], &[0, 1]);
        let s10 = cube(&tbdd, &[0, 2], &[1, 0]);
        let s11 = cube(&tbdd, &[0, 2], &[1, 1]);

        assert_eq!(tbdd.relnext(s00, rel, vars, dom), s10);
        assert_eq!(tbdd.relnext(s01, rel, vars, dom), s11);
        assert_eq!(tbdd.relnext(s10, rel, vars, dom), Ref::FALSE);

        let both = tbdd.or(s00, s01, dom);
        let expected = tbdd.or(s10, s11, dom);
        assert_eq!(tbdd.relnext(both, rel, vars, dom), expected);
    }

    #[test]
    fn test_extend_domain_dontcare() {
        let tbdd = Tbdd::default();
        let small = tbdd.from_array(&[2]);
        let big = tbdd.from_array(&[0, 2, 4]);
        let x2 = cube(&tbdd, &[2], &[1]);
        let wide = tbdd.extend_domain(x2, small, big);
        // 1 assignment over {2} becomes 4 over {0,2,4}.
        assert_eq!(tbdd.satcount(x2, small), BigUint::from(1u32));
        assert_eq!(tbdd.satcount(wide, big), BigUint::from(4u32));
        // Extending is stable once the domains agree.
        assert_eq!(tbdd.extend_domain(wide, big, big), wide);
    }

    #[test]
    fn test_enabled_guard() {
        let tbdd = Tbdd::default();
        // Relation over one bit that can only fire from 1 (1 -> 0).
        let vars = tbdd.from_array(&[0, 1]);
        let statedom = tbdd.from_array(&[0]);
        let rel = cube(&tbdd, &[0, 1], &[1, 0]);
        let guard = tbdd.enabled(rel, vars, statedom);
        assert_eq!(guard, cube(&tbdd, &[0], &[1]));
        // A relation firing from both values is enabled everywhere.
        let rel2 = {
            let a = cube(&tbdd, &[0, 1], &[1, 0]);
            let b = cube(&tbdd, &[0, 1], &[0, 0]);
            tbdd.or(a, b, vars)
        };
        assert_eq!(tbdd.enabled(rel2, vars, statedom), Ref::TRUE);
    }

    #[test]
    fn test_cache_transparency() {
        let tbdd = Tbdd::default();
        let vars = evens(4);
        let dom = tbdd.from_array(&vars);
        let a = cube(&tbdd, &vars, &[0, 1, 0, 1]);
        let b = cube(&tbdd, &vars, &[1, 0, 1, 0]);
        let before = tbdd.or(a, b, dom);
        tbdd.clear_cache();
        let after = tbdd.or(a, b, dom);
        assert_eq!(before, after);
    }
}
