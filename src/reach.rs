//! The strategy engine: four ways to compute the set of reachable states of
//! a partitioned transition system.
//!
//! * [`Reach::bfs`] — level-synchronous exploration, partitions combined by a
//!   sequential divide-and-conquer union.
//! * [`Reach::par`] — the same shape with the divide-and-conquer recursion
//!   forked onto the work-stealing pool.
//! * [`Reach::sat`] — saturation: a recursive schedule that closes each
//!   variable level under its own partitions before returning to its parent,
//!   memoized through the operation cache.
//! * [`Reach::chaining`] — one sequential pass per iteration, each partition
//!   seeing the successors its predecessors just produced.
//!
//! All four produce the same final set; they differ only in how fast the
//! fixpoint is reached and how much intermediate structure they build.

use log::warn;

use crate::cache::OP_SATURATE;
use crate::model::{Domain, Relation, Set};
use crate::reference::{Ref, NO_TAG, NO_VARIABLE};
use crate::report::{format_state, group_thousands, Reporter};
use crate::tbdd::Tbdd;

/// Divide-and-conquer union of `next[first..first + count)`.
///
/// Only meaningful once the partitions share one variable cube (after domain
/// extension); the halves are forked onto the pool.
pub fn big_union(tbdd: &Tbdd, next: &[Relation], first: usize, count: usize) -> Ref {
    if count == 1 {
        return next[first].bdd;
    }
    let (left, right) = rayon::join(
        || big_union(tbdd, next, first, count / 2),
        || big_union(tbdd, next, first + count / 2, count - count / 2),
    );
    tbdd.or(left, right, next[first].variables)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Bfs,
    Par,
    Sat,
    Chaining,
}

pub struct Reach<'a> {
    tbdd: &'a Tbdd,
    domain: &'a Domain,
    reporter: &'a Reporter,
    check_deadlocks: bool,
    use_sat_cache: bool,
}

impl<'a> Reach<'a> {
    pub fn new(tbdd: &'a Tbdd, domain: &'a Domain, reporter: &'a Reporter) -> Self {
        Self {
            tbdd,
            domain,
            reporter,
            check_deadlocks: false,
            use_sat_cache: true,
        }
    }

    /// Enables the per-level deadlock report (BFS and PAR only).
    pub fn with_deadlock_check(mut self) -> Self {
        self.check_deadlocks = true;
        self
    }

    /// Disables saturation memoization. Strictly slower, never different.
    pub fn without_sat_cache(mut self) -> Self {
        self.use_sat_cache = false;
        self
    }

    pub fn run(&self, strategy: Strategy, set: &mut Set, next: &[Relation]) {
        match strategy {
            Strategy::Bfs => self.bfs(set, next),
            Strategy::Par => self.par(set, next),
            Strategy::Sat => self.sat(set, next),
            Strategy::Chaining => self.chaining(set, next),
        }
    }

    // ─── BFS ───────────────────────────────────────────────────────────────

    /// New successors of `cur` under `next[from..from + len)`, minus
    /// `visited`; halves combined sequentially.
    fn go_bfs(&self, cur: Ref, visited: Ref, next: &[Relation], from: usize, len: usize) -> Ref {
        if len == 0 {
            return Ref::FALSE;
        }
        if len == 1 {
            let rel = &next[from];
            let succ = self.tbdd.relnext(cur, rel.bdd, rel.variables, self.domain.vectordom);
            return self.tbdd.diff(succ, visited, self.domain.vectordom);
        }
        let left = self.go_bfs(cur, visited, next, from, len / 2);
        let right = self.go_bfs(cur, visited, next, from + len / 2, len - len / 2);
        self.tbdd.or(left, right, self.domain.vectordom)
    }

    pub fn bfs(&self, set: &mut Set, next: &[Relation]) {
        let guard = self.deadlock_guard(next);
        let vectordom = self.domain.vectordom;
        let mut visited = set.bdd;
        let mut front = visited;

        let mut iteration = 1;
        loop {
            if let Some(guard) = guard {
                self.report_deadlocks(front, guard);
            }
            front = self.go_bfs(front, visited, next, 0, next.len());
            visited = self.tbdd.or(visited, front, vectordom);
            self.reporter.level_done(self.tbdd, iteration, visited, set.variables);
            iteration += 1;
            if front.is_false() {
                break;
            }
        }

        set.bdd = visited;
    }

    // ─── PAR ───────────────────────────────────────────────────────────────

    /// Same as [`Reach::go_bfs`], but the left half runs on the pool while
    /// the right half is computed inline.
    fn go_par(&self, cur: Ref, visited: Ref, next: &[Relation], from: usize, len: usize) -> Ref {
        if len == 0 {
            return Ref::FALSE;
        }
        if len == 1 {
            let rel = &next[from];
            let succ = self.tbdd.relnext(cur, rel.bdd, rel.variables, self.domain.vectordom);
            return self.tbdd.diff(succ, visited, self.domain.vectordom);
        }
        let (left, right) = rayon::join(
            || self.go_par(cur, visited, next, from, len / 2),
            || self.go_par(cur, visited, next, from + len / 2, len - len / 2),
        );
        self.tbdd.or(left, right, self.domain.vectordom)
    }

    pub fn par(&self, set: &mut Set, next: &[Relation]) {
        let guard = self.deadlock_guard(next);
        let vectordom = self.domain.vectordom;
        let mut visited = set.bdd;
        let mut front = visited;

        let mut iteration = 1;
        loop {
            if let Some(guard) = guard {
                self.report_deadlocks(front, guard);
            }
            front = self.go_par(front, visited, next, 0, next.len());
            visited = self.tbdd.or(visited, front, vectordom);
            self.reporter.level_done(self.tbdd, iteration, visited, set.variables);
            iteration += 1;
            if front.is_false() {
                break;
            }
        }

        set.bdd = visited;
    }

    // ─── Saturation ────────────────────────────────────────────────────────

    /// The domain variable after `var`, or the end sentinel once `var + 2`
    /// walks off the state domain. Relies on state variables striding by 2.
    fn dom_next(&self, var: u32) -> u32 {
        if var + 2 < 2 * self.domain.totalbits {
            var + 2
        } else {
            NO_TAG
        }
    }

    fn go_sat(&self, set: Ref, idx: usize, next: &[Relation]) -> Ref {
        if set.is_false() {
            return Ref::FALSE;
        }
        if idx == next.len() {
            return set;
        }

        if self.use_sat_cache {
            if let Some(result) = self.tbdd.cache_get3(OP_SATURATE, set.raw(), idx as u64, 0) {
                return result;
            }
        }

        let set_var = self.tbdd.getvar(set);
        let set_tag = set.tag();
        let rel_var = self.tbdd.getvar(next[idx].variables);
        // An edge's first essential variable is its tag (tag == var when
        // nothing is zero-suppressed), so the pivot is min over set and
        // relation.
        let pivot_var = set_tag.min(rel_var);

        let result = if pivot_var == rel_var {
            // Count the partitions anchored at this level.
            let mut n = 1;
            while idx + n < next.len() && self.tbdd.getvar(next[idx + n].variables) == rel_var {
                n += 1;
            }
            // Chase the fixpoint: saturate deeper, then chain-apply every
            // partition of this level once, until a full cycle adds nothing.
            let mut cur = set;
            loop {
                let prev = cur;
                cur = self.go_sat(cur, idx + n, next);
                for rel in &next[idx..idx + n] {
                    let step = self.tbdd.relnext(cur, rel.bdd, rel.variables, rel.satdom);
                    cur = self.tbdd.or(cur, step, rel.satdom);
                }
                if cur == prev {
                    break;
                }
            }
            cur
        } else {
            let down = self.dom_next(pivot_var);
            if pivot_var < set_var {
                // The set is don't-care here but zero-suppressed from the
                // tag on: only the low branch exists.
                let set0 = self.tbdd.settag(set, down);
                let inner = self.go_sat(set0, idx, next);
                self.tbdd.makenode(pivot_var, inner, Ref::FALSE, down)
            } else {
                let node = self.tbdd.node(set);
                let (low, high) = rayon::join(
                    || self.go_sat(node.low, idx, next),
                    || self.go_sat(node.high, idx, next),
                );
                self.tbdd.makenode(pivot_var, low, high, down)
            }
        };

        if self.use_sat_cache {
            self.tbdd.cache_put3(OP_SATURATE, set.raw(), idx as u64, 0, result);
        }
        result
    }

    /// Saturation. Requires `next` sorted by ascending leading variable,
    /// every leading variable even.
    pub fn sat(&self, set: &mut Set, next: &[Relation]) {
        debug_assert!(
            next.windows(2).all(|w| self.tbdd.getvar(w[0].variables) <= self.tbdd.getvar(w[1].variables)),
            "Partitions must be sorted before saturation"
        );
        assert!(
            next.iter().all(|r| {
                let v = self.tbdd.getvar(r.variables);
                v == NO_VARIABLE || v % 2 == 0
            }),
            "Partition anchored on a next-state variable"
        );
        set.bdd = self.go_sat(set.bdd, 0, next);
    }

    // ─── Chaining ──────────────────────────────────────────────────────────

    /// Chaining. Each partition sees the successors of its predecessors
    /// within the same iteration. No deadlock support.
    pub fn chaining(&self, set: &mut Set, next: &[Relation]) {
        let vectordom = self.domain.vectordom;
        let mut visited = set.bdd;
        let mut next_level = visited;

        let mut iteration = 1;
        loop {
            for rel in next {
                let succ = self.tbdd.relnext(next_level, rel.bdd, rel.variables, vectordom);
                next_level = self.tbdd.or(next_level, succ, vectordom);
            }
            next_level = self.tbdd.diff(next_level, visited, vectordom);
            visited = self.tbdd.or(visited, next_level, vectordom);
            self.reporter.level_done(self.tbdd, iteration, visited, set.variables);
            iteration += 1;
            if next_level.is_false() {
                break;
            }
        }

        set.bdd = visited;
    }

    // ─── Deadlocks ─────────────────────────────────────────────────────────

    /// States from which at least one partition can fire. Relations never
    /// change after preprocessing, so one pass up front covers every level.
    fn deadlock_guard(&self, next: &[Relation]) -> Option<Ref> {
        if !self.check_deadlocks {
            return None;
        }
        let vectordom = self.domain.vectordom;
        let mut any = Ref::FALSE;
        for rel in next {
            let statedom = self.state_domain(rel);
            let local = self.tbdd.enabled(rel.bdd, rel.variables, statedom);
            let wide = self.tbdd.extend_domain(local, statedom, vectordom);
            any = self.tbdd.or(any, wide, vectordom);
        }
        Some(any)
    }

    /// The cube of a partition's current-state variables.
    fn state_domain(&self, rel: &Relation) -> Ref {
        let mut vars = Vec::new();
        let mut chain = rel.variables;
        while chain != Ref::TRUE {
            let v = self.tbdd.getvar(chain);
            if v % 2 == 0 {
                vars.push(v);
            }
            chain = self.tbdd.gethigh(chain);
        }
        self.tbdd.from_array(&vars)
    }

    fn report_deadlocks(&self, front: Ref, guard: Ref) {
        let dead = self.tbdd.diff(front, guard, self.domain.vectordom);
        if dead.is_false() {
            return;
        }
        let count = self.tbdd.satcount(dead, self.domain.vectordom);
        let example = self
            .tbdd
            .first_sat(dead, self.domain.vectordom)
            .map(|bits| format_state(self.domain, &bits))
            .unwrap_or_default();
        warn!(
            "{} deadlock states, for example {}",
            group_thousands(&count),
            example
        );
    }
}
