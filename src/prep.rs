//! Relation preprocessing: projection merging, variable set and saturation
//! domain computation, partition ordering, and domain extension / merging.

use log::info;

use crate::model::{Domain, Model};
use crate::reach;
use crate::reference::{Ref, NO_TAG, NO_VARIABLE};
use crate::tbdd::Tbdd;

/// Merges two strictly increasing projections into one (deduplicated).
pub fn merge_projections(r_proj: &[u32], w_proj: &[u32]) -> Vec<u32> {
    let mut a_proj = Vec::with_capacity(r_proj.len() + w_proj.len());
    let mut r = r_proj.iter().peekable();
    let mut w = w_proj.iter().peekable();
    loop {
        match (r.peek(), w.peek()) {
            (Some(&&x), Some(&&y)) if x < y => {
                a_proj.push(x);
                r.next();
            }
            (Some(&&x), Some(&&y)) if x > y => {
                a_proj.push(y);
                w.next();
            }
            (Some(_), Some(&&y)) => {
                a_proj.push(y);
                r.next();
                w.next();
            }
            (Some(&&x), None) => {
                a_proj.push(x);
                r.next();
            }
            (None, Some(&&y)) => {
                a_proj.push(y);
                w.next();
            }
            (None, None) => break,
        }
    }
    a_proj
}

/// The interleaved current/next variable cube of a partition touching the
/// components in `a_proj`: each included bit contributes its even variable
/// and the odd one right after it.
pub fn relation_variables(tbdd: &Tbdd, domain: &Domain, a_proj: &[u32]) -> Ref {
    let mut vars = Vec::new();
    for &component in a_proj {
        let offset = domain.component_offset(component as usize);
        for bit in 0..domain.statebits[component as usize] {
            vars.push(offset + 2 * bit);
            vars.push(offset + 2 * bit + 1);
        }
    }
    tbdd.from_array(&vars)
}

/// The tail of the state domain from the partition's first variable on.
/// The caller has already rejected partitions anchored on a next-state
/// variable.
pub fn saturation_domain(tbdd: &Tbdd, domain: &Domain, variables: Ref) -> Ref {
    let first = tbdd.getvar(variables);
    if first == NO_VARIABLE {
        // A partition over no components operates on the empty domain.
        return Ref::TRUE;
    }
    debug_assert_eq!(first % 2, 0);
    let top = first / 2;
    let vars: Vec<u32> = (top..domain.totalbits).map(|i| 2 * i).collect();
    tbdd.from_array(&vars)
}

/// Orders partitions by ascending leading variable, so that partitions
/// anchored at the same level form contiguous runs. Required by the
/// saturation and chaining strategies. The sort is stable.
pub fn sort_partitions(tbdd: &Tbdd, model: &mut Model) {
    model.next.sort_by_key(|rel| tbdd.getvar(rel.variables));
}

/// Extends a partition to a larger interleaved domain by conjoining the
/// identity `s = s'` over every state bit absent from `variables`.
pub fn extend_relation(tbdd: &Tbdd, domain: &Domain, relation: Ref, variables: Ref, totaldom: Ref) -> Ref {
    let totalbits = domain.totalbits as usize;

    // Which state bits the relation already talks about.
    let mut has = vec![false; totalbits];
    let mut s = variables;
    while s != Ref::TRUE {
        let v = tbdd.getvar(s);
        if v as usize / 2 >= totalbits {
            break; // action labels
        }
        has[v as usize / 2] = true;
        s = tbdd.gethigh(s);
    }

    // Build s = s' for the missing bits, bottom-up. For bit i the pieces are
    // two nodes on the primed variable 2i+1 (one per polarity) under a node
    // on 2i selecting between them.
    let mut eq = Ref::TRUE;
    let mut nextvar = NO_TAG;
    for i in (0..totalbits).rev() {
        if !has[i] {
            let v = 2 * i as u32;
            let low = tbdd.makenode(v + 1, eq, Ref::FALSE, nextvar);
            let high = tbdd.makenode(v + 1, Ref::FALSE, eq, nextvar);
            eq = tbdd.makenode(v, low, high, v + 1);
        }
        nextvar = 2 * i as u32;
    }

    let extended = tbdd.extend_domain(relation, variables, totaldom);
    tbdd.and(extended, eq, totaldom)
}

/// Extends every partition to the full interleaved domain and unions them
/// into a single relation.
pub fn merge_relations(tbdd: &Tbdd, model: &mut Model) {
    let vars: Vec<u32> = (0..2 * model.domain.totalbits).collect();
    let newvars = tbdd.from_array(&vars);

    info!("Extending transition relations to full domain.");
    for rel in model.next.iter_mut() {
        rel.bdd = extend_relation(tbdd, &model.domain, rel.bdd, rel.variables, newvars);
        rel.variables = newvars;
        rel.satdom = model.domain.vectordom;
    }

    info!("Taking union of all transition relations.");
    model.next[0].bdd = reach::big_union(tbdd, &model.next, 0, model.next.len());
    model.next.truncate(1);
}

/// One transition matrix row: `-`/`r`/`w`/`+` per vector component.
pub fn matrix_row(rel: &crate::model::Relation, vectorsize: usize) -> String {
    let mut row = String::with_capacity(vectorsize);
    let mut r = rel.r_proj.iter().peekable();
    let mut w = rel.w_proj.iter().peekable();
    for i in 0..vectorsize as u32 {
        let reads = r.peek() == Some(&&i);
        let writes = w.peek() == Some(&&i);
        if reads {
            r.next();
        }
        if writes {
            w.next();
        }
        row.push(match (reads, writes) {
            (false, false) => '-',
            (true, false) => 'r',
            (false, true) => 'w',
            (true, true) => '+',
        });
    }
    row
}
