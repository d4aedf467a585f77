//! The binary model format: domain metadata, the initial state set, and the
//! partitioned transition relation.
//!
//! Layout (all integers little-endian `i32`, diagrams as [`crate::io`]
//! blobs):
//!
//! ```text
//! i32  vectorsize
//! i32  statebits[vectorsize]
//! i32  actionbits
//! i32  k                      # -1 = full vector, else projection length
//! i32  proj[k]                # only if k != -1
//! TBDD initial_states
//! i32  next_count
//! next_count * (i32 r_k, i32 w_k, i32 r_proj[r_k], i32 w_proj[w_k])
//! next_count * TBDD relation
//! ```
//!
//! Anything after the last relation (stored reachable sets, action labels) is
//! ignored. Errors never recover: the caller reports them and exits nonzero.

use std::io::{Read, Write};

use log::debug;
use thiserror::Error;

use crate::io::{read_tbdd, write_tbdd};
use crate::prep;
use crate::reference::Ref;
use crate::tbdd::Tbdd;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid input file: {0}")]
    Format(String),
}

/// Process-wide state vector layout. Created once at load, immutable after.
///
/// Bit `j` of vector component `i` is encoded by the *even* variable
/// `2 * (offset_i + j)`; the matching odd variable holds the next-state copy.
/// Bits within a component are most-significant first.
#[derive(Debug)]
pub struct Domain {
    pub vectorsize: usize,
    pub statebits: Vec<u32>,
    pub actionbits: u32,
    pub totalbits: u32,
    /// Cube of all current-state variables `{0, 2, ..., 2*(totalbits-1)}`.
    pub vectordom: Ref,
}

impl Domain {
    pub fn new(tbdd: &Tbdd, statebits: Vec<u32>, actionbits: u32) -> Self {
        let totalbits: u32 = statebits.iter().sum();
        let vars: Vec<u32> = (0..totalbits).map(|i| 2 * i).collect();
        Self {
            vectorsize: statebits.len(),
            statebits,
            actionbits,
            totalbits,
            vectordom: tbdd.from_array(&vars),
        }
    }

    /// First variable of vector component `i`.
    pub fn component_offset(&self, i: usize) -> u32 {
        2 * self.statebits[..i].iter().sum::<u32>()
    }
}

/// A set of states: the characteristic function plus the variable cube that
/// counting and enumeration run over.
#[derive(Debug)]
pub struct Set {
    pub bdd: Ref,
    pub variables: Ref,
}

/// One partition of the transition relation.
#[derive(Debug)]
pub struct Relation {
    pub bdd: Ref,
    /// All interleaved current/next variables this partition reads or writes.
    pub variables: Ref,
    pub r_proj: Vec<u32>,
    pub w_proj: Vec<u32>,
    /// Tail of the state domain from this partition's first variable on; the
    /// domain that keeps saturation-local operations local.
    pub satdom: Ref,
}

#[derive(Debug)]
pub struct Model {
    pub domain: Domain,
    pub initial: Set,
    pub next: Vec<Relation>,
}

fn read_i32<R: Read>(r: &mut R) -> Result<i32, ModelError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_len<R: Read>(r: &mut R, what: &str) -> Result<usize, ModelError> {
    let n = read_i32(r)?;
    if n < 0 {
        return Err(ModelError::Format(format!("negative {} ({})", what, n)));
    }
    Ok(n as usize)
}

fn read_proj<R: Read>(r: &mut R, len: usize, vectorsize: usize, what: &str) -> Result<Vec<u32>, ModelError> {
    let mut proj = Vec::with_capacity(len);
    for _ in 0..len {
        let v = read_i32(r)?;
        if v < 0 || v as usize >= vectorsize {
            return Err(ModelError::Format(format!("{} index {} out of range", what, v)));
        }
        proj.push(v as u32);
    }
    if !proj.windows(2).all(|w| w[0] < w[1]) {
        return Err(ModelError::Format(format!("{} is not strictly increasing", what)));
    }
    Ok(proj)
}

/// Checks that a diagram only mentions variables (and tags) of its declared
/// cube. A diagram outside its cube would silently corrupt image
/// computations, so this is rejected at load time.
fn validate_support(tbdd: &Tbdd, bdd: Ref, variables: Ref, what: &str) -> Result<(), ModelError> {
    let mut allowed = hashbrown::HashSet::new();
    let mut chain = variables;
    while chain != Ref::TRUE {
        allowed.insert(tbdd.getvar(chain));
        chain = tbdd.gethigh(chain);
    }

    let mut seen = hashbrown::HashSet::new();
    let mut stack = vec![bdd];
    while let Some(e) = stack.pop() {
        if e.tag() != crate::reference::NO_TAG && !allowed.contains(&e.tag()) {
            return Err(ModelError::Format(format!("{} has tag {} outside its domain", what, e.tag())));
        }
        if e.is_leaf() || !seen.insert(e.index()) {
            continue;
        }
        let node = tbdd.node(e);
        if !allowed.contains(&node.variable) {
            return Err(ModelError::Format(format!(
                "{} has variable {} outside its domain",
                what, node.variable
            )));
        }
        stack.push(node.low);
        stack.push(node.high);
    }
    Ok(())
}

fn load_set<R: Read>(tbdd: &Tbdd, domain: &Domain, r: &mut R) -> Result<Set, ModelError> {
    let k = read_i32(r)?;
    let variables = if k == -1 {
        domain.vectordom
    } else {
        if k < 0 {
            return Err(ModelError::Format(format!("invalid projection size {}", k)));
        }
        let proj = read_proj(r, k as usize, domain.vectorsize, "initial-set projection")?;
        let mut vars = Vec::new();
        for &component in &proj {
            let offset = domain.component_offset(component as usize);
            for bit in 0..domain.statebits[component as usize] {
                vars.push(offset + 2 * bit);
            }
        }
        tbdd.from_array(&vars)
    };
    let bdd = read_tbdd(tbdd, r)?;
    validate_support(tbdd, bdd, variables, "initial set")?;
    Ok(Set { bdd, variables })
}

fn load_relation_proj<R: Read>(tbdd: &Tbdd, domain: &Domain, r: &mut R) -> Result<Relation, ModelError> {
    let r_k = read_len(r, "read projection size")?;
    let w_k = read_len(r, "write projection size")?;
    let r_proj = read_proj(r, r_k, domain.vectorsize, "read projection")?;
    let w_proj = read_proj(r, w_k, domain.vectorsize, "write projection")?;

    let a_proj = prep::merge_projections(&r_proj, &w_proj);
    let variables = prep::relation_variables(tbdd, domain, &a_proj);
    let first = tbdd.getvar(variables);
    if first != crate::reference::NO_VARIABLE && first % 2 != 0 {
        return Err(ModelError::Format(format!(
            "relation leading variable {} is not a current-state variable",
            first
        )));
    }
    let satdom = prep::saturation_domain(tbdd, domain, variables);

    Ok(Relation {
        bdd: Ref::FALSE,
        variables,
        r_proj,
        w_proj,
        satdom,
    })
}

/// Loads a complete model. Projection metadata for all partitions comes
/// before any relation diagram, mirroring the order producers write them in.
pub fn load_model<R: Read>(tbdd: &Tbdd, r: &mut R) -> Result<Model, ModelError> {
    let vectorsize = read_len(r, "vector size")?;
    if vectorsize == 0 {
        return Err(ModelError::Format("empty state vector".into()));
    }
    let mut statebits = Vec::with_capacity(vectorsize);
    for _ in 0..vectorsize {
        let bits = read_i32(r)?;
        if !(1..=32).contains(&bits) {
            return Err(ModelError::Format(format!("component width {} out of range", bits)));
        }
        statebits.push(bits as u32);
    }
    let actionbits = read_len(r, "action bits")? as u32;

    let totalbits: u32 = statebits.iter().sum();
    if 2 * totalbits >= crate::reference::NO_VARIABLE {
        return Err(ModelError::Format(format!("state vector of {} bits does not fit the variable space", totalbits)));
    }

    let domain = Domain::new(tbdd, statebits, actionbits);
    debug!(
        "domain: {} components, {} bits, {} action bits",
        domain.vectorsize, domain.totalbits, domain.actionbits
    );

    let initial = load_set(tbdd, &domain, r)?;

    let next_count = read_len(r, "partition count")?;
    let mut next = Vec::with_capacity(next_count);
    for _ in 0..next_count {
        next.push(load_relation_proj(tbdd, &domain, r)?);
    }
    for (i, rel) in next.iter_mut().enumerate() {
        rel.bdd = read_tbdd(tbdd, r)?;
        validate_support(tbdd, rel.bdd, rel.variables, &format!("relation {}", i))?;
    }

    Ok(Model { domain, initial, next })
}

/// Everything a producer needs to emit one partition.
pub struct RelationSpec {
    pub r_proj: Vec<u32>,
    pub w_proj: Vec<u32>,
    pub bdd: Ref,
}

fn write_i32<W: Write>(w: &mut W, v: i32) -> Result<(), ModelError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Writes a model in the binary format [`load_model`] consumes.
pub fn write_model<W: Write>(
    tbdd: &Tbdd,
    statebits: &[u32],
    actionbits: u32,
    initial_proj: Option<&[u32]>,
    initial: Ref,
    relations: &[RelationSpec],
    w: &mut W,
) -> Result<(), ModelError> {
    write_i32(w, statebits.len() as i32)?;
    for &bits in statebits {
        write_i32(w, bits as i32)?;
    }
    write_i32(w, actionbits as i32)?;

    match initial_proj {
        None => write_i32(w, -1)?,
        Some(proj) => {
            write_i32(w, proj.len() as i32)?;
            for &component in proj {
                write_i32(w, component as i32)?;
            }
        }
    }
    write_tbdd(tbdd, initial, w)?;

    write_i32(w, relations.len() as i32)?;
    for rel in relations {
        write_i32(w, rel.r_proj.len() as i32)?;
        write_i32(w, rel.w_proj.len() as i32)?;
        for &c in &rel.r_proj {
            write_i32(w, c as i32)?;
        }
        for &c in &rel.w_proj {
            write_i32(w, c as i32)?;
        }
    }
    for rel in relations {
        write_tbdd(tbdd, rel.bdd, w)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_short_read_is_an_error() {
        let tbdd = Tbdd::default();
        let bytes = 2i32.to_le_bytes().to_vec();
        let err = load_model(&tbdd, &mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ModelError::Io(_)));
    }

    #[test]
    fn test_bad_component_width() {
        let tbdd = Tbdd::default();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&99i32.to_le_bytes());
        let err = load_model(&tbdd, &mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ModelError::Format(_)));
    }

    #[test]
    fn test_roundtrip_minimal() {
        let tbdd = Tbdd::default();
        // One 2-bit component, initial state {0}, no relations.
        let initial = Ref::TRUE.with_tag(0);
        let mut bytes = Vec::new();
        write_model(&tbdd, &[2], 0, None, initial, &[], &mut bytes).unwrap();

        let model = load_model(&tbdd, &mut Cursor::new(bytes)).unwrap();
        assert_eq!(model.domain.vectorsize, 1);
        assert_eq!(model.domain.totalbits, 2);
        assert_eq!(model.initial.bdd, initial);
        assert_eq!(model.initial.variables, model.domain.vectordom);
        assert!(model.next.is_empty());
    }

    #[test]
    fn test_projected_initial_variables() {
        let tbdd = Tbdd::default();
        // Three components of 2/1/3 bits; project the initial set onto
        // components 0 and 2.
        let initial = Ref::TRUE.with_tag(0);
        let mut bytes = Vec::new();
        write_model(&tbdd, &[2, 1, 3], 0, Some(&[0, 2]), initial, &[], &mut bytes).unwrap();

        let model = load_model(&tbdd, &mut Cursor::new(bytes)).unwrap();
        // Bits of component 0 are variables 0,2; component 2 starts after
        // 2+1 bits, so its variables are 6,8,10.
        let mut vars = Vec::new();
        let mut chain = model.initial.variables;
        while chain != Ref::TRUE {
            vars.push(tbdd.getvar(chain));
            chain = tbdd.gethigh(chain);
        }
        assert_eq!(vars, vec![0, 2, 6, 8, 10]);
    }

    #[test]
    fn test_unsorted_projection_rejected() {
        let tbdd = Tbdd::default();
        let initial = Ref::TRUE.with_tag(0);
        let mut bytes = Vec::new();
        write_model(&tbdd, &[1, 1], 0, Some(&[1, 0]), initial, &[], &mut bytes).unwrap();
        let err = load_model(&tbdd, &mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ModelError::Format(_)));
    }
}
