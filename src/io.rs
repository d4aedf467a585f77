//! Binary serialization of single TBDDs.
//!
//! Blob layout (little-endian):
//!
//! ```text
//! u64 count                       # number of node records
//! count * (u32 var, u64 low, u64 high)
//! u64 root                        # edge referring to the records above
//! ```
//!
//! Edges inside a blob use *local* ids: 0 = FALSE, 1 = TRUE, `k >= 2` refers
//! to record `k - 2`. Children precede their parents, so a single forward
//! pass can rebuild the diagram through the unique table. Tags travel in
//! bits 32..52 of each edge, exactly as in the in-memory handle.

use std::io::{Read, Write};

use hashbrown::HashMap;

use crate::model::ModelError;
use crate::reference::{Ref, NO_TAG, NO_VARIABLE};
use crate::tbdd::Tbdd;

fn local_raw(e: Ref, ids: &HashMap<u32, u64>) -> u64 {
    let local = match e.index() {
        Ref::FALSE_INDEX => 0,
        Ref::TRUE_INDEX => 1,
        index => ids[&index],
    };
    ((e.tag() as u64) << 32) | local
}

/// Writes one TBDD as a self-contained blob.
pub fn write_tbdd<W: Write>(tbdd: &Tbdd, root: Ref, w: &mut W) -> Result<(), ModelError> {
    // Children-first order over the distinct nodes under the root.
    let mut order = Vec::new();
    let mut seen = HashMap::new();
    let mut stack = vec![(root, false)];
    while let Some((e, expanded)) = stack.pop() {
        if e.is_leaf() {
            continue;
        }
        if expanded {
            let next = 2 + order.len() as u64;
            if seen.insert(e.index(), next).is_none() {
                order.push(e.index());
            }
            continue;
        }
        if seen.contains_key(&e.index()) {
            continue;
        }
        let node = tbdd.node(e);
        stack.push((e, true));
        stack.push((node.low, false));
        stack.push((node.high, false));
    }

    w.write_all(&(order.len() as u64).to_le_bytes())?;
    for &index in &order {
        let node = tbdd.node(Ref::new(index, NO_TAG));
        w.write_all(&node.variable.to_le_bytes())?;
        w.write_all(&local_raw(node.low, &seen).to_le_bytes())?;
        w.write_all(&local_raw(node.high, &seen).to_le_bytes())?;
    }
    w.write_all(&local_raw(root, &seen).to_le_bytes())?;
    Ok(())
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, ModelError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(r: &mut R) -> Result<u64, ModelError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn resolve(raw: u64, built: &[Ref]) -> Result<Ref, ModelError> {
    let tag = (raw >> 32) as u32;
    if tag > NO_TAG {
        return Err(ModelError::Format(format!("edge tag {:#x} out of range", tag)));
    }
    let local = raw as u32;
    let e = match local {
        0 => Ref::FALSE,
        1 => Ref::TRUE,
        k => *built
            .get(k as usize - 2)
            .ok_or_else(|| ModelError::Format(format!("forward edge to record {}", k)))?,
    };
    Ok(e.with_tag(tag))
}

/// Reads one TBDD blob, re-canonicalizing every node through the unique
/// table of `tbdd`.
pub fn read_tbdd<R: Read>(tbdd: &Tbdd, r: &mut R) -> Result<Ref, ModelError> {
    let count = read_u64(r)?;
    let mut built: Vec<Ref> = Vec::with_capacity(count.min(1 << 24) as usize);
    for _ in 0..count {
        let variable = read_u32(r)?;
        if variable >= NO_VARIABLE {
            return Err(ModelError::Format(format!("node variable {:#x} out of range", variable)));
        }
        let low = resolve(read_u64(r)?, &built)?;
        let high = resolve(read_u64(r)?, &built)?;
        if low.tag() <= variable || high.tag() <= variable {
            return Err(ModelError::Format(format!(
                "child tag below node variable {}",
                variable
            )));
        }
        built.push(tbdd.rebuild(variable, low, high));
    }
    let root = resolve(read_u64(r)?, &built)?;
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(tbdd: &Tbdd, vars: &[u32], bits: &[u8]) -> Ref {
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
    fn test_roundtrip_identity() {
        let tbdd = Tbdd::default();
        let vars: Vec<u32> = (0..4).map(|i| 2 * i).collect();
        let dom = tbdd.from_array(&vars);
        let a = cube(&tbdd, &vars, &[0, 1, 1, 0]);
        let b = cube(&tbdd, &vars, &[1, 0, 0, 1]);
        let set = tbdd.or(a, b, dom);

        let mut blob = Vec::new();
        write_tbdd(&tbdd, set, &mut blob).unwrap();
        let back = read_tbdd(&tbdd, &mut blob.as_slice()).unwrap();
        // Same manager: the unique table makes round-tripping the identity.
        assert_eq!(back, set);
    }

    #[test]
    fn test_roundtrip_terminals() {
        let tbdd = Tbdd::default();
        for e in [Ref::FALSE, Ref::TRUE, Ref::TRUE.with_tag(4)] {
            let mut blob = Vec::new();
            write_tbdd(&tbdd, e, &mut blob).unwrap();
            assert_eq!(read_tbdd(&tbdd, &mut blob.as_slice()).unwrap(), e);
        }
    }

    #[test]
    fn test_roundtrip_fresh_manager() {
        let tbdd = Tbdd::default();
        let vars: Vec<u32> = (0..3).map(|i| 2 * i).collect();
        let dom = tbdd.from_array(&vars);
        let a = cube(&tbdd, &vars, &[0, 0, 1]);
        let b = cube(&tbdd, &vars, &[1, 1, 0]);
        let set = tbdd.or(a, b, dom);

        let mut blob = Vec::new();
        write_tbdd(&tbdd, set, &mut blob).unwrap();

        let other = Tbdd::default();
        let back = read_tbdd(&other, &mut blob.as_slice()).unwrap();
        let dom2 = other.from_array(&vars);
        assert_eq!(other.satcount(back, dom2), tbdd.satcount(set, dom));
        assert_eq!(other.first_sat(back, dom2), tbdd.first_sat(set, dom));
    }

    #[test]
    fn test_truncated_blob() {
        let tbdd = Tbdd::default();
        let vars: Vec<u32> = vec![0, 2];
        let set = cube(&tbdd, &vars, &[1, 1]);
        let mut blob = Vec::new();
        write_tbdd(&tbdd, set, &mut blob).unwrap();
        blob.truncate(blob.len() - 3);
        assert!(read_tbdd(&tbdd, &mut blob.as_slice()).is_err());
    }

    #[test]
    fn test_forward_edge_rejected() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&1u64.to_le_bytes());
        blob.extend_from_slice(&0u32.to_le_bytes());
        // Low child points at a record that does not exist yet.
        blob.extend_from_slice(&(((NO_TAG as u64) << 32) | 5).to_le_bytes());
        blob.extend_from_slice(&(((NO_TAG as u64) << 32) | 1).to_le_bytes());
        blob.extend_from_slice(&(((NO_TAG as u64) << 32) | 2).to_le_bytes());
        let tbdd = Tbdd::default();
        assert!(read_tbdd(&tbdd, &mut blob.as_slice()).is_err());
    }
}
