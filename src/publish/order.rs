//! Publish ordering
//!
//! Depth-first topological sort with three-color marking:
//! unvisited, in the current path (gray) and done (black). Reaching a gray
//! node means a cycle.
//!
//! Only dependencies on other discovered packages matter. Roots are visited in
//! directory order, so independent packages keep their relative order.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::discovery::PackageTarget;

struct SortContext<'a> {
    /// Index of every discovered package by name
    by_name: HashMap<&'a str, usize>,
    packages: &'a [PackageTarget],
    visited: HashSet<usize>,
    in_path: HashSet<usize>,
    order: Vec<usize>,
}

/// Indices of `packages` with dependencies before their dependents
///
/// Falls back to directory order when the dependencies form a cycle.
pub fn publish_order(packages: &[PackageTarget]) -> Vec<usize> {
    let by_name = packages
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.manifest.as_ref().ok().map(|m| (m.name.as_str(), i)))
        .collect();

    let mut ctx = SortContext {
        by_name,
        packages,
        visited: HashSet::new(),
        in_path: HashSet::new(),
        order: Vec::with_capacity(packages.len()),
    };

    for index in 0..packages.len() {
        if let Err(name) = visit(&mut ctx, index) {
            warn!(
                "dependency cycle involving '{}'; publishing in directory order",
                name
            );
            return (0..packages.len()).collect();
        }
    }
    ctx.order
}

/// Post-order DFS; `Err` carries the package at which a cycle closed
fn visit(ctx: &mut SortContext<'_>, index: usize) -> Result<(), String> {
    if ctx.visited.contains(&index) {
        return Ok(());
    }
    if !ctx.in_path.insert(index) {
        return Err(ctx.packages[index].id());
    }

    if let Ok(manifest) = &ctx.packages[index].manifest {
        let mut deps: Vec<usize> = manifest
            .dependencies
            .iter()
            .filter_map(|name| ctx.by_name.get(name.as_str()).copied())
            .filter(|&dep| dep != index)
            .collect();
        deps.sort_unstable();
        for dep in deps {
            visit(ctx, dep)?;
        }
    }

    ctx.in_path.remove(&index);
    ctx.visited.insert(index);
    ctx.order.push(index);
    Ok(())
}
