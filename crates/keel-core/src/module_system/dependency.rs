//! Dependency-respecting module ordering.
//!
//! A depth-first post-order walk: every loaded dependency of a module is
//! emitted before the module itself. Each node is marked `Visiting` while its
//! dependencies are explored and `Done` afterwards, so meeting a `Visiting`
//! node again is a back-edge and the walk fails with the cycle path.
use std::collections::HashMap;

use crate::module_system::error::ModuleSystemError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Order `names` so that dependencies come first.
///
/// `names` fixes the tie-break order (load order in the kernel). Dependencies
/// missing from `names` are skipped. Shutdown order is the reverse.
pub fn sort_by_dependencies(
    names: &[String],
    dependencies: &HashMap<String, Vec<String>>,
) -> Result<Vec<String>, ModuleSystemError> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut path: Vec<&str> = Vec::new();
    let mut sorted = Vec::with_capacity(names.len());

    for name in names {
        visit(name, names, dependencies, &mut marks, &mut path, &mut sorted)?;
    }

    log::debug!("Module order: {}", sorted.join(", "));
    Ok(sorted)
}

fn visit<'a>(
    name: &'a str,
    names: &'a [String],
    dependencies: &'a HashMap<String, Vec<String>>,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
    sorted: &mut Vec<String>,
) -> Result<(), ModuleSystemError> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|n| *n == name).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(name.to_string());
            return Err(ModuleSystemError::CyclicDependency { cycle });
        }
        None => {}
    }

    marks.insert(name, Mark::Visiting);
    path.push(name);

    if let Some(deps) = dependencies.get(name) {
        for dep in deps {
            if !names.iter().any(|n| n == dep) {
                log::debug!("Ignoring dependency '{}' of '{}': not loaded", dep, name);
                continue;
            }
            visit(dep, names, dependencies, marks, path, sorted)?;
        }
    }

    path.pop();
    marks.insert(name, Mark::Done);
    sorted.push(name.to_string());
    Ok(())
}
