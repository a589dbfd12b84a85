//! Dependency resolution across a set of discovered plugins.
//!
//! Produces a load order by depth-first post-order traversal: a plugin is
//! appended to the order only after every plugin it depends on (required or
//! optional-if-present) has been appended. This is a deliberate departure
//! from a breadth-first topological-layer sort — the two produce different
//! orderings when a plugin has multiple dependency paths of different
//! lengths, and callers rely on the exact post-order shape (a dependency
//! always immediately precedes the earliest of its dependents in the
//! returned order, not merely "somewhere before it").

use crate::error::{DependencyError, DependencyResult};
use crate::metadata::ModuleMetadata;
use std::collections::{HashMap, HashSet};

/// Resolves a load order across `plugins`, keyed by plugin name.
///
/// `already_loaded` names plugins considered already present (e.g. from a
/// prior preload pass) — they satisfy dependencies but are never themselves
/// included in the returned order.
pub fn resolve_dependencies(
    plugins: &HashMap<String, ModuleMetadata>,
    already_loaded: &HashSet<String>,
) -> DependencyResult<Vec<String>> {
    // Required dependencies must be present somewhere (either already
    // loaded, or among the plugins being resolved).
    for (name, metadata) in plugins {
        for dependency in &metadata.depends_on {
            if !plugins.contains_key(dependency) && !already_loaded.contains(dependency) {
                return Err(DependencyError::MissingDependency {
                    dependency: dependency.clone(),
                    required_by: name.clone(),
                });
            }
        }
    }

    let mut order = Vec::new();
    let mut visited = HashSet::new();

    let mut names: Vec<&String> = plugins.keys().collect();
    names.sort();
    for name in names {
        if !order.contains(name) {
            walk(name, plugins, already_loaded, &mut order, &mut visited)?;
        }
    }

    Ok(order)
}

fn walk(
    name: &str,
    plugins: &HashMap<String, ModuleMetadata>,
    already_loaded: &HashSet<String>,
    order: &mut Vec<String>,
    visited: &mut HashSet<String>,
) -> DependencyResult<()> {
    let metadata = match plugins.get(name) {
        Some(metadata) => metadata,
        // Already loaded elsewhere; nothing to walk or append.
        None => return Ok(()),
    };

    let mut dependencies: Vec<String> = metadata.depends_on.clone();
    for optional in &metadata.init_after {
        if plugins.contains_key(optional) {
            dependencies.push(optional.clone());
        }
    }

    visited.insert(name.to_string());
    for dependency in &dependencies {
        if already_loaded.contains(dependency) || order.contains(dependency) {
            continue;
        }
        if visited.contains(dependency) {
            return Err(DependencyError::CircularDependency(
                dependency.clone(),
                name.to_string(),
            ));
        }
        walk(dependency, plugins, already_loaded, order, visited)?;
    }

    order.push(name.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(depends_on: &[&str]) -> ModuleMetadata {
        ModuleMetadata {
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn orders_dependency_before_dependent() {
        let mut plugins = HashMap::new();
        plugins.insert("auth".to_string(), meta(&[]));
        plugins.insert("billing".to_string(), meta(&["auth"]));

        let order = resolve_dependencies(&plugins, &HashSet::new()).unwrap();
        let auth_pos = order.iter().position(|n| n == "auth").unwrap();
        let billing_pos = order.iter().position(|n| n == "billing").unwrap();
        assert!(auth_pos < billing_pos);
    }

    #[test]
    fn detects_missing_required_dependency() {
        let mut plugins = HashMap::new();
        plugins.insert("billing".to_string(), meta(&["auth"]));

        let err = resolve_dependencies(&plugins, &HashSet::new()).unwrap_err();
        assert!(matches!(err, DependencyError::MissingDependency { .. }));
    }

    #[test]
    fn detects_circular_dependency() {
        let mut plugins = HashMap::new();
        plugins.insert("a".to_string(), meta(&["b"]));
        plugins.insert("b".to_string(), meta(&["a"]));

        let err = resolve_dependencies(&plugins, &HashSet::new()).unwrap_err();
        assert!(matches!(err, DependencyError::CircularDependency(_, _)));
    }

    #[test]
    fn optional_dependency_is_ordered_when_present_but_not_required() {
        let mut plugins = HashMap::new();
        plugins.insert("telemetry".to_string(), meta(&[]));
        let mut demo = meta(&[]);
        demo.init_after = vec!["telemetry".to_string()];
        plugins.insert("demo".to_string(), demo);

        let order = resolve_dependencies(&plugins, &HashSet::new()).unwrap();
        let telemetry_pos = order.iter().position(|n| n == "telemetry").unwrap();
        let demo_pos = order.iter().position(|n| n == "demo").unwrap();
        assert!(telemetry_pos < demo_pos);
    }

    #[test]
    fn missing_optional_dependency_is_not_an_error() {
        let mut plugins = HashMap::new();
        let mut demo = meta(&[]);
        demo.init_after = vec!["absent".to_string()];
        plugins.insert("demo".to_string(), demo);

        let order = resolve_dependencies(&plugins, &HashSet::new()).unwrap();
        assert_eq!(order, vec!["demo".to_string()]);
    }

    #[test]
    fn already_loaded_satisfies_required_dependency() {
        let mut plugins = HashMap::new();
        plugins.insert("billing".to_string(), meta(&["auth"]));
        let mut already_loaded = HashSet::new();
        already_loaded.insert("auth".to_string());

        let order = resolve_dependencies(&plugins, &already_loaded).unwrap();
        assert_eq!(order, vec!["billing".to_string()]);
    }
}
