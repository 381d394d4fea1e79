//! Register-group reference graph.
//!
//! Subgroup members reference other groups of the same peripheral by name.
//! [`GroupGraph::build`] resolves every reference, collapses wrapper groups,
//! rejects cycles, and fixes the order in which layouts are computed so a
//! group is always laid out after the groups it embeds.

use std::collections::{HashMap, HashSet};

use devmap_core::{RegisterGroup, RegisterMember};

use crate::error::LayoutError;

/// Resolved subgroup references of one peripheral.
#[derive(Debug, Clone)]
pub struct GroupGraph<'a> {
    groups: Vec<&'a RegisterGroup>,
    index: HashMap<&'a str, usize>,
    /// Wrapper group name to the group it ultimately stands for.
    wrappers: HashMap<&'a str, &'a str>,
    /// Non-wrapper groups, embedded groups first.
    order: Vec<&'a str>,
}

/// A group whose only member is a single, non-array subgroup at offset 0.
fn wrapped_target(group: &RegisterGroup) -> Option<&str> {
    match group.members.as_slice() {
        [RegisterMember::Subgroup(s)] if s.offset == 0 && s.count <= 1 && group.modes.is_empty() => {
            Some(s.group.as_str())
        }
        _ => None,
    }
}

impl<'a> GroupGraph<'a> {
    pub fn build(groups: &'a [RegisterGroup]) -> Result<Self, Vec<LayoutError>> {
        let mut errors = Vec::new();

        let mut index = HashMap::new();
        for (i, group) in groups.iter().enumerate() {
            if index.contains_key(group.name.as_str()) {
                log::warn!("duplicate register group {}; keeping the first", group.name);
                continue;
            }
            index.insert(group.name.as_str(), i);
        }

        for group in groups {
            for member in &group.members {
                if let RegisterMember::Subgroup(s) = member {
                    if !index.contains_key(s.group.as_str()) {
                        errors.push(LayoutError::UnknownGroupReference {
                            group: group.name.clone(),
                            member: s.name.clone(),
                            target: s.group.clone(),
                        });
                    }
                }
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut graph = Self {
            groups: groups.iter().collect(),
            index,
            wrappers: HashMap::new(),
            order: Vec::new(),
        };

        for group in groups {
            if wrapped_target(group).is_none() {
                continue;
            }
            match graph.follow_wrappers(&group.name) {
                Ok(target) => {
                    log::debug!("register group {} wraps {}", group.name, target);
                    graph.wrappers.insert(group.name.as_str(), target);
                }
                Err(e) => errors.push(e),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        for group in groups {
            if graph.wrappers.contains_key(group.name.as_str()) {
                continue;
            }
            if let Err(e) = graph.visit(&group.name, &mut visited, &mut stack) {
                errors.push(e);
                break;
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(graph)
    }

    fn follow_wrappers(&self, start: &'a str) -> Result<&'a str, LayoutError> {
        let mut path = vec![start.to_string()];
        let mut current = start;
        while let Some(next) = self.get(current).and_then(wrapped_target) {
            if path.iter().any(|p| p == next) {
                path.push(next.to_string());
                return Err(LayoutError::CyclicGroupReference { path });
            }
            path.push(next.to_string());
            current = self.get(next).map(|g| g.name.as_str()).unwrap_or(next);
        }
        Ok(current)
    }

    /// Depth-first visit that appends `name` after everything it embeds.
    fn visit(
        &mut self,
        name: &'a str,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
    ) -> Result<(), LayoutError> {
        if let Some(pos) = stack.iter().position(|n| *n == name) {
            let mut path: Vec<String> = stack[pos..].iter().map(|n| n.to_string()).collect();
            path.push(name.to_string());
            return Err(LayoutError::CyclicGroupReference { path });
        }
        if visited.contains(name) {
            return Ok(());
        }

        visited.insert(name);
        stack.push(name);
        for target in self.embedded(name) {
            self.visit(target, visited, stack)?;
        }
        stack.pop();
        self.order.push(name);
        Ok(())
    }

    /// Resolved targets of the subgroup members of `name`.
    fn embedded(&self, name: &str) -> Vec<&'a str> {
        let Some(group) = self.get(name) else {
            return Vec::new();
        };
        group
            .members
            .iter()
            .filter_map(|m| match m {
                RegisterMember::Subgroup(s) => self.resolve(&s.group).map(|g| g.name.as_str()),
                RegisterMember::Register(_) => None,
            })
            .collect()
    }

    /// Look up a group by name without following wrappers.
    pub fn get(&self, name: &str) -> Option<&'a RegisterGroup> {
        self.index.get(name).map(|&i| self.groups[i])
    }

    /// Look up a group by name, following wrappers to the real group.
    pub fn resolve(&self, name: &str) -> Option<&'a RegisterGroup> {
        let target = self.wrappers.get(name).copied().unwrap_or(name);
        self.get(target)
    }

    pub fn is_wrapper(&self, name: &str) -> bool {
        self.wrappers.contains_key(name)
    }

    /// Groups that get their own layout, embedded groups first.
    pub fn layout_order(&self) -> impl Iterator<Item = &'a RegisterGroup> + '_ {
        self.order.iter().filter_map(|name| self.get(name))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
