//! Dependency graph analysis: cycle detection and execution ordering.

use std::collections::{HashMap, HashSet};

use crate::item::WorkList;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    OnStack,
    Done,
}

/// Find a dependency cycle, if any.
///
/// Traversal is depth-first with an explicit stack (no recursion-depth limit)
/// and starts from every item in turn, so disconnected components are covered.
/// The returned path runs from the first occurrence of the repeated id to the
/// repeat inclusive, e.g. `[A, B, A]`; a self-dependency yields `[A, A]`.
/// Dependency ids that do not exist in the collection are ignored here (they
/// are reported separately as dangling-reference warnings).
pub fn find_cycle(list: &WorkList) -> Option<Vec<String>> {
    let index: HashMap<&str, usize> = list
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| (item.id.as_str(), i))
        .collect();
    let mut state = vec![VisitState::Unvisited; list.items.len()];

    for start in 0..list.items.len() {
        if state[start] != VisitState::Unvisited {
            continue;
        }
        // Each frame is (item index, cursor into its dependency list).
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        state[start] = VisitState::OnStack;

        while let Some(&(node, cursor)) = stack.last() {
            let deps = &list.items[node].dependencies;
            let mut cursor = cursor;
            let mut descended = false;

            while cursor < deps.len() {
                let dep = deps[cursor].as_str();
                cursor += 1;
                let Some(&child) = index.get(dep) else {
                    continue;
                };
                match state[child] {
                    VisitState::OnStack => {
                        let pos = stack
                            .iter()
                            .position(|&(n, _)| n == child)
                            .unwrap_or(0);
                        let mut path: Vec<String> = stack[pos..]
                            .iter()
                            .map(|&(n, _)| list.items[n].id.clone())
                            .collect();
                        path.push(list.items[child].id.clone());
                        return Some(path);
                    }
                    VisitState::Unvisited => {
                        if let Some(top) = stack.last_mut() {
                            top.1 = cursor;
                        }
                        state[child] = VisitState::OnStack;
                        stack.push((child, 0));
                        descended = true;
                        break;
                    }
                    VisitState::Done => {}
                }
            }

            if !descended {
                state[node] = VisitState::Done;
                stack.pop();
            }
        }
    }

    None
}

/// Compute a dependency-respecting execution order over all item ids.
///
/// Kahn-style waves: repeatedly collect every item whose dependencies are all
/// placed, stable-sort the wave by ascending effective priority (collection
/// order breaks ties), and append it. Priority therefore only reorders items
/// that became ready in the same wave; it never lifts an item past an unmet
/// dependency. Dependency ids not present in the collection do not gate
/// ordering (selection still refuses such items until the reference
/// resolves).
///
/// If a cycle survives validation, the items it strands are appended at the
/// end in collection order rather than dropped.
pub fn execution_order(list: &WorkList) -> Vec<String> {
    let known: HashSet<&str> = list.items.iter().map(|item| item.id.as_str()).collect();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut ordered: Vec<String> = Vec::with_capacity(list.items.len());
    let mut remaining: Vec<usize> = (0..list.items.len()).collect();

    loop {
        let wave: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&i| {
                list.items[i].dependencies.iter().all(|dep| {
                    placed.contains(dep.as_str()) || !known.contains(dep.as_str())
                })
            })
            .collect();
        if wave.is_empty() {
            break;
        }

        let mut wave = wave;
        wave.sort_by_key(|&i| list.items[i].effective_priority());
        for &i in &wave {
            placed.insert(list.items[i].id.as_str());
            ordered.push(list.items[i].id.clone());
        }

        let in_wave: HashSet<usize> = wave.into_iter().collect();
        remaining.retain(|i| !in_wave.contains(i));
        if remaining.is_empty() {
            break;
        }
    }

    // Defensive: never silently drop items stranded by a cycle.
    for i in remaining {
        ordered.push(list.items[i].id.clone());
    }

    ordered
}
