//! Import cycle detection
//!
//! Tarjan's strongly connected components over the effective edge set.
//! The DFS runs on an explicit work stack so deep import chains cannot
//! overflow the thread stack. It is sequential: visitation state is shared.

use super::model::DepGraph;
use serde::Serialize;

/// A strongly connected component of size > 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cycle {
    /// Member paths, sorted
    pub files: Vec<String>,
    pub length: usize,
}

/// Find every import cycle in `graph`.
///
/// With `skip_deferred`, edges recorded as deferred imports are ignored:
/// an import inside a function body cannot fail at load time.
///
/// Entries are sorted by size descending, ties broken by member paths, so
/// identical input always produces identical output.
pub fn detect_cycles(graph: &DepGraph, skip_deferred: bool) -> Vec<Cycle> {
    let n = graph.len();
    let succ: Vec<Vec<usize>> = (0..n)
        .map(|v| graph.successors(v, skip_deferred))
        .collect();

    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut components: Vec<Vec<usize>> = Vec::new();

    for root in 0..n {
        if index[root].is_some() {
            continue;
        }

        index[root] = Some(next_index);
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;

        // (node, position of the next successor to visit)
        let mut work: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(frame) = work.last_mut() {
            let v = frame.0;
            if let Some(&w) = succ[v].get(frame.1) {
                frame.1 += 1;
                match index[w] {
                    None => {
                        index[w] = Some(next_index);
                        lowlink[w] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        work.push((w, 0));
                    }
                    Some(w_index) if on_stack[w] => {
                        lowlink[v] = lowlink[v].min(w_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            // All successors of v done
            work.pop();
            if let Some(&(parent, _)) = work.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }

            if index[v] == Some(lowlink[v]) {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                // Single nodes, self-loops included, are not cycles
                if component.len() > 1 {
                    components.push(component);
                }
            }
        }
    }

    let mut cycles: Vec<Cycle> = components
        .into_iter()
        .map(|members| {
            let mut files: Vec<String> = members
                .into_iter()
                .map(|idx| graph.node_at(idx).path.clone())
                .collect();
            files.sort();
            Cycle {
                length: files.len(),
                files,
            }
        })
        .collect();

    cycles.sort_by(|a, b| b.length.cmp(&a.length).then_with(|| a.files.cmp(&b.files)));
    cycles
}
