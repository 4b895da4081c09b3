//! Dependency graph derived from deferred references between steps

use crate::core::error::{PipelineError, Result};
use crate::core::step::StepDescriptor;
use std::collections::{BTreeSet, HashMap};

/// Directed graph over steps: an edge `a -> b` means `b` consumes an output of `a`
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Step names in declaration order; indices below refer to this list
    names: Vec<String>,
    index: HashMap<String, usize>,
    dependencies: Vec<BTreeSet<usize>>,
    dependents: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    /// Build the graph by scanning every step's inputs for deferred references
    pub fn build(steps: &[StepDescriptor]) -> Result<Self> {
        let names: Vec<String> = steps.iter().map(|s| s.name.clone()).collect();
        let index: HashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let mut dependencies = vec![BTreeSet::new(); steps.len()];
        let mut dependents = vec![BTreeSet::new(); steps.len()];

        for (to, step) in steps.iter().enumerate() {
            for source in step.upstream_steps() {
                let from = *index.get(source).ok_or_else(|| PipelineError::UnknownStep {
                    step: step.name.clone(),
                    source_step: source.to_string(),
                })?;
                dependencies[to].insert(from);
                dependents[from].insert(to);
            }
        }

        Ok(Self {
            names,
            index,
            dependencies,
            dependents,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, step: &str) -> bool {
        self.index.contains_key(step)
    }

    /// Compute a topological order
    ///
    /// Repeatedly takes the zero-indegree step declared earliest, so the
    /// result only depends on the definition.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut indegree: Vec<usize> = self.dependencies.iter().map(BTreeSet::len).collect();
        let mut ready: BTreeSet<usize> = indegree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(self.names.len());

        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &dependent in &self.dependents[next] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < self.names.len() {
            let remaining: BTreeSet<usize> = indegree
                .iter()
                .enumerate()
                .filter(|(_, d)| **d > 0)
                .map(|(i, _)| i)
                .collect();
            let member = self.cycle_member(&remaining);
            return Err(PipelineError::CyclicDependency {
                step: self.names[member].clone(),
            });
        }

        Ok(order.into_iter().map(|i| self.names[i].clone()).collect())
    }

    /// First step (in declaration order) among `remaining` that can reach itself
    fn cycle_member(&self, remaining: &BTreeSet<usize>) -> usize {
        for &start in remaining {
            let mut stack: Vec<usize> = self.dependents[start].iter().copied().collect();
            let mut seen = BTreeSet::new();
            while let Some(node) = stack.pop() {
                if node == start {
                    return start;
                }
                if remaining.contains(&node) && seen.insert(node) {
                    stack.extend(self.dependents[node].iter().copied());
                }
            }
        }
        // Unreachable when `remaining` is non-empty: Kahn's leftovers always hold a cycle.
        remaining.iter().next().copied().unwrap_or(0)
    }

    /// Steps whose outputs `step` consumes
    pub fn dependencies(&self, step: &str) -> Vec<&str> {
        self.neighbours(step, &self.dependencies)
    }

    /// Steps consuming outputs of `step`
    pub fn dependents(&self, step: &str) -> Vec<&str> {
        self.neighbours(step, &self.dependents)
    }

    /// All steps transitively downstream of `step`
    pub fn descendants(&self, step: &str) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        let Some(&start) = self.index.get(step) else {
            return result;
        };
        let mut stack: Vec<usize> = self.dependents[start].iter().copied().collect();
        while let Some(node) = stack.pop() {
            if result.insert(self.names[node].clone()) {
                stack.extend(self.dependents[node].iter().copied());
            }
        }
        result
    }

    fn neighbours<'a>(&'a self, step: &str, edges: &'a [BTreeSet<usize>]) -> Vec<&'a str> {
        self.index
            .get(step)
            .map(|&i| edges[i].iter().map(|&j| self.names[j].as_str()).collect())
            .unwrap_or_default()
    }
}
