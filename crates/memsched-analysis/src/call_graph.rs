//! Call graph over the computations of a module.
//!
//! Nodes are computations; an edge runs from a computation to each
//! computation invoked by one of its instructions.

use std::fmt;

use memsched_ir::{Computation, Handle, Instruction, InstructionKind, Module};

use crate::error::{AnalysisError, MalformedGraph};

/// How a callee runs relative to its caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallContext {
    /// Control transfers to the callee (call, while, conditional); the
    /// callee is scheduled as a sequence of its own.
    Sequential,
    /// The callee is applied as a scalar function inside its caller (map,
    /// reduce).
    Embedded,
}

impl CallContext {
    pub fn of(kind: &InstructionKind) -> Option<Self> {
        match kind {
            InstructionKind::Call { .. }
            | InstructionKind::While { .. }
            | InstructionKind::Conditional { .. } => Some(Self::Sequential),
            InstructionKind::Map { .. } | InstructionKind::Reduce { .. } => Some(Self::Embedded),
            _ => None,
        }
    }
}

impl fmt::Display for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::Embedded => f.write_str("embedded"),
        }
    }
}

/// A call-like instruction and the computations it invokes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSite {
    pub instruction: Handle<Instruction>,
    pub called_computations: Vec<Handle<Computation>>,
    pub context: CallContext,
}

/// One computation in the call graph.
#[derive(Clone, Debug, Default)]
pub struct CallGraphNode {
    callsites: Vec<CallSite>,
    callees: Vec<Handle<Computation>>,
    callers: Vec<Handle<Computation>>,
    caller_callsites: Vec<Handle<Instruction>>,
}

impl CallGraphNode {
    /// Call-like instructions inside this computation.
    pub fn callsites(&self) -> &[CallSite] {
        &self.callsites
    }

    /// Distinct computations called from this one, in first-call order.
    pub fn callees(&self) -> &[Handle<Computation>] {
        &self.callees
    }

    /// Distinct computations that call this one.
    pub fn callers(&self) -> &[Handle<Computation>] {
        &self.callers
    }

    /// Instructions, anywhere in the module, that invoke this computation.
    pub fn caller_callsites(&self) -> &[Handle<Instruction>] {
        &self.caller_callsites
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    InProgress,
    Done,
}

/// The call graph of a module, checked to be acyclic.
#[derive(Debug)]
pub struct CallGraph {
    names: Vec<String>,
    nodes: Vec<CallGraphNode>,
    postorder: Vec<Handle<Computation>>,
}

impl CallGraph {
    /// Builds the call graph of `module`.
    ///
    /// Fails with [`MalformedGraph::CyclicCallGraph`] if a computation can
    /// reach itself.
    pub fn build(module: &Module) -> Result<Self, AnalysisError> {
        let mut nodes = vec![CallGraphNode::default(); module.computation_count()];
        let mut names = Vec::with_capacity(module.computation_count());

        for (handle, computation) in module.computations() {
            names.push(computation.name().to_string());
            for &instruction in computation.instructions() {
                let kind = module[instruction].kind();
                let Some(context) = CallContext::of(kind) else {
                    continue;
                };
                let called = kind.called_computations();
                for &callee in &called {
                    let node = &mut nodes[handle.index()];
                    if !node.callees.contains(&callee) {
                        node.callees.push(callee);
                    }
                    let callee_node = &mut nodes[callee.index()];
                    if !callee_node.callers.contains(&handle) {
                        callee_node.callers.push(handle);
                    }
                    if !callee_node.caller_callsites.contains(&instruction) {
                        callee_node.caller_callsites.push(instruction);
                    }
                }
                nodes[handle.index()].callsites.push(CallSite {
                    instruction,
                    called_computations: called,
                    context,
                });
            }
        }

        let mut graph = Self {
            names,
            nodes,
            postorder: Vec::new(),
        };
        graph.postorder = graph.compute_postorder(module)?;
        Ok(graph)
    }

    /// Depth-first postorder from each computation in module order: every
    /// callee precedes its callers.
    fn compute_postorder(&self, module: &Module) -> Result<Vec<Handle<Computation>>, AnalysisError> {
        let mut state = vec![Visit::Unvisited; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        for (root, _) in module.computations() {
            if state[root.index()] != Visit::Unvisited {
                continue;
            }
            // (computation, next callee to visit)
            let mut stack = vec![(root, 0usize)];
            state[root.index()] = Visit::InProgress;
            while let Some(frame) = stack.last_mut() {
                let current = frame.0;
                if let Some(&callee) = self.nodes[current.index()].callees.get(frame.1) {
                    frame.1 += 1;
                    match state[callee.index()] {
                        Visit::Unvisited => {
                            state[callee.index()] = Visit::InProgress;
                            stack.push((callee, 0));
                        }
                        Visit::InProgress => {
                            return Err(MalformedGraph::CyclicCallGraph {
                                computation: self.names[callee.index()].clone(),
                            }
                            .into());
                        }
                        Visit::Done => {}
                    }
                } else {
                    state[current.index()] = Visit::Done;
                    order.push(current);
                    stack.pop();
                }
            }
        }
        Ok(order)
    }

    pub fn node(&self, computation: Handle<Computation>) -> &CallGraphNode {
        &self.nodes[computation.index()]
    }

    /// Computations with every callee before its callers.
    pub fn postorder(&self) -> &[Handle<Computation>] {
        &self.postorder
    }

    /// Returns `true` if every path from an uncalled computation to `b`
    /// passes through `a`. A computation dominates itself.
    pub fn dominates(&self, a: Handle<Computation>, b: Handle<Computation>) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![b];
        while let Some(current) = stack.pop() {
            if current == a || visited[current.index()] {
                continue;
            }
            visited[current.index()] = true;
            let callers = &self.nodes[current.index()].callers;
            if callers.is_empty() {
                return false;
            }
            stack.extend(callers.iter().copied());
        }
        true
    }

    /// Returns `true` if `instruction` sits in `computation` or in a
    /// computation it dominates.
    pub fn instruction_is_nested_in(
        &self,
        module: &Module,
        instruction: Handle<Instruction>,
        computation: Handle<Computation>,
    ) -> bool {
        self.dominates(computation, module[instruction].parent())
    }

    /// Walks `a` and `b` up through their unique callers until both sit in
    /// the same computation and returns the instructions reached there.
    ///
    /// Returns `None` when a walk hits a computation with zero or several
    /// caller callsites before the two meet.
    pub fn nearest_ancestors_in_same_computation(
        &self,
        module: &Module,
        a: Handle<Instruction>,
        b: Handle<Instruction>,
    ) -> Option<(Handle<Instruction>, Handle<Instruction>)> {
        let chain_a = self.ancestor_chain(module, a);
        let chain_b = self.ancestor_chain(module, b);
        for &x in &chain_a {
            let parent = module[x].parent();
            if let Some(&y) = chain_b.iter().find(|&&y| module[y].parent() == parent) {
                return Some((x, y));
            }
        }
        None
    }

    fn ancestor_chain(&self, module: &Module, start: Handle<Instruction>) -> Vec<Handle<Instruction>> {
        let mut chain = vec![start];
        let mut current = start;
        while let [caller] = self.nodes[module[current].parent().index()].caller_callsites[..] {
            if chain.contains(&caller) {
                break;
            }
            chain.push(caller);
            current = caller;
        }
        chain
    }
}

impl fmt::Display for CallGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "call graph:")?;
        for (i, node) in self.nodes.iter().enumerate() {
            writeln!(f, "  {}", self.names[i])?;
            for callsite in &node.callsites {
                let callees: Vec<&str> = callsite
                    .called_computations
                    .iter()
                    .map(|c| self.names[c.index()].as_str())
                    .collect();
                writeln!(f, "    calls {} ({})", callees.join(", "), callsite.context)?;
            }
            if !node.callers.is_empty() {
                let callers: Vec<&str> = node
                    .callers
                    .iter()
                    .map(|c| self.names[c.index()].as_str())
                    .collect();
                writeln!(f, "    called by {}", callers.join(", "))?;
            }
        }
        Ok(())
    }
}
