//! Per-computation instruction orders for a whole module.

use std::collections::BTreeMap;
use std::fmt;

use memsched_ir::{Computation, Handle, Instruction, Module};

/// An execution order for each scheduled computation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleSequence {
    orders: BTreeMap<Handle<Computation>, Vec<Handle<Instruction>>>,
}

impl ModuleSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every computation in construction order. Always valid, rarely
    /// memory-optimal.
    pub fn construction_order(module: &Module) -> Self {
        let orders = module
            .computations()
            .map(|(handle, c)| (handle, c.instructions().to_vec()))
            .collect();
        Self { orders }
    }

    /// Sets the order of `computation`, returning the previous one.
    pub fn insert(
        &mut self,
        computation: Handle<Computation>,
        order: Vec<Handle<Instruction>>,
    ) -> Option<Vec<Handle<Instruction>>> {
        self.orders.insert(computation, order)
    }

    pub fn get(&self, computation: Handle<Computation>) -> Option<&[Handle<Instruction>]> {
        self.orders.get(&computation).map(Vec::as_slice)
    }

    pub fn contains(&self, computation: Handle<Computation>) -> bool {
        self.orders.contains_key(&computation)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// `(computation, order)` pairs by computation handle.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<Computation>, &[Handle<Instruction>])> {
        self.orders
            .iter()
            .map(|(&computation, order)| (computation, order.as_slice()))
    }

    /// Renders the sequence with instruction names resolved in `module`.
    pub fn display<'a>(&'a self, module: &'a Module) -> SequenceDisplay<'a> {
        SequenceDisplay {
            sequence: self,
            module,
        }
    }
}

/// Text form of a [`ModuleSequence`], one line per computation.
pub struct SequenceDisplay<'a> {
    sequence: &'a ModuleSequence,
    module: &'a Module,
}

impl fmt::Display for SequenceDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (computation, order) in self.sequence.iter() {
            let names: Vec<&str> = order.iter().map(|&i| self.module[i].name()).collect();
            writeln!(
                f,
                "{}: {}",
                self.module[computation].name(),
                names.join(", ")
            )?;
        }
        Ok(())
    }
}
