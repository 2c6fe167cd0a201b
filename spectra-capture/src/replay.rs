use log::debug;

use crate::callback::{EvalCallback, Phase};

/// Base of the fake address range handed out by [`SyntheticEngine`].
const BASE_ADDRESS: usize = 0x3a00_0000;
/// Distance between consecutive fake tensor addresses.
const NODE_STRIDE: usize = 0x1a0;

/// Stand-in for a native inference engine that drives an [`EvalCallback`].
///
/// Models a regular decoder graph: one embedding node, `tensors_per_layer` nodes per
/// layer, then an output norm and an output projection. Node addresses are stable
/// across passes, just like tensors inside a reused compute graph.
#[derive(Debug, Clone)]
pub struct SyntheticEngine {
    n_layers: usize,
    tensors_per_layer: usize,
}

impl SyntheticEngine {
    pub fn new(n_layers: usize, tensors_per_layer: usize) -> Self {
        Self { n_layers, tensors_per_layer }
    }

    /// Number of nodes evaluated by one forward pass.
    pub fn graph_len(&self) -> usize {
        1 + self.n_layers * self.tensors_per_layer + 2
    }

    pub fn address_of(&self, node: usize) -> usize {
        BASE_ADDRESS + node * NODE_STRIDE
    }

    /// Runs one forward pass and returns how many nodes were computed.
    pub fn evaluate(&self, callback: &dyn EvalCallback) -> usize {
        let mut computed = 0;

        for node in 0..self.graph_len() {
            let tensor = self.address_of(node);
            if !callback.on_eval(tensor, Phase::Ask) {
                continue;
            }

            computed += 1;
            if !callback.on_eval(tensor, Phase::Computed) {
                debug!("Evaluation stopped by callback at node {node}");
                break;
            }
        }

        computed
    }

    /// Runs `tokens` forward passes, one per generated token.
    pub fn run(&self, callback: &dyn EvalCallback, tokens: usize) -> usize {
        (0..tokens).map(|_| self.evaluate(callback)).sum()
    }
}
