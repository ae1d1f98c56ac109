//! Outputs that hand evaluated coordinates back to host code instead of a renderer.

use std::{cell::RefCell, rc::Rc};

use crate::{
    foundation::error::ExpResult,
    node::{Node, NodeCore, Sample, Shared, TreeShape, shared},
};

/// Every payload of one activation, concatenated in index order.
#[derive(Debug, Default)]
pub struct FlatArrayOutput {
    core: NodeCore,
    array: Rc<RefCell<Vec<f64>>>,
    cursor: usize,
}

impl FlatArrayOutput {
    pub fn new() -> Shared<Self> {
        shared(Self::default())
    }

    /// Writes into a caller-owned array.
    pub fn with_array(array: Rc<RefCell<Vec<f64>>>) -> Shared<Self> {
        shared(Self {
            array,
            ..Self::default()
        })
    }

    pub fn array(&self) -> Rc<RefCell<Vec<f64>>> {
        self.array.clone()
    }

    pub fn values(&self) -> Vec<f64> {
        self.array.borrow().clone()
    }
}

impl Node for FlatArrayOutput {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "FlatArrayOutput"
    }

    fn finalize(&mut self, shape: &TreeShape) -> ExpResult<()> {
        self.core.set_shape(shape.clone());
        self.array.borrow_mut().reserve(shape.num_calls_per_activation);
        Ok(())
    }

    fn evaluate_self(&mut self, sample: Sample<'_>) {
        let mut array = self.array.borrow_mut();
        for &v in sample.payload {
            match array.get_mut(self.cursor) {
                Some(slot) => *slot = v,
                None => array.push(v),
            }
            self.cursor += 1;
        }
    }

    fn on_after_activation(&mut self) {
        self.core.after_activation_children();
        self.array.borrow_mut().truncate(self.cursor);
        self.cursor = 0;
    }
}

/// One inner array per sample.
#[derive(Debug, Default)]
pub struct ArrayOfArraysOutput {
    core: NodeCore,
    array: Rc<RefCell<Vec<Vec<f64>>>>,
    cursor: usize,
}

impl ArrayOfArraysOutput {
    pub fn new() -> Shared<Self> {
        shared(Self::default())
    }

    pub fn with_array(array: Rc<RefCell<Vec<Vec<f64>>>>) -> Shared<Self> {
        shared(Self {
            array,
            ..Self::default()
        })
    }

    pub fn array(&self) -> Rc<RefCell<Vec<Vec<f64>>>> {
        self.array.clone()
    }

    pub fn values(&self) -> Vec<Vec<f64>> {
        self.array.borrow().clone()
    }
}

impl Node for ArrayOfArraysOutput {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "ArrayOfArraysOutput"
    }

    fn finalize(&mut self, shape: &TreeShape) -> ExpResult<()> {
        self.core.set_shape(shape.clone());
        self.array.borrow_mut().reserve(shape.num_calls_per_activation);
        Ok(())
    }

    fn evaluate_self(&mut self, sample: Sample<'_>) {
        let mut array = self.array.borrow_mut();
        match array.get_mut(self.cursor) {
            Some(slot) => {
                slot.clear();
                slot.extend_from_slice(sample.payload);
            }
            None => array.push(sample.payload.to_vec()),
        }
        self.cursor += 1;
    }

    fn on_after_activation(&mut self) {
        self.core.after_activation_children();
        self.array.borrow_mut().truncate(self.cursor);
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_sink_rewrites_in_place() {
        let sink = FlatArrayOutput::new();
        let mut s = sink.borrow_mut();
        s.evaluate_self(Sample::new(0, 0.0, &[1.0, 2.0]));
        s.evaluate_self(Sample::new(1, 0.0, &[3.0, 4.0]));
        s.on_after_activation();
        assert_eq!(s.values(), vec![1.0, 2.0, 3.0, 4.0]);

        s.evaluate_self(Sample::new(0, 0.0, &[9.0]));
        s.on_after_activation();
        assert_eq!(s.values(), vec![9.0]);
    }

    #[test]
    fn nested_sink_keeps_one_entry_per_sample() {
        let shared_array = Rc::new(RefCell::new(Vec::new()));
        let sink = ArrayOfArraysOutput::with_array(shared_array.clone());
        let mut s = sink.borrow_mut();
        s.evaluate_self(Sample::new(0, 0.0, &[1.0]));
        s.evaluate_self(Sample::new(1, 0.0, &[2.0, 3.0]));
        s.on_after_activation();
        assert_eq!(*shared_array.borrow(), vec![vec![1.0], vec![2.0, 3.0]]);
    }
}
