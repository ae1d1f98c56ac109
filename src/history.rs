//! Rolling per-index memory of past payloads, exposed as an extra axis.

use serde::{Deserialize, Serialize};

use crate::{
    foundation::error::{ExpResult, ensure},
    node::{Node, NodeCore, Sample, Shared, TreeShape, shared},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Recorded frames kept per index.
    pub memory_length: usize,
    /// Activations between two recorded frames.
    pub record_frame_interval: usize,
    /// Payload width stored per frame; shorter payloads are zero-padded.
    pub output_dimensions: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            memory_length: 10,
            record_frame_interval: 15,
            output_dimensions: 3,
        }
    }
}

impl HistoryConfig {
    pub fn memory_length(mut self, n: usize) -> Self {
        self.memory_length = n;
        self
    }

    pub fn record_frame_interval(mut self, n: usize) -> Self {
        self.record_frame_interval = n;
        self
    }

    pub fn output_dimensions(mut self, n: usize) -> Self {
        self.output_dimensions = n;
        self
    }

    fn validate(&self) -> ExpResult<()> {
        ensure(self.memory_length >= 1, "HistoryRecorder memory_length must be at least 1")?;
        ensure(
            self.record_frame_interval >= 1,
            "HistoryRecorder record_frame_interval must be at least 1",
        )?;
        ensure(
            self.output_dimensions >= 1,
            "HistoryRecorder output_dimensions must be at least 1",
        )
    }
}

/// Buffers the last `memory_length` recorded payloads of every upstream index.
///
/// Each incoming sample is fanned out `memory_length` times, oldest slot
/// first, under the flat index `index * memory_length + slot`. Slots that were
/// never written hold NaN.
#[derive(Debug)]
pub struct HistoryRecorder {
    core: NodeCore,
    config: HistoryConfig,
    buffer: Vec<f64>,
    upstream_calls: usize,
    current_history_index: usize,
    frame_record_timer: usize,
    warned_unsized: bool,
}

impl HistoryRecorder {
    pub fn new(config: HistoryConfig) -> ExpResult<Shared<Self>> {
        config.validate()?;
        Ok(shared(Self {
            core: NodeCore::default(),
            config,
            buffer: Vec::new(),
            upstream_calls: 0,
            current_history_index: 0,
            frame_record_timer: 0,
            warned_unsized: false,
        }))
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn current_history_index(&self) -> usize {
        self.current_history_index
    }

    /// Calls this node makes into its children per activation.
    pub fn num_calls_per_activation(&self) -> usize {
        self.upstream_calls * self.config.memory_length
    }

    pub fn buffer(&self) -> &[f64] {
        &self.buffer
    }

    /// Stored payload of upstream `index` in ring `slot`.
    pub fn slot(&self, index: usize, slot: usize) -> Option<&[f64]> {
        if index >= self.upstream_calls || slot >= self.config.memory_length {
            return None;
        }
        let start = self.offset(index, slot);
        self.buffer.get(start..start + self.config.output_dimensions)
    }

    fn offset(&self, index: usize, slot: usize) -> usize {
        (index * self.config.memory_length + slot) * self.config.output_dimensions
    }

    fn allocate(&mut self, upstream_calls: usize) {
        if upstream_calls == self.upstream_calls && !self.buffer.is_empty() {
            return;
        }
        self.upstream_calls = upstream_calls;
        let len = upstream_calls * self.config.memory_length * self.config.output_dimensions;
        self.buffer = vec![f64::NAN; len];
        tracing::debug!(upstream_calls, len, "history buffer allocated");
    }

    fn ensure_sized(&mut self) -> bool {
        if self.buffer.is_empty() && !self.warned_unsized {
            tracing::warn!("HistoryRecorder was never finalized by a domain; ignoring samples");
            self.warned_unsized = true;
        }
        !self.buffer.is_empty()
    }
}

impl Node for HistoryRecorder {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "HistoryRecorder"
    }

    fn on_add(&mut self) {
        if let Some(shape) = self.core.resolve_shape() {
            self.allocate(shape.num_calls_per_activation);
        }
    }

    fn finalize(&mut self, shape: &TreeShape) -> ExpResult<()> {
        self.allocate(shape.num_calls_per_activation);
        self.core.set_shape(shape.clone());
        self.core.finalize_children(&self.shape_for_children(shape))
    }

    fn shape_for_children(&self, upstream: &TreeShape) -> TreeShape {
        upstream.with_extra_dimension(self.config.memory_length)
    }

    fn evaluate_self(&mut self, sample: Sample<'_>) {
        if !self.ensure_sized() {
            return;
        }
        let dims = self.config.output_dimensions;
        if sample.index >= self.upstream_calls {
            tracing::warn!(
                index = sample.index,
                capacity = self.upstream_calls,
                "HistoryRecorder index out of range; dropping sample"
            );
            return;
        }
        if sample.payload.len() > dims {
            tracing::warn!(
                got = sample.payload.len(),
                dims,
                "payload wider than output_dimensions; dropping sample"
            );
            return;
        }

        let start = self.offset(sample.index, self.current_history_index);
        let cell = &mut self.buffer[start..start + dims];
        cell.fill(0.0);
        cell[..sample.payload.len()].copy_from_slice(sample.payload);

        let mem = self.config.memory_length;
        for j in 0..mem {
            let slot = (j + self.current_history_index + 1) % mem;
            let at = self.offset(sample.index, slot);
            let child_sample = Sample::new(sample.index * mem + j, sample.time, &self.buffer[at..at + dims]);
            self.core.evaluate_children(child_sample);
        }
    }

    fn on_after_activation(&mut self) {
        self.core.after_activation_children();
        self.frame_record_timer += 1;
        if self.frame_record_timer < self.config.record_frame_interval {
            return;
        }
        self.frame_record_timer = 0;
        self.current_history_index = (self.current_history_index + 1) % self.config.memory_length;
    }
}
