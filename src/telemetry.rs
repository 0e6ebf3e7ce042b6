//! Single reporting interface for training metrics.
//!
//! Numeric code returns plain reports (losses, TD errors); callers decide
//! whether to hand them to a [`MetricsSink`]. Sinks are a pure side channel:
//! they never return errors and never influence control flow.

use ndarray::ArrayView1;
use std::cell::RefCell;
use std::rc::Rc;

pub trait MetricsSink {
    fn add_scalar(&mut self, tag: &str, value: f32, step: u64);

    fn add_histogram(&mut self, tag: &str, values: ArrayView1<f32>, step: u64);

    fn flush(&mut self) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn add_scalar(&mut self, _tag: &str, _value: f32, _step: u64) {}

    fn add_histogram(&mut self, _tag: &str, _values: ArrayView1<f32>, _step: u64) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarRecord {
    pub tag: String,
    pub value: f32,
    pub step: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramRecord {
    pub tag: String,
    pub values: Vec<f32>,
    pub step: u64,
}

#[derive(Debug, Default)]
struct MemoryLog {
    scalars: Vec<ScalarRecord>,
    histograms: Vec<HistogramRecord>,
}

/// In-memory sink. Clones share the same log, so a handle can be kept
/// after another clone has been boxed into an agent.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    log: Rc<RefCell<MemoryLog>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(step, value)` recorded under `tag`, in emission order.
    pub fn scalars(&self, tag: &str) -> Vec<(u64, f32)> {
        self.log
            .borrow()
            .scalars
            .iter()
            .filter(|r| r.tag == tag)
            .map(|r| (r.step, r.value))
            .collect()
    }

    pub fn last_scalar(&self, tag: &str) -> Option<f32> {
        self.scalars(tag).last().map(|&(_, v)| v)
    }

    pub fn histograms(&self, tag: &str) -> Vec<HistogramRecord> {
        self.log
            .borrow()
            .histograms
            .iter()
            .filter(|r| r.tag == tag)
            .cloned()
            .collect()
    }

    pub fn scalar_count(&self) -> usize {
        self.log.borrow().scalars.len()
    }
}

impl MetricsSink for MemorySink {
    fn add_scalar(&mut self, tag: &str, value: f32, step: u64) {
        self.log.borrow_mut().scalars.push(ScalarRecord {
            tag: tag.to_string(),
            value,
            step,
        });
    }

    fn add_histogram(&mut self, tag: &str, values: ArrayView1<f32>, step: u64) {
        self.log.borrow_mut().histograms.push(HistogramRecord {
            tag: tag.to_string(),
            values: values.to_vec(),
            step,
        });
    }
}
