//! Tensorboard-style run logs.
//!
//! Scalars and histogram summaries are appended to CSV files under
//! `<log_dir>/<run_name>/` so they can be plotted or converted to event
//! files offline.

use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::warn;
use ndarray::ArrayView1;

use crate::error::Result;
use crate::telemetry::MetricsSink;

/// CSV writer for scalar time series and histogram summaries.
pub struct TensorboardWriter {
    log_dir: PathBuf,
    started: Instant,
    scalar_writer: BufWriter<File>,
    histogram_writer: BufWriter<File>,
}

impl TensorboardWriter {
    /// Create the run directory and both CSV files.
    ///
    /// # Arguments
    /// * `log_dir` - Directory holding all runs
    /// * `run_name` - Name of this training run
    pub fn new<P: AsRef<Path>>(log_dir: P, run_name: &str) -> Result<Self> {
        let log_path = log_dir.as_ref().join(run_name);
        create_dir_all(&log_path)?;

        let mut scalar_writer = BufWriter::new(File::create(log_path.join("scalars.csv"))?);
        let mut histogram_writer = BufWriter::new(File::create(log_path.join("histograms.csv"))?);

        writeln!(scalar_writer, "step,tag,value,wall_time")?;
        writeln!(histogram_writer, "step,tag,count,min,max,mean,std,wall_time")?;

        Ok(Self {
            log_dir: log_path,
            started: Instant::now(),
            scalar_writer,
            histogram_writer,
        })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    fn wall_time(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn write_scalar(&mut self, tag: &str, value: f32, step: u64) -> std::io::Result<()> {
        let wall_time = self.wall_time();
        writeln!(self.scalar_writer, "{},{},{},{:.3}", step, tag, value, wall_time)
    }

    fn write_histogram(&mut self, tag: &str, values: ArrayView1<f32>, step: u64) -> std::io::Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        let count = values.len();
        let min = values.iter().fold(f32::INFINITY, |a, &b| a.min(b));
        let max = values.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let mean = values.sum() / count as f32;
        let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f32>() / count as f32;
        let wall_time = self.wall_time();

        writeln!(
            self.histogram_writer,
            "{},{},{},{},{},{},{},{:.3}",
            step,
            tag,
            count,
            min,
            max,
            mean,
            variance.sqrt(),
            wall_time
        )
    }
}

impl MetricsSink for TensorboardWriter {
    fn add_scalar(&mut self, tag: &str, value: f32, step: u64) {
        if let Err(err) = self.write_scalar(tag, value, step) {
            warn!("dropping scalar {}: {}", tag, err);
        }
    }

    fn add_histogram(&mut self, tag: &str, values: ArrayView1<f32>, step: u64) {
        if let Err(err) = self.write_histogram(tag, values, step) {
            warn!("dropping histogram {}: {}", tag, err);
        }
    }

    fn flush(&mut self) {
        if let Err(err) = self
            .scalar_writer
            .flush()
            .and_then(|_| self.histogram_writer.flush())
        {
            warn!("failed to flush tensorboard logs in {}: {}", self.log_dir.display(), err);
        }
    }
}

impl Drop for TensorboardWriter {
    fn drop(&mut self) {
        MetricsSink::flush(self);
    }
}
