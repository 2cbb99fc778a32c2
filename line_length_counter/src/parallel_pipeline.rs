// THEORY:
// A sample series is rarely a single micrograph - a batch of dozens of images
// is measured with the same parameters and calibration. The `ParallelPipeline`
// spreads those images over a pool of tokio workers while each individual scan
// stays the simple single-threaded pass of the `MeasurementPipeline`.
//
// Key architectural principles:
// 1.  **Dispatcher + Workers**: One dispatcher task receives every measurement
//     task and hands it to the workers round-robin. Each worker owns its own
//     `MeasurementPipeline`, so nothing is shared while scanning.
// 2.  **Blocking Scans Off the Runtime**: A scan is pure CPU work. Workers run
//     it on tokio's blocking pool so a large micrograph never stalls the
//     dispatcher or the tasks awaiting replies.
// 3.  **Reply Channels**: Every task carries a `oneshot` sender; the caller
//     awaits exactly its own report. A task may carry its own calibration,
//     which replaces the configured one for that image only.
// 4.  **Order Preservation**: `measure_all` returns reports in input order no
//     matter which worker finished first.
// 5.  **Clean Shutdown**: Dropping the task sender ends the dispatcher, which
//     drops the worker channels, which ends the workers.

use crate::core_modules::pixel_grid::pixel_grid::PixelGrid;
use crate::error::MeasureError;
use crate::pipeline::{Calibration, LineReport, MeasurementPipeline, PipelineConfig};
use futures::future::try_join_all;
use log::{error, info};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// A report together with the id the pool assigned to its image.
#[derive(Debug, Clone)]
pub struct MeasuredImage {
    pub image_id: u64,
    pub report: LineReport,
}

pub struct MeasurementTask {
    pub grid: Arc<PixelGrid>,
    pub image_id: u64,
    /// Replaces the pool's configured calibration for this image.
    pub calibration: Option<Calibration>,
    pub result_sender: oneshot::Sender<Result<MeasuredImage, MeasureError>>,
}

pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<MeasurementTask>,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Must be called from within a tokio runtime.
    pub fn new(config: PipelineConfig, worker_count: usize) -> Result<Self, MeasureError> {
        let worker_count = worker_count.max(1);
        // Validate once up front so workers cannot fail on construction.
        let pipeline = MeasurementPipeline::new(config)?;

        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<MeasurementTask>();
        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<MeasurementTask>())
            .unzip();

        let dispatcher = tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                let _ = worker_senders[worker_idx].send(task);
                worker_idx = (worker_idx + 1) % worker_senders.len();
            }
        });

        let mut workers = Vec::with_capacity(worker_count);
        for mut worker_receiver in worker_receivers {
            let worker_pipeline = Arc::new(pipeline.clone());
            let worker = tokio::spawn(async move {
                while let Some(task) = worker_receiver.recv().await {
                    let MeasurementTask {
                        grid,
                        image_id,
                        calibration,
                        result_sender,
                    } = task;
                    let pipeline = Arc::clone(&worker_pipeline);
                    let scan = tokio::task::spawn_blocking(move || match &calibration {
                        Some(calibration) => pipeline.generate_report_calibrated(&grid, calibration),
                        None => Ok(pipeline.generate_report(&grid)),
                    });
                    let result = match scan.await {
                        Ok(report) => report.map(|report| MeasuredImage { image_id, report }),
                        Err(join_error) => {
                            error!("measurement of image {image_id} did not finish: {join_error}");
                            Err(MeasureError::WorkerUnavailable)
                        }
                    };
                    let _ = result_sender.send(result);
                }
            });
            workers.push(worker);
        }

        info!("measurement worker pool started with {worker_count} workers");
        Ok(Self {
            task_sender,
            dispatcher,
            workers,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub async fn measure(
        &self,
        grid: Arc<PixelGrid>,
        image_id: u64,
        calibration: Option<Calibration>,
    ) -> Result<MeasuredImage, MeasureError> {
        if let Some(calibration) = &calibration {
            calibration.validate()?;
        }
        let (result_sender, result_receiver) = oneshot::channel();

        let task = MeasurementTask {
            grid,
            image_id,
            calibration,
            result_sender,
        };

        self.task_sender
            .send(task)
            .map_err(|_| MeasureError::WorkerUnavailable)?;

        result_receiver.await.map_err(|_| MeasureError::WorkerUnavailable)?
    }

    /// Stops accepting tasks and waits for every worker to drain its queue.
    pub async fn shutdown(self) {
        drop(self.task_sender);
        let _ = self.dispatcher.await;
        for worker in self.workers {
            let _ = worker.await;
        }
        info!("measurement worker pool stopped");
    }
}

pub struct ParallelPipeline {
    worker_pool: WorkerPool,
    image_counter: AtomicU64,
}

impl ParallelPipeline {
    /// One worker per logical CPU. Must be called from within a tokio runtime.
    pub fn new(config: PipelineConfig) -> Result<Self, MeasureError> {
        Self::with_workers(config, num_cpus::get())
    }

    pub fn with_workers(config: PipelineConfig, worker_count: usize) -> Result<Self, MeasureError> {
        Ok(Self {
            worker_pool: WorkerPool::new(config, worker_count)?,
            image_counter: AtomicU64::new(0),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_pool.worker_count()
    }

    pub async fn measure(&self, grid: PixelGrid) -> Result<MeasuredImage, MeasureError> {
        let image_id = self.image_counter.fetch_add(1, Ordering::Relaxed);
        self.worker_pool.measure(Arc::new(grid), image_id, None).await
    }

    /// Measures `grid` with its own calibration instead of the configured one.
    pub async fn measure_calibrated(
        &self,
        grid: PixelGrid,
        calibration: Calibration,
    ) -> Result<MeasuredImage, MeasureError> {
        let image_id = self.image_counter.fetch_add(1, Ordering::Relaxed);
        self.worker_pool
            .measure(Arc::new(grid), image_id, Some(calibration))
            .await
    }

    /// Measures every grid and returns the results in input order.
    pub async fn measure_all(&self, grids: Vec<PixelGrid>) -> Result<Vec<MeasuredImage>, MeasureError> {
        try_join_all(grids.into_iter().map(|grid| self.measure(grid))).await
    }

    /// Like `measure_all`, with a per-image calibration where one is given.
    pub async fn measure_all_calibrated(
        &self,
        images: Vec<(PixelGrid, Option<Calibration>)>,
    ) -> Result<Vec<MeasuredImage>, MeasureError> {
        try_join_all(images.into_iter().map(|(grid, calibration)| async move {
            match calibration {
                Some(calibration) => self.measure_calibrated(grid, calibration).await,
                None => self.measure(grid).await,
            }
        }))
        .await
    }

    pub async fn shutdown(self) {
        self.worker_pool.shutdown().await;
    }
}
