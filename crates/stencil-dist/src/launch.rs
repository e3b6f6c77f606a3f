use std::time::{Duration, Instant};

use stencil_image::Image;
use stencil_imgproc::{
    filter::filter_image,
    parallel::ExecutionStrategy,
    stencil::{Stencil, StencilSpec},
    CHANNELS,
};

use crate::{
    comm::{Communicator, LocalWorld},
    config::{Backend, ParallelConfig},
    error::DistError,
    partition::{partitions, Partition},
    worker::{Worker, WorkerOutput},
};

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// The backend that executed the run.
    pub backend: Backend,
    /// Number of workers.
    pub worker_count: usize,
    /// Threads used by each worker.
    pub threads_per_worker: usize,
    /// The rows computed by each worker, ordered by worker id.
    pub partitions: Vec<Partition>,
    /// Wall-clock time from the first exchange to the assembled image.
    pub elapsed: Duration,
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} run with {} workers x {} threads took {:.6} s",
            self.backend,
            self.worker_count,
            self.threads_per_worker,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Apply a stencil with row-partitioned workers.
///
/// See [`run_distributed_with_report`].
pub fn run_distributed<F>(
    source: F,
    spec: &StencilSpec,
    config: &ParallelConfig,
) -> Result<Image<u8, CHANNELS>, DistError>
where
    F: FnOnce() -> Result<Image<u8, CHANNELS>, DistError> + Send,
{
    run_distributed_with_report(source, spec, config).map(|(image, _)| image)
}

/// Apply a stencil with row-partitioned workers and report how the run went.
///
/// Parameters are validated before any worker starts. Each worker runs on its own
/// named thread with a private copy of the pixels; the coordinator loads the image
/// from `source` and returns the assembled output. When several workers fail, the
/// error that caused the abort is returned rather than the aborts it triggered.
///
/// # Arguments
///
/// * `source` - Loads the input image, called once by the coordinator.
/// * `spec` - The stencil to apply.
/// * `config` - Number of workers and threads per worker.
pub fn run_distributed_with_report<F>(
    source: F,
    spec: &StencilSpec,
    config: &ParallelConfig,
) -> Result<(Image<u8, CHANNELS>, RunReport), DistError>
where
    F: FnOnce() -> Result<Image<u8, CHANNELS>, DistError> + Send,
{
    config.validate()?;
    let stencil = Stencil::new(spec)?;

    let start = Instant::now();
    let results = std::thread::scope(|s| {
        let mut source = Some(source);
        let mut handles = Vec::with_capacity(config.worker_count);
        let mut results = Vec::with_capacity(config.worker_count);

        for comm in LocalWorld::connect(config.worker_count) {
            let worker_id = comm.worker_id();
            let worker = Worker::new(comm, &stencil, config.threads_per_worker);
            let source = source.take();
            let spawned = std::thread::Builder::new()
                .name(format!("stencil-worker-{worker_id}"))
                .spawn_scoped(s, move || {
                    worker.run(|| match source {
                        Some(source) => source(),
                        None => Err(DistError::InvalidParameter(format!(
                            "worker {worker_id} has no image source"
                        ))),
                    })
                });

            match spawned {
                Ok(handle) => handles.push((worker_id, handle)),
                Err(err) => {
                    // the unspawned communicators drop and abort the others
                    results.push(Err(DistError::Spawn {
                        worker_id,
                        source: err,
                    }));
                    break;
                }
            }
        }

        for (worker_id, handle) in handles {
            let res = handle
                .join()
                .unwrap_or_else(|_| Err(DistError::WorkerPanicked(worker_id)));
            results.push(res);
        }
        results
    });
    let elapsed = start.elapsed();

    let mut image = None;
    let mut partitions_done = Vec::with_capacity(config.worker_count);
    let mut first_error: Option<DistError> = None;

    for res in results {
        match res {
            Ok(WorkerOutput {
                partition,
                image: assembled,
            }) => {
                partitions_done.push(partition);
                if assembled.is_some() {
                    image = assembled;
                }
            }
            Err(err) => {
                let replace = match &first_error {
                    None => true,
                    Some(current) => current.is_secondary() && !err.is_secondary(),
                };
                if replace {
                    first_error = Some(err);
                }
            }
        }
    }

    if let Some(err) = first_error {
        return Err(err);
    }

    let image = image.ok_or_else(|| {
        DistError::InvalidParameter("the coordinator produced no image".to_string())
    })?;
    partitions_done.sort_by_key(|p| p.worker_id);

    let report = RunReport {
        backend: Backend::Distributed,
        worker_count: config.worker_count,
        threads_per_worker: config.threads_per_worker,
        partitions: partitions_done,
        elapsed,
    };
    log::info!("{spec} on {}: {report}", image.size());

    Ok((image, report))
}

/// Apply a stencil on the given backend.
///
/// The serial and threaded backends filter the whole image in one piece; the
/// distributed backend partitions it over `config.worker_count` workers.
pub fn run_backend<F>(
    backend: Backend,
    source: F,
    spec: &StencilSpec,
    config: &ParallelConfig,
) -> Result<(Image<u8, CHANNELS>, RunReport), DistError>
where
    F: FnOnce() -> Result<Image<u8, CHANNELS>, DistError> + Send,
{
    let (strategy, threads) = match backend {
        Backend::Distributed => return run_distributed_with_report(source, spec, config),
        Backend::Serial => (ExecutionStrategy::Serial, 1),
        Backend::Threaded => {
            config.validate()?;
            (
                ExecutionStrategy::Fixed(config.threads_per_worker),
                config.threads_per_worker,
            )
        }
    };

    // fail on a bad stencil before loading the image
    Stencil::new(spec)?;

    let image = source()?;
    let start = Instant::now();
    let output = filter_image(&image, spec, strategy)?;
    let elapsed = start.elapsed();

    let report = RunReport {
        backend,
        worker_count: 1,
        threads_per_worker: threads,
        partitions: partitions(image.height(), 1)?,
        elapsed,
    };
    log::info!("{spec} on {}: {report}", image.size());

    Ok((output, report))
}
