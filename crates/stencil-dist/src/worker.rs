use std::time::Instant;

use stencil_image::Image;
use stencil_imgproc::{
    filter::convolve_rows, parallel::ExecutionStrategy, stencil::Stencil, CHANNELS,
};

use crate::{
    comm::{Communicator, Role},
    error::DistError,
    halo::HaloBuffer,
    partition::{partition, partitions, GatherLayout, Partition},
    phase::Phase,
};

/// The outcome of a worker's run.
#[derive(Debug)]
pub struct WorkerOutput {
    /// The rows this worker computed.
    pub partition: Partition,
    /// The assembled image, only on the coordinator.
    pub image: Option<Image<u8, CHANNELS>>,
}

/// One participant of a distributed run.
///
/// Drives the collectives of its communicator through the run phases, in the same
/// order on every worker.
pub struct Worker<'a, C: Communicator> {
    comm: C,
    stencil: &'a Stencil,
    strategy: ExecutionStrategy,
    phase: Phase,
}

impl<'a, C: Communicator> Worker<'a, C> {
    /// Create a worker.
    ///
    /// # Arguments
    ///
    /// * `comm` - The communicator connecting this worker to the others.
    /// * `stencil` - The stencil, identical on every worker.
    /// * `threads_per_worker` - Threads used to convolve the local rows.
    pub fn new(comm: C, stencil: &'a Stencil, threads_per_worker: usize) -> Self {
        Self {
            comm,
            stencil,
            strategy: ExecutionStrategy::from_threads(threads_per_worker),
            phase: Phase::Idle,
        }
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn advance(&mut self) {
        if let Some(next) = self.phase.next() {
            log::debug!(
                "worker {}: {} -> {}",
                self.comm.worker_id(),
                self.phase,
                next
            );
            self.phase = next;
        }
    }

    /// Run every phase to completion.
    ///
    /// The coordinator calls `source` once to load the image; the other workers
    /// never call it. Any failure aborts the run for every worker.
    pub fn run<F>(mut self, source: F) -> Result<WorkerOutput, DistError>
    where
        F: FnOnce() -> Result<Image<u8, CHANNELS>, DistError>,
    {
        let res = self.execute(source);
        if let Err(err) = &res {
            if !err.is_secondary() {
                log::warn!(
                    "worker {}: aborting during {}: {err}",
                    self.comm.worker_id(),
                    self.phase
                );
                self.comm.abort(self.phase, &err.to_string());
            }
        }
        res
    }

    fn execute<F>(&mut self, source: F) -> Result<WorkerOutput, DistError>
    where
        F: FnOnce() -> Result<Image<u8, CHANNELS>, DistError>,
    {
        let worker_id = self.comm.worker_id();
        let worker_count = self.comm.worker_count();

        // idle: only the coordinator touches the image source
        let mut image = match self.comm.role() {
            Role::Coordinator => {
                let image = source()?;
                if image.size().is_empty() {
                    return Err(DistError::InvalidParameter(format!(
                        "image dimensions must be positive, got {}",
                        image.size()
                    )));
                }
                Some(image)
            }
            Role::Worker => None,
        };

        self.advance();
        let size = self
            .comm
            .broadcast_size(image.as_ref().map(|image| image.size()))?;

        self.advance();
        let mut pixels = image.take().map(Image::into_vec).unwrap_or_default();
        self.comm.broadcast_pixels(&mut pixels)?;
        let image = Image::<u8, CHANNELS>::new(size, pixels)?;

        self.advance();
        let partition = partition(size.height, worker_count, worker_id)?;
        if partition.is_empty() {
            log::warn!("worker {worker_id}: no rows assigned, contributing nothing");
        } else {
            log::debug!(
                "worker {worker_id}: rows {}..{}",
                partition.start_row,
                partition.end_row()
            );
        }

        let compute_start = Instant::now();
        let halo = HaloBuffer::assemble(&image, &partition, self.stencil.radius())?;
        // the full image is not needed past the halo assembly
        drop(image);

        let bytes = partition.byte_len(size.width);
        let mut local = Vec::new();
        local
            .try_reserve_exact(bytes)
            .map_err(|_| DistError::Resource {
                stage: Phase::ComputeLocal,
                bytes,
            })?;
        local.resize(bytes, 0u8);

        convolve_rows(
            &halo,
            self.stencil,
            partition.start_row,
            &mut local,
            self.strategy,
        )?;
        drop(halo);
        log::debug!(
            "worker {worker_id}: computed {} rows in {:?}",
            partition.row_count,
            compute_start.elapsed()
        );

        self.advance();
        let layout = GatherLayout::new(&partitions(size.height, worker_count)?, size.width);
        let assembled = self.comm.gather(local, &layout)?;

        let image = assembled
            .map(|data| Image::<u8, CHANNELS>::new(size, data))
            .transpose()?;

        self.advance();
        Ok(WorkerOutput { partition, image })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::LocalWorld;
    use stencil_imgproc::stencil::StencilSpec;

    #[test]
    fn test_single_worker() -> Result<(), DistError> {
        let stencil = Stencil::new(&StencilSpec::Sharpen)?;
        let image = Image::<u8, 3>::from_size_val([3, 2].into(), 42)?;
        let expected = image.clone();

        let mut world = LocalWorld::connect(1);
        let comm = world.remove(0);
        let worker = Worker::new(comm, &stencil, 1);
        assert_eq!(worker.phase(), Phase::Idle);

        let output = worker.run(|| Ok(image))?;
        assert_eq!(output.partition.row_count, 2);
        assert_eq!(output.image, Some(expected));
        Ok(())
    }

    #[test]
    fn test_source_failure_aborts() -> Result<(), DistError> {
        let stencil = Stencil::new(&StencilSpec::Emboss)?;
        let mut world = LocalWorld::connect(2);
        let peer = world.remove(1);
        let coordinator = world.remove(0);

        let res = Worker::new(coordinator, &stencil, 1).run(|| {
            Err(DistError::image_source(std::io::Error::other("corrupt")))
        });
        assert!(matches!(res, Err(DistError::ImageSource(_))));

        let res = Worker::new(peer, &stencil, 1).run(|| unreachable!("not the coordinator"));
        assert!(matches!(
            res,
            Err(DistError::Aborted {
                stage: Phase::BroadcastDimensions,
                worker_id: 0
            })
        ));
        Ok(())
    }

    #[test]
    fn test_empty_image_rejected() -> Result<(), DistError> {
        let stencil = Stencil::new(&StencilSpec::Mean)?;
        let mut world = LocalWorld::connect(1);
        let res = Worker::new(world.remove(0), &stencil, 1)
            .run(|| Ok(Image::<u8, 3>::new([0, 0].into(), vec![])?));
        assert!(matches!(res, Err(DistError::InvalidParameter(_))));
        Ok(())
    }
}
