use std::cell::Cell;
use std::sync::mpsc::{channel, Receiver, Sender};

use stencil_image::ImageSize;

use crate::{error::DistError, partition::GatherLayout, phase::Phase};

/// Id of the worker that loads the input image and assembles the output.
pub const COORDINATOR: usize = 0;

/// The part a worker plays in the collectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Owns the image before the broadcast and after the gather.
    Coordinator,
    /// Receives the image and contributes its rows.
    Worker,
}

/// Collective operations between the workers of one run.
///
/// Every worker must call the collectives in the same order. A failure observed by
/// any worker is reported to every other worker through [`Communicator::abort`].
pub trait Communicator {
    /// The id of this worker, in `[0, worker_count)`.
    fn worker_id(&self) -> usize;

    /// The number of workers in the run.
    fn worker_count(&self) -> usize;

    /// The role of this worker.
    fn role(&self) -> Role {
        if self.worker_id() == COORDINATOR {
            Role::Coordinator
        } else {
            Role::Worker
        }
    }

    /// Share the image dimensions of the coordinator.
    ///
    /// The coordinator passes `Some(size)`, the other workers `None`. Every worker
    /// returns the coordinator's size.
    fn broadcast_size(&self, size: Option<ImageSize>) -> Result<ImageSize, DistError>;

    /// Share the pixels of the coordinator.
    ///
    /// On the coordinator `pixels` is the source and stays untouched; on the other
    /// workers it is replaced by a private copy of the coordinator's pixels.
    fn broadcast_pixels(&self, pixels: &mut Vec<u8>) -> Result<(), DistError>;

    /// Collect every worker's local output at the coordinator.
    ///
    /// Worker `i` contributes `layout.counts()[i]` bytes placed at
    /// `layout.displacements()[i]`. The coordinator returns the assembled buffer,
    /// the other workers `None`.
    fn gather(&self, local: Vec<u8>, layout: &GatherLayout) -> Result<Option<Vec<u8>>, DistError>;

    /// Abort the run for every other worker.
    fn abort(&self, stage: Phase, reason: &str);
}

/// A message exchanged between local workers.
#[derive(Debug)]
enum Message {
    Dimensions(ImageSize),
    Pixels(Vec<u8>),
    Contribution { worker_id: usize, bytes: Vec<u8> },
    Abort { worker_id: usize, stage: Phase, reason: String },
}

impl Message {
    fn kind(&self) -> &'static str {
        match self {
            Message::Dimensions(_) => "dimensions",
            Message::Pixels(_) => "pixels",
            Message::Contribution { .. } => "contribution",
            Message::Abort { .. } => "abort",
        }
    }
}

/// Builder of the connected communicators of an in-process run.
pub struct LocalWorld;

impl LocalWorld {
    /// Create `worker_count` connected communicators, ordered by worker id.
    ///
    /// Each communicator is meant to be moved to its own thread.
    pub fn connect(worker_count: usize) -> Vec<LocalCommunicator> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..worker_count).map(|_| channel::<Message>()).unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(worker_id, inbox)| LocalCommunicator {
                worker_id,
                worker_count,
                peers: senders
                    .iter()
                    .enumerate()
                    .filter(|(peer, _)| *peer != worker_id)
                    .map(|(peer, tx)| (peer, tx.clone()))
                    .collect(),
                inbox,
                stage: Cell::new(Phase::Idle),
                closed: Cell::new(false),
            })
            .collect()
    }
}

/// One end of an in-process run, exchanging messages over channels.
///
/// Dropping a communicator before its last collective aborts the run, so a worker
/// that exits early or panics never leaves the others waiting.
pub struct LocalCommunicator {
    worker_id: usize,
    worker_count: usize,
    peers: Vec<(usize, Sender<Message>)>,
    inbox: Receiver<Message>,
    stage: Cell<Phase>,
    closed: Cell<bool>,
}

impl LocalCommunicator {
    fn send_to(&self, worker_id: usize, msg: Message) -> Result<(), DistError> {
        let stage = self.stage.get();
        let (_, tx) = self
            .peers
            .iter()
            .find(|(peer, _)| *peer == worker_id)
            .ok_or_else(|| DistError::InvalidParameter(format!("no worker {worker_id}")))?;
        tx.send(msg).map_err(|_| DistError::Disconnected { stage })
    }

    fn recv(&self) -> Result<Message, DistError> {
        let stage = self.stage.get();
        match self.inbox.recv() {
            Ok(Message::Abort {
                worker_id,
                stage: remote_stage,
                reason,
            }) => {
                log::warn!(
                    "worker {}: worker {worker_id} aborted during {remote_stage}: {reason}",
                    self.worker_id
                );
                self.closed.set(true);
                Err(DistError::Aborted { stage, worker_id })
            }
            Ok(msg) => Ok(msg),
            Err(_) => Err(DistError::Disconnected { stage }),
        }
    }

    fn copy_pixels(&self, pixels: &[u8]) -> Result<Vec<u8>, DistError> {
        let mut copy = Vec::new();
        copy.try_reserve_exact(pixels.len())
            .map_err(|_| DistError::Resource {
                stage: Phase::BroadcastPixels,
                bytes: pixels.len(),
            })?;
        copy.extend_from_slice(pixels);
        Ok(copy)
    }
}

impl Communicator for LocalCommunicator {
    fn worker_id(&self) -> usize {
        self.worker_id
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn broadcast_size(&self, size: Option<ImageSize>) -> Result<ImageSize, DistError> {
        self.stage.set(Phase::BroadcastDimensions);
        match self.role() {
            Role::Coordinator => {
                let size = size.ok_or_else(|| {
                    DistError::InvalidParameter("the coordinator must provide a size".to_string())
                })?;
                for (peer, _) in &self.peers {
                    self.send_to(*peer, Message::Dimensions(size))?;
                }
                Ok(size)
            }
            Role::Worker => match self.recv()? {
                Message::Dimensions(size) => Ok(size),
                msg => Err(DistError::Protocol {
                    stage: Phase::BroadcastDimensions,
                    message: msg.kind(),
                }),
            },
        }
    }

    fn broadcast_pixels(&self, pixels: &mut Vec<u8>) -> Result<(), DistError> {
        self.stage.set(Phase::BroadcastPixels);
        match self.role() {
            Role::Coordinator => {
                for (peer, _) in &self.peers {
                    self.send_to(*peer, Message::Pixels(self.copy_pixels(pixels)?))?;
                }
                Ok(())
            }
            Role::Worker => match self.recv()? {
                Message::Pixels(received) => {
                    *pixels = received;
                    Ok(())
                }
                msg => Err(DistError::Protocol {
                    stage: Phase::BroadcastPixels,
                    message: msg.kind(),
                }),
            },
        }
    }

    fn gather(
        &self,
        local: Vec<u8>,
        layout: &GatherLayout,
    ) -> Result<Option<Vec<u8>>, DistError> {
        self.stage.set(Phase::GatherResults);

        if layout.num_workers() != self.worker_count {
            return Err(DistError::InvalidParameter(format!(
                "gather layout covers {} workers, expected {}",
                layout.num_workers(),
                self.worker_count
            )));
        }

        if self.role() == Role::Worker {
            self.send_to(
                COORDINATOR,
                Message::Contribution {
                    worker_id: self.worker_id,
                    bytes: local,
                },
            )?;
            self.closed.set(true);
            return Ok(None);
        }

        let mut assembled = Vec::new();
        assembled
            .try_reserve_exact(layout.total())
            .map_err(|_| DistError::Resource {
                stage: Phase::GatherResults,
                bytes: layout.total(),
            })?;
        assembled.resize(layout.total(), 0u8);

        let mut place = |worker_id: usize, bytes: &[u8]| -> Result<(), DistError> {
            let range = layout
                .range(worker_id)
                .ok_or_else(|| DistError::InvalidParameter(format!("no worker {worker_id}")))?;
            if bytes.len() != range.len() {
                return Err(DistError::InvalidContribution {
                    worker_id,
                    expected: range.len(),
                    got: bytes.len(),
                });
            }
            assembled[range].copy_from_slice(bytes);
            Ok(())
        };

        place(self.worker_id, &local)?;

        for _ in 0..self.peers.len() {
            match self.recv()? {
                Message::Contribution { worker_id, bytes } => place(worker_id, &bytes)?,
                msg => {
                    return Err(DistError::Protocol {
                        stage: Phase::GatherResults,
                        message: msg.kind(),
                    })
                }
            }
        }

        self.closed.set(true);
        Ok(Some(assembled))
    }

    fn abort(&self, stage: Phase, reason: &str) {
        self.closed.set(true);
        for (_, tx) in &self.peers {
            // peers that already finished have dropped their inbox
            let _ = tx.send(Message::Abort {
                worker_id: self.worker_id,
                stage,
                reason: reason.to_string(),
            });
        }
    }
}

impl Drop for LocalCommunicator {
    fn drop(&mut self) {
        if !self.closed.get() {
            self.abort(self.stage.get(), "worker exited before the end of the run");
        }
    }
}
