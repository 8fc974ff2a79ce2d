use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use crate::shared::frame::Frame;

/// What happens to a frame that arrives while the previous one is still
/// waiting to be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LateFramePolicy {
    /// Evict the waiting frame and keep the newest (bounded latency).
    Discard,
    /// Block the producer until the consumer catches up.
    Queue,
}

impl LateFramePolicy {
    pub fn from_discard_flag(always_discard_late_frames: bool) -> Self {
        if always_discard_late_frames {
            Self::Discard
        } else {
            Self::Queue
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Delivered after evicting a stale frame.
    ReplacedStale,
    /// Every receiver is gone.
    Closed,
}

/// Producer half of a single-slot frame channel.
///
/// Holds a receiver clone so it can evict the waiting frame itself;
/// consumers therefore see disconnection only once the sink is dropped.
pub struct FrameSink {
    tx: Sender<Frame>,
    evict_rx: Receiver<Frame>,
    policy: LateFramePolicy,
    dropped: Arc<AtomicUsize>,
}

/// Consumer half of a [`FrameSink`].
#[derive(Clone)]
pub struct FrameReceiver {
    rx: Receiver<Frame>,
    dropped: Arc<AtomicUsize>,
}

/// Creates a connected sink/receiver pair.
pub fn frame_channel(policy: LateFramePolicy) -> (FrameSink, FrameReceiver) {
    let (tx, rx) = crossbeam_channel::bounded::<Frame>(1);
    let dropped = Arc::new(AtomicUsize::new(0));
    (
        FrameSink {
            tx,
            evict_rx: rx.clone(),
            policy,
            dropped: dropped.clone(),
        },
        FrameReceiver { rx, dropped },
    )
}

impl FrameSink {
    pub fn policy(&self) -> LateFramePolicy {
        self.policy
    }

    pub fn deliver(&self, frame: Frame) -> Delivery {
        match self.policy {
            LateFramePolicy::Queue => match self.tx.send(frame) {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Closed,
            },
            LateFramePolicy::Discard => self.deliver_latest(frame),
        }
    }

    fn deliver_latest(&self, mut frame: Frame) -> Delivery {
        let mut replaced = false;
        loop {
            match self.tx.try_send(frame) {
                Ok(()) => {
                    return if replaced {
                        Delivery::ReplacedStale
                    } else {
                        Delivery::Delivered
                    };
                }
                Err(TrySendError::Full(returned)) => {
                    frame = returned;
                    // The consumer may win the race for the stale frame
                    if let Ok(stale) = self.evict_rx.try_recv() {
                        log::debug!("Discarding late frame {}", stale.index());
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        replaced = true;
                    }
                }
                Err(TrySendError::Disconnected(_)) => return Delivery::Closed,
            }
        }
    }

    pub fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl FrameReceiver {
    /// Blocks for the next frame; `None` once the sink is dropped and
    /// drained.
    pub fn recv(&self) -> Option<Frame> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Result<Frame, TryRecvError> {
        self.rx.try_recv()
    }

    pub fn receiver(&self) -> &Receiver<Frame> {
        &self.rx
    }

    pub fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}
