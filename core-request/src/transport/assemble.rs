//! Reassembly of chunked bodies.

use bytes::{Bytes, BytesMut};
use core_cache::Progress;

use crate::types::ProgressCallback;

/// Accumulates decoded chunks and reports progress after each one.
pub(crate) struct ChunkAssembler {
    buffer: BytesMut,
    total: Option<u64>,
    on_progress: Option<ProgressCallback>,
}

impl ChunkAssembler {
    pub(crate) fn new(total: Option<u64>, on_progress: Option<ProgressCallback>) -> Self {
        let capacity = total.map_or(0, |t| usize::try_from(t).unwrap_or(0));
        Self {
            buffer: BytesMut::with_capacity(capacity),
            total,
            on_progress,
        }
    }

    /// Learn the total from a later chunk if the first did not carry it.
    pub(crate) fn set_total_if_unknown(&mut self, total: Option<u64>) {
        if self.total.is_none() {
            self.total = total;
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) -> Progress {
        self.buffer.extend_from_slice(chunk);
        let progress = self.progress();
        if let Some(callback) = &self.on_progress {
            callback(progress);
        }
        progress
    }

    pub(crate) fn progress(&self) -> Progress {
        Progress::new(self.buffer.len() as u64, self.total)
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.progress().is_complete()
    }

    /// Bytes still missing from an announced total.
    pub(crate) fn shortfall(&self) -> Option<u64> {
        let total = self.total?;
        let loaded = self.buffer.len() as u64;
        (loaded < total).then(|| total - loaded)
    }

    pub(crate) fn finish(self) -> (Bytes, Progress) {
        let progress = self.progress();
        (self.buffer.freeze(), progress)
    }
}
