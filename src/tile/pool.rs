//! Reusable tile buffer pool.
//!
//! Animation playback fetches dozens of tiles per second, and allocating a
//! fresh sample buffer for each one costs more than decoding the tile. The
//! pool keeps a bounded free list of equally-sized `Vec<f32>` buffers;
//! leases hand buffers out and return them automatically when dropped.
//!
//! A lease holds only a `Weak` reference to the pool, so tearing the pool
//! down while tiles are still in flight is safe: an orphaned buffer is
//! freed directly instead of being returned.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, Weak};

use crate::error::PoolError;

/// Tile edge length in samples. Tiles are square.
pub const TILE_SIZE: usize = 256;

/// Samples per tile buffer.
pub const TILE_AREA: usize = TILE_SIZE * TILE_SIZE;

struct PoolState {
    free: Vec<Vec<f32>>,
    leased: usize,
    capacity: usize,
}

/// Bounded pool of reusable tile sample buffers.
///
/// Invariant: buffers in circulation (leased + free) never exceed the
/// configured capacity. At capacity with nothing free, [`TilePool::pull`]
/// fails with [`PoolError::Exhausted`] rather than growing or handing out
/// a live buffer.
pub struct TilePool {
    state: Mutex<PoolState>,
    buffer_len: usize,
}

impl TilePool {
    /// Create a pool of `capacity` buffers, each `buffer_len` samples long.
    ///
    /// Buffers are allocated lazily on first pull.
    pub fn new(capacity: usize, buffer_len: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PoolState {
                free: Vec::new(),
                leased: 0,
                capacity,
            }),
            buffer_len,
        })
    }

    /// Lease a buffer from the pool.
    ///
    /// Reuses a free buffer when one exists, allocates a new one while the
    /// pool is below capacity, and fails once everything is leased.
    /// Returned buffers are NaN-filled so edge tiles need no explicit
    /// padding pass.
    pub fn pull(self: &Arc<Self>) -> Result<PooledTile, PoolError> {
        let mut state = self.lock();

        let mut buf = match state.free.pop() {
            Some(buf) => buf,
            None => {
                if state.leased >= state.capacity {
                    return Err(PoolError::Exhausted {
                        leased: state.leased,
                        capacity: state.capacity,
                    });
                }
                vec![f32::NAN; self.buffer_len]
            }
        };
        buf.iter_mut().for_each(|v| *v = f32::NAN);
        state.leased += 1;

        Ok(PooledTile {
            buf: Some(buf),
            pool: Arc::downgrade(self),
        })
    }

    /// Return a buffer to the free list.
    ///
    /// Normally invoked by a lease's `Drop`; a buffer that would push the
    /// pool over capacity is freed instead.
    pub fn push(&self, buffer: Vec<f32>) {
        let mut state = self.lock();
        state.leased = state.leased.saturating_sub(1);
        if state.free.len() + state.leased < state.capacity {
            state.free.push(buffer);
        }
    }

    /// Raise the pool capacity by `n` buffers. Capacity never shrinks.
    pub fn grow(&self, n: usize) {
        self.lock().capacity += n;
    }

    /// Number of buffers currently leased out.
    pub fn leased_count(&self) -> usize {
        self.lock().leased
    }

    /// Number of buffers on the free list.
    pub fn free_count(&self) -> usize {
        self.lock().free.len()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        // A poisoned pool mutex means a panic mid-push/pull; the state is a
        // plain free list, so continuing with it is sound.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A leased tile buffer.
///
/// Dereferences to the sample slice. On drop, the buffer flows back to its
/// pool if the pool is still alive and below capacity; otherwise it is
/// freed directly.
pub struct PooledTile {
    buf: Option<Vec<f32>>,
    pool: Weak<TilePool>,
}

impl Deref for PooledTile {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledTile {
    fn deref_mut(&mut self) -> &mut [f32] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledTile {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            if let Some(pool) = self.pool.upgrade() {
                pool.push(buf);
            }
        }
    }
}

impl std::fmt::Debug for PooledTile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledTile")
            .field("len", &self.len())
            .finish()
    }
}
