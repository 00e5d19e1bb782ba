//! Background elevation loading with per-tile deduplication and cancellation.
//!
//! Requests go through a bounded channel to a pool of worker threads, which
//! call [`TerrainProvider::fetch`] and send finished tiles back. The frame
//! loop collects them with [`TerrainLoader::drain`]. In
//! [`LoaderMode::Deferred`] there are no workers: queued requests run inside
//! the next `drain`, which makes load timing deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, unbounded};
use dashmap::DashMap;
use orbis_math::LonLat;

use crate::{CancelToken, TerrainError, TerrainProvider, TerrainRequest, TerrainTile, TileKey};

/// How requests are executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoaderMode {
    /// A pool of worker threads.
    Threaded { threads: usize },
    /// Requests submitted during one frame complete in the next `drain`.
    Deferred,
}

/// A finished request.
#[derive(Debug)]
pub struct LoadedTerrain {
    pub key: TileKey,
    /// Token the request was submitted with; compare with
    /// [`CancelToken::same_as`] before applying.
    pub token: CancelToken,
    pub result: Result<TerrainTile, TerrainError>,
    /// Time spent inside the provider, in microseconds.
    pub elapsed_us: u64,
}

struct TileJob {
    request: TerrainRequest,
    token: CancelToken,
}

enum Job {
    Tile(TileJob),
    Height {
        lonlat: LonLat,
        zoom: u8,
        reply: Sender<Option<f64>>,
    },
}

/// A point elevation query that resolves asynchronously.
pub struct HeightQuery {
    receiver: Receiver<Option<f64>>,
    resolved: Option<Option<f64>>,
}

impl HeightQuery {
    fn poll(&mut self) {
        if self.resolved.is_none() {
            match self.receiver.try_recv() {
                Ok(value) => self.resolved = Some(value),
                Err(TryRecvError::Disconnected) => self.resolved = Some(None),
                Err(TryRecvError::Empty) => {}
            }
        }
    }

    pub fn is_ready(&mut self) -> bool {
        self.poll();
        self.resolved.is_some()
    }

    /// `None` while pending, `Some(None)` if the position has no elevation.
    pub fn try_get(&mut self) -> Option<Option<f64>> {
        self.poll();
        self.resolved
    }

    /// Block until the query resolves or `timeout` elapses.
    pub fn wait(mut self, timeout: Duration) -> Option<f64> {
        self.poll();
        match self.resolved {
            Some(value) => value,
            None => self.receiver.recv_timeout(timeout).ok().flatten(),
        }
    }
}

/// Streams terrain tiles from a provider.
pub struct TerrainLoader {
    provider: Arc<dyn TerrainProvider>,
    mode: LoaderMode,
    job_sender: Sender<Job>,
    /// Only read directly in deferred mode; workers hold their own clones.
    job_receiver: Receiver<Job>,
    result_sender: Sender<LoadedTerrain>,
    result_receiver: Receiver<LoadedTerrain>,
    pending: Arc<DashMap<TileKey, CancelToken>>,
    in_flight: Arc<AtomicU64>,
    max_in_flight: usize,
}

impl TerrainLoader {
    /// Create a loader. `max_in_flight` bounds queued plus executing tile
    /// requests; further submissions are rejected until results drain.
    pub fn new(
        provider: Arc<dyn TerrainProvider>,
        mode: LoaderMode,
        max_in_flight: usize,
    ) -> Result<Self, TerrainError> {
        let max_in_flight = max_in_flight.max(1);
        let (job_sender, job_receiver) = bounded::<Job>(max_in_flight * 2);
        let (result_sender, result_receiver) = unbounded::<LoadedTerrain>();
        let in_flight = Arc::new(AtomicU64::new(0));

        if let LoaderMode::Threaded { threads } = mode {
            for i in 0..threads.max(1) {
                let receiver = job_receiver.clone();
                let sender = result_sender.clone();
                let provider = Arc::clone(&provider);
                let in_flight = Arc::clone(&in_flight);

                std::thread::Builder::new()
                    .name(format!("terrain-loader-{i}"))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            match job {
                                Job::Tile(job) => {
                                    if let Some(loaded) = run_tile_job(provider.as_ref(), job) {
                                        let _ = sender.send(loaded);
                                    }
                                    in_flight.fetch_sub(1, Ordering::Relaxed);
                                }
                                Job::Height { lonlat, zoom, reply } => {
                                    let _ = reply.send(provider.height_at(&lonlat, zoom));
                                }
                            }
                        }
                    })
                    .map_err(TerrainError::Spawn)?;
            }
        }

        tracing::debug!(provider = provider.name(), ?mode, max_in_flight, "terrain loader started");

        Ok(Self {
            provider,
            mode,
            job_sender,
            job_receiver,
            result_sender,
            result_receiver,
            pending: Arc::new(DashMap::new()),
            in_flight,
            max_in_flight,
        })
    }

    /// A threaded loader sized to the machine.
    pub fn with_defaults(provider: Arc<dyn TerrainProvider>) -> Result<Self, TerrainError> {
        let cpus = num_cpus::get().max(2);
        let threads = (cpus - 2).clamp(1, 8);
        Self::new(provider, LoaderMode::Threaded { threads }, 64)
    }

    pub fn provider(&self) -> &Arc<dyn TerrainProvider> {
        &self.provider
    }

    pub fn mode(&self) -> LoaderMode {
        self.mode
    }

    /// Queue a tile request.
    ///
    /// A request for a key that is already pending returns the existing
    /// token. Returns `Err(request)` when the loader is saturated.
    #[allow(clippy::result_large_err)]
    pub fn submit(&self, request: TerrainRequest) -> Result<CancelToken, TerrainRequest> {
        if let Some(token) = self.pending.get(&request.key) {
            return Ok(token.clone());
        }
        if self.in_flight.load(Ordering::Relaxed) >= self.max_in_flight as u64 {
            return Err(request);
        }

        let key = request.key;
        let token = CancelToken::new();
        self.pending.insert(key, token.clone());
        self.in_flight.fetch_add(1, Ordering::Relaxed);

        let job = Job::Tile(TileJob {
            request: request.clone(),
            token: token.clone(),
        });
        if self.job_sender.try_send(job).is_err() {
            self.in_flight.fetch_sub(1, Ordering::Relaxed);
            self.pending.remove(&key);
            return Err(request);
        }
        Ok(token)
    }

    /// Cancel a pending request. Its result, if any, is never delivered.
    pub fn cancel(&self, key: &TileKey) {
        if let Some((_, token)) = self.pending.remove(key) {
            token.cancel();
        }
    }

    /// Cancel everything and ask the provider to stop network work.
    pub fn abort_all(&self) {
        let count = self.pending.len();
        self.pending.retain(|_, token| {
            token.cancel();
            false
        });
        self.provider.abort_loading();
        if count > 0 {
            tracing::debug!(count, "aborted pending terrain requests");
        }
    }

    /// Collect finished requests. Call once per frame on the main thread.
    pub fn drain(&self) -> Vec<LoadedTerrain> {
        if self.mode == LoaderMode::Deferred {
            while let Ok(job) = self.job_receiver.try_recv() {
                match job {
                    Job::Tile(job) => {
                        if let Some(loaded) = run_tile_job(self.provider.as_ref(), job) {
                            let _ = self.result_sender.send(loaded);
                        }
                        self.in_flight.fetch_sub(1, Ordering::Relaxed);
                    }
                    Job::Height { lonlat, zoom, reply } => {
                        let _ = reply.send(self.provider.height_at(&lonlat, zoom));
                    }
                }
            }
        }

        let mut results = Vec::new();
        while let Ok(loaded) = self.result_receiver.try_recv() {
            // A newer request for the same key keeps its entry.
            self.pending
                .remove_if(&loaded.key, |_, token| token.same_as(&loaded.token));
            if loaded.token.is_cancelled() {
                continue;
            }
            results.push(loaded);
        }
        results
    }

    /// Query elevation at a single position without blocking the caller.
    ///
    /// Deferred loaders answer immediately.
    pub fn request_height(&self, lonlat: LonLat, zoom: u8) -> HeightQuery {
        let (reply, receiver) = bounded(1);
        match self.mode {
            LoaderMode::Deferred => {
                let _ = reply.send(self.provider.height_at(&lonlat, zoom));
            }
            LoaderMode::Threaded { .. } => {
                // A full queue drops `reply`, which resolves the query to `None`.
                let _ = self.job_sender.try_send(Job::Height { lonlat, zoom, reply });
            }
        }
        HeightQuery {
            receiver,
            resolved: None,
        }
    }

    pub fn is_pending(&self, key: &TileKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Tile requests queued or executing.
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}

fn run_tile_job(provider: &dyn TerrainProvider, job: TileJob) -> Option<LoadedTerrain> {
    if job.token.is_cancelled() {
        return None;
    }
    let key = job.request.key;
    let start = Instant::now();
    let result = provider.fetch(&job.request).and_then(|tile| {
        tile.validate(&key)?;
        Ok(tile)
    });
    let elapsed_us = start.elapsed().as_micros() as u64;

    if job.token.is_cancelled() {
        return None;
    }
    match &result {
        Ok(_) | Err(TerrainError::NoData(_)) => {}
        Err(err) => tracing::warn!(%key, %err, "terrain request failed"),
    }
    Some(LoadedTerrain {
        key,
        token: job.token,
        result,
        elapsed_us,
    })
}
