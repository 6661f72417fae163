// Offer traffic simulation against a single cache
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use rand::Rng;
use serde::{Serialize, Deserialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, debug, trace, warn};

use crate::cache::{CacheError, OfferCache};
use crate::config::{AppConfig, SimulationConfig, manager};
use crate::metrics::collector::MetricsSnapshot;
use crate::offer::{Offer, OfferId};

/// Resources carried by a simulated offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub cpus: f64,
    pub mem_mb: u64,
}

/// Simulation error types
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Invalid simulation configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("Simulation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Outcome of a finished simulation run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub issued: u64,
    pub rescind_requests: u64,
    pub delivered: u64,
    pub cache: MetricsSnapshot,
}

#[derive(Debug, Default)]
struct Counters {
    issued: AtomicU64,
    rescind_requests: AtomicU64,
    delivered: AtomicU64,
}

/// Drives producers, a rescinder and scheduling workers against one cache
pub struct Simulation {
    cache: Arc<OfferCache<Resources>>,
    config: SimulationConfig,
    counters: Arc<Counters>,
}

impl Simulation {
    pub fn new(config: &AppConfig) -> Result<Self, SimulationError> {
        manager::validate(config).map_err(SimulationError::InvalidConfig)?;

        Ok(Self {
            cache: Arc::new(OfferCache::from_config(&config.cache)?),
            config: config.simulation.clone(),
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn cache(&self) -> Arc<OfferCache<Resources>> {
        self.cache.clone()
    }

    /// Run until the configured duration elapses or `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<SimulationReport, SimulationError> {
        info!(
            "🚀 Simulating {} producers and {} workers against a cache of {} offers",
            self.config.producers, self.config.workers, self.cache.capacity()
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        // Recently issued ids, a fraction of which the issuer later withdraws
        let (issued_tx, issued_rx) = mpsc::channel(1024);

        let mut tasks: Vec<JoinHandle<Result<(), SimulationError>>> = Vec::new();

        for producer_id in 0..self.config.producers {
            tasks.push(tokio::spawn(producer_loop(
                producer_id,
                self.cache.clone(),
                self.counters.clone(),
                Duration::from_millis(self.config.push_interval_ms),
                issued_tx.clone(),
                stop_rx.clone(),
            )));
        }
        drop(issued_tx);

        tasks.push(tokio::spawn(rescind_loop(
            self.cache.clone(),
            self.counters.clone(),
            self.config.rescind_ratio,
            issued_rx,
            stop_rx.clone(),
        )));

        for worker_id in 0..self.config.workers {
            tasks.push(tokio::spawn(worker_loop(
                worker_id,
                self.cache.clone(),
                self.counters.clone(),
                Duration::from_millis(self.config.pop_timeout_ms),
                Duration::from_millis(self.config.work_time_ms),
                stop_rx.clone(),
            )));
        }

        tasks.push(tokio::spawn(report_loop(
            self.cache.clone(),
            Duration::from_secs(self.config.report_interval_secs),
            stop_rx,
        )));

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(self.config.duration_secs)) => {
                info!("Simulation time elapsed");
            }
            _ = shutdown.changed() => {
                warn!("Shutdown requested, stopping simulation");
            }
        }

        let _ = stop_tx.send(true);
        for task in tasks {
            task.await??;
        }

        Ok(self.report())
    }

    fn report(&self) -> SimulationReport {
        SimulationReport {
            issued: self.counters.issued.load(Ordering::Relaxed),
            rescind_requests: self.counters.rescind_requests.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            cache: self.cache.metrics(),
        }
    }
}

fn random_offer(producer_id: usize) -> Offer<Resources> {
    let mut rng = rand::thread_rng();
    let agent = rng.gen_range(0..64);
    let resources = Resources {
        cpus: f64::from(rng.gen_range(1..=16u32)) / 2.0,
        mem_mb: rng.gen_range(1..=64) * 256,
    };

    Offer::new(
        uuid::Uuid::new_v4().to_string(),
        format!("agent-{}-{}", producer_id, agent),
        resources,
    )
}

async fn producer_loop(
    producer_id: usize,
    cache: Arc<OfferCache<Resources>>,
    counters: Arc<Counters>,
    push_interval: Duration,
    issued: mpsc::Sender<OfferId>,
    mut stop: watch::Receiver<bool>,
) -> Result<(), SimulationError> {
    let mut interval = tokio::time::interval(push_interval);
    debug!("Producer {} started", producer_id);

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = interval.tick() => {
                let offer = random_offer(producer_id);
                let id = offer.id.clone();
                cache.push(offer)?;
                counters.issued.fetch_add(1, Ordering::Relaxed);

                // Rescind tracking is best effort; a full channel just skips this id
                let _ = issued.try_send(id);
            }
        }
    }

    debug!("Producer {} stopped", producer_id);
    Ok(())
}

async fn rescind_loop(
    cache: Arc<OfferCache<Resources>>,
    counters: Arc<Counters>,
    rescind_ratio: f64,
    mut issued: mpsc::Receiver<OfferId>,
    mut stop: watch::Receiver<bool>,
) -> Result<(), SimulationError> {
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            id = issued.recv() => {
                let Some(id) = id else { break };
                if rand::thread_rng().gen_bool(rescind_ratio) {
                    counters.rescind_requests.fetch_add(1, Ordering::Relaxed);
                    cache.rescind(&id);
                }
            }
        }
    }

    Ok(())
}

async fn worker_loop(
    worker_id: usize,
    cache: Arc<OfferCache<Resources>>,
    counters: Arc<Counters>,
    pop_timeout: Duration,
    work_time: Duration,
    mut stop: watch::Receiver<bool>,
) -> Result<(), SimulationError> {
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            popped = tokio::time::timeout(pop_timeout, cache.pop()) => match popped {
                Ok(offer) => {
                    trace!(
                        "Worker {} scheduling against offer {} from {} ({} cpus, {} MB)",
                        worker_id, offer.id, offer.source, offer.payload.cpus, offer.payload.mem_mb
                    );
                    counters.delivered.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(work_time).await;
                }
                Err(_) => trace!("Worker {} idle for {:?}", worker_id, pop_timeout),
            },
        }
    }

    debug!("Worker {} stopped", worker_id);
    Ok(())
}

async fn report_loop(
    cache: Arc<OfferCache<Resources>>,
    report_interval: Duration,
    mut stop: watch::Receiver<bool>,
) -> Result<(), SimulationError> {
    let mut interval = tokio::time::interval(report_interval);
    // The first tick fires immediately
    interval.tick().await;

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = interval.tick() => {
                let snapshot = cache.metrics();
                info!(
                    "📊 cached {}/{} | waiting {} | pushed {} | evicted {} | rescinded {} | popped {}",
                    snapshot.len, snapshot.capacity, snapshot.waiting, snapshot.pushed,
                    snapshot.evicted, snapshot.rescinded, snapshot.popped
                );
            }
        }
    }

    Ok(())
}
