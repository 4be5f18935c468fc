//! Background fetch-and-decode worker
//!
//! A worker task on the shared tokio runtime receives jobs over a channel,
//! runs at most `max_concurrent` of them at once and reports progress and
//! decoded images back over a second channel. The frame thread drains that
//! channel without blocking.

use std::collections::VecDeque;
use std::sync::Arc;

use image::RgbaImage;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::core::error::Error;
use crate::streaming::source::ResourceSource;

/// Turns fetched bytes into pixels. Runs on the blocking pool.
pub type Decoder = Arc<dyn Fn(Vec<u8>) -> Result<RgbaImage, Error> + Send + Sync>;

/// One unit of work: try each path in order until one fetches.
#[derive(Clone, Debug)]
pub struct FetchJob<K> {
    pub key: K,
    pub paths: Vec<String>,
}

/// Report from the worker
#[derive(Debug)]
pub enum FetchEvent<K> {
    Progress { key: K, loaded: u64, total: Option<u64> },
    Finished { key: K, result: Result<RgbaImage, Error> },
}

/// Handle to a running worker task
pub struct FetchWorker<K> {
    job_tx: mpsc::UnboundedSender<FetchJob<K>>,
    event_rx: mpsc::UnboundedReceiver<FetchEvent<K>>,
}

impl<K: Copy + Send + std::fmt::Debug + 'static> FetchWorker<K> {
    /// Spawn the worker loop on `runtime`.
    ///
    /// # Arguments
    /// * `runtime` - Runtime the worker and its jobs run on
    /// * `source` - Where bytes come from
    /// * `decoder` - Conversion from fetched bytes to pixels
    /// * `max_concurrent` - Maximum number of jobs in flight
    pub fn spawn<S: ResourceSource>(runtime: &Handle, source: Arc<S>, decoder: Decoder, max_concurrent: usize) -> Self {
        let (job_tx, mut job_rx) = mpsc::unbounded_channel::<FetchJob<K>>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<FetchEvent<K>>();
        let max_concurrent = max_concurrent.max(1);

        runtime.spawn(async move {
            worker_loop(source, decoder, max_concurrent, &mut job_rx, event_tx).await;
        });

        Self { job_tx, event_rx }
    }

    /// Queue a job. Returns `false` if the worker has shut down.
    pub fn submit(&self, job: FetchJob<K>) -> bool {
        self.job_tx.send(job).is_ok()
    }

    /// Drain every event available right now (non-blocking).
    pub fn poll(&mut self) -> Vec<FetchEvent<K>> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait for the next event. Returns `None` once the worker is gone.
    pub async fn next_event(&mut self) -> Option<FetchEvent<K>> {
        self.event_rx.recv().await
    }
}

async fn worker_loop<K, S>(
    source: Arc<S>,
    decoder: Decoder,
    max_concurrent: usize,
    job_rx: &mut mpsc::UnboundedReceiver<FetchJob<K>>,
    event_tx: mpsc::UnboundedSender<FetchEvent<K>>,
) where
    K: Copy + Send + std::fmt::Debug + 'static,
    S: ResourceSource,
{
    let mut active = JoinSet::new();
    let mut queued: VecDeque<FetchJob<K>> = VecDeque::new();
    let mut open = true;

    loop {
        while active.len() < max_concurrent {
            let Some(job) = queued.pop_front() else { break };
            active.spawn(run_job(source.clone(), decoder.clone(), job, event_tx.clone()));
        }
        if !open && active.is_empty() {
            break;
        }

        tokio::select! {
            job = job_rx.recv(), if open => match job {
                Some(job) => queued.push_back(job),
                None => open = false,
            },
            Some(joined) = active.join_next(), if !active.is_empty() => {
                if let Err(e) = joined {
                    log::error!("Fetch task panicked: {}", e);
                }
            }
            else => break,
        }
    }
}

async fn run_job<K, S>(source: Arc<S>, decoder: Decoder, job: FetchJob<K>, events: mpsc::UnboundedSender<FetchEvent<K>>)
where
    K: Copy + Send + std::fmt::Debug + 'static,
    S: ResourceSource,
{
    let key = job.key;
    let mut last_error = None;

    for (attempt, path) in job.paths.iter().enumerate() {
        let progress_tx = events.clone();
        let mut progress = move |loaded: u64, total: Option<u64>| {
            let _ = progress_tx.send(FetchEvent::Progress { key, loaded, total });
        };
        match source.fetch(path, &mut progress).await {
            Ok(bytes) => {
                let decoder = decoder.clone();
                let result = match tokio::task::spawn_blocking(move || (*decoder)(bytes)).await {
                    Ok(result) => result,
                    Err(e) => Err(Error::Decode(format!("decode task failed: {}", e))),
                };
                let _ = events.send(FetchEvent::Finished { key, result });
                return;
            }
            Err(e) => {
                if attempt + 1 < job.paths.len() {
                    log::debug!("Fetch of {:?} from {} failed, trying fallback: {}", key, path, e);
                }
                last_error = Some(e);
            }
        }
    }

    let error = last_error.unwrap_or_else(|| Error::Fetch {
        url: String::new(),
        reason: format!("no path to fetch for {:?}", key),
    });
    let _ = events.send(FetchEvent::Finished { key, result: Err(error) });
}
