//! Concurrent compression pipeline
//!
//! A fixed pool of worker threads applies a [`Codec`] to a stream of named
//! byte buffers. A producer submits tasks on one FIFO queue, workers pop
//! them, transform them unlocked, and push them onto a second FIFO queue
//! that the consumer drains. Output order is completion order, not
//! submission order: a small task submitted late can finish before a large
//! task submitted early. Callers that need the original ordering must
//! reconstruct it from task names.
//!
//! An atomic gauge tracks the total bytes held by in-flight tasks across
//! both queues. Producers are expected to poll [`CompressionPipeline::memory_usage`]
//! against their configured ceiling and stall submission while it is
//! exceeded; this is advisory backpressure, not admission control.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::codec::Codec;
use crate::error::{Error, Result};

/// Default in-flight memory ceiling for producer backpressure (2 GiB).
pub const DEFAULT_MEMORY_LIMIT: usize = 1 << 31;

/// How long an idle worker waits on the input queue before re-checking the
/// stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// One named byte buffer moving through the pipeline.
///
/// Identity is the name; the payload is replaced by the transform's output.
/// Ownership moves producer -> pipeline -> consumer, so no two threads ever
/// hold a mutable view of the same task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Task identity, typically a filename.
    pub name: String,
    /// The bytes to transform, replaced in place by the result.
    pub payload: Vec<u8>,
}

impl Task {
    /// Create a task.
    #[must_use]
    pub fn new(name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Which codec operation the workers apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Run the codec's `compress` on every task.
    Compress,
    /// Run the codec's `decompress` on every task.
    Decompress,
}

/// Pipeline construction parameters.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Worker thread count; 0 means detected hardware parallelism
    /// (falling back to 4 when detection fails).
    pub threads: usize,
    /// Advisory in-flight memory ceiling in bytes.
    pub memory_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }
}

impl PipelineConfig {
    /// Resolve the configured thread count to a concrete worker count.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        if self.threads == 0 {
            let detected = num_cpus::get();
            if detected == 0 { 4 } else { detected }
        } else {
            self.threads
        }
    }
}

/// Per-task hook invoked on the worker's own thread.
///
/// Bodies must be cheap and safe to call from several threads at once; the
/// pipeline gives no ordering guarantee between callbacks of different
/// tasks.
pub type TaskCallback = Arc<dyn Fn(&Task) + Send + Sync>;

const STATE_IDLE: u8 = 0;
const STATE_COMPRESSING: u8 = 1;
const STATE_DECOMPRESSING: u8 = 2;

/// Everything a worker thread needs, cloned per worker.
struct WorkerContext {
    codec: Arc<dyn Codec + Send + Sync>,
    direction: Direction,
    input_rx: Receiver<Task>,
    output_tx: Sender<Task>,
    mem_usage: Arc<AtomicUsize>,
    should_stop: Arc<AtomicBool>,
    active_workers: Arc<AtomicUsize>,
    state: Arc<AtomicU8>,
    on_started: Option<TaskCallback>,
    on_finished: Option<TaskCallback>,
}

/// Fixed-size worker pool applying a codec to a stream of tasks.
pub struct CompressionPipeline {
    codec: Arc<dyn Codec + Send + Sync>,
    worker_count: usize,
    memory_limit: usize,
    input_tx: Sender<Task>,
    input_rx: Receiver<Task>,
    output_tx: Sender<Task>,
    output_rx: Receiver<Task>,
    mem_usage: Arc<AtomicUsize>,
    state: Arc<AtomicU8>,
    should_stop: Arc<AtomicBool>,
    active_workers: Arc<AtomicUsize>,
    handles: Vec<JoinHandle<()>>,
    on_started: Option<TaskCallback>,
    on_finished: Option<TaskCallback>,
}

impl CompressionPipeline {
    /// Create an idle pipeline over the given codec.
    #[must_use]
    pub fn new(codec: Arc<dyn Codec + Send + Sync>, config: &PipelineConfig) -> Self {
        let (input_tx, input_rx) = unbounded();
        let (output_tx, output_rx) = unbounded();
        Self {
            codec,
            worker_count: config.worker_count(),
            memory_limit: config.memory_limit,
            input_tx,
            input_rx,
            output_tx,
            output_rx,
            mem_usage: Arc::new(AtomicUsize::new(0)),
            state: Arc::new(AtomicU8::new(STATE_IDLE)),
            should_stop: Arc::new(AtomicBool::new(false)),
            active_workers: Arc::new(AtomicUsize::new(0)),
            handles: Vec::new(),
            on_started: None,
            on_finished: None,
        }
    }

    /// Register a hook fired just before a worker transforms a task.
    pub fn on_task_started(&mut self, callback: impl Fn(&Task) + Send + Sync + 'static) {
        self.on_started = Some(Arc::new(callback));
    }

    /// Register a hook fired just after a worker transforms a task.
    pub fn on_task_finished(&mut self, callback: impl Fn(&Task) + Send + Sync + 'static) {
        self.on_finished = Some(Arc::new(callback));
    }

    /// Number of worker threads the pool runs with.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Advisory in-flight memory ceiling.
    #[must_use]
    pub fn memory_limit(&self) -> usize {
        self.memory_limit
    }

    /// Total bytes currently held by in-flight task payloads.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.mem_usage.load(Ordering::SeqCst)
    }

    /// Enqueue a task. Safe to call concurrently with worker activity, and
    /// before `start` (tasks queue up until workers run).
    pub fn submit(&self, task: Task) {
        self.mem_usage.fetch_add(task.payload.len(), Ordering::SeqCst);
        // the pipeline owns the receiver half, so the channel cannot close
        let _ = self.input_tx.send(task);
    }

    /// Non-blocking poll of the output queue.
    pub fn try_take(&self) -> Option<Task> {
        let task = self.output_rx.try_recv().ok()?;
        self.mem_usage.fetch_sub(task.payload.len(), Ordering::SeqCst);
        Some(task)
    }

    /// Block until a result is available.
    pub fn take(&self) -> Task {
        loop {
            if let Some(task) = self.try_take() {
                return task;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Spawn the worker pool in the given direction.
    ///
    /// # Errors
    /// Returns [`Error::PipelineBusy`] if the pipeline is already running.
    pub fn start(&mut self, direction: Direction) -> Result<()> {
        let target = match direction {
            Direction::Compress => STATE_COMPRESSING,
            Direction::Decompress => STATE_DECOMPRESSING,
        };
        if self
            .state
            .compare_exchange(STATE_IDLE, target, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::PipelineBusy);
        }

        self.should_stop.store(false, Ordering::SeqCst);
        self.active_workers.store(self.worker_count, Ordering::SeqCst);

        for _ in 0..self.worker_count {
            let ctx = WorkerContext {
                codec: Arc::clone(&self.codec),
                direction,
                input_rx: self.input_rx.clone(),
                output_tx: self.output_tx.clone(),
                mem_usage: Arc::clone(&self.mem_usage),
                should_stop: Arc::clone(&self.should_stop),
                active_workers: Arc::clone(&self.active_workers),
                state: Arc::clone(&self.state),
                on_started: self.on_started.clone(),
                on_finished: self.on_finished.clone(),
            };
            self.handles.push(std::thread::spawn(move || worker_main(&ctx)));
        }

        Ok(())
    }

    /// Request cooperative shutdown. Workers finish their in-flight task
    /// and exit; already-queued input is left unprocessed.
    pub fn stop(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
    }

    /// Request shutdown and block until every worker has exited.
    pub fn stop_and_wait(&mut self) {
        self.stop();
        self.join_workers();
    }

    fn join_workers(&mut self) {
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::error!("compression worker panicked during shutdown");
            }
        }
        self.state.store(STATE_IDLE, Ordering::SeqCst);
    }
}

impl Drop for CompressionPipeline {
    fn drop(&mut self) {
        // teardown must never panic past this point
        if !self.handles.is_empty() {
            self.stop();
            self.join_workers();
        }
    }
}

fn worker_main(ctx: &WorkerContext) {
    while !ctx.should_stop.load(Ordering::SeqCst) {
        let task = match ctx.input_rx.recv_timeout(POLL_INTERVAL) {
            Ok(task) => task,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let input_size = task.payload.len();
        if let Some(callback) = &ctx.on_started {
            callback(&task);
        }

        let Task { name, payload } = task;
        let result = match ctx.direction {
            Direction::Compress => ctx.codec.compress(&payload),
            Direction::Decompress => ctx.codec.decompress(&payload),
        };
        let payload = match result {
            Ok(transformed) => transformed,
            Err(err) => {
                // a failing task must not wedge the pool; forward it
                // unchanged so the consumer's accounting stays correct
                tracing::error!("codec failed on task \"{name}\": {err}");
                payload
            }
        };
        let task = Task { name, payload };

        ctx.mem_usage.fetch_add(task.payload.len(), Ordering::SeqCst);
        ctx.mem_usage.fetch_sub(input_size, Ordering::SeqCst);

        if let Some(callback) = &ctx.on_finished {
            callback(&task);
        }
        let _ = ctx.output_tx.send(task);
    }

    // the last one out turns off the light
    if ctx.active_workers.fetch_sub(1, Ordering::SeqCst) == 1 {
        ctx.state.store(STATE_IDLE, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::codec::Zlc;

    fn pipeline(threads: usize) -> CompressionPipeline {
        let config = PipelineConfig {
            threads,
            ..PipelineConfig::default()
        };
        CompressionPipeline::new(Arc::new(Zlc::new()), &config)
    }

    #[test]
    fn single_worker_preserves_fifo_order() {
        let mut pipe = pipeline(1);
        pipe.submit(Task::new("a", vec![1; 100]));
        pipe.submit(Task::new("b", vec![2; 100]));
        pipe.submit(Task::new("c", vec![3; 100]));
        pipe.start(Direction::Compress).unwrap();

        let names: Vec<String> = (0..3).map(|_| pipe.take().name).collect();
        assert_eq!(names, ["a", "b", "c"]);
        pipe.stop_and_wait();
    }

    #[test]
    fn compress_then_decompress_roundtrips() {
        let payload = b"round and round and round it goes".repeat(20);

        let mut pipe = pipeline(2);
        pipe.start(Direction::Compress).unwrap();
        pipe.submit(Task::new("file", payload.clone()));
        let compressed = pipe.take();
        assert!(compressed.payload.len() < payload.len());
        pipe.stop_and_wait();

        pipe.start(Direction::Decompress).unwrap();
        pipe.submit(compressed);
        assert_eq!(pipe.take().payload, payload);
        pipe.stop_and_wait();
    }

    #[test]
    fn start_while_running_fails() {
        let mut pipe = pipeline(1);
        pipe.start(Direction::Compress).unwrap();
        assert!(matches!(
            pipe.start(Direction::Compress),
            Err(Error::PipelineBusy)
        ));
        pipe.stop_and_wait();
    }

    #[test]
    fn restart_after_stop_succeeds() {
        let mut pipe = pipeline(1);
        pipe.start(Direction::Compress).unwrap();
        pipe.stop_and_wait();
        pipe.start(Direction::Decompress).unwrap();
        pipe.stop_and_wait();
    }

    #[test]
    fn stop_with_outstanding_input_terminates() {
        let mut pipe = pipeline(2);
        for i in 0..100 {
            pipe.submit(Task::new(format!("task-{i}"), vec![0; 4096]));
        }
        pipe.start(Direction::Compress).unwrap();
        // do not drain; shutdown must still complete
        pipe.stop_and_wait();
    }

    #[test]
    fn memory_gauge_tracks_in_flight_bytes() {
        let mut pipe = pipeline(1);
        pipe.submit(Task::new("x", vec![0; 1000]));
        assert_eq!(pipe.memory_usage(), 1000);

        pipe.start(Direction::Compress).unwrap();
        let task = pipe.take();
        assert_eq!(pipe.memory_usage(), 0);
        drop(task);
        pipe.stop_and_wait();
    }

    #[test]
    fn callbacks_fire_per_task() {
        let started = Arc::new(Mutex::new(Vec::new()));
        let finished = Arc::new(Mutex::new(Vec::new()));

        let mut pipe = pipeline(1);
        {
            let started = Arc::clone(&started);
            pipe.on_task_started(move |task| started.lock().unwrap().push(task.name.clone()));
        }
        {
            let finished = Arc::clone(&finished);
            pipe.on_task_finished(move |task| finished.lock().unwrap().push(task.name.clone()));
        }
        pipe.start(Direction::Compress).unwrap();
        pipe.submit(Task::new("one", vec![1; 10]));
        pipe.submit(Task::new("two", vec![2; 10]));
        let _ = pipe.take();
        let _ = pipe.take();
        pipe.stop_and_wait();

        assert_eq!(*started.lock().unwrap(), ["one", "two"]);
        assert_eq!(*finished.lock().unwrap(), ["one", "two"]);
    }

    #[test]
    fn failing_task_is_forwarded_unchanged() {
        use crate::codec::Rle0;

        // Rle0::compress always fails; the task must still come out
        let config = PipelineConfig {
            threads: 1,
            ..PipelineConfig::default()
        };
        let mut pipe = CompressionPipeline::new(Arc::new(Rle0::new()), &config);
        pipe.start(Direction::Compress).unwrap();
        pipe.submit(Task::new("doomed", vec![9; 32]));
        let task = pipe.take();
        assert_eq!(task.name, "doomed");
        assert_eq!(task.payload, vec![9; 32]);
        pipe.stop_and_wait();
    }
}
