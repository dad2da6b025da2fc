// Perigee
// Copyright (c) 2025 The Project Perigee Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `processor` module implements the compression worker.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{Receiver, SendTimeoutError, Sender};
use log::{debug, info, warn};

use perigee_codec_nls::{NlsEncoder, NlsOptions};
use perigee_core::buf::SharedBufferPool;

use crate::block::DataBlock;
use crate::checkpoint::{Checkpoint, CheckpointState};

/// The recommended pool element length: enough for a 4096-sample block in any state.
pub const ENCODING_BUFFER_LENGTH: usize = 16500;

/// Worker configuration.
#[derive(Clone, Copy, Debug)]
pub struct ProcessorConfig {
    /// How long one loop iteration blocks on the input queue.
    pub receive_timeout: Duration,
    /// How long each output send attempt may block.
    pub retry_timeout: Duration,
    /// How many times a failed output send is retried before the block is dropped.
    pub max_send_retries: u8,
    /// Encoder options applied to every block.
    pub encoder: NlsOptions,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig {
            receive_timeout: Duration::from_secs(5),
            retry_timeout: Duration::from_millis(500),
            max_send_retries: 5,
            encoder: NlsOptions::default(),
        }
    }
}

/// Monotonic per-worker block counters.
#[derive(Default)]
pub struct BlockCounters {
    incoming: AtomicU32,
    processed: AtomicU32,
    forwarded: AtomicU32,
    lost: AtomicU32,
}

impl BlockCounters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            incoming: self.incoming.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.incoming.store(0, Ordering::Relaxed);
        self.processed.store(0, Ordering::Relaxed);
        self.forwarded.store(0, Ordering::Relaxed);
        self.lost.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time copy of the worker counters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CounterSnapshot {
    /// Blocks received from the input queue.
    pub incoming: u32,
    /// Blocks transformed and encoded.
    pub processed: u32,
    /// Encoded blocks delivered to the output queue.
    pub forwarded: u32,
    /// Blocks dropped on pool exhaustion or send-retry exhaustion.
    pub lost: u32,
}

/// The compression worker.
///
/// One worker owns one encoder and drains one input queue: blocks are transformed in place,
/// encoded into buffers allocated from the pool, and forwarded to the output queue in
/// reception order. Every failure is recovered locally and surfaced through the counters;
/// nothing here is fatal.
///
/// The worker starts suspended. Call [`enable`][DataProcessor::enable] (or
/// [`ProcessorHandle::enable`] after [`spawn`][DataProcessor::spawn]) to start processing.
pub struct DataProcessor {
    pool: SharedBufferPool,
    input: Receiver<DataBlock>,
    output: Sender<DataBlock>,
    config: ProcessorConfig,
    checkpoint: Arc<Checkpoint>,
    counters: Arc<BlockCounters>,
    running: Arc<AtomicBool>,
    heartbeat: Option<Sender<()>>,
    encoder: NlsEncoder,
}

impl DataProcessor {
    pub fn new(
        pool: SharedBufferPool,
        input: Receiver<DataBlock>,
        output: Sender<DataBlock>,
        config: ProcessorConfig,
    ) -> DataProcessor {
        DataProcessor {
            pool,
            input,
            output,
            config,
            checkpoint: Arc::new(Checkpoint::new(CheckpointState::Suspending)),
            counters: Arc::new(BlockCounters::default()),
            running: Arc::new(AtomicBool::new(true)),
            heartbeat: None,
            encoder: NlsEncoder::new(),
        }
    }

    /// Report liveness on the given channel once per loop iteration, including idle ones.
    pub fn set_heartbeat(&mut self, heartbeat: Sender<()>) {
        self.heartbeat = Some(heartbeat);
    }

    /// Enable the processing of blocks.
    pub fn enable(&self) {
        info!("processor enabled");
        self.checkpoint.resume();
    }

    /// Disable the processing of blocks. The worker parks when it next reaches its checkpoint.
    pub fn disable(&self) {
        info!("processor disabled");
        self.checkpoint.suspend();
    }

    pub fn is_enabled(&self) -> bool {
        self.checkpoint.is_running()
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub fn reset_counters(&self) {
        self.counters.reset();
    }

    /// Run one full processing iteration: wait for a block, compress it, forward the result.
    ///
    /// A receive timeout is not an error; the iteration simply reports the heartbeat and
    /// returns.
    pub fn process_single_block(&mut self, timeout: Duration) {
        if let Ok(mut block) = self.input.recv_timeout(timeout) {
            self.counters.incoming.fetch_add(1, Ordering::Relaxed);

            if let Some(out) = self.compress(&mut block) {
                // Release the raw buffer before possibly waiting on the output queue.
                drop(block);
                self.forward(out);
            }
        }

        if let Some(heartbeat) = &self.heartbeat {
            let _ = heartbeat.try_send(());
        }
    }

    /// The worker loop: pass the checkpoint, process one block, repeat.
    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.checkpoint.pass();

            // A stop request resumes the checkpoint to release the worker; re-check before
            // touching the queues.
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            self.process_single_block(self.config.receive_timeout);
        }
    }

    /// Move the worker onto a dedicated OS thread and return its control handle.
    pub fn spawn(mut self) -> ProcessorHandle {
        let checkpoint = Arc::clone(&self.checkpoint);
        let counters = Arc::clone(&self.counters);
        let running = Arc::clone(&self.running);

        let join = thread::Builder::new()
            .name("perigee-processor".to_owned())
            .spawn(move || self.run())
            .unwrap();

        ProcessorHandle { checkpoint, counters, running, join }
    }

    fn compress(&mut self, block: &mut DataBlock) -> Option<DataBlock> {
        block.apply_wavelet_transform();

        if block.coefficients().is_empty() {
            debug!("dropping block without coefficients: parameter={}", block.parameter_id());
            return None;
        }

        let Some(ptr) = self.pool.allocate()
        else {
            self.counters.lost.fetch_add(1, Ordering::Relaxed);
            warn!("buffer pool exhausted; dropping block: parameter={}", block.parameter_id());
            return None;
        };

        let mut out = DataBlock::new(
            ptr,
            block.parameter_id(),
            block.start_time(),
            block.sampling_rate(),
            block.blocksize(),
        );

        if !block.encode(&mut out, &mut self.encoder, &self.config.encoder) {
            return None;
        }

        self.counters.processed.fetch_add(1, Ordering::Relaxed);
        debug!(
            "encoded block: parameter={} bytes={}",
            out.parameter_id(),
            out.sample_count()
        );

        Some(out)
    }

    fn forward(&mut self, out: DataBlock) {
        let mut block = out;
        let mut attempt = 0;

        loop {
            match self.output.send_timeout(block, self.config.retry_timeout) {
                Ok(()) => {
                    self.counters.forwarded.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    self.counters.lost.fetch_add(1, Ordering::Relaxed);
                    warn!("output queue disconnected; dropping encoded block");
                    return;
                }
                Err(SendTimeoutError::Timeout(rejected)) => {
                    attempt += 1;

                    if attempt > self.config.max_send_retries {
                        self.counters.lost.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            "output queue full after {} retries; dropping encoded block",
                            self.config.max_send_retries
                        );
                        return;
                    }

                    block = rejected;
                }
            }
        }
    }
}

/// Control handle of a spawned worker.
pub struct ProcessorHandle {
    checkpoint: Arc<Checkpoint>,
    counters: Arc<BlockCounters>,
    running: Arc<AtomicBool>,
    join: thread::JoinHandle<()>,
}

impl ProcessorHandle {
    pub fn enable(&self) {
        info!("processor enabled");
        self.checkpoint.resume();
    }

    pub fn disable(&self) {
        info!("processor disabled");
        self.checkpoint.suspend();
    }

    pub fn is_enabled(&self) -> bool {
        self.checkpoint.is_running()
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub fn reset_counters(&self) {
        self.counters.reset();
    }

    /// Stop the worker and join its thread.
    ///
    /// Any block in flight finishes processing; a worker parked at its checkpoint or waiting
    /// on the input queue is released.
    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        self.checkpoint.resume();

        if self.join.join().is_err() {
            warn!("processor thread panicked");
        }
    }
}
