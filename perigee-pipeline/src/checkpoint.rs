// Perigee
// Copyright (c) 2025 The Project Perigee Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `checkpoint` module implements a cooperative suspension gate.

use parking_lot::{Condvar, Mutex};

/// The state of a [`Checkpoint`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CheckpointState {
    /// Workers pass the checkpoint freely.
    Running,
    /// Workers park at the checkpoint until resumed.
    Suspending,
}

/// A cooperative gate between a worker and its controller.
///
/// The worker calls [`pass`][Checkpoint::pass] at one well-defined point per loop iteration;
/// the call returns immediately while the checkpoint is running and parks the worker while it
/// is suspending. The controller side ([`suspend`][Checkpoint::suspend],
/// [`resume`][Checkpoint::resume]) never blocks.
pub struct Checkpoint {
    state: Mutex<CheckpointState>,
    condvar: Condvar,
}

impl Checkpoint {
    pub fn new(initial: CheckpointState) -> Checkpoint {
        Checkpoint { state: Mutex::new(initial), condvar: Condvar::new() }
    }

    /// The current state.
    pub fn state(&self) -> CheckpointState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == CheckpointState::Running
    }

    /// Request suspension. The worker parks when it next reaches the checkpoint.
    pub fn suspend(&self) {
        *self.state.lock() = CheckpointState::Suspending;
    }

    /// Resume a suspended checkpoint and wake any parked worker.
    pub fn resume(&self) {
        *self.state.lock() = CheckpointState::Running;
        self.condvar.notify_all();
    }

    /// Pass the checkpoint, parking while it is suspended.
    pub fn pass(&self) {
        let mut state = self.state.lock();
        while *state == CheckpointState::Suspending {
            self.condvar.wait(&mut state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Checkpoint, CheckpointState};

    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn verify_pass_parks_until_resume() {
        let checkpoint = Arc::new(Checkpoint::new(CheckpointState::Suspending));
        let (tx, rx) = mpsc::channel();

        let worker = thread::spawn({
            let checkpoint = Arc::clone(&checkpoint);
            move || {
                checkpoint.pass();
                tx.send(()).unwrap();
            }
        });

        // The worker must be parked while the checkpoint suspends.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        checkpoint.resume();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());

        worker.join().unwrap();
    }

    #[test]
    fn verify_running_pass_is_free() {
        let checkpoint = Checkpoint::new(CheckpointState::Running);

        assert!(checkpoint.is_running());
        checkpoint.pass();

        checkpoint.suspend();
        assert_eq!(checkpoint.state(), CheckpointState::Suspending);

        checkpoint.resume();
        checkpoint.pass();
    }
}
