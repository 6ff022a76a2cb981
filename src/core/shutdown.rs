// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/birdwatch-rs

//! Explicit shutdown token for background workers

use tokio::sync::watch;

/// Create a connected trigger/signal pair
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx, fired: false })
}

/// Owned by whoever decides when workers should wind down
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Observed by workers. Dropping the trigger counts as shutdown.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
    fired: bool,
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        self.fired || *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                break;
            }
            if self.rx.changed().await.is_err() {
                break;
            }
        }
        self.fired = true;
    }
}
