// src/engine/interrupt.rs

//! One-shot run-wide interrupt, fired on Ctrl-C.
//!
//! Unlike the per-sampler oneshot stops, an [`Interrupt`] can be cloned into
//! every running command and checked repeatedly.

use tokio::sync::watch;

/// Sending half. Firing is idempotent.
#[derive(Debug)]
pub struct InterruptHandle(watch::Sender<bool>);

impl InterruptHandle {
    pub fn fire(&self) {
        self.0.send_replace(true);
    }
}

/// Receiving half.
#[derive(Debug, Clone)]
pub struct Interrupt(watch::Receiver<bool>);

/// A connected handle and interrupt, not yet fired.
pub fn interrupt_channel() -> (InterruptHandle, Interrupt) {
    let (tx, rx) = watch::channel(false);
    (InterruptHandle(tx), Interrupt(rx))
}

impl Interrupt {
    /// An interrupt that never fires.
    pub fn never() -> Self {
        interrupt_channel().1
    }

    pub fn is_fired(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once fired. Pends forever if the handle is dropped unfired.
    pub async fn fired(&self) {
        let mut rx = self.0.clone();
        let handle_gone = rx.wait_for(|fired| *fired).await.is_err();
        if handle_gone {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::never()
    }
}
