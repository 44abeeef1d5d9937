//! One-shot block/release primitive shared by prompts and pagination

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Misuse of a gate. These are programming errors, not conditions to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("gate is already closed")]
    AlreadyClosed,
    #[error("gate is already open")]
    AlreadyOpen,
}

enum Phase {
    /// Idle, nobody waiting
    Open,
    /// A caller is suspended in `close()`
    Closed(oneshot::Sender<()>),
    /// Opened during this cycle; a pending `close()` returns immediately
    Released,
}

struct GateState {
    phase: Phase,
    /// Incremented each time a `close()` call completes
    cycle: u64,
}

impl GateState {
    fn release(&mut self) -> Result<(), GateError> {
        match std::mem::replace(&mut self.phase, Phase::Released) {
            Phase::Open => Ok(()),
            Phase::Closed(waiter) => {
                let _ = waiter.send(());
                Ok(())
            }
            Phase::Released => Err(GateError::AlreadyOpen),
        }
    }

    fn finish_cycle(&mut self) {
        self.phase = Phase::Open;
        self.cycle += 1;
    }
}

/// Blocks one waiter until another task opens it.
///
/// A gate serves one in-flight wait at a time. Each completed `close()` starts a
/// new cycle; [`GateOpener`]s handed out during a cycle only act on that cycle,
/// so a producer that fires late can never release a later wait.
#[derive(Clone)]
pub struct Gate {
    state: Arc<Mutex<GateState>>,
}

impl Gate {
    /// Create a gate in the open state
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(GateState {
                phase: Phase::Open,
                cycle: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Suspend the calling task until the gate is opened.
    ///
    /// Returns immediately when `open()` already ran during this cycle.
    pub async fn close(&self) -> Result<(), GateError> {
        let waiter = {
            let mut state = self.lock();
            match state.phase {
                Phase::Closed(_) => return Err(GateError::AlreadyClosed),
                Phase::Released => {
                    state.finish_cycle();
                    return Ok(());
                }
                Phase::Open => {
                    let (tx, rx) = oneshot::channel();
                    state.phase = Phase::Closed(tx);
                    rx
                }
            }
        };

        // Ends the cycle on wake-up and also when the waiting future is dropped.
        let _cycle = CycleGuard { gate: self };
        let _ = waiter.await;
        Ok(())
    }

    /// Release the waiter, or mark the gate so the next `close()` does not block.
    pub fn open(&self) -> Result<(), GateError> {
        self.lock().release()
    }

    /// Idempotent release of the current cycle. Returns whether this call opened the gate.
    pub fn release(&self) -> bool {
        self.lock().release().is_ok()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.lock().phase, Phase::Closed(_))
    }

    /// Producer handle bound to the current cycle
    pub fn opener(&self) -> GateOpener {
        GateOpener {
            cycle: self.lock().cycle,
            gate: self.clone(),
        }
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

struct CycleGuard<'a> {
    gate: &'a Gate,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.gate.lock().finish_cycle();
    }
}

/// Release side of a gate for racing producers (timeout, cancel button, matched reply).
///
/// Only the first effective `open()` within the bound cycle wins; every other call,
/// including calls after the cycle ended, is silently ignored.
#[derive(Clone)]
pub struct GateOpener {
    gate: Gate,
    cycle: u64,
}

impl GateOpener {
    pub fn open(&self) -> bool {
        let mut state = self.gate.lock();
        if state.cycle != self.cycle {
            return false;
        }
        state.release().is_ok()
    }

    /// Whether the bound cycle was already released or has ended
    pub fn is_spent(&self) -> bool {
        let state = self.gate.lock();
        state.cycle != self.cycle || matches!(state.phase, Phase::Released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_open_releases_waiter() {
        let gate = Gate::new();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.close().await })
        };

        while !gate.is_closed() {
            tokio::task::yield_now().await;
        }
        gate.open().unwrap();

        waiter.await.unwrap().unwrap();
        assert!(!gate.is_closed());
    }

    #[tokio::test]
    async fn test_open_before_close_is_not_lost() {
        let gate = Gate::new();
        gate.open().unwrap();

        tokio::time::timeout(Duration::from_secs(1), gate.close())
            .await
            .expect("close must not block after an earlier open")
            .unwrap();
    }

    #[tokio::test]
    async fn test_double_open_is_an_error() {
        let gate = Gate::new();
        gate.open().unwrap();
        assert_eq!(gate.open(), Err(GateError::AlreadyOpen));
    }

    #[tokio::test]
    async fn test_double_close_is_an_error() {
        let gate = Gate::new();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.close().await })
        };
        while !gate.is_closed() {
            tokio::task::yield_now().await;
        }

        assert_eq!(gate.close().await, Err(GateError::AlreadyClosed));

        gate.open().unwrap();
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_opener_first_wins() {
        let gate = Gate::new();
        let timeout = gate.opener();
        let cancel = gate.opener();

        assert!(cancel.open());
        assert!(!timeout.open());
        assert!(timeout.is_spent());
        gate.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_opener_cannot_release_next_cycle() {
        let gate = Gate::new();
        let stale = gate.opener();
        assert!(stale.open());
        gate.close().await.unwrap();

        // A late producer from the finished cycle must not pre-release the next wait
        assert!(!stale.open());
        assert!(tokio::time::timeout(Duration::from_millis(20), gate.close())
            .await
            .is_err());

        // The dropped close future must leave the gate reusable
        assert!(!gate.is_closed());
        assert!(gate.opener().open());
        gate.close().await.unwrap();
    }

    /// Seeded xorshift so a failing trial can be replayed
    struct Jitter(u64);

    impl Jitter {
        fn next(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }

        /// A random number of scheduler yields and busy spins
        async fn pause(&mut self) {
            for _ in 0..self.next() % 8 {
                tokio::task::yield_now().await;
            }
            for _ in 0..self.next() % 512 {
                std::hint::spin_loop();
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_open_close_race_never_hangs() {
        let mut closer = Jitter(0x2545_F491_4F6C_DD1D);
        for trial in 0..1000u32 {
            let gate = Gate::new();
            let mut opener = Jitter(closer.next() | 1);

            let producer = {
                let gate = gate.clone();
                tokio::spawn(async move {
                    opener.pause().await;
                    gate.open()
                })
            };

            closer.pause().await;
            tokio::time::timeout(Duration::from_secs(5), gate.close())
                .await
                .unwrap_or_else(|_| panic!("trial {} hung", trial))
                .unwrap();
            producer.await.unwrap().unwrap();
        }
    }
}
