//! Resettable countdown that opens a gate on expiry

use super::GateOpener;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Default)]
struct Countdown {
    task: Option<JoinHandle<()>>,
    /// Bumped on every (re)start; a countdown only fires if its epoch is still current
    epoch: u64,
    armed: bool,
    fired: bool,
    cancelled: bool,
}

/// Delayed release for a [`Gate`](super::Gate), restarted by every qualifying event.
pub struct TimeoutRenewer {
    duration: Duration,
    opener: GateOpener,
    countdown: Arc<Mutex<Countdown>>,
}

impl TimeoutRenewer {
    pub fn new(duration: Duration, opener: GateOpener) -> Self {
        Self {
            duration,
            opener,
            countdown: Arc::new(Mutex::new(Countdown::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Countdown> {
        self.countdown.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Start the countdown, restarting it if it is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm(&self) {
        let mut countdown = self.lock();
        countdown.armed = true;
        self.restart(&mut countdown);
    }

    /// Restart a running countdown at the full duration.
    ///
    /// No-op if the renewer was never armed, has already fired, or was cancelled.
    pub fn reset(&self) {
        let mut countdown = self.lock();
        if countdown.armed {
            self.restart(&mut countdown);
        }
    }

    /// Permanently stop the countdown. Safe to race against an expiring timer.
    pub fn cancel(&self) {
        let mut countdown = self.lock();
        countdown.cancelled = true;
        if let Some(task) = countdown.task.take() {
            task.abort();
        }
    }

    pub fn has_fired(&self) -> bool {
        self.lock().fired
    }

    fn restart(&self, countdown: &mut Countdown) {
        if countdown.fired || countdown.cancelled {
            return;
        }
        if let Some(task) = countdown.task.take() {
            task.abort();
        }
        countdown.epoch += 1;

        let epoch = countdown.epoch;
        let duration = self.duration;
        let opener = self.opener.clone();
        let shared = Arc::clone(&self.countdown);
        countdown.task = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            {
                let mut countdown = shared.lock().unwrap_or_else(PoisonError::into_inner);
                if countdown.cancelled || countdown.epoch != epoch {
                    return;
                }
                countdown.fired = true;
            }
            if opener.open() {
                tracing::debug!(timeout_ms = duration.as_millis() as u64, "timeout expired");
            }
        }));
    }
}

impl Drop for TimeoutRenewer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::Gate;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_expiry_opens_gate() {
        let gate = Gate::new();
        let renewer = TimeoutRenewer::new(Duration::from_millis(200), gate.opener());
        let start = Instant::now();

        renewer.arm();
        gate.close().await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(210));
        assert!(renewer.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_restarts_full_duration() {
        let gate = Gate::new();
        let renewer = Arc::new(TimeoutRenewer::new(
            Duration::from_millis(200),
            gate.opener(),
        ));
        let start = Instant::now();
        renewer.arm();

        let resetter = {
            let renewer = Arc::clone(&renewer);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                renewer.reset();
            })
        };

        gate.close().await.unwrap();
        resetter.await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(350));
        assert!(elapsed < Duration::from_millis(360));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_without_arm_does_nothing() {
        let gate = Gate::new();
        let renewer = TimeoutRenewer::new(Duration::from_millis(50), gate.opener());
        renewer.reset();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!renewer.has_fired());
        assert!(!gate.opener().is_spent());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let gate = Gate::new();
        let renewer = TimeoutRenewer::new(Duration::from_millis(50), gate.opener());
        renewer.arm();
        renewer.cancel();
        renewer.reset();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!renewer.has_fired());
        assert!(gate.opener().open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_after_other_release_is_ignored() {
        let gate = Gate::new();
        let renewer = TimeoutRenewer::new(Duration::from_millis(50), gate.opener());
        renewer.arm();

        assert!(gate.opener().open());
        gate.close().await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        // The countdown still fired, but against a finished cycle
        assert!(renewer.has_fired());
        assert!(!gate.is_closed());
        assert!(gate.opener().open());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_racing_expiry_has_one_winner() {
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        for trial in 0..200 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;

            let gate = Gate::new();
            let renewer = Arc::new(TimeoutRenewer::new(Duration::from_millis(2), gate.opener()));
            let cancel = gate.opener();
            renewer.arm();

            let canceller = {
                let renewer = Arc::clone(&renewer);
                let delay = Duration::from_micros(500 + seed % 3_000);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let won = cancel.open();
                    if won {
                        renewer.cancel();
                    }
                    won
                })
            };

            tokio::time::timeout(Duration::from_secs(5), gate.close())
                .await
                .unwrap_or_else(|_| panic!("trial {} hung", trial))
                .unwrap();
            let cancel_won = canceller.await.unwrap();
            if !cancel_won {
                assert!(renewer.has_fired(), "trial {}: nobody released the gate", trial);
            }

            // Whoever lost must not release the next wait
            tokio::time::sleep(Duration::from_millis(4)).await;
            assert!(
                tokio::time::timeout(Duration::from_millis(2), gate.close())
                    .await
                    .is_err(),
                "trial {}: late release",
                trial
            );
        }
    }
}
