//! Single-flight guard for form submissions

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::error::IncidentError;

/// Simulated network latency applied before a submission is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitLatency {
    pub ticket: Duration,
    pub alert: Duration,
}

impl Default for SubmitLatency {
    fn default() -> Self {
        Self {
            ticket: Duration::from_millis(1500),
            alert: Duration::from_millis(2000),
        }
    }
}

impl SubmitLatency {
    pub fn none() -> Self {
        Self {
            ticket: Duration::ZERO,
            alert: Duration::ZERO,
        }
    }
}

/// Rejects a second submission while one is still running
#[derive(Debug)]
pub struct SubmitGate {
    name: &'static str,
    in_flight: AtomicBool,
    latency: Duration,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SubmitGate {
    pub fn new(name: &'static str, latency: Duration) -> Self {
        Self {
            name,
            in_flight: AtomicBool::new(false),
            latency,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Wait out the latency, then run `submit`. The flag is cleared even if
    /// the future is dropped midway.
    pub async fn run<T, F, Fut>(&self, submit: F) -> Result<T, IncidentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, IncidentError>>,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(gate = self.name, "submission rejected, another is in flight");
            return Err(IncidentError::SubmissionInFlight);
        }
        let _guard = InFlight(&self.in_flight);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        submit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_submission_rejected_while_first_runs() {
        let gate = SubmitGate::new("ticket", Duration::from_millis(50));

        let (first, second) = tokio::join!(
            gate.run(|| async { Ok::<_, IncidentError>(1) }),
            gate.run(|| async { Ok::<_, IncidentError>(2) }),
        );

        assert_eq!(first.unwrap(), 1);
        assert!(matches!(second, Err(IncidentError::SubmissionInFlight)));
        assert!(!gate.is_in_flight());
    }

    #[tokio::test]
    async fn test_flag_cleared_after_error() {
        let gate = SubmitGate::new("alert", Duration::ZERO);
        let failed = gate
            .run(|| async { Err::<(), _>(IncidentError::validation("title is required")) })
            .await;
        assert!(failed.is_err());

        let ok = gate.run(|| async { Ok::<_, IncidentError>("again") }).await;
        assert_eq!(ok.unwrap(), "again");
    }

    #[tokio::test]
    async fn test_flag_cleared_when_cancelled() {
        let gate = SubmitGate::new("ticket", Duration::from_secs(60));
        let pending = gate.run(|| async { Ok::<_, IncidentError>(()) });
        let timed_out = tokio::time::timeout(Duration::from_millis(20), pending).await;

        assert!(timed_out.is_err());
        assert!(!gate.is_in_flight());
    }

    #[test]
    fn test_default_latency() {
        let latency = SubmitLatency::default();
        assert_eq!(latency.ticket, Duration::from_millis(1500));
        assert_eq!(latency.alert, Duration::from_millis(2000));
        assert_eq!(SubmitLatency::none().alert, Duration::ZERO);
    }
}
