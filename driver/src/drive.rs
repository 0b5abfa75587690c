use perf_harness_core::prelude::ShutdownHandle;

use crate::case_runner::CaseRunner;

/// Rounds run for each case when not configured otherwise.
pub const DEFAULT_ROUNDS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveSummary {
    /// Number of times the case runner was invoked
    pub invocations: usize,
    pub failures: usize,
}

/// Run every case `rounds` times, one after the other. A failed run is logged and counted, it
/// does not stop the remaining runs. A shutdown stops before the next run.
pub fn drive(
    cases: &[String],
    rounds: usize,
    runner: &mut dyn CaseRunner,
    shutdown: &ShutdownHandle,
) -> DriveSummary {
    let mut summary = DriveSummary::default();

    'cases: for case in cases {
        for round in 1..=rounds {
            if shutdown.is_shutdown() {
                log::warn!("Shutdown requested, not starting {case} round {round}/{rounds}");
                break 'cases;
            }

            log::info!("Running {case}, round {round}/{rounds}");
            summary.invocations += 1;
            if let Err(e) = runner.run_case(case) {
                log::error!("{case} round {round}/{rounds} failed: {e:?}");
                summary.failures += 1;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct FakeRunner {
        calls: Vec<String>,
        failing: Vec<&'static str>,
        stop_after: Option<(usize, ShutdownHandle)>,
    }

    impl CaseRunner for FakeRunner {
        fn run_case(&mut self, case: &str) -> anyhow::Result<()> {
            self.calls.push(case.to_string());
            if let Some((after, shutdown)) = &self.stop_after {
                if self.calls.len() == *after {
                    shutdown.shutdown();
                }
            }
            if self.failing.iter().any(|failing| *failing == case) {
                anyhow::bail!("{case} failed");
            }
            Ok(())
        }
    }

    fn cases() -> Vec<String> {
        vec!["ShopFeedScroll".to_string(), "MapRouteSearch".to_string()]
    }

    #[test]
    fn every_case_runs_default_rounds() {
        let mut runner = FakeRunner::default();

        let summary = drive(&cases(), DEFAULT_ROUNDS, &mut runner, &ShutdownHandle::new());

        assert_eq!(
            DriveSummary {
                invocations: 10,
                failures: 0
            },
            summary
        );
        assert_eq!(10, runner.calls.len());
        assert!(runner.calls[..5].iter().all(|c| c == "ShopFeedScroll"));
        assert!(runner.calls[5..].iter().all(|c| c == "MapRouteSearch"));
    }

    #[test]
    fn failures_are_counted_and_do_not_stop() {
        let mut runner = FakeRunner {
            failing: vec!["ShopFeedScroll"],
            ..Default::default()
        };

        let summary = drive(&cases(), 3, &mut runner, &ShutdownHandle::new());

        assert_eq!(6, summary.invocations);
        assert_eq!(3, summary.failures);
    }

    #[test]
    fn shutdown_stops_before_next_run() {
        let shutdown = ShutdownHandle::new();
        let mut runner = FakeRunner {
            stop_after: Some((2, shutdown.clone())),
            ..Default::default()
        };

        let summary = drive(&cases(), DEFAULT_ROUNDS, &mut runner, &shutdown);

        assert_eq!(2, summary.invocations);
    }
}
