use crate::executor::task_result::{RunResults, TaskResult};
use indexmap::IndexMap;
use log::debug;
use std::cmp;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};

/// Tracks the background jobs of one async task dispatch. `wait` harvests
/// completions until the deadline; whatever is still pending afterwards is
/// reported through `hosts_to_poll` for the caller to write off.
pub struct AsyncPoller {
    jobs: IndexMap<String, JoinHandle<TaskResult>>,
}

impl AsyncPoller {
    pub(crate) fn new(jobs: IndexMap<String, JoinHandle<TaskResult>>) -> Self {
        AsyncPoller { jobs }
    }

    /// Hosts whose jobs have not reported yet.
    pub fn hosts_to_poll(&self) -> Vec<String> {
        self.jobs.keys().cloned().collect()
    }

    /// Polls the running jobs every `interval` seconds for up to `seconds`,
    /// collecting results as they complete. Jobs still running when the
    /// deadline passes are aborted and left in `hosts_to_poll`.
    pub async fn wait(&mut self, seconds: u64, interval: u64) -> RunResults {
        let deadline = Instant::now() + Duration::from_secs(seconds);
        let mut results = RunResults::default();

        loop {
            self.harvest(&mut results).await;

            if self.jobs.is_empty() {
                break;
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let nap = cmp::min(Duration::from_secs(interval.max(1)), deadline - now);
            sleep(nap).await;
        }

        for (host, handle) in &self.jobs {
            debug!("async job for {host} missed the deadline, aborting");
            handle.abort();
        }

        results
    }

    async fn harvest(&mut self, results: &mut RunResults) {
        let finished: Vec<String> = self
            .jobs
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(host, _)| host.clone())
            .collect();

        for host in finished {
            if let Some(handle) = self.jobs.shift_remove(&host) {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(err) => TaskResult::dark(format!("worker failed: {err}")),
                };
                if result.unreachable {
                    results.dark.insert(host, result);
                } else {
                    results.contacted.insert(host, result);
                }
            }
        }
    }
}
