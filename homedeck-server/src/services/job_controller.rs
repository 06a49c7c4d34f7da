//! Acquisition job supervision
//!
//! Owns the single job slot. At most one acquisition process runs at a
//! time; `start` checks the slot, publishes `JobStarted` and spawns the
//! process under one mutex guard, so two concurrent requests can never both
//! spawn. A supervisor task relays the process output to the EventBus line
//! by line and publishes exactly one terminal event.
//!
//! Job state machine:
//! ```text
//! Idle ──start──▶ Running ──exit 0──▶ Succeeded
//!                    │
//!                    └──exit≠0 / signal / timeout / spawn error──▶ Failed
//! Succeeded | Failed ──start──▶ Running
//! ```

use chrono::{DateTime, Utc};
use homedeck_common::events::{DeckEvent, EventBus, LogStream};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Accepted resource locators: catalog host, resource type, identifier.
/// Anything after the identifier (query strings) is allowed.
static TARGET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://open\.spotify\.com/(playlist|track|album)/[a-zA-Z0-9]+")
        .expect("target pattern is a valid regex")
});

/// Output template handed to the acquisition tool, relative to the output root
const OUTPUT_TEMPLATE: &str = "{artist}/{album}/{title}.{output-ext}";

/// Longest output line relayed as one event; longer runs are split
const MAX_LINE_BYTES: usize = 8 * 1024;

/// Check a start request's target against the accepted locator format
pub fn is_valid_target(target: &str) -> bool {
    TARGET_PATTERN.is_match(target)
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    /// No job has run yet
    Idle,
    /// Acquisition process running
    Running,
    /// Process exited with code 0
    Succeeded,
    /// Nonzero exit, no exit code, timeout, or spawn failure
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// Why a start request was refused
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum JobRejection {
    #[error("A valid Spotify playlist, track, or album URL is required")]
    InvalidTarget,

    #[error("Server is not configured for downloads")]
    Unconfigured,

    #[error("An acquisition job is already running")]
    AlreadyRunning,
}

/// How to invoke the acquisition tool
#[derive(Debug, Clone)]
pub struct JobControllerConfig {
    /// Executable name or path
    pub program: String,
    /// Arguments placed before the target
    pub args: Vec<String>,
    /// Root directory acquired media is written under; `None` disables jobs
    pub output_root: Option<PathBuf>,
    /// Kill the process after this long (no limit when `None`)
    pub timeout: Option<Duration>,
}

/// One run of the acquisition process
#[derive(Debug, Clone)]
struct Job {
    id: Uuid,
    target: String,
    state: JobState,
    exit_code: Option<i32>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl Job {
    fn new(target: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: target.to_string(),
            state: JobState::Running,
            exit_code: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    fn finish(&mut self, state: JobState, exit_code: Option<i32>) {
        self.state = state;
        self.exit_code = exit_code;
        self.ended_at = Some(Utc::now());
    }
}

/// Read-only view of the current job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    fn of(job: Option<&Job>) -> Self {
        match job {
            Some(job) => Self {
                state: job.state,
                job_id: Some(job.id),
                target: Some(job.target.clone()),
                exit_code: job.exit_code,
                started_at: Some(job.started_at),
                ended_at: job.ended_at,
            },
            None => Self {
                state: JobState::Idle,
                job_id: None,
                target: None,
                exit_code: None,
                started_at: None,
                ended_at: None,
            },
        }
    }
}

/// How the supervised process ended
enum Outcome {
    Exited(ExitStatus),
    WaitFailed(std::io::Error),
    TimedOut(Duration),
}

struct Inner {
    config: JobControllerConfig,
    event_bus: EventBus,
    slot: Mutex<Option<Job>>,
}

/// Supervisor for the single acquisition job slot
///
/// Cheap to clone; all clones share the same slot.
#[derive(Clone)]
pub struct JobController {
    inner: Arc<Inner>,
}

impl JobController {
    pub fn new(config: JobControllerConfig, event_bus: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                event_bus,
                slot: Mutex::new(None),
            }),
        }
    }

    /// Start an acquisition job for `target`
    ///
    /// Returns as soon as the job is accepted; the outcome is only observable
    /// through the EventBus. A launch failure still counts as accepted: the
    /// job goes straight to Failed and a `JobSpawnError` event is published.
    pub async fn start(&self, target: &str) -> Result<JobSnapshot, JobRejection> {
        if !is_valid_target(target) {
            debug!("Rejected acquisition request with invalid target");
            return Err(JobRejection::InvalidTarget);
        }

        let output_root = match &self.inner.config.output_root {
            Some(root) => root.clone(),
            None => {
                error!("Acquisition requested but no media output root is configured");
                return Err(JobRejection::Unconfigured);
            }
        };

        let mut slot = self.inner.slot.lock().await;
        if let Some(current) = slot.as_ref().filter(|job| job.state == JobState::Running) {
            warn!(
                job_id = %current.id,
                "Rejected acquisition request: a job is already running"
            );
            return Err(JobRejection::AlreadyRunning);
        }

        let mut job = Job::new(target);
        info!(job_id = %job.id, target = %job.target, "Starting acquisition job");
        self.inner.event_bus.publish(DeckEvent::JobStarted {
            job_id: job.id,
            target: job.target.clone(),
            timestamp: job.started_at,
        });

        match self.build_command(target, &output_root).spawn() {
            Ok(child) => {
                debug!(job_id = %job.id, pid = ?child.id(), "Acquisition process spawned");
                let controller = self.clone();
                let job_id = job.id;
                tokio::spawn(async move {
                    controller.supervise(job_id, child).await;
                });
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to start acquisition process");
                self.inner.event_bus.publish(DeckEvent::JobSpawnError {
                    job_id: job.id,
                    message: e.to_string(),
                    timestamp: Utc::now(),
                });
                job.finish(JobState::Failed, None);
            }
        }

        let snapshot = JobSnapshot::of(Some(&job));
        *slot = Some(job);
        Ok(snapshot)
    }

    /// Snapshot of the current (or most recent) job
    pub async fn current(&self) -> JobSnapshot {
        let slot = self.inner.slot.lock().await;
        JobSnapshot::of(slot.as_ref())
    }

    fn build_command(&self, target: &str, output_root: &std::path::Path) -> Command {
        let config = &self.inner.config;
        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .arg(target)
            .arg("--output")
            .arg(output_root.join(OUTPUT_TEMPLATE))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Relay output until exit, then publish the terminal event
    async fn supervise(&self, job_id: Uuid, mut child: Child) {
        let outcome = match self.inner.config.timeout {
            Some(limit) => {
                let waited =
                    tokio::time::timeout(limit, run_to_exit(&self.inner.event_bus, job_id, &mut child))
                        .await;
                match waited {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        if let Err(e) = child.kill().await {
                            error!(job_id = %job_id, error = %e, "Failed to kill timed-out acquisition process");
                        }
                        Outcome::TimedOut(limit)
                    }
                }
            }
            None => run_to_exit(&self.inner.event_bus, job_id, &mut child).await,
        };

        let (state, exit_code) = match outcome {
            Outcome::Exited(status) => {
                info!(job_id = %job_id, status = %status, "Acquisition process finished");
                let state = if status.success() {
                    JobState::Succeeded
                } else {
                    JobState::Failed
                };
                (state, status.code())
            }
            Outcome::WaitFailed(e) => {
                error!(job_id = %job_id, error = %e, "Lost track of acquisition process");
                (JobState::Failed, None)
            }
            Outcome::TimedOut(limit) => {
                warn!(job_id = %job_id, timeout_secs = limit.as_secs(), "Acquisition process timed out");
                self.inner.event_bus.publish(DeckEvent::JobLog {
                    job_id,
                    stream: LogStream::Stderr,
                    text: format!(
                        "Acquisition process exceeded the {}s timeout and was killed",
                        limit.as_secs()
                    ),
                    timestamp: Utc::now(),
                });
                (JobState::Failed, None)
            }
        };

        // Terminal event and state change under one guard: the next job's
        // JobStarted can only be published after both.
        let mut slot = self.inner.slot.lock().await;
        self.inner.event_bus.publish(DeckEvent::JobFinished {
            job_id,
            exit_code,
            timestamp: Utc::now(),
        });
        if let Some(job) = slot.as_mut().filter(|job| job.id == job_id) {
            job.finish(state, exit_code);
        }
    }
}

/// Relay both output pipes to the bus, then reap the process
async fn run_to_exit(event_bus: &EventBus, job_id: Uuid, child: &mut Child) -> Outcome {
    let mut stdout = child.stdout.take().map(|s| OutputLines::new(BufReader::new(s)));
    let mut stderr = child.stderr.take().map(|s| OutputLines::new(BufReader::new(s)));

    loop {
        tokio::select! {
            line = next_line(&mut stdout), if stdout.is_some() => match line {
                Some(text) => publish_line(event_bus, job_id, LogStream::Stdout, text),
                None => stdout = None,
            },
            line = next_line(&mut stderr), if stderr.is_some() => match line {
                Some(text) => publish_line(event_bus, job_id, LogStream::Stderr, text),
                None => stderr = None,
            },
            else => break,
        }
    }

    match child.wait().await {
        Ok(status) => Outcome::Exited(status),
        Err(e) => Outcome::WaitFailed(e),
    }
}

/// Line reader for process output
///
/// Both `\n` and `\r` end a line (`\r\n` counts once), so progress
/// redrawn in place is relayed as each update arrives. A line longer than
/// the cap is emitted in pieces. Cancel safe: partial input is kept in the
/// reader between calls.
struct OutputLines<R> {
    reader: R,
    line: Vec<u8>,
    after_cr: bool,
    max_len: usize,
}

impl<R: AsyncBufRead + Unpin> OutputLines<R> {
    fn new(reader: R) -> Self {
        Self::with_max_len(reader, MAX_LINE_BYTES)
    }

    fn with_max_len(reader: R, max_len: usize) -> Self {
        Self {
            reader,
            line: Vec::new(),
            after_cr: false,
            max_len: max_len.max(1),
        }
    }

    /// Next line without its terminator; `None` at EOF
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if self.line.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_line()));
            }

            let mut start = 0;
            if self.after_cr {
                self.after_cr = false;
                if available[0] == b'\n' {
                    start = 1;
                }
            }

            let room = self.max_len - self.line.len();
            let window = &available[start..available.len().min(start + room)];
            match window.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(i) => {
                    self.line.extend_from_slice(&window[..i]);
                    self.after_cr = window[i] == b'\r';
                    self.reader.consume(start + i + 1);
                    return Ok(Some(self.take_line()));
                }
                None => {
                    let taken = window.len();
                    self.line.extend_from_slice(window);
                    self.reader.consume(start + taken);
                    if self.line.len() >= self.max_len {
                        return Ok(Some(self.take_line()));
                    }
                }
            }
        }
    }

    fn take_line(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        text
    }
}

/// Next line of a pipe; `None` at EOF or on read error
async fn next_line<R>(lines: &mut Option<OutputLines<R>>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    let lines = lines.as_mut()?;
    match lines.next_line().await {
        Ok(line) => line,
        Err(e) => {
            warn!(error = %e, "Error reading acquisition process output");
            None
        }
    }
}

fn publish_line(event_bus: &EventBus, job_id: Uuid, stream: LogStream, text: String) {
    match stream {
        LogStream::Stdout => debug!(job_id = %job_id, "acquisition: {}", text),
        LogStream::Stderr => warn!(job_id = %job_id, "acquisition: {}", text),
    }
    event_bus.publish(DeckEvent::JobLog {
        job_id,
        stream,
        text,
        timestamp: Utc::now(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use homedeck_common::events::Subscription;

    const TRACK: &str = "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC";

    fn controller_with(program: &str, args: &[&str], timeout: Option<Duration>) -> (JobController, EventBus) {
        let bus = EventBus::new(256);
        let config = JobControllerConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            output_root: Some(PathBuf::from("/srv/music")),
            timeout,
        };
        (JobController::new(config, bus.clone()), bus)
    }

    /// `sh -c <script> acquire <target> --output <template>`: $1 is the target
    fn shell_controller(script: &str) -> (JobController, EventBus) {
        controller_with("sh", &["-c", script, "acquire"], None)
    }

    async fn events_until_terminal(sub: &mut Subscription, job_id: Uuid) -> Vec<DeckEvent> {
        let mut events = Vec::new();
        let collect = async {
            while let Some(event) = sub.recv().await {
                if event.job_id() != job_id {
                    continue;
                }
                let terminal = event.is_terminal();
                events.push(event);
                if terminal {
                    break;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(10), collect)
            .await
            .expect("job should reach a terminal event");
        events
    }

    async fn wait_for_terminal_state(controller: &JobController) -> JobSnapshot {
        for _ in 0..200 {
            let snapshot = controller.current().await;
            if snapshot.state.is_terminal() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("job never reached a terminal state");
    }

    fn log_texts(events: &[DeckEvent], wanted: LogStream) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                DeckEvent::JobLog { stream, text, .. } if *stream == wanted => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_target_validation() {
        assert!(is_valid_target(TRACK));
        assert!(is_valid_target("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"));
        assert!(is_valid_target("https://open.spotify.com/album/1ATL5GLyefJaxhQzSPVrLX?si=abc"));

        assert!(!is_valid_target(""));
        assert!(!is_valid_target("http://open.spotify.com/track/abc"));
        assert!(!is_valid_target("https://open.spotify.com/artist/abc"));
        assert!(!is_valid_target("https://evil.example/track/abc"));
        assert!(!is_valid_target("https://open.spotify.com/track/"));
        assert!(!is_valid_target(" https://open.spotify.com/track/abc"));
    }

    async fn read_all<R: AsyncBufRead + Unpin>(mut lines: OutputLines<R>) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            out.push(line);
        }
        out
    }

    #[tokio::test]
    async fn test_output_lines_split_on_cr_and_lf() {
        let input: &[u8] = b"one\ntwo\r\nprogress 10%\rprogress 100%\n\nlast";
        assert_eq!(
            read_all(OutputLines::new(input)).await,
            vec!["one", "two", "progress 10%", "progress 100%", "", "last"]
        );
    }

    #[tokio::test]
    async fn test_output_lines_cap_long_lines() {
        let input: &[u8] = b"abcdefgh\nxy\n";
        assert_eq!(
            read_all(OutputLines::with_max_len(input, 3)).await,
            vec!["abc", "def", "gh", "xy"]
        );
    }

    #[tokio::test]
    async fn test_output_lines_crlf_split_across_reads() {
        // A 1-byte buffer forces `\r` and `\n` into separate fills
        let input: &[u8] = b"a\r\nb\n";
        let reader = BufReader::with_capacity(1, input);
        assert_eq!(read_all(OutputLines::new(reader)).await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_initial_state_is_idle() {
        let (controller, _bus) = shell_controller("exit 0");
        let snapshot = controller.current().await;
        assert_eq!(snapshot.state, JobState::Idle);
        assert!(snapshot.job_id.is_none());
    }

    #[tokio::test]
    async fn test_invalid_target_rejected_without_events() {
        let (controller, bus) = shell_controller("exit 0");
        let mut sub = bus.subscribe();

        assert_eq!(
            controller.start("not a url").await,
            Err(JobRejection::InvalidTarget)
        );
        assert!(sub.try_recv().is_none());
        assert_eq!(controller.current().await.state, JobState::Idle);
    }

    #[tokio::test]
    async fn test_unconfigured_output_root_rejected() {
        let bus = EventBus::new(16);
        let controller = JobController::new(
            JobControllerConfig {
                program: "sh".to_string(),
                args: vec![],
                output_root: None,
                timeout: None,
            },
            bus,
        );
        assert_eq!(controller.start(TRACK).await, Err(JobRejection::Unconfigured));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_job_event_sequence() {
        let (controller, bus) =
            shell_controller("echo one; echo two; echo oops 1>&2; echo three; exit 0");
        let mut sub = bus.subscribe();

        let accepted = controller.start(TRACK).await.expect("job should be accepted");
        assert_eq!(accepted.state, JobState::Running);
        let job_id = accepted.job_id.unwrap();

        let events = events_until_terminal(&mut sub, job_id).await;

        assert!(matches!(events.first(), Some(DeckEvent::JobStarted { target, .. }) if target == TRACK));
        assert_eq!(
            events.iter().filter(|e| matches!(e, DeckEvent::JobStarted { .. })).count(),
            1
        );
        assert!(matches!(
            events.last(),
            Some(DeckEvent::JobFinished { exit_code: Some(0), .. })
        ));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

        // Per-stream order is preserved
        assert_eq!(log_texts(&events, LogStream::Stdout), vec!["one", "two", "three"]);
        assert_eq!(log_texts(&events, LogStream::Stderr), vec!["oops"]);

        let snapshot = wait_for_terminal_state(&controller).await;
        assert_eq!(snapshot.state, JobState::Succeeded);
        assert_eq!(snapshot.exit_code, Some(0));
        assert!(snapshot.ended_at.is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invocation_passes_target_and_output_template() {
        let (controller, bus) = shell_controller("echo \"$1\"; echo \"$2\"; echo \"$3\"");
        let mut sub = bus.subscribe();

        let job_id = controller.start(TRACK).await.unwrap().job_id.unwrap();
        let events = events_until_terminal(&mut sub, job_id).await;

        assert_eq!(
            log_texts(&events, LogStream::Stdout),
            vec![
                TRACK.to_string(),
                "--output".to_string(),
                "/srv/music/{artist}/{album}/{title}.{output-ext}".to_string(),
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_carriage_return_progress_is_relayed_per_update() {
        let (controller, bus) = shell_controller("printf 'a\\rb\\n'");
        let mut sub = bus.subscribe();

        let job_id = controller.start(TRACK).await.unwrap().job_id.unwrap();
        let events = events_until_terminal(&mut sub, job_id).await;

        assert_eq!(log_texts(&events, LogStream::Stdout), vec!["a", "b"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_progress_update_arrives_before_newline() {
        let (controller, bus) =
            shell_controller("printf 'progress 10%%\\r'; sleep 3; printf 'progress 100%%\\n'");
        let mut sub = bus.subscribe();

        controller.start(TRACK).await.unwrap();
        let first_log = async {
            while let Some(event) = sub.recv().await {
                if let DeckEvent::JobLog { text, .. } = event {
                    return Some(text);
                }
            }
            None
        };
        let text = tokio::time::timeout(Duration::from_millis(1500), first_log)
            .await
            .expect("progress line should be relayed without waiting for a newline");
        assert_eq!(text.as_deref(), Some("progress 10%"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_fails_job() {
        let (controller, bus) = shell_controller("echo partial; exit 3");
        let mut sub = bus.subscribe();

        let job_id = controller.start(TRACK).await.unwrap().job_id.unwrap();
        let events = events_until_terminal(&mut sub, job_id).await;

        assert!(matches!(
            events.last(),
            Some(DeckEvent::JobFinished { exit_code: Some(3), .. })
        ));
        let snapshot = wait_for_terminal_state(&controller).await;
        assert_eq!(snapshot.state, JobState::Failed);
        assert_eq!(snapshot.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_spawn_failure_publishes_spawn_error() {
        let (controller, bus) = controller_with("/nonexistent/homedeck-acquire", &[], None);
        let mut sub = bus.subscribe();

        let accepted = controller.start(TRACK).await.expect("spawn failure is still accepted");
        assert_eq!(accepted.state, JobState::Failed);

        let events = events_until_terminal(&mut sub, accepted.job_id.unwrap()).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], DeckEvent::JobStarted { .. }));
        assert!(matches!(events[1], DeckEvent::JobSpawnError { .. }));

        let snapshot = controller.current().await;
        assert_eq!(snapshot.state, JobState::Failed);
        assert_eq!(snapshot.exit_code, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_concurrent_starts_spawn_exactly_one_job() {
        let (controller, _bus) = shell_controller("sleep 1");

        let (first, second) = tokio::join!(controller.start(TRACK), controller.start(TRACK));
        let results = [first, second];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| **r == Err(JobRejection::AlreadyRunning))
                .count(),
            1
        );

        // Still running: a third request is rejected too
        assert_eq!(controller.start(TRACK).await, Err(JobRejection::AlreadyRunning));
        assert_eq!(controller.current().await.state, JobState::Running);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_next_job_starts_after_previous_finished() {
        let (controller, bus) = shell_controller("echo working");
        let mut sub = bus.subscribe();

        let first = controller.start(TRACK).await.unwrap().job_id.unwrap();
        wait_for_terminal_state(&controller).await;
        let second = controller.start(TRACK).await.unwrap().job_id.unwrap();
        assert_ne!(first, second);

        let mut order = Vec::new();
        let collect = async {
            while let Some(event) = sub.recv().await {
                let done = event.is_terminal() && event.job_id() == second;
                order.push((event.job_id(), event.event_type()));
                if done {
                    break;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(10), collect)
            .await
            .expect("second job should finish");

        let first_finished = order
            .iter()
            .position(|(id, kind)| *id == first && *kind == "job:finished")
            .unwrap();
        let second_started = order
            .iter()
            .position(|(id, kind)| *id == second && *kind == "job:started")
            .unwrap();
        assert!(first_finished < second_started);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        let (controller, bus) = controller_with(
            "sh",
            &["-c", "echo begin; sleep 5", "acquire"],
            Some(Duration::from_millis(300)),
        );
        let mut sub = bus.subscribe();

        let job_id = controller.start(TRACK).await.unwrap().job_id.unwrap();
        let events = events_until_terminal(&mut sub, job_id).await;

        assert_eq!(log_texts(&events, LogStream::Stdout), vec!["begin"]);
        assert!(log_texts(&events, LogStream::Stderr)
            .iter()
            .any(|line| line.contains("timeout")));
        assert!(matches!(
            events.last(),
            Some(DeckEvent::JobFinished { exit_code: None, .. })
        ));

        let snapshot = wait_for_terminal_state(&controller).await;
        assert_eq!(snapshot.state, JobState::Failed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dropped_subscriber_does_not_stall_job() {
        let (controller, bus) = shell_controller("for i in 1 2 3 4 5; do echo line $i; done");
        let quitter = bus.subscribe();
        let mut watcher = bus.subscribe();

        let job_id = controller.start(TRACK).await.unwrap().job_id.unwrap();
        drop(quitter);

        let events = events_until_terminal(&mut watcher, job_id).await;
        assert_eq!(log_texts(&events, LogStream::Stdout).len(), 5);
        assert_eq!(wait_for_terminal_state(&controller).await.state, JobState::Succeeded);
    }
}
