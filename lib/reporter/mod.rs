pub mod error;
pub mod notifier;

use chrono::{Local, NaiveDateTime};
use std::error::Error as StdError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, warn};

use crate::logging::format_error_chain;
pub use error::ReportError;
pub use notifier::{LogOnlyNotifier, Notifier, SmtpNotifier};

/// Alert and log timestamps use minute resolution.
pub const ALERT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Which failure class raised the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Failures surfaced by the database driver or connection pool.
    Database,
    /// Everything else: clock, task, I/O, configuration.
    Pipeline,
}

impl Channel {
    pub fn subject(self) -> &'static str {
        match self {
            Channel::Database => "Hot Calls Poller Database Exception",
            Channel::Pipeline => "Hot Calls Poller Exception",
        }
    }

    pub fn sender_name(self) -> &'static str {
        match self {
            Channel::Database => "Database Exception",
            Channel::Pipeline => "Hot Call Exception",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Channel::Database => "The database threw the following exception:",
            Channel::Pipeline => "The program threw the following exception:",
        }
    }
}

/// A composed alert; the same body is mailed and appended to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub channel: Channel,
    pub body: String,
}

impl Alert {
    pub fn compose(channel: Channel, detail: &str, at: NaiveDateTime) -> Self {
        Self {
            channel,
            body: format!(
                "{} {} at {}",
                channel.prefix(),
                detail,
                at.format(ALERT_TIMESTAMP_FORMAT)
            ),
        }
    }
}

/// Which sinks accepted a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOutcome {
    pub notified: bool,
    pub logged: bool,
}

/// Append-only failure log, one line per report. Clones share the lock.
#[derive(Clone)]
pub struct ErrorLog {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `line` plus a newline with a single write so concurrent
    /// reports never interleave partial lines.
    pub fn append(&self, line: &str) -> Result<(), ReportError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(format!("{line}\n").as_bytes())?;
        Ok(())
    }
}

/// Failure sink shared by every pipeline operation.
///
/// Reporting is best-effort: a failing notifier or log append is written to
/// the tracing output and never routed back into `report`.
pub struct ErrorReporter {
    notifier: Box<dyn Notifier>,
    log: ErrorLog,
}

impl ErrorReporter {
    pub fn new(notifier: Box<dyn Notifier>, log: ErrorLog) -> Self {
        Self { notifier, log }
    }

    pub async fn report(
        &self,
        channel: Channel,
        err: &(dyn StdError + Send + Sync + 'static),
    ) -> ReportOutcome {
        self.report_at(channel, err, Local::now().naive_local())
            .await
    }

    pub async fn report_at(
        &self,
        channel: Channel,
        err: &(dyn StdError + Send + Sync + 'static),
        at: NaiveDateTime,
    ) -> ReportOutcome {
        let alert = Alert::compose(channel, &format_error_chain(err), at);
        error!(
            event = "pipeline_failure",
            channel = ?channel,
            "{}",
            alert.body
        );

        let notified = match self.notifier.send(&alert).await {
            Ok(()) => true,
            Err(send_err) => {
                warn!(
                    event = "alert_send_failed",
                    error = %format_error_chain(&send_err),
                    "could not send failure alert"
                );
                false
            }
        };

        let log = self.log.clone();
        let line = alert.body.clone();
        let appended = tokio::task::spawn_blocking(move || log.append(&line))
            .await
            .unwrap_or_else(|join_err| Err(ReportError::from(join_err)));
        let logged = match appended {
            Ok(()) => true,
            Err(log_err) => {
                warn!(
                    event = "error_log_append_failed",
                    path = %self.log.path().display(),
                    error = %format_error_chain(&log_err),
                    "could not append to error log"
                );
                false
            }
        };

        ReportOutcome { notified, logged }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;

    /// Records every alert it is asked to send.
    #[derive(Clone, Default)]
    pub struct RecordingNotifier {
        pub sent: Arc<Mutex<Vec<Alert>>>,
    }

    impl RecordingNotifier {
        pub fn alerts(&self) -> Vec<Alert> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, alert: &Alert) -> Result<(), ReportError> {
            self.sent.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    /// Fails every send, counting attempts.
    #[derive(Clone, Default)]
    pub struct FailingNotifier {
        pub attempts: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _alert: &Alert) -> Result<(), ReportError> {
            *self.attempts.lock().unwrap() += 1;
            Err(ReportError::NoRecipients)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{FailingNotifier, RecordingNotifier};
    use super::*;
    use chrono::NaiveDate;
    use std::io;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 5, 42)
            .unwrap()
    }

    fn failure() -> io::Error {
        io::Error::new(io::ErrorKind::ConnectionReset, "listener went away")
    }

    #[test]
    fn alert_body_carries_prefix_detail_and_minute_timestamp() {
        let alert = Alert::compose(Channel::Database, "relation missing", at());
        assert_eq!(
            alert.body,
            "The database threw the following exception: relation missing at 2024-03-01 09:05"
        );
        assert_ne!(Channel::Database.subject(), Channel::Pipeline.subject());
    }

    #[tokio::test]
    async fn report_mails_and_appends_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poller_error_log.txt");
        let notifier = RecordingNotifier::default();
        let reporter = ErrorReporter::new(Box::new(notifier.clone()), ErrorLog::new(&path));

        let outcome = reporter.report_at(Channel::Pipeline, &failure(), at()).await;
        reporter.report_at(Channel::Database, &failure(), at()).await;

        assert_eq!(
            outcome,
            ReportOutcome {
                notified: true,
                logged: true
            }
        );
        let alerts = notifier.alerts();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].channel, Channel::Pipeline);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "The program threw the following exception: listener went away at 2024-03-01 09:05"
        );
        assert!(lines[1].starts_with("The database threw the following exception:"));
    }

    #[tokio::test]
    async fn failing_notifier_is_not_re_reported_and_log_still_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poller_error_log.txt");
        let notifier = FailingNotifier::default();
        let reporter = ErrorReporter::new(Box::new(notifier.clone()), ErrorLog::new(&path));

        let outcome = reporter.report_at(Channel::Database, &failure(), at()).await;

        assert!(!outcome.notified);
        assert!(outcome.logged);
        assert_eq!(*notifier.attempts.lock().unwrap(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reports_append_whole_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poller_error_log.txt");
        let reporter = Arc::new(ErrorReporter::new(
            Box::new(RecordingNotifier::default()),
            ErrorLog::new(&path),
        ));

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let reporter = reporter.clone();
            tasks.push(tokio::spawn(async move {
                reporter.report_at(Channel::Database, &failure(), at()).await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().logged);
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 32);
        assert!(lines.iter().all(|line| *line
            == "The database threw the following exception: listener went away at 2024-03-01 09:05"));
    }

    #[tokio::test]
    async fn unwritable_log_still_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("log.txt");
        let notifier = RecordingNotifier::default();
        let reporter = ErrorReporter::new(Box::new(notifier.clone()), ErrorLog::new(&path));

        let outcome = reporter.report_at(Channel::Pipeline, &failure(), at()).await;

        assert!(outcome.notified);
        assert!(!outcome.logged);
        assert_eq!(notifier.alerts().len(), 1);
    }
}
