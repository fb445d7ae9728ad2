use crate::archive::{ArchiveError, ArchiveReceipt, ArchiveRow, Archiver};
use crate::config::ConversionConfig;
use async_trait::async_trait;
use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;
use url::Url;

pub fn conversion_config(base_url: &str, token: Option<&str>) -> ConversionConfig {
    ConversionConfig {
        pixel_id: "123".into(),
        access_token: token.map(String::from),
        api_base_url: Url::parse(base_url).unwrap(),
        timeout_secs: 1,
        ..Default::default()
    }
}

type FailureFn = Box<dyn Fn() -> ArchiveError + Send + Sync>;

/// In-memory archiver that records every row it is asked to append.
pub struct FakeArchiver {
    calls: AtomicUsize,
    last_row: Mutex<Option<Vec<String>>>,
    failure: Option<FailureFn>,
}

impl FakeArchiver {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(FakeArchiver {
            calls: AtomicUsize::new(0),
            last_row: Mutex::new(None),
            failure: None,
        })
    }

    pub fn failing<F>(failure: F) -> Arc<Self>
    where
        F: Fn() -> ArchiveError + Send + Sync + 'static,
    {
        Arc::new(FakeArchiver {
            calls: AtomicUsize::new(0),
            last_row: Mutex::new(None),
            failure: Some(Box::new(failure)),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_row(&self) -> Option<Vec<String>> {
        self.last_row.lock().unwrap().clone()
    }
}

#[async_trait]
impl Archiver for FakeArchiver {
    async fn append(&self, row: &ArchiveRow) -> Result<ArchiveReceipt, ArchiveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_row.lock().unwrap() = Some(row.columns().to_vec());

        match &self.failure {
            Some(failure) => Err(failure()),
            None => Ok(ArchiveReceipt {
                updated_range: Some("Sheet1!A2:N2".into()),
            }),
        }
    }
}

/// Records every metric registration as `"<kind> <name>{label=value,...}"`.
#[derive(Default)]
pub struct CapturingRecorder {
    registered: Mutex<Vec<String>>,
}

impl CapturingRecorder {
    pub fn registered(&self) -> Vec<String> {
        self.registered.lock().unwrap().clone()
    }

    fn push(&self, kind: &str, key: &Key) {
        let labels: Vec<String> = key
            .labels()
            .map(|label| format!("{}={}", label.key(), label.value()))
            .collect();
        let entry = if labels.is_empty() {
            format!("{kind} {}", key.name())
        } else {
            format!("{kind} {}{{{}}}", key.name(), labels.join(","))
        };
        self.registered.lock().unwrap().push(entry);
    }
}

impl Recorder for CapturingRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        self.push("counter", key);
        Counter::noop()
    }

    fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
        self.push("gauge", key);
        Gauge::noop()
    }

    fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
        self.push("histogram", key);
        Histogram::noop()
    }
}

/// Formatted log output of this crate, collected while the returned guard is alive.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter("lead_relay=debug")
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}
