use crate::config::{Instance, PortalConfig};
use crate::error::PortalError;
use crate::parsers::extract_courses;
use crate::portal::{Credentials, Portal};
use crate::results::{CourseList, ExtractionResult, Stage};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};

/// Notification emitted by a running extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// Free-form progress text; may be dropped when the caller falls behind
    Status(String),
    /// Terminal outcome; always the last event of a run
    Finished(ExtractionResult),
}

/// Builder for one extraction run
#[derive(Debug, Clone)]
pub struct Extraction {
    credentials: Credentials,
    instance: Instance,
    stage_timeout: Duration,
    buffer: usize,
}

impl Extraction {
    /// Create a new extraction for the given account and portal instance
    pub fn new(credentials: Credentials, instance: Instance) -> Self {
        Self {
            credentials,
            instance,
            stage_timeout: Duration::from_secs(30),
            buffer: 32,
        }
    }

    /// Take timeouts and channel size from configuration
    pub fn with_config(mut self, config: &PortalConfig) -> Self {
        self.stage_timeout = config.stage_timeout();
        self.buffer = config.status_buffer;
        self
    }

    /// Set the upper bound for each stage
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Set the event channel capacity
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    /// Start the run on a background task.
    ///
    /// The portal session is moved into the worker and comes back from
    /// [`ExtractionHandle::finish`], so a session can only serve one run at a time.
    pub fn spawn<P: Portal + 'static>(self, portal: P) -> ExtractionHandle<P> {
        let (event_tx, event_rx) = mpsc::channel(self.buffer.max(1));
        let (cancel_tx, cancel_rx) = watch::channel(false);

        ::log::info!(
            "Starting course extraction for {} on {}",
            self.credentials.username,
            self.instance.base_url()
        );

        let worker = tokio::spawn(run(portal, self, event_tx, cancel_rx));

        ExtractionHandle {
            events: event_rx,
            cancel: cancel_tx,
            worker,
            result: None,
        }
    }
}

/// Caller side of a running extraction
pub struct ExtractionHandle<P> {
    events: mpsc::Receiver<TaskEvent>,
    cancel: watch::Sender<bool>,
    worker: JoinHandle<P>,
    result: Option<ExtractionResult>,
}

impl<P> ExtractionHandle<P> {
    /// Next event in emission order; `None` once the terminal event has been read
    pub async fn next_event(&mut self) -> Option<TaskEvent> {
        let event = self.events.recv().await?;
        if let TaskEvent::Finished(result) = &event {
            self.result = Some(result.clone());
        }
        Some(event)
    }

    /// Ask the run to stop. The browser is closed and the run finishes unsuccessfully.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Wait for the run to end, returning the session and the terminal result
    pub async fn finish(mut self) -> Result<(P, ExtractionResult), JoinError> {
        while self.next_event().await.is_some() {}

        let portal = self.worker.await?;
        let result = self.result.take().unwrap_or_else(|| {
            ExtractionResult::failed(Stage::Setup, "extraction ended without a result")
        });

        Ok((portal, result))
    }
}

/// Why a stage did not complete
#[derive(Debug)]
enum StageFailure {
    Portal(Stage, PortalError),
    TimedOut(Stage, Duration),
    Cancelled(Stage),
}

impl StageFailure {
    fn stage(&self) -> Stage {
        match self {
            StageFailure::Portal(stage, _)
            | StageFailure::TimedOut(stage, _)
            | StageFailure::Cancelled(stage) => *stage,
        }
    }

    /// Whether the session may be left in an unknown state
    fn leaves_session_dirty(&self) -> bool {
        !matches!(self, StageFailure::Portal(..))
    }

    fn into_result(self) -> ExtractionResult {
        let stage = self.stage();
        let detail = match self {
            StageFailure::Portal(Stage::Login, e) => {
                format!("login stage failed: {}. Please check your credentials.", e)
            }
            StageFailure::Portal(stage, e) => format!("{} stage failed: {}", stage, e),
            StageFailure::TimedOut(stage, timeout) => format!(
                "{} stage timed out after {} seconds",
                stage,
                timeout.as_secs_f64()
            ),
            StageFailure::Cancelled(stage) => format!("cancelled during {} stage", stage),
        };
        ExtractionResult::failed(stage, detail)
    }
}

async fn run<P: Portal>(
    mut portal: P,
    extraction: Extraction,
    events: mpsc::Sender<TaskEvent>,
    mut cancel: watch::Receiver<bool>,
) -> P {
    let result = match extract(&mut portal, &extraction, &events, &mut cancel).await {
        Ok(courses) => {
            ::log::info!("Extracted {} courses", courses.len());
            ExtractionResult::succeeded(courses)
        }
        Err(failure) => {
            ::log::error!("Course extraction failed: {:?}", failure);
            if failure.leaves_session_dirty() {
                close_within(&mut portal, extraction.stage_timeout).await;
            }
            failure.into_result()
        }
    };

    if events.send(TaskEvent::Finished(result)).await.is_err() {
        ::log::debug!("Extraction result dropped, caller is gone");
    }

    portal
}

async fn extract<P: Portal>(
    portal: &mut P,
    extraction: &Extraction,
    events: &mpsc::Sender<TaskEvent>,
    cancel: &mut watch::Receiver<bool>,
) -> Result<CourseList, StageFailure> {
    let timeout = extraction.stage_timeout;

    notify(events, "Setting up browser...");
    run_stage(Stage::Setup, timeout, cancel, portal.prepare()).await?;

    notify(events, "Logging in to Moodle...");
    run_stage(
        Stage::Login,
        timeout,
        cancel,
        portal.login(&extraction.instance, &extraction.credentials),
    )
    .await?;

    notify(events, "Navigating to dashboard...");
    run_stage(
        Stage::Navigation,
        timeout,
        cancel,
        portal.navigate_to_dashboard(&extraction.instance),
    )
    .await?;

    notify(events, "Extracting course list...");
    let markup = run_stage(Stage::Fetch, timeout, cancel, portal.page_markup()).await?;

    Ok(extract_courses(&markup))
}

/// Closes the session, giving up once `timeout` passes so an unresponsive
/// driver cannot hold back the terminal event
pub async fn close_within<P: Portal>(portal: &mut P, timeout: Duration) {
    if tokio::time::timeout(timeout, portal.close()).await.is_err() {
        ::log::warn!(
            "Browser session did not close within {} seconds, abandoning it",
            timeout.as_secs_f64()
        );
    }
}

/// Runs one stage, bounded by the timeout and interruptible by cancellation
async fn run_stage<T, F>(
    stage: Stage,
    timeout: Duration,
    cancel: &mut watch::Receiver<bool>,
    work: F,
) -> Result<T, StageFailure>
where
    F: Future<Output = Result<T, PortalError>>,
{
    ::log::debug!("Entering {} stage", stage);

    tokio::select! {
        biased;
        _ = cancelled(cancel) => Err(StageFailure::Cancelled(stage)),
        outcome = tokio::time::timeout(timeout, work) => match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StageFailure::Portal(stage, e)),
            Err(_) => Err(StageFailure::TimedOut(stage, timeout)),
        },
    }
}

/// Resolves once cancellation is requested; never resolves if the handle is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let closed = cancel.wait_for(|requested| *requested).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

fn notify(events: &mpsc::Sender<TaskEvent>, message: &str) {
    ::log::info!("{}", message);
    if events
        .try_send(TaskEvent::Status(message.to_string()))
        .is_err()
    {
        ::log::trace!("Status dropped: {}", message);
    }
}
