use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::app::{App, Command, Message, Sample};
use crate::client::ReadingBackend;
use crate::error::Result;

/// Owns the dashboard state and drives the poll timer and the analysis call.
///
/// The event loop in [`run`](Self::run) is the only writer of [`App`]. Network
/// completions arrive as [`Message`]s; anything that resolves after the token
/// is cancelled is dropped on the floor.
pub struct LiveReadingController<B> {
    backend: Arc<B>,
    app: App,
    interval: Duration,
    token: CancellationToken,
    tx: UnboundedSender<Message>,
    rx: UnboundedReceiver<Message>,
}

impl<B: ReadingBackend> LiveReadingController<B> {
    pub fn new(
        backend: B,
        interval: Duration,
        analysis_tick: u64,
        token: CancellationToken,
    ) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            backend: Arc::new(backend),
            app: App::new(analysis_tick),
            interval,
            token,
            tx,
            rx,
        }
    }

    /// Extra producer for messages that do not come from the network (keys, resize).
    pub fn sender(&self) -> UnboundedSender<Message> {
        self.tx.clone()
    }

    /// Runs until the token is cancelled or `render` fails, then returns the
    /// final state. `render` is called once up front and after every message.
    pub async fn run<F>(self, mut render: F) -> Result<App>
    where
        F: FnMut(&App) -> Result<()>,
    {
        let Self {
            backend,
            mut app,
            interval,
            token,
            tx,
            mut rx,
        } = self;

        // Tears the poller down on every exit path, including a failed render.
        let _guard = token.clone().drop_guard();

        let poller = tokio::spawn(poll_loop(
            Arc::clone(&backend),
            interval,
            tx.clone(),
            token.clone(),
        ));
        info!(interval_ms = interval.as_millis() as u64, "Polling started");

        render(&app)?;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                Some(message) = rx.recv() => {
                    if let Some(command) = app.update(message) {
                        execute(command, &backend, &tx, &token);
                    }
                    render(&app)?;
                }
            }
        }

        let _ = poller.await;
        info!(
            ticks = app.elapsed_ticks,
            failed = app.failed_polls,
            "Polling stopped"
        );
        Ok(app)
    }
}

fn execute<B: ReadingBackend>(
    command: Command,
    backend: &Arc<B>,
    tx: &UnboundedSender<Message>,
    token: &CancellationToken,
) {
    match command {
        Command::RequestAnalysis(values) => {
            let backend = Arc::clone(backend);
            let tx = tx.clone();
            let token = token.clone();
            tokio::spawn(async move {
                let text = backend.request_analysis(values).await;
                deliver(&tx, &token, Message::Analysis(text));
            });
        }
    }
}

async fn poll_loop<B: ReadingBackend>(
    backend: Arc<B>,
    period: Duration,
    tx: UnboundedSender<Message>,
    token: CancellationToken,
) {
    // First poll after one full period, like a browser interval.
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                // Each poll runs on its own so a hung request never holds up the next tick.
                let backend = Arc::clone(&backend);
                let tx = tx.clone();
                let token = token.clone();
                tokio::spawn(async move {
                    let message = match backend.fetch_reading().await {
                        Ok(value) => Message::Reading(Sample::now(value)),
                        Err(e) => Message::ReadingFailed(e.to_string()),
                    };
                    deliver(&tx, &token, message);
                });
            }
        }
    }
}

fn deliver(tx: &UnboundedSender<Message>, token: &CancellationToken, message: Message) {
    if token.is_cancelled() || tx.send(message).is_err() {
        debug!("Discarding completion after teardown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    // Replays scripted polls; `None` is a failed poll. Runs dry into failures.
    // With a gate set, the analysis reply waits until the gate is notified.
    struct FakeBackend {
        polls: Mutex<VecDeque<Option<f64>>>,
        analysis_calls: Arc<Mutex<Vec<Vec<f64>>>>,
        reply: String,
        gate: Option<Arc<Notify>>,
    }

    impl FakeBackend {
        fn new(polls: impl IntoIterator<Item = Option<f64>>, reply: &str) -> Self {
            Self {
                polls: Mutex::new(polls.into_iter().collect()),
                analysis_calls: Arc::new(Mutex::new(Vec::new())),
                reply: reply.to_string(),
                gate: None,
            }
        }
    }

    impl ReadingBackend for FakeBackend {
        async fn fetch_reading(&self) -> Result<f64> {
            match self.polls.lock().unwrap().pop_front().flatten() {
                Some(value) => Ok(value),
                None => Err(Error::Status(503)),
            }
        }

        async fn request_analysis(&self, values: Vec<f64>) -> String {
            self.analysis_calls.lock().unwrap().push(values);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.reply.clone()
        }
    }

    fn controller(
        backend: FakeBackend,
        token: &CancellationToken,
    ) -> LiveReadingController<FakeBackend> {
        LiveReadingController::new(backend, Duration::from_millis(1000), 10, token.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn ten_successful_polls_send_one_analysis() {
        let backend = FakeBackend::new((1..=10).map(|v| Some(f64::from(v))), "All clear");
        let calls = Arc::clone(&backend.analysis_calls);
        let token = CancellationToken::new();
        let stop = token.clone();

        let app = controller(backend, &token)
            .run(|app| {
                if app.analysis.is_some() {
                    stop.cancel();
                }
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(app.analysis.as_deref(), Some("All clear"));
        assert_eq!(app.elapsed_ticks, 10);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![(1..=10).map(f64::from).collect::<Vec<_>>()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_counts_only_successful_polls() {
        let mut script = vec![Some(1.0), Some(2.0), None];
        script.extend((3..=12).map(|v| Some(f64::from(v))));
        let backend = FakeBackend::new(script, "Stable");
        let calls = Arc::clone(&backend.analysis_calls);
        let token = CancellationToken::new();
        let stop = token.clone();

        let app = controller(backend, &token)
            .run(|app| {
                if app.analysis.is_some() {
                    stop.cancel();
                }
                Ok(())
            })
            .await
            .unwrap();

        assert!(app.failed_polls >= 1);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![(1..=10).map(f64::from).collect::<Vec<_>>()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_before_trigger_sends_nothing() {
        let backend = FakeBackend::new((1..=20).map(|v| Some(f64::from(v))), "unused");
        let calls = Arc::clone(&backend.analysis_calls);
        let token = CancellationToken::new();
        let stop = token.clone();

        let app = controller(backend, &token)
            .run(|app| {
                if app.elapsed_ticks == 5 {
                    stop.cancel();
                }
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(app.elapsed_ticks, 5);
        assert_eq!(app.window.values(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(app.analysis.is_none());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn render_failure_stops_the_poller() {
        let backend = FakeBackend::new((1..=20).map(|v| Some(f64::from(v))), "unused");
        let token = CancellationToken::new();

        let result = controller(backend, &token)
            .run(|app| {
                if app.elapsed_ticks == 2 {
                    return Err(Error::Io(std::io::Error::other("terminal gone")));
                }
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(Error::Io(_))));
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn analysis_settling_after_teardown_is_discarded() {
        let gate = Arc::new(Notify::new());
        let mut backend = FakeBackend::new((1..=20).map(|v| Some(f64::from(v))), "Too late");
        backend.gate = Some(Arc::clone(&gate));
        let calls = Arc::clone(&backend.analysis_calls);
        let token = CancellationToken::new();
        let stop = token.clone();

        // Tear down as soon as the analysis request is in flight.
        let app = controller(backend, &token)
            .run(|app| {
                if app.elapsed_ticks == 10 {
                    stop.cancel();
                }
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(app.elapsed_ticks, 10);
        assert!(app.analysis.is_none());

        // Let the pending request finish; nothing is left to receive it.
        gate.notify_one();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(app.analysis.is_none());
    }

    #[test]
    fn deliver_drops_messages_once_cancelled() {
        let (tx, mut rx) = unbounded_channel();
        let token = CancellationToken::new();

        deliver(&tx, &token, Message::Analysis("on time".into()));
        assert_eq!(rx.try_recv().ok(), Some(Message::Analysis("on time".into())));

        token.cancel();
        deliver(&tx, &token, Message::Analysis("too late".into()));
        deliver(&tx, &token, Message::Reading(Sample::new(1.0, "12:00:00")));
        assert!(rx.try_recv().is_err());
    }
}
