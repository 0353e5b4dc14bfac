//! Per-endpoint request scheduler.
//!
//! Each endpoint gets one task that owns its [`TokenBucket`] and queue. Callers
//! talk to it only through messages: new work arrives as
//! [`SchedulerMessage::Enqueue`] and goes to the back of the queue; a request
//! the upstream throttled comes back as [`SchedulerMessage::Retry`] once its
//! backoff timer fires and goes to the front. Only one operation per endpoint
//! runs at a time.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::error::{ClassifiedError, RawError, classify};
use crate::rate_limit::backoff::compute_delay;
use crate::rate_limit::{RateLimitConfig, TokenBucket};

/// Outcome delivered to the caller.
pub(crate) type Completion<T> = Result<T, ClassifiedError>;

/// Type-erased unit of work held in a queue.
pub(crate) trait Job: Send {
    /// Run the operation once. On success the caller has been completed.
    fn execute(&mut self) -> BoxFuture<'_, Result<(), ClassifiedError>>;

    /// Complete the caller with an error.
    fn reject(self: Box<Self>, error: ClassifiedError);

    /// Whether the caller stopped waiting for this request.
    fn is_abandoned(&self) -> bool;
}

/// A caller's operation paired with its completion channel.
struct PendingOperation<F, T> {
    operation: F,
    completion: Option<oneshot::Sender<Completion<T>>>,
}

impl<F, Fut, T, E> Job for PendingOperation<F, T>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<RawError> + 'static,
{
    fn execute(&mut self) -> BoxFuture<'_, Result<(), ClassifiedError>> {
        let operation = &mut self.operation;
        let completion = &mut self.completion;
        Box::pin(async move {
            let outcome = AssertUnwindSafe(async move { operation().await })
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(value)) => {
                    if let Some(tx) = completion.take() {
                        // The caller may have gone away meanwhile.
                        let _ = tx.send(Ok(value));
                    }
                    Ok(())
                }
                Ok(Err(error)) => Err(classify(&error.into())),
                Err(_) => Err(ClassifiedError::Unhandled("operation panicked".to_string())),
            }
        })
    }

    fn reject(mut self: Box<Self>, error: ClassifiedError) {
        if let Some(tx) = self.completion.take() {
            let _ = tx.send(Err(error));
        }
    }

    fn is_abandoned(&self) -> bool {
        self.completion.as_ref().is_none_or(|tx| tx.is_closed())
    }
}

/// A request waiting in, or moving between, an endpoint's queue.
pub(crate) struct QueuedRequest {
    job: Box<dyn Job>,
    retry_count: u32,
}

impl QueuedRequest {
    /// Wrap an operation; the returned receiver resolves with its outcome.
    pub(crate) fn new<F, Fut, T, E>(operation: F) -> (Self, oneshot::Receiver<Completion<T>>)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<RawError> + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job = PendingOperation {
            operation,
            completion: Some(tx),
        };
        let request = Self {
            job: Box::new(job),
            retry_count: 0,
        };
        (request, rx)
    }

    /// Complete the caller with an error.
    pub(crate) fn reject(self, error: ClassifiedError) {
        self.job.reject(error);
    }
}

impl std::fmt::Debug for QueuedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedRequest")
            .field("retry_count", &self.retry_count)
            .field("abandoned", &self.job.is_abandoned())
            .finish()
    }
}

/// Messages accepted by an endpoint scheduler.
#[derive(Debug)]
pub(crate) enum SchedulerMessage {
    /// A fresh request, served after everything already queued.
    Enqueue(QueuedRequest),
    /// A throttled request whose backoff elapsed, served next.
    Retry(QueuedRequest),
}

impl SchedulerMessage {
    fn into_request(self) -> QueuedRequest {
        match self {
            SchedulerMessage::Enqueue(request) | SchedulerMessage::Retry(request) => request,
        }
    }
}

/// Handle to a running endpoint scheduler.
#[derive(Debug, Clone)]
pub(crate) struct SchedulerHandle {
    tx: mpsc::UnboundedSender<SchedulerMessage>,
    config: RateLimitConfig,
}

impl SchedulerHandle {
    /// Queue a request.
    ///
    /// Hands the request back if the scheduler task has stopped.
    pub(crate) fn enqueue(&self, request: QueuedRequest) -> Result<(), QueuedRequest> {
        self.tx
            .send(SchedulerMessage::Enqueue(request))
            .map_err(|mpsc::error::SendError(message)| message.into_request())
    }

    /// Whether the scheduler task is still accepting work.
    pub(crate) fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Configuration the scheduler was started with.
    pub(crate) fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

/// The task that serializes all work for one endpoint.
pub(crate) struct EndpointScheduler {
    endpoint: String,
    config: RateLimitConfig,
    bucket: TokenBucket,
    queue: VecDeque<QueuedRequest>,
    rx: mpsc::UnboundedReceiver<SchedulerMessage>,
    /// Used by backoff timers to send retries back; weak so the task can end
    /// once every handle is dropped.
    retry_tx: mpsc::WeakUnboundedSender<SchedulerMessage>,
}

impl EndpointScheduler {
    /// Spawn a scheduler for `endpoint` and return a handle to it.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(endpoint: impl Into<String>, config: RateLimitConfig) -> SchedulerHandle {
        let endpoint = endpoint.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let scheduler = EndpointScheduler {
            endpoint,
            config,
            bucket: TokenBucket::new(config.max_requests, config.window),
            queue: VecDeque::new(),
            rx,
            retry_tx: tx.downgrade(),
        };
        tokio::spawn(scheduler.run());

        SchedulerHandle { tx, config }
    }

    /// Main scheduler loop.
    async fn run(mut self) {
        tracing::info!(endpoint = %self.endpoint, config = ?self.config, "endpoint scheduler started");

        loop {
            self.drain_mailbox();

            if self.queue.is_empty() {
                match self.rx.recv().await {
                    Some(message) => {
                        self.accept(message);
                        continue;
                    }
                    None => break,
                }
            }

            self.discard_abandoned();
            if self.queue.is_empty() {
                continue;
            }

            self.bucket.refill(Instant::now());
            if !self.bucket.try_consume() {
                let wait = self.bucket.token_interval();
                tracing::debug!(
                    endpoint = %self.endpoint,
                    queued = self.queue.len(),
                    wait_ms = wait.as_millis() as u64,
                    "out of tokens, waiting"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if let Some(request) = self.queue.pop_front() {
                self.dispatch(request).await;
            }
        }

        tracing::info!(endpoint = %self.endpoint, "endpoint scheduler shutting down");
    }

    /// Pull every message that is already waiting, without blocking.
    fn drain_mailbox(&mut self) {
        while let Ok(message) = self.rx.try_recv() {
            self.accept(message);
        }
    }

    fn accept(&mut self, message: SchedulerMessage) {
        match message {
            SchedulerMessage::Enqueue(request) => self.queue.push_back(request),
            SchedulerMessage::Retry(request) => self.queue.push_front(request),
        }
    }

    /// Drop requests at the head of the queue whose callers went away, so
    /// they never consume a token.
    fn discard_abandoned(&mut self) {
        while self
            .queue
            .front()
            .is_some_and(|request| request.job.is_abandoned())
        {
            self.queue.pop_front();
            tracing::debug!(endpoint = %self.endpoint, "dropping abandoned request");
        }
    }

    /// Run one request and decide what happens to it.
    async fn dispatch(&mut self, mut request: QueuedRequest) {
        let error = match request.job.execute().await {
            Ok(()) => return,
            Err(error) => error,
        };

        if !error.is_retryable() {
            tracing::debug!(endpoint = %self.endpoint, %error, "request failed");
            request.reject(error);
            return;
        }

        if request.retry_count >= self.config.max_retries {
            tracing::warn!(
                endpoint = %self.endpoint,
                attempts = request.retry_count + 1,
                "retries exhausted"
            );
            request.reject(error);
            return;
        }

        let delay = compute_delay(
            request.retry_count,
            self.config.base_delay,
            self.config.max_delay,
        );
        request.retry_count += 1;
        tracing::warn!(
            endpoint = %self.endpoint,
            retry = request.retry_count,
            max_retries = self.config.max_retries,
            delay_ms = delay.as_millis() as u64,
            "rate limited, scheduling retry"
        );
        self.schedule_retry(request, delay);
    }

    /// Send `request` back to this scheduler once `delay` has elapsed.
    fn schedule_retry(&self, request: QueuedRequest, delay: Duration) {
        let Some(tx) = self.retry_tx.upgrade() else {
            request.reject(ClassifiedError::TooManyRequests);
            return;
        };

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(mpsc::error::SendError(message)) = tx.send(SchedulerMessage::Retry(request)) {
                message.into_request().reject(ClassifiedError::TooManyRequests);
            }
        });
    }
}
