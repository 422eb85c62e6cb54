use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use site_api::{Record, VideoSubmission, MAX_SUBMISSION_BYTES};

use crate::error::{LogError, TopicError};
use crate::log::DurableLog;
use crate::subscriber::{Subscriber, SubscriberRegistry};
use crate::transport::Transport;

/// How a live session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed the connection or stopped reading.
    PeerClosed,
    /// Writing to the peer failed.
    TransportFailed,
    /// The subscriber fell too far behind and was dropped.
    Lagged,
    /// The topic was closed by the server.
    Shutdown,
}

// ═══════════════════════════════════════════════════════════════
//  Topic
// ═══════════════════════════════════════════════════════════════

/// Именованный канал: durable log + live subscribers.
///
/// Запись сначала сохраняется, потом рассылается. Fanout идёт под write lock
/// лога, поэтому все подписчики видят записи в порядке лога.
pub struct Topic {
    name: String,
    log: Arc<DurableLog>,
    subscribers: Arc<SubscriberRegistry>,
    buffer: usize,
    shutdown: CancellationToken,
}

impl Topic {
    /// `buffer` bounds how many live records may queue for one subscriber
    /// (including those that arrive while its history is being sent).
    pub fn new(name: impl Into<String>, log: DurableLog, buffer: usize) -> Self {
        Self {
            name: name.into(),
            log: Arc::new(log),
            subscribers: Arc::new(SubscriberRegistry::new()),
            buffer,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&self) -> &DurableLog {
        &self.log
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Проверить размер и опубликовать текстовую заявку.
    pub async fn submit(&self, text: &str) -> Result<Arc<Record>, TopicError> {
        if text.len() > MAX_SUBMISSION_BYTES {
            return Err(TopicError::PayloadTooLarge {
                size: text.len(),
                limit: MAX_SUBMISSION_BYTES,
            });
        }
        let record = serde_json::to_value(VideoSubmission::new(text)).map_err(LogError::Encode)?;
        self.publish(record).await
    }

    /// Persist `record`, then fan it out to every live subscriber.
    ///
    /// A record that fails to persist is never broadcast. Append and fanout
    /// run on their own task: once the first poll starts them, dropping the
    /// returned future no longer splits the two.
    pub async fn publish(&self, record: Record) -> Result<Arc<Record>, TopicError> {
        let record = Arc::new(record);
        let log = self.log.clone();
        let subscribers = self.subscribers.clone();
        let task = tokio::spawn({
            let record = record.clone();
            async move { log.append_then(&record, || subscribers.broadcast(&record)).await }
        });

        let delivered = match task.await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                tracing::error!(topic = %self.name, error = %e, "append failed, record not broadcast");
                return Err(e.into());
            }
            Err(e) => {
                tracing::error!(topic = %self.name, error = %e, "publish task failed");
                return Err(TopicError::Publish(e));
            }
        };
        tracing::debug!(topic = %self.name, delivered, "record published");
        Ok(record)
    }

    /// Serve one connection until it closes: full history first, then live.
    ///
    /// The log dump and the subscriber registration happen under the same
    /// shared log lock. Records published after the dump queue up on the
    /// subscriber while its history is written, so the client sees every
    /// record exactly once and in log order.
    pub async fn connect<T: Transport>(&self, mut transport: T) -> Result<SessionEnd, TopicError> {
        let (subscriber, mut inbox) = Subscriber::channel(self.buffer);

        // ── Replaying ──
        let history = match self
            .log
            .dump_all_then(|| self.subscribers.add(subscriber.clone()))
            .await
        {
            Ok((history, ())) => history,
            Err(e) => {
                tracing::error!(topic = %self.name, error = %e, "history dump failed, dropping connection");
                transport.close().await;
                return Err(e.into());
            }
        };
        let _registration = Registration {
            registry: &self.subscribers,
            subscriber: subscriber.clone(),
        };

        tracing::debug!(topic = %self.name, history = history.len(), "replaying history");
        for record in &history {
            let sent = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    transport.close().await;
                    return Ok(SessionEnd::Shutdown);
                }
                _ = subscriber.closed() => {
                    transport.close().await;
                    return Ok(SessionEnd::Lagged);
                }
                sent = transport.send(record) => sent,
            };
            if let Err(e) = sent {
                tracing::debug!(topic = %self.name, error = %e, "send failed during replay");
                transport.close().await;
                return Ok(SessionEnd::TransportFailed);
            }
        }
        drop(history);

        // ── Live ──
        tracing::debug!(topic = %self.name, subscribers = self.subscribers.len(), "subscriber live");
        let end = self.live(&mut transport, &subscriber, &mut inbox).await;

        // ── Closed ──
        transport.close().await;
        tracing::debug!(topic = %self.name, reason = ?end, "subscriber closed");
        Ok(end)
    }

    async fn live<T: Transport>(
        &self,
        transport: &mut T,
        subscriber: &Subscriber,
        inbox: &mut mpsc::Receiver<Arc<Record>>,
    ) -> SessionEnd {
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => return SessionEnd::Shutdown,

                _ = subscriber.closed() => return SessionEnd::Lagged,

                _ = transport.closed() => return SessionEnd::PeerClosed,

                record = inbox.recv() => {
                    let Some(record) = record else {
                        return SessionEnd::Lagged;
                    };
                    // A peer that stops reading must not pin the session.
                    tokio::select! {
                        biased;
                        _ = self.shutdown.cancelled() => return SessionEnd::Shutdown,
                        _ = subscriber.closed() => return SessionEnd::Lagged,
                        sent = transport.send(&record) => {
                            if let Err(e) = sent {
                                tracing::debug!(topic = %self.name, error = %e, "live send failed");
                                return SessionEnd::TransportFailed;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Завершить все live-сессии topic'а.
    pub fn close(&self) {
        self.shutdown.cancel();
        self.subscribers.close_all();
    }
}

/// Keeps a subscriber registered for the lifetime of its session.
///
/// Dropping it removes the subscriber on every exit path, including
/// cancellation of the session task.
struct Registration<'a> {
    registry: &'a SubscriberRegistry,
    subscriber: Arc<Subscriber>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.subscriber.close();
        self.registry.remove(&self.subscriber);
    }
}
