//! Simple stateless pub-sub event handler
//!
//! Components of the engine publish domain events (an item changed status, a refund went through, a seller was paid)
//! and any number of producers can feed one handler. Handlers are stateless: they receive the event and nothing
//! else, but they may be async.
//!
//! Events are published only after the database transaction they describe has committed.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinSet},
};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for in-flight handler calls to finish.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Without our own sender, the channel closes once the last producer goes away
        drop(self.sender);
        let mut jobs = JoinSet::new();
        loop {
            tokio::select! {
                ev = self.listener.recv() => match ev {
                    Some(ev) => {
                        trace!("📬️ Handling event");
                        let handler = Arc::clone(&self.handler);
                        jobs.spawn(async move { (handler)(ev).await });
                    },
                    None => break,
                },
                Some(result) = jobs.join_next(), if !jobs.is_empty() => log_job_result(result),
            }
        }
        debug!("📬️ All producers have gone. Waiting for {} jobs to complete", jobs.len());
        while let Some(result) = jobs.join_next().await {
            log_job_result(result);
        }
        debug!("📬️ Event handler has shut down");
    }
}

fn log_job_result(result: Result<(), JoinError>) {
    if let Err(e) = result {
        warn!("📬️ An event handler job failed: {e}");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[tokio::test]
    async fn handler_drains_all_events() {
        let _ = env_logger::try_init();
        let count = Arc::new(AtomicU64::new(0));
        let c2 = count.clone();
        let handler = Arc::new(move |v| {
            let count = count.clone();
            Box::pin(async move {
                tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
                let _ = count.fetch_add(v, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new(1, handler);
        let producer_1 = event_handler.subscribe();
        let producer_2 = event_handler.subscribe();
        tokio::spawn(async move {
            for v in [1, 3, 5, 7, 9] {
                producer_1.publish_event(v).await;
            }
        });
        tokio::spawn(async move {
            for v in [0, 2, 4, 6, 8] {
                producer_2.publish_event(v).await;
            }
        });
        event_handler.start_handler().await;
        assert_eq!(c2.load(Ordering::SeqCst), 45);
    }
}
