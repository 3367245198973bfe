use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::Error;

/// Repeats a fetch on a fixed period and publishes the latest outcome.
///
/// Each tick awaits its fetch before the next one starts, so responses are
/// published in the order they were requested. Dropping the poller stops it.
pub struct Poller<T> {
    receiver: watch::Receiver<Option<Result<T, Error>>>,
    handle: JoinHandle<()>,
}

impl<T> Poller<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn spawn<F, Fut>(period: Duration, mut fetch: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, Error>> + Send,
    {
        let (sender, receiver) = watch::channel(None);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let result = fetch().await;
                if let Err(err) = &result {
                    tracing::warn!(%err, "poll failed");
                }

                if sender.send(Some(result)).is_err() {
                    break;
                }
            }
        });

        Self { receiver, handle }
    }

    /// Outcome of the most recent fetch, if one has finished.
    pub fn latest(&self) -> Option<Result<T, Error>> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next fetch to finish.
    pub async fn changed(&mut self) -> Result<Option<Result<T, Error>>, Error> {
        self.receiver
            .changed()
            .await
            .map_err(|_| Error::invalid_state_error("Polling has stopped"))?;

        Ok(self.latest())
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test(start_paused = true)]
async fn cancelled_poller_performs_no_further_fetches() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let fetches = Arc::new(AtomicUsize::new(0));
    let counter = fetches.clone();
    let mut poller = Poller::spawn(Duration::from_secs(10), move || {
        let counter = counter.clone();
        async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1) }
    });

    assert_eq!(poller.changed().await.unwrap(), Some(Ok(1)));
    assert_eq!(poller.changed().await.unwrap(), Some(Ok(2)));

    poller.cancel();
    assert!(poller.changed().await.is_err());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
    assert_eq!(poller.latest(), Some(Ok(2)));
}

#[tokio::test(start_paused = true)]
async fn slow_fetches_never_overlap() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let in_flight = Arc::new(AtomicUsize::new(0));
    let overlapped = Arc::new(AtomicUsize::new(0));
    let sequence = Arc::new(AtomicUsize::new(0));

    let (flight, overlap, seq) = (in_flight.clone(), overlapped.clone(), sequence.clone());
    let mut poller = Poller::spawn(Duration::from_secs(10), move || {
        let (flight, overlap, seq) = (flight.clone(), overlap.clone(), seq.clone());
        async move {
            if flight.fetch_add(1, Ordering::SeqCst) > 0 {
                overlap.fetch_add(1, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_secs(25)).await;
            flight.fetch_sub(1, Ordering::SeqCst);

            Ok(seq.fetch_add(1, Ordering::SeqCst))
        }
    });

    let mut seen = Vec::new();
    for _ in 0..4 {
        if let Some(Ok(value)) = poller.changed().await.unwrap() {
            seen.push(value);
        }
    }

    assert_eq!(seen, vec![0, 1, 2, 3]);
    assert_eq!(overlapped.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_fetches_are_published_and_polling_continues() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let fetches = Arc::new(AtomicUsize::new(0));
    let counter = fetches.clone();
    let mut poller = Poller::spawn(Duration::from_secs(30), move || {
        let counter = counter.clone();
        async move {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Err(Error::network_error("connection refused")),
                n => Ok(n),
            }
        }
    });

    let first = poller.changed().await.unwrap().unwrap();
    assert!(first.unwrap_err().is_network_error());

    assert_eq!(poller.changed().await.unwrap(), Some(Ok(1)));
}
