#![forbid(unsafe_code)]

//! Bridge from a [`Source`] into an async [`futures::Stream`].

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedReceiver, unbounded};

use crate::error::StreamError;
use crate::source::Source;
use crate::subscription::{Observer, Subscription};

/// A [`Stream`] fed by a source subscription.
///
/// Values arrive as `Ok(value)`. An error from the source arrives as one
/// `Err` item, after which the stream ends; completion ends the stream.
/// Dropping the stream drops the subscription.
#[derive(Debug)]
pub struct SourceStream<T> {
    receiver: UnboundedReceiver<Result<T, StreamError>>,
    _subscription: Subscription,
}

impl<T: Clone + 'static> SourceStream<T> {
    pub(crate) fn subscribe<S: Source<T> + ?Sized>(source: &S) -> Self {
        let (sender, receiver) = unbounded();
        let on_error = sender.clone();
        let on_done = sender.clone();
        let observer = Observer::new(move |value: &T| {
            // A closed receiver only means nobody is polling any more.
            let _ = sender.unbounded_send(Ok(value.clone()));
        })
        .on_error(move |err| {
            let _ = on_error.unbounded_send(Err(err.clone()));
            on_error.close_channel();
        })
        .on_completed(move || on_done.close_channel());

        Self {
            receiver,
            _subscription: source.subscribe_with(observer),
        }
    }
}

impl<T> Stream for SourceStream<T> {
    type Item = Result<T, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_next_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorSubject;
    use crate::subject::Subject;
    use futures::executor::block_on;

    #[test]
    fn values_then_end_on_completion() {
        let subject = Subject::new();
        let mut stream = subject.to_stream();
        subject.next(1);
        subject.next(2);
        subject.complete();

        let items: Vec<i32> = block_on(async {
            let mut out = Vec::new();
            while let Some(item) = stream.next().await {
                out.push(item.expect("no error"));
            }
            out
        });
        assert_eq!(items, vec![1, 2]);
    }

    #[test]
    fn error_is_last_item() {
        let subject: Subject<i32> = Subject::new();
        let mut stream = subject.to_stream();
        subject.next(9);
        subject.error(StreamError::msg("bad"));

        block_on(async {
            assert_eq!(stream.next().await.map(|r| r.ok()), Some(Some(9)));
            let err = stream.next().await.and_then(|r| r.err());
            assert_eq!(err.map(|e| e.to_string()).as_deref(), Some("bad"));
            assert!(stream.next().await.is_none());
        });
    }

    #[test]
    fn behavior_replays_into_stream() {
        let b = BehaviorSubject::new(false);
        let mut stream = b.to_stream();
        b.set(true);
        b.complete();
        let items: Vec<bool> = block_on(stream.by_ref().map(|r| r.expect("value")).collect());
        assert_eq!(items, vec![false, true]);
    }

    #[test]
    fn dropping_stream_unsubscribes() {
        let subject: Subject<i32> = Subject::new();
        let stream = subject.to_stream();
        assert!(subject.has_observers());
        drop(stream);
        assert!(!subject.has_observers());
    }
}
