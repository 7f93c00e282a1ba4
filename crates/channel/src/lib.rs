// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! A bounded mpsc channel that exposes its current depth as a gauge. Used for
//! the fan-in edges between components (RPC handler -> queue, consensus ->
//! state machine apply) where an unbounded channel would hide backpressure that
//! should instead surface to the producer.

use aptos_metrics_core::IntGaugeVec;
use futures::{
    channel::mpsc,
    sink::Sink,
    stream::Stream,
    task::{Context, Poll},
};
use once_cell::sync::Lazy;
use std::pin::Pin;

static PENDING_MESSAGES: Lazy<IntGaugeVec> = Lazy::new(|| {
    aptos_metrics_core::register_int_gauge_vec!(
        "sequencer_channel_pending_messages",
        "Number of messages sitting in a named channel",
        &["channel"]
    )
    .unwrap()
});

pub fn new<T>(capacity: usize, label: &'static str) -> (Sender<T>, Receiver<T>) {
    let (sender, receiver) = mpsc::channel(capacity);
    let gauge = PENDING_MESSAGES.with_label_values(&[label]);
    (
        Sender {
            inner: sender,
            gauge: gauge.clone(),
        },
        Receiver {
            inner: receiver,
            gauge,
        },
    )
}

#[derive(Clone)]
pub struct Sender<T> {
    inner: mpsc::Sender<T>,
    gauge: aptos_metrics_core::IntGauge,
}

impl<T> Sender<T> {
    pub fn try_send(&mut self, msg: T) -> Result<(), mpsc::TrySendError<T>> {
        self.inner.try_send(msg)?;
        self.gauge.inc();
        Ok(())
    }
}

impl<T> Sink<T> for Sender<T> {
    type Error = mpsc::SendError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner).poll_ready(cx)
    }

    fn start_send(mut self: Pin<&mut Self>, item: T) -> Result<(), Self::Error> {
        self.gauge.inc();
        Pin::new(&mut self.inner).start_send(item)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner).poll_close(cx)
    }
}

pub struct Receiver<T> {
    inner: mpsc::Receiver<T>,
    gauge: aptos_metrics_core::IntGauge,
}

impl<T> Stream for Receiver<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(item)) => {
                self.gauge.dec();
                Poll::Ready(Some(item))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn delivers_in_order() {
        let (mut tx, mut rx) = new::<u32>(8, "test_channel");
        for i in 0..4 {
            tx.try_send(i).unwrap();
        }
        for i in 0..4 {
            assert_eq!(rx.next().await, Some(i));
        }
    }
}
