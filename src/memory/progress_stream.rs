use std::pin::Pin;
use std::task::{Context, Poll};
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use tokio::sync::mpsc;

pin_project! {
    /// Reports the fraction of `total_bytes` read so far after every chunk.
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        total_bytes: u64,
        bytes_read: u64,
        progress_tx: mpsc::UnboundedSender<f64>,
    }
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, total_bytes: u64, progress_tx: mpsc::UnboundedSender<f64>) -> Self {
        Self {
            inner,
            total_bytes,
            bytes_read: 0,
            progress_tx,
        }
    }

    fn fraction(bytes_read: u64, total_bytes: u64) -> f64 {
        if total_bytes == 0 {
            1.0
        } else {
            (bytes_read as f64 / total_bytes as f64).min(1.0)
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>>
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if !chunk.is_empty() {
                    *this.bytes_read += chunk.len() as u64;
                    let _ = this.progress_tx.send(Self::fraction(*this.bytes_read, *this.total_bytes));
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(None) => {
                // empty payloads never produce a chunk
                if *this.total_bytes == 0 {
                    let _ = this.progress_tx.send(1.0);
                }
                Poll::Ready(None)
            }
            other => other,
        }
    }
}
