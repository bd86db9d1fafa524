//! Response body helpers
//!
//! Every response body is an `UnsyncBoxBody`, so streamed objects, cached
//! buffers and empty error bodies share one type.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;

use crate::storage::ByteStream;

pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

const PAD_CHUNK: u64 = 64 * 1024;

pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn full(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn from_stream(stream: ByteStream) -> ResponseBody {
    StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync()
}

/// Stream yielding exactly `length` bytes
///
/// Extra bytes from the inner stream are dropped, a short inner stream is
/// padded with zeros. Keeps `Content-Length` framing intact when the store's
/// metadata and content disagree.
pub struct FixedLengthStream {
    inner: Option<ByteStream>,
    remaining: u64,
}

impl FixedLengthStream {
    pub fn new(inner: ByteStream, length: u64) -> Self {
        Self {
            inner: Some(inner),
            remaining: length,
        }
    }
}

impl Stream for FixedLengthStream {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.remaining == 0 {
                this.inner = None;
                return Poll::Ready(None);
            }

            let Some(inner) = this.inner.as_mut() else {
                let pad = this.remaining.min(PAD_CHUNK);
                this.remaining -= pad;
                #[allow(clippy::cast_possible_truncation)]
                return Poll::Ready(Some(Ok(Bytes::from(vec![0u8; pad as usize]))));
            };

            match inner.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => this.inner = None,
                Poll::Ready(Some(Ok(chunk))) if chunk.is_empty() => {}
                Poll::Ready(Some(Ok(mut chunk))) => {
                    if chunk.len() as u64 > this.remaining {
                        #[allow(clippy::cast_possible_truncation)]
                        chunk.truncate(this.remaining as usize);
                    }
                    this.remaining -= chunk.len() as u64;
                    return Poll::Ready(Some(Ok(chunk)));
                }
            }
        }
    }
}
