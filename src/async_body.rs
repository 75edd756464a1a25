use std::io::{self, Write};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures_util::{ready, Stream};
use http::HeaderMap;
use http_body::Body;
use pin_project::pin_project;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// Adapter that turns an `impl AsyncRead` to an `impl Body`.
#[pin_project]
#[derive(Debug)]
pub struct AsyncReadBody<T> {
    #[pin]
    reader: ReaderStream<T>,
}

impl<T> AsyncReadBody<T>
where
    T: AsyncRead,
{
    /// Create a new [`AsyncReadBody`] wrapping the given reader,
    /// with a specific read buffer capacity
    pub(crate) fn with_capacity(read: T, capacity: usize) -> Self {
        Self {
            reader: ReaderStream::with_capacity(read, capacity),
        }
    }
}

impl<T> Body for AsyncReadBody<T>
where
    T: AsyncRead,
{
    type Data = Bytes;
    type Error = io::Error;

    fn poll_data(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        self.project().reader.poll_next(cx)
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<HeaderMap>, Self::Error>> {
        Poll::Ready(Ok(None))
    }
}

/// Like [`AsyncReadBody`], but gzip-compresses the data on the way.
#[pin_project]
pub struct GzipReadBody<T> {
    #[pin]
    reader: ReaderStream<T>,
    encoder: Option<GzEncoder<Vec<u8>>>,
}

impl<T> GzipReadBody<T>
where
    T: AsyncRead,
{
    pub(crate) fn with_capacity(read: T, capacity: usize) -> Self {
        Self {
            reader: ReaderStream::with_capacity(read, capacity),
            encoder: Some(GzEncoder::new(Vec::new(), Compression::default())),
        }
    }
}

impl<T> Body for GzipReadBody<T>
where
    T: AsyncRead,
{
    type Data = Bytes;
    type Error = io::Error;

    fn poll_data(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        let mut this = self.project();
        loop {
            let Some(encoder) = this.encoder.as_mut() else {
                return Poll::Ready(None);
            };

            match ready!(this.reader.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    encoder.write_all(&chunk)?;
                    let compressed = std::mem::take(encoder.get_mut());
                    // The encoder buffers small inputs, keep reading until
                    // it hands out something.
                    if !compressed.is_empty() {
                        return Poll::Ready(Some(Ok(Bytes::from(compressed))));
                    }
                }
                Some(Err(err)) => {
                    *this.encoder = None;
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    let encoder = this.encoder.take();
                    return match encoder.map(GzEncoder::finish) {
                        Some(Ok(rest)) => Poll::Ready(Some(Ok(Bytes::from(rest)))),
                        Some(Err(err)) => Poll::Ready(Some(Err(err))),
                        None => Poll::Ready(None),
                    };
                }
            }
        }
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<HeaderMap>, Self::Error>> {
        Poll::Ready(Ok(None))
    }

    fn is_end_stream(&self) -> bool {
        self.encoder.is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    #[tokio::test]
    async fn plain_body_streams_everything() {
        let data = vec![7u8; 10_000];
        let body = AsyncReadBody::with_capacity(&data[..], 1024);
        let bytes = hyper::body::to_bytes(body).await.unwrap();
        assert_eq!(bytes.as_ref(), &data[..]);
    }

    #[tokio::test]
    async fn gzip_body_round_trips() {
        let text = "The quick brown fox jumps over the lazy dog.\n".repeat(5000);
        let body = GzipReadBody::with_capacity(text.as_bytes(), 4096);
        let compressed = hyper::body::to_bytes(body).await.unwrap();
        assert!(compressed.len() < text.len());

        let mut decoded = String::new();
        GzDecoder::new(&compressed[..])
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, text);
    }

    #[tokio::test]
    async fn gzip_body_of_empty_input() {
        let body = GzipReadBody::with_capacity(&b""[..], 4096);
        let compressed = hyper::body::to_bytes(body).await.unwrap();

        let mut decoded = Vec::new();
        GzDecoder::new(&compressed[..]).read_to_end(&mut decoded).unwrap();
        assert!(decoded.is_empty());
    }
}
