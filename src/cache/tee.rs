//! Stream adapter that copies forwarded chunks into the cache.
//!
//! Chunks are yielded to the client as soon as they arrive. The copy is only
//! committed once the whole body has been observed: the origin stream ends
//! cleanly, or the declared `Content-Length` has been reached. An error, an
//! oversized body, or the client dropping the stream first discards it.

use axum::http::header;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use crate::cache::policy::TtlClass;
use crate::cache::store::{CacheKey, CachedResponse, ResponseCache};

/// Pending cache write carried alongside a streamed body.
#[derive(Debug)]
pub struct CacheFill {
    pub cache: ResponseCache,
    pub key: CacheKey,
    pub template: CachedResponse,
    pub class: TtlClass,
}

impl CacheFill {
    fn commit(self, body: Bytes) {
        let key = self.key.clone();
        let stored = self.cache.store(
            self.key,
            CachedResponse {
                body,
                ..self.template
            },
            self.class,
        );
        if stored {
            tracing::debug!(key = key.as_str(), class = self.class.as_str(), "Cached streamed response");
        }
    }
}

pub struct TeeStream<S> {
    inner: S,
    buffer: BytesMut,
    fill: Option<CacheFill>,
    expected_len: Option<usize>,
}

impl<S> TeeStream<S> {
    pub fn new(inner: S, fill: Option<CacheFill>) -> Self {
        let expected_len = fill.as_ref().and_then(|f| {
            f.template
                .headers
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
        });
        Self {
            inner,
            buffer: BytesMut::new(),
            fill,
            expected_len,
        }
    }

    fn commit(&mut self) {
        if let Some(fill) = self.fill.take() {
            let body = std::mem::take(&mut self.buffer).freeze();
            fill.commit(body);
        }
    }
}

impl<S, E> Stream for TeeStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match ready!(this.inner.poll_next_unpin(cx)) {
            Some(Ok(chunk)) => {
                if let Some(fill) = &this.fill {
                    if this.buffer.len() + chunk.len() > fill.cache.policy().max_entry_bytes() {
                        this.fill = None;
                        this.buffer = BytesMut::new();
                    } else {
                        this.buffer.extend_from_slice(&chunk);
                        if this.expected_len == Some(this.buffer.len()) {
                            this.commit();
                        }
                    }
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                this.fill = None;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                this.commit();
                Poll::Ready(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::policy::CachePolicy;
    use crate::config::CacheConfig;
    use axum::http::{HeaderMap, Method, StatusCode};
    use futures_util::stream;

    fn fill(cache: &ResponseCache, key: &CacheKey) -> CacheFill {
        CacheFill {
            cache: cache.clone(),
            key: key.clone(),
            template: CachedResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Bytes::new(),
            },
            class: TtlClass::Long,
        }
    }

    #[tokio::test]
    async fn test_commits_after_clean_end() {
        let cache = ResponseCache::new(CachePolicy::from_config(&CacheConfig::default()));
        let key = CacheKey::new(&Method::GET, "/a.js", None);
        let chunks = stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"ab")),
            Ok(Bytes::from_static(b"cd")),
        ]);

        let mut tee = TeeStream::new(chunks, Some(fill(&cache, &key)));
        assert_eq!(tee.next().await.unwrap().unwrap(), Bytes::from_static(b"ab"));
        assert!(cache.lookup(&key).is_none());
        assert_eq!(tee.next().await.unwrap().unwrap(), Bytes::from_static(b"cd"));
        assert!(tee.next().await.is_none());

        assert_eq!(cache.lookup(&key).unwrap().body, Bytes::from_static(b"abcd"));
    }

    #[tokio::test]
    async fn test_commits_at_declared_length() {
        let cache = ResponseCache::new(CachePolicy::from_config(&CacheConfig::default()));
        let key = CacheKey::new(&Method::GET, "/a.js", None);
        let mut pending = fill(&cache, &key);
        pending
            .template
            .headers
            .insert(header::CONTENT_LENGTH, "4".parse().unwrap());
        let chunks = stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"ab")),
            Ok(Bytes::from_static(b"cd")),
        ]);

        let mut tee = TeeStream::new(chunks, Some(pending));
        tee.next().await;
        tee.next().await;
        drop(tee);

        assert_eq!(cache.lookup(&key).unwrap().body, Bytes::from_static(b"abcd"));
    }

    #[tokio::test]
    async fn test_dropped_stream_does_not_cache() {
        let cache = ResponseCache::new(CachePolicy::from_config(&CacheConfig::default()));
        let key = CacheKey::new(&Method::GET, "/a.js", None);
        let chunks = stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"ab")),
            Ok(Bytes::from_static(b"cd")),
        ]);

        let mut tee = TeeStream::new(chunks, Some(fill(&cache, &key)));
        tee.next().await;
        drop(tee);

        assert!(cache.lookup(&key).is_none());
    }

    #[tokio::test]
    async fn test_error_discards_copy() {
        let cache = ResponseCache::new(CachePolicy::from_config(&CacheConfig::default()));
        let key = CacheKey::new(&Method::GET, "/a.js", None);
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Err(std::io::Error::other("reset")),
        ]);

        let collected: Vec<_> = TeeStream::new(chunks, Some(fill(&cache, &key))).collect().await;
        assert_eq!(collected.len(), 2);
        assert!(cache.lookup(&key).is_none());
    }
}
