// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::stream::FuturesOrdered;
use futures::FutureExt;
use futures::StreamExt;

/// BoxedFuture is the type alias of [`futures::future::BoxFuture`].
pub type BoxedFuture<'a, T> = futures::future::BoxFuture<'a, T>;

/// BoxedStaticFuture is a [`BoxedFuture`] that owns everything it uses.
pub type BoxedStaticFuture<T> = futures::future::BoxFuture<'static, T>;

/// ConcurrentFutures is a bounded queue of in-flight futures.
///
/// - outputs are yielded in push order, regardless of completion order.
/// - at most `concurrent` futures are held at the same time.
/// - `concurrent == 1` runs without any extra allocation.
///
/// Futures only make progress while the queue is polled. Dropping the queue
/// or calling [`ConcurrentFutures::clear`] cancels every in-flight future.
pub struct ConcurrentFutures<F: Future + Unpin> {
    tasks: Tasks<F>,
    concurrent: usize,
}

enum Tasks<F: Future + Unpin> {
    Once(Option<F>),
    Ordered(FuturesOrdered<F>),
}

impl<F: Future + Unpin> Unpin for Tasks<F> {}

impl<F> ConcurrentFutures<F>
where
    F: Future + Unpin + 'static,
{
    /// Create a queue holding up to `concurrent` futures, `0` is treated as `1`.
    pub fn new(concurrent: usize) -> Self {
        let concurrent = concurrent.max(1);
        let tasks = if concurrent == 1 {
            Tasks::Once(None)
        } else {
            Tasks::Ordered(FuturesOrdered::new())
        };

        Self { tasks, concurrent }
    }

    /// Drop all in-flight futures.
    pub fn clear(&mut self) {
        match &mut self.tasks {
            Tasks::Once(fut) => *fut = None,
            Tasks::Ordered(tasks) => *tasks = FuturesOrdered::new(),
        }
    }

    /// Number of in-flight futures.
    pub fn len(&self) -> usize {
        match &self.tasks {
            Tasks::Once(fut) => fut.is_some() as usize,
            Tasks::Ordered(v) => v.len(),
        }
    }

    /// Return true if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return true if another future can be pushed.
    pub fn has_remaining(&self) -> bool {
        self.len() < self.concurrent
    }

    /// Push a new future to the back of the queue.
    pub fn push(&mut self, f: F) {
        debug_assert!(
            self.has_remaining(),
            "concurrent futures must have remaining space"
        );

        match &mut self.tasks {
            Tasks::Once(fut) => *fut = Some(f),
            Tasks::Ordered(v) => v.push_back(f),
        }
    }
}

impl<F> futures::Stream for ConcurrentFutures<F>
where
    F: Future + Unpin + 'static,
{
    type Item = F::Output;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match &mut self.get_mut().tasks {
            Tasks::Once(fut) => match fut {
                Some(x) => x.poll_unpin(cx).map(|v| {
                    *fut = None;
                    Some(v)
                }),
                None => Poll::Ready(None),
            },
            Tasks::Ordered(v) => v.poll_next_unpin(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;

    /// Decrements the live counter when the owning future is dropped.
    struct Live(Arc<AtomicUsize>);

    impl Drop for Live {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn task(idx: usize, live: &Arc<AtomicUsize>) -> BoxedStaticFuture<usize> {
        live.fetch_add(1, Ordering::SeqCst);
        let guard = Live(live.clone());
        Box::pin(async move {
            let _guard = guard;
            // Later tasks finish first.
            tokio::time::sleep(Duration::from_millis(100 - idx as u64)).await;
            idx
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_ordered_output() {
        for concurrent in [1, 4, 16] {
            let live = Arc::new(AtomicUsize::new(0));
            let mut tasks = ConcurrentFutures::new(concurrent);
            let mut output = vec![];

            for idx in 0..50 {
                if !tasks.has_remaining() {
                    output.push(tasks.next().await.unwrap());
                }
                tasks.push(task(idx, &live));
                assert!(tasks.len() <= concurrent);
            }
            while let Some(v) = tasks.next().await {
                output.push(v);
            }

            assert_eq!(output, (0..50).collect::<Vec<_>>(), "concurrent {concurrent}");
            assert_eq!(live.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_drops_in_flight() {
        let live = Arc::new(AtomicUsize::new(0));
        let mut tasks = ConcurrentFutures::new(4);
        for idx in 0..4 {
            tasks.push(task(idx, &live));
        }
        assert_eq!(live.load(Ordering::SeqCst), 4);

        tasks.clear();
        assert!(tasks.is_empty());
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}
