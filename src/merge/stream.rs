//! Async fan-in of chunk producers into fixed-size output buffers.
//!
//! Each round pulls at most one chunk from every still-active producer and
//! queues what arrived.  Producers emit chunks in timestamp order, so the
//! smallest "last chunk start" among active producers is a watermark:
//! nothing can land before it any more and the merge window releases
//! everything up to it.  A producer error ends the merge with that error.

use futures::future::join_all;
use futures::{Stream, StreamExt};
use log::debug;

use super::window::{MergeOptions, MergeWindow};
use crate::audio::AudioChunk;
use crate::render::RenderError;

/// Merge `producers` into a time-ordered sequence of buffers.
///
/// Buffers are at most `options.capacity` samples long and concatenate to
/// the timeline starting at `options.origin`.  Overlapping chunks are
/// summed.
///
/// # Example
///
/// ```rust
/// use futures::{stream, StreamExt};
/// use timed_tts::audio::{AudioChunk, ChunkMetadata};
/// use timed_tts::merge::{merge_streams, MergeOptions};
///
/// # tokio_test_block(async {
/// let chunk = |t: f64| AudioChunk {
///     samples: vec![0.5; 100],
///     timestamp: t,
///     duration: 0.1,
///     metadata: ChunkMetadata::default(),
/// };
/// let a = stream::iter(vec![Ok(chunk(0.0))]);
/// let b = stream::iter(vec![Ok(chunk(0.1))]);
/// let options = MergeOptions { capacity: 1_000, sample_rate: 1_000, ..MergeOptions::default() };
/// let buffers: Vec<_> = merge_streams(vec![a, b], options).collect().await;
/// assert_eq!(buffers.len(), 1);
/// assert_eq!(buffers[0].as_ref().unwrap().len(), 200);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
pub fn merge_streams<S>(
    producers: Vec<S>,
    options: MergeOptions,
) -> impl Stream<Item = Result<Vec<f32>, RenderError>> + Send + 'static
where
    S: Stream<Item = Result<AudioChunk, RenderError>> + Unpin + Send + 'static,
{
    async_stream::try_stream! {
        let options = options.sanitized();
        let mut window = MergeWindow::new(&options);
        let mut producers: Vec<Option<S>> = producers.into_iter().map(Some).collect();
        let mut last_start: Vec<Option<i64>> = vec![None; producers.len()];
        let mut round = 0_u64;

        loop {
            if producers.iter().all(Option::is_none) {
                break;
            }

            let polls = producers.iter_mut().enumerate().filter_map(|(i, slot)| {
                slot.as_mut().map(|stream| async move { (i, stream.next().await) })
            });
            let results = join_all(polls).await;

            for (i, item) in results {
                match item {
                    Some(Ok(chunk)) => {
                        last_start[i] = Some(window.sample_index(chunk.timestamp));
                        window.push(chunk);
                    }
                    Some(Err(err)) => {
                        Err::<(), RenderError>(err)?;
                    }
                    None => {
                        debug!("merge: producer {i} finished after round {round}");
                        producers[i] = None;
                    }
                }
            }

            // Earliest sample any active producer can still deliver; unknown
            // until each of them has produced a chunk.
            let watermark = producers
                .iter()
                .zip(&last_start)
                .filter(|(slot, _)| slot.is_some())
                .map(|(_, start)| *start)
                .try_fold(None, |min: Option<i64>, start| {
                    start.map(|s| Some(min.map_or(s, |m| m.min(s))))
                })
                .flatten();
            if let Some(mark) = watermark {
                for buffer in window.release(mark) {
                    yield buffer;
                }
            }

            round += 1;
            if options.round_interval.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(options.round_interval).await;
            }
        }

        for buffer in window.finish() {
            yield buffer;
        }

        if window.dropped_samples() > 0 {
            log::warn!(
                "merge: {} late samples were clipped",
                window.dropped_samples()
            );
        }
        debug!("merge: done after {round} rounds");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures::stream::{self, BoxStream};

    use crate::audio::ChunkMetadata;

    type Producer = BoxStream<'static, Result<AudioChunk, RenderError>>;

    fn options(capacity: usize) -> MergeOptions {
        MergeOptions {
            capacity,
            sample_rate: 1_000,
            flush_threshold: 0.8,
            round_interval: Duration::ZERO,
            origin: 0.0,
        }
    }

    fn chunk(timestamp: f64, len: usize, value: f32) -> AudioChunk {
        AudioChunk {
            samples: vec![value; len],
            timestamp,
            duration: len as f64 / 1_000.0,
            metadata: ChunkMetadata::default(),
        }
    }

    fn producer(chunks: Vec<AudioChunk>) -> Producer {
        stream::iter(chunks.into_iter().map(Ok)).boxed()
    }

    async fn collect(producers: Vec<Producer>, opts: MergeOptions) -> Vec<Vec<f32>> {
        merge_streams(producers, opts)
            .map(|r| r.unwrap())
            .collect()
            .await
    }

    // ---- timeline ----------------------------------------------------------

    #[tokio::test]
    async fn non_overlapping_streams_cover_timeline_without_gap() {
        let a = producer(vec![chunk(0.0, 1_000, 0.25)]);
        let b = producer(vec![chunk(1.0, 1_000, 0.5)]);
        let out: Vec<f32> = collect(vec![a, b], options(10_000)).await.concat();
        assert_eq!(out.len(), 2_000);
        assert!(out[..1_000].iter().all(|&s| s == 0.25));
        assert!(out[1_000..].iter().all(|&s| s == 0.5));
    }

    #[tokio::test]
    async fn overlapping_streams_mix_additively() {
        let a = producer(vec![chunk(0.0, 1_000, 0.25)]);
        let b = producer(vec![chunk(0.0, 1_000, 0.5)]);
        let out: Vec<f32> = collect(vec![a, b], options(10_000)).await.concat();
        assert_eq!(out.len(), 1_000);
        for &s in &out {
            assert!(s >= 0.5);
            assert!((s - 0.75).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn buffers_never_exceed_capacity() {
        let a = producer((0..10).map(|i| chunk(i as f64 * 0.3, 300, 0.1)).collect());
        let b = producer((0..7).map(|i| chunk(0.15 + i as f64 * 0.4, 250, 0.1)).collect());
        let buffers = collect(vec![a, b], options(512)).await;
        assert!(!buffers.is_empty());
        assert!(buffers.iter().all(|b| b.len() <= 512));
        assert!(buffers.iter().all(|b| !b.is_empty()));
        let total: usize = buffers.iter().map(Vec::len).sum();
        assert_eq!(total, 3_000);
    }

    fn offline_mix(chunks: &[&AudioChunk], len: usize) -> Vec<f32> {
        let mut expected = vec![0.0_f32; len];
        for c in chunks {
            let start = (c.timestamp * 1_000.0).round() as usize;
            for (i, &s) in c.samples.iter().enumerate() {
                expected[start + i] += s;
            }
        }
        expected
    }

    #[tokio::test]
    async fn output_matches_offline_mix() {
        // A covers the timeline in three long chunks, B in twelve short ones,
        // so A runs far ahead of B in timeline terms.
        let a_chunks: Vec<_> = (0..3).map(|i| chunk(i as f64 * 0.4, 400, 0.1)).collect();
        let b_chunks: Vec<_> = (0..12).map(|i| chunk(i as f64 * 0.1, 50, 0.2)).collect();
        let expected = offline_mix(&a_chunks.iter().chain(&b_chunks).collect::<Vec<_>>(), 1_200);

        let out: Vec<f32> = collect(
            vec![producer(a_chunks), producer(b_chunks)],
            options(256),
        )
        .await
        .concat();
        assert_eq!(out.len(), expected.len());
        for (i, (a, b)) in out.iter().zip(&expected).enumerate() {
            assert!((a - b).abs() < 1e-6, "sample {i}: {a} vs {b}");
        }
    }

    #[tokio::test]
    async fn consecutive_segments_are_not_clipped() {
        // The second producer starts where the first ends; its chunks arrive
        // long before the first producer reaches that part of the timeline.
        let first: Vec<_> = (0..5).map(|i| chunk(i as f64 * 0.2, 200, 0.25)).collect();
        let second: Vec<_> = (0..5).map(|i| chunk(1.0 + i as f64 * 0.2, 200, 0.5)).collect();

        let out: Vec<f32> = collect(vec![producer(first), producer(second)], options(300))
            .await
            .concat();
        assert_eq!(out.len(), 2_000);
        assert!(out[..1_000].iter().all(|&s| s == 0.25));
        assert!(out[1_000..].iter().all(|&s| s == 0.5));
    }

    #[tokio::test]
    async fn gap_between_streams_is_silent() {
        let a = producer(vec![chunk(0.0, 100, 0.5)]);
        let b = producer(vec![chunk(0.5, 100, 0.5)]);
        let out: Vec<f32> = collect(vec![a, b], options(200)).await.concat();
        assert_eq!(out.len(), 600);
        assert!(out[100..500].iter().all(|&s| s == 0.0));
        assert!(out[500..].iter().all(|&s| s == 0.5));
    }

    #[tokio::test]
    async fn no_producers_yield_nothing() {
        let buffers = collect(Vec::new(), options(100)).await;
        assert!(buffers.is_empty());
    }

    #[tokio::test]
    async fn empty_producers_yield_nothing() {
        let buffers = collect(vec![producer(Vec::new()), producer(Vec::new())], options(100)).await;
        assert!(buffers.is_empty());
    }

    // ---- errors ------------------------------------------------------------

    #[tokio::test]
    async fn producer_error_ends_merge() {
        let failing: Producer = stream::iter(vec![
            Ok(chunk(0.0, 10, 0.1)),
            Err(RenderError::SynthesisFailure {
                segment_id: "cue".into(),
                chunk_index: 1,
                word_start_index: 50,
                reason: "backend down".into(),
            }),
            Ok(chunk(0.02, 10, 0.1)),
        ])
        .boxed();
        let healthy = producer(vec![chunk(0.0, 10, 0.1)]);

        let items: Vec<_> = merge_streams(vec![failing, healthy], options(1_000))
            .collect()
            .await;
        let last = items.last().unwrap();
        let err = last.as_ref().unwrap_err();
        assert_eq!(err.resume_point().unwrap().chunk_index, 1);
        assert!(items[..items.len() - 1].iter().all(Result::is_ok));
    }

    // ---- pacing ------------------------------------------------------------

    #[tokio::test]
    async fn threshold_flush_emits_before_producers_finish() {
        // One stalled producer keeps the merge open; once the settled part
        // of the window reaches 80 % it is emitted.
        let fast = producer(vec![chunk(0.0, 90, 0.1)]);
        let slow = stream::iter(vec![Ok(chunk(0.0, 10, 0.1)), Ok(chunk(0.085, 5, 0.1))])
            .chain(stream::pending())
            .boxed();
        let mut merged = Box::pin(merge_streams(vec![fast, slow], options(100)));
        let first = tokio::time::timeout(Duration::from_secs(1), merged.next())
            .await
            .expect("window should flush on threshold")
            .unwrap()
            .unwrap();
        assert_eq!(first.len(), 85);
        assert!(first.iter().all(|&s| s > 0.0));
    }

    #[tokio::test]
    async fn watermark_flush_emits_while_producers_active() {
        let a = stream::iter(vec![Ok(chunk(0.0, 10, 0.1)), Ok(chunk(0.25, 10, 0.1))])
            .chain(stream::pending())
            .boxed();
        let b = stream::iter(vec![Ok(chunk(0.05, 10, 0.1)), Ok(chunk(0.3, 10, 0.1))])
            .chain(stream::pending())
            .boxed();
        let mut merged = Box::pin(merge_streams(vec![a, b], options(100)));
        let first = tokio::time::timeout(Duration::from_secs(1), merged.next())
            .await
            .expect("watermark should release the first window")
            .unwrap()
            .unwrap();
        assert_eq!(first.len(), 100);
        assert_eq!(first[0], 0.1);
        assert_eq!(first[55], 0.1);
        assert_eq!(first[75], 0.0);
    }

    #[tokio::test]
    async fn stalled_producer_holds_back_its_region() {
        // B has produced nothing yet, so nothing is final.
        let a = producer((0..10).map(|i| chunk(i as f64 * 0.1, 100, 0.1)).collect());
        let b = stream::pending().boxed();
        let mut merged = Box::pin(merge_streams(vec![a, b], options(100)));
        let first = tokio::time::timeout(Duration::from_millis(50), merged.next()).await;
        assert!(first.is_err());
    }
}
