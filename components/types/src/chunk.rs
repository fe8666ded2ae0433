use std::{cmp::min, collections::HashSet};

use rangemap::RangeMap;
use serde::{Deserialize, Serialize};

use crate::file_id::FileId;

/// One write-record in a file's append-only chunk log.
///
/// The log order itself carries no meaning; every resolution below depends
/// only on `mtime`. Fields mirror the filer wire shape, anything else the
/// filer attaches to a chunk is opaque to this layer.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub file_id: FileId,
    pub offset: i64,
    pub size: u64,
    pub mtime: i64,
}

impl Chunk {
    pub fn new(file_id: impl Into<FileId>, offset: i64, size: u64, mtime: i64) -> Self {
        Self {
            file_id: file_id.into(),
            offset,
            size,
            mtime,
        }
    }

    #[inline]
    pub fn stop(&self) -> i64 { self.offset + self.size as i64 }
}

/// A maximal logical byte range `[start, stop)` whose current contents come
/// from a single chunk: the newest one covering that range.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VisibleInterval {
    pub start: i64,
    pub stop: i64,
    pub mtime: i64,
    pub file_id: FileId,
}

/// A single physical sub-read: fetch `size` bytes at `offset` inside blob
/// `file_id`, destined for `logic_offset` in the caller's buffer.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ChunkView {
    pub file_id: FileId,
    pub offset: i64,
    pub size: u64,
    pub logic_offset: i64,
}

// The value stored per visible range. Carries the log index so compaction
// can tell apart otherwise identical chunks.
#[derive(Debug, Clone, Eq, PartialEq)]
struct ChunkSource {
    index: usize,
    mtime: i64,
    file_id: FileId,
}

/// Project the whole chunk log into the latest view, newest writer wins.
///
/// Chunks are replayed in ascending mtime order into a [`RangeMap`]; each
/// insertion overwrites whatever older chunks claimed for that range, so the
/// surviving ranges are exactly the newest cover of every byte. Equal mtimes
/// resolve to the chunk appearing later in the log (the replay is stable).
fn visible_range_map(chunks: &[Chunk]) -> RangeMap<i64, ChunkSource> {
    let mut order: Vec<usize> = (0..chunks.len()).collect();
    order.sort_by_key(|&i| chunks[i].mtime);

    let mut rm = RangeMap::new();
    for i in order {
        let chunk = &chunks[i];
        if chunk.size == 0 {
            continue;
        }
        rm.insert(
            chunk.offset..chunk.stop(),
            ChunkSource {
                index: i,
                mtime: chunk.mtime,
                file_id: chunk.file_id.clone(),
            },
        );
    }
    rm
}

/// Resolve a chunk log into its ordered, non-overlapping visible intervals.
pub fn non_overlapping_visible_intervals(chunks: &[Chunk]) -> Vec<VisibleInterval> {
    visible_range_map(chunks)
        .iter()
        .map(|(range, source)| VisibleInterval {
            start: range.start,
            stop: range.end,
            mtime: source.mtime,
            file_id: source.file_id.clone(),
        })
        .collect()
}

/// Partition the chunk log into chunks still contributing at least one
/// visible interval and chunks fully shadowed by newer writes.
pub fn compact_file_chunks(chunks: Vec<Chunk>) -> (Vec<Chunk>, Vec<Chunk>) {
    let live_indices: HashSet<usize> = visible_range_map(&chunks)
        .iter()
        .map(|(_, source)| source.index)
        .collect();

    let mut live = Vec::with_capacity(live_indices.len());
    let mut garbage = Vec::with_capacity(chunks.len() - live_indices.len());
    for (i, chunk) in chunks.into_iter().enumerate() {
        if live_indices.contains(&i) {
            live.push(chunk);
        } else {
            garbage.push(chunk);
        }
    }
    (live, garbage)
}

/// Plan the sub-reads needed to satisfy a read of `[offset, offset+size)`.
///
/// Views are emitted in ascending `logic_offset` order and stay contiguous
/// from `offset`: the first hole in the visible intervals stops emission, so
/// the assembled buffer is truncated there (short read) instead of being
/// zero-filled. The blob-internal offset is taken relative to the visible
/// interval's start.
pub fn view_from_chunks(chunks: &[Chunk], offset: i64, size: u64) -> Vec<ChunkView> {
    let visibles = non_overlapping_visible_intervals(chunks);
    let stop = offset + size as i64;

    let mut views = Vec::new();
    let mut cursor = offset;
    for interval in visibles {
        if cursor >= stop {
            break;
        }
        if interval.stop <= cursor {
            continue;
        }
        if interval.start > cursor {
            // hole: the read ends here
            break;
        }
        let view_stop = min(interval.stop, stop);
        views.push(ChunkView {
            file_id: interval.file_id,
            offset: cursor - interval.start,
            size: (view_stop - cursor) as u64,
            logic_offset: cursor,
        });
        cursor = view_stop;
    }
    views
}

/// Hole-tolerant variant of [`view_from_chunks`]: emits every clipped view
/// overlapping the window without stopping at gaps. Callers pre-zero the
/// output buffer so unclaimed ranges read as zeroes.
pub fn view_from_chunks_with_holes(chunks: &[Chunk], offset: i64, size: u64) -> Vec<ChunkView> {
    let visibles = non_overlapping_visible_intervals(chunks);
    let stop = offset + size as i64;

    let mut views = Vec::new();
    for interval in visibles {
        if interval.stop <= offset {
            continue;
        }
        if interval.start >= stop {
            break;
        }
        let logic_offset = interval.start.max(offset);
        let view_stop = min(interval.stop, stop);
        views.push(ChunkView {
            file_id: interval.file_id,
            offset: logic_offset - interval.start,
            size: (view_stop - logic_offset) as u64,
            logic_offset,
        });
    }
    views
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(offset: i64, size: u64, file_id: &str, mtime: i64) -> Chunk {
        Chunk::new(file_id, offset, size, mtime)
    }

    #[test]
    fn interval_merging() {
        struct Case {
            chunks: Vec<Chunk>,
            expected: Vec<(i64, i64, &'static str)>,
        }

        let cases = vec![
            // sequential, no overlap
            Case {
                chunks: vec![
                    chunk(0, 100, "abc", 123),
                    chunk(100, 100, "asdf", 134),
                    chunk(200, 100, "fsad", 353),
                ],
                expected: vec![(0, 100, "abc"), (100, 200, "asdf"), (200, 300, "fsad")],
            },
            // full overwrite
            Case {
                chunks: vec![chunk(0, 100, "abc", 123), chunk(0, 200, "asdf", 134)],
                expected: vec![(0, 200, "asdf")],
            },
            // partial overwrite
            Case {
                chunks: vec![chunk(0, 100, "abc", 123), chunk(0, 50, "asdf", 134)],
                expected: vec![(0, 50, "asdf"), (50, 100, "abc")],
            },
            // layered overwrites
            Case {
                chunks: vec![
                    chunk(0, 100, "abc", 123),
                    chunk(0, 200, "asdf", 134),
                    chunk(50, 250, "xxxx", 154),
                ],
                expected: vec![(0, 50, "asdf"), (50, 300, "xxxx")],
            },
            // a write far away leaves a hole
            Case {
                chunks: vec![
                    chunk(0, 100, "abc", 123),
                    chunk(0, 200, "asdf", 134),
                    chunk(250, 250, "xxxx", 154),
                ],
                expected: vec![(0, 200, "asdf"), (250, 500, "xxxx")],
            },
            // out-of-order mtimes, middle chunk fully shadowed
            Case {
                chunks: vec![
                    chunk(0, 100, "abc", 123),
                    chunk(0, 200, "asdf", 184),
                    chunk(70, 150, "abc", 143),
                    chunk(80, 100, "xxxx", 134),
                ],
                expected: vec![(0, 200, "asdf"), (200, 220, "abc")],
            },
            // duplicated writes collapse to one interval
            Case {
                chunks: vec![
                    chunk(0, 100, "abc", 123),
                    chunk(0, 100, "abc", 123),
                    chunk(0, 100, "abc", 123),
                ],
                expected: vec![(0, 100, "abc")],
            },
        ];

        for (i, case) in cases.iter().enumerate() {
            let intervals = non_overlapping_visible_intervals(&case.chunks);
            assert_eq!(
                intervals.len(),
                case.expected.len(),
                "case {}: interval count",
                i
            );
            for (x, (interval, want)) in intervals.iter().zip(&case.expected).enumerate() {
                assert_eq!(interval.start, want.0, "case {} interval {} start", i, x);
                assert_eq!(interval.stop, want.1, "case {} interval {} stop", i, x);
                assert_eq!(interval.file_id, want.2, "case {} interval {} file id", i, x);
            }
        }
    }

    #[test]
    fn merged_intervals_are_disjoint_and_sorted() {
        let chunks = vec![
            chunk(10, 100, "abc", 50),
            chunk(100, 100, "def", 100),
            chunk(200, 100, "ghi", 200),
            chunk(110, 200, "jkl", 300),
            chunk(0, 40, "mno", 25),
            chunk(500, 10, "pqr", 75),
        ];
        let intervals = non_overlapping_visible_intervals(&chunks);
        for pair in intervals.windows(2) {
            assert!(pair[0].stop <= pair[1].start, "{:?}", pair);
        }
        for interval in &intervals {
            assert!(interval.start < interval.stop, "{:?}", interval);
        }
    }

    #[test]
    fn newest_chunk_claims_every_covered_byte() {
        let chunks = vec![
            chunk(0, 100, "abc", 123),
            chunk(0, 200, "asdf", 184),
            chunk(70, 150, "abc", 143),
            chunk(80, 100, "xxxx", 134),
        ];
        let intervals = non_overlapping_visible_intervals(&chunks);
        for b in 0..520i64 {
            let covering: Vec<&Chunk> = chunks
                .iter()
                .filter(|c| c.offset <= b && b < c.stop())
                .collect();
            let visible = intervals.iter().find(|v| v.start <= b && b < v.stop);
            match covering.iter().max_by_key(|c| c.mtime) {
                Some(newest) => {
                    let visible = visible.unwrap_or_else(|| panic!("byte {} uncovered", b));
                    assert_eq!(visible.file_id, newest.file_id, "byte {}", b);
                }
                None => assert!(visible.is_none(), "byte {} should be a hole", b),
            }
        }
    }

    #[test]
    fn zero_size_chunks_contribute_nothing() {
        let chunks = vec![chunk(0, 0, "abc", 123), chunk(10, 0, "def", 456)];
        assert!(non_overlapping_visible_intervals(&chunks).is_empty());

        let (live, garbage) = compact_file_chunks(chunks);
        assert!(live.is_empty());
        assert_eq!(garbage.len(), 2);
    }

    #[test]
    fn merge_is_idempotent() {
        let chunks = vec![
            chunk(0, 100, "abc", 123),
            chunk(0, 200, "asdf", 184),
            chunk(70, 150, "abc", 143),
            chunk(250, 50, "tail", 90),
        ];
        let once = non_overlapping_visible_intervals(&chunks);
        let rewrapped: Vec<Chunk> = once
            .iter()
            .map(|v| Chunk::new(v.file_id.clone(), v.start, (v.stop - v.start) as u64, v.mtime))
            .collect();
        let twice = non_overlapping_visible_intervals(&rewrapped);
        let key = |v: &VisibleInterval| (v.start, v.stop, v.file_id.clone());
        assert_eq!(
            once.iter().map(key).collect::<Vec<_>>(),
            twice.iter().map(key).collect::<Vec<_>>()
        );
    }

    #[test]
    fn compact_log() {
        let chunks = vec![
            chunk(10, 100, "abc", 50),
            chunk(100, 100, "def", 100),
            chunk(200, 100, "ghi", 200),
            chunk(110, 200, "jkl", 300),
        ];

        let (compacted, garbage) = compact_file_chunks(chunks);

        assert_eq!(compacted.len(), 3);
        assert_eq!(garbage.len(), 1);
        assert_eq!(garbage[0].file_id, "ghi");
    }

    #[test]
    fn compact_preserves_the_log_and_its_view() {
        let chunks = vec![
            chunk(0, 100, "abc", 123),
            chunk(0, 200, "asdf", 184),
            chunk(70, 150, "abc", 143),
            chunk(80, 100, "xxxx", 134),
            chunk(80, 100, "xxxx", 134),
        ];

        let (live, garbage) = compact_file_chunks(chunks.clone());
        assert_eq!(live.len() + garbage.len(), chunks.len());

        let mut recombined = live.clone();
        recombined.extend(garbage);
        let sort_key = |c: &Chunk| (c.file_id.clone(), c.offset, c.size, c.mtime);
        recombined.sort_by_key(sort_key);
        let mut original = chunks.clone();
        original.sort_by_key(sort_key);
        assert_eq!(recombined, original);

        assert_eq!(
            non_overlapping_visible_intervals(&live),
            non_overlapping_visible_intervals(&chunks)
        );
    }

    #[test]
    fn chunk_reading() {
        struct Case {
            chunks: Vec<Chunk>,
            offset: i64,
            size: u64,
            expected: Vec<(i64, u64, &'static str, i64)>, // offset, size, file id, logic offset
        }

        let cases = vec![
            // sequential read across three chunks
            Case {
                chunks: vec![
                    chunk(0, 100, "abc", 123),
                    chunk(100, 100, "asdf", 134),
                    chunk(200, 100, "fsad", 353),
                ],
                offset: 0,
                size: 250,
                expected: vec![(0, 100, "abc", 0), (0, 100, "asdf", 100), (0, 50, "fsad", 200)],
            },
            // full overwrite, interior read
            Case {
                chunks: vec![chunk(0, 100, "abc", 123), chunk(0, 200, "asdf", 134)],
                offset: 50,
                size: 100,
                expected: vec![(50, 100, "asdf", 50)],
            },
            // partial overwrite straddling both chunks
            Case {
                chunks: vec![chunk(0, 100, "abc", 123), chunk(0, 50, "asdf", 134)],
                offset: 25,
                size: 50,
                expected: vec![(25, 25, "asdf", 25), (0, 25, "abc", 50)],
            },
            // layered overwrites
            Case {
                chunks: vec![
                    chunk(0, 100, "abc", 123),
                    chunk(0, 200, "asdf", 134),
                    chunk(50, 250, "xxxx", 154),
                ],
                offset: 0,
                size: 200,
                expected: vec![(0, 50, "asdf", 0), (0, 150, "xxxx", 50)],
            },
            // a hole truncates the plan: nothing after the gap is emitted
            Case {
                chunks: vec![
                    chunk(0, 100, "abc", 123),
                    chunk(0, 200, "asdf", 134),
                    chunk(250, 250, "xxxx", 154),
                ],
                offset: 0,
                size: 400,
                expected: vec![(0, 200, "asdf", 0)],
            },
            // shadowed middle chunk contributes only its tail
            Case {
                chunks: vec![
                    chunk(0, 100, "abc", 123),
                    chunk(0, 200, "asdf", 184),
                    chunk(70, 150, "abc", 143),
                    chunk(80, 100, "xxxx", 134),
                ],
                offset: 0,
                size: 220,
                expected: vec![(0, 200, "asdf", 0), (0, 20, "abc", 200)],
            },
            // duplicated writes
            Case {
                chunks: vec![
                    chunk(0, 100, "abc", 123),
                    chunk(0, 100, "abc", 123),
                    chunk(0, 100, "abc", 123),
                ],
                offset: 0,
                size: 100,
                expected: vec![(0, 100, "abc", 0)],
            },
            // read window ends exactly on a chunk boundary
            Case {
                chunks: vec![
                    chunk(0, 100, "abc", 123),
                    chunk(100, 100, "asdf", 134),
                    chunk(200, 100, "fsad", 353),
                ],
                offset: 0,
                size: 200,
                expected: vec![(0, 100, "abc", 0), (0, 100, "asdf", 100)],
            },
        ];

        for (i, case) in cases.iter().enumerate() {
            let views = view_from_chunks(&case.chunks, case.offset, case.size);
            assert_eq!(views.len(), case.expected.len(), "case {}: view count", i);
            for (x, (view, want)) in views.iter().zip(&case.expected).enumerate() {
                assert_eq!(view.offset, want.0, "case {} view {} offset", i, x);
                assert_eq!(view.size, want.1, "case {} view {} size", i, x);
                assert_eq!(view.file_id, want.2, "case {} view {} file id", i, x);
                assert_eq!(view.logic_offset, want.3, "case {} view {} logic offset", i, x);
            }
        }
    }

    #[test]
    fn views_never_exceed_the_requested_window() {
        let chunks = vec![
            chunk(0, 100, "abc", 123),
            chunk(0, 200, "asdf", 134),
            chunk(250, 250, "xxxx", 154),
        ];
        for (offset, size) in [(0i64, 400u64), (0, 10), (150, 500), (199, 1), (450, 200)] {
            let views = view_from_chunks(&chunks, offset, size);
            let total: u64 = views.iter().map(|v| v.size).sum();
            assert!(total <= size, "offset {} size {}: read {}", offset, size, total);
            for pair in views.windows(2) {
                assert_eq!(
                    pair[0].logic_offset + pair[0].size as i64,
                    pair[1].logic_offset,
                    "views must stay contiguous"
                );
            }
        }
    }

    #[test]
    fn read_starting_inside_a_hole_returns_nothing() {
        let chunks = vec![chunk(0, 100, "abc", 123), chunk(250, 50, "xxxx", 154)];
        assert!(view_from_chunks(&chunks, 120, 50).is_empty());
        assert!(view_from_chunks(&chunks, 500, 10).is_empty());
    }

    #[test]
    fn hole_tolerant_views_skip_gaps() {
        let chunks = vec![
            chunk(0, 100, "abc", 123),
            chunk(0, 200, "asdf", 134),
            chunk(250, 250, "xxxx", 154),
        ];
        let views = view_from_chunks_with_holes(&chunks, 0, 400);
        assert_eq!(
            views,
            vec![
                ChunkView {
                    file_id: "asdf".to_string(),
                    offset: 0,
                    size: 200,
                    logic_offset: 0,
                },
                ChunkView {
                    file_id: "xxxx".to_string(),
                    offset: 0,
                    size: 150,
                    logic_offset: 250,
                },
            ]
        );
    }

    #[test]
    fn empty_log_yields_nothing() {
        assert!(non_overlapping_visible_intervals(&[]).is_empty());
        assert!(view_from_chunks(&[], 0, 100).is_empty());
        let (live, garbage) = compact_file_chunks(vec![]);
        assert!(live.is_empty() && garbage.is_empty());
    }
}
