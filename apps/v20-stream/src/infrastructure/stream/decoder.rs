//! Frame Decoder
//!
//! Turns the raw body of a streaming response into complete JSON object
//! frames. The transport splits and coalesces frames arbitrarily, so the
//! decoder keeps the unterminated tail of each read and prepends it to the
//! next one.
//!
//! # Boundary Rules
//!
//! - Every `\n` in newly read bytes ends a frame.
//! - A read that ends on `}` with no newline ends a frame too; the server
//!   sends a bare closing brace as the last write before going idle.
//! - Anything else stays buffered until a later read terminates it.
//!
//! Frames are trimmed with [`trim_object_boundaries`] and empty frames are
//! dropped as keep-alive padding.
//!
//! # Memory
//!
//! The buffer grows in `grow_by` steps whenever less than `min_free` bytes
//! are free, and never past `max_capacity`. A frame that would need more is
//! a [`FrameError::ChunkTooBig`], not a silent truncation.

use std::ops::Range;

use tokio::io::{AsyncRead, AsyncReadExt};

/// Hard ceiling on the frame buffer: 5 MiB.
pub const DEFAULT_MAX_CAPACITY: usize = 5 * 1024 * 1024;

/// Initial buffer size and growth step: 64 KiB.
pub const DEFAULT_GROW_BY: usize = 64 * 1024;

/// Free space below which the buffer grows before a read.
pub const DEFAULT_MIN_FREE: usize = 512;

/// Buffer sizing for a [`FrameDecoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Bytes allocated up front.
    pub initial_capacity: usize,
    /// Bytes added per growth step.
    pub grow_by: usize,
    /// Minimum free space guaranteed before each read.
    pub min_free: usize,
    /// Absolute ceiling on the buffer size.
    pub max_capacity: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_GROW_BY,
            grow_by: DEFAULT_GROW_BY,
            min_free: DEFAULT_MIN_FREE,
            max_capacity: DEFAULT_MAX_CAPACITY,
        }
    }
}

/// Terminal errors of the read loop.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A single frame needs more than the buffer ceiling.
    #[error("frame exceeds the {limit} byte buffer ceiling")]
    ChunkTooBig {
        /// The configured ceiling.
        limit: usize,
    },

    /// The byte source failed.
    #[error("stream read failed: {0}")]
    Io(#[from] std::io::Error),

    /// The byte source is exhausted.
    #[error("end of stream")]
    EndOfStream,
}

/// Incremental JSON object frame decoder.
///
/// Owned by a single read loop; frames borrow its buffer until the next call.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// First byte not yet handed out as part of a frame.
    start: usize,
    /// One past the last valid byte.
    end: usize,
    frames: Vec<Range<usize>>,
    config: DecoderConfig,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl FrameDecoder {
    /// Create a decoder with the given buffer sizing.
    #[must_use]
    pub fn new(config: DecoderConfig) -> Self {
        let initial = config.initial_capacity.min(config.max_capacity);
        Self {
            buf: vec![0; initial],
            start: 0,
            end: 0,
            frames: Vec::new(),
            config: DecoderConfig {
                grow_by: config.grow_by.max(1),
                min_free: config.min_free.max(1),
                ..config
            },
        }
    }

    /// Current buffer size in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes of an unterminated frame waiting for more input.
    #[must_use]
    pub const fn buffered(&self) -> usize {
        self.end - self.start
    }

    /// Read once from `reader` and return the frames it completed.
    ///
    /// Suspends only on the read itself.
    ///
    /// # Errors
    ///
    /// - [`FrameError::ChunkTooBig`] if the buffer would outgrow its ceiling
    /// - [`FrameError::Io`] if the read fails
    /// - [`FrameError::EndOfStream`] on a zero-byte read; an unterminated
    ///   tail still in the buffer is discarded
    pub async fn next<R>(&mut self, reader: &mut R) -> Result<Frames<'_>, FrameError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.compact();
        self.reserve(self.config.min_free)?;

        let n = reader.read(&mut self.buf[self.end..]).await?;
        if n == 0 {
            if self.buffered() > 0 {
                tracing::debug!(
                    bytes = self.buffered(),
                    "Discarding unterminated frame at end of stream"
                );
            }
            return Err(FrameError::EndOfStream);
        }

        Ok(self.commit(n))
    }

    /// Append an in-memory chunk and return the frames it completed.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::ChunkTooBig`] if buffering the chunk would
    /// outgrow the ceiling.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Frames<'_>, FrameError> {
        self.compact();
        self.reserve(chunk.len().max(self.config.min_free))?;

        let n = chunk.len();
        self.buf[self.end..self.end + n].copy_from_slice(chunk);
        Ok(self.commit(n))
    }

    /// Move the unconsumed tail to the front of the buffer.
    fn compact(&mut self) {
        self.frames.clear();
        if self.start == 0 {
            return;
        }
        self.buf.copy_within(self.start..self.end, 0);
        self.end -= self.start;
        self.start = 0;
    }

    /// Make sure at least `needed` bytes are free past `end`.
    fn reserve(&mut self, needed: usize) -> Result<(), FrameError> {
        let free = self.buf.len() - self.end;
        if free >= needed {
            return Ok(());
        }

        let limit = self.config.max_capacity;
        let required = self.end + needed;
        if required > limit {
            tracing::warn!(
                buffered = self.buffered(),
                limit,
                "Frame buffer ceiling reached"
            );
            return Err(FrameError::ChunkTooBig { limit });
        }

        let steps = (required - self.buf.len()).div_ceil(self.config.grow_by);
        let grown = (self.buf.len() + steps * self.config.grow_by).min(limit);
        tracing::trace!(from = self.buf.len(), to = grown, "Growing frame buffer");
        self.buf.resize(grown, 0);
        Ok(())
    }

    /// Account for `n` new bytes at `end` and cut the frames they complete.
    fn commit(&mut self, n: usize) -> Frames<'_> {
        let scan_from = self.end;
        self.end += n;

        let mut frame_start = self.start;
        let mut scan = scan_from;
        while let Some(offset) = self.buf[scan..self.end].iter().position(|b| *b == b'\n') {
            let newline = scan + offset;
            self.push_frame(frame_start..newline);
            frame_start = newline + 1;
            scan = frame_start;
        }

        if frame_start < self.end && self.buf[self.end - 1] == b'}' {
            self.push_frame(frame_start..self.end);
            frame_start = self.end;
        }

        self.start = frame_start;
        Frames {
            buf: &self.buf,
            ranges: self.frames.iter(),
        }
    }

    fn push_frame(&mut self, range: Range<usize>) {
        let trimmed = trim_range(&self.buf[range.clone()]);
        if !trimmed.is_empty() {
            self.frames
                .push(range.start + trimmed.start..range.start + trimmed.end);
        }
    }
}

/// Frames completed by one decoder call, in arrival order.
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    buf: &'a [u8],
    ranges: std::slice::Iter<'a, Range<usize>>,
}

impl<'a> Iterator for Frames<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.ranges.next().map(|r| &self.buf[r.clone()])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ranges.size_hint()
    }
}

impl ExactSizeIterator for Frames<'_> {}

// =============================================================================
// Trimming
// =============================================================================

const fn is_padding(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

fn trim_range(frame: &[u8]) -> Range<usize> {
    let mut start = 0;
    let mut end = frame.len();

    if frame.first() != Some(&b'{') {
        let lead = frame.iter().take_while(|b| is_padding(**b)).count();
        if frame.get(lead) == Some(&b'{') {
            start = lead;
        }
    }

    if frame.last() != Some(&b'}') {
        let trail = frame[start..]
            .iter()
            .rev()
            .take_while(|b| is_padding(**b))
            .count();
        end -= trail;
    }

    start..end
}

/// Strip padding around a JSON object frame.
///
/// Leading space, tab and carriage return bytes are removed only when they
/// precede an opening `{`. Trailing ones are removed unless the frame
/// already ends with `}`. A frame of pure padding comes back empty.
#[must_use]
pub fn trim_object_boundaries(frame: &[u8]) -> &[u8] {
    &frame[trim_range(frame)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn collect(frames: Frames<'_>) -> Vec<String> {
        frames
            .map(|f| String::from_utf8(f.to_vec()).unwrap())
            .collect()
    }

    #[test_case(b" {} ", b"{}" ; "padded object")]
    #[test_case(b" {", b"{" ; "leading space before brace")]
    #[test_case(b" } ", b" }" ; "no opening brace keeps leading space")]
    #[test_case(b"\t \t  \r", b"" ; "pure padding")]
    #[test_case(b"{\"a\":1}", b"{\"a\":1}" ; "already trimmed")]
    #[test_case(b"\r\n{\"a\":1}\r", b"{\"a\":1}" ; "crlf around object")]
    fn trimming(input: &[u8], expected: &[u8]) {
        assert_eq!(trim_object_boundaries(input), expected);
    }

    #[test]
    fn one_read_with_several_frames() {
        let mut decoder = FrameDecoder::default();
        let frames = decoder
            .feed(b"{\"type\":\"HEARTBEAT\"}\n{\"type\":\"HEARTBEAT\"}\n{\"type\":\"HEARTBEAT\"}\n{\"type\":\"TX\"}\n")
            .unwrap();

        assert_eq!(frames.len(), 4);
        assert_eq!(
            collect(frames),
            vec![
                r#"{"type":"HEARTBEAT"}"#,
                r#"{"type":"HEARTBEAT"}"#,
                r#"{"type":"HEARTBEAT"}"#,
                r#"{"type":"TX"}"#,
            ]
        );
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn frame_split_across_reads() {
        let mut decoder = FrameDecoder::default();

        assert_eq!(decoder.feed(br#"{"type":"TX""#).unwrap().len(), 0);
        assert_eq!(decoder.buffered(), 12);

        let frames = collect(decoder.feed(b"}\n").unwrap());
        assert_eq!(frames, vec![r#"{"type":"TX"}"#]);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn trailing_brace_without_newline_is_a_frame() {
        let mut decoder = FrameDecoder::default();

        let frames = collect(decoder.feed(b"{\"a\":1}\n{\"b\":2}").unwrap());
        assert_eq!(frames, vec![r#"{"a":1}"#, r#"{"b":2}"#]);

        // The newline that follows lands on an empty frame and is dropped.
        assert_eq!(decoder.feed(b"\n").unwrap().len(), 0);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn padding_only_lines_are_dropped() {
        let mut decoder = FrameDecoder::default();
        let frames = collect(decoder.feed(b"\r\n \t\n{\"a\":1}\r\n\n").unwrap());
        assert_eq!(frames, vec![r#"{"a":1}"#]);
    }

    #[test]
    fn unterminated_tail_is_retained() {
        let mut decoder = FrameDecoder::default();
        assert_eq!(decoder.feed(b"{\"a\":1}\n{\"b\":").unwrap().len(), 1);
        assert_eq!(decoder.buffered(), 5);

        let frames = collect(decoder.feed(b"2}\n{\"c\":3").unwrap());
        assert_eq!(frames, vec![r#"{"b":2}"#]);
        assert_eq!(decoder.buffered(), 6);
    }

    #[test]
    fn buffer_grows_for_large_frames() {
        let config = DecoderConfig {
            initial_capacity: 16,
            grow_by: 16,
            min_free: 4,
            max_capacity: 1024,
        };
        let mut decoder = FrameDecoder::new(config);

        let body = format!("{{\"pad\":\"{}\"}}\n", "x".repeat(300));
        for chunk in body.as_bytes().chunks(7) {
            let _ = decoder.feed(chunk).unwrap();
        }

        assert!(decoder.capacity() > 300);
        assert!(decoder.capacity() <= 1024);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn ceiling_is_enforced() {
        let mut decoder = FrameDecoder::default();
        let chunk = vec![b'x'; 64 * 1024];

        let mut fed = 0;
        let err = loop {
            match decoder.feed(&chunk) {
                Ok(frames) => assert_eq!(frames.len(), 0),
                Err(e) => break e,
            }
            fed += chunk.len();
            assert!(fed <= DEFAULT_MAX_CAPACITY, "ceiling never hit");
        };

        assert!(matches!(err, FrameError::ChunkTooBig { limit } if limit == DEFAULT_MAX_CAPACITY));
        assert!(decoder.capacity() <= DEFAULT_MAX_CAPACITY);
    }

    #[test]
    fn single_oversized_chunk_is_rejected() {
        let mut decoder = FrameDecoder::default();
        let chunk = vec![b' '; DEFAULT_MAX_CAPACITY + 1];
        assert!(matches!(
            decoder.feed(&chunk),
            Err(FrameError::ChunkTooBig { .. })
        ));
    }

    #[tokio::test]
    async fn reads_from_async_source() {
        let mut reader = tokio_test::io::Builder::new()
            .read(b"{\"type\":\"PRICE\",\"i\":1}\n{\"type\":")
            .read(b"\"PRICE\",\"i\":2}")
            .read(b"\n")
            .build();
        let mut decoder = FrameDecoder::default();

        let first = collect(decoder.next(&mut reader).await.unwrap());
        assert_eq!(first, vec![r#"{"type":"PRICE","i":1}"#]);

        let second = collect(decoder.next(&mut reader).await.unwrap());
        assert_eq!(second, vec![r#"{"type":"PRICE","i":2}"#]);

        assert_eq!(decoder.next(&mut reader).await.unwrap().len(), 0);
        assert!(matches!(
            decoder.next(&mut reader).await,
            Err(FrameError::EndOfStream)
        ));
    }

    #[tokio::test]
    async fn read_error_is_surfaced() {
        let mut reader = tokio_test::io::Builder::new()
            .read(b"{\"a\":")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();
        let mut decoder = FrameDecoder::default();

        assert_eq!(decoder.next(&mut reader).await.unwrap().len(), 0);
        assert!(matches!(
            decoder.next(&mut reader).await,
            Err(FrameError::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionReset
        ));
    }

    fn flat_object() -> impl Strategy<Value = String> {
        ("[A-Z_]{1,12}", any::<u32>(), "[a-z ]{0,40}").prop_map(|(kind, n, text)| {
            format!(r#"{{"type":"{kind}","n":{n},"text":"{text}"}}"#)
        })
    }

    proptest! {
        #[test]
        fn any_partition_reassembles_the_stream(
            objects in prop::collection::vec(flat_object(), 1..20),
            cuts in prop::collection::vec(1usize..64, 1..200),
        ) {
            let body: String = objects.iter().map(|o| format!("{o}\n")).collect();
            let bytes = body.as_bytes();
            let mut decoder = FrameDecoder::new(DecoderConfig {
                initial_capacity: 32,
                grow_by: 32,
                min_free: 8,
                max_capacity: 64 * 1024,
            });

            let mut out = Vec::new();
            let mut offset = 0;
            let mut cut = cuts.iter().cycle();
            while offset < bytes.len() {
                let len = (*cut.next().unwrap()).min(bytes.len() - offset);
                let frames = decoder.feed(&bytes[offset..offset + len]).unwrap();
                out.extend(collect(frames));
                offset += len;
            }

            prop_assert_eq!(out, objects);
            prop_assert_eq!(decoder.buffered(), 0);
        }
    }
}
