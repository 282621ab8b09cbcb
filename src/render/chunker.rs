//! Word chunker: group a segment's words into renderable units.
//!
//! Every word lands in exactly one chunk, in order.  Each chunk also carries
//! up to [`CONTEXT_WORDS`] neighbouring words on either side as prosody
//! context; context words are read-only and are rendered by their own chunk.

use crate::subtitle::Word;

/// Default maximum words per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 50;
/// Neighbouring words passed as context on each side.
pub const CONTEXT_WORDS: usize = 2;

// ---------------------------------------------------------------------------
// WordChunk
// ---------------------------------------------------------------------------

/// A contiguous run of words plus the text around it.
#[derive(Debug, Clone, PartialEq)]
pub struct WordChunk {
    pub words: Vec<Word>,
    /// Index of `words[0]` within the segment.
    pub start_index: usize,
    pub context_before: String,
    pub context_after: String,
}

impl WordChunk {
    /// Space-joined text of the chunk's own words.
    pub fn text(&self) -> String {
        join(&self.words)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Index of the last word within the segment (inclusive).
    pub fn end_index(&self) -> usize {
        self.start_index + self.words.len().saturating_sub(1)
    }

    /// Start of the first word.
    pub fn start(&self) -> f64 {
        self.words.first().map_or(0.0, |w| w.start)
    }

    /// End of the last word.
    pub fn end(&self) -> f64 {
        self.words.last().map_or(0.0, Word::end)
    }

    /// Speech span: last word end minus first word start.
    pub fn duration(&self) -> f64 {
        (self.end() - self.start()).max(0.0)
    }
}

// ---------------------------------------------------------------------------
// WordChunker
// ---------------------------------------------------------------------------

/// Iterator over the [`WordChunk`]s of a word sequence.
///
/// # Example
///
/// ```rust
/// use timed_tts::render::WordChunker;
/// use timed_tts::subtitle::Word;
///
/// let words: Vec<Word> = (0..5).map(|i| Word::new(format!("w{i}"), i as f64, 1.0)).collect();
/// let chunks: Vec<_> = WordChunker::new(&words, 2).collect();
/// assert_eq!(chunks.len(), 3);
/// assert_eq!(chunks[1].text(), "w2 w3");
/// assert_eq!(chunks[1].context_before, "w0 w1");
/// assert_eq!(chunks[1].context_after, "w4");
/// ```
#[derive(Debug, Clone)]
pub struct WordChunker<'a> {
    words: &'a [Word],
    chunk_size: usize,
    next: usize,
}

impl<'a> WordChunker<'a> {
    /// Chunk `words` into runs of at most `chunk_size` (a size of 0 is
    /// treated as 1).
    pub fn new(words: &'a [Word], chunk_size: usize) -> Self {
        Self {
            words,
            chunk_size: chunk_size.max(1),
            next: 0,
        }
    }

    /// Number of chunks the full sequence produces.
    pub fn chunk_count(&self) -> usize {
        self.words.len().div_ceil(self.chunk_size)
    }
}

impl Iterator for WordChunker<'_> {
    type Item = WordChunk;

    fn next(&mut self) -> Option<WordChunk> {
        if self.next >= self.words.len() {
            return None;
        }
        let start = self.next;
        let end = (start + self.chunk_size).min(self.words.len());
        self.next = end;

        let (context_before, context_after) = context_around(self.words, start, end);
        Some(WordChunk {
            words: self.words[start..end].to_vec(),
            start_index: start,
            context_before,
            context_after,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.words.len() - self.next.min(self.words.len())).div_ceil(self.chunk_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for WordChunker<'_> {}

/// Context strings for the half-open word range `start..end`.
pub fn context_around(words: &[Word], start: usize, end: usize) -> (String, String) {
    let before = &words[start.saturating_sub(CONTEXT_WORDS)..start];
    let after = &words[end..(end + CONTEXT_WORDS).min(words.len())];
    (join(before), join(after))
}

fn join(words: &[Word]) -> String {
    words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
