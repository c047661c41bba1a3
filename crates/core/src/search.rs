//! Streaming literal search
//!
//! Content is read in fixed blocks. Bytes not yet fully scanned are carried
//! to the front of the buffer before the next read, so a match straddling a
//! block boundary is still seen in one window.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;

/// Bytes read per refill
pub const BLOCK_SIZE: usize = 4096;

/// Literal pattern, optionally ASCII case-insensitive
#[derive(Debug, Clone)]
pub struct Pattern {
    needle: Vec<u8>,
    ignore_case: bool,
}

impl Pattern {
    pub fn new(needle: impl Into<Vec<u8>>, ignore_case: bool) -> Self {
        let mut needle = needle.into();
        if ignore_case {
            needle.make_ascii_lowercase();
        }
        Self {
            needle,
            ignore_case,
        }
    }

    pub fn len(&self) -> usize {
        self.needle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    /// Offset of the first match in `haystack` at or after `from`
    fn find(&self, haystack: &[u8], from: usize) -> Option<usize> {
        let n = self.needle.len();
        if n == 0 {
            return (from <= haystack.len()).then_some(from);
        }
        if haystack.len() < n {
            return None;
        }
        (from..=haystack.len() - n).find(|&i| {
            let window = &haystack[i..i + n];
            if self.ignore_case {
                window.eq_ignore_ascii_case(&self.needle)
            } else {
                window == self.needle.as_slice()
            }
        })
    }
}

/// What to report for an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Stop at the first hit
    FilesWithMatches,
    /// Every line containing a hit
    Lines,
}

/// Matches found in one stream
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub matched: bool,
    /// Matching lines without their newline (Lines mode only)
    pub lines: Vec<Vec<u8>>,
}

/// Scan `reader` for `pattern`
///
/// In `Lines` mode only complete lines are searched; the unfinished line at
/// the end of a window is carried whole into the next one, so every reported
/// line is the entire line. In `FilesWithMatches` mode the carry is the last
/// `L-1` bytes. Read errors other than a clean end of stream are returned as-is.
pub async fn search<R>(reader: &mut R, pattern: &Pattern, mode: SearchMode) -> Result<SearchResult>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut result = SearchResult::default();
    if pattern.is_empty() {
        return Ok(result);
    }

    let mut buf = Vec::new();
    // Bytes at the front of `buf` kept from the previous window
    let mut kept = 0;

    loop {
        buf.resize(kept + BLOCK_SIZE.max(pattern.len()), 0);
        let (filled, eof) = fill(reader, &mut buf, kept).await?;
        let window = &buf[..filled];

        let scan_end = match mode {
            SearchMode::FilesWithMatches => filled,
            SearchMode::Lines if eof => filled,
            SearchMode::Lines => window
                .iter()
                .rposition(|&b| b == b'\n')
                .map_or(0, |i| i + 1),
        };
        let region = &window[..scan_end];

        let mut from = 0;
        while let Some(at) = pattern.find(region, from) {
            result.matched = true;
            if mode == SearchMode::FilesWithMatches {
                return Ok(result);
            }
            let start = line_start(region, at);
            let end = line_end(region, at + pattern.len());
            result.lines.push(region[start..end].to_vec());
            from = end + 1;
        }

        if eof {
            break;
        }

        let carry_from = match mode {
            SearchMode::FilesWithMatches => filled - (pattern.len() - 1).min(filled),
            SearchMode::Lines => scan_end,
        };
        kept = filled - carry_from;
        buf.copy_within(carry_from..filled, 0);
    }

    Ok(result)
}

/// Read until the buffer is full or the stream ends
async fn fill<R>(reader: &mut R, buf: &mut [u8], mut filled: usize) -> Result<(usize, bool)>
where
    R: AsyncRead + Unpin + ?Sized,
{
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Ok((filled, true));
        }
        filled += n;
    }
    Ok((filled, false))
}

fn line_start(window: &[u8], at: usize) -> usize {
    window[..at]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1)
}

fn line_end(window: &[u8], from: usize) -> usize {
    window[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(window.len(), |i| from + i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn run(data: &[u8], needle: &str, ignore_case: bool, mode: SearchMode) -> SearchResult {
        let mut reader = Cursor::new(data.to_vec());
        search(&mut reader, &Pattern::new(needle, ignore_case), mode)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_match_straddling_block_boundary() {
        let mut data = vec![b'a'; 4090];
        data.extend_from_slice(b"0123456789");
        let result = run(&data, "0123456789", false, SearchMode::FilesWithMatches).await;
        assert!(result.matched);
    }

    #[tokio::test]
    async fn test_no_match() {
        let data = vec![b'x'; 10_000];
        let result = run(&data, "needle", false, SearchMode::Lines).await;
        assert!(!result.matched);
        assert!(result.lines.is_empty());
    }

    #[tokio::test]
    async fn test_lines_mode_reports_whole_lines_once() {
        let data = b"alpha beta\nno hit here\nbeta beta gamma\nlast beta";
        let result = run(data, "beta", false, SearchMode::Lines).await;
        assert_eq!(
            result.lines,
            vec![
                b"alpha beta".to_vec(),
                b"beta beta gamma".to_vec(),
                b"last beta".to_vec()
            ]
        );
    }

    #[tokio::test]
    async fn test_ignore_case() {
        let data = b"Hello World\n";
        assert!(run(data, "WORLD", true, SearchMode::FilesWithMatches).await.matched);
        assert!(!run(data, "WORLD", false, SearchMode::FilesWithMatches).await.matched);
    }

    #[tokio::test]
    async fn test_lines_across_many_blocks() {
        let mut data = Vec::new();
        for i in 0..2000 {
            if i % 500 == 0 {
                data.extend_from_slice(format!("line {i} has the MARKER\n").as_bytes());
            } else {
                data.extend_from_slice(format!("line {i} is filler\n").as_bytes());
            }
        }
        let result = run(&data, "MARKER", false, SearchMode::Lines).await;
        assert_eq!(result.lines.len(), 4);
        assert!(result.lines.iter().all(|line| line.ends_with(b"MARKER")));
        assert_eq!(result.lines[0], b"line 0 has the MARKER".to_vec());
    }

    #[tokio::test]
    async fn test_line_crossing_block_edge_is_whole() {
        let mut data = vec![b'a'; 4000];
        data.push(b'\n');
        let mut line = vec![b'b'; 60];
        line.extend_from_slice(b"NEEDLE");
        line.extend_from_slice(&[b'c'; 60]);
        data.extend_from_slice(&line);
        data.push(b'\n');

        let result = run(&data, "NEEDLE", false, SearchMode::Lines).await;
        assert_eq!(result.lines, vec![line]);
    }

    #[tokio::test]
    async fn test_line_longer_than_block_is_whole() {
        let mut line = vec![b'x'; 5000];
        line.extend_from_slice(b"hit");
        line.extend_from_slice(&[b'y'; 5000]);
        let mut data = b"first\n".to_vec();
        data.extend_from_slice(&line);
        data.extend_from_slice(b"\nhit again");

        let result = run(&data, "hit", false, SearchMode::Lines).await;
        assert_eq!(result.lines, vec![line, b"hit again".to_vec()]);
    }

    #[tokio::test]
    async fn test_read_error_fails() {
        struct Broken;
        impl AsyncRead for Broken {
            fn poll_read(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                _buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<std::io::Result<()>> {
                std::task::Poll::Ready(Err(std::io::Error::other("truncated stream")))
            }
        }

        let err = search(&mut Broken, &Pattern::new("x", false), SearchMode::Lines)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("truncated stream"));
    }
}
