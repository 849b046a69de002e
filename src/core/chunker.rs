//! Paragraph-packing chunker.
//!
//! A file is split into paragraphs (runs of non-blank lines). Consecutive
//! paragraphs are packed into one chunk while the chunk stays under
//! `max_chars`; a paragraph that alone exceeds the limit is cut on line
//! boundaries.

pub const DEFAULT_MAX_CHUNK_CHARS: usize = 1200;

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDraft {
    pub index: usize,
    /// 1-based line number of the first line in the chunk.
    pub start_line: usize,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    max_chars: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_CHARS)
    }
}

struct Paragraph<'a> {
    start_line: usize,
    lines: Vec<&'a str>,
}

impl Paragraph<'_> {
    fn len(&self) -> usize {
        self.lines.iter().map(|l| l.len() + 1).sum::<usize>().saturating_sub(1)
    }

    fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl Chunker {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    pub fn chunk(&self, content: &str) -> Vec<ChunkDraft> {
        let mut pieces: Vec<(usize, String)> = Vec::new();
        let mut current: Option<(usize, String)> = None;

        for paragraph in paragraphs(content) {
            if paragraph.len() > self.max_chars {
                if let Some(done) = current.take() {
                    pieces.push(done);
                }
                pieces.extend(self.split_long(&paragraph));
                continue;
            }

            current = match current.take() {
                Some((start, mut text)) if text.len() + 2 + paragraph.len() <= self.max_chars => {
                    text.push_str("\n\n");
                    text.push_str(&paragraph.text());
                    Some((start, text))
                }
                Some(done) => {
                    pieces.push(done);
                    Some((paragraph.start_line, paragraph.text()))
                }
                None => Some((paragraph.start_line, paragraph.text())),
            };
        }

        if let Some(done) = current {
            pieces.push(done);
        }

        pieces
            .into_iter()
            .enumerate()
            .map(|(index, (start_line, content))| ChunkDraft {
                index,
                start_line,
                content,
            })
            .collect()
    }

    fn split_long(&self, paragraph: &Paragraph) -> Vec<(usize, String)> {
        let mut out = Vec::new();
        let mut start = paragraph.start_line;
        let mut text = String::new();

        for (offset, line) in paragraph.lines.iter().enumerate() {
            let line_no = paragraph.start_line + offset;
            if !text.is_empty() && text.len() + 1 + line.len() > self.max_chars {
                out.push((start, std::mem::take(&mut text)));
            }
            if text.is_empty() {
                start = line_no;
            } else {
                text.push('\n');
            }
            text.push_str(line);
        }

        if !text.is_empty() {
            out.push((start, text));
        }
        out
    }
}

fn paragraphs(content: &str) -> Vec<Paragraph<'_>> {
    let mut out = Vec::new();
    let mut current: Option<Paragraph> = None;

    for (i, raw) in content.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            if let Some(p) = current.take() {
                out.push(p);
            }
            continue;
        }
        current
            .get_or_insert_with(|| Paragraph {
                start_line: i + 1,
                lines: Vec::new(),
            })
            .lines
            .push(line);
    }

    if let Some(p) = current {
        out.push(p);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_file_is_one_chunk() {
        let chunks = Chunker::default().chunk("export function a() {}\n\nexport function b() {}\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].content, "export function a() {}\n\nexport function b() {}");
    }

    #[test]
    fn test_paragraphs_split_when_full() {
        let chunker = Chunker::new(20);
        let chunks = chunker.chunk("aaaaaaaaaa\n\nbbbbbbbbbb\n\ncccc");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "aaaaaaaaaa");
        assert_eq!(chunks[1].content, "bbbbbbbbbb\n\ncccc");
        assert_eq!(chunks[1].start_line, 3);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn test_long_paragraph_cut_on_lines() {
        let chunker = Chunker::new(12);
        let chunks = chunker.chunk("line one\nline two\nline three");
        let contents: Vec<_> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["line one", "line two", "line three"]);
        assert_eq!(chunks[2].start_line, 3);
    }

    #[test]
    fn test_blank_and_crlf_input() {
        assert!(Chunker::default().chunk("\n  \n\r\n").is_empty());
        let chunks = Chunker::default().chunk("a\r\nb\r\n");
        assert_eq!(chunks[0].content, "a\nb");
    }
}
