use tts_job_domain::TextChunk;

/// Splits text into model-safe chunks whose concatenation is the input.
///
/// The character budget is a hard limit. Inside each window the planner prefers
/// the end of a sentence, then the last whitespace, and only splits a word when
/// the window contains neither.
#[derive(Debug, Clone)]
pub struct ChunkPlanner {
    max_chars: usize,
}

impl ChunkPlanner {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn plan(&self, text: &str) -> Vec<TextChunk> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut chunks = Vec::new();
        let mut start = 0;

        while chars.len() - start > self.max_chars {
            let window_end = start + self.max_chars;
            let lookahead = chars.get(window_end).map(|(_, ch)| *ch);
            let take = find_break(&chars[start..window_end], lookahead).unwrap_or(self.max_chars);
            let end = start + take;

            chunks.push(TextChunk {
                index: chunks.len(),
                text: text[chars[start].0..chars[end].0].to_string(),
            });
            start = end;
        }

        let tail_offset = chars.get(start).map(|(offset, _)| *offset).unwrap_or(text.len());
        chunks.push(TextChunk {
            index: chunks.len(),
            text: text[tail_offset..].to_string(),
        });

        chunks
    }
}

/// Returns how many characters of `window` to keep in the current chunk.
fn find_break(window: &[(usize, char)], lookahead: Option<char>) -> Option<usize> {
    let mut last_space = None;
    let mut last_sentence = None;

    for (idx, (_, ch)) in window.iter().enumerate() {
        if !ch.is_whitespace() {
            continue;
        }
        let take = idx + 1;
        last_space = Some(take);
        if idx > 0 && is_sentence_end(window[idx - 1].1) {
            last_sentence = Some(take);
        }
    }

    // The window may end exactly on a word boundary.
    if lookahead.is_some_and(char::is_whitespace) {
        if let Some((_, last)) = window.last() {
            if !last.is_whitespace() {
                last_space = Some(window.len());
                if is_sentence_end(*last) {
                    last_sentence = Some(window.len());
                }
            }
        }
    }

    match last_sentence {
        Some(take) if take * 2 >= window.len() => Some(take),
        _ => last_space,
    }
}

fn is_sentence_end(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | ';' | ':' | '…' | '。' | '！' | '？')
}
