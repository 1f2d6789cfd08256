use crate::errors::FramingLoss;

/// Reassembles raw chunks into complete newline-terminated lines.
///
/// Splitting happens on bytes, so a chunk boundary inside a multi-byte UTF-8
/// sequence is harmless: `\n` never occurs inside one. Lines are handed out
/// as raw bytes; text validation belongs to the decoder.
#[derive(Debug, Default)]
pub struct LineFramer {
    carry: Vec<u8>,
}

impl LineFramer {
    /// Appends a chunk and returns every line it completed, newline stripped,
    /// in the order their newlines were seen.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.carry.extend_from_slice(chunk);
        let Some(last_newline) = self.carry.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let rest = self.carry.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.carry, rest);
        complete[..last_newline]
            .split(|b| *b == b'\n')
            .map(<[u8]>::to_vec)
            .collect()
    }

    /// Bytes held back waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.carry.len()
    }

    /// Ends the stream. An unterminated trailing fragment is dropped, never
    /// emitted, and reported back so it can be counted.
    pub fn finish(&mut self) -> Option<FramingLoss> {
        let bytes = self.carry.len();
        self.carry.clear();
        (bytes > 0).then_some(FramingLoss { bytes })
    }

    /// Drops any buffered fragment without reporting it (cancellation).
    pub fn reset(&mut self) {
        self.carry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn carries_partial_line_across_chunks() {
        let mut framer = LineFramer::default();
        assert!(framer.push_chunk(b"data: {\"typ").is_empty());
        assert_eq!(framer.pending_len(), 11);
        let lines = framer.push_chunk(b"e\":\"done\"}\n\n");
        assert_eq!(lines, vec![b"data: {\"type\":\"done\"}".to_vec(), Vec::new()]);
        assert_eq!(framer.pending_len(), 0);
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn several_lines_in_one_chunk_keep_order() {
        let mut framer = LineFramer::default();
        let lines = framer.push_chunk(b"a\nb\nc");
        assert_eq!(lines, vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(framer.finish(), Some(FramingLoss { bytes: 1 }));
    }

    #[test]
    fn split_inside_multibyte_character_is_reassembled() {
        let text = "data: héllo\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xC3).expect("multibyte") + 1;
        let mut framer = LineFramer::default();
        assert!(framer.push_chunk(&text[..split]).is_empty());
        assert_eq!(framer.push_chunk(&text[split..]), vec!["data: héllo".as_bytes().to_vec()]);
    }

    #[test]
    fn invalid_utf8_passes_through_untouched() {
        let mut framer = LineFramer::default();
        let lines = framer.push_chunk(b"data: \xFF\xFE\nnext\n");
        assert_eq!(lines, vec![b"data: \xFF\xFE".to_vec(), b"next".to_vec()]);
    }

    #[test]
    fn reset_discards_without_reporting() {
        let mut framer = LineFramer::default();
        framer.push_chunk(b"data: partial");
        framer.reset();
        assert_eq!(framer.finish(), None);
    }

    proptest! {
        #[test]
        fn lines_plus_discarded_tail_reproduce_input(
            input in proptest::collection::vec(prop_oneof![Just(b'\n'), Just(b'a'), Just(b'{'), any::<u8>()], 0..200),
            cuts in proptest::collection::vec(0usize..200, 0..12),
        ) {
            let mut cuts: Vec<usize> = cuts.into_iter().map(|c| c.min(input.len())).collect();
            cuts.sort_unstable();

            let mut framer = LineFramer::default();
            let mut rebuilt = Vec::new();
            let mut start = 0;
            for cut in cuts.into_iter().chain(std::iter::once(input.len())) {
                for line in framer.push_chunk(&input[start..cut]) {
                    rebuilt.extend_from_slice(&line);
                    rebuilt.push(b'\n');
                }
                start = cut;
            }
            let tail = input.len() - rebuilt.len();
            prop_assert_eq!(framer.finish().map_or(0, |loss| loss.bytes), tail);
            prop_assert_eq!(&rebuilt[..], &input[..input.len() - tail]);
        }
    }
}
