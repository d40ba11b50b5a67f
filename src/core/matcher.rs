//! Streaming terminator matcher
//!
//! Consumes a byte stream one byte at a time and reports when one of several
//! candidate terminator sequences has just been completed. No buffering or
//! look-ahead is needed, so it can sit directly on a blocking byte source.
//!
//! # Restart semantics
//!
//! A mismatching byte resets a candidate's cursor straight to zero, and that
//! byte is not re-tested against the first byte of the candidate. This is not
//! an overlap-aware matcher: a sequence such as `05 05 02` does NOT complete the
//! terminator `05 02`. The controller's terminators have no self-overlapping
//! prefixes, which is the only reason this is correct. Any new terminator added
//! to a [`TerminatorSet`] must keep that property.

use thiserror::Error;

/// Errors raised while building a terminator set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatcherError {
    /// No candidate sequences were given
    #[error("Terminator set is empty")]
    EmptySet,

    /// A candidate sequence has no bytes
    #[error("Terminator {0} is empty")]
    EmptyTerminator(usize),
}

/// Ordered list of candidate terminator sequences
///
/// Order is priority: if two candidates complete on the same byte, the one
/// registered first wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminatorSet {
    terminators: Vec<Vec<u8>>,
}

impl TerminatorSet {
    /// Create a set from candidate sequences
    pub fn new<I, T>(terminators: I) -> Result<Self, MatcherError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Vec<u8>>,
    {
        let terminators: Vec<Vec<u8>> = terminators.into_iter().map(Into::into).collect();

        if terminators.is_empty() {
            return Err(MatcherError::EmptySet);
        }
        if let Some(index) = terminators.iter().position(Vec::is_empty) {
            return Err(MatcherError::EmptyTerminator(index));
        }

        Ok(Self { terminators })
    }

    /// Create a set holding a single sequence
    pub fn single(terminator: &[u8]) -> Result<Self, MatcherError> {
        Self::new([terminator])
    }

    /// Number of candidates
    pub fn len(&self) -> usize {
        self.terminators.len()
    }

    /// Always false for a constructed set
    pub fn is_empty(&self) -> bool {
        self.terminators.is_empty()
    }

    /// Bytes of the candidate at `index`
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.terminators.get(index).map(Vec::as_slice)
    }
}

/// Per-candidate cursor state over a [`TerminatorSet`]
#[derive(Debug, Clone)]
pub struct TerminatorMatcher<'a> {
    set: &'a TerminatorSet,
    cursors: Vec<usize>,
}

impl<'a> TerminatorMatcher<'a> {
    /// Create a matcher with every cursor at zero
    pub fn new(set: &'a TerminatorSet) -> Self {
        Self {
            set,
            cursors: vec![0; set.len()],
        }
    }

    /// Feed the next byte of the stream
    ///
    /// Returns the index of the candidate completed by this byte, if any.
    /// Candidates after the winning one are not advanced for this byte; a
    /// match resets every cursor.
    pub fn feed(&mut self, byte: u8) -> Option<usize> {
        let set = self.set;
        for (index, terminator) in set.terminators.iter().enumerate() {
            let cursor = &mut self.cursors[index];
            if terminator[*cursor] == byte {
                *cursor += 1;
                if *cursor == terminator.len() {
                    self.reset();
                    return Some(index);
                }
            } else {
                *cursor = 0;
            }
        }
        None
    }

    /// Put every cursor back to zero
    pub fn reset(&mut self) {
        self.cursors.iter_mut().for_each(|c| *c = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(set: &TerminatorSet, stream: &[u8]) -> Option<(usize, usize)> {
        let mut matcher = TerminatorMatcher::new(set);
        stream
            .iter()
            .enumerate()
            .find_map(|(pos, &b)| matcher.feed(b).map(|index| (pos, index)))
    }

    #[test]
    fn test_rejects_empty_input() {
        assert_eq!(
            TerminatorSet::new(Vec::<Vec<u8>>::new()),
            Err(MatcherError::EmptySet)
        );
        assert_eq!(
            TerminatorSet::new([vec![0x17], vec![]]),
            Err(MatcherError::EmptyTerminator(1))
        );
    }

    #[test]
    fn test_single_byte_terminator() {
        let set = TerminatorSet::single(&[0x17]).unwrap();
        assert_eq!(scan(&set, b"hello\x17>"), Some((5, 0)));
    }

    #[test]
    fn test_multi_byte_terminator_after_false_start() {
        let set = TerminatorSet::single(&[0x05, 0x02]).unwrap();
        // 05 followed by 41 resets, then the real pair completes
        assert_eq!(scan(&set, &[0x05, 0x41, 0x05, 0x02]), Some((3, 0)));
    }

    #[test]
    fn test_restart_does_not_retest_mismatching_byte() {
        let set = TerminatorSet::single(&[0x05, 0x02]).unwrap();
        assert_eq!(scan(&set, &[0x05, 0x05, 0x02]), None);
    }

    #[test]
    fn test_reports_which_candidate_matched() {
        let set = TerminatorSet::new([
            vec![0x05, 0x02, b'C', 0x17],
            b"Are you sure ? (Yes:1, No:0) \r\n".to_vec(),
        ])
        .unwrap();

        assert_eq!(scan(&set, b"xx\x05\x02C\x17"), Some((5, 0)));

        let prompt = b"Program exists. Are you sure ? (Yes:1, No:0) \r\n";
        assert_eq!(scan(&set, prompt), Some((prompt.len() - 1, 1)));
    }

    #[test]
    fn test_first_registered_wins_on_tie() {
        let set = TerminatorSet::new([b">".to_vec(), b">".to_vec()]).unwrap();
        assert_eq!(scan(&set, b"abc>"), Some((3, 0)));
    }

    #[test]
    fn test_reset() {
        let set = TerminatorSet::single(b"ab").unwrap();
        let mut matcher = TerminatorMatcher::new(&set);
        assert_eq!(matcher.feed(b'a'), None);
        matcher.reset();
        assert_eq!(matcher.feed(b'b'), None);
        assert_eq!(matcher.feed(b'a'), None);
        assert_eq!(matcher.feed(b'b'), Some(0));
    }

    #[test]
    fn test_matcher_is_reusable_after_a_match() {
        let set = TerminatorSet::single(b">").unwrap();
        let mut matcher = TerminatorMatcher::new(&set);
        assert_eq!(matcher.feed(b'>'), Some(0));
        assert_eq!(matcher.feed(b'x'), None);
        assert_eq!(matcher.feed(b'>'), Some(0));
    }
}
