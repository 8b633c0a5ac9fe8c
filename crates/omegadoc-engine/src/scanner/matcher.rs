/// Incremental literal matcher for a document's closing identifier.
///
/// Holds the current match length and a KMP failure table, so a partial match
/// that fails part way (`EEND` against `END`, or `AAA` against `AA`) falls
/// back to the longest prefix that is still viable instead of starting over.
#[derive(Debug)]
pub struct SentinelMatcher {
    sentinel: Vec<char>,
    failure: Vec<usize>,
    matched: usize,
}

impl SentinelMatcher {
    /// `sentinel` must not be empty.
    pub fn new(sentinel: &str) -> Self {
        let sentinel: Vec<char> = sentinel.chars().collect();
        debug_assert!(!sentinel.is_empty());
        let failure = failure_table(&sentinel);
        Self {
            sentinel,
            failure,
            matched: 0,
        }
    }

    /// Feeds one character. Returns true when it completes the sentinel.
    pub fn push(&mut self, ch: char) -> bool {
        while self.matched > 0 && self.sentinel[self.matched] != ch {
            self.matched = self.failure[self.matched - 1];
        }
        if self.sentinel[self.matched] == ch {
            self.matched += 1;
        }
        if self.matched == self.sentinel.len() {
            self.matched = 0;
            return true;
        }
        false
    }

    /// Length of the partial match currently held.
    pub fn matched(&self) -> usize {
        self.matched
    }
}

/// `failure[i]` is the length of the longest proper prefix of
/// `pattern[..=i]` that is also a suffix of it.
fn failure_table(pattern: &[char]) -> Vec<usize> {
    let mut failure = vec![0; pattern.len()];
    let mut k = 0;
    for i in 1..pattern.len() {
        while k > 0 && pattern[i] != pattern[k] {
            k = failure[k - 1];
        }
        if pattern[i] == pattern[k] {
            k += 1;
        }
        failure[i] = k;
    }
    failure
}
