// Rewindable character cursor over a conscription source string.
//
// This is the only mutable parse state. The bracket table, the quote pairs
// and the `\` escape discipline live here and nowhere else: every terminator
// search in the grammar goes through `until`, which skips balanced bracket
// interiors and quoted spans, so higher layers never re-implement nesting.

/// Bracket pairs whose interiors are ignored by terminator scans.
const BRACKETS: [(char, char); 3] = [('(', ')'), ('[', ']'), ('{', '}')];

/// Quote characters opening a flat span terminated by the same unescaped
/// character. `@` delimits regex literals.
const QUOTES: [char; 3] = ['"', '\'', '@'];

#[inline]
fn closing(c: char) -> Option<char> {
    BRACKETS.iter().find(|(open, _)| *open == c).map(|(_, close)| *close)
}

#[inline]
fn is_quote(c: char) -> bool {
    QUOTES.contains(&c)
}

/// Character cursor: owns the source as a char vector plus an offset.
pub struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    pub fn new(source: &str) -> Self {
        Cursor {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    #[inline]
    pub fn eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Current offset, usable with `reset` to rewind.
    #[inline]
    pub fn mark(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn reset(&mut self, mark: usize) {
        self.pos = mark;
    }

    #[inline]
    pub fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    #[inline]
    pub fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    /// The next `k` characters (fewer at end of input).
    pub fn peek(&self, k: usize) -> String {
        let end = (self.pos + k).min(self.chars.len());
        self.chars[self.pos..end].iter().collect()
    }

    /// Everything from the cursor to the end of input.
    pub fn rest(&self) -> String {
        self.chars[self.pos..].iter().collect()
    }

    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.chars.len());
    }

    pub fn skip_ws(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    /// Does `lit` occur verbatim at offset `at`?
    fn matches_at(&self, at: usize, lit: &str, ci: bool) -> bool {
        let mut i = at;
        for lc in lit.chars() {
            match self.chars.get(i) {
                Some(&c) if c == lc => {}
                Some(&c) if ci && c.to_lowercase().eq(lc.to_lowercase()) => {}
                _ => return false,
            }
            i += 1;
        }
        true
    }

    /// Does `lit` occur verbatim at the cursor?
    #[inline]
    pub fn at(&self, lit: &str) -> bool {
        self.matches_at(self.pos, lit, false)
    }

    /// Match the first of `lits` that equals the upcoming text, advance past
    /// it and return it. Longest-match is the caller's responsibility: order
    /// the table longest-first.
    pub fn consume<'a>(&mut self, lits: &[&'a str], ci: bool) -> Option<&'a str> {
        for lit in lits {
            if self.matches_at(self.pos, lit, ci) {
                self.advance(lit.chars().count());
                return Some(*lit);
            }
        }
        None
    }

    /// Accumulate characters while `class` matches.
    pub fn consume_while(&mut self, class: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek_char().is_some_and(&class) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Advance up to (not past) the first unescaped separator at nesting
    /// depth zero and return the skipped text. Bracket interiors and quoted
    /// spans are ignored wholesale; if no separator occurs, the rest of the
    /// input is returned and the cursor parks at the end.
    ///
    /// Separators are tested before span skipping so that a bracket character
    /// can itself terminate a scan (the value layer's `until('(', '.')`).
    pub fn until(&mut self, seps: &[&str]) -> String {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c == '\\' {
                self.advance(2);
            } else if seps.iter().any(|s| self.matches_at(self.pos, s, false)) {
                break;
            } else if is_quote(c) {
                self.skip_quoted(c);
            } else if let Some(close) = closing(c) {
                self.pos += 1;
                self.scan_past(close);
            } else {
                self.pos += 1;
            }
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Balanced scan. The cursor sits immediately after an `open`; the
    /// interior up to the matching `close` is returned and the `close`
    /// consumed. `None` when the input ends first.
    pub fn through_end(&mut self, open: char, close: char) -> Option<String> {
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(c) = self.peek_char() {
            if c == '\\' {
                self.advance(2);
            } else if c == close {
                self.pos += 1;
                depth -= 1;
                if depth == 0 {
                    return Some(self.chars[start..self.pos - 1].iter().collect());
                }
            } else if c == open {
                self.pos += 1;
                depth += 1;
            } else if is_quote(c) {
                self.skip_quoted(c);
            } else if let Some(other) = closing(c) {
                self.pos += 1;
                self.scan_past(other);
            } else {
                self.pos += 1;
            }
        }
        None
    }

    /// Skip past the matching `close` for an already-consumed open bracket.
    /// Runs to end of input when unbalanced; the caller's later parse of the
    /// slice reports the defect.
    fn scan_past(&mut self, close: char) {
        while let Some(c) = self.peek_char() {
            if c == '\\' {
                self.advance(2);
            } else if c == close {
                self.pos += 1;
                return;
            } else if is_quote(c) {
                self.skip_quoted(c);
            } else if let Some(other) = closing(c) {
                self.pos += 1;
                self.scan_past(other);
            } else {
                self.pos += 1;
            }
        }
    }

    /// Skip a quoted span. The cursor sits on the opening quote; quotes are
    /// flat (no bracket nesting inside) but honour `\` escapes.
    fn skip_quoted(&mut self, quote: char) {
        self.pos += 1;
        while let Some(c) = self.peek_char() {
            if c == '\\' {
                self.advance(2);
            } else if c == quote {
                self.pos += 1;
                return;
            } else {
                self.pos += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_and_advance() {
        let mut cur = Cursor::new("abc");
        assert_eq!(cur.peek(2), "ab");
        cur.advance(1);
        assert_eq!(cur.peek(5), "bc");
        cur.advance(10);
        assert!(cur.eof());
    }

    #[test]
    fn test_consume_ordering() {
        let mut cur = Cursor::new("<=1");
        assert_eq!(cur.consume(&["<=", "<"], false), Some("<="));
        assert_eq!(cur.rest(), "1");
    }

    #[test]
    fn test_consume_case_insensitive() {
        let mut cur = Cursor::new("TRUE");
        assert_eq!(cur.consume(&["true"], true), Some("true"));
        assert!(cur.eof());
    }

    #[test]
    fn test_consume_while() {
        let mut cur = Cursor::new("abc123!");
        let run = cur.consume_while(|c| c.is_alphanumeric());
        assert_eq!(run, "abc123");
        assert_eq!(cur.peek_char(), Some('!'));
    }

    #[test]
    fn test_until_plain() {
        let mut cur = Cursor::new("a = b");
        assert_eq!(cur.until(&["="]), "a ");
        assert_eq!(cur.rest(), "= b");
    }

    #[test]
    fn test_until_skips_brackets() {
        let mut cur = Cursor::new("(a = b) = c");
        assert_eq!(cur.until(&["="]), "(a = b) ");
        assert_eq!(cur.rest(), "= c");
    }

    #[test]
    fn test_until_skips_nested_brackets() {
        let mut cur = Cursor::new("[(1 ? 2 : 3), {x?}] ? y");
        assert_eq!(cur.until(&["?"]), "[(1 ? 2 : 3), {x?}] ");
        assert_eq!(cur.rest(), "? y");
    }

    #[test]
    fn test_until_skips_quotes() {
        let mut cur = Cursor::new("\"a = b\" = 'c = d'");
        assert_eq!(cur.until(&["="]), "\"a = b\" ");
    }

    #[test]
    fn test_until_honours_escapes() {
        let mut cur = Cursor::new("a \\= b = c");
        assert_eq!(cur.until(&["="]), "a \\= b ");
        let mut cur = Cursor::new("\"a \\\" = \" = x");
        assert_eq!(cur.until(&["="]), "\"a \\\" = \" ");
    }

    #[test]
    fn test_until_earliest_of_many() {
        let mut cur = Cursor::new("x | y & z");
        assert_eq!(cur.until(&["&", "|"]), "x ");
        assert_eq!(cur.rest(), "| y & z");
    }

    #[test]
    fn test_until_no_separator() {
        let mut cur = Cursor::new("plain text");
        assert_eq!(cur.until(&["?"]), "plain text");
        assert!(cur.eof());
    }

    #[test]
    fn test_until_separator_may_be_a_bracket() {
        let mut cur = Cursor::new("{quoted name}.foo(1)");
        assert_eq!(cur.until(&["(", "."]), "{quoted name}");
        assert_eq!(cur.rest(), ".foo(1)");
        let mut cur = Cursor::new("foo(1).bar");
        assert_eq!(cur.until(&["(", "."]), "foo");
        assert_eq!(cur.rest(), "(1).bar");
    }

    #[test]
    fn test_through_end() {
        let mut cur = Cursor::new("a, (b, c), d) tail");
        assert_eq!(cur.through_end('(', ')'), Some("a, (b, c), d".to_string()));
        assert_eq!(cur.rest(), " tail");
    }

    #[test]
    fn test_through_end_unterminated() {
        let mut cur = Cursor::new("a, (b");
        assert_eq!(cur.through_end('(', ')'), None);
    }

    #[test]
    fn test_through_end_skips_quoted_close() {
        let mut cur = Cursor::new("\")\" ) x");
        assert_eq!(cur.through_end('(', ')'), Some("\")\" ".to_string()));
        assert_eq!(cur.rest(), " x");
    }

    #[test]
    fn test_rewind() {
        let mut cur = Cursor::new("true blue");
        let mark = cur.mark();
        assert_eq!(cur.consume(&["true"], true), Some("true"));
        cur.reset(mark);
        assert_eq!(cur.rest(), "true blue");
    }
}
