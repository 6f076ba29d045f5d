/// A single argument token with its byte span in the command line.
/// Quoted tokens keep the span of their quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Splits on whitespace. Single or double quotes group words, and a
/// backslash escapes the next character inside quotes.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut text = String::new();
        let mut end = start;
        if c == '"' || c == '\'' {
            let quote = c;
            chars.next();
            end = input.len();
            while let Some((index, c)) = chars.next() {
                if c == '\\' {
                    if let Some((_, escaped)) = chars.next() {
                        text.push(escaped);
                    }
                } else if c == quote {
                    end = index + c.len_utf8();
                    break;
                } else {
                    text.push(c);
                }
            }
        } else {
            while let Some(&(index, c)) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                text.push(c);
                end = index + c.len_utf8();
                chars.next();
            }
        }

        tokens.push(Token { text, start, end });
    }

    tokens
}

/// A cursor over tokens. Parameter types consume from it; the parser
/// snapshots and restores it to backtrack.
#[derive(Debug, Clone)]
pub struct TokenStream {
    raw: String,
    tokens: Vec<Token>,
    position: usize,
}

impl TokenStream {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            tokens: tokenize(raw),
            position: 0,
        }
    }

    pub(super) fn from_tokens(raw: &str, tokens: Vec<Token>) -> Self {
        Self {
            raw: raw.to_string(),
            tokens,
            position: 0,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    pub fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }

    pub fn has_next(&self) -> bool {
        self.position < self.tokens.len()
    }

    pub fn remaining(&self) -> usize {
        self.tokens.len() - self.position
    }

    /// Consumes every remaining token and returns the input they span,
    /// spacing and quotes included. When the span no longer matches the
    /// tokens (a flag was pulled out from between them), the token texts are
    /// joined by single spaces instead.
    pub fn consume_rest(&mut self) -> String {
        let rest = &self.tokens[self.position..];
        let span = match (rest.first(), rest.last()) {
            (Some(first), Some(last)) => self.raw.get(first.start..last.end),
            _ => None,
        };
        let text = match span {
            Some(span) if Self::spans_tokens(span, rest) => span.to_string(),
            _ => rest
                .iter()
                .map(|token| token.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        };
        self.position = self.tokens.len();
        text
    }

    fn spans_tokens(span: &str, tokens: &[Token]) -> bool {
        tokenize(span)
            .iter()
            .map(|token| &token.text)
            .eq(tokens.iter().map(|token| &token.text))
    }

    pub fn snapshot(&self) -> usize {
        self.position
    }

    pub fn restore(&mut self, snapshot: usize) {
        self.position = snapshot;
    }

    /// Byte offset of the next token, or the end of input.
    pub fn offset(&self) -> usize {
        self.peek().map_or(self.raw.len(), |token| token.start)
    }

    pub(super) fn into_remaining(self) -> (String, Vec<Token>) {
        let TokenStream {
            raw,
            mut tokens,
            position,
        } = self;
        tokens.drain(..position);
        (raw, tokens)
    }
}

/// Renders `input` with a marker at byte `offset`.
pub fn mark_position(input: &str, offset: usize) -> String {
    let offset = offset.min(input.len());
    let (before, after) = input.split_at(offset);
    format!("{}<--[HERE]{}", before.trim_end(), after)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(input: &str) -> Vec<String> {
        tokenize(input).into_iter().map(|token| token.text).collect()
    }

    #[test]
    fn quoted_tokens_group_words() {
        assert_eq!(texts(r#"kick alice "being rude" now"#), ["kick", "alice", "being rude", "now"]);
        assert_eq!(texts("say 'it''s'"), ["say", "it", "s"]);
        assert_eq!(texts(r#"say "a \"b\"""#), ["say", r#"a "b""#]);
    }

    #[test]
    fn spans_point_into_input() {
        let tokens = tokenize("  home  \"my base\"");
        assert_eq!((tokens[0].start, tokens[0].end), (2, 6));
        assert_eq!((tokens[1].start, tokens[1].end), (8, 17));
    }

    #[test]
    fn unterminated_quote_runs_to_end() {
        let tokens = tokenize("say \"hello there");
        assert_eq!(tokens[1].text, "hello there");
        assert_eq!(tokens[1].end, 16);
    }

    #[test]
    fn snapshot_and_restore() {
        let mut stream = TokenStream::new("a b c");
        let snapshot = stream.snapshot();
        stream.next();
        stream.next();
        assert_eq!(stream.remaining(), 1);
        stream.restore(snapshot);
        assert_eq!(stream.consume_rest(), "a b c");
        assert!(!stream.has_next());
        assert_eq!(stream.offset(), 5);
    }

    #[test]
    fn rest_keeps_original_spacing_and_quotes() {
        let mut stream = TokenStream::new(r#"kick bob  being   "very rude""#);
        stream.next();
        stream.next();
        assert_eq!(stream.consume_rest(), r#"being   "very rude""#);
        assert_eq!(stream.consume_rest(), "");
    }

    #[test]
    fn rest_falls_back_to_joined_texts_around_removed_tokens() {
        let raw = "say hello -s  world";
        let kept = tokenize(raw)
            .into_iter()
            .filter(|token| token.text != "-s")
            .collect();
        let mut stream = TokenStream::from_tokens(raw, kept);
        stream.next();
        assert_eq!(stream.consume_rest(), "hello world");
    }

    #[test]
    fn marker_is_inserted_at_offset() {
        assert_eq!(mark_position("warp 12 x", 8), "warp 12<--[HERE]x");
        assert_eq!(mark_position("warp", 4), "warp<--[HERE]");
    }
}
