//! Explicit query templates with `:name` or `?N` placeholders.
//!
//! # Invariants
//! - A template holds exactly one statement; a trailing `;` is dropped.
//! - Placeholders inside quoted literals/identifiers, `--` line comments and
//!   `/* */` block comments are text.
//! - A `WITH` statement is classified by the first top-level statement
//!   keyword that follows its common table expressions.
//! - One template never mixes named and positional placeholders.

/// Piece of a scanned template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Named(String),
    /// One-based positional placeholder (`?1`).
    Positional(usize),
}

/// Whether a statement reads rows or mutates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Mutation,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Mutation => "mutation",
        }
    }
}

/// Parsed explicit query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    source: String,
    segments: Vec<Segment>,
    kind: StatementKind,
    order_by_at: Option<usize>,
    limit_at: Option<usize>,
}

impl QueryTemplate {
    /// Scans `source`; the error string explains the first problem found.
    pub fn parse(source: &str) -> Result<Self, String> {
        let source = source.trim().trim_end_matches(';').trim_end();
        if source.is_empty() {
            return Err("query template is empty".to_string());
        }

        let scan = Scanner::new(source).run()?;
        let leading = scan.first_word.to_ascii_uppercase();
        let verb = if leading == "WITH" {
            scan.main_verb
                .as_deref()
                .map(str::to_ascii_uppercase)
                .ok_or_else(|| "`WITH` clause is not followed by a statement".to_string())?
        } else {
            leading
        };
        let kind = match verb.as_str() {
            "SELECT" | "VALUES" => StatementKind::Read,
            "UPDATE" | "DELETE" | "INSERT" | "REPLACE" => StatementKind::Mutation,
            "" => return Err("query template does not start with a statement keyword".into()),
            other => return Err(format!("unsupported statement `{other}`")),
        };

        let has_named = scan
            .segments
            .iter()
            .any(|segment| matches!(segment, Segment::Named(_)));
        let has_positional = scan
            .segments
            .iter()
            .any(|segment| matches!(segment, Segment::Positional(_)));
        if has_named && has_positional {
            return Err("named and positional placeholders cannot be mixed".to_string());
        }

        Ok(Self {
            source: source.to_string(),
            segments: scan.segments,
            kind,
            order_by_at: scan.order_by_at,
            limit_at: scan.limit_at,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Whether the statement has a top-level `ORDER BY`.
    pub fn has_order_by(&self) -> bool {
        self.order_by_at.is_some()
    }

    /// Whether the statement has a top-level `LIMIT`.
    pub fn has_limit(&self) -> bool {
        self.limit_at.is_some()
    }

    pub fn named_placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Named(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn positional_placeholders(&self) -> impl Iterator<Item = usize> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Positional(position) => Some(*position),
            _ => None,
        })
    }

    /// Copy of this template with top-level `ORDER BY`/`LIMIT` tails removed.
    ///
    /// Used as the body of a derived count query.
    pub fn without_result_shaping(&self) -> Result<Self, String> {
        let cut = match (self.order_by_at, self.limit_at) {
            (Some(order), Some(limit)) => order.min(limit),
            (Some(at), None) | (None, Some(at)) => at,
            (None, None) => return Ok(self.clone()),
        };
        Self::parse(&self.source[..cut])
    }
}

struct ScanOutput {
    segments: Vec<Segment>,
    first_word: String,
    /// First top-level statement keyword after the leading word.
    main_verb: Option<String>,
    order_by_at: Option<usize>,
    limit_at: Option<usize>,
}

struct Scanner<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    text_start: usize,
    depth: usize,
    out: ScanOutput,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            text_start: 0,
            depth: 0,
            out: ScanOutput {
                segments: Vec::new(),
                first_word: String::new(),
                main_verb: None,
                order_by_at: None,
                limit_at: None,
            },
        }
    }

    fn run(mut self) -> Result<ScanOutput, String> {
        while self.pos < self.bytes.len() {
            let byte = self.bytes[self.pos];
            match byte {
                b'\'' | b'"' => self.skip_quoted(byte)?,
                b'-' if self.peek(1) == Some(b'-') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment()?,
                b'(' => {
                    self.depth += 1;
                    self.pos += 1;
                }
                b')' => {
                    self.depth = self.depth.saturating_sub(1);
                    self.pos += 1;
                }
                b';' => return Err("query template must hold a single statement".to_string()),
                b':' => self.scan_colon(),
                b'?' => self.scan_positional()?,
                b if is_word_start(b) && !self.prev_is_word() => self.scan_word(),
                _ => self.pos += 1,
            }
        }
        self.flush_text(self.bytes.len());
        Ok(self.out)
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn prev_is_word(&self) -> bool {
        self.pos > 0 && is_word_byte(self.bytes[self.pos - 1])
    }

    fn flush_text(&mut self, end: usize) {
        if end > self.text_start {
            self.out
                .segments
                .push(Segment::Text(self.source[self.text_start..end].to_string()));
        }
    }

    fn skip_quoted(&mut self, quote: u8) -> Result<(), String> {
        let opened_at = self.pos;
        self.pos += 1;
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == quote {
                if self.peek(1) == Some(quote) {
                    self.pos += 2;
                    continue;
                }
                self.pos += 1;
                return Ok(());
            }
            self.pos += 1;
        }
        Err(format!("unterminated quote starting at byte {opened_at}"))
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), String> {
        let opened_at = self.pos;
        self.pos += 2;
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'*' && self.peek(1) == Some(b'/') {
                self.pos += 2;
                return Ok(());
            }
            self.pos += 1;
        }
        Err(format!("unterminated block comment starting at byte {opened_at}"))
    }

    fn scan_colon(&mut self) {
        match self.peek(1) {
            Some(b':') => self.pos += 2,
            Some(next) if is_word_start(next) => {
                let start = self.pos;
                let end = self.word_end(start + 1);
                self.flush_text(start);
                self.out
                    .segments
                    .push(Segment::Named(self.source[start + 1..end].to_string()));
                self.pos = end;
                self.text_start = end;
            }
            _ => self.pos += 1,
        }
    }

    fn scan_positional(&mut self) -> Result<(), String> {
        let start = self.pos;
        let mut end = start + 1;
        while end < self.bytes.len() && self.bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end == start + 1 {
            return Err("anonymous `?` placeholders are not supported; use `?N` or `:name`".into());
        }
        let position: usize = self.source[start + 1..end]
            .parse()
            .map_err(|_| format!("invalid positional placeholder `{}`", &self.source[start..end]))?;
        if position == 0 {
            return Err("positional placeholders are one-based; `?0` is invalid".to_string());
        }
        self.flush_text(start);
        self.out.segments.push(Segment::Positional(position));
        self.pos = end;
        self.text_start = end;
        Ok(())
    }

    fn scan_word(&mut self) {
        let start = self.pos;
        let end = self.word_end(start);
        let word = &self.source[start..end];
        if self.out.first_word.is_empty() {
            self.out.first_word = word.to_string();
        } else if self.depth == 0 && self.out.main_verb.is_none() && is_statement_verb(word) {
            self.out.main_verb = Some(word.to_string());
        }
        if self.depth == 0 {
            if word.eq_ignore_ascii_case("LIMIT") {
                self.out.limit_at.get_or_insert(start);
            } else if word.eq_ignore_ascii_case("ORDER") && self.followed_by_by(end) {
                self.out.order_by_at.get_or_insert(start);
            }
        }
        self.pos = end;
    }

    fn followed_by_by(&self, from: usize) -> bool {
        let mut at = from;
        while at < self.bytes.len() && self.bytes[at].is_ascii_whitespace() {
            at += 1;
        }
        let end = self.word_end(at);
        at > from && self.source[at..end].eq_ignore_ascii_case("BY")
    }

    fn word_end(&self, from: usize) -> usize {
        let mut end = from;
        while end < self.bytes.len() && is_word_byte(self.bytes[end]) {
            end += 1;
        }
        end
    }
}

fn is_statement_verb(word: &str) -> bool {
    ["SELECT", "VALUES", "UPDATE", "DELETE", "INSERT", "REPLACE"]
        .iter()
        .any(|verb| word.eq_ignore_ascii_case(verb))
}

fn is_word_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}
