//! The S-expression reader: source text to node tree.
//!
//! Tokens are classified after being consumed as a run of symbol characters,
//! which keeps the lexer trivial; the only characters with structural
//! meaning are parentheses, quotes, semicolons, and `=` (attributes).

use super::cursor::{Cursor, Locus};
use super::{Node, NodeKind};
use crate::arena::Arena;
use crate::numeric;

/// Parse source text into a sequence of top-level nodes.
///
/// Never fails: malformed constructs are recorded as error nodes in the
/// tree, and parsing resumes at the next synchronisation point.
pub fn parse<'a>(arena: &'a Arena, source: &str) -> Vec<&'a Node<'a>> {
    let mut parser = Parser {
        arena,
        cursor: Cursor::new(source),
    };

    let mut nodes = Vec::new();
    loop {
        if let Some(err) = parser.skip_whitespace_and_comments() {
            nodes.push(err);
        }
        if parser.cursor.is_eof() {
            break;
        }
        nodes.push(parser.parse_node());
    }
    link_siblings(&nodes);
    nodes
}

/// Set each node's next-sibling pointer from a built-up child list.
fn link_siblings<'a>(nodes: &[&'a Node<'a>]) {
    for pair in nodes.windows(2) {
        pair[0].set_next_sibling(pair[1]);
    }
}

fn is_symbol_char(c: char) -> bool {
    !c.is_ascii_whitespace() && !matches!(c, '(' | ')' | ';' | '"' | '=')
}

struct Parser<'a, 's> {
    arena: &'a Arena,
    cursor: Cursor<'s>,
}

impl<'a> Parser<'a, '_> {
    fn node(&self, kind: NodeKind<'a>, locus: Locus) -> &'a Node<'a> {
        self.arena.alloc(Node::new(kind, locus))
    }

    fn error(&self, message: &str, locus: Locus) -> &'a Node<'a> {
        self.node(NodeKind::Error(self.arena.alloc_str(message)), locus)
    }

    /// Skip whitespace, `;;` line comments, and nesting `(; ;)` block
    /// comments. Returns an error node if a block comment never closes.
    fn skip_whitespace_and_comments(&mut self) -> Option<&'a Node<'a>> {
        loop {
            self.cursor.skip_while(|c| c.is_ascii_whitespace());
            match (self.cursor.peek(), self.cursor.peek_second()) {
                (Some(';'), Some(';')) => {
                    self.cursor.skip_while(|c| c != '\n');
                }
                (Some('('), Some(';')) => {
                    let start = self.cursor.locus();
                    self.cursor.advance();
                    self.cursor.advance();
                    let mut depth = 1u32;
                    loop {
                        match (self.cursor.peek(), self.cursor.peek_second()) {
                            (None, _) => {
                                return Some(self.error("unterminated block comment", start));
                            }
                            (Some('('), Some(';')) => {
                                depth += 1;
                                self.cursor.advance();
                                self.cursor.advance();
                            }
                            (Some(';'), Some(')')) => {
                                self.cursor.advance();
                                self.cursor.advance();
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {
                                self.cursor.advance();
                            }
                        }
                    }
                }
                (Some(';'), _) => {
                    // A lone semicolon is not part of any token.
                    let locus = self.cursor.locus();
                    self.cursor.advance();
                    return Some(self.error("unexpected ';'", locus));
                }
                _ => return None,
            }
        }
    }

    fn parse_node(&mut self) -> &'a Node<'a> {
        let locus = self.cursor.locus();
        match self.cursor.peek() {
            Some('(') => self.parse_subtree(locus),
            Some(')') => {
                self.cursor.advance();
                self.error("unexpected ')'", locus)
            }
            Some('"') => self.parse_quoted_string(locus),
            Some(_) => self.parse_token(locus),
            None => self.error("unexpected end of input", locus),
        }
    }

    fn parse_subtree(&mut self, locus: Locus) -> &'a Node<'a> {
        self.cursor.advance(); // consume '('

        let mut children: Vec<&'a Node<'a>> = Vec::new();
        loop {
            if let Some(err) = self.skip_whitespace_and_comments() {
                children.push(err);
            }
            match self.cursor.peek() {
                Some(')') => {
                    self.cursor.advance();
                    break;
                }
                None => {
                    children.push(self.error("unclosed parenthesis", locus));
                    break;
                }
                Some(_) => children.push(self.parse_node()),
            }
        }

        link_siblings(&children);
        self.node(
            NodeKind::Subtree {
                first_child: children.first().copied(),
            },
            locus,
        )
    }

    fn parse_quoted_string(&mut self, locus: Locus) -> &'a Node<'a> {
        self.cursor.advance(); // consume opening quote

        let mut bytes = Vec::new();
        loop {
            match self.cursor.peek() {
                None | Some('\n') => {
                    let error_locus = self.cursor.locus();
                    self.cursor.skip_past('"');
                    return self.error(
                        "unexpected newline or end of file in quoted string",
                        error_locus,
                    );
                }
                Some('\\') => {
                    self.cursor.advance();
                    match self.parse_escape() {
                        Some(b) => bytes.push(b),
                        None => {
                            let error_locus = self.cursor.locus();
                            self.cursor.skip_past('"');
                            return self.error("invalid escape code in quoted string", error_locus);
                        }
                    }
                }
                Some('"') => {
                    self.cursor.advance();
                    break;
                }
                Some(c) => {
                    self.cursor.advance();
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }

        self.node(NodeKind::String(self.arena.alloc_bytes(&bytes)), locus)
    }

    /// Resolve one escape after the backslash: `\n \t \\ \' \"` or a
    /// two-hexit byte.
    fn parse_escape(&mut self) -> Option<u8> {
        let c = self.cursor.peek()?;
        let resolved = match c {
            'n' => Some(b'\n'),
            't' => Some(b'\t'),
            '\\' => Some(b'\\'),
            '\'' => Some(b'\''),
            '"' => Some(b'"'),
            _ => None,
        };
        if let Some(b) = resolved {
            self.cursor.advance();
            return Some(b);
        }

        let high = c.to_digit(16)?;
        self.cursor.advance();
        let low = self.cursor.peek()?.to_digit(16)?;
        self.cursor.advance();
        Some((high * 16 + low) as u8)
    }

    /// Parse a run of symbol characters and classify it as a number, a
    /// symbol, or (when followed by `=`) an attribute name.
    fn parse_token(&mut self, locus: Locus) -> &'a Node<'a> {
        let start = self.cursor.locus();
        self.cursor.skip_while(is_symbol_char);
        let text = self.cursor.slice_from(&start);

        if text.is_empty() {
            // The next character is structural but unexpected here (for
            // example a stray '='); consume it so the parse advances.
            self.cursor.advance();
            return self.error("unexpected character", locus);
        }

        let node = self.classify_token(text, locus);

        // `name=value` forms an attribute; only symbol names qualify.
        if matches!(node.kind, NodeKind::Symbol(_)) && self.cursor.peek() == Some('=') {
            self.cursor.advance();
            if let Some(err) = self.skip_whitespace_and_comments() {
                return err;
            }
            if self.cursor.is_eof() {
                return self.error("expected value after '='", locus);
            }
            let value = self.parse_node();
            let name = match &node.kind {
                NodeKind::Symbol(s) => *s,
                _ => unreachable!(),
            };
            return self.node(NodeKind::Attribute { name, value }, locus);
        }

        node
    }

    fn classify_token(&mut self, text: &str, locus: Locus) -> &'a Node<'a> {
        let (negative, explicit_sign, body) = match text.as_bytes().first() {
            Some(b'-') => (true, true, &text[1..]),
            Some(b'+') => (false, true, &text[1..]),
            _ => (false, false, text),
        };

        if body == "nan" {
            return self.parse_nan(negative, locus);
        }
        if body == "inf" || body == "infinity" {
            let f64_bits = f64::INFINITY.to_bits() | ((negative as u64) << 63);
            let f32_bits = f32::INFINITY.to_bits() | ((negative as u32) << 31);
            return self.node(NodeKind::Float { f64_bits, f32_bits }, locus);
        }

        let leads_with_digit = body.as_bytes().first().is_some_and(|b| b.is_ascii_digit());
        if !leads_with_digit {
            if explicit_sign {
                return self.error("expected a number after the sign", locus);
            }
            return self.node(NodeKind::Symbol(self.arena.alloc_str(text)), locus);
        }

        if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
            if hex.contains(['.', 'p', 'P']) {
                return match (
                    numeric::parse_hex_f64(body, negative),
                    numeric::parse_hex_f32(body, negative),
                ) {
                    (Some(f64_bits), Some(f32_bits)) => {
                        self.node(NodeKind::Float { f64_bits, f32_bits }, locus)
                    }
                    _ => self.error("invalid hex float", locus),
                };
            }
            return match u64::from_str_radix(hex, 16) {
                Ok(value) => self.integer_node(value, negative, locus),
                Err(_) => self.error("integer out of range", locus),
            };
        }

        if body.contains(['.', 'e', 'E']) {
            return match (body.parse::<f64>(), body.parse::<f32>()) {
                (Ok(v64), Ok(v32)) => {
                    let f64_bits = v64.to_bits() | ((negative as u64) << 63);
                    let f32_bits = v32.to_bits() | ((negative as u32) << 31);
                    self.node(NodeKind::Float { f64_bits, f32_bits }, locus)
                }
                _ => self.error("invalid float literal", locus),
            };
        }

        match body.parse::<u64>() {
            Ok(value) => self.integer_node(value, negative, locus),
            Err(_) => self.error("integer out of range", locus),
        }
    }

    fn integer_node(&self, value: u64, negative: bool, locus: Locus) -> &'a Node<'a> {
        if negative {
            if value > i64::MAX as u64 + 1 {
                return self.error("integer out of range", locus);
            }
            self.node(NodeKind::SignedInt(0i64.wrapping_sub_unsigned(value)), locus)
        } else {
            self.node(NodeKind::UnsignedInt(value), locus)
        }
    }

    /// Parse the remainder of a NaN literal: either bare `nan` or
    /// `nan(0xHHH…)` with an explicit significand payload.
    fn parse_nan(&mut self, negative: bool, locus: Locus) -> &'a Node<'a> {
        if self.cursor.peek() != Some('(') {
            return self.node(
                NodeKind::Float {
                    f64_bits: numeric::canonical_nan_f64() | ((negative as u64) << 63),
                    f32_bits: numeric::canonical_nan_f32() | ((negative as u32) << 31),
                },
                locus,
            );
        }

        self.cursor.advance(); // '('
        let well_formed = self.cursor.peek() == Some('0')
            && matches!(self.cursor.peek_second(), Some('x') | Some('X'));
        if !well_formed {
            self.cursor.skip_past(')');
            return self.error("expected 0x payload in nan(...)", locus);
        }
        self.cursor.advance();
        self.cursor.advance();

        let digits_start = self.cursor.locus();
        self.cursor.skip_while(|c| c.is_ascii_hexdigit());
        let digits = self.cursor.slice_from(&digits_start);
        if digits.is_empty() || self.cursor.peek() != Some(')') {
            self.cursor.skip_past(')');
            return self.error("malformed nan(...) payload", locus);
        }
        self.cursor.advance(); // ')'

        // Payload digits beyond the significand width only matter for their
        // low bits; accumulate with saturation the way the shift helpers do.
        let mut payload: u64 = 0;
        for d in digits.bytes() {
            payload = numeric::shl_saturate(payload, 4) | (d as char).to_digit(16).unwrap() as u64;
        }

        self.node(
            NodeKind::Float {
                f64_bits: numeric::nan_with_payload_f64(negative, payload),
                f32_bits: numeric::nan_with_payload_f32(negative, payload),
            },
            locus,
        )
    }
}
