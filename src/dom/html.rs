use std::collections::BTreeMap;

use super::{Dom, NodeId};
use crate::{Error, Result};

/// Parses a document (or fragment) into a fresh [`Dom`].
///
/// Recovery follows browsers loosely: stray end tags close back to the nearest
/// matching open element, declarations are skipped, and list items, options
/// and paragraphs close implicitly.
pub fn parse_fragment(html: &str) -> Result<Dom> {
    let mut builder = TreeBuilder::new();
    let mut tokens = Tokenizer::new(html);
    while let Some(token) = tokens.next_token()? {
        builder.push(token, &mut tokens)?;
    }
    let mut dom = builder.dom;
    dom.initialize_form_control_values();
    Ok(dom)
}

#[derive(Debug)]
enum Token<'a> {
    Start {
        tag: String,
        attrs: BTreeMap<String, String>,
        self_closing: bool,
    },
    End(String),
    Text(&'a str),
}

struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        self.src.get(self.pos..).unwrap_or("")
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    fn eat_while(&mut self, keep: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&keep) {
            self.pos += 1;
        }
        self.src.get(start..self.pos).unwrap_or("")
    }

    fn skip_space(&mut self) {
        self.eat_while(|b| b.is_ascii_whitespace());
    }

    /// Moves past `needle`, failing with `what` when it never shows up.
    fn skip_past(&mut self, needle: &str, what: &str) -> Result<()> {
        let found = self
            .rest()
            .find(needle)
            .ok_or_else(|| Error::HtmlParse(what.to_string()))?;
        self.pos += found + needle.len();
        Ok(())
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        loop {
            let Some(b) = self.peek() else {
                return Ok(None);
            };
            if self.rest().starts_with("<!--") {
                self.pos += 4;
                self.skip_past("-->", "unclosed HTML comment")?;
                continue;
            }
            let opens_markup = b == b'<'
                && self
                    .peek_at(1)
                    .is_some_and(|next| next.is_ascii_alphabetic() || next == b'/' || next == b'!');
            if !opens_markup {
                let text = self.read_text();
                return Ok(Some(Token::Text(text)));
            }
            match self.peek_at(1) {
                Some(b'!') => {
                    self.pos += 2;
                    self.skip_past(">", "unclosed declaration tag")?;
                }
                Some(b'/') => return self.read_end_tag().map(|tag| Some(Token::End(tag))),
                _ => return self.read_start_tag().map(Some),
            }
        }
    }

    fn read_text(&mut self) -> &'a str {
        let start = self.pos;
        self.pos += 1;
        self.eat_while(|b| b != b'<');
        self.src.get(start..self.pos).unwrap_or("")
    }

    fn read_end_tag(&mut self) -> Result<String> {
        self.pos += 2;
        self.skip_space();
        let tag = self.eat_while(is_name_byte).to_ascii_lowercase();
        self.eat_while(|b| b != b'>');
        if self.peek().is_none() {
            return Err(Error::HtmlParse("unclosed end tag".into()));
        }
        self.pos += 1;
        Ok(tag)
    }

    fn read_start_tag(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let tag = self.eat_while(is_name_byte).to_ascii_lowercase();
        if tag.is_empty() {
            return Err(Error::HtmlParse("empty tag name".into()));
        }

        let mut attrs = BTreeMap::new();
        loop {
            self.skip_space();
            match (self.peek(), self.peek_at(1)) {
                (None, _) => {
                    return Err(Error::HtmlParse(format!("unclosed start tag <{tag}>")));
                }
                (Some(b'>'), _) => {
                    self.pos += 1;
                    return Ok(Token::Start { tag, attrs, self_closing: false });
                }
                (Some(b'/'), Some(b'>')) => {
                    self.pos += 2;
                    return Ok(Token::Start { tag, attrs, self_closing: true });
                }
                (Some(b), _) if !is_attr_byte(b) => self.pos += 1,
                _ => {
                    let name = self.eat_while(is_attr_byte).to_ascii_lowercase();
                    self.skip_space();
                    let value = if self.peek() == Some(b'=') {
                        self.pos += 1;
                        self.skip_space();
                        self.read_attr_value()?
                    } else {
                        String::new()
                    };
                    // Browsers keep the first occurrence.
                    attrs.entry(name).or_insert(value);
                }
            }
        }
    }

    fn read_attr_value(&mut self) -> Result<String> {
        match self.peek() {
            None => Err(Error::HtmlParse("missing attribute value".into())),
            Some(quote @ (b'"' | b'\'')) => {
                self.pos += 1;
                let raw = self.eat_while(|b| b != quote);
                if self.peek().is_none() {
                    return Err(Error::HtmlParse("unclosed quoted attribute value".into()));
                }
                self.pos += 1;
                Ok(decode_entities(raw))
            }
            Some(_) => {
                let start = self.pos;
                while let Some(b) = self.peek() {
                    if b.is_ascii_whitespace()
                        || b == b'>'
                        || (b == b'/' && self.peek_at(1) == Some(b'>'))
                    {
                        break;
                    }
                    self.pos += 1;
                }
                Ok(decode_entities(self.src.get(start..self.pos).unwrap_or("")))
            }
        }
    }

    /// Consumes the body of a raw text element up to its end tag.
    fn read_raw_text(&mut self, tag: &str) -> Result<&'a str> {
        let bytes = self.src.as_bytes();
        let needle = tag.as_bytes();
        let mut at = self.pos;
        while at + 2 + needle.len() <= bytes.len() {
            if bytes[at] == b'<'
                && bytes[at + 1] == b'/'
                && bytes[at + 2..at + 2 + needle.len()].eq_ignore_ascii_case(needle)
            {
                let body = self.src.get(self.pos..at).unwrap_or("");
                self.pos = at;
                self.read_end_tag()?;
                return Ok(body);
            }
            at += 1;
        }
        Err(Error::HtmlParse(format!("unclosed <{tag}>")))
    }
}

struct TreeBuilder {
    dom: Dom,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    fn new() -> Self {
        let dom = Dom::new();
        let open = vec![dom.root];
        Self { dom, open }
    }

    fn current(&self) -> Result<NodeId> {
        self.open
            .last()
            .copied()
            .ok_or_else(|| Error::HtmlParse("missing parent element".into()))
    }

    fn push(&mut self, token: Token<'_>, tokens: &mut Tokenizer<'_>) -> Result<()> {
        match token {
            Token::Text(raw) => {
                let text = decode_entities(raw);
                if !text.is_empty() {
                    let parent = self.current()?;
                    self.dom.create_text(parent, text);
                }
            }
            Token::End(tag) => {
                // Unmatched end tags are dropped.
                if let Some(depth) = (1..self.open.len())
                    .rev()
                    .find(|depth| self.dom.has_tag(self.open[*depth], &tag))
                {
                    self.open.truncate(depth);
                }
            }
            Token::Start { tag, attrs, self_closing } => {
                self.close_implied(&tag);
                let parent = self.current()?;
                let node = self.dom.create_element(parent, tag.clone(), attrs);
                if self_closing {
                    return Ok(());
                }
                if matches!(tag.as_str(), "script" | "style" | "textarea" | "title") {
                    let body = tokens.read_raw_text(&tag)?;
                    let body = match tag.as_str() {
                        "script" | "style" => body.to_string(),
                        _ => decode_entities(strip_leading_newline(body)),
                    };
                    if !body.is_empty() {
                        self.dom.create_text(node, body);
                    }
                } else if !is_void_tag(&tag) {
                    self.open.push(node);
                }
            }
        }
        Ok(())
    }

    fn close_implied(&mut self, tag: &str) {
        let closes: &[&str] = match tag {
            "li" => &["li"],
            "option" => &["option"],
            "optgroup" => &["option", "optgroup"],
            "dt" | "dd" => &["dt", "dd"],
            _ if closes_paragraph(tag) => &["p"],
            _ => return,
        };
        while let [_, .., top] = self.open.as_slice() {
            if !closes.iter().any(|name| self.dom.has_tag(*top, name)) {
                break;
            }
            self.open.pop();
        }
    }
}

fn closes_paragraph(tag: &str) -> bool {
    const BLOCKS: &[&str] = &[
        "address", "article", "aside", "div", "dl", "fieldset", "footer", "form", "h1", "h2", "h3",
        "h4", "h5", "h6", "header", "hr", "nav", "ol", "p", "section", "table", "ul",
    ];
    BLOCKS.contains(&tag)
}

fn decode_entities(src: &str) -> String {
    if !src.contains('&') {
        return src.to_string();
    }

    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let reference = tail
            .find(';')
            .and_then(|semi| entity_char(&tail[..semi]).map(|ch| (ch, semi + 1)));
        match reference {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity_char(name: &str) -> Option<char> {
    if let Some(numeric) = name.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse().ok()?,
        };
        return char::from_u32(code);
    }
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "auml" => 'ä',
        "ouml" => 'ö',
        "uuml" => 'ü',
        "Auml" => 'Ä',
        "Ouml" => 'Ö',
        "Uuml" => 'Ü',
        "szlig" => 'ß',
        "hellip" => '…',
        "laquo" => '«',
        "raquo" => '»',
        _ => return None,
    };
    Some(ch)
}

fn strip_leading_newline(text: &str) -> &str {
    text.strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .unwrap_or(text)
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_')
}

fn is_attr_byte(b: u8) -> bool {
    is_name_byte(b) || b == b':'
}

pub(crate) fn is_void_tag(tag: &str) -> bool {
    const VOID: &[&str] = &[
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ];
    VOID.contains(&tag)
}
