//! The CSS selector subset used by field discovery, observer rules and test
//! assertions.
//!
//! Supported: type, universal, `#id` and `.class` selectors, attribute tests
//! (`=`, `^=`, `$=`, `*=`, `~=`, `|=`), the descendant, child and sibling
//! combinators, selector lists, and a handful of pseudo-classes including
//! `:not(...)`.

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttrOp {
    Exists,
    Equals,
    Prefix,
    Suffix,
    Substring,
    Word,
    Dash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttrTest {
    pub(crate) name: String,
    pub(crate) op: AttrOp,
    pub(crate) value: String,
}

impl AttrTest {
    pub(crate) fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        let expected = self.value.as_str();
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == expected,
            AttrOp::Prefix => actual.starts_with(expected),
            AttrOp::Suffix => actual.ends_with(expected),
            AttrOp::Substring => actual.contains(expected),
            AttrOp::Word => actual.split_whitespace().any(|word| word == expected),
            AttrOp::Dash => {
                actual == expected
                    || actual
                        .strip_prefix(expected)
                        .is_some_and(|rest| rest.starts_with('-'))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Pseudo {
    FirstChild,
    LastChild,
    Checked,
    Disabled,
    Enabled,
    Required,
    Not(SelectorList),
}

/// Simple selectors that must all hold for a single element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Compound {
    pub(crate) tag: Option<String>,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<AttrTest>,
    pub(crate) pseudos: Vec<Pseudo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

/// `parts[i]` and `parts[i + 1]` are joined by `links[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Complex {
    pub(crate) parts: Vec<Compound>,
    pub(crate) links: Vec<Combinator>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorList(pub(crate) Vec<Complex>);

impl SelectorList {
    pub(crate) fn parse(selector: &str) -> Result<Self> {
        let mut parser = Parser::new(selector);
        let list = parser.list()?;
        parser.skip_space();
        if !parser.at_end() {
            return Err(parser.unsupported());
        }
        Ok(list)
    }

    /// The id of a bare `#id` selector, which queries can answer from the index.
    pub(crate) fn lone_id(&self) -> Option<&str> {
        let [complex] = self.0.as_slice() else {
            return None;
        };
        let [compound] = complex.parts.as_slice() else {
            return None;
        };
        let bare = compound.tag.is_none()
            && compound.classes.is_empty()
            && compound.attrs.is_empty()
            && compound.pseudos.is_empty();
        if bare { compound.id.as_deref() } else { None }
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn unsupported(&self) -> Error {
        Error::UnsupportedSelector(self.src.to_string())
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.eat(byte) { Ok(()) } else { Err(self.unsupported()) }
    }

    /// Returns whether any whitespace was skipped.
    fn skip_space(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn ident(&mut self, allow_colon: bool) -> Result<String> {
        let start = self.pos;
        while self.peek().is_some_and(|b| {
            b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_') || (allow_colon && b == b':')
        }) {
            self.pos += 1;
        }
        match self.src.get(start..self.pos) {
            Some(ident) if !ident.is_empty() => Ok(ident.to_string()),
            _ => Err(self.unsupported()),
        }
    }

    fn list(&mut self) -> Result<SelectorList> {
        let mut complexes = vec![self.complex()?];
        loop {
            self.skip_space();
            if !self.eat(b',') {
                return Ok(SelectorList(complexes));
            }
            complexes.push(self.complex()?);
        }
    }

    fn complex(&mut self) -> Result<Complex> {
        self.skip_space();
        let mut parts = vec![self.compound()?];
        let mut links = Vec::new();
        loop {
            let spaced = self.skip_space();
            let link = match self.peek() {
                Some(b'>') => Combinator::Child,
                Some(b'+') => Combinator::Adjacent,
                Some(b'~') => Combinator::Sibling,
                Some(b',' | b')') | None => break,
                Some(_) if spaced => {
                    links.push(Combinator::Descendant);
                    parts.push(self.compound()?);
                    continue;
                }
                Some(_) => return Err(self.unsupported()),
            };
            self.pos += 1;
            self.skip_space();
            links.push(link);
            parts.push(self.compound()?);
        }
        Ok(Complex { parts, links })
    }

    fn compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let mut universal = false;
        if self.eat(b'*') {
            universal = true;
        } else if self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
            compound.tag = Some(self.ident(false)?.to_ascii_lowercase());
        }

        loop {
            match self.peek() {
                Some(b'#') => {
                    self.pos += 1;
                    let id = self.ident(false)?;
                    if compound.id.replace(id).is_some() {
                        return Err(self.unsupported());
                    }
                }
                Some(b'.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident(false)?);
                }
                Some(b'[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attr_test()?);
                }
                Some(b':') => {
                    self.pos += 1;
                    compound.pseudos.push(self.pseudo()?);
                }
                _ => break,
            }
        }

        if !universal && compound == Compound::default() {
            return Err(self.unsupported());
        }
        Ok(compound)
    }

    fn attr_test(&mut self) -> Result<AttrTest> {
        self.skip_space();
        let name = self.ident(true)?.to_ascii_lowercase();
        self.skip_space();
        if self.eat(b']') {
            return Ok(AttrTest { name, op: AttrOp::Exists, value: String::new() });
        }

        let op = match self.peek() {
            Some(b'=') => AttrOp::Equals,
            Some(b'^') => AttrOp::Prefix,
            Some(b'$') => AttrOp::Suffix,
            Some(b'*') => AttrOp::Substring,
            Some(b'~') => AttrOp::Word,
            Some(b'|') => AttrOp::Dash,
            _ => return Err(self.unsupported()),
        };
        self.pos += 1;
        if op != AttrOp::Equals {
            self.expect(b'=')?;
        }
        self.skip_space();
        let value = self.attr_value()?;
        self.skip_space();
        self.expect(b']')?;
        Ok(AttrTest { name, op, value })
    }

    fn attr_value(&mut self) -> Result<String> {
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => {
                self.pos += 1;
                Some(q)
            }
            Some(_) => None,
            None => return Err(self.unsupported()),
        };

        let src = self.src;
        let mut value = String::new();
        let mut chars = src.get(self.pos..).unwrap_or("").char_indices();
        while let Some((offset, ch)) = chars.next() {
            match (ch, quote) {
                ('\\', _) => {
                    if let Some((_, escaped)) = chars.next() {
                        value.push(escaped);
                    }
                }
                (ch, Some(q)) if ch == char::from(q) => {
                    self.pos += offset + 1;
                    return Ok(value);
                }
                (']', None) => {
                    self.pos += offset;
                    return Ok(value);
                }
                (ch, None) if ch.is_ascii_whitespace() => {
                    self.pos += offset;
                    return Ok(value);
                }
                (ch, _) => value.push(ch),
            }
        }
        Err(self.unsupported())
    }

    fn pseudo(&mut self) -> Result<Pseudo> {
        let name = self.ident(false)?.to_ascii_lowercase();
        let pseudo = match name.as_str() {
            "first-child" => Pseudo::FirstChild,
            "last-child" => Pseudo::LastChild,
            "checked" => Pseudo::Checked,
            "disabled" => Pseudo::Disabled,
            "enabled" => Pseudo::Enabled,
            "required" => Pseudo::Required,
            "not" => {
                self.expect(b'(')?;
                let inner = self.list()?;
                self.skip_space();
                self.expect(b')')?;
                Pseudo::Not(inner)
            }
            _ => return Err(self.unsupported()),
        };
        Ok(pseudo)
    }
}
