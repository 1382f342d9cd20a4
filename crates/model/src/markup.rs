//! Tokenised declaration syntax.
//!
//! Markup is serialised as a tiny XML dialect, one element per token inside a
//! `<syntax>` root:
//!
//! ```xml
//! <syntax><k>public</k><w> </w><k>class</k><w> </w><r i="...">String</r></syntax>
//! ```
//!
//! Whitespace inside token elements is significant and preserved verbatim.

use crate::error::{ErrorKind, Result};
use crate::fingerprint::Fingerprint;
use exn::{OptionExt, ResultExt};
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use std::fmt::Write as _;

const ROOT: &[u8] = b"syntax";
const REFERENCE_ATTRIBUTE: &[u8] = b"i";

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Whitespace = 0,
    Keyword = 1,
    Punctuation = 2,
    LiteralNumber = 3,
    LiteralString = 4,
    Reference = 5,
}

impl TokenKind {
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Some(match ordinal {
            0 => Self::Whitespace,
            1 => Self::Keyword,
            2 => Self::Punctuation,
            3 => Self::LiteralNumber,
            4 => Self::LiteralString,
            5 => Self::Reference,
            _ => return None,
        })
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// The element name used in the XML serialisation.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Whitespace => "w",
            Self::Keyword => "k",
            Self::Punctuation => "p",
            Self::LiteralNumber => "n",
            Self::LiteralString => "s",
            Self::Reference => "r",
        }
    }

    fn from_tag(tag: &[u8]) -> Option<Self> {
        Some(match tag {
            b"w" => Self::Whitespace,
            b"k" => Self::Keyword,
            b"p" => Self::Punctuation,
            b"n" => Self::LiteralNumber,
            b"s" => Self::LiteralString,
            b"r" => Self::Reference,
            _ => return None,
        })
    }
}

/// One token of rendered syntax.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkupToken {
    pub kind: TokenKind,
    pub text: String,
    /// Target of a [`TokenKind::Reference`] token. `None` means unresolvable:
    /// the token renders as plain text without a hyperlink.
    pub reference: Option<Fingerprint>,
}

impl MarkupToken {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self { kind, text: text.into(), reference: None }
    }

    pub fn reference(text: impl Into<String>, target: Option<Fingerprint>) -> Self {
        Self {
            kind: TokenKind::Reference,
            text: text.into(),
            reference: target.filter(|fingerprint| !fingerprint.is_empty()),
        }
    }

    pub fn is_whitespace(&self) -> bool {
        self.kind == TokenKind::Whitespace
    }
}

/// An immutable, ordered sequence of tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Markup {
    tokens: Vec<MarkupToken>,
}

impl Markup {
    pub fn new(tokens: Vec<MarkupToken>) -> Self {
        Self { tokens }
    }

    pub fn builder() -> MarkupBuilder {
        MarkupBuilder::default()
    }

    pub fn tokens(&self) -> &[MarkupToken] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<MarkupToken> {
        self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Every resolvable reference target, in token order.
    pub fn references(&self) -> impl Iterator<Item = Fingerprint> + '_ {
        self.tokens.iter().filter_map(|token| token.reference)
    }

    /// The syntax as it would be displayed, without any markup.
    pub fn plain_text(&self) -> String {
        self.tokens.iter().map(|token| token.text.as_str()).collect()
    }

    /// The displayed syntax split into lines.
    pub fn lines(&self) -> Vec<String> {
        self.plain_text().lines().map(str::to_string).collect()
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(false);

        let mut tokens = Vec::new();
        let mut open: Option<MarkupToken> = None;
        loop {
            match reader.read_event().or_raise(|| ErrorKind::InvalidMarkup("malformed xml"))? {
                Event::Start(element) => {
                    if open.is_some() {
                        exn::bail!(ErrorKind::InvalidMarkup("nested token element"));
                    }
                    if element.local_name().as_ref() != ROOT {
                        open = Some(start_token(&element)?);
                    }
                },
                Event::Empty(element) => {
                    if element.local_name().as_ref() != ROOT {
                        tokens.push(start_token(&element)?);
                    }
                },
                Event::Text(text) => {
                    let text = text.unescape().or_raise(|| ErrorKind::InvalidMarkup("bad escape"))?;
                    match open.as_mut() {
                        Some(token) => token.text.push_str(&text),
                        None if text.trim().is_empty() => {},
                        None => exn::bail!(ErrorKind::InvalidMarkup("text outside of a token")),
                    }
                },
                Event::CData(data) => match open.as_mut() {
                    Some(token) => token.text.push_str(&String::from_utf8_lossy(&data)),
                    None => exn::bail!(ErrorKind::InvalidMarkup("text outside of a token")),
                },
                Event::End(_) => {
                    if let Some(token) = open.take() {
                        tokens.push(token);
                    }
                },
                Event::Eof => break,
                _ => {},
            }
        }
        if open.is_some() {
            exn::bail!(ErrorKind::InvalidMarkup("unterminated token"));
        }
        Ok(Self { tokens })
    }

    pub fn to_text(&self) -> String {
        let mut out = String::from("<syntax>");
        for token in &self.tokens {
            let tag = token.kind.tag();
            match token.reference {
                Some(target) => _ = write!(out, "<{tag} i=\"{target}\">"),
                None => _ = write!(out, "<{tag}>"),
            }
            out.push_str(&escape(token.text.as_str()));
            _ = write!(out, "</{tag}>");
        }
        out.push_str("</syntax>");
        out
    }
}

fn start_token(element: &BytesStart<'_>) -> Result<MarkupToken> {
    let kind = TokenKind::from_tag(element.local_name().as_ref())
        .ok_or_raise(|| ErrorKind::InvalidMarkup("unknown token element"))?;
    if kind != TokenKind::Reference {
        return Ok(MarkupToken::new(kind, String::new()));
    }
    let attribute = element
        .try_get_attribute(REFERENCE_ATTRIBUTE)
        .or_raise(|| ErrorKind::InvalidMarkup("bad attribute"))?;
    let target = match attribute {
        Some(attribute) => {
            let value = attribute.unescape_value().or_raise(|| ErrorKind::InvalidMarkup("bad attribute"))?;
            Some(value.parse::<Fingerprint>().or_raise(|| ErrorKind::InvalidMarkup("bad reference target"))?)
        },
        None => None,
    };
    Ok(MarkupToken::reference(String::new(), target))
}

impl FromIterator<MarkupToken> for Markup {
    fn from_iter<T: IntoIterator<Item = MarkupToken>>(iter: T) -> Self {
        Self { tokens: iter.into_iter().collect() }
    }
}

/// Fluent construction of [`Markup`], mostly for producers and tests.
#[derive(Debug, Default)]
pub struct MarkupBuilder {
    tokens: Vec<MarkupToken>,
}

impl MarkupBuilder {
    pub fn token(mut self, kind: TokenKind, text: impl Into<String>) -> Self {
        self.tokens.push(MarkupToken::new(kind, text));
        self
    }

    pub fn keyword(self, text: impl Into<String>) -> Self {
        self.token(TokenKind::Keyword, text)
    }

    pub fn punctuation(self, text: impl Into<String>) -> Self {
        self.token(TokenKind::Punctuation, text)
    }

    pub fn whitespace(self, text: impl Into<String>) -> Self {
        self.token(TokenKind::Whitespace, text)
    }

    pub fn space(self) -> Self {
        self.whitespace(" ")
    }

    pub fn newline(self) -> Self {
        self.whitespace("\n")
    }

    pub fn number(self, text: impl Into<String>) -> Self {
        self.token(TokenKind::LiteralNumber, text)
    }

    pub fn string(self, text: impl Into<String>) -> Self {
        self.token(TokenKind::LiteralString, text)
    }

    pub fn reference(mut self, text: impl Into<String>, target: Fingerprint) -> Self {
        self.tokens.push(MarkupToken::reference(text, Some(target)));
        self
    }

    pub fn unresolved(mut self, text: impl Into<String>) -> Self {
        self.tokens.push(MarkupToken::reference(text, None));
        self
    }

    pub fn build(self) -> Markup {
        Markup { tokens: self.tokens }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample() -> Markup {
        Markup::builder()
            .keyword("public")
            .space()
            .keyword("static")
            .space()
            .reference("String", Fingerprint::of_api("T:System.String"))
            .space()
            .unresolved("T")
            .punctuation("(")
            .string("\"a<b>&c\"")
            .punctuation(",")
            .space()
            .number("42")
            .punctuation(")")
            .build()
    }

    #[test]
    fn text_form_round_trips() {
        let markup = sample();
        let text = markup.to_text();
        assert!(text.starts_with("<syntax><k>public</k>"));
        assert!(text.contains("&lt;b&gt;&amp;c"));
        assert_eq!(Markup::parse(&text).unwrap(), markup);
    }

    #[test]
    fn plain_text_and_references() {
        let markup = sample();
        assert_eq!(markup.plain_text(), "public static String T(\"a<b>&c\", 42)");
        assert_eq!(markup.references().collect::<Vec<_>>(), vec![Fingerprint::of_api("T:System.String")]);
    }

    #[test]
    fn empty_reference_target_is_unresolvable() {
        let token = MarkupToken::reference("T", Some(Fingerprint::EMPTY));
        assert_eq!(token.reference, None);
        let parsed = Markup::parse(r#"<syntax><r i="00000000000000000000000000000000">T</r></syntax>"#).unwrap();
        assert_eq!(parsed.tokens()[0].reference, None);
    }

    #[test]
    fn whitespace_is_preserved() {
        let parsed = Markup::parse("<syntax><k>a</k><w>\n    </w><k>b</k></syntax>").unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.tokens()[1].text, "\n    ");
        assert_eq!(parsed.lines(), vec!["a".to_string(), "    b".to_string()]);
    }

    #[test]
    fn empty_markup() {
        assert!(Markup::parse("<syntax></syntax>").unwrap().is_empty());
        assert!(Markup::parse("<syntax/>").unwrap().is_empty());
        assert!(Markup::parse("").unwrap().is_empty());
    }

    #[rstest]
    #[case("<syntax><x>a</x></syntax>")]
    #[case("<syntax><k><p>a</p></k></syntax>")]
    #[case("<syntax>stray</syntax>")]
    #[case("<syntax><k>a</p></syntax>")]
    #[case(r#"<syntax><r i="nothex">T</r></syntax>"#)]
    fn invalid_markup(#[case] text: &str) {
        let err = Markup::parse(text).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidMarkup(_)));
    }
}
