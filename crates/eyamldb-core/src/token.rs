//! Classification and tokenizing of string values
//!
//! A string value may embed encrypted spans (`ENC[PKCS7,MIIB...]`) or be a
//! reference to the PuppetDB query service (`puppetdb:<query>`).

use once_cell::sync::Lazy;
use regex::Regex;

/// Prefix marking a PuppetDB reference
pub const QUERY_MARKER: &str = "puppetdb:";

/// Encryption method assumed when a span names none (`ENC[payload]`)
pub const DEFAULT_METHOD: &str = "PKCS7";

static ENCRYPTED_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)ENC\[.*?\]").expect("valid encrypted marker pattern"));

static ENCRYPTED_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ENC\[(?:([A-Za-z0-9_]+),)?([A-Za-z0-9+/=\s]+)\]")
        .expect("valid encrypted token pattern")
});

/// True iff `text` contains an `ENC[` marker closed by a later `]`
pub fn is_encrypted(text: &str) -> bool {
    ENCRYPTED_SPAN.is_match(text)
}

/// True iff `text` contains the `puppetdb:` marker
pub fn is_query_reference(text: &str) -> bool {
    text.contains(QUERY_MARKER)
}

/// A piece of a tokenized string value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text kept as-is
    Plain(String),
    /// An encrypted span; `payload` is base64 with whitespace already removed
    Encrypted { method: String, payload: String },
}

/// Split `text` into literal and encrypted tokens in textual order
///
/// Markers whose payload is not valid base64 alphabet stay literal text.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut last = 0;

    for caps in ENCRYPTED_TOKEN.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            tokens.push(Token::Plain(text[last..whole.start()].to_string()));
        }
        let method = caps
            .get(1)
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_else(|| DEFAULT_METHOD.to_string());
        let payload: String = caps[2].chars().filter(|c| !c.is_whitespace()).collect();
        tokens.push(Token::Encrypted { method, payload });
        last = whole.end();
    }

    if last < text.len() {
        tokens.push(Token::Plain(text[last..].to_string()));
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_encrypted() {
        assert!(is_encrypted("ENC[PKCS7,abc=]"));
        assert!(is_encrypted("prefix ENC[abc] suffix"));
        assert!(is_encrypted("ENC[PKCS7,\n    abc\n    def]"));
        assert!(!is_encrypted("ENC[unterminated"));
        assert!(!is_encrypted("plain value"));
    }

    #[test]
    fn test_is_query_reference() {
        assert!(is_query_reference("puppetdb:Class[Apache]"));
        assert!(is_query_reference("hosts: puppetdb:osfamily=Debian"));
        assert!(!is_query_reference("puppetdb"));
    }

    #[test]
    fn test_predicates_are_independent() {
        let both = "puppetdb:ENC[PLAINTEXT,aGk=]";
        assert!(is_encrypted(both));
        assert!(is_query_reference(both));
    }

    #[test]
    fn test_tokenize_mixed() {
        let tokens = tokenize("user=ENC[PLAINTEXT,Ym9i] pass=ENC[c2VjcmV0]!");
        assert_eq!(
            tokens,
            vec![
                Token::Plain("user=".into()),
                Token::Encrypted { method: "PLAINTEXT".into(), payload: "Ym9i".into() },
                Token::Plain(" pass=".into()),
                Token::Encrypted { method: "PKCS7".into(), payload: "c2VjcmV0".into() },
                Token::Plain("!".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_block_payload() {
        let tokens = tokenize("ENC[PKCS7,\n  Zm9v\n  YmFy\n]");
        assert_eq!(
            tokens,
            vec![Token::Encrypted { method: "PKCS7".into(), payload: "Zm9vYmFy".into() }]
        );
    }

    #[test]
    fn test_tokenize_without_markers() {
        assert_eq!(tokenize("just text"), vec![Token::Plain("just text".into())]);
        assert!(tokenize("").is_empty());
    }
}
