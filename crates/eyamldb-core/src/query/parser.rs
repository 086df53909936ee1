//! Query text to PuppetDB AST
//!
//! Grammar:
//!
//! ```text
//! expr     := and_expr ("or" and_expr)*
//! and_expr := unary ("and" unary)*
//! unary    := "not" unary | primary
//! primary  := "(" expr ")" | Type[Title] | field op literal
//! op       := "=" | "!=" | "~" | "<" | "<=" | ">" | ">="
//! literal  := "quoted \"string\"" | 'quoted' | true | false | number | word
//! ```
//!
//! Text starting with `[` is taken as a ready-made JSON AST. Empty text
//! selects every node.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, tag_no_case, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{all_consuming, map, not, opt, value},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use serde_json::{json, Value as Json};

use super::traits::{Query, QueryDomain, QueryError, QueryResult};

/// Parse query text for `domain`
pub fn parse_query(text: &str, domain: QueryDomain) -> QueryResult<Query> {
    let text = text.trim();
    let fail = |message: String| QueryError::Parse {
        domain,
        query: text.to_string(),
        message,
    };

    if text.is_empty() {
        return Ok(Query::all(domain));
    }
    if text.starts_with('[') {
        let ast: Json = serde_json::from_str(text).map_err(|e| fail(e.to_string()))?;
        return Ok(Query::from_ast(domain, ast));
    }

    let (_, ast) = all_consuming(expr)(text).map_err(|e| fail(e.to_string()))?;
    Ok(Query::from_ast(domain, ast))
}

// =============================================================================
// EXPRESSIONS
// =============================================================================

fn expr(input: &str) -> IResult<&str, Json> {
    map(separated_list1(keyword("or"), and_expr), |terms| combine("or", terms))(input)
}

fn and_expr(input: &str) -> IResult<&str, Json> {
    map(separated_list1(keyword("and"), unary), |terms| combine("and", terms))(input)
}

fn unary(input: &str) -> IResult<&str, Json> {
    alt((
        map(preceded(keyword("not"), unary), |term| json!(["not", term])),
        primary,
    ))(input)
}

fn primary(input: &str) -> IResult<&str, Json> {
    ws(alt((
        delimited(char('('), expr, char(')')),
        resource,
        comparison,
    )))(input)
}

/// `Type[Title]`, e.g. `Class[Apache::Mod]` or `file['/etc/motd']`
fn resource(input: &str) -> IResult<&str, Json> {
    map(
        pair(word, delimited(char('['), is_not("]"), char(']'))),
        |(kind, title): (&str, &str)| {
            let title = title.trim().trim_matches(|q| q == '"' || q == '\'');
            resource_clause(kind, title)
        },
    )(input)
}

/// `field op literal`
fn comparison(input: &str) -> IResult<&str, Json> {
    map(
        tuple((ws(field), ws(operator), ws(literal))),
        |(field, op, literal)| comparison_clause(&field, op, literal),
    )(input)
}

// =============================================================================
// TERMINALS
// =============================================================================

const SPECIAL: &str = "()[]=!~<>\"'";

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !SPECIAL.contains(c)
}

fn word(input: &str) -> IResult<&str, &str> {
    take_while1(is_word_char)(input)
}

/// A case-insensitive keyword not followed by more word characters
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    ws(terminated(tag_no_case(kw), not(satisfy(is_word_char))))
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn operator(input: &str) -> IResult<&str, &str> {
    alt((
        tag("!="),
        tag("<="),
        tag(">="),
        tag("="),
        tag("~"),
        tag("<"),
        tag(">"),
    ))(input)
}

/// Quoted string with `\"`, `\'`, `\\` and `\n` escapes
fn quoted_string(input: &str) -> IResult<&str, String> {
    alt((
        delimited(char('"'), quoted_body("\\\""), char('"')),
        delimited(char('\''), quoted_body("\\'"), char('\'')),
    ))(input)
}

fn quoted_body<'a>(stop: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    map(
        opt(escaped_transform(
            is_not(stop),
            '\\',
            alt((
                value("\\", tag("\\")),
                value("\"", tag("\"")),
                value("'", tag("'")),
                value("\n", tag("n")),
            )),
        )),
        Option::unwrap_or_default,
    )
}

fn field(input: &str) -> IResult<&str, String> {
    alt((quoted_string, map(word, str::to_string)))(input)
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Quoted(String),
    Bare(String),
}

impl Literal {
    /// Booleans and numbers are typed unless quoted
    fn typed(self) -> Json {
        match self {
            Literal::Quoted(text) => Json::String(text),
            Literal::Bare(text) => match text.as_str() {
                "true" => Json::Bool(true),
                "false" => Json::Bool(false),
                _ => text
                    .parse::<i64>()
                    .ok()
                    .map(Json::from)
                    .or_else(|| {
                        text.parse::<f64>()
                            .ok()
                            .and_then(serde_json::Number::from_f64)
                            .map(Json::Number)
                    })
                    .unwrap_or(Json::String(text)),
            },
        }
    }

    fn text(self) -> Json {
        match self {
            Literal::Quoted(text) | Literal::Bare(text) => Json::String(text),
        }
    }
}

fn literal(input: &str) -> IResult<&str, Literal> {
    alt((
        map(quoted_string, Literal::Quoted),
        map(word, |w: &str| Literal::Bare(w.to_string())),
    ))(input)
}

// =============================================================================
// AST BUILDERS
// =============================================================================

fn combine(op: &str, mut terms: Vec<Json>) -> Json {
    if terms.len() == 1 {
        return terms.remove(0);
    }
    let mut clause = vec![json!(op)];
    clause.extend(terms);
    Json::Array(clause)
}

fn comparison_clause(field: &str, op: &str, literal: Literal) -> Json {
    let node_field = field == "certname" || field == "name";
    let operand = if node_field || op == "~" {
        literal.text()
    } else {
        literal.typed()
    };
    let test = |subject: &str| match op {
        "!=" => json!(["not", ["=", subject, operand]]),
        _ => json!([op, subject, operand]),
    };

    if node_field {
        return test("certname");
    }
    json!([
        "in", "certname",
        ["extract", "certname",
            ["select_facts", ["and", ["=", "name", field], test("value")]]]
    ])
}

fn resource_clause(kind: &str, title: &str) -> Json {
    let kind = capitalize_segments(kind);
    let title = if kind == "Class" {
        capitalize_segments(title)
    } else {
        title.to_string()
    };
    json!([
        "in", "certname",
        ["extract", "certname",
            ["select_resources", ["and", ["=", "type", kind], ["=", "title", title]]]]
    ])
}

fn capitalize_segments(name: &str) -> String {
    name.split("::")
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("::")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ast(text: &str) -> Json {
        parse_query(text, QueryDomain::Nodes).unwrap().ast.unwrap()
    }

    fn fact(name: &str, test: Json) -> Json {
        json!(["in", "certname", ["extract", "certname",
            ["select_facts", ["and", ["=", "name", name], test]]]])
    }

    #[test]
    fn test_empty_selects_all() {
        let query = parse_query("  ", QueryDomain::Facts).unwrap();
        assert_eq!(query, Query::all(QueryDomain::Facts));
    }

    #[test]
    fn test_fact_equality() {
        assert_eq!(ast("osfamily=Debian"), fact("osfamily", json!(["=", "value", "Debian"])));
    }

    #[test]
    fn test_numeric_comparison_and_negation() {
        assert_eq!(
            ast("processorcount >= 4 and not kernel != 'Linux'"),
            json!(["and",
                fact("processorcount", json!([">=", "value", 4])),
                ["not", fact("kernel", json!(["not", ["=", "value", "Linux"]]))]])
        );
    }

    #[test]
    fn test_literals_typed_unless_quoted() {
        assert_eq!(
            ast("is_virtual=true and processorcount=4 and load != 0.5 and release='4'"),
            json!(["and",
                fact("is_virtual", json!(["=", "value", true])),
                fact("processorcount", json!(["=", "value", 4])),
                fact("load", json!(["not", ["=", "value", 0.5]])),
                fact("release", json!(["=", "value", "4"]))])
        );
        assert_eq!(ast("certname=1234"), json!(["=", "certname", "1234"]));
        assert_eq!(ast("hostname~01"), fact("hostname", json!(["~", "value", "01"])));
    }

    #[test]
    fn test_quoted_strings_with_escapes() {
        assert_eq!(
            ast(r#"motd="say \"hi\"""#),
            fact("motd", json!(["=", "value", "say \"hi\""]))
        );
        assert_eq!(
            ast(r"'kernel version'='it\'s 5'"),
            fact("kernel version", json!(["=", "value", "it's 5"]))
        );
        assert_eq!(ast(r#"motd="""#), fact("motd", json!(["=", "value", ""])));
    }

    #[test]
    fn test_keywords_need_word_boundary() {
        assert_eq!(
            ast("NOT notify=yes OR order=1"),
            json!(["or",
                ["not", fact("notify", json!(["=", "value", "yes"]))],
                fact("order", json!(["=", "value", 1]))])
        );
    }

    #[test]
    fn test_resource_and_precedence() {
        let expected_class = json!(["in", "certname", ["extract", "certname",
            ["select_resources", ["and", ["=", "type", "Class"], ["=", "title", "Apache::Mod"]]]]]);
        assert_eq!(
            ast("class[apache::mod] or certname~web and (role=db)"),
            json!(["or",
                expected_class,
                ["and", ["~", "certname", "web"], fact("role", json!(["=", "value", "db"]))]])
        );
    }

    #[test]
    fn test_raw_json_ast() {
        let query = parse_query(r#"["=", "certname", "db01"]"#, QueryDomain::Facts).unwrap();
        assert_eq!(query.domain, QueryDomain::Facts);
        assert_eq!(query.ast, Some(json!(["=", "certname", "db01"])));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["osfamily", "a = ", "(a=b", "a=b c", "'open", "[not json"] {
            let err = parse_query(bad, QueryDomain::Nodes).unwrap_err();
            assert!(matches!(err, QueryError::Parse { .. }), "{bad} should fail");
        }
    }
}
