//! Turns macro source text into an expression tree (§4.2).
//!
//! The parser is single-pass and never fails outright: an unterminated
//! `$(...)` or `${...}` rewinds the scanner and falls back to a literal
//! `$`, and a `$` followed by end-of-input or an invalid macro start does
//! the same without needing to rewind anything. Both behaviours are
//! intentional (§9 Open Questions) and are exercised by the test suite.

use crate::expr::{ConcatBuilder, ExprNode};
use crate::scanner::{Cursor, Scanner};

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '<' | '@' | ':')
}

/// Parse `source` into an expression tree, stamping every `Var` node with
/// `namespace` as its `bound_namespace` (the unit it is being parsed under).
#[must_use]
pub fn parse(source: &str, namespace: Option<String>) -> ExprNode {
    let mut parser = Parser {
        scanner: Scanner::new(source),
        namespace,
    };
    parser.parse_sequence("")
}

struct Parser<'a> {
    scanner: Scanner<'a>,
    namespace: Option<String>,
}

impl Parser<'_> {
    fn parse_sequence(&mut self, closing: &str) -> ExprNode {
        let mut builder = ConcatBuilder::new();
        loop {
            match self.scanner.peek() {
                None => break,
                Some(c) if closing.contains(c) => break,
                Some('$') => builder.push(self.parse_dollar()),
                Some('\\') => builder.push(self.parse_escape()),
                Some(_) => {
                    let text = self
                        .scanner
                        .consume_while(|c| c != '$' && c != '\\' && !closing.contains(c), usize::MAX);
                    builder.push(ExprNode::Text(text));
                }
            }
        }
        builder.finish()
    }

    fn parse_escape(&mut self) -> ExprNode {
        self.scanner.advance();
        match self.scanner.advance() {
            Some(ch) => ExprNode::Text(ch.to_string()),
            None => ExprNode::Text("\\".to_string()),
        }
    }

    fn parse_dollar(&mut self) -> ExprNode {
        let dollar_pos = self.scanner.save();
        self.scanner.advance();
        match self.scanner.peek() {
            Some('$') => {
                self.scanner.advance();
                ExprNode::Text("$".to_string())
            }
            Some('(') => self.parse_call(dollar_pos),
            Some('{') => self.parse_braced(dollar_pos),
            Some(c) if is_ident_char(c) => self.parse_bare(),
            _ => ExprNode::Text("$".to_string()),
        }
    }

    fn parse_bare(&mut self) -> ExprNode {
        let name = self.scanner.consume_while(is_ident_char, usize::MAX);
        ExprNode::Var {
            name,
            args: Vec::new(),
            bound_namespace: self.namespace.clone(),
        }
    }

    fn parse_call(&mut self, dollar_pos: Cursor) -> ExprNode {
        self.scanner.advance(); // '('
        let name = self.scanner.consume_while(is_ident_char, usize::MAX);
        self.skip_whitespace();

        let mut args = Vec::new();
        if self.scanner.peek() != Some(')') {
            loop {
                args.push(trim_arg(self.parse_sequence(",)")));
                if self.scanner.eat(',') {
                    self.skip_whitespace();
                    continue;
                }
                break;
            }
        }

        if self.scanner.eat(')') {
            ExprNode::Var {
                name,
                args,
                bound_namespace: self.namespace.clone(),
            }
        } else {
            self.unterminated(dollar_pos)
        }
    }

    fn parse_braced(&mut self, dollar_pos: Cursor) -> ExprNode {
        self.scanner.advance(); // '{'
        self.skip_whitespace();
        let name = self.scanner.consume_while(is_ident_char, usize::MAX);
        self.skip_whitespace();

        if self.scanner.eat('}') {
            ExprNode::Var {
                name,
                args: Vec::new(),
                bound_namespace: self.namespace.clone(),
            }
        } else {
            self.unterminated(dollar_pos)
        }
    }

    fn unterminated(&mut self, dollar_pos: Cursor) -> ExprNode {
        self.scanner.restore(dollar_pos);
        self.scanner.advance();
        ExprNode::Text("$".to_string())
    }

    fn skip_whitespace(&mut self) {
        self.scanner.consume_while(char::is_whitespace, usize::MAX);
    }
}

/// Trim leading/trailing literal whitespace from a parsed argument, per the
/// tie-break in §4.2: only the outermost `Text` nodes are trimmed, so
/// whitespace produced by an inner macro expansion is left for evaluation
/// time to decide.
fn trim_arg(node: ExprNode) -> ExprNode {
    match node {
        ExprNode::Text(s) => ExprNode::Text(s.trim().to_string()),
        ExprNode::Concat(mut children) => {
            if let Some(ExprNode::Text(first)) = children.first_mut() {
                *first = first.trim_start().to_string();
            }
            if let Some(ExprNode::Text(last)) = children.last_mut() {
                *last = last.trim_end().to_string();
            }
            ExprNode::Concat(children)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MutableContext;

    fn eval(node: &ExprNode) -> String {
        let ctx = MutableContext::new();
        let Ok(result) = node.eval(&DummyCtx(&ctx), &[]) else {
            panic!("eval should succeed");
        };
        result
    }

    struct DummyCtx<'a>(&'a MutableContext);
    impl crate::context::Context for DummyCtx<'_> {
        fn get(&self, name: &str) -> Option<ExprNode> {
            self.0.get(name)
        }
        fn namespace(&self) -> Option<&str> {
            None
        }
    }

    #[test]
    fn literal_dollar_dollar() {
        let tree = parse("a$$b", None);
        assert_eq!(eval(&tree), "a$b");
    }

    #[test]
    fn unterminated_paren_is_literal() {
        let tree = parse("$(F 1, 2", None);
        assert_eq!(eval(&tree), "$(F 1, 2");
    }

    #[test]
    fn unterminated_brace_is_literal() {
        let tree = parse("[${X]", None);
        assert_eq!(eval(&tree), "[${X]");
    }

    #[test]
    fn dollar_at_eof_is_literal() {
        let tree = parse("abc$", None);
        assert_eq!(eval(&tree), "abc$");
    }

    #[test]
    fn bare_name_is_not_callable() {
        let tree = parse("$name", None);
        match &tree {
            ExprNode::Var { name, args, .. } => {
                assert_eq!(name, "name");
                assert!(args.is_empty());
            }
            other => panic!("expected a Var node, got {other:?}"),
        }
    }

    #[test]
    fn call_args_are_trimmed() {
        let tree = parse("$(F  a , b )", None);
        match &tree {
            ExprNode::Var { name, args, .. } => {
                assert_eq!(name, "F");
                assert_eq!(args.len(), 2);
                assert!(matches!(args.first(), Some(ExprNode::Text(s)) if s == "a"));
                assert!(matches!(args.get(1), Some(ExprNode::Text(s)) if s == "b"));
            }
            other => panic!("expected a Var node, got {other:?}"),
        }
    }

    #[test]
    fn escape_emits_literal_character() {
        let tree = parse(r"a\$b", None);
        assert_eq!(eval(&tree), "a$b");
    }

    #[test]
    fn namespace_is_stamped_on_var_nodes() {
        let tree = parse("$x", Some("unit".to_string()));
        match tree {
            ExprNode::Var { bound_namespace, .. } => assert_eq!(bound_namespace.as_deref(), Some("unit")),
            other => panic!("expected a Var node, got {other:?}"),
        }
    }
}
