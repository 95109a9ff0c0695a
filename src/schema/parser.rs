//! Stack-machine parser for wire-format specifications
//!
//! The parser keeps a stack of open scopes. The kind of the scope on top of
//! the stack selects the parsing mode: the root `Spec` node means top-level
//! declarations, a `Structure` means struct body and a `Union` means union
//! body. A closing brace pops the current scope and attaches the finished
//! node to the scope below it.

use super::ast::{Ast, NodeId, NodeKind, TypeRef};
use super::lexer::{Token, TokenKind, preprocess, tokenize};
use crate::{Result, TelemetryError};
use tracing::trace;

/// Parse specification text into a syntax tree.
pub fn parse(text: &str) -> Result<Ast> {
    let tokens = tokenize(&preprocess(text));
    trace!(tokens = tokens.len(), "Tokenized specification");
    Parser::new(&tokens).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Initial,
    Struct,
    Union,
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    ast: Ast,
    stack: Vec<NodeId>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        let ast = Ast::new();
        let root = ast.root();
        Self { tokens, pos: 0, ast, stack: vec![root] }
    }

    fn run(mut self) -> Result<Ast> {
        while let Some(token) = self.advance() {
            match self.mode() {
                Mode::Initial => self.handle_initial(token)?,
                Mode::Struct => self.handle_struct(token)?,
                Mode::Union => self.handle_union(token)?,
            }
        }

        if let Some(&open) = self.stack.last().filter(|_| self.stack.len() > 1) {
            let name = match &self.ast.node(open).kind {
                NodeKind::Structure { name: Some(name) } | NodeKind::Union { name } => name.clone(),
                _ => "<anonymous>".to_string(),
            };
            return Err(TelemetryError::spec_syntax(
                self.last_line(),
                format!("unexpected end of input: '{}' is missing its closing '}}'", name),
            ));
        }

        Ok(self.ast)
    }

    fn mode(&self) -> Mode {
        let top = *self.stack.last().unwrap_or(&self.ast.root());
        match self.ast.node(top).kind {
            NodeKind::Structure { .. } => Mode::Struct,
            NodeKind::Union { .. } => Mode::Union,
            NodeKind::Spec | NodeKind::Field { .. } => Mode::Initial,
        }
    }

    fn top(&self) -> NodeId {
        *self.stack.last().unwrap_or(&self.ast.root())
    }

    fn handle_initial(&mut self, token: &'a Token) -> Result<()> {
        match &token.kind {
            TokenKind::Word(word) if word == "struct" => {
                let next = self.expect_any("structure name or '{'")?;
                let name = match &next.kind {
                    TokenKind::OpenBrace => None,
                    TokenKind::Word(name) => {
                        self.expect(TokenKind::OpenBrace)?;
                        Some(name.clone())
                    }
                    other => return Err(unexpected(next.line, "structure name or '{'", other)),
                };
                let id = self.ast.alloc(NodeKind::Structure { name }, token.line);
                self.stack.push(id);
            }
            TokenKind::Word(word) if word == "union" => {
                let name = self.expect_word("union name")?;
                self.expect(TokenKind::OpenBrace)?;
                let id = self.ast.alloc(NodeKind::Union { name }, token.line);
                self.stack.push(id);
            }
            // Trailing ';' after a top-level structure is optional
            TokenKind::Semicolon => {}
            other => return Err(unexpected(token.line, "'struct' or 'union'", other)),
        }
        Ok(())
    }

    fn handle_struct(&mut self, token: &'a Token) -> Result<()> {
        match &token.kind {
            TokenKind::CloseBrace => self.close_scope(token.line),
            TokenKind::Word(ty) => self.parse_field(ty, token.line),
            other => Err(unexpected(token.line, "field type or '}'", other)),
        }
    }

    fn handle_union(&mut self, token: &'a Token) -> Result<()> {
        match &token.kind {
            TokenKind::CloseBrace => {
                self.expect(TokenKind::Semicolon)?;
                self.close_scope(token.line)
            }
            TokenKind::Word(word) if word == "struct" => {
                self.expect(TokenKind::OpenBrace)?;
                let id = self.ast.alloc(NodeKind::Structure { name: None }, token.line);
                self.stack.push(id);
                Ok(())
            }
            TokenKind::Word(ty) => self.parse_field(ty, token.line),
            other => Err(unexpected(token.line, "member type, 'struct' or '}'", other)),
        }
    }

    /// `type name ;` or `type name [ size ] ;`
    fn parse_field(&mut self, ty: &str, line: usize) -> Result<()> {
        let name = self.expect_word("field name")?;
        let next = self.expect_any("';' or '['")?;
        let ty = match &next.kind {
            TokenKind::Semicolon => TypeRef::Named(ty.to_string()),
            TokenKind::OpenBracket => {
                let size_token = self.expect_word("array size")?;
                let size = size_token.parse::<usize>().map_err(|_| {
                    TelemetryError::spec_syntax(
                        line,
                        format!("array size of '{}' must be an integer, found '{}'", name, size_token),
                    )
                })?;
                self.expect(TokenKind::CloseBracket)?;
                self.expect(TokenKind::Semicolon)?;
                TypeRef::Array { element: ty.to_string(), size }
            }
            other => return Err(unexpected(next.line, "';' or '['", other)),
        };

        let field = self.ast.alloc(NodeKind::Field { name, ty }, line);
        let parent = self.top();
        self.ast.attach(parent, field);
        Ok(())
    }

    /// Pop the current scope and attach it to its parent.
    fn close_scope(&mut self, line: usize) -> Result<()> {
        let Some(closed) = self.stack.pop().filter(|_| !self.stack.is_empty()) else {
            return Err(TelemetryError::spec_syntax(line, "unbalanced '}'"));
        };
        let parent = self.top();

        match self.ast.node(parent).kind {
            NodeKind::Spec => {
                self.ast.attach(parent, closed);
                Ok(())
            }
            NodeKind::Union { .. } => {
                // Inline struct member: `struct { ... } name;`
                let name = self.expect_word("union member name")?;
                self.expect(TokenKind::Semicolon)?;
                let member = self
                    .ast
                    .alloc(NodeKind::Field { name, ty: TypeRef::Inline(closed) }, self.ast.node(closed).line);
                self.ast.attach(parent, member);
                Ok(())
            }
            NodeKind::Structure { .. } | NodeKind::Field { .. } => {
                Err(TelemetryError::spec_syntax(line, "structures cannot be declared inside structures"))
            }
        }
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn last_line(&self) -> usize {
        self.tokens.last().map(|t| t.line).unwrap_or(1)
    }

    fn expect_any(&mut self, expected: &str) -> Result<&'a Token> {
        self.advance().ok_or_else(|| {
            TelemetryError::spec_syntax(
                self.last_line(),
                format!("unexpected end of input, expected {}", expected),
            )
        })
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        let expected = kind.to_string();
        let token = self.expect_any(&expected)?;
        if token.kind == kind { Ok(()) } else { Err(unexpected(token.line, &expected, &token.kind)) }
    }

    fn expect_word(&mut self, expected: &str) -> Result<String> {
        let token = self.expect_any(expected)?;
        match &token.kind {
            TokenKind::Word(word) => Ok(word.clone()),
            other => Err(unexpected(token.line, expected, other)),
        }
    }
}

fn unexpected(line: usize, expected: &str, found: &TokenKind) -> TelemetryError {
    TelemetryError::spec_syntax(line, format!("expected {}, found {}", expected, found))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(ast: &Ast, id: NodeId) -> (String, TypeRef) {
        match &ast.node(id).kind {
            NodeKind::Field { name, ty } => (name.clone(), ty.clone()),
            other => panic!("expected field, got {other:?}"),
        }
    }

    #[test]
    fn parses_scalar_and_array_fields_in_order() {
        let ast = parse("struct S { uint8 a; uint16 b[2]; };").unwrap();
        let (id, node) = ast.children(ast.root()).next().unwrap();
        assert_eq!(node.kind, NodeKind::Structure { name: Some("S".into()) });

        let fields: Vec<_> = ast.node(id).children.iter().map(|&f| field(&ast, f)).collect();
        assert_eq!(
            fields,
            vec![
                ("a".to_string(), TypeRef::Named("uint8".into())),
                ("b".to_string(), TypeRef::Array { element: "uint16".into(), size: 2 }),
            ]
        );
    }

    #[test]
    fn trailing_semicolon_after_struct_is_optional() {
        let ast = parse("struct A { uint8 x; }\nstruct B { A a; };").unwrap();
        assert_eq!(ast.node(ast.root()).children.len(), 2);
    }

    #[test]
    fn union_inline_structs_become_named_members() {
        let text = "union Packet {\n  struct { uint8 a; } first_part;\n  uint16 raw;\n};";
        let ast = parse(text).unwrap();
        let (union_id, node) = ast.children(ast.root()).next().unwrap();
        assert_eq!(node.kind, NodeKind::Union { name: "Packet".into() });

        let members: Vec<_> = ast.node(union_id).children.iter().map(|&f| field(&ast, f)).collect();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].0, "first_part");
        let TypeRef::Inline(inline) = members[0].1 else { panic!("expected inline struct") };
        assert_eq!(ast.node(inline).kind, NodeKind::Structure { name: None });
        assert_eq!(ast.node(inline).children.len(), 1);
        assert_eq!(members[1], ("raw".to_string(), TypeRef::Named("uint16".into())));
    }

    #[test]
    fn missing_semicolon_is_a_syntax_error() {
        let err = parse("struct S {\n uint8 a\n uint8 b; };").unwrap_err();
        match err {
            TelemetryError::SpecSyntax { line, details } => {
                assert_eq!(line, 3);
                assert!(details.contains("';' or '['"), "{details}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_braces_are_syntax_errors() {
        assert!(matches!(parse("struct S uint8 a; };"), Err(TelemetryError::SpecSyntax { .. })));
        assert!(matches!(parse("struct S { uint8 a;"), Err(TelemetryError::SpecSyntax { .. })));
        assert!(matches!(parse("}"), Err(TelemetryError::SpecSyntax { .. })));
        assert!(matches!(parse("union U { uint8 a; }"), Err(TelemetryError::SpecSyntax { .. })));
    }

    #[test]
    fn non_integer_array_size_is_rejected() {
        let err = parse("struct S { uint8 a[N]; };").unwrap_err();
        assert!(err.to_string().contains("must be an integer"));
    }

    #[test]
    fn empty_specification_parses_to_empty_tree() {
        let ast = parse("  // nothing here\n").unwrap();
        assert!(ast.is_empty());
    }
}
