//! Error-tolerant recursive-descent parser.
//!
//! The parser never fails: the first error inside a declaration or statement
//! is recorded on the tree and the cursor resynchronizes at the next `;` /
//! `}` boundary (brace-balanced), so one broken declaration yields one
//! diagnostic. Top-level expression statements are kept in the tree even
//! though the toolchain would reject them; editors feed us half-typed files.

use crate::ast::{
    Ast, Block, ContainerDecl, ContainerField, ContainerKind, FnProto, Node, NodeIndex, NodeKind,
    Param, ParseError, Payload, PtrType, SwitchProng, VarDecl,
};
use crate::token::{Token, TokenIndex, TokenTag};
use crate::tokenizer::tokenize;

/// Marker: an error has already been recorded; unwind to the recovery point.
struct ParseFailed;

type PResult<T> = Result<T, ParseFailed>;

/// Parse `source` into an [`Ast`]. Never fails.
pub fn parse(source: &str) -> Ast {
    let tokens = tokenize(source);
    let mut p = Parser {
        tokens,
        tok: 0,
        last_consumed: 0,
        nodes: Vec::new(),
        errors: Vec::new(),
    };
    let members = p.parse_container_members(TokenTag::Eof);
    let eof = (p.tokens.len() - 1) as TokenIndex;
    let root = p.add_node_spanning(NodeKind::Root { members }, 0, 0, eof);
    Ast {
        source: source.to_string(),
        tokens: p.tokens,
        nodes: p.nodes,
        root,
        errors: p.errors,
    }
}

struct Parser {
    tokens: Vec<Token>,
    tok: usize,
    last_consumed: TokenIndex,
    nodes: Vec<Node>,
    errors: Vec<ParseError>,
}

impl Parser {
    // ------------------------------------------------------------------
    // Cursor
    // ------------------------------------------------------------------

    fn skip_trivia(&mut self) {
        while self.tokens[self.tok].tag.is_comment() {
            self.tok += 1;
        }
    }

    fn peek(&mut self) -> TokenTag {
        self.skip_trivia();
        self.tokens[self.tok].tag
    }

    /// Tag of the n-th non-comment token after the current one.
    fn peek_nth(&mut self, n: usize) -> TokenTag {
        self.skip_trivia();
        let mut i = self.tok;
        let mut remaining = n;
        loop {
            if self.tokens[i].tag == TokenTag::Eof {
                return TokenTag::Eof;
            }
            i += 1;
            while self.tokens[i].tag.is_comment() {
                i += 1;
            }
            remaining -= 1;
            if remaining == 0 {
                return self.tokens[i].tag;
            }
        }
    }

    fn current(&mut self) -> TokenIndex {
        self.skip_trivia();
        self.tok as TokenIndex
    }

    fn next(&mut self) -> TokenIndex {
        self.skip_trivia();
        let i = self.tok as TokenIndex;
        if self.tokens[self.tok].tag != TokenTag::Eof {
            self.tok += 1;
        }
        self.last_consumed = i;
        i
    }

    fn eat(&mut self, tag: TokenTag) -> Option<TokenIndex> {
        if self.peek() == tag {
            Some(self.next())
        } else {
            None
        }
    }

    fn expect(&mut self, tag: TokenTag, expected: &'static str) -> PResult<TokenIndex> {
        match self.eat(tag) {
            Some(i) => Ok(i),
            None => Err(self.fail(expected)),
        }
    }

    fn fail(&mut self, expected: &'static str) -> ParseFailed {
        let token = self.current();
        self.errors.push(ParseError { token, expected });
        ParseFailed
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    fn add_node(&mut self, kind: NodeKind, main_token: TokenIndex, first_token: TokenIndex) -> NodeIndex {
        self.add_node_spanning(kind, main_token, first_token, self.last_consumed)
    }

    fn add_node_spanning(
        &mut self,
        kind: NodeKind,
        main_token: TokenIndex,
        first_token: TokenIndex,
        last_token: TokenIndex,
    ) -> NodeIndex {
        let index = self.nodes.len() as NodeIndex;
        self.nodes.push(Node { kind, main_token, first_token, last_token: last_token.max(first_token) });
        index
    }

    fn node_first_token(&self, index: NodeIndex) -> TokenIndex {
        self.nodes[index as usize].first_token
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    /// Skip ahead to the next member/statement boundary, balancing braces.
    fn recover(&mut self, terminator: TokenTag) {
        let mut depth = 0usize;
        loop {
            let tag = self.peek();
            match tag {
                TokenTag::Eof => return,
                t if t == terminator && depth == 0 => return,
                TokenTag::Semicolon | TokenTag::Comma if depth == 0 => {
                    self.next();
                    return;
                }
                TokenTag::LBrace => {
                    depth += 1;
                    self.next();
                }
                TokenTag::RBrace => {
                    if depth == 0 {
                        self.next();
                        return;
                    }
                    depth -= 1;
                    self.next();
                    if depth == 0 {
                        return;
                    }
                }
                _ => {
                    self.next();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Containers and declarations
    // ------------------------------------------------------------------

    fn parse_container_members(&mut self, terminator: TokenTag) -> Vec<NodeIndex> {
        let mut members = Vec::new();
        loop {
            let tag = self.peek();
            if tag == terminator || tag == TokenTag::Eof {
                break;
            }
            match self.parse_container_member(terminator) {
                Ok(Some(member)) => members.push(member),
                Ok(None) => {}
                Err(ParseFailed) => self.recover(terminator),
            }
        }
        members
    }

    fn parse_container_member(&mut self, terminator: TokenTag) -> PResult<Option<NodeIndex>> {
        let first = self.current();
        match self.peek() {
            TokenTag::Semicolon => {
                self.next();
                Ok(None)
            }
            TokenTag::KeywordTest => self.parse_test_decl().map(Some),
            TokenTag::KeywordPub
            | TokenTag::KeywordExtern
            | TokenTag::KeywordExport
            | TokenTag::KeywordInline
            | TokenTag::KeywordConst
            | TokenTag::KeywordVar
            | TokenTag::KeywordFn => self.parse_decl(first).map(Some),
            TokenTag::KeywordComptime => {
                if self.peek_nth(1) == TokenTag::LBrace {
                    self.next();
                    self.parse_block(None).map(Some)
                } else {
                    // `comptime name: T` field
                    self.next();
                    self.parse_container_field(first, terminator).map(Some)
                }
            }
            TokenTag::Identifier => {
                // A field (`name: T,` / `name,` / `name = v,`) or a stray
                // expression statement the editor has half-typed.
                match self.peek_nth(1) {
                    TokenTag::Colon
                    | TokenTag::Comma
                    | TokenTag::RBrace
                    | TokenTag::Equal
                    | TokenTag::Eof => self.parse_container_field(first, terminator).map(Some),
                    _ => self.parse_expr_statement().map(Some),
                }
            }
            _ => self.parse_expr_statement().map(Some),
        }
    }

    fn parse_decl(&mut self, first: TokenIndex) -> PResult<NodeIndex> {
        let is_pub = self.eat(TokenTag::KeywordPub).is_some();
        loop {
            match self.peek() {
                TokenTag::KeywordExtern | TokenTag::KeywordExport | TokenTag::KeywordInline => {
                    self.next();
                    // `extern "c"` linkage string
                    self.eat(TokenTag::StringLiteral);
                }
                _ => break,
            }
        }
        match self.peek() {
            TokenTag::KeywordConst | TokenTag::KeywordVar => self.parse_var_decl(first, is_pub),
            TokenTag::KeywordFn => self.parse_fn_decl(first, is_pub),
            _ => Err(self.fail("'const', 'var', or 'fn'")),
        }
    }

    fn parse_var_decl(&mut self, first: TokenIndex, is_pub: bool) -> PResult<NodeIndex> {
        let kw = self.next();
        let is_const = self.tokens[kw as usize].tag == TokenTag::KeywordConst;
        let name_token = self.expect(TokenTag::Identifier, "a variable name")?;
        let type_node = if self.eat(TokenTag::Colon).is_some() {
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        let init_node = if self.eat(TokenTag::Equal).is_some() {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenTag::Semicolon, "';'")?;
        Ok(self.add_node(
            NodeKind::VarDecl(VarDecl { name_token, type_node, init_node, is_pub, is_const }),
            name_token,
            first,
        ))
    }

    fn parse_fn_decl(&mut self, first: TokenIndex, is_pub: bool) -> PResult<NodeIndex> {
        let fn_token = self.next();
        let name_token = match self.eat(TokenTag::Identifier) {
            Some(tok) => Some(tok),
            None => return Err(self.fail("a function name")),
        };
        self.expect(TokenTag::LParen, "'('")?;
        let params = self.parse_param_list()?;
        let return_type = if self.type_expr_follows() {
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        let proto = FnProto { fn_token, name_token, params, return_type, is_pub };
        let body = if self.peek() == TokenTag::LBrace {
            Some(self.parse_block(None)?)
        } else {
            self.expect(TokenTag::Semicolon, "';' or a function body")?;
            None
        };
        let main = name_token.unwrap_or(fn_token);
        Ok(self.add_node(NodeKind::FnDecl(proto, body), main, first))
    }

    fn type_expr_follows(&mut self) -> bool {
        !matches!(
            self.peek(),
            TokenTag::LBrace
                | TokenTag::Semicolon
                | TokenTag::Comma
                | TokenTag::RParen
                | TokenTag::RBrace
                | TokenTag::Eof
        )
    }

    fn parse_param_list(&mut self) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        loop {
            match self.peek() {
                TokenTag::RParen => {
                    self.next();
                    return Ok(params);
                }
                TokenTag::Eof => return Err(self.fail("')'")),
                _ => {
                    let is_comptime = self.eat(TokenTag::KeywordComptime).is_some();
                    let name_token = if self.peek() == TokenTag::Identifier
                        && self.peek_nth(1) == TokenTag::Colon
                    {
                        let name = self.next();
                        self.next();
                        Some(name)
                    } else {
                        None
                    };
                    let (is_anytype, type_node) = if self.eat(TokenTag::KeywordAnytype).is_some() {
                        (true, None)
                    } else {
                        (false, Some(self.parse_type_expr()?))
                    };
                    params.push(Param { name_token, type_node, is_comptime, is_anytype });
                    if self.eat(TokenTag::Comma).is_none() && self.peek() != TokenTag::RParen {
                        return Err(self.fail("',' or ')'"));
                    }
                }
            }
        }
    }

    fn parse_container_field(
        &mut self,
        first: TokenIndex,
        terminator: TokenTag,
    ) -> PResult<NodeIndex> {
        let name_token = self.expect(TokenTag::Identifier, "a field name")?;
        let type_node = if self.eat(TokenTag::Colon).is_some() {
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        let value_node = if self.eat(TokenTag::Equal).is_some() {
            Some(self.parse_expr()?)
        } else {
            None
        };
        if self.eat(TokenTag::Comma).is_none() {
            let tag = self.peek();
            if tag != terminator && tag != TokenTag::RBrace && tag != TokenTag::Eof {
                return Err(self.fail("','"));
            }
        }
        Ok(self.add_node(
            NodeKind::ContainerField(ContainerField { name_token, type_node, value_node }),
            name_token,
            first,
        ))
    }

    fn parse_test_decl(&mut self) -> PResult<NodeIndex> {
        let first = self.current();
        let test_token = self.next();
        let name_token = self
            .eat(TokenTag::StringLiteral)
            .or_else(|| self.eat(TokenTag::Identifier));
        let body = if self.peek() == TokenTag::LBrace {
            Some(self.parse_block(None)?)
        } else {
            None
        };
        Ok(self.add_node(NodeKind::TestDecl { name_token, body }, test_token, first))
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_block(&mut self, label: Option<TokenIndex>) -> PResult<NodeIndex> {
        let first = label.unwrap_or_else(|| self.current());
        let lbrace = self.expect(TokenTag::LBrace, "'{'")?;
        let mut statements = Vec::new();
        loop {
            match self.peek() {
                TokenTag::RBrace => {
                    self.next();
                    break;
                }
                TokenTag::Eof => {
                    self.fail("'}'");
                    break;
                }
                _ => match self.parse_statement() {
                    Ok(Some(stmt)) => statements.push(stmt),
                    Ok(None) => {}
                    Err(ParseFailed) => self.recover(TokenTag::RBrace),
                },
            }
        }
        Ok(self.add_node(NodeKind::Block(Block { label, statements }), lbrace, first))
    }

    fn parse_statement(&mut self) -> PResult<Option<NodeIndex>> {
        let first = self.current();
        match self.peek() {
            TokenTag::Semicolon => {
                self.next();
                Ok(None)
            }
            TokenTag::KeywordConst | TokenTag::KeywordVar => {
                self.parse_var_decl(first, false).map(Some)
            }
            TokenTag::KeywordComptime if self.peek_nth(1) == TokenTag::LBrace => {
                self.next();
                self.parse_block(None).map(Some)
            }
            TokenTag::KeywordDefer => {
                let defer_token = self.next();
                let operand = if self.peek() == TokenTag::LBrace {
                    self.parse_block(None)?
                } else {
                    let expr = self.parse_assign_expr()?;
                    self.expect(TokenTag::Semicolon, "';'")?;
                    expr
                };
                Ok(Some(self.add_node(NodeKind::Defer { operand }, defer_token, first)))
            }
            TokenTag::KeywordIf => {
                let node = self.parse_if()?;
                self.eat(TokenTag::Semicolon);
                Ok(Some(node))
            }
            TokenTag::KeywordWhile => {
                let node = self.parse_while(None)?;
                self.eat(TokenTag::Semicolon);
                Ok(Some(node))
            }
            TokenTag::KeywordFor => {
                let node = self.parse_for(None)?;
                self.eat(TokenTag::Semicolon);
                Ok(Some(node))
            }
            TokenTag::KeywordSwitch => {
                let node = self.parse_switch()?;
                self.eat(TokenTag::Semicolon);
                Ok(Some(node))
            }
            TokenTag::LBrace => self.parse_block(None).map(Some),
            TokenTag::Identifier if self.peek_nth(1) == TokenTag::Colon => {
                match self.peek_nth(2) {
                    TokenTag::LBrace => {
                        let label = self.next();
                        self.next();
                        self.parse_block(Some(label)).map(Some)
                    }
                    TokenTag::KeywordWhile => {
                        let label = self.next();
                        self.next();
                        self.parse_while(Some(label)).map(Some)
                    }
                    TokenTag::KeywordFor => {
                        let label = self.next();
                        self.next();
                        self.parse_for(Some(label)).map(Some)
                    }
                    _ => self.parse_expr_statement().map(Some),
                }
            }
            _ => self.parse_expr_statement().map(Some),
        }
    }

    fn parse_expr_statement(&mut self) -> PResult<NodeIndex> {
        let expr = self.parse_assign_expr()?;
        self.expect(TokenTag::Semicolon, "';'")?;
        Ok(expr)
    }

    /// Expression with an optional (compound) assignment.
    fn parse_assign_expr(&mut self) -> PResult<NodeIndex> {
        let lhs = self.parse_expr()?;
        let is_assign_op = matches!(
            self.peek(),
            TokenTag::Equal
                | TokenTag::PlusEqual
                | TokenTag::MinusEqual
                | TokenTag::AsteriskEqual
                | TokenTag::SlashEqual
                | TokenTag::PercentEqual
                | TokenTag::AmpersandEqual
                | TokenTag::PipeEqual
        );
        if !is_assign_op {
            return Ok(lhs);
        }
        let op = self.next();
        let rhs = self.parse_expr()?;
        let first = self.node_first_token(lhs);
        Ok(self.add_node(NodeKind::Assign { lhs, rhs }, op, first))
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_expr(&mut self) -> PResult<NodeIndex> {
        self.parse_expr_prec(0)
    }

    fn parse_type_expr(&mut self) -> PResult<NodeIndex> {
        if self.peek() == TokenTag::Bang {
            let bang = self.next();
            let payload = self.parse_type_expr()?;
            return Ok(self.add_node(
                NodeKind::ErrorUnionType { error_set: None, payload },
                bang,
                bang,
            ));
        }
        self.parse_expr()
    }

    fn binop_prec(tag: TokenTag) -> Option<u8> {
        Some(match tag {
            TokenTag::KeywordOr => 10,
            TokenTag::KeywordAnd => 20,
            TokenTag::EqualEqual
            | TokenTag::BangEqual
            | TokenTag::LAngle
            | TokenTag::LAngleEqual
            | TokenTag::RAngle
            | TokenTag::RAngleEqual => 30,
            TokenTag::Ampersand
            | TokenTag::Pipe
            | TokenTag::KeywordOrelse
            | TokenTag::KeywordCatch => 40,
            TokenTag::Plus | TokenTag::Minus | TokenTag::PlusPlus => 50,
            TokenTag::Asterisk | TokenTag::Slash | TokenTag::Percent => 60,
            TokenTag::Bang => 70,
            _ => return None,
        })
    }

    fn parse_expr_prec(&mut self, min_prec: u8) -> PResult<NodeIndex> {
        let mut lhs = self.parse_prefix_expr()?;
        loop {
            let tag = self.peek();
            let Some(prec) = Self::binop_prec(tag) else { break };
            if prec < min_prec {
                break;
            }
            let op = self.next();
            let first = self.node_first_token(lhs);
            lhs = match tag {
                TokenTag::KeywordCatch => {
                    let payload = self.parse_payload_opt();
                    let rhs = self.parse_expr_prec(prec + 1)?;
                    self.add_node(NodeKind::Catch { lhs, payload, rhs }, op, first)
                }
                TokenTag::KeywordOrelse => {
                    let rhs = self.parse_expr_prec(prec + 1)?;
                    self.add_node(NodeKind::Orelse { lhs, rhs }, op, first)
                }
                TokenTag::Bang => {
                    let payload = self.parse_expr_prec(prec + 1)?;
                    self.add_node(
                        NodeKind::ErrorUnionType { error_set: Some(lhs), payload },
                        op,
                        first,
                    )
                }
                _ => {
                    let rhs = self.parse_expr_prec(prec + 1)?;
                    self.add_node(NodeKind::BinOp { lhs, rhs }, op, first)
                }
            };
        }
        Ok(lhs)
    }

    fn parse_prefix_expr(&mut self) -> PResult<NodeIndex> {
        let first = self.current();
        match self.peek() {
            TokenTag::KeywordTry => {
                let tok = self.next();
                let operand = self.parse_prefix_expr()?;
                Ok(self.add_node(NodeKind::Try { operand }, tok, first))
            }
            TokenTag::Ampersand => {
                let tok = self.next();
                let operand = self.parse_prefix_expr()?;
                Ok(self.add_node(NodeKind::AddressOf { operand }, tok, first))
            }
            TokenTag::Minus | TokenTag::Bang => {
                let tok = self.next();
                let operand = self.parse_prefix_expr()?;
                Ok(self.add_node(NodeKind::UnOp { operand }, tok, first))
            }
            TokenTag::Question => {
                let tok = self.next();
                let child = self.parse_prefix_expr()?;
                Ok(self.add_node(NodeKind::OptionalType { child }, tok, first))
            }
            TokenTag::Asterisk => {
                let tok = self.next();
                let is_const = self.eat(TokenTag::KeywordConst).is_some();
                let child = self.parse_prefix_expr()?;
                Ok(self.add_node(NodeKind::PtrType(PtrType { is_const, child }), tok, first))
            }
            TokenTag::LBracket => {
                let tok = self.next();
                if self.eat(TokenTag::RBracket).is_some() {
                    let is_const = self.eat(TokenTag::KeywordConst).is_some();
                    let child = self.parse_prefix_expr()?;
                    Ok(self.add_node(NodeKind::SliceType { is_const, child }, tok, first))
                } else {
                    // `[*]T` many-item pointers decay to slices here.
                    if self.eat(TokenTag::Asterisk).is_some() {
                        self.expect(TokenTag::RBracket, "']'")?;
                        let is_const = self.eat(TokenTag::KeywordConst).is_some();
                        let child = self.parse_prefix_expr()?;
                        return Ok(
                            self.add_node(NodeKind::SliceType { is_const, child }, tok, first)
                        );
                    }
                    let len = self.parse_expr()?;
                    self.expect(TokenTag::RBracket, "']'")?;
                    self.eat(TokenTag::KeywordConst);
                    let child = self.parse_prefix_expr()?;
                    Ok(self.add_node(NodeKind::ArrayType { len, child }, tok, first))
                }
            }
            TokenTag::KeywordComptime => {
                self.next();
                self.parse_prefix_expr()
            }
            _ => self.parse_suffix_expr(),
        }
    }

    fn parse_suffix_expr(&mut self) -> PResult<NodeIndex> {
        let mut expr = self.parse_primary()?;
        loop {
            let first = self.node_first_token(expr);
            match self.peek() {
                TokenTag::Period => match self.peek_nth(1) {
                    TokenTag::Identifier => {
                        self.next();
                        let name_token = self.next();
                        expr = self.add_node(
                            NodeKind::FieldAccess { lhs: expr, name_token },
                            name_token,
                            first,
                        );
                    }
                    TokenTag::Question => {
                        let period = self.next();
                        self.next();
                        expr = self.add_node(NodeKind::UnwrapOptional { lhs: expr }, period, first);
                    }
                    _ => break,
                },
                TokenTag::PeriodAsterisk => {
                    let tok = self.next();
                    expr = self.add_node(NodeKind::Deref { lhs: expr }, tok, first);
                }
                TokenTag::LParen => {
                    self.next();
                    let args = self.parse_call_args()?;
                    expr = self.add_node(
                        NodeKind::Call { callee: expr, args },
                        self.nodes[expr as usize].main_token,
                        first,
                    );
                }
                TokenTag::LBracket => {
                    self.next();
                    let index = self.parse_expr()?;
                    if self.eat(TokenTag::Ellipsis2).is_some() && self.peek() != TokenTag::RBracket
                    {
                        self.parse_expr()?;
                    }
                    self.expect(TokenTag::RBracket, "']'")?;
                    expr = self.add_node(
                        NodeKind::ArrayAccess { lhs: expr, index },
                        self.nodes[expr as usize].main_token,
                        first,
                    );
                }
                TokenTag::LBrace if self.init_list_allowed(expr) => {
                    expr = self.parse_init_list(Some(expr))?;
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn init_list_allowed(&self, expr: NodeIndex) -> bool {
        matches!(
            self.nodes[expr as usize].kind,
            NodeKind::Identifier
                | NodeKind::FieldAccess { .. }
                | NodeKind::ArrayType { .. }
                | NodeKind::SliceType { .. }
                | NodeKind::Call { .. }
                | NodeKind::BuiltinCall { .. }
                | NodeKind::Grouped { .. }
        )
    }

    fn parse_call_args(&mut self) -> PResult<Vec<NodeIndex>> {
        let mut args = Vec::new();
        loop {
            match self.peek() {
                TokenTag::RParen => {
                    self.next();
                    return Ok(args);
                }
                TokenTag::Eof => return Err(self.fail("')'")),
                _ => {
                    args.push(self.parse_expr()?);
                    if self.eat(TokenTag::Comma).is_none() && self.peek() != TokenTag::RParen {
                        return Err(self.fail("',' or ')'"));
                    }
                }
            }
        }
    }

    fn parse_init_list(&mut self, ty: Option<NodeIndex>) -> PResult<NodeIndex> {
        let first = match ty {
            Some(t) => self.node_first_token(t),
            None => self.current(),
        };
        let lbrace = self.expect(TokenTag::LBrace, "'{'")?;
        let mut entries = Vec::new();
        loop {
            match self.peek() {
                TokenTag::RBrace => {
                    self.next();
                    break;
                }
                TokenTag::Eof => {
                    self.fail("'}'");
                    break;
                }
                TokenTag::Period if self.peek_nth(1) == TokenTag::Identifier => {
                    // `.field = value`
                    self.next();
                    self.next();
                    self.expect(TokenTag::Equal, "'='")?;
                    entries.push(self.parse_expr()?);
                    if self.eat(TokenTag::Comma).is_none() && self.peek() != TokenTag::RBrace {
                        return Err(self.fail("',' or '}'"));
                    }
                }
                _ => {
                    entries.push(self.parse_expr()?);
                    if self.eat(TokenTag::Comma).is_none() && self.peek() != TokenTag::RBrace {
                        return Err(self.fail("',' or '}'"));
                    }
                }
            }
        }
        Ok(self.add_node(NodeKind::InitList { ty, entries }, lbrace, first))
    }

    fn parse_payload_opt(&mut self) -> Option<Payload> {
        if self.peek() != TokenTag::Pipe {
            return None;
        }
        self.next();
        let is_pointer = self.eat(TokenTag::Asterisk).is_some();
        let name_token = self.eat(TokenTag::Identifier)?;
        self.eat(TokenTag::Pipe);
        Some(Payload { name_token, is_pointer })
    }

    fn parse_primary(&mut self) -> PResult<NodeIndex> {
        let first = self.current();
        match self.peek() {
            TokenTag::Identifier => {
                // `blk: { ... }` / `blk: while ...` label in expression position
                if self.peek_nth(1) == TokenTag::Colon {
                    match self.peek_nth(2) {
                        TokenTag::LBrace => {
                            let label = self.next();
                            self.next();
                            return self.parse_block(Some(label));
                        }
                        TokenTag::KeywordWhile => {
                            let label = self.next();
                            self.next();
                            return self.parse_while(Some(label));
                        }
                        TokenTag::KeywordFor => {
                            let label = self.next();
                            self.next();
                            return self.parse_for(Some(label));
                        }
                        _ => {}
                    }
                }
                let tok = self.next();
                Ok(self.add_node(NodeKind::Identifier, tok, first))
            }
            TokenTag::Builtin => {
                let tok = self.next();
                self.expect(TokenTag::LParen, "'('")?;
                let args = self.parse_call_args()?;
                Ok(self.add_node(NodeKind::BuiltinCall { args }, tok, first))
            }
            TokenTag::StringLiteral => {
                let tok = self.next();
                Ok(self.add_node(NodeKind::StringLiteral, tok, first))
            }
            TokenTag::CharLiteral => {
                let tok = self.next();
                Ok(self.add_node(NodeKind::CharLiteral, tok, first))
            }
            TokenTag::NumberLiteral => {
                let tok = self.next();
                Ok(self.add_node(NodeKind::NumberLiteral, tok, first))
            }
            TokenTag::KeywordTrue | TokenTag::KeywordFalse => {
                let tok = self.next();
                Ok(self.add_node(NodeKind::BoolLiteral, tok, first))
            }
            TokenTag::KeywordNull => {
                let tok = self.next();
                Ok(self.add_node(NodeKind::NullLiteral, tok, first))
            }
            TokenTag::KeywordUndefined => {
                let tok = self.next();
                Ok(self.add_node(NodeKind::UndefinedLiteral, tok, first))
            }
            TokenTag::KeywordUnreachable => {
                let tok = self.next();
                Ok(self.add_node(NodeKind::UnreachableLiteral, tok, first))
            }
            TokenTag::KeywordStruct
            | TokenTag::KeywordEnum
            | TokenTag::KeywordUnion
            | TokenTag::KeywordOpaque => self.parse_container_decl(),
            TokenTag::KeywordError => {
                let tok = self.next();
                match self.peek() {
                    TokenTag::LBrace => {
                        self.next();
                        let mut names = Vec::new();
                        loop {
                            match self.peek() {
                                TokenTag::RBrace => {
                                    self.next();
                                    break;
                                }
                                TokenTag::Eof => {
                                    self.fail("'}'");
                                    break;
                                }
                                TokenTag::Identifier => {
                                    names.push(self.next());
                                    self.eat(TokenTag::Comma);
                                }
                                _ => return Err(self.fail("an error name")),
                            }
                        }
                        Ok(self.add_node(NodeKind::ErrorSetDecl(names), tok, first))
                    }
                    TokenTag::Period => {
                        self.next();
                        let name = self.expect(TokenTag::Identifier, "an error name")?;
                        Ok(self.add_node(NodeKind::ErrorValue, name, first))
                    }
                    _ => Ok(self.add_node(NodeKind::ErrorSetDecl(Vec::new()), tok, first)),
                }
            }
            TokenTag::Period => match self.peek_nth(1) {
                TokenTag::Identifier => {
                    self.next();
                    let name = self.next();
                    Ok(self.add_node(NodeKind::EnumLiteral, name, first))
                }
                TokenTag::LBrace => {
                    self.next();
                    self.parse_init_list(None)
                }
                _ => Err(self.fail("an expression")),
            },
            TokenTag::LParen => {
                self.next();
                let expr = self.parse_expr()?;
                self.expect(TokenTag::RParen, "')'")?;
                Ok(self.add_node(NodeKind::Grouped { expr }, first, first))
            }
            TokenTag::LBrace => self.parse_block(None),
            TokenTag::KeywordIf => self.parse_if(),
            TokenTag::KeywordWhile => self.parse_while(None),
            TokenTag::KeywordFor => self.parse_for(None),
            TokenTag::KeywordSwitch => self.parse_switch(),
            TokenTag::KeywordFn => self.parse_fn_type(),
            TokenTag::KeywordReturn => {
                let tok = self.next();
                let operand = if self.expr_follows() {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                Ok(self.add_node(NodeKind::Return { operand }, tok, first))
            }
            TokenTag::KeywordBreak => {
                let tok = self.next();
                let label = if self.eat(TokenTag::Colon).is_some() {
                    self.eat(TokenTag::Identifier)
                } else {
                    None
                };
                let operand = if self.expr_follows() {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                Ok(self.add_node(NodeKind::Break { label, operand }, tok, first))
            }
            TokenTag::KeywordContinue => {
                let tok = self.next();
                let label = if self.eat(TokenTag::Colon).is_some() {
                    self.eat(TokenTag::Identifier)
                } else {
                    None
                };
                Ok(self.add_node(NodeKind::Continue { label }, tok, first))
            }
            _ => Err(self.fail("an expression")),
        }
    }

    fn expr_follows(&mut self) -> bool {
        !matches!(
            self.peek(),
            TokenTag::Semicolon
                | TokenTag::Comma
                | TokenTag::RParen
                | TokenTag::RBracket
                | TokenTag::RBrace
                | TokenTag::KeywordElse
                | TokenTag::Eof
        )
    }

    fn parse_container_decl(&mut self) -> PResult<NodeIndex> {
        let first = self.current();
        let kind_token = self.next();
        let kind = match self.tokens[kind_token as usize].tag {
            TokenTag::KeywordStruct => ContainerKind::Struct,
            TokenTag::KeywordEnum => ContainerKind::Enum,
            TokenTag::KeywordUnion => ContainerKind::Union,
            _ => ContainerKind::Opaque,
        };
        // `enum(u8)` / `union(enum)` tag argument
        if self.eat(TokenTag::LParen).is_some() {
            if self.peek() != TokenTag::RParen {
                self.parse_expr()?;
            }
            self.expect(TokenTag::RParen, "')'")?;
        }
        let members = if self.eat(TokenTag::LBrace).is_some() {
            let members = self.parse_container_members(TokenTag::RBrace);
            self.expect(TokenTag::RBrace, "'}'")?;
            members
        } else {
            Vec::new()
        };
        Ok(self.add_node(
            NodeKind::ContainerDecl(ContainerDecl { kind, members }),
            kind_token,
            first,
        ))
    }

    fn parse_fn_type(&mut self) -> PResult<NodeIndex> {
        let first = self.current();
        let fn_token = self.next();
        let name_token = self.eat(TokenTag::Identifier);
        self.expect(TokenTag::LParen, "'('")?;
        let params = self.parse_param_list()?;
        let return_type = if self.type_expr_follows() {
            Some(self.parse_type_expr()?)
        } else {
            None
        };
        let proto = FnProto { fn_token, name_token, params, return_type, is_pub: false };
        let main = name_token.unwrap_or(fn_token);
        Ok(self.add_node(NodeKind::FnDecl(proto, None), main, first))
    }

    fn parse_if(&mut self) -> PResult<NodeIndex> {
        let first = self.current();
        let if_token = self.next();
        self.expect(TokenTag::LParen, "'('")?;
        let condition = self.parse_expr()?;
        self.expect(TokenTag::RParen, "')'")?;
        let payload = self.parse_payload_opt();
        let then_expr = self.parse_block_or_expr()?;
        let else_expr = if self.eat(TokenTag::KeywordElse).is_some() {
            self.parse_payload_opt();
            Some(self.parse_block_or_expr()?)
        } else {
            None
        };
        Ok(self.add_node(
            NodeKind::If { condition, payload, then_expr, else_expr },
            if_token,
            first,
        ))
    }

    fn parse_while(&mut self, label: Option<TokenIndex>) -> PResult<NodeIndex> {
        let first = label.unwrap_or_else(|| self.current());
        let while_token = self.next();
        self.expect(TokenTag::LParen, "'('")?;
        let condition = self.parse_expr()?;
        self.expect(TokenTag::RParen, "')'")?;
        let payload = self.parse_payload_opt();
        if self.eat(TokenTag::Colon).is_some() {
            // continue expression: `: (i += 1)`
            self.expect(TokenTag::LParen, "'('")?;
            self.parse_assign_expr()?;
            self.expect(TokenTag::RParen, "')'")?;
        }
        let body = self.parse_block_or_expr()?;
        if self.eat(TokenTag::KeywordElse).is_some() {
            self.parse_payload_opt();
            self.parse_block_or_expr()?;
        }
        Ok(self.add_node(NodeKind::While { label, condition, payload, body }, while_token, first))
    }

    fn parse_for(&mut self, label: Option<TokenIndex>) -> PResult<NodeIndex> {
        let first = label.unwrap_or_else(|| self.current());
        let for_token = self.next();
        self.expect(TokenTag::LParen, "'('")?;
        let sequence = self.parse_for_operand()?;
        while self.eat(TokenTag::Comma).is_some() && self.peek() != TokenTag::RParen {
            self.parse_for_operand()?;
        }
        self.expect(TokenTag::RParen, "')'")?;
        let mut payloads = Vec::new();
        if self.eat(TokenTag::Pipe).is_some() {
            loop {
                let is_pointer = self.eat(TokenTag::Asterisk).is_some();
                match self.eat(TokenTag::Identifier) {
                    Some(name_token) => payloads.push(Payload { name_token, is_pointer }),
                    None => break,
                }
                if self.eat(TokenTag::Comma).is_none() {
                    break;
                }
            }
            self.eat(TokenTag::Pipe);
        }
        let body = self.parse_block_or_expr()?;
        Ok(self.add_node(NodeKind::For { label, sequence, payloads, body }, for_token, first))
    }

    /// One `for` operand, which may be a `0..` / `0..n` range.
    fn parse_for_operand(&mut self) -> PResult<NodeIndex> {
        let lhs = self.parse_expr()?;
        if self.peek() == TokenTag::Ellipsis2 {
            let op = self.next();
            if self.expr_follows() {
                let rhs = self.parse_expr()?;
                let first = self.node_first_token(lhs);
                return Ok(self.add_node(NodeKind::BinOp { lhs, rhs }, op, first));
            }
        }
        Ok(lhs)
    }

    fn parse_switch(&mut self) -> PResult<NodeIndex> {
        let first = self.current();
        let switch_token = self.next();
        self.expect(TokenTag::LParen, "'('")?;
        let operand = self.parse_expr()?;
        self.expect(TokenTag::RParen, "')'")?;
        self.expect(TokenTag::LBrace, "'{'")?;
        let mut prongs = Vec::new();
        loop {
            match self.peek() {
                TokenTag::RBrace => {
                    self.next();
                    break;
                }
                TokenTag::Eof => {
                    self.fail("'}'");
                    break;
                }
                _ => {
                    let mut items = Vec::new();
                    let is_else = self.eat(TokenTag::KeywordElse).is_some();
                    if !is_else {
                        loop {
                            let item = self.parse_expr()?;
                            if self.peek() == TokenTag::Ellipsis3 {
                                let op = self.next();
                                let rhs = self.parse_expr()?;
                                let item_first = self.node_first_token(item);
                                items.push(self.add_node(
                                    NodeKind::BinOp { lhs: item, rhs },
                                    op,
                                    item_first,
                                ));
                            } else {
                                items.push(item);
                            }
                            if self.eat(TokenTag::Comma).is_none() {
                                break;
                            }
                        }
                    }
                    self.expect(TokenTag::EqualArrow, "'=>'")?;
                    let payload = self.parse_payload_opt();
                    let body = self.parse_block_or_expr()?;
                    self.eat(TokenTag::Comma);
                    prongs.push(SwitchProng { items, is_else, payload, body });
                }
            }
        }
        Ok(self.add_node(NodeKind::Switch { operand, prongs }, switch_token, first))
    }

    fn parse_block_or_expr(&mut self) -> PResult<NodeIndex> {
        if self.peek() == TokenTag::LBrace {
            self.parse_block(None)
        } else {
            self.parse_assign_expr()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_ok(source: &str) -> Ast {
        let ast = parse(source);
        assert_eq!(
            ast.errors,
            Vec::new(),
            "unexpected parse errors in {source:?}: {:?}",
            ast.errors.iter().map(|e| ast.render_parse_error(e)).collect::<Vec<_>>()
        );
        ast
    }

    #[test]
    fn parses_function_with_body() {
        let ast = parse_ok("fn add(a: i32, b: i32) i32 { return a + b; }");
        let decls = ast.root_decls();
        assert_eq!(decls.len(), 1);
        let proto = ast.fn_proto(decls[0]).unwrap();
        assert_eq!(ast.token_text(proto.name_token.unwrap()), "add");
        assert_eq!(proto.params.len(), 2);
        assert_eq!(ast.token_text(proto.params[0].name_token.unwrap()), "a");
    }

    #[test]
    fn parses_var_decl_with_import() {
        let ast = parse_ok("const std = @import(\"std\");");
        let var = ast.var_decl(ast.root_decls()[0]).unwrap();
        assert_eq!(ast.token_text(var.name_token), "std");
        assert!(var.is_const);
        let init = var.init_node.unwrap();
        assert!(matches!(ast.node(init).kind, NodeKind::BuiltinCall { .. }));
    }

    #[test]
    fn parses_struct_with_fields_and_decls() {
        let ast = parse_ok(
            "pub const Point = struct {\n    x: i32,\n    y: i32 = 0,\n    pub fn len(self: Point) i32 { return self.x; }\n};",
        );
        let var = ast.var_decl(ast.root_decls()[0]).unwrap();
        assert!(var.is_pub);
        let container = var.init_node.unwrap();
        let members = ast.container_members(container).unwrap();
        assert_eq!(members.len(), 3);
        assert!(ast.container_field(members[0]).is_some());
        assert!(ast.container_field(members[1]).is_some());
        assert!(ast.fn_proto(members[2]).is_some());
    }

    #[test]
    fn parses_enum_and_error_set() {
        let ast = parse_ok("const Color = enum { red, green };\nconst E = error{ NotFound, Busy };");
        let color = ast.var_decl(ast.root_decls()[0]).unwrap();
        let members = ast.container_members(color.init_node.unwrap()).unwrap();
        assert_eq!(members.len(), 2);
        let err = ast.var_decl(ast.root_decls()[1]).unwrap();
        match &ast.node(err.init_node.unwrap()).kind {
            NodeKind::ErrorSetDecl(names) => {
                assert_eq!(names.len(), 2);
                assert_eq!(ast.token_text(names[0]), "NotFound");
            }
            other => panic!("expected error set, got {other:?}"),
        }
    }

    #[test]
    fn parses_type_prefixes() {
        let ast = parse_ok("const a: ?*const u8 = null;\nconst b: []const u8 = \"x\";\nconst c: [4]i32 = undefined;\nconst d: anyerror!i32 = 1;");
        let a = ast.var_decl(ast.root_decls()[0]).unwrap();
        let opt = a.type_node.unwrap();
        assert!(matches!(ast.node(opt).kind, NodeKind::OptionalType { .. }));
        let b = ast.var_decl(ast.root_decls()[1]).unwrap();
        assert!(matches!(ast.node(b.type_node.unwrap()).kind, NodeKind::SliceType { .. }));
        let c = ast.var_decl(ast.root_decls()[2]).unwrap();
        assert!(matches!(ast.node(c.type_node.unwrap()).kind, NodeKind::ArrayType { .. }));
        let d = ast.var_decl(ast.root_decls()[3]).unwrap();
        assert!(matches!(ast.node(d.type_node.unwrap()).kind, NodeKind::ErrorUnionType { .. }));
    }

    #[test]
    fn parses_field_access_chain_and_calls() {
        let ast = parse_ok("const x = a.b.c(1, 2).d;");
        let var = ast.var_decl(ast.root_decls()[0]).unwrap();
        let outer = var.init_node.unwrap();
        match ast.node(outer).kind {
            NodeKind::FieldAccess { name_token, .. } => {
                assert_eq!(ast.token_text(name_token), "d");
            }
            ref other => panic!("expected field access, got {other:?}"),
        }
    }

    #[test]
    fn parses_labeled_block_and_break() {
        let ast = parse_ok("fn f() i32 { const v = blk: { break :blk 1; }; return v; }");
        assert_eq!(ast.root_decls().len(), 1);
    }

    #[test]
    fn parses_control_flow() {
        parse_ok(
            "fn f(xs: []const i32) i32 {\n    var sum: i32 = 0;\n    for (xs) |x| { sum += x; }\n    var i: i32 = 0;\n    while (i < 3) : (i += 1) { sum += i; }\n    if (sum > 10) { return sum; } else { return 0; }\n}",
        );
        parse_ok(
            "fn g(c: u8) i32 {\n    return switch (c) {\n        'a' => 1,\n        'b', 'c' => 2,\n        else => 0,\n    };\n}",
        );
    }

    #[test]
    fn parses_payloads() {
        parse_ok("fn f(opt: ?i32, eu: anyerror!i32) void {\n    if (opt) |v| { _use(v); }\n    const x = eu catch |err| { _handle(err); };\n    _ = x;\n}");
    }

    #[test]
    fn parses_try_and_orelse() {
        parse_ok("fn f(eu: anyerror!?i32) i32 { const v = (try eu) orelse 0; return v; }");
    }

    #[test]
    fn parses_init_lists() {
        parse_ok("const p = Point{ .x = 1, .y = 2 };\nconst q = .{ 1, 2 };\nconst r: [2]i32 = .{ 0, 0 };");
    }

    #[test]
    fn single_error_for_broken_fn() {
        let ast = parse("fn (");
        assert_eq!(ast.errors.len(), 1);
        let rendered = ast.render_parse_error(&ast.errors[0]);
        assert!(rendered.contains("expected a function name"), "{rendered}");
        assert_eq!(ast.token_tag(ast.errors[0].token), TokenTag::LParen);
    }

    #[test]
    fn recovers_after_bad_decl() {
        let ast = parse("const = 1;\nconst ok = 2;");
        assert_eq!(ast.errors.len(), 1);
        // The following declaration still parses.
        let names: Vec<_> = ast
            .root_decls()
            .iter()
            .filter_map(|&d| ast.var_decl(d).map(|v| ast.token_text(v.name_token)))
            .collect();
        assert_eq!(names, vec!["ok"]);
    }

    #[test]
    fn tolerates_top_level_statements() {
        // Editors send half-typed files; keep call statements in the tree.
        let ast = parse("const a = @import(\"a.zig\");\na.foo();\na.foo();\n");
        assert_eq!(ast.errors, Vec::new());
        assert_eq!(ast.root_decls().len(), 3);
    }

    #[test]
    fn dangling_field_access_recovers() {
        let ast = parse("const P = struct { x: i32 };\nvar p: P = undefined;\np.");
        assert!(!ast.errors.is_empty());
        // The two complete declarations survive; the dangling access does not.
        assert_eq!(ast.root_decls().len(), 2);
    }

    #[test]
    fn doc_comments_do_not_disturb_parsing() {
        let ast = parse_ok("//! module docs\n\n/// adds numbers\nfn add(a: i32) i32 { return a; }");
        assert_eq!(ast.root_decls().len(), 1);
    }

    #[test]
    fn test_decl_parses() {
        let ast = parse_ok("test \"adds\" { const x = 1; _ = x; }");
        assert!(matches!(ast.node(ast.root_decls()[0]).kind, NodeKind::TestDecl { .. }));
    }

    #[test]
    fn fn_type_in_type_position() {
        let ast = parse_ok("const Callback = fn (i32) void;");
        let var = ast.var_decl(ast.root_decls()[0]).unwrap();
        assert!(ast.fn_proto(var.init_node.unwrap()).is_some());
    }
}
