// ABOUTME: Recursive-descent grammar over the token stream, one statement per line

use crate::ast::*;
use crate::error::ScriptError;
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// Parse a full token stream as a single statement. Trailing tokens are a
/// syntax error.
pub fn parse_statement(tokens: &[Token]) -> Result<Stmt, ScriptError> {
    let mut p = Parser::new(tokens);
    let stmt = p.statement()?;
    p.expect_end()?;
    Ok(stmt)
}

/// Parse a full token stream as a condition (the block preprocessor's path
/// for `if`/`while` condition text).
pub fn parse_condition(tokens: &[Token]) -> Result<Condition, ScriptError> {
    let mut p = Parser::new(tokens);
    let cond = p.condition()?;
    p.expect_end()?;
    Ok(cond)
}

struct Parser<'a> {
    toks: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(toks: &'a [Token]) -> Self {
        Parser { toks, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let tok = self.toks.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn peek_is_kw(&self, name: &str) -> bool {
        self.peek().map(|t| t.is_kw(name)).unwrap_or(false)
    }

    fn eat_kw(&mut self, name: &str) -> bool {
        if self.peek_is_kw(name) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, name: &str) -> Result<(), ScriptError> {
        if self.eat_kw(name) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected '{}'", name)))
        }
    }

    fn expect_string(&mut self, what: &str) -> Result<String, ScriptError> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Str => {
                self.pos += 1;
                Ok(t.lexeme.clone())
            }
            _ => Err(self.unexpected(&format!("expected a quoted string for {}", what))),
        }
    }

    fn expect_variable(&mut self, what: &str) -> Result<String, ScriptError> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Variable => {
                self.pos += 1;
                Ok(t.lexeme.clone())
            }
            _ => Err(self.unexpected(&format!("expected a $variable for {}", what))),
        }
    }

    fn expect_number(&mut self, what: &str) -> Result<f64, ScriptError> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Number => {
                self.pos += 1;
                t.lexeme
                    .parse::<f64>()
                    .map_err(|_| ScriptError::syntax(format!("invalid number '{}'", t.lexeme)))
            }
            _ => Err(self.unexpected(&format!("expected a number for {}", what))),
        }
    }

    fn expect_end(&self) -> Result<(), ScriptError> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(ScriptError::syntax(format!(
                "unexpected trailing '{}' at {}:{}",
                t.lexeme, t.line, t.col
            ))),
        }
    }

    fn unexpected(&self, expected: &str) -> ScriptError {
        match self.peek() {
            Some(t) => ScriptError::syntax(format!(
                "{}, found '{}' at {}:{}",
                expected, t.lexeme, t.line, t.col
            )),
            None => ScriptError::syntax(format!("{}, found end of line", expected)),
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        let first = match self.peek() {
            Some(t) => t,
            None => return Err(ScriptError::syntax("empty statement")),
        };

        match first.kind {
            TokenKind::Method => self.http_request(),
            TokenKind::Keyword => match first.lexeme.as_str() {
                "set" | "var" => self.set_stmt(),
                "extract" => self.extract_stmt(),
                "print" => self.print_stmt(),
                "log" => self.message_stmt(Stmt::Log),
                "debug" => self.message_stmt(Stmt::Debug),
                "assert" | "expect" => self.assert_stmt(),
                "wait" | "sleep" => self.wait_stmt(),
                "clear" => {
                    self.pos += 1;
                    self.expect_kw("cookies")?;
                    Ok(Stmt::ClearCookies)
                }
                "reset" => {
                    self.pos += 1;
                    Ok(Stmt::Reset)
                }
                "base" => {
                    self.pos += 1;
                    self.expect_kw("url")?;
                    let url = self.expect_string("base url")?;
                    Ok(Stmt::BaseUrl(url))
                }
                "break" => {
                    self.pos += 1;
                    Ok(Stmt::Break)
                }
                "continue" => {
                    self.pos += 1;
                    Ok(Stmt::Continue)
                }
                "if" => self.if_inline(),
                other => Err(ScriptError::syntax(format!(
                    "no rule matches statement starting with '{}'",
                    other
                ))),
            },
            _ => Err(self.unexpected("expected a statement")),
        }
    }

    fn http_request(&mut self) -> Result<Stmt, ScriptError> {
        let method_tok = self.next().expect("method token present");
        let method = Method::from_keyword(&method_tok.lexeme)
            .ok_or_else(|| ScriptError::syntax(format!("unknown method '{}'", method_tok.lexeme)))?;

        let url = match self.peek() {
            Some(t) if t.kind == TokenKind::Str || t.kind == TokenKind::Url => {
                self.pos += 1;
                UrlSpec::Literal(t.lexeme.clone())
            }
            Some(t) if t.kind == TokenKind::Variable => {
                self.pos += 1;
                UrlSpec::Var(t.lexeme.clone())
            }
            _ => return Err(self.unexpected("expected a URL after the method")),
        };

        let options = self.option_list()?;
        Ok(Stmt::Request {
            method,
            url,
            options,
        })
    }

    /// option_list built iteratively, preserving source order.
    fn option_list(&mut self) -> Result<RequestOptions, ScriptError> {
        let mut opts = RequestOptions::default();

        loop {
            match self.peek() {
                Some(t) if t.is_kw("header") => {
                    self.pos += 1;
                    let name = self.expect_string("the header name")?;
                    let value = self.expect_string("the header value")?;
                    opts.headers.push((name, value));
                }
                Some(t) if t.is_kw("body") => {
                    self.pos += 1;
                    opts.body = Some(self.expect_string("the request body")?);
                }
                Some(t) if t.is_kw("json") => {
                    self.pos += 1;
                    let payload = match self.peek() {
                        Some(t)
                            if t.kind == TokenKind::Str || t.kind == TokenKind::JsonInline =>
                        {
                            self.pos += 1;
                            t.lexeme.clone()
                        }
                        _ => return Err(self.unexpected("expected a JSON payload")),
                    };
                    opts.json = Some(payload);
                }
                Some(t) if t.is_kw("auth") => {
                    self.pos += 1;
                    if self.eat_kw("basic") {
                        let user = self.expect_string("the username")?;
                        let pass = self.expect_string("the password")?;
                        opts.auth = Some(Auth::Basic { user, pass });
                    } else if self.eat_kw("bearer") {
                        let token = self.expect_string("the bearer token")?;
                        opts.auth = Some(Auth::Bearer(token));
                    } else {
                        return Err(self.unexpected("expected 'basic' or 'bearer'"));
                    }
                }
                Some(t) if t.is_kw("timeout") => {
                    self.pos += 1;
                    let amount = self.expect_number("the timeout")?;
                    let ms = if self.eat_kw("s") {
                        amount * 1000.0
                    } else {
                        self.expect_kw("ms")?;
                        amount
                    };
                    opts.timeout_ms = Some(ms as u64);
                }
                _ => break,
            }
        }

        Ok(opts)
    }

    fn set_stmt(&mut self) -> Result<Stmt, ScriptError> {
        self.pos += 1; // set | var
        let name = self.expect_variable("the target variable")?;
        let expr = self.expression()?;
        Ok(Stmt::Set { name, expr })
    }

    fn extract_stmt(&mut self) -> Result<Stmt, ScriptError> {
        self.pos += 1; // extract
        let kind_tok = self
            .next()
            .ok_or_else(|| ScriptError::syntax("expected an extraction kind after 'extract'"))?;
        let kind = ExtractKind::from_keyword(&kind_tok.lexeme).ok_or_else(|| {
            ScriptError::syntax(format!("unknown extraction kind '{}'", kind_tok.lexeme))
        })?;

        // `status` takes no pattern (an optional one is ignored); the rest
        // require one.
        let pattern = match self.peek() {
            Some(t) if t.kind == TokenKind::Str => {
                self.pos += 1;
                Some(t.lexeme.clone())
            }
            _ if kind == ExtractKind::Status => None,
            _ => return Err(self.unexpected("expected a pattern string")),
        };

        self.expect_kw("as")?;
        let var = self.expect_variable("the target variable")?;
        Ok(Stmt::Extract { kind, pattern, var })
    }

    fn print_stmt(&mut self) -> Result<Stmt, ScriptError> {
        self.pos += 1; // print
        match self.peek() {
            Some(t) if t.kind == TokenKind::Str => {
                self.pos += 1;
                Ok(Stmt::Print(PrintArg::Text(t.lexeme.clone())))
            }
            Some(t) if t.kind == TokenKind::Variable => {
                self.pos += 1;
                Ok(Stmt::Print(PrintArg::Var(t.lexeme.clone())))
            }
            _ => Err(self.unexpected("expected a string or $variable to print")),
        }
    }

    fn message_stmt(&mut self, build: fn(String) -> Stmt) -> Result<Stmt, ScriptError> {
        self.pos += 1; // log | debug
        let msg = self.expect_string("the message")?;
        Ok(build(msg))
    }

    fn assert_stmt(&mut self) -> Result<Stmt, ScriptError> {
        self.pos += 1; // assert | expect
        if self.eat_kw("status") {
            let code = self.expect_number("the expected status")?;
            return Ok(Stmt::Assert(Assertion::Status(code as u16)));
        }
        if self.eat_kw("time") {
            self.expect_kw("less")?;
            let ms = self.expect_number("the time bound")?;
            self.expect_kw("ms")?;
            return Ok(Stmt::Assert(Assertion::TimeLess(ms as u64)));
        }
        if self.eat_kw("response") {
            self.expect_kw("contains")?;
            let needle = self.expect_string("the expected substring")?;
            return Ok(Stmt::Assert(Assertion::ResponseContains(needle)));
        }
        Err(self.unexpected("expected 'status', 'time less', or 'response contains'"))
    }

    fn wait_stmt(&mut self) -> Result<Stmt, ScriptError> {
        self.pos += 1; // wait | sleep
        let amount = self.expect_number("the duration")?;
        let unit = if self.eat_kw("s") {
            TimeUnit::Seconds
        } else {
            self.eat_kw("ms");
            TimeUnit::Millis
        };
        Ok(Stmt::Wait { amount, unit })
    }

    fn if_inline(&mut self) -> Result<Stmt, ScriptError> {
        self.pos += 1; // if
        let cond = self.condition()?;
        self.expect_kw("then")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.eat_kw("else") {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        // Tolerate the closing keyword on the same line: `if c then x endif`
        self.eat_kw("endif");
        Ok(Stmt::IfInline {
            cond,
            then_branch,
            else_branch,
        })
    }

    // ========================================================================
    // Expressions (for `set`)
    // ========================================================================

    /// expression := term (ARITH term)*, folded left-associatively.
    fn expression(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.term()?;

        while let Some(t) = self.peek() {
            if t.kind != TokenKind::Arith {
                break;
            }
            let op = match t.lexeme.as_str() {
                "+" => ArithOp::Add,
                "-" => ArithOp::Sub,
                "*" => ArithOp::Mul,
                "/" => ArithOp::Div,
                other => return Err(ScriptError::syntax(format!("unknown operator '{}'", other))),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, ScriptError> {
        let tok = match self.peek() {
            Some(t) => t,
            None => return Err(ScriptError::syntax("expected an expression")),
        };

        match tok.kind {
            TokenKind::Number => {
                self.pos += 1;
                let n = tok
                    .lexeme
                    .parse::<f64>()
                    .map_err(|_| ScriptError::syntax(format!("invalid number '{}'", tok.lexeme)))?;
                Ok(Expr::Literal(Value::Number(n)))
            }
            TokenKind::Str => {
                self.pos += 1;
                Ok(Expr::Literal(Value::Str(tok.lexeme.clone())))
            }
            TokenKind::JsonInline => {
                self.pos += 1;
                let parsed: serde_json::Value = serde_json::from_str(&tok.lexeme)
                    .map_err(|e| ScriptError::syntax(format!("invalid JSON literal: {}", e)))?;
                Ok(Expr::Literal(Value::from_json(&parsed)))
            }
            TokenKind::LBracket => self.array_literal(),
            TokenKind::Variable => {
                self.pos += 1;
                let name = tok.lexeme.clone();
                if let Some(index) = self.try_index()? {
                    Ok(Expr::Index { var: name, index })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            TokenKind::Keyword if tok.lexeme == "length" => {
                self.pos += 1;
                let var = self.expect_variable("'length'")?;
                Ok(Expr::Length(var))
            }
            TokenKind::Keyword if tok.lexeme == "split" => {
                self.pos += 1;
                let var = self.expect_variable("'split'")?;
                let sep = self.expect_string("the separator")?;
                Ok(Expr::Split { var, sep })
            }
            _ => Err(self.unexpected("expected a value")),
        }
    }

    /// `[ elem, elem, ... ]` with scalar elements.
    fn array_literal(&mut self) -> Result<Expr, ScriptError> {
        self.pos += 1; // [
        let mut items = Vec::new();

        if self.peek().map(|t| t.kind) == Some(TokenKind::RBracket) {
            self.pos += 1;
            return Ok(Expr::Literal(Value::Array(items)));
        }

        loop {
            let tok = match self.peek() {
                Some(t) => t,
                None => return Err(ScriptError::syntax("unterminated array literal")),
            };
            let item = match tok.kind {
                TokenKind::Str => Value::Str(tok.lexeme.clone()),
                TokenKind::Number => Value::Number(tok.lexeme.parse::<f64>().map_err(|_| {
                    ScriptError::syntax(format!("invalid number '{}'", tok.lexeme))
                })?),
                _ => return Err(self.unexpected("expected a string or number element")),
            };
            self.pos += 1;
            items.push(item);

            match self.peek() {
                Some(t) if t.kind == TokenKind::Comma => {
                    self.pos += 1;
                }
                Some(t) if t.kind == TokenKind::RBracket => {
                    self.pos += 1;
                    return Ok(Expr::Literal(Value::Array(items)));
                }
                _ => return Err(self.unexpected("expected ',' or ']'")),
            }
        }
    }

    /// Trailing `[N]` / `[$i]` after a variable, if present.
    fn try_index(&mut self) -> Result<Option<IndexKey>, ScriptError> {
        if self.peek().map(|t| t.kind) != Some(TokenKind::LBracket) {
            return Ok(None);
        }
        self.pos += 1; // [

        let key = match self.peek() {
            Some(t) if t.kind == TokenKind::Number => {
                let idx = t.lexeme.parse::<usize>().map_err(|_| {
                    ScriptError::syntax(format!("invalid array index '{}'", t.lexeme))
                })?;
                self.pos += 1;
                IndexKey::Number(idx)
            }
            Some(t) if t.kind == TokenKind::Variable => {
                let name = t.lexeme.clone();
                self.pos += 1;
                IndexKey::Var(name)
            }
            _ => return Err(self.unexpected("expected an index")),
        };

        match self.peek() {
            Some(t) if t.kind == TokenKind::RBracket => {
                self.pos += 1;
                Ok(Some(key))
            }
            _ => Err(self.unexpected("expected ']'")),
        }
    }

    // ========================================================================
    // Conditions
    // ========================================================================

    /// condition := and_chain ("or" and_chain)* — `and` binds tighter.
    fn condition(&mut self) -> Result<Condition, ScriptError> {
        let mut lhs = self.and_chain()?;
        while self.eat_kw("or") {
            let rhs = self.and_chain()?;
            lhs = Condition::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_chain(&mut self) -> Result<Condition, ScriptError> {
        let mut lhs = self.not_cond()?;
        while self.eat_kw("and") {
            let rhs = self.not_cond()?;
            lhs = Condition::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_cond(&mut self) -> Result<Condition, ScriptError> {
        if self.eat_kw("not") {
            let inner = self.not_cond()?;
            return Ok(Condition::Not(Box::new(inner)));
        }
        self.simple_condition()
    }

    fn simple_condition(&mut self) -> Result<Condition, ScriptError> {
        let lhs = self.operand()?;

        match self.peek() {
            Some(t) if t.kind == TokenKind::Cmp => {
                let op = CmpOp::from_lexeme(&t.lexeme)
                    .ok_or_else(|| ScriptError::syntax(format!("unknown operator '{}'", t.lexeme)))?;
                self.pos += 1;
                let rhs = self.operand()?;
                Ok(Condition::Cmp { lhs, op, rhs })
            }
            Some(t) if t.is_kw("contains") => {
                self.pos += 1;
                let rhs = self.operand()?;
                Ok(Condition::Contains { lhs, rhs })
            }
            Some(t) if t.is_kw("matches") => {
                self.pos += 1;
                let pattern = self.expect_string("the regex pattern")?;
                Ok(Condition::Matches { lhs, pattern })
            }
            Some(t) if t.is_kw("empty") => {
                self.pos += 1;
                Ok(Condition::Empty(lhs))
            }
            Some(t) if t.is_kw("exists") => {
                self.pos += 1;
                Ok(Condition::Exists(lhs))
            }
            _ => Ok(Condition::Truthy(lhs)),
        }
    }

    fn operand(&mut self) -> Result<Operand, ScriptError> {
        let tok = match self.peek() {
            Some(t) => t,
            None => return Err(ScriptError::syntax("expected a condition operand")),
        };

        match tok.kind {
            TokenKind::Number => {
                self.pos += 1;
                let n = tok
                    .lexeme
                    .parse::<f64>()
                    .map_err(|_| ScriptError::syntax(format!("invalid number '{}'", tok.lexeme)))?;
                Ok(Operand::Literal(Value::Number(n)))
            }
            TokenKind::Str => {
                self.pos += 1;
                Ok(Operand::Literal(Value::Str(tok.lexeme.clone())))
            }
            TokenKind::Variable => {
                self.pos += 1;
                let name = tok.lexeme.clone();
                if let Some(index) = self.try_index()? {
                    Ok(Operand::Index { var: name, index })
                } else {
                    Ok(Operand::Var(name))
                }
            }
            TokenKind::Keyword if tok.lexeme == "status" => {
                self.pos += 1;
                Ok(Operand::Status)
            }
            TokenKind::Keyword if tok.lexeme == "response" => {
                self.pos += 1;
                Ok(Operand::Response)
            }
            _ => Err(self.unexpected("expected a condition operand")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    fn stmt(src: &str) -> Stmt {
        parse_statement(&tokenize(src).unwrap()).unwrap()
    }

    fn cond(src: &str) -> Condition {
        parse_condition(&tokenize(src).unwrap()).unwrap()
    }

    #[test]
    fn test_request_with_chained_options() {
        let s = stmt(r#"GET "http://host/x" header "A" "1" header "B" "2" timeout 5 s"#);
        match s {
            Stmt::Request {
                method,
                url,
                options,
            } => {
                assert_eq!(method, Method::Get);
                assert_eq!(url, UrlSpec::Literal("http://host/x".into()));
                assert_eq!(
                    options.headers,
                    vec![("A".into(), "1".into()), ("B".into(), "2".into())]
                );
                assert_eq!(options.timeout_ms, Some(5000));
            }
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_request_json_inline_and_auth() {
        let s = stmt(r#"POST "http://h/login" json {"u":"a","p":"b"} auth bearer "tok""#);
        match s {
            Stmt::Request { options, .. } => {
                assert_eq!(options.json.as_deref(), Some(r#"{"u":"a","p":"b"}"#));
                assert_eq!(options.auth, Some(Auth::Bearer("tok".into())));
            }
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_request_url_variable() {
        match stmt(r#"GET $endpoint"#) {
            Stmt::Request { url, .. } => assert_eq!(url, UrlSpec::Var("endpoint".into())),
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_set_arithmetic_left_associative() {
        // 10 - 2 - 3 must parse as (10 - 2) - 3
        match stmt("set $y 10 - 2 - 3") {
            Stmt::Set { expr, .. } => match expr {
                Expr::Binary { lhs, op, .. } => {
                    assert_eq!(op, ArithOp::Sub);
                    assert!(matches!(*lhs, Expr::Binary { .. }));
                }
                other => panic!("expected binary, got {:?}", other),
            },
            other => panic!("expected set, got {:?}", other),
        }
    }

    #[test]
    fn test_set_array_literal() {
        match stmt(r#"set $x ["a", "b", "c"]"#) {
            Stmt::Set { expr, .. } => assert_eq!(
                expr,
                Expr::Literal(Value::Array(vec![
                    Value::Str("a".into()),
                    Value::Str("b".into()),
                    Value::Str("c".into()),
                ]))
            ),
            other => panic!("expected set, got {:?}", other),
        }
    }

    #[test]
    fn test_set_array_access_and_functions() {
        assert_eq!(
            stmt("set $first $x[0]"),
            Stmt::Set {
                name: "first".into(),
                expr: Expr::Index {
                    var: "x".into(),
                    index: IndexKey::Number(0)
                }
            }
        );
        assert_eq!(
            stmt("set $n length $x"),
            Stmt::Set {
                name: "n".into(),
                expr: Expr::Length("x".into())
            }
        );
        assert_eq!(
            stmt(r#"set $parts split $csv ",""#),
            Stmt::Set {
                name: "parts".into(),
                expr: Expr::Split {
                    var: "csv".into(),
                    sep: ",".into()
                }
            }
        );
    }

    #[test]
    fn test_extract_forms() {
        assert_eq!(
            stmt("extract status as $code"),
            Stmt::Extract {
                kind: ExtractKind::Status,
                pattern: None,
                var: "code".into()
            }
        );
        assert_eq!(
            stmt(r#"extract jsonpath "$.user.id" as $id"#),
            Stmt::Extract {
                kind: ExtractKind::JsonPath,
                pattern: Some("$.user.id".into()),
                var: "id".into()
            }
        );
        assert!(parse_statement(&tokenize("extract jsonpath as $v").unwrap()).is_err());
    }

    #[test]
    fn test_assertions() {
        assert_eq!(
            stmt("assert status 200"),
            Stmt::Assert(Assertion::Status(200))
        );
        assert_eq!(
            stmt("assert time less 500 ms"),
            Stmt::Assert(Assertion::TimeLess(500))
        );
        assert_eq!(
            stmt(r#"expect response contains "ok""#),
            Stmt::Assert(Assertion::ResponseContains("ok".into()))
        );
    }

    #[test]
    fn test_if_inline_with_else() {
        match stmt(r#"if 5 > 3 then set $a "Y" else set $a "N""#) {
            Stmt::IfInline {
                cond,
                then_branch,
                else_branch,
            } => {
                assert!(matches!(cond, Condition::Cmp { .. }));
                assert!(matches!(*then_branch, Stmt::Set { .. }));
                assert!(else_branch.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_condition_precedence_and_tighter_than_or() {
        // a or b and c  =>  a or (b and c)
        match cond("$a == 1 or $b == 2 and $c == 3") {
            Condition::Or(_, rhs) => assert!(matches!(*rhs, Condition::And(_, _))),
            other => panic!("expected or at the root, got {:?}", other),
        }
    }

    #[test]
    fn test_condition_forms() {
        assert!(matches!(cond("$x contains \"a\""), Condition::Contains { .. }));
        assert!(matches!(cond("$x matches \"^a+$\""), Condition::Matches { .. }));
        assert!(matches!(cond("$x empty"), Condition::Empty(_)));
        assert!(matches!(cond("$x exists"), Condition::Exists(_)));
        assert!(matches!(cond("not $x exists"), Condition::Not(_)));
        assert!(matches!(
            cond("status == 200"),
            Condition::Cmp {
                lhs: Operand::Status,
                ..
            }
        ));
        assert!(matches!(
            cond("response contains \"ok\""),
            Condition::Contains {
                lhs: Operand::Response,
                ..
            }
        ));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse_statement(&tokenize("reset reset").unwrap()).is_err());
    }

    #[test]
    fn test_unknown_statement_rejected() {
        let err = parse_statement(&tokenize("frobnicate $x").unwrap()).unwrap_err();
        assert!(matches!(err, ScriptError::Syntax(_)));
    }
}
