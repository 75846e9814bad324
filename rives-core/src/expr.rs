//! Sandboxed arithmetic interpreter for rule score functions.
//!
//! Expressions reference fields of the outcard JSON document by name
//! (`score`, `stats.kills`, `levels[0]`). Supported: number, string and
//! boolean literals; `+ - * / % ^`; string concatenation `||`; comparisons
//! `== != < <= > >=`; `and`, `or`, `not`; the ternary `?:`; and the pure
//! functions `abs ceil floor round trunc sqrt min max`. Nothing else is
//! reachable from an expression.

use serde_json::Value as Json;

#[derive(Clone, Debug, PartialEq)]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Str(String),
    /// Objects, arrays and null pass through untouched until a scalar is needed.
    Json(Json),
}

impl Value {
    fn from_json(json: &Json) -> Self {
        match json {
            Json::Number(n) => n.as_f64().map_or(Self::Json(json.clone()), Self::Number),
            Json::Bool(b) => Self::Bool(*b),
            Json::String(s) => Self::Str(s.clone()),
            other => Self::Json(other.clone()),
        }
    }

    fn as_number(&self) -> Result<f64, EvalError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Self::Str(s) => Err(EvalError::new(format!("expected a number, found string {s:?}"))),
            Self::Json(json) => Err(EvalError::new(format!("expected a number, found {json}"))),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Bool(b) => *b,
            Self::Str(s) => !s.is_empty(),
            Self::Json(json) => !json.is_null(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Str(s) => s.clone(),
            Self::Json(json) => json.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Var(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call { name: String, args: Vec<Expr> },
    Unary(UnaryOp, Box<Expr>),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

const FUNCTIONS: &[&str] = &["abs", "ceil", "floor", "round", "trunc", "sqrt", "min", "max"];

/// Bounds parser recursion and, through the token cap, the depth of the
/// tree that `evaluate` walks.
const MAX_DEPTH: usize = 64;
const MAX_TOKENS: usize = 1024;

/// Parses `source`. A blank expression yields `Ok(None)`.
pub fn parse(source: &str) -> Result<Option<Expr>, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    if matches!(tokens.first(), Some((Token::End, _))) {
        return Ok(None);
    }
    if let Some((_, position)) = tokens.get(MAX_TOKENS) {
        return Err(ParseError {
            position: *position,
            message: format!("expression longer than {MAX_TOKENS} tokens"),
        });
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_conditional()?;
    parser.expect_end()?;
    Ok(Some(expr))
}

pub fn evaluate(expr: &Expr, bindings: &Json) -> Result<Value, EvalError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Var(name) => bindings
            .get(name)
            .map(Value::from_json)
            .ok_or_else(|| EvalError::new(format!("undefined variable: {name}"))),
        Expr::Member(target, field) => match evaluate(target, bindings)? {
            Value::Json(json) => json
                .get(field)
                .map(Value::from_json)
                .ok_or_else(|| EvalError::new(format!("undefined member: {field}"))),
            other => Err(EvalError::new(format!(
                "cannot read member {field} of {}",
                other.describe()
            ))),
        },
        Expr::Index(target, index) => {
            let target = evaluate(target, bindings)?;
            let index = evaluate(index, bindings)?;
            let json = match target {
                Value::Json(json) => json,
                other => return Err(EvalError::new(format!("cannot index {}", other.describe()))),
            };
            let found = match index {
                Value::Str(key) => json.get(&key),
                other => {
                    let n = other.as_number()?;
                    if n < 0.0 || n.fract() != 0.0 {
                        return Err(EvalError::new(format!("invalid index: {n}")));
                    }
                    json.get(n as usize)
                }
            };
            found
                .map(Value::from_json)
                .ok_or_else(|| EvalError::new("index out of bounds"))
        }
        Expr::Call { name, args } => {
            let values = args
                .iter()
                .map(|arg| evaluate(arg, bindings)?.as_number())
                .collect::<Result<Vec<_>, _>>()?;
            call_function(name, &values).map(Value::Number)
        }
        Expr::Unary(op, inner) => {
            let value = evaluate(inner, bindings)?;
            match op {
                UnaryOp::Neg => Ok(Value::Number(-value.as_number()?)),
                UnaryOp::Plus => Ok(Value::Number(value.as_number()?)),
                UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
            }
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, bindings)?;
            match op {
                BinOp::And if !left.truthy() => return Ok(Value::Bool(false)),
                BinOp::Or if left.truthy() => return Ok(Value::Bool(true)),
                _ => {}
            }
            let right = evaluate(right, bindings)?;
            apply_binary(*op, left, right)
        }
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => {
            if evaluate(cond, bindings)?.truthy() {
                evaluate(then, bindings)
            } else {
                evaluate(otherwise, bindings)
            }
        }
    }
}

fn apply_binary(op: BinOp, left: Value, right: Value) -> Result<Value, EvalError> {
    let value = match op {
        BinOp::Add => Value::Number(left.as_number()? + right.as_number()?),
        BinOp::Sub => Value::Number(left.as_number()? - right.as_number()?),
        BinOp::Mul => Value::Number(left.as_number()? * right.as_number()?),
        BinOp::Div => Value::Number(left.as_number()? / right.as_number()?),
        BinOp::Rem => Value::Number(left.as_number()? % right.as_number()?),
        BinOp::Pow => Value::Number(left.as_number()?.powf(right.as_number()?)),
        BinOp::Concat => Value::Str(format!("{}{}", left.describe(), right.describe())),
        BinOp::Eq => Value::Bool(strict_equals(&left, &right)),
        BinOp::Ne => Value::Bool(!strict_equals(&left, &right)),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = match (&left, &right) {
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => left.as_number()?.partial_cmp(&right.as_number()?),
            };
            let holds = ordering.is_some_and(|ordering| match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            });
            Value::Bool(holds)
        }
        BinOp::And | BinOp::Or => Value::Bool(right.truthy()),
    };
    Ok(value)
}

fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Json(a), Value::Json(b)) => a.is_null() && b.is_null(),
        _ => false,
    }
}

fn call_function(name: &str, args: &[f64]) -> Result<f64, EvalError> {
    let single = || match args {
        [value] => Ok(*value),
        _ => Err(EvalError::new(format!(
            "{name} expects 1 argument, got {}",
            args.len()
        ))),
    };
    match name {
        "abs" => Ok(single()?.abs()),
        "ceil" => Ok(single()?.ceil()),
        "floor" => Ok(single()?.floor()),
        // JS Math.round: halves round towards +infinity
        "round" => Ok((single()? + 0.5).floor()),
        "trunc" => Ok(single()?.trunc()),
        "sqrt" => Ok(single()?.sqrt()),
        "min" | "max" => {
            if args.is_empty() {
                return Err(EvalError::new(format!("{name} expects at least 1 argument")));
            }
            let pick: fn(f64, f64) -> f64 = if name == "min" { f64::min } else { f64::max };
            Ok(args[1..].iter().fold(args[0], |acc, v| pick(acc, *v)))
        }
        _ => Err(EvalError::new(format!("unknown function: {name}"))),
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Str(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Concat,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Question,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    End,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_ws();
            let start = self.pos;
            let token = self.next_token()?;
            let done = token == Token::End;
            tokens.push((token, start));
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        let Some(ch) = self.peek() else {
            return Ok(Token::End);
        };
        if ch.is_ascii_digit() || (ch == '.' && self.peek_n(1).is_some_and(|c| c.is_ascii_digit()))
        {
            return self.read_number();
        }
        if ch.is_ascii_alphabetic() || ch == '_' || ch == '$' {
            return Ok(self.read_ident());
        }
        if ch == '"' || ch == '\'' {
            return self.read_string(ch);
        }

        let two = (ch, self.peek_n(1));
        let (token, width) = match two {
            ('|', Some('|')) => (Token::Concat, 2),
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('^', _) => (Token::Caret, 1),
            ('?', _) => (Token::Question, 1),
            (':', _) => (Token::Colon, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('.', _) => (Token::Dot, 1),
            (',', _) => (Token::Comma, 1),
            _ => return Err(self.error(format!("unexpected character {ch:?}"))),
        };
        self.pos += width;
        Ok(token)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn read_number(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        self.eat_digits();
        if self.peek() == Some('.') {
            self.pos += 1;
            self.eat_digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some('+' | '-')) {
                self.pos += 1;
            }
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.eat_digits();
            } else {
                self.pos = mark;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ParseError {
                position: start,
                message: format!("invalid number {text:?}"),
            })
    }

    fn eat_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    fn read_ident(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        {
            self.pos += 1;
        }
        Token::Ident(self.chars[start..self.pos].iter().collect())
    }

    fn read_string(&mut self, quote: char) -> Result<Token, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            self.pos += 1;
            match ch {
                c if c == quote => return Ok(Token::Str(text)),
                '\\' => {
                    let escaped = self.peek().ok_or_else(|| ParseError {
                        position: start,
                        message: "unterminated string".to_string(),
                    })?;
                    self.pos += 1;
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                other => text.push(other),
            }
        }
        Err(ParseError {
            position: start,
            message: "unterminated string".to_string(),
        })
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_n(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn error(&self, message: String) -> ParseError {
        ParseError {
            position: self.pos,
            message,
        }
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::parse_conditional_inner)
    }

    fn parse_conditional_inner(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_or()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.parse_conditional()?;
        self.expect(&Token::Colon, "expected ':'")?;
        let otherwise = self.parse_conditional()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            expr = binary(BinOp::Or, expr, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_comparison()?;
        while self.eat_keyword("and") {
            let right = self.parse_comparison()?;
            expr = binary(BinOp::And, expr, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinOp::Eq,
                Token::NotEq => BinOp::Ne,
                Token::Lt => BinOp::Lt,
                Token::Le => BinOp::Le,
                Token::Gt => BinOp::Gt,
                Token::Ge => BinOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                Token::Concat => BinOp::Concat,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    // Unary operators bind looser than `^`: -2^2 == -4.
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Token::Minus => Some(UnaryOp::Neg),
            Token::Plus => Some(UnaryOp::Plus),
            Token::Ident(name) if name == "not" => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let inner = self.nested(Self::parse_unary)?;
            return Ok(Expr::Unary(op, Box::new(inner)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_postfix()?;
        if self.eat(&Token::Caret) {
            let exponent = self.nested(Self::parse_unary)?;
            return Ok(binary(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Token::Dot) {
                match self.peek().clone() {
                    Token::Ident(field) => {
                        self.pos += 1;
                        expr = Expr::Member(Box::new(expr), field);
                    }
                    _ => return Err(self.error("expected member name after '.'")),
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_conditional()?;
                self.expect(&Token::RBracket, "expected ']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            Token::Number(value) => {
                self.pos += 1;
                Ok(Expr::Number(value))
            }
            Token::Str(value) => {
                self.pos += 1;
                Ok(Expr::Str(value))
            }
            Token::Ident(name) => {
                let start = self.position();
                self.pos += 1;
                match name.as_str() {
                    "true" => return Ok(Expr::Bool(true)),
                    "false" => return Ok(Expr::Bool(false)),
                    "and" | "or" | "not" => {
                        self.pos -= 1;
                        return Err(self.error(format!("unexpected keyword {name:?}")));
                    }
                    _ => {}
                }
                if *self.peek() == Token::LParen {
                    return self.parse_call(name, start);
                }
                Ok(Expr::Var(name))
            }
            Token::LParen => {
                self.pos += 1;
                let expr = self.parse_conditional()?;
                self.expect(&Token::RParen, "expected ')'")?;
                Ok(expr)
            }
            Token::End => Err(self.error("unexpected end of expression")),
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_call(&mut self, name: String, start: usize) -> Result<Expr, ParseError> {
        if !FUNCTIONS.contains(&name.as_str()) {
            return Err(ParseError {
                position: start,
                message: format!("unknown function {name:?}"),
            });
        }
        self.pos += 1;
        let mut args = Vec::new();
        if *self.peek() != Token::RParen {
            loop {
                args.push(self.parse_conditional()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen, "expected ')'")?;
        Ok(Expr::Call { name, args })
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        match self.peek() {
            Token::End => Ok(()),
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }

    fn expect(&mut self, token: &Token, message: &str) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Token::Ident(name) if name == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::End, |(token, _)| token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |(_, position)| *position)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            position: self.position(),
            message: message.into(),
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(source: &str, bindings: Json) -> Value {
        let expr = parse(source).unwrap().expect("expression");
        evaluate(&expr, &bindings).unwrap()
    }

    fn number(source: &str) -> f64 {
        match eval(source, json!({})) {
            Value::Number(n) => n,
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(number("1 + 2 * 3"), 7.0);
        assert_eq!(number("(1 + 2) * 3"), 9.0);
        assert_eq!(number("10 - 4 - 3"), 3.0);
        assert_eq!(number("2 ^ 3 ^ 2"), 512.0);
        assert_eq!(number("-2 ^ 2"), -4.0);
        assert_eq!(number("7 % 4"), 3.0);
        assert_eq!(number("1.5e2 / 3"), 50.0);
        assert_eq!(number(".5 + .25"), 0.75);
    }

    #[test]
    fn variables_members_and_indexes() {
        let bindings = json!({"score": 40, "stats": {"kills": 3}, "levels": [5, 6]});
        assert_eq!(eval("score + stats.kills", bindings.clone()), Value::Number(43.0));
        assert_eq!(eval("levels[1] * 2", bindings.clone()), Value::Number(12.0));
        assert_eq!(eval("stats[\"kills\"]", bindings), Value::Number(3.0));
    }

    #[test]
    fn comparisons_and_logic() {
        let bindings = json!({"a": 2, "b": 3, "name": "x", "done": true});
        assert_eq!(eval("a < b", bindings.clone()), Value::Bool(true));
        assert_eq!(eval("a >= b or done", bindings.clone()), Value::Bool(true));
        assert_eq!(eval("a == 2 and not done", bindings.clone()), Value::Bool(false));
        assert_eq!(eval("name == 'x'", bindings.clone()), Value::Bool(true));
        assert_eq!(eval("a != '2'", bindings.clone()), Value::Bool(true));
        assert_eq!(eval("done ? a * 10 : b", bindings), Value::Number(20.0));
    }

    #[test]
    fn functions() {
        assert_eq!(number("max(1, 7, 3) + min(4, 2)"), 9.0);
        assert_eq!(number("abs(-3) + floor(2.7) + ceil(0.2)"), 6.0);
        assert_eq!(number("round(2.5) + round(-2.5) + trunc(-1.9)"), 0.0);
        assert_eq!(number("sqrt(16)"), 4.0);
    }

    #[test]
    fn short_circuit_skips_undefined_right_side() {
        assert_eq!(eval("false and missing", json!({})), Value::Bool(false));
        assert_eq!(eval("true or missing", json!({})), Value::Bool(true));
    }

    #[test]
    fn blank_source_has_no_expression() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   \n").unwrap(), None);
    }

    #[test]
    fn parse_errors_report_position() {
        let err = parse("a + * b").unwrap_err();
        assert_eq!(err.position, 4);

        let err = parse("(a + b").unwrap_err();
        assert!(err.message.contains("')'"));

        assert!(parse("a b").is_err());
        assert!(parse("a # b").is_err());
        assert!(parse("'open").is_err());
        assert!(parse("eval(1)").is_err());
    }

    #[test]
    fn evaluation_errors() {
        let expr = parse("missing + 1").unwrap().unwrap();
        let err = evaluate(&expr, &json!({})).unwrap_err();
        assert!(err.message.contains("undefined variable: missing"));

        let expr = parse("name * 2").unwrap().unwrap();
        assert!(evaluate(&expr, &json!({"name": "x"})).is_err());

        let expr = parse("items[5]").unwrap().unwrap();
        assert!(evaluate(&expr, &json!({"items": [1]})).is_err());

        let expr = parse("abs(1, 2)").unwrap().unwrap();
        assert!(evaluate(&expr, &json!({})).is_err());
    }

    #[test]
    fn deep_nesting_is_rejected() {
        for depth in [100, 500] {
            let parens = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
            let err = parse(&parens).unwrap_err();
            assert!(err.message.contains("nested too deeply"), "{err:?}");

            let negations = format!("{}1", "-".repeat(depth));
            let err = parse(&negations).unwrap_err();
            assert!(err.message.contains("nested too deeply"), "{err:?}");

            let powers = vec!["2"; depth].join(" ^ ");
            let err = parse(&powers).unwrap_err();
            assert!(err.message.contains("nested too deeply"), "{err:?}");
        }

        for depth in [2_000, 5_000, 10_000] {
            let parens = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
            assert!(parse(&parens).is_err());
            assert!(parse(&"not ".repeat(depth)).is_err());
        }

        let shallow = format!("{}1{}", "(".repeat(32), ")".repeat(32));
        assert_eq!(number(&shallow), 1.0);
    }

    #[test]
    fn long_expressions_are_rejected() {
        let sum = vec!["1"; 600].join(" + ");
        let err = parse(&sum).unwrap_err();
        assert!(err.message.contains("tokens"));

        let sum = vec!["1"; 400].join(" + ");
        assert_eq!(number(&sum), 400.0);
    }
}
