//! Arithmetic combination formulas over response names
//!
//! A small expression grammar: numbers, identifiers, `+ - * /`, unary
//! minus and parentheses. Formulas are parsed once, bound to an ordered
//! list of variable names, and evaluated per cell.
//!
//! Example formulas:
//! - `"bio1 * bio12"`
//! - `"2 * bio1 + bio12"`
//! - `"(bio1 + bio5) / 2 * bio12"`

use virtualspecies_core::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    Var(String),
    BinOp {
        op: char,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Neg(Box<Expr>),
}

fn formula_error(reason: impl Into<String>) -> Error {
    Error::config("formula", reason)
}

fn tokenize(formula: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = formula.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            c if c.is_whitespace() => i += 1,
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(chars[i]));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Exponent part: 1e-3, 2.5E4
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let num_str: String = chars[start..i].iter().collect();
                let num = num_str
                    .parse::<f64>()
                    .map_err(|_| formula_error(format!("invalid number '{}'", num_str)))?;
                tokens.push(Token::Number(num));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            c => {
                return Err(formula_error(format!("unexpected character '{}'", c)));
            }
        }
    }

    Ok(tokens)
}

/// Recursive descent parser
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    /// expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_term()?;

        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            let op = *op;
            self.advance();
            let right = self.parse_term()?;
            left = Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// term = factor (('*' | '/') factor)*
    fn parse_term(&mut self) -> Result<Expr> {
        let mut left = self.parse_factor()?;

        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek() {
            let op = *op;
            self.advance();
            let right = self.parse_factor()?;
            left = Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// factor = number | ident | '(' expr ')' | ('-' | '+') factor
    fn parse_factor(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Num(n)),
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::LParen) => {
                let expr = self.parse_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(expr),
                    _ => Err(formula_error("expected closing parenthesis")),
                }
            }
            Some(Token::Op('-')) => Ok(Expr::Neg(Box::new(self.parse_factor()?))),
            Some(Token::Op('+')) => self.parse_factor(),
            Some(other) => Err(formula_error(format!("unexpected token {:?}", other))),
            None => Err(formula_error("unexpected end of formula")),
        }
    }
}

/// A parsed combination formula
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(formula: &str) -> Result<Self> {
        let tokens = tokenize(formula)?;
        if tokens.is_empty() {
            return Err(formula_error("formula is empty"));
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_expr()?;
        if let Some(extra) = parser.peek() {
            return Err(formula_error(format!("unexpected trailing token {:?}", extra)));
        }
        Ok(Self {
            source: formula.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Free variables, in first-occurrence order
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_vars(&self.expr, &mut names);
        names
    }

    /// Bind to an ordered list of names.
    ///
    /// The formula's free variables must be exactly `names`.
    pub fn bind(&self, names: &[&str]) -> Result<BoundFormula> {
        let vars = self.variables();
        let missing: Vec<&str> = names.iter().copied().filter(|n| !vars.iter().any(|v| v == n)).collect();
        let unknown: Vec<&str> = vars
            .iter()
            .map(String::as_str)
            .filter(|v| !names.contains(v))
            .collect();
        if !missing.is_empty() || !unknown.is_empty() {
            return Err(formula_error(format!(
                "variables of '{}' must match the responses exactly (missing: {:?}, unknown: {:?})",
                self.source, missing, unknown
            )));
        }
        Ok(BoundFormula {
            program: compile(&self.expr, names),
        })
    }
}

fn collect_vars(expr: &Expr, names: &mut Vec<String>) {
    match expr {
        Expr::Var(name) => {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        Expr::BinOp { left, right, .. } => {
            collect_vars(left, names);
            collect_vars(right, names);
        }
        Expr::Neg(inner) => collect_vars(inner, names),
        Expr::Num(_) => {}
    }
}

/// Expression with variables resolved to positions
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Num(f64),
    Var(usize),
    BinOp {
        op: char,
        left: Box<Node>,
        right: Box<Node>,
    },
    Neg(Box<Node>),
}

fn compile(expr: &Expr, names: &[&str]) -> Node {
    match expr {
        Expr::Num(n) => Node::Num(*n),
        // bind() guarantees every variable is in `names`
        Expr::Var(name) => Node::Var(names.iter().position(|n| n == name).unwrap_or(usize::MAX)),
        Expr::BinOp { op, left, right } => Node::BinOp {
            op: *op,
            left: Box::new(compile(left, names)),
            right: Box::new(compile(right, names)),
        },
        Expr::Neg(inner) => Node::Neg(Box::new(compile(inner, names))),
    }
}

/// Formula bound to variable positions
#[derive(Debug, Clone, PartialEq)]
pub struct BoundFormula {
    program: Node,
}

impl BoundFormula {
    /// Evaluate with one value per bound name. Division by zero yields NaN.
    pub fn eval(&self, values: &[f64]) -> f64 {
        eval(&self.program, values)
    }
}

fn eval(node: &Node, values: &[f64]) -> f64 {
    match node {
        Node::Num(n) => *n,
        Node::Var(i) => values.get(*i).copied().unwrap_or(f64::NAN),
        Node::BinOp { op, left, right } => {
            let l = eval(left, values);
            let r = eval(right, values);
            match op {
                '+' => l + r,
                '-' => l - r,
                '*' => l * r,
                '/' => {
                    if r == 0.0 {
                        f64::NAN
                    } else {
                        l / r
                    }
                }
                _ => f64::NAN,
            }
        }
        Node::Neg(inner) => -eval(inner, values),
    }
}
