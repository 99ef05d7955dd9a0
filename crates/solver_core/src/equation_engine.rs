use crate::error::{EvalFailure, SolverError};
use crate::traits::Scalar;
use std::collections::HashMap;

/// Elementary functions callable from an equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Log10,
    Log2,
    Sqrt,
    Cbrt,
    Abs,
    Floor,
    Ceil,
    Signum,
    Pow,
    Atan2,
}

impl Function {
    /// Resolves a function name as written in an equation. `log` is the natural logarithm.
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name {
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "asin" => Function::Asin,
            "acos" => Function::Acos,
            "atan" => Function::Atan,
            "sinh" => Function::Sinh,
            "cosh" => Function::Cosh,
            "tanh" => Function::Tanh,
            "exp" => Function::Exp,
            "log" | "ln" => Function::Ln,
            "log10" => Function::Log10,
            "log2" => Function::Log2,
            "sqrt" => Function::Sqrt,
            "cbrt" => Function::Cbrt,
            "abs" => Function::Abs,
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "signum" => Function::Signum,
            "pow" => Function::Pow,
            "atan2" => Function::Atan2,
            _ => return None,
        };
        Some(function)
    }

    pub fn arity(self) -> usize {
        match self {
            Function::Pow | Function::Atan2 => 2,
            _ => 1,
        }
    }

    fn apply<T: Scalar>(self, args: &[T]) -> T {
        let a = args[0];
        match self {
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Asin => a.asin(),
            Function::Acos => a.acos(),
            Function::Atan => a.atan(),
            Function::Sinh => a.sinh(),
            Function::Cosh => a.cosh(),
            Function::Tanh => a.tanh(),
            Function::Exp => a.exp(),
            Function::Ln => a.ln(),
            Function::Log10 => a.log10(),
            Function::Log2 => a.log2(),
            Function::Sqrt => a.sqrt(),
            Function::Cbrt => a.cbrt(),
            Function::Abs => a.abs(),
            Function::Floor => a.floor(),
            Function::Ceil => a.ceil(),
            Function::Signum => {
                if a.is_zero() {
                    a
                } else {
                    a.signum()
                }
            }
            Function::Pow => a.powf(args[1]),
            Function::Atan2 => a.atan2(args[1]),
        }
    }
}

/// OpCodes for the Stack-based Virtual Machine.
/// The VM operates on a stack of `Scalar` values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant `f64` value onto the stack.
    LoadConst(f64),
    /// Pushes the value of a bound variable (by index) onto the stack.
    /// Indices correspond to the order variables were bound (0=x, 1=y0, ...).
    LoadVar(usize),
    /// Pops top two values (b, a), pushes (a + b).
    Add,
    /// Pops top two values (b, a), pushes (a - b).
    Sub,
    /// Pops top two values (b, a), pushes (a * b).
    Mul,
    /// Pops top two values (b, a), pushes (a / b). Fails if b is zero.
    Div,
    /// Pops top two values (b, a), pushes (a % b). Fails if b is zero.
    Rem,
    /// Pops top two values (b, a), pushes (a ^ b).
    Pow,
    /// Pops top value (a), pushes -a.
    Neg,
    /// Pops `arity` arguments, pushes the function result.
    Call(Function),
}

/// Represents a compiled sequence of operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
    /// Deepest stack the program reaches; evaluation preallocates this much.
    pub max_stack: usize,
    /// Number of variable bindings the program expects.
    pub var_count: usize,
}

/// Stack-based Virtual Machine for evaluating equations.
///
/// The VM is stateless; `execute` takes all necessary context:
/// - `bytecode`: Instructions to run.
/// - `vars`: Variable bindings (read-only).
/// - `stack`: A mutable buffer for intermediate computations.
///
/// Every intermediate value is checked, so a non-finite number never leaks
/// out of an evaluation.
pub struct VM;

impl VM {
    pub fn execute<T: Scalar>(
        bytecode: &Bytecode,
        vars: &[T],
        stack: &mut Vec<T>,
    ) -> Result<T, EvalFailure> {
        if vars.len() != bytecode.var_count {
            return Err(EvalFailure::BindingCount {
                expected: bytecode.var_count,
                got: vars.len(),
            });
        }
        stack.clear();

        for op in &bytecode.ops {
            let value = match *op {
                OpCode::LoadConst(val) => T::constant(val),
                OpCode::LoadVar(idx) => vars[idx],
                OpCode::Add => {
                    let (a, b) = pop_pair(stack)?;
                    a + b
                }
                OpCode::Sub => {
                    let (a, b) = pop_pair(stack)?;
                    a - b
                }
                OpCode::Mul => {
                    let (a, b) = pop_pair(stack)?;
                    a * b
                }
                OpCode::Div => {
                    let (a, b) = pop_pair(stack)?;
                    if b.is_zero() {
                        return Err(EvalFailure::DivisionByZero);
                    }
                    a / b
                }
                OpCode::Rem => {
                    let (a, b) = pop_pair(stack)?;
                    if b.is_zero() {
                        return Err(EvalFailure::DivisionByZero);
                    }
                    a % b
                }
                OpCode::Pow => {
                    let (a, b) = pop_pair(stack)?;
                    a.powf(b)
                }
                OpCode::Neg => -stack.pop().ok_or(EvalFailure::StackUnderflow)?,
                OpCode::Call(function) => {
                    let arity = function.arity();
                    if stack.len() < arity {
                        return Err(EvalFailure::StackUnderflow);
                    }
                    let base = stack.len() - arity;
                    let value = function.apply(&stack[base..]);
                    stack.truncate(base);
                    value
                }
            };
            if !value.is_finite() {
                return Err(EvalFailure::NonFinite(value.to_f64().unwrap_or(f64::NAN)));
            }
            stack.push(value);
        }

        let result = stack.pop().ok_or(EvalFailure::StackUnderflow)?;
        if !stack.is_empty() {
            return Err(EvalFailure::StackUnderflow);
        }
        Ok(result)
    }
}

fn pop_pair<T: Scalar>(stack: &mut Vec<T>) -> Result<(T, T), EvalFailure> {
    let b = stack.pop().ok_or(EvalFailure::StackUnderflow)?;
    let a = stack.pop().ok_or(EvalFailure::StackUnderflow)?;
    Ok((a, b))
}

// --- AST & Parser ---

/// Abstract Syntax Tree nodes for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, char, Box<Expr>), // char is operator +, -, *, /, %, ^
    Unary(char, Box<Expr>),             // -
    Call(Function, Vec<Expr>),
}

/// Reasons the compiler rejects a syntactically valid expression.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    UnboundVariable(String),
}

/// Compiles an AST (`Expr`) into `Bytecode`.
/// Resolves variable names to binding indices; `pi` and `e` are constants
/// unless shadowed by a binding.
pub struct Compiler {
    pub var_map: HashMap<String, usize>,
    var_count: usize,
}

impl Compiler {
    pub fn new(var_names: &[String]) -> Self {
        let var_map = var_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            var_map,
            var_count: var_names.len(),
        }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode, CompileError> {
        let mut ops = Vec::new();
        let mut depth = 0;
        let mut max_stack = 0;
        self.compile_recursive(expr, &mut ops, &mut depth, &mut max_stack)?;
        Ok(Bytecode {
            ops,
            max_stack,
            var_count: self.var_count,
        })
    }

    fn compile_recursive(
        &self,
        expr: &Expr,
        ops: &mut Vec<OpCode>,
        depth: &mut usize,
        max_stack: &mut usize,
    ) -> Result<(), CompileError> {
        match expr {
            Expr::Number(n) => push_load(ops, OpCode::LoadConst(*n), depth, max_stack),
            Expr::Variable(name) => {
                let op = if let Some(&idx) = self.var_map.get(name) {
                    OpCode::LoadVar(idx)
                } else {
                    match name.as_str() {
                        "pi" => OpCode::LoadConst(std::f64::consts::PI),
                        "e" => OpCode::LoadConst(std::f64::consts::E),
                        _ => return Err(CompileError::UnboundVariable(name.clone())),
                    }
                };
                push_load(ops, op, depth, max_stack);
            }
            Expr::Binary(left, op, right) => {
                self.compile_recursive(left, ops, depth, max_stack)?;
                self.compile_recursive(right, ops, depth, max_stack)?;
                let code = match op {
                    '+' => OpCode::Add,
                    '-' => OpCode::Sub,
                    '*' => OpCode::Mul,
                    '/' => OpCode::Div,
                    '%' => OpCode::Rem,
                    _ => OpCode::Pow,
                };
                ops.push(code);
                *depth -= 1;
            }
            Expr::Unary(_, operand) => {
                self.compile_recursive(operand, ops, depth, max_stack)?;
                ops.push(OpCode::Neg);
            }
            Expr::Call(function, args) => {
                for arg in args {
                    self.compile_recursive(arg, ops, depth, max_stack)?;
                }
                ops.push(OpCode::Call(*function));
                *depth = *depth + 1 - args.len();
            }
        }
        Ok(())
    }
}

fn push_load(ops: &mut Vec<OpCode>, op: OpCode, depth: &mut usize, max_stack: &mut usize) {
    ops.push(op);
    *depth += 1;
    *max_stack = (*max_stack).max(*depth);
}

/// A syntax error with the byte offset where it was detected.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub position: usize,
    pub message: String,
}

impl SyntaxError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Parses a string expression into an AST.
pub fn parse(input: &str) -> Result<Expr, SyntaxError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
    };
    let expr = parser.parse_expression()?;
    if let Some((token, position)) = parser.peek_spanned() {
        return Err(SyntaxError::new(
            position,
            format!("unexpected {}", token.describe()),
        ));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Identifier(name) => format!("identifier `{name}`"),
            Token::Plus => "`+`".to_string(),
            Token::Minus => "`-`".to_string(),
            Token::Star => "`*`".to_string(),
            Token::Slash => "`/`".to_string(),
            Token::Percent => "`%`".to_string(),
            Token::Caret => "`^`".to_string(),
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::Comma => "`,`".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut end = start;
            let mut seen_exponent = false;
            while let Some(&(idx, d)) = chars.peek() {
                if d.is_ascii_digit() || (d == '.' && !seen_exponent) {
                    end = idx + 1;
                    chars.next();
                } else if (d == 'e' || d == 'E')
                    && !seen_exponent
                    && has_exponent_digits(&input[idx + 1..])
                {
                    seen_exponent = true;
                    chars.next();
                    if let Some(&(sign_idx, sign)) = chars.peek() {
                        if sign == '+' || sign == '-' {
                            end = sign_idx + 1;
                            chars.next();
                        }
                    }
                } else {
                    break;
                }
            }
            let literal = &input[start..end];
            let value = literal
                .parse::<f64>()
                .map_err(|_| SyntaxError::new(start, format!("invalid number `{literal}`")))?;
            tokens.push((Token::Number(value), start));
        } else if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push((Token::Identifier(ident), start));
        } else {
            let token = match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '%' => Token::Percent,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                ',' => Token::Comma,
                _ => return Err(SyntaxError::new(start, format!("unexpected character `{c}`"))),
            };
            tokens.push((token, start));
            chars.next();
        }
    }
    Ok(tokens)
}

/// True when `rest` (the text after an `e`/`E`) continues a numeric exponent.
fn has_exponent_digits(rest: &str) -> bool {
    let rest = rest.strip_prefix(|ch: char| ch == '+' || ch == '-').unwrap_or(rest);
    rest.starts_with(|ch: char| ch.is_ascii_digit())
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn peek_spanned(&self) -> Option<(Token, usize)> {
        self.tokens.get(self.pos).cloned()
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, position)| *position)
            .unwrap_or(self.end)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), SyntaxError> {
        let position = self.position();
        match self.consume() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(SyntaxError::new(
                position,
                format!("expected {}, found {}", expected.describe(), token.describe()),
            )),
            None => Err(SyntaxError::new(
                position,
                format!("expected {}, found end of input", expected.describe()),
            )),
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_term()
    }

    fn parse_term(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_factor()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Plus => '+',
                Token::Minus => '-',
                _ => break,
            };
            self.consume();
            let right = self.parse_factor()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_unary()?;

        while let Some(token) = self.peek() {
            let op = match token {
                Token::Star => '*',
                Token::Slash => '/',
                Token::Percent => '%',
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                let expr = self.parse_unary()?;
                Ok(Expr::Unary('-', Box::new(expr)))
            }
            Some(Token::Plus) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    // `^` binds tighter than unary minus and is right-associative.
    fn parse_power(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.parse_implicit()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), '^', Box::new(exponent)));
        }
        Ok(base)
    }

    // A number directly followed by a name or a group multiplies it: `2y0`, `3(x + 1)`.
    fn parse_implicit(&mut self) -> Result<Expr, SyntaxError> {
        let primary = self.parse_primary()?;
        if let Expr::Number(_) = primary {
            if let Some(Token::Identifier(_) | Token::LParen) = self.peek() {
                let right = self.parse_power()?;
                return Ok(Expr::Binary(Box::new(primary), '*', Box::new(right)));
            }
        }
        Ok(primary)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let position = self.position();
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume(); // eat '('
                    let function = Function::from_name(&name).ok_or_else(|| {
                        SyntaxError::new(position, format!("unknown function `{name}`"))
                    })?;
                    let args = self.parse_arguments()?;
                    if args.len() != function.arity() {
                        return Err(SyntaxError::new(
                            position,
                            format!(
                                "function `{name}` takes {} argument(s), got {}",
                                function.arity(),
                                args.len()
                            ),
                        ));
                    }
                    Ok(Expr::Call(function, args))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(token) => Err(SyntaxError::new(
                position,
                format!("unexpected {}", token.describe()),
            )),
            None => Err(SyntaxError::new(position, "unexpected end of input")),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut args = Vec::new();
        if let Some(Token::RParen) = self.peek() {
            self.consume();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            match self.peek() {
                Some(Token::Comma) => {
                    self.consume();
                }
                _ => break,
            }
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }
}

// --- Expression ---

/// An equation parsed and compiled once, evaluable any number of times.
///
/// Evaluation allocates its own stack, so a single `Expression` can be shared
/// between threads and evaluated concurrently.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    bytecode: Bytecode,
}

impl Expression {
    /// Parses `source` and binds its variables to the positions of `var_names`.
    pub fn compile(source: &str, var_names: &[String]) -> Result<Self, SolverError> {
        let expr = parse(source).map_err(|err| SolverError::Parse {
            expression: source.to_string(),
            position: err.position,
            message: err.message,
        })?;
        let bytecode = Compiler::new(var_names)
            .compile(&expr)
            .map_err(|err| match err {
                CompileError::UnboundVariable(name) => SolverError::Evaluation {
                    expression: source.to_string(),
                    failure: EvalFailure::UnboundVariable(name),
                },
            })?;
        Ok(Self {
            source: source.to_string(),
            bytecode,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }

    /// Evaluates with `vars` bound in the order given at compile time.
    pub fn eval<T: Scalar>(&self, vars: &[T]) -> Result<T, SolverError> {
        let mut stack = Vec::with_capacity(self.bytecode.max_stack);
        VM::execute(&self.bytecode, vars, &mut stack).map_err(|failure| {
            SolverError::Evaluation {
                expression: self.source.clone(),
                failure,
            }
        })
    }
}

/// One-shot evaluation of `expression` under named bindings.
pub fn evaluate(expression: &str, bindings: &[(&str, f64)]) -> Result<f64, SolverError> {
    let names: Vec<String> = bindings.iter().map(|(name, _)| name.to_string()).collect();
    let values: Vec<f64> = bindings.iter().map(|(_, value)| *value).collect();
    Expression::compile(expression, &names)?.eval(&values)
}
