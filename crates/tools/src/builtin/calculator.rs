//! Calculator tool: evaluates arithmetic expressions.
//!
//! Supports `+ - * / % ^`, parentheses, unary minus and the constants
//! `pi` and `e`. Expressions are converted to postfix with the
//! shunting-yard algorithm and then evaluated on a value stack.

use async_trait::async_trait;
use serde_json::{Value, json};
use sidekick_core::{Tool, ToolArgs, ToolError};

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / % ^, parentheses, pi and e."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The expression to evaluate, e.g. '(2 + 3) * 4'"
                }
            },
            "required": ["expression"]
        })
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["math".into()]
    }

    async fn execute(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let expression = args
            .get("expression")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let value = evaluate(expression).map_err(|reason| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason,
        })?;

        if value.fract() == 0.0 && value.abs() < 1e15 {
            Ok(json!(value as i64))
        } else {
            Ok(json!(value))
        }
    }
}

// ── Shunting-yard evaluator ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(Op),
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Neg,
}

impl Op {
    fn precedence(self) -> u8 {
        match self {
            Op::Add | Op::Sub => 1,
            Op::Mul | Op::Div | Op::Rem => 2,
            Op::Neg => 3,
            Op::Pow => 4,
        }
    }

    fn right_assoc(self) -> bool {
        matches!(self, Op::Pow | Op::Neg)
    }

    fn apply(self, stack: &mut Vec<f64>) -> Result<(), String> {
        if self == Op::Neg {
            let v = stack.pop().ok_or("missing operand for unary minus")?;
            stack.push(-v);
            return Ok(());
        }
        let (Some(rhs), Some(lhs)) = (stack.pop(), stack.pop()) else {
            return Err("missing operand".into());
        };
        let result = match self {
            Op::Add => lhs + rhs,
            Op::Sub => lhs - rhs,
            Op::Mul => lhs * rhs,
            Op::Div if rhs == 0.0 => return Err("division by zero".into()),
            Op::Div => lhs / rhs,
            Op::Rem if rhs == 0.0 => return Err("modulo by zero".into()),
            Op::Rem => lhs % rhs,
            Op::Pow => lhs.powf(rhs),
            Op::Neg => return Err("unary minus used as a binary operator".into()),
        };
        stack.push(result);
        Ok(())
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let postfix = to_postfix(&tokenize(expr)?)?;
    let mut stack = Vec::new();
    for token in postfix {
        match token {
            Token::Num(n) => stack.push(n),
            Token::Op(op) => op.apply(&mut stack)?,
            Token::LParen | Token::RParen => return Err("mismatched parentheses".into()),
        }
    }
    match stack.as_slice() {
        [value] if value.is_finite() => Ok(*value),
        [_] => Err("result is not a finite number".into()),
        [] => Err("empty expression".into()),
        _ => Err("missing operator".into()),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        // A sign is unary when nothing that yields a value precedes it.
        let prefix_position = matches!(tokens.last(), None | Some(Token::Op(_)) | Some(Token::LParen));
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = literal
                    .parse()
                    .map_err(|_| format!("invalid number '{literal}'"))?;
                tokens.push(Token::Num(n));
            }
            'a'..='z' | 'A'..='Z' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphabetic() {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = match ident.to_ascii_lowercase().as_str() {
                    "pi" => std::f64::consts::PI,
                    "e" => std::f64::consts::E,
                    _ => return Err(format!("unknown identifier '{ident}'")),
                };
                tokens.push(Token::Num(n));
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '+' if prefix_position => {
                chars.next();
            }
            '-' if prefix_position => {
                chars.next();
                tokens.push(Token::Op(Op::Neg));
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                chars.next();
                let op = match c {
                    '+' => Op::Add,
                    '-' => Op::Sub,
                    '*' => Op::Mul,
                    '/' => Op::Div,
                    '%' => Op::Rem,
                    _ => Op::Pow,
                };
                tokens.push(Token::Op(op));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

fn to_postfix(tokens: &[Token]) -> Result<Vec<Token>, String> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut ops: Vec<Token> = Vec::new();

    for &token in tokens {
        match token {
            Token::Num(_) => output.push(token),
            // Prefix operators have no left operand to reduce.
            Token::Op(Op::Neg) => ops.push(token),
            Token::Op(op) => {
                while let Some(&Token::Op(top)) = ops.last() {
                    let reduce = top.precedence() > op.precedence()
                        || (top.precedence() == op.precedence() && !op.right_assoc());
                    if !reduce {
                        break;
                    }
                    output.push(Token::Op(top));
                    ops.pop();
                }
                ops.push(token);
            }
            Token::LParen => ops.push(token),
            Token::RParen => loop {
                match ops.pop() {
                    Some(Token::LParen) => break,
                    Some(op) => output.push(op),
                    None => return Err("mismatched parentheses".into()),
                }
            },
        }
    }

    while let Some(token) = ops.pop() {
        if token == Token::LParen {
            return Err("mismatched parentheses".into());
        }
        output.push(token);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(expr: &str, expected: f64) {
        let got = evaluate(expr).unwrap();
        assert!((got - expected).abs() < 1e-9, "{expr} = {got}, expected {expected}");
    }

    #[test]
    fn precedence_and_associativity() {
        approx("2 + 3 * 4", 14.0);
        approx("(2 + 3) * 4", 20.0);
        approx("10 - 4 - 3", 3.0);
        approx("2 ^ 3 ^ 2", 512.0);
        approx("17 % 5", 2.0);
        approx("8 / 2 / 2", 2.0);
    }

    #[test]
    fn unary_minus() {
        approx("-5 + 3", -2.0);
        approx("-2 ^ 2", -4.0);
        approx("2 * -3", -6.0);
        approx("2 ^ -1", 0.5);
        approx("-(1 + 2)", -3.0);
        approx("--4", 4.0);
        approx("+7", 7.0);
    }

    #[test]
    fn constants() {
        approx("pi", std::f64::consts::PI);
        approx("2 * e", 2.0 * std::f64::consts::E);
    }

    #[test]
    fn errors() {
        assert_eq!(evaluate("1 / 0").unwrap_err(), "division by zero");
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("1 + 2)").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("2 3").is_err());
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("foo").is_err());
        assert!(evaluate("1 $ 2").is_err());
    }

    #[tokio::test]
    async fn tool_formats_integers_without_fraction() {
        let mut args = ToolArgs::new();
        args.insert("expression".into(), json!("(2 + 3) * 4"));
        assert_eq!(CalculatorTool.execute(args).await.unwrap(), json!(20));

        let mut args = ToolArgs::new();
        args.insert("expression".into(), json!("1 / 4"));
        assert_eq!(CalculatorTool.execute(args).await.unwrap(), json!(0.25));
    }

    #[tokio::test]
    async fn tool_reports_evaluation_errors() {
        let mut args = ToolArgs::new();
        args.insert("expression".into(), json!("1 / 0"));
        let err = CalculatorTool.execute(args).await.unwrap_err();
        assert_eq!(err.to_string(), "Tool 'calculator' failed: division by zero");
    }
}
