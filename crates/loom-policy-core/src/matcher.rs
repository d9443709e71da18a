// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Matcher expressions: lexing, parsing and evaluation.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! or      := and ( "||" and )*
//! and     := cmp ( "&&" cmp )*
//! cmp     := unary ( ("==" | "!=" | "<" | "<=" | ">" | ">=") unary )?
//! unary   := "!" unary | primary
//! primary := literal | path | call | "(" or ")"
//! path    := ident ( "." ident )*
//! call    := ident "(" ( or ( "," or )* )? ")"
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::error::{EvalError, Result};
use crate::functions;
use crate::rbac::RoleManager;
use crate::value::{Record, RequestValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
	Or,
	And,
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
	Str(String),
	Num(f64),
	Bool(bool),
	Path(Vec<String>),
	Not(Box<Expr>),
	Binary {
		op: BinaryOp,
		lhs: Box<Expr>,
		rhs: Box<Expr>,
	},
	Call {
		name: String,
		args: Vec<Expr>,
	},
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
	Ident(String),
	Str(String),
	Num(f64),
	Dot,
	Comma,
	LParen,
	RParen,
	Not,
	Op(BinaryOp),
}

fn lex(input: &str) -> Result<Vec<(usize, Token)>> {
	let chars: Vec<(usize, char)> = input.char_indices().collect();
	let mut tokens = Vec::new();
	let mut i = 0;

	let syntax = |offset: usize, message: &str| EvalError::Syntax {
		offset,
		message: message.to_string(),
	};

	while i < chars.len() {
		let (offset, c) = chars[i];
		let next = chars.get(i + 1).map(|(_, c)| *c);
		match c {
			c if c.is_whitespace() => i += 1,
			'.' => {
				tokens.push((offset, Token::Dot));
				i += 1;
			}
			',' => {
				tokens.push((offset, Token::Comma));
				i += 1;
			}
			'(' => {
				tokens.push((offset, Token::LParen));
				i += 1;
			}
			')' => {
				tokens.push((offset, Token::RParen));
				i += 1;
			}
			'&' if next == Some('&') => {
				tokens.push((offset, Token::Op(BinaryOp::And)));
				i += 2;
			}
			'|' if next == Some('|') => {
				tokens.push((offset, Token::Op(BinaryOp::Or)));
				i += 2;
			}
			'=' if next == Some('=') => {
				tokens.push((offset, Token::Op(BinaryOp::Eq)));
				i += 2;
			}
			'!' if next == Some('=') => {
				tokens.push((offset, Token::Op(BinaryOp::Ne)));
				i += 2;
			}
			'!' => {
				tokens.push((offset, Token::Not));
				i += 1;
			}
			'<' | '>' => {
				let op = match (c, next == Some('=')) {
					('<', true) => BinaryOp::Le,
					('<', false) => BinaryOp::Lt,
					(_, true) => BinaryOp::Ge,
					(_, false) => BinaryOp::Gt,
				};
				tokens.push((offset, Token::Op(op)));
				i += if next == Some('=') { 2 } else { 1 };
			}
			'"' | '\'' => {
				let quote = c;
				let mut value = String::new();
				i += 1;
				loop {
					match chars.get(i) {
						None => return Err(syntax(offset, "unterminated string literal")),
						Some((_, '\\')) => {
							if let Some((_, escaped)) = chars.get(i + 1) {
								value.push(*escaped);
							}
							i += 2;
						}
						Some((_, ch)) if *ch == quote => {
							i += 1;
							break;
						}
						Some((_, ch)) => {
							value.push(*ch);
							i += 1;
						}
					}
				}
				tokens.push((offset, Token::Str(value)));
			}
			c if c.is_ascii_digit() => {
				let start = i;
				while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
					i += 1;
				}
				let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
				let value = text
					.parse::<f64>()
					.map_err(|_| syntax(offset, "invalid number literal"))?;
				tokens.push((offset, Token::Num(value)));
			}
			c if c.is_alphabetic() || c == '_' => {
				let start = i;
				while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
					i += 1;
				}
				let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
				tokens.push((offset, Token::Ident(text)));
			}
			_ => return Err(syntax(offset, &format!("unexpected character `{c}`"))),
		}
	}
	Ok(tokens)
}

struct Parser {
	tokens: Vec<(usize, Token)>,
	pos: usize,
	end: usize,
}

impl Parser {
	fn peek(&self) -> Option<&Token> {
		self.tokens.get(self.pos).map(|(_, t)| t)
	}

	fn offset(&self) -> usize {
		self.tokens.get(self.pos).map(|(o, _)| *o).unwrap_or(self.end)
	}

	fn bump(&mut self) -> Option<Token> {
		let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
		self.pos += 1;
		token
	}

	fn error(&self, message: impl Into<String>) -> EvalError {
		EvalError::Syntax {
			offset: self.offset(),
			message: message.into(),
		}
	}

	fn expect(&mut self, want: Token, what: &str) -> Result<()> {
		if self.peek() == Some(&want) {
			self.pos += 1;
			Ok(())
		} else {
			Err(self.error(format!("expected {what}")))
		}
	}

	fn parse_or(&mut self) -> Result<Expr> {
		let mut lhs = self.parse_and()?;
		while self.peek() == Some(&Token::Op(BinaryOp::Or)) {
			self.pos += 1;
			let rhs = self.parse_and()?;
			lhs = Expr::Binary {
				op: BinaryOp::Or,
				lhs: Box::new(lhs),
				rhs: Box::new(rhs),
			};
		}
		Ok(lhs)
	}

	fn parse_and(&mut self) -> Result<Expr> {
		let mut lhs = self.parse_cmp()?;
		while self.peek() == Some(&Token::Op(BinaryOp::And)) {
			self.pos += 1;
			let rhs = self.parse_cmp()?;
			lhs = Expr::Binary {
				op: BinaryOp::And,
				lhs: Box::new(lhs),
				rhs: Box::new(rhs),
			};
		}
		Ok(lhs)
	}

	fn parse_cmp(&mut self) -> Result<Expr> {
		let lhs = self.parse_unary()?;
		match self.peek() {
			Some(Token::Op(op)) if !matches!(op, BinaryOp::And | BinaryOp::Or) => {
				let op = *op;
				self.pos += 1;
				let rhs = self.parse_unary()?;
				Ok(Expr::Binary {
					op,
					lhs: Box::new(lhs),
					rhs: Box::new(rhs),
				})
			}
			_ => Ok(lhs),
		}
	}

	fn parse_unary(&mut self) -> Result<Expr> {
		if self.peek() == Some(&Token::Not) {
			self.pos += 1;
			return Ok(Expr::Not(Box::new(self.parse_unary()?)));
		}
		self.parse_primary()
	}

	fn parse_primary(&mut self) -> Result<Expr> {
		match self.bump() {
			Some(Token::Str(s)) => Ok(Expr::Str(s)),
			Some(Token::Num(n)) => Ok(Expr::Num(n)),
			Some(Token::LParen) => {
				let inner = self.parse_or()?;
				self.expect(Token::RParen, "`)`")?;
				Ok(inner)
			}
			Some(Token::Ident(name)) if name == "true" => Ok(Expr::Bool(true)),
			Some(Token::Ident(name)) if name == "false" => Ok(Expr::Bool(false)),
			Some(Token::Ident(name)) if self.peek() == Some(&Token::LParen) => {
				self.pos += 1;
				let mut args = Vec::new();
				if self.peek() != Some(&Token::RParen) {
					loop {
						args.push(self.parse_or()?);
						if self.peek() == Some(&Token::Comma) {
							self.pos += 1;
						} else {
							break;
						}
					}
				}
				self.expect(Token::RParen, "`)` after arguments")?;
				Ok(Expr::Call { name, args })
			}
			Some(Token::Ident(name)) => {
				let mut segments = vec![name];
				while self.peek() == Some(&Token::Dot) {
					self.pos += 1;
					match self.bump() {
						Some(Token::Ident(field)) => segments.push(field),
						_ => {
							self.pos -= 1;
							return Err(self.error("expected field name after `.`"));
						}
					}
				}
				Ok(Expr::Path(segments))
			}
			_ => {
				self.pos = self.pos.saturating_sub(1);
				Err(self.error("expected an operand"))
			}
		}
	}
}

/// Parses a matcher expression.
pub fn parse(input: &str) -> Result<Expr> {
	let tokens = lex(input)?;
	let mut parser = Parser {
		tokens,
		pos: 0,
		end: input.len(),
	};
	let expr = parser.parse_or()?;
	if parser.pos < parser.tokens.len() {
		return Err(parser.error("unexpected trailing input"));
	}
	Ok(expr)
}

/// A value produced while evaluating a matcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
	Str(Cow<'a, str>),
	Num(f64),
	Bool(bool),
	Record(&'a Record),
}

impl Value<'_> {
	fn describe(&self) -> &'static str {
		match self {
			Value::Str(_) => "string",
			Value::Num(_) => "number",
			Value::Bool(_) => "bool",
			Value::Record(_) => "record",
		}
	}

	fn as_number(&self) -> Option<f64> {
		match self {
			Value::Num(n) => Some(*n),
			Value::Str(s) => s.trim().parse().ok(),
			_ => None,
		}
	}

	pub fn into_string(self) -> Result<String> {
		match self {
			Value::Str(s) => Ok(s.into_owned()),
			Value::Num(n) => Ok(n.to_string()),
			Value::Bool(b) => Ok(b.to_string()),
			Value::Record(_) => Err(EvalError::TypeMismatch(
				"a record cannot be used as a string".to_string(),
			)),
		}
	}
}

/// Bindings visible to one evaluation.
pub struct Scope<'a> {
	pub request_tokens: &'a [String],
	pub request: &'a [RequestValue],
	pub policy_tokens: &'a [String],
	pub policy: &'a [String],
	pub role_managers: &'a BTreeMap<String, RoleManager>,
}

impl<'a> Scope<'a> {
	fn resolve(&self, segments: &[String]) -> Result<Value<'a>> {
		let request: &'a [RequestValue] = self.request;
		let policy: &'a [String] = self.policy;
		let root = segments[0].as_str();
		let Some(field) = segments.get(1) else {
			return Err(EvalError::UnknownIdentifier(root.to_string()));
		};

		let mut value = match root {
			"r" => {
				let idx = self
					.request_tokens
					.iter()
					.position(|t| t == field)
					.ok_or_else(|| EvalError::UnknownIdentifier(format!("r.{field}")))?;
				match &request[idx] {
					RequestValue::Str(s) => Value::Str(Cow::Borrowed(s.as_str())),
					RequestValue::Record(r) => Value::Record(r),
				}
			}
			"p" => {
				let idx = self
					.policy_tokens
					.iter()
					.position(|t| t == field)
					.ok_or_else(|| EvalError::UnknownIdentifier(format!("p.{field}")))?;
				let text = policy.get(idx).map(String::as_str).unwrap_or("");
				Value::Str(Cow::Borrowed(text))
			}
			_ => return Err(EvalError::UnknownIdentifier(segments.join("."))),
		};

		for (depth, member) in segments.iter().enumerate().skip(2) {
			value = match value {
				Value::Record(record) => match record.get(member) {
					Some(v) => Value::Str(Cow::Borrowed(v.as_str())),
					None => {
						return Err(EvalError::NoSuchField {
							target: segments[..depth].join("."),
							field: member.clone(),
						})
					}
				},
				_ => {
					return Err(EvalError::NoSuchField {
						target: segments[..depth].join("."),
						field: member.clone(),
					})
				}
			};
		}
		Ok(value)
	}
}

/// Evaluates `expr` to a boolean.
pub fn evaluate_bool(expr: &Expr, scope: &Scope<'_>) -> Result<bool> {
	match evaluate(expr, scope)? {
		Value::Bool(b) => Ok(b),
		other => Err(EvalError::TypeMismatch(format!(
			"matcher must produce a bool, got a {}",
			other.describe()
		))),
	}
}

fn evaluate<'a>(expr: &'a Expr, scope: &Scope<'a>) -> Result<Value<'a>> {
	match expr {
		Expr::Str(s) => Ok(Value::Str(Cow::Borrowed(s.as_str()))),
		Expr::Num(n) => Ok(Value::Num(*n)),
		Expr::Bool(b) => Ok(Value::Bool(*b)),
		Expr::Path(segments) => scope.resolve(segments),
		Expr::Not(inner) => Ok(Value::Bool(!evaluate_bool(inner, scope)?)),
		Expr::Binary { op, lhs, rhs } => match op {
			BinaryOp::And => Ok(Value::Bool(
				evaluate_bool(lhs, scope)? && evaluate_bool(rhs, scope)?,
			)),
			BinaryOp::Or => Ok(Value::Bool(
				evaluate_bool(lhs, scope)? || evaluate_bool(rhs, scope)?,
			)),
			_ => {
				let l = evaluate(lhs, scope)?;
				let r = evaluate(rhs, scope)?;
				compare(*op, &l, &r).map(Value::Bool)
			}
		},
		Expr::Call { name, args } => {
			let mut values = Vec::with_capacity(args.len());
			for arg in args {
				values.push(evaluate(arg, scope)?.into_string()?);
			}
			if let Some(rm) = scope.role_managers.get(name) {
				return match values.as_slice() {
					[a, b] => Ok(Value::Bool(rm.has_link(a, b, None))),
					[a, b, domain] => Ok(Value::Bool(rm.has_link(a, b, Some(domain)))),
					_ => Err(EvalError::FunctionArity {
						name: name.clone(),
						expected: "2 or 3",
						actual: values.len(),
					}),
				};
			}
			functions::call(name, &values).map(Value::Bool)
		}
	}
}

fn compare(op: BinaryOp, l: &Value<'_>, r: &Value<'_>) -> Result<bool> {
	let mismatch = || {
		EvalError::TypeMismatch(format!(
			"cannot compare a {} with a {}",
			l.describe(),
			r.describe()
		))
	};

	match op {
		BinaryOp::Eq | BinaryOp::Ne => {
			let equal = match (l, r) {
				(Value::Str(a), Value::Str(b)) => a == b,
				(Value::Bool(a), Value::Bool(b)) => a == b,
				(Value::Num(_), _) | (_, Value::Num(_)) => {
					match (l.as_number(), r.as_number()) {
						(Some(a), Some(b)) => a == b,
						_ => false,
					}
				}
				(Value::Bool(b), Value::Str(s)) | (Value::Str(s), Value::Bool(b)) => {
					let text: &str = s;
					text == if *b { "true" } else { "false" }
				}
				_ => return Err(mismatch()),
			};
			Ok(if op == BinaryOp::Eq { equal } else { !equal })
		}
		_ => {
			let ordering = match (l.as_number(), r.as_number()) {
				(Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(mismatch)?,
				_ => match (l, r) {
					(Value::Str(a), Value::Str(b)) => a.cmp(b),
					_ => return Err(mismatch()),
				},
			};
			Ok(match op {
				BinaryOp::Lt => ordering.is_lt(),
				BinaryOp::Le => ordering.is_le(),
				BinaryOp::Gt => ordering.is_gt(),
				_ => ordering.is_ge(),
			})
		}
	}
}
