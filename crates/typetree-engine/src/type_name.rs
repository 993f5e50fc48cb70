//! Type name parser
//!
//! Recursive-descent parser for reflection-style type names:
//!
//! ```text
//! type      := ident generic? array*
//! generic   := '[' arg (',' arg)* ']'
//! arg       := '[' type (',' assembly)? ']' | type
//! array     := '[]'
//! ```
//!
//! Examples: ``Game.Wrapper`1[[Game.Item, Assembly-CSharp, Version=0.0.0.0]]``,
//! ``Pair`2[System.Int32,System.String]``, `Game.Item[]`.

use crate::error::{GeneratorError, Result};
use std::fmt;

/// Generic arguments may not nest deeper than this
const MAX_NESTING: usize = 32;

/// Parsed type name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName {
    /// Full name of the (possibly open generic) definition
    pub name: String,
    /// Generic arguments in order
    pub args: Vec<TypeName>,
    /// Simple name of the assembly qualifier, if any
    pub assembly: Option<String>,
    /// Number of trailing `[]` suffixes
    pub array_rank: usize,
}

impl TypeName {
    /// A plain, non-generic name
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            assembly: None,
            array_rank: 0,
        }
    }

    /// Arity declared by a ``Name`N`` suffix
    pub fn declared_arity(&self) -> Option<usize> {
        declared_arity(&self.name)
    }

    /// Whether generic arguments were supplied
    pub fn is_generic(&self) -> bool {
        !self.args.is_empty()
    }
}

/// Arity declared by a ``Name`N`` suffix on a definition name
pub fn declared_arity(name: &str) -> Option<usize> {
    let (_, digits) = name.rsplit_once('`')?;
    digits.parse().ok()
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("[")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                match &arg.assembly {
                    Some(assembly) => write!(f, "[{}, {}]", arg, assembly)?,
                    None => write!(f, "[{}]", arg)?,
                }
            }
            f.write_str("]")?;
        }
        for _ in 0..self.array_rank {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

/// Parse a type name
pub fn parse(input: &str) -> Result<TypeName> {
    let mut parser = Parser::new(input);
    parser.skip_ws();
    let mut ty = parser.parse_type(0)?;
    parser.skip_ws();
    if parser.eat(b',') {
        ty.assembly = Some(parser.parse_assembly()?);
    }
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(ty)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, reason: &str) -> GeneratorError {
        GeneratorError::invalid_type_name(
            self.input,
            format!("{} at offset {}", reason, self.pos),
        )
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.as_bytes().get(self.pos + offset).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    /// Delimiters are ASCII, so every stop position is a char boundary
    fn take_until(&mut self, stop: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if stop(byte) {
                break;
            }
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn parse_ident(&mut self) -> Result<String> {
        let ident = self
            .take_until(|b| matches!(b, b'[' | b']' | b','))
            .trim();
        if ident.is_empty() {
            return Err(self.error("expected a type name"));
        }
        Ok(ident.to_string())
    }

    fn parse_assembly(&mut self) -> Result<String> {
        let qualifier = self.take_until(|b| b == b']');
        let simple = qualifier.split(',').next().unwrap_or("").trim();
        if simple.is_empty() {
            return Err(self.error("expected an assembly name"));
        }
        Ok(simple.to_string())
    }

    fn parse_type(&mut self, depth: usize) -> Result<TypeName> {
        if depth > MAX_NESTING {
            return Err(self.error("generic arguments nested too deeply"));
        }

        let name = self.parse_ident()?;
        let mut args = Vec::new();

        if self.peek() == Some(b'[') && self.peek_at(1) != Some(b']') {
            self.pos += 1;
            loop {
                self.skip_ws();
                args.push(self.parse_arg(depth + 1)?);
                self.skip_ws();
                if self.eat(b',') {
                    continue;
                }
                self.expect(b']')?;
                break;
            }
        }

        let mut array_rank = 0;
        while self.peek() == Some(b'[') && self.peek_at(1) == Some(b']') {
            self.pos += 2;
            array_rank += 1;
        }

        if !args.is_empty() {
            match declared_arity(&name) {
                Some(arity) if arity == args.len() => {}
                Some(arity) => {
                    return Err(GeneratorError::invalid_type_name(
                        self.input,
                        format!("{} expects {} type arguments, got {}", name, arity, args.len()),
                    ))
                }
                None => {
                    return Err(GeneratorError::invalid_type_name(
                        self.input,
                        format!("{} is not a generic type", name),
                    ))
                }
            }
        }

        Ok(TypeName {
            name,
            args,
            assembly: None,
            array_rank,
        })
    }

    fn parse_arg(&mut self, depth: usize) -> Result<TypeName> {
        if !self.eat(b'[') {
            return self.parse_type(depth);
        }
        self.skip_ws();
        let mut arg = self.parse_type(depth)?;
        self.skip_ws();
        if self.eat(b',') {
            arg.assembly = Some(self.parse_assembly()?);
        }
        self.expect(b']')?;
        Ok(arg)
    }
}
