//! Parser for line oriented RISC-V assembly.
//!
//! A label that does not start with `.L` starts a new function; a `.L` label or a numeric label
//! (`1:`) starts a new block in the current function. Directives before the first function are collected into the module
//! header, directives inside a function become metadata instructions.

use std::ops::Range;

use logos::Logos;
use runmark_diagnostics::span::{spanned, FileId, Span, Spanned};
use runmark_diagnostics::{error_report, Diagnostics, ReportBuilder};
use smol_str::SmolStr;
use thiserror::Error;

use crate::block::{Block, Function, Module};
use crate::instr::{Instr, InstrKind, Offset, Operand, RegOperand, Reloc, Role};
use crate::lexer::Token;
use crate::opcode::{self, Form, OpcodeInfo, OperandShape, INLINE_ASM_MNEMONIC};
use crate::reg::Reg;

pub struct Parser<'a> {
    source: &'a str,
    /// All the tokens.
    tokens: Vec<(Token, Range<usize>)>,
    /// An index into `tokens`, representing the current token.
    ///
    /// The first token is a dummy token, so when calling `get_next` for the first time, the first
    /// real token is returned.
    cursor: usize,
    /// The current file that is being parsed.
    file_id: FileId,
    diagnostics: Diagnostics,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected one of: {expected:?}, found {unexpected:?}.")]
    ExpectedToken {
        unexpected: Token,
        expected: Vec<Token>,
    },
    #[error("expected an operand, found {unexpected:?}.")]
    ExpectedOperand { unexpected: Token },
    #[error("`{mnemonic}` takes {} operands, found {found}.", counts(.expected))]
    OperandCount {
        mnemonic: SmolStr,
        /// One entry per accepted form.
        expected: Vec<usize>,
        found: usize,
    },
    #[error("operand {index} of `{mnemonic}` must be {expected}.")]
    OperandMismatch {
        mnemonic: SmolStr,
        index: usize,
        expected: OperandShape,
    },
    #[error("instruction `{mnemonic}` is not inside a function.")]
    InstrOutsideFunction { mnemonic: SmolStr },
    #[error("label `{label}` is not inside a function.")]
    LabelOutsideFunction { label: SmolStr },
}

/// `[3]` as "3", `[1, 2]` as "1 or 2".
fn counts(expected: &[usize]) -> String {
    let mut counts = expected.to_vec();
    counts.sort_unstable();
    counts.dedup();
    counts
        .iter()
        .map(|count| count.to_string())
        .collect::<Vec<_>>()
        .join(" or ")
}

impl ParseError {
    /// Build the report shown for this error at `span`.
    pub fn report(&self, span: Span) -> ReportBuilder {
        match self {
            ParseError::ExpectedToken { .. } => error_report(span, self, "unexpected token"),
            ParseError::ExpectedOperand { .. } => error_report(
                span,
                self,
                "expected a register, immediate, memory operand or label",
            ),
            ParseError::OperandCount { expected, .. } => {
                error_report(span, self, format!("expected {} operands", counts(expected)))
            }
            ParseError::OperandMismatch { expected, .. } => {
                error_report(span, self, format!("expected {expected}"))
            }
            ParseError::InstrOutsideFunction { .. } => {
                error_report(span, self, "instruction before any function label")
                    .with_help("start the function with a label such as `main:`")
            }
            ParseError::LabelOutsideFunction { .. } => {
                error_report(span, self, "local label before any function")
                    .with_help("local labels name blocks, so they must follow a function label")
            }
        }
    }
}

pub type Result<T, E = ParseError> = std::result::Result<T, E>;

/// An operand before the opcode table has given it a role.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RawOperand {
    Reg(Option<Reg>),
    Imm(i64),
    Reloc(Reloc),
    Mem { offset: Offset, base: Option<Reg> },
    Symbol(SmolStr),
}

impl RawOperand {
    fn fits(&self, shape: OperandShape) -> bool {
        matches!(
            (shape, self),
            (
                OperandShape::Dst | OperandShape::Src | OperandShape::Tied,
                RawOperand::Reg(_)
            ) | (OperandShape::Imm, RawOperand::Imm(_) | RawOperand::Reloc(_))
                | (OperandShape::Mem, RawOperand::Mem { .. })
                | (OperandShape::Label, RawOperand::Symbol(_))
        )
    }
}

/// A temporary struct used to store the start of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SpanStart {
    start: u32,
}

/// Parse a whole file. Errors are also reported to `diagnostics`.
pub fn parse_module(file_id: FileId, source: &str, diagnostics: Diagnostics) -> Result<Module> {
    Parser::new(file_id, source, diagnostics).parse_module()
}

impl<'a> Parser<'a> {
    pub fn new(file_id: FileId, source: &'a str, diagnostics: Diagnostics) -> Self {
        let tokens = Some((Token::Start, 0..0))
            .into_iter()
            .chain(Token::lexer(source).spanned())
            .collect();
        Self {
            source,
            tokens,
            cursor: 0,
            file_id,
            diagnostics,
        }
    }

    fn eof(&self) -> bool {
        self.peek_next() == &Token::Eof
    }

    /// Returns a `SpanStart` that can be used to create a `Span` later.
    #[must_use]
    fn start(&self) -> SpanStart {
        let start = self
            .tokens
            .get(self.cursor + 1)
            .map(|x| x.1.start)
            .unwrap_or(self.source.len()) as u32;
        SpanStart { start }
    }

    /// Returns a `Span` from a `SpanStart`.
    #[must_use]
    fn end(&self, start: SpanStart) -> Span {
        let end = self
            .tokens
            .get(self.cursor)
            .map(|x| x.1.end)
            .unwrap_or(self.source.len()) as u32;
        Span {
            start: start.start,
            end: end.max(start.start),
            file_id: self.file_id,
        }
    }

    #[must_use]
    fn finish<T>(&self, start: SpanStart, node: T) -> Spanned<T> {
        spanned(self.end(start), node)
    }

    /// The span of the next token.
    fn next_span(&self) -> Span {
        let range = self
            .tokens
            .get(self.cursor + 1)
            .map(|x| x.1.clone())
            .unwrap_or(self.source.len()..self.source.len());
        Span {
            start: range.start as u32,
            end: range.end as u32,
            file_id: self.file_id,
        }
    }

    /// Get the current token.
    #[must_use]
    fn get_current(&self) -> &Token {
        self.tokens
            .get(self.cursor)
            .map(|x| &x.0)
            .unwrap_or(&Token::Eof)
    }

    /// Get the next token and increments the cursor.
    #[must_use]
    pub fn get_next(&mut self) -> &Token {
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
        self.get_current()
    }

    /// Get the next token without incrementing the cursor.
    #[must_use]
    pub fn peek_next(&self) -> &Token {
        self.peek_nth(1)
    }

    /// Get the token that is `n` tokens ahead without incrementing the cursor.
    /// If `n` is 0, this is equivalent to `get_current`.
    /// If `n` is 1, this is equivalent to `peek_next`.
    ///
    /// If `n` is greater than the number of tokens left, [`Token::Eof`] is returned.
    pub fn peek_nth(&self, n: usize) -> &Token {
        self.tokens
            .get(self.cursor + n)
            .map(|x| &x.0)
            .unwrap_or(&Token::Eof)
    }

    fn at_line_end(&self) -> bool {
        matches!(self.peek_next(), Token::Newline | Token::Eof)
    }

    /// Report `err` to the diagnostics sink and return it.
    fn error(&self, span: Span, err: ParseError) -> ParseError {
        self.diagnostics.add(err.report(span));
        err
    }

    /// Consume the next token and report it as unexpected.
    fn unexpected(&mut self, expected: Vec<Token>) -> ParseError {
        let span = self.next_span();
        let unexpected = self.get_next().clone();
        self.error(
            span,
            ParseError::ExpectedToken {
                unexpected,
                expected,
            },
        )
    }

    /// Get the next token and expect it to be the same token as `expected`.
    pub fn expect(&mut self, expected: Token) -> Result<()> {
        if self.peek_next() == &expected {
            let _ = self.get_next();
            Ok(())
        } else {
            Err(self.unexpected(vec![expected]))
        }
    }

    fn expect_line_end(&mut self) -> Result<()> {
        match self.peek_next() {
            Token::Eof => Ok(()),
            Token::Newline => {
                let _ = self.get_next();
                Ok(())
            }
            _ => Err(self.unexpected(vec![Token::Newline])),
        }
    }

    /// Consume the rest of the line, returning the byte range from the start of the next token to
    /// the end of the last token on the line.
    fn skip_line(&mut self) -> Range<usize> {
        let start = self.start().start as usize;
        let mut end = start;
        while !self.at_line_end() {
            let _ = self.get_next();
            end = self.tokens[self.cursor].1.end;
        }
        start..end
    }

    pub fn parse_module(&mut self) -> Result<Module> {
        let mut module = Module::default();
        while !self.eof() {
            match self.peek_next().clone() {
                Token::Newline => {
                    let _ = self.get_next();
                }
                Token::Ident(name) if self.peek_nth(2) == &Token::Colon => {
                    self.cursor += 2;
                    module.functions.push(Function::new(name));
                }
                Token::Directive(label) if self.peek_nth(2) == &Token::Colon => {
                    self.parse_block_label(&mut module, label)?;
                }
                Token::LitInt(number) if number >= 0 && self.peek_nth(2) == &Token::Colon => {
                    self.parse_block_label(&mut module, number.to_string().into())?;
                }
                Token::Directive(name) => {
                    let line = self.skip_line();
                    match module.functions.last_mut() {
                        Some(function) => {
                            let args = self.source[line.start + name.len()..line.end].trim();
                            let operands = if args.is_empty() {
                                Vec::new()
                            } else {
                                vec![Operand::Text(args.into())]
                            };
                            let instr = Instr::new(name, InstrKind::Meta, operands);
                            function.last_block_mut().push(instr);
                        }
                        None => module.header.push(self.source[line].into()),
                    }
                    self.expect_line_end()?;
                }
                Token::Ident(mnemonic) => {
                    let instr = self.parse_instr()?;
                    let Some(function) = module.functions.last_mut() else {
                        return Err(self.error(
                            instr.span(),
                            ParseError::InstrOutsideFunction { mnemonic },
                        ));
                    };
                    function.last_block_mut().push(instr.unspan());
                }
                _ => {
                    return Err(self.unexpected(vec![
                        Token::Ident("<instruction>".into()),
                        Token::Directive("<directive>".into()),
                    ]))
                }
            }
        }
        Ok(module)
    }

    /// Consume `label:` and start a new block with it.
    fn parse_block_label(&mut self, module: &mut Module, label: SmolStr) -> Result<()> {
        let span = self.next_span();
        self.cursor += 2;
        let Some(function) = module.functions.last_mut() else {
            return Err(self.error(span, ParseError::LabelOutsideFunction { label }));
        };
        function.blocks.push(Block::new(Some(label)));
        Ok(())
    }

    /// Parse a single instruction line.
    pub fn parse_instr(&mut self) -> Result<Spanned<Instr>> {
        let start = self.start();
        let mnemonic = match self.peek_next().clone() {
            Token::Ident(mnemonic) => {
                let _ = self.get_next();
                mnemonic
            }
            _ => return Err(self.unexpected(vec![Token::Ident("<mnemonic>".into())])),
        };

        if mnemonic == INLINE_ASM_MNEMONIC {
            let text = match self.peek_next().clone() {
                Token::LitStr(text) => {
                    let _ = self.get_next();
                    text
                }
                _ => return Err(self.unexpected(vec![Token::LitStr("<asm>".into())])),
            };
            let instr = self.finish(
                start,
                Instr::new(mnemonic, InstrKind::InlineAsm, vec![Operand::Text(text)]),
            );
            self.expect_line_end()?;
            return Ok(instr);
        }

        let mut raw = Vec::new();
        if !self.at_line_end() {
            loop {
                raw.push(self.parse_raw_operand()?);
                if self.peek_next() == &Token::Comma {
                    let _ = self.get_next();
                } else {
                    break;
                }
            }
        }
        let span = self.end(start);
        self.expect_line_end()?;

        let instr = match opcode::lookup(&mnemonic) {
            Some(info) => self.build_instr(mnemonic, info, raw, span)?,
            None => build_unknown_instr(mnemonic, raw),
        };
        Ok(spanned(span, instr))
    }

    fn parse_raw_operand(&mut self) -> Result<Spanned<RawOperand>> {
        let start = self.start();
        let span = self.next_span();
        let raw = match self.get_next().clone() {
            Token::Ident(name) => match Reg::from_name(&name) {
                Some(reg) => RawOperand::Reg(Some(reg)),
                None if name == "_" => RawOperand::Reg(None),
                None => RawOperand::Symbol(name),
            },
            Token::Directive(name) | Token::LocalRef(name) => RawOperand::Symbol(name),
            Token::VirtReg(idx) => RawOperand::Reg(Some(Reg::Virt(idx))),
            Token::LitInt(offset) if self.peek_next() == &Token::LParen => {
                let _ = self.get_next();
                let base = self.parse_mem_base()?;
                RawOperand::Mem {
                    offset: Offset::Imm(offset),
                    base,
                }
            }
            Token::LitInt(value) => RawOperand::Imm(value),
            Token::Reloc(op) => {
                let reloc = self.parse_reloc(op)?;
                if self.peek_next() == &Token::LParen {
                    let _ = self.get_next();
                    let base = self.parse_mem_base()?;
                    RawOperand::Mem {
                        offset: Offset::Reloc(reloc),
                        base,
                    }
                } else {
                    RawOperand::Reloc(reloc)
                }
            }
            Token::LParen => {
                let base = self.parse_mem_base()?;
                RawOperand::Mem {
                    offset: Offset::Imm(0),
                    base,
                }
            }
            unexpected => {
                return Err(self.error(span, ParseError::ExpectedOperand { unexpected }));
            }
        };
        Ok(self.finish(start, raw))
    }

    /// Parse `(symbol)` after a relocation operator.
    fn parse_reloc(&mut self, op: SmolStr) -> Result<Reloc> {
        self.expect(Token::LParen)?;
        let symbol = match self.peek_next().clone() {
            Token::Ident(name) | Token::Directive(name) | Token::LocalRef(name) => {
                let _ = self.get_next();
                name
            }
            _ => return Err(self.unexpected(vec![Token::Ident("<symbol>".into())])),
        };
        self.expect(Token::RParen)?;
        Ok(Reloc { op, symbol })
    }

    /// Parse `base)` after the opening parenthesis of a memory operand.
    fn parse_mem_base(&mut self) -> Result<Option<Reg>> {
        let base = match self.peek_next().clone() {
            Token::Ident(name) if name == "_" => None,
            Token::Ident(name) if Reg::from_name(&name).is_some() => Reg::from_name(&name),
            Token::VirtReg(idx) => Some(Reg::Virt(idx)),
            _ => {
                return Err(self.unexpected(vec![
                    Token::Ident("<register>".into()),
                    Token::VirtReg(0),
                ]))
            }
        };
        let _ = self.get_next();
        self.expect(Token::RParen)?;
        Ok(base)
    }

    /// Give the parsed operands their roles according to the opcode table.
    ///
    /// The first form that takes this many operands and matches all of them wins. If none matches,
    /// the error is reported against the first form with the right count.
    fn build_instr(
        &self,
        mnemonic: SmolStr,
        info: OpcodeInfo,
        raw: Vec<Spanned<RawOperand>>,
        span: Span,
    ) -> Result<Instr> {
        let found = raw.len();
        let candidates: Vec<Form> = info
            .forms()
            .filter(|form| info.accepts_count(form, found))
            .collect();
        let Some(&first) = candidates.first() else {
            return Err(self.error(
                span,
                ParseError::OperandCount {
                    mnemonic,
                    expected: info.forms().map(|form| form.shape.len()).collect(),
                    found,
                },
            ));
        };
        let form = candidates
            .into_iter()
            .find(|form| form.shape.iter().zip(&raw).all(|(shape, op)| op.fits(*shape)))
            .unwrap_or(first);

        let mut operands = Vec::with_capacity(found + form.implicit.len());
        for (index, operand) in raw.into_iter().enumerate() {
            let op_span = operand.span();
            let converted = match (form.shape.get(index), operand.unspan()) {
                (Some(OperandShape::Dst), RawOperand::Reg(reg)) => {
                    Operand::Reg(RegOperand::new(reg, Role::Def))
                }
                (Some(OperandShape::Src), RawOperand::Reg(reg)) => {
                    Operand::Reg(RegOperand::new(reg, Role::Use))
                }
                (Some(OperandShape::Tied), RawOperand::Reg(reg)) => {
                    Operand::Reg(RegOperand::new(reg, Role::UseDef))
                }
                (Some(OperandShape::Imm), RawOperand::Imm(value)) => Operand::Imm(value),
                (Some(OperandShape::Imm), RawOperand::Reloc(reloc)) => Operand::Reloc(reloc),
                (Some(OperandShape::Mem), RawOperand::Mem { offset, base }) => Operand::Mem {
                    offset,
                    base: RegOperand::new(base, Role::Use),
                },
                (Some(OperandShape::Label), RawOperand::Symbol(name)) => Operand::Label(name),
                (Some(&expected), _) => {
                    return Err(self.error(
                        op_span,
                        ParseError::OperandMismatch {
                            mnemonic,
                            index,
                            expected,
                        },
                    ))
                }
                // Trailing operands of variadic mnemonics.
                (None, other) => convert_generic(other, Role::Use),
            };
            operands.push(converted);
        }
        for (reg, role) in form.implicit {
            operands.push(Operand::Reg(
                RegOperand::new(Some(*reg), *role).into_implicit(),
            ));
        }
        Ok(Instr::new(mnemonic, info.kind, operands))
    }
}

fn convert_generic(raw: RawOperand, role: Role) -> Operand {
    match raw {
        RawOperand::Reg(reg) => Operand::Reg(RegOperand::new(reg, role)),
        RawOperand::Imm(value) => Operand::Imm(value),
        RawOperand::Reloc(reloc) => Operand::Reloc(reloc),
        RawOperand::Mem { offset, base } => Operand::Mem {
            offset,
            base: RegOperand::new(base, Role::Use),
        },
        RawOperand::Symbol(name) => Operand::Label(name),
    }
}

/// Mnemonics missing from the opcode table follow the usual RISC-V convention: the first register
/// operand is the destination and every other register is a source.
fn build_unknown_instr(mnemonic: SmolStr, raw: Vec<Spanned<RawOperand>>) -> Instr {
    let mut seen_reg = false;
    let operands = raw
        .into_iter()
        .map(|operand| {
            let role = if !seen_reg && matches!(*operand, RawOperand::Reg(_)) {
                seen_reg = true;
                Role::Def
            } else {
                Role::Use
            };
            convert_generic(operand.unspan(), role)
        })
        .collect();
    Instr::new(mnemonic, InstrKind::Unknown, operands)
}
