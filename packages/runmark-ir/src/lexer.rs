use smol_str::SmolStr;

#[derive(Debug, Clone, PartialEq, Eq, logos::Logos)]
pub enum Token {
    // Punctuation
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(":")]
    Colon,
    /// Statements are separated by newlines or semicolons.
    #[token("\n")]
    #[token(";")]
    Newline,

    /// Mnemonics, register names and symbols, including `@plt` style suffixes.
    #[regex("[a-zA-Z_][a-zA-Z0-9_.$@]*", |lex| SmolStr::new(lex.slice()))]
    Ident(SmolStr),
    /// Directives and local labels, e.g. `.loc` or `.LBB0_1`.
    #[regex(r"\.[a-zA-Z_][a-zA-Z0-9_.$]*", |lex| SmolStr::new(lex.slice()))]
    Directive(SmolStr),
    /// A virtual register, `%N`.
    #[regex("%[0-9]+", |lex| lex.slice()[1..].parse())]
    VirtReg(u32),
    /// A relocation operator such as `%hi`, without the `%`.
    #[regex("%[a-zA-Z_][a-zA-Z0-9_]*", |lex| SmolStr::new(&lex.slice()[1..]))]
    Reloc(SmolStr),
    /// A reference to a numeric local label, `1b` or `1f`.
    #[regex("[0-9]+[bf]", |lex| SmolStr::new(lex.slice()))]
    LocalRef(SmolStr),

    // Literals
    #[regex("-?[0-9]+", |lex| lex.slice().parse())]
    #[regex("-?0x[0-9a-fA-F]+", parse_hex)]
    LitInt(i64),
    #[regex(r#""(?:[^"\\\n]|\\.)*""#, |lex| SmolStr::new(&lex.slice()[1..lex.slice().len() - 1]))]
    LitStr(SmolStr),

    /// A special token that marks the start of the input.
    Start,
    /// A special token that represents the end of the input.
    Eof,
    #[error]
    #[regex(r"[ \t\r\f]+", logos::skip)] // Whitespace
    #[regex(r"#[^\n]*", logos::skip)] // Line comments
    #[regex(r"//[^\n]*", logos::skip)]
    Err,
}

fn parse_hex(lex: &mut logos::Lexer<Token>) -> Option<i64> {
    let slice = lex.slice();
    let (negative, digits) = match slice.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, slice),
    };
    let value = i64::from_str_radix(&digits[2..], 16).ok()?;
    Some(if negative { -value } else { value })
}
