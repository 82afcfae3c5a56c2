//! Input statement tree for one function.
//!
//! The analysis consumes a structured statement tree produced by an external
//! parser. Statement and expression kinds are closed sum types so that every
//! construct is handled exhaustively by the CFG builder; an unknown construct
//! cannot exist by design. Each node carries a [`Pos`] source-position tag
//! which flows through to diagnostics.

/// Source position tag (line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// Expression tree. Only the structure needed to locate name reads is
/// modeled; operator identity and constant values are opaque to this crate.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A name read.
    Name { name: String, pos: Pos },
    /// An opaque constant.
    Const { pos: Pos },
    /// A binary operation.
    BinOp {
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Pos,
    },
    /// A unary operation.
    UnaryOp { operand: Box<Expr>, pos: Pos },
    /// A call; the callee is opaque, arguments are visited for reads.
    Call { args: Vec<Expr>, pos: Pos },
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Name { pos, .. }
            | Expr::Const { pos }
            | Expr::BinOp { pos, .. }
            | Expr::UnaryOp { pos, .. }
            | Expr::Call { pos, .. } => *pos,
        }
    }

    pub fn name(name: impl Into<String>, pos: Pos) -> Self {
        Expr::Name { name: name.into(), pos }
    }

    pub fn constant(pos: Pos) -> Self {
        Expr::Const { pos }
    }

    pub fn bin(left: Expr, right: Expr, pos: Pos) -> Self {
        Expr::BinOp { left: Box::new(left), right: Box::new(right), pos }
    }

    pub fn call(args: Vec<Expr>, pos: Pos) -> Self {
        Expr::Call { args, pos }
    }
}

/// Statement kinds understood by the CFG builder.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// `target = value`
    Assign { target: String, value: Expr, pos: Pos },
    /// `del name` — explicit unbinding.
    Del { name: String, pos: Pos },
    /// Bare expression statement.
    Expr { value: Expr, pos: Pos },
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        pos: Pos,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        pos: Pos,
    },
    /// Iterator-style loop; `target` is assigned at the top of each
    /// iteration.
    For {
        target: String,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        pos: Pos,
    },
    Break { pos: Pos },
    Continue { pos: Pos },
    Return { value: Option<Expr>, pos: Pos },
    Raise { value: Option<Expr>, pos: Pos },
    /// `try` with a single handler, optional else and finally suites.
    Try {
        body: Vec<Stmt>,
        handler: Vec<Stmt>,
        orelse: Vec<Stmt>,
        finally: Vec<Stmt>,
        pos: Pos,
    },
}

impl Stmt {
    pub fn pos(&self) -> Pos {
        match self {
            Stmt::Assign { pos, .. }
            | Stmt::Del { pos, .. }
            | Stmt::Expr { pos, .. }
            | Stmt::If { pos, .. }
            | Stmt::While { pos, .. }
            | Stmt::For { pos, .. }
            | Stmt::Break { pos }
            | Stmt::Continue { pos }
            | Stmt::Return { pos, .. }
            | Stmt::Raise { pos, .. }
            | Stmt::Try { pos, .. } => *pos,
        }
    }
}

/// One function handed to the analysis.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    /// Argument names, in declaration order.
    pub args: Vec<String>,
    /// Local names whose storage identity must be preserved; these are
    /// excluded from SSA renaming (captured-by-reference variables,
    /// externally fixed locals).
    pub pinned: Vec<String>,
    pub body: Vec<Stmt>,
    pub pos: Pos,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, args: Vec<String>, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            args,
            pinned: Vec::new(),
            body,
            pos: Pos::default(),
        }
    }
}
