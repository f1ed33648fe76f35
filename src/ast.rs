// ABOUTME: Statement, expression, and condition trees produced by the grammar

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    pub fn from_keyword(word: &str) -> Option<Method> {
        match word {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "DELETE" => Some(Method::Delete),
            "PATCH" => Some(Method::Patch),
            "HEAD" => Some(Method::Head),
            "OPTIONS" => Some(Method::Options),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Auth {
    Basic { user: String, pass: String },
    Bearer(String),
}

/// Options collected from a request's option list, in source order for
/// headers since later headers may override earlier ones server-side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub json: Option<String>,
    pub auth: Option<Auth>,
    pub timeout_ms: Option<u64>,
}

/// The URL position of a request: a literal (string or bare URL token,
/// variable-expanded at execution) or a single variable reference.
#[derive(Debug, Clone, PartialEq)]
pub enum UrlSpec {
    Literal(String),
    Var(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexKey {
    Number(usize),
    Var(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Index { var: String, index: IndexKey },
    Length(String),
    Split { var: String, sep: String },
    Binary {
        lhs: Box<Expr>,
        op: ArithOp,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CmpOp {
    pub fn from_lexeme(op: &str) -> Option<CmpOp> {
        match op {
            "==" => Some(CmpOp::Eq),
            "!=" => Some(CmpOp::Ne),
            ">" => Some(CmpOp::Gt),
            "<" => Some(CmpOp::Lt),
            ">=" => Some(CmpOp::Ge),
            "<=" => Some(CmpOp::Le),
            _ => None,
        }
    }
}

/// One side of a comparison. `Status` and `Response` read the last-response
/// snapshot; literals are variable-expanded at evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    Var(String),
    Index { var: String, index: IndexKey },
    Status,
    Response,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Or(Box<Condition>, Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
    Cmp {
        lhs: Operand,
        op: CmpOp,
        rhs: Operand,
    },
    Contains {
        lhs: Operand,
        rhs: Operand,
    },
    Matches {
        lhs: Operand,
        pattern: String,
    },
    Empty(Operand),
    Exists(Operand),
    Truthy(Operand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractKind {
    Status,
    Header,
    JsonPath,
    Regex,
    XPath,
}

impl ExtractKind {
    pub fn from_keyword(word: &str) -> Option<ExtractKind> {
        match word {
            "status" => Some(ExtractKind::Status),
            "header" => Some(ExtractKind::Header),
            "jsonpath" => Some(ExtractKind::JsonPath),
            "regex" => Some(ExtractKind::Regex),
            "xpath" => Some(ExtractKind::XPath),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Assertion {
    Status(u16),
    TimeLess(u64),
    ResponseContains(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Millis,
    Seconds,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrintArg {
    Text(String),
    Var(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Request {
        method: Method,
        url: UrlSpec,
        options: RequestOptions,
    },
    Set {
        name: String,
        expr: Expr,
    },
    Extract {
        kind: ExtractKind,
        pattern: Option<String>,
        var: String,
    },
    Print(PrintArg),
    Log(String),
    Debug(String),
    Assert(Assertion),
    Wait {
        amount: f64,
        unit: TimeUnit,
    },
    ClearCookies,
    Reset,
    BaseUrl(String),
    Break,
    Continue,
    IfInline {
        cond: Condition,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
}

impl Stmt {
    /// Short human label used by dry-run output.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::Request { .. } => "request",
            Stmt::Set { .. } => "set",
            Stmt::Extract { .. } => "extract",
            Stmt::Print(_) => "print",
            Stmt::Log(_) => "log",
            Stmt::Debug(_) => "debug",
            Stmt::Assert(_) => "assert",
            Stmt::Wait { .. } => "wait",
            Stmt::ClearCookies => "clear cookies",
            Stmt::Reset => "reset",
            Stmt::BaseUrl(_) => "base url",
            Stmt::Break => "break",
            Stmt::Continue => "continue",
            Stmt::IfInline { .. } => "if",
        }
    }
}
