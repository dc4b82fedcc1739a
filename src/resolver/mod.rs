//! Expression resolution for parameter source values.
//!
//! A parameter's `svalue` is evaluated by a [`Resolver`] inside an
//! [`Environment`]: the caller-supplied [`Scope`] plus, during a configuration
//! pass, the values of parameters already resolved. The default
//! [`ExprResolver`] understands a small grammar only:
//!
//! - literals: `42`, `1.5`, `'text'`, `"text"`, `true`, `false`, `null`,
//!   `[1, 2]`, `{key: 1, 'other key': 2}`
//! - names looked up in the environment, `.attr` access on maps, `[i]` indexing
//! - `+ - * / %` with the usual precedence, unary `-`, parentheses
//! - builtin calls: `len str int float bool upper lower min max abs`
//!
//! There is no path to I/O or code execution. The only capability guarded by
//! the `safe` flag is `env(name)`, which reads the process environment and is
//! unknown while `safe` is on.

mod eval;
mod lexer;
mod parser;

use serde_json::{Map, Value};
use thiserror::Error;

/// Caller-supplied name to value bindings. Never mutated by resolution.
pub type Scope = Map<String, Value>;

/// Default for [`ResolveOptions::safe`].
pub const DEFAULT_SAFE: bool = true;
/// Default for [`ResolveOptions::besteffort`].
pub const DEFAULT_BESTEFFORT: bool = true;

/// Errors raised while parsing or evaluating an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("name '{0}' is not defined")]
    UnresolvedName(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("{function}() takes {expected} argument(s), {found} given")]
    Arity {
        function: String,
        expected: &'static str,
        found: usize,
    },

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("numeric overflow")]
    Overflow,

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("key '{0}' not found")]
    MissingKey(String),
}

impl ExprError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }
}

/// Extra name bindings consulted after the scope.
pub trait Bindings {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

/// Everything an expression can see.
#[derive(Clone, Copy)]
pub struct Environment<'a> {
    scope: &'a Scope,
    bindings: Option<&'a dyn Bindings>,
    safe: bool,
}

impl<'a> Environment<'a> {
    pub fn new(scope: &'a Scope, safe: bool) -> Self {
        Self {
            scope,
            bindings: None,
            safe,
        }
    }

    pub fn with_bindings(mut self, bindings: &'a dyn Bindings) -> Self {
        self.bindings = Some(bindings);
        self
    }

    pub fn is_safe(&self) -> bool {
        self.safe
    }

    /// Scope first, then the extra bindings.
    pub fn lookup(&self, name: &str) -> Option<&'a Value> {
        self.scope
            .get(name)
            .or_else(|| self.bindings.and_then(|b| b.lookup(name)))
    }
}

/// Evaluates source expressions.
pub trait Resolver: Send + Sync {
    fn evaluate(&self, expr: &str, env: &Environment<'_>) -> Result<Value, ExprError>;
}

/// Restricted evaluator for the grammar described at module level.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExprResolver;

impl Resolver for ExprResolver {
    fn evaluate(&self, expr: &str, env: &Environment<'_>) -> Result<Value, ExprError> {
        let ast = parser::parse(expr)?;
        eval::eval(&ast, env)
    }
}

/// Scope and policy flags for one resolution pass.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub scope: Scope,
    /// Withhold ambient capabilities (`env`) from expressions.
    pub safe: bool,
    /// Record failures on parameters and keep going instead of aborting.
    pub besteffort: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            scope: Scope::new(),
            safe: DEFAULT_SAFE,
            besteffort: DEFAULT_BESTEFFORT,
        }
    }
}
