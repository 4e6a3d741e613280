//! Guard evaluation for edges leaving exclusive gateways.
//!
//! Guards arrive as authored in the designer: variables wrapped in `{{ }}`
//! and comparison operators HTML-escaped. [`normalize`] rewrites them into
//! the plain expression language, [`Guard::parse`] compiles that, and
//! [`evaluate`] runs it against an instance's variables.

pub mod value;
pub mod lexer;
pub mod parser;

use regex::Regex;
use std::sync::LazyLock;
use tracing::error;

use crate::errors::{EngineError, EngineResult};
pub use parser::{BinaryOp, Expr, UnaryOp};
pub use value::{VariableValue, Variables};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("placeholder pattern is valid")
});

/// Strip `{{name}}` markers to bare names and unescape HTML entities.
pub fn normalize(expression: &str) -> String {
    let stripped = PLACEHOLDER.replace_all(expression, "$1");
    stripped
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

/// A parsed guard expression, ready to run against any environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    source: String,
    expr: Expr,
}

impl Guard {
    /// Normalize and compile an authored expression.
    pub fn parse(expression: &str) -> EngineResult<Self> {
        let source = normalize(expression);
        let expr = parser::Parser::parse(&source)
            .map_err(|reason| EngineError::evaluation(&source, reason))?;
        Ok(Self { source, expr })
    }

    /// Normalized source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate to a boolean. The environment is only read.
    pub fn evaluate(&self, variables: &Variables) -> EngineResult<bool> {
        match self.expr.eval(variables) {
            Ok(VariableValue::Bool(result)) => Ok(result),
            Ok(other) => Err(EngineError::evaluation(
                &self.source,
                format!("expected a boolean result, got {}", other.type_name()),
            )),
            Err(reason) => Err(EngineError::evaluation(&self.source, reason)),
        }
    }
}

/// Parse and evaluate `expression` against `variables`.
pub fn evaluate(expression: &str, variables: &Variables) -> EngineResult<bool> {
    Guard::parse(expression)
        .and_then(|guard| guard.evaluate(variables))
        .inspect_err(|e| {
            error!(
                expression = %normalize(expression),
                variables = ?variables,
                error = %e,
                "Guard evaluation failed"
            );
        })
}
