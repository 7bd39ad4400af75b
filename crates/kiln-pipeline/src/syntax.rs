//! JavaScript parsing shared by import scanning, minification and lowering.

use oxc_allocator::Allocator;
use oxc_ast::ast::{Argument, CallExpression, Expression, ModuleExportName, Program};
use oxc_parser::Parser;
use oxc_span::SourceType;
use thiserror::Error;

/// Script source that does not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Prefix the message with the module it came from.
    pub fn in_module(self, module: &str) -> Self {
        Self::new(format!("{module}: {}", self.message))
    }
}

/// Parse `code` as an ES module.
///
/// Sources that are only valid as sloppy-mode scripts, like some CommonJS
/// packages, are parsed again as a classic script before giving up.
pub(crate) fn parse<'a>(allocator: &'a Allocator, code: &'a str) -> Result<Program<'a>, SyntaxError> {
    let module = Parser::new(allocator, code, SourceType::mjs()).parse();
    if !module.panicked && module.errors.is_empty() {
        return Ok(module.program);
    }

    let script = Parser::new(allocator, code, SourceType::cjs()).parse();
    if !script.panicked && script.errors.is_empty() {
        return Ok(script.program);
    }

    let message = module
        .errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    if message.is_empty() {
        Err(SyntaxError::new("unexpected end of input"))
    } else {
        Err(SyntaxError::new(message))
    }
}

/// The specifier of `import("x")`; `None` for computed sources.
pub(crate) fn literal_source(expr: &Expression<'_>) -> Option<String> {
    match expr {
        Expression::StringLiteral(lit) => Some(lit.value.to_string()),
        _ => None,
    }
}

/// The specifier of a `require("x")` call.
pub(crate) fn require_specifier(call: &CallExpression<'_>) -> Option<String> {
    let Expression::Identifier(callee) = &call.callee else {
        return None;
    };
    if callee.name.as_str() != "require" || call.arguments.len() != 1 {
        return None;
    }
    match &call.arguments[0] {
        Argument::StringLiteral(lit) => Some(lit.value.to_string()),
        _ => None,
    }
}

pub(crate) fn export_name(name: &ModuleExportName<'_>) -> String {
    match name {
        ModuleExportName::IdentifierName(ident) => ident.name.to_string(),
        ModuleExportName::IdentifierReference(ident) => ident.name.to_string(),
        ModuleExportName::StringLiteral(lit) => lit.value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modules_and_sloppy_scripts_parse() {
        let allocator = Allocator::default();
        assert!(parse(&allocator, "export const a = 1").is_ok());
        // Octal literals are rejected in strict mode only.
        assert!(parse(&allocator, "var mode = 0644; module.exports = mode").is_ok());
    }

    #[test]
    fn syntax_errors_carry_a_message() {
        let allocator = Allocator::default();
        let err = parse(&allocator, "const = ;").unwrap_err();
        assert!(!err.message.is_empty());
        assert!(err.in_module("./src/a.js").message.starts_with("./src/a.js: "));
    }
}
