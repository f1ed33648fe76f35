// ABOUTME: Interpreter façade owning the variable store, context, and HTTP engine

use crate::block;
use crate::context::{AssertMode, Context};
use crate::error::ScriptError;
use crate::exec::exec_statement;
use crate::grammar;
use crate::http::HttpEngine;
use crate::token::tokenize;
use crate::value::Value;
use std::collections::HashMap;

/// One interpreter instance: a variable store, an execution context, and an
/// HTTP engine wired into the statement actions. Not safe for concurrent
/// use; give each concurrent execution its own instance.
pub struct Interpreter {
    ctx: Context,
    engine: HttpEngine,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            ctx: Context::new(),
            engine: HttpEngine::new(),
        }
    }

    /// Single-line dispatch through the grammar only. Multi-line blocks are
    /// not recognized here; use [`parse_script`](Self::parse_script).
    pub fn parse_line(&mut self, src: &str) -> Result<Value, ScriptError> {
        let tokens = tokenize(src)?;
        if tokens.is_empty() {
            return Ok(Value::Null);
        }
        let stmt = grammar::parse_statement(&tokens)?;
        let value = exec_statement(&stmt, &mut self.ctx, &mut self.engine)?;

        // With no block driver above us there is no loop to consume a signal.
        if self.ctx.break_flag {
            self.ctx.clear_flags();
            return Err(ScriptError::StrayControlFlow("break".to_string()));
        }
        if self.ctx.continue_flag {
            self.ctx.clear_flags();
            return Err(ScriptError::StrayControlFlow("continue".to_string()));
        }
        Ok(value)
    }

    /// Block-aware execution: the canonical entry point.
    pub fn parse_script(&mut self, src: &str) -> Result<Value, ScriptError> {
        block::run_script(src, &mut self.ctx, &mut self.engine)
    }

    /// Parse-only validation; nothing executes and no HTTP is issued.
    /// Returns the recognized statements as (line, description) pairs.
    pub fn check_script(&self, src: &str) -> Result<Vec<(usize, String)>, ScriptError> {
        block::check_script(src)
    }

    // ========================================================================
    // Variable store
    // ========================================================================

    pub fn get_var(&self, name: &str) -> Option<Value> {
        self.ctx.get_var(name).cloned()
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.ctx.set_var(name, value);
    }

    pub fn clear_vars(&mut self) {
        self.ctx.clear_vars();
    }

    pub fn get_vars(&self) -> &HashMap<String, Value> {
        self.ctx.vars()
    }

    /// Bind `ARG1..ARGn` and `ARGC` the way the runner does before a script
    /// executes.
    pub fn set_args(&mut self, args: &[String]) {
        for (i, arg) in args.iter().enumerate() {
            self.ctx
                .set_var(format!("ARG{}", i + 1), Value::Str(arg.clone()));
        }
        self.ctx
            .set_var("ARGC", Value::Number(args.len() as f64));
    }

    // ========================================================================
    // Engine access and run state
    // ========================================================================

    pub fn engine(&self) -> &HttpEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut HttpEngine {
        &mut self.engine
    }

    pub fn set_assert_mode(&mut self, mode: AssertMode) {
        self.ctx.set_assert_mode(mode);
    }

    /// Assertion failures collected in [`AssertMode::Record`].
    pub fn failures(&self) -> &[String] {
        self.ctx.failures()
    }

    /// Lines emitted by `print`, in order.
    pub fn printed(&self) -> &[String] {
        self.ctx.printed()
    }

    /// The log buffer fed by `log` and `debug` statements.
    pub fn log_lines(&self) -> &[String] {
        self.ctx.log_lines()
    }

    /// Wipe variables, context flags, and engine state.
    pub fn reset(&mut self) {
        self.ctx.reset();
        self.engine.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_set_and_get_var() {
        let mut interp = Interpreter::new();
        interp.parse_line("set $x 41").unwrap();
        interp.parse_line("set $x $x + 1").unwrap();
        assert_eq!(interp.get_var("x"), Some(Value::Number(42.0)));
    }

    #[test]
    fn test_parse_line_blank_is_null() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.parse_line("   # just a comment").unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_line_stray_break_errors() {
        let mut interp = Interpreter::new();
        let err = interp.parse_line("break").unwrap_err();
        assert!(matches!(err, ScriptError::StrayControlFlow(_)));
        // the flag must not leak into the next statement
        interp.parse_line("set $x 1").unwrap();
    }

    #[test]
    fn test_parse_script_end_to_end_variables() {
        let mut interp = Interpreter::new();
        interp
            .parse_script(
                "set $a 10\nset $b 5\nset $y $a + $b\nif $y == 15 then set $ok \"yes\" endif",
            )
            .unwrap();
        assert_eq!(interp.get_var("y"), Some(Value::Number(15.0)));
        assert_eq!(interp.get_var("ok"), Some(Value::Str("yes".into())));
    }

    #[test]
    fn test_set_args_binds_argc_and_argn() {
        let mut interp = Interpreter::new();
        interp.set_args(&["alpha".to_string(), "beta".to_string()]);
        assert_eq!(interp.get_var("ARG1"), Some(Value::Str("alpha".into())));
        assert_eq!(interp.get_var("ARG2"), Some(Value::Str("beta".into())));
        assert_eq!(interp.get_var("ARGC"), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut interp = Interpreter::new();
        interp.parse_line("set $x 1").unwrap();
        interp.parse_line(r#"base url "http://h""#).unwrap();
        interp.reset();
        assert!(interp.get_var("x").is_none());
        assert!(interp.engine().base_url().is_none());
    }

    #[test]
    fn test_engine_access_for_advanced_callers() {
        let mut interp = Interpreter::new();
        interp
            .engine_mut()
            .set_default_timeout(std::time::Duration::from_secs(5));
        interp.engine_mut().set_base_url("http://api.local");
        assert_eq!(interp.engine().base_url(), Some("http://api.local"));
    }

    #[test]
    fn test_two_interpreters_are_independent() {
        let mut a = Interpreter::new();
        let mut b = Interpreter::new();
        a.parse_line("set $x 1").unwrap();
        b.parse_line("set $x 2").unwrap();
        assert_eq!(a.get_var("x"), Some(Value::Number(1.0)));
        assert_eq!(b.get_var("x"), Some(Value::Number(2.0)));
    }
}
