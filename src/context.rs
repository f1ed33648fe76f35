// ABOUTME: Shared execution context: variable store, loop flags, output buffers

use crate::value::Value;
use std::collections::HashMap;

/// How assertion failures are handled: `Halt` fails the script immediately
/// (the library default); `Record` collects the failure message and lets
/// execution continue (the runner's report mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssertMode {
    #[default]
    Halt,
    Record,
}

/// State shared by every component of one interpreter: the variable map,
/// the transient break/continue flags, and the log/print buffers. Not safe
/// for concurrent use; each concurrent execution gets its own instance.
#[derive(Debug, Default)]
pub struct Context {
    vars: HashMap<String, Value>,
    pub break_flag: bool,
    pub continue_flag: bool,
    log: Vec<String>,
    printed: Vec<String>,
    assert_mode: AssertMode,
    failures: Vec<String>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    // ========================================================================
    // Variable store
    // ========================================================================

    pub fn get_var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Writes are always total: any value may be bound to any name.
    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn clear_vars(&mut self) {
        self.vars.clear();
    }

    pub fn vars(&self) -> &HashMap<String, Value> {
        &self.vars
    }

    /// Single-pass `$name` expansion. Every occurrence is replaced with the
    /// variable's stringified value; missing variables expand to the empty
    /// string. The result is not re-expanded.
    pub fn expand(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }

            let rest = &text[i + 1..];
            let name_len = rest
                .char_indices()
                .take_while(|(j, c)| {
                    if *j == 0 {
                        c.is_ascii_alphabetic() || *c == '_'
                    } else {
                        c.is_ascii_alphanumeric() || *c == '_'
                    }
                })
                .count();

            if name_len == 0 {
                out.push('$');
                continue;
            }

            let name = &rest[..name_len];
            if let Some(value) = self.vars.get(name) {
                out.push_str(&value.to_string());
            }
            for _ in 0..name_len {
                chars.next();
            }
        }

        out
    }

    // ========================================================================
    // Loop-control flags
    // ========================================================================

    pub fn clear_flags(&mut self) {
        self.break_flag = false;
        self.continue_flag = false;
    }

    // ========================================================================
    // Output buffers
    // ========================================================================

    pub fn push_log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    pub fn log_lines(&self) -> &[String] {
        &self.log
    }

    pub fn push_printed(&mut self, line: impl Into<String>) {
        self.printed.push(line.into());
    }

    pub fn printed(&self) -> &[String] {
        &self.printed
    }

    // ========================================================================
    // Assertion mode
    // ========================================================================

    pub fn set_assert_mode(&mut self, mode: AssertMode) {
        self.assert_mode = mode;
    }

    pub fn assert_mode(&self) -> AssertMode {
        self.assert_mode
    }

    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.failures.push(message.into());
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    /// Full reset: variables, flags, and buffers.
    pub fn reset(&mut self) {
        let mode = self.assert_mode;
        *self = Context::default();
        self.assert_mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut ctx = Context::new();
        ctx.set_var("x", Value::Number(42.0));
        assert_eq!(ctx.get_var("x"), Some(&Value::Number(42.0)));
        assert_eq!(ctx.get_var("missing"), None);
    }

    #[test]
    fn test_expand_basic() {
        let mut ctx = Context::new();
        ctx.set_var("name", Value::Str("bob".into()));
        ctx.set_var("n", Value::Number(3.0));
        assert_eq!(ctx.expand("hello $name, n=$n!"), "hello bob, n=3!");
    }

    #[test]
    fn test_expand_missing_is_empty() {
        let ctx = Context::new();
        assert_eq!(ctx.expand("x=$nope."), "x=.");
    }

    #[test]
    fn test_expand_bare_dollar_preserved() {
        let ctx = Context::new();
        assert_eq!(ctx.expand("cost: $5 and $"), "cost: $5 and $");
    }

    #[test]
    fn test_expand_is_single_pass() {
        let mut ctx = Context::new();
        ctx.set_var("a", Value::Str("$b".into()));
        ctx.set_var("b", Value::Str("deep".into()));
        // $a's value contains $b, which must NOT be expanded again
        assert_eq!(ctx.expand("$a"), "$b");
    }

    #[test]
    fn test_expand_idempotent_once_substituted() {
        let mut ctx = Context::new();
        ctx.set_var("t", Value::Str("token123".into()));
        let once = ctx.expand("Bearer $t");
        assert_eq!(ctx.expand(&once), once);
    }

    #[test]
    fn test_reset_preserves_assert_mode() {
        let mut ctx = Context::new();
        ctx.set_assert_mode(AssertMode::Record);
        ctx.set_var("x", Value::Number(1.0));
        ctx.reset();
        assert!(ctx.get_var("x").is_none());
        assert_eq!(ctx.assert_mode(), AssertMode::Record);
    }
}
