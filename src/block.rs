// ABOUTME: Line-oriented block preprocessor: multi-line constructs, loops, signals

use crate::context::Context;
use crate::error::ScriptError;
use crate::eval::eval_condition_str;
use crate::exec::exec_statement;
use crate::grammar;
use crate::http::HttpEngine;
use crate::token::{tokenize, METHODS};
use crate::value::Value;

/// The hard cap on `while` iterations guarding runaway loops.
const WHILE_ITERATION_CAP: usize = 1000;

/// One pass through a statement sequence: the values each statement
/// produced plus the loop-control flags observed. Flags propagate through
/// nested `if` bodies and stop at the innermost enclosing loop.
#[derive(Debug, Default)]
pub struct LoopResult {
    pub outputs: Vec<Value>,
    pub should_break: bool,
    pub should_continue: bool,
}

impl LoopResult {
    fn signalled(&self) -> bool {
        self.should_break || self.should_continue
    }
}

/// Execute a whole script, block-aware. Returns the last statement's value.
pub fn run_script(
    src: &str,
    ctx: &mut Context,
    engine: &mut HttpEngine,
) -> Result<Value, ScriptError> {
    let lines = number_lines(src);
    let result = process_lines(&lines, ctx, engine)?;

    // A signal that reached the top level had no loop to consume it.
    if result.should_break {
        return Err(ScriptError::StrayControlFlow("break".to_string()));
    }
    if result.should_continue {
        return Err(ScriptError::StrayControlFlow("continue".to_string()));
    }

    Ok(result.outputs.into_iter().last().unwrap_or(Value::Null))
}

/// Parse-only walk for validate/dry-run: checks block structure and grammar
/// for every dispatchable line without executing anything. Returns the
/// recognized statements as (line, description) pairs.
pub fn check_script(src: &str) -> Result<Vec<(usize, String)>, ScriptError> {
    let lines = number_lines(src);
    let mut outline = Vec::new();
    check_lines(&lines, &mut outline)?;
    Ok(outline)
}

fn number_lines(src: &str) -> Vec<(usize, String)> {
    src.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.to_string()))
        .collect()
}

/// Strip a trailing `#` comment, honoring double-quoted strings.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escape = false;
    for (i, c) in line.char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if c == '#' {
            return &line[..i];
        }
    }
    line
}

fn ends_with_word(text: &str, word: &str) -> bool {
    text == word || text.ends_with(&format!(" {}", word))
}

fn is_request_line(text: &str) -> bool {
    METHODS
        .iter()
        .any(|m| text == *m || text.starts_with(&format!("{} ", m)))
}

/// An indented `header` continuation belonging to the request line above.
fn is_header_continuation(raw: &str) -> bool {
    raw.starts_with("    ") && raw.trim_start().starts_with("header ")
}

fn is_block_opener(text: &str) -> bool {
    (text.starts_with("if ") && ends_with_word(text, "then")) || ends_with_word(text, "do")
}

/// What kind of line this is, after trimming and comment stripping.
enum LineClass<'a> {
    Skip,
    Request,
    IfBlock(&'a str),
    WhileBlock(&'a str),
    ForeachBlock { var: &'a str, list: &'a str },
    RepeatBlock(&'a str),
    SingleLineLoop { header: &'a str, body: &'a str },
    Break,
    Continue,
    StrayTerminator(&'a str),
    Plain,
}

fn classify(text: &'_ str) -> Result<LineClass<'_>, ScriptError> {
    if text.is_empty() || text.starts_with("//") {
        return Ok(LineClass::Skip);
    }
    if is_request_line(text) {
        return Ok(LineClass::Request);
    }
    if text == "break" {
        return Ok(LineClass::Break);
    }
    if text == "continue" {
        return Ok(LineClass::Continue);
    }
    if text == "else" || text == "endif" || text == "endloop" {
        return Ok(LineClass::StrayTerminator(text));
    }

    if text.starts_with("if ") && ends_with_word(text, "then") {
        let cond = text["if ".len()..text.len() - "then".len()].trim();
        if cond.is_empty() {
            return Err(ScriptError::syntax("if: missing condition"));
        }
        return Ok(LineClass::IfBlock(cond));
    }

    for keyword in ["while ", "foreach ", "repeat "] {
        if !text.starts_with(keyword) {
            continue;
        }
        // Single-line loop: `while c do stmt endloop`
        if ends_with_word(text, "endloop") {
            let without_end = text[..text.len() - "endloop".len()].trim_end();
            let do_pos = without_end
                .find(" do ")
                .ok_or_else(|| ScriptError::syntax(format!("{}: missing 'do'", keyword.trim())))?;
            return Ok(LineClass::SingleLineLoop {
                header: without_end[..do_pos].trim_end(),
                body: without_end[do_pos + " do ".len()..].trim(),
            });
        }
        if !ends_with_word(text, "do") {
            return Err(ScriptError::syntax(format!(
                "{}: expected the line to end with 'do'",
                keyword.trim()
            )));
        }
        let header = text[..text.len() - "do".len()].trim_end();
        return classify_loop_header(header);
    }

    Ok(LineClass::Plain)
}

/// Split a loop header (without the trailing `do`) into its kind.
fn classify_loop_header(header: &str) -> Result<LineClass<'_>, ScriptError> {
    if let Some(cond) = header.strip_prefix("while ") {
        let cond = cond.trim();
        if cond.is_empty() {
            return Err(ScriptError::syntax("while: missing condition"));
        }
        return Ok(LineClass::WhileBlock(cond));
    }
    if let Some(rest) = header.strip_prefix("foreach ") {
        let rest = rest.trim();
        let var = rest
            .strip_prefix('$')
            .and_then(|r| r.split_whitespace().next())
            .ok_or_else(|| ScriptError::syntax("foreach: expected a $variable"))?;
        let after_var = rest[1 + var.len()..].trim_start();
        let list = after_var
            .strip_prefix("in ")
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| ScriptError::syntax("foreach: expected 'in <list>'"))?;
        return Ok(LineClass::ForeachBlock { var, list });
    }
    if let Some(rest) = header.strip_prefix("repeat ") {
        let count = rest
            .strip_suffix(" times")
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ScriptError::syntax("repeat: expected '<count> times'"))?;
        return Ok(LineClass::RepeatBlock(count));
    }
    Err(ScriptError::syntax(format!(
        "unrecognized loop header '{}'",
        header
    )))
}

/// Walk a statement sequence, dispatching each logical unit. Returns as soon
/// as a break/continue signal is observed so it can propagate outward.
fn process_lines(
    lines: &[(usize, String)],
    ctx: &mut Context,
    engine: &mut HttpEngine,
) -> Result<LoopResult, ScriptError> {
    let mut result = LoopResult::default();
    let mut i = 0;

    while i < lines.len() {
        let (line_no, raw) = &lines[i];
        let line_no = *line_no;
        let text = strip_comment(raw).trim().to_string();

        match classify(&text).map_err(|e| e.at_line(line_no))? {
            LineClass::Skip => {
                i += 1;
            }

            LineClass::Request => {
                // Join indented header continuations onto the request line.
                let mut composed = text.clone();
                let mut j = i + 1;
                while j < lines.len() && is_header_continuation(&lines[j].1) {
                    composed.push(' ');
                    composed.push_str(strip_comment(&lines[j].1).trim());
                    j += 1;
                }
                let value = exec_line(&composed, line_no, ctx, engine)?;
                push_output(&mut result, value);
                i = j;
                if observe_flags(ctx, &mut result) {
                    return Ok(result);
                }
            }

            LineClass::IfBlock(cond) => {
                let (then_block, else_block, end) =
                    scan_if_block(lines, i + 1).map_err(|e| e.at_line(line_no))?;

                let chosen = if eval_condition_str(cond, ctx, engine.last())
                    .map_err(|e| e.at_line(line_no))?
                {
                    Some(then_block)
                } else {
                    else_block
                };

                if let Some(block) = chosen {
                    let sub = process_lines(block, ctx, engine)?;
                    let signalled = sub.signalled();
                    let should_break = sub.should_break;
                    let should_continue = sub.should_continue;
                    result.outputs.extend(sub.outputs);
                    if signalled {
                        result.should_break = should_break;
                        result.should_continue = should_continue;
                        return Ok(result);
                    }
                }
                i = end + 1;
            }

            LineClass::WhileBlock(cond) => {
                let cond = cond.to_string();
                let (body, end) = scan_loop_block(lines, i + 1).map_err(|e| e.at_line(line_no))?;
                run_while(&cond, body, line_no, ctx, engine, &mut result)?;
                i = end + 1;
            }

            LineClass::ForeachBlock { var, list } => {
                let var = var.to_string();
                let list = list.to_string();
                let (body, end) = scan_loop_block(lines, i + 1).map_err(|e| e.at_line(line_no))?;
                run_foreach(&var, &list, body, line_no, ctx, engine, &mut result)?;
                i = end + 1;
            }

            LineClass::RepeatBlock(count) => {
                let count = count.to_string();
                let (body, end) = scan_loop_block(lines, i + 1).map_err(|e| e.at_line(line_no))?;
                run_repeat(&count, body, line_no, ctx, engine, &mut result)?;
                i = end + 1;
            }

            LineClass::SingleLineLoop { header, body } => {
                let header = header.to_string();
                let body_lines = vec![(line_no, body.to_string())];
                match classify_loop_header(&header).map_err(|e| e.at_line(line_no))? {
                    LineClass::WhileBlock(cond) => {
                        run_while(cond, &body_lines, line_no, ctx, engine, &mut result)?
                    }
                    LineClass::ForeachBlock { var, list } => {
                        run_foreach(var, list, &body_lines, line_no, ctx, engine, &mut result)?
                    }
                    LineClass::RepeatBlock(count) => {
                        run_repeat(count, &body_lines, line_no, ctx, engine, &mut result)?
                    }
                    _ => unreachable!("classify_loop_header yields loop classes only"),
                }
                i += 1;
            }

            LineClass::Break => {
                result.should_break = true;
                return Ok(result);
            }

            LineClass::Continue => {
                result.should_continue = true;
                return Ok(result);
            }

            LineClass::StrayTerminator(word) => {
                return Err(
                    ScriptError::structural(format!("unmatched '{}'", word)).at_line(line_no)
                );
            }

            LineClass::Plain => {
                let value = exec_line(&text, line_no, ctx, engine)?;
                push_output(&mut result, value);
                i += 1;
                // A single-line `if ... then break` sets a flag via the
                // grammar path; surface it here.
                if observe_flags(ctx, &mut result) {
                    return Ok(result);
                }
            }
        }
    }

    Ok(result)
}

/// Move break/continue flags off the context into the result. Returns true
/// when a signal was observed.
fn observe_flags(ctx: &mut Context, result: &mut LoopResult) -> bool {
    if ctx.break_flag {
        ctx.clear_flags();
        result.should_break = true;
        return true;
    }
    if ctx.continue_flag {
        ctx.clear_flags();
        result.should_continue = true;
        return true;
    }
    false
}

fn push_output(result: &mut LoopResult, value: Value) {
    if value != Value::Null {
        result.outputs.push(value);
    }
}

fn exec_line(
    text: &str,
    line_no: usize,
    ctx: &mut Context,
    engine: &mut HttpEngine,
) -> Result<Value, ScriptError> {
    let tokens = tokenize(text).map_err(|e| e.at_line(line_no))?;
    let stmt = grammar::parse_statement(&tokens).map_err(|e| e.at_line(line_no))?;
    exec_statement(&stmt, ctx, engine).map_err(|e| e.at_line(line_no))
}

// ============================================================================
// Block extraction
// ============================================================================

/// Scan forward from an `if ... then` opener, returning the then-block, the
/// optional else-block, and the index of the matching `endif`. A single
/// nesting level tracks every opener; an `else` at level 1 partitions.
fn scan_if_block<'a>(
    lines: &'a [(usize, String)],
    start: usize,
) -> Result<(&'a [(usize, String)], Option<&'a [(usize, String)]>, usize), ScriptError> {
    let mut level = 1usize;
    let mut else_at: Option<usize> = None;

    for (k, (_, raw)) in lines.iter().enumerate().skip(start) {
        let text = strip_comment(raw).trim();
        if is_block_opener(text) {
            level += 1;
        } else if text == "endif" || text == "endloop" {
            level -= 1;
            if level == 0 {
                if text != "endif" {
                    return Err(ScriptError::structural("expected 'endif', found 'endloop'"));
                }
                return Ok(match else_at {
                    Some(e) => (&lines[start..e], Some(&lines[e + 1..k]), k),
                    None => (&lines[start..k], None, k),
                });
            }
        } else if text == "else" && level == 1 {
            else_at = Some(k);
        }
    }

    Err(ScriptError::structural("'if' block never reaches 'endif'"))
}

/// Scan forward from a loop opener to its matching `endloop`.
fn scan_loop_block<'a>(
    lines: &'a [(usize, String)],
    start: usize,
) -> Result<(&'a [(usize, String)], usize), ScriptError> {
    let mut level = 1usize;

    for (k, (_, raw)) in lines.iter().enumerate().skip(start) {
        let text = strip_comment(raw).trim();
        if is_block_opener(text) {
            level += 1;
        } else if text == "endif" || text == "endloop" {
            level -= 1;
            if level == 0 {
                if text != "endloop" {
                    return Err(ScriptError::structural("expected 'endloop', found 'endif'"));
                }
                return Ok((&lines[start..k], k));
            }
        }
    }

    Err(ScriptError::structural("loop never reaches 'endloop'"))
}

// ============================================================================
// Loop frames
// ============================================================================

fn bind_loop_vars(ctx: &mut Context, index: usize) {
    ctx.set_var("_index", Value::Number(index as f64));
    ctx.set_var("_iteration", Value::Number((index + 1) as f64));
}

fn run_while(
    cond: &str,
    body: &[(usize, String)],
    line_no: usize,
    ctx: &mut Context,
    engine: &mut HttpEngine,
    result: &mut LoopResult,
) -> Result<(), ScriptError> {
    // Parse once, re-evaluate every iteration.
    let cond_ast = tokenize(cond)
        .and_then(|toks| grammar::parse_condition(&toks))
        .map_err(|e| e.at_line(line_no))?;

    let mut index = 0usize;
    loop {
        if index >= WHILE_ITERATION_CAP {
            log::warn!("while loop at line {} hit the {} iteration cap", line_no, WHILE_ITERATION_CAP);
            return Err(ScriptError::semantic(format!(
                "while loop exceeded {} iterations",
                WHILE_ITERATION_CAP
            ))
            .at_line(line_no));
        }
        if !crate::eval::eval_condition(&cond_ast, ctx, engine.last())
            .map_err(|e| e.at_line(line_no))?
        {
            return Ok(());
        }

        bind_loop_vars(ctx, index);
        let sub = process_lines(body, ctx, engine)?;
        result.outputs.extend(sub.outputs);
        if sub.should_break {
            return Ok(());
        }
        index += 1;
    }
}

fn run_foreach(
    var: &str,
    list: &str,
    body: &[(usize, String)],
    line_no: usize,
    ctx: &mut Context,
    engine: &mut HttpEngine,
    result: &mut LoopResult,
) -> Result<(), ScriptError> {
    let items = foreach_items(list, ctx).map_err(|e| e.at_line(line_no))?;

    for (index, item) in items.into_iter().enumerate() {
        ctx.set_var(var, item);
        bind_loop_vars(ctx, index);
        let sub = process_lines(body, ctx, engine)?;
        result.outputs.extend(sub.outputs);
        if sub.should_break {
            break;
        }
    }
    Ok(())
}

fn run_repeat(
    count: &str,
    body: &[(usize, String)],
    line_no: usize,
    ctx: &mut Context,
    engine: &mut HttpEngine,
    result: &mut LoopResult,
) -> Result<(), ScriptError> {
    let expanded = ctx.expand(count);
    let times = expanded.trim().parse::<f64>().map_err(|_| {
        ScriptError::semantic(format!("repeat: '{}' is not a number", expanded)).at_line(line_no)
    })?;
    let times = if times.is_sign_negative() { 0 } else { times as usize };

    for index in 0..times {
        bind_loop_vars(ctx, index);
        let sub = process_lines(body, ctx, engine)?;
        result.outputs.extend(sub.outputs);
        if sub.should_break {
            break;
        }
    }
    Ok(())
}

/// Resolve the iterable of a `foreach`: a literal JSON array on the line, or
/// a variable holding an array or a string that parses as a JSON array.
/// String elements are trimmed of whitespace and surrounding quotes.
fn foreach_items(list: &str, ctx: &Context) -> Result<Vec<Value>, ScriptError> {
    if list.starts_with('[') {
        let parsed: serde_json::Value = serde_json::from_str(list)
            .map_err(|e| ScriptError::semantic(format!("foreach: invalid array literal: {}", e)))?;
        return match parsed {
            serde_json::Value::Array(items) => {
                Ok(items.iter().map(Value::from_json).map(trim_item).collect())
            }
            _ => Err(ScriptError::semantic("foreach: expected a JSON array")),
        };
    }

    if let Some(name) = list.strip_prefix('$') {
        let value = ctx
            .get_var(name)
            .ok_or_else(|| ScriptError::semantic(format!("unknown variable '{}'", name)))?;
        return match value {
            Value::Array(items) => Ok(items.iter().cloned().map(trim_item).collect()),
            Value::Str(s) => match serde_json::from_str::<serde_json::Value>(s.trim()) {
                Ok(serde_json::Value::Array(items)) => {
                    Ok(items.iter().map(Value::from_json).map(trim_item).collect())
                }
                _ => Err(ScriptError::semantic(format!(
                    "foreach: variable '{}' is not an array",
                    name
                ))),
            },
            other => Err(ScriptError::semantic(format!(
                "foreach: variable '{}' is not an array (got {})",
                name,
                other.type_name()
            ))),
        };
    }

    Err(ScriptError::semantic(
        "foreach: expected an array literal or a $variable",
    ))
}

fn trim_item(value: Value) -> Value {
    match value {
        Value::Str(s) => Value::Str(s.trim().trim_matches('"').to_string()),
        other => other,
    }
}

// ============================================================================
// Validation (dry-run / validate)
// ============================================================================

fn check_lines(
    lines: &[(usize, String)],
    outline: &mut Vec<(usize, String)>,
) -> Result<(), ScriptError> {
    let mut i = 0;

    while i < lines.len() {
        let (line_no, raw) = &lines[i];
        let line_no = *line_no;
        let text = strip_comment(raw).trim().to_string();

        match classify(&text).map_err(|e| e.at_line(line_no))? {
            LineClass::Skip => i += 1,

            LineClass::Request => {
                let mut composed = text.clone();
                let mut j = i + 1;
                while j < lines.len() && is_header_continuation(&lines[j].1) {
                    composed.push(' ');
                    composed.push_str(strip_comment(&lines[j].1).trim());
                    j += 1;
                }
                check_line(&composed, line_no, outline)?;
                i = j;
            }

            LineClass::IfBlock(cond) => {
                let (then_block, else_block, end) =
                    scan_if_block(lines, i + 1).map_err(|e| e.at_line(line_no))?;
                check_condition(cond, line_no)?;
                outline.push((line_no, "if".to_string()));
                check_lines(then_block, outline)?;
                if let Some(block) = else_block {
                    check_lines(block, outline)?;
                }
                i = end + 1;
            }

            LineClass::WhileBlock(cond) => {
                let (body, end) = scan_loop_block(lines, i + 1).map_err(|e| e.at_line(line_no))?;
                check_condition(cond, line_no)?;
                outline.push((line_no, "while".to_string()));
                check_lines(body, outline)?;
                i = end + 1;
            }

            LineClass::ForeachBlock { .. } => {
                let (body, end) = scan_loop_block(lines, i + 1).map_err(|e| e.at_line(line_no))?;
                outline.push((line_no, "foreach".to_string()));
                check_lines(body, outline)?;
                i = end + 1;
            }

            LineClass::RepeatBlock(_) => {
                let (body, end) = scan_loop_block(lines, i + 1).map_err(|e| e.at_line(line_no))?;
                outline.push((line_no, "repeat".to_string()));
                check_lines(body, outline)?;
                i = end + 1;
            }

            LineClass::SingleLineLoop { header, body } => {
                let header = header.to_string();
                if let LineClass::WhileBlock(cond) =
                    classify_loop_header(&header).map_err(|e| e.at_line(line_no))?
                {
                    check_condition(cond, line_no)?;
                }
                outline.push((line_no, "loop".to_string()));
                check_line(body, line_no, outline)?;
                i += 1;
            }

            LineClass::Break => {
                outline.push((line_no, "break".to_string()));
                i += 1;
            }
            LineClass::Continue => {
                outline.push((line_no, "continue".to_string()));
                i += 1;
            }

            LineClass::StrayTerminator(word) => {
                return Err(
                    ScriptError::structural(format!("unmatched '{}'", word)).at_line(line_no)
                );
            }

            LineClass::Plain => {
                check_line(&text, line_no, outline)?;
                i += 1;
            }
        }
    }

    Ok(())
}

fn check_line(
    text: &str,
    line_no: usize,
    outline: &mut Vec<(usize, String)>,
) -> Result<(), ScriptError> {
    let tokens = tokenize(text).map_err(|e| e.at_line(line_no))?;
    let stmt = grammar::parse_statement(&tokens).map_err(|e| e.at_line(line_no))?;
    outline.push((line_no, stmt.kind_name().to_string()));
    Ok(())
}

fn check_condition(cond: &str, line_no: usize) -> Result<(), ScriptError> {
    let tokens = tokenize(cond).map_err(|e| e.at_line(line_no))?;
    grammar::parse_condition(&tokens).map_err(|e| e.at_line(line_no))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> (Context, Result<Value, ScriptError>) {
        let mut ctx = Context::new();
        let mut engine = HttpEngine::new();
        let result = run_script(src, &mut ctx, &mut engine);
        (ctx, result)
    }

    fn var(ctx: &Context, name: &str) -> Value {
        ctx.get_var(name).cloned().unwrap_or(Value::Null)
    }

    #[test]
    fn test_multi_line_if_then_else() {
        let script = "\
set $x 10
if $x > 5 then
set $r \"big\"
else
set $r \"small\"
endif";
        let (ctx, result) = run(script);
        result.unwrap();
        assert_eq!(var(&ctx, "r"), Value::Str("big".into()));
    }

    #[test]
    fn test_else_branch_and_exactly_one_branch() {
        let script = "\
set $hits 0
if 1 > 5 then
set $hits $hits + 1
set $r \"then\"
else
set $hits $hits + 1
set $r \"else\"
endif";
        let (ctx, result) = run(script);
        result.unwrap();
        assert_eq!(var(&ctx, "r"), Value::Str("else".into()));
        assert_eq!(var(&ctx, "hits"), Value::Number(1.0));
    }

    #[test]
    fn test_nested_if_else_stays_with_inner_block() {
        let script = "\
set $x 1
if $x == 1 then
if $x == 2 then
set $r \"inner-then\"
else
set $r \"inner-else\"
endif
endif";
        let (ctx, result) = run(script);
        result.unwrap();
        assert_eq!(var(&ctx, "r"), Value::Str("inner-else".into()));
    }

    #[test]
    fn test_while_loop_counts() {
        let script = "\
set $c 0
while $c < 5 do
set $c $c + 1
endloop";
        let (ctx, result) = run(script);
        result.unwrap();
        assert_eq!(var(&ctx, "c"), Value::Number(5.0));
    }

    #[test]
    fn test_while_cap_aborts_runaway_loop() {
        let script = "\
set $c 0
while 1 == 1 do
set $c $c + 1
endloop";
        let (_, result) = run(script);
        let err = result.unwrap_err();
        assert!(format!("{}", err).contains("1000"));
    }

    #[test]
    fn test_break_inside_nested_if_terminates_while() {
        let script = "\
set $c 0
while $c < 10 do
set $c $c + 1
if $c == 3 then
break
endif
endloop";
        let (ctx, result) = run(script);
        result.unwrap();
        assert_eq!(var(&ctx, "c"), Value::Number(3.0));
    }

    #[test]
    fn test_single_line_if_break_terminates_while() {
        let script = "\
set $c 0
while $c < 10 do
set $c $c + 1
if $c == 3 then break endif
endloop
print $c";
        let (ctx, result) = run(script);
        result.unwrap();
        assert_eq!(var(&ctx, "c"), Value::Number(3.0));
        assert_eq!(ctx.printed(), &["$c = 3".to_string()]);
    }

    #[test]
    fn test_continue_skips_rest_of_iteration() {
        let script = "\
set $sum 0
foreach $i in [1, 2, 3, 4] do
if $i == 2 then continue endif
set $sum $sum + $i
endloop";
        let (ctx, result) = run(script);
        result.unwrap();
        assert_eq!(var(&ctx, "sum"), Value::Number(8.0));
    }

    #[test]
    fn test_foreach_literal_order_and_loop_vars() {
        let script = "\
foreach $f in [\"x\", \"y\", \"z\"] do
print \"item: $f\"
endloop";
        let (ctx, result) = run(script);
        result.unwrap();
        assert_eq!(
            ctx.printed(),
            &[
                "item: x".to_string(),
                "item: y".to_string(),
                "item: z".to_string()
            ]
        );
        // loop vars hold the final iteration's values
        assert_eq!(var(&ctx, "_index"), Value::Number(2.0));
        assert_eq!(var(&ctx, "_iteration"), Value::Number(3.0));
    }

    #[test]
    fn test_foreach_single_line_form() {
        let script = r#"foreach $f in ["x","y","z"] do print "item: $f" endloop"#;
        let (ctx, result) = run(script);
        result.unwrap();
        assert_eq!(ctx.printed().len(), 3);
        assert_eq!(ctx.printed()[0], "item: x");
    }

    #[test]
    fn test_foreach_empty_array_runs_zero_times() {
        let script = "\
set $n 0
foreach $f in [] do
set $n $n + 1
endloop";
        let (ctx, result) = run(script);
        result.unwrap();
        assert_eq!(var(&ctx, "n"), Value::Number(0.0));
    }

    #[test]
    fn test_foreach_over_variable_array_and_json_string() {
        let script = "\
set $xs [\"a\", \"b\"]
set $n 0
foreach $x in $xs do
set $n $n + 1
endloop
set $ys \"[\\\"p\\\", \\\"q\\\", \\\"r\\\"]\"
foreach $y in $ys do
set $n $n + 1
endloop";
        let (ctx, result) = run(script);
        result.unwrap();
        assert_eq!(var(&ctx, "n"), Value::Number(5.0));
    }

    #[test]
    fn test_foreach_non_array_is_semantic_error() {
        let script = "\
set $x 42
foreach $i in $x do
print $i
endloop";
        let (_, result) = run(script);
        assert!(result.is_err());
    }

    #[test]
    fn test_repeat_literal_and_variable_count() {
        let script = "\
set $n 0
repeat 3 times do
set $n $n + 1
endloop
set $k 2
repeat $k times do
set $n $n + 1
endloop";
        let (ctx, result) = run(script);
        result.unwrap();
        assert_eq!(var(&ctx, "n"), Value::Number(5.0));
    }

    #[test]
    fn test_nested_loops_break_stops_inner_only() {
        let script = "\
set $total 0
foreach $i in [1, 2, 3] do
while 1 == 1 do
break
endloop
set $total $total + 1
endloop";
        let (ctx, result) = run(script);
        result.unwrap();
        assert_eq!(var(&ctx, "total"), Value::Number(3.0));
    }

    #[test]
    fn test_unbalanced_if_is_structural_error() {
        let (_, result) = run("if 1 == 1 then\nset $x 1");
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            ScriptError::AtLine { ref source, .. } if matches!(**source, ScriptError::Structural(_))
        ));
    }

    #[test]
    fn test_mismatched_terminator_is_structural_error() {
        let (_, result) = run("while 1 == 1 do\nset $x 1\nendif");
        assert!(result.is_err());
    }

    #[test]
    fn test_top_level_break_is_an_error() {
        let (_, result) = run("set $x 1\nbreak");
        let err = result.unwrap_err();
        assert!(matches!(err, ScriptError::StrayControlFlow(_)));
    }

    #[test]
    fn test_error_carries_line_number() {
        let (_, result) = run("set $x 1\nset $y $x / 0");
        let err = result.unwrap_err();
        assert_eq!(format!("{}", err), "line 2: division by zero");
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let script = "\
# header comment
// also a comment

set $x 1 # trailing
print \"# not a comment $x\"";
        let (ctx, result) = run(script);
        result.unwrap();
        assert_eq!(ctx.printed(), &["# not a comment 1".to_string()]);
    }

    #[test]
    fn test_check_script_validates_without_executing() {
        let script = "\
set $x 1
if $x == 1 then
set $y 2
endif";
        let outline = check_script(script).unwrap();
        let kinds: Vec<&str> = outline.iter().map(|(_, k)| k.as_str()).collect();
        assert_eq!(kinds, vec!["set", "if", "set"]);

        assert!(check_script("while 1 == 1 do\nset $x 1").is_err());
        assert!(check_script("set $x @nope").is_err());
    }

    #[test]
    fn test_deterministic_final_state() {
        let script = "\
set $acc 0
foreach $i in [1, 2, 3] do
set $acc $acc * 2 + $i
endloop";
        let (first, r1) = run(script);
        let (second, r2) = run(script);
        r1.unwrap();
        r2.unwrap();
        assert_eq!(var(&first, "acc"), var(&second, "acc"));
        assert_eq!(var(&first, "acc"), Value::Number(11.0));
    }
}
