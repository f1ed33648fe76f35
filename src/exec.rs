// ABOUTME: Statement actions: side effects on the variable store and HTTP engine

use crate::ast::{Assertion, Auth, PrintArg, RequestOptions, Stmt, TimeUnit, UrlSpec};
use crate::context::{AssertMode, Context};
use crate::error::ScriptError;
use crate::eval::{eval_condition, eval_expr};
use crate::http::HttpEngine;
use crate::value::Value;

/// Execute one parsed statement. Actions return a value describing the
/// effect (usually a string) for the caller to optionally print. `break`
/// and `continue` set flags on the context; the enclosing loop consumes
/// them.
pub fn exec_statement(
    stmt: &Stmt,
    ctx: &mut Context,
    engine: &mut HttpEngine,
) -> Result<Value, ScriptError> {
    match stmt {
        Stmt::Request {
            method,
            url,
            options,
        } => {
            let url = match url {
                UrlSpec::Literal(text) => ctx.expand(text),
                UrlSpec::Var(name) => ctx
                    .get_var(name)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            };
            let options = expand_options(options, ctx);
            Ok(engine.execute(*method, &url, &options))
        }

        Stmt::Set { name, expr } => {
            let value = eval_expr(expr, ctx)?;
            let description = format!("{} = {}", name, value);
            ctx.set_var(name.clone(), value);
            Ok(Value::Str(description))
        }

        Stmt::Extract { kind, pattern, var } => {
            let pattern = pattern.as_ref().map(|p| ctx.expand(p));
            let (value, warning) = engine.extract(*kind, pattern.as_deref());
            let description = match &warning {
                Some(warning) => {
                    log::warn!("extract: {}", warning);
                    ctx.push_log(format!("warning: {}", warning));
                    format!("warning: {}", warning)
                }
                None => format!("{} = {}", var, value),
            };
            ctx.set_var(var.clone(), value);
            Ok(Value::Str(description))
        }

        Stmt::Print(arg) => {
            let line = match arg {
                PrintArg::Text(text) => ctx.expand(text),
                PrintArg::Var(name) => {
                    let rendered = ctx
                        .get_var(name)
                        .map(|v| v.to_string())
                        .unwrap_or_default();
                    format!("${} = {}", name, rendered)
                }
            };
            println!("{}", line);
            ctx.push_printed(line.clone());
            Ok(Value::Str(line))
        }

        Stmt::Log(message) => {
            let message = ctx.expand(message);
            log::info!("{}", message);
            ctx.push_log(message.clone());
            Ok(Value::Str(message))
        }

        Stmt::Debug(message) => {
            let message = ctx.expand(message);
            log::debug!("{}", message);
            ctx.push_log(format!("debug: {}", message));
            Ok(Value::Str(message))
        }

        Stmt::Assert(assertion) => {
            let assertion = match assertion {
                Assertion::ResponseContains(needle) => {
                    Assertion::ResponseContains(ctx.expand(needle))
                }
                other => other.clone(),
            };
            match engine.check_assertion(&assertion) {
                Ok(description) => Ok(Value::Str(description)),
                Err(err) if ctx.assert_mode() == AssertMode::Record => {
                    let message = err.to_string();
                    ctx.record_failure(message.clone());
                    Ok(Value::Str(message))
                }
                Err(err) => Err(err),
            }
        }

        Stmt::Wait { amount, unit } => {
            let ms = match unit {
                TimeUnit::Millis => *amount,
                TimeUnit::Seconds => amount * 1000.0,
            };
            std::thread::sleep(std::time::Duration::from_millis(ms.max(0.0) as u64));
            Ok(Value::Str(format!("waited {} ms", ms.max(0.0) as u64)))
        }

        Stmt::ClearCookies => {
            engine.clear_cookies();
            Ok(Value::Str("cookies cleared".to_string()))
        }

        Stmt::Reset => {
            engine.reset();
            ctx.clear_vars();
            ctx.clear_flags();
            Ok(Value::Str("reset".to_string()))
        }

        Stmt::BaseUrl(url) => {
            let url = ctx.expand(url);
            engine.set_base_url(url.clone());
            Ok(Value::Str(format!("base url {}", url)))
        }

        Stmt::Break => {
            ctx.break_flag = true;
            Ok(Value::Null)
        }

        Stmt::Continue => {
            ctx.continue_flag = true;
            Ok(Value::Null)
        }

        Stmt::IfInline {
            cond,
            then_branch,
            else_branch,
        } => {
            // Exactly one branch executes, never both.
            if eval_condition(cond, ctx, engine.last())? {
                exec_statement(then_branch, ctx, engine)
            } else if let Some(else_branch) = else_branch {
                exec_statement(else_branch, ctx, engine)
            } else {
                Ok(Value::Null)
            }
        }
    }
}

/// Variable-expand the string-valued request options: URL handling lives
/// with the caller; header values, body, JSON payload, and auth credentials
/// expand here.
fn expand_options(options: &RequestOptions, ctx: &Context) -> RequestOptions {
    RequestOptions {
        headers: options
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), ctx.expand(value)))
            .collect(),
        body: options.body.as_ref().map(|b| ctx.expand(b)),
        json: options.json.as_ref().map(|j| ctx.expand(j)),
        auth: options.auth.as_ref().map(|auth| match auth {
            Auth::Basic { user, pass } => Auth::Basic {
                user: ctx.expand(user),
                pass: ctx.expand(pass),
            },
            Auth::Bearer(token) => Auth::Bearer(ctx.expand(token)),
        }),
        timeout_ms: options.timeout_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parse_statement;
    use crate::token::tokenize;

    fn run(src: &str, ctx: &mut Context, engine: &mut HttpEngine) -> Result<Value, ScriptError> {
        let stmt = parse_statement(&tokenize(src).unwrap())?;
        exec_statement(&stmt, ctx, engine)
    }

    #[test]
    fn test_set_and_print_variable() {
        let mut ctx = Context::new();
        let mut engine = HttpEngine::new();

        run("set $x 5", &mut ctx, &mut engine).unwrap();
        assert_eq!(ctx.get_var("x"), Some(&Value::Number(5.0)));

        run("print $x", &mut ctx, &mut engine).unwrap();
        assert_eq!(ctx.printed(), &["$x = 5".to_string()]);
    }

    #[test]
    fn test_print_expands_text() {
        let mut ctx = Context::new();
        let mut engine = HttpEngine::new();
        ctx.set_var("f", Value::Str("x".into()));

        run(r#"print "item: $f""#, &mut ctx, &mut engine).unwrap();
        assert_eq!(ctx.printed(), &["item: x".to_string()]);
    }

    #[test]
    fn test_inline_if_runs_exactly_one_branch() {
        let mut ctx = Context::new();
        let mut engine = HttpEngine::new();

        run(
            r#"if 5 > 3 then set $a "Y" else set $a "N""#,
            &mut ctx,
            &mut engine,
        )
        .unwrap();
        assert_eq!(ctx.get_var("a"), Some(&Value::Str("Y".into())));

        run(
            r#"if 2 > 3 then set $b "Y" else set $b "N""#,
            &mut ctx,
            &mut engine,
        )
        .unwrap();
        assert_eq!(ctx.get_var("b"), Some(&Value::Str("N".into())));

        // false condition, no else: nothing happens
        run(r#"if 2 > 3 then set $c "Y""#, &mut ctx, &mut engine).unwrap();
        assert!(ctx.get_var("c").is_none());
    }

    #[test]
    fn test_break_and_continue_set_flags() {
        let mut ctx = Context::new();
        let mut engine = HttpEngine::new();

        run("break", &mut ctx, &mut engine).unwrap();
        assert!(ctx.break_flag);
        ctx.clear_flags();

        run("continue", &mut ctx, &mut engine).unwrap();
        assert!(ctx.continue_flag);
    }

    #[test]
    fn test_assert_record_mode_continues() {
        let mut ctx = Context::new();
        let mut engine = HttpEngine::new();
        ctx.set_assert_mode(AssertMode::Record);

        // No response: status is 0, so this fails, but in record mode
        // execution continues and the failure is collected.
        let result = run("assert status 200", &mut ctx, &mut engine);
        assert!(result.is_ok());
        assert_eq!(ctx.failures().len(), 1);

        ctx.set_assert_mode(AssertMode::Halt);
        assert!(run("assert status 200", &mut ctx, &mut engine).is_err());
    }

    #[test]
    fn test_extract_before_request_writes_empty_and_warns() {
        let mut ctx = Context::new();
        let mut engine = HttpEngine::new();

        let result = run(r#"extract jsonpath "$.a" as $v"#, &mut ctx, &mut engine).unwrap();
        assert_eq!(ctx.get_var("v"), Some(&Value::Str(String::new())));
        assert!(matches!(result, Value::Str(ref s) if s.contains("warning")));
    }

    #[test]
    fn test_base_url_and_reset() {
        let mut ctx = Context::new();
        let mut engine = HttpEngine::new();

        run(r#"base url "http://api.local""#, &mut ctx, &mut engine).unwrap();
        assert_eq!(engine.base_url(), Some("http://api.local"));

        ctx.set_var("x", Value::Number(1.0));
        run("reset", &mut ctx, &mut engine).unwrap();
        assert!(engine.base_url().is_none());
        assert!(ctx.get_var("x").is_none());
    }
}
