use kelp_core::{Environment, Value};
use rustyline::{DefaultEditor, error::ReadlineError};

fn print_repl_help() {
    eprintln!("Commands: :quit | :exit | :q, :help, :trace");
}

/// Continue reading while brackets are open. Brackets inside strings, char
/// literals and comments are ignored.
pub(crate) fn should_continue_multiline(buf: &str) -> bool {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut chars = buf.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_string {
            match ch {
                '\\' => {
                    chars.next();
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            ';' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '#' if chars.peek() == Some(&'\\') => {
                chars.next();
                chars.next();
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    in_string || depth > 0
}

/// Evaluate one REPL entry. On error the captured trace is handed back and the
/// environment is reset so the next entry starts from a clean stack.
pub(crate) fn eval_entry(env: &mut Environment, src: &str) -> Result<Value, (anyhow::Error, Option<String>)> {
    env.eval_str(src).map_err(|e| {
        let trace = env.stack_trace().map(str::to_string);
        env.clear();
        (e, trace)
    })
}

pub fn run(env: &mut Environment) -> anyhow::Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut last_trace: Option<String> = None;

    print_repl_help();

    loop {
        let mut acc = String::new();
        loop {
            let prompt = if acc.is_empty() { "kelp> " } else { "...   " };
            match rl.readline(prompt) {
                Ok(line) => {
                    let trimmed = line.trim_end();

                    if acc.is_empty() && trimmed.starts_with(':') {
                        match trimmed {
                            ":quit" | ":exit" | ":q" => return Ok(()),
                            ":help" => print_repl_help(),
                            ":trace" => match &last_trace {
                                Some(t) => eprint!("{}", t),
                                None => eprintln!("no error recorded"),
                            },
                            _ => eprintln!("Unknown command. Type :help for help."),
                        }
                        break;
                    }

                    acc.push_str(trimmed);
                    acc.push('\n');
                    if !should_continue_multiline(&acc) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    acc.clear();
                    eprintln!("^C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    if acc.trim().is_empty() {
                        println!();
                        return Ok(());
                    }
                    break;
                }
                Err(e) => {
                    eprintln!("Readline error: {}", e);
                    continue;
                }
            }
        }

        let src = acc.trim();
        if src.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(src);

        match eval_entry(env, src) {
            Ok(Value::Nil) => {}
            Ok(v) => println!("{}", v),
            Err((e, trace)) => {
                eprintln!("Error: {:#}", e);
                if let Some(t) = &trace {
                    eprint!("{}", t);
                }
                last_trace = trace;
            }
        }
    }
}
