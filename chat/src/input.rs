use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::command::Interpreter;
use crate::error::Result;

/// Feed operator lines from `reader` to `interpreter` until EOF.
///
/// `prompt` is written before every read. Empty lines are skipped.
pub async fn run_input<R>(reader: R, interpreter: &Interpreter, prompt: &str) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        interpreter.console().prompt(prompt);
        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        if line.is_empty() {
            continue;
        }
        interpreter.execute(&line).await;
    }
}

/// [`run_input`] over the process stdin.
pub async fn run_stdin(interpreter: &Interpreter, prompt: &str) -> Result<()> {
    run_input(BufReader::new(tokio::io::stdin()), interpreter, prompt).await
}
