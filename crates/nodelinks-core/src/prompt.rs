//! Question/answer capability for interactive flows (first-run setup, mirror selection).

use std::io::{self, BufRead, Write};

use crate::error_handling::utils::{io_error, usage_error};
use crate::error_handling::Result;

pub trait Prompt {
    /// Ask a question and return the trimmed answer. Fails once input is exhausted.
    fn ask(&mut self, question: &str) -> Result<String>;
    /// Show a line of output.
    fn say(&mut self, line: &str);
    /// Start a fresh screen (page redraws). No-op by default.
    fn clear(&mut self) {}
}

/// Terminal prompt over stdin/stdout.
#[derive(Default)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, question: &str) -> Result<String> {
        let mut out = io::stdout();
        write!(out, "{}", question).map_err(|e| io_error("write prompt", None, e))?;
        out.flush().map_err(|e| io_error("flush prompt", None, e))?;
        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| io_error("read answer", None, e))?;
        if read == 0 {
            return Err(usage_error("input closed while waiting for an answer"));
        }
        Ok(line.trim().to_string())
    }

    fn say(&mut self, line: &str) {
        println!("{}", line);
    }

    fn clear(&mut self) {
        if io::IsTerminal::is_terminal(&io::stdout()) {
            print!("\x1Bc");
            let _ = io::stdout().flush();
        }
    }
}

/// Prompt answering from a fixed script; records questions and output. Used by tests.
/// Running out of answers is an error, like closed stdin.
#[cfg(test)]
#[derive(Default, Debug)]
pub struct ScriptedPrompt {
    answers: std::collections::VecDeque<String>,
    pub questions: Vec<String>,
    pub output: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            questions: Vec::new(),
            output: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    pub fn said(&self, needle: &str) -> bool {
        self.output.iter().any(|l| l.contains(needle))
    }
}

#[cfg(test)]
impl Prompt for ScriptedPrompt {
    fn ask(&mut self, question: &str) -> Result<String> {
        self.questions.push(question.to_string());
        match self.answers.pop_front() {
            Some(answer) => Ok(answer.trim().to_string()),
            None => Err(usage_error(format!("no scripted answer for \"{}\"", question.trim()))),
        }
    }

    fn say(&mut self, line: &str) {
        self.output.push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_prompt_answers_in_order() {
        let mut p = ScriptedPrompt::new(["  first ", "second"]);
        assert_eq!(p.ask("one? ").unwrap(), "first");
        assert_eq!(p.ask("two? ").unwrap(), "second");
        assert!(p.ask("three? ").is_err());
        p.say("done");
        assert!(p.said("done"));
        assert_eq!(p.questions.len(), 3);
        assert_eq!(p.remaining(), 0);
    }
}
