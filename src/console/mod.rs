use std::io::{self, Write};

/// Interactive input capability requested by the config loader and the
/// batch driver. Keeping it behind a trait means the workflow never reads
/// stdin directly, so tests script the answers.
pub trait Console {
    /// Ask for a single line of input.
    fn prompt_line(&mut self, label: &str) -> io::Result<String>;

    /// Ask a yes/no question. Only an explicit "yes" counts as approval.
    fn confirm(&mut self, question: &str) -> io::Result<bool>;
}

/// Console backed by stdin/stdout.
pub struct StdConsole;

impl Console for StdConsole {
    fn prompt_line(&mut self, label: &str) -> io::Result<String> {
        print!("{}: ", label);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }

    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        print!("{} (yes/no): ", question);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().eq_ignore_ascii_case("yes"))
    }
}

/// Wrapper that approves every confirmation (`--assume-yes`). Line prompts
/// still pass through so missing config keys can be supplied.
pub struct AssumeYes<C>(pub C);

impl<C: Console> Console for AssumeYes<C> {
    fn prompt_line(&mut self, label: &str) -> io::Result<String> {
        self.0.prompt_line(label)
    }

    fn confirm(&mut self, _question: &str) -> io::Result<bool> {
        Ok(true)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedConsole;
    use super::*;

    #[test]
    fn assume_yes_approves_without_consuming_answers() {
        let mut console = AssumeYes(ScriptedConsole::new(&[], &[false]));
        assert!(console.confirm("proceed?").unwrap());
        // The scripted "no" was never consumed.
        assert!(console.0.questions.is_empty());
    }

    #[test]
    fn assume_yes_still_prompts_for_lines() {
        let mut console = AssumeYes(ScriptedConsole::new(&["10.1.1.1"], &[]));
        assert_eq!(console.prompt_line("host").unwrap(), "10.1.1.1");
        assert_eq!(console.0.prompts, vec!["host"]);
    }
}
