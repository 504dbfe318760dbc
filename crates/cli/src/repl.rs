//! Interactive query loop.

use std::fmt::Display;
use std::future::Future;
use std::io::{self, BufRead, Write};

const PROMPT: &str = "Query: ";

/// Something that turns a query into a printable answer.
pub trait QueryHandler {
    type Error: Display;

    fn answer(&self, query: &str) -> impl Future<Output = Result<String, Self::Error>>;
}

/// Read queries from `input` until `quit` (any case) or end of input.
///
/// Blank lines are skipped. A failed query prints `Error: ...` and the loop
/// goes on. Returns the number of queries handled.
pub async fn run<R, W, H>(mut input: R, output: &mut W, handler: &H) -> io::Result<usize>
where
    R: BufRead,
    W: Write,
    H: QueryHandler,
{
    writeln!(output, "\nMCP Client Started!")?;
    writeln!(output, "Type your queries or 'quit' to exit.")?;

    let mut handled = 0;
    loop {
        write!(output, "\n{PROMPT}")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break;
        }

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("quit") {
            break;
        }

        handled += 1;
        match handler.answer(query).await {
            Ok(answer) => writeln!(output, "\n{answer}")?,
            Err(e) => writeln!(output, "\nError: {e}")?,
        }
    }

    Ok(handled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Cursor;

    #[derive(Default)]
    struct Recorder {
        queries: RefCell<Vec<String>>,
    }

    impl QueryHandler for Recorder {
        type Error = String;

        async fn answer(&self, query: &str) -> Result<String, String> {
            self.queries.borrow_mut().push(query.to_string());
            if query.starts_with("fail") {
                Err(format!("could not answer {query}"))
            } else {
                Ok(format!("answer to {query}"))
            }
        }
    }

    async fn session(script: &str) -> (Recorder, String, usize) {
        let handler = Recorder::default();
        let mut output = Vec::new();
        let handled = run(Cursor::new(script.to_string()), &mut output, &handler)
            .await
            .unwrap();
        (handler, String::from_utf8(output).unwrap(), handled)
    }

    #[tokio::test]
    async fn quit_in_any_case_ends_without_dispatch() {
        for word in ["quit", "QUIT", "Quit", "  quit  "] {
            let (handler, output, handled) = session(&format!("{word}\nnever\n")).await;
            assert_eq!(handled, 0, "{word:?}");
            assert!(handler.queries.borrow().is_empty());
            assert!(output.contains("Type your queries or 'quit' to exit."));
        }
    }

    #[tokio::test]
    async fn answers_are_printed_in_order() {
        let (handler, output, handled) = session("first\nsecond\nquit\n").await;

        assert_eq!(handled, 2);
        assert_eq!(*handler.queries.borrow(), ["first", "second"]);
        let first = output.find("answer to first").unwrap();
        let second = output.find("answer to second").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn errors_keep_the_loop_alive() {
        let (handler, output, handled) = session("fail once\nafter\nquit\n").await;

        assert_eq!(handled, 2);
        assert!(output.contains("\nError: could not answer fail once\n"));
        assert!(output.contains("answer to after"));
        assert_eq!(handler.queries.borrow().len(), 2);
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let (handler, _, handled) = session("\n   \nhello\nquit\n").await;
        assert_eq!(handled, 1);
        assert_eq!(*handler.queries.borrow(), ["hello"]);
    }

    #[tokio::test]
    async fn end_of_input_ends_the_loop() {
        let (_, output, handled) = session("hello").await;
        assert_eq!(handled, 1);
        assert_eq!(output.matches(PROMPT).count(), 2);
    }

    #[tokio::test]
    async fn queries_are_trimmed() {
        let (handler, _, _) = session("  what's up  \n").await;
        assert_eq!(*handler.queries.borrow(), ["what's up"]);
    }
}
