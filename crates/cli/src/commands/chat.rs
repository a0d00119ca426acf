//! `finsight chat`: Analyze, then edit the report conversationally.

use finsight_analysis::{PatchOutcome, Session};
use finsight_core::Language;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    ShowReport,
    Save(&'a str),
    Ask(&'a str),
    Empty,
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    match line {
        "" => Input::Empty,
        "exit" | "quit" | "/exit" | "/quit" => Input::Quit,
        "/report" => Input::ShowReport,
        _ => match line.strip_prefix("/save ") {
            Some(path) if !path.trim().is_empty() => Input::Save(path.trim()),
            _ => Input::Ask(line),
        },
    }
}

pub async fn run(
    files: Vec<PathBuf>,
    lang: Option<Language>,
    api_key: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = super::open_session(lang)?;
    let documents = super::read_documents(&files).await?;

    eprintln!("  Analyzing {} document(s)...", documents.len());
    match session.analyze(documents, api_key.as_deref()).await {
        Ok(report) => eprintln!("{}", super::analyze::summary(report)),
        Err(e) => {
            super::explain(&e);
            return Err(e.into());
        }
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          FinSight CFO: Interactive           ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Ask about the report, or ask for a change.");
    println!("  /report prints the current JSON, /save <path> writes it.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Quit => break,
            Input::Empty => {}
            Input::ShowReport => {
                if let Some(report) = session.report() {
                    super::write_json(report, None)?;
                }
            }
            Input::Save(path) => {
                if let Some(report) = session.report()
                    && let Err(e) = super::write_json(report, Some(std::path::Path::new(path)))
                {
                    eprintln!("  [Error] {e}");
                }
            }
            Input::Ask(instruction) => turn(&mut session, instruction, api_key.as_deref()).await,
        }
        prompt()?;
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

async fn turn(session: &mut Session, instruction: &str, api_key: Option<&str>) {
    eprint!("  ...");
    let result = session.ask(instruction, api_key).await;
    eprint!("\r     \r");

    match result {
        Ok(outcome) => print_outcome(&outcome),
        Err(e) => {
            super::explain(&e);
            eprintln!("  [Error] {e}");
            println!();
        }
    }
}

fn print_outcome(outcome: &PatchOutcome) {
    println!();
    for line in outcome.answer.lines() {
        println!("  CFO > {line}");
    }
    if outcome.changed_report() {
        println!("  (updated: {})", outcome.changed_fields.join(", "));
    }
    println!();
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_questions() {
        assert_eq!(parse_input("  exit "), Input::Quit);
        assert_eq!(parse_input("/report"), Input::ShowReport);
        assert_eq!(parse_input("/save out.json"), Input::Save("out.json"));
        assert_eq!(parse_input(""), Input::Empty);
        assert_eq!(
            parse_input("Add a debt section"),
            Input::Ask("Add a debt section")
        );
        assert_eq!(parse_input("/save "), Input::Ask("/save"));
    }
}
