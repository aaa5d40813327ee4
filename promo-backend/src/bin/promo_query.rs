use anyhow::{bail, Context};
use clap::Parser;
use dotenv::dotenv;
use promo_backend::agent::AgentAnswer;
use promo_backend::config::Config;
use promo_backend::system::DataService;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const BATCH_OUTPUT: &str = "batch_results.txt";

/// Ask questions about the promotions dataset from the terminal
#[derive(Parser)]
#[command(name = "promo-query")]
#[command(about = "Natural-language analytics over the promotions dataset")]
#[command(version)]
struct Cli {
    /// Rebuild the vector index even if the source file is unchanged
    #[arg(long)]
    rebuild: bool,

    /// Single question to answer (non-interactive)
    #[arg(short, long, conflicts_with = "batch")]
    query: Option<String>,

    /// File with one question per line; answers go to batch_results.txt
    #[arg(short, long, value_name = "FILE")]
    batch: Option<PathBuf>,
}

fn print_usage(answer: &AgentAnswer) {
    println!("\nTool usage:");
    for (tool, count) in answer.usage.counts() {
        if count > 0 {
            println!("  - {}: {} time(s)", tool, count);
        }
    }
}

fn read_batch(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("batch file not found: {}", path.display()))?;
    Ok(parse_batch(&text))
}

fn parse_batch(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

fn format_batch_results(results: &[(String, String)]) -> String {
    let mut out = String::new();
    for (query, answer) in results {
        out.push_str(&format!("Query: {}\n", query));
        out.push_str(&format!("Answer: {}\n", answer));
        out.push_str(&"-".repeat(80));
        out.push_str("\n\n");
    }
    out
}

fn is_exit(line: &str) -> bool {
    matches!(line.to_lowercase().as_str(), "" | "exit" | "quit" | "q")
}

async fn interactive(service: &DataService) -> anyhow::Result<()> {
    println!("Enter your questions about the promotion data.");
    println!("Type 'exit' or 'quit' to stop.");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"\nYour question: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if is_exit(question) {
            break;
        }

        let Some(system) = service.current() else {
            bail!("no dataset loaded");
        };
        let answer = system.agent.query(question).await;
        println!("\n{}", answer.answer);
        print_usage(&answer);
    }
    println!("Goodbye!");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let config = Config::from_env().map_err(anyhow::Error::msg)?;
    let service = DataService::from_config(config).map_err(anyhow::Error::msg)?;

    let outcome = service.startup(cli.rebuild).await?;
    if outcome.file.is_none() {
        bail!("no CSV found in remote storage or {}", service.config().download_dir.display());
    }
    let system = service.current().context("dataset failed to load")?;

    if let Some(question) = cli.query {
        let answer = system.agent.query(&question).await;
        println!("\nFinal Answer:\n{}", answer.answer);
        print_usage(&answer);
    } else if let Some(batch) = cli.batch {
        let queries = read_batch(&batch)?;
        let total = queries.len();
        println!("Processing {} queries...", total);

        let mut results = Vec::with_capacity(total);
        for (i, query) in queries.into_iter().enumerate() {
            println!("[Query {}/{}] {}", i + 1, total, query);
            let answer = system.agent.query(&query).await;
            results.push((query, answer.answer));
        }

        std::fs::write(BATCH_OUTPUT, format_batch_results(&results))
            .with_context(|| format!("failed to write {}", BATCH_OUTPUT))?;
        println!("Results saved to {}", BATCH_OUTPUT);
    } else {
        interactive(&service).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batch_skips_blank_lines() {
        let queries = parse_batch("total sales?\n\n  top regions  \n");
        assert_eq!(queries, vec!["total sales?", "top regions"]);
    }

    #[test]
    fn test_format_batch_results() {
        let out = format_batch_results(&[("q1".to_string(), "a1".to_string())]);
        assert_eq!(out, format!("Query: q1\nAnswer: a1\n{}\n\n", "-".repeat(80)));
    }

    #[test]
    fn test_exit_words() {
        assert!(is_exit("QUIT"));
        assert!(is_exit(""));
        assert!(!is_exit("quarterly sales"));
    }

    #[test]
    fn test_query_conflicts_with_batch() {
        assert!(Cli::try_parse_from(["promo-query", "--query", "x", "--batch", "f.txt"]).is_err());
        let cli = Cli::try_parse_from(["promo-query", "--rebuild", "-q", "x"]).unwrap();
        assert!(cli.rebuild);
        assert_eq!(cli.query.as_deref(), Some("x"));
    }
}
