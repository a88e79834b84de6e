//! Interactive research chat with readline support.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use crossterm::style::Stylize;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{Config, Editor};

use dr_agents::{ResearchDriver, ResearchReport};
use dr_core::{AgentProgressEvent, AgentProgressHandler};
use dr_research::{
    cited_indices, estimate_word_count, export_filename, format_citations, write_export,
    CitationStyle, ExportFormat, SourceRecord, SourceStatistics,
};

/// The most recent report, kept for the slash commands.
#[derive(Debug, Default)]
pub struct ChatSession {
    content: String,
    sources: Vec<SourceRecord>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, report: &ResearchReport) {
        self.content = report.content.clone();
        self.sources = report.sources.clone();
    }

    pub fn has_report(&self) -> bool {
        !self.content.is_empty()
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.sources.clear();
    }

    /// Numbered source list, `[n] title` followed by the URL.
    pub fn sources_listing(&self) -> String {
        if self.sources.is_empty() {
            return "No sources recorded.\n".to_string();
        }
        self.sources
            .iter()
            .enumerate()
            .map(|(i, s)| format!("[{}] {} ({})\n    {}\n", i + 1, s.title, s.source_type, s.url))
            .collect()
    }

    pub fn statistics(&self) -> String {
        SourceStatistics::compute(&self.sources).render_markdown()
    }

    pub fn citations(&self, style: CitationStyle) -> String {
        format_citations(&self.content, &self.sources, style)
    }

    pub fn export(&self, format: ExportFormat, path: &Path) -> std::io::Result<()> {
        write_export(path, format, &self.content, &self.sources)
    }
}

/// Word, source and citation counts shown under each report.
pub fn report_footer(report: &ResearchReport) -> String {
    format!(
        "{} words | {} sources | {} citations | {} searches",
        estimate_word_count(&report.content),
        report.sources.len(),
        cited_indices(&report.content).len(),
        report.searches_used
    )
}

#[derive(Debug, PartialEq)]
enum ChatCommand {
    Quit,
    Clear,
    Help,
    Sources,
    Stats,
    Cite(Option<CitationStyle>),
    Export {
        format: ExportFormat,
        path: Option<PathBuf>,
    },
    Invalid(String),
    Research(String),
}

fn parse_command(input: &str) -> ChatCommand {
    let trimmed = input.trim();

    if !trimmed.starts_with('/') {
        return ChatCommand::Research(trimmed.to_string());
    }

    let mut parts = trimmed.split_whitespace();
    let cmd = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next();

    match cmd.as_str() {
        "/quit" | "/exit" | "/q" => ChatCommand::Quit,
        "/clear" | "/c" => ChatCommand::Clear,
        "/help" | "/?" => ChatCommand::Help,
        "/sources" | "/s" => ChatCommand::Sources,
        "/stats" => ChatCommand::Stats,
        "/cite" => ChatCommand::Cite(arg.map(CitationStyle::parse)),
        "/export" => {
            let Some(format) = arg.map_or(Some(ExportFormat::Markdown), ExportFormat::parse) else {
                return ChatCommand::Invalid(format!(
                    "Unknown export format: {}. Use txt, md or json.",
                    arg.unwrap_or_default()
                ));
            };
            ChatCommand::Export {
                format,
                path: parts.next().map(PathBuf::from),
            }
        }
        _ => ChatCommand::Invalid(format!(
            "Unknown command: {}. Type /help for available commands.",
            cmd
        )),
    }
}

fn print_help() {
    println!(
        r#"
Type a research question to start a new report.

Commands:
  /help, /?                     Show this help message
  /sources, /s                  List the sources of the last report
  /stats                        Source statistics for the last report
  /cite [apa|mla|plain]         Last report with a formatted reference list
  /export [txt|md|json] [path]  Save the last report (default: markdown)
  /clear, /c                    Forget the last report
  /quit, /exit                  Exit

Research takes a few minutes. Press Ctrl+D to exit.
"#
    );
}

/// Prints one line per search to stderr while research runs.
pub struct ConsoleProgress {
    color: bool,
}

impl ConsoleProgress {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn line(&self, text: String) {
        if self.color {
            eprintln!("{}", text.dark_grey());
        } else {
            eprintln!("{}", text);
        }
    }
}

#[async_trait]
impl AgentProgressHandler for ConsoleProgress {
    async fn on_progress(&self, event: AgentProgressEvent) {
        match event {
            AgentProgressEvent::IterationStart {
                agent_name,
                iteration,
                ..
            } if iteration == 1 => {
                self.line(format!("[{}] started", agent_name));
            }
            AgentProgressEvent::ToolStart { arguments, .. } => {
                let query = arguments.get("query").and_then(|v| v.as_str()).unwrap_or("");
                let focus = arguments.get("focus").and_then(|v| v.as_str()).unwrap_or("general");
                self.line(format!("  searching ({}): {}", focus, query));
            }
            AgentProgressEvent::ToolComplete {
                tool_name,
                is_error: true,
                ..
            } => {
                self.line(format!("  {} failed", tool_name));
            }
            _ => {}
        }
    }
}

/// Run interactive chat mode
pub async fn run_chat(driver: &ResearchDriver, style: CitationStyle, color: bool) -> Result<()> {
    let config = Config::builder()
        .history_ignore_space(true)
        .history_ignore_dups(true)?
        .build();

    let history_path = get_history_path();
    let mut rl: Editor<(), FileHistory> = Editor::with_config(config)?;

    if let Some(path) = &history_path {
        let _ = rl.load_history(path);
    }

    let mut session = ChatSession::new();

    println!("Deep research chat. Type /help for commands, /quit to exit.\n");

    loop {
        match rl.readline("research> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);

                match parse_command(&line) {
                    ChatCommand::Quit => {
                        println!("Goodbye!");
                        break;
                    }
                    ChatCommand::Clear => {
                        session.clear();
                        println!("Report cleared.\n");
                    }
                    ChatCommand::Help => print_help(),
                    ChatCommand::Invalid(message) => eprintln!("{}\n", message),
                    ChatCommand::Sources => println!("\n{}", session.sources_listing()),
                    ChatCommand::Stats => println!("\n{}\n", session.statistics()),
                    ChatCommand::Cite(_) | ChatCommand::Export { .. } if !session.has_report() => {
                        println!("No report yet. Ask a research question first.\n");
                    }
                    ChatCommand::Cite(requested) => {
                        println!("\n{}", session.citations(requested.unwrap_or(style)));
                    }
                    ChatCommand::Export { format, path } => {
                        let path = path.unwrap_or_else(|| PathBuf::from(export_filename(format, Local::now())));
                        match session.export(format, &path) {
                            Ok(()) => println!("Report saved to {}\n", path.display()),
                            Err(e) => eprintln!("Export failed: {}\n", e),
                        }
                    }
                    ChatCommand::Research(query) => {
                        if query.is_empty() {
                            continue;
                        }
                        let report = driver.research(&query).await;
                        println!("\n{}\n", report.content);

                        let footer = report_footer(&report);
                        if color && report.is_completed() {
                            println!("{}\n", footer.green());
                        } else if color {
                            println!("{}\n", footer.yellow());
                        } else {
                            println!("{}\n", footer);
                        }
                        session.record(&report);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = rl.save_history(path);
    }

    Ok(())
}

fn get_history_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("deep-researcher").join("chat_history"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dr_agents::ReportStatus;

    fn report() -> ResearchReport {
        ResearchReport {
            query: "llm agents".into(),
            content: "# Agents\n\nAgents plan [1] and act [2]. Again [1].".into(),
            sources: vec![
                SourceRecord::new("Survey", "https://arxiv.org/abs/2401.1"),
                SourceRecord::new("Docs", "https://docs.rs/tokio"),
            ],
            searches_used: 3,
            status: ReportStatus::Completed,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("/quit"), ChatCommand::Quit);
        assert_eq!(parse_command("  /EXIT "), ChatCommand::Quit);
        assert_eq!(parse_command("/sources"), ChatCommand::Sources);
        assert_eq!(parse_command("/cite"), ChatCommand::Cite(None));
        assert_eq!(parse_command("/cite mla"), ChatCommand::Cite(Some(CitationStyle::Mla)));
        assert_eq!(
            parse_command("what is rust?"),
            ChatCommand::Research("what is rust?".into())
        );
        assert!(matches!(parse_command("/bogus"), ChatCommand::Invalid(_)));
    }

    #[test]
    fn test_parse_export() {
        assert_eq!(
            parse_command("/export"),
            ChatCommand::Export { format: ExportFormat::Markdown, path: None }
        );
        assert_eq!(
            parse_command("/export json out/report.json"),
            ChatCommand::Export {
                format: ExportFormat::Json,
                path: Some(PathBuf::from("out/report.json")),
            }
        );
        assert!(matches!(parse_command("/export pdf"), ChatCommand::Invalid(_)));
    }

    #[test]
    fn test_report_footer() {
        let footer = report_footer(&report());
        assert!(footer.contains("2 sources"));
        assert!(footer.contains("2 citations"));
        assert!(footer.contains("3 searches"));
    }

    #[test]
    fn test_session_views() {
        let mut session = ChatSession::new();
        assert!(!session.has_report());
        assert_eq!(session.sources_listing(), "No sources recorded.\n");

        session.record(&report());
        assert!(session.has_report());
        assert!(session
            .sources_listing()
            .starts_with("[1] Survey (academic)\n    https://arxiv.org/abs/2401.1\n"));
        assert!(session.citations(CitationStyle::Plain).contains("## References"));
        assert!(session.statistics().contains("Total Sources"));

        session.clear();
        assert!(!session.has_report());
    }

    #[test]
    fn test_session_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        let mut session = ChatSession::new();
        session.record(&report());

        session.export(ExportFormat::Text, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with(" Agents"));
        assert!(!written.contains('#'));
    }
}
