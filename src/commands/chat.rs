//! Interactive chat session
//!
//! Visitors ask questions; after `/login` the same session can also manage
//! the knowledge base.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::ingest::render_report;
use crate::auth::AdminCredentials;
use crate::config::Config;
use crate::prompts::GREETING;
use crate::session::{Role, SessionRegistry};

const HELP: &str = "\
Commands:
  /login          - sign in as admin
  /logout         - sign out
  /ingest <files> - add files to the knowledge base (admin)
  /ingest-folder <path> - add a whole folder (admin)
  /stats          - knowledge base size (admin)
  /history        - show this conversation
  /clear          - clear the conversation
  /exit           - quit";

/// A parsed line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Ask(String),
    Login,
    Logout,
    Ingest(Vec<PathBuf>),
    IngestFolder(PathBuf),
    Stats,
    History,
    Clear,
    Help,
    Exit,
    Unknown(String),
    Empty,
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplCommand::Empty;
        }
        if !line.starts_with('/') {
            return ReplCommand::Ask(line.to_string());
        }

        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match command {
            "/login" => ReplCommand::Login,
            "/logout" => ReplCommand::Logout,
            "/ingest" if !args.is_empty() => {
                ReplCommand::Ingest(args.into_iter().map(PathBuf::from).collect())
            }
            "/ingest-folder" if !args.is_empty() => ReplCommand::IngestFolder(PathBuf::from(args.join(" "))),
            "/stats" => ReplCommand::Stats,
            "/history" => ReplCommand::History,
            "/clear" => ReplCommand::Clear,
            "/help" => ReplCommand::Help,
            "/exit" | "/quit" => ReplCommand::Exit,
            _ => ReplCommand::Unknown(line.to_string()),
        }
    }
}

fn prompt_line(label: &str) -> Result<Option<String>> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    if io::stdin().lock().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

/// Read the admin password without echo. Without a terminal (piped stdin)
/// the no-echo read fails and the plain line reader takes over.
fn read_password_with(
    no_echo: impl FnOnce() -> io::Result<String>,
    fallback: impl FnOnce() -> Result<Option<String>>,
) -> Result<Option<String>> {
    match no_echo() {
        Ok(password) => Ok(Some(password.trim_end_matches(['\r', '\n']).to_string())),
        Err(e) => {
            warn!(error = %e, "No terminal for hidden input, password will echo");
            fallback()
        }
    }
}

fn read_password() -> Result<Option<String>> {
    read_password_with(
        || rpassword::prompt_password("Password: "),
        || prompt_line("Password: "),
    )
}

pub async fn run(config: &Config) -> Result<()> {
    let store = super::build_store(&config.store).context("failed to open vector store")?;
    let embedder = super::build_embedder(&config.embedding).context("failed to set up embeddings")?;
    let generator = super::build_generator(&config.generation)
        .await
        .context("failed to set up generation model")?;
    let credentials =
        AdminCredentials::from_config(&config.admin).context("invalid admin credentials")?;

    let ingestor = super::build_ingestor(config, store.clone(), embedder.clone())?;
    let retriever = super::build_retriever(config, store.clone(), embedder, generator);

    let registry = SessionRegistry::new();
    let id = registry.create().await;
    let handle = registry
        .get(id)
        .await
        .context("session disappeared right after creation")?;
    info!(session = %id, "Chat session started");

    println!("🤖 {}", GREETING);
    println!("(type /help for commands)\n");

    loop {
        let Some(line) = prompt_line("❓ ")? else {
            break; // EOF
        };

        let mut session = handle.lock().await;
        match ReplCommand::parse(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Exit => {
                println!("👋 Goodbye!");
                break;
            }
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Unknown(input) => println!("Unknown command: {} (try /help)", input),
            ReplCommand::Clear => {
                session.clear_history();
                println!("✅ History cleared");
            }
            ReplCommand::History => {
                for message in session.history() {
                    let who = match message.role {
                        Role::User => "You",
                        Role::Assistant => "PARK",
                    };
                    println!("{}: {}", who, message.content);
                }
            }
            ReplCommand::Login => {
                let Some(username) = prompt_line("Username: ")? else { break };
                let Some(password) = read_password()? else { break };
                match session.login(&credentials, &username, &password) {
                    Ok(()) => println!("✅ Logged in as admin"),
                    Err(e) => println!("❌ {}", e),
                }
            }
            ReplCommand::Logout => {
                session.logout();
                println!("✅ Logged out");
            }
            ReplCommand::Stats => match session.require_admin() {
                Ok(()) => {
                    match super::stats::summary(store.as_ref(), &config.store.collection).await {
                        Ok(line) => println!("📊 {}", line),
                        Err(e) => println!("❌ {}", e),
                    }
                }
                Err(e) => println!("❌ {} (use /login)", e),
            },
            ReplCommand::Ingest(files) => match session.require_admin() {
                Ok(()) => {
                    let report = ingestor.ingest_files(&files, None).await;
                    println!("{}", render_report(&report));
                }
                Err(e) => println!("❌ {} (use /login)", e),
            },
            ReplCommand::IngestFolder(path) => match session.require_admin() {
                Ok(()) => match ingestor.ingest_folder(&path).await {
                    Ok(report) => println!("{}", render_report(&report)),
                    Err(e) => println!("❌ {}", e),
                },
                Err(e) => println!("❌ {} (use /login)", e),
            },
            ReplCommand::Ask(question) => {
                println!("\n🤔 Thinking...\n");
                match session.ask(&retriever, &question).await {
                    Ok(reply) => println!("🤖 {}\n", reply),
                    Err(e) => println!("❌ Error: {}\n", e),
                }
            }
        }
    }

    registry.destroy(id).await;
    info!(session = %id, "Chat session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_question() {
        assert_eq!(
            ReplCommand::parse("  Where is the library? "),
            ReplCommand::Ask("Where is the library?".into())
        );
        assert_eq!(ReplCommand::parse("   "), ReplCommand::Empty);
    }

    #[test]
    fn parses_admin_commands() {
        assert_eq!(ReplCommand::parse("/login"), ReplCommand::Login);
        assert_eq!(ReplCommand::parse("/logout"), ReplCommand::Logout);
        assert_eq!(
            ReplCommand::parse("/ingest a.md b.json"),
            ReplCommand::Ingest(vec!["a.md".into(), "b.json".into()])
        );
        assert_eq!(
            ReplCommand::parse("/ingest-folder docs/My Files"),
            ReplCommand::IngestFolder("docs/My Files".into())
        );
        assert_eq!(ReplCommand::parse("/stats"), ReplCommand::Stats);
    }

    #[test]
    fn ingest_without_arguments_is_unknown() {
        assert!(matches!(ReplCommand::parse("/ingest"), ReplCommand::Unknown(_)));
        assert!(matches!(ReplCommand::parse("/ingest-folder"), ReplCommand::Unknown(_)));
    }

    #[test]
    fn hidden_password_is_used_when_terminal_available() {
        let password = read_password_with(
            || Ok("s3cret\n".to_string()),
            || panic!("fallback must not run"),
        )
        .unwrap();
        assert_eq!(password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn falls_back_to_line_reader_without_terminal() {
        let password = read_password_with(
            || Err(io::Error::new(io::ErrorKind::NotFound, "no tty")),
            || Ok(Some("piped".to_string())),
        )
        .unwrap();
        assert_eq!(password.as_deref(), Some("piped"));
    }

    #[test]
    fn exit_aliases() {
        assert_eq!(ReplCommand::parse("/exit"), ReplCommand::Exit);
        assert_eq!(ReplCommand::parse("/quit"), ReplCommand::Exit);
        assert_eq!(ReplCommand::parse("/clear"), ReplCommand::Clear);
        assert_eq!(ReplCommand::parse("/history"), ReplCommand::History);
    }
}
