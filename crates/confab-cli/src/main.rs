//! Terminal front-end for the persona chat proxy.
//!
//! A line-oriented read/submit loop around a `ChatSession`. Responses print
//! as the rendered transcript entries, so what you see is exactly what a
//! web front-end would insert into the page.

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;
use tokio::io::{AsyncBufReadExt, BufReader};

use confab_client::{ChatSession, ChatTransport, HttpChatTransport, SubmitOutcome};
use confab_core::Persona;

#[derive(Parser, Debug)]
#[clap(author, version, about = "confab - chat with a persona proxy from the terminal")]
struct Cli {
    #[clap(long, default_value = "http://127.0.0.1:3001", help = "Base URL of the proxy server")]
    server: String,

    #[clap(long, short, default_value = "hex", help = "Persona key: hex, solidity, positive or safety")]
    agent: String,

    #[clap(long, help = "Use chunked streaming delivery instead of buffered JSON")]
    streamed: bool,

    #[clap(long, short, default_value = "warn")]
    log_level: String,
}

fn print_assistant(session: &ChatSession<HttpChatTransport>) {
    let icon = session.persona().theme().icon;
    if let Some(entry) = session.transcript().last() {
        println!("{} {}\n", icon, entry.body);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Warn);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    let transport = HttpChatTransport::new(cli.server.clone());
    if let Err(e) = transport.health_check().await {
        log::warn!("proxy at {} is not answering its health check: {}", cli.server, e);
    }

    let persona = Persona::from_key_or_default(Some(cli.agent.as_str()));
    if persona.key() != cli.agent {
        log::warn!("unknown agent '{}', using '{}'", cli.agent, persona.key());
    }

    let mut session = ChatSession::new(transport, persona);
    println!("Connected to {} as {}.", cli.server, persona.display_name());
    println!("Commands: /agent <hex|solidity|positive|safety>, /quit\n");
    print_assistant(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if let Some(line) = lines.next_line().await? {
            let input = line.trim();
            if input == "/quit" {
                break;
            }
            if let Some(key) = input.strip_prefix("/agent ") {
                match Persona::from_key(key.trim()) {
                    Some(persona) => {
                        session.set_persona(persona);
                        println!("Switched to {}.\n", persona.display_name());
                        print_assistant(&session);
                    }
                    None => println!("Unknown agent '{}'.\n", key.trim()),
                }
                continue;
            }

            let outcome = if cli.streamed {
                session.submit_streaming(input).await
            } else {
                session.submit(input).await
            };

            match outcome {
                SubmitOutcome::Completed | SubmitOutcome::Failed => print_assistant(&session),
                SubmitOutcome::RejectedEmpty => {}
                SubmitOutcome::RejectedBusy => {
                    println!("Still waiting on the previous response.\n")
                }
            }
        } else {
            break;
        }
    }

    Ok(())
}
