//! cave-client: terminal client for the CAVE chat server.
//!
//! Usage: `cave-client <server_ip> <port>`
//!
//! Plain input is sent as chat. Slash commands:
//! `/nick NAME`, `/profile get NICK`,
//! `/profile set displayname|bio|pronouns TEXT`, `/quit`.

use clap::Parser;
use std::net::IpAddr;
use std::process::ExitCode;
use tokio::io::BufReader;
use tokio::net::TcpStream;

/// Command-line arguments for the chat client
#[derive(Parser, Debug)]
#[command(name = "cave-client")]
#[command(version = "0.1.0")]
#[command(about = "Terminal client for the CAVE chat server", long_about = None)]
struct CliArgs {
    /// Server IP address (e.g., 127.0.0.1)
    server_ip: IpAddr,

    /// Server port (e.g., 7777)
    port: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let stream = match TcpStream::connect((args.server_ip, args.port)).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("connect: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Connected to {}:{}", args.server_ip, args.port);
    println!("Type: /nick NAME to set your nickname");
    println!("      /profile set displayname TEXT");
    println!("      /profile set bio TEXT");
    println!("      /profile set pronouns TEXT");
    println!("      /profile get NICK");

    let stdin = BufReader::new(tokio::io::stdin());
    match cave::client::run(stream, stdin, tokio::io::stdout()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("connection error: {e}");
            ExitCode::FAILURE
        }
    }
}
