//! CinderKV CLI Client
//!
//! Command-line interface for interacting with CinderKV.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::process::ExitCode;

use cinderkv::protocol::{read_response, write_command, Command, Response};
use cinderkv::Record;
use clap::{Parser, Subcommand};

/// CinderKV CLI
#[derive(Parser, Debug)]
#[command(name = "cinderkv-cli")]
#[command(about = "CLI for the CinderKV key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:4421")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Get every value with from <= key <= to
    Range {
        from: String,
        to: String,
    },

    /// Store one or more pairs given as key=value
    Put {
        #[arg(required = true)]
        pairs: Vec<String>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let command = match build_command(args.command) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    match send(&args.server, &command) {
        Ok(Response::Error(message)) => {
            eprintln!("ERROR: {}", message);
            ExitCode::FAILURE
        }
        Ok(response) => {
            print_response(&response);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Request to {} failed: {}", args.server, e);
            ExitCode::FAILURE
        }
    }
}

fn build_command(command: Commands) -> Result<Command, String> {
    Ok(match command {
        Commands::Get { key } => Command::Get { key },
        Commands::Range { from, to } => Command::GetRange { from, to },
        Commands::Put { pairs } => {
            let records = pairs
                .iter()
                .map(|pair| {
                    let (key, value) = pair
                        .split_once('=')
                        .ok_or_else(|| format!("expected key=value, got '{}'", pair))?;
                    Record::new(key, value).map_err(|e| e.to_string())
                })
                .collect::<Result<Vec<_>, _>>()?;
            Command::Put { records }
        }
    })
}

fn send(addr: &str, command: &Command) -> cinderkv::Result<Response> {
    let stream = TcpStream::connect(addr)?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);

    write_command(&mut writer, command)?;
    read_response(&mut reader, command)
}

fn print_response(response: &Response) {
    match response {
        Response::Value(value) => println!("{}", value),
        Response::NotFound => println!("(not found)"),
        Response::Values(values) => {
            for value in values {
                println!("{}", value);
            }
        }
        Response::Stored(count) => println!("OK {}", count),
        Response::Error(message) => eprintln!("ERROR: {}", message),
    }
}
