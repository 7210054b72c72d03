use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(name = "mux-send")]
#[command(about = "Send one command line to a socket-mux daemon", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "/tmp/socket-mux.sock")]
    socket: PathBuf,

    /// Command line to send; a trailing newline is appended
    #[arg(required = true)]
    line: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut stream = UnixStream::connect(&cli.socket).await?;

    let line = format!("{}\n", cli.line.join(" "));
    stream.write_all(line.as_bytes()).await?;

    let mut reply = String::new();
    stream.read_to_string(&mut reply).await?;
    println!("{}", reply);
    Ok(())
}
