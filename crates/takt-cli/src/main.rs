//! takt CLI - terminal rhythm game driven by knocking.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "takt")]
#[command(author, version, about = "Knock-driven terminal rhythm game", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play the built-in demo beatmap
    Demo(commands::demo::DemoArgs),

    /// List available audio devices
    Devices(commands::devices::DevicesArgs),

    /// Play a click pattern through the output device
    TestSpeaker(commands::test_speaker::TestSpeakerArgs),

    /// Show a live spectrum of the input device
    TestMic(commands::test_mic::TestMicArgs),
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Demo(args) => commands::demo::run(args),
        Commands::Devices(args) => commands::devices::run(args),
        Commands::TestSpeaker(args) => commands::test_speaker::run(args),
        Commands::TestMic(args) => commands::test_mic::run(args),
    }
}

fn main() -> std::process::ExitCode {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("\x1b[31m{err:#}\x1b[0m");
            std::process::ExitCode::FAILURE
        }
    }
}
