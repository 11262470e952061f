use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use phonix_gateway::signal::classify;
use phonix_gateway::timeline::{read_lesson, total_duration};
use phonix_gateway::voice::AudioCapture;
use phonix_gateway::{Config, Daemon, LoadOptions};

/// Phonix - real-time speech and lip signals to haptic events
#[derive(Parser)]
#[command(name = "phonix", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PHONIX_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable microphone capture (for headless servers without audio hardware)
    #[arg(long, env = "PHONIX_DISABLE_VOICE")]
    disable_voice: bool,

    /// Lesson file to load into the timeline at startup
    #[arg(long)]
    lesson: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input with an energy meter
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Validate a lesson file and print its length
    CheckLesson {
        /// Path to the lesson JSON
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,phonix_gateway=info",
        1 => "info,phonix_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::CheckLesson { file } => check_lesson(&file),
        };
    }

    let options = LoadOptions {
        port: cli.port,
        disable_voice: cli.disable_voice,
        lesson: cli.lesson,
    };
    let config = Config::load(&options)?;

    tracing::info!(
        port = config.server.port,
        voice = config.voice.enabled,
        stt = ?config.voice.stt_provider,
        "starting phonix gateway"
    );

    Daemon::new(config).run().await?;
    Ok(())
}

/// Print the energy of each captured chunk
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let capture = AudioCapture::new();
    capture.start()?;
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        while let Some(chunk) = capture.pop() {
            let energy = chunk.energy();

            // Visual meter
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let meter_len = (energy * 100.0).min(50.0) as usize;
            let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

            println!(
                "[{:2}s] RMS: {:.4} | {:<7} | [{}]",
                i + 1,
                energy,
                classify(energy).as_str(),
                meter
            );
        }
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

fn check_lesson(path: &std::path::Path) -> anyhow::Result<()> {
    let phonemes = read_lesson(path)?;
    println!(
        "{}: {} phonemes, {:.2}s",
        path.display(),
        phonemes.len(),
        total_duration(&phonemes)
    );
    Ok(())
}
