use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use vocab_voice::voice::simulated::{SimulatedRecognizer, SimulatedSynthesizer};
use vocab_voice::{BridgeCall, ChannelSurface, Config, Error, Language, VoiceBridge};

/// Vocab Voice - speech bridge for vocabulary practice
#[derive(Parser)]
#[command(name = "vocab-voice", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/vocab-voice/config.toml)
    #[arg(short, long, env = "VOCAB_VOICE_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Speak a phrase
    Speak {
        /// Text to speak
        text: String,
        /// Language code ("en" or "es")
        #[arg(short, long)]
        language: Option<String>,
        /// Speech rate (0.1 - 2.0)
        #[arg(short, long)]
        rate: Option<f32>,
        /// Pitch (0.1 - 2.0)
        #[arg(short, long)]
        pitch: Option<f32>,
    },
    /// Listen for one answer
    Listen {
        /// Language code ("en" or "es")
        #[arg(short, long)]
        language: Option<String>,
        /// Transcript the simulated recognizer hears; empty for no match
        #[arg(short, long, default_value = "hello")]
        transcript: String,
        /// Simulated listening time in milliseconds
        #[arg(long, default_value = "800")]
        latency_ms: u64,
    },
    /// Show the voice used for a language, or for every supported one
    Voice {
        /// Language code
        language: Option<String>,
    },
    /// Serve bridge calls as JSON lines on stdin
    Serve {
        /// Transcript the simulated recognizer hears
        #[arg(short, long, default_value = "hello")]
        transcript: String,
        /// Simulated listening time in milliseconds
        #[arg(long, default_value = "800")]
        latency_ms: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info",
        1 => "info,vocab_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Speak {
            text,
            language,
            rate,
            pitch,
        } => {
            let language = language.unwrap_or_else(|| config.voice.language.to_string());
            let rate = rate.unwrap_or(config.voice.speech_rate);
            let pitch = pitch.unwrap_or(config.voice.pitch);
            speak(config, &text, &language, rate, pitch).await
        }
        Command::Listen {
            language,
            transcript,
            latency_ms,
        } => {
            let language = language.unwrap_or_else(|| config.voice.language.to_string());
            let recognizer = SimulatedRecognizer::new(transcript, Duration::from_millis(latency_ms));
            listen(config, recognizer, &language).await
        }
        Command::Voice { language } => {
            let languages = language.map_or_else(
                || Language::ALL.iter().map(ToString::to_string).collect(),
                |language| vec![language],
            );

            let (bridge, _invocations) = spawn_bridge(config, None);
            for language in languages {
                let name = bridge.get_voice_name(&language).await?;
                println!("{language}: {name}");
            }
            bridge.shutdown().await?;
            Ok(())
        }
        Command::Serve {
            transcript,
            latency_ms,
        } => {
            let recognizer = SimulatedRecognizer::new(transcript, Duration::from_millis(latency_ms));
            serve(config, recognizer).await
        }
    }
}

/// Bridge over the simulated engines, printing nothing on its own
fn spawn_bridge(
    config: Config,
    recognizer: Option<SimulatedRecognizer>,
) -> (VoiceBridge, mpsc::UnboundedReceiver<String>) {
    let (surface, invocations) = ChannelSurface::new();
    let mut builder =
        VoiceBridge::builder(config.voice).synthesizer(SimulatedSynthesizer::with_default_voices());
    if let Some(recognizer) = recognizer {
        builder = builder.recognizer(recognizer);
    }
    (builder.spawn(surface), invocations)
}

/// Speak one phrase and wait for it to finish
async fn speak(
    config: Config,
    text: &str,
    language: &str,
    rate: f32,
    pitch: f32,
) -> anyhow::Result<()> {
    let (bridge, mut invocations) = spawn_bridge(config, None);
    bridge.speak(text, language, rate, pitch)?;

    let outcome = loop {
        let Some(invocation) = invocations.recv().await else {
            break Err(Error::BridgeClosed);
        };
        println!("{invocation}");

        if invocation.starts_with("onTtsEnd") {
            break Ok(());
        }
        if invocation.starts_with("onTtsError") {
            break Err(Error::Voice(invocation));
        }
    };

    bridge.shutdown().await?;
    Ok(outcome?)
}

/// Run one recognition session; Ctrl-C stops listening early
async fn listen(
    config: Config,
    recognizer: SimulatedRecognizer,
    language: &str,
) -> anyhow::Result<()> {
    let (bridge, mut invocations) = spawn_bridge(config, Some(recognizer));
    bridge.start_listening(language)?;

    let outcome = loop {
        tokio::select! {
            invocation = invocations.recv() => {
                let Some(invocation) = invocation else {
                    break Err(Error::BridgeClosed);
                };
                println!("{invocation}");

                if invocation.starts_with("onSpeechResult") {
                    break Ok(());
                }
                if invocation.starts_with("onSpeechError") {
                    break Err(Error::Voice(invocation));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, stopping recognition");
                bridge.stop_listening()?;
                break Ok(());
            }
        }
    };

    bridge.shutdown().await?;
    Ok(outcome?)
}

/// Read `BridgeCall` JSON lines from stdin, write invocations to stdout
async fn serve(config: Config, recognizer: SimulatedRecognizer) -> anyhow::Result<()> {
    let (bridge, mut invocations) = spawn_bridge(config, Some(recognizer));

    let printer = tokio::spawn(async move {
        while let Some(invocation) = invocations.recv().await {
            println!("{invocation}");
        }
    });

    tracing::info!("serving bridge calls on stdin");
    let stdin = BufReader::new(tokio::io::stdin());
    let served = tokio::select! {
        served = serve_lines(&bridge, stdin, |reply| println!("{reply}")) => served,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            Ok(())
        }
    };

    // drain the printer before reporting any error
    let closed = bridge.shutdown().await;
    drop(bridge);
    printer.await?;

    served?;
    closed?;
    Ok(())
}

/// Forward every line of `input` to the bridge until EOF
///
/// Lines that are not UTF-8 or not a `BridgeCall` are logged and skipped.
/// `getVoiceName` answers are handed to `reply` as JSON.
async fn serve_lines<R>(
    bridge: &VoiceBridge,
    input: R,
    mut reply: impl FnMut(String),
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut segments = input.split(b'\n');

    loop {
        let segment = match segments.next_segment().await {
            Ok(Some(segment)) => segment,
            Ok(None) => {
                tracing::debug!("input closed");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read bridge call, stopping");
                break;
            }
        };

        let line = match String::from_utf8(segment) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring bridge call that is not utf-8");
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let call: BridgeCall = match serde_json::from_str(&line) {
            Ok(call) => call,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed bridge call");
                continue;
            }
        };

        if let Some(answer) = bridge.call(call).await? {
            let answer = serde_json::json!({
                "method": "getVoiceName",
                "result": answer,
            });
            reply(answer.to_string());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serve_skips_undecodable_lines() {
        let (bridge, _invocations) = spawn_bridge(Config::default(), None);
        let input: &[u8] = b"{\"method\":\"getVoiceName\",\"language\":\"en\"}\n\
            \xff\xfe\n\
            not json\n\
            \n\
            {\"method\":\"getVoiceName\",\"language\":\"es\"}\n";

        let mut replies = Vec::new();
        serve_lines(&bridge, input, |reply| replies.push(reply))
            .await
            .unwrap();

        assert_eq!(
            replies,
            vec![
                r#"{"method":"getVoiceName","result":"en-us-x-sfg-local | en-US"}"#,
                r#"{"method":"getVoiceName","result":"es-es-x-eea-local | es-ES"}"#,
            ]
        );
        bridge.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_serve_stops_at_end_of_input_without_newline() {
        let (bridge, _invocations) = spawn_bridge(Config::default(), None);
        let input: &[u8] = br#"{"method":"getVoiceName","language":"fr"}"#;

        let mut replies = Vec::new();
        serve_lines(&bridge, input, |reply| replies.push(reply))
            .await
            .unwrap();

        assert_eq!(
            replies,
            vec![r#"{"method":"getVoiceName","result":"Language Not Supported"}"#]
        );
    }
}
