use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use gourmet_assistant::ai::parse_history;
use gourmet_assistant::interaction::{self, InteractionState, PrimaryIntent};
use gourmet_assistant::screen::{CommandSnapshot, FileSnapshot, ScreenSnapshotProvider};
use gourmet_assistant::voice::{
    self, AudioCapture, AudioPlayback, ManualEntry, SPEECH_SAMPLE_RATE, calculate_energy,
    decode_base64_pcm16,
};
use gourmet_assistant::{
    AiClient, Collaborators, Config, ControllerOptions, GeminiClient, InteractionView,
    OrderRecord, SettingsStore,
};

/// Gourmet - voice-driven food ordering assistant
#[derive(Parser)]
#[command(name = "gourmet", version, about)]
struct Cli {
    /// Config file (default: ~/.config/gourmet/config.toml)
    #[arg(short, long, env = "GOURMET_CONFIG")]
    config: Option<PathBuf>,

    /// Read order history from this screenshot instead of capturing the screen
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Skip the startup screen scan
    #[arg(long)]
    no_scan: bool,

    /// Type commands instead of speaking them
    #[arg(long)]
    manual: bool,

    /// Load order history from a JSON file instead of scanning
    #[arg(long)]
    history: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test speech synthesis
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Extract order history from a screenshot and print it as JSON
    Extract {
        /// Image file
        image: PathBuf,
    },
    /// Ask for a meal suggestion without the voice loop
    Decide {
        /// The command, as it would be spoken
        command: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,gourmet_assistant=info",
        1 => "info,gourmet_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli
        .config
        .as_deref()
        .map_or_else(Config::load, Config::load_from);
    tracing::debug!(?config, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&config, &text).await,
            Command::Extract { image } => extract(&config, &image).await,
            Command::Decide { command } => decide(&config, cli.history.as_deref(), &command).await,
        };
    }

    let settings = SettingsStore::new(config.ai.settings.clone());
    let ai = Arc::new(GeminiClient::from_config(&config, settings.clone())?);
    let (capture, manual) = voice::select_capture(&config, cli.manual);

    let screen: Option<Arc<dyn ScreenSnapshotProvider>> = if cli.no_scan || cli.history.is_some() {
        None
    } else if let Some(path) = &cli.screenshot {
        Some(Arc::new(FileSnapshot::new(path)) as Arc<dyn ScreenSnapshotProvider>)
    } else {
        CommandSnapshot::from_config(&config.screen)
            .map(|c| Arc::new(c) as Arc<dyn ScreenSnapshotProvider>)
    };

    let collaborators = Collaborators {
        ai,
        capture,
        audio: Arc::new(AudioPlayback::new()),
        screen,
    };

    let (handle, task) = interaction::spawn(collaborators, ControllerOptions::from_config(&config));

    if let Some(path) = &cli.history {
        handle.replace_history(load_history(path)?)?;
    } else {
        handle.scan_history()?;
    }

    tracing::info!(model = %settings.current().model_name, "gourmet ready");
    print_help(manual.is_some());

    let printer = tokio::spawn(print_views(handle.subscribe()));
    repl(&handle, &settings, manual.as_ref()).await?;

    handle.shutdown()?;
    let _ = task.await;
    printer.abort();

    Ok(())
}

fn print_help(manual: bool) {
    println!("Enter        start listening / cancel / confirm");
    if manual {
        println!("             while listening, type your order and press Enter");
    }
    println!("x            cancel");
    println!(":model NAME  switch model");
    println!(":instruction TEXT");
    println!(":settings    show settings");
    println!(":history     show order history");
    println!(":quit        exit");
}

/// Read commands from stdin until EOF or `:quit`
async fn repl(
    handle: &gourmet_assistant::AssistantHandle,
    settings: &SettingsStore,
    manual: Option<&ManualEntry>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix(':') {
            let (command, arg) = rest.split_once(' ').unwrap_or((rest, ""));
            match command {
                "q" | "quit" => break,
                "model" => report(settings.set_model_name(arg)),
                "instruction" => report(settings.set_system_instruction(arg)),
                "settings" => {
                    let current = settings.current();
                    println!("model: {}", current.model_name);
                    println!("instruction:\n{}", current.system_instruction);
                }
                "history" => {
                    for order in handle.history().await? {
                        println!(
                            "{} | {} | {:.2} | {:?} | {}",
                            order.restaurant,
                            order.items.join(", "),
                            order.total,
                            order.platform,
                            order.date
                        );
                    }
                }
                _ => println!("unknown command :{command}"),
            }
            continue;
        }

        if line == "x" || line == "cancel" {
            handle.cancel()?;
            continue;
        }

        let recording = handle.view().state == InteractionState::Recording;
        match manual {
            Some(entry) if recording => entry.submit(line)?,
            _ if line.is_empty() => handle.primary_action()?,
            _ => println!("press Enter to start, then speak your order"),
        }
    }

    Ok(())
}

fn report(result: gourmet_assistant::Result<()>) {
    if let Err(e) = result {
        println!("{e}");
    }
}

/// Print the status line and any suggestion as the interaction moves
async fn print_views(mut rx: tokio::sync::watch::Receiver<InteractionView>) {
    let mut last_status = None;

    while rx.changed().await.is_ok() {
        let view = rx.borrow_and_update().clone();
        if last_status == Some(view.status) {
            continue;
        }
        last_status = Some(view.status);

        let hint = match view.state.primary_intent() {
            PrimaryIntent::Start => "Enter to order",
            PrimaryIntent::Cancel => "Enter to cancel",
            PrimaryIntent::Confirm => "Enter to confirm, x to cancel",
            PrimaryIntent::None => "",
        };
        println!("[{}] {hint}", view.status);

        if view.state == InteractionState::Confirming
            && let Some(s) = &view.suggestion
        {
            println!("  {} from {}", s.suggested_meal, s.restaurant);
            println!("  \"{}\"", s.spoken_response);
            if s.is_new_location {
                println!("  (new delivery address)");
            }
        }
    }
}

fn load_history(path: &Path) -> anyhow::Result<Vec<OrderRecord>> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_history(&text)?)
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let frequency = 440.0_f32;
    let num_samples = SPEECH_SAMPLE_RATE as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / SPEECH_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {num_samples} samples at {SPEECH_SAMPLE_RATE} Hz...");
    play_and_wait(samples).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Test speech synthesis through Gemini
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let client = GeminiClient::from_config(config, SettingsStore::new(config.ai.settings.clone()))?;

    println!("Synthesizing speech with {}...", config.ai.tts_model);
    let encoded = client
        .synthesize_speech(text)
        .await
        .ok_or_else(|| anyhow::anyhow!("speech synthesis returned no audio"))?;

    let samples = decode_base64_pcm16(&encoded)?;
    println!("Got {} samples of audio", samples.len());

    play_and_wait(samples).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// Queue samples and keep the process alive until they have played
async fn play_and_wait(samples: Vec<f32>) -> anyhow::Result<()> {
    #[allow(clippy::cast_precision_loss)]
    let seconds = samples.len() as f64 / f64::from(SPEECH_SAMPLE_RATE);

    tokio::task::spawn_blocking(move || AudioPlayback::new().play_samples(samples)).await??;
    tokio::time::sleep(Duration::from_secs_f64(seconds + 0.5)).await;
    Ok(())
}

/// Print the orders found in a screenshot
async fn extract(config: &Config, image: &Path) -> anyhow::Result<()> {
    let client = GeminiClient::from_config(config, SettingsStore::new(config.ai.settings.clone()))?;

    let snapshot = FileSnapshot::new(image).snapshot().await?;
    let history = client.extract_history(&snapshot).await;

    println!("{}", serde_json::to_string_pretty(&history)?);
    Ok(())
}

/// Print the suggestion for a single command
async fn decide(config: &Config, history: Option<&Path>, command: &str) -> anyhow::Result<()> {
    let client = GeminiClient::from_config(config, SettingsStore::new(config.ai.settings.clone()))?;

    let history = history.map(load_history).transpose()?.unwrap_or_default();
    let suggestion = client
        .decide(command, &history, config.ordering.location())
        .await?;

    println!("{}", serde_json::to_string_pretty(&suggestion)?);
    Ok(())
}
