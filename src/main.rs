use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use lumina_chat::voice::{
    AudioCapture, AudioOutput, DisabledSynthesizer, HttpSynthesizer, MicrophoneRecognizer,
    NullOutput, SampleSource, SourceFactory, SpeakerOutput, SpeechRecognizer, SpeechSynthesizer,
    SpeechToText, UnavailableRecognizer, calculate_energy,
};
use lumina_chat::{
    CannedChatClient, ChatClient, Config, HttpChatClient, Message, MessageStore, SessionController,
    SessionView, SubmitOutcome, WalletLink, db,
};

/// Lumina - voice chat client for AI agents
#[derive(Parser)]
#[command(name = "lumina", version, about)]
struct Cli {
    /// Chat endpoint URL (overrides config)
    #[arg(long)]
    chat_url: Option<String>,

    /// Voice used for spoken replies (overrides config)
    #[arg(long)]
    voice: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice features (for hosts without audio hardware)
    #[arg(long)]
    disable_voice: bool,

    /// Answer with canned replies instead of calling the chat endpoint
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Print the stored conversation
    History,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "info,lumina_chat=info",
        1 => "info,lumina_chat=debug",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
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

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load_with_options(cli.disable_voice);
    if let Some(url) = cli.chat_url {
        config.chat.url = url;
    }
    if let Some(voice) = cli.voice {
        config.voice.voice_id = voice;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::History => print_history(&config),
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&config, &text).await,
        };
    }

    tracing::debug!(?config, "loaded configuration");
    chat_repl(config, cli.offline).await
}

/// Build the voice collaborators, degrading each one independently
fn build_voice(
    config: &Config,
) -> (
    Arc<dyn SpeechSynthesizer>,
    Box<dyn AudioOutput>,
    Box<dyn SpeechRecognizer>,
) {
    if !config.voice.enabled {
        tracing::info!("voice disabled, text-only mode");
        return (
            Arc::new(DisabledSynthesizer),
            Box::new(NullOutput::default()),
            Box::new(UnavailableRecognizer),
        );
    }

    let synthesizer: Arc<dyn SpeechSynthesizer> = match HttpSynthesizer::new(
        &config.voice.tts_url,
        config.voice.tts_api_key.clone(),
        &config.voice.tts_model,
        config.audio_dir(),
    ) {
        Ok(tts) => Arc::new(tts),
        Err(e) => {
            tracing::warn!(error = %e, "TTS unavailable, replies will be text only");
            Arc::new(DisabledSynthesizer)
        }
    };

    let output: Box<dyn AudioOutput> = match SpeakerOutput::new() {
        Ok(speaker) => Box::new(speaker),
        Err(e) => {
            tracing::warn!(error = %e, "no speaker, audio will not be heard");
            Box::new(NullOutput::default())
        }
    };

    let recognizer: Box<dyn SpeechRecognizer> = match SpeechToText::new(
        &config.voice.stt_url,
        config.voice.stt_api_key.clone().unwrap_or_default(),
        config.voice.stt_model.clone(),
    ) {
        Ok(stt) => {
            let factory: SourceFactory =
                Arc::new(|| Ok(Box::new(AudioCapture::new()?) as Box<dyn SampleSource>));
            Box::new(MicrophoneRecognizer::new(factory, Arc::new(stt)))
        }
        Err(e) => {
            tracing::warn!(error = %e, "speech capture unavailable");
            Box::new(UnavailableRecognizer)
        }
    };

    (synthesizer, output, recognizer)
}

/// Interactive chat over stdin
#[allow(clippy::future_not_send, clippy::too_many_lines)]
async fn chat_repl(config: Config, offline: bool) -> anyhow::Result<()> {
    let pool = db::init(config.db_path())?;
    let store = MessageStore::new(pool.clone());
    let mut wallet = WalletLink::new(pool);

    let chat: Arc<dyn ChatClient> = if offline {
        tracing::info!("offline mode, using canned replies");
        Arc::new(CannedChatClient::default())
    } else {
        let client = HttpChatClient::new(&config.chat.url, config.chat.timeout)?;
        tracing::info!(url = client.url(), "using chat endpoint");
        Arc::new(client)
    };

    let (synthesizer, output, recognizer) = build_voice(&config);
    let session = SessionController::builder(chat, store)
        .synthesizer(synthesizer)
        .output(output)
        .recognizer(recognizer)
        .voice_id(&config.voice.voice_id)
        .identity(wallet.address().unwrap_or_default())
        .build();

    let agent = config.chat.agent.clone();
    tracing::info!(agent = %agent, "lumina ready");
    print_help();

    let watcher = tokio::spawn(print_updates(session.subscribe(), agent.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();

        match line.split_once(' ').unwrap_or((line, "")) {
            ("", _) => {}
            ("/quit" | "/exit", _) => break,
            ("/help", _) => print_help(),
            ("/voice", _) => session.toggle_voice_mode(),
            ("/mic", _) => session.handle_voice_input(),
            ("/history", _) => print_messages(&session.snapshot().messages, &agent),
            ("/play", arg) => match arg.trim().parse::<usize>() {
                Ok(index) => {
                    if session.toggle_audio(index).await {
                        println!("(playing #{index})");
                    } else {
                        println!("(#{index} not playing)");
                    }
                }
                Err(_) => println!("usage: /play <message number>"),
            },
            ("/wallet", address) => {
                let address = address.trim();
                let identity = wallet.update(!address.is_empty(), Some(address));
                if identity.is_empty() {
                    println!("(wallet disconnected, chatting anonymously)");
                } else {
                    println!("(wallet connected: {identity})");
                }
                session.set_identity(identity);
            }
            _ if line.starts_with('/') => println!("unknown command, try /help"),
            _ => {
                session.set_input(line);
                let session = session.clone();
                let text = line.to_string();
                tokio::spawn(async move {
                    match session.handle_submit(&text).await {
                        SubmitOutcome::Busy => println!("(still waiting for the previous reply)"),
                        SubmitOutcome::Failed => println!("(message failed to send)"),
                        SubmitOutcome::Empty | SubmitOutcome::Replied { .. } => {}
                    }
                });
            }
        }
    }

    session.shutdown().await;
    watcher.abort();
    Ok(())
}

fn print_help() {
    println!("Type a message and press enter. Commands:");
    println!("  /voice        toggle voice mode");
    println!("  /mic          start or stop recording");
    println!("  /play N       play or pause the audio of message N");
    println!("  /history      show the conversation");
    println!("  /wallet ADDR  chat as ADDR (no address disconnects)");
    println!("  /quit         exit");
}

/// Print messages and mode changes as the session publishes them
async fn print_updates(mut rx: tokio::sync::watch::Receiver<SessionView>, agent: String) {
    let mut last = rx.borrow_and_update().clone();

    while rx.changed().await.is_ok() {
        let view = rx.borrow_and_update().clone();

        if view.messages.len() > last.messages.len() {
            for (i, message) in view.messages.iter().enumerate().skip(last.messages.len()) {
                print_message(i, message, &agent);
            }
        }
        if view.is_voice_mode != last.is_voice_mode {
            println!("(voice mode {})", if view.is_voice_mode { "on" } else { "off" });
        }
        if view.is_recording != last.is_recording {
            println!("({})", if view.is_recording { "listening..." } else { "stopped listening" });
        }
        if !view.transcription.is_empty() && view.transcription != last.transcription {
            println!("(heard: {})", view.transcription);
        }

        last = view;
    }
}

fn print_message(index: usize, message: &Message, agent: &str) {
    let speaker = if message.is_user { "you" } else { agent };
    let audio = if message.has_audio() { " [audio]" } else { "" };
    println!("#{index} {speaker}> {}{audio}", message.text);
}

fn print_messages(messages: &[Message], agent: &str) {
    if messages.is_empty() {
        println!("(no messages)");
    }
    for (i, message) in messages.iter().enumerate() {
        print_message(i, message, agent);
    }
}

/// Print the stored conversation
fn print_history(config: &Config) -> anyhow::Result<()> {
    let pool = db::init(config.db_path())?;
    let messages = MessageStore::new(pool).load_messages();
    print_messages(&messages, &config.chat.agent);
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);

        capture.take_samples();
        if capture.is_closed() {
            println!("input device went away");
            break;
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

/// Wait until the speaker has played its clip
async fn wait_for_speaker(speaker: &SpeakerOutput) {
    while speaker.is_playing() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let mut speaker = SpeakerOutput::new()?;

    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {sample_rate} Hz...", samples.len());
    speaker.play_samples(samples, sample_rate).await?;
    wait_for_speaker(&speaker).await;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Test TTS output through the configured endpoint
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let tts = HttpSynthesizer::new(
        &config.voice.tts_url,
        config.voice.tts_api_key.clone(),
        &config.voice.tts_model,
        config.audio_dir(),
    )?;

    println!("Synthesizing speech with voice {}...", config.voice.voice_id);
    let url = tts
        .generate_voice(text, &config.voice.voice_id)
        .await
        .ok_or_else(|| anyhow::anyhow!("TTS synthesis failed, see log for details"))?;
    println!("Saved audio to {url}");

    println!("Playing audio...");
    let mut speaker = SpeakerOutput::new()?;
    speaker.load(&url);
    speaker.play().await?;
    wait_for_speaker(&speaker).await;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
