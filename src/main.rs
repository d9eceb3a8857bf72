use key_listener::console_display::ConsoleDisplay;
use key_listener::controller::Controller;
use key_listener::data_logger::DataLogger;
use key_listener::presenter::Presenter;
use key_listener::settings::Settings;
use key_listener::simulator::Simulator;
use key_listener::text_presenter::TextPresenter;
use key_listener::types::*;
use key_listener::wav_player::WavPlayer;

use clap::{Parser, ValueEnum};
use crossbeam_channel::{bounded, Sender};
use log::{error, info};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum Source {
    /// Synthetic melody in --scale
    Simulate,
    /// Play back --wav at real-time pace
    Wav,
    /// Default microphone (needs the `audio` feature)
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum View {
    /// Full-screen dashboard with waveform and key bars
    Console,
    /// One plain line per detected note
    Text,
}

#[derive(Parser)]
#[command(name = "key-listener")]
#[command(about = "Live pitch tracking and musical key estimation")]
struct Cli {
    /// Audio source
    #[arg(long, value_enum, default_value = "simulate")]
    source: Source,

    /// WAV file for --source wav
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Key the simulator plays in, e.g. "D major" or "F# minor"
    #[arg(long, default_value = "G major")]
    scale: String,

    /// How many times the simulator repeats its melody
    #[arg(long, default_value_t = 3)]
    repeats: usize,

    /// Output view
    #[arg(long, value_enum, default_value = "console")]
    presenter: View,

    /// Dashboard redraw rate (Hz)
    #[arg(long, default_value_t = 20)]
    display_hz: u32,

    /// Notes required in the window before the text view names a key
    #[arg(long, default_value_t = 5)]
    min_notes: usize,

    /// JSON settings file (thresholds, frame size, window, tick rate)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write the effective settings (file + overrides) to this path
    #[arg(long)]
    save_settings: Option<PathBuf>,

    /// Override the controller tick rate (Hz)
    #[arg(long)]
    tick_hz: Option<u32>,

    /// Override the analysis frame size (samples)
    #[arg(long)]
    frame_size: Option<usize>,

    /// Enable session logging
    #[arg(long)]
    log_data: bool,

    /// Output directory for logged sessions
    #[arg(long, default_value = "./sessions")]
    output_dir: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => match Settings::load(path) {
            Ok(s) => s,
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => Settings::default(),
    };
    if let Some(hz) = cli.tick_hz {
        settings.tick_hz = hz;
    }
    if let Some(n) = cli.frame_size {
        settings.frame_size = n;
    }
    if let Err(e) = settings.validate() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }
    if let Some(path) = &cli.save_settings {
        if let Err(e) = settings.save(path) {
            error!("save settings {:?}: {}", path, e);
            return ExitCode::FAILURE;
        }
    }

    let scale: KeyCandidate = match cli.scale.parse() {
        Ok(k) => k,
        Err(e) => {
            error!("--scale: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("═══════════════════════════════════════════════");
    info!("  KEY LISTENER v{}", env!("CARGO_PKG_VERSION"));
    info!("  Source: {:?}", cli.source);
    info!("  View: {:?}", cli.presenter);
    info!("  Frame: {} samples, window {}ms", settings.frame_size, settings.window_ms);
    info!("  Type 'r' + Enter to reset, 'q' + Enter to quit");
    info!("═══════════════════════════════════════════════");

    let clock = SessionClock::new();

    // Channel: sources + stdin commands → controller
    let (input_tx, input_rx) = bounded::<InputEvent>(1024);

    let mut handles = Vec::new();

    // ─── Presenter ──────────────────────────────────────────────────
    let presenter: Box<dyn Presenter> = match cli.presenter {
        View::Console => Box::new(ConsoleDisplay::stdout(settings.tick_hz, cli.display_hz)),
        View::Text => Box::new(TextPresenter::stdout().with_min_notes(cli.min_notes)),
    };
    let mut controller = Controller::new(settings.clone())
        .with_presenter(presenter)
        .with_clock(clock.clone());

    // ─── Data logger ────────────────────────────────────────────────
    if cli.log_data {
        let (tx, rx) = bounded::<TickReport>(4096);
        controller = controller.with_report_sender(tx);
        let source = format!("{:?}", cli.source);
        match DataLogger::new(rx, &cli.output_dir, settings.clone(), source) {
            Ok(logger) => {
                handles.push(
                    thread::Builder::new()
                        .name("logger".into())
                        .spawn(move || {
                            if let Err(e) = logger.run() {
                                error!("Data logger: {}", e);
                            }
                        })
                        .expect("spawn logger thread"),
                );
            }
            Err(e) => error!("Data logging disabled: {}", e),
        }
    }

    // ─── Input source ───────────────────────────────────────────────
    // Kept alive until the controller exits; dropping it stops live capture.
    #[cfg(feature = "audio")]
    let mut _capture = None;

    match cli.source {
        Source::Wav => {
            let Some(path) = cli.wav.clone() else {
                error!("--source wav requires --wav <path>");
                return ExitCode::FAILURE;
            };
            let tx = input_tx.clone();
            let wav_clock = clock.clone();
            handles.push(
                thread::Builder::new()
                    .name("wav-player".into())
                    .spawn(move || WavPlayer::new(path, tx, wav_clock).run())
                    .expect("spawn wav thread"),
            );
        }
        Source::Live => {
            #[cfg(feature = "audio")]
            {
                match key_listener::audio_input::AudioCapture::start(
                    input_tx.clone(),
                    clock.clone(),
                ) {
                    Ok(c) => _capture = Some(c),
                    Err(e) => {
                        error!("Audio capture failed: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            }
            #[cfg(not(feature = "audio"))]
            {
                error!("Live input requires the 'audio' feature. Falling back to simulator.");
                spawn_simulator(&mut handles, input_tx.clone(), clock.clone(), scale, cli.repeats);
            }
        }
        Source::Simulate => {
            spawn_simulator(&mut handles, input_tx.clone(), clock.clone(), scale, cli.repeats);
        }
    }

    // ─── Stdin commands ─────────────────────────────────────────────
    // Not joined: it stays blocked on stdin until the process exits.
    let cmd_tx = input_tx;
    let _ = thread::Builder::new().name("stdin".into()).spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let event = match line.trim() {
                "r" | "reset" => InputEvent::Reset,
                "q" | "quit" => InputEvent::Shutdown,
                _ => continue,
            };
            let quit = matches!(event, InputEvent::Shutdown);
            if cmd_tx.send(event).is_err() || quit {
                break;
            }
        }
    });

    // ─── Controller (blocks until the source finishes or 'q') ──────
    controller.run(input_rx);
    info!("Processed {} ticks", controller.tick_count());
    drop(controller);

    for h in handles {
        let _ = h.join();
    }
    ExitCode::SUCCESS
}

fn spawn_simulator(
    handles: &mut Vec<thread::JoinHandle<()>>,
    tx: Sender<InputEvent>,
    clock: SessionClock,
    scale: KeyCandidate,
    repeats: usize,
) {
    info!("Starting simulator in {}...", scale);
    handles.push(
        thread::Builder::new()
            .name("simulator".into())
            .spawn(move || Simulator::new(clock, tx, scale).run(repeats))
            .expect("spawn simulator thread"),
    );
}
