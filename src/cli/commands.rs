use crate::cli::args::{
    Args, Command, ConfigArgs, ConfigCommand, ConnectArgs, FrameArgs, SettingsArgs, SettingsCommand,
};
use crate::cli::output::{ConsoleWriter, OutputWriter, PortEntry};
use crate::core::protocol::{control, frame, MessageTemplate};
use crate::core::session::{ConnectionIndicator, SessionEvent, SessionLoop, SessionState};
use crate::domain::config::{SessionSettings, SimConfig};
use crate::domain::error::{SimError, SimResult};
use crate::infrastructure::config::{find_profile, ConfigManager, SettingsStore};
use crate::infrastructure::logging::init_logging;
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// A line typed by the operator during `connect`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorInput {
    /// Send the acknowledgment of the session protocol
    Ack,
    /// Send the canned glucose result
    SampleResult,
    Quit,
    /// Raw message, control tokens already expanded
    Message(String),
    Empty,
}

/// Interpret one stdin line.
pub fn parse_input(line: &str) -> OperatorInput {
    let line = line.trim_end_matches(['\r', '\n']);
    match line.trim() {
        "" => OperatorInput::Empty,
        ":ack" => OperatorInput::Ack,
        ":result" => OperatorInput::SampleResult,
        ":quit" | ":q" => OperatorInput::Quit,
        _ => OperatorInput::Message(control::expand_tokens(line)),
    }
}

/// Execute CLI command
pub async fn execute_command(args: Args) -> SimResult<()> {
    let writer = ConsoleWriter::new(args.output);

    let config_manager = ConfigManager::new()?;
    let config = if let Some(config_path) = &args.config {
        config_manager.load_config_from_path(config_path)?
    } else {
        config_manager.load_config()?
    };

    if !args.quiet {
        init_logging(&config.global.log_level, args.verbose)
            .map_err(|e| SimError::config(format!("Failed to initialize logging: {}", e)))?;
    }

    match args.command {
        Command::Connect(connect_args) => execute_connect(connect_args, &writer, &config).await,
        Command::Frame(frame_args) => execute_frame(frame_args, &writer),
        Command::Settings(settings_args) => execute_settings_command(settings_args, &writer),
        Command::Ports => {
            let ports: Vec<PortEntry> = serialport::available_ports()?.into_iter().map(PortEntry::from).collect();
            writer.write_ports(&ports)?;
            Ok(())
        }
        Command::Config(config_args) => execute_config_command(config_args, &writer, &config, &config_manager),
        Command::Version => {
            writer.write_message(&format!("analyzersim {}", env!("CARGO_PKG_VERSION")))?;
            Ok(())
        }
    }
}

/// Settings for `connect`: a settings file, a profile, or the link given inline.
/// `--protocol` and `--auto-respond` override whichever source is used.
pub fn resolve_settings(args: &ConnectArgs, config: &SimConfig) -> SimResult<SessionSettings> {
    let mut settings = if let Some(path) = &args.settings {
        SettingsStore::load(path)?
    } else if let Some(name) = &args.profile {
        find_profile(config, name)?.settings.clone()
    } else if let Some(link) = &args.link {
        SessionSettings::new(config.global.default_protocol, link.clone().into())
            .with_auto_respond(config.global.auto_respond)
    } else {
        return Err(SimError::InvalidInput(
            "Specify a link (tcp or serial), --settings or --profile".to_string(),
        ));
    };

    if let Some(protocol) = args.protocol {
        settings.protocol = protocol.into();
    }
    if args.auto_respond {
        settings.auto_respond = true;
    }

    settings.validate()?;
    Ok(settings)
}

async fn execute_connect(args: ConnectArgs, writer: &ConsoleWriter, config: &SimConfig) -> SimResult<()> {
    let settings = resolve_settings(&args, config)?;
    let protocol = settings.protocol;

    writer.write_message(&format!(
        "{} ({}) over {}{}",
        settings.machine,
        protocol,
        settings.connection.describe(),
        if settings.auto_respond { ", auto-respond on" } else { "" }
    ))?;

    let (mut session, mut events) = SessionLoop::with_channel(settings);
    let mut state_rx = session.subscribe_state();
    session.start()?;

    let mut indicator = ConnectionIndicator::Connecting;
    let mut pending: Vec<String> = args.send.iter().map(|m| control::expand_tokens(m)).collect();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = !args.no_stdin;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                show_event(writer, &event, &mut indicator)?;
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *state_rx.borrow_and_update();
                debug!(session = %session.id(), "Session state: {}", state);
                match state {
                    SessionState::Running => {
                        for message in pending.drain(..) {
                            // Failures are reported through the event stream.
                            let _ = session.send(&message).await;
                        }
                    }
                    SessionState::Stopped => break,
                    SessionState::Idle | SessionState::Connecting => {}
                }
            }
            line = lines.next_line(), if stdin_open && session.is_running() => {
                match line {
                    Ok(Some(line)) => match parse_input(&line) {
                        OperatorInput::Quit => break,
                        OperatorInput::Ack => {
                            let _ = session.send_template(MessageTemplate::ack_for(protocol)).await;
                        }
                        OperatorInput::SampleResult => {
                            let _ = session.send_template(MessageTemplate::SampleResult).await;
                        }
                        OperatorInput::Message(message) => {
                            let _ = session.send(&message).await;
                        }
                        OperatorInput::Empty => {}
                    },
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        stdin_open = false;
                    }
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    session.stop().await;
    while let Ok(event) = events.try_recv() {
        show_event(writer, &event, &mut indicator)?;
    }

    writer.write_statistics(&session.statistics())?;
    Ok(())
}

fn show_event(writer: &ConsoleWriter, event: &SessionEvent, indicator: &mut ConnectionIndicator) -> SimResult<()> {
    if let SessionEvent::StatusChanged(text) = event {
        if let Some(next) = ConnectionIndicator::from_status(text) {
            *indicator = next;
        }
    }
    writer.write_event(Local::now(), event, *indicator)?;
    Ok(())
}

fn execute_frame(args: FrameArgs, writer: &ConsoleWriter) -> SimResult<()> {
    let protocol = args.protocol.into();
    let framed = frame(protocol, &control::expand_tokens(&args.payload));
    writer.write_frame(protocol, &framed, args.format)?;
    Ok(())
}

fn execute_settings_command(args: SettingsArgs, writer: &ConsoleWriter) -> SimResult<()> {
    match args.command {
        SettingsCommand::Save { file, protocol, auto_respond, machine, link } => {
            let mut settings = SessionSettings::new(protocol.into(), link.into()).with_auto_respond(auto_respond);
            settings.machine = machine;
            settings.validate()?;

            SettingsStore::save(&file, &settings)?;
            writer.write_message(&format!("Settings saved to {}", file.display()))?;
        }
        SettingsCommand::Show { file } => {
            let settings = SettingsStore::load(&file)?;
            writer.write_settings(&settings)?;
        }
        SettingsCommand::ImportLegacy { input, output } => {
            let settings = SettingsStore::import_legacy(&input)?;
            SettingsStore::save(&output, &settings)?;
            writer.write_settings(&settings)?;
        }
    }
    Ok(())
}

fn execute_config_command(
    args: ConfigArgs,
    writer: &ConsoleWriter,
    config: &SimConfig,
    config_manager: &ConfigManager,
) -> SimResult<()> {
    match args.command {
        ConfigCommand::Show => {
            writer.write_config(config)?;
        }
        ConfigCommand::Init { path } => {
            let root = match path {
                Some(path) => path,
                None => std::env::current_dir()?,
            };
            let created = config_manager.init_project_config(&root)?;
            writer.write_message(&format!("Project configuration created at {}", created.display()))?;
        }
        ConfigCommand::Profiles => {
            writer.write_profiles(&config.profiles)?;
        }
    }
    Ok(())
}
