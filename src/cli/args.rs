use crate::domain::config::{ConnectionConfig, ProtocolKind, TcpRole};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Command line arguments for AnalyzerSim
#[derive(Parser, Debug)]
#[command(
    name = "analyzersim",
    version = env!("CARGO_PKG_VERSION"),
    about = "Laboratory analyzer simulator for LIS integration testing",
    long_about = "Simulates a laboratory analyzer talking ASTM or HL7 to a Laboratory Information System over TCP (client or server) or a serial line."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress log output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulated analyzer session
    Connect(ConnectArgs),
    /// Show the framed bytes of a payload
    Frame(FrameArgs),
    /// Session settings files
    Settings(SettingsArgs),
    /// List available serial ports
    Ports,
    /// Configuration management commands
    Config(ConfigArgs),
    /// Display version information
    Version,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Table output
    Table,
}

/// Protocol argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolArg {
    Astm,
    Hl7,
}

/// TCP role argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleArg {
    Client,
    Server,
}

/// Encoding used to print framed bytes
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// Control characters shown as <NAME> tokens
    Text,
    Hex,
    Base64,
}

/// Arguments of `connect`
#[derive(ClapArgs, Debug)]
pub struct ConnectArgs {
    /// Line protocol (defaults to the configured protocol)
    #[arg(short, long, value_enum)]
    pub protocol: Option<ProtocolArg>,

    /// Acknowledge every received message automatically
    #[arg(short, long)]
    pub auto_respond: bool,

    /// Load settings from a JSON settings file
    #[arg(long, conflicts_with = "profile")]
    pub settings: Option<PathBuf>,

    /// Use a named profile from the configuration
    #[arg(long)]
    pub profile: Option<String>,

    /// Send this message once connected (control tokens like <STX> allowed)
    #[arg(long)]
    pub send: Vec<String>,

    /// Do not read messages from stdin
    #[arg(long)]
    pub no_stdin: bool,

    /// Link to open
    #[command(subcommand)]
    pub link: Option<LinkArgs>,
}

/// Link selection shared by `connect` and `settings save`
#[derive(Subcommand, Debug, Clone)]
pub enum LinkArgs {
    /// TCP/IP link
    Tcp {
        /// Client connects to the LIS, server waits for it
        #[arg(short, long, value_enum, default_value = "client")]
        role: RoleArg,
        /// LIS host (client role)
        #[arg(long, default_value = "localhost")]
        host: String,
        /// TCP port
        #[arg(short, long, default_value = "5000")]
        port: u16,
        /// Interface to listen on (server role)
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
        /// Client connect timeout in milliseconds
        #[arg(long, default_value = "3000")]
        timeout: u64,
    },
    /// Serial link
    Serial {
        /// Serial device, e.g. /dev/ttyUSB0 or COM1
        #[arg(short, long)]
        device: String,
        /// Baud rate
        #[arg(short, long, default_value = "9600")]
        baud: u32,
        /// Line read timeout in milliseconds
        #[arg(long, default_value = "1000")]
        timeout: u64,
    },
}

/// Arguments of `frame`
#[derive(ClapArgs, Debug)]
pub struct FrameArgs {
    /// Payload to frame (control tokens like <CR> allowed)
    pub payload: String,

    /// Line protocol
    #[arg(short, long, value_enum, default_value = "astm")]
    pub protocol: ProtocolArg,

    /// Printed encoding
    #[arg(short, long, value_enum, default_value = "hex")]
    pub format: DataFormat,
}

/// Settings file arguments
#[derive(ClapArgs, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommand,
}

/// Settings file subcommands
#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Write a settings file
    Save {
        /// Output file
        file: PathBuf,
        /// Line protocol
        #[arg(short, long, value_enum, default_value = "astm")]
        protocol: ProtocolArg,
        /// Enable auto-respond
        #[arg(short, long)]
        auto_respond: bool,
        /// Simulated instrument name
        #[arg(short, long, default_value = "Analyzer A")]
        machine: String,
        #[command(subcommand)]
        link: LinkArgs,
    },
    /// Print a settings file
    Show {
        file: PathBuf,
    },
    /// Convert a desktop simulator settings file
    ImportLegacy {
        /// Legacy settings file
        input: PathBuf,
        /// Converted settings file
        output: PathBuf,
    },
}

/// Configuration management arguments
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    /// Configuration subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Create a project configuration with sample profiles
    Init {
        /// Project directory
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
    /// List session profiles
    Profiles,
}

impl From<ProtocolArg> for ProtocolKind {
    fn from(protocol: ProtocolArg) -> Self {
        match protocol {
            ProtocolArg::Astm => ProtocolKind::Astm,
            ProtocolArg::Hl7 => ProtocolKind::Hl7,
        }
    }
}

impl From<RoleArg> for TcpRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Client => TcpRole::Client,
            RoleArg::Server => TcpRole::Server,
        }
    }
}

impl From<LinkArgs> for ConnectionConfig {
    fn from(link: LinkArgs) -> Self {
        match link {
            LinkArgs::Tcp { role, host, port, bind, timeout } => ConnectionConfig::Tcp {
                role: role.into(),
                host,
                port,
                connect_timeout_ms: timeout,
                bind_host: bind,
            },
            LinkArgs::Serial { device, baud, timeout } => ConnectionConfig::Serial {
                device_path: device,
                baud_rate: baud,
                read_timeout_ms: timeout,
            },
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_tcp_server_args() {
        let args = Args::try_parse_from([
            "analyzersim", "connect", "--protocol", "hl7", "--auto-respond", "tcp", "--role", "server", "--port", "6000",
        ])
        .unwrap();

        let Command::Connect(connect) = args.command else {
            panic!("expected connect");
        };
        assert_eq!(connect.protocol, Some(ProtocolArg::Hl7));
        assert!(connect.auto_respond);
        let config: ConnectionConfig = connect.link.unwrap().into();
        assert_eq!(config, ConnectionConfig::tcp_server(6000));
    }

    #[test]
    fn test_connect_serial_args() {
        let args = Args::try_parse_from([
            "analyzersim", "connect", "serial", "--device", "/dev/ttyS1", "--baud", "19200",
        ])
        .unwrap();

        let Command::Connect(connect) = args.command else {
            panic!("expected connect");
        };
        let config: ConnectionConfig = connect.link.unwrap().into();
        assert_eq!(config, ConnectionConfig::serial("/dev/ttyS1", 19200));
    }

    #[test]
    fn test_settings_conflicts_with_profile() {
        let result = Args::try_parse_from([
            "analyzersim", "connect", "--settings", "a.json", "--profile", "lis-client",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_frame_defaults() {
        let args = Args::try_parse_from(["analyzersim", "frame", "ACK"]).unwrap();
        let Command::Frame(frame) = args.command else {
            panic!("expected frame");
        };
        assert_eq!(frame.protocol, ProtocolArg::Astm);
        assert_eq!(frame.format, DataFormat::Hex);
    }
}
