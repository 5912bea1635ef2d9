use crate::domain::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// AnalyzerSim application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// Named session profiles
    #[serde(default)]
    pub profiles: Vec<ProfileConfig>,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Protocol used when the command line does not name one
    #[serde(default = "default_protocol")]
    pub default_protocol: ProtocolKind,
    /// Auto-respond default for ad-hoc sessions
    #[serde(default)]
    pub auto_respond: bool,
}

/// A named, reusable set of session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub settings: SessionSettings,
}

/// Line protocol style applied to outbound payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    Astm,
    Hl7,
}

/// Role of the simulator on a TCP link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TcpRole {
    Client,
    Server,
}

/// Transport family selected by a [`ConnectionConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Tcp,
    Serial,
}

/// Connection configuration
///
/// Only the parameter group of the selected variant exists, so a TCP
/// configuration can never carry a baud rate and vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConnectionConfig {
    #[serde(rename = "tcp")]
    Tcp {
        role: TcpRole,
        /// Peer host, used only in client role
        #[serde(default = "default_host")]
        host: String,
        port: u16,
        /// Upper bound on a client connect attempt
        #[serde(default = "default_connect_timeout")]
        connect_timeout_ms: u64,
        /// Local interface a server listens on
        #[serde(default = "default_bind_host")]
        bind_host: String,
    },
    #[serde(rename = "serial")]
    Serial {
        device_path: String,
        baud_rate: u32,
        /// Bound on a single line read
        #[serde(default = "default_read_timeout")]
        read_timeout_ms: u64,
    },
}

/// Everything a session loop needs to run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub protocol: ProtocolKind,
    /// Reply to every received message with the protocol's canned ACK
    #[serde(default)]
    pub auto_respond: bool,
    /// Simulated instrument name, informational only
    #[serde(default = "default_machine")]
    pub machine: String,
    pub connection: ConnectionConfig,
}

/// Flat settings file written by the desktop simulator
///
/// Every field is text; for serial links `port` holds the device name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacySettings {
    pub protocol: String,
    pub conn_type: String,
    pub mode: String,
    pub host: String,
    pub port: String,
    pub baudrate: String,
    #[serde(default = "default_machine")]
    pub machine: String,
    #[serde(default)]
    pub auto_response: bool,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_protocol() -> ProtocolKind {
    ProtocolKind::Astm
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_connect_timeout() -> u64 {
    3000
}

fn default_read_timeout() -> u64 {
    1000
}

fn default_machine() -> String {
    "Analyzer A".to_string()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            default_protocol: default_protocol(),
            auto_respond: false,
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolKind::Astm => write!(f, "ASTM"),
            ProtocolKind::Hl7 => write!(f, "HL7"),
        }
    }
}

impl FromStr for ProtocolKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "astm" => Ok(ProtocolKind::Astm),
            "hl7" => Ok(ProtocolKind::Hl7),
            other => Err(SimError::InvalidInput(format!("Unknown protocol: {}", other))),
        }
    }
}

impl fmt::Display for TcpRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TcpRole::Client => write!(f, "Client"),
            TcpRole::Server => write!(f, "Server"),
        }
    }
}

impl FromStr for TcpRole {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(TcpRole::Client),
            "server" => Ok(TcpRole::Server),
            other => Err(SimError::InvalidInput(format!("Unknown TCP role: {}", other))),
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionKind::Tcp => write!(f, "TCP/IP"),
            ConnectionKind::Serial => write!(f, "Serial"),
        }
    }
}

impl ConnectionConfig {
    /// TCP client configuration with default timeouts
    pub fn tcp_client(host: impl Into<String>, port: u16) -> Self {
        ConnectionConfig::Tcp {
            role: TcpRole::Client,
            host: host.into(),
            port,
            connect_timeout_ms: default_connect_timeout(),
            bind_host: default_bind_host(),
        }
    }

    /// TCP server configuration listening on all interfaces
    pub fn tcp_server(port: u16) -> Self {
        ConnectionConfig::Tcp {
            role: TcpRole::Server,
            host: default_host(),
            port,
            connect_timeout_ms: default_connect_timeout(),
            bind_host: default_bind_host(),
        }
    }

    /// Serial configuration with the default one second read timeout
    pub fn serial(device_path: impl Into<String>, baud_rate: u32) -> Self {
        ConnectionConfig::Serial {
            device_path: device_path.into(),
            baud_rate,
            read_timeout_ms: default_read_timeout(),
        }
    }

    pub fn kind(&self) -> ConnectionKind {
        match self {
            ConnectionConfig::Tcp { .. } => ConnectionKind::Tcp,
            ConnectionConfig::Serial { .. } => ConnectionKind::Serial,
        }
    }

    /// Short human readable endpoint description
    pub fn describe(&self) -> String {
        match self {
            ConnectionConfig::Tcp { role: TcpRole::Client, host, port, .. } => {
                format!("tcp client -> {}:{}", host, port)
            }
            ConnectionConfig::Tcp { role: TcpRole::Server, bind_host, port, .. } => {
                format!("tcp server on {}:{}", bind_host, port)
            }
            ConnectionConfig::Serial { device_path, baud_rate, .. } => {
                format!("serial {} @ {} baud", device_path, baud_rate)
            }
        }
    }

    pub fn validate(&self) -> SimResult<()> {
        match self {
            ConnectionConfig::Tcp { role, host, connect_timeout_ms, bind_host, .. } => {
                if *role == TcpRole::Client && host.trim().is_empty() {
                    return Err(SimError::config("TCP client requires a host"));
                }
                if *role == TcpRole::Server && bind_host.trim().is_empty() {
                    return Err(SimError::config("TCP server requires a bind host"));
                }
                if *connect_timeout_ms == 0 {
                    return Err(SimError::config("Connect timeout must be positive"));
                }
            }
            ConnectionConfig::Serial { device_path, baud_rate, read_timeout_ms } => {
                if device_path.trim().is_empty() {
                    return Err(SimError::config("Serial link requires a device path"));
                }
                if *baud_rate == 0 {
                    return Err(SimError::config("Baud rate must be positive"));
                }
                if *read_timeout_ms == 0 {
                    return Err(SimError::config("Read timeout must be positive"));
                }
            }
        }
        Ok(())
    }
}

impl SessionSettings {
    pub fn new(protocol: ProtocolKind, connection: ConnectionConfig) -> Self {
        Self {
            protocol,
            connection,
            auto_respond: false,
            machine: default_machine(),
        }
    }

    pub fn with_auto_respond(mut self, auto_respond: bool) -> Self {
        self.auto_respond = auto_respond;
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        self.connection.validate()
    }
}

impl TryFrom<LegacySettings> for SessionSettings {
    type Error = SimError;

    fn try_from(legacy: LegacySettings) -> Result<Self, Self::Error> {
        let protocol: ProtocolKind = legacy.protocol.parse()?;

        let connection = match legacy.conn_type.trim() {
            "TCP/IP" | "TCP" | "tcp" => {
                let port: u16 = legacy.port.trim().parse().map_err(|_| {
                    SimError::config(format!("Invalid TCP port: {}", legacy.port))
                })?;
                match legacy.mode.parse::<TcpRole>()? {
                    TcpRole::Client => ConnectionConfig::tcp_client(legacy.host.trim(), port),
                    TcpRole::Server => ConnectionConfig::tcp_server(port),
                }
            }
            "Serial" | "serial" => {
                let baud_rate: u32 = legacy.baudrate.trim().parse().map_err(|_| {
                    SimError::config(format!("Invalid baud rate: {}", legacy.baudrate))
                })?;
                ConnectionConfig::serial(legacy.port.trim(), baud_rate)
            }
            other => {
                return Err(SimError::config(format!("Unknown connection type: {}", other)));
            }
        };

        let settings = SessionSettings {
            protocol,
            connection,
            auto_respond: legacy.auto_response,
            machine: legacy.machine,
        };
        settings.validate()?;
        Ok(settings)
    }
}
