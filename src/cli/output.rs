use crate::cli::args::{DataFormat, OutputFormat};
use crate::core::protocol::control;
use crate::core::session::{ConnectionIndicator, SessionEvent, SessionStatistics};
use crate::domain::config::{ProfileConfig, ProtocolKind, SessionSettings, SimConfig};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::io;
use tabled::{Table, Tabled};

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_event(&self, at: DateTime<Local>, event: &SessionEvent, indicator: ConnectionIndicator)
        -> Result<(), OutputError>;
    fn write_frame(&self, protocol: ProtocolKind, framed: &[u8], format: DataFormat) -> Result<(), OutputError>;
    fn write_settings(&self, settings: &SessionSettings) -> Result<(), OutputError>;
    fn write_config(&self, config: &SimConfig) -> Result<(), OutputError>;
    fn write_profiles(&self, profiles: &[ProfileConfig]) -> Result<(), OutputError>;
    fn write_ports(&self, ports: &[PortEntry]) -> Result<(), OutputError>;
    fn write_statistics(&self, stats: &SessionStatistics) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for crate::domain::error::SimError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Serial port found on the host
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct PortEntry {
    pub name: String,
    #[tabled(rename = "type")]
    pub kind: String,
}

impl From<serialport::SerialPortInfo> for PortEntry {
    fn from(info: serialport::SerialPortInfo) -> Self {
        let kind = match info.port_type {
            serialport::SerialPortType::UsbPort(usb) => match usb.product {
                Some(product) => format!("USB ({})", product),
                None => format!("USB {:04x}:{:04x}", usb.vid, usb.pid),
            },
            serialport::SerialPortType::PciPort => "PCI".to_string(),
            serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
            serialport::SerialPortType::Unknown => "Unknown".to_string(),
        };
        Self { name: info.port_name, kind }
    }
}

/// One line of the session log: `[HH:MM:SS] <prefix> text`
pub fn format_event_line(at: DateTime<Local>, event: &SessionEvent) -> String {
    let prefix = match event {
        SessionEvent::DataReceived(_) => "<<",
        SessionEvent::StatusChanged(_) => "--",
    };
    format!("[{}] {} {}", at.format("%H:%M:%S"), prefix, control::render(event.text()))
}

/// Encode framed bytes for display.
pub fn encode_frame(framed: &[u8], format: DataFormat) -> String {
    match format {
        DataFormat::Hex => hex::encode(framed),
        DataFormat::Base64 => general_purpose::STANDARD.encode(framed),
        DataFormat::Text => control::render(&String::from_utf8_lossy(framed)),
    }
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

#[derive(Serialize)]
struct EventRecord<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a SessionEvent,
    indicator: ConnectionIndicator,
}

impl OutputWriter for ConsoleWriter {
    fn write_event(
        &self,
        at: DateTime<Local>,
        event: &SessionEvent,
        indicator: ConnectionIndicator,
    ) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let record = EventRecord { timestamp: at.to_rfc3339(), event, indicator };
                println!("{}", serde_json::to_string(&record)?);
            }
            _ => {
                if event.is_status() {
                    println!("{}  [{}]", format_event_line(at, event), indicator);
                } else {
                    println!("{}", format_event_line(at, event));
                }
            }
        }
        Ok(())
    }

    fn write_frame(&self, protocol: ProtocolKind, framed: &[u8], format: DataFormat) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "protocol": protocol.to_string(),
                    "length": framed.len(),
                    "hex": hex::encode(framed),
                    "base64": general_purpose::STANDARD.encode(framed),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => println!("{}", encode_frame(framed, format)),
        }
        Ok(())
    }

    fn write_settings(&self, settings: &SessionSettings) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(settings)?),
            OutputFormat::Table => {
                let row = SettingsTableRow::from(settings);
                println!("{}", Table::new(vec![row]));
            }
            OutputFormat::Text => {
                println!("Session settings:");
                println!("  Protocol: {}", settings.protocol);
                println!("  Connection: {}", settings.connection.describe());
                println!("  Machine: {}", settings.machine);
                println!("  Auto-respond: {}", settings.auto_respond);
            }
        }
        Ok(())
    }

    fn write_config(&self, config: &SimConfig) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
            OutputFormat::Table => {
                self.write_profiles(&config.profiles)?;
            }
            OutputFormat::Text => {
                println!("AnalyzerSim Configuration:");
                println!("  Log level: {}", config.global.log_level);
                println!("  Default protocol: {}", config.global.default_protocol);
                println!("  Auto-respond: {}", config.global.auto_respond);

                if !config.profiles.is_empty() {
                    println!("  Profiles:");
                    for profile in &config.profiles {
                        let desc = if profile.description.is_empty() { "No description" } else { &profile.description };
                        println!("    {}: {}", profile.name, desc);
                    }
                }
            }
        }
        Ok(())
    }

    fn write_profiles(&self, profiles: &[ProfileConfig]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(profiles)?),
            OutputFormat::Table => {
                if !profiles.is_empty() {
                    let rows: Vec<ProfileTableRow> = profiles.iter().map(ProfileTableRow::from).collect();
                    println!("{}", Table::new(rows));
                }
            }
            OutputFormat::Text => {
                for profile in profiles {
                    println!("Profile: {}", profile.name);
                    let desc = if profile.description.is_empty() { "No description" } else { &profile.description };
                    println!("  Description: {}", desc);
                    println!("  Protocol: {}", profile.settings.protocol);
                    println!("  Connection: {}", profile.settings.connection.describe());
                    println!();
                }
            }
        }
        Ok(())
    }

    fn write_ports(&self, ports: &[PortEntry]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(ports)?),
            OutputFormat::Table => {
                if !ports.is_empty() {
                    println!("{}", Table::new(ports.to_vec()));
                }
            }
            OutputFormat::Text => {
                if ports.is_empty() {
                    println!("No serial ports found");
                }
                for port in ports {
                    println!("{}  {}", port.name, port.kind);
                }
            }
        }
        Ok(())
    }

    fn write_statistics(&self, stats: &SessionStatistics) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(stats)?),
            OutputFormat::Table => println!("{}", Table::new(vec![StatisticsTableRow::from(stats)])),
            OutputFormat::Text => {
                println!("Statistics:");
                println!("  Messages sent: {}", stats.messages_sent);
                println!("  Messages received: {}", stats.messages_received);
                println!("  Bytes sent: {}", stats.bytes_sent);
                println!("  Bytes received: {}", stats.bytes_received);
                println!("  Send errors: {}", stats.send_errors);
            }
        }
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "message": message,
                    "level": "info"
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => {
                println!("{}", message);
            }
        }
        Ok(())
    }
}

/// Table row for session settings
#[derive(Tabled)]
struct SettingsTableRow {
    protocol: String,
    connection: String,
    machine: String,
    auto_respond: bool,
}

impl From<&SessionSettings> for SettingsTableRow {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            protocol: settings.protocol.to_string(),
            connection: settings.connection.describe(),
            machine: settings.machine.clone(),
            auto_respond: settings.auto_respond,
        }
    }
}

/// Table row for profile configuration
#[derive(Tabled)]
struct ProfileTableRow {
    name: String,
    protocol: String,
    link: String,
    connection: String,
    auto_respond: bool,
}

impl From<&ProfileConfig> for ProfileTableRow {
    fn from(profile: &ProfileConfig) -> Self {
        Self {
            name: profile.name.clone(),
            protocol: profile.settings.protocol.to_string(),
            link: profile.settings.connection.kind().to_string(),
            connection: profile.settings.connection.describe(),
            auto_respond: profile.settings.auto_respond,
        }
    }
}

#[derive(Tabled)]
struct StatisticsTableRow {
    sent: u64,
    received: u64,
    bytes_sent: u64,
    bytes_received: u64,
    send_errors: u64,
}

impl From<&SessionStatistics> for StatisticsTableRow {
    fn from(stats: &SessionStatistics) -> Self {
        Self {
            sent: stats.messages_sent,
            received: stats.messages_received,
            bytes_sent: stats.bytes_sent,
            bytes_received: stats.bytes_received,
            send_errors: stats.send_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 2, 25, 12, 30, 5).unwrap()
    }

    #[test]
    fn test_event_line_renders_control_characters() {
        let line = format_event_line(noon(), &SessionEvent::DataReceived("\u{2}H|1\u{3}".to_string()));
        assert_eq!(line, "[12:30:05] << <STX>H|1<ETX>");

        let line = format_event_line(noon(), &SessionEvent::status("Connection closed"));
        assert_eq!(line, "[12:30:05] -- Connection closed");
    }

    #[test]
    fn test_encode_frame_formats() {
        let framed = [0x02, b'A', b'C', b'K', 0x03];
        assert_eq!(encode_frame(&framed, DataFormat::Hex), "0241434b03");
        assert_eq!(encode_frame(&framed, DataFormat::Base64), "AkFDSwM=");
        assert_eq!(encode_frame(&framed, DataFormat::Text), "<STX>ACK<ETX>");
    }

    #[test]
    fn test_event_record_json_shape() {
        let event = SessionEvent::status("Connected via Serial");
        let record = EventRecord {
            timestamp: "t".to_string(),
            event: &event,
            indicator: ConnectionIndicator::Connected,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event"], "StatusChanged");
        assert_eq!(json["text"], "Connected via Serial");
        assert_eq!(json["indicator"], "Connected");
    }
}
