use analyzersim::core::protocol::control::{expand_tokens, render};
use analyzersim::{frame, ProtocolKind, SimConfig};
use std::time::{Duration, Instant};

/// Performance and stress tests
#[cfg(test)]
mod performance_tests {
    use super::*;

    const RESULT_RECORD: &str = "R|1|^^^GLU|5.5|mmol/L||||F";

    #[test]
    fn test_framing_performance() {
        let start = Instant::now();
        let mut total = 0;
        for _ in 0..10_000 {
            total += frame(ProtocolKind::Astm, RESULT_RECORD).len();
            total += frame(ProtocolKind::Hl7, RESULT_RECORD).len();
        }
        let elapsed = start.elapsed();

        assert_eq!(total, 10_000 * (2 * RESULT_RECORD.len() + 5));
        assert!(elapsed < Duration::from_millis(500), "Framing too slow: {:?}", elapsed);
    }

    #[test]
    fn test_token_expansion_performance() {
        let line = "<STX>1H|\\^&|||SIM<CR>P|1<CR>O|1||^^^GLU<CR>L|1|N<CR><ETX>";

        let start = Instant::now();
        for _ in 0..10_000 {
            let expanded = expand_tokens(line);
            assert_eq!(render(&expanded), line);
        }
        let elapsed = start.elapsed();

        assert!(elapsed < Duration::from_millis(500), "Token expansion too slow: {:?}", elapsed);
    }

    #[test]
    fn test_config_serialization_performance() {
        let config = SimConfig::default();

        let start = Instant::now();
        for _ in 0..1000 {
            let serialized = toml::to_string(&config).expect("Serialization failed");
            let _: SimConfig = toml::from_str(&serialized).expect("Deserialization failed");
        }
        let elapsed = start.elapsed();

        assert!(elapsed < Duration::from_millis(500), "Config serialization too slow: {:?}", elapsed);
    }
}
