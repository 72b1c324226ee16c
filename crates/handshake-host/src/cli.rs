use clap::Parser;
use i2c_handshake::{HandshakeConfig, Tick};

const REQUEST: &str = "Hello from CM7 Master!";
const RESPONSE: &str = "Hello from CM7 Master! Positive response from slave!";

/// Run the master/slave handshake over an in-memory bus with a simulated
/// 1 kHz tick.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Round trips to run before stopping
    #[arg(long, default_value_t = 3)]
    pub cycles: u32,

    /// Payload the master sends every cycle
    #[arg(long, default_value = REQUEST)]
    pub request: String,

    /// Payload the slave answers with
    #[arg(long, default_value = RESPONSE)]
    pub response: String,

    /// 7-bit address the slave answers to
    #[arg(long, default_value = "0x01", value_parser = parse_address)]
    pub address: u8,

    /// Address the master targets, if different from the slave's
    #[arg(long, value_parser = parse_address)]
    pub target: Option<u8>,

    /// Ticks between the master's send completing and its receive starting
    #[arg(long, default_value_t = HandshakeConfig::DEFAULT.short_gate)]
    pub short_gate: Tick,

    /// Ticks between the master's receive completing and the next send
    #[arg(long, default_value_t = HandshakeConfig::DEFAULT.cycle_gate)]
    pub cycle_gate: Tick,

    /// Fail if a transfer is still outstanding after this many ticks
    #[arg(long)]
    pub await_timeout: Option<Tick>,

    /// Give up after this many simulated ticks
    #[arg(long, default_value_t = 1_000_000)]
    pub max_ticks: Tick,
}

impl Cli {
    pub fn config(&self) -> HandshakeConfig {
        let config =
            HandshakeConfig::symmetric(self.request.len(), self.response.len())
                .with_address(self.address)
                .with_gates(self.short_gate, self.cycle_gate);
        match self.await_timeout {
            Some(timeout) => config.with_await_timeout(timeout),
            None => config,
        }
    }
}

fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address `{s}`: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_decimal_addresses() {
        assert_eq!(parse_address("0x01"), Ok(1));
        assert_eq!(parse_address("0X7f"), Ok(0x7F));
        assert_eq!(parse_address("42"), Ok(42));
        assert!(parse_address("0x100").is_err());
    }

    #[test]
    fn defaults_match_bring_up_firmware() {
        let cli = Cli::parse_from(["handshake-host"]);
        assert_eq!(cli.config(), HandshakeConfig::DEFAULT);
    }
}
