use clap::Parser;
use i2c_responder_core::slave::Config;
use std::path::PathBuf;

/// Parses a byte written as decimal, `0x`-prefixed hex or `0b`-prefixed binary.
fn parse_byte(value: &str) -> Result<u8, String> {
    let value = value.trim();
    let parsed = if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        u8::from_str_radix(hex, 16)
    } else if let Some(bin) = value.strip_prefix("0b") {
        u8::from_str_radix(bin, 2)
    } else {
        value.parse()
    };
    parsed.map_err(|err| format!("invalid byte `{value}`: {err}"))
}

/// I2C responder CLI options
#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
#[must_use]
pub struct Opts {
    /// Custom Config path.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
    /// "Default Config" (skip the config file)
    #[arg(short, long)]
    pub(crate) clean: bool,
    /// Save the merged configuration to this path before running.
    #[arg(long)]
    pub(crate) save_config: Option<PathBuf>,
    /// 7-bit responder address. [default: 0x45]
    #[arg(short, long, value_parser = parse_byte)]
    pub(crate) address: Option<u8>,
    /// Bus speed in bits per second. [default: 400000]
    #[arg(short, long)]
    pub(crate) bit_rate: Option<u32>,
    /// Initial data register value. [default: 0x81]
    #[arg(short, long, value_parser = parse_byte)]
    pub(crate) seed: Option<u8>,
    /// 7-bit address the scripted master targets. [default: responder address]
    #[arg(short, long, value_parser = parse_byte)]
    pub(crate) target: Option<u8>,
    /// Bytes to write in the first transaction. e.g. `-w 0x10 0x20`
    #[arg(short, long, num_args = 1.., value_parser = parse_byte)]
    pub(crate) write: Vec<u8>,
    /// Bytes to read in the second transaction. Zero skips the read.
    #[arg(short, long, default_value_t = 1)]
    pub(crate) read: usize,
    /// Print records and final state as JSON lines.
    #[arg(long)]
    pub(crate) json: bool,
}

/// The transactions the scripted master runs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Script {
    pub target: u8,
    pub write: Vec<u8>,
    pub read: usize,
    pub json: bool,
}

impl Opts {
    /// Loads a base `Config`, merging with CLI options
    pub fn load(self) -> anyhow::Result<(Config, Script)> {
        let base = match (&self.config, self.clean) {
            (Some(path), false) => Config::load(path)?,
            _ => Config::default(),
        };
        let config = Config {
            address: self.address.unwrap_or(base.address),
            bit_rate: self.bit_rate.unwrap_or(base.bit_rate),
            seed: self.seed.unwrap_or(base.seed),
            capture_records: true,
        };
        config.validate()?;
        if let Some(path) = &self.save_config {
            config.save(path)?;
        }

        let script = Script {
            target: self.target.unwrap_or(config.address),
            write: self.write,
            read: self.read,
            json: self.json,
        };
        Ok((config, script))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_formats() {
        assert_eq!(parse_byte("0x45"), Ok(0x45));
        assert_eq!(parse_byte("0X7f"), Ok(0x7F));
        assert_eq!(parse_byte("0b1010"), Ok(0x0A));
        assert_eq!(parse_byte("200"), Ok(200));
        assert!(parse_byte("256").is_err());
        assert!(parse_byte("0xZZ").is_err());
    }

    #[test]
    fn merge_over_defaults() {
        let opts = Opts::parse_from([
            "i2c-responder",
            "--clean",
            "-a",
            "0x20",
            "-w",
            "0x01",
            "2",
            "-r",
            "3",
        ]);
        let (config, script) = opts.load().expect("valid options");
        assert_eq!(config.address, 0x20);
        assert_eq!(config.bit_rate, Config::DEFAULT_BIT_RATE);
        assert_eq!(config.seed, Config::DEFAULT_SEED);
        assert_eq!(
            script,
            Script {
                target: 0x20,
                write: vec![0x01, 0x02],
                read: 3,
                json: false,
            }
        );
    }

    #[test]
    fn rejects_wide_address() {
        let opts = Opts::parse_from(["i2c-responder", "--clean", "-a", "0x80"]);
        assert!(opts.load().is_err());
    }
}
