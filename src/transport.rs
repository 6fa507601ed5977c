//! Transport seam.
//!
//! The driver never opens ports itself. Anything that can exchange SCPI text
//! lines (serial, USBTMC, raw TCP) implements [`ScpiTransport`]; the driver
//! owns it exclusively, so requests are strictly half-duplex.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// Line-oriented SCPI transport.
#[async_trait]
pub trait ScpiTransport: Send {
    /// Send a command that produces no response.
    async fn send(&mut self, command: &str) -> Result<()>;

    /// Send a query and return the response line without its terminator.
    async fn query_string(&mut self, command: &str) -> Result<String>;

    /// Send a query whose response is a SCPI boolean (`1`/`0`/`ON`/`OFF`).
    async fn query_bool(&mut self, command: &str) -> Result<bool> {
        let response = self.query_string(command).await?;
        parse_scpi_bool(&response)
    }
}

/// Parse a SCPI boolean response.
pub fn parse_scpi_bool(response: &str) -> Result<bool> {
    let trimmed = response.trim().trim_matches('"');
    if trimmed == "1" || trimmed.eq_ignore_ascii_case("ON") || trimmed.eq_ignore_ascii_case("TRUE") {
        Ok(true)
    } else if trimmed == "0"
        || trimmed.eq_ignore_ascii_case("OFF")
        || trimmed.eq_ignore_ascii_case("FALSE")
    {
        Ok(false)
    } else {
        Err(anyhow!("Invalid SCPI boolean response: '{}'", response.trim()))
    }
}

#[async_trait]
impl<T: ScpiTransport + ?Sized> ScpiTransport for Box<T> {
    async fn send(&mut self, command: &str) -> Result<()> {
        (**self).send(command).await
    }

    async fn query_string(&mut self, command: &str) -> Result<String> {
        (**self).query_string(command).await
    }

    async fn query_bool(&mut self, command: &str) -> Result<bool> {
        (**self).query_bool(command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scpi_bool_variants() {
        assert!(parse_scpi_bool("1\n").unwrap());
        assert!(parse_scpi_bool("ON").unwrap());
        assert!(!parse_scpi_bool("0").unwrap());
        assert!(!parse_scpi_bool("off").unwrap());
        assert!(parse_scpi_bool("maybe").is_err());
    }
}
