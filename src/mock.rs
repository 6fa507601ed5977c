//! Scripted transport for tests and offline development.
//!
//! Exchanges are consumed strictly in order. A command that does not match the
//! next scripted exchange fails like a broken link would, so a test sees a
//! `Communication` error instead of a silently wrong answer.
//!
//! Like a real meter, the mock answers `*OPC?` with `1` on its own unless the
//! next scripted exchange is an `*OPC?`; the query is still recorded in
//! [`MockTransport::sent`]. Call [`MockTransport::strict_opc`] to script every
//! `*OPC?` explicitly.
//!
//! ```
//! use daq_driver_scpi_dmm::mock::MockTransport;
//! use daq_driver_scpi_dmm::ScpiTransport;
//!
//! # tokio_test::block_on(async {
//! let mut mock = MockTransport::new();
//! mock.expect_query("CONF?", "\"VOLT +1.00000E+01,+1.00000E-05\"")
//!     .expect_query("READ?", "+1.23456E+00");
//! assert_eq!(mock.remaining(), 2);
//!
//! let mode = mock.query_string("CONF?").await.unwrap();
//! assert!(mode.contains("VOLT"));
//! assert_eq!(mock.remaining(), 1);
//! # })
//! ```

use crate::transport::ScpiTransport;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum Reply {
    Ack,
    Text(String),
    Fail(String),
}

#[derive(Debug, Clone)]
struct Exchange {
    command: String,
    is_query: bool,
    reply: Reply,
}

const OPC_QUERY: &str = "*OPC?";

/// In-memory [`ScpiTransport`] driven by a script of expected exchanges.
#[derive(Debug)]
pub struct MockTransport {
    script: VecDeque<Exchange>,
    sent: Vec<String>,
    answer_opc: bool,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            script: VecDeque::new(),
            sent: Vec::new(),
            answer_opc: true,
        }
    }
}

impl MockTransport {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop answering unscripted `*OPC?` queries.
    pub fn strict_opc(&mut self) -> &mut Self {
        self.answer_opc = false;
        self
    }

    /// Expect `command` as a write with no response.
    pub fn expect_send(&mut self, command: &str) -> &mut Self {
        self.push(command, false, Reply::Ack)
    }

    /// Expect `command` as a query answered with `response`.
    pub fn expect_query(&mut self, command: &str, response: &str) -> &mut Self {
        self.push(command, true, Reply::Text(response.to_string()))
    }

    /// Expect `command` as a query that fails with `message`.
    pub fn fail_query(&mut self, command: &str, message: &str) -> &mut Self {
        self.push(command, true, Reply::Fail(message.to_string()))
    }

    /// Expect `command` as a write that fails with `message`.
    pub fn fail_send(&mut self, command: &str, message: &str) -> &mut Self {
        self.push(command, false, Reply::Fail(message.to_string()))
    }

    /// Every command received so far, in order.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Scripted exchanges not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    fn push(&mut self, command: &str, is_query: bool, reply: Reply) -> &mut Self {
        self.script.push_back(Exchange {
            command: command.to_string(),
            is_query,
            reply,
        });
        self
    }

    fn next(&mut self, command: &str, is_query: bool) -> Result<Reply> {
        self.sent.push(command.to_string());
        if self.answer_opc
            && is_query
            && command == OPC_QUERY
            && self.script.front().map_or(true, |e| e.command != OPC_QUERY)
        {
            return Ok(Reply::Text("1".to_string()));
        }
        let Some(exchange) = self.script.pop_front() else {
            bail!("unexpected command '{}' (script exhausted)", command);
        };
        if exchange.command != command || exchange.is_query != is_query {
            bail!(
                "expected {} '{}', got {} '{}'",
                kind(exchange.is_query),
                exchange.command,
                kind(is_query),
                command
            );
        }
        Ok(exchange.reply)
    }
}

fn kind(is_query: bool) -> &'static str {
    if is_query {
        "query"
    } else {
        "write"
    }
}

#[async_trait]
impl ScpiTransport for MockTransport {
    async fn send(&mut self, command: &str) -> Result<()> {
        match self.next(command, false)? {
            Reply::Ack | Reply::Text(_) => Ok(()),
            Reply::Fail(message) => Err(anyhow!(message)),
        }
    }

    async fn query_string(&mut self, command: &str) -> Result<String> {
        match self.next(command, true)? {
            Reply::Text(response) => Ok(response),
            Reply::Ack => Ok(String::new()),
            Reply::Fail(message) => Err(anyhow!(message)),
        }
    }
}
