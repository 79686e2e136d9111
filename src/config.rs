use argh::FromArgs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// History file used when `--history` is not given.
pub const DEFAULT_HISTORY: &str = "mgmt_cli_history.txt";

/// Gateway port used when `--port` is not given.
pub const DEFAULT_PORT: u16 = 4242;

/// Largest `--response-size`; no datagram carries more.
pub const MAX_RESPONSE_SIZE: usize = u16::MAX as usize;

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_history() -> PathBuf {
    PathBuf::from(DEFAULT_HISTORY)
}

#[derive(FromArgs, Debug, PartialEq)]
/// Send hex bytes or CBOR diagnostic notation as length-prefixed frames to a device gateway over UDP.
pub struct Options {
    #[argh(option, default = "default_host()")]
    /// gateway address. Defaults to 127.0.0.1.
    pub host: IpAddr,

    #[argh(option, default = "DEFAULT_PORT")]
    /// gateway UDP port. Defaults to 4242.
    pub port: u16,

    #[argh(option, default = "default_history()")]
    /// file holding the prompt history, read at startup and written at exit.
    pub history: PathBuf,

    #[argh(switch)]
    /// read a response after every send without asking.
    pub read_responses: bool,

    #[argh(switch)]
    /// never read responses and do not ask.
    pub no_responses: bool,

    #[argh(option, default = "1")]
    /// number of bytes to read back per response. Defaults to 1.
    pub response_size: usize,

    #[argh(option)]
    /// give up waiting for a response after this many milliseconds.
    pub recv_timeout_ms: Option<u64>,

    #[argh(switch)]
    /// print plain text even when stdout is a terminal.
    pub no_color: bool,
}

impl Options {
    pub fn peer(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn recv_timeout(&self) -> Option<Duration> {
        self.recv_timeout_ms.map(Duration::from_millis)
    }

    /// Response mode fixed on the command line, or `None` when the operator should be asked.
    pub fn response_mode(&self) -> anyhow::Result<Option<bool>> {
        match (self.read_responses, self.no_responses) {
            (true, true) => Err(anyhow::anyhow!(
                "--read-responses and --no-responses are mutually exclusive"
            )),
            (true, false) => Ok(Some(true)),
            (false, true) => Ok(Some(false)),
            (false, false) => Ok(None),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.response_size == 0 || self.response_size > MAX_RESPONSE_SIZE {
            return Err(anyhow::anyhow!(
                "--response-size must be between 1 and {MAX_RESPONSE_SIZE}"
            ));
        }
        if self.recv_timeout_ms == Some(0) {
            return Err(anyhow::anyhow!("--recv-timeout-ms must be at least 1"));
        }
        self.response_mode().map(|_| ())
    }
}
