use crate::command::{Command, parse_command};
use crate::frame::{HEADER_LEN, split_frames};
use crate::hex::format_hex;
use crate::transport::{Received, Transport};
use anyhow::{Context, Result};
use crossterm::style::{Color, Stylize, style};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use rustyline::history::History;
use std::io::{ErrorKind, Write};
use std::path::Path;

const USAGE: &str = "\
Enter data to send:
 - Hex bytes: e.g., '01 ff a0'
 - CBOR diagnostic: start with 'cbor:' followed by the diagnostic string, e.g., cbor:[[1,0],9(h'0000'), 8(1), null]
 - CBOR diagnostic routed to a transactor: start with 'cbor_r:N:' where N is the address of the transactor, e.g., cbor_r:3:[[1,0],9(h'0000'), 8(1), null]
 - Commands: 'exit' to quit.
";

const INTERRUPTED: &str = "\nInterrupted by user. Exiting...";
const CLOSED: &str = "Connection closed.";

/// What the loop should do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit,
    /// Ctrl-C arrived while waiting for the device.
    Interrupted,
}

/// Colour of an output line when colour is on.
#[derive(Debug, Clone, Copy)]
enum Tone {
    Error,
    Parsed,
    Sent,
    Received,
    Warning,
}

impl Tone {
    fn color(self) -> Color {
        match self {
            Tone::Error => Color::DarkRed,
            Tone::Parsed => Color::DarkBlue,
            Tone::Sent => Color::Blue,
            Tone::Received => Color::DarkGreen,
            Tone::Warning => Color::DarkYellow,
        }
    }
}

/// Where prompt lines come from. The `rustyline` editor in the binary, a script in tests.
pub(crate) trait LineSource {
    fn read_line(&mut self, prompt: &str) -> rustyline::Result<String>;

    /// Adds a line to the session history.
    fn remember(&mut self, line: &str) -> rustyline::Result<()>;
}

impl LineSource for DefaultEditor {
    fn read_line(&mut self, prompt: &str) -> rustyline::Result<String> {
        self.readline(prompt)
    }

    fn remember(&mut self, line: &str) -> rustyline::Result<()> {
        self.add_history_entry(line).map(|_| ())
    }
}

/// Interactive sender: turns prompt lines into frames and pushes them through a [`Transport`].
///
/// Example
/// ```no_run
/// use frame_cli::{Harness, UdpTransport};
/// let transport = UdpTransport::new("127.0.0.1:4242".parse().unwrap(), None).unwrap();
/// let mut harness = Harness::new(transport, Some(false), 1).with_color(true);
/// harness.repl(std::path::Path::new("mgmt_cli_history.txt")).unwrap();
/// ```
pub struct Harness<T> {
    transport: T,
    read_responses: Option<bool>,
    response_size: usize,
    color: bool,
}

impl<T: Transport> Harness<T> {
    /// `read_responses` of `None` makes [`Harness::repl`] ask the operator before the first prompt.
    /// Output is plain until [`Harness::with_color`] turns colour on.
    pub fn new(transport: T, read_responses: Option<bool>, response_size: usize) -> Self {
        Self {
            transport,
            read_responses,
            response_size: response_size.max(1),
            color: false,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn paint(&self, tone: Tone, text: String) -> String {
        if self.color {
            style(text).with(tone.color()).to_string()
        } else {
            text
        }
    }

    /// Handles one prompt line, writing everything the operator should see to `out`.
    ///
    /// Input errors are reported to `out` and nothing is sent. A missing response is
    /// reported as well. Other transport errors are returned.
    pub fn handle_line(&mut self, line: &str, out: &mut dyn Write) -> Result<Control> {
        let command = match parse_command(line) {
            Ok(Command::Exit) => return Ok(Control::Exit),
            Ok(command) => command,
            Err(e) => {
                writeln!(out, "{}", self.paint(Tone::Error, e.to_string()))?;
                return Ok(Control::Continue);
            }
        };

        let encoded = match command.encode() {
            Ok(Some(encoded)) => encoded,
            Ok(None) => return Ok(Control::Continue),
            Err(e) => {
                writeln!(out, "{}", self.paint(Tone::Error, e.to_string()))?;
                return Ok(Control::Continue);
            }
        };

        let parsed = match &command {
            Command::Cbor(_) => Some(format!(
                "CBOR diagnostic parsed, sending {} bytes...",
                encoded.cbor.len()
            )),
            Command::RoutedCbor { route, .. } => Some(format!(
                "CBOR diagnostic parsed, sending {} bytes to route {route}...",
                encoded.cbor.len()
            )),
            _ => None,
        };
        if let Some(parsed) = parsed {
            writeln!(out, "{}", self.paint(Tone::Parsed, parsed))?;
            writeln!(out, "CBOR payload: {}", format_hex(&encoded.cbor))?;
        }

        let sent = self.transport.send(&encoded.frame)?;
        let sent_to = format!("Sent {sent} bytes to UDP {}", self.transport.peer());
        writeln!(out, "{}", self.paint(Tone::Sent, sent_to))?;
        let sent_hex = format!(
            "Sent ({} bytes): {}",
            encoded.frame.len(),
            format_hex(&encoded.frame)
        );
        writeln!(out, "{}", self.paint(Tone::Sent, sent_hex))?;

        if self.read_responses == Some(true) {
            let mut buf = vec![0u8; self.response_size];
            match self.transport.recv(&mut buf)? {
                Received::Data(n) => self.print_response(&buf[..n], out)?,
                Received::TimedOut(limit) => {
                    let text = format!("No response within {} ms", limit.as_millis());
                    writeln!(out, "{}", self.paint(Tone::Warning, text))?;
                }
                Received::Interrupted => return Ok(Control::Interrupted),
            }
        }

        writeln!(out)?;
        Ok(Control::Continue)
    }

    /// Runs the prompt loop until `exit`, Ctrl-C or end of input.
    ///
    /// History is loaded from `history` before the first prompt and written back on the way out.
    pub fn repl(&mut self, history: &Path) -> Result<()> {
        let mut rl = DefaultEditor::new()?;
        load_history(rl.history_mut(), history)?;

        let mut stdout = std::io::stdout();
        let result = self.run_prompt(&mut rl, &mut stdout);

        if let Err(e) = rl.history_mut().save(history) {
            println!("Failed to save history to {}: {e}", history.display());
        }
        result
    }

    pub(crate) fn run_prompt<L: LineSource>(
        &mut self,
        lines: &mut L,
        out: &mut dyn Write,
    ) -> Result<()> {
        if self.read_responses.is_none() {
            match ask_response_mode(lines, out)? {
                Some(mode) => self.read_responses = Some(mode),
                None => return Ok(()),
            }
        }

        writeln!(out, "\n{USAGE}")?;
        loop {
            match lines.read_line(">>> ") {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        lines.remember(&line)?;
                    }
                    match self.handle_line(&line, out)? {
                        Control::Continue => out.flush()?,
                        Control::Exit => {
                            writeln!(out, "{CLOSED}")?;
                            break;
                        }
                        Control::Interrupted => {
                            writeln!(out, "{INTERRUPTED}")?;
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    writeln!(out, "{INTERRUPTED}")?;
                    break;
                }
                Err(ReadlineError::Eof) => {
                    writeln!(out, "{CLOSED}")?;
                    break;
                }
                Err(err) => return Err(err).context("failed to read prompt"),
            }
        }
        Ok(())
    }

    fn print_response(&self, data: &[u8], out: &mut dyn Write) -> Result<()> {
        let received = format!("Received ({} bytes): {}", data.len(), format_hex(data));
        writeln!(out, "{}", self.paint(Tone::Received, received))?;
        if data.len() < HEADER_LEN {
            return Ok(());
        }
        match split_frames(data) {
            Ok(frames) => {
                for frame in frames {
                    let text = format!(
                        "Received frame of length {}: {}",
                        frame.len(),
                        format_hex(frame)
                    );
                    writeln!(out, "{}", self.paint(Tone::Received, text))?;
                }
            }
            Err(e) => writeln!(out, "{}", self.paint(Tone::Error, e.to_string()))?,
        }
        Ok(())
    }
}

/// Asks until the operator answers `y` or `n`. `None` means the prompt was interrupted.
fn ask_response_mode<L: LineSource>(lines: &mut L, out: &mut dyn Write) -> Result<Option<bool>> {
    loop {
        match lines.read_line("Read responses from device? (y/n): ") {
            Ok(answer) => match parse_yes_no(&answer) {
                Some(mode) => return Ok(Some(mode)),
                None => writeln!(out, "Please enter 'y' or 'n'.")?,
            },
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                writeln!(out, "{INTERRUPTED}")?;
                return Ok(None);
            }
            Err(err) => return Err(err).context("failed to read prompt"),
        }
    }
}

fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" => Some(true),
        "n" => Some(false),
        _ => None,
    }
}

/// Loads prompt history, treating a missing file as empty history.
fn load_history<H: History>(history: &mut H, path: &Path) -> Result<()> {
    match history.load(path) {
        Ok(()) => Ok(()),
        Err(ReadlineError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to load history from {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::UdpTransport;
    use rustyline::history::FileHistory;
    use std::collections::VecDeque;
    use std::net::UdpSocket;
    use std::time::Duration;

    enum Reply {
        Bytes(Vec<u8>),
        Silence(Duration),
        Interrupt,
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Vec<Vec<u8>>,
        responses: VecDeque<Reply>,
    }

    impl Transport for RecordingTransport {
        fn send(&mut self, data: &[u8]) -> Result<usize> {
            self.sent.push(data.to_vec());
            Ok(data.len())
        }

        fn recv(&mut self, buf: &mut [u8]) -> Result<Received> {
            match self.responses.pop_front() {
                Some(Reply::Bytes(resp)) => {
                    let n = resp.len().min(buf.len());
                    buf[..n].copy_from_slice(&resp[..n]);
                    Ok(Received::Data(n))
                }
                Some(Reply::Silence(limit)) => Ok(Received::TimedOut(limit)),
                Some(Reply::Interrupt) => Ok(Received::Interrupted),
                None => Err(anyhow::anyhow!("no response queued")),
            }
        }

        fn peer(&self) -> String {
            "127.0.0.1:4242".to_string()
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn send(&mut self, _data: &[u8]) -> Result<usize> {
            Err(anyhow::anyhow!("network is unreachable"))
        }

        fn recv(&mut self, _buf: &mut [u8]) -> Result<Received> {
            unreachable!()
        }

        fn peer(&self) -> String {
            "127.0.0.1:4242".to_string()
        }
    }

    /// Prompt input fed from a fixed list; runs dry as end of input.
    #[derive(Default)]
    struct ScriptedLines {
        lines: VecDeque<rustyline::Result<String>>,
        remembered: Vec<String>,
    }

    impl ScriptedLines {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|l| Ok(l.to_string())).collect(),
                remembered: Vec::new(),
            }
        }
    }

    impl LineSource for ScriptedLines {
        fn read_line(&mut self, _prompt: &str) -> rustyline::Result<String> {
            self.lines.pop_front().unwrap_or(Err(ReadlineError::Eof))
        }

        fn remember(&mut self, line: &str) -> rustyline::Result<()> {
            self.remembered.push(line.to_string());
            Ok(())
        }
    }

    fn run(harness: &mut Harness<RecordingTransport>, line: &str) -> (Control, String) {
        let mut out = Vec::new();
        let control = harness.handle_line(line, &mut out).unwrap();
        (control, String::from_utf8(out).unwrap())
    }

    fn run_script(harness: &mut Harness<RecordingTransport>, lines: &mut ScriptedLines) -> String {
        let mut out = Vec::new();
        harness.run_prompt(lines, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn silent() -> Harness<RecordingTransport> {
        Harness::new(RecordingTransport::default(), Some(false), 1)
    }

    fn answering(replies: Vec<Reply>, response_size: usize) -> Harness<RecordingTransport> {
        let transport = RecordingTransport {
            sent: Vec::new(),
            responses: replies.into(),
        };
        Harness::new(transport, Some(true), response_size)
    }

    #[test]
    fn test_hex_line_is_framed_and_sent() {
        let mut harness = silent();
        let (control, out) = run(&mut harness, "01 ff a0");

        assert_eq!(control, Control::Continue);
        assert_eq!(
            harness.transport().sent,
            vec![vec![0x03, 0x00, 0x01, 0xff, 0xa0]]
        );
        assert!(out.contains("Sent 5 bytes to UDP 127.0.0.1:4242"));
        assert!(out.contains("Sent (5 bytes): 03 00 01 ff a0"));
        assert!(!out.contains("Received"));
        assert!(!out.contains('\x1b'));
    }

    #[test]
    fn test_invalid_hex_sends_nothing() {
        let mut harness = silent();
        let (control, out) = run(&mut harness, "zz");

        assert_eq!(control, Control::Continue);
        assert!(harness.transport().sent.is_empty());
        assert!(out.starts_with("Invalid hex input"));
    }

    #[test]
    fn test_cbor_null() {
        let mut harness = silent();
        let (_, out) = run(&mut harness, "cbor:null");

        assert_eq!(harness.transport().sent, vec![vec![0x01, 0x00, 0xf6]]);
        assert!(out.contains("CBOR diagnostic parsed, sending 1 bytes..."));
        assert!(out.contains("CBOR payload: f6"));
    }

    #[test]
    fn test_routed_cbor_null() {
        let mut harness = silent();
        let (_, out) = run(&mut harness, "cbor_r:3:null");

        let sent = &harness.transport().sent;
        assert_eq!(sent.len(), 1);
        assert_eq!(&sent[0][..2], &[0x05, 0x00]);
        assert_eq!(&sent[0][2..], &[0xfd, 0x03, 0x00, 0x00, 0xf6]);
        assert!(out.contains("sending 1 bytes to route 3..."));
    }

    #[test]
    fn test_malformed_cbor_sends_nothing() {
        let mut harness = silent();
        let (_, out) = run(&mut harness, "cbor_r:3:[1,");

        assert!(harness.transport().sent.is_empty());
        assert!(out.starts_with("Error parsing CBOR diagnostic input"));
    }

    #[test]
    fn test_exit_sends_nothing() {
        let mut harness = silent();
        let (control, out) = run(&mut harness, "exit");

        assert_eq!(control, Control::Exit);
        assert!(harness.transport().sent.is_empty());
        assert!(out.is_empty());
    }

    #[test]
    fn test_blank_line_sends_empty_frame() {
        let mut harness = silent();
        let (control, out) = run(&mut harness, "   ");

        assert_eq!(control, Control::Continue);
        assert_eq!(harness.transport().sent, vec![vec![0x00, 0x00]]);
        assert!(out.contains("Sent (2 bytes): 00 00"));
    }

    #[test]
    fn test_blank_line_reaches_device() {
        let device = UdpSocket::bind("127.0.0.1:0").unwrap();
        device
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let transport = UdpTransport::new(device.local_addr().unwrap(), None).unwrap();
        let mut harness = Harness::new(transport, Some(false), 1);

        let mut out = Vec::new();
        harness.handle_line("", &mut out).unwrap();

        let mut buf = [0u8; 8];
        let (n, _) = device.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x00, 0x00]);
    }

    #[test]
    fn test_single_byte_response() {
        let mut harness = answering(vec![Reply::Bytes(vec![0x06, 0x00, 0x00])], 1);

        let (_, out) = run(&mut harness, "cbor:null");
        assert!(out.contains("Received (1 bytes): 06"));
        assert!(!out.contains("Received frame"));
    }

    #[test]
    fn test_framed_response() {
        let reply = vec![0x01, 0x00, 0xf6, 0x02, 0x00, 0xaa, 0xbb];
        let mut harness = answering(vec![Reply::Bytes(reply)], 64);

        let (_, out) = run(&mut harness, "00");
        assert!(out.contains("Received (7 bytes): 01 00 f6 02 00 aa bb"));
        assert!(out.contains("Received frame of length 1: f6"));
        assert!(out.contains("Received frame of length 2: aa bb"));
    }

    #[test]
    fn test_truncated_response_is_reported() {
        let mut harness = answering(vec![Reply::Bytes(vec![0x04, 0x00, 0x01])], 64);

        let (_, out) = run(&mut harness, "00");
        assert!(out.contains("incomplete frame of length 1 (should be 4)"));
    }

    #[test]
    fn test_missing_response_keeps_session() {
        let mut harness = answering(vec![Reply::Silence(Duration::from_millis(100))], 1);

        let (control, out) = run(&mut harness, "01");
        assert_eq!(control, Control::Continue);
        assert!(out.contains("No response within 100 ms"));
    }

    #[test]
    fn test_silent_device_on_loopback_keeps_session() {
        let device = UdpSocket::bind("127.0.0.1:0").unwrap();
        let transport =
            UdpTransport::new(device.local_addr().unwrap(), Some(Duration::from_millis(100)))
                .unwrap();
        let mut harness = Harness::new(transport, Some(true), 1);

        let mut out = Vec::new();
        let control = harness.handle_line("01", &mut out).unwrap();
        assert_eq!(control, Control::Continue);
        assert!(String::from_utf8(out).unwrap().contains("No response within 100 ms"));
    }

    #[test]
    fn test_interrupt_while_waiting_for_response() {
        let mut harness = answering(vec![Reply::Interrupt], 1);

        let (control, _) = run(&mut harness, "01");
        assert_eq!(control, Control::Interrupted);
    }

    #[test]
    fn test_transport_error_propagates() {
        let mut harness = Harness::new(FailingTransport, Some(false), 1);
        let mut out = Vec::new();
        assert!(harness.handle_line("01", &mut out).is_err());
    }

    #[test]
    fn test_color_wraps_lines_and_keeps_text() {
        let mut harness = silent().with_color(true);
        let (_, out) = run(&mut harness, "cbor:null");

        assert!(out.contains("Sent (3 bytes): 01 00 f6"));
        if std::env::var_os("NO_COLOR").is_none() {
            assert!(out.contains('\x1b'));
        }
    }

    #[test]
    fn test_loop_stops_at_exit() {
        let mut harness = silent();
        let mut lines = ScriptedLines::new(&["cbor:null", "", "exit", "01"]);

        let out = run_script(&mut harness, &mut lines);

        assert_eq!(
            harness.transport().sent,
            vec![vec![0x01, 0x00, 0xf6], vec![0x00, 0x00]]
        );
        assert!(out.contains("Enter data to send:"));
        assert!(out.trim_end().ends_with("Connection closed."));
        assert_eq!(lines.remembered, vec!["cbor:null", "exit"]);
        assert_eq!(lines.lines.len(), 1);
    }

    #[test]
    fn test_loop_stops_on_ctrl_c_at_prompt() {
        let mut harness = silent();
        let mut lines = ScriptedLines::new(&["01"]);
        lines.lines.push_back(Err(ReadlineError::Interrupted));
        lines.lines.push_back(Ok("02".to_string()));

        let out = run_script(&mut harness, &mut lines);

        assert_eq!(harness.transport().sent.len(), 1);
        assert!(out.contains("Interrupted by user. Exiting..."));
    }

    #[test]
    fn test_loop_stops_on_ctrl_c_during_response_wait() {
        let mut harness = answering(vec![Reply::Interrupt], 1);
        let mut lines = ScriptedLines::new(&["01", "02"]);

        let out = run_script(&mut harness, &mut lines);

        assert_eq!(harness.transport().sent.len(), 1);
        assert!(out.contains("Interrupted by user. Exiting..."));
        assert!(!out.contains("Connection closed."));
    }

    #[test]
    fn test_loop_ends_at_end_of_input() {
        let mut harness = silent();
        let mut lines = ScriptedLines::new(&["01"]);

        let out = run_script(&mut harness, &mut lines);
        assert!(out.contains("Connection closed."));
    }

    #[test]
    fn test_loop_asks_for_response_mode() {
        let mut harness = Harness::new(RecordingTransport::default(), None, 1);
        let mut lines = ScriptedLines::new(&["maybe", "n", "01", "exit"]);

        let out = run_script(&mut harness, &mut lines);

        assert!(out.contains("Please enter 'y' or 'n'."));
        assert_eq!(harness.read_responses, Some(false));
        assert_eq!(harness.transport().sent.len(), 1);
    }

    #[test]
    fn test_parse_yes_no() {
        assert_eq!(parse_yes_no("y"), Some(true));
        assert_eq!(parse_yes_no(" N "), Some(false));
        assert_eq!(parse_yes_no("yes"), None);
        assert_eq!(parse_yes_no(""), None);
    }

    #[test]
    fn test_missing_history_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = FileHistory::new();
        load_history(&mut history, &dir.path().join("absent.txt")).unwrap();
        assert_eq!(history.len(), 0);
    }

    #[test]
    fn test_history_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.txt");

        let mut first = FileHistory::new();
        first.add("cbor:null").unwrap();
        first.add("01 ff a0").unwrap();
        first.save(&path).unwrap();

        let mut second = FileHistory::new();
        load_history(&mut second, &path).unwrap();
        assert_eq!(second.len(), 2);
    }
}
