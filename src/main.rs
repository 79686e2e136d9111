use anyhow::Context;
use frame_cli::config::Options;
use frame_cli::{Harness, UdpTransport};
use std::io::IsTerminal;
use std::sync::atomic::Ordering;

fn main() -> anyhow::Result<()> {
    let opts: Options = argh::from_env();
    opts.validate()?;

    let transport = UdpTransport::new(opts.peer(), opts.recv_timeout())?;

    // The prompt reads Ctrl-C itself; the handler only matters while waiting for a response.
    let interrupted = transport.interrupt_flag();
    ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
        .context("failed to install Ctrl-C handler")?;

    let color = !opts.no_color && std::io::stdout().is_terminal();
    let mut harness =
        Harness::new(transport, opts.response_mode()?, opts.response_size).with_color(color);
    harness.repl(&opts.history)
}
