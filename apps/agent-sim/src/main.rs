// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! Starts the tracing agent against a target SELF/ELF image and a collector
//! address, then blocks until interrupted. Stands in for the out-of-scope
//! plugin host's `module_start`/`module_stop` lifecycle (spec.md §1): a real
//! embedding host would call `HostBridge::start`/`Agent::stop` from its own
//! plugin entry points instead of from a standalone `main`.

use anyhow::Result;
use config::AgentConfig;
use host::HostBridge;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use structopt::StructOpt;

/// Start the tracing agent against a target SELF/ELF image
#[derive(Debug, StructOpt)]
struct Opt {
    /// SELF/ELF target executable to instrument
    target: PathBuf,

    /// Collector IPv4 address
    #[structopt(long, default_value = "127.0.0.1")]
    collector_address: Ipv4Addr,

    /// Collector TCP port
    #[structopt(long)]
    collector_port: u16,

    /// Size, in bytes, of the target image's static TLS block
    #[structopt(long)]
    original_tls_size: u16,
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let config = AgentConfig::new(opt.collector_address, opt.collector_port, opt.original_tls_size)?;
    let agent = HostBridge::start(&opt.target, config)?;

    log::info!("agent running; press ctrl-c to stop");
    ctrlc_wait();

    agent.stop();
    Ok(())
}

/// Blocks until the process receives an interrupt. No signal crate is
/// pulled in for one flag: a single-shot channel fed by `libc`'s raw
/// `SIGINT` handling is enough for a simulator binary that just needs to
/// stay alive until the user is done watching it trace.
fn ctrlc_wait() {
    use std::sync::atomic::{AtomicBool, Ordering};

    static STOP: AtomicBool = AtomicBool::new(false);

    extern "C" fn on_sigint(_: libc::c_int) {
        STOP.store(true, Ordering::Release);
    }

    unsafe {
        libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
    }

    while !STOP.load(Ordering::Acquire) {
        std::thread::sleep(std::time::Duration::from_millis(200));
    }
}
