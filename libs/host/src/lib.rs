// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! `HostBridge::start`/`Agent::stop`: wires image introspection, the
//! relocation index, trampoline install, the trace emitter, and the drain
//! thread together into the two entry points the embedding host calls.
//!
//! Grounded on original_source's `main.c` `module_start`/`module_stop`
//! (the GoldHEN plugin lifecycle this generalizes) and spec.md §4.11.

use config::AgentConfig;
use dynamic::DynamicInfo;
use image::elf::{PT_DYNAMIC, PT_SCE_DYNLIBDATA};
use image::{ImageError, ImageReader};
use log::info;
use reloc::{RelocationIndex, WellKnownSymbols};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tls::TlsLayout;

/// The load address original_source's `hook.c` hardcodes for the PS4 main
/// executable; the agent runs inside the same address space as the image
/// it instruments, so JUMP_SLOT offsets are resolved against this base
/// rather than a base discovered via any out-of-scope process-introspection
/// API.
pub const DEFAULT_IMAGE_BASE: u64 = 0x0000_0000_0040_0000;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Parse(#[from] dynamic::ParseError),
    #[error(transparent)]
    Install(#[from] trampoline::InstallError),
    #[error(transparent)]
    Drain(#[from] drain::DrainError),
}

fn required_phdr(reader: &ImageReader, p_type: u32) -> Result<usize, ImageError> {
    reader.phdr_index_of(p_type).ok_or(ImageError::NoSuchProgramHeader)
}

fn read_dynamic_info(path: &Path) -> Result<DynamicInfo, AgentError> {
    let mut reader = ImageReader::open(path)?;
    let dynamic_idx = required_phdr(&reader, PT_DYNAMIC)?;
    let dynlib_idx = required_phdr(&reader, PT_SCE_DYNLIBDATA)?;
    let dynamic_bytes = reader.load_segment(dynamic_idx)?;
    let dynlib_data = reader.load_segment(dynlib_idx)?;
    Ok(dynamic::parse(&dynamic_bytes, &dynlib_data)?)
}

/// A running agent: the drain thread and the trampolines it installed.
/// Dropping this does **not** stop the agent -- call [`Agent::stop`].
pub struct Agent {
    shutdown: Arc<AtomicBool>,
    drain_thread: Option<JoinHandle<()>>,
    trampolines: Arc<trampoline::Trampolines>,
}

impl Agent {
    /// Sets the shutdown flag and joins the drain thread after it completes
    /// at most one more pass, per spec.md §5's cancellation rule. Installed
    /// trampolines are left in place: the target may still be calling
    /// through them after the agent stops observing.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.drain_thread.take() {
            let _ = handle.join();
        }
        info!("agent stopped; trampolines remain installed");
    }
}

pub struct HostBridge;

impl HostBridge {
    /// Reads `path`'s SELF/ELF dynamic section, builds the relocation
    /// index, installs trampolines at [`DEFAULT_IMAGE_BASE`], connects to
    /// `config`'s collector, and spawns the drain thread.
    pub fn start(path: &Path, config: AgentConfig) -> Result<Agent, AgentError> {
        let info = read_dynamic_info(path)?;
        let index = RelocationIndex::build(&info);
        let well_known = WellKnownSymbols::build(&index);
        let layout = TlsLayout::new(config.original_tls_size);

        let trampolines = Arc::new(trampoline::Trampolines::install(
            &index,
            layout,
            DEFAULT_IMAGE_BASE,
            trace::emit_span_start as usize as u64,
            trace::emit_span_end as usize as u64,
        )?);

        let mut post_hooks: trace::PostHooks = HashMap::new();
        if well_known.sysmodule_load_module >= 0 {
            let label_id = well_known.sysmodule_load_module as u64;
            let reregister_target = Arc::clone(&trampolines);
            post_hooks.insert(
                label_id,
                Box::new(move || {
                    if let Err(err) = reregister_target.reregister() {
                        log::warn!("reregister after module load failed: {err}");
                    }
                }),
            );
        }
        trace::install(well_known, layout, ring::DEFAULT_RING_SIZE, post_hooks);

        let tsc_frequency = drain::preamble::measure_tsc_frequency();
        let anchor = drain::preamble::capture_anchor();
        let stream = drain::connect_and_greet(
            config.target_address,
            config.target_port,
            tsc_frequency,
            anchor,
            &info.modules,
            &info.libraries,
            &index.labels,
        )?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let drain_shutdown = Arc::clone(&shutdown);
        let drain_thread = std::thread::spawn(move || {
            drain::run(stream, registry::registry(), drain_shutdown);
        });

        info!("agent started against {}:{}", config.target_address, config.target_port);
        Ok(Agent {
            shutdown,
            drain_thread: Some(drain_thread),
            trampolines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_image_base_matches_the_platform_convention() {
        assert_eq!(DEFAULT_IMAGE_BASE, 0x400000);
    }
}
