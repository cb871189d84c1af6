// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.
use anyhow::Result;
use image::elf::{PT_DYNAMIC, PT_SCE_DYNLIBDATA};
use image::ImageReader;
use reloc::{RelocationIndex, WellKnownSymbols};
use std::path::PathBuf;
use structopt::StructOpt;

/// Dump a SELF/ELF target's dynamic section and accepted relocations
#[derive(Debug, StructOpt)]
struct Opt {
    /// SELF/ELF files to dump
    inputs: Vec<PathBuf>,

    /// Also print each label's well-known symbol classification
    #[structopt(short, long)]
    well_known: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    for input in &opt.inputs {
        println!("{}", input.display());
        println!("{}", "=".repeat(input.display().to_string().len()));
        show_image(input, opt.well_known)?;
        println!();
    }
    Ok(())
}

fn show_image(path: &PathBuf, show_well_known: bool) -> Result<()> {
    let mut reader = ImageReader::open(path)?;
    let dynamic_idx = reader
        .phdr_index_of(PT_DYNAMIC)
        .ok_or_else(|| anyhow::anyhow!("no PT_DYNAMIC program header"))?;
    let dynlib_idx = reader
        .phdr_index_of(PT_SCE_DYNLIBDATA)
        .ok_or_else(|| anyhow::anyhow!("no PT_SCE_DYNLIBDATA program header"))?;
    let dynamic_bytes = reader.load_segment(dynamic_idx)?;
    let dynlib_data = reader.load_segment(dynlib_idx)?;
    let info = dynamic::parse(&dynamic_bytes, &dynlib_data)?;

    println!("modules -");
    for m in &info.modules {
        println!("\t{:>3} {:20} v{}.{}", m.id, m.name, m.major, m.minor);
    }

    println!("libraries -");
    for l in &info.libraries {
        println!("\t{:>3} {:20} v{}", l.id, l.name, l.version);
    }

    let index = RelocationIndex::build(&info);
    println!("labels - ({} accepted JUMP_SLOT relocations)", index.labels.len());
    for label in &index.labels {
        println!(
            "\t{:>4} offset=0x{:08X} lib={} mod={} hash={}",
            label.label_id,
            label.target_image_offset,
            label.library_id,
            label.module_id,
            hex(&label.hash),
        );
    }

    if show_well_known {
        let well_known = WellKnownSymbols::build(&index);
        println!("well-known -");
        print_well_known("gnmSubmitAndFlipForWorkload", well_known.gnm_submit_and_flip_for_workload);
        print_well_known("gnmSubmitAndFlip", well_known.gnm_submit_and_flip);
        print_well_known("gnmSubmit", well_known.gnm_submit);
        print_well_known("sceSysmoduleLoadModule", well_known.sysmodule_load_module);
        print_well_known("sceAjmBatchJobRunBufferRa", well_known.ajm_batch_job_run_buffer_ra);
        print_well_known("sceAjmBatchJobControlBufferRa", well_known.ajm_batch_job_control_buffer_ra);
        print_well_known("sceHttpSendRequest", well_known.http_send_request);
    }

    Ok(())
}

fn print_well_known(name: &str, label_id: i64) {
    if label_id >= 0 {
        println!("\t{:30} -> label {}", name, label_id);
    } else {
        println!("\t{:30} -> absent", name);
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
