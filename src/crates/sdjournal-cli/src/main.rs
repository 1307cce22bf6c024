mod output;
mod tracing_setup;

use anyhow::{Context, Result, bail};
use clap::Parser;
use output::OutputFormat;
use sdjournal_core::file::{HeaderCompatibleFlags, Mmap};
use sdjournal_core::{JournalFile, JournalReader, install_sigbus_handler, sort_files};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sdjournal", about = "Print the entries of systemd journal files")]
struct Cli {
    /// Journal files, in any order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Short)]
    output: OutputFormat,

    /// Show at most N entries
    #[arg(short = 'n', long)]
    lines: Option<usize>,

    /// Timestamps in UTC
    #[arg(long)]
    utc: bool,

    /// Show journal file header info
    #[arg(long)]
    header: bool,

    /// Only print the files in chronological order
    #[arg(long)]
    list_files: bool,
}

fn cmd_header(journal_file: &JournalFile<Mmap>, w: &mut impl Write) -> Result<()> {
    let hdr = journal_file.header();

    writeln!(w, "File:             {}", journal_file.path().display())?;
    writeln!(
        w,
        "File ID:          {}",
        uuid::Uuid::from_bytes(hdr.file_id).as_hyphenated()
    )?;
    writeln!(
        w,
        "Machine ID:       {}",
        uuid::Uuid::from_bytes(hdr.machine_id).as_hyphenated()
    )?;
    writeln!(
        w,
        "Boot ID (tail):   {}",
        uuid::Uuid::from_bytes(hdr.tail_entry_boot_id).as_hyphenated()
    )?;
    writeln!(
        w,
        "Seqnum ID:        {}",
        uuid::Uuid::from_bytes(hdr.seqnum_id).as_hyphenated()
    )?;
    match hdr.state() {
        Ok(state) => writeln!(w, "State:            {state}")?,
        Err(raw) => writeln!(w, "State:            UNKNOWN ({raw})")?,
    }

    writeln!(w, "Compatible flags: {:#010x}", hdr.compatible_flags.get())?;
    writeln!(w, "Incompatible flags: {:#010x}", hdr.incompatible_flags.get())?;
    writeln!(w, "Compact:          {}", hdr.is_compact())?;
    writeln!(
        w,
        "Sealed:           {}",
        hdr.has_compatible_flag(HeaderCompatibleFlags::Sealed)
    )?;
    writeln!(
        w,
        "Tail boot ID set: {}",
        hdr.has_compatible_flag(HeaderCompatibleFlags::TailEntryBootId)
    )?;

    writeln!(w, "Header size:      {}", hdr.header_size.get())?;
    writeln!(w, "Arena size:       {}", hdr.arena_size.get())?;
    writeln!(w, "Objects:          {}", hdr.n_objects.get())?;
    writeln!(w, "Entries:          {}", hdr.n_entries.get())?;

    writeln!(w, "Head seqnum:      {}", hdr.head_entry_seqnum.get())?;
    writeln!(w, "Tail seqnum:      {}", hdr.tail_entry_seqnum.get())?;
    writeln!(w, "Head realtime:    {}", hdr.head_entry_realtime.get())?;
    writeln!(w, "Tail realtime:    {}", hdr.tail_entry_realtime.get())?;
    writeln!(w, "Tail monotonic:   {}", hdr.tail_entry_monotonic.get())?;

    Ok(())
}

/// Prints the entries of `path`, stopping once `remaining` reaches zero.
fn cmd_entries(path: &Path, cli: &Cli, remaining: &mut usize, w: &mut impl Write) -> Result<()> {
    let mut reader = JournalReader::<Mmap>::open(path)
        .with_context(|| format!("cannot open journal file: {}", path.display()))?;

    while *remaining > 0 {
        let Some(entry) = reader
            .next_entry()
            .with_context(|| format!("cannot read journal file: {}", path.display()))?
        else {
            break;
        };

        cli.output.write(&entry, cli.utc, w)?;
        *remaining -= 1;
    }

    reader.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_setup::init_tracing("warn");
    install_sigbus_handler().context("failed to install SIGBUS handler")?;

    let sorted = sort_files(&cli.files);
    if sorted.ordered.is_empty() {
        bail!(
            "none of the {} given files could be opened as a journal",
            cli.files.len()
        );
    }

    let stdout = io::stdout();
    let mut w = BufWriter::new(stdout.lock());

    if cli.list_files {
        for path in &sorted.ordered {
            writeln!(w, "{}", path.display())?;
        }
        w.flush()?;
        return Ok(());
    }

    if cli.header {
        for (index, path) in sorted.ordered.iter().enumerate() {
            let journal_file = JournalFile::<Mmap>::open(path)
                .with_context(|| format!("cannot open journal file: {}", path.display()))?;

            if index > 0 {
                writeln!(w)?;
            }
            cmd_header(&journal_file, &mut w)?;
            journal_file.close()?;
        }
        w.flush()?;
        return Ok(());
    }

    let mut remaining = cli.lines.unwrap_or(usize::MAX);
    for path in &sorted.ordered {
        if remaining == 0 {
            break;
        }
        cmd_entries(path, &cli, &mut remaining, &mut w)?;
    }

    w.flush()?;
    Ok(())
}
