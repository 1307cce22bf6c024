use chrono::{DateTime, Local, TimeZone};
use clap::ValueEnum;
use sdjournal_core::Entry;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Short,
    Verbose,
    Json,
    Cat,
}

impl OutputFormat {
    pub fn write(self, entry: &Entry, utc: bool, w: &mut impl Write) -> io::Result<()> {
        match self {
            OutputFormat::Short => format_short(entry, utc, w),
            OutputFormat::Verbose => format_verbose(entry, utc, w),
            OutputFormat::Json => format_json(entry, w),
            OutputFormat::Cat => format_cat(entry, w),
        }
    }
}

fn field_str<'a>(entry: &'a Entry, key: &str) -> &'a str {
    entry.fields.get(key).map(String::as_str).unwrap_or("")
}

fn format_timestamp(usec: u64, utc: bool, fmt: &str) -> String {
    let secs = (usec / 1_000_000) as i64;
    let micros = (usec % 1_000_000) as u32;

    if utc {
        if let Some(dt) = DateTime::from_timestamp(secs, micros * 1000) {
            return format!("{} UTC", dt.format(fmt));
        }
    } else if let Some(dt) = Local.timestamp_opt(secs, micros * 1000).single() {
        return dt.format(fmt).to_string();
    }

    format!("{usec}")
}

/// short format: `Mon YYYY-MM-DD HH:MM:SS hostname process[pid]: message`
pub fn format_short(entry: &Entry, utc: bool, w: &mut impl Write) -> io::Result<()> {
    let ts = format_timestamp(entry.realtime_usec, utc, "%a %Y-%m-%d %H:%M:%S");

    let hostname = field_str(entry, "_HOSTNAME");

    let ident = match field_str(entry, "SYSLOG_IDENTIFIER") {
        "" => field_str(entry, "_COMM"),
        s => s,
    };

    let pid = field_str(entry, "_PID");
    let message = field_str(entry, "MESSAGE");

    if pid.is_empty() {
        writeln!(w, "{ts} {hostname} {ident}: {message}")
    } else {
        writeln!(w, "{ts} {hostname} {ident}[{pid}]: {message}")
    }
}

/// verbose format: all fields listed, one per line.
pub fn format_verbose(entry: &Entry, utc: bool, w: &mut impl Write) -> io::Result<()> {
    let ts = format_timestamp(entry.realtime_usec, utc, "%a %Y-%m-%d %H:%M:%S.%6f");
    writeln!(
        w,
        "{ts} [i={:x};t={:x};m={:x}]",
        entry.seqnum, entry.realtime_usec, entry.monotonic_usec
    )?;

    writeln!(
        w,
        "    _BOOT_ID={}",
        uuid::Uuid::from_bytes(entry.boot_id).as_hyphenated()
    )?;

    for (key, value) in &entry.fields {
        writeln!(w, "    {key}={value}")?;
    }

    Ok(())
}

/// json format: single-line JSON object per entry.
pub fn format_json(entry: &Entry, w: &mut impl Write) -> io::Result<()> {
    let mut map = serde_json::Map::new();

    map.insert(
        "__SEQNUM".to_string(),
        serde_json::Value::String(entry.seqnum.to_string()),
    );
    map.insert(
        "__REALTIME_TIMESTAMP".to_string(),
        serde_json::Value::String(entry.realtime_usec.to_string()),
    );
    map.insert(
        "__MONOTONIC_TIMESTAMP".to_string(),
        serde_json::Value::String(entry.monotonic_usec.to_string()),
    );
    map.insert(
        "_BOOT_ID".to_string(),
        serde_json::Value::String(
            uuid::Uuid::from_bytes(entry.boot_id)
                .as_hyphenated()
                .to_string(),
        ),
    );

    for (key, value) in &entry.fields {
        map.insert(key.clone(), serde_json::Value::String(value.clone()));
    }

    serde_json::to_writer(&mut *w, &serde_json::Value::Object(map)).map_err(io::Error::other)?;
    writeln!(w)
}

/// cat format: just the MESSAGE value, one per line.
pub fn format_cat(entry: &Entry, w: &mut impl Write) -> io::Result<()> {
    writeln!(w, "{}", field_str(entry, "MESSAGE"))
}
