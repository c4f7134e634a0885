use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use serde::Deserialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const HEX_DUMP_MAX_BYTES: usize = 512;

/// Verbose protocol traces, all off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DebugSwitches {
    pub log_hashes: bool,
    pub log_object_serialise: bool,
    pub log_ids: bool,
    pub log_sent_channels: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub dir: PathBuf,
    #[serde(flatten)]
    pub switches: DebugSwitches,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: PathBuf::from("logs"),
            switches: DebugSwitches::default(),
        }
    }
}

static SWITCHES: OnceLock<DebugSwitches> = OnceLock::new();
static DISABLED: DebugSwitches = DebugSwitches {
    log_hashes: false,
    log_object_serialise: false,
    log_ids: false,
    log_sent_channels: false,
};

/// Switches installed by `init`; everything off before that.
pub fn options() -> &'static DebugSwitches {
    SWITCHES.get().unwrap_or(&DISABLED)
}

/// Installs stdout and file layers. Later calls (server restarts) keep the
/// first subscriber and return Ok.
pub fn init(config: &LogConfig) -> Result<(), String> {
    if SWITCHES.get().is_some() {
        return Ok(());
    }
    std::fs::create_dir_all(&config.dir)
        .map_err(|err| format!("log directory create failed: {}", err))?;
    let path = config.dir.join(format!("{}.log", file_timestamp(unix_timestamp())));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| format!("open log {} failed: {}", path.display(), err))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|err| format!("invalid log level '{}': {}", config.level, err))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|err| format!("log subscriber install failed: {}", err))?;

    let _ = SWITCHES.set(config.switches);
    tracing::info!("logging to {}", path.display());
    Ok(())
}

/// `len=N data=aa bb ..`, truncated past a fixed size.
pub fn hex_line(body: &[u8]) -> String {
    let len = body.len();
    let max = HEX_DUMP_MAX_BYTES.min(len);
    let mut line = String::with_capacity(32 + max * 3);
    let _ = write!(line, "len={len}");
    if len > HEX_DUMP_MAX_BYTES {
        let _ = write!(line, " trunc={}", len - HEX_DUMP_MAX_BYTES);
    }
    line.push_str(" data=");
    for (idx, byte) in body[..max].iter().enumerate() {
        if idx > 0 {
            line.push(' ');
        }
        let _ = write!(line, "{:02x}", byte);
    }
    line
}

fn file_timestamp(ts: i64) -> String {
    let secs = ts.max(0);
    let days = secs / 86_400;
    let seconds_of_day = secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}_{:02}-{:02}-{:02}",
        seconds_of_day / 3_600,
        (seconds_of_day % 3_600) / 60,
        seconds_of_day % 60
    )
}

fn unix_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = mp + if mp < 10 { 3 } else { -9 };
    let year = (y + if m <= 2 { 1 } else { 0 }) as i32;
    (year, m as u32, d as u32)
}
