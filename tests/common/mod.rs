//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which lays out a temporary storage root with
//! fake `ffmpeg`/`ffprobe` scripts and builds a full [`AppContext`] on top
//! of it. The [`TestHarness::with_server`] constructor starts Axum on a
//! random port for HTTP-level testing.
//!
//! The fake tools understand just enough of the command line to stand in
//! for the real thing:
//!
//! * `ffmpeg` copies the file after `-i` to the last argument. For
//!   `-f concat` it concatenates the files named in the list instead. Any
//!   invocation mentioning `hflip` fails with exit status 1, and one
//!   mentioning `vflip` appends `NOAUDIO` to its output.
//! * `ffprobe` answers `30.0` to duration queries and `aac` to audio
//!   queries, unless the file contains `NOAUDIO`.
//!
//! [`install_recording_tools`] wraps the fake `ffmpeg` so every argument
//! vector it receives can be read back, and [`HANGING_FFMPEG`] never
//! finishes in time.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use vidforge::config::Config;
use vidforge::server::{create_router, AppContext};

pub const FAKE_FFMPEG: &str = r#"#!/bin/sh
case "$*" in *-version*) echo "ffmpeg version 6.1-fake"; exit 0;; esac
case "$*" in *hflip*) echo "Invalid argument" >&2; exit 1;; esac
input=""; out=""; prev=""; concat=0
for arg in "$@"; do
  if [ "$prev" = "-i" ]; then input="$arg"; fi
  if [ "$prev" = "-f" ] && [ "$arg" = "concat" ]; then concat=1; fi
  prev="$arg"; out="$arg"
done
if [ "$concat" = 1 ]; then
  : > "$out"
  sed -n "s/^file '\(.*\)'$/\1/p" "$input" | while read -r part; do cat "$part" >> "$out"; done
else
  cp "$input" "$out" || exit 1
fi
case "$*" in *vflip*) printf 'NOAUDIO' >> "$out";; esac
exit 0
"#;

pub const FAKE_FFPROBE: &str = r#"#!/bin/sh
case "$*" in *-version*) echo "ffprobe version 6.1-fake"; exit 0;; esac
case "$*" in *format=duration*) echo "30.0"; exit 0;; esac
for arg in "$@"; do file="$arg"; done
if grep -q NOAUDIO "$file" 2>/dev/null; then exit 0; fi
echo "aac"
"#;

/// An ffmpeg that answers `-version` and otherwise sleeps far past any
/// timeout a test configures.
pub const HANGING_FFMPEG: &str = r#"#!/bin/sh
case "$*" in *-version*) echo "ffmpeg version 6.1-fake"; exit 0;; esac
exec sleep 30
"#;

/// Marks the end of one invocation in a recording log.
const END_OF_INVOCATION: &str = "--end--";

/// Write an executable script.
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, body).expect("failed to write script");
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .expect("failed to chmod script");
}

/// Install the fake tools into `dir/bin` and return their paths.
pub fn install_fake_tools(dir: &Path) -> (PathBuf, PathBuf) {
    let bin = dir.join("bin");
    std::fs::create_dir_all(&bin).expect("failed to create bin dir");
    let ffmpeg = bin.join("ffmpeg");
    let ffprobe = bin.join("ffprobe");
    write_script(&ffmpeg, FAKE_FFMPEG);
    write_script(&ffprobe, FAKE_FFPROBE);
    (ffmpeg, ffprobe)
}

/// Like [`install_fake_tools`], but `ffmpeg` first appends its arguments,
/// one per line, to the returned log file.
pub fn install_recording_tools(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
    let (real, ffprobe) = install_fake_tools(dir);
    let bin = dir.join("bin");
    let delegate = bin.join("ffmpeg-real");
    std::fs::rename(&real, &delegate).expect("failed to move fake ffmpeg");

    let log = bin.join("ffmpeg.log");
    let ffmpeg = bin.join("ffmpeg");
    write_script(
        &ffmpeg,
        &format!(
            "#!/bin/sh\n\
             for arg in \"$@\"; do printf '%s\\n' \"$arg\" >> '{log}'; done\n\
             echo '{END_OF_INVOCATION}' >> '{log}'\n\
             exec '{delegate}' \"$@\"\n",
            log = log.display(),
            delegate = delegate.display(),
        ),
    );
    (ffmpeg, ffprobe, log)
}

/// Argument vectors recorded by [`install_recording_tools`], oldest first.
pub fn recorded_invocations(log: &Path) -> Vec<Vec<String>> {
    let content = std::fs::read_to_string(log).unwrap_or_default();
    let mut invocations = Vec::new();
    let mut current = Vec::new();
    for line in content.lines() {
        if line == END_OF_INVOCATION {
            invocations.push(std::mem::take(&mut current));
        } else {
            current.push(line.to_string());
        }
    }
    invocations
}

/// Test harness wrapping a fully-constructed [`AppContext`] whose storage
/// lives in a temporary directory.
pub struct TestHarness {
    pub ctx: AppContext,
    pub dir: TempDir,
}

impl TestHarness {
    /// Create a new harness with default configuration and fake tools.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a new harness, letting `customize` adjust the configuration
    /// after storage and tool paths have been pointed at the temp dir.
    pub fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let (ffmpeg, ffprobe) = install_fake_tools(dir.path());

        let mut config = Config::default();
        config.storage.input_dir = dir.path().join("uploads");
        config.storage.output_dir = dir.path().join("outputs");
        config.tools.ffmpeg_path = Some(ffmpeg);
        config.tools.ffprobe_path = Some(ffprobe);
        config.tools.timeout_secs = 30;
        customize(&mut config);

        std::fs::create_dir_all(&config.storage.input_dir).expect("failed to create input dir");
        std::fs::create_dir_all(&config.storage.output_dir).expect("failed to create output dir");

        let ctx = AppContext::new(config);
        Self { ctx, dir }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::with_server_config(|_| {}).await
    }

    /// Start an Axum server with custom config on a random port.
    pub async fn with_server_config(customize: impl FnOnce(&mut Config)) -> (Self, SocketAddr) {
        let harness = Self::with_config(customize);
        let app = create_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    pub fn input_dir(&self) -> &Path {
        &self.ctx.config.storage.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.ctx.config.storage.output_dir
    }

    /// File names currently in `dir`, sorted.
    pub fn list(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}
