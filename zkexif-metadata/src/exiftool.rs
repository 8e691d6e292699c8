//! Long-lived ExifTool process driven through `-stay_open True -@ -`.
//!
//! Each command is written as one argument per line followed by
//! `-execute{N}`; ExifTool answers with the command output terminated by
//! `{readyN}`. The process is shut down when the session is dropped.

use std::{
    collections::BTreeMap,
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

use serde_json::Value;
use tracing::{debug, warn};
use zkexif_common::{Error, Result};

use crate::tool::{MetadataTool, ReadOptions, TagMap, WriteOptions};

pub struct ExifTool {
    binary: PathBuf,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
    closed: bool,
}

impl ExifTool {
    pub fn spawn(binary: impl AsRef<Path>) -> Result<Self> {
        let binary = binary.as_ref().to_path_buf();
        let mut child = Command::new(&binary)
            .args(["-stay_open", "True", "-@", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| {
                Error::MetadataTool(format!("failed to start {}: {err}", binary.display()))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::MetadataTool("exiftool stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| Error::MetadataTool("exiftool stdout unavailable".into()))?;

        debug!(binary = %binary.display(), "exiftool session started");
        Ok(Self {
            binary,
            child,
            stdin,
            stdout,
            next_id: 1,
            closed: false,
        })
    }

    /// Run one command and return everything it printed before `{readyN}`.
    pub fn execute(&mut self, args: &[String]) -> Result<String> {
        if self.closed {
            return Err(Error::MetadataTool("exiftool session already closed".into()));
        }
        if let Some(bad) = args.iter().find(|arg| arg.contains('\n') || arg.contains('\r')) {
            return Err(Error::MetadataTool(format!(
                "argument contains a line break: {bad:?}"
            )));
        }

        let id = self.next_id;
        self.next_id += 1;
        let mut command = String::new();
        for arg in args {
            command.push_str(arg);
            command.push('\n');
        }
        command.push_str(&format!("-execute{id}\n"));
        self.stdin.write_all(command.as_bytes())?;
        self.stdin.flush()?;

        let marker = format!("{{ready{id}}}");
        let mut output = String::new();
        loop {
            let mut line = String::new();
            if self.stdout.read_line(&mut line)? == 0 {
                return Err(Error::MetadataTool(format!(
                    "{} exited before finishing command {id}",
                    self.binary.display()
                )));
            }
            if line.trim_end() == marker {
                break;
            }
            output.push_str(&line);
        }
        Ok(output)
    }

    /// Ask ExifTool to exit and wait for it.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stdin.write_all(b"-stay_open\nFalse\n")?;
        self.stdin.flush()?;
        let status = self.child.wait()?;
        if !status.success() {
            return Err(Error::MetadataTool(format!("exiftool exited with {status}")));
        }
        debug!("exiftool session closed");
        Ok(())
    }
}

impl Drop for ExifTool {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close exiftool session");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

impl MetadataTool for ExifTool {
    fn read(&mut self, path: &Path, options: &ReadOptions) -> Result<TagMap> {
        ensure_exists(path)?;
        let mut args = options.to_args();
        args.push(path_arg(path));
        let output = self.execute(&args)?;
        parse_json_output(&output)
    }

    fn write(
        &mut self,
        path: &Path,
        tags: &BTreeMap<String, Option<String>>,
        options: &WriteOptions,
    ) -> Result<()> {
        ensure_exists(path)?;
        let mut args = write_args(tags);
        if options.overwrite_original {
            args.push("-overwrite_original".into());
        }
        args.push(path_arg(path));

        let output = self.execute(&args)?;
        if output.contains("1 image files updated") || output.contains("1 image files unchanged")
        {
            Ok(())
        } else {
            Err(Error::MetadataTool(format!(
                "failed to write {}: {}",
                path.display(),
                output.trim()
            )))
        }
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )
        .into())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub(crate) fn write_args(tags: &BTreeMap<String, Option<String>>) -> Vec<String> {
    tags.iter()
        .map(|(name, value)| match value {
            Some(value) => format!("-{name}={value}"),
            None => format!("-{name}="),
        })
        .collect()
}

/// `-json` prints an array with one object per file.
pub(crate) fn parse_json_output(output: &str) -> Result<TagMap> {
    let parsed: Value = serde_json::from_str(output)
        .map_err(|err| Error::MetadataTool(format!("unreadable exiftool output: {err}")))?;
    match parsed {
        Value::Array(mut files) if !files.is_empty() => match files.swap_remove(0) {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(Error::MetadataTool(format!(
                "expected a tag object, got {other}"
            ))),
        },
        _ => Err(Error::MetadataTool("exiftool returned no file entry".into())),
    }
}
