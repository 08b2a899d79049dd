//! Runs the external notebook export tool. The tool is treated as an opaque
//! command: given a notebook and an output directory, it must produce
//! `{stem}.md` and, if the notebook has embedded outputs, `{stem}_files/`
//! beside it.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

/// Exports a notebook to markdown in a given directory.
pub trait Exporter {
    fn export(&self, notebook: &Path, output_directory: &Path) -> Result<()>;
}

/// Invokes `jupyter nbconvert` (or any command with the same argument
/// conventions) as a blocking subprocess.
pub struct NbConvert {
    /// The program followed by any leading arguments, e.g.
    /// `["jupyter", "nbconvert"]`.
    pub command: Vec<String>,

    /// How long to wait for the subprocess before killing it.
    pub timeout: Duration,
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);

impl NbConvert {
    fn build_command(&self, notebook: &Path, output_directory: &Path) -> Result<Command> {
        let (program, leading) = self.command.split_first().ok_or(Error::EmptyCommand)?;
        let mut cmd = Command::new(program);
        cmd.args(leading)
            .arg("--to")
            .arg("markdown")
            .arg(format!("--output-dir={}", output_directory.display()))
            .arg(notebook)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        Ok(cmd)
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait().map_err(Error::Wait)? {
                return Ok(status);
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::TimedOut(self.timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Exporter for NbConvert {
    fn export(&self, notebook: &Path, output_directory: &Path) -> Result<()> {
        let mut cmd = self.build_command(notebook, output_directory)?;
        debug!(command = ?cmd, "running export tool");
        let mut child = cmd.spawn().map_err(|err| Error::Spawn {
            program: self.command[0].clone(),
            err,
        })?;

        // Drain stderr concurrently so a chatty tool can't fill the pipe and
        // stall before exiting.
        let drain = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut stderr = String::new();
                let _ = pipe.read_to_string(&mut stderr);
                stderr
            })
        });
        let status = self.wait(&mut child)?;
        let stderr = match drain {
            Some(handle) => handle.join().unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(Error::Failed {
                notebook: notebook.to_owned(),
                status,
                stderr: stderr.trim().to_owned(),
            });
        }
        Ok(())
    }
}

/// The result of an export.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failed export.
#[derive(Debug)]
pub enum Error {
    /// Returned when no export command is configured.
    EmptyCommand,

    /// Returned when the export tool could not be started.
    Spawn { program: String, err: std::io::Error },

    /// Returned when waiting on the export tool failed.
    Wait(std::io::Error),

    /// Returned when the export tool exited unsuccessfully.
    Failed {
        notebook: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    /// Returned when the export tool ran longer than the configured timeout.
    TimedOut(Duration),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::EmptyCommand => write!(f, "no export command configured"),
            Error::Spawn { program, err } => {
                write!(f, "starting export tool `{}`: {}", program, err)
            }
            Error::Wait(err) => write!(f, "waiting on export tool: {}", err),
            Error::Failed {
                notebook,
                status,
                stderr,
            } => {
                write!(f, "exporting `{}` failed ({})", notebook.display(), status)?;
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
            Error::TimedOut(timeout) => {
                write!(f, "export tool timed out after {}s", timeout.as_secs())
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Spawn { program: _, err } => Some(err),
            Error::Wait(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(all(test, unix))]
mod test {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> NbConvert {
        // `sh -c SCRIPT` receives the remaining arguments as $0, $1, ...
        NbConvert {
            command: vec!["sh".to_owned(), "-c".to_owned(), script.to_owned()],
            timeout,
        }
    }

    #[test]
    fn test_export_passes_conventional_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = sh(
            r#"echo "$0 $1 $2 $3" > "${2#--output-dir=}/args""#,
            Duration::from_secs(10),
        );
        exporter.export(Path::new("nb.ipynb"), dir.path()).unwrap();
        let args = std::fs::read_to_string(dir.path().join("args")).unwrap();
        assert_eq!(
            format!("--to markdown --output-dir={} nb.ipynb\n", dir.path().display()),
            args
        );
    }

    #[test]
    fn test_export_failure_captures_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = sh("echo boom >&2; exit 3", Duration::from_secs(10));
        match exporter.export(Path::new("nb.ipynb"), dir.path()) {
            Err(Error::Failed { stderr, status, .. }) => {
                assert_eq!("boom", stderr);
                assert_eq!(Some(3), status.code());
            }
            other => panic!("wanted Error::Failed; found {:?}", other),
        }
    }

    #[test]
    fn test_export_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = sh("sleep 5", Duration::from_millis(100));
        match exporter.export(Path::new("nb.ipynb"), dir.path()) {
            Err(Error::TimedOut(_)) => {}
            other => panic!("wanted Error::TimedOut; found {:?}", other),
        }
    }

    #[test]
    fn test_empty_command() {
        let exporter = NbConvert {
            command: Vec::new(),
            timeout: Duration::from_secs(1),
        };
        assert!(matches!(
            exporter.export(Path::new("nb.ipynb"), Path::new(".")),
            Err(Error::EmptyCommand)
        ));
    }
}
