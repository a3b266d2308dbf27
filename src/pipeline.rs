/// Typed stage pipeline for one basin.
///
/// Stages run in order and the first failure aborts the rest. External
/// programs run with an explicit working directory and an optional timeout.
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage}: cannot launch `{program}`: {source}")]
    Launch {
        stage: &'static str,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage}: `{command}` exited with {status}")]
    Exit {
        stage: &'static str,
        command: String,
        status: ExitStatus,
    },

    #[error("{stage}: timed out after {secs} s")]
    Timeout { stage: &'static str, secs: u64 },

    #[error("{stage}: {message}")]
    Failed { stage: &'static str, message: String },
}

impl StageError {
    pub fn stage(&self) -> &'static str {
        match self {
            StageError::Launch { stage, .. }
            | StageError::Exit { stage, .. }
            | StageError::Timeout { stage, .. }
            | StageError::Failed { stage, .. } => *stage,
        }
    }
}

// -- External commands --

/// Program, arguments, working directory and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl fmt::Display) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: fmt::Display,
    {
        self.args.extend(args.into_iter().map(|a| a.to_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.env {
            write!(f, "{k}={v} ")?;
        }
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(' ') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Run `spec` to completion, killing it after `timeout`.
pub fn run_command(
    stage: &'static str,
    spec: &CommandSpec,
    timeout: Option<Duration>,
) -> Result<(), StageError> {
    log::info!("{stage}: {spec}");
    let mut child = spec.to_command().spawn().map_err(|source| StageError::Launch {
        stage,
        program: spec.program.display().to_string(),
        source,
    })?;
    let failed = |e: std::io::Error| StageError::Failed {
        stage,
        message: e.to_string(),
    };

    let status = match timeout {
        None => child.wait().map_err(failed)?,
        Some(limit) => {
            let start = Instant::now();
            loop {
                if let Some(status) = child.try_wait().map_err(failed)? {
                    break status;
                }
                if start.elapsed() >= limit {
                    // Fails harmlessly if the child exited after the poll.
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(StageError::Timeout {
                        stage,
                        secs: limit.as_secs(),
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    };

    if status.success() {
        Ok(())
    } else {
        Err(StageError::Exit {
            stage,
            command: spec.to_string(),
            status,
        })
    }
}

// -- Stages --

/// One step of a basin pipeline over context `C`.
pub trait Stage<C> {
    fn name(&self) -> &'static str;
    fn run(&self, ctx: &mut C) -> Result<(), StageError>;
}

/// Stage backed by a closure returning `anyhow::Result`.
pub struct FnStage<F> {
    name: &'static str,
    f: F,
}

impl<F> FnStage<F> {
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<C, F> Stage<C> for FnStage<F>
where
    F: Fn(&mut C) -> anyhow::Result<()>,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&self, ctx: &mut C) -> Result<(), StageError> {
        (self.f)(ctx).map_err(|err| match err.downcast::<StageError>() {
            Ok(stage_err) => stage_err,
            Err(other) => StageError::Failed {
                stage: self.name,
                message: format!("{other:#}"),
            },
        })
    }
}

/// Ordered stages with fail-fast semantics.
pub struct Pipeline<'a, C> {
    label: String,
    stages: Vec<Box<dyn Stage<C> + 'a>>,
}

impl<'a, C> Pipeline<'a, C> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            stages: Vec::new(),
        }
    }

    pub fn stage(mut self, stage: impl Stage<C> + 'a) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn then<F>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(&mut C) -> anyhow::Result<()> + 'a,
    {
        self.stage(FnStage::new(name, f))
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order; returns how many ran.
    pub fn run(&self, ctx: &mut C) -> Result<usize, StageError> {
        for (i, stage) in self.stages.iter().enumerate() {
            log::debug!("{}: [{}/{}] {}", self.label, i + 1, self.stages.len(), stage.name());
            let start = Instant::now();
            if let Err(err) = stage.run(ctx) {
                log::error!("{}: {err}", self.label);
                return Err(err);
            }
            log::debug!(
                "{}: {} done in {:.1} s",
                self.label,
                stage.name(),
                start.elapsed().as_secs_f64()
            );
        }
        Ok(self.stages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    // -- pipeline --

    #[test]
    fn stops_at_first_failure() {
        let pipeline = Pipeline::new("basin")
            .then("one", |log: &mut Vec<String>| {
                log.push("one".into());
                Ok(())
            })
            .then("two", |_: &mut Vec<String>| bail!("no forcing"))
            .then("three", |log: &mut Vec<String>| {
                log.push("three".into());
                Ok(())
            });
        let mut log = Vec::new();
        let err = pipeline.run(&mut log).unwrap_err();
        assert_eq!(log, ["one"]);
        assert_eq!(err.stage(), "two");
        assert_eq!(err.to_string(), "two: no forcing");
    }

    #[test]
    fn stage_errors_pass_through_closures() {
        let pipeline = Pipeline::new("basin").then("outer", |_: &mut ()| {
            Err(StageError::Timeout { stage: "inner", secs: 5 }.into())
        });
        let err = pipeline.run(&mut ()).unwrap_err();
        assert!(matches!(err, StageError::Timeout { stage: "inner", secs: 5 }));
    }

    // -- commands --

    #[test]
    fn command_display_quotes_empty_args() {
        let spec = CommandSpec::new("/ngen/cmake_build/partitionGenerator")
            .args(["a.gpkg", "a.gpkg", "p.json"])
            .arg(4)
            .args(["", ""]);
        assert_eq!(
            spec.to_string(),
            "/ngen/cmake_build/partitionGenerator a.gpkg a.gpkg p.json 4 \"\" \"\""
        );
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_and_timeout() {
        let tmp = tempfile::tempdir().unwrap();
        let ok = CommandSpec::new("sh").args(["-c", "test -d ."]).current_dir(tmp.path());
        assert!(run_command("check", &ok, None).is_ok());

        let fail = CommandSpec::new("sh").args(["-c", "exit 3"]);
        assert!(matches!(
            run_command("simulate", &fail, None),
            Err(StageError::Exit { stage: "simulate", .. })
        ));

        let slow = CommandSpec::new("sleep").arg(5);
        assert!(matches!(
            run_command("simulate", &slow, Some(Duration::from_millis(300))),
            Err(StageError::Timeout { .. })
        ));

        let missing = CommandSpec::new(tmp.path().join("no-such-binary"));
        assert!(matches!(
            run_command("partition", &missing, None),
            Err(StageError::Launch { .. })
        ));
    }
}
