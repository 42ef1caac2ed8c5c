/// Execution Engine - Abstraction for Running Candidate Code
///
/// **Core Responsibility:**
/// Execute source code inside an evaluation scope and capture raw outputs.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to execute (interpreter session, scripted fake, ...)
/// - Engine does NOT know about tasks, tests or verdicts
/// - Engine returns captured output or a typed failure for the Test Runner to judge
///
/// **Scopes:**
/// Every `open_scope()` call yields a fresh namespace. Sources executed in the
/// same scope see each other's definitions; sources in different scopes never do.
/// Production uses `PythonEngine`, where a scope is one interpreter session
/// process owned by the scope and killed when the scope is dropped.
///
/// **Not a security boundary:** executed code runs with the harness's privileges.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use mbpp_common::config::RuntimeSettings;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

/// Session driver executed by the interpreter, see `runner/session.py`
const SESSION_DRIVER: &str = include_str!("../runner/session.py");

/// Exception raised by executed code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaisedException {
    pub error_type: String,
    pub message: String,
    pub traceback: String,
}

impl RaisedException {
    /// `Type: message`, or just `Type` when the exception carries no message
    pub fn summary(&self) -> String {
        if self.message.is_empty() {
            self.error_type.clone()
        } else {
            format!("{}: {}", self.error_type, self.message)
        }
    }
}

/// Failure of a single executed step
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecError {
    #[error("{}", .0.summary())]
    Raised(RaisedException),
    #[error("TimeoutError: execution exceeded {0} ms")]
    TimedOut(u64),
    #[error("source exceeds maximum size of {limit} bytes")]
    SourceTooLarge { limit: usize },
    #[error("interpreter failure: {0}")]
    Interpreter(String),
}

impl ExecError {
    /// Terse form kept in verdicts
    pub fn summary(&self) -> String {
        self.to_string()
    }

    /// Full failure trace; only raised exceptions carry a call stack
    pub fn trace(&self) -> String {
        match self {
            ExecError::Raised(raised) if !raised.traceback.is_empty() => raised.traceback.clone(),
            other => other.to_string(),
        }
    }
}

/// Evaluation scope: one namespace shared by every source executed in it
#[async_trait]
pub trait ExecutionScope: Send {
    /// Execute `source`, returning whatever it printed to standard output
    async fn exec(&mut self, source: &str) -> Result<String, ExecError>;
}

/// Factory of isolated evaluation scopes
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn open_scope(&self) -> Result<Box<dyn ExecutionScope>, ExecError>;
}

/// Execution Sandbox: run `code` in a fresh scope and report what happened
///
/// Returns the captured output trimmed of surrounding whitespace, or the
/// full failure trace when execution raises. Output printed before a failure
/// is discarded. Never returns an error.
pub async fn execute_code(engine: &dyn ExecutionEngine, code: &str) -> String {
    let result = match engine.open_scope().await {
        Ok(mut scope) => scope.exec(code).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(stdout) => stdout.trim().to_string(),
        Err(e) => e.trace(),
    }
}

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    source: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    ok: bool,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    error_type: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    traceback: String,
}

impl SessionResponse {
    fn into_result(self) -> Result<String, ExecError> {
        if self.ok {
            Ok(self.stdout)
        } else {
            Err(ExecError::Raised(RaisedException {
                error_type: self.error_type,
                message: self.message,
                traceback: self.traceback,
            }))
        }
    }
}

/// Python interpreter engine: one session process per scope
///
/// **Execution Rules:**
/// 1. Spawns `<interpreter> -u -c <session driver>` for every scope
/// 2. Sends each source as one JSON line, reads one JSON line back
/// 3. Rejects oversized sources before they reach the interpreter
/// 4. Enforces a wall-clock timeout per step; a timed-out session is killed
///    and every later step in that scope fails
#[derive(Debug, Clone)]
pub struct PythonEngine {
    interpreter: String,
    step_timeout: Duration,
    max_source_bytes: usize,
}

impl PythonEngine {
    pub fn new_with_config(settings: &RuntimeSettings) -> Self {
        Self {
            interpreter: settings.interpreter.clone(),
            step_timeout: Duration::from_millis(settings.step_timeout_ms),
            max_source_bytes: settings.max_source_bytes,
        }
    }

    /// Verify the interpreter can be launched at all
    ///
    /// Without this, a missing interpreter would silently turn every
    /// candidate into an Error verdict.
    pub async fn preflight(&self) -> Result<()> {
        let output = Command::new(&self.interpreter)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to launch interpreter '{}'", self.interpreter))?;

        if !output.status.success() {
            bail!(
                "Interpreter '{}' exited with {} during preflight",
                self.interpreter,
                output.status
            );
        }

        // Older interpreters print the version on stderr
        let version = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).trim().to_string()
        } else {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        };
        info!(interpreter = %self.interpreter, version = %version, "Interpreter ready");
        Ok(())
    }
}

#[async_trait]
impl ExecutionEngine for PythonEngine {
    async fn open_scope(&self) -> Result<Box<dyn ExecutionScope>, ExecError> {
        let scope_id = uuid::Uuid::new_v4();

        let mut child = Command::new(&self.interpreter)
            .arg("-u")
            .arg("-c")
            .arg(SESSION_DRIVER)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ExecError::Interpreter(format!("failed to start '{}': {}", self.interpreter, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExecError::Interpreter("session stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecError::Interpreter("session stdout unavailable".to_string()))?;

        debug!(scope_id = %scope_id, pid = ?child.id(), "Opened interpreter session");

        Ok(Box::new(PythonScope {
            scope_id,
            child,
            stdin,
            stdout: BufReader::new(stdout),
            step_timeout: self.step_timeout,
            max_source_bytes: self.max_source_bytes,
            broken: false,
        }))
    }
}

/// Interpreter session guard - the session process dies with the scope
struct PythonScope {
    scope_id: uuid::Uuid,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    step_timeout: Duration,
    max_source_bytes: usize,
    broken: bool,
}

impl PythonScope {
    fn poison(&mut self) {
        self.broken = true;
        if let Err(e) = self.child.start_kill() {
            debug!(scope_id = %self.scope_id, error = %e, "Session already gone");
        }
    }
}

#[async_trait]
impl ExecutionScope for PythonScope {
    async fn exec(&mut self, source: &str) -> Result<String, ExecError> {
        if self.broken {
            return Err(ExecError::Interpreter(
                "session was terminated by an earlier failure".to_string(),
            ));
        }
        if source.len() > self.max_source_bytes {
            return Err(ExecError::SourceTooLarge {
                limit: self.max_source_bytes,
            });
        }

        let mut line = serde_json::to_string(&SessionRequest { source })
            .map_err(|e| ExecError::Interpreter(format!("failed to encode request: {}", e)))?;
        line.push('\n');

        let start = Instant::now();
        let stdin = &mut self.stdin;
        let stdout = &mut self.stdout;
        let exchange = async move {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await?;

            let mut response = String::new();
            if stdout.read_line(&mut response).await? == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "session exited without responding",
                ));
            }
            Ok::<String, std::io::Error>(response)
        };

        // HARD TIMEOUT: an infinite loop in candidate code must not hang the run
        let response = match tokio::time::timeout(self.step_timeout, exchange).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                self.poison();
                return Err(ExecError::Interpreter(e.to_string()));
            }
            Err(_) => {
                let timeout_ms = self.step_timeout.as_millis() as u64;
                warn!(scope_id = %self.scope_id, timeout_ms, "Step timed out; killing session");
                self.poison();
                return Err(ExecError::TimedOut(timeout_ms));
            }
        };

        // The stream is out of sync after a bad line; the session cannot be trusted
        let parsed: SessionResponse = match serde_json::from_str(&response) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(scope_id = %self.scope_id, error = %e, "Malformed session response; killing session");
                self.poison();
                return Err(ExecError::Interpreter(format!(
                    "malformed session response: {}",
                    e
                )));
            }
        };

        debug!(
            scope_id = %self.scope_id,
            ok = parsed.ok,
            execution_ms = start.elapsed().as_millis() as u64,
            "Step executed"
        );

        parsed.into_result()
    }
}

impl Drop for PythonScope {
    fn drop(&mut self) {
        // Best-effort; kill_on_drop on the child covers the rest
        if let Err(e) = self.child.start_kill() {
            debug!(scope_id = %self.scope_id, error = %e, "Session already exited");
        }
    }
}

/// Scripted in-memory engine for tests that must not depend on an interpreter
///
/// Each source line is one instruction:
/// - `print <text>`   appends `<text>\n` to the captured output
/// - `define <name>`  binds a name in the scope
/// - `use <name>`     raises NameError unless the name is bound
/// - `raise <Type>[: message]` raises the given exception
/// - `hang`           behaves like a step that exceeded its timeout
#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    pub struct ScriptedEngine {
        log: Arc<Mutex<Vec<String>>>,
        scopes_opened: Arc<Mutex<usize>>,
    }

    impl ScriptedEngine {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every source executed so far, across all scopes, in order
        pub fn executed(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        pub fn scopes_opened(&self) -> usize {
            *self.scopes_opened.lock().unwrap()
        }
    }

    #[async_trait]
    impl ExecutionEngine for ScriptedEngine {
        async fn open_scope(&self) -> Result<Box<dyn ExecutionScope>, ExecError> {
            *self.scopes_opened.lock().unwrap() += 1;
            Ok(Box::new(ScriptedScope {
                log: Arc::clone(&self.log),
                names: HashSet::new(),
            }))
        }
    }

    struct ScriptedScope {
        log: Arc<Mutex<Vec<String>>>,
        names: HashSet<String>,
    }

    fn raised(error_type: &str, message: &str) -> ExecError {
        ExecError::Raised(RaisedException {
            error_type: error_type.to_string(),
            message: message.to_string(),
            traceback: format!(
                "Traceback (most recent call last):\n  File \"<candidate>\", line 1, in <module>\n{}",
                if message.is_empty() {
                    error_type.to_string()
                } else {
                    format!("{}: {}", error_type, message)
                }
            ),
        })
    }

    #[async_trait]
    impl ExecutionScope for ScriptedScope {
        async fn exec(&mut self, source: &str) -> Result<String, ExecError> {
            self.log.lock().unwrap().push(source.to_string());

            let mut stdout = String::new();
            for line in source.lines().map(str::trim).filter(|l| !l.is_empty()) {
                let (op, arg) = line.split_once(' ').unwrap_or((line, ""));
                match op {
                    "print" => {
                        stdout.push_str(arg);
                        stdout.push('\n');
                    }
                    "define" => {
                        self.names.insert(arg.to_string());
                    }
                    "use" => {
                        if !self.names.contains(arg) {
                            return Err(raised(
                                "NameError",
                                &format!("name '{}' is not defined", arg),
                            ));
                        }
                    }
                    "raise" => {
                        let (error_type, message) = arg.split_once(": ").unwrap_or((arg, ""));
                        return Err(raised(error_type, message));
                    }
                    "hang" => return Err(ExecError::TimedOut(10)),
                    other => return Err(raised("SyntaxError", &format!("unknown op '{}'", other))),
                }
            }
            Ok(stdout)
        }
    }
}
