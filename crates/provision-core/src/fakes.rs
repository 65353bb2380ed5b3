//! Scripted command executor (testing only)
//!
//! `ScriptedExecutor` satisfies the `CommandExecutor` contract without
//! touching the host: it records every invocation and answers from a table
//! keyed by the command's argv line (`program arg1 arg2 ...`, env ignored).

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::command::{CommandExecutor, CommandOutput, CommandSpec};
use crate::error::{ProvisionError, ProvisionResult};

#[derive(Debug, Clone)]
enum Scripted {
    Output(CommandOutput),
    SpawnError,
}

/// In-memory executor with canned responses.
///
/// Unscripted commands succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    responses: HashMap<String, Scripted>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `argv_line` with `output`.
    pub fn respond(mut self, argv_line: &str, output: CommandOutput) -> Self {
        self.responses
            .insert(argv_line.to_string(), Scripted::Output(output));
        self
    }

    /// Make `argv_line` exit with `exit_code`.
    pub fn fail(self, argv_line: &str, exit_code: i32) -> Self {
        self.respond(argv_line, CommandOutput::failed(exit_code, "scripted failure"))
    }

    /// Make `argv_line` fail to spawn, as if the program were missing.
    pub fn spawn_error(mut self, argv_line: &str) -> Self {
        self.responses
            .insert(argv_line.to_string(), Scripted::SpawnError);
        self
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Argv lines of every command run so far, in order.
    pub fn call_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::argv_line).collect()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn run(&self, spec: &CommandSpec, _timeout_secs: u64) -> ProvisionResult<CommandOutput> {
        let line = spec.argv_line();
        self.calls.lock().unwrap().push(spec.clone());

        match self.responses.get(&line) {
            Some(Scripted::Output(output)) => Ok(output.clone()),
            Some(Scripted::SpawnError) => Err(ProvisionError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: command not found", spec.program),
            ))),
            None => Ok(CommandOutput::default()),
        }
    }
}
