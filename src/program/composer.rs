use serde::{Deserialize, Serialize};
use tracing::info;

/// One scripted step: a program name and the parameters handed to its
/// `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramStep {
    pub program: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl ProgramStep {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            params: serde_json::Value::Null,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

/// Sequencer for the scripted hand-off between programs. The index starts
/// at -1; each `next_program` advances it, and running past the end of the
/// script signals that the installation sequence is complete.
pub struct Composer {
    script: Vec<ProgramStep>,
    index: isize,
}

impl Composer {
    pub fn new(script: Vec<ProgramStep>) -> Self {
        Self { script, index: -1 }
    }

    /// Single-step script, used when a program is launched standalone.
    pub fn solo(program: impl Into<String>) -> Self {
        Self::new(vec![ProgramStep::new(program)])
    }

    /// Advance to the next scripted step, or None when the script is
    /// exhausted (terminal: later calls keep returning None).
    pub fn next_program(&mut self) -> Option<&ProgramStep> {
        if self.index < self.script.len() as isize {
            self.index += 1;
        }
        if self.index as usize >= self.script.len() {
            self.finish();
            return None;
        }
        self.script.get(self.index as usize)
    }

    fn finish(&self) {
        info!("composition script complete");
    }

    pub fn current(&self) -> Option<&ProgramStep> {
        if self.index < 0 {
            return None;
        }
        self.script.get(self.index as usize)
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.script.len() as isize
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }
}
