//! Recording [`ToolInvoker`] used by unit tests

use std::sync::Mutex;

use super::{Invocation, ToolError, ToolInvoker, ToolOutput};

type Handler = dyn Fn(&Invocation) -> Result<ToolOutput, ToolError> + Send + Sync;

/// Records every invocation and answers through a handler closure
pub struct FakeInvoker {
    calls: Mutex<Vec<Invocation>>,
    handler: Box<Handler>,
}

impl FakeInvoker {
    /// Fake where every command succeeds without side effects
    pub fn succeeding() -> Self {
        Self::with(|_| Ok(ToolOutput::success()))
    }

    pub fn with<F>(handler: F) -> Self
    where
        F: Fn(&Invocation) -> Result<ToolOutput, ToolError> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Invocations of one program, in call order
    pub fn calls_to(&self, program: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == program)
            .collect()
    }
}

impl ToolInvoker for FakeInvoker {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }
        (self.handler)(invocation)
    }
}

/// Value following `flag` in an argument list
pub fn flag_value<'a>(invocation: &'a Invocation, flag: &str) -> Option<&'a str> {
    invocation
        .args
        .iter()
        .position(|a| a == flag)
        .and_then(|i| invocation.args.get(i + 1))
        .map(String::as_str)
}
