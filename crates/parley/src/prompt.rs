//! Interactive prompt capability.
//!
//! Every interactive flow in the core (layout-kind repair, switch-target
//! pick, reopen-after-warning) is built on a single `pick` primitive so it
//! stays cancellable: dismissing the prompt unwinds the whole request.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

/// Presents choices to the user.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Show `items` under `message`; resolve to the chosen index, or
    /// `Ok(None)` when the user dismisses the prompt.
    async fn pick(&self, message: &str, items: &[String]) -> Result<Option<usize>>;
}

/// Prompter answering from a canned script, in order.
///
/// Runs out of script answers as dismissals, so a test that forgets an
/// answer behaves like a user cancelling rather than hanging.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Option<usize>>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Option<usize>>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Messages shown so far, for assertions.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn pick(&self, message: &str, _items: &[String]) -> Result<Option<usize>> {
        self.asked.lock().unwrap().push(message.to_string());
        Ok(self.answers.lock().unwrap().pop_front().flatten())
    }
}
