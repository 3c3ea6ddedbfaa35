//! Multi-command operations as explicit step lists.
//!
//! Some operations need several AT commands in a row (e.g. enabling
//! network time takes `AT+CLTS`, `AT+CTZR`, then `AT&W`). Each is run as
//! a linear list of named steps. When step *k* fails, the whole operation
//! fails with [`Error::SequenceAborted`] naming the step and how many steps
//! had already succeeded. Completed steps are not rolled back; the modem
//! may be left part-way.

use tracing::{debug, warn};

use modemlib_core::error::{Error, Result};
use modemlib_text_io::io::ModemIo;
use modemlib_text_io::protocol::Command;

/// Progress tracker for one multi-step operation.
#[derive(Debug)]
pub struct Sequence {
    operation: &'static str,
    completed: usize,
}

impl Sequence {
    /// Start tracking `operation`.
    pub fn new(operation: &'static str) -> Self {
        debug!(operation, "sequence started");
        Sequence {
            operation,
            completed: 0,
        }
    }

    /// Run one step. On failure the error is wrapped in
    /// [`Error::SequenceAborted`].
    pub fn step<T>(&mut self, step: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        debug!(operation = self.operation, step, index = self.completed, "sequence step");
        match f() {
            Ok(value) => {
                self.completed += 1;
                Ok(value)
            }
            Err(source) => {
                warn!(
                    operation = self.operation,
                    step,
                    completed = self.completed,
                    error = %source,
                    "sequence aborted"
                );
                Err(Error::SequenceAborted {
                    operation: self.operation,
                    step,
                    completed: self.completed,
                    source: Box::new(source),
                })
            }
        }
    }

    /// Number of steps that have succeeded so far.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Mark the operation done and return the step count.
    pub fn finish(self) -> usize {
        debug!(operation = self.operation, steps = self.completed, "sequence finished");
        self.completed
    }
}

/// One command of a command-only sequence: send it, wait for `expect`.
#[derive(Debug, Clone)]
pub struct CommandStep {
    pub name: &'static str,
    pub command: Command,
    pub expect: &'static str,
}

impl CommandStep {
    pub fn new(name: &'static str, command: Command, expect: &'static str) -> Self {
        CommandStep {
            name,
            command,
            expect,
        }
    }
}

/// Run `steps` in order as one transaction each.
///
/// Returns the number of completed steps (always `steps.len()` on success).
pub fn run(io: &mut ModemIo, operation: &'static str, steps: &[CommandStep]) -> Result<usize> {
    let mut sequence = Sequence::new(operation);
    for step in steps {
        sequence.step(step.name, || io.transact(&step.command, step.expect))?;
    }
    Ok(sequence.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use modemlib_test_harness::MockTransport;
    use modemlib_text_io::io::IoConfig;
    use modemlib_text_io::protocol::{at_command, at_plus_command, OK};

    fn make_io(mock: MockTransport) -> ModemIo {
        let config = IoConfig {
            response_timeout: Duration::from_millis(60),
            response_attempts: 2,
            quiescence: Duration::from_millis(10),
            ..Default::default()
        };
        ModemIo::new(Box::new(mock), config)
    }

    fn rtc_steps() -> Vec<CommandStep> {
        vec![
            CommandStep::new("network time", at_plus_command("CLTS=1"), OK),
            CommandStep::new("time zone", at_plus_command("CTZR=1"), OK),
            CommandStep::new("save", at_command("&W"), OK),
        ]
    }

    #[test]
    fn all_steps_succeed() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CLTS=1\r", b"\r\nOK\r\n");
        mock.expect(b"AT+CTZR=1\r", b"\r\nOK\r\n");
        mock.expect(b"AT&W\r", b"\r\nOK\r\n");
        let handle = mock.handle();
        let mut io = make_io(mock);

        assert_eq!(run(&mut io, "auto rtc", &rtc_steps()).unwrap(), 3);
        assert_eq!(handle.remaining_expectations(), 0);
    }

    #[test]
    fn failure_names_step_and_progress() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CLTS=1\r", b"\r\nOK\r\n");
        mock.expect(b"AT+CTZR=1\r", b"\r\nERROR\r\n");
        let handle = mock.handle();
        let mut io = make_io(mock);

        let err = run(&mut io, "auto rtc", &rtc_steps()).unwrap_err();
        match &err {
            Error::SequenceAborted {
                operation,
                step,
                completed,
                source,
            } => {
                assert_eq!(*operation, "auto rtc");
                assert_eq!(*step, "time zone");
                assert_eq!(*completed, 1);
                assert!(matches!(**source, Error::ModemError(_)));
            }
            other => panic!("expected SequenceAborted, got {other:?}"),
        }
        // The save step never ran.
        assert_eq!(handle.sent_data().len(), 2);
    }

    #[test]
    fn first_step_timeout() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT+CLTS=1\r", b"");
        let mut io = make_io(mock);

        let err = run(&mut io, "auto rtc", &rtc_steps()).unwrap_err();
        assert!(err.root_cause().is_timeout());
        assert!(err.to_string().contains("after 0 completed step(s)"));
    }

    #[test]
    fn manual_steps_carry_values() {
        let mut sequence = Sequence::new("manual");
        let a = sequence.step("one", || Ok(1)).unwrap();
        let b = sequence.step("two", || Ok(a + 1)).unwrap();
        assert_eq!(b, 2);
        assert_eq!(sequence.completed(), 2);

        let err = sequence
            .step("three", || -> Result<()> {
                Err(Error::InvalidParameter("nope".into()))
            })
            .unwrap_err();
        assert!(matches!(
            err,
            Error::SequenceAborted { completed: 2, step: "three", .. }
        ));
        assert_eq!(sequence.finish(), 2);
    }
}
