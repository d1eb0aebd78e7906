//! Per-command execution status.
//!
//! Commands report failure through `set_error`; `return` and `break` are
//! not errors but flags that short-circuit the current body and propagate
//! to the enclosing function or macro boundary. The nested-error flag
//! keeps a failure from being re-reported by every frame on the way up.

/// Status of a single command execution.
#[derive(Debug, Default)]
pub struct ExecutionStatus {
    error: Option<String>,
    return_value: Option<String>,
    return_invoked: bool,
    break_invoked: bool,
    nested_error: bool,
}

impl ExecutionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_return_value(&mut self, value: String) {
        self.return_value = Some(value);
    }

    /// Take the return value, leaving the status without one.
    pub fn release_return_value(&mut self) -> String {
        self.return_value.take().unwrap_or_default()
    }

    pub fn set_return_invoked(&mut self) {
        self.return_invoked = true;
    }

    pub fn return_invoked(&self) -> bool {
        self.return_invoked
    }

    pub fn set_break_invoked(&mut self) {
        self.break_invoked = true;
    }

    pub fn break_invoked(&self) -> bool {
        self.break_invoked
    }

    pub fn set_nested_error(&mut self) {
        self.nested_error = true;
    }

    pub fn nested_error(&self) -> bool {
        self.nested_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_return_value_takes() {
        let mut status = ExecutionStatus::new();
        status.set_return_value("a;b".to_string());
        assert_eq!(status.release_return_value(), "a;b");
        assert_eq!(status.release_return_value(), "");
    }

    #[test]
    fn test_flags_default_clear() {
        let status = ExecutionStatus::new();
        assert!(!status.return_invoked());
        assert!(!status.break_invoked());
        assert!(!status.nested_error());
        assert!(status.error().is_none());
    }
}
