//! Engine diagnostics and the listeners that judge them
//!
//! libxml2 reports warnings, recoverable errors and fatal errors through a
//! structured error callback. Each operation installs a [`DiagnosticSink`]
//! for its own duration; the sink converts every report into a
//! [`Diagnostic`], asks the operation's [`DiagnosticListener`] for a
//! [`Verdict`], and stops the parser as soon as the listener aborts.

use std::ffi::CStr;
use std::fmt;

use libc::{c_char, c_int, c_void};

use crate::libxml2::{
    XML_ERR_ERROR, XML_ERR_FATAL, XML_ERR_WARNING, XmlParserCtxt, XmlStructuredErrorFunc,
    __xmlStructuredError, __xmlStructuredErrorContext, ensure_initialized, xmlError,
    xmlSetStructuredErrorFunc, xmlStopParser,
};

/// Severity reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl Severity {
    fn from_level(level: c_int) -> Self {
        match level {
            XML_ERR_WARNING => Severity::Warning,
            XML_ERR_ERROR => Severity::Error,
            XML_ERR_FATAL => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal error",
        };
        f.write_str(label)
    }
}

/// A single report from libxml2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// libxml2 error domain (parser, namespace, schemas, xpath, ...)
    pub domain: i32,
    /// libxml2 error code within the domain
    pub code: i32,
    pub message: String,
    pub line: i32,
    pub column: i32,
}

impl Diagnostic {
    /// A diagnostic for failures the engine did not describe itself.
    pub(crate) fn synthetic(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Fatal,
            domain: 0,
            code: 0,
            message: message.into(),
            line: 0,
            column: 0,
        }
    }

    /// # Safety
    ///
    /// `error` must be null or point to a live `xmlError` for the duration of
    /// the call.
    unsafe fn from_raw(error: *const xmlError) -> Option<Self> {
        if error.is_null() {
            return None;
        }
        let error = unsafe { &*error };
        let message = if error.message.is_null() {
            String::from("unknown error")
        } else {
            unsafe { CStr::from_ptr(error.message as *const c_char) }
                .to_string_lossy()
                .trim()
                .to_string()
        };

        Some(Diagnostic {
            severity: Severity::from_level(error.level),
            domain: error.domain,
            code: error.code,
            message,
            line: error.line,
            column: error.int2,
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(
                f,
                "{} at line {}, column {}: {}",
                self.severity, self.line, self.column, self.message
            )
        } else {
            write!(f, "{}: {}", self.severity, self.message)
        }
    }
}

/// What to do after a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Abort,
}

/// Judges each diagnostic an operation receives from the engine.
pub trait DiagnosticListener {
    fn on_diagnostic(&mut self, diagnostic: &Diagnostic) -> Verdict;
}

/// Aborts on every severity: warnings, recoverable errors and fatal errors
/// all fail the operation.
#[derive(Debug, Default)]
pub struct Pedantic;

impl DiagnosticListener for Pedantic {
    fn on_diagnostic(&mut self, _diagnostic: &Diagnostic) -> Verdict {
        Verdict::Abort
    }
}

/// Aborts on fatal errors only and logs everything else.
#[derive(Debug, Default)]
pub struct Lenient;

impl DiagnosticListener for Lenient {
    fn on_diagnostic(&mut self, diagnostic: &Diagnostic) -> Verdict {
        if diagnostic.severity == Severity::Fatal {
            return Verdict::Abort;
        }
        log::warn!("Tolerating XML {}", diagnostic);
        Verdict::Continue
    }
}

/// Never aborts; keeps every diagnostic for later inspection.
#[derive(Debug, Default)]
pub struct Collecting {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticListener for Collecting {
    fn on_diagnostic(&mut self, diagnostic: &Diagnostic) -> Verdict {
        self.diagnostics.push(diagnostic.clone());
        Verdict::Continue
    }
}

/// Per-operation receiver for the engine's structured error callback.
pub(crate) struct DiagnosticSink<'l> {
    listener: &'l mut dyn DiagnosticListener,
    parser: *mut XmlParserCtxt,
    received: Vec<Diagnostic>,
    aborted: Option<Diagnostic>,
}

impl<'l> DiagnosticSink<'l> {
    pub(crate) fn new(listener: &'l mut dyn DiagnosticListener) -> Self {
        DiagnosticSink {
            listener,
            parser: std::ptr::null_mut(),
            received: Vec::new(),
            aborted: None,
        }
    }

    /// Parser to stop when the listener aborts.
    pub(crate) fn stop_on_abort(&mut self, parser: *mut XmlParserCtxt) {
        self.parser = parser;
    }

    pub(crate) fn as_user_data(&mut self) -> *mut c_void {
        self as *mut DiagnosticSink<'l> as *mut c_void
    }

    /// First diagnostic the listener aborted on, if any.
    pub(crate) fn abort_cause(&self) -> Option<&Diagnostic> {
        self.aborted.as_ref()
    }

    pub(crate) fn received(&self) -> &[Diagnostic] {
        &self.received
    }

    pub(crate) fn into_received(self) -> Vec<Diagnostic> {
        self.received
    }

    fn accept(&mut self, diagnostic: Diagnostic) {
        if self.listener.on_diagnostic(&diagnostic) == Verdict::Abort {
            if self.aborted.is_none() {
                self.aborted = Some(diagnostic.clone());
            }
            if !self.parser.is_null() {
                unsafe { xmlStopParser(self.parser) };
            }
        }
        self.received.push(diagnostic);
    }
}

/// Callback for libxml2 to report diagnostics (structured)
///
/// `user_data` must come from [`DiagnosticSink::as_user_data`] on a sink that
/// outlives the engine call.
pub(crate) unsafe extern "C" fn forward_diagnostic(user_data: *mut c_void, error: *mut xmlError) {
    if user_data.is_null() {
        return;
    }
    let sink = unsafe { &mut *(user_data as *mut DiagnosticSink<'_>) };
    if let Some(diagnostic) = unsafe { Diagnostic::from_raw(error) } {
        sink.accept(diagnostic);
    }
}

/// Routes libxml2's thread-local structured error handler to a sink until
/// dropped, then reinstalls whatever handler was active before.
pub(crate) struct HandlerGuard {
    previous_handler: XmlStructuredErrorFunc,
    previous_context: *mut c_void,
}

impl HandlerGuard {
    /// # Safety
    ///
    /// `user_data` must come from [`DiagnosticSink::as_user_data`] and the
    /// sink must outlive the guard. Guards must be dropped in reverse order
    /// of installation.
    pub(crate) unsafe fn install(user_data: *mut c_void) -> Self {
        ensure_initialized();
        let (previous_handler, previous_context) = unsafe { current_handler() };
        unsafe { xmlSetStructuredErrorFunc(user_data, Some(forward_diagnostic)) };
        HandlerGuard {
            previous_handler,
            previous_context,
        }
    }
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        unsafe { xmlSetStructuredErrorFunc(self.previous_context, self.previous_handler) };
    }
}

/// Handler and context currently installed on this thread
unsafe fn current_handler() -> (XmlStructuredErrorFunc, *mut c_void) {
    let handler = unsafe { __xmlStructuredError() };
    let context = unsafe { __xmlStructuredErrorContext() };
    let handler = if handler.is_null() { None } else { unsafe { *handler } };
    let context = if context.is_null() {
        std::ptr::null_mut()
    } else {
        unsafe { *context }
    };
    (handler, context)
}
