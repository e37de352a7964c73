use std::backtrace::Backtrace;
use std::fmt;

/// A declared parameter of a stack frame's method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameParameter {
    pub type_name: String,
    pub name: String,
}

/// One resolved frame of a [`StackTrace`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrame {
    /// Fully qualified path of the type or module declaring the method.
    pub declaring_type: Option<String>,
    pub method: Option<String>,
    pub generic_arguments: Vec<String>,
    pub parameters: Vec<FrameParameter>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl StackFrame {
    pub fn new(declaring_type: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            declaring_type: Some(declaring_type.into()),
            method: Some(method.into()),
            ..Self::default()
        }
    }

    pub fn with_generic_argument(mut self, name: impl Into<String>) -> Self {
        self.generic_arguments.push(name.into());
        self
    }

    pub fn with_parameter(mut self, type_name: impl Into<String>, name: impl Into<String>) -> Self {
        self.parameters.push(FrameParameter {
            type_name: type_name.into(),
            name: name.into(),
        });
        self
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// `Type.method[T](P name)` without any location.
    pub(crate) fn signature(&self) -> Option<String> {
        let method = self.method.as_deref()?;
        let mut out = String::new();
        if let Some(ty) = self.declaring_type.as_deref() {
            out.push_str(ty);
            out.push('.');
        }
        out.push_str(method);
        if !self.generic_arguments.is_empty() {
            out.push('[');
            out.push_str(&self.generic_arguments.join(","));
            out.push(']');
        }
        out.push('(');
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| format!("{} {}", p.type_name, p.name))
            .collect();
        out.push_str(&params.join(", "));
        out.push(')');
        Some(out)
    }
}

/// Captured call stack of an exception, innermost frame first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackTrace {
    frames: Vec<StackFrame>,
}

impl StackTrace {
    pub fn new(frames: Vec<StackFrame>) -> Self {
        Self { frames }
    }

    /// Capture the current call stack.
    ///
    /// Frames belonging to the capture machinery are dropped. Without debug
    /// info frames have no line numbers.
    #[inline(never)]
    pub fn capture() -> Self {
        let text = Backtrace::force_capture().to_string();
        let mut trace = Self::parse(&text);
        let first_caller = trace
            .frames
            .iter()
            .position(|f| !is_capture_frame(f))
            .unwrap_or(trace.frames.len());
        trace.frames.drain(..first_caller);
        trace
    }

    /// Parse the textual form of a `std::backtrace::Backtrace`.
    ///
    /// ```text
    ///    3: my_app::orders::submit
    ///              at ./src/orders.rs:42:9
    /// ```
    pub fn parse(text: &str) -> Self {
        let mut frames: Vec<StackFrame> = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if let Some(location) = line.strip_prefix("at ") {
                if let Some(frame) = frames.last_mut() {
                    let (file, line_no) = split_location(location);
                    frame.file = Some(file.to_string());
                    frame.line = line_no;
                }
                continue;
            }
            let Some((index, symbol)) = line.split_once(": ") else {
                continue;
            };
            if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            frames.push(frame_from_symbol(symbol));
        }
        Self { frames }
    }

    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for frame in &self.frames {
            let Some(signature) = frame.signature() else {
                continue;
            };
            if !first {
                f.write_str("\n")?;
            }
            first = false;
            write!(f, "   at {signature}")?;
            match (&frame.file, frame.line) {
                (Some(file), Some(line)) => write!(f, " in {file}:line {line}")?,
                (Some(file), None) => write!(f, " in {file}")?,
                (None, Some(line)) => write!(f, " line: {line}")?,
                (None, None) => {}
            }
        }
        Ok(())
    }
}

fn is_capture_frame(frame: &StackFrame) -> bool {
    let ty = frame.declaring_type.as_deref().unwrap_or_default();
    ty.starts_with("std::backtrace")
        || ty.starts_with("std::sys")
        || ty == "tracing_log_extended::stack::StackTrace"
        || ty == "tracing_log_extended::exception::Exception"
}

/// `path/to/file.rs:42:9` -> (`path/to/file.rs`, Some(42))
fn split_location(location: &str) -> (&str, Option<u32>) {
    let mut parts = location.rsplitn(3, ':');
    let last = parts.next();
    let middle = parts.next();
    let rest = parts.next();
    match (rest, middle, last) {
        (Some(file), Some(line), Some(_column)) => match line.parse() {
            Ok(n) => (file, Some(n)),
            Err(_) => (location, None),
        },
        (None, Some(file), Some(line)) => match line.parse() {
            Ok(n) => (file, Some(n)),
            Err(_) => (location, None),
        },
        _ => (location, None),
    }
}

fn frame_from_symbol(symbol: &str) -> StackFrame {
    let symbol = strip_hash_suffix(symbol.trim());
    match split_path(symbol) {
        Some((declaring, method)) => StackFrame {
            declaring_type: Some(declaring.to_string()),
            method: Some(method.to_string()),
            ..StackFrame::default()
        },
        None => StackFrame {
            method: Some(symbol.to_string()),
            ..StackFrame::default()
        },
    }
}

/// Drop the trailing `::h0123456789abcdef` of legacy-mangled symbols.
fn strip_hash_suffix(symbol: &str) -> &str {
    match symbol.rsplit_once("::h") {
        Some((head, hash)) if hash.len() == 16 && hash.bytes().all(|b| b.is_ascii_hexdigit()) => {
            head
        }
        _ => symbol,
    }
}

/// Split at the last `::` that is not nested inside `<...>`.
fn split_path(symbol: &str) -> Option<(&str, &str)> {
    let bytes = symbol.as_bytes();
    let mut depth = 0i32;
    let mut split = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth -= 1,
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                split = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    split.map(|at| (&symbol[..at], &symbol[at + 2..]))
}
