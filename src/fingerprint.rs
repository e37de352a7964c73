use sha1::{Digest, Sha1};

use crate::exception::Exception;
use crate::stack::StackTrace;

/// Stable identity of an exception as a 40-character SHA-1 hex digest.
///
/// The digest covers the exception's stack signature: declaring type,
/// method, generic arguments, parameters and line number of every
/// resolvable frame. File paths are left out so that builds on different
/// machines fingerprint alike. Without a stack trace the message is hashed
/// instead. `None` yields an empty string.
pub fn fingerprint(exception: Option<&Exception>) -> String {
    let Some(exception) = exception else {
        return String::new();
    };

    let signature = match exception.stack_trace().filter(|t| !t.is_empty()) {
        Some(trace) => match canonical_signature(trace) {
            Some(signature) => signature,
            None => return String::new(),
        },
        None => exception.message().to_string(),
    };

    hex::encode(Sha1::digest(signature.as_bytes()))
}

/// Newline-joined `   at Type.method[T](P name) line: N` entries.
///
/// `None` when no frame can be resolved to a method.
fn canonical_signature(trace: &StackTrace) -> Option<String> {
    let frames: Vec<String> = trace
        .frames()
        .iter()
        .filter_map(|frame| {
            let signature = frame.signature()?;
            Some(match frame.line {
                Some(line) => format!("   at {signature} line: {line}"),
                None => format!("   at {signature}"),
            })
        })
        .collect();

    if frames.is_empty() {
        None
    } else {
        Some(frames.join("\n"))
    }
}
