use std::io;

/// A write failed because whoever reads our output went away (e.g. `| head -1`).
/// Callers stop writing and treat this as a normal end.
pub fn is_consumer_closed(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::BrokenPipe
}
