//! Printing diagnostics to stderr.
//!
//! `warn!` always prints; `trace!` only when tracing was enabled, via
//! the `AVIEW_TRACE` env var or `set_trace`.

use std::sync::atomic::{AtomicBool, Ordering};

use lazy_static::lazy_static;

use crate::util::getenv_bool;

lazy_static! {
    pub static ref TRACE_ENABLED: AtomicBool = AtomicBool::new(
        // An unparseable value shouldn't keep rendering from working
        getenv_bool("AVIEW_TRACE").unwrap_or(false));
}

pub fn set_trace(on: bool) {
    TRACE_ENABLED.store(on, Ordering::SeqCst);
}

pub fn trace_enabled() -> bool {
    TRACE_ENABLED.load(Ordering::SeqCst)
}


#[macro_export]
macro_rules! warn {
    ($formatstr:expr $(,$arg:expr)*) => { {
        use std::io::Write;
        let mut outp = std::io::BufWriter::new(std::io::stderr().lock());
        let _ = write!(&mut outp, "W: ");
        let _ = write!(&mut outp, $formatstr $(,$arg)*);
        let _ = writeln!(&mut outp, " at {:?} line {}", file!(), line!());
        let _ = outp.flush();
    } }
}

#[macro_export]
macro_rules! trace {
    ($formatstr:expr $(,$arg:expr)*) => { {
        if $crate::warn::trace_enabled() {
            use std::io::Write;
            let mut outp = std::io::BufWriter::new(std::io::stderr().lock());
            let _ = write!(&mut outp, "T: ");
            let _ = write!(&mut outp, $formatstr $(,$arg)*);
            let _ = writeln!(&mut outp, " at {:?} line {}", file!(), line!());
            let _ = outp.flush();
        }
    } }
}
