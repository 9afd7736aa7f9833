//! Pseudo filter code generator
//!
//! Runs one generation pass over a [`FilterDb`]:
//!
//! 1. **Open**: duplicate the caller's descriptor so buffering and closing
//!    here never disturb the caller's own handle
//! 2. **Ordering**: sort the syscall entries by descending priority
//! 3. **Rendering**: banner, every valid syscall block, default action, banner
//! 4. **Closed**: flush and close the duplicate
//!
//! The duplicate is owned by this call and is closed on every exit path,
//! including a failed ordering step. On success the close is explicit so its
//! result reaches the caller.

use std::collections::TryReserveError;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::os::fd::AsFd;

use thiserror::Error;

use crate::db::FilterDb;
use crate::order::PriorityList;
use crate::render::{render_action, render_syscall};

/// Errors that can occur while generating pseudo filter code
#[derive(Error, Debug)]
pub enum PfcError {
    #[error("Output sink unavailable: {0}")]
    SinkUnavailable(#[source] nix::Error),

    #[error("Out of memory while ordering syscalls")]
    OutOfMemory(#[from] TryReserveError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for generation
pub type Result<T> = std::result::Result<T, PfcError>;

/// Write the pseudo filter code for `db` to the file descriptor behind `sink`
///
/// Output goes through a private duplicate of the descriptor, so `sink`
/// stays open and usable afterwards.
pub fn generate<F: AsFd>(db: &FilterDb, sink: F) -> Result<()> {
    let fd = nix::unistd::dup(sink.as_fd()).map_err(PfcError::SinkUnavailable)?;
    tracing::debug!(arch = %db.arch(), "output sink opened");

    let mut out = BufWriter::new(File::from(fd));
    generate_to_writer(db, &mut out)?;

    let file = out.into_inner().map_err(|e| PfcError::Io(e.into_error()))?;
    nix::unistd::close(file).map_err(|errno| PfcError::Io(errno.into()))?;
    tracing::debug!("output sink closed");
    Ok(())
}

/// Write the pseudo filter code for `db` to any writer
pub fn generate_to_writer<W: Write + ?Sized>(db: &FilterDb, out: &mut W) -> Result<()> {
    let list = PriorityList::build(db.syscalls()).map_err(|e| {
        tracing::debug!("ordering aborted: {}", e);
        PfcError::OutOfMemory(e)
    })?;
    tracing::debug!(syscalls = list.len(), "syscalls ordered by priority");

    writeln!(out, "#")?;
    writeln!(out, "# pseudo filter code start")?;
    writeln!(out, "#")?;

    for sys in &list {
        if !sys.valid {
            tracing::trace!(num = sys.num, "skipping invalid syscall entry");
            continue;
        }
        render_syscall(out, db, sys)?;
    }

    writeln!(out, "# default action")?;
    render_action(out, db.default_action(), 0)?;
    writeln!(out, "#")?;
    writeln!(out, "# pseudo filter code end")?;
    writeln!(out, "#")?;

    out.flush()?;
    Ok(())
}

/// Render the pseudo filter code for `db` into a string
pub fn to_pfc_string(db: &FilterDb) -> Result<String> {
    let mut buf = Vec::new();
    generate_to_writer(db, &mut buf)?;
    // only ASCII text and numbers are ever written
    String::from_utf8(buf).map_err(|e| PfcError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}
