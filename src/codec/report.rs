//! Best-effort results with warnings

use std::fmt;

use log::warn;

/// Something a decompiler skipped or could not represent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    /// File offset the warning refers to.
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}: {}", self.offset, self.message)
    }
}

/// Decompiled output together with everything that was skipped.
#[derive(Clone, Debug)]
pub struct Decompiled<T> {
    pub output: T,
    pub warnings: Vec<Warning>,
}

impl<T> Decompiled<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decompiled<U> {
        Decompiled {
            output: f(self.output),
            warnings: self.warnings,
        }
    }
}

/// Collects warnings, logging each one as it arrives.
#[derive(Debug, Default)]
pub(crate) struct Warnings(Vec<Warning>);

impl Warnings {
    pub fn push(&mut self, offset: usize, message: impl Into<String>) {
        let w = Warning {
            offset,
            message: message.into(),
        };
        warn!("{}", w);
        self.0.push(w);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn finish<T>(self, output: T) -> Decompiled<T> {
        Decompiled {
            output,
            warnings: self.0,
        }
    }
}
