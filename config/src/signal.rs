//! OS signal identifiers used for the kill and reload signals.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

macro_rules! signals {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// A POSIX signal, identified by its conventional name.
        ///
        /// `Null` (`SIGNULL`) means "no signal": the lifecycle collaborator
        /// ignores it instead of installing a handler.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Signal {
            $($variant),+
        }

        impl Signal {
            /// Every known signal, in lookup-table order.
            pub const ALL: &'static [Signal] = &[$(Signal::$variant),+];

            /// Conventional upper-case name, e.g. `SIGHUP`.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Signal::$variant => $name),+
                }
            }
        }
    };
}

signals! {
    Abrt => "SIGABRT",
    Alrm => "SIGALRM",
    Bus => "SIGBUS",
    Chld => "SIGCHLD",
    Cont => "SIGCONT",
    Fpe => "SIGFPE",
    Hup => "SIGHUP",
    Ill => "SIGILL",
    Int => "SIGINT",
    Io => "SIGIO",
    Iot => "SIGIOT",
    Kill => "SIGKILL",
    Null => "SIGNULL",
    Pipe => "SIGPIPE",
    Prof => "SIGPROF",
    Quit => "SIGQUIT",
    Segv => "SIGSEGV",
    Stop => "SIGSTOP",
    Sys => "SIGSYS",
    Term => "SIGTERM",
    Trap => "SIGTRAP",
    Tstp => "SIGTSTP",
    Ttin => "SIGTTIN",
    Ttou => "SIGTTOU",
    Urg => "SIGURG",
    Usr1 => "SIGUSR1",
    Usr2 => "SIGUSR2",
    Winch => "SIGWINCH",
    Xcpu => "SIGXCPU",
    Xfsz => "SIGXFSZ",
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid signal {name:?} - valid signals are {valid}")]
pub struct UnknownSignal {
    pub name: String,
    valid: String,
}

impl FromStr for Signal {
    type Err = UnknownSignal;

    /// Case-insensitive lookup of the full signal name (`sighup`, `SIGHUP`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Signal::ALL
            .iter()
            .copied()
            .find(|sig| sig.as_str() == wanted)
            .ok_or_else(|| UnknownSignal {
                name: s.to_string(),
                valid: Signal::ALL
                    .iter()
                    .map(|sig| sig.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Signal {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}
