use serde::{Deserialize, Serialize};

/// Identity of the process issuing a request.
///
/// The bridge supplies this from its request context. Ownership of new
/// records and every permission check use it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Caller {
    pub uid: u32,
    pub gid: u32,
}

impl Caller {
    pub const ROOT: Caller = Caller { uid: 0, gid: 0 };

    pub const fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// Effective uid and gid of the current process.
    pub fn current() -> Self {
        Self {
            uid: rustix::process::geteuid().as_raw(),
            gid: rustix::process::getegid().as_raw(),
        }
    }

    pub fn is_superuser(&self) -> bool {
        self.uid == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superuser() {
        assert!(Caller::ROOT.is_superuser());
        assert!(!Caller::new(1000, 0).is_superuser());
    }

    #[test]
    fn current_is_effective_identity() {
        let c = Caller::current();
        assert_eq!(c.is_superuser(), rustix::process::geteuid().is_root());
    }
}
