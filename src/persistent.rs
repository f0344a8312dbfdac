//! Persistent sessions: connections that outlive the executor that opened them.
//!
//! Each backend keeps one registry. A persistent session is checked out by key (DSN + user),
//! and goes back to the registry's idle list when its holder drops it.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

use deadpool::unmanaged::{Object, Pool};

/// Idle + in-use persistent sessions allowed per key.
pub(crate) const PERSISTENT_SLOTS: usize = 8;

/// A session that is either owned outright or borrowed from a persistent registry.
pub(crate) enum Session<C> {
    Owned(C),
    Persistent(Object<C>),
}

impl<C> Session<C> {
    pub(crate) fn is_persistent(&self) -> bool {
        matches!(self, Session::Persistent(_))
    }
}

impl<C> Deref for Session<C> {
    type Target = C;

    fn deref(&self) -> &C {
        match self {
            Session::Owned(conn) => conn,
            Session::Persistent(obj) => obj,
        }
    }
}

impl<C> DerefMut for Session<C> {
    fn deref_mut(&mut self) -> &mut C {
        match self {
            Session::Owned(conn) => conn,
            Session::Persistent(obj) => obj,
        }
    }
}

impl<C> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Session::Owned(_) => "Session::Owned",
            Session::Persistent(_) => "Session::Persistent",
        })
    }
}

pub(crate) struct PersistentRegistry<C> {
    pools: Mutex<HashMap<String, Pool<C>>>,
}

impl<C> PersistentRegistry<C> {
    pub(crate) fn new() -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
        }
    }

    fn pool_for(&self, key: &str) -> Pool<C> {
        let mut pools = match self.pools.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pools
            .entry(key.to_string())
            .or_insert_with(|| Pool::new(PERSISTENT_SLOTS))
            .clone()
    }

    /// Take an idle session for `key`, or open one with `open` and register it.
    ///
    /// Returns the session and whether it was reused. When the key's slots are all taken the
    /// freshly opened session is returned as an owned, non-persistent one.
    pub(crate) fn checkout<E>(
        &self,
        key: &str,
        open: impl Fn() -> Result<C, E>,
    ) -> Result<(Session<C>, bool), E> {
        let pool = self.pool_for(key);
        if let Ok(obj) = pool.try_get() {
            return Ok((Session::Persistent(obj), true));
        }
        let conn = open()?;
        match pool.try_add(conn) {
            Ok(()) => match pool.try_get() {
                Ok(obj) => Ok((Session::Persistent(obj), false)),
                // Another checkout raced us to the session we just added.
                Err(_) => Ok((Session::Owned(open()?), false)),
            },
            Err((conn, _)) => Ok((Session::Owned(conn), false)),
        }
    }
}
