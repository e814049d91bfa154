//! Background idle-session evictor.

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use log::debug;
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::SessionPool;
use crate::transport::RemoteTransport;

/// Periodically calls [`SessionPool::evict_idle`]. Holds only a weak reference, so the
/// pool can drop while the thread sleeps; the thread exits on the next tick.
pub(crate) struct Evictor {
    shutdown: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Evictor {
    pub(crate) fn spawn<T>(pool: Weak<SessionPool<T>>, interval: Duration) -> std::io::Result<Self>
    where
        T: RemoteTransport + 'static,
    {
        let (shutdown, rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("remdex-evictor".to_string())
            .spawn(move || {
                loop {
                    match rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let Some(pool) = pool.upgrade() else {
                                break;
                            };
                            pool.evict_idle();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Evictor thread stopped");
            })?;
        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it. When called from the evictor thread itself (the
    /// last pool reference dropped inside a sweep) it only signals.
    pub(crate) fn stop(mut self) {
        let _ = self.shutdown.try_send(());
        if let Some(handle) = self.handle.take()
            && handle.thread().id() != thread::current().id()
        {
            let _ = handle.join();
        }
    }
}
