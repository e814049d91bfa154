//! SFTP backend over `ssh2` (feature `sftp`).

use log::debug;
use ssh2::{ErrorCode, Session, Sftp};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;

use super::{RemoteSession, RemoteTransport};
use crate::RemoteEntry;
use crate::error::{TransportError, TransportResult};
use crate::types::SftpOpts;

// libssh2 SFTP status codes
const SFTP_NO_SUCH_FILE: i32 = 2;
const SFTP_PERMISSION_DENIED: i32 = 3;

/// Password-authenticated SFTP endpoint.
pub struct SftpTransport {
    opts: SftpOpts,
    password: String,
}

impl SftpTransport {
    pub fn new(opts: SftpOpts, password: String) -> Self {
        Self { opts, password }
    }

    fn connect_err(&self, reason: impl ToString) -> TransportError {
        TransportError::Connect {
            target: self.target(),
            reason: reason.to_string(),
        }
    }
}

impl RemoteTransport for SftpTransport {
    type Session = SftpSession;

    fn connect(&self) -> TransportResult<SftpSession> {
        let addr = (self.opts.host.as_str(), self.opts.port)
            .to_socket_addrs()
            .map_err(|e| self.connect_err(e))?
            .next()
            .ok_or_else(|| self.connect_err("host resolved to no address"))?;
        let tcp = TcpStream::connect_timeout(&addr, self.opts.connect_timeout)
            .map_err(|e| self.connect_err(e))?;

        let mut session = Session::new().map_err(|e| self.connect_err(e))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(u32::try_from(self.opts.connect_timeout.as_millis()).unwrap_or(u32::MAX));
        session.handshake().map_err(|e| self.connect_err(e))?;
        session
            .userauth_password(&self.opts.user, &self.password)
            .map_err(|e| self.connect_err(e))?;
        if !session.authenticated() {
            return Err(self.connect_err("authentication rejected"));
        }
        let sftp = session.sftp().map_err(|e| self.connect_err(e))?;
        debug!("SFTP session opened to {}", self.target());
        Ok(SftpSession {
            session,
            sftp: Some(sftp),
        })
    }

    fn target(&self) -> String {
        format!("{}@{}:{}", self.opts.user, self.opts.host, self.opts.port)
    }
}

/// One SSH connection with its SFTP channel.
pub struct SftpSession {
    session: Session,
    sftp: Option<Sftp>,
}

fn map_ssh_error(path: &str, err: ssh2::Error) -> TransportError {
    match err.code() {
        ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => TransportError::NotFound {
            path: path.to_string(),
        },
        ErrorCode::SFTP(SFTP_PERMISSION_DENIED) => TransportError::PermissionDenied {
            path: path.to_string(),
        },
        ErrorCode::Session(_) => TransportError::Closed(err.message().to_string()),
        ErrorCode::SFTP(_) => TransportError::List {
            path: path.to_string(),
            reason: err.message().to_string(),
            transient: true,
        },
    }
}

impl RemoteSession for SftpSession {
    fn list(&mut self, path: &str) -> TransportResult<Vec<RemoteEntry>> {
        let sftp = self
            .sftp
            .as_ref()
            .ok_or_else(|| TransportError::Closed("sftp channel closed".to_string()))?;
        let listing = sftp
            .readdir(Path::new(path))
            .map_err(|e| map_ssh_error(path, e))?;
        Ok(listing
            .into_iter()
            .filter_map(|(child, stat)| {
                let name = child.file_name()?.to_string_lossy().into_owned();
                let modified_ms = stat
                    .mtime
                    .and_then(|s| i64::try_from(s).ok())
                    .and_then(|s| s.checked_mul(1000))
                    .unwrap_or(RemoteEntry::UNKNOWN_MTIME);
                Some(RemoteEntry::child_of(
                    path,
                    &name,
                    stat.size.unwrap_or(0),
                    modified_ms,
                    stat.is_dir(),
                ))
            })
            .collect())
    }

    fn is_alive(&mut self) -> bool {
        match &self.sftp {
            Some(sftp) => sftp.stat(Path::new(".")).is_ok(),
            None => false,
        }
    }

    fn close(&mut self) {
        if self.sftp.take().is_some() {
            let _ = self.session.disconnect(None, "closing", None);
        }
    }
}

impl Drop for SftpSession {
    fn drop(&mut self) {
        self.close();
    }
}
