// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hosts a playbook runs against, and how to reach them.

use gw_system::error::SystemError;
use gw_system::{Local, Remote, System};
use serde::{Deserialize, Serialize};

/// How to reach a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Connection {
    /// Execute on the controller itself.
    Local,
    /// Spawn a remote worker with this argv and pipeline actions over its
    /// stdio, e.g. `["ssh", "web1", "gw-worker"]`.
    Worker { argv: Vec<String> },
}

/// One target host declared by a playbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    pub connection: Connection,
}

impl Host {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connection: Connection::Local,
        }
    }

    /// Reach the host over ssh, expecting `gw-worker` on its path.
    pub fn ssh(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            connection: Connection::Worker {
                argv: vec!["ssh".to_string(), name.clone(), "gw-worker".to_string()],
            },
            name,
        }
    }

    pub fn worker(name: impl Into<String>, argv: Vec<String>) -> Self {
        Self {
            name: name.into(),
            connection: Connection::Worker { argv },
        }
    }

    /// Open the transport for this host.
    pub fn make_system(&self) -> Result<Box<dyn System>, SystemError> {
        match &self.connection {
            Connection::Local => Ok(Box::new(Local::named(self.name.clone()))),
            Connection::Worker { argv } => Ok(Box::new(Remote::connect(
                self.name.clone(),
                argv,
                gw_actions::builtin(),
            )?)),
        }
    }
}
