// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command execution

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{command::Query, error::*, frame::*, transport::Transport};

/// The classified result of one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<'q> {
    outcome: Outcome,
    template: Option<&'q ResponseTemplate>,
    data: Vec<u8>,
}

impl<'q> Reply<'q> {
    const fn without_data(outcome: Outcome) -> Self {
        Self {
            outcome,
            template: None,
            data: Vec::new(),
        }
    }

    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// The template that matched the reply.
    #[must_use]
    pub const fn template(&self) -> Option<&'q ResponseTemplate> {
        self.template
    }

    /// The received bytes (empty if nothing was received).
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The bytes of a field of the matched template.
    #[must_use]
    pub fn field(&self, kind: FieldKind) -> Option<&[u8]> {
        self.template?.extract(kind, &self.data)
    }

    /// The words of a field of the matched template.
    #[must_use]
    pub fn words(&self, kind: FieldKind) -> Option<Vec<Word>> {
        Some(self.template?.extract_words(kind, &self.data)?.collect())
    }
}

/// Runs queries over a shared transport, one exchange at a time.
///
/// The transport stays locked from sending the command until the reply is
/// classified, so concurrent callers never see each other's replies.
#[derive(Debug)]
pub struct Engine<T> {
    transport: Mutex<T>,
}

impl<T: Transport> Engine<T> {
    pub const fn new(transport: T) -> Self {
        Self {
            transport: Mutex::new(transport),
        }
    }

    /// Execute `query` and classify the reply.
    pub fn execute<'q>(&self, query: &'q Query) -> Reply<'q> {
        self.exchange(query, true)
    }

    /// Like [`Engine::execute`] but a missing reply is expected and not
    /// worth a warning.
    pub fn probe<'q>(&self, query: &'q Query) -> Reply<'q> {
        self.exchange(query, false)
    }

    /// Run `f` with exclusive access to the transport.
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn into_inner(self) -> T {
        self.transport
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        // A panic inside an exchange leaves the transport usable.
        self.transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn exchange<'q>(&self, query: &'q Query, warn_timeout: bool) -> Reply<'q> {
        let mut transport = self.lock();
        let payload = query.payload();

        if let Err(err) = transport.send(payload) {
            return failed(payload, &err, warn_timeout);
        }
        let responses = query.responses();
        if responses.is_empty() {
            return Reply::without_data(Outcome::Succeed);
        }
        let data = match transport.receive() {
            Ok(data) => data,
            Err(err) => return failed(payload, &err, warn_timeout),
        };

        for template in responses {
            match template.validate(&data) {
                Ok(()) => {
                    return Reply {
                        outcome: template.outcome(),
                        template: Some(template),
                        data,
                    };
                }
                Err(mismatch) => {
                    debug!("{:?} template rejected reply: {mismatch}", template.outcome());
                }
            }
        }
        warn!("Unknown reply {data:02X?} to command {payload:02X?}");
        Reply {
            outcome: Outcome::Unknown,
            template: None,
            data,
        }
    }
}

fn failed<'q>(payload: &[u8], err: &Error, warn_timeout: bool) -> Reply<'q> {
    let outcome = err.outcome();
    match outcome {
        Outcome::Timeout => {
            if warn_timeout {
                warn!("Timeout when executing command {payload:02X?}");
            }
        }
        _ => error!("Failed to execute command {payload:02X?}: {err}"),
    }
    Reply::without_data(outcome)
}
