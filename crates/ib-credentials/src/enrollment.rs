// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Launch contract between the broker and the external enrollment flow

use crate::{
    error::{Error, Result},
    store::CredentialStore,
    types::{IdentityRecord, Secret},
    validation::{validate_identity_name, validate_secret},
};
use tokio::sync::oneshot;

/// Final state of an enrollment, as observed by the host that requested it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentResult {
    Enrolled(IdentityRecord),
    Cancelled,
}

/// Handle the enrollment flow must resolve when it finishes
///
/// Dropping an unresolved handle resolves it as [`EnrollmentResult::Cancelled`].
#[derive(Debug)]
pub struct EnrollmentResponse {
    reply: Option<oneshot::Sender<EnrollmentResult>>,
}

impl EnrollmentResponse {
    fn resolve(&mut self, result: EnrollmentResult) {
        if let Some(reply) = self.reply.take() {
            // The host may have stopped waiting; that is not our concern
            let _ = reply.send(result);
        }
    }
}

impl Drop for EnrollmentResponse {
    fn drop(&mut self) {
        self.resolve(EnrollmentResult::Cancelled);
    }
}

/// Host-side view of a pending enrollment
#[derive(Debug)]
pub struct EnrollmentCompletion {
    rx: oneshot::Receiver<EnrollmentResult>,
}

impl EnrollmentCompletion {
    /// Wait until the enrollment flow resolves its response handle
    pub async fn wait(self) -> EnrollmentResult {
        self.rx.await.unwrap_or(EnrollmentResult::Cancelled)
    }

    /// The result if the flow has already finished
    pub fn try_result(&mut self) -> Option<EnrollmentResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(EnrollmentResult::Cancelled),
        }
    }
}

/// Create a response handle and the completion the host waits on
pub fn enrollment_channel() -> (EnrollmentResponse, EnrollmentCompletion) {
    let (tx, rx) = oneshot::channel();
    (
        EnrollmentResponse { reply: Some(tx) },
        EnrollmentCompletion { rx },
    )
}

/// Why the broker refused to start an enrollment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    AlreadyEnrolled,
}

/// Result of asking the broker to add an identity
#[derive(Debug)]
pub enum EnrollmentOutcome {
    /// Start the enrollment flow with these parameters
    Launch(EnrollmentLaunch),
    Cancelled { reason: CancelReason },
}

impl EnrollmentOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EnrollmentOutcome::Cancelled { .. })
    }
}

/// Parameters handed to the enrollment flow
#[derive(Debug)]
pub struct EnrollmentLaunch {
    /// Token type the host originally asked for
    pub token_type: String,
    /// Account type the new identity will carry
    pub account_type: String,
    pub response: EnrollmentResponse,
}

impl EnrollmentLaunch {
    /// Finish enrollment by creating the single identity record
    ///
    /// The singleton invariant is checked again here because another flow may
    /// have enrolled since the launch was issued. On any error the response is
    /// resolved as cancelled.
    pub fn complete(
        mut self,
        store: &dyn CredentialStore,
        name: &str,
        secret: Secret,
    ) -> Result<IdentityRecord> {
        validate_identity_name(name)?;
        validate_secret(&secret)?;

        if let Some(existing) = store.list_identities(&self.account_type)?.into_iter().next() {
            return Err(Error::AlreadyEnrolled(existing.name));
        }

        let record = IdentityRecord::new(name, self.account_type.as_str());
        store.add_identity(record.clone(), secret)?;
        tracing::info!(identity = name, "Enrolled identity");

        self.response.resolve(EnrollmentResult::Enrolled(record.clone()));
        Ok(record)
    }

    /// Abandon the enrollment
    pub fn cancel(self) {
        tracing::debug!("Enrollment cancelled by flow");
    }
}
