//! Cloneable front end for the controller task.
//!
//! Every [`ControllerHandle`] method sends one [`Command`] over the
//! controller's inbox and waits for its reply, so calls from any task are
//! serialized with engine events on the controller's single logical thread.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::config::SessionConfigPatch;
use crate::pronunciation::PronunciationConverter;

use super::errors::SessionError;
use super::state::SessionStatus;

/// Requests understood by the controller task.
pub(crate) enum Command {
    Start(oneshot::Sender<Result<(), SessionError>>),
    Stop(oneshot::Sender<()>),
    ChangeLanguage(String, oneshot::Sender<()>),
    SetConverter(
        Option<Arc<dyn PronunciationConverter>>,
        oneshot::Sender<()>,
    ),
    UpdateConfig(SessionConfigPatch, oneshot::Sender<()>),
    Status(oneshot::Sender<SessionStatus>),
    Destroy(oneshot::Sender<()>),
}

/// Handle used by the application to drive a running controller.
///
/// Dropping every handle shuts the controller down.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Command>,
}

impl ControllerHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| SessionError::ControllerClosed)?;
        reply_rx.await.map_err(|_| SessionError::ControllerClosed)
    }

    /// Start listening.  Idempotent while active or starting.
    ///
    /// # Errors
    ///
    /// [`SessionError::EngineUnavailable`] when the platform has no
    /// recognition capability.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.request(Command::Start).await?
    }

    /// Stop listening and suppress auto-restart.  Idempotent.
    pub async fn stop(&self) -> Result<(), SessionError> {
        self.request(Command::Stop).await
    }

    /// Switch the recognition language, keeping the running/stopped state.
    pub async fn change_language(&self, code: impl Into<String>) -> Result<(), SessionError> {
        let code = code.into();
        self.request(|tx| Command::ChangeLanguage(code, tx)).await
    }

    /// Install or remove (`None`) the pronunciation converter.
    pub async fn set_pronunciation_converter(
        &self,
        converter: Option<Arc<dyn PronunciationConverter>>,
    ) -> Result<(), SessionError> {
        self.request(|tx| Command::SetConverter(converter, tx)).await
    }

    /// Merge runtime-tunable timing parameters.
    pub async fn update_config(&self, patch: SessionConfigPatch) -> Result<(), SessionError> {
        self.request(|tx| Command::UpdateConfig(patch, tx)).await
    }

    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        self.request(Command::Status).await
    }

    /// Stop and release the engine handle.  Safe to call repeatedly.
    pub async fn destroy(&self) -> Result<(), SessionError> {
        self.request(Command::Destroy).await
    }
}
