use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::dispatch::ReminderEvent;
use crate::repository::{RepositoryError, ScheduleRepository};

/// Fixed wait before an unconfirmed step escalates to "missed".
pub const DWELL: Duration = Duration::from_secs(3);

/// Last step of the flow: awaiting, final attempt, no further escalation.
pub const FINAL_STEP: u8 = 4;

/// What the reminder screen renders for the current step. Even steps await
/// confirmation, odd steps show the missed indicator with the confirm
/// affordance withdrawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepView {
    pub step: u8,
    pub awaiting: bool,
    pub can_confirm: bool,
    pub hour: u32,
    pub minute: u32,
    pub message: String,
}

#[async_trait]
pub trait ConfirmationPresenter: Send + Sync + 'static {
    async fn show_step(&self, view: &StepView);
    async fn show_error(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Accepted, written back, session over. The session requests app exit.
    Completed,
    /// Attempted during a missed step; state is unchanged.
    NotAwaiting,
    /// The session has no bound schedule entry, so confirmation is disabled.
    /// Checked before any backend write is attempted.
    Unbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub step: u8,
    pub confirmed: bool,
}

enum SessionCommand {
    Confirm(oneshot::Sender<Result<ConfirmOutcome, RepositoryError>>),
    Inspect(oneshot::Sender<SessionStatus>),
}

/// One live on-screen reminder. Owns the dwell timer and the step counter;
/// everything is serialized through the session task, so a confirmation and
/// a timer-driven escalation can never race.
pub struct ConfirmationSession {
    commands: mpsc::Sender<SessionCommand>,
    teardown: CancellationToken,
    task: JoinHandle<()>,
}

impl ConfirmationSession {
    pub fn start(
        event: ReminderEvent,
        repository: Arc<dyn ScheduleRepository>,
        presenter: Arc<dyn ConfirmationPresenter>,
        exit: CancellationToken,
    ) -> Self {
        let (commands, receiver) = mpsc::channel(8);
        let teardown = CancellationToken::new();
        let state = SessionState {
            event,
            step: 0,
            confirmed: false,
            repository,
            presenter,
            exit,
        };

        let task_token = teardown.child_token();
        let task = tokio::spawn(async move {
            run(state, receiver, task_token).await;
        });

        Self {
            commands,
            teardown,
            task,
        }
    }

    /// Backend failures are retryable: the session stays in its current step
    /// and `confirmed` remains false.
    pub async fn confirm(&self) -> anyhow::Result<ConfirmOutcome> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::Confirm(reply))
            .await
            .map_err(|_| anyhow!("confirmation session already ended"))?;
        let result = response
            .await
            .map_err(|_| anyhow!("confirmation session already ended"))?;
        Ok(result?)
    }

    pub async fn status(&self) -> anyhow::Result<SessionStatus> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SessionCommand::Inspect(reply))
            .await
            .map_err(|_| anyhow!("confirmation session already ended"))?;
        response
            .await
            .map_err(|_| anyhow!("confirmation session already ended"))
    }

    /// Tears the session down, cancelling any pending dwell timer so no
    /// transition leaks into a dead session.
    pub async fn shutdown(self) {
        self.teardown.cancel();
        let _ = time::timeout(Duration::from_secs(5), self.task).await;
    }
}

struct SessionState {
    event: ReminderEvent,
    step: u8,
    confirmed: bool,
    repository: Arc<dyn ScheduleRepository>,
    presenter: Arc<dyn ConfirmationPresenter>,
    exit: CancellationToken,
}

impl SessionState {
    fn awaiting(&self) -> bool {
        self.step % 2 == 0
    }

    fn view(&self) -> StepView {
        StepView {
            step: self.step,
            awaiting: self.awaiting(),
            can_confirm: self.awaiting() && self.event.schedule_id.is_some(),
            hour: self.event.hour,
            minute: self.event.minute,
            message: self.event.message.clone(),
        }
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            step: self.step,
            confirmed: self.confirmed,
        }
    }

    /// Returns the reply for the caller and whether the session is over.
    async fn handle_confirm(&mut self) -> (Result<ConfirmOutcome, RepositoryError>, bool) {
        if !self.awaiting() {
            return (Ok(ConfirmOutcome::NotAwaiting), false);
        }
        let Some(schedule_id) = self.event.schedule_id else {
            log::warn!("Confirm attempted on a session with no bound schedule entry.");
            return (Ok(ConfirmOutcome::Unbound), false);
        };

        match self.repository.complete_entry(schedule_id).await {
            Ok(()) => {
                self.confirmed = true;
                log::info!("Reminder confirmed. [schedule_id = {schedule_id}]");
                self.exit.cancel();
                (Ok(ConfirmOutcome::Completed), true)
            }
            Err(error) => {
                self.presenter
                    .show_error(&format!("일정 완료 처리에 실패했습니다. ({error})"))
                    .await;
                (Err(error), false)
            }
        }
    }
}

async fn run(
    mut state: SessionState,
    mut commands: mpsc::Receiver<SessionCommand>,
    teardown: CancellationToken,
) {
    let mut deadline = Instant::now() + DWELL;
    state.presenter.show_step(&state.view()).await;

    loop {
        tokio::select! {
            _ = teardown.cancelled() => break,
            _ = time::sleep_until(deadline), if state.step < FINAL_STEP => {
                state.step += 1;
                // The dwell restarts on every entry into a new step.
                deadline = Instant::now() + DWELL;
                state.presenter.show_step(&state.view()).await;
            }
            command = commands.recv() => match command {
                None => break,
                Some(SessionCommand::Inspect(reply)) => {
                    let _ = reply.send(state.status());
                }
                Some(SessionCommand::Confirm(reply)) => {
                    let (result, finished) = state.handle_confirm().await;
                    let _ = reply.send(result);
                    if finished {
                        break;
                    }
                }
            }
        }
    }
}
