mod appsettings;
mod confirmation;
mod context;
mod dispatch;
mod location;
mod notifier;
mod push;
mod repository;
mod resolver;
mod schedule;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::appsettings::DayBoundary;
use crate::confirmation::{ConfirmOutcome, ConfirmationPresenter, ConfirmationSession, StepView};
use crate::context::{TodaySnapshot, UserContext};
use crate::dispatch::{ReminderBridge, ReminderEvent, Route};
use crate::location::{LocationReporter, StaticPositionSource, spawn_location_poller};
use crate::notifier::{AlwaysGranted, LocalNotifier, NotifyError};
use crate::push::{InProcessPushChannel, PushChannel, PushDelivery, PushPayload};
use crate::repository::{HttpScheduleService, ScheduleRepository, UserId};
use crate::resolver::resolve_next;
use crate::schedule::{ScheduleId, next_day_boundary};

/// Console rendering of the reminder screen.
struct ConsolePresenter;

#[async_trait]
impl ConfirmationPresenter for ConsolePresenter {
    async fn show_step(&self, view: &StepView) {
        if view.awaiting {
            log::info!(
                "[{:02}:{:02}] {} (확인 대기 중, step {})",
                view.hour,
                view.minute,
                view.message,
                view.step
            );
            if !view.can_confirm {
                log::info!("일정 정보를 알 수 없어 확인이 비활성화되었습니다.");
            }
        } else {
            log::info!("알림을 놓쳤습니다. 잠시 후 다시 안내합니다. (step {})", view.step);
        }
    }

    async fn show_error(&self, message: &str) {
        log::error!("{message}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init_timed();

    let settings = appsettings::get();
    let user = UserContext {
        user_id: settings.user.id,
        user_name: settings.user.name.clone(),
    };
    log::info!("Starting reminder loop. [user = {}]", user.user_name);

    let backend = Arc::new(HttpScheduleService::new(settings.backend.base_url.clone()));
    let repository: Arc<dyn ScheduleRepository> = backend.clone();
    let snapshot = Arc::new(TodaySnapshot::new());
    refresh_snapshot(repository.as_ref(), &snapshot, user.user_id).await;

    let (bridge, mut routes) = ReminderBridge::new();

    let notifier = LocalNotifier::new(Box::new(AlwaysGranted), bridge.clone());
    match notifier.configure() {
        Ok(()) => reschedule_local_reminder(&notifier, &snapshot).await,
        Err(NotifyError::PermissionDenied) => {
            log::warn!("Continuing with push reminders only.");
        }
    }

    let pushes = InProcessPushChannel::new();
    let _subscription = pushes.subscribe(bridge.push_handler());
    if let Some(initial) = pushes.take_initial() {
        bridge.handle_push(PushDelivery::Initial, initial)?;
    }

    let shutdown = CancellationToken::new();
    let position_source = Arc::new(StaticPositionSource::new(
        settings.location.latitude,
        settings.location.longitude,
    ));
    let poller = spawn_location_poller(
        position_source,
        backend.clone() as Arc<dyn LocationReporter>,
        user.user_id,
        Duration::from_secs(settings.location.poll_interval_secs),
        shutdown.child_token(),
    );

    let presenter: Arc<dyn ConfirmationPresenter> = Arc::new(ConsolePresenter);
    let mut active: Option<ConfirmationSession> = None;
    let mut active_id: Option<ScheduleId> = None;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let refresh_in = match settings.schedule.day_boundary {
            DayBoundary::LocalMidnight => {
                let now = Local::now().naive_local();
                (next_day_boundary(now) - now)
                    .to_std()
                    .unwrap_or(Duration::from_secs(1))
            }
            // Never polled; the backend owns the day.
            DayBoundary::ServerDay => Duration::from_secs(365 * 24 * 60 * 60),
        };

        tokio::select! {
            _ = shutdown.cancelled() => {
                log::info!("Reminder confirmed; backgrounding the app.");
                break;
            }
            _ = time::sleep(refresh_in), if settings.schedule.day_boundary == DayBoundary::LocalMidnight => {
                log::info!("Day boundary passed; refreshing today's schedule.");
                refresh_snapshot(repository.as_ref(), &snapshot, user.user_id).await;
                notifier.cancel_all().await;
                reschedule_local_reminder(&notifier, &snapshot).await;
            }
            route = routes.recv() => match route {
                None => break,
                Some(Route::TodayCheck(event)) => {
                    if let Some(previous) = active.take() {
                        previous.shutdown().await;
                    }
                    active_id = event.schedule_id;
                    active = Some(ConfirmationSession::start(
                        event,
                        repository.clone(),
                        presenter.clone(),
                        shutdown.clone(),
                    ));
                }
                Some(Route::EmotionCheck) => {
                    log::info!("Handing off to the mood check-in flow.");
                }
            },
            line = lines.next_line() => match line? {
                None => break,
                Some(line) => {
                    let keep_running = handle_command(
                        line.trim(),
                        &bridge,
                        &pushes,
                        &snapshot,
                        &mut active,
                        active_id,
                    )
                    .await?;
                    if !keep_running {
                        break;
                    }
                }
            },
        }
    }

    if let Some(session) = active.take() {
        session.shutdown().await;
    }
    shutdown.cancel();
    let _ = poller.await;
    Ok(())
}

/// Console commands standing in for the screen's buttons: `check` is the
/// in-app schedule check, `confirm` the reminder confirmation, a JSON line
/// simulates a foreground push delivery.
async fn handle_command(
    line: &str,
    bridge: &ReminderBridge,
    pushes: &InProcessPushChannel,
    snapshot: &TodaySnapshot,
    active: &mut Option<ConfirmationSession>,
    active_id: Option<ScheduleId>,
) -> anyhow::Result<bool> {
    match line {
        "" => {}
        "exit" | "quit" => return Ok(false),
        "check" => {
            let entries = snapshot.entries().await;
            if !bridge.check_schedule(&entries, Local::now().naive_local())? {
                log::info!("오늘 남은 일정이 없습니다.");
            }
        }
        "confirm" => match active.as_ref() {
            None => log::info!("표시 중인 알림이 없습니다."),
            Some(session) => match session.confirm().await {
                Ok(ConfirmOutcome::Completed) => {
                    if let Some(schedule_id) = active_id {
                        snapshot.mark_completed(schedule_id).await;
                    }
                }
                Ok(ConfirmOutcome::NotAwaiting) => {
                    log::info!("놓친 알림 상태에서는 확인할 수 없습니다.");
                }
                Ok(ConfirmOutcome::Unbound) => {
                    log::info!("일정 정보가 없어 확인할 수 없습니다.");
                }
                Err(error) => {
                    log::error!("확인 처리에 실패했습니다. 다시 시도해 주세요. [error = {error}]");
                }
            },
        },
        json if json.starts_with('{') => match serde_json::from_str::<PushPayload>(json) {
            Ok(payload) => pushes.publish(PushDelivery::Foreground, payload),
            Err(error) => log::warn!("Ignoring malformed push payload. [error = {error}]"),
        },
        other => log::info!("Unknown command. [input = {other}]"),
    }
    Ok(true)
}

async fn refresh_snapshot(
    repository: &dyn ScheduleRepository,
    snapshot: &TodaySnapshot,
    user_id: UserId,
) {
    match repository.fetch_today(user_id).await {
        Ok(entries) => {
            log::info!("Fetched today's schedule. [count = {}]", entries.len());
            snapshot.replace(entries).await;
        }
        Err(error) => {
            log::error!("일정을 불러오는데 실패했습니다. [error = {error}]");
        }
    }
}

async fn reschedule_local_reminder(notifier: &LocalNotifier, snapshot: &TodaySnapshot) {
    let entries = snapshot.entries().await;
    match resolve_next(&entries, Local::now().naive_local()) {
        Some(entry) => {
            let event = ReminderEvent::for_entry(entry);
            notifier.schedule_daily(event.hour, event.minute, &event.message);
        }
        None => log::info!("No remaining schedule today; no local reminder scheduled."),
    }
}
