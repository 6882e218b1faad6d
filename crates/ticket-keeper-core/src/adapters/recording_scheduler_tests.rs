use super::*;
use crate::lifecycle::FollowUpStep;
use crate::Timestamp;

fn task(id: &TicketId, index: usize, status: &str, delay: u32) -> ScheduledTransition {
    let created = Timestamp::from_rfc3339("2026-02-02T10:00:00Z").unwrap();
    ScheduledTransition::for_step(id, index, &FollowUpStep::new(delay, status), created)
}

#[tokio::test]
async fn test_task_name_and_run_time() {
    let id = TicketId::new("INC-0A0B0C0D").unwrap();
    let t = task(&id, 1, "in_progress", 7);

    assert_eq!(t.task_name, "INC-0A0B0C0D-1-in_progress");
    assert_eq!(t.run_at, Timestamp::from_rfc3339("2026-02-02T10:07:00Z").unwrap());
}

#[tokio::test]
async fn test_duplicate_task_name_rejected() {
    let scheduler = RecordingScheduler::new();
    let id = TicketId::new("INC-0A0B0C0D").unwrap();

    scheduler.schedule(&task(&id, 0, "assigned", 5)).await.unwrap();
    let err = scheduler
        .schedule(&task(&id, 0, "assigned", 5))
        .await
        .unwrap_err();

    assert!(matches!(err, SchedulerError::AlreadyScheduled { .. }));
    assert!(!err.is_transient());
    assert_eq!(scheduler.tasks().len(), 1);
}

#[tokio::test]
async fn test_removed_task_can_be_rescheduled() {
    let scheduler = RecordingScheduler::new();
    let id = TicketId::new("INC-0A0B0C0D").unwrap();
    let t = task(&id, 0, "assigned", 5);

    scheduler.schedule(&t).await.unwrap();
    scheduler.remove(&t.task_name);
    scheduler.schedule(&t).await.unwrap();

    assert_eq!(scheduler.tasks_for(&id).len(), 1);
}
