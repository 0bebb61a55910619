use markdownreveal::scheduler::{TimerState, Trigger, DEFAULT_PERIOD};
use markdownreveal::RegenerationScheduler;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn counting_scheduler(period: Duration, job_time: Duration) -> (RegenerationScheduler, Arc<AtomicUsize>) {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let scheduler = RegenerationScheduler::new(period, move || {
        thread::sleep(job_time);
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (scheduler, runs)
}

#[test]
fn test_default_period() {
    assert_eq!(DEFAULT_PERIOD, Duration::from_millis(100));
    let (scheduler, _) = counting_scheduler(DEFAULT_PERIOD, Duration::ZERO);
    assert_eq!(scheduler.period(), DEFAULT_PERIOD);
    assert_eq!(scheduler.state(), TimerState::Idle);
}

#[test]
fn test_burst_runs_once() {
    let (scheduler, runs) = counting_scheduler(Duration::from_millis(100), Duration::ZERO);

    assert_eq!(scheduler.trigger(), Trigger::Armed);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(scheduler.trigger(), Trigger::Rearmed);
    thread::sleep(Duration::from_millis(30));
    assert_eq!(scheduler.trigger(), Trigger::Rearmed);

    thread::sleep(Duration::from_millis(400));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.state(), TimerState::Idle);
}

#[test]
fn test_isolated_events_run_twice() {
    let (scheduler, runs) = counting_scheduler(Duration::from_millis(100), Duration::ZERO);

    assert_eq!(scheduler.trigger(), Trigger::Armed);
    thread::sleep(Duration::from_millis(300));
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    assert_eq!(scheduler.trigger(), Trigger::Armed);
    thread::sleep(Duration::from_millis(300));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_nothing_runs_before_quiet_period() {
    let (scheduler, runs) = counting_scheduler(Duration::from_millis(300), Duration::ZERO);

    scheduler.trigger();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.state(), TimerState::Armed);
}

#[test]
fn test_events_while_running_are_dropped() {
    let (scheduler, runs) =
        counting_scheduler(Duration::from_millis(50), Duration::from_millis(400));

    scheduler.trigger();
    thread::sleep(Duration::from_millis(200));
    assert_eq!(scheduler.state(), TimerState::Running);
    assert_eq!(scheduler.trigger(), Trigger::Dropped);

    thread::sleep(Duration::from_millis(600));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.state(), TimerState::Idle);
}

#[test]
fn test_jobs_never_overlap() {
    let active = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let (job_active, job_overlaps) = (Arc::clone(&active), Arc::clone(&overlaps));
    let scheduler = RegenerationScheduler::new(Duration::from_millis(10), move || {
        if job_active.fetch_add(1, Ordering::SeqCst) > 0 {
            job_overlaps.fetch_add(1, Ordering::SeqCst);
        }
        thread::sleep(Duration::from_millis(30));
        job_active.fetch_sub(1, Ordering::SeqCst);
    });

    for _ in 0..20 {
        scheduler.trigger();
        thread::sleep(Duration::from_millis(7));
    }
    thread::sleep(Duration::from_millis(200));
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
}

#[test]
fn test_stop_cancels_pending_timer() {
    let (scheduler, runs) = counting_scheduler(Duration::from_millis(100), Duration::ZERO);

    scheduler.trigger();
    scheduler.stop();
    assert_eq!(scheduler.state(), TimerState::Stopped);
    assert_eq!(scheduler.trigger(), Trigger::Dropped);

    thread::sleep(Duration::from_millis(300));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_panicking_job_does_not_stall_later_runs() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let scheduler = RegenerationScheduler::new(Duration::from_millis(50), move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("first regeneration fails");
        }
    });

    assert_eq!(scheduler.trigger(), Trigger::Armed);
    thread::sleep(Duration::from_millis(300));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.state(), TimerState::Idle);

    assert_eq!(scheduler.trigger(), Trigger::Armed);
    thread::sleep(Duration::from_millis(300));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(scheduler.state(), TimerState::Idle);
}
