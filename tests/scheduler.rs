use repovista::{
	host::ManualFrameHost,
	scheduler::{Priority, Scheduler, SchedulerConfig},
};
use std::{cell::RefCell, rc::Rc};

fn scheduler() -> (Rc<ManualFrameHost>, Scheduler<ManualFrameHost>) {
	let host = Rc::new(ManualFrameHost::new());
	let scheduler = Scheduler::new(Rc::clone(&host), SchedulerConfig::default());
	(host, scheduler)
}

fn recorder() -> (Rc<RefCell<Vec<i32>>>, impl Fn(i32) + Clone) {
	let log = Rc::new(RefCell::new(Vec::new()));
	let record = {
		let log = Rc::clone(&log);
		move |value: i32| log.borrow_mut().push(value)
	};
	(log, record)
}

#[test]
fn priority_descending() {
	let (host, scheduler) = scheduler();
	let (log, record) = recorder();

	for priority in [1, 5, 3] {
		scheduler.schedule(record.clone(), priority, priority.into());
	}
	assert!(log.borrow().is_empty(), "Nothing runs before a frame.");
	assert_eq!(host.pending_frames(), 1, "One frame request covers all tasks.");

	host.run_frame();
	assert_eq!(*log.borrow(), [5, 3, 1]);
	assert!(scheduler.is_idle());
}

#[test]
fn fifo_within_priority() {
	let (host, scheduler) = scheduler();
	let (log, record) = recorder();

	scheduler.schedule(record.clone(), 1, Priority::NORMAL);
	scheduler.schedule(record.clone(), 2, Priority::HIGH);
	scheduler.schedule(record.clone(), 3, Priority::NORMAL);
	scheduler.schedule(record.clone(), 4, Priority::HIGH);
	scheduler.schedule(record, 5, Priority::LOW);

	host.run_frame();
	assert_eq!(*log.borrow(), [2, 4, 1, 3, 5]);
}

#[test]
fn frame_budget() {
	let (host, scheduler) = scheduler();
	// Every clock reading takes 0.1ms.
	host.set_tick(0.1);

	let (log, record) = recorder();
	for i in 0..1000 {
		scheduler.schedule(record.clone(), i, Priority::NORMAL);
	}

	let mut frames = 0;
	while !scheduler.is_idle() {
		let start = host.peek();
		let done_before = log.borrow().len();
		assert_eq!(host.run_frame(), 1);
		frames += 1;

		let elapsed = host.peek() - start;
		assert!(elapsed <= 16.0 + 1.0, "Frame {} ran for {}ms.", frames, elapsed);
		assert!(log.borrow().len() > done_before, "Every frame makes progress.");
		host.advance(16.0);
	}

	assert!(frames > 1, "1000 tasks shouldn't fit into one frame here.");
	assert_eq!(*log.borrow(), (0..1000).collect::<Vec<_>>());

	let metrics = scheduler.get_metrics();
	assert_eq!(metrics.frames, frames);
	assert_eq!(metrics.tasks_run, 1000);
	assert_eq!(metrics.queue_depth, 0);
	assert!(metrics.max_render_ms <= 17.0);
	assert!(metrics.average_render_ms > 0.0);
}

#[test]
fn cancel_before_run() {
	let (host, scheduler) = scheduler();
	let (log, record) = recorder();

	let first = scheduler.schedule(record.clone(), 1, Priority::NORMAL);
	scheduler.schedule(record, 2, Priority::NORMAL);
	assert!(scheduler.cancel(first));
	assert!(!scheduler.cancel(first), "Cancelling twice finds nothing.");

	host.run_frame();
	assert_eq!(*log.borrow(), [2]);
}

#[test]
fn cancelling_the_last_task_cancels_the_frame() {
	let (host, scheduler) = scheduler();
	let id = scheduler.schedule(|()| (), (), Priority::NORMAL);
	assert_eq!(host.pending_frames(), 1);
	assert!(scheduler.cancel(id));
	assert_eq!(host.pending_frames(), 0);
}

#[test]
fn clear_discards_everything() {
	let (host, scheduler) = scheduler();
	let (log, record) = recorder();
	for i in 0..10 {
		scheduler.schedule(record.clone(), i, Priority::NORMAL);
	}

	scheduler.clear();
	assert_eq!(host.pending_frames(), 0);
	assert_eq!(host.run_until_idle(16.0, 10), 0);
	assert!(log.borrow().is_empty());
	assert_eq!(scheduler.get_metrics().queue_depth, 0);

	// Still usable afterwards.
	scheduler.schedule(record, 42, Priority::NORMAL);
	host.run_frame();
	assert_eq!(*log.borrow(), [42]);
}

#[test]
fn failing_task_does_not_stop_the_pump() {
	let (host, scheduler) = scheduler();
	let (log, record) = recorder();

	scheduler.schedule(record.clone(), 1, Priority::HIGH);
	scheduler.schedule(|()| panic!("task failure"), (), Priority::NORMAL);
	scheduler.schedule(record, 2, Priority::LOW);

	host.run_frame();
	assert_eq!(*log.borrow(), [1, 2]);
	let metrics = scheduler.get_metrics();
	assert_eq!(metrics.tasks_run, 2);
	assert_eq!(metrics.tasks_failed, 1);
}

#[test]
fn tasks_may_schedule_more_work() {
	let (host, scheduler) = scheduler();
	let (log, record) = recorder();

	let inner = scheduler.clone();
	scheduler.schedule(
		move |record: Box<dyn Fn(i32)>| {
			record(1);
			inner.schedule(record, 2, Priority::NORMAL);
		},
		Box::new(record) as Box<dyn Fn(i32)>,
		Priority::NORMAL,
	);

	assert_eq!(host.run_until_idle(16.0, 10), 1, "Work queued during a frame runs in the same frame while budget remains.");
	assert_eq!(*log.borrow(), [1, 2]);
}

#[test]
fn fps_sampling() {
	let host = Rc::new(ManualFrameHost::new());
	let scheduler = Scheduler::new(
		Rc::clone(&host),
		SchedulerConfig {
			sample_frames: 10,
			..SchedulerConfig::default()
		},
	);

	// Keep the queue busy so that sampling isn't reset, one task per frame.
	host.set_tick(10.0);
	for i in 0..40 {
		scheduler.schedule(|_: i32| (), i, Priority::NORMAL);
	}
	let frames = host.run_until_idle(1000.0 / 30.0, 100);
	assert!(frames >= 10);

	let metrics = scheduler.get_metrics();
	assert!(metrics.fps > 0.0);
	assert!(metrics.dropped_frames > 0, "Frames arrive at 30 Hz, so about half of the expected 60 Hz frames are dropped.");
}
