use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::*;

fn serialized(pacing: Duration) -> ExecutionQueue {
	ExecutionQueue::new(QueueConfig {
		serialize: true,
		pacing,
		..QueueConfig::default()
	})
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn serialized_jobs_complete_in_submission_order() {
	let queue = serialized(Duration::from_millis(10));
	let order = Arc::new(Mutex::new(Vec::new()));

	let mut tickets = Vec::new();
	for i in 0..5u64 {
		let order = Arc::clone(&order);
		// Earlier jobs sleep longer, so any interleaving would reorder completions.
		let ticket = queue
			.submit(format!("job-{i}"), async move {
				tokio::time::sleep(Duration::from_millis(50 - i * 10)).await;
				order.lock().unwrap().push(i);
				Ok(())
			})
			.expect("queue open");
		tickets.push(ticket);
	}

	for ticket in tickets {
		assert_eq!(ticket.outcome().await, JobOutcome::Done);
	}
	assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn serialized_jobs_never_overlap() {
	let queue = serialized(Duration::ZERO);
	let active = Arc::new(Mutex::new(0usize));
	let max_seen = Arc::new(Mutex::new(0usize));

	let mut tickets = Vec::new();
	for i in 0..4 {
		let active = Arc::clone(&active);
		let max_seen = Arc::clone(&max_seen);
		tickets.push(
			queue
				.submit(format!("job-{i}"), async move {
					{
						let mut a = active.lock().unwrap();
						*a += 1;
						let mut m = max_seen.lock().unwrap();
						*m = (*m).max(*a);
					}
					tokio::time::sleep(Duration::from_millis(20)).await;
					*active.lock().unwrap() -= 1;
					Ok(())
				})
				.expect("queue open"),
		);
	}
	for ticket in tickets {
		ticket.outcome().await;
	}
	assert_eq!(*max_seen.lock().unwrap(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn pacing_separates_one_job_end_from_the_next_start() {
	let queue = serialized(Duration::from_millis(150));
	let spans = Arc::new(Mutex::new(Vec::new()));

	let mut tickets = Vec::new();
	for i in 0..3 {
		let spans = Arc::clone(&spans);
		tickets.push(
			queue
				.submit(format!("job-{i}"), async move {
					let start = tokio::time::Instant::now();
					tokio::time::sleep(Duration::from_millis(40)).await;
					spans.lock().unwrap().push((start, tokio::time::Instant::now()));
					Ok(())
				})
				.expect("queue open"),
		);
	}
	for ticket in tickets {
		assert_eq!(ticket.outcome().await, JobOutcome::Done);
	}

	let spans = spans.lock().unwrap().clone();
	assert_eq!(spans.len(), 3);
	for pair in spans.windows(2) {
		let idle = pair[1].0 - pair[0].1;
		assert!(idle >= Duration::from_millis(150), "next job started {idle:?} after the previous one ended");
	}
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn unserialized_jobs_run_immediately() {
	let queue = ExecutionQueue::new(QueueConfig {
		serialize: false,
		..QueueConfig::default()
	});
	let started = Arc::new(Mutex::new(0usize));

	let mut tickets = Vec::new();
	for i in 0..3 {
		let started = Arc::clone(&started);
		tickets.push(
			queue
				.submit(format!("job-{i}"), async move {
					*started.lock().unwrap() += 1;
					tokio::time::sleep(Duration::from_secs(1)).await;
					Ok(())
				})
				.expect("queue open"),
		);
	}

	assert_eq!(queue.pending_len(), 0);
	tokio::time::sleep(Duration::from_millis(1)).await;
	assert_eq!(*started.lock().unwrap(), 3, "all jobs should be in flight concurrently");

	for ticket in tickets {
		assert_eq!(ticket.outcome().await, JobOutcome::Done);
	}
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn failed_job_does_not_block_the_next() {
	let queue = serialized(Duration::from_millis(5));

	let failing = queue.submit("fails", async { Err("no targets".to_string()) }).expect("queue open");
	let panicking = queue.submit("panics", async { panic!("invoke blew up") }).expect("queue open");
	let ok = queue.submit("ok", async { Ok(()) }).expect("queue open");

	let (failing_id, panicking_id, ok_id) = (failing.id(), panicking.id(), ok.id());

	assert_eq!(failing.outcome().await, JobOutcome::Failed("no targets".into()));
	match panicking.outcome().await {
		JobOutcome::Failed(reason) => assert!(reason.contains("invoke blew up"), "got: {reason}"),
		other => panic!("expected failure, got {other:?}"),
	}
	assert_eq!(ok.outcome().await, JobOutcome::Done);

	assert_eq!(queue.state(failing_id), Some(JobState::Failed));
	assert_eq!(queue.state(panicking_id), Some(JobState::Failed));
	assert_eq!(queue.state(ok_id), Some(JobState::Done));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn job_states_progress_from_pending_to_done() {
	let queue = serialized(Duration::ZERO);
	let (release_tx, release_rx) = oneshot::channel::<()>();

	let first = queue
		.submit("first", async move {
			let _ = release_rx.await;
			Ok(())
		})
		.expect("queue open");
	let second = queue.submit("second", async { Ok(()) }).expect("queue open");
	let (first_id, second_id) = (first.id(), second.id());

	tokio::task::yield_now().await;
	tokio::task::yield_now().await;
	assert_eq!(queue.state(first_id), Some(JobState::Running));
	assert_eq!(queue.state(second_id), Some(JobState::Pending));

	release_tx.send(()).expect("first job waiting");
	assert_eq!(first.outcome().await, JobOutcome::Done);
	assert_eq!(second.outcome().await, JobOutcome::Done);
	assert_eq!(queue.state(second_id), Some(JobState::Done));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn drain_loop_is_idempotent() {
	let queue = serialized(Duration::ZERO);
	assert!(!queue.drain_loop(), "nothing pending");

	let (release_tx, release_rx) = oneshot::channel::<()>();
	let ticket = queue
		.submit("held", async move {
			let _ = release_rx.await;
			Ok(())
		})
		.expect("queue open");

	assert!(queue.is_draining());
	let _extra = queue.submit("next", async { Ok(()) }).expect("queue open");
	assert!(!queue.drain_loop(), "second drain while draining is a no-op");

	release_tx.send(()).expect("job waiting");
	assert_eq!(ticket.outcome().await, JobOutcome::Done);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn shutdown_drops_pending_and_rejects_new_jobs() {
	let queue = serialized(Duration::ZERO);
	let (release_tx, release_rx) = oneshot::channel::<()>();

	let running = queue
		.submit("running", async move {
			let _ = release_rx.await;
			Ok(())
		})
		.expect("queue open");
	let pending = queue.submit("pending", async { Ok(()) }).expect("queue open");
	tokio::task::yield_now().await;

	assert_eq!(queue.shutdown(), 1);
	assert_eq!(queue.shutdown(), 0, "shutdown is idempotent");
	assert_eq!(queue.submit("late", async { Ok(()) }).unwrap_err(), QueueError::Closed);

	release_tx.send(()).expect("job waiting");
	assert_eq!(running.outcome().await, JobOutcome::Done, "running job is not cancelled");
	assert_eq!(pending.outcome().await, JobOutcome::Dropped);
}
