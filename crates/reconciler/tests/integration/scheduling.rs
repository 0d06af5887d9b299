use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use weft_reconciler::{Element, Lanes, Payload, ReconcilerConfig, RootPhase};
use weft_scheduler::{Priority, PriorityTimeouts, SchedulerConfig};

use crate::common::{Harness, Slow, text};

fn slow_tree(h: &Harness, label: &str) -> Element {
	Element::fragment([Element::component(Slow { clock: h.clock.clone() }), text(label)])
}

#[test]
fn test_render_yields_and_resumes() {
	let h = Harness::new();
	h.root.render(slow_tree(&h, "done")).unwrap();

	let outcome = h.scheduler.flush().unwrap();
	assert!(outcome.has_more_work);
	assert_eq!(h.root.phase().unwrap(), RootPhase::Rendering(Lanes::DEFAULT));
	assert_eq!(h.html(), "");

	h.flush();
	assert_eq!(h.html(), "done");
	let profiles = h.profiles();
	assert_eq!(profiles.len(), 1);
	assert_eq!(profiles[0].yields, 1);
	assert_eq!(profiles[0].restarts, 0);
}

#[test]
fn test_urgent_update_commits_before_interrupted_render() {
	let h = Harness::new();
	let order = Rc::new(RefCell::new(Vec::new()));

	let log = Rc::clone(&order);
	h.root
		.request_update_with(Lanes::DEFAULT, Payload::Replace(slow_tree(&h, "x")), move || log.borrow_mut().push("x"))
		.unwrap();
	h.scheduler.flush().unwrap();
	assert_eq!(h.root.phase().unwrap(), RootPhase::Rendering(Lanes::DEFAULT));

	let log = Rc::clone(&order);
	h.root
		.request_update_with(Lanes::INPUT_CONTINUOUS, Payload::Replace(slow_tree(&h, "y")), move || {
			log.borrow_mut().push("y")
		})
		.unwrap();
	h.flush();

	assert_eq!(*order.borrow(), vec!["y", "x"]);
	assert_eq!(h.html(), "y");
	let profiles = h.profiles();
	assert_eq!(profiles.len(), 2);
	assert_eq!(profiles[0].lanes, Lanes::INPUT_CONTINUOUS);
	assert_eq!(profiles[0].restarts, 1);
	assert_eq!(profiles[1].lanes, Lanes::DEFAULT);
}

#[test]
fn test_update_during_render_stays_pending() {
	let h = Harness::new();
	h.root.render(slow_tree(&h, "first")).unwrap();
	h.scheduler.flush().unwrap();

	h.root.render(slow_tree(&h, "second")).unwrap();
	assert_eq!(h.root.phase().unwrap(), RootPhase::Rendering(Lanes::DEFAULT));
	h.flush();

	assert_eq!(h.html(), "second");
	let profiles = h.profiles();
	assert_eq!(profiles.len(), 2);
	assert!(profiles.iter().all(|profile| profile.lanes == Lanes::DEFAULT));
}

#[test]
fn test_scheduler_timeout_finishes_render_without_yielding() {
	let scheduler_config = SchedulerConfig {
		timeouts: PriorityTimeouts {
			normal: Duration::from_millis(25),
			..PriorityTimeouts::default()
		},
		..SchedulerConfig::default()
	};
	let h = Harness::with_configs(ReconcilerConfig::default(), scheduler_config);
	let slow = (0..6).map(|_| Element::component(Slow { clock: h.clock.clone() }));
	h.root.render(Element::fragment(slow.chain([text("end")]))).unwrap();

	h.flush();
	assert_eq!(h.html(), "end");
	let profiles = h.profiles();
	assert_eq!(profiles.len(), 1);
	assert_eq!(profiles[0].yields, 3);
}

#[test]
fn test_starved_lane_is_promoted_to_immediate() {
	let config = ReconcilerConfig {
		default_timeout: Duration::from_millis(20),
		..ReconcilerConfig::default()
	};
	let h = Harness::with_config(config);
	h.root.render(slow_tree(&h, "default")).unwrap();
	h.scheduler.flush().unwrap();

	h.clock.advance(Duration::from_millis(30));
	h.root.request_update(Lanes::IDLE, Payload::Replace(text("idle"))).unwrap();
	let lanes = h.root.lanes().unwrap();
	assert!(lanes.expired().contains(Lanes::DEFAULT));

	h.flush();
	assert_eq!(h.html(), "idle");
	let profiles = h.profiles();
	assert_eq!(profiles[0].lanes, Lanes::DEFAULT);
	assert_eq!(profiles[0].yields, 1);
	assert_eq!(profiles.last().map(|profile| profile.lanes), Some(Lanes::IDLE));
	assert!(h.root.lanes().unwrap().expired().is_empty());
}

#[test]
fn test_lane_expiring_mid_render_stops_yielding() {
	let config = ReconcilerConfig {
		default_timeout: Duration::from_millis(20),
		..ReconcilerConfig::default()
	};
	let h = Harness::with_config(config);
	let slow = (0..10).map(|_| Element::component(Slow { clock: h.clock.clone() }));
	h.root.render(Element::fragment(slow.chain([text("end")]))).unwrap();

	let mut slices = 0;
	loop {
		slices += 1;
		if !h.scheduler.flush().unwrap().has_more_work {
			break;
		}
		assert!(slices < 10, "render kept yielding past its deadline");
	}

	assert_eq!(slices, 2);
	assert_eq!(h.html(), "end");
	let profiles = h.profiles();
	assert_eq!(profiles.len(), 1);
	assert_eq!(profiles[0].yields, 2);
	assert!(h.root.lanes().unwrap().expired().is_empty());
	assert_eq!(h.scheduler.pending_count(), 0);
}

#[test]
fn test_time_slicing_disabled_renders_in_one_slice() {
	let config = ReconcilerConfig {
		time_slicing: false,
		..ReconcilerConfig::default()
	};
	let h = Harness::with_config(config);
	h.root.render(slow_tree(&h, "done")).unwrap();

	let outcome = h.scheduler.flush().unwrap();
	assert!(!outcome.has_more_work);
	assert_eq!(h.html(), "done");
	assert_eq!(h.profiles()[0].yields, 0);
}

#[test]
fn test_request_lane_claims_distinct_transitions() {
	let h = Harness::new();
	assert_eq!(h.root.request_lane(Priority::Immediate).unwrap(), Lanes::SYNC);
	assert_eq!(h.root.request_lane(Priority::Normal).unwrap(), Lanes::DEFAULT);
	let first = h.root.request_lane(Priority::Low).unwrap();
	let second = h.root.request_lane(Priority::Low).unwrap();
	assert_ne!(first, second);
	assert!(Lanes::TRANSITIONS.contains(first | second));
}

#[test]
fn test_batched_transitions_commit_together() {
	let h = Harness::new();
	let batch = h
		.root
		.batch_transitions([Payload::Replace(text("a")), Payload::Replace(text("b"))])
		.unwrap();
	assert_eq!(batch.bits().count_ones(), 2);
	assert_eq!(h.root.lanes().unwrap().entangled(), batch);

	h.flush();
	assert_eq!(h.html(), "b");
	let profiles = h.profiles();
	assert_eq!(profiles.len(), 1);
	assert_eq!(profiles[0].lanes, batch);
	assert!(h.root.lanes().unwrap().entangled().is_empty());
}

#[test]
fn test_dropping_root_cancels_its_task() {
	let h = Harness::new();
	h.root.render(text("never")).unwrap();
	assert_eq!(h.scheduler.pending_count(), 1);

	let Harness { scheduler, root, .. } = h;
	drop(root);
	assert_eq!(scheduler.pending_count(), 0);
	assert_eq!(scheduler.flush_all().unwrap().slices, 1);
}
