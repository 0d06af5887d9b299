use std::cell::Cell;
use std::rc::{Rc, Weak};

use pretty_assertions::assert_eq;
use weft_noop::NoopHost;
use weft_reconciler::{Element, Lanes, Payload, ReconcileError, ReconcilerConfig, Root, RootPhase};

use crate::common::{Failing, Harness, host, text};

fn guarded(child: Element) -> Element {
	Element::catch(|error| vec![text(&format!("caught: {}", error.message()))], [child])
}

fn reconcile_error(error: &weft_scheduler::FlushError) -> &ReconcileError {
	error.source.downcast_ref::<ReconcileError>().unwrap()
}

#[test]
fn test_catch_renders_fallback_for_failing_child() {
	let h = Harness::new();
	h.root.render(guarded(Element::component(Failing("boom")))).unwrap();
	h.flush();
	assert_eq!(h.html(), "caught: boom");
}

#[test]
fn test_catch_recovers_when_child_stops_failing() {
	let h = Harness::new();
	h.root.render(guarded(Element::component(Failing("boom")))).unwrap();
	h.flush();

	h.root.render(guarded(text("fine"))).unwrap();
	h.flush();
	assert_eq!(h.html(), "fine");
}

#[test]
fn test_nearest_catch_wins() {
	let h = Harness::new();
	let inner = guarded(Element::component(Failing("inner")));
	h.root.render(guarded(host("div", [inner, text("!")]))).unwrap();
	h.flush();
	assert_eq!(h.html(), "<div>caught: inner!</div>");
}

#[test]
fn test_uncaught_error_keeps_committed_tree_and_drops_pending_work() {
	let h = Harness::new();
	h.root.render(text("before")).unwrap();
	h.flush();

	h.root.render(Element::component(Failing("boom"))).unwrap();
	let error = h.try_flush().unwrap_err();
	match reconcile_error(&error) {
		ReconcileError::Render(error) => assert_eq!(error.message(), "boom"),
		other => panic!("unexpected error: {other}"),
	}
	assert_eq!(h.html(), "before");
	assert!(!h.root.has_pending_work());
	assert_eq!(h.root.phase().unwrap(), RootPhase::Idle);

	h.root.render(text("after")).unwrap();
	h.flush();
	assert_eq!(h.html(), "after");
}

#[test]
fn test_host_failure_aborts_commit_and_keeps_lanes() {
	let h = Harness::new();
	h.root.render(text("stable")).unwrap();
	h.flush();

	h.root.with_host_mut(NoopHost::fail_next).unwrap();
	h.root.render(host("div", [text("a")])).unwrap();
	let error = h.try_flush().unwrap_err();
	assert!(matches!(reconcile_error(&error), ReconcileError::Host(_)));

	assert_eq!(h.html(), "stable");
	assert!(h.root.has_pending_work());
	assert_eq!(h.scheduler.pending_count(), 0);
	assert_eq!(h.root.phase().unwrap(), RootPhase::Idle);

	h.root.render(host("div", [text("b")])).unwrap();
	h.flush();
	assert_eq!(h.html(), "<div>b</div>");
}

fn resubmit(root: Weak<Root<NoopHost>>, count: Rc<Cell<u32>>) -> Box<dyn Fn()> {
	Box::new(move || {
		count.set(count.get() + 1);
		if let Some(strong) = root.upgrade() {
			let next = resubmit(root.clone(), Rc::clone(&count));
			let element = text(&count.get().to_string());
			strong.request_update_with(Lanes::SYNC, Payload::Replace(element), next).unwrap();
		}
	})
}

#[test]
fn test_nested_sync_updates_hit_depth_limit() {
	let config = ReconcilerConfig {
		nested_update_limit: 5,
		..ReconcilerConfig::default()
	};
	let h = Harness::with_config(config);
	let count = Rc::new(Cell::new(0));

	let callback = resubmit(Rc::downgrade(&h.root), Rc::clone(&count));
	let result = h.root.request_update_with(Lanes::SYNC, Payload::Replace(text("0")), callback);

	assert!(matches!(result, Err(ReconcileError::UpdateDepthExceeded { limit: 5 })));
	assert_eq!(count.get(), 5);
	assert_eq!(h.html(), "5");
	assert!(!h.root.has_pending_work());
	assert_eq!(h.scheduler.pending_count(), 0);

	h.root.request_update(Lanes::SYNC, Payload::Replace(text("ok"))).unwrap();
	assert_eq!(h.html(), "ok");
}
