use pretty_assertions::assert_eq;
use weft_reconciler::{BoundaryState, Element, Lanes, Payload, Resource, RootPhase};

use crate::common::{Harness, Reader, host, text};

fn suspending(resource: &Resource<String>) -> Element {
	Element::boundary([text("loading")], [host("p", [Element::component(Reader(resource.clone()))])]).with_key("b")
}

fn deferred(label: &str) -> Element {
	Element::boundary([text(&format!("[{label}?]"))], [text(&format!("[{label}]"))])
		.deferred()
		.with_key(label)
}

#[test]
fn test_boundary_shows_fallback_until_resource_resolves() {
	let h = Harness::new();
	let resource = Resource::pending();
	h.root.render(suspending(&resource)).unwrap();
	h.flush();

	assert_eq!(h.html(), "loading");
	let boundary = h.root.find_keyed("b").unwrap();
	assert!(h.root.is_boundary_showing_fallback(boundary));
	assert!(!h.root.has_pending_work());

	let remote = resource.clone();
	std::thread::spawn(move || remote.resolve("done".to_owned())).join().unwrap();
	assert!(h.scheduler.has_pending_work());
	h.flush();

	assert_eq!(h.html(), "<p>done</p>");
	assert!(!h.root.is_boundary_showing_fallback(boundary));
	let profiles = h.profiles();
	assert_eq!(profiles.len(), 2);
	assert!(profiles[1].lanes.is_retry_only());
}

#[test]
fn test_suspend_then_resolve_matches_ready_render() {
	let suspended = Harness::new();
	let resource = Resource::pending();
	suspended.root.render(suspending(&resource)).unwrap();
	suspended.flush();
	resource.resolve("done".to_owned());
	suspended.flush();

	let ready = Harness::new();
	ready.root.render(suspending(&Resource::ready("done".to_owned()))).unwrap();
	ready.flush();

	assert_eq!(suspended.html(), ready.html());
}

#[test]
fn test_boundary_rerendered_while_pending_keeps_fallback() {
	let h = Harness::new();
	let resource = Resource::pending();
	h.root.render(suspending(&resource)).unwrap();
	h.flush();
	let nodes = h.node_count();

	h.root.render(suspending(&resource)).unwrap();
	h.flush();
	assert_eq!(h.html(), "loading");
	assert_eq!(h.node_count(), nodes);

	let retry_lane = h.root.boundary_state(h.root.find_keyed("b").unwrap()).unwrap().retry_lane;
	assert!(retry_lane.is_retry_only());

	resource.resolve("done".to_owned());
	h.flush();
	assert_eq!(h.html(), "<p>done</p>");
}

#[test]
fn test_ready_resource_never_shows_fallback() {
	let h = Harness::new();
	h.root.render(suspending(&Resource::ready("now".to_owned()))).unwrap();
	h.flush();
	assert_eq!(h.html(), "<p>now</p>");
	let boundary = h.root.find_keyed("b").unwrap();
	assert_eq!(h.root.boundary_state(boundary), Some(BoundaryState::default()));
}

#[test]
fn test_root_suspends_without_boundary_until_pinged() {
	let h = Harness::new();
	let resource = Resource::pending();
	h.root.render(Element::component(Reader(resource.clone()))).unwrap();
	h.flush();

	assert_eq!(h.root.phase().unwrap(), RootPhase::Suspended(Lanes::DEFAULT));
	assert_eq!(h.html(), "");
	assert!(h.root.has_pending_work());
	assert_eq!(h.scheduler.pending_count(), 0);

	resource.resolve("late".to_owned());
	h.flush();
	assert_eq!(h.html(), "late");
	assert_eq!(h.root.phase().unwrap(), RootPhase::Idle);
	assert!(!h.root.has_pending_work());
}

#[test]
fn test_new_update_unblocks_suspended_root() {
	let h = Harness::new();
	h.root.render(Element::component(Reader(Resource::pending()))).unwrap();
	h.flush();
	assert!(h.root.lanes().unwrap().suspended().contains(Lanes::DEFAULT));

	h.root.render(text("replaced")).unwrap();
	h.flush();
	assert_eq!(h.html(), "replaced");
}

#[test]
fn test_deferred_boundaries_hydrate_at_offscreen_priority() {
	let h = Harness::new();
	h.root.render(Element::fragment([deferred("a"), deferred("b")])).unwrap();
	h.flush();
	assert_eq!(h.html(), "[a][b]");

	let profiles = h.profiles();
	assert_eq!(profiles.len(), 2);
	assert_eq!(profiles[1].lanes, Lanes::OFFSCREEN);
}

#[test]
fn test_sync_hydration_request_runs_before_idle_hydration() {
	let h = Harness::new();
	h.root
		.request_update(Lanes::SYNC, Payload::Replace(Element::fragment([deferred("a"), deferred("b")])))
		.unwrap();
	assert_eq!(h.html(), "[a?][b?]");
	assert!(h.root.lanes().unwrap().pending().contains(Lanes::OFFSCREEN));

	let a = h.root.find_keyed("a").unwrap();
	let b = h.root.find_keyed("b").unwrap();
	assert!(h.root.boundary_state(b).unwrap().dehydrated);

	h.root.request_boundary_priority(b, Lanes::SYNC).unwrap();
	assert_eq!(h.html(), "[a?][b]");
	assert!(h.root.boundary_state(a).unwrap().dehydrated);
	assert!(!h.root.boundary_state(b).unwrap().dehydrated);

	h.flush();
	assert_eq!(h.html(), "[a][b]");
	assert!(!h.root.boundary_state(a).unwrap().dehydrated);
}
