use pretty_assertions::assert_eq;
use weft_noop::Mutation;
use weft_reconciler::{CommitOutcome, Element, Lanes, Payload, Props, RootPhase};

use crate::common::{Harness, host, list, text};

#[test]
fn test_mount_commits_on_flush() {
	let h = Harness::new();
	h.root
		.render(Element::host("div", Props::new().with("id", "a"), [text("hi")]))
		.unwrap();
	assert_eq!(h.html(), "");
	assert!(h.root.has_pending_work());

	h.flush();
	assert_eq!(h.html(), r#"<div id="a">hi</div>"#);
	assert!(!h.root.has_pending_work());
	assert_eq!(h.root.phase().unwrap(), RootPhase::Idle);
}

#[test]
fn test_update_reuses_host_nodes() {
	let h = Harness::new();
	h.root.render(host("div", [text("hi")])).unwrap();
	h.flush();
	let nodes = h.node_count();
	h.take_log();

	h.root
		.render(Element::host("div", Props::new().with("class", "x"), [text("bye")]))
		.unwrap();
	h.flush();

	assert_eq!(h.html(), r#"<div class="x">bye</div>"#);
	assert_eq!(h.node_count(), nodes);
	let log = h.take_log();
	assert!(log.iter().any(|m| matches!(m, Mutation::UpdateText { text, .. } if text == "bye")));
	assert!(log.iter().any(|m| matches!(m, Mutation::UpdateNode { .. })));
	assert!(!log.iter().any(|m| matches!(m, Mutation::CreateNode { .. } | Mutation::CreateText { .. })));
}

#[test]
fn test_unchanged_text_is_not_touched() {
	let h = Harness::new();
	h.root.render(host("p", [text("same")])).unwrap();
	h.flush();
	h.take_log();

	h.root.render(host("p", [text("same")])).unwrap();
	h.flush();
	assert_eq!(h.take_log(), vec![Mutation::Prepare, Mutation::Reset]);
}

#[test]
fn test_keyed_reorder_moves_existing_nodes() {
	let h = Harness::new();
	h.root.render(list(&["a", "b", "c"])).unwrap();
	h.flush();
	let nodes = h.node_count();

	h.root.render(list(&["c", "a", "b"])).unwrap();
	h.flush();

	assert_eq!(h.html(), "<ul><li>c</li><li>a</li><li>b</li></ul>");
	assert_eq!(h.node_count(), nodes);
}

#[test]
fn test_keyed_removal_and_insertion() {
	let h = Harness::new();
	h.root.render(list(&["a", "b", "c"])).unwrap();
	h.flush();

	h.root.render(list(&["a", "c", "d"])).unwrap();
	h.flush();
	assert_eq!(h.html(), "<ul><li>a</li><li>c</li><li>d</li></ul>");

	h.root.render(list(&["d", "b"])).unwrap();
	h.flush();
	assert_eq!(h.html(), "<ul><li>d</li><li>b</li></ul>");
}

#[test]
fn test_deletions_apply_before_insertions() {
	let h = Harness::new();
	h.root.render(list(&["a"])).unwrap();
	h.flush();
	h.take_log();

	h.root.render(list(&["b"])).unwrap();
	h.flush();
	let log = h.take_log();
	let removed = log.iter().position(|m| matches!(m, Mutation::Remove { .. })).unwrap();
	let appended = log.iter().position(|m| matches!(m, Mutation::Append { .. })).unwrap();
	assert!(removed < appended, "{log:?}");
	assert_eq!(h.html(), "<ul><li>b</li></ul>");
}

#[test]
fn test_type_change_replaces_subtree() {
	let h = Harness::new();
	h.root.render(host("div", [text("x")])).unwrap();
	h.flush();

	h.root.render(host("span", [text("x")])).unwrap();
	h.flush();
	assert_eq!(h.html(), "<span>x</span>");
}

#[test]
fn test_fragments_place_children_in_order() {
	let h = Harness::new();
	h.root
		.render(Element::fragment([text("a"), Element::fragment([text("b"), text("c")]), text("d")]))
		.unwrap();
	h.flush();
	assert_eq!(h.html(), "abcd");

	h.root
		.render(Element::fragment([text("a"), Element::fragment([text("b"), text("c"), text("x")]), text("d")]))
		.unwrap();
	h.flush();
	assert_eq!(h.html(), "abcxd");
}

#[test]
fn test_clear_unmounts_everything() {
	let h = Harness::new();
	h.root.render(list(&["a", "b"])).unwrap();
	h.flush();

	h.root.request_update(Lanes::DEFAULT, Payload::Clear).unwrap();
	h.flush();
	assert_eq!(h.html(), "");
}

#[test]
fn test_reducer_sees_previous_element() {
	let h = Harness::new();
	h.root.render(text("1")).unwrap();
	h.root
		.request_update(
			Lanes::DEFAULT,
			Payload::reduce(|previous| text(&format!("{}2", previous.and_then(Element::as_text).unwrap_or_default()))),
		)
		.unwrap();
	h.flush();
	assert_eq!(h.html(), "12");
}

#[test]
fn test_sync_update_commits_before_returning() {
	let h = Harness::new();
	h.root.request_update(Lanes::SYNC, Payload::Replace(text("now"))).unwrap();
	assert_eq!(h.html(), "now");
	assert_eq!(h.scheduler.pending_count(), 0);
}

#[test]
fn test_commit_without_finished_tree_is_noop() {
	let h = Harness::new();
	assert_eq!(h.root.commit().unwrap(), CommitOutcome::NothingToCommit);

	h.root.render(text("x")).unwrap();
	h.flush();
	h.take_log();
	assert_eq!(h.root.commit().unwrap(), CommitOutcome::NothingToCommit);
	assert_eq!(h.take_log(), Vec::new());
	assert_eq!(h.html(), "x");
}

#[test]
fn test_commit_callbacks_run_after_mutations() {
	use std::cell::RefCell;
	use std::rc::Rc;

	let h = Harness::new();
	let seen = Rc::new(RefCell::new(Vec::new()));
	let root = Rc::downgrade(&h.root);
	let record = Rc::clone(&seen);
	h.root
		.request_update_with(Lanes::DEFAULT, Payload::Replace(text("done")), move || {
			let html = root.upgrade().map(|root| root.with_host(weft_noop::NoopHost::render).unwrap());
			record.borrow_mut().push(html);
		})
		.unwrap();
	h.flush();
	assert_eq!(*seen.borrow(), vec![Some("done".to_owned())]);
}
